/// Gen2 tag memory banks. Total conversions both ways; an unknown code is
/// an explicit error, not a map miss.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gen2MemoryBank {
    Reserved,
    Epc,
    Tid,
    User,
}

impl Gen2MemoryBank {
    pub fn code(&self) -> u8 {
        match self {
            Gen2MemoryBank::Reserved => 0,
            Gen2MemoryBank::Epc => 1,
            Gen2MemoryBank::Tid => 2,
            Gen2MemoryBank::User => 3,
        }
    }

    pub fn from_code(code: u8) -> Result<Gen2MemoryBank, &'static str> {
        match code {
            0 => Ok(Gen2MemoryBank::Reserved),
            1 => Ok(Gen2MemoryBank::Epc),
            2 => Ok(Gen2MemoryBank::Tid),
            3 => Ok(Gen2MemoryBank::User),
            _ => Err("unknown gen2 memory bank code"),
        }
    }
}

/// Which privilege a lock operation changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockTarget {
    KillPassword,
    AccessPassword,
    EpcMemory,
    TidMemory,
    UserMemory,
}

impl LockTarget {
    pub fn code(&self) -> u8 {
        match self {
            LockTarget::KillPassword => 0,
            LockTarget::AccessPassword => 1,
            LockTarget::EpcMemory => 2,
            LockTarget::TidMemory => 3,
            LockTarget::UserMemory => 4,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockAction {
    ReadWrite,
    PermaLock,
    PermaUnlock,
    Unlock,
}

impl LockAction {
    pub fn code(&self) -> u8 {
        match self {
            LockAction::ReadWrite => 0,
            LockAction::PermaLock => 1,
            LockAction::PermaUnlock => 2,
            LockAction::Unlock => 3,
        }
    }
}

/// The standard Gen2 access operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Gen2Op {
    ReadData {
        bank: Gen2MemoryBank,
        word_address: u16,
        word_count: u16,
        access_password: Option<u32>,
    },
    WriteData {
        bank: Gen2MemoryBank,
        word_address: u16,
        words: Vec<u16>,
        access_password: Option<u32>,
    },
    /// Rewrite the tag's EPC. Lands in EPC memory past the CRC and PC
    /// words.
    WriteTag {
        epc: Vec<u8>,
        access_password: Option<u32>,
    },
    BlockWrite {
        bank: Gen2MemoryBank,
        word_address: u16,
        words: Vec<u16>,
        access_password: Option<u32>,
    },
    BlockErase {
        bank: Gen2MemoryBank,
        word_address: u16,
        word_count: u16,
        access_password: Option<u32>,
    },
    BlockPermaLock {
        read_lock: bool,
        bank: Gen2MemoryBank,
        block_pointer: u16,
        masks: Vec<u16>,
        access_password: Option<u32>,
    },
    Lock {
        target: LockTarget,
        action: LockAction,
        access_password: Option<u32>,
    },
    Kill {
        kill_password: u32,
    },
}

impl Gen2Op {
    pub fn access_password(&self) -> Option<u32> {
        match self {
            Gen2Op::ReadData { access_password, .. } => *access_password,
            Gen2Op::WriteData { access_password, .. } => *access_password,
            Gen2Op::WriteTag { access_password, .. } => *access_password,
            Gen2Op::BlockWrite { access_password, .. } => *access_password,
            Gen2Op::BlockErase { access_password, .. } => *access_password,
            Gen2Op::BlockPermaLock { access_password, .. } => *access_password,
            Gen2Op::Lock { access_password, .. } => *access_password,
            Gen2Op::Kill { .. } => None,
        }
    }
}
