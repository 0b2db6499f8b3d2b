use std::fmt;

pub mod gen2;
pub mod iso6b;
pub mod vendor;

pub use gen2::{Gen2MemoryBank, Gen2Op, LockAction, LockTarget};
pub use iso6b::Iso6bOp;
pub use vendor::{
    ChipFamily, Sl900aBatteryLevel, Sl900aLogState, Sl900aSensorReading, VendorOp, VendorValue,
};

/// A generic tag operation. Constructed by the caller, consumed once by the
/// codec when it is turned into a wire OpSpec, never mutated afterward.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TagOp {
    Gen2(Gen2Op),
    Iso6b(Iso6bOp),
    Vendor(VendorOp),
}

impl TagOp {
    /// The access password the operation wants used, when it carries its
    /// own instead of relying on the configured one.
    pub fn access_password(&self) -> Option<u32> {
        match self {
            TagOp::Gen2(op) => op.access_password(),
            TagOp::Iso6b(_) => None,
            TagOp::Vendor(op) => op.access_password,
        }
    }
}

/// The canonical outcome taxonomy every wire result code funnels into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagOpFailure {
    NoResponse,
    ReaderError,
    TagError,
    MemoryLocked,
    MemoryOverrun,
    InsufficientPower,
    Unsupported,
    ZeroKillPassword,
}

impl fmt::Display for TagOpFailure {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            TagOpFailure::NoResponse => write!(f, "no response from tag"),
            TagOpFailure::ReaderError => write!(f, "non-specific reader error"),
            TagOpFailure::TagError => write!(f, "non-specific tag error"),
            TagOpFailure::MemoryLocked => write!(f, "tag memory locked"),
            TagOpFailure::MemoryOverrun => write!(f, "tag memory overrun"),
            TagOpFailure::InsufficientPower => write!(f, "insufficient power"),
            TagOpFailure::Unsupported => write!(f, "operation not supported"),
            TagOpFailure::ZeroKillPassword => write!(f, "zero kill password"),
        }
    }
}

/// Outcome of one executed OpSpec after decode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TagOpResult {
    Success {
        /// Raw payload bytes from the result parameter, possibly empty.
        data: Vec<u8>,
        /// Parsed form of `data` for vendor getters with a structured
        /// reply. Filled in once the originating operation is known.
        value: Option<VendorValue>,
    },
    Failed(TagOpFailure),
}
