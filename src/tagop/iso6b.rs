/// ISO 18000-6B access operations. Memory is byte addressed and there are
/// no banks or passwords on this air protocol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Iso6bOp {
    ReadData {
        byte_address: u8,
        length: u8,
    },
    WriteData {
        byte_address: u8,
        data: Vec<u8>,
    },
    /// Permanently lock one byte of memory.
    Lock {
        byte_address: u8,
    },
}
