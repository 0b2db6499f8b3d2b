pub mod error;
pub mod filter;
pub mod llrp;
pub mod plan;
pub mod reader;
pub mod report;
pub mod tagop;

/// Largest antenna port count across the supported reader models.
pub const MAX_ANTENNAS: u16 = 16;
