use crate::error::ReaderError;
use crate::tagop::Gen2MemoryBank;

/// Bit offset of the EPC field inside Gen2 EPC memory: one CRC word and
/// one PC word come first.
pub const EPC_MEMORY_DATA_OFFSET_BITS: u32 = 32;

/// A tag selection filter applied during the inventory round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TagFilter {
    /// Gen2 Select: match `bit_length` bits of `mask` against the named
    /// bank starting at `bit_pointer`. `invert` selects the tags that do
    /// not match.
    Select {
        bank: Gen2MemoryBank,
        bit_pointer: u32,
        bit_length: u16,
        mask: Vec<u8>,
        invert: bool,
    },
    /// Match an exact tag id. Translates to an EPC bank mask anchored
    /// past the CRC and PC words.
    ExactId {
        epc: Vec<u8>,
    },
}

impl TagFilter {
    /// Build time validation, before any wire exchange happens.
    pub fn validate(&self) -> Result<(), ReaderError> {
        match self {
            TagFilter::Select { bank, bit_length, mask, .. } => {
                if *bank == Gen2MemoryBank::Reserved {
                    return Err(ReaderError::InvalidArgument(String::from(
                        "select filter may not target the reserved bank",
                    )))
                }
                if usize::from(*bit_length) > mask.len() * 8 {
                    return Err(ReaderError::InvalidArgument(String::from(
                        "select filter bit length exceeds mask",
                    )))
                }
                Ok(())
            }
            TagFilter::ExactId { epc } => {
                if epc.is_empty() {
                    return Err(ReaderError::InvalidArgument(String::from(
                        "exact id filter requires a tag id",
                    )))
                }
                Ok(())
            }
        }
    }

    /// Local evaluation of the filter against a tag's EPC bytes, using the
    /// same bit semantics the reader applies. Only EPC bank selects can be
    /// evaluated here; filters on other banks report no match.
    pub fn matches_epc(&self, epc: &[u8]) -> bool {
        match self {
            TagFilter::Select { bank, bit_pointer, bit_length, mask, invert } => {
                if *bank != Gen2MemoryBank::Epc {
                    return false;
                }
                if *bit_pointer < EPC_MEMORY_DATA_OFFSET_BITS {
                    return false;
                }
                let offset = bit_pointer - EPC_MEMORY_DATA_OFFSET_BITS;
                let matched = bits_equal(epc, offset, mask, u32::from(*bit_length));
                matched != *invert
            }
            TagFilter::ExactId { epc: want } => want.as_slice() == epc,
        }
    }
}

/// Compare `count` bits of `mask` (from its start) against `data` starting
/// at bit `offset`. Out of range bits never match.
fn bits_equal(data: &[u8], offset: u32, mask: &[u8], count: u32) -> bool {
    for i in 0..count {
        let data_bit = offset + i;
        let byte = (data_bit / 8) as usize;
        if byte >= data.len() {
            return false;
        }
        let mask_byte = (i / 8) as usize;
        if mask_byte >= mask.len() {
            return false;
        }
        let d = data[byte] >> (7 - data_bit % 8) & 1;
        let m = mask[mask_byte] >> (7 - i % 8) & 1;
        if d != m {
            return false;
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_select_filter_bit_matching() {
        // EPC whose first 16 bits are 0xABCD
        let epc = [0xAB, 0xCD, 0x00, 0x01, 0x02, 0x03];
        let filter = TagFilter::Select {
            bank: Gen2MemoryBank::Epc,
            bit_pointer: 32,
            bit_length: 16,
            mask: vec![0xAB, 0xCD],
            invert: false,
        };
        assert!(filter.matches_epc(&epc));
        let inverted = TagFilter::Select {
            bank: Gen2MemoryBank::Epc,
            bit_pointer: 32,
            bit_length: 16,
            mask: vec![0xAB, 0xCD],
            invert: true,
        };
        assert!(!inverted.matches_epc(&epc));
        // non matching epc flips both
        let other = [0xAB, 0xCE, 0x00, 0x01, 0x02, 0x03];
        assert!(!filter.matches_epc(&other));
        assert!(inverted.matches_epc(&other));
    }

    #[test]
    fn test_select_filter_unaligned_pointer() {
        // pointer 36 skips the first nibble
        let epc = [0xAB, 0xCD, 0x00, 0x00];
        let filter = TagFilter::Select {
            bank: Gen2MemoryBank::Epc,
            bit_pointer: 36,
            bit_length: 8,
            mask: vec![0xBC],
            invert: false,
        };
        assert!(filter.matches_epc(&epc));
    }

    #[test]
    fn test_exact_id_filter() {
        let filter = TagFilter::ExactId { epc: vec![0x11, 0x22, 0x33] };
        assert!(filter.matches_epc(&[0x11, 0x22, 0x33]));
        assert!(!filter.matches_epc(&[0x11, 0x22]));
    }

    #[test]
    fn test_validate() {
        let filter = TagFilter::Select {
            bank: Gen2MemoryBank::Reserved,
            bit_pointer: 0,
            bit_length: 8,
            mask: vec![0xFF],
            invert: false,
        };
        assert!(matches!(filter.validate(), Err(ReaderError::InvalidArgument(_))));
        let filter = TagFilter::Select {
            bank: Gen2MemoryBank::Epc,
            bit_pointer: 32,
            bit_length: 24,
            mask: vec![0xFF],
            invert: false,
        };
        assert!(matches!(filter.validate(), Err(ReaderError::InvalidArgument(_))));
        let filter = TagFilter::ExactId { epc: Vec::new() };
        assert!(matches!(filter.validate(), Err(ReaderError::InvalidArgument(_))));
        let filter = TagFilter::ExactId { epc: vec![0x01] };
        assert!(filter.validate().is_ok());
    }
}
