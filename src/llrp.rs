pub mod bit_masks;
pub mod message_types;
pub mod parameter_types;
pub mod requests;

#[cfg(test)]
mod tests;

/// Every LLRP message starts with a fixed ten byte header.
pub const HEADER_LEN: usize = 10;

pub struct MessageHeader {
    pub version: u16,
    pub kind: u16,
    pub length: u32,
    pub id: u32,
}

/// A framed LLRP message with the header stripped off.
pub struct Message {
    pub version: u16,
    pub kind: u16,
    pub id: u32,
    pub payload: Vec<u8>,
}

pub fn decode_header(buf: &[u8]) -> Result<MessageHeader, &'static str> {
    if buf.len() < HEADER_LEN {
        return Err("message header too short")
    }
    let bits = u16::from(buf[0]) << 8 | u16::from(buf[1]);
    let info = bit_masks::get_msg_type(&bits)?;
    let length = u32::from(buf[2]) << 24 | u32::from(buf[3]) << 16 | u32::from(buf[4]) << 8 | u32::from(buf[5]);
    if (length as usize) < HEADER_LEN {
        return Err("invalid message length")
    }
    let id = u32::from(buf[6]) << 24 | u32::from(buf[7]) << 16 | u32::from(buf[8]) << 8 | u32::from(buf[9]);
    Ok(MessageHeader {
        version: info.version,
        kind: info.kind,
        length,
        id,
    })
}

/// One parameter pulled off a message payload. TV parameters have an
/// implicit length, TLV parameters carry theirs on the wire.
pub struct Param<'a> {
    pub tv: bool,
    pub kind: u16,
    pub data: &'a [u8],
}

/// Cursor over the TLV/TV parameters of a payload. Truncated input is an
/// error, never a panic.
pub struct ParamReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> ParamReader<'a> {
    pub fn new(buf: &'a [u8]) -> ParamReader<'a> {
        ParamReader { buf, pos: 0 }
    }

    pub fn next_param(&mut self) -> Result<Option<Param<'a>>, &'static str> {
        if self.pos >= self.buf.len() {
            return Ok(None)
        }
        let remaining = &self.buf[self.pos..];
        if remaining[0] & 0x80 != 0 {
            // TV encoded, one type byte then a fixed size value
            let kind = u16::from(remaining[0] & 0x7F);
            let value_len = match tv_param_len(kind) {
                Some(l) => l,
                None => return Err("unknown tv parameter type"),
            };
            if remaining.len() < 1 + value_len {
                return Err("truncated tv parameter")
            }
            self.pos += 1 + value_len;
            return Ok(Some(Param {
                tv: true,
                kind,
                data: &remaining[1..1 + value_len],
            }))
        }
        if remaining.len() < 4 {
            return Err("truncated tlv parameter header")
        }
        let bits = u16::from(remaining[0]) << 8 | u16::from(remaining[1]);
        let info = bit_masks::get_param_type(&bits)?;
        let length = usize::from(remaining[2]) << 8 | usize::from(remaining[3]);
        if length < 4 || remaining.len() < length {
            return Err("truncated tlv parameter")
        }
        self.pos += length;
        Ok(Some(Param {
            tv: false,
            kind: info.kind,
            data: &remaining[4..length],
        }))
    }
}

/// Value sizes for the TV encoded parameter types the protocol defines.
pub fn tv_param_len(kind: u16) -> Option<usize> {
    match kind {
        parameter_types::ANTENNA_ID => Some(2),
        parameter_types::FIRST_SEEN_TIMESTAMP_UTC => Some(8),
        parameter_types::FIRST_SEEN_TIMESTAMP_UPTIME => Some(8),
        parameter_types::LAST_SEEN_TIMESTAMP_UTC => Some(8),
        parameter_types::LAST_SEEN_TIMESTAMP_UPTIME => Some(8),
        parameter_types::PEAK_RSSI => Some(1),
        parameter_types::CHANNEL_INDEX => Some(2),
        parameter_types::TAG_SEEN_COUNT => Some(2),
        parameter_types::RO_SPEC_ID => Some(4),
        parameter_types::INVENTORY_PARAMETER_SPEC_ID => Some(2),
        parameter_types::C1G2_CRC => Some(2),
        parameter_types::C1G2_PC => Some(2),
        parameter_types::EPC_96 => Some(12),
        parameter_types::SPEC_INDEX => Some(2),
        parameter_types::CLIENT_REQUEST_OP_SPEC_RESULT => Some(4),
        parameter_types::ACCESS_SPEC_ID => Some(4),
        parameter_types::C1G2_SINGULATION_DETAILS => Some(4),
        parameter_types::C1G2_XPCW1 => Some(2),
        parameter_types::C1G2_XPCW2 => Some(2),
        _ => None,
    }
}

pub fn read_u16(data: &[u8], offset: usize) -> Result<u16, &'static str> {
    if data.len() < offset + 2 {
        return Err("short read on u16 field")
    }
    Ok(u16::from(data[offset]) << 8 | u16::from(data[offset + 1]))
}

pub fn read_u32(data: &[u8], offset: usize) -> Result<u32, &'static str> {
    if data.len() < offset + 4 {
        return Err("short read on u32 field")
    }
    Ok(u32::from(data[offset]) << 24
        | u32::from(data[offset + 1]) << 16
        | u32::from(data[offset + 2]) << 8
        | u32::from(data[offset + 3]))
}

pub fn read_u64(data: &[u8], offset: usize) -> Result<u64, &'static str> {
    let high = read_u32(data, offset)?;
    let low = read_u32(data, offset + 4)?;
    Ok(u64::from(high) << 32 | u64::from(low))
}

pub struct LlrpStatus {
    pub status: u16,
    pub description: String,
}

impl LlrpStatus {
    pub fn success(&self) -> bool {
        self.status == parameter_types::M_SUCCESS
    }
}

/// Pull the LLRPStatus parameter out of a response payload. Every response
/// class message carries one as its first parameter.
pub fn parse_status(payload: &[u8]) -> Result<LlrpStatus, &'static str> {
    let mut params = ParamReader::new(payload);
    while let Some(param) = params.next_param()? {
        if param.tv || param.kind != parameter_types::LLRP_STATUS {
            continue;
        }
        let status = read_u16(param.data, 0)?;
        let desc_len = usize::from(read_u16(param.data, 2)?);
        if param.data.len() < 4 + desc_len {
            return Err("truncated status description")
        }
        let description = String::from_utf8_lossy(&param.data[4..4 + desc_len]).to_string();
        return Ok(LlrpStatus { status, description })
    }
    Err("response missing llrp status")
}
