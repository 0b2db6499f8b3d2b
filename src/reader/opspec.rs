use crate::error::ReaderError;
use crate::llrp::parameter_types;
use crate::llrp::requests::{custom_parameter, push_u16, push_u32, tlv};
use crate::tagop::vendor::{Sl900aSensor, VendorVariant};
use crate::tagop::{
    Gen2Op, Iso6bOp, Sl900aBatteryLevel, Sl900aLogState, Sl900aSensorReading, TagOp,
    TagOpFailure, TagOpResult, VendorValue,
};

// Subtype space for ThingMagic custom OpSpecs and report parameters.
pub const TM_ISO18K6B_READ_SUBTYPE: u32 = 1;
pub const TM_ISO18K6B_WRITE_SUBTYPE: u32 = 2;
pub const TM_ISO18K6B_LOCK_SUBTYPE: u32 = 3;
pub const TM_HIGGS2_PARTIAL_LOAD_IMAGE_SUBTYPE: u32 = 16;
pub const TM_HIGGS3_FAST_LOAD_IMAGE_SUBTYPE: u32 = 17;
pub const TM_HIGGS3_BLOCK_READ_LOCK_SUBTYPE: u32 = 18;
pub const TM_NXP_SET_READ_PROTECT_SUBTYPE: u32 = 32;
pub const TM_NXP_RESET_READ_PROTECT_SUBTYPE: u32 = 33;
pub const TM_NXP_CHANGE_EAS_SUBTYPE: u32 = 34;
pub const TM_NXP_CALIBRATE_SUBTYPE: u32 = 35;
pub const TM_MONZA4_QT_READ_WRITE_SUBTYPE: u32 = 48;
pub const TM_SL900A_GET_BATTERY_LEVEL_SUBTYPE: u32 = 64;
pub const TM_SL900A_GET_SENSOR_VALUE_SUBTYPE: u32 = 65;
pub const TM_SL900A_SET_LOG_MODE_SUBTYPE: u32 = 66;
pub const TM_SL900A_GET_LOG_STATE_SUBTYPE: u32 = 67;
pub const TM_IAV_ACTIVATE_SECURE_MODE_SUBTYPE: u32 = 80;
pub const TM_IAV_OBU_AUTH_ID_SUBTYPE: u32 = 81;
/// Tag report custom parameter carrying the RF phase angle.
pub const TM_PHASE_REPORT_SUBTYPE: u32 = 128;
/// Custom OpSpec result parameter subtype.
pub const TM_OP_SPEC_RESULT_SUBTYPE: u32 = 129;

/// Encode one generic tag operation as a wire OpSpec parameter. The
/// OpSpec id is allocated by the lifecycle's shared counter; the access
/// password comes from the operation when it carries one, otherwise from
/// the reader configuration. This is a closed dispatch: there is no
/// fallback encoding for a variant the table does not know.
pub fn encode(
    op_spec_id: u32,
    op: &TagOp,
    configured_password: u32,
) -> Result<Vec<u8>, ReaderError> {
    let password = op.access_password().unwrap_or(configured_password);
    match op {
        TagOp::Gen2(gen2) => encode_gen2(op_spec_id, gen2, password),
        TagOp::Iso6b(iso) => Ok(encode_iso6b(op_spec_id, iso)),
        TagOp::Vendor(vendor) => {
            if vendor.chip != vendor.op.family() {
                return Err(ReaderError::InvalidArgument(format!(
                    "command {:?} does not belong to chip family {:?}",
                    vendor.op, vendor.chip,
                )))
            }
            Ok(encode_vendor(op_spec_id, &vendor.op, password))
        }
    }
}

fn encode_gen2(op_spec_id: u32, op: &Gen2Op, password: u32) -> Result<Vec<u8>, ReaderError> {
    // LLRP truncates the opspec id to 16 bits on C1G2 access parameters
    let id16 = (op_spec_id & 0xFFFF) as u16;
    match op {
        Gen2Op::ReadData { bank, word_address, word_count, .. } => {
            let mut body = Vec::with_capacity(11);
            push_u16(&mut body, id16);
            push_u32(&mut body, password);
            body.push(bank.code() << 6);
            push_u16(&mut body, *word_address);
            push_u16(&mut body, *word_count);
            Ok(tlv(parameter_types::C1G2_READ, &body))
        }
        Gen2Op::WriteData { bank, word_address, words, .. } => {
            Ok(write_style_op(parameter_types::C1G2_WRITE, id16, password, bank.code(), *word_address, words))
        }
        Gen2Op::WriteTag { epc, access_password } => {
            // an epc rewrite is a block write into epc memory at word 2
            if epc.len() % 2 != 0 {
                return Err(ReaderError::InvalidArgument(String::from(
                    "epc must be an even number of bytes",
                )))
            }
            let words: Vec<u16> = epc
                .chunks(2)
                .map(|pair| u16::from(pair[0]) << 8 | u16::from(pair[1]))
                .collect();
            let password = access_password.unwrap_or(password);
            Ok(write_style_op(parameter_types::C1G2_BLOCK_WRITE, id16, password, 1, 2, &words))
        }
        Gen2Op::BlockWrite { bank, word_address, words, .. } => {
            Ok(write_style_op(parameter_types::C1G2_BLOCK_WRITE, id16, password, bank.code(), *word_address, words))
        }
        Gen2Op::BlockErase { bank, word_address, word_count, .. } => {
            let mut body = Vec::with_capacity(11);
            push_u16(&mut body, id16);
            push_u32(&mut body, password);
            body.push(bank.code() << 6);
            push_u16(&mut body, *word_address);
            push_u16(&mut body, *word_count);
            Ok(tlv(parameter_types::C1G2_BLOCK_ERASE, &body))
        }
        Gen2Op::BlockPermaLock { read_lock, bank, block_pointer, masks, .. } => {
            let mut body = Vec::with_capacity(12 + masks.len() * 2);
            push_u16(&mut body, id16);
            push_u32(&mut body, password);
            body.push(if *read_lock { 0x80 } else { 0x00 });
            body.push(bank.code() << 6);
            push_u16(&mut body, *block_pointer);
            push_u16(&mut body, masks.len() as u16);
            for mask in masks {
                push_u16(&mut body, *mask);
            }
            Ok(tlv(parameter_types::C1G2_BLOCK_PERMALOCK, &body))
        }
        Gen2Op::Lock { target, action, .. } => {
            let mut payload = Vec::with_capacity(2);
            payload.push(action.code());
            payload.push(target.code());
            let lock_payload = tlv(parameter_types::C1G2_LOCK_PAYLOAD, &payload);
            let mut body = Vec::with_capacity(6 + lock_payload.len());
            push_u16(&mut body, id16);
            push_u32(&mut body, password);
            body.extend(lock_payload);
            Ok(tlv(parameter_types::C1G2_LOCK, &body))
        }
        Gen2Op::Kill { kill_password } => {
            if *kill_password == 0 {
                // readers reject a zero kill password; catch it before any
                // wire exchange
                return Err(ReaderError::TagOp(TagOpFailure::ZeroKillPassword))
            }
            let mut body = Vec::with_capacity(6);
            push_u16(&mut body, id16);
            push_u32(&mut body, *kill_password);
            Ok(tlv(parameter_types::C1G2_KILL, &body))
        }
    }
}

fn write_style_op(
    kind: u16,
    id16: u16,
    password: u32,
    bank_code: u8,
    word_address: u16,
    words: &[u16],
) -> Vec<u8> {
    let mut body = Vec::with_capacity(11 + words.len() * 2);
    push_u16(&mut body, id16);
    push_u32(&mut body, password);
    body.push(bank_code << 6);
    push_u16(&mut body, word_address);
    push_u16(&mut body, words.len() as u16);
    for word in words {
        push_u16(&mut body, *word);
    }
    tlv(kind, &body)
}

fn encode_iso6b(op_spec_id: u32, op: &Iso6bOp) -> Vec<u8> {
    match op {
        Iso6bOp::ReadData { byte_address, length } => {
            let mut body = Vec::with_capacity(6);
            push_u32(&mut body, op_spec_id);
            body.push(*byte_address);
            body.push(*length);
            custom_parameter(TM_ISO18K6B_READ_SUBTYPE, &body)
        }
        Iso6bOp::WriteData { byte_address, data } => {
            let mut body = Vec::with_capacity(6 + data.len());
            push_u32(&mut body, op_spec_id);
            body.push(*byte_address);
            body.push(data.len() as u8);
            body.extend_from_slice(data);
            custom_parameter(TM_ISO18K6B_WRITE_SUBTYPE, &body)
        }
        Iso6bOp::Lock { byte_address } => {
            let mut body = Vec::with_capacity(5);
            push_u32(&mut body, op_spec_id);
            body.push(*byte_address);
            custom_parameter(TM_ISO18K6B_LOCK_SUBTYPE, &body)
        }
    }
}

fn encode_vendor(op_spec_id: u32, op: &VendorVariant, password: u32) -> Vec<u8> {
    // every custom opspec starts with the opspec id and the access
    // password, then the command's own fields
    let mut body = Vec::new();
    push_u32(&mut body, op_spec_id);
    push_u32(&mut body, password);
    match op {
        VendorVariant::Higgs2PartialLoadImage { kill_password, access_password, epc } => {
            push_u32(&mut body, *kill_password);
            push_u32(&mut body, *access_password);
            body.extend_from_slice(epc);
            custom_parameter(TM_HIGGS2_PARTIAL_LOAD_IMAGE_SUBTYPE, &body)
        }
        VendorVariant::Higgs3FastLoadImage {
            current_access_password,
            kill_password,
            access_password,
            pc,
            epc,
        } => {
            push_u32(&mut body, *current_access_password);
            push_u32(&mut body, *kill_password);
            push_u32(&mut body, *access_password);
            push_u16(&mut body, *pc);
            body.extend_from_slice(epc);
            custom_parameter(TM_HIGGS3_FAST_LOAD_IMAGE_SUBTYPE, &body)
        }
        VendorVariant::Higgs3BlockReadLock { lock_bits } => {
            body.push(*lock_bits);
            custom_parameter(TM_HIGGS3_BLOCK_READ_LOCK_SUBTYPE, &body)
        }
        VendorVariant::NxpSetReadProtect => {
            custom_parameter(TM_NXP_SET_READ_PROTECT_SUBTYPE, &body)
        }
        VendorVariant::NxpResetReadProtect => {
            custom_parameter(TM_NXP_RESET_READ_PROTECT_SUBTYPE, &body)
        }
        VendorVariant::NxpChangeEas { reset } => {
            body.push(if *reset { 0x01 } else { 0x00 });
            custom_parameter(TM_NXP_CHANGE_EAS_SUBTYPE, &body)
        }
        VendorVariant::NxpCalibrate => custom_parameter(TM_NXP_CALIBRATE_SUBTYPE, &body),
        VendorVariant::Monza4QtReadWrite { write, persist, payload } => {
            let mut control: u8 = 0;
            if *write {
                control |= 0x80;
            }
            if *persist {
                control |= 0x40;
            }
            body.push(control);
            push_u16(&mut body, *payload);
            custom_parameter(TM_MONZA4_QT_READ_WRITE_SUBTYPE, &body)
        }
        VendorVariant::Sl900aGetBatteryLevel => {
            custom_parameter(TM_SL900A_GET_BATTERY_LEVEL_SUBTYPE, &body)
        }
        VendorVariant::Sl900aGetSensorValue { sensor } => {
            body.push(sensor.code());
            custom_parameter(TM_SL900A_GET_SENSOR_VALUE_SUBTYPE, &body)
        }
        VendorVariant::Sl900aSetLogMode {
            form,
            storage_rule,
            ext1_enable,
            ext2_enable,
            temp_enable,
            batt_enable,
            log_interval_s,
        } => {
            body.push(*form);
            body.push(*storage_rule);
            let mut sensors: u8 = 0;
            if *ext1_enable {
                sensors |= 0x08;
            }
            if *ext2_enable {
                sensors |= 0x04;
            }
            if *temp_enable {
                sensors |= 0x02;
            }
            if *batt_enable {
                sensors |= 0x01;
            }
            body.push(sensors);
            push_u16(&mut body, *log_interval_s);
            custom_parameter(TM_SL900A_SET_LOG_MODE_SUBTYPE, &body)
        }
        VendorVariant::Sl900aGetLogState => {
            custom_parameter(TM_SL900A_GET_LOG_STATE_SUBTYPE, &body)
        }
        VendorVariant::IavActivateSecureMode { payload } => {
            body.extend_from_slice(payload);
            custom_parameter(TM_IAV_ACTIVATE_SECURE_MODE_SUBTYPE, &body)
        }
        VendorVariant::IavObuAuthId { payload } => {
            body.extend_from_slice(payload);
            custom_parameter(TM_IAV_OBU_AUTH_ID_SUBTYPE, &body)
        }
    }
}

/// Map one OpSpec result parameter to the canonical outcome set. Each
/// wire result type has its own code space; the caller only ever sees
/// these eight failure reasons or a success payload.
pub fn decode_result(kind: u16, payload: &[u8]) -> TagOpResult {
    if payload.is_empty() {
        return TagOpResult::Failed(TagOpFailure::ReaderError)
    }
    match kind {
        parameter_types::C1G2_READ_OP_SPEC_RESULT => {
            // result u8, opspec id u16, word count u16, data words
            match payload[0] {
                0 => TagOpResult::Success { data: read_result_data(payload), value: None },
                1 => TagOpResult::Failed(TagOpFailure::TagError),
                2 => TagOpResult::Failed(TagOpFailure::NoResponse),
                3 => TagOpResult::Failed(TagOpFailure::ReaderError),
                4 => TagOpResult::Failed(TagOpFailure::MemoryOverrun),
                5 => TagOpResult::Failed(TagOpFailure::MemoryLocked),
                _ => TagOpResult::Failed(TagOpFailure::TagError),
            }
        }
        parameter_types::C1G2_WRITE_OP_SPEC_RESULT
        | parameter_types::C1G2_BLOCK_WRITE_OP_SPEC_RESULT
        | parameter_types::C1G2_BLOCK_ERASE_OP_SPEC_RESULT => {
            match payload[0] {
                0 => TagOpResult::Success { data: Vec::new(), value: None },
                1 => TagOpResult::Failed(TagOpFailure::MemoryOverrun),
                2 => TagOpResult::Failed(TagOpFailure::MemoryLocked),
                3 => TagOpResult::Failed(TagOpFailure::InsufficientPower),
                4 => TagOpResult::Failed(TagOpFailure::TagError),
                5 => TagOpResult::Failed(TagOpFailure::NoResponse),
                6 => TagOpResult::Failed(TagOpFailure::ReaderError),
                _ => TagOpResult::Failed(TagOpFailure::TagError),
            }
        }
        parameter_types::C1G2_KILL_OP_SPEC_RESULT => match payload[0] {
            0 => TagOpResult::Success { data: Vec::new(), value: None },
            1 => TagOpResult::Failed(TagOpFailure::ZeroKillPassword),
            2 => TagOpResult::Failed(TagOpFailure::InsufficientPower),
            3 => TagOpResult::Failed(TagOpFailure::TagError),
            4 => TagOpResult::Failed(TagOpFailure::NoResponse),
            5 => TagOpResult::Failed(TagOpFailure::ReaderError),
            _ => TagOpResult::Failed(TagOpFailure::TagError),
        },
        parameter_types::C1G2_LOCK_OP_SPEC_RESULT => match payload[0] {
            0 => TagOpResult::Success { data: Vec::new(), value: None },
            1 => TagOpResult::Failed(TagOpFailure::InsufficientPower),
            2 => TagOpResult::Failed(TagOpFailure::TagError),
            3 => TagOpResult::Failed(TagOpFailure::NoResponse),
            4 => TagOpResult::Failed(TagOpFailure::ReaderError),
            _ => TagOpResult::Failed(TagOpFailure::TagError),
        },
        parameter_types::C1G2_BLOCK_PERMALOCK_OP_SPEC_RESULT
        | parameter_types::C1G2_GET_BLOCK_PERMALOCK_STATUS_OP_SPEC_RESULT => match payload[0] {
            0 => TagOpResult::Success { data: read_result_data(payload), value: None },
            1 => TagOpResult::Failed(TagOpFailure::InsufficientPower),
            2 => TagOpResult::Failed(TagOpFailure::TagError),
            3 => TagOpResult::Failed(TagOpFailure::NoResponse),
            4 => TagOpResult::Failed(TagOpFailure::ReaderError),
            5 => TagOpResult::Failed(TagOpFailure::MemoryOverrun),
            _ => TagOpResult::Failed(TagOpFailure::TagError),
        },
        parameter_types::CUSTOM_PARAMETER => decode_custom_result(payload),
        _ => TagOpResult::Failed(TagOpFailure::Unsupported),
    }
}

/// Decode a ThingMagic custom OpSpec result: vendor id, subtype, status
/// byte, then the command's result payload.
pub fn decode_custom_result(payload: &[u8]) -> TagOpResult {
    if payload.len() < 9 {
        return TagOpResult::Failed(TagOpFailure::ReaderError)
    }
    let status = payload[8];
    let data = payload[9..].to_vec();
    match status {
        0 => TagOpResult::Success { data, value: None },
        1 => TagOpResult::Failed(TagOpFailure::NoResponse),
        2 => TagOpResult::Failed(TagOpFailure::TagError),
        3 => TagOpResult::Failed(TagOpFailure::MemoryLocked),
        4 => TagOpResult::Failed(TagOpFailure::MemoryOverrun),
        5 => TagOpResult::Failed(TagOpFailure::InsufficientPower),
        6 => TagOpResult::Failed(TagOpFailure::Unsupported),
        _ => TagOpResult::Failed(TagOpFailure::ReaderError),
    }
}

fn read_result_data(payload: &[u8]) -> Vec<u8> {
    // skip result byte, opspec id, and the word count field
    if payload.len() <= 5 {
        return Vec::new()
    }
    payload[5..].to_vec()
}

/// Parse the reply payload of a vendor getter into its value type. Ops
/// without a structured reply, and replies too short to parse, stay raw.
pub fn parse_vendor_value(op: &TagOp, data: &[u8]) -> Option<VendorValue> {
    let TagOp::Vendor(vendor) = op else {
        return None
    };
    match &vendor.op {
        VendorVariant::Sl900aGetBatteryLevel => {
            parse_battery_level(data).ok().map(VendorValue::BatteryLevel)
        }
        VendorVariant::Sl900aGetSensorValue { .. } => {
            parse_sensor_reading(data).ok().map(VendorValue::SensorReading)
        }
        VendorVariant::Sl900aGetLogState => {
            parse_log_state(data).ok().map(VendorValue::LogState)
        }
        _ => None,
    }
}

pub fn parse_battery_level(data: &[u8]) -> Result<Sl900aBatteryLevel, &'static str> {
    if data.len() < 2 {
        return Err("battery level reply too short")
    }
    Ok(Sl900aBatteryLevel {
        battery_type: (data[0] >> 6) & 0x03,
        value: (u16::from(data[0] & 0x03) << 8) | u16::from(data[1]),
    })
}

pub fn parse_sensor_reading(data: &[u8]) -> Result<Sl900aSensorReading, &'static str> {
    if data.len() < 2 {
        return Err("sensor reply too short")
    }
    Ok(Sl900aSensorReading {
        ad_error: data[0] & 0x80 != 0,
        range_limit: (data[0] >> 2) & 0x1F,
        value: (u16::from(data[0] & 0x03) << 8) | u16::from(data[1]),
    })
}

pub fn parse_log_state(data: &[u8]) -> Result<Sl900aLogState, &'static str> {
    if data.len() < 7 {
        return Err("log state reply too short")
    }
    Ok(Sl900aLogState {
        extreme_lower: data[0],
        lower: data[1],
        upper: data[2],
        extreme_upper: data[3],
        measurement_count: u16::from(data[4]) << 8 | u16::from(data[5]),
        active: data[6] & 0x01 != 0,
    })
}
