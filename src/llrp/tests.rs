use super::*;
use super::message_types::MessageType;

#[test]
fn test_decode_header() {
    let buf = requests::keepalive_ack(&57);
    let header = decode_header(&buf).unwrap();
    assert_eq!(1, header.version);
    assert_eq!(message_types::KEEPALIVE_ACK, header.kind);
    assert_eq!(10, header.length);
    assert_eq!(57, header.id);
    // reserved bits set
    let bad = [0xE0, 0x3E, 0x00, 0x00, 0x00, 0x0A, 0x00, 0x00, 0x00, 0x01];
    assert!(decode_header(&bad).is_err());
    // short buffer
    assert!(decode_header(&buf[0..6]).is_err());
    // length smaller than a header
    let bad = [0x04, 0x3E, 0x00, 0x00, 0x00, 0x04, 0x00, 0x00, 0x00, 0x01];
    assert!(decode_header(&bad).is_err());
}

#[test]
fn test_message_type_conversions() {
    assert_eq!(MessageType::AddRospec, MessageType::from_code(20).unwrap());
    assert_eq!(20, MessageType::AddRospec.code());
    assert_eq!(MessageType::CustomMessage, MessageType::from_code(1023).unwrap());
    assert!(MessageType::from_code(999).is_err());
    assert!(MessageType::Keepalive.asynchronous());
    assert!(MessageType::RoAccessReport.asynchronous());
    assert!(MessageType::ReaderEventNotification.asynchronous());
    assert!(!MessageType::AddRospecResponse.asynchronous());
}

#[test]
fn test_param_reader_mixed() {
    let mut payload = Vec::new();
    // TV antenna id = 4
    payload.extend(requests::tv(parameter_types::ANTENNA_ID, &[0x00, 0x04]));
    // TLV epc data, 16 bit length field then bytes
    payload.extend(requests::tlv(parameter_types::EPC_DATA, &[0x00, 0x10, 0xAB, 0xCD]));
    let mut reader = ParamReader::new(&payload);
    let first = reader.next_param().unwrap().unwrap();
    assert!(first.tv);
    assert_eq!(parameter_types::ANTENNA_ID, first.kind);
    assert_eq!(4, read_u16(first.data, 0).unwrap());
    let second = reader.next_param().unwrap().unwrap();
    assert!(!second.tv);
    assert_eq!(parameter_types::EPC_DATA, second.kind);
    assert_eq!(&[0x00, 0x10, 0xAB, 0xCD], second.data);
    assert!(reader.next_param().unwrap().is_none());
}

#[test]
fn test_param_reader_truncated() {
    // TLV claiming 12 bytes but only 6 present
    let buf = [0x00, 0xF1, 0x00, 0x0C, 0xAB, 0xCD];
    let mut reader = ParamReader::new(&buf);
    assert!(reader.next_param().is_err());
    // TV without enough value bytes
    let buf = [0x8D, 0x01, 0x02];
    let mut reader = ParamReader::new(&buf);
    assert!(reader.next_param().is_err());
}

#[test]
fn test_parse_status() {
    let desc = "bad parameter";
    let mut body = Vec::new();
    requests::push_u16(&mut body, parameter_types::M_PARAMETER_ERROR);
    requests::push_u16(&mut body, desc.len() as u16);
    body.extend_from_slice(desc.as_bytes());
    let payload = requests::tlv(parameter_types::LLRP_STATUS, &body);
    let status = parse_status(&payload).unwrap();
    assert_eq!(parameter_types::M_PARAMETER_ERROR, status.status);
    assert_eq!(desc, status.description);
    assert!(!status.success());
    // missing status parameter
    let payload = requests::tlv(parameter_types::EPC_DATA, &[0x00, 0x08, 0xFF]);
    assert!(parse_status(&payload).is_err());
}

#[test]
fn test_custom_parameter_layout() {
    let param = requests::custom_parameter(21, &[0x01, 0x02]);
    // 4 header + 4 vendor + 4 subtype + 2 payload
    assert_eq!(14, param.len());
    assert_eq!(parameter_types::CUSTOM_PARAMETER, read_u16(&param, 0).unwrap() & 0x03FF);
    assert_eq!(14, read_u16(&param, 2).unwrap());
    assert_eq!(requests::THINGMAGIC_VENDOR_ID, read_u32(&param, 4).unwrap());
    assert_eq!(21, read_u32(&param, 8).unwrap());
}
