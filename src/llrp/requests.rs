use super::{message_types, parameter_types};

/// ThingMagic's IANA private enterprise number, used for every vendor
/// custom message and parameter.
pub const THINGMAGIC_VENDOR_ID: u32 = 25882;

/// Deleting with id zero targets every spec on the reader.
pub const ALL_SPECS: u32 = 0;

/// Frame a complete message: 10 byte header (version 1) plus payload.
pub fn message(kind: u16, id: &u32, payload: &[u8]) -> Vec<u8> {
    let header: u16 = (1 << 10) + kind;
    let length: u32 = (payload.len() + 10) as u32;
    let mut out = Vec::with_capacity(payload.len() + 10);
    out.push(((header & 0xFF00) >> 8) as u8);
    out.push((header & 0x00FF) as u8);
    push_u32(&mut out, length);
    push_u32(&mut out, *id);
    out.extend_from_slice(payload);
    out
}

/// A TLV parameter: 10 bit type, 16 bit overall length, then the value.
pub fn tlv(kind: u16, value: &[u8]) -> Vec<u8> {
    let length: u16 = (value.len() + 4) as u16;
    let mut out = Vec::with_capacity(value.len() + 4);
    out.push(((kind & 0x0300) >> 8) as u8);
    out.push((kind & 0x00FF) as u8);
    out.push(((length & 0xFF00) >> 8) as u8);
    out.push((length & 0x00FF) as u8);
    out.extend_from_slice(value);
    out
}

/// A TV parameter: high bit set on the type byte, fixed size value.
pub fn tv(kind: u16, value: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(value.len() + 1);
    out.push(0x80 | (kind & 0x7F) as u8);
    out.extend_from_slice(value);
    out
}

/// A vendor custom parameter: vendor id then subtype then the payload.
pub fn custom_parameter(subtype: u32, value: &[u8]) -> Vec<u8> {
    let mut body = Vec::with_capacity(value.len() + 8);
    push_u32(&mut body, THINGMAGIC_VENDOR_ID);
    push_u32(&mut body, subtype);
    body.extend_from_slice(value);
    tlv(parameter_types::CUSTOM_PARAMETER, &body)
}

pub fn push_u16(out: &mut Vec<u8>, v: u16) {
    out.push(((v & 0xFF00) >> 8) as u8);
    out.push((v & 0x00FF) as u8);
}

pub fn push_u32(out: &mut Vec<u8>, v: u32) {
    out.push(((v & 0xFF000000) >> 24) as u8);
    out.push(((v & 0x00FF0000) >> 16) as u8);
    out.push(((v & 0x0000FF00) >> 8) as u8);
    out.push((v & 0x000000FF) as u8);
}

pub fn push_u64(out: &mut Vec<u8>, v: u64) {
    push_u32(out, ((v & 0xFFFFFFFF00000000) >> 32) as u32);
    push_u32(out, (v & 0x00000000FFFFFFFF) as u32);
}

pub fn add_rospec(id: &u32, rospec: &[u8]) -> Vec<u8> {
    message(message_types::ADD_ROSPEC, id, rospec)
}

pub fn delete_rospec(id: &u32, rospec_id: &u32) -> [u8; 14] {
    len_14(message_types::DELETE_ROSPEC, id, rospec_id)
}

pub fn start_rospec(id: &u32, rospec_id: &u32) -> [u8; 14] {
    len_14(message_types::START_ROSPEC, id, rospec_id)
}

pub fn stop_rospec(id: &u32, rospec_id: &u32) -> [u8; 14] {
    len_14(message_types::STOP_ROSPEC, id, rospec_id)
}

pub fn enable_rospec(id: &u32, rospec_id: &u32) -> [u8; 14] {
    len_14(message_types::ENABLE_ROSPEC, id, rospec_id)
}

pub fn disable_rospec(id: &u32, rospec_id: &u32) -> [u8; 14] {
    len_14(message_types::DISABLE_ROSPEC, id, rospec_id)
}

pub fn add_access_spec(id: &u32, access_spec: &[u8]) -> Vec<u8> {
    message(message_types::ADD_ACCESS_SPEC, id, access_spec)
}

pub fn delete_access_spec(id: &u32, as_id: &u32) -> [u8; 14] {
    len_14(message_types::DELETE_ACCESS_SPEC, id, as_id)
}

pub fn enable_access_spec(id: &u32, as_id: &u32) -> [u8; 14] {
    len_14(message_types::ENABLE_ACCESS_SPEC, id, as_id)
}

pub fn close_connection(id: &u32) -> [u8; 10] {
    len_10(message_types::CLOSE_CONNECTION, id)
}

pub fn keepalive_ack(id: &u32) -> [u8; 10] {
    len_10(message_types::KEEPALIVE_ACK, id)
}

pub fn enable_events_and_reports(id: &u32) -> [u8; 10] {
    len_10(message_types::ENABLE_EVENTS_AND_REPORTS, id)
}

/// SET_READER_CONFIG carrying a periodic KeepaliveSpec.
pub fn set_keepalive(id: &u32, interval_ms: &u32) -> Vec<u8> {
    let mut spec = Vec::with_capacity(5);
    // keepalive trigger type - periodic
    spec.push(0x01);
    push_u32(&mut spec, *interval_ms);
    let mut payload = vec![
        // Don't restore factory defaults
        0x00,
    ];
    payload.extend(tlv(parameter_types::KEEPALIVE_SPEC, &spec));
    message(message_types::SET_READER_CONFIG, id, &payload)
}

/// SET_READER_CONFIG subscribing to ROSpec, buffer warning and reader
/// exception events, and releasing held events and reports.
pub fn set_event_notifications(id: &u32) -> Vec<u8> {
    let mut states = Vec::new();
    // event types: 2 ROSpec event, 3 report buffer fill warning,
    // 4 reader exception event
    for event_type in [2u16, 3u16, 4u16] {
        let mut state = Vec::with_capacity(3);
        push_u16(&mut state, event_type);
        // notification state: yes
        state.push(0x80);
        states.extend(tlv(parameter_types::EVENT_NOTIFICATION_STATE, &state));
    }
    let mut payload = vec![
        // Don't restore factory defaults
        0x00,
    ];
    payload.extend(tlv(parameter_types::READER_EVENT_NOTIFICATION_SPEC, &states));
    // hold events and reports upon reconnect: no
    payload.extend(tlv(parameter_types::EVENTS_AND_REPORTS, &[0x00]));
    message(message_types::SET_READER_CONFIG, id, &payload)
}

fn len_14(kind: u16, id: &u32, s_id: &u32) -> [u8; 14] {
    let header: u16 = (1 << 10) + kind;
    [
        // convert 16 bits to two 8 bit unsigned ints
        ((header & 0xFF00) >> 8) as u8,
        (header & 0x00FF) as u8,
        // length of 14 (0x0e)
        0x00, 0x00, 0x00, 0x0E,
        // convert id from 32 bits to four bytes
        ((id & 0xFF000000) >> 24) as u8,
        ((id & 0x00FF0000) >> 16) as u8,
        ((id & 0x0000FF00) >> 8) as u8,
        (id & 0x000000FF) as u8,
        // convert spec id from 32 bits to four bytes
        ((s_id & 0xFF000000) >> 24) as u8,
        ((s_id & 0x00FF0000) >> 16) as u8,
        ((s_id & 0x0000FF00) >> 8) as u8,
        (s_id & 0x000000FF) as u8,
    ]
}

fn len_10(kind: u16, id: &u32) -> [u8; 10] {
    let header: u16 = (1 << 10) + kind;
    [
        // convert 16 bits to two 8 bit unsigned ints
        ((header & 0xFF00) >> 8) as u8,
        (header & 0x00FF) as u8,
        // length of 10 (0x0a)
        0x00, 0x00, 0x00, 0x0A,
        // convert id from 32 bits to four bytes
        ((id & 0xFF000000) >> 24) as u8,
        ((id & 0x00FF0000) >> 16) as u8,
        ((id & 0x0000FF00) >> 8) as u8,
        (id & 0x000000FF) as u8,
    ]
}
