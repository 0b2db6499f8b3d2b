use std::sync::atomic::AtomicU64;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::error::ReaderError;
use crate::filter::TagFilter;
use crate::llrp::requests::{custom_parameter, push_u16, push_u32, tlv, tv};
use crate::llrp::{self, message_types, parameter_types, Message};
use crate::plan::{MultiReadPlan, ReadPlan, SimpleReadPlan, TagProtocol};
use crate::reader::builder::{self, ReadMode, SpecIds, StartTriggerKind};
use crate::reader::config::ReaderSettings;
use crate::reader::keepalive::KeepAliveMonitor;
use crate::reader::lifecycle::ReadLifecycle;
use crate::reader::opspec;
use crate::reader::transport::{LlrpConnection, LlrpEndpoint};
use crate::reader::{ExceptionListener, LlrpReader, TransportListener};
use crate::tagop::vendor::VendorVariant;
use crate::tagop::{
    ChipFamily, Gen2MemoryBank, Gen2Op, TagOp, TagOpFailure, TagOpResult, VendorOp, VendorValue,
};

/// Scripted stand-in for a reader. Every command succeeds unless its
/// ADD_ROSPEC ordinal is listed in `fail_adds`; a START_ROSPEC
/// immediately produces one tag report and the rospec's end event.
/// What the scripted reader embeds in each tag report.
#[derive(Clone, Copy, PartialEq, Eq)]
enum MockOpResult {
    None,
    Gen2Read,
    VendorBattery,
}

struct MockState {
    connected: Mutex<bool>,
    sent: Mutex<Vec<Vec<u8>>>,
    endpoint: Mutex<Option<Arc<dyn LlrpEndpoint>>>,
    msg_id: Mutex<u32>,
    fail_adds: Vec<usize>,
    add_seen: Mutex<usize>,
    report_op_result: MockOpResult,
}

struct MockConnection {
    state: Arc<MockState>,
}

impl MockConnection {
    fn new() -> (MockConnection, Arc<MockState>) {
        MockConnection::scripted(Vec::new(), MockOpResult::None)
    }

    fn scripted(
        fail_adds: Vec<usize>,
        report_op_result: MockOpResult,
    ) -> (MockConnection, Arc<MockState>) {
        let state = Arc::new(MockState {
            connected: Mutex::new(false),
            sent: Mutex::new(Vec::new()),
            endpoint: Mutex::new(None),
            msg_id: Mutex::new(0),
            fail_adds,
            add_seen: Mutex::new(0),
            report_op_result,
        });
        (MockConnection { state: state.clone() }, state)
    }

    fn emit(&self, msg: &Message) {
        let endpoint = self.state.endpoint.lock().unwrap().clone();
        if let Some(endpoint) = endpoint {
            endpoint.on_async_message(msg);
        }
    }

    fn emit_report(&self, rospec_id: u32) {
        let mut data = Vec::new();
        let mut epc = [0x30, 0x00, 0x11, 0x22, 0x33, 0x44, 0x55, 0x66, 0x77, 0x88, 0x99, 0xAA];
        epc[11] = rospec_id as u8;
        data.extend(tv(parameter_types::EPC_96, &epc));
        data.extend(tv(parameter_types::RO_SPEC_ID, &rospec_id.to_be_bytes()));
        data.extend(tv(parameter_types::ANTENNA_ID, &[0x00, 0x01]));
        data.extend(tv(parameter_types::PEAK_RSSI, &[0xC4]));
        match self.state.report_op_result {
            MockOpResult::None => (),
            MockOpResult::Gen2Read => {
                let mut result = vec![0x00];
                push_u16(&mut result, 1);
                push_u16(&mut result, 1);
                result.extend_from_slice(&[0x12, 0x34]);
                data.extend(tlv(parameter_types::C1G2_READ_OP_SPEC_RESULT, &result));
            }
            MockOpResult::VendorBattery => {
                // status byte then the two battery level bytes
                data.extend(custom_parameter(
                    opspec::TM_OP_SPEC_RESULT_SUBTYPE,
                    &[0x00, 0x66, 0x55],
                ));
            }
        }
        let payload = tlv(parameter_types::TAG_REPORT_DATA, &data);
        self.emit(&Message {
            version: 1,
            kind: message_types::RO_ACCESS_REPORT,
            id: 0,
            payload,
        });
    }

    fn emit_end_event(&self, rospec_id: u32) {
        let mut event = vec![0x01];
        push_u32(&mut event, rospec_id);
        push_u32(&mut event, 0);
        let payload = tlv(
            parameter_types::READER_EVENT_NOTIFICATION_DATA,
            &tlv(parameter_types::RO_SPEC_EVENT, &event),
        );
        self.emit(&Message {
            version: 1,
            kind: message_types::READER_EVENT_NOTIFICATION,
            id: 0,
            payload,
        });
    }
}

impl LlrpConnection for MockConnection {
    fn connect(&mut self) -> Result<(), ReaderError> {
        *self.state.connected.lock().unwrap() = true;
        Ok(())
    }

    fn send(&self, buf: &[u8]) -> Result<(), ReaderError> {
        self.state.sent.lock().unwrap().push(buf.to_vec());
        Ok(())
    }

    fn transact(&self, buf: &[u8], _timeout: Duration) -> Result<Message, ReaderError> {
        self.state.sent.lock().unwrap().push(buf.to_vec());
        let header = llrp::decode_header(buf)
            .map_err(|e| ReaderError::Communication(e.to_string()))?;
        let mut refused = false;
        match header.kind {
            message_types::ADD_ROSPEC => {
                let mut seen = self.state.add_seen.lock().unwrap();
                refused = self.state.fail_adds.contains(&*seen);
                *seen += 1;
            }
            message_types::START_ROSPEC => {
                let rospec_id = llrp::read_u32(buf, 10).unwrap();
                self.emit_report(rospec_id);
                self.emit_end_event(rospec_id);
            }
            _ => (),
        }
        let mut status = Vec::new();
        push_u16(
            &mut status,
            if refused { parameter_types::R_DEVICE_ERROR } else { parameter_types::M_SUCCESS },
        );
        push_u16(&mut status, 0);
        Ok(Message {
            version: 1,
            kind: header.kind,
            id: header.id,
            payload: tlv(parameter_types::LLRP_STATUS, &status),
        })
    }

    fn set_endpoint(&mut self, endpoint: Arc<dyn LlrpEndpoint>) {
        *self.state.endpoint.lock().unwrap() = Some(endpoint);
    }

    fn add_transport_listener(&mut self, _listener: Box<dyn TransportListener>) {}

    fn next_id(&self) -> u32 {
        let mut id = self.state.msg_id.lock().unwrap();
        *id += 1;
        *id
    }

    fn is_connected(&self) -> bool {
        *self.state.connected.lock().unwrap()
    }

    fn disconnect(&mut self) {
        *self.state.connected.lock().unwrap() = false;
    }
}

struct RecordingExceptions {
    errors: Mutex<Vec<String>>,
}

impl ExceptionListener for RecordingExceptions {
    fn on_reader_exception(&self, err: &ReaderError) {
        self.errors.lock().unwrap().push(err.to_string());
    }
}

fn sent_kinds(state: &MockState) -> Vec<u16> {
    state
        .sent
        .lock()
        .unwrap()
        .iter()
        .filter_map(|msg| llrp::decode_header(msg).ok())
        .map(|h| h.kind)
        .collect()
}

fn sent_rospec_ids(state: &MockState, kind: u16) -> Vec<u32> {
    // ADD_ROSPEC nests the id inside the ROSpec parameter; the other
    // rospec commands carry it right after the message header
    let offset = if kind == message_types::ADD_ROSPEC { 14 } else { 10 };
    state
        .sent
        .lock()
        .unwrap()
        .iter()
        .filter(|msg| llrp::decode_header(msg).map(|h| h.kind).ok() == Some(kind))
        .map(|msg| llrp::read_u32(msg, offset).unwrap())
        .collect()
}

fn three_leaf_plan() -> ReadPlan {
    ReadPlan::Multi(MultiReadPlan {
        plans: vec![
            ReadPlan::Simple(SimpleReadPlan::new(TagProtocol::Gen2)),
            ReadPlan::Simple(SimpleReadPlan::new(TagProtocol::Gen2)),
            ReadPlan::Simple(SimpleReadPlan::new(TagProtocol::Gen2)),
        ],
    })
}

#[test]
fn test_read_assigns_sequential_rospec_ids() {
    let (connection, state) = MockConnection::new();
    let mut reader = LlrpReader::with_connection(Box::new(connection));
    reader.connect().unwrap();
    reader.set_read_plan(three_leaf_plan()).unwrap();
    let reads = reader.read(300).unwrap();
    assert_eq!(3, reads.len());
    // one ADD per leaf, ids handed out from one counter starting at 1
    assert_eq!(vec![1, 2, 3], sent_rospec_ids(&state, message_types::ADD_ROSPEC));
    // a fresh top level call restarts the counter
    let reads = reader.read(300).unwrap();
    assert_eq!(3, reads.len());
    assert_eq!(
        vec![1, 2, 3, 1, 2, 3],
        sent_rospec_ids(&state, message_types::ADD_ROSPEC)
    );
    reader.disconnect();
}

#[test]
fn test_read_partial_failure_keeps_siblings() {
    // the second leaf's ADD_ROSPEC is refused by the reader
    let (connection, state) = MockConnection::scripted(vec![1], MockOpResult::None);
    let mut reader = LlrpReader::with_connection(Box::new(connection));
    let errors = Arc::new(RecordingExceptions { errors: Mutex::new(Vec::new()) });
    reader.add_exception_listener(errors.clone());
    reader.connect().unwrap();
    reader.set_read_plan(three_leaf_plan()).unwrap();
    let reads = reader.read(300).unwrap();
    // leaves one and three still ran and reported
    assert_eq!(2, reads.len());
    assert_eq!(vec![1, 3], sent_rospec_ids(&state, message_types::START_ROSPEC));
    // the failed leaf surfaced on the exception listener, once
    assert_eq!(1, errors.errors.lock().unwrap().len());
    reader.disconnect();
}

#[test]
fn test_read_requires_connection() {
    let (connection, _state) = MockConnection::new();
    let mut reader = LlrpReader::with_connection(Box::new(connection));
    assert!(matches!(reader.read(100), Err(ReaderError::ConnectionLost)));
}

#[test]
fn test_execute_tag_op_returns_data() {
    let (connection, state) = MockConnection::scripted(Vec::new(), MockOpResult::Gen2Read);
    let mut reader = LlrpReader::with_connection(Box::new(connection));
    reader.connect().unwrap();
    let op = TagOp::Gen2(Gen2Op::ReadData {
        bank: Gen2MemoryBank::User,
        word_address: 0,
        word_count: 1,
        access_password: None,
    });
    let result = reader.execute_tag_op(&op, None).unwrap();
    assert_eq!(TagOpResult::Success { data: vec![0x12, 0x34], value: None }, result);
    // a standalone op submits an access spec alongside its rospec
    let kinds = sent_kinds(&state);
    assert!(kinds.contains(&message_types::ADD_ACCESS_SPEC));
    assert!(kinds.contains(&message_types::ENABLE_ACCESS_SPEC));
    reader.disconnect();
}

#[test]
fn test_execute_tag_op_surfaces_submission_error() {
    // the op's ADD_ROSPEC is refused by the reader
    let (connection, _state) = MockConnection::scripted(vec![0], MockOpResult::None);
    let mut reader = LlrpReader::with_connection(Box::new(connection));
    let errors = Arc::new(RecordingExceptions { errors: Mutex::new(Vec::new()) });
    reader.add_exception_listener(errors.clone());
    reader.connect().unwrap();
    let op = TagOp::Gen2(Gen2Op::ReadData {
        bank: Gen2MemoryBank::User,
        word_address: 0,
        word_count: 1,
        access_password: None,
    });
    // the caller gets the refusal itself, not a placeholder
    match reader.execute_tag_op(&op, None).unwrap_err() {
        ReaderError::Protocol { status, message } => {
            assert_eq!(parameter_types::R_DEVICE_ERROR, status);
            // no description on the wire falls back to the status name
            assert_eq!("R_DEVICE_ERROR", message);
        }
        other => panic!("unexpected error {other}"),
    }
    // exception listeners are for session reads, a standalone op stays quiet
    assert!(errors.errors.lock().unwrap().is_empty());
    reader.disconnect();
}

#[test]
fn test_execute_tag_op_rejects_reentry() {
    let (connection, _state) = MockConnection::new();
    let mut lifecycle = ReadLifecycle::new(Box::new(connection));
    lifecycle.connect().unwrap();
    lifecycle.set_op_active(true);
    let op = TagOp::Gen2(Gen2Op::ReadData {
        bank: Gen2MemoryBank::User,
        word_address: 0,
        word_count: 1,
        access_password: None,
    });
    let err = lifecycle.execute_tag_op(&op, None).unwrap_err();
    assert!(matches!(err, ReaderError::InvalidArgument(_)));
    // releasing the guard lets the operation through again
    lifecycle.set_op_active(false);
    let result = lifecycle.execute_tag_op(&op, None);
    assert!(matches!(result, Err(ReaderError::TagOp(TagOpFailure::NoResponse))));
    lifecycle.disconnect();
}

#[test]
fn test_memory_overrun_is_canonical_across_result_types() {
    // three different wire code spaces, one outcome
    let read_payload = [0x04, 0x00, 0x01, 0x00, 0x00];
    let write_payload = [0x01, 0x00, 0x01, 0x00, 0x00];
    let permalock_payload = [0x05, 0x00, 0x01];
    for (kind, payload) in [
        (parameter_types::C1G2_READ_OP_SPEC_RESULT, &read_payload[..]),
        (parameter_types::C1G2_WRITE_OP_SPEC_RESULT, &write_payload[..]),
        (parameter_types::C1G2_BLOCK_PERMALOCK_OP_SPEC_RESULT, &permalock_payload[..]),
    ] {
        assert_eq!(
            TagOpResult::Failed(TagOpFailure::MemoryOverrun),
            opspec::decode_result(kind, payload),
        );
    }
}

#[test]
fn test_kill_zero_password_rejected_at_encode() {
    let op = TagOp::Gen2(Gen2Op::Kill { kill_password: 0 });
    let err = opspec::encode(1, &op, 0).unwrap_err();
    assert!(matches!(err, ReaderError::TagOp(TagOpFailure::ZeroKillPassword)));
}

#[test]
fn test_keepalive_watchdog_fires_once() {
    let listeners: Arc<Mutex<Vec<Arc<dyn ExceptionListener + Sync>>>> =
        Arc::new(Mutex::new(Vec::new()));
    let errors = Arc::new(RecordingExceptions { errors: Mutex::new(Vec::new()) });
    listeners.lock().unwrap().push(errors.clone());
    let stamp = Arc::new(AtomicU64::new(0));
    let monitor = KeepAliveMonitor::new(5000, stamp, listeners);
    let start = 1_000_000;
    monitor.touch(start);
    // exactly four missed periods is still inside the allowance
    assert!(!monitor.check(start + 4 * 5000));
    assert!(errors.errors.lock().unwrap().is_empty());
    // one past the allowance declares the loss
    assert!(monitor.check(start + 4 * 5000 + 1));
    assert!(monitor.is_lost());
    assert_eq!(1, errors.errors.lock().unwrap().len());
    // later passes stay quiet
    assert!(!monitor.check(start + 10 * 5000));
    assert_eq!(1, errors.errors.lock().unwrap().len());
}

#[test]
fn test_keepalive_recovers_before_deadline() {
    let listeners: Arc<Mutex<Vec<Arc<dyn ExceptionListener + Sync>>>> =
        Arc::new(Mutex::new(Vec::new()));
    let stamp = Arc::new(AtomicU64::new(0));
    let monitor = KeepAliveMonitor::new(5000, stamp, listeners);
    monitor.touch(1_000_000);
    monitor.touch(1_018_000);
    assert!(!monitor.check(1_021_000));
    assert!(!monitor.is_lost());
}

#[test]
fn test_build_spec_trigger_policy() {
    let settings = ReaderSettings::default();
    let plan = SimpleReadPlan::new(TagProtocol::Gen2);
    let mut ids = SpecIds::new();
    let bounded = builder::build_spec(&mut ids, &plan, 250, ReadMode::Bounded, true, false, &settings)
        .unwrap();
    assert_eq!(StartTriggerKind::Null, bounded.start_trigger);
    let mut ids = SpecIds::new();
    let single = builder::build_spec(&mut ids, &plan, 0, ReadMode::Continuous, false, false, &settings)
        .unwrap();
    assert_eq!(StartTriggerKind::Null, single.start_trigger);
    let mut ids = SpecIds::new();
    let multi = builder::build_spec(&mut ids, &plan, 0, ReadMode::Continuous, true, false, &settings)
        .unwrap();
    assert_eq!(StartTriggerKind::Periodic, multi.start_trigger);
}

#[test]
fn test_build_spec_wire_shape() {
    let settings = ReaderSettings::default();
    let mut plan = SimpleReadPlan::new(TagProtocol::Gen2);
    plan.antennas = vec![1, 2];
    let mut ids = SpecIds::new();
    let built = builder::build_spec(&mut ids, &plan, 100, ReadMode::Bounded, false, false, &settings)
        .unwrap();
    let mut params = llrp::ParamReader::new(&built.rospec);
    let rospec = params.next_param().unwrap().unwrap();
    assert_eq!(parameter_types::RO_SPEC, rospec.kind);
    assert_eq!(1, llrp::read_u32(rospec.data, 0).unwrap());
    // boundary, ai and report specs follow the id, priority and state
    let mut inner = llrp::ParamReader::new(&rospec.data[6..]);
    let boundary = inner.next_param().unwrap().unwrap();
    assert_eq!(parameter_types::RO_BOUNDARY_SPEC, boundary.kind);
    let ai = inner.next_param().unwrap().unwrap();
    assert_eq!(parameter_types::AI_SPEC, ai.kind);
    assert_eq!(2, llrp::read_u16(ai.data, 0).unwrap());
    assert_eq!(1, llrp::read_u16(ai.data, 2).unwrap());
    assert_eq!(2, llrp::read_u16(ai.data, 4).unwrap());
    let report = inner.next_param().unwrap().unwrap();
    assert_eq!(parameter_types::RO_REPORT_SPEC, report.kind);
    assert!(built.access_spec.is_none());
}

/// Digs the C1G2InventoryCommand payload out of a built ROSpec.
fn inventory_command(rospec: &[u8]) -> Vec<u8> {
    let mut params = llrp::ParamReader::new(rospec);
    let rospec = params.next_param().unwrap().unwrap();
    let mut inner = llrp::ParamReader::new(&rospec.data[6..]);
    loop {
        let param = inner.next_param().unwrap().unwrap();
        if param.kind != parameter_types::AI_SPEC {
            continue
        }
        let antennas = llrp::read_u16(param.data, 0).unwrap() as usize;
        let mut ai = llrp::ParamReader::new(&param.data[2 + antennas * 2..]);
        loop {
            let param = ai.next_param().unwrap().unwrap();
            if param.kind != parameter_types::INVENTORY_PARAMETER_SPEC {
                continue
            }
            // u16 spec id and the protocol byte precede the antenna config
            let mut spec = llrp::ParamReader::new(&param.data[3..]);
            let config = spec.next_param().unwrap().unwrap();
            assert_eq!(parameter_types::ANTENNA_CONFIGURATION, config.kind);
            let mut config = llrp::ParamReader::new(&config.data[2..]);
            let command = config.next_param().unwrap().unwrap();
            assert_eq!(parameter_types::C1G2_INVENTORY_COMMAND, command.kind);
            return command.data.to_vec()
        }
    }
}

fn find_command_param(command: &[u8], kind: u16) -> Option<Vec<u8>> {
    // skip the state aware flag byte
    let mut params = llrp::ParamReader::new(&command[1..]);
    while let Ok(Some(param)) = params.next_param() {
        if param.kind == kind {
            return Some(param.data.to_vec())
        }
    }
    None
}

#[test]
fn test_build_spec_rf_control_follows_profile() {
    let mut settings = ReaderSettings::default();
    let plan = SimpleReadPlan::new(TagProtocol::Gen2);

    let mut ids = SpecIds::new();
    let built = builder::build_spec(&mut ids, &plan, 100, ReadMode::Bounded, false, false, &settings)
        .unwrap();
    let command = inventory_command(&built.rospec);
    assert!(find_command_param(&command, parameter_types::C1G2_RF_CONTROL).is_none());

    settings.link_frequency_khz = Some(640);
    settings.tari_ns = Some(6250);
    let mut ids = SpecIds::new();
    let built = builder::build_spec(&mut ids, &plan, 100, ReadMode::Bounded, false, false, &settings)
        .unwrap();
    let command = inventory_command(&built.rospec);
    let rf = find_command_param(&command, parameter_types::C1G2_RF_CONTROL).unwrap();
    assert_eq!(1, llrp::read_u16(&rf, 0).unwrap());
    assert_eq!(6250, llrp::read_u16(&rf, 2).unwrap());
}

#[test]
fn test_build_spec_empty_antennas_uses_sentinel() {
    let settings = ReaderSettings::default();
    let plan = SimpleReadPlan::new(TagProtocol::Gen2);
    let mut ids = SpecIds::new();
    let built = builder::build_spec(&mut ids, &plan, 100, ReadMode::Bounded, false, false, &settings)
        .unwrap();
    let mut params = llrp::ParamReader::new(&built.rospec);
    let rospec = params.next_param().unwrap().unwrap();
    let mut inner = llrp::ParamReader::new(&rospec.data[6..]);
    inner.next_param().unwrap();
    let ai = inner.next_param().unwrap().unwrap();
    // count one, antenna id zero means every antenna
    assert_eq!(1, llrp::read_u16(ai.data, 0).unwrap());
    assert_eq!(0, llrp::read_u16(ai.data, 2).unwrap());
}

#[test]
fn test_build_spec_standalone_op_stops_after_one() {
    let settings = ReaderSettings::default();
    let mut plan = SimpleReadPlan::new(TagProtocol::Gen2);
    plan.op = Some(TagOp::Gen2(Gen2Op::ReadData {
        bank: Gen2MemoryBank::User,
        word_address: 0,
        word_count: 2,
        access_password: None,
    }));
    let mut ids = SpecIds::new();
    let built = builder::build_spec(&mut ids, &plan, 100, ReadMode::Bounded, false, true, &settings)
        .unwrap();
    let (access_spec_id, body) = built.access_spec.expect("op plan builds an access spec");
    assert_eq!(1, access_spec_id);
    let mut params = llrp::ParamReader::new(&body);
    let access = params.next_param().unwrap().unwrap();
    assert_eq!(parameter_types::ACCESS_SPEC, access.kind);
    // fixed fields then the stop trigger with an operation count of one
    let mut inner = llrp::ParamReader::new(&access.data[12..]);
    let stop = inner.next_param().unwrap().unwrap();
    assert_eq!(parameter_types::ACCESS_SPEC_STOP_TRIGGER, stop.kind);
    assert_eq!(0x01, stop.data[0]);
    assert_eq!(1, llrp::read_u16(stop.data, 1).unwrap());
}

#[test]
fn test_build_spec_embedded_op_has_null_stop() {
    let settings = ReaderSettings::default();
    let mut plan = SimpleReadPlan::new(TagProtocol::Gen2);
    plan.op = Some(TagOp::Gen2(Gen2Op::ReadData {
        bank: Gen2MemoryBank::Tid,
        word_address: 0,
        word_count: 4,
        access_password: None,
    }));
    let mut ids = SpecIds::new();
    let built = builder::build_spec(&mut ids, &plan, 100, ReadMode::Bounded, false, false, &settings)
        .unwrap();
    let (_, body) = built.access_spec.unwrap();
    let mut params = llrp::ParamReader::new(&body);
    let access = params.next_param().unwrap().unwrap();
    let mut inner = llrp::ParamReader::new(&access.data[12..]);
    let stop = inner.next_param().unwrap().unwrap();
    assert_eq!(0x00, stop.data[0]);
}

#[test]
fn test_iso6b_filter_rejects_gen2_banks() {
    let settings = ReaderSettings::default();
    let mut plan = SimpleReadPlan::new(TagProtocol::Iso18k6b);
    plan.filter = Some(TagFilter::Select {
        bank: Gen2MemoryBank::Tid,
        bit_pointer: 0,
        bit_length: 8,
        mask: vec![0xFF],
        invert: false,
    });
    let mut ids = SpecIds::new();
    let err = builder::build_spec(&mut ids, &plan, 100, ReadMode::Bounded, false, false, &settings)
        .unwrap_err();
    assert!(matches!(err, ReaderError::Unsupported(_)));
}

#[test]
fn test_phase_support_follows_firmware_version() {
    assert!(builder::phase_supported("5.3.2.97"));
    assert!(builder::phase_supported("6.0.1.2"));
    assert!(!builder::phase_supported("5.1.7.44"));
    assert!(!builder::phase_supported("4.31.0.3"));
    assert!(!builder::phase_supported("unknown"));
    assert!(!builder::phase_supported(""));
    assert_eq!(Some((5, 3)), builder::parse_firmware("5.3.2.97"));
    assert_eq!(None, builder::parse_firmware("5"));
}

#[test]
fn test_settings_validation() {
    let mut settings = ReaderSettings::default();
    assert!(settings.validate().is_ok());
    settings.read_power_cdbm = 900;
    assert!(settings.validate().is_err());
    settings.read_power_cdbm = 3000;
    settings.session = 4;
    assert!(settings.validate().is_err());
    settings.session = 2;
    settings.static_q = Some(16);
    assert!(settings.validate().is_err());
    settings.static_q = Some(4);
    settings.keepalive_interval_ms = 0;
    assert!(settings.validate().is_err());
}

#[test]
fn test_vendor_op_attaches_parsed_value() {
    let (connection, _state) = MockConnection::scripted(Vec::new(), MockOpResult::VendorBattery);
    let mut reader = LlrpReader::with_connection(Box::new(connection));
    reader.connect().unwrap();
    let op = TagOp::Vendor(VendorOp {
        chip: ChipFamily::IdsSl900a,
        op: VendorVariant::Sl900aGetBatteryLevel,
        access_password: None,
    });
    let result = reader.execute_tag_op(&op, None).unwrap();
    match result {
        TagOpResult::Success { data, value } => {
            assert_eq!(vec![0x66, 0x55], data);
            let Some(VendorValue::BatteryLevel(level)) = value else {
                panic!("battery reply was not parsed");
            };
            assert_eq!(1, level.battery_type);
            assert_eq!(0x255, level.value);
        }
        other => panic!("unexpected result {other:?}"),
    }
    reader.disconnect();
}

#[test]
fn test_vendor_op_rejects_wrong_chip_family() {
    let op = TagOp::Vendor(VendorOp {
        chip: ChipFamily::NxpG2,
        op: VendorVariant::Sl900aGetBatteryLevel,
        access_password: None,
    });
    let err = opspec::encode(1, &op, 0).unwrap_err();
    assert!(matches!(err, ReaderError::InvalidArgument(_)));
}

#[test]
fn test_sl900a_battery_level() {
    let level = opspec::parse_battery_level(&[0x66, 0x55]).unwrap();
    assert_eq!(1, level.battery_type);
    assert_eq!(0x255, level.value);
    assert!(opspec::parse_battery_level(&[0x01]).is_err());
}

#[test]
fn test_sl900a_sensor_reading() {
    let reading = opspec::parse_sensor_reading(&[0x8A, 0xFF]).unwrap();
    assert!(reading.ad_error);
    assert_eq!(2, reading.range_limit);
    assert_eq!(0x2FF, reading.value);
}

#[test]
fn test_sl900a_log_state() {
    let state = opspec::parse_log_state(&[1, 2, 3, 4, 0x01, 0x10, 0x01]).unwrap();
    assert_eq!(1, state.extreme_lower);
    assert_eq!(4, state.extreme_upper);
    assert_eq!(0x0110, state.measurement_count);
    assert!(state.active);
}
