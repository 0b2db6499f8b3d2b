use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use serde::Serialize;

use crate::llrp::{self, parameter_types, ParamReader};
use crate::plan::TagProtocol;
use crate::reader::opspec;
use crate::reader::ReadListener;
use crate::tagop::TagOpResult;


/// How long the consumer sleeps on the queue before rechecking its
/// running flag.
const CONSUMER_WAIT_MS: u64 = 100;

/// One normalized tag read handed to listeners or accumulated for a
/// synchronous read call.
#[derive(Debug, Clone, Serialize)]
pub struct TagReadData {
    pub epc: Vec<u8>,
    /// Protocol control word, present when the read was resolved as Gen2.
    pub pc: Option<u16>,
    pub crc: Option<u16>,
    /// None when the originating ROSpec is unknown; the identifier is then
    /// protocol agnostic.
    pub protocol: Option<TagProtocol>,
    pub antenna: u16,
    pub read_count: u32,
    pub rssi: i8,
    pub timestamp_usec: u64,
    pub channel_index: u16,
    pub phase: Option<u16>,
    #[serde(skip)]
    pub op_result: Option<TagOpResult>,
}

impl TagReadData {
    pub fn epc_hex(&self) -> String {
        self.epc.iter().map(|b| format!("{b:02X}")).collect()
    }

    pub fn time(&self) -> Option<DateTime<Utc>> {
        let seconds = (self.timestamp_usec / 1_000_000) as i64;
        let nanos = ((self.timestamp_usec % 1_000_000) * 1_000) as u32;
        Utc.timestamp_opt(seconds, nanos).single()
    }

    /// JSON rendering for log sinks and downstream consumers.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Raw payload of one TagReportData parameter, queued as received.
pub struct RawTagReport {
    pub bytes: Vec<u8>,
}

/// Fields pulled off the wire before protocol resolution.
pub struct DecodedReport {
    pub epc: Vec<u8>,
    pub pc: Option<u16>,
    pub crc: Option<u16>,
    pub antenna: u16,
    pub rssi: i8,
    pub channel_index: u16,
    pub timestamp_usec: u64,
    pub read_count: u32,
    pub rospec_id: u32,
    pub phase: Option<u16>,
    /// OpSpec result parameters: (parameter type, payload bytes).
    pub op_results: Vec<(u16, Vec<u8>)>,
}

/// Split an RO_ACCESS_REPORT payload into its TagReportData parameters.
pub fn split_reports(payload: &[u8]) -> Result<Vec<RawTagReport>, &'static str> {
    let mut out = Vec::new();
    let mut params = ParamReader::new(payload);
    while let Some(param) = params.next_param()? {
        if !param.tv && param.kind == parameter_types::TAG_REPORT_DATA {
            out.push(RawTagReport { bytes: param.data.to_vec() });
        }
    }
    Ok(out)
}

fn is_op_result_param(kind: u16) -> bool {
    matches!(
        kind,
        parameter_types::C1G2_READ_OP_SPEC_RESULT
            | parameter_types::C1G2_WRITE_OP_SPEC_RESULT
            | parameter_types::C1G2_KILL_OP_SPEC_RESULT
            | parameter_types::C1G2_LOCK_OP_SPEC_RESULT
            | parameter_types::C1G2_BLOCK_ERASE_OP_SPEC_RESULT
            | parameter_types::C1G2_BLOCK_WRITE_OP_SPEC_RESULT
            | parameter_types::C1G2_BLOCK_PERMALOCK_OP_SPEC_RESULT
            | parameter_types::C1G2_GET_BLOCK_PERMALOCK_STATUS_OP_SPEC_RESULT
    )
}

/// Decode one TagReportData parameter. Unrecognized sub parameters are
/// skipped; a structurally broken report is an error.
pub fn decode_report(bytes: &[u8]) -> Result<DecodedReport, &'static str> {
    let mut out = DecodedReport {
        epc: Vec::new(),
        pc: None,
        crc: None,
        antenna: 0,
        rssi: 0,
        channel_index: 0,
        timestamp_usec: 0,
        read_count: 0,
        rospec_id: 0,
        phase: None,
        op_results: Vec::new(),
    };
    let mut params = ParamReader::new(bytes);
    while let Some(param) = params.next_param()? {
        if param.tv {
            match param.kind {
                parameter_types::EPC_96 => out.epc = param.data.to_vec(),
                parameter_types::ANTENNA_ID => out.antenna = llrp::read_u16(param.data, 0)?,
                parameter_types::PEAK_RSSI => out.rssi = param.data[0] as i8,
                parameter_types::CHANNEL_INDEX => {
                    out.channel_index = llrp::read_u16(param.data, 0)?
                }
                parameter_types::FIRST_SEEN_TIMESTAMP_UTC => {
                    out.timestamp_usec = llrp::read_u64(param.data, 0)?
                }
                parameter_types::TAG_SEEN_COUNT => {
                    out.read_count = u32::from(llrp::read_u16(param.data, 0)?)
                }
                parameter_types::RO_SPEC_ID => out.rospec_id = llrp::read_u32(param.data, 0)?,
                parameter_types::C1G2_PC => out.pc = Some(llrp::read_u16(param.data, 0)?),
                parameter_types::C1G2_CRC => out.crc = Some(llrp::read_u16(param.data, 0)?),
                _ => (),
            }
            continue;
        }
        match param.kind {
            parameter_types::EPC_DATA => {
                // 16 bit length in bits, then the epc bytes
                let bit_count = usize::from(llrp::read_u16(param.data, 0)?);
                let byte_count = (bit_count + 7) / 8;
                if param.data.len() < 2 + byte_count {
                    return Err("truncated epc data")
                }
                out.epc = param.data[2..2 + byte_count].to_vec();
            }
            parameter_types::CUSTOM_PARAMETER => {
                // ThingMagic rides phase reports and custom op results in
                // custom parameters
                let vendor = llrp::read_u32(param.data, 0)?;
                let subtype = llrp::read_u32(param.data, 4)?;
                if vendor != llrp::requests::THINGMAGIC_VENDOR_ID {
                    continue;
                }
                if subtype == opspec::TM_PHASE_REPORT_SUBTYPE {
                    out.phase = Some(llrp::read_u16(param.data, 8)?);
                } else if subtype == opspec::TM_OP_SPEC_RESULT_SUBTYPE {
                    out.op_results
                        .push((parameter_types::CUSTOM_PARAMETER, param.data.to_vec()));
                }
            }
            kind if is_op_result_param(kind) => {
                out.op_results.push((kind, param.data.to_vec()));
            }
            _ => (),
        }
    }
    Ok(out)
}

/// Turn a decoded report into the normalized record, resolving the
/// protocol through the ROSpec id table built when the specs were
/// submitted. A report whose ROSpec id is not in the table keeps its raw
/// identifier and no protocol; reports from firmware that predates self
/// describing reports land here on purpose.
pub fn normalize(decoded: &DecodedReport, protocols: &HashMap<u32, TagProtocol>) -> TagReadData {
    let protocol = protocols.get(&decoded.rospec_id).copied();
    let (pc, crc) = match protocol {
        Some(TagProtocol::Gen2) => (decoded.pc, decoded.crc),
        _ => (None, None),
    };
    let op_result = decoded
        .op_results
        .first()
        .map(|(kind, payload)| opspec::decode_result(*kind, payload));
    TagReadData {
        epc: decoded.epc.clone(),
        pc,
        crc,
        protocol,
        antenna: decoded.antenna,
        read_count: decoded.read_count,
        rssi: decoded.rssi,
        timestamp_usec: decoded.timestamp_usec,
        channel_index: decoded.channel_index,
        phase: decoded.phase,
        op_result,
    }
}

/// Merge duplicate reads of the same tag, summing their seen counts.
/// `by_antenna` keeps one record per antenna instead of one per tag;
/// `keep_highest_rssi` lets a stronger later read replace the first one.
pub fn deduplicate(
    reads: Vec<TagReadData>,
    by_antenna: bool,
    keep_highest_rssi: bool,
) -> Vec<TagReadData> {
    let mut index: HashMap<(Vec<u8>, Option<u16>), usize> = HashMap::new();
    let mut out: Vec<TagReadData> = Vec::new();
    for read in reads {
        let key = (
            read.epc.clone(),
            if by_antenna { Some(read.antenna) } else { None },
        );
        match index.get(&key) {
            Some(&at) => {
                let merged_count = out[at].read_count + read.read_count;
                if keep_highest_rssi && read.rssi > out[at].rssi {
                    out[at] = read;
                }
                out[at].read_count = merged_count;
            }
            None => {
                index.insert(key, out.len());
                out.push(read);
            }
        }
    }
    out
}

/// Concurrent FIFO between the connection's dispatch thread and the
/// report consumer. Producer appends and notifies, consumer waits or
/// drains under the same mutex.
pub struct ReportQueue {
    inner: Mutex<VecDeque<RawTagReport>>,
    signal: Condvar,
}

impl ReportQueue {
    pub fn new() -> ReportQueue {
        ReportQueue {
            inner: Mutex::new(VecDeque::new()),
            signal: Condvar::new(),
        }
    }

    pub fn push(&self, report: RawTagReport) {
        if let Ok(mut queue) = self.inner.lock() {
            queue.push_back(report);
            self.signal.notify_all();
        }
    }

    /// Pop one report, waiting up to `timeout` for one to arrive.
    pub fn pop_wait(&self, timeout: Duration) -> Option<RawTagReport> {
        let mut queue = match self.inner.lock() {
            Ok(q) => q,
            Err(_) => return None,
        };
        if let Some(report) = queue.pop_front() {
            return Some(report)
        }
        let (mut queue, _) = match self.signal.wait_timeout(queue, timeout) {
            Ok(v) => v,
            Err(_) => return None,
        };
        queue.pop_front()
    }

    pub fn drain(&self) -> Vec<RawTagReport> {
        match self.inner.lock() {
            Ok(mut queue) => queue.drain(..).collect(),
            Err(_) => Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        match self.inner.lock() {
            Ok(queue) => queue.len(),
            Err(_) => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for ReportQueue {
    fn default() -> Self {
        ReportQueue::new()
    }
}

/// Background consumer for one read session. The owning thread calls
/// `start`, which runs until told to stop. A clean stop drains whatever
/// is still queued so no report is silently dropped; `abort` exits
/// without draining.
pub struct TagReportConsumer {
    queue: Arc<ReportQueue>,
    running: Arc<Mutex<bool>>,
    /// Sticky. A stop that lands before the consumer thread reaches
    /// start() must still win, so start() checks this instead of trusting
    /// the running flag alone.
    stop_requested: Arc<Mutex<bool>>,
    drain_on_stop: Arc<Mutex<bool>>,
    protocols: Arc<Mutex<HashMap<u32, TagProtocol>>>,
    accumulator: Arc<Mutex<Vec<TagReadData>>>,
    listeners: Arc<Mutex<Vec<Box<dyn ReadListener>>>>,
    /// Whether batch reads accumulate records in addition to notifying
    /// listeners.
    accumulate: bool,
}

impl TagReportConsumer {
    pub fn new(
        queue: Arc<ReportQueue>,
        protocols: Arc<Mutex<HashMap<u32, TagProtocol>>>,
        accumulator: Arc<Mutex<Vec<TagReadData>>>,
        listeners: Arc<Mutex<Vec<Box<dyn ReadListener>>>>,
        accumulate: bool,
    ) -> TagReportConsumer {
        TagReportConsumer {
            queue,
            running: Arc::new(Mutex::new(false)),
            stop_requested: Arc::new(Mutex::new(false)),
            drain_on_stop: Arc::new(Mutex::new(true)),
            protocols,
            accumulator,
            listeners,
            accumulate,
        }
    }

    pub fn running(&self) -> bool {
        if let Ok(run) = self.running.lock() {
            return *run
        }
        false
    }

    fn stop_requested(&self) -> bool {
        if let Ok(requested) = self.stop_requested.lock() {
            return *requested
        }
        true
    }

    /// Request a clean stop. Already stopped, or not yet started, is a
    /// no-op either way.
    pub fn stop(&self) {
        if let Ok(mut requested) = self.stop_requested.lock() {
            *requested = true;
        }
        if let Ok(mut run) = self.running.lock() {
            *run = false;
        }
        self.queue.signal.notify_all();
    }

    /// Request an immediate stop without draining queued reports.
    pub fn abort(&self) {
        if let Ok(mut drain) = self.drain_on_stop.lock() {
            *drain = false;
        }
        self.stop();
    }

    /// The consumer loop. Runs on the calling thread until stopped. A
    /// stop requested before this point skips straight to the drain.
    pub fn start(&self) {
        if !self.stop_requested() {
            if let Ok(mut run) = self.running.lock() {
                *run = true;
            }
            loop {
                if !self.running() || self.stop_requested() {
                    break;
                }
                if let Some(report) = self.queue.pop_wait(Duration::from_millis(CONSUMER_WAIT_MS)) {
                    self.process(&report);
                }
            }
            if let Ok(mut run) = self.running.lock() {
                *run = false;
            }
        }
        let drain = match self.drain_on_stop.lock() {
            Ok(v) => *v,
            Err(_) => false,
        };
        if drain {
            for report in self.queue.drain() {
                self.process(&report);
            }
        }
    }

    fn process(&self, report: &RawTagReport) {
        let decoded = match decode_report(&report.bytes) {
            Ok(d) => d,
            Err(e) => {
                println!("Error decoding tag report. {e}");
                return
            }
        };
        let protocols = match self.protocols.lock() {
            Ok(p) => p.clone(),
            Err(_) => HashMap::new(),
        };
        let read = normalize(&decoded, &protocols);
        if self.accumulate {
            if let Ok(mut list) = self.accumulator.lock() {
                list.push(read.clone());
            }
        }
        if let Ok(listeners) = self.listeners.lock() {
            for listener in listeners.iter() {
                listener.on_tag_read(&read);
            }
        }
    }
}
