use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::error::ReaderError;
use crate::filter::TagFilter;
use crate::llrp::{self, message_types, parameter_types, requests, Message, ParamReader};
use crate::plan::{ReadPlan, SimpleReadPlan, TagProtocol};
use crate::report::{self, ReportQueue, TagReadData, TagReportConsumer};
use crate::reader::builder::{self, BuiltSpec, ReadMode, SpecIds, StartTriggerKind};
use crate::reader::config::{self, ReaderSettings};
use crate::reader::keepalive::{now_ms, KeepAliveMonitor};
use crate::reader::opspec;
use crate::reader::transport::{LlrpConnection, LlrpEndpoint};
use crate::reader::{ExceptionListener, ReadListener, TransportListener};
use crate::tagop::{TagOp, TagOpFailure, TagOpResult};

/// Deleting orphaned specs can stall firmware that is mid inventory.
const CLEANUP_TIMEOUT: Duration = Duration::from_secs(10);
/// Completion flag polling cadence.
const POLL_MS: u64 = 50;
/// Allowance past the requested duration before a bounded read gives up
/// waiting for end events.
const READ_GRACE_MS: u64 = 5000;
/// Inventory window granted to a standalone tag operation.
const TAG_OP_WINDOW_MS: u32 = 1000;

/// One submitted spec pair that will need tearing down.
struct ActiveSpec {
    rospec_id: u32,
    access_spec_id: Option<u32>,
    start_trigger: StartTriggerKind,
}

/// Handles the reader initiated traffic on the connection's read thread.
/// Reports are queued for the consumer, keepalives stamp the watchdog
/// clock, and rospec end events flip the completion flags the calling
/// thread polls.
struct EventDispatcher {
    queue: Arc<ReportQueue>,
    flags: Arc<Mutex<Vec<bool>>>,
    keepalive_stamp: Arc<AtomicU64>,
    exception_listeners: Arc<Mutex<Vec<Arc<dyn ExceptionListener + Sync>>>>,
}

impl LlrpEndpoint for EventDispatcher {
    fn on_async_message(&self, msg: &Message) {
        match msg.kind {
            message_types::RO_ACCESS_REPORT => match report::split_reports(&msg.payload) {
                Ok(reports) => {
                    for tag_report in reports {
                        self.queue.push(tag_report);
                    }
                }
                Err(e) => println!("Error splitting tag report message. {e}"),
            },
            message_types::KEEPALIVE => {
                self.keepalive_stamp.store(now_ms(), Ordering::Relaxed);
            }
            message_types::READER_EVENT_NOTIFICATION => self.handle_events(&msg.payload),
            _ => (),
        }
    }
}

impl EventDispatcher {
    fn handle_events(&self, payload: &[u8]) {
        let mut params = ParamReader::new(payload);
        while let Ok(Some(param)) = params.next_param() {
            if param.tv || param.kind != parameter_types::READER_EVENT_NOTIFICATION_DATA {
                continue;
            }
            let mut events = ParamReader::new(param.data);
            while let Ok(Some(event)) = events.next_param() {
                if event.tv {
                    continue;
                }
                match event.kind {
                    parameter_types::RO_SPEC_EVENT => {
                        // event type u8, 1 is end of rospec, then rospec id
                        if event.data.first() == Some(&0x01) {
                            if let Ok(rospec_id) = llrp::read_u32(event.data, 1) {
                                self.mark_complete(rospec_id);
                            }
                        }
                    }
                    parameter_types::AI_SPEC_EVENT => {
                        // the only event type is end of aispec; a rospec
                        // holds one aispec so the rospec is done with it
                        if let Ok(rospec_id) = llrp::read_u32(event.data, 1) {
                            self.mark_complete(rospec_id);
                        }
                    }
                    parameter_types::READER_EXCEPTION_EVENT => {
                        let message = match llrp::read_u16(event.data, 0) {
                            Ok(len) if event.data.len() >= 2 + usize::from(len) => {
                                String::from_utf8_lossy(&event.data[2..2 + usize::from(len)])
                                    .to_string()
                            }
                            _ => String::from("reader exception"),
                        };
                        println!("Reader exception event: {message}");
                        self.broadcast(&ReaderError::Communication(message));
                    }
                    _ => (),
                }
            }
        }
    }

    fn mark_complete(&self, rospec_id: u32) {
        if let Ok(mut flags) = self.flags.lock() {
            let idx = rospec_id as usize;
            if idx >= 1 && idx <= flags.len() {
                flags[idx - 1] = true;
            }
        }
    }

    fn broadcast(&self, err: &ReaderError) {
        if let Ok(list) = self.exception_listeners.lock() {
            for listener in list.iter() {
                listener.on_reader_exception(err);
            }
        }
    }
}

/// Drives the whole read operation lifecycle over one connection: spec
/// submission, the report consumer, the keepalive watchdog and teardown.
pub struct ReadLifecycle {
    connection: Box<dyn LlrpConnection>,
    settings: ReaderSettings,
    plan: ReadPlan,
    ids: SpecIds,
    queue: Arc<ReportQueue>,
    flags: Arc<Mutex<Vec<bool>>>,
    protocols: Arc<Mutex<HashMap<u32, TagProtocol>>>,
    accumulator: Arc<Mutex<Vec<TagReadData>>>,
    read_listeners: Arc<Mutex<Vec<Box<dyn ReadListener>>>>,
    exception_listeners: Arc<Mutex<Vec<Arc<dyn ExceptionListener + Sync>>>>,
    keepalive_stamp: Arc<AtomicU64>,
    monitor: Option<KeepAliveMonitor>,
    consumer: Option<Arc<TagReportConsumer>>,
    consumer_handle: Option<JoinHandle<()>>,
    active: Vec<ActiveSpec>,
    /// Guards standalone tag operations; a second call while one is in
    /// flight is rejected rather than queued.
    op_active: Arc<Mutex<bool>>,
}

impl ReadLifecycle {
    pub fn new(connection: Box<dyn LlrpConnection>) -> ReadLifecycle {
        ReadLifecycle {
            connection,
            settings: ReaderSettings::default(),
            plan: ReadPlan::default(),
            ids: SpecIds::new(),
            queue: Arc::new(ReportQueue::new()),
            flags: Arc::new(Mutex::new(Vec::new())),
            protocols: Arc::new(Mutex::new(HashMap::new())),
            accumulator: Arc::new(Mutex::new(Vec::new())),
            read_listeners: Arc::new(Mutex::new(Vec::new())),
            exception_listeners: Arc::new(Mutex::new(Vec::new())),
            keepalive_stamp: Arc::new(AtomicU64::new(0)),
            monitor: None,
            consumer: None,
            consumer_handle: None,
            active: Vec::new(),
            op_active: Arc::new(Mutex::new(false)),
        }
    }

    pub fn connect(&mut self) -> Result<(), ReaderError> {
        let endpoint = Arc::new(EventDispatcher {
            queue: self.queue.clone(),
            flags: self.flags.clone(),
            keepalive_stamp: self.keepalive_stamp.clone(),
            exception_listeners: self.exception_listeners.clone(),
        });
        self.connection.set_endpoint(endpoint);
        self.connection.connect()?;
        let id = self.connection.next_id();
        let response = config::transact_checked(
            &*self.connection,
            &config::get_reader_capabilities(&id),
        )?;
        config::absorb_capabilities(&mut self.settings, &response);
        let id = self.connection.next_id();
        let response =
            config::transact_checked(&*self.connection, &config::get_reader_config(&id))?;
        config::absorb_capabilities(&mut self.settings, &response);
        config::configure_connection(&*self.connection, &self.settings)?;
        self.cleanup_specs(CLEANUP_TIMEOUT);
        self.keepalive_stamp.store(now_ms(), Ordering::Relaxed);
        let mut monitor = KeepAliveMonitor::new(
            u64::from(self.settings.keepalive_interval_ms),
            self.keepalive_stamp.clone(),
            self.exception_listeners.clone(),
        );
        monitor.start();
        self.monitor = Some(monitor);
        Ok(())
    }

    pub fn disconnect(&mut self) {
        if self.consumer.is_some() {
            self.stop_reading();
        }
        if let Some(mut monitor) = self.monitor.take() {
            monitor.stop();
        }
        self.connection.disconnect();
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_connected()
    }

    pub fn set_read_plan(&mut self, plan: ReadPlan) -> Result<(), ReaderError> {
        let max = self
            .settings
            .antennas
            .iter()
            .copied()
            .max()
            .unwrap_or(crate::MAX_ANTENNAS);
        plan.validate(max)?;
        self.plan = plan;
        Ok(())
    }

    pub fn settings(&self) -> ReaderSettings {
        self.settings.clone()
    }

    pub fn update_settings(&mut self, settings: ReaderSettings) -> Result<(), ReaderError> {
        settings.validate()?;
        if self.connection.is_connected() {
            config::apply_settings(&*self.connection, &settings)?;
        }
        self.settings = settings;
        Ok(())
    }

    pub fn add_read_listener(&mut self, listener: Box<dyn ReadListener>) {
        if let Ok(mut list) = self.read_listeners.lock() {
            list.push(listener);
        }
    }

    pub fn add_exception_listener(&mut self, listener: Arc<dyn ExceptionListener + Sync>) {
        if let Ok(mut list) = self.exception_listeners.lock() {
            list.push(listener);
        }
    }

    pub fn add_transport_listener(&mut self, listener: Box<dyn TransportListener>) {
        self.connection.add_transport_listener(listener);
    }

    /// One bounded inventory round. Blocks until every leaf plan reports
    /// its end event, then returns the accumulated reads.
    pub fn read(&mut self, duration_ms: u32) -> Result<Vec<TagReadData>, ReaderError> {
        if !self.connection.is_connected() {
            return Err(ReaderError::ConnectionLost)
        }
        if self.consumer.is_some() {
            return Err(ReaderError::InvalidArgument(String::from(
                "a continuous read session is active",
            )))
        }
        let plan = self.plan.clone();
        let leaves = plan.leaves(duration_ms);
        if leaves.is_empty() {
            return Ok(Vec::new())
        }
        let (submitted, _) = self.begin_session(&leaves, ReadMode::Bounded, false, true)?;
        if submitted == 0 {
            self.finish_consumer(true);
            return Err(ReaderError::Communication(String::from(
                "no read plan could be started",
            )))
        }
        let deadline = now_ms() + u64::from(duration_ms) + READ_GRACE_MS;
        if let Err(e) = self.wait_for_completion(deadline) {
            self.finish_consumer(true);
            return Err(e)
        }
        self.finish_consumer(false);
        self.teardown_active();
        let reads = match self.accumulator.lock() {
            Ok(mut list) => list.drain(..).collect(),
            Err(_) => Vec::new(),
        };
        Ok(report::deduplicate(
            reads,
            self.settings.unique_by_antenna,
            self.settings.record_highest_rssi,
        ))
    }

    /// Begin a continuous read session. Reads flow to the registered
    /// listeners until `stop_reading`.
    pub fn start_reading(&mut self) -> Result<(), ReaderError> {
        if !self.connection.is_connected() {
            return Err(ReaderError::ConnectionLost)
        }
        if self.consumer.is_some() {
            return Err(ReaderError::InvalidArgument(String::from(
                "a read session is already active",
            )))
        }
        let plan = self.plan.clone();
        let leaves = plan.leaves(self.settings.async_on_time_ms);
        if leaves.is_empty() {
            return Err(ReaderError::InvalidArgument(String::from(
                "read plan has no leaf plans",
            )))
        }
        let (submitted, _) = self.begin_session(&leaves, ReadMode::Continuous, false, false)?;
        if submitted == 0 {
            self.finish_consumer(true);
            return Err(ReaderError::Communication(String::from(
                "no read plan could be started",
            )))
        }
        Ok(())
    }

    /// End a continuous read session. Shutdown must always release its
    /// resources, so failures are logged and reported in the return value
    /// instead of being thrown.
    pub fn stop_reading(&mut self) -> bool {
        let mut clean = true;
        let active = std::mem::take(&mut self.active);
        for spec in &active {
            let id = self.connection.next_id();
            let msg = match spec.start_trigger {
                StartTriggerKind::Null => requests::stop_rospec(&id, &spec.rospec_id),
                StartTriggerKind::Periodic => requests::disable_rospec(&id, &spec.rospec_id),
            };
            if let Err(e) = config::transact_checked(&*self.connection, &msg) {
                println!("Error stopping rospec {}. {e}", spec.rospec_id);
                clean = false;
            }
        }
        for spec in &active {
            let id = self.connection.next_id();
            let msg = requests::delete_rospec(&id, &spec.rospec_id);
            if let Err(e) = config::transact_checked(&*self.connection, &msg) {
                println!("Error deleting rospec {}. {e}", spec.rospec_id);
                clean = false;
            }
            if let Some(access_spec_id) = spec.access_spec_id {
                let id = self.connection.next_id();
                let msg = requests::delete_access_spec(&id, &access_spec_id);
                if let Err(e) = config::transact_checked(&*self.connection, &msg) {
                    println!("Error deleting access spec {access_spec_id}. {e}");
                    clean = false;
                }
            }
        }
        self.finish_consumer(false);
        clean
    }

    /// Run one standalone tag operation and block for its result. A
    /// second call while one is in flight is rejected.
    pub fn execute_tag_op(
        &mut self,
        op: &TagOp,
        filter: Option<&TagFilter>,
    ) -> Result<TagOpResult, ReaderError> {
        {
            let mut active = self
                .op_active
                .lock()
                .map_err(|e| ReaderError::MutexError(e.to_string()))?;
            if *active {
                return Err(ReaderError::InvalidArgument(String::from(
                    "a standalone tag operation is already in progress",
                )))
            }
            *active = true;
        }
        let result = self.run_tag_op(op, filter);
        if let Ok(mut active) = self.op_active.lock() {
            *active = false;
        }
        result
    }

    /// Force the standalone guard, standing in for an operation held open
    /// by another control path.
    #[cfg(test)]
    pub(crate) fn set_op_active(&self, active: bool) {
        if let Ok(mut flag) = self.op_active.lock() {
            *flag = active;
        }
    }

    fn run_tag_op(
        &mut self,
        op: &TagOp,
        filter: Option<&TagFilter>,
    ) -> Result<TagOpResult, ReaderError> {
        if !self.connection.is_connected() {
            return Err(ReaderError::ConnectionLost)
        }
        if self.consumer.is_some() {
            return Err(ReaderError::InvalidArgument(String::from(
                "a read session is active",
            )))
        }
        let protocol = match op {
            TagOp::Iso6b(_) => TagProtocol::Iso18k6b,
            _ => TagProtocol::Gen2,
        };
        let mut plan = SimpleReadPlan::new(protocol);
        if let Some(antenna) = self.settings.antennas.first() {
            plan.antennas = vec![*antenna];
        }
        plan.filter = filter.cloned();
        plan.op = Some(op.clone());
        let leaves = vec![(&plan, TAG_OP_WINDOW_MS)];
        let (submitted, failure) = self.begin_session(&leaves, ReadMode::Bounded, true, true)?;
        if submitted == 0 {
            self.finish_consumer(true);
            // hand the submission failure straight back to the caller
            return Err(failure.unwrap_or_else(|| {
                ReaderError::Communication(String::from("tag operation could not be started"))
            }))
        }
        let deadline = now_ms() + u64::from(TAG_OP_WINDOW_MS) + READ_GRACE_MS;
        if let Err(e) = self.wait_for_completion(deadline) {
            self.finish_consumer(true);
            return Err(e)
        }
        self.finish_consumer(false);
        self.teardown_active();
        let captured = match self.accumulator.lock() {
            Ok(mut list) => list
                .drain(..)
                .find_map(|read| read.op_result),
            Err(_) => None,
        };
        match captured {
            Some(TagOpResult::Success { data, .. }) => {
                // attach the parsed reply now that the originating op is known
                let value = opspec::parse_vendor_value(op, &data);
                Ok(TagOpResult::Success { data, value })
            }
            Some(TagOpResult::Failed(failure)) => Err(ReaderError::TagOp(failure)),
            None => Err(ReaderError::TagOp(TagOpFailure::NoResponse)),
        }
    }

    /// Common session setup: reset per call state, start the consumer and
    /// submit one spec pair per leaf. A leaf whose submission fails has
    /// its completion flag forced; its siblings still run. Batch sessions
    /// broadcast the failure to exception listeners, a standalone
    /// operation keeps it for the caller instead. Returns how many leaves
    /// started and the first failure seen.
    fn begin_session(
        &mut self,
        leaves: &[(&SimpleReadPlan, u32)],
        mode: ReadMode,
        standalone: bool,
        accumulate: bool,
    ) -> Result<(usize, Option<ReaderError>), ReaderError> {
        self.ids.reset();
        self.active.clear();
        self.cleanup_specs(CLEANUP_TIMEOUT);
        if let Ok(mut flags) = self.flags.lock() {
            *flags = vec![false; leaves.len()];
        }
        if let Ok(mut protocols) = self.protocols.lock() {
            protocols.clear();
        }
        if let Ok(mut list) = self.accumulator.lock() {
            list.clear();
        }
        let id = self.connection.next_id();
        self.connection
            .send(&requests::enable_events_and_reports(&id))?;

        let consumer = Arc::new(TagReportConsumer::new(
            self.queue.clone(),
            self.protocols.clone(),
            self.accumulator.clone(),
            self.read_listeners.clone(),
            accumulate,
        ));
        let runner = consumer.clone();
        self.consumer_handle = Some(thread::spawn(move || runner.start()));
        self.consumer = Some(consumer);

        let multi = leaves.len() > 1;
        let mut submitted = 0;
        let mut first_failure: Option<ReaderError> = None;
        for (leaf, leaf_duration) in leaves {
            let built = builder::build_spec(
                &mut self.ids,
                leaf,
                *leaf_duration,
                mode,
                multi,
                standalone,
                &self.settings,
            );
            let failed = match built {
                Ok(spec) => match self.submit_spec(&spec) {
                    Ok(()) => {
                        if let Ok(mut protocols) = self.protocols.lock() {
                            protocols.insert(spec.rospec_id, spec.protocol);
                        }
                        self.active.push(ActiveSpec {
                            rospec_id: spec.rospec_id,
                            access_spec_id: spec.access_spec.as_ref().map(|(id, _)| *id),
                            start_trigger: spec.start_trigger,
                        });
                        submitted += 1;
                        None
                    }
                    Err(e) => {
                        self.fail_leaf(spec.rospec_id, &e, standalone);
                        Some(e)
                    }
                },
                // build_spec consumed the rospec id before failing
                Err(e) => {
                    self.fail_leaf(self.ids.current_rospec(), &e, standalone);
                    Some(e)
                }
            };
            if first_failure.is_none() {
                first_failure = failed;
            }
        }
        Ok((submitted, first_failure))
    }

    /// ADD, ENABLE and for explicitly triggered specs START, checking
    /// each response status.
    fn submit_spec(&self, spec: &BuiltSpec) -> Result<(), ReaderError> {
        let id = self.connection.next_id();
        config::transact_checked(&*self.connection, &requests::add_rospec(&id, &spec.rospec))?;
        if let Some((access_spec_id, body)) = &spec.access_spec {
            let id = self.connection.next_id();
            config::transact_checked(&*self.connection, &requests::add_access_spec(&id, body))?;
            let id = self.connection.next_id();
            config::transact_checked(
                &*self.connection,
                &requests::enable_access_spec(&id, access_spec_id),
            )?;
        }
        let id = self.connection.next_id();
        config::transact_checked(
            &*self.connection,
            &requests::enable_rospec(&id, &spec.rospec_id),
        )?;
        if spec.start_trigger == StartTriggerKind::Null {
            let id = self.connection.next_id();
            config::transact_checked(
                &*self.connection,
                &requests::start_rospec(&id, &spec.rospec_id),
            )?;
        }
        Ok(())
    }

    fn fail_leaf(&self, rospec_id: u32, err: &ReaderError, quiet: bool) {
        println!("Error starting read plan {rospec_id}. {err}");
        if let Ok(mut flags) = self.flags.lock() {
            let idx = rospec_id as usize;
            if idx >= 1 && idx <= flags.len() {
                flags[idx - 1] = true;
            }
        }
        if quiet {
            return
        }
        if let Ok(list) = self.exception_listeners.lock() {
            for listener in list.iter() {
                listener.on_reader_exception(err);
            }
        }
    }

    /// Poll the completion flags until every leaf has ended, the deadline
    /// passes, or the connection is gone.
    fn wait_for_completion(&self, deadline_ms: u64) -> Result<(), ReaderError> {
        loop {
            let done = match self.flags.lock() {
                Ok(flags) => flags.iter().all(|f| *f),
                Err(e) => return Err(ReaderError::MutexError(e.to_string())),
            };
            if done {
                return Ok(())
            }
            if !self.connection.is_connected() {
                return Err(ReaderError::ConnectionLost)
            }
            if let Some(monitor) = &self.monitor {
                if monitor.is_lost() {
                    return Err(ReaderError::ConnectionLost)
                }
            }
            if now_ms() > deadline_ms {
                println!("Timed out waiting for read plan end events.");
                return Ok(())
            }
            thread::sleep(Duration::from_millis(POLL_MS));
        }
    }

    /// Stop the consumer and join its thread. A clean stop drains the
    /// queue first; an abort drops whatever is still queued.
    fn finish_consumer(&mut self, abort: bool) {
        if let Some(consumer) = self.consumer.take() {
            if abort {
                consumer.abort();
            } else {
                consumer.stop();
            }
        }
        if let Some(handle) = self.consumer_handle.take() {
            if handle.join().is_err() {
                println!("error joining report consumer thread");
            }
        }
    }

    /// Delete this session's specs from the reader.
    fn teardown_active(&mut self) {
        let active = std::mem::take(&mut self.active);
        for spec in active {
            let id = self.connection.next_id();
            let msg = requests::delete_rospec(&id, &spec.rospec_id);
            if let Err(e) = config::transact_checked(&*self.connection, &msg) {
                println!("Error deleting rospec {}. {e}", spec.rospec_id);
            }
            if let Some(access_spec_id) = spec.access_spec_id {
                let id = self.connection.next_id();
                let msg = requests::delete_access_spec(&id, &access_spec_id);
                if let Err(e) = config::transact_checked(&*self.connection, &msg) {
                    println!("Error deleting access spec {access_spec_id}. {e}");
                }
            }
        }
    }

    /// Delete every rospec and access spec on the reader. Run at connect
    /// and before each session so specs orphaned by a dead client never
    /// collide with fresh ids. Failures are logged; a reader with nothing
    /// to delete answers with an error status on some firmware.
    fn cleanup_specs(&self, timeout: Duration) {
        let id = self.connection.next_id();
        let msg = requests::delete_rospec(&id, &requests::ALL_SPECS);
        match self.connection.transact(&msg, timeout) {
            Ok(_) => (),
            Err(e) => println!("Error deleting orphaned rospecs. {e}"),
        }
        let id = self.connection.next_id();
        let msg = requests::delete_access_spec(&id, &requests::ALL_SPECS);
        match self.connection.transact(&msg, timeout) {
            Ok(_) => (),
            Err(e) => println!("Error deleting orphaned access specs. {e}"),
        }
    }
}

impl Drop for ReadLifecycle {
    fn drop(&mut self) {
        self.disconnect();
    }
}
