use std::sync::Arc;

use crate::error::ReaderError;
use crate::plan::ReadPlan;
use crate::report::TagReadData;
use crate::tagop::{TagOp, TagOpResult};
use crate::filter::TagFilter;

pub mod builder;
pub mod config;
pub mod keepalive;
pub mod lifecycle;
pub mod opspec;
pub mod transport;

#[cfg(test)]
mod tests;

pub use config::ReaderSettings;
pub use lifecycle::ReadLifecycle;
pub use transport::{LlrpConnection, TcpLlrpConnection};

/// Readers listen on this port for LLRP clients.
pub const DEFAULT_LLRP_PORT: u16 = 5084;

/// Receives each normalized tag read as it is published.
pub trait ReadListener: Send {
    fn on_tag_read(&self, read: &TagReadData);
}

/// Receives failures that are scoped to one ROSpec or reported by the
/// keepalive watchdog instead of being thrown at the caller.
pub trait ExceptionListener: Send {
    fn on_reader_exception(&self, err: &ReaderError);
}

/// Observes raw frames in both directions.
pub trait TransportListener: Send {
    fn on_message(&self, bytes: &[u8], outbound: bool);
}

/// The public reader client. Owns the connection, the configured read
/// plan, and the read lifecycle that drives it.
pub struct LlrpReader {
    lifecycle: ReadLifecycle,
}

impl LlrpReader {
    /// A reader reached over TCP at `host:port`.
    pub fn new(host: &str, port: u16) -> LlrpReader {
        let connection = TcpLlrpConnection::new(host, port);
        LlrpReader {
            lifecycle: ReadLifecycle::new(Box::new(connection)),
        }
    }

    /// A reader over a caller supplied connection. Used for tests and for
    /// alternate transports.
    pub fn with_connection(connection: Box<dyn LlrpConnection>) -> LlrpReader {
        LlrpReader {
            lifecycle: ReadLifecycle::new(connection),
        }
    }

    pub fn connect(&mut self) -> Result<(), ReaderError> {
        self.lifecycle.connect()
    }

    pub fn disconnect(&mut self) {
        self.lifecycle.disconnect()
    }

    pub fn is_connected(&self) -> bool {
        self.lifecycle.is_connected()
    }

    pub fn set_read_plan(&mut self, plan: ReadPlan) -> Result<(), ReaderError> {
        self.lifecycle.set_read_plan(plan)
    }

    pub fn settings(&self) -> ReaderSettings {
        self.lifecycle.settings()
    }

    pub fn update_settings(&mut self, settings: ReaderSettings) -> Result<(), ReaderError> {
        self.lifecycle.update_settings(settings)
    }

    /// One synchronous inventory round of `duration_ms` milliseconds.
    pub fn read(&mut self, duration_ms: u32) -> Result<Vec<TagReadData>, ReaderError> {
        self.lifecycle.read(duration_ms)
    }

    /// Begin a continuous read session; reads flow to the registered
    /// listeners until `stop_reading`.
    pub fn start_reading(&mut self) -> Result<(), ReaderError> {
        self.lifecycle.start_reading()
    }

    /// End a continuous read session. Never fails: shutdown paths must
    /// always release their resources, so problems are logged and `false`
    /// is returned instead.
    pub fn stop_reading(&mut self) -> bool {
        self.lifecycle.stop_reading()
    }

    /// Execute one standalone tag operation and block for its result.
    pub fn execute_tag_op(
        &mut self,
        op: &TagOp,
        filter: Option<&TagFilter>,
    ) -> Result<TagOpResult, ReaderError> {
        self.lifecycle.execute_tag_op(op, filter)
    }

    pub fn add_read_listener(&mut self, listener: Box<dyn ReadListener>) {
        self.lifecycle.add_read_listener(listener)
    }

    pub fn add_exception_listener(&mut self, listener: Arc<dyn ExceptionListener + Sync>) {
        self.lifecycle.add_exception_listener(listener)
    }

    pub fn add_transport_listener(&mut self, listener: Box<dyn TransportListener>) {
        self.lifecycle.add_transport_listener(listener)
    }
}
