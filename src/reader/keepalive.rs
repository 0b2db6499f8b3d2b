use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use chrono::Utc;

use crate::error::ReaderError;
use crate::reader::ExceptionListener;

/// The link is declared lost after this many missed keepalive periods.
pub const MISSED_PERIODS: u64 = 4;

/// Watches the cadence of reader keepalives. The read thread stamps
/// `touch` for every KEEPALIVE it acks; this side checks the gap and
/// tells the exception listeners exactly once when the link goes quiet.
pub struct KeepAliveMonitor {
    interval_ms: u64,
    last_seen_ms: Arc<AtomicU64>,
    running: Arc<AtomicBool>,
    lost: Arc<AtomicBool>,
    listeners: Arc<Mutex<Vec<Arc<dyn ExceptionListener + Sync>>>>,
    handle: Option<JoinHandle<()>>,
}

impl KeepAliveMonitor {
    /// `last_seen_ms` is shared with the connection endpoint, which stamps
    /// it from the read thread as keepalives arrive.
    pub fn new(
        interval_ms: u64,
        last_seen_ms: Arc<AtomicU64>,
        listeners: Arc<Mutex<Vec<Arc<dyn ExceptionListener + Sync>>>>,
    ) -> KeepAliveMonitor {
        KeepAliveMonitor {
            interval_ms,
            last_seen_ms,
            running: Arc::new(AtomicBool::new(false)),
            lost: Arc::new(AtomicBool::new(false)),
            listeners,
            handle: None,
        }
    }

    pub fn touch(&self, now_ms: u64) {
        self.last_seen_ms.store(now_ms, Ordering::Relaxed);
    }

    pub fn is_lost(&self) -> bool {
        self.lost.load(Ordering::Relaxed)
    }

    /// One watchdog pass at the given clock reading. Returns true only on
    /// the pass that declares the connection lost; every later pass is a
    /// no-op so listeners hear about a loss once.
    pub fn check(&self, now_ms: u64) -> bool {
        if self.lost.load(Ordering::Relaxed) {
            return false
        }
        let last = self.last_seen_ms.load(Ordering::Relaxed);
        if last == 0 || now_ms.saturating_sub(last) <= self.interval_ms * MISSED_PERIODS {
            return false
        }
        self.lost.store(true, Ordering::Relaxed);
        self.running.store(false, Ordering::Relaxed);
        println!(
            "keepalive silent for {}ms, reporting connection lost",
            now_ms.saturating_sub(last)
        );
        if let Ok(list) = self.listeners.lock() {
            for listener in list.iter() {
                listener.on_reader_exception(&ReaderError::ConnectionLost);
            }
        }
        true
    }

    /// Start the watchdog thread. Ticks once per keepalive period.
    pub fn start(&mut self) {
        if self.running.swap(true, Ordering::Relaxed) {
            return
        }
        self.lost.store(false, Ordering::Relaxed);
        self.last_seen_ms.store(now_ms(), Ordering::Relaxed);
        let interval_ms = self.interval_ms;
        let last_seen = self.last_seen_ms.clone();
        let running = self.running.clone();
        let lost = self.lost.clone();
        let listeners = self.listeners.clone();
        self.handle = Some(thread::spawn(move || {
            let monitor = KeepAliveMonitor {
                interval_ms,
                last_seen_ms: last_seen,
                running: running.clone(),
                lost,
                listeners,
                handle: None,
            };
            // short ticks keep stop responsive on long intervals
            let tick = interval_ms.min(250);
            while running.load(Ordering::Relaxed) {
                thread::sleep(Duration::from_millis(tick));
                monitor.check(now_ms());
            }
        }));
    }

    pub fn stop(&mut self) {
        self.running.store(false, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                println!("error joining keepalive monitor thread");
            }
        }
    }
}

impl Drop for KeepAliveMonitor {
    fn drop(&mut self) {
        self.stop();
    }
}

pub fn now_ms() -> u64 {
    Utc::now().timestamp_millis().max(0) as u64
}
