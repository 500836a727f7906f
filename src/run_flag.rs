// src/run_flag.rs
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

const IDLE: u8 = 0;
const RUNNING: u8 = 1;
const STOPPED: u8 = 2;

/// Shared "keep running" switch polled by the polling loop and the dispatcher.
///
/// Starts idle; `Monitor::run` starts it and `stop` ends it. A stop is final:
/// once stopped, `start` no longer takes effect, so a stop that lands before the
/// loop begins is not lost. Cloning shares the same underlying flag.
#[derive(Debug, Clone, Default)]
pub struct RunFlag(Arc<AtomicU8>);

impl RunFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns whether the flag is running afterwards.
    pub fn start(&self) -> bool {
        match self
            .0
            .compare_exchange(IDLE, RUNNING, Ordering::SeqCst, Ordering::SeqCst)
        {
            Ok(_) => true,
            Err(current) => current == RUNNING,
        }
    }

    pub fn stop(&self) {
        self.0.store(STOPPED, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.0.load(Ordering::SeqCst) == RUNNING
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::SeqCst) == STOPPED
    }
}
