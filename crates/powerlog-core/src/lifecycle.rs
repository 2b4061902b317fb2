//! Run flag and termination-signal wiring.
//!
//! A signal only clears the [`RunFlag`]. Flushing and closing the output
//! happen on the sampling loop's own path once it observes the change at the
//! next iteration boundary.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::error::Result;

/// Shared "keep running" token. Starts set; cleared at most once.
#[derive(Debug, Clone)]
pub struct RunFlag {
    running: Arc<AtomicBool>,
}

impl RunFlag {
    pub fn new() -> Self {
        Self {
            running: Arc::new(AtomicBool::new(true)),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Clear the flag. Returns `true` only for the call that cleared it.
    pub fn stop(&self) -> bool {
        self.running.swap(false, Ordering::SeqCst)
    }
}

impl Default for RunFlag {
    fn default() -> Self {
        Self::new()
    }
}

/// Clear `flag` on SIGINT, SIGTERM or SIGHUP.
///
/// Can be installed once per process.
pub fn install_termination_handler(flag: &RunFlag) -> Result<()> {
    let flag = flag.clone();
    ctrlc::set_handler(move || {
        flag.stop();
    })?;
    Ok(())
}
