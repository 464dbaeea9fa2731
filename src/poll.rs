//! Polls the backend for the outcome of a Telegram registration
//! confirmation. One worker thread per pending code; the thread stops on a
//! terminal status or when the handle is stopped or dropped.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use log::{info, warn};

use crate::api::ProvisioningApi;

/// Cadence of the status probe.
pub const POLL_INTERVAL: Duration = Duration::from_secs(4);

/// Granularity at which a sleeping worker notices a stop request.
const STOP_CHECK_INTERVAL: Duration = Duration::from_millis(250);

/// Terminal confirmation statuses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmationOutcome {
    Approved,
    Rejected,
    Expired,
}

impl ConfirmationOutcome {
    fn from_status(status: &str) -> Option<ConfirmationOutcome> {
        match status {
            "approved" => Some(ConfirmationOutcome::Approved),
            "rejected" => Some(ConfirmationOutcome::Rejected),
            "expired" => Some(ConfirmationOutcome::Expired),
            _ => None,
        }
    }
}

/// Handle to a running confirmation poll. Dropping it stops the worker.
pub struct ConfirmationPoller {
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl ConfirmationPoller {
    /// Starts polling at the standard cadence.
    pub fn spawn(
        api: Arc<dyn ProvisioningApi>,
        code: String,
        tx: Sender<ConfirmationOutcome>,
    ) -> Self {
        Self::spawn_with_interval(api, code, tx, POLL_INTERVAL)
    }

    pub fn spawn_with_interval(
        api: Arc<dyn ProvisioningApi>,
        code: String,
        tx: Sender<ConfirmationOutcome>,
        interval: Duration,
    ) -> Self {
        let stop = Arc::new(AtomicBool::new(false));
        let stop_flag = stop.clone();

        let handle = thread::spawn(move || {
            let rt = match tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
            {
                Ok(rt) => rt,
                Err(e) => {
                    warn!("[PHASE: poll] [STEP: spawn] runtime failed: {}", e);
                    return;
                }
            };

            loop {
                if stop_flag.load(Ordering::SeqCst) {
                    return;
                }

                let call = rt.block_on(api.register_status(&code));
                if stop_flag.load(Ordering::SeqCst) {
                    return;
                }

                if let Some(status) = call.data.as_ref().map(|d| d.status.as_str()) {
                    if let Some(outcome) = ConfirmationOutcome::from_status(status) {
                        info!(
                            "[PHASE: poll] [STEP: outcome] confirmation {:?}",
                            outcome
                        );
                        let _ = tx.send(outcome);
                        return;
                    }
                }
                // Pending, transport failure or backend error: keep polling.

                let mut remaining = interval;
                while remaining > Duration::ZERO {
                    if stop_flag.load(Ordering::SeqCst) {
                        return;
                    }
                    let nap = remaining.min(STOP_CHECK_INTERVAL);
                    thread::sleep(nap);
                    remaining -= nap;
                }
            }
        });

        ConfirmationPoller {
            stop,
            handle: Some(handle),
        }
    }

    pub fn stop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for ConfirmationPoller {
    fn drop(&mut self) {
        self.stop();
    }
}
