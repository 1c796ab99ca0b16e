//! SIGINT/SIGTERM → cancellation of the active scan or fix pass.
//!
//! Signals only flip an atomic flag (`signal-hook`); a small watcher thread
//! turns the flag into a [`CancelToken::cancel`] so blocked scans wake up.

#![allow(missing_docs)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use crossbeam_channel::{self as channel, Sender, select};
use signal_hook::consts::{SIGINT, SIGTERM};

use crate::core::cancel::CancelToken;

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Cancels a token when the process is interrupted. Dropping it stops the
/// watcher; the OS hooks stay registered for the life of the process.
pub struct SignalCancel {
    interrupted: Arc<AtomicBool>,
    token: CancelToken,
    stop: Option<Sender<()>>,
    watcher: Option<thread::JoinHandle<()>>,
}

impl SignalCancel {
    pub fn install(token: CancelToken) -> Self {
        let interrupted = Arc::new(AtomicBool::new(false));
        register(&interrupted);

        let (stop_tx, stop_rx) = channel::bounded::<()>(0);
        let flag = Arc::clone(&interrupted);
        let watched = token.clone();
        let watcher = thread::Builder::new()
            .name("fh-signal".to_string())
            .spawn(move || {
                let ticker = channel::tick(POLL_INTERVAL);
                loop {
                    select! {
                        recv(stop_rx) -> _ => break,
                        recv(ticker) -> _ => {
                            if flag.load(Ordering::Relaxed) {
                                eprintln!("[FH-SIGNAL] interrupt received, cancelling");
                                watched.cancel();
                                break;
                            }
                            if watched.is_cancelled() {
                                break;
                            }
                        }
                    }
                }
            })
            .map_err(|e| eprintln!("[FH-SIGNAL] failed to spawn watcher: {e}"))
            .ok();

        Self {
            interrupted,
            token,
            stop: Some(stop_tx),
            watcher,
        }
    }

    pub fn token(&self) -> &CancelToken {
        &self.token
    }

    /// Whether a signal (or [`Self::request`]) caused the cancellation.
    pub fn interrupted(&self) -> bool {
        self.interrupted.load(Ordering::Relaxed)
    }

    /// Behave as if a signal arrived.
    pub fn request(&self) {
        self.interrupted.store(true, Ordering::Relaxed);
    }
}

impl Drop for SignalCancel {
    fn drop(&mut self) {
        // Disconnecting the stop channel wakes the watcher.
        self.stop.take();
        if let Some(watcher) = self.watcher.take() {
            let _ = watcher.join();
        }
    }
}

fn register(flag: &Arc<AtomicBool>) {
    if let Err(e) = signal_hook::flag::register(SIGTERM, Arc::clone(flag)) {
        eprintln!("[FH-SIGNAL] failed to register SIGTERM: {e}");
    }
    if let Err(e) = signal_hook::flag::register(SIGINT, Arc::clone(flag)) {
        eprintln!("[FH-SIGNAL] failed to register SIGINT: {e}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_cancels_token() {
        let token = CancelToken::new();
        let signals = SignalCancel::install(token.clone());
        assert!(!signals.interrupted());
        signals.request();
        // The watcher polls; wait on the token's done channel instead of sleeping.
        let woke = token.done().recv_timeout(Duration::from_secs(5));
        assert!(woke.is_err());
        assert!(token.is_cancelled());
        assert!(signals.interrupted());
    }

    #[test]
    fn drop_stops_watcher_without_cancelling() {
        let token = CancelToken::new();
        drop(SignalCancel::install(token.clone()));
        assert!(!token.is_cancelled());
    }
}
