//! Cloneable cancellation signal shared between a scan job and its consumer.

#![allow(missing_docs)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crossbeam_channel::{Receiver, Sender};
use parking_lot::Mutex;

/// Cancellation token.
///
/// Clones observe the same signal. `done()` returns a receiver that never
/// yields a message but disconnects on cancellation, so it can sit beside a
/// data channel inside `crossbeam_channel::select!` and wake a blocked side.
#[derive(Debug, Clone)]
pub struct CancelToken {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    cancelled: AtomicBool,
    // Dropping the sender disconnects every `done()` receiver.
    trigger: Mutex<Option<Sender<()>>>,
    done: Receiver<()>,
}

impl CancelToken {
    #[must_use]
    pub fn new() -> Self {
        let (tx, rx) = crossbeam_channel::bounded(0);
        Self {
            inner: Arc::new(Inner {
                cancelled: AtomicBool::new(false),
                trigger: Mutex::new(Some(tx)),
                done: rx,
            }),
        }
    }

    /// A token for callers that never cancel.
    #[must_use]
    pub fn never() -> Self {
        Self::new()
    }

    /// Signal cancellation. Idempotent.
    pub fn cancel(&self) {
        self.inner.cancelled.store(true, Ordering::SeqCst);
        self.inner.trigger.lock().take();
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    /// Receiver that disconnects once the token is cancelled.
    #[must_use]
    pub fn done(&self) -> &Receiver<()> {
        &self.inner.done
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}
