//! Single-slot mailbox
//!
//! Holds at most one value. Posting never blocks: a value nobody has taken
//! yet is overwritten and counted as dropped. Readers only ever see the most
//! recent value.

use parking_lot::Mutex;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

/// Delivery counters of a [`Mailbox`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MailboxStats {
    pub posted: u64,
    pub delivered: u64,
    pub dropped: u64,
}

struct Inner<T> {
    slot: Mutex<Option<T>>,
    ready: Notify,
    posted: AtomicU64,
    delivered: AtomicU64,
    dropped: AtomicU64,
}

/// One-element channel with overwrite-on-full semantics
pub struct Mailbox<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for Mailbox<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T> Default for Mailbox<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Mailbox<T> {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                slot: Mutex::new(None),
                ready: Notify::new(),
                posted: AtomicU64::new(0),
                delivered: AtomicU64::new(0),
                dropped: AtomicU64::new(0),
            }),
        }
    }

    /// Store a value, replacing any value not yet taken
    pub fn post(&self, value: T) {
        let replaced = self.inner.slot.lock().replace(value).is_some();
        self.inner.posted.fetch_add(1, Ordering::Relaxed);
        if replaced {
            self.inner.dropped.fetch_add(1, Ordering::Relaxed);
        }
        self.inner.ready.notify_one();
    }

    pub fn try_take(&self) -> Option<T> {
        let value = self.inner.slot.lock().take();
        if value.is_some() {
            self.inner.delivered.fetch_add(1, Ordering::Relaxed);
        }
        value
    }

    /// Wait until a value is available and take it
    pub async fn take(&self) -> T {
        loop {
            let notified = self.inner.ready.notified();
            if let Some(value) = self.try_take() {
                return value;
            }
            notified.await;
        }
    }

    pub fn stats(&self) -> MailboxStats {
        MailboxStats {
            posted: self.inner.posted.load(Ordering::Relaxed),
            delivered: self.inner.delivered.load(Ordering::Relaxed),
            dropped: self.inner.dropped.load(Ordering::Relaxed),
        }
    }
}
