//! Bounded signal channels and the global stop signal.
//!
//! A channel is a thin wrapper over a bounded `crossbeam_channel`. Every
//! blocking operation also listens on a [`StopSignal`], so an element stuck
//! on a full or empty channel wakes up as soon as the pipeline is stopped
//! instead of waiting for the channel to close.
//!
//! Receivers are cloneable: all clones drain the same queue and each item is
//! delivered to exactly one of them. This is what a worker pool relies on.

use crossbeam_channel::{bounded, select, Receiver, Sender};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Default channel capacity when none is configured.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 4;

// ── Stop signal ──

/// Process-wide cooperative cancellation.
///
/// Triggering drops the only sender of an internal zero-capacity channel.
/// Every clone's receiver then reports disconnection, which wakes any
/// `select!` currently parked on it.
#[derive(Clone)]
pub struct StopSignal {
    flag: Arc<AtomicBool>,
    trigger: Arc<Mutex<Option<Sender<()>>>>,
    wake: Receiver<()>,
}

impl StopSignal {
    pub fn new() -> Self {
        let (tx, rx) = bounded(0);
        Self {
            flag: Arc::new(AtomicBool::new(false)),
            trigger: Arc::new(Mutex::new(Some(tx))),
            wake: rx,
        }
    }

    /// Trigger the signal. Returns `true` only for the call that flipped it.
    pub fn trigger(&self) -> bool {
        let first = !self.flag.swap(true, Ordering::SeqCst);
        let mut guard = match self.trigger.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        guard.take();
        first
    }

    #[inline]
    pub fn is_triggered(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Sleep for `timeout` unless the signal fires first.
    ///
    /// Returns `true` if the signal fired.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        if self.is_triggered() {
            return true;
        }
        select! {
            recv(self.wake) -> _ => true,
            default(timeout) => self.is_triggered(),
        }
    }

    pub(crate) fn receiver(&self) -> &Receiver<()> {
        &self.wake
    }
}

impl Default for StopSignal {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for StopSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StopSignal")
            .field("triggered", &self.is_triggered())
            .finish()
    }
}

// ── Errors ──

/// Why a blocking send did not deliver its item. The item is dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendError {
    /// The stop signal fired while waiting for room.
    Stopped,
    /// This sender was closed, or every receiver is gone.
    Disconnected,
}

/// Why a non-blocking send did not deliver its item. The item is handed back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrySendError<T> {
    Full(T),
    Disconnected(T),
}

impl<T> TrySendError<T> {
    pub fn into_inner(self) -> T {
        match self {
            TrySendError::Full(item) | TrySendError::Disconnected(item) => item,
        }
    }
}

/// Why a blocking receive returned without an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecvError {
    /// All senders closed and the queue is drained.
    Closed,
    /// The stop signal fired.
    Stopped,
}

// ── Channel ends ──

/// Create a bounded channel. A capacity of zero is raised to one.
pub fn channel<T>(capacity: usize) -> (SignalSender<T>, SignalReceiver<T>) {
    let (tx, rx) = bounded(capacity.max(1));
    (SignalSender { inner: Some(tx) }, SignalReceiver { inner: rx })
}

/// Producer end. The channel closes once every clone is closed or dropped.
pub struct SignalSender<T> {
    inner: Option<Sender<T>>,
}

impl<T> SignalSender<T> {
    /// Block until the item is queued, the receivers are gone, or `stop` fires.
    pub fn send(&self, item: T, stop: &StopSignal) -> Result<(), SendError> {
        let Some(tx) = self.inner.as_ref() else {
            return Err(SendError::Disconnected);
        };
        if stop.is_triggered() {
            return Err(SendError::Stopped);
        }
        select! {
            send(tx, item) -> res => res.map_err(|_| SendError::Disconnected),
            recv(stop.receiver()) -> _ => Err(SendError::Stopped),
        }
    }

    /// Queue the item only if there is room right now.
    pub fn try_send(&self, item: T) -> Result<(), TrySendError<T>> {
        let Some(tx) = self.inner.as_ref() else {
            return Err(TrySendError::Disconnected(item));
        };
        tx.try_send(item).map_err(|e| match e {
            crossbeam_channel::TrySendError::Full(item) => TrySendError::Full(item),
            crossbeam_channel::TrySendError::Disconnected(item) => {
                TrySendError::Disconnected(item)
            }
        })
    }

    /// Close this sender. Calling it again is a no-op.
    pub fn close(&mut self) {
        self.inner.take();
    }

    pub fn is_closed(&self) -> bool {
        self.inner.is_none()
    }

    pub fn len(&self) -> usize {
        self.inner.as_ref().map(Sender::len).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T> Clone for SignalSender<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T> fmt::Debug for SignalSender<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignalSender")
            .field("closed", &self.is_closed())
            .field("len", &self.len())
            .finish()
    }
}

/// Consumer end. Clones share one queue.
pub struct SignalReceiver<T> {
    inner: Receiver<T>,
}

impl<T> SignalReceiver<T> {
    /// Block until an item arrives, the channel closes, or `stop` fires.
    ///
    /// Items still queued when the channel closes are delivered first.
    pub fn recv(&self, stop: &StopSignal) -> Result<T, RecvError> {
        if stop.is_triggered() {
            return Err(RecvError::Stopped);
        }
        select! {
            recv(self.inner) -> msg => msg.map_err(|_| RecvError::Closed),
            recv(stop.receiver()) -> _ => Err(RecvError::Stopped),
        }
    }

    pub fn try_recv(&self) -> Option<T> {
        self.inner.try_recv().ok()
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn capacity(&self) -> Option<usize> {
        self.inner.capacity()
    }
}

impl<T> Clone for SignalReceiver<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T> fmt::Debug for SignalReceiver<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignalReceiver")
            .field("len", &self.len())
            .finish()
    }
}
