//! Element abstraction for the pipeline.
//!
//! An element is the unit of work: it owns whatever resources it needs,
//! acquires them in `prepare`, turns inputs into zero or more outputs in
//! `consume`, and releases everything in `cleanup`. Each element instance
//! runs on its own thread, so nothing here needs to be `Sync`.
//!
//! The role an element plays (source, transform, sink) is fixed when its
//! stage is declared and is carried as a closed [`Role`] tag rather than
//! through separate traits.

use crate::pipeline::channel::StopSignal;
use crate::pipeline::error::ElementResult;
use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Position of an element in the graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    /// Produces items from nothing. Its input type is `()`.
    Source,
    /// Receives items and forwards results downstream.
    Transform,
    /// Receives items and produces no pipeline output.
    Sink,
}

impl Role {
    pub fn can_produce(self) -> bool {
        !matches!(self, Role::Sink)
    }

    pub fn can_consume(self) -> bool {
        !matches!(self, Role::Source)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Source => write!(f, "source"),
            Role::Transform => write!(f, "transform"),
            Role::Sink => write!(f, "sink"),
        }
    }
}

/// Output buffer and identity handed to `consume`.
///
/// Calling [`emit`](Self::emit) zero times is the explicit "filtered"
/// outcome; it is not an error. An element that forwards a placeholder for
/// an item it dropped calls [`mark_filtered`](Self::mark_filtered) instead.
pub struct ElementContext<'a, O> {
    name: &'a str,
    replica: u16,
    output: &'a mut Vec<O>,
    filtered: bool,
    stop: Option<&'a StopSignal>,
}

impl<'a, O> ElementContext<'a, O> {
    pub fn new(name: &'a str, replica: u16, output: &'a mut Vec<O>) -> Self {
        Self {
            name,
            replica,
            output,
            filtered: false,
            stop: None,
        }
    }

    /// Let the element watch the pipeline's stop signal.
    pub fn with_stop(mut self, stop: &'a StopSignal) -> Self {
        self.stop = Some(stop);
        self
    }

    /// Sleep for `timeout`, waking early if the pipeline is stopped.
    ///
    /// Returns `true` if a stop was requested.
    pub fn sleep(&self, timeout: Duration) -> bool {
        match self.stop {
            Some(stop) => stop.wait_timeout(timeout),
            None => {
                std::thread::sleep(timeout);
                false
            }
        }
    }

    /// Queue one item for every outbound link.
    #[inline]
    pub fn emit(&mut self, item: O) {
        self.output.push(item);
    }

    /// Count this input as filtered even if something was emitted for it.
    pub fn mark_filtered(&mut self) {
        self.filtered = true;
    }

    pub fn is_filtered(&self) -> bool {
        self.filtered
    }

    /// Instance name, e.g. `blink_detector#1`.
    pub fn name(&self) -> &str {
        self.name
    }

    pub fn replica(&self) -> u16 {
        self.replica
    }
}

/// Lifecycle hooks every pipeline element implements.
pub trait Element: Send + 'static {
    type Input: Send + 'static;
    type Output: Send + 'static;

    /// Acquire per-instance resources. Runs once, on the element's own
    /// thread, before the first `consume`. An error aborts pipeline startup.
    fn prepare(&mut self) -> ElementResult<()> {
        Ok(())
    }

    /// Process one input.
    ///
    /// A returned error is logged by the runner and the item is dropped;
    /// the element keeps running. Sources return
    /// [`ElementError::Exhausted`](crate::pipeline::ElementError::Exhausted)
    /// to end the stream.
    fn consume(
        &mut self,
        input: Self::Input,
        ctx: &mut ElementContext<'_, Self::Output>,
    ) -> ElementResult<()>;

    /// Called once when the inbound stream ends normally (all producers
    /// closed and the queue drained), before outputs are closed. Not called
    /// when the pipeline is stopped.
    fn finish(&mut self, _ctx: &mut ElementContext<'_, Self::Output>) -> ElementResult<()> {
        Ok(())
    }

    /// Release what `prepare` acquired. Runs exactly once, even when
    /// `prepare` failed or no item was ever consumed.
    fn cleanup(&mut self) -> ElementResult<()> {
        Ok(())
    }
}

// ── Lifecycle state ──

/// Lifecycle of one element instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum ElementState {
    Created = 0,
    Prepared = 1,
    Running = 2,
    Stopping = 3,
    Stopped = 4,
}

impl ElementState {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => ElementState::Created,
            1 => ElementState::Prepared,
            2 => ElementState::Running,
            3 => ElementState::Stopping,
            _ => ElementState::Stopped,
        }
    }
}

impl fmt::Display for ElementState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ElementState::Created => write!(f, "created"),
            ElementState::Prepared => write!(f, "prepared"),
            ElementState::Running => write!(f, "running"),
            ElementState::Stopping => write!(f, "stopping"),
            ElementState::Stopped => write!(f, "stopped"),
        }
    }
}

/// Shared, lock-free view of one instance's state and counters.
///
/// Written only by the instance's runner thread; read by the scheduler.
#[derive(Clone, Default)]
pub struct InstanceStatus {
    inner: Arc<StatusInner>,
}

#[derive(Default)]
struct StatusInner {
    state: AtomicU8,
    consumed: AtomicU64,
    emitted: AtomicU64,
    filtered: AtomicU64,
    failures: AtomicU64,
    cleanups: AtomicU64,
}

/// Point-in-time copy of an [`InstanceStatus`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct InstanceStats {
    /// Inputs that went through `consume` without error.
    pub consumed: u64,
    /// Items sent downstream.
    pub emitted: u64,
    /// Inputs that produced no output.
    pub filtered: u64,
    /// Collaborator failures inside `consume`.
    pub failures: u64,
    /// Times `cleanup` ran. Always 0 or 1.
    pub cleanups: u64,
}

impl InstanceStatus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> ElementState {
        ElementState::from_u8(self.inner.state.load(Ordering::Acquire))
    }

    pub(crate) fn set_state(&self, state: ElementState) {
        self.inner.state.store(state as u8, Ordering::Release);
    }

    pub(crate) fn record_consumed(&self, emitted: usize, marked: bool) {
        self.inner.consumed.fetch_add(1, Ordering::Relaxed);
        if emitted == 0 || marked {
            self.inner.filtered.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub(crate) fn record_emitted(&self) {
        self.inner.emitted.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_failure(&self) {
        self.inner.failures.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_cleanup(&self) {
        self.inner.cleanups.fetch_add(1, Ordering::Relaxed);
    }

    pub fn stats(&self) -> InstanceStats {
        InstanceStats {
            consumed: self.inner.consumed.load(Ordering::Relaxed),
            emitted: self.inner.emitted.load(Ordering::Relaxed),
            filtered: self.inner.filtered.load(Ordering::Relaxed),
            failures: self.inner.failures.load(Ordering::Relaxed),
            cleanups: self.inner.cleanups.load(Ordering::Relaxed),
        }
    }
}

impl fmt::Debug for InstanceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InstanceStatus")
            .field("state", &self.state())
            .field("stats", &self.stats())
            .finish()
    }
}
