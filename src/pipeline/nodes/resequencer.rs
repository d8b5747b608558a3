//! Resequencer node: restores capture order behind a replicated stage.
//!
//! Replicas of the detector finish out of order. Items are held in a
//! min-heap keyed on their sequence number and released as soon as the next
//! expected number arrives. Frames the detector could not measure still
//! arrive as placeholders, so every number is accounted for and nothing
//! waits on a frame that was dropped. Placeholders advance the expected
//! number and are then discarded.
//!
//! As a backstop, when more than `window` items are waiting the lowest
//! missing number is given up on. Anything older than the last released
//! number is dropped, so downstream never sees time go backwards.

use crate::pipeline::element::{Element, ElementContext};
use crate::pipeline::error::ElementResult;
use crate::types::{Detection, Frame, Measurement};
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::Arc;

/// Items that carry their source sequence number.
pub trait Sequenced {
    /// What is forwarded once the item is back in order.
    type Payload;

    fn seq(&self) -> u64;

    /// `None` for a placeholder that only occupies its sequence number.
    fn into_payload(self) -> Option<Self::Payload>;
}

impl Sequenced for Detection {
    type Payload = Arc<Measurement>;

    fn seq(&self) -> u64 {
        Detection::seq(self)
    }

    fn into_payload(self) -> Option<Arc<Measurement>> {
        match self {
            Detection::Measured(m) => Some(m),
            Detection::Missing(_) => None,
        }
    }
}

impl Sequenced for Arc<Frame> {
    type Payload = Self;

    fn seq(&self) -> u64 {
        self.seq
    }

    fn into_payload(self) -> Option<Self> {
        Some(self)
    }
}

struct Pending<T> {
    seq: u64,
    item: T,
}

impl<T> PartialEq for Pending<T> {
    fn eq(&self, other: &Self) -> bool {
        self.seq == other.seq
    }
}

impl<T> Eq for Pending<T> {}

impl<T> PartialOrd for Pending<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for Pending<T> {
    // Reversed: BinaryHeap is a max-heap and we want the lowest seq on top.
    fn cmp(&self, other: &Self) -> Ordering {
        other.seq.cmp(&self.seq)
    }
}

/// Counters kept by a [`ReorderBuffer`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReorderStats {
    pub released: u64,
    /// Sequence numbers given up on.
    pub skipped: u64,
    /// Items that arrived after their slot was passed.
    pub stale: u64,
}

/// The ordering logic behind [`Resequencer`].
pub struct ReorderBuffer<T> {
    heap: BinaryHeap<Pending<T>>,
    next: u64,
    window: usize,
    stats: ReorderStats,
}

impl<T: Sequenced> ReorderBuffer<T> {
    pub fn new(window: usize) -> Self {
        Self {
            heap: BinaryHeap::new(),
            next: 0,
            window,
            stats: ReorderStats::default(),
        }
    }

    pub fn pending(&self) -> usize {
        self.heap.len()
    }

    pub fn stats(&self) -> ReorderStats {
        self.stats
    }

    /// Accept one item and release everything that is now in order.
    pub fn push(&mut self, item: T, mut release: impl FnMut(T)) {
        let seq = item.seq();
        if seq < self.next {
            self.stats.stale += 1;
            tracing::debug!("Dropping stale item {} (expected {})", seq, self.next);
            return;
        }
        self.heap.push(Pending { seq, item });

        loop {
            self.release_ready(&mut release);
            if self.heap.len() <= self.window {
                break;
            }
            self.skip_gap(&mut release);
        }
    }

    /// Release everything still held, in order.
    pub fn flush(&mut self, mut release: impl FnMut(T)) {
        while !self.heap.is_empty() {
            self.skip_gap(&mut release);
            self.release_ready(&mut release);
        }
    }

    fn release_ready(&mut self, release: &mut impl FnMut(T)) {
        while self.heap.peek().is_some_and(|p| p.seq <= self.next) {
            if let Some(p) = self.heap.pop() {
                if p.seq < self.next {
                    // Duplicate of something already released.
                    self.stats.stale += 1;
                    continue;
                }
                self.next = p.seq + 1;
                self.stats.released += 1;
                release(p.item);
            }
        }
    }

    /// Give up on the missing numbers below the lowest pending item.
    fn skip_gap(&mut self, release: &mut impl FnMut(T)) {
        if let Some(p) = self.heap.pop() {
            if p.seq < self.next {
                self.stats.stale += 1;
                return;
            }
            self.stats.skipped += p.seq - self.next;
            self.next = p.seq + 1;
            self.stats.released += 1;
            release(p.item);
        }
    }
}

/// Single-instance transform that re-serializes a replicated stream.
pub struct Resequencer<T> {
    buffer: ReorderBuffer<T>,
}

impl<T: Sequenced> Resequencer<T> {
    pub fn new(window: usize) -> Self {
        Self {
            buffer: ReorderBuffer::new(window),
        }
    }
}

impl<T> Element for Resequencer<T>
where
    T: Sequenced + Send + 'static,
    T::Payload: Send + 'static,
{
    type Input = T;
    type Output = T::Payload;

    fn consume(
        &mut self,
        item: T,
        ctx: &mut ElementContext<'_, T::Payload>,
    ) -> ElementResult<()> {
        self.buffer.push(item, |ready| {
            if let Some(payload) = ready.into_payload() {
                ctx.emit(payload);
            }
        });
        Ok(())
    }

    fn finish(&mut self, ctx: &mut ElementContext<'_, T::Payload>) -> ElementResult<()> {
        self.buffer.flush(|ready| {
            if let Some(payload) = ready.into_payload() {
                ctx.emit(payload);
            }
        });
        Ok(())
    }

    fn cleanup(&mut self) -> ElementResult<()> {
        let stats = self.buffer.stats();
        tracing::debug!(
            "Resequencer released {}, skipped {}, dropped {} stale",
            stats.released,
            stats.skipped,
            stats.stale
        );
        Ok(())
    }
}
