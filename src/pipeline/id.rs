//! Identity types for the pipeline system.
//!
//! Stage ids are newtypes over `u32` drawn from a process-wide counter when a
//! [`Stage`](crate::pipeline::Stage) is declared, so ids never repeat across
//! pipelines.

use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};

/// Identifies one declared stage (all replicas of one element type).
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StageId(pub u32);

impl StageId {
    /// Allocate a process-unique stage id.
    pub(crate) fn next() -> Self {
        static NEXT: AtomicU32 = AtomicU32::new(0);
        StageId(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Debug for StageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StageId({})", self.0)
    }
}

impl fmt::Display for StageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// One running element instance: a stage plus its replica index.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct InstanceId {
    pub stage: StageId,
    pub replica: u16,
}

impl fmt::Debug for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "InstanceId(stage={}, replica={})", self.stage.0, self.replica)
    }
}
