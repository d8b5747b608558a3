//! Streaming dataflow pipeline with fan-out worker replication.
//!
//! Items flow through typed elements: Source → Transform → Sink. Every
//! element instance runs on its own OS thread and talks to its neighbours
//! only through bounded [`channel`]s, so a CPU-bound stage never stalls the
//! source feeding it.
//!
//! # Architecture
//!
//! ```text
//! [camera] ──► [blink_detector x R] ──► [ratio_plot]
//!                                  ├──► [recorder]
//!                                  └──► [resequencer] ──► [event_filter] ──► [beeper]
//!                                                                       └──► [announcer]
//! ```
//!
//! # Design
//!
//! - **Closed role set**: an element is a Source, Transform or Sink, fixed
//!   when its [`Stage`] is declared.
//! - **Replicas are independent instances**: a stage's factory builds one
//!   element per replica; nothing is shared between them.
//! - **Typed links**: [`Stage::link`] only compiles when the producer's
//!   output type is the consumer's input type.
//! - **One stop signal**: every blocking channel operation selects against
//!   it, so shutdown never deadlocks on a full or empty channel.

pub mod channel;
pub mod element;
pub mod error;
pub mod executor;
pub mod id;
pub mod nodes;
pub mod pool;
mod runner;
pub mod topology;

pub use channel::{
    channel, RecvError, SendError, SignalReceiver, SignalSender, StopSignal, TrySendError,
    DEFAULT_CHANNEL_CAPACITY,
};
pub use element::{Element, ElementContext, ElementState, InstanceStats, InstanceStatus, Role};
pub use error::{ElementError, ElementResult, PipelineError, PipelineResult};
pub use executor::{Pipeline, PipelineHandle, StopHandle};
pub use id::{InstanceId, StageId};
pub use pool::Stage;
pub use topology::{LinkSpec, StageSnapshot, TopologySnapshot};
