//! Pipeline scheduler: graph assembly, startup and coordinated shutdown.
//!
//! Every element instance runs on its own OS thread. Startup is two-phase:
//! all instances run `prepare` concurrently and report back; only when every
//! one of them succeeded are they released into their run loops. A single
//! failed `prepare` stops the whole graph before anything reaches `Running`.
//!
//! Shutdown is driven by one [`StopSignal`], created with the [`Pipeline`]
//! so a [`StopHandle`] can be handed out before `start`. Triggering it wakes
//! every instance, including those blocked on a full or empty channel; each
//! then closes its outputs and runs `cleanup` exactly once. A stop request
//! that arrives while `prepare`s are still running aborts the startup.

use crate::pipeline::channel::StopSignal;
use crate::pipeline::element::{Element, ElementState, InstanceStats, InstanceStatus};
use crate::pipeline::error::{ElementError, PipelineError, PipelineResult};
use crate::pipeline::id::InstanceId;
use crate::pipeline::pool::{LaunchedInstance, Stage, StageLauncher};
use crate::pipeline::runner::{RunnerLinks, StartupReport};
use crate::pipeline::topology::{build_snapshot, StageSnapshot, TopologySnapshot};
use crossbeam_channel::{bounded, select, unbounded, Receiver, RecvTimeoutError};
use std::collections::HashMap;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

/// Builder for the element graph. Consumed by [`Pipeline::start`].
pub struct Pipeline {
    stages: Vec<Box<dyn StageLauncher>>,
    stop_timeout: Option<Duration>,
    stop: StopSignal,
}

impl Pipeline {
    pub fn new() -> Self {
        Self {
            stages: Vec::new(),
            stop_timeout: None,
            stop: StopSignal::new(),
        }
    }

    /// Handle to the signal the started pipeline will listen on.
    ///
    /// Taken before [`start`](Self::start), it can interrupt a slow startup.
    pub fn stop_handle(&self) -> StopHandle {
        StopHandle {
            stop: self.stop.clone(),
        }
    }

    /// Bound how long [`PipelineHandle::stop`] waits for cleanups.
    /// `None` waits indefinitely.
    pub fn with_stop_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.stop_timeout = timeout;
        self
    }

    /// Add a fully linked stage. Stage names must be unique.
    ///
    /// Links must be declared before the stage is added; a producer added
    /// without its links simply has no outputs.
    pub fn add<E>(&mut self, stage: Stage<E>) -> PipelineResult<&mut Self>
    where
        E: Element,
        E::Output: Clone,
    {
        if self.stages.iter().any(|s| s.name() == stage.name()) {
            return Err(PipelineError::DuplicateStage(stage.name().to_string()));
        }
        self.stages.push(Box::new(stage));
        Ok(self)
    }

    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }

    /// Validate the graph, spawn every instance and run all `prepare`s.
    ///
    /// Returns once every instance has prepared and been released into its
    /// run loop. If any `prepare` fails, or a stop is requested first, the
    /// graph is torn down (each instance still runs `cleanup`) and the first
    /// failure is returned.
    pub fn start(self) -> PipelineResult<PipelineHandle> {
        let snapshots: Vec<StageSnapshot> = self
            .stages
            .iter()
            .map(|s| StageSnapshot {
                id: s.id(),
                name: s.name().to_string(),
                role: s.role(),
                replicas: s.replicas(),
            })
            .collect();
        let links = self
            .stages
            .iter()
            .flat_map(|s| s.links().iter().cloned())
            .collect();
        let topology = build_snapshot(snapshots, links)?;

        let stop = self.stop;
        let (startup_tx, startup_rx) = unbounded::<StartupReport>();
        let (release_tx, release_rx) = bounded::<()>(0);
        let (done_tx, done_rx) = unbounded::<InstanceId>();
        let links = RunnerLinks {
            stop: stop.clone(),
            startup: startup_tx,
            release: release_rx,
            done: done_tx,
        };

        let mut launched: Vec<LaunchedInstance> = Vec::new();
        let mut spawn_error = None;
        for stage in self.stages {
            let (instances, err) = stage.launch(&links);
            launched.extend(instances);
            if let Some(e) = err {
                spawn_error = Some(e);
                break;
            }
        }
        // Only the runners hold these now.
        drop(links);

        let mut handle = PipelineHandle::new(launched, done_rx, stop, topology, self.stop_timeout);

        if let Some(e) = spawn_error {
            tracing::error!("Failed to spawn element thread: {}", e);
            handle.abort(release_tx);
            return Err(PipelineError::Spawn(e));
        }

        let mut failure: Option<PipelineError> = None;
        for _ in 0..handle.instances.len() {
            let received = select! {
                recv(startup_rx) -> msg => msg.ok(),
                recv(handle.stop.receiver()) -> _ => None,
            };
            let Some(report) = received else {
                if handle.stop.is_triggered() {
                    tracing::warn!("Stop requested while elements were preparing");
                    failure.get_or_insert(PipelineError::StartupInterrupted);
                } else {
                    // Every runner dropped its sender: someone panicked in prepare.
                    failure.get_or_insert(PipelineError::StartupFailure {
                        element: "<unknown>".to_string(),
                        source: ElementError::resource("element panicked during prepare"),
                    });
                }
                break;
            };
            if let Err(e) = report.result {
                tracing::error!("Element '{}' failed to prepare: {}", report.name, e);
                if failure.is_none() {
                    failure = Some(PipelineError::StartupFailure {
                        element: report.name,
                        source: e,
                    });
                }
            }
        }

        if failure.is_none() && handle.stop.is_triggered() {
            failure = Some(PipelineError::StartupInterrupted);
        }
        if let Some(failure) = failure {
            handle.abort(release_tx);
            return Err(failure);
        }

        // Release every runner into its run loop.
        drop(release_tx);
        tracing::info!(
            "Pipeline started: {} stage(s), {} instance(s)",
            handle.topology.stages.len(),
            handle.instances.len()
        );
        Ok(handle)
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new()
    }
}

/// Cloneable handle that can only request shutdown.
///
/// This is what an interrupt handler closes over.
#[derive(Clone, Debug)]
pub struct StopHandle {
    stop: StopSignal,
}

impl StopHandle {
    /// Request shutdown. Idempotent; returns `true` for the first request.
    pub fn stop(&self) -> bool {
        let first = self.stop.trigger();
        if first {
            tracing::info!("Pipeline stop requested");
        }
        first
    }

    pub fn is_stopped(&self) -> bool {
        self.stop.is_triggered()
    }
}

struct InstanceRecord {
    name: String,
    status: InstanceStatus,
    handle: Option<JoinHandle<()>>,
}

/// A running pipeline.
pub struct PipelineHandle {
    instances: HashMap<InstanceId, InstanceRecord>,
    done_rx: Receiver<InstanceId>,
    stop: StopSignal,
    topology: TopologySnapshot,
    stop_timeout: Option<Duration>,
}

impl PipelineHandle {
    fn new(
        launched: Vec<LaunchedInstance>,
        done_rx: Receiver<InstanceId>,
        stop: StopSignal,
        topology: TopologySnapshot,
        stop_timeout: Option<Duration>,
    ) -> Self {
        let instances = launched
            .into_iter()
            .map(|l| {
                (
                    l.id,
                    InstanceRecord {
                        name: l.name,
                        status: l.status,
                        handle: Some(l.handle),
                    },
                )
            })
            .collect();
        Self {
            instances,
            done_rx,
            stop,
            topology,
            stop_timeout,
        }
    }

    pub fn stop_handle(&self) -> StopHandle {
        StopHandle {
            stop: self.stop.clone(),
        }
    }

    pub fn topology(&self) -> &TopologySnapshot {
        &self.topology
    }

    /// Number of instances whose thread has not been joined yet.
    pub fn pending(&self) -> usize {
        self.instances
            .values()
            .filter(|r| r.handle.is_some())
            .count()
    }

    pub fn is_finished(&self) -> bool {
        self.pending() == 0
    }

    /// Current state of every instance, sorted by name.
    pub fn states(&self) -> Vec<(String, ElementState)> {
        let mut states: Vec<_> = self
            .instances
            .values()
            .map(|r| (r.name.clone(), r.status.state()))
            .collect();
        states.sort();
        states
    }

    /// Counters of every instance, sorted by name.
    pub fn stats(&self) -> Vec<(String, InstanceStats)> {
        let mut stats: Vec<_> = self
            .instances
            .values()
            .map(|r| (r.name.clone(), r.status.stats()))
            .collect();
        stats.sort_by(|a, b| a.0.cmp(&b.0));
        stats
    }

    /// Summed counters of every replica of `stage`.
    pub fn stage_stats(&self, stage: &str) -> InstanceStats {
        let Some(snapshot) = self.topology.stage(stage) else {
            return InstanceStats::default();
        };
        self.instances
            .iter()
            .filter(|(id, _)| id.stage == snapshot.id)
            .map(|(_, r)| r.status.stats())
            .fold(InstanceStats::default(), |acc, s| InstanceStats {
                consumed: acc.consumed + s.consumed,
                emitted: acc.emitted + s.emitted,
                filtered: acc.filtered + s.filtered,
                failures: acc.failures + s.failures,
                cleanups: acc.cleanups + s.cleanups,
            })
    }

    /// Block until every instance has stopped on its own (end of stream) or
    /// because the stop signal fired.
    pub fn wait(&mut self) {
        // No deadline: this only returns once all threads are joined.
        let _ = self.join_until(None);
        tracing::info!("Pipeline finished");
    }

    /// Block until every instance has stopped, or `timeout` elapses.
    pub fn wait_timeout(&mut self, timeout: Duration) -> PipelineResult<()> {
        self.join_until(Some(Instant::now() + timeout))
    }

    /// Signal every element to stop and wait for all cleanups.
    ///
    /// Idempotent: a second call returns immediately once everything has
    /// been joined.
    pub fn stop(&mut self) -> PipelineResult<()> {
        self.stop_handle().stop();
        let deadline = self.stop_timeout.map(|t| Instant::now() + t);
        let result = self.join_until(deadline);
        if let Err(PipelineError::StopTimeout { pending }) = &result {
            tracing::error!("{} element(s) did not stop in time", pending);
        }
        result
    }

    /// Tear down after a failed start.
    fn abort(&mut self, release_tx: crossbeam_channel::Sender<()>) {
        self.stop.trigger();
        drop(release_tx);
        if let Err(e) = self.join_until(self.stop_timeout.map(|t| Instant::now() + t)) {
            tracing::error!("Startup teardown incomplete: {}", e);
        }
    }

    fn join_until(&mut self, deadline: Option<Instant>) -> PipelineResult<()> {
        while self.pending() > 0 {
            let id = match deadline {
                None => match self.done_rx.recv() {
                    Ok(id) => id,
                    Err(_) => break,
                },
                Some(deadline) => match self.done_rx.recv_deadline(deadline) {
                    Ok(id) => id,
                    Err(RecvTimeoutError::Timeout) => {
                        return Err(PipelineError::StopTimeout {
                            pending: self.pending(),
                        })
                    }
                    Err(RecvTimeoutError::Disconnected) => break,
                },
            };
            if let Some(record) = self.instances.get_mut(&id) {
                if let Some(handle) = record.handle.take() {
                    if handle.join().is_err() {
                        tracing::error!("Element '{}' panicked", record.name);
                    }
                }
            }
        }
        Ok(())
    }
}

impl Drop for PipelineHandle {
    fn drop(&mut self) {
        if !self.is_finished() {
            self.stop.trigger();
            let _ = self.join_until(self.stop_timeout.map(|t| Instant::now() + t));
        }
    }
}
