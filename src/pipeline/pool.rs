//! Stage declarations and worker-pool fan-out.
//!
//! A [`Stage`] declares one element type under one name, its [`Role`], and a
//! replication factor `R`. Declaring a replicated stage builds `R`
//! independent element instances from a factory (no state is shared between
//! them); at launch each runs on its own thread. All replicas drain one
//! shared inbound channel, so every item goes to exactly one replica.
//!
//! # Ordering
//!
//! With `R > 1` the relative order of outputs is not preserved: two replicas
//! finishing at different speeds can overtake each other. Consumers that
//! care about order must be fed by a single-replica stage or sit behind a
//! [`Resequencer`](crate::pipeline::nodes::Resequencer).

use crate::pipeline::channel::{channel, SignalReceiver, SignalSender};
use crate::pipeline::element::{Element, InstanceStatus, Role};
use crate::pipeline::error::{PipelineError, PipelineResult};
use crate::pipeline::id::{InstanceId, StageId};
use crate::pipeline::runner::{Inbound, Runner, RunnerLinks};
use crate::pipeline::topology::LinkSpec;
use std::thread::JoinHandle;

/// A declared stage: `replicas` instances of one element type.
pub struct Stage<E: Element> {
    id: StageId,
    name: String,
    role: Role,
    replicas: u16,
    elements: Vec<E>,
    input: StageInput<E::Input>,
    outbound: Vec<SignalSender<E::Output>>,
    links: Vec<LinkSpec>,
}

/// How a stage's instances obtain their inputs.
enum StageInput<I> {
    Synthesized(fn() -> I),
    Channel {
        tx: SignalSender<I>,
        rx: SignalReceiver<I>,
    },
}

fn unit() {}

impl<E> Stage<E>
where
    E: Element<Input = ()>,
{
    /// Declare a single-instance source.
    pub fn source(name: impl Into<String>, element: E) -> Self {
        Self::declare(
            name.into(),
            Role::Source,
            vec![element],
            StageInput::Synthesized(unit),
        )
    }
}

impl<E> Stage<E>
where
    E: Element,
{
    /// Declare a transform replicated `replicas` times (at least once).
    ///
    /// `capacity` bounds the shared inbound channel.
    pub fn transform(
        name: impl Into<String>,
        replicas: u16,
        capacity: usize,
        factory: impl FnMut(u16) -> E,
    ) -> Self {
        Self::declare(
            name.into(),
            Role::Transform,
            build(replicas, factory),
            StageInput::channel(capacity),
        )
    }

    /// Declare a single-instance transform from a ready element.
    pub fn single_transform(name: impl Into<String>, capacity: usize, element: E) -> Self {
        Self::declare(
            name.into(),
            Role::Transform,
            vec![element],
            StageInput::channel(capacity),
        )
    }

    fn declare(name: String, role: Role, elements: Vec<E>, input: StageInput<E::Input>) -> Self {
        Self {
            id: StageId::next(),
            name,
            role,
            replicas: elements.len() as u16,
            elements,
            input,
            outbound: Vec::new(),
            links: Vec::new(),
        }
    }

    pub fn id(&self) -> StageId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn replicas(&self) -> u16 {
        self.replicas
    }

    /// Links declared from this stage so far.
    pub fn links(&self) -> &[LinkSpec] {
        &self.links
    }

    /// Add an outbound link to `consumer`.
    ///
    /// Linking one producer to several consumers broadcasts every output to
    /// each of them. Linking several producers to one consumer merges their
    /// outputs into the consumer's inbound channel.
    pub fn link<F>(&mut self, consumer: &Stage<F>) -> PipelineResult<&mut Self>
    where
        F: Element<Input = E::Output>,
    {
        if !self.role.can_produce() {
            return Err(PipelineError::InvalidLink(format!(
                "'{}' is a {} and cannot produce",
                self.name, self.role
            )));
        }
        let StageInput::Channel { tx, .. } = &consumer.input else {
            return Err(PipelineError::InvalidLink(format!(
                "'{}' is a {} and cannot consume",
                consumer.name, consumer.role
            )));
        };
        if consumer.id == self.id {
            return Err(PipelineError::InvalidLink(format!(
                "'{}' cannot link to itself",
                self.name
            )));
        }
        if self.links.iter().any(|l| l.consumer == consumer.id) {
            return Err(PipelineError::InvalidLink(format!(
                "'{}' is already linked to '{}'",
                self.name, consumer.name
            )));
        }

        self.outbound.push(tx.clone());
        self.links.push(LinkSpec {
            producer: self.id,
            consumer: consumer.id,
            producer_name: self.name.clone(),
            consumer_name: consumer.name.clone(),
            replicas: consumer.replicas,
        });
        Ok(self)
    }
}

impl<I> StageInput<I> {
    fn channel(capacity: usize) -> Self {
        let (tx, rx) = channel(capacity);
        StageInput::Channel { tx, rx }
    }
}

/// One independent instance per replica, at least one.
fn build<E>(replicas: u16, factory: impl FnMut(u16) -> E) -> Vec<E> {
    (0..replicas.max(1)).map(factory).collect()
}

/// Replica names carry a `#n` suffix only when there is more than one.
fn instance_name(stage: &str, replicas: u16, replica: u16) -> String {
    if replicas > 1 {
        format!("{}#{}", stage, replica)
    } else {
        stage.to_string()
    }
}

impl<E> Stage<E>
where
    E: Element<Output = ()>,
{
    /// Declare a sink replicated `replicas` times (usually once).
    pub fn sink(
        name: impl Into<String>,
        replicas: u16,
        capacity: usize,
        factory: impl FnMut(u16) -> E,
    ) -> Self {
        Self::declare(
            name.into(),
            Role::Sink,
            build(replicas, factory),
            StageInput::channel(capacity),
        )
    }

    /// Declare a single-instance sink from a ready element.
    pub fn single_sink(name: impl Into<String>, capacity: usize, element: E) -> Self {
        Self::declare(
            name.into(),
            Role::Sink,
            vec![element],
            StageInput::channel(capacity),
        )
    }
}

/// One spawned element instance.
pub(crate) struct LaunchedInstance {
    pub id: InstanceId,
    pub name: String,
    pub status: InstanceStatus,
    pub handle: JoinHandle<()>,
}

/// Type-erased stage, so heterogeneous stages can live in one pipeline.
pub(crate) trait StageLauncher: Send {
    fn id(&self) -> StageId;
    fn name(&self) -> &str;
    fn role(&self) -> Role;
    fn replicas(&self) -> u16;
    fn links(&self) -> &[LinkSpec];

    /// Spawn every replica. Instances spawned before an error are returned
    /// alongside it so the caller can still shut them down.
    fn launch(
        self: Box<Self>,
        links: &RunnerLinks,
    ) -> (Vec<LaunchedInstance>, Option<std::io::Error>);
}

impl<E> StageLauncher for Stage<E>
where
    E: Element,
    E::Output: Clone,
{
    fn id(&self) -> StageId {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn role(&self) -> Role {
        self.role
    }

    fn replicas(&self) -> u16 {
        self.replicas
    }

    fn links(&self) -> &[LinkSpec] {
        &self.links
    }

    fn launch(
        self: Box<Self>,
        links: &RunnerLinks,
    ) -> (Vec<LaunchedInstance>, Option<std::io::Error>) {
        let Stage {
            id: stage_id,
            name: stage_name,
            role,
            replicas,
            elements,
            input,
            outbound,
            ..
        } = *self;

        // Only producers hold senders from here on; our own copy is dropped
        // so the channel closes when they do.
        let inbound = match input {
            StageInput::Synthesized(make) => Inbound::Synthesized(make),
            StageInput::Channel { tx, rx } => {
                drop(tx);
                Inbound::Channel(rx)
            }
        };
        let mut launched = Vec::with_capacity(replicas as usize);

        for (replica, element) in (0u16..).zip(elements) {
            let id = InstanceId {
                stage: stage_id,
                replica,
            };
            let name = instance_name(&stage_name, replicas, replica);
            let status = InstanceStatus::new();
            let runner = Runner {
                element,
                name: name.clone(),
                id,
                inbound: inbound.clone(),
                outbound: outbound.clone(),
                status: status.clone(),
            };
            let runner_links = links.clone();

            let spawned = std::thread::Builder::new()
                .name(name.clone())
                .spawn(move || runner.run(runner_links));
            match spawned {
                Ok(handle) => launched.push(LaunchedInstance {
                    id,
                    name,
                    status,
                    handle,
                }),
                Err(e) => return (launched, Some(e)),
            }
        }

        tracing::debug!(
            "Launched stage '{}' ({}, {} replica(s), {} outbound link(s))",
            stage_name,
            role,
            replicas,
            outbound.len()
        );
        (launched, None)
    }
}
