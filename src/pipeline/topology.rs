//! Graph validation and topology snapshots.
//!
//! Links are declared on typed [`Stage`](crate::pipeline::Stage)s before the
//! stages are handed to the pipeline, so the scheduler only sees the
//! recorded [`LinkSpec`]s. Before anything is spawned it checks that every
//! link points at a stage that was actually added and that the graph is
//! acyclic.

use crate::pipeline::element::Role;
use crate::pipeline::error::{PipelineError, PipelineResult};
use crate::pipeline::id::StageId;
use std::collections::HashMap;
use std::fmt;

/// A directed edge `producer → consumer`, where the consumer runs with
/// `replicas` parallel instances.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkSpec {
    pub producer: StageId,
    pub consumer: StageId,
    pub producer_name: String,
    pub consumer_name: String,
    pub replicas: u16,
}

/// Snapshot of a single declared stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageSnapshot {
    pub id: StageId,
    pub name: String,
    pub role: Role,
    pub replicas: u16,
}

/// Complete topology snapshot of the pipeline graph.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TopologySnapshot {
    /// Stages in a valid execution (topological) order.
    pub stages: Vec<StageSnapshot>,
    pub links: Vec<LinkSpec>,
}

impl TopologySnapshot {
    pub fn stage(&self, name: &str) -> Option<&StageSnapshot> {
        self.stages.iter().find(|s| s.name == name)
    }

    /// Total number of element instances across all stages.
    pub fn instance_count(&self) -> usize {
        self.stages.iter().map(|s| s.replicas as usize).sum()
    }

    /// Names of the stages fed by `name`.
    pub fn consumers_of(&self, name: &str) -> Vec<&str> {
        self.links
            .iter()
            .filter(|l| l.producer_name == name)
            .map(|l| l.consumer_name.as_str())
            .collect()
    }
}

impl fmt::Display for TopologySnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for stage in &self.stages {
            let consumers = self.consumers_of(&stage.name);
            write!(f, "{} [{} x{}]", stage.name, stage.role, stage.replicas)?;
            if !consumers.is_empty() {
                write!(f, " -> {}", consumers.join(", "))?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

/// Validate the declared graph and return it in topological order.
pub(crate) fn build_snapshot(
    stages: Vec<StageSnapshot>,
    links: Vec<LinkSpec>,
) -> PipelineResult<TopologySnapshot> {
    if stages.is_empty() {
        return Err(PipelineError::EmptyPipeline);
    }

    let index: HashMap<StageId, usize> = stages
        .iter()
        .enumerate()
        .map(|(i, s)| (s.id, i))
        .collect();

    for link in &links {
        if !index.contains_key(&link.consumer) {
            return Err(PipelineError::InvalidLink(format!(
                "'{}' links to '{}', which was never added to the pipeline",
                link.producer_name, link.consumer_name
            )));
        }
    }

    // Kahn's algorithm
    let n = stages.len();
    let mut in_degree = vec![0u32; n];
    let mut adj: Vec<Vec<usize>> = vec![Vec::new(); n];
    for link in &links {
        let from = index[&link.producer];
        let to = index[&link.consumer];
        adj[from].push(to);
        in_degree[to] += 1;
    }

    for (i, stage) in stages.iter().enumerate() {
        if in_degree[i] == 0 && stage.role != Role::Source {
            tracing::warn!(
                "Stage '{}' has no producers and will see end-of-stream immediately",
                stage.name
            );
        }
    }

    let mut queue: Vec<usize> = (0..n).filter(|&i| in_degree[i] == 0).rev().collect();
    let mut order = Vec::with_capacity(n);
    while let Some(node) = queue.pop() {
        order.push(node);
        for &next in adj[node].iter().rev() {
            in_degree[next] -= 1;
            if in_degree[next] == 0 {
                queue.push(next);
            }
        }
    }

    if order.len() != n {
        tracing::warn!(
            "Pipeline graph has a cycle! Only {} of {} stages could be ordered.",
            order.len(),
            n
        );
        return Err(PipelineError::CycleDetected);
    }

    let mut slots: Vec<Option<StageSnapshot>> = stages.into_iter().map(Some).collect();
    let ordered = order
        .into_iter()
        .filter_map(|i| slots[i].take())
        .collect();

    Ok(TopologySnapshot {
        stages: ordered,
        links,
    })
}
