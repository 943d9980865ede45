//! Graph construction and depth-first cycle search

use conflux_types::{Processor, QueueName};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use thiserror::Error;
use tracing::debug;

/// A node in a processor topology
pub trait TopologyNode {
    type QueueId: Ord;

    fn name(&self) -> &str;

    fn inputs(&self) -> &BTreeSet<Self::QueueId>;

    fn outputs(&self) -> &BTreeSet<Self::QueueId>;
}

impl TopologyNode for Processor {
    type QueueId = QueueName;

    fn name(&self) -> &str {
        self.name.as_str()
    }

    fn inputs(&self) -> &BTreeSet<QueueName> {
        &self.inputs
    }

    fn outputs(&self) -> &BTreeSet<QueueName> {
        &self.outputs
    }
}

/// A witness cycle, in traversal order
///
/// The last node feeds the first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cycle {
    nodes: Vec<String>,
}

impl Cycle {
    pub fn nodes(&self) -> &[String] {
        &self.nodes
    }

    pub fn contains(&self, name: &str) -> bool {
        self.nodes.iter().any(|n| n == name)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

impl fmt::Display for Cycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for node in &self.nodes {
            write!(f, "{node} -> ")?;
        }
        match self.nodes.first() {
            Some(first) => f.write_str(first),
            None => Ok(()),
        }
    }
}

/// Topology validation errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TopologyError {
    #[error("processor topology contains a cycle: {0}")]
    Cycle(Cycle),
}

/// Reject a topology that contains any cycle
pub fn ensure_acyclic<N: TopologyNode>(nodes: &[N]) -> Result<(), TopologyError> {
    match find_cycle(nodes) {
        Some(cycle) => Err(TopologyError::Cycle(cycle)),
        None => Ok(()),
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unvisited,
    OnPath,
    Done,
}

struct Frame {
    node: usize,
    next_edge: usize,
}

/// Find one cycle in the topology, if any
pub fn find_cycle<N: TopologyNode>(nodes: &[N]) -> Option<Cycle> {
    if let Some(node) = nodes.iter().find(|n| !n.inputs().is_disjoint(n.outputs())) {
        debug!(node = node.name(), "Self-loop detected");
        return Some(Cycle {
            nodes: vec![node.name().to_string()],
        });
    }

    let edges = build_edges(nodes);
    let mut marks = vec![Mark::Unvisited; nodes.len()];
    let mut stack: Vec<Frame> = Vec::new();

    for start in 0..nodes.len() {
        if marks[start] != Mark::Unvisited {
            continue;
        }

        marks[start] = Mark::OnPath;
        stack.push(Frame {
            node: start,
            next_edge: 0,
        });

        while let Some(frame) = stack.last_mut() {
            let node = frame.node;
            let Some(&next) = edges[node].get(frame.next_edge) else {
                marks[node] = Mark::Done;
                stack.pop();
                continue;
            };
            frame.next_edge += 1;

            match marks[next] {
                Mark::OnPath => {
                    let from = stack
                        .iter()
                        .position(|f| f.node == next)
                        .unwrap_or_default();
                    let cycle = Cycle {
                        nodes: stack[from..]
                            .iter()
                            .map(|f| nodes[f.node].name().to_string())
                            .collect(),
                    };
                    debug!(cycle = %cycle, "Cycle detected");
                    return Some(cycle);
                }
                Mark::Unvisited => {
                    marks[next] = Mark::OnPath;
                    stack.push(Frame {
                        node: next,
                        next_edge: 0,
                    });
                }
                Mark::Done => {}
            }
        }
    }

    None
}

/// Adjacency lists: `edges[a]` holds one entry per (output of a, input of b) match
fn build_edges<N: TopologyNode>(nodes: &[N]) -> Vec<Vec<usize>> {
    let mut consumers: BTreeMap<&N::QueueId, Vec<usize>> = BTreeMap::new();
    for (idx, node) in nodes.iter().enumerate() {
        for queue in node.inputs() {
            consumers.entry(queue).or_default().push(idx);
        }
    }

    nodes
        .iter()
        .map(|node| {
            node.outputs()
                .iter()
                .filter_map(|queue| consumers.get(queue))
                .flatten()
                .copied()
                .collect()
        })
        .collect()
}
