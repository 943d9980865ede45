//! Conflux Topology - Cycle detection over processor graphs
//!
//! A tenant's processors form a directed graph: processor A feeds processor B
//! whenever one of A's output queues is one of B's input queues. A deployment
//! is only accepted while that graph is acyclic, and the check runs before
//! any cloud resource is touched.
//!
//! ## Detection
//!
//! 1. A node whose inputs and outputs intersect is a cycle on its own; this
//!    is reported before any graph is built.
//! 2. Otherwise edges are built for every (output, input) match, fan-out and
//!    fan-in included, and a depth-first search runs over an explicit frame
//!    stack. Reaching a node that is still on the current path yields the path
//!    slice from that node to the top as the witness.
//!
//! Exactly one witness is reported, not necessarily the shortest. Traversal
//! follows the input order of nodes and their edges, so the witness is
//! deterministic for a given input.

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]
#![cfg_attr(not(feature = "strict-docs"), allow(missing_docs))]

mod graph;

pub use graph::{ensure_acyclic, find_cycle, Cycle, TopologyError, TopologyNode};
