//! Object Graph
//!
//! This module turns a root object and its declared associations into a
//! directed graph of persistable units that a cascading write, update or
//! delete can walk deterministically.
//!
//! # Overview
//!
//! - Nodes are persistable units, identified by `(type, primary key)`
//! - Links are directed parent-to-child associations carrying multiplicity,
//!   mapping name, shared-key and join-table flags, and the cascade set
//!
//! # Design Decisions
//!
//! 1. Nodes live in a unit-of-work [`NodeCache`], not in the graph. The
//!    cache's atomic get-or-create guarantees one node per identity, which
//!    is what makes cyclic object graphs terminate.
//!
//! 2. Links reference nodes by [`NodeId`], so object cycles never turn into
//!    reference cycles between nodes.
//!
//! 3. Each link record is shared by both of its endpoints, so parent and
//!    child always agree on the relation's metadata.

mod builder;
mod cache;
mod generator;
mod link;
mod node;
mod object_graph;
mod scheduler;

pub use builder::GraphBuilder;
pub use cache::NodeCache;
pub use generator::GraphGenerator;
pub use link::{LinkProperties, NodeLink};
pub use node::{Node, NodeId};
pub use object_graph::{DeferredAssociation, GraphSnapshot, ObjectGraph};
pub use scheduler::CascadeScheduler;
