//! `hwir` — a typed, hierarchical hardware intermediate representation with
//! VHDL and graphviz DOT back-ends.
//!
//! Callers build [`types::Type`]s, wire up [`node::Node`]s and
//! [`graph::Edge`]s inside a [`graph::Component`], instantiate child
//! components, and hand the finished component to [`backend::vhdl`] or
//! [`backend::dot`] for emission. See `SPEC_FULL.md` for the full design.

pub mod array;
pub mod backend;
pub mod error;
pub mod flatten;
pub mod graph;
pub mod name;
pub mod node;
pub mod pool;
pub mod types;
pub mod value;

pub use backend::{Job, OutputSpec};
pub use error::{Error, Result};
pub use graph::{Component, Edge, Instance};
pub use node::{Direction, Domain, EndpointId, Node, NodeId, Op};
pub use pool::{booll, intl, strl, LiteralId, Pools};
pub use types::{bit, boolean, field, integer, record, string, vector, Field, Type};
pub use value::Value;
