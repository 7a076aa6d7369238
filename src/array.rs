//! Node arrays (design doc §3, §4.D last paragraph).
//!
//! A `NodeArray` is data only here: the base template, the size node, and
//! the list of concrete children. The append algorithm — clone the base,
//! optionally bump the size node — needs a live arena to allocate fresh
//! node ids and (for parameter/expression sizes) build new nodes, so it
//! lives on [`crate::graph::Component`] instead.

use arcstr::ArcStr;

use crate::node::{EndpointId, Meta, NodeId};

/// Opaque handle to a [`NodeArray`], valid only against the owning
/// component's arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ArrayId(pub(crate) u64);

/// An ordered collection of nodes sharing a base template and a size node.
#[derive(Debug, Clone)]
pub struct NodeArray {
    pub id: ArrayId,
    pub name: ArcStr,
    /// The template node every child is cloned from.
    pub base: NodeId,
    /// A literal, parameter, or expression node giving the current size.
    pub size: EndpointId,
    pub children: Vec<NodeId>,
    pub meta: Meta,
}

impl NodeArray {
    pub(crate) fn new(id: ArrayId, name: impl Into<ArcStr>, base: NodeId, size: EndpointId) -> Self {
        NodeArray {
            id,
            name: name.into(),
            base,
            size,
            children: Vec::new(),
            meta: Meta::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.children.len()
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<NodeId> {
        self.children.get(index).copied()
    }
}
