//! Node kinds and their common contract (design doc §3, §4.D).
//!
//! A [`Node`] lives in exactly one [`crate::graph::Component`]'s arena; its
//! [`NodeId`] is only ever valid against that arena, mirroring
//! `scir::SignalId`/`InstanceId`'s documented per-cell scoping. A literal is
//! deliberately *not* addressed by `NodeId`: it lives in the process-scoped
//! [`crate::pool::LiteralPool`] and is referenced through [`EndpointId`]
//! instead, since the same literal may be the source of edges in many
//! different components at once.

use arcstr::ArcStr;
use indexmap::IndexMap;

use crate::array::ArrayId;
use crate::pool::LiteralId;
use crate::types::Type;

/// Arbitrary string-keyed metadata attached to graphs, nodes, arrays and
/// edges (external interfaces §6: "every graph, object, and edge has a
/// `Map<String, String>` for back-end-specific annotations").
pub type Meta = IndexMap<ArcStr, ArcStr>;

/// Opaque handle to a [`Node`], valid only against the
/// [`crate::graph::Component`] that minted it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) u64);

/// Opaque handle to an [`crate::graph::Edge`], valid only against the
/// `Component` that minted it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EdgeId(pub(crate) u64);

/// A reference to something that can drive an edge or an expression
/// operand: either a node local to some component's arena, or a
/// process-pool-shared literal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EndpointId {
    Local(NodeId),
    Literal(LiteralId),
}

impl From<NodeId> for EndpointId {
    fn from(id: NodeId) -> Self {
        EndpointId::Local(id)
    }
}

impl From<LiteralId> for EndpointId {
    fn from(id: LiteralId) -> Self {
        EndpointId::Literal(id)
    }
}

/// Port direction, as seen from the owning graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    In,
    Out,
}

impl Direction {
    pub fn flip(self) -> Direction {
        match self {
            Direction::In => Direction::Out,
            Direction::Out => Direction::In,
        }
    }
}

/// An identity-compared named synchronization domain (data model §3). Two
/// domains are the same iff their names match; there is no unification.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Domain(pub ArcStr);

impl Domain {
    pub fn new(name: impl Into<ArcStr>) -> Self {
        Domain(name.into())
    }
}

/// The four-arity arithmetic operators of the expression core (design doc
/// §4.C).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    Add,
    Sub,
    Mul,
    Div,
}

impl Op {
    pub fn symbol(self) -> &'static str {
        match self {
            Op::Add => "+",
            Op::Sub => "-",
            Op::Mul => "*",
            Op::Div => "/",
        }
    }
}

/// The per-node payload distinguishing the four graph-local node kinds.
/// `Literal` is intentionally absent: see the module doc.
#[derive(Debug, Clone)]
pub enum NodeKind {
    /// Single-input, multi-output, must be attached to a parent graph.
    Port { dir: Direction, domain: Option<Domain> },
    /// Single-input, multi-output wire internal to a component.
    Signal { domain: Option<Domain> },
    /// Single-input, multi-output; its default is always driven on it at
    /// construction.
    Parameter { default: LiteralId },
    /// No input, multi-output; owned by the parent graph of its operands.
    Expression {
        op: Op,
        lhs: EndpointId,
        rhs: EndpointId,
    },
}

impl NodeKind {
    /// `true` for kinds that accept at most one input edge (all but
    /// `Expression`, which has no input slot at all).
    pub fn accepts_input(&self) -> bool {
        !matches!(self, NodeKind::Expression { .. })
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            NodeKind::Port { .. } => "port",
            NodeKind::Signal { .. } => "signal",
            NodeKind::Parameter { .. } => "parameter",
            NodeKind::Expression { .. } => "expression",
        }
    }
}

/// A node owned by a single component's arena.
#[derive(Debug, Clone)]
pub struct Node {
    pub id: NodeId,
    pub name: ArcStr,
    pub ty: Type,
    pub kind: NodeKind,
    pub meta: Meta,
    pub(crate) input: Option<EdgeId>,
    pub(crate) outputs: Vec<EdgeId>,
    pub(crate) array: Option<ArrayId>,
}

impl Node {
    pub(crate) fn new(id: NodeId, name: impl Into<ArcStr>, ty: Type, kind: NodeKind) -> Self {
        Node {
            id,
            name: name.into(),
            ty,
            kind,
            meta: Meta::new(),
            input: None,
            outputs: Vec::new(),
            array: None,
        }
    }

    pub fn is_port(&self) -> bool {
        matches!(self.kind, NodeKind::Port { .. })
    }

    pub fn is_signal(&self) -> bool {
        matches!(self.kind, NodeKind::Signal { .. })
    }

    pub fn is_parameter(&self) -> bool {
        matches!(self.kind, NodeKind::Parameter { .. })
    }

    pub fn is_expression(&self) -> bool {
        matches!(self.kind, NodeKind::Expression { .. })
    }

    pub fn direction(&self) -> Option<Direction> {
        match &self.kind {
            NodeKind::Port { dir, .. } => Some(*dir),
            _ => None,
        }
    }

    pub fn domain(&self) -> Option<&Domain> {
        match &self.kind {
            NodeKind::Port { domain, .. } | NodeKind::Signal { domain, .. } => domain.as_ref(),
            _ => None,
        }
    }

    /// The edge currently driving this node, if any.
    pub fn input(&self) -> Option<EdgeId> {
        self.input
    }

    /// Every edge sourced from this node.
    pub fn outputs(&self) -> &[EdgeId] {
        &self.outputs
    }

    /// The array this node is a child of, if it was produced by
    /// `NodeArray::append`.
    pub fn array(&self) -> Option<ArrayId> {
        self.array
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn direction_flip_is_involutive() {
        assert_eq!(Direction::In.flip(), Direction::Out);
        assert_eq!(Direction::Out.flip().flip(), Direction::Out);
    }

    #[test]
    fn expression_has_no_input_slot() {
        let kind = NodeKind::Expression {
            op: Op::Add,
            lhs: EndpointId::Local(NodeId(0)),
            rhs: EndpointId::Local(NodeId(1)),
        };
        assert!(!kind.accepts_input());
    }
}
