//! Graph: `Component` and `Instance` (design doc §4.F, §4.G).
//!
//! Grounded on `scir::Cell`/`scir::Instance`: a `Component` is one arena
//! (`IndexMap`-backed, insertion order preserved for deterministic
//! emission) that owns every node, array, edge and child instance it ever
//! creates — including the node copies that live "inside" an instance.
//! `NodeId`/`ArrayId`/`EdgeId`/`InstanceId` are opaque handles scoped to
//! that one arena, the same discipline `scir::SignalId` documents for its
//! own per-cell ids.

use std::collections::HashMap;

use arcstr::ArcStr;
use indexmap::IndexMap;
use tracing::warn;

use crate::array::{ArrayId, NodeArray};
use crate::error::{Error, Result};
use crate::flatten::get_or_make_mapper;
use crate::name::NameSet;
use crate::node::{Direction, Domain, EndpointId, Meta, Node, NodeId, NodeKind, Op};
use crate::pool::{literal_type, LiteralValue, Pools};
use crate::types::Type;

/// Opaque handle to an [`Instance`], valid only against the parent
/// component's arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstanceId(u64);

/// Opaque handle to an [`Edge`], re-exported here for convenience.
pub use crate::node::EdgeId;

/// A directed, named edge between two endpoints (data model §3). Both
/// endpoints "store" the edge via each node's `input`/`outputs` list.
#[derive(Debug, Clone)]
pub struct Edge {
    pub id: EdgeId,
    pub name: ArcStr,
    pub src: EndpointId,
    pub dst: EndpointId,
}

/// A placed usage of a component inside another component's graph
/// (glossary). Owns no nodes of its own — its ports/parameters/port-arrays
/// are copies that live in the parent `Component`'s arena, recorded here by
/// name and cross-referenced back to the source component via
/// `inst_to_comp`.
#[derive(Debug, Clone)]
pub struct Instance {
    pub id: InstanceId,
    pub name: ArcStr,
    pub component_name: ArcStr,
    pub ports: IndexMap<ArcStr, NodeId>,
    pub params: IndexMap<ArcStr, NodeId>,
    pub port_arrays: IndexMap<ArcStr, ArrayId>,
    /// Instance-local node id -> the source component's node id it was
    /// copied from (used by the VHDL signalization pass).
    pub inst_to_comp: IndexMap<NodeId, NodeId>,
    pub meta: Meta,
}

impl Instance {
    /// Looks up a copied port by name (external interfaces §6:
    /// `Instance::ap(name)`).
    pub fn ap(&self, name: &str) -> Result<NodeId> {
        self.ports
            .get(name)
            .copied()
            .ok_or_else(|| Error::NoSuchObject("port", ArcStr::from(name), self.name.clone()))
    }

    /// Looks up a copied parameter by name.
    pub fn aparam(&self, name: &str) -> Result<NodeId> {
        self.params
            .get(name)
            .copied()
            .ok_or_else(|| Error::NoSuchObject("parameter", ArcStr::from(name), self.name.clone()))
    }

    /// Looks up a copied port-array by name.
    pub fn aarr(&self, name: &str) -> Result<ArrayId> {
        self.port_arrays
            .get(name)
            .copied()
            .ok_or_else(|| Error::NoSuchObject("port array", ArcStr::from(name), self.name.clone()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ObjectRef {
    Node(NodeId),
    Array(ArrayId),
}

/// A named, owning graph (glossary: "reusable graph unit with an external
/// interface"). Everything reachable from it — its own nodes, its
/// instances' copied nodes, its arrays, its edges — lives in this one
/// arena.
#[derive(Debug, Clone)]
pub struct Component {
    name: ArcStr,
    nodes: IndexMap<NodeId, Node>,
    arrays: IndexMap<ArrayId, NodeArray>,
    edges: IndexMap<EdgeId, Edge>,
    instances: IndexMap<InstanceId, Instance>,
    objects: IndexMap<ArcStr, ObjectRef>,
    names: NameSet,
    expr_cache: HashMap<(Op, EndpointId, EndpointId), NodeId>,
    was_instantiated: bool,
    pub meta: Meta,
    next_node: u64,
    next_array: u64,
    next_edge: u64,
    next_instance: u64,
}

impl Component {
    pub fn new(name: impl Into<ArcStr>) -> Self {
        Component {
            name: name.into(),
            nodes: IndexMap::new(),
            arrays: IndexMap::new(),
            edges: IndexMap::new(),
            instances: IndexMap::new(),
            objects: IndexMap::new(),
            names: NameSet::new(),
            expr_cache: HashMap::new(),
            was_instantiated: false,
            meta: Meta::new(),
            next_node: 0,
            next_array: 0,
            next_edge: 0,
            next_instance: 0,
        }
    }

    pub fn name(&self) -> &ArcStr {
        &self.name
    }

    pub fn was_instantiated(&self) -> bool {
        self.was_instantiated
    }

    fn fresh_node_id(&mut self) -> NodeId {
        let id = NodeId(self.next_node);
        self.next_node += 1;
        id
    }

    fn fresh_array_id(&mut self) -> ArrayId {
        let id = ArrayId(self.next_array);
        self.next_array += 1;
        id
    }

    fn fresh_edge_id(&mut self) -> EdgeId {
        let id = EdgeId(self.next_edge);
        self.next_edge += 1;
        id
    }

    fn fresh_instance_id(&mut self) -> InstanceId {
        let id = InstanceId(self.next_instance);
        self.next_instance += 1;
        id
    }

    fn check_not_frozen(&self, op: &'static str) -> Result<()> {
        if self.was_instantiated && matches!(op, "port" | "parameter") {
            return Err(Error::Frozen(self.name.clone()));
        }
        Ok(())
    }

    fn reserve_name(&mut self, name: &str) -> Result<()> {
        if !self.names.reserve(name) {
            return Err(Error::DuplicateName(ArcStr::from(name), "component"));
        }
        Ok(())
    }

    fn insert_node(&mut self, node: Node) -> Result<NodeId> {
        self.reserve_name(&node.name)?;
        let id = node.id;
        self.objects.insert(node.name.clone(), ObjectRef::Node(id));
        self.nodes.insert(id, node);
        Ok(id)
    }

    // --- node factories (external interfaces §6) ---

    pub fn port(&mut self, name: impl Into<ArcStr>, ty: Type, dir: Direction) -> Result<NodeId> {
        self.port_with_domain(name, ty, dir, None)
    }

    pub fn port_with_domain(
        &mut self,
        name: impl Into<ArcStr>,
        ty: Type,
        dir: Direction,
        domain: Option<Domain>,
    ) -> Result<NodeId> {
        self.check_not_frozen("port")?;
        let id = self.fresh_node_id();
        let name = name.into();
        self.insert_node(Node::new(id, name, ty, NodeKind::Port { dir, domain }))
    }

    pub fn signal(&mut self, name: impl Into<ArcStr>, ty: Type) -> Result<NodeId> {
        self.signal_with_domain(name, ty, None)
    }

    pub fn signal_with_domain(
        &mut self,
        name: impl Into<ArcStr>,
        ty: Type,
        domain: Option<Domain>,
    ) -> Result<NodeId> {
        let id = self.fresh_node_id();
        let name = name.into();
        let node_id = self.insert_node(Node::new(id, name, ty, NodeKind::Signal { domain }))?;
        Ok(node_id)
    }

    /// A parameter node; its default is driven onto it immediately (data
    /// model §3: "its default is always driven on it at construction").
    pub fn parameter(&mut self, pools: &mut Pools, name: impl Into<ArcStr>, ty: Type, default: crate::pool::LiteralId) -> Result<NodeId> {
        self.check_not_frozen("parameter")?;
        let id = self.fresh_node_id();
        let name = name.into();
        let node_id = self.insert_node(Node::new(id, name, ty, NodeKind::Parameter { default }))?;
        self.connect(pools, EndpointId::Local(node_id), EndpointId::Literal(default))?;
        Ok(node_id)
    }

    /// A shared expression node (design doc §4.C): requesting the same
    /// `(op, lhs, rhs)` twice returns the same `NodeId`.
    pub fn expr(&mut self, op: Op, lhs: EndpointId, rhs: EndpointId) -> Result<NodeId> {
        if let Some(id) = self.expr_cache.get(&(op, lhs, rhs)) {
            return Ok(*id);
        }
        let lhs_name = self.endpoint_display(lhs)?;
        let rhs_name = self.endpoint_display(rhs)?;
        let candidate = crate::name::sanitize(&format!("{lhs_name}_{}_{rhs_name}", op.symbol()));
        // Reserves the name itself (suffixing on collision); inserted directly
        // below rather than through `insert_node`, which would try to reserve
        // it a second time and fail.
        let name = self.names.alloc_suffixed(&candidate, "_e");
        let id = self.fresh_node_id();
        let ty = crate::types::integer();
        self.objects.insert(name.clone(), ObjectRef::Node(id));
        self.nodes
            .insert(id, Node::new(id, name, ty, NodeKind::Expression { op, lhs, rhs }));
        self.expr_cache.insert((op, lhs, rhs), id);
        Ok(id)
    }

    fn endpoint_display(&self, ep: EndpointId) -> Result<ArcStr> {
        match ep {
            EndpointId::Local(id) => Ok(self.node(id)?.name.clone()),
            EndpointId::Literal(_) => Ok(ArcStr::from("lit")),
        }
    }

    pub fn port_array(
        &mut self,
        name: impl Into<ArcStr>,
        base_ty: Type,
        dir: Direction,
        size: EndpointId,
    ) -> Result<ArrayId> {
        self.check_not_frozen("port")?;
        self.new_array(name, base_ty, NodeKind::Port { dir, domain: None }, size)
    }

    pub fn signal_array(&mut self, name: impl Into<ArcStr>, base_ty: Type, size: EndpointId) -> Result<ArrayId> {
        self.new_array(name, base_ty, NodeKind::Signal { domain: None }, size)
    }

    fn new_array(
        &mut self,
        name: impl Into<ArcStr>,
        base_ty: Type,
        base_kind: NodeKind,
        size: EndpointId,
    ) -> Result<ArrayId> {
        let name = name.into();
        self.reserve_name(&name)?;
        let base_id = self.fresh_node_id();
        let base_name = arcstr::format!("{name}_base");
        let mut base_node = Node::new(base_id, base_name, base_ty, base_kind);
        let array_id = self.fresh_array_id();
        base_node.array = Some(array_id);
        self.nodes.insert(base_id, base_node);
        let array = NodeArray::new(array_id, name.clone(), base_id, size);
        self.objects.insert(name, ObjectRef::Array(array_id));
        self.arrays.insert(array_id, array);
        Ok(array_id)
    }

    /// Appends one child to `array_id`, cloning the base node and — if
    /// `increment` is set — bumping the size node in place (data model §3).
    pub fn array_append(&mut self, pools: &mut Pools, array_id: ArrayId, increment: bool) -> Result<NodeId> {
        let array = self
            .arrays
            .get(&array_id)
            .ok_or_else(|| Error::NoSuchObject("array", arcstr::format!("{array_id:?}"), self.name.clone()))?
            .clone();
        let base = self.node(array.base)?.clone();
        let child_id = self.fresh_node_id();
        let child_name = arcstr::format!("{}_{}", array.name, array.children.len());
        let child_kind = base.kind.clone();
        let mut child = Node::new(child_id, child_name, base.ty.clone(), child_kind);
        child.array = Some(array_id);
        self.insert_node(child)?;
        if increment {
            let old_size = array.size;
            let new_size = self.increment_size(pools, array.size)?;
            self.arrays.get_mut(&array_id).unwrap().size = new_size;
            // The array's size node may also be a frozen instance generic
            // (`Instance::params`); keep that binding pointed at the live
            // size node instead of the one it was instantiated with.
            if let (EndpointId::Local(old_id), EndpointId::Local(new_id)) = (old_size, new_size) {
                for inst in self.instances.values_mut() {
                    if inst.port_arrays.values().any(|a| *a == array_id) {
                        for v in inst.params.values_mut() {
                            if *v == old_id {
                                *v = new_id;
                            }
                        }
                    }
                }
            }
        }
        self.arrays.get_mut(&array_id).unwrap().children.push(child_id);
        Ok(child_id)
    }

    fn increment_size(&mut self, pools: &mut Pools, size: EndpointId) -> Result<EndpointId> {
        match size {
            EndpointId::Literal(id) => {
                let value = pools
                    .literals
                    .get(id)
                    .map(|l| l.value.clone())
                    .ok_or_else(|| Error::NoSuchObject("literal", arcstr::format!("{id:?}"), self.name.clone()))?;
                match value {
                    LiteralValue::Int(n) => Ok(EndpointId::Literal(pools.literals.intern(LiteralValue::Int(n + 1)))),
                    _ => Err(Error::DefaultNotLiteral(arcstr::format!("{id:?}"))),
                }
            }
            EndpointId::Local(id) => {
                let node = self.node(id)?.clone();
                match &node.kind {
                    NodeKind::Parameter { default } => {
                        let default_value = pools
                            .literals
                            .get(*default)
                            .map(|l| l.value.clone())
                            .ok_or_else(|| Error::DefaultNotLiteral(node.name.clone()))?;
                        let incremented = match default_value {
                            LiteralValue::Int(n) => LiteralValue::Int(n + 1),
                            other => other,
                        };
                        let new_default = pools.literals.intern(incremented);
                        let new_id = self.parameter(pools, arcstr::format!("{}_1", node.name), node.ty.clone(), new_default)?;
                        // Not part of any instance's frozen `params` map, but the
                        // VHDL back-end still needs to chase through it rather
                        // than render it as a free generic by name.
                        self.node_mut(new_id)?.meta.insert(ArcStr::from("synthetic"), ArcStr::from("true"));
                        Ok(EndpointId::Local(new_id))
                    }
                    NodeKind::Expression { .. } => {
                        let one = EndpointId::Literal(pools.literals.intern(LiteralValue::Int(1)));
                        let summed = self.expr(Op::Add, EndpointId::Local(id), one)?;
                        self.minimize(pools, EndpointId::Local(summed))
                    }
                    _ => Err(Error::DefaultNotLiteral(node.name.clone())),
                }
            }
        }
    }

    /// Recursively minimizes an expression tree (design doc §4.C):
    /// literal-folds integer subtrees and applies the `+0`/`-0`/`*1`/`*0`
    /// identities.
    pub fn minimize(&mut self, pools: &mut Pools, ep: EndpointId) -> Result<EndpointId> {
        let (op, lhs, rhs) = match ep {
            EndpointId::Literal(_) => return Ok(ep),
            EndpointId::Local(id) => match &self.node(id)?.kind {
                NodeKind::Expression { op, lhs, rhs } => (*op, *lhs, *rhs),
                _ => return Ok(ep),
            },
        };
        let lhs = self.minimize(pools, lhs)?;
        let rhs = self.minimize(pools, rhs)?;

        if let (EndpointId::Literal(la), EndpointId::Literal(lb)) = (lhs, rhs) {
            if let (Some(LiteralValue::Int(a)), Some(LiteralValue::Int(b))) = (
                pools.literals.get(la).map(|l| l.value.clone()),
                pools.literals.get(lb).map(|l| l.value.clone()),
            ) {
                let result = match op {
                    Op::Add => a + b,
                    Op::Sub => a - b,
                    Op::Mul => a * b,
                    Op::Div => {
                        if b == 0 {
                            return Err(Error::DivisionByZero(arcstr::format!("{a}/{b}")));
                        }
                        a / b
                    }
                };
                return Ok(EndpointId::Literal(pools.literals.intern(LiteralValue::Int(result))));
            }
        }
        if let EndpointId::Literal(lb) = rhs {
            if let Some(LiteralValue::Int(n)) = pools.literals.get(lb).map(|l| l.value.clone()) {
                match (op, n) {
                    (Op::Add, 0) | (Op::Sub, 0) => return Ok(lhs),
                    (Op::Mul, 1) => return Ok(lhs),
                    (Op::Mul, 0) => return Ok(EndpointId::Literal(pools.literals.intern(LiteralValue::Int(0)))),
                    _ => {}
                }
            }
        }
        if let EndpointId::Literal(la) = lhs {
            if let Some(LiteralValue::Int(n)) = pools.literals.get(la).map(|l| l.value.clone()) {
                match (op, n) {
                    (Op::Add, 0) => return Ok(rhs),
                    (Op::Mul, 1) => return Ok(rhs),
                    (Op::Mul, 0) => return Ok(EndpointId::Literal(pools.literals.intern(LiteralValue::Int(0)))),
                    _ => {}
                }
            }
        }
        // (a+b)-b and (a-b)+b cancel without needing both sides to collapse to
        // literals; literal interning means an identical addend compares equal
        // by endpoint id alone.
        if op == Op::Sub {
            if let EndpointId::Local(lhs_id) = lhs {
                if let NodeKind::Expression { op: Op::Add, lhs: a, rhs: b } = &self.node(lhs_id)?.kind {
                    let (a, b) = (*a, *b);
                    if b == rhs {
                        return Ok(a);
                    }
                    if a == rhs {
                        return Ok(b);
                    }
                }
            }
        }
        if op == Op::Add {
            if let EndpointId::Local(lhs_id) = lhs {
                if let NodeKind::Expression { op: Op::Sub, lhs: a, rhs: b } = &self.node(lhs_id)?.kind {
                    let (a, b) = (*a, *b);
                    if b == rhs {
                        return Ok(a);
                    }
                }
            }
        }
        Ok(EndpointId::Local(self.expr(op, lhs, rhs)?))
    }

    // --- accessors ---

    pub fn node(&self, id: NodeId) -> Result<&Node> {
        self.nodes
            .get(&id)
            .ok_or_else(|| Error::NoSuchObject("node", arcstr::format!("{id:?}"), self.name.clone()))
    }

    pub fn node_mut(&mut self, id: NodeId) -> Result<&mut Node> {
        let name = self.name.clone();
        self.nodes
            .get_mut(&id)
            .ok_or_else(|| Error::NoSuchObject("node", arcstr::format!("{id:?}"), name))
    }

    pub fn array(&self, id: ArrayId) -> Result<&NodeArray> {
        self.arrays
            .get(&id)
            .ok_or_else(|| Error::NoSuchObject("array", arcstr::format!("{id:?}"), self.name.clone()))
    }

    pub fn edge(&self, id: EdgeId) -> Result<&Edge> {
        self.edges
            .get(&id)
            .ok_or_else(|| Error::NoSuchObject("edge", arcstr::format!("{id:?}"), self.name.clone()))
    }

    pub fn instance(&self, id: InstanceId) -> Result<&Instance> {
        self.instances
            .get(&id)
            .ok_or_else(|| Error::NoSuchObject("instance", arcstr::format!("{id:?}"), self.name.clone()))
    }

    pub fn instances(&self) -> impl Iterator<Item = &Instance> {
        self.instances.values()
    }

    pub fn edges(&self) -> impl Iterator<Item = &Edge> {
        self.edges.values()
    }

    pub fn arrays(&self) -> impl Iterator<Item = &NodeArray> {
        self.arrays.values()
    }

    fn get_node(&self, name: &str) -> Result<NodeId> {
        match self.objects.get(name) {
            Some(ObjectRef::Node(id)) => Ok(*id),
            Some(ObjectRef::Array(_)) => Err(Error::WrongKind(ArcStr::from(name), self.name.clone(), "node")),
            None => Err(Error::NoSuchObject("object", ArcStr::from(name), self.name.clone())),
        }
    }

    fn get_array(&self, name: &str) -> Result<ArrayId> {
        match self.objects.get(name) {
            Some(ObjectRef::Array(id)) => Ok(*id),
            Some(ObjectRef::Node(_)) => Err(Error::WrongKind(ArcStr::from(name), self.name.clone(), "array")),
            None => Err(Error::NoSuchObject("object", ArcStr::from(name), self.name.clone())),
        }
    }

    pub fn prt(&self, name: &str) -> Result<NodeId> {
        let id = self.get_node(name)?;
        if self.node(id)?.is_port() {
            Ok(id)
        } else {
            Err(Error::WrongKind(ArcStr::from(name), self.name.clone(), "port"))
        }
    }

    pub fn sig(&self, name: &str) -> Result<NodeId> {
        let id = self.get_node(name)?;
        if self.node(id)?.is_signal() {
            Ok(id)
        } else {
            Err(Error::WrongKind(ArcStr::from(name), self.name.clone(), "signal"))
        }
    }

    pub fn par(&self, name: &str) -> Result<NodeId> {
        let id = self.get_node(name)?;
        if self.node(id)?.is_parameter() {
            Ok(id)
        } else {
            Err(Error::WrongKind(ArcStr::from(name), self.name.clone(), "parameter"))
        }
    }

    pub fn prt_arr(&self, name: &str) -> Result<ArrayId> {
        let id = self.get_array(name)?;
        let base = self.array(id)?.base;
        if self.node(base)?.is_port() {
            Ok(id)
        } else {
            Err(Error::WrongKind(ArcStr::from(name), self.name.clone(), "port array"))
        }
    }

    pub fn sig_arr(&self, name: &str) -> Result<ArrayId> {
        let id = self.get_array(name)?;
        let base = self.array(id)?.base;
        if self.node(base)?.is_signal() {
            Ok(id)
        } else {
            Err(Error::WrongKind(ArcStr::from(name), self.name.clone(), "signal array"))
        }
    }

    pub fn ports(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values().filter(|n| n.is_port() && n.array.is_none())
    }

    pub fn signals(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values().filter(|n| n.is_signal() && n.array.is_none())
    }

    pub fn parameters(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values().filter(|n| n.is_parameter())
    }

    pub fn count_nodes(&self) -> usize {
        self.nodes.len()
    }

    pub fn count_arrays(&self) -> usize {
        self.arrays.len()
    }

    pub fn endpoint_type(&self, pools: &Pools, ep: EndpointId) -> Result<Type> {
        match ep {
            EndpointId::Local(id) => Ok(self.node(id)?.ty.clone()),
            EndpointId::Literal(id) => {
                let lit = pools
                    .literals
                    .get(id)
                    .ok_or_else(|| Error::NoSuchObject("literal", arcstr::format!("{id:?}"), self.name.clone()))?;
                Ok(literal_type(&lit.value))
            }
        }
    }

    fn endpoint_domain(&self, ep: EndpointId) -> Option<Domain> {
        match ep {
            EndpointId::Local(id) => self.nodes.get(&id).and_then(|n| n.domain().cloned()),
            EndpointId::Literal(_) => None,
        }
    }

    fn endpoint_name(&self, ep: EndpointId) -> ArcStr {
        match ep {
            EndpointId::Local(id) => self.nodes.get(&id).map(|n| n.name.clone()).unwrap_or_default(),
            EndpointId::Literal(_) => ArcStr::from("literal"),
        }
    }

    /// `true` iff `id` is a port copied onto one of this component's
    /// instances (as opposed to one of the component's own ports) — used
    /// by the edge-rule directional checks and by the VHDL back-end to skip
    /// signalization housekeeping edges when emitting concurrent
    /// assignments.
    pub(crate) fn is_instance_port(&self, id: NodeId) -> bool {
        self.instances.values().any(|inst| inst.ports.values().any(|p| *p == id))
    }

    /// `true` iff `id` is a parameter copied onto one of this component's
    /// instances — the VHDL back-end chases through such a node's current
    /// driving edge instead of rendering it by name, since it represents an
    /// internal binding rather than a declared generic of `self`.
    pub(crate) fn is_instance_param(&self, id: NodeId) -> bool {
        self.instances.values().any(|inst| inst.params.values().any(|p| *p == id))
    }

    /// Connects `dst := src`, applying the edge rules of design doc §4.G.
    /// Replaces any previous driver of `dst`.
    pub fn connect(&mut self, pools: &mut Pools, dst: EndpointId, src: EndpointId) -> Result<EdgeId> {
        let dst_domain = self.endpoint_domain(dst);
        let src_domain = self.endpoint_domain(src);
        if let (Some(a), Some(b)) = (&dst_domain, &src_domain) {
            if a != b {
                warn!(dst = %a.0, src = %b.0, "clock domain mismatch on connect");
            }
        }

        let dst_ty = self.endpoint_type(pools, dst)?;
        let src_ty = self.endpoint_type(pools, src)?;
        if get_or_make_mapper(&src_ty, &dst_ty).is_none() {
            return Err(Error::NoMapper(src_ty.name().clone(), dst_ty.name().clone()));
        }

        if let EndpointId::Local(id) = dst {
            let node = self.node(id)?;
            if node.is_port() {
                if self.is_instance_port(id) {
                    if node.direction() == Some(Direction::Out) {
                        return Err(Error::DriveInstanceOutput(node.name.clone()));
                    }
                } else if node.direction() == Some(Direction::In) {
                    return Err(Error::DriveComponentInput(node.name.clone()));
                }
            }
        }
        if let EndpointId::Local(id) = src {
            let node = self.node(id)?;
            if node.is_port() {
                if self.is_instance_port(id) {
                    if node.direction() == Some(Direction::In) {
                        return Err(Error::SourceInstanceInput(node.name.clone()));
                    }
                } else if node.direction() == Some(Direction::Out) {
                    return Err(Error::SourceComponentOutput(node.name.clone()));
                }
            }
        }

        let id = self.fresh_edge_id();
        let name = arcstr::format!("{}_to_{}", self.endpoint_name(src), self.endpoint_name(dst));
        if let EndpointId::Local(nid) = dst {
            if let Some(old) = self.nodes[&nid].input {
                self.remove_edge(old)?;
            }
        }
        self.edges.insert(id, Edge { id, name, src, dst });
        if let EndpointId::Local(nid) = dst {
            self.nodes.get_mut(&nid).unwrap().input = Some(id);
        }
        if let EndpointId::Local(nid) = src {
            self.nodes.get_mut(&nid).unwrap().outputs.push(id);
        }
        Ok(id)
    }

    pub fn remove_edge(&mut self, id: EdgeId) -> Result<()> {
        let edge = self
            .edges
            .shift_remove(&id)
            .ok_or_else(|| Error::NoSuchObject("edge", arcstr::format!("{id:?}"), self.name.clone()))?;
        if let EndpointId::Local(nid) = edge.dst {
            if let Some(n) = self.nodes.get_mut(&nid) {
                if n.input == Some(id) {
                    n.input = None;
                }
            }
        }
        if let EndpointId::Local(nid) = edge.src {
            if let Some(n) = self.nodes.get_mut(&nid) {
                n.outputs.retain(|e| *e != id);
            }
        }
        Ok(())
    }

    /// Instantiates `comp` into `self`, copying its public surface (design
    /// doc §4.F). Freezes `comp` against further port/parameter mutation.
    pub fn instantiate(&mut self, pools: &mut Pools, comp: &mut Component, name: Option<&str>) -> Result<InstanceId> {
        comp.was_instantiated = true;
        let inst_name = match name {
            Some(n) => {
                self.reserve_name(n)?;
                ArcStr::from(n)
            }
            None => self.names.alloc_suffixed(&arcstr::format!("{}_inst", comp.name), ""),
        };
        tracing::debug!(parent = %self.name, child = %comp.name, instance = %inst_name, "instantiating component");

        let mut rebinding: HashMap<NodeId, NodeId> = HashMap::new();
        let mut params = IndexMap::new();
        for node in comp.parameters() {
            let new_id = copy_node_onto(comp, node.id, self, pools, &inst_name, &mut rebinding)?;
            params.insert(node.name.clone(), new_id);
        }
        let mut ports = IndexMap::new();
        for node in comp.ports() {
            let new_id = copy_node_onto(comp, node.id, self, pools, &inst_name, &mut rebinding)?;
            ports.insert(node.name.clone(), new_id);
        }
        let mut port_arrays = IndexMap::new();
        let array_ids: Vec<ArrayId> = comp
            .arrays
            .values()
            .filter(|a| comp.node(a.base).map(Node::is_port).unwrap_or(false))
            .map(|a| a.id)
            .collect();
        for array_id in array_ids {
            let src_array = comp.array(array_id)?.clone();
            let base_id = copy_node_onto(comp, src_array.base, self, pools, &inst_name, &mut rebinding)?;
            let new_size = rebind_endpoint(comp, src_array.size, self, pools, &inst_name, &mut rebinding)?;
            let new_array_id = self.fresh_array_id();
            let qualified_array_name = arcstr::format!("{inst_name}_{}", src_array.name);
            self.reserve_name(&qualified_array_name)?;
            let mut new_array = NodeArray::new(new_array_id, qualified_array_name.clone(), base_id, new_size);
            self.node_mut(base_id)?.array = Some(new_array_id);
            self.objects.insert(qualified_array_name, ObjectRef::Array(new_array_id));
            new_array.meta = src_array.meta.clone();
            self.arrays.insert(new_array_id, new_array);
            port_arrays.insert(src_array.name.clone(), new_array_id);
        }

        let inst_to_comp: IndexMap<NodeId, NodeId> = rebinding.iter().map(|(comp_id, inst_id)| (*inst_id, *comp_id)).collect();

        let id = self.fresh_instance_id();
        self.instances.insert(
            id,
            Instance {
                id,
                name: inst_name,
                component_name: comp.name.clone(),
                ports,
                params,
                port_arrays,
                inst_to_comp,
                meta: Meta::new(),
            },
        );
        Ok(id)
    }
}

/// Deep-copies a node from `src` onto `dst`, rebinding any generic endpoint
/// found in `rebinding`, recursively copying generics not yet present
/// (design doc §4.D `copy_onto`). Every copy lands under `prefix` (the
/// instance name) so that two instances of the same component never
/// collide in `dst`'s single flat name registry.
fn copy_node_onto(
    src: &Component,
    id: NodeId,
    dst: &mut Component,
    pools: &mut Pools,
    prefix: &ArcStr,
    rebinding: &mut HashMap<NodeId, NodeId>,
) -> Result<NodeId> {
    if let Some(existing) = rebinding.get(&id) {
        return Ok(*existing);
    }
    let node = src.node(id)?.clone();

    for g in node.ty.generics() {
        if rebinding.contains_key(&g) {
            continue;
        }
        let gnode = src.node(g)?;
        if let Ok(existing) = dst.get_node(&gnode.name) {
            rebinding.insert(g, existing);
        } else {
            copy_node_onto(src, g, dst, pools, prefix, rebinding)?;
        }
    }
    let new_ty = if node.ty.is_generic() {
        node.ty.copy(rebinding)
    } else {
        node.ty.clone()
    };

    let new_kind = match &node.kind {
        NodeKind::Port { dir, domain } => NodeKind::Port {
            dir: *dir,
            domain: domain.clone(),
        },
        NodeKind::Signal { domain } => NodeKind::Signal { domain: domain.clone() },
        NodeKind::Parameter { default } => NodeKind::Parameter { default: *default },
        NodeKind::Expression { op, lhs, rhs } => {
            let lhs = rebind_endpoint(src, *lhs, dst, pools, prefix, rebinding)?;
            let rhs = rebind_endpoint(src, *rhs, dst, pools, prefix, rebinding)?;
            NodeKind::Expression { op: *op, lhs, rhs }
        }
    };

    let param_default = if let NodeKind::Parameter { default } = &new_kind {
        Some(*default)
    } else {
        None
    };
    let new_name = arcstr::format!("{prefix}_{}", node.name);
    let new_id = dst.fresh_node_id();
    let mut new_node = Node::new(new_id, new_name, new_ty, new_kind);
    new_node.meta = node.meta.clone();
    dst.insert_node(new_node)?;
    rebinding.insert(id, new_id);

    if let Some(default) = param_default {
        dst.connect(pools, EndpointId::Local(new_id), EndpointId::Literal(default))?;
    }
    Ok(new_id)
}

fn rebind_endpoint(
    src: &Component,
    ep: EndpointId,
    dst: &mut Component,
    pools: &mut Pools,
    prefix: &ArcStr,
    rebinding: &mut HashMap<NodeId, NodeId>,
) -> Result<EndpointId> {
    match ep {
        EndpointId::Literal(id) => Ok(EndpointId::Literal(id)),
        EndpointId::Local(id) => {
            if let Some(existing) = rebinding.get(&id) {
                return Ok(EndpointId::Local(*existing));
            }
            let new_id = copy_node_onto(src, id, dst, pools, prefix, rebinding)?;
            Ok(EndpointId::Local(new_id))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{bit, vector};

    fn new_pools() -> Pools {
        Pools::new()
    }

    #[test]
    fn connect_replaces_previous_driver() {
        let mut pools = new_pools();
        let mut c = Component::new("c");
        let a = c.signal("a", bit()).unwrap();
        let b = c.signal("b", bit()).unwrap();
        let x = c.port("x", bit(), Direction::In).unwrap();
        c.connect(&mut pools, EndpointId::Local(a), EndpointId::Local(x)).unwrap();
        c.connect(&mut pools, EndpointId::Local(a), EndpointId::Local(b)).unwrap();
        assert_eq!(c.node(a).unwrap().outputs().len(), 0);
        assert_eq!(c.node(b).unwrap().outputs().len(), 1);
    }

    #[test]
    fn cannot_drive_component_input_port() {
        let mut pools = new_pools();
        let mut c = Component::new("c");
        let input_port = c.port("p", bit(), Direction::In).unwrap();
        let s = c.signal("s", bit()).unwrap();
        let err = c
            .connect(&mut pools, EndpointId::Local(input_port), EndpointId::Local(s))
            .unwrap_err();
        assert!(matches!(err, Error::DriveComponentInput(_)));
    }

    #[test]
    fn instantiate_freezes_ports() {
        let mut pools = new_pools();
        let mut child = Component::new("child");
        child.port("p", bit(), Direction::In).unwrap();
        let mut parent = Component::new("parent");
        parent.instantiate(&mut pools, &mut child, None).unwrap();
        assert!(child.was_instantiated());
        let err = child.port("q", bit(), Direction::In).unwrap_err();
        assert!(matches!(err, Error::Frozen(_)));
    }

    #[test]
    fn instantiate_copies_ports_with_fresh_ids() {
        let mut pools = new_pools();
        let mut child = Component::new("child");
        let w = crate::pool::intl(&mut pools, 8);
        child.port("data", vector("v", w), Direction::Out).unwrap();
        let mut parent = Component::new("parent");
        let inst_id = parent.instantiate(&mut pools, &mut child, Some("xi")).unwrap();
        let inst = parent.instance(inst_id).unwrap();
        let copied = inst.ap("data").unwrap();
        assert_ne!(copied, child.prt("data").unwrap());
    }

    #[test]
    fn instantiating_same_component_twice_does_not_collide() {
        let mut pools = new_pools();
        let mut child = Component::new("child");
        child.port("p", bit(), Direction::In).unwrap();
        let mut top = Component::new("top");
        let i1 = top.instantiate(&mut pools, &mut child, Some("i1")).unwrap();
        let i2 = top.instantiate(&mut pools, &mut child, Some("i2")).unwrap();
        let p1 = top.instance(i1).unwrap().ap("p").unwrap();
        let p2 = top.instance(i2).unwrap().ap("p").unwrap();
        assert_ne!(p1, p2);
        assert_eq!(top.node(p1).unwrap().name.as_str(), "i1_p");
        assert_eq!(top.node(p2).unwrap().name.as_str(), "i2_p");
    }

    #[test]
    fn minimize_folds_zero_and_one_identities() {
        let mut pools = new_pools();
        let mut c = Component::new("c");
        let default = pools.literals.intern(LiteralValue::Int(5));
        let x = c.parameter(&mut pools, "x", crate::types::integer(), default).unwrap();
        let one = crate::pool::intl(&mut pools, 1);
        let plus1 = c.expr(Op::Add, EndpointId::Local(x), one).unwrap();
        let minus1 = c.expr(Op::Sub, EndpointId::Local(plus1), one).unwrap();
        let result = c.minimize(&mut pools, EndpointId::Local(minus1)).unwrap();
        assert_eq!(result, EndpointId::Local(x));
    }

    #[test]
    fn minimize_division_by_zero_is_fatal() {
        let mut pools = new_pools();
        let mut c = Component::new("c");
        let a = crate::pool::intl(&mut pools, 4);
        let zero = crate::pool::intl(&mut pools, 0);
        let div = c.expr(Op::Div, a, zero).unwrap();
        let err = c.minimize(&mut pools, EndpointId::Local(div)).unwrap_err();
        assert!(matches!(err, Error::DivisionByZero(_)));
    }
}
