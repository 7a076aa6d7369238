//! Process-scoped interning pools (design doc §4.A).
//!
//! Three pools share one shape: `add` rejects a duplicate name and fails
//! hard, `get` returns an optional handle, `clear` empties. Grounded on
//! `scir::LibraryBuilder::new`, which is a plain constructor rather than a
//! process-global singleton — `Pools` here is likewise just a struct a
//! caller owns and threads through, with `Pools::default()` standing in for
//! "the" process-scoped instance by convention only.

use std::collections::HashMap;

use arcstr::ArcStr;
use indexmap::IndexMap;

use crate::error::{Error, Result};
use crate::graph::Component;
use crate::types::Type;

/// A generic named-object pool: reject duplicate names, look up by name.
#[derive(Debug, Clone)]
struct Pool<T> {
    items: IndexMap<ArcStr, T>,
    kind: &'static str,
}

impl<T> Pool<T> {
    fn new(kind: &'static str) -> Self {
        Self {
            items: IndexMap::new(),
            kind,
        }
    }

    fn add(&mut self, name: impl Into<ArcStr>, value: T) -> Result<()> {
        let name = name.into();
        if self.items.contains_key(&name) {
            return Err(Error::DuplicateName(name, self.kind));
        }
        self.items.insert(name, value);
        Ok(())
    }

    fn get(&self, name: &str) -> Option<&T> {
        self.items.get(name)
    }

    fn clear(&mut self) {
        self.items.clear();
    }

    fn len(&self) -> usize {
        self.items.len()
    }
}

/// An opaque handle into the [`LiteralPool`], scoped to the pool that minted
/// it. Deliberately not convertible to/from a graph-local `NodeId`: literals
/// are pool-shared across every graph, while `NodeId`s are only ever valid
/// against the single graph that owns them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LiteralId(u64);

/// The value carried by a literal node (data model §3: `kind ∈ {Int, String,
/// Bool}`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum LiteralValue {
    Int(i64),
    Str(ArcStr),
    Bool(bool),
}

impl LiteralValue {
    /// The literal's canonical textual name, used both for pool interning
    /// and as the node's display name.
    pub fn name(&self) -> ArcStr {
        match self {
            LiteralValue::Int(v) => arcstr::format!("{v}"),
            LiteralValue::Str(s) => arcstr::format!("\"{s}\""),
            LiteralValue::Bool(b) => arcstr::format!("{b}"),
        }
    }
}

/// A literal value interned in a [`LiteralPool`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Literal {
    pub id: LiteralId,
    pub value: LiteralValue,
}

/// Interns literal values by `(kind, value)` so that e.g. `intl(3)` returns
/// the same [`LiteralId`] every time it is called on the same pool.
#[derive(Debug, Clone, Default)]
pub struct LiteralPool {
    by_value: HashMap<LiteralValue, LiteralId>,
    by_id: IndexMap<LiteralId, Literal>,
    next: u64,
}

impl LiteralPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the existing literal for `value`, interning a new one if this
    /// is the first time it has been requested.
    pub fn intern(&mut self, value: LiteralValue) -> LiteralId {
        if let Some(id) = self.by_value.get(&value) {
            return *id;
        }
        let id = LiteralId(self.next);
        self.next += 1;
        self.by_value.insert(value.clone(), id);
        self.by_id.insert(id, Literal { id, value });
        id
    }

    pub fn get(&self, id: LiteralId) -> Option<&Literal> {
        self.by_id.get(&id)
    }

    pub fn clear(&mut self) {
        self.by_value.clear();
        self.by_id.clear();
        self.next = 0;
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}

/// Named-type pool: `record`/`vector` factories register their result here
/// under the type's declared name so later lookups (and the DOT/VHDL
/// back-ends' "have we already declared this" checks) can find it again.
#[derive(Debug, Clone, Default)]
pub struct TypePool {
    pool: Option<Pool<Type>>,
}

impl TypePool {
    pub fn new() -> Self {
        Self {
            pool: Some(Pool::new("type pool")),
        }
    }

    fn pool_mut(&mut self) -> &mut Pool<Type> {
        self.pool.get_or_insert_with(|| Pool::new("type pool"))
    }

    fn pool_ref(&self) -> Option<&Pool<Type>> {
        self.pool.as_ref()
    }

    pub fn add(&mut self, name: impl Into<ArcStr>, ty: Type) -> Result<()> {
        self.pool_mut().add(name, ty)
    }

    pub fn get(&self, name: &str) -> Option<&Type> {
        self.pool_ref().and_then(|p| p.get(name))
    }

    pub fn clear(&mut self) {
        if let Some(p) = self.pool.as_mut() {
            p.clear();
        }
    }

    pub fn len(&self) -> usize {
        self.pool_ref().map_or(0, Pool::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Top-level component pool: every [`Component`] that should be reachable by
/// name (e.g. for the VHDL emission driver's transitive walk) is registered
/// here once built.
#[derive(Debug, Clone, Default)]
pub struct ComponentPool {
    pool: Option<Pool<Component>>,
}

impl ComponentPool {
    pub fn new() -> Self {
        Self {
            pool: Some(Pool::new("component pool")),
        }
    }

    fn pool_mut(&mut self) -> &mut Pool<Component> {
        self.pool.get_or_insert_with(|| Pool::new("component pool"))
    }

    fn pool_ref(&self) -> Option<&Pool<Component>> {
        self.pool.as_ref()
    }

    pub fn add(&mut self, component: Component) -> Result<()> {
        let name = component.name().clone();
        self.pool_mut().add(name, component)
    }

    pub fn get(&self, name: &str) -> Option<&Component> {
        self.pool_ref().and_then(|p| p.get(name))
    }

    pub fn clear(&mut self) {
        if let Some(p) = self.pool.as_mut() {
            p.clear();
        }
    }

    pub fn len(&self) -> usize {
        self.pool_ref().map_or(0, Pool::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Bundles the three process-scoped pools. Threaded explicitly through
/// component-building calls rather than reached for as a global, per design
/// doc §9's "Global pools" note.
#[derive(Debug, Clone, Default)]
pub struct Pools {
    pub literals: LiteralPool,
    pub types: TypePool,
    pub components: ComponentPool,
}

impl Pools {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.literals.clear();
        self.types.clear();
        self.components.clear();
    }
}

/// Node factory: an interned integer literal (external interfaces §6).
pub fn intl(pools: &mut Pools, value: i64) -> crate::node::EndpointId {
    crate::node::EndpointId::Literal(pools.literals.intern(LiteralValue::Int(value)))
}

/// Node factory: an interned string literal.
pub fn strl(pools: &mut Pools, value: impl Into<ArcStr>) -> crate::node::EndpointId {
    crate::node::EndpointId::Literal(pools.literals.intern(LiteralValue::Str(value.into())))
}

/// Node factory: an interned boolean literal.
pub fn booll(pools: &mut Pools, value: bool) -> crate::node::EndpointId {
    crate::node::EndpointId::Literal(pools.literals.intern(LiteralValue::Bool(value)))
}

/// The type a literal's value implies, per data model §3 ("`Integer`,
/// `String`, `Boolean` ... used only for parameters").
pub fn literal_type(value: &LiteralValue) -> crate::types::Type {
    match value {
        LiteralValue::Int(_) => crate::types::integer(),
        LiteralValue::Str(_) => crate::types::string(),
        LiteralValue::Bool(_) => crate::types::boolean(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literal_pool_interns_by_value() {
        let mut pool = LiteralPool::new();
        let a = pool.intern(LiteralValue::Int(3));
        let b = pool.intern(LiteralValue::Int(3));
        let c = pool.intern(LiteralValue::Int(4));
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(pool.len(), 2);
    }

    #[test]
    fn literal_value_names() {
        assert_eq!(LiteralValue::Int(3).name().as_str(), "3");
        assert_eq!(LiteralValue::Bool(true).name().as_str(), "true");
        assert_eq!(LiteralValue::Str(ArcStr::from("x")).name().as_str(), "\"x\"");
    }
}
