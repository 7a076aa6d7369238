//! The type algebra (design doc §4.B).
//!
//! Grounded on `examples/original_source/.../cerata/type.h`: a closed sum of
//! physical/non-physical kinds, structural equality, generic rebinding via
//! `copy`, and a per-type registry of bidirectional [`crate::flatten::TypeMapper`]s.
//! `Type` is reference-counted (`Rc`) rather than `Arc` because the whole
//! library is single-threaded (design doc §5) and the mapper registry needs
//! interior mutability (`RefCell`) the way the C++ original mutates its
//! `mappers_` member in place.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use arcstr::ArcStr;
use indexmap::IndexMap;

use crate::error::{Error, Result};
use crate::flatten::TypeMapper;
use crate::node::{EndpointId, NodeId};

/// One field of a [`TypeKind::Record`].
#[derive(Debug, Clone)]
pub struct Field {
    pub name: ArcStr,
    pub ty: Type,
    /// Flips direction when this field is flattened (design doc §3).
    pub reversed: bool,
    /// Whether a separator is attached after this field's name part when
    /// building a flattened leaf's composed name.
    pub sep: bool,
}

impl Field {
    pub fn new(name: impl Into<ArcStr>, ty: Type) -> Self {
        Self {
            name: name.into(),
            ty,
            reversed: false,
            sep: true,
        }
    }

    pub fn reversed(mut self, reversed: bool) -> Self {
        self.reversed = reversed;
        self
    }

    pub fn sep(mut self, sep: bool) -> Self {
        self.sep = sep;
        self
    }
}

/// The sum of kinds a [`Type`] may be (data model §3).
#[derive(Debug, Clone)]
pub enum TypeKind {
    /// Physical, width 1, never generic.
    Bit,
    /// Physical; generic iff `width` is not a literal.
    Vector { width: EndpointId },
    /// Non-physical, non-generic; parameter-only.
    Integer,
    /// Non-physical, non-generic; parameter-only.
    String,
    /// Non-physical, non-generic; parameter-only.
    Boolean,
    /// Nested; physical iff every field is physical, generic iff any is.
    Record { fields: Vec<Field> },
}

struct TypeInner {
    name: ArcStr,
    kind: TypeKind,
    mappers: RefCell<Vec<Rc<TypeMapper>>>,
}

impl fmt::Debug for TypeInner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeInner")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("mappers", &self.mappers.borrow().len())
            .finish()
    }
}

/// A type handle: a cheaply cloned reference to shared, mutably-registrable
/// type data. Two `Type`s are the same object iff [`Type::ptr_eq`] holds;
/// [`Type::equals`] is the structural notion used by the edge rules.
#[derive(Debug, Clone)]
pub struct Type(Rc<TypeInner>);

impl Type {
    fn new(name: impl Into<ArcStr>, kind: TypeKind) -> Self {
        Type(Rc::new(TypeInner {
            name: name.into(),
            kind,
            mappers: RefCell::new(Vec::new()),
        }))
    }

    pub fn name(&self) -> &ArcStr {
        &self.0.name
    }

    pub fn kind(&self) -> &TypeKind {
        &self.0.kind
    }

    pub fn ptr_eq(&self, other: &Type) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// `true` for every kind except `Integer`/`String`/`Boolean`.
    pub fn is_physical(&self) -> bool {
        match &self.0.kind {
            TypeKind::Bit | TypeKind::Vector { .. } => true,
            TypeKind::Integer | TypeKind::String | TypeKind::Boolean => false,
            TypeKind::Record { fields } => fields.iter().all(|f| f.ty.is_physical()),
        }
    }

    /// `true` iff any referenced size/width node is not a literal.
    pub fn is_generic(&self) -> bool {
        match &self.0.kind {
            TypeKind::Bit | TypeKind::Integer | TypeKind::String | TypeKind::Boolean => false,
            TypeKind::Vector { width } => matches!(width, EndpointId::Local(_)),
            TypeKind::Record { fields } => fields.iter().any(|f| f.ty.is_generic()),
        }
    }

    /// The non-literal nodes appearing as width or within nested record
    /// fields, in pre-order.
    pub fn generics(&self) -> Vec<NodeId> {
        let mut out = Vec::new();
        self.collect_generics(&mut out);
        out
    }

    fn collect_generics(&self, out: &mut Vec<NodeId>) {
        match &self.0.kind {
            TypeKind::Vector {
                width: EndpointId::Local(id),
            } => out.push(*id),
            TypeKind::Record { fields } => {
                for field in fields {
                    field.ty.collect_generics(out);
                }
            }
            _ => {}
        }
    }

    /// Structural equality: recurses into record fields in order, ignoring
    /// field names so the comparison composes with mappers built across
    /// differently-named-but-shaped records.
    ///
    /// This intentionally matches the original C++ behaviour flagged as an
    /// open question in the design notes: two semantically distinct records
    /// with identical field-type shapes compare equal.
    pub fn equals(&self, other: &Type) -> bool {
        match (&self.0.kind, &other.0.kind) {
            (TypeKind::Bit, TypeKind::Bit) => true,
            (TypeKind::Integer, TypeKind::Integer) => true,
            (TypeKind::String, TypeKind::String) => true,
            (TypeKind::Boolean, TypeKind::Boolean) => true,
            (TypeKind::Vector { width: a }, TypeKind::Vector { width: b }) => {
                literal_width_equal(a, b)
            }
            (TypeKind::Record { fields: a }, TypeKind::Record { fields: b }) => {
                a.len() == b.len() && a.iter().zip(b).all(|(fa, fb)| fa.ty.equals(&fb.ty))
            }
            _ => false,
        }
    }

    /// Deep-copies this type, replacing any generic `NodeId` found in
    /// `rebinding` with its mapped value. Mapper registrations are retained:
    /// the copy starts with the same `Rc<TypeMapper>` pointees as `self`
    /// (design doc §4.B: "copied types retain their mapper list, re-homed to
    /// the new type on the `a` side"); since lookups are structural rather
    /// than identity-based, sharing the mapper objects is sufficient.
    pub fn copy(&self, rebinding: &std::collections::HashMap<NodeId, NodeId>) -> Type {
        let kind = match &self.0.kind {
            TypeKind::Bit => TypeKind::Bit,
            TypeKind::Integer => TypeKind::Integer,
            TypeKind::String => TypeKind::String,
            TypeKind::Boolean => TypeKind::Boolean,
            TypeKind::Vector { width } => {
                let width = match width {
                    EndpointId::Local(id) => {
                        EndpointId::Local(*rebinding.get(id).unwrap_or(id))
                    }
                    EndpointId::Literal(lit) => EndpointId::Literal(*lit),
                };
                TypeKind::Vector { width }
            }
            TypeKind::Record { fields } => TypeKind::Record {
                fields: fields
                    .iter()
                    .map(|f| Field {
                        name: f.name.clone(),
                        ty: f.ty.copy(rebinding),
                        reversed: f.reversed,
                        sep: f.sep,
                    })
                    .collect(),
            },
        };
        let copy = Type::new(self.0.name.clone(), kind);
        *copy.0.mappers.borrow_mut() = self.0.mappers.borrow().clone();
        copy
    }

    /// Convenience rebinding by positional order of [`Type::generics`].
    pub fn rebind(&self, nodes: &[NodeId]) -> Type {
        let gens = self.generics();
        let rebinding: std::collections::HashMap<NodeId, NodeId> =
            gens.into_iter().zip(nodes.iter().copied()).collect();
        self.copy(&rebinding)
    }

    /// Registers `mapper` on this type's mapper list.
    pub fn add_mapper(&self, mapper: Rc<TypeMapper>) {
        self.0.mappers.borrow_mut().push(mapper);
    }

    /// Pure lookup: returns an already-registered mapper to `target`, if
    /// any, without creating one. Per design doc §9's open question, this is
    /// kept separate from mapper-generating lookups.
    pub fn find_mapper(&self, target: &Type) -> Option<Rc<TypeMapper>> {
        self.0
            .mappers
            .borrow()
            .iter()
            .find(|m| m.b().ptr_eq(target) || m.b().equals(target))
            .cloned()
    }

    /// Removes every mapper on this type whose target is `target`.
    pub fn remove_mappers_to(&self, target: &Type) {
        self.0
            .mappers
            .borrow_mut()
            .retain(|m| !(m.b().ptr_eq(target) || m.b().equals(target)));
    }

    pub fn mappers(&self) -> Vec<Rc<TypeMapper>> {
        self.0.mappers.borrow().clone()
    }
}

fn literal_width_equal(a: &EndpointId, b: &EndpointId) -> bool {
    // Structural equality treats any two vectors as equal in shape; actual
    // width comparison happens at flatten time where expressions resolve to
    // literals. Generic vectors are equal to any other generic vector here,
    // matching the original's field-name-ignoring, shape-only `IsEqual`.
    matches!(
        (a, b),
        (EndpointId::Local(_), EndpointId::Local(_)) | (EndpointId::Literal(_), EndpointId::Literal(_))
    )
}

/// The 1-bit physical type.
pub fn bit() -> Type {
    Type::new("bit", TypeKind::Bit)
}

/// A vector of `width` bits (generic iff `width` is not a literal).
pub fn vector(name: impl Into<ArcStr>, width: EndpointId) -> Type {
    Type::new(name, TypeKind::Vector { width })
}

/// The non-physical integer type, used only for parameters.
pub fn integer() -> Type {
    Type::new("integer", TypeKind::Integer)
}

/// The non-physical string type, used only for parameters.
pub fn string() -> Type {
    Type::new("string", TypeKind::String)
}

/// The non-physical boolean type, used only for parameters.
pub fn boolean() -> Type {
    Type::new("boolean", TypeKind::Boolean)
}

/// A record type nesting `fields` in declaration order.
///
/// Fails with `Error::DuplicateName` if two fields share a name (data model
/// §3 invariant: "record field names are unique within a record") — a
/// caller-supplied authoring mistake, not an internal invariant violation.
pub fn record(name: impl Into<ArcStr>, fields: Vec<Field>) -> Result<Type> {
    let name = name.into();
    let mut seen: IndexMap<&str, ()> = IndexMap::new();
    for f in &fields {
        if seen.insert(f.name.as_str(), ()).is_some() {
            return Err(Error::DuplicateName(f.name.clone(), "record"));
        }
    }
    Ok(Type::new(name, TypeKind::Record { fields }))
}

pub fn field(name: impl Into<ArcStr>, ty: Type) -> Field {
    Field::new(name, ty)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::LiteralValue;

    fn lit_width(n: i64, pools: &mut crate::pool::Pools) -> EndpointId {
        EndpointId::Literal(pools.literals.intern(LiteralValue::Int(n)))
    }

    #[test]
    fn bit_is_physical_and_not_generic() {
        let b = bit();
        assert!(b.is_physical());
        assert!(!b.is_generic());
        assert!(b.generics().is_empty());
    }

    #[test]
    fn literal_vector_is_not_generic() {
        let mut pools = crate::pool::Pools::new();
        let w = lit_width(8, &mut pools);
        let v = vector("vec8", w);
        assert!(v.is_physical());
        assert!(!v.is_generic());
    }

    #[test]
    fn record_equality_ignores_field_names() {
        let mut pools = crate::pool::Pools::new();
        let w = lit_width(8, &mut pools);
        let a = record("a", vec![field("x", vector("v", w))]).unwrap();
        let w2 = lit_width(8, &mut pools);
        let b = record("b", vec![field("y", vector("v", w2))]).unwrap();
        assert!(a.equals(&b));
    }

    #[test]
    fn copy_without_rebinding_is_value_equal() {
        let mut pools = crate::pool::Pools::new();
        let w = lit_width(8, &mut pools);
        let v = vector("v", w);
        let copy = v.copy(&std::collections::HashMap::new());
        assert!(v.equals(&copy));
    }

    #[test]
    fn record_rejects_duplicate_field_names() {
        let mut pools = crate::pool::Pools::new();
        let w = lit_width(1, &mut pools);
        let err = record("dup", vec![field("x", vector("v", w)), field("x", bit())]).unwrap_err();
        assert!(matches!(err, Error::DuplicateName(_, "record")));
    }
}
