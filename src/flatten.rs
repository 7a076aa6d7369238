//! Flatten / Mapper subsystem (design doc §4.E) — the hard algorithm.
//!
//! Grounded on `examples/original_source/.../cerata/flattype.h`: a
//! deterministic pre-order flattening of a (possibly nested) [`Type`] into
//! leaves, a sparse integer mapping matrix between two flattenings, and the
//! unique mapping pairs the VHDL back-end turns into `downto` slices.

use std::rc::Rc;

use arcstr::ArcStr;

use crate::node::EndpointId;
use crate::types::{Type, TypeKind};
use crate::value::Value;

/// One segment of a flattened leaf's composed name (design doc §4.E).
#[derive(Debug, Clone)]
pub struct NamePart {
    pub part: ArcStr,
    pub sep: bool,
}

/// One leaf produced by [`flatten`].
#[derive(Debug, Clone)]
pub struct FlatType {
    pub ty: Type,
    pub level: usize,
    pub name_parts: Vec<NamePart>,
    pub reversed: bool,
}

impl FlatType {
    /// Composes the name parts into a single underscore-joined identifier
    /// fragment, honoring each part's `sep` flag.
    pub fn name(&self) -> ArcStr {
        let mut out = String::new();
        for (i, part) in self.name_parts.iter().enumerate() {
            if i > 0 && self.name_parts[i - 1].sep {
                out.push('_');
            }
            out.push_str(&part.part);
        }
        ArcStr::from(out)
    }

    /// The physical width of this leaf alone (not the whole subtree),
    /// `None` for structural (record) or non-physical leaves. `resolve`
    /// turns a vector's width endpoint into a [`Value`]; it is supplied by
    /// the caller because resolving a parameter/expression node requires
    /// access to a live component arena that this module does not hold.
    pub fn width(&self, resolve: &dyn Fn(EndpointId) -> Option<Value>) -> Option<Value> {
        match self.ty.kind() {
            TypeKind::Bit => Some(Value::int(1)),
            TypeKind::Vector { width } => resolve(*width),
            _ => None,
        }
    }
}

/// Depth-first pre-order flattening of `ty` (design doc §4.E, testable
/// property 6: deterministic — two calls on the same type produce the same
/// list).
pub fn flatten(ty: &Type) -> Vec<FlatType> {
    let mut out = Vec::new();
    flatten_into(ty, 0, Vec::new(), false, &mut out);
    out
}

fn flatten_into(ty: &Type, level: usize, prefix: Vec<NamePart>, reversed: bool, out: &mut Vec<FlatType>) {
    match ty.kind() {
        TypeKind::Record { fields } => {
            out.push(FlatType {
                ty: ty.clone(),
                level,
                name_parts: prefix.clone(),
                reversed,
            });
            for field in fields {
                let mut parts = prefix.clone();
                parts.push(NamePart {
                    part: field.name.clone(),
                    sep: field.sep,
                });
                flatten_into(&field.ty, level + 1, parts, reversed ^ field.reversed, out);
            }
        }
        _ => out.push(FlatType {
            ty: ty.clone(),
            level,
            name_parts: prefix,
            reversed,
        }),
    }
}

/// A sparse `H x W` integer matrix between two flattenings (design doc
/// §4.E). Cell `(y, x) = k >= 1` means leaf `a[y]` and leaf `b[x]` belong to
/// the same mapping pair, with `k` their ordinal within that pair.
#[derive(Debug, Clone)]
pub struct MappingMatrix {
    rows: usize,
    cols: usize,
    cells: Vec<i64>,
}

impl MappingMatrix {
    pub fn new(rows: usize, cols: usize) -> Self {
        MappingMatrix {
            rows,
            cols,
            cells: vec![0; rows * cols],
        }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn get(&self, y: usize, x: usize) -> i64 {
        self.cells[y * self.cols + x]
    }

    fn set(&mut self, y: usize, x: usize, v: i64) {
        self.cells[y * self.cols + x] = v;
    }

    pub fn max_of_row(&self, y: usize) -> i64 {
        (0..self.cols).map(|x| self.get(y, x)).max().unwrap_or(0)
    }

    pub fn max_of_column(&self, x: usize) -> i64 {
        (0..self.rows).map(|y| self.get(y, x)).max().unwrap_or(0)
    }

    /// Sets `(y, x)` to `max(row_max(y), col_max(x)) + 1` and returns it.
    pub fn set_next(&mut self, y: usize, x: usize) -> i64 {
        let next = self.max_of_row(y).max(self.max_of_column(x)) + 1;
        self.set(y, x, next);
        next
    }

    /// Inverts direction: `transpose()[x][y] == self[y][x]`.
    pub fn transpose(&self) -> MappingMatrix {
        let mut out = MappingMatrix::new(self.cols, self.rows);
        for y in 0..self.rows {
            for x in 0..self.cols {
                let v = self.get(y, x);
                if v != 0 {
                    out.set(x, y, v);
                }
            }
        }
        out
    }

    /// The `n x n` identity matrix (diagonal set to 1).
    pub fn identity(n: usize) -> MappingMatrix {
        let mut out = MappingMatrix::new(n, n);
        for i in 0..n {
            out.set(i, i, 1);
        }
        out
    }

    fn nonzero_in_row(&self, y: usize) -> Vec<(usize, i64)> {
        let mut v: Vec<(usize, i64)> = (0..self.cols)
            .filter_map(|x| {
                let k = self.get(y, x);
                (k != 0).then_some((x, k))
            })
            .collect();
        v.sort_by_key(|(_, k)| *k);
        v
    }

    fn nonzero_in_col(&self, x: usize) -> Vec<(usize, i64)> {
        let mut v: Vec<(usize, i64)> = (0..self.rows)
            .filter_map(|y| {
                let k = self.get(y, x);
                (k != 0).then_some((y, k))
            })
            .collect();
        v.sort_by_key(|(_, k)| *k);
        v
    }
}

/// One `(flat_index, within_side_ordinal, flat_type)` entry of a
/// [`MappingPair`].
#[derive(Debug, Clone)]
pub struct MappingEntry {
    pub flat_index: usize,
    pub ordinal: i64,
    pub flat_type: FlatType,
}

/// A bundle of flat types on two sides connected by a mapper (glossary).
/// Exactly one of the three shapes from design doc §4.E holds: both sides
/// singleton (1-to-1), `a` singleton with `b` a concatenation (many-to-1
/// from b onto a), or `b` singleton with `a` a concatenation (many-to-1
/// from a onto b).
#[derive(Debug, Clone)]
pub struct MappingPair {
    pub a: Vec<MappingEntry>,
    pub b: Vec<MappingEntry>,
}

impl MappingPair {
    /// Sums the widths of one side's flat types as a [`Value`], using
    /// `increment` in place of any leaf whose width does not resolve (a
    /// structural level with no physical bits of its own).
    pub fn side_width(
        entries: &[MappingEntry],
        increment: i64,
        resolve: &dyn Fn(EndpointId) -> Option<Value>,
    ) -> Value {
        entries.iter().fold(Value::int(0), |acc, e| {
            let w = e
                .flat_type
                .width(resolve)
                .unwrap_or_else(|| Value::int(increment));
            acc + w
        })
    }

    pub fn width_a(&self, increment: i64, resolve: &dyn Fn(EndpointId) -> Option<Value>) -> Value {
        Self::side_width(&self.a, increment, resolve)
    }

    pub fn width_b(&self, increment: i64, resolve: &dyn Fn(EndpointId) -> Option<Value>) -> Value {
        Self::side_width(&self.b, increment, resolve)
    }
}

fn make_entries(cells: &[(usize, i64)], flats: &[FlatType]) -> Vec<MappingEntry> {
    cells
        .iter()
        .map(|(idx, k)| MappingEntry {
            flat_index: *idx,
            ordinal: *k,
            flat_type: flats[*idx].clone(),
        })
        .collect()
}

/// Walks `matrix` and produces the ordered, unique mapping pairs between
/// `flat_a` and `flat_b`.
pub fn unique_mapping_pairs(matrix: &MappingMatrix, flat_a: &[FlatType], flat_b: &[FlatType]) -> Vec<MappingPair> {
    let mut pairs = Vec::new();
    let mut row_claimed = vec![false; matrix.rows()];

    for y in 0..matrix.rows() {
        let row_cells = matrix.nonzero_in_row(y);
        if row_cells.is_empty() {
            continue;
        }
        if row_cells.len() > 1 {
            // one a-leaf onto many b-leaves
            pairs.push(MappingPair {
                a: make_entries(&[(y, 1)], flat_a),
                b: make_entries(&row_cells, flat_b),
            });
            row_claimed[y] = true;
            continue;
        }
        let (x, k) = row_cells[0];
        if matrix.nonzero_in_col(x).len() == 1 {
            pairs.push(MappingPair {
                a: make_entries(&[(y, k)], flat_a),
                b: make_entries(&[(x, k)], flat_b),
            });
            row_claimed[y] = true;
        }
    }

    for x in 0..matrix.cols() {
        let col_cells = matrix.nonzero_in_col(x);
        if col_cells.len() > 1 && col_cells.iter().all(|(y, _)| !row_claimed[*y]) {
            pairs.push(MappingPair {
                a: make_entries(&col_cells, flat_a),
                b: make_entries(&[(x, 1)], flat_b),
            });
        }
    }

    pairs
}

/// A bidirectional, bit-slice-correspondence mapper between two types
/// (design doc §4.E, §3: "a mapper `a→b` implies the inverse `b→a` is also
/// registered on `b`").
#[derive(Debug)]
pub struct TypeMapper {
    a: Type,
    b: Type,
    matrix: MappingMatrix,
}

impl TypeMapper {
    pub fn a(&self) -> &Type {
        &self.a
    }

    pub fn b(&self) -> &Type {
        &self.b
    }

    pub fn matrix(&self) -> &MappingMatrix {
        &self.matrix
    }

    /// `a.equals(b)` required; sets the diagonal and attaches both
    /// directions.
    pub fn make_implicit(a: &Type, b: &Type) -> Option<Rc<TypeMapper>> {
        if !a.equals(b) {
            return None;
        }
        let n = flatten(a).len();
        let matrix = MappingMatrix::identity(n);
        Some(Self::attach(a.clone(), b.clone(), matrix))
    }

    fn attach(a: Type, b: Type, matrix: MappingMatrix) -> Rc<TypeMapper> {
        let inverse_matrix = matrix.transpose();
        let mapper = Rc::new(TypeMapper {
            a: a.clone(),
            b: b.clone(),
            matrix,
        });
        a.add_mapper(mapper.clone());
        let inverse = Rc::new(TypeMapper {
            a: b.clone(),
            b: a.clone(),
            matrix: inverse_matrix,
        });
        b.add_mapper(inverse);
        mapper
    }

    /// Starts an explicit mapper builder between `a` and `b`.
    pub fn make(a: Type, b: Type) -> TypeMapperBuilder {
        TypeMapperBuilder::new(a, b)
    }

    /// `matrix` is a copy with direction inverted; does not mutate the
    /// registry.
    pub fn inverse(&self) -> TypeMapper {
        TypeMapper {
            a: self.b.clone(),
            b: self.a.clone(),
            matrix: self.matrix.transpose(),
        }
    }

    pub fn unique_mapping_pairs(&self) -> Vec<MappingPair> {
        unique_mapping_pairs(&self.matrix, &flatten(&self.a), &flatten(&self.b))
    }
}

/// Builds a [`TypeMapper`] by adding mapping cells one at a time; the
/// matrix is mutable until [`TypeMapperBuilder::finish`] attaches the
/// frozen mapper to both types (design doc §5: "mapping matrices are
/// mutable during mapper construction and frozen once attached").
pub struct TypeMapperBuilder {
    a: Type,
    b: Type,
    matrix: MappingMatrix,
}

impl TypeMapperBuilder {
    fn new(a: Type, b: Type) -> Self {
        let rows = flatten(&a).len();
        let cols = flatten(&b).len();
        TypeMapperBuilder {
            a,
            b,
            matrix: MappingMatrix::new(rows, cols),
        }
    }

    /// Maps flat leaf `y` of `a` onto flat leaf `x` of `b`.
    pub fn add(&mut self, y: usize, x: usize) -> &mut Self {
        self.matrix.set_next(y, x);
        self
    }

    pub fn finish(self) -> Rc<TypeMapper> {
        TypeMapper::attach(self.a, self.b, self.matrix)
    }
}

/// Pure, non-generating mapper lookup followed by on-demand implicit
/// construction — kept as two steps per design doc §9's open question.
pub fn get_or_make_mapper(a: &Type, b: &Type) -> Option<Rc<TypeMapper>> {
    if let Some(m) = a.find_mapper(b) {
        return Some(m);
    }
    TypeMapper::make_implicit(a, b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{LiteralValue, Pools};
    use crate::types::{bit, field, record, vector};

    fn lit(n: i64, pools: &mut Pools) -> EndpointId {
        EndpointId::Literal(pools.literals.intern(LiteralValue::Int(n)))
    }

    #[test]
    fn flatten_non_record_is_single_leaf() {
        let leaves = flatten(&bit());
        assert_eq!(leaves.len(), 1);
        assert_eq!(leaves[0].level, 0);
    }

    #[test]
    fn flatten_record_emits_self_then_fields_in_order() {
        let mut pools = Pools::new();
        let w = lit(8, &mut pools);
        let rec = record("handshake", vec![field("valid", bit()), field("data", vector("v", w))]).unwrap();
        let leaves = flatten(&rec);
        assert_eq!(leaves.len(), 3);
        assert_eq!(leaves[0].level, 0);
        assert_eq!(leaves[1].name().as_str(), "valid");
        assert_eq!(leaves[2].name().as_str(), "data");
    }

    #[test]
    fn flatten_is_deterministic() {
        let mut pools = Pools::new();
        let w = lit(4, &mut pools);
        let rec = record("r", vec![field("a", vector("v", w))]).unwrap();
        let a = flatten(&rec);
        let b = flatten(&rec);
        assert_eq!(a.len(), b.len());
        assert_eq!(a[1].name(), b[1].name());
    }

    #[test]
    fn reversed_xors_through_nesting() {
        let inner = record("inner", vec![field("ready", bit()).reversed(true)]).unwrap();
        let outer = record("outer", vec![field("h", inner).reversed(true)]).unwrap();
        let leaves = flatten(&outer);
        // outer record, inner record, ready leaf; ready's reversed = true ^ true = false
        assert!(!leaves.last().unwrap().reversed);
    }

    #[test]
    fn identity_matrix_round_trips_transpose() {
        let m = MappingMatrix::identity(3);
        let t = m.transpose().transpose();
        for y in 0..3 {
            for x in 0..3 {
                assert_eq!(m.get(y, x), t.get(y, x));
            }
        }
    }

    #[test]
    fn one_to_one_mapping_pair() {
        let a = bit();
        let b = bit();
        let mapper = TypeMapper::make_implicit(&a, &b).unwrap();
        let pairs = mapper.unique_mapping_pairs();
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].a.len(), 1);
        assert_eq!(pairs[0].b.len(), 1);
    }

    #[test]
    fn many_to_one_mapping_pair_from_builder() {
        // a: record{x:bit, y:bit} (3 leaves incl. self) -> b: bit (1 leaf)
        let a = record("a", vec![field("x", bit()), field("y", bit())]).unwrap();
        let b = bit();
        let mut builder = TypeMapper::make(a, b);
        builder.add(1, 0); // a.x -> b
        builder.add(2, 0); // a.y -> b
        let mapper = builder.finish();
        let pairs = mapper.unique_mapping_pairs();
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].a.len(), 2);
        assert_eq!(pairs[0].b.len(), 1);
    }

    #[test]
    fn inverse_of_inverse_equals_original_shape() {
        let a = bit();
        let b = bit();
        let mapper = TypeMapper::make_implicit(&a, &b).unwrap();
        let inv = mapper.inverse();
        let inv2 = inv.inverse();
        assert_eq!(mapper.matrix().get(0, 0), inv2.matrix().get(0, 0));
    }
}
