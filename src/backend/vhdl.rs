//! VHDL back-end (design doc §4.H): mandatory signalization followed by
//! entity/architecture emission.
//!
//! Grounded on `examples/original_source/.../cerata/vhdl/{declaration,
//! architecture,instantiation}.cc`: every instance port is rerouted through
//! a fresh, component-owned signal before emission; entities declare
//! generics and ports in `UPPER_SNAKE_CASE`; instance generic and port maps
//! are built from [`crate::flatten::unique_mapping_pairs`] rather than a
//! naive one-to-one zip, so a single wide signal can feed several one-bit
//! ports (and vice versa).

use std::fmt::Write as _;

use arcstr::ArcStr;

use crate::array::NodeArray;
use crate::error::{Error, Result};
use crate::flatten::{flatten, get_or_make_mapper, FlatType, MappingEntry, MappingPair};
use crate::graph::{Component, Edge, Instance};
use crate::node::{Direction, EndpointId, Node, NodeId, NodeKind, Op};
use crate::pool::{ComponentPool, LiteralValue, Pools};
use crate::types::{Type, TypeKind};
use crate::value::Value;

/// Emits one component's entity and architecture as VHDL source text.
/// Signalization runs on an internal clone; `comp` itself is untouched.
pub fn emit_component(comp: &Component, pools: &mut Pools, components: &ComponentPool) -> Result<String> {
    tracing::debug!(component = %comp.name(), "emitting VHDL");
    let signalized = signalize(comp, pools)?;
    let mut out = String::new();
    emit_entity(&signalized, pools, &mut out)?;
    out.push('\n');
    emit_architecture(&signalized, pools, components, &mut out)?;
    Ok(out)
}

fn entity_name(name: &str) -> ArcStr {
    upper_name(name)
}

fn upper_name(name: &str) -> ArcStr {
    ArcStr::from(crate::name::sanitize(name).to_uppercase())
}

// --- signalization -----------------------------------------------------

/// Inserts a component-owned signal between every instance port (and port
/// array child) and whatever drives or reads it (design doc §4.H, step 1).
fn signalize(src: &Component, pools: &mut Pools) -> Result<Component> {
    let mut comp = src.clone();
    let inst_ids: Vec<_> = comp.instances().map(|i| i.id).collect();
    for inst_id in inst_ids {
        let inst = comp.instance(inst_id)?.clone();
        for (pname, port_id) in inst.ports.iter() {
            let ty = comp.node(*port_id)?.ty.clone();
            let sig_name = arcstr::format!("{}_{}", inst.name, pname);
            let sig_id = comp.signal(sig_name, ty)?;
            reroute(&mut comp, pools, *port_id, sig_id)?;
        }
        for (aname, arr_id) in inst.port_arrays.iter() {
            let arr = comp.array(*arr_id)?.clone();
            let base_ty = comp.node(arr.base)?.ty.clone();
            let sig_name = arcstr::format!("{}_{}", inst.name, aname);
            let sig_arr_id = comp.signal_array(sig_name, base_ty, arr.size)?;
            for i in 0..arr.children.len() {
                let sig_child = comp.array_append(pools, sig_arr_id, false)?;
                reroute(&mut comp, pools, arr.children[i], sig_child)?;
            }
        }
    }
    Ok(comp)
}

fn reroute(comp: &mut Component, pools: &mut Pools, port_id: NodeId, sig_id: NodeId) -> Result<()> {
    let node = comp.node(port_id)?.clone();
    if let Some(edge_id) = node.input() {
        let edge = comp.edge(edge_id)?.clone();
        comp.remove_edge(edge_id)?;
        comp.connect(pools, EndpointId::Local(sig_id), edge.src)?;
        comp.connect(pools, EndpointId::Local(port_id), EndpointId::Local(sig_id))?;
    }
    let outputs = node.outputs().to_vec();
    if !outputs.is_empty() {
        for edge_id in outputs {
            let edge = comp.edge(edge_id)?.clone();
            let dst = edge.dst;
            comp.remove_edge(edge_id)?;
            comp.connect(pools, dst, EndpointId::Local(sig_id))?;
        }
        comp.connect(pools, EndpointId::Local(sig_id), EndpointId::Local(port_id))?;
    }
    Ok(())
}

// --- width/value resolution ---------------------------------------------

/// Resolves an endpoint to a [`Value`] for VHDL text (range bounds, generic
/// map values): a literal renders numerically; a component's own parameter
/// renders as its bare (upper-cased) name; an instance-copied or
/// signalization-synthesized parameter is chased through its current
/// driving edge instead, since from this component's point of view it has
/// been bound to something concrete. Resolved per design doc §9's
/// parameter-value open question, decided in favor of tracing the live
/// binding rather than the frozen default.
fn value_of(comp: &Component, pools: &Pools, ep: EndpointId) -> Result<Value> {
    match ep {
        EndpointId::Literal(id) => {
            let lit = pools
                .literals
                .get(id)
                .ok_or_else(|| Error::NoSuchObject("literal", arcstr::format!("{id:?}"), comp.name().clone()))?;
            Ok(literal_value_to_value(&lit.value))
        }
        EndpointId::Local(id) => {
            let node = comp.node(id)?;
            match &node.kind {
                NodeKind::Expression { op, lhs, rhs } => {
                    let a = value_of(comp, pools, *lhs)?;
                    let b = value_of(comp, pools, *rhs)?;
                    Ok(match op {
                        Op::Add => a + b,
                        Op::Sub => a - b,
                        Op::Mul => a * b,
                        Op::Div => Value::symbol(format!("{a}/{b}")),
                    })
                }
                NodeKind::Parameter { .. } => {
                    let synthetic = node.meta.get("synthetic").map(|v| v == "true").unwrap_or(false);
                    if comp.is_instance_param(id) || synthetic {
                        if let Some(edge_id) = node.input() {
                            let edge = comp.edge(edge_id)?;
                            return value_of(comp, pools, edge.src);
                        }
                    }
                    Ok(Value::symbol(upper_name(&node.name)))
                }
                _ => Ok(Value::symbol(upper_name(&node.name))),
            }
        }
    }
}

fn literal_value_to_value(v: &LiteralValue) -> Value {
    match v {
        LiteralValue::Int(n) => Value::int(*n),
        LiteralValue::Bool(b) => Value::symbol(if *b { "true" } else { "false" }),
        LiteralValue::Str(s) => Value::symbol(arcstr::format!("\"{s}\"")),
    }
}

fn literal_text(pools: &Pools, id: crate::pool::LiteralId, comp_name: &ArcStr) -> Result<String> {
    let lit = pools
        .literals
        .get(id)
        .ok_or_else(|| Error::NoSuchObject("literal", arcstr::format!("{id:?}"), comp_name.clone()))?;
    Ok(match &lit.value {
        LiteralValue::Int(n) => n.to_string(),
        LiteralValue::Bool(b) => b.to_string(),
        LiteralValue::Str(s) => format!("\"{s}\""),
    })
}

/// Renders a physical type as a VHDL subtype mark. Non-physical types only
/// ever appear as generics, resolved separately in [`emit_entity`].
fn vhdl_subtype(comp: &Component, pools: &Pools, ty: &Type) -> Result<String> {
    match ty.kind() {
        TypeKind::Bit => Ok("std_logic".to_string()),
        TypeKind::Vector { width } => {
            let w = value_of(comp, pools, *width)?;
            let hi = w - Value::int(1);
            Ok(format!("std_logic_vector({hi} downto 0)"))
        }
        TypeKind::Integer => Ok("integer".to_string()),
        TypeKind::Boolean => Ok("boolean".to_string()),
        TypeKind::String => Ok("string".to_string()),
        TypeKind::Record { .. } => Err(Error::NonPhysicalType(ty.name().clone())),
    }
}

fn generic_type_text(ty: &Type) -> &'static str {
    match ty.kind() {
        TypeKind::Boolean => "boolean",
        TypeKind::String => "string",
        _ => "integer",
    }
}

/// Total physical bit width of `ty` — the sum of its non-structural
/// flattened leaves. Used for the merged `std_logic_vector` a port/signal
/// array collapses into (design doc §4.H: "port arrays expand into
/// `std_logic_vector(size * width - 1 downto 0)`").
fn physical_width(comp: &Component, pools: &Pools, ty: &Type) -> Result<Value> {
    let mut total = Value::int(0);
    for leaf in flatten(ty) {
        if matches!(leaf.ty.kind(), TypeKind::Record { .. }) {
            continue;
        }
        let w = leaf
            .width(&|ep| value_of(comp, pools, ep).ok())
            .ok_or_else(|| Error::NonPhysicalType(leaf.ty.name().clone()))?;
        total = total + w;
    }
    Ok(total)
}

/// The `downto` high bound of an array's merged vector: `size * width - 1`.
fn array_merged_hi(comp: &Component, pools: &Pools, arr: &NodeArray) -> Result<Value> {
    let base = comp.node(arr.base)?;
    let elem_width = physical_width(comp, pools, &base.ty)?;
    let size = value_of(comp, pools, arr.size)?;
    Ok(size * elem_width - Value::int(1))
}

fn array_port_line(comp: &Component, pools: &Pools, arr: &NodeArray, dir: Direction) -> Result<String> {
    let hi = array_merged_hi(comp, pools, arr)?;
    let dir_text = match dir {
        Direction::In => "in",
        Direction::Out => "out",
    };
    Ok(format!("{} : {dir_text} std_logic_vector({hi} downto 0)", upper_name(&arr.name)))
}

fn array_signal_line(comp: &Component, pools: &Pools, arr: &NodeArray) -> Result<String> {
    let hi = array_merged_hi(comp, pools, arr)?;
    Ok(format!("  signal {} : std_logic_vector({hi} downto 0);", upper_name(&arr.name)))
}

/// If `id` is a concrete child of a [`NodeArray`] (as opposed to the array's
/// base template), its array and index within it.
fn array_child_info(comp: &Component, id: NodeId) -> Option<(NodeArray, usize)> {
    let node = comp.node(id).ok()?;
    let array_id = node.array()?;
    let arr = comp.array(array_id).ok()?.clone();
    let idx = arr.children.iter().position(|c| *c == id)?;
    Some((arr, idx))
}

// --- entity declarations -------------------------------------------------

struct PortDecl {
    name: ArcStr,
    dir: Direction,
    ty: Type,
}

fn entity_port_decls(comp: &Component) -> Result<Vec<PortDecl>> {
    let mut out = Vec::new();
    for port in comp.ports() {
        out.push(PortDecl {
            name: port.name.clone(),
            dir: port.direction().unwrap(),
            ty: port.ty.clone(),
        });
    }
    Ok(out)
}

/// Port-array declarations, one merged `std_logic_vector` line per array
/// rather than one per element (design doc §4.H).
fn array_port_decl_lines(comp: &Component, pools: &Pools) -> Result<Vec<String>> {
    let mut out = Vec::new();
    for arr in comp.arrays() {
        let base = comp.node(arr.base)?;
        if !base.is_port() {
            continue;
        }
        out.push(array_port_line(comp, pools, arr, base.direction().unwrap())?);
    }
    Ok(out)
}

/// Flattens one named, directed, typed object into `(leaf_name, dir,
/// vhdl_subtype)` lines, skipping structural record "self" entries. Shared
/// between entity port declarations and architecture-level signal
/// declarations (`as_signal` drops the direction keyword).
fn flatten_decl_lines(comp: &Component, pools: &Pools, name: &ArcStr, dir: Direction, ty: &Type, as_signal: bool) -> Result<Vec<String>> {
    let leaves = flatten(ty);
    let mut lines = Vec::new();
    for leaf in &leaves {
        if matches!(leaf.ty.kind(), TypeKind::Record { .. }) {
            continue;
        }
        let leaf_name = leaf_qualified(name, leaf);
        let leaf_dir = if leaf.reversed { dir.flip() } else { dir };
        let subtype = vhdl_subtype(comp, pools, &leaf.ty)?;
        if as_signal {
            lines.push(format!("  signal {} : {};", upper_name(&leaf_name), subtype));
        } else {
            let dir_text = match leaf_dir {
                Direction::In => "in",
                Direction::Out => "out",
            };
            lines.push(format!("{} : {} {}", upper_name(&leaf_name), dir_text, subtype));
        }
    }
    Ok(lines)
}

fn leaf_qualified(base: &str, leaf: &FlatType) -> ArcStr {
    if leaf.name_parts.is_empty() {
        ArcStr::from(base)
    } else {
        arcstr::format!("{base}_{}", leaf.name())
    }
}

fn emit_entity(comp: &Component, pools: &Pools, out: &mut String) -> Result<()> {
    let ename = entity_name(comp.name());
    writeln!(out, "entity {ename} is")?;

    let generics: Vec<&Node> = comp.parameters().collect();
    if !generics.is_empty() {
        writeln!(out, "  generic (")?;
        for (i, p) in generics.iter().enumerate() {
            let NodeKind::Parameter { default } = &p.kind else {
                unreachable!("comp.parameters() only yields Parameter nodes");
            };
            let default_text = literal_text(pools, *default, comp.name())?;
            let sep = if i + 1 < generics.len() { ";" } else { "" };
            writeln!(
                out,
                "    {} : {} := {}{sep}",
                upper_name(&p.name),
                generic_type_text(&p.ty),
                default_text
            )?;
        }
        writeln!(out, "  );")?;
    }

    let decls = entity_port_decls(comp)?;
    let mut port_lines = Vec::new();
    for d in &decls {
        port_lines.extend(flatten_decl_lines(comp, pools, &d.name, d.dir, &d.ty, false)?);
    }
    port_lines.extend(array_port_decl_lines(comp, pools)?);
    if !port_lines.is_empty() {
        writeln!(out, "  port (")?;
        let n = port_lines.len();
        for (i, line) in port_lines.iter().enumerate() {
            let sep = if i + 1 < n { ";" } else { "" };
            writeln!(out, "    {line}{sep}")?;
        }
        writeln!(out, "  );")?;
    }
    writeln!(out, "end entity {ename};")?;
    Ok(())
}

// --- architecture ----------------------------------------------------------

fn emit_component_declaration(comp_name: &str, source: &Component, pools: &Pools, out: &mut String) -> Result<()> {
    let name = upper_name(comp_name);
    writeln!(out, "  component {name} is")?;
    let generics: Vec<&Node> = source.parameters().collect();
    if !generics.is_empty() {
        writeln!(out, "    generic (")?;
        for (i, p) in generics.iter().enumerate() {
            let sep = if i + 1 < generics.len() { ";" } else { "" };
            writeln!(out, "      {} : {}{sep}", upper_name(&p.name), generic_type_text(&p.ty))?;
        }
        writeln!(out, "    );")?;
    }
    let decls = entity_port_decls(source)?;
    let mut port_lines = Vec::new();
    for d in &decls {
        port_lines.extend(flatten_decl_lines(source, pools, &d.name, d.dir, &d.ty, false)?);
    }
    port_lines.extend(array_port_decl_lines(source, pools)?);
    if !port_lines.is_empty() {
        writeln!(out, "    port (")?;
        let n = port_lines.len();
        for (i, line) in port_lines.iter().enumerate() {
            let sep = if i + 1 < n { ";" } else { "" };
            writeln!(out, "      {line}{sep}")?;
        }
        writeln!(out, "    );")?;
    }
    writeln!(out, "  end component;")?;
    Ok(())
}

/// Renders one side of a mapping pair. A concrete array-child endpoint slices
/// its array's merged signal (`elem_width`, the width of one element per
/// design doc §4.H, seeds the `downto` bounds by the child's index); any
/// other node renders through its own flat leaves as before.
fn side_text(comp: &Component, pools: &Pools, ep: EndpointId, entries: &[MappingEntry], elem_width: &Value) -> Result<String> {
    match ep {
        EndpointId::Literal(id) => literal_text(pools, id, comp.name()),
        EndpointId::Local(node_id) => {
            if let Some((arr, idx)) = array_child_info(comp, node_id) {
                let idx = Value::int(idx as i64);
                let lo = idx.clone() * elem_width.clone();
                let hi = (idx + Value::int(1)) * elem_width.clone() - Value::int(1);
                return Ok(format!("{}({hi} downto {lo})", upper_name(&arr.name)));
            }
            let base = comp.node(node_id)?.name.clone();
            let parts: Vec<String> = entries
                .iter()
                .filter(|e| !matches!(e.flat_type.ty.kind(), TypeKind::Record { .. }))
                .map(|e| upper_name(&leaf_qualified(&base, &e.flat_type)).to_string())
                .collect();
            Ok(parts.join(" & "))
        }
    }
}

/// One assignment per unique mapping pair between `edge.src` and
/// `edge.dst`'s types, skipping pairs that are purely structural (a
/// record's "self" entry carries no physical bits of its own).
fn emit_assignment(comp: &Component, pools: &Pools, edge: &Edge, out: &mut String) -> Result<()> {
    let dst_ty = comp.endpoint_type(pools, edge.dst)?;
    let src_ty = comp.endpoint_type(pools, edge.src)?;
    let mapper = get_or_make_mapper(&src_ty, &dst_ty).ok_or_else(|| Error::NoMapper(src_ty.name().clone(), dst_ty.name().clone()))?;
    for pair in mapper.unique_mapping_pairs() {
        let structural = pair.a.iter().chain(pair.b.iter()).any(|e| matches!(e.flat_type.ty.kind(), TypeKind::Record { .. }));
        if structural {
            continue;
        }
        let resolve = |ep: EndpointId| value_of(comp, pools, ep).ok();
        let width_a = pair.width_a(1, &resolve);
        let width_b = pair.width_b(1, &resolve);
        let src_text = side_text(comp, pools, edge.src, &pair.a, &width_a)?;
        let dst_text = side_text(comp, pools, edge.dst, &pair.b, &width_b)?;
        if src_text.is_empty() || dst_text.is_empty() {
            continue;
        }
        // A field marked `reversed` (e.g. a handshake's `ready`) carries data
        // against the rest of its record, so the driver for that leaf is
        // whichever side the forward fields read from, not the edge's own
        // src/dst.
        let reversed = pair.b.iter().any(|e| e.flat_type.reversed);
        if reversed {
            writeln!(out, "  {src_text} <= {dst_text};")?;
        } else {
            writeln!(out, "  {dst_text} <= {src_text};")?;
        }
    }
    Ok(())
}

fn emit_instance(comp: &Component, pools: &Pools, components: &ComponentPool, inst: &Instance, out: &mut String) -> Result<()> {
    let is_prim = components.get(&inst.component_name).map(super::is_primitive).unwrap_or(false);
    let label = upper_name(&inst.name);
    let target = if is_prim {
        format!("entity work.{}", upper_name(&inst.component_name))
    } else {
        upper_name(&inst.component_name).to_string()
    };
    writeln!(out, "  {label} : {target}")?;

    if !inst.params.is_empty() {
        writeln!(out, "    generic map (")?;
        let n = inst.params.len();
        for (i, (name, node_id)) in inst.params.iter().enumerate() {
            let value = value_of(comp, pools, EndpointId::Local(*node_id))?;
            let sep = if i + 1 < n { "," } else { "" };
            writeln!(out, "      {} => {value}{sep}", upper_name(name))?;
        }
        writeln!(out, "    )")?;
    }

    let mut lines: Vec<(ArcStr, ArcStr, Type)> = Vec::new();
    for (name, node_id) in inst.ports.iter() {
        let ty = comp.node(*node_id)?.ty.clone();
        let sig_name = arcstr::format!("{}_{}", inst.name, name);
        lines.push((name.clone(), sig_name, ty));
    }

    let mut map_lines = Vec::new();
    for (port_name, sig_name, ty) in &lines {
        let port_leaves = flat_leaf_names(port_name, ty);
        let sig_leaves = flat_leaf_names(sig_name, ty);
        for (p, s) in port_leaves.into_iter().zip(sig_leaves) {
            map_lines.push(format!("{} => {}", upper_name(&p), upper_name(&s)));
        }
    }
    for (name, _arr_id) in inst.port_arrays.iter() {
        let sig_name = arcstr::format!("{}_{}", inst.name, name);
        map_lines.push(format!("{} => {}", upper_name(name), upper_name(&sig_name)));
    }
    if !map_lines.is_empty() {
        writeln!(out, "    port map (")?;
        let n = map_lines.len();
        for (i, line) in map_lines.iter().enumerate() {
            let sep = if i + 1 < n { "," } else { "" };
            writeln!(out, "      {line}{sep}")?;
        }
        writeln!(out, "    );")?;
    } else {
        writeln!(out, "    port map ();")?;
    }
    Ok(())
}

fn flat_leaf_names(base: &ArcStr, ty: &Type) -> Vec<ArcStr> {
    flatten(ty)
        .into_iter()
        .filter(|l| !matches!(l.ty.kind(), TypeKind::Record { .. }))
        .map(|l| leaf_qualified(base, &l))
        .collect()
}

fn emit_architecture(comp: &Component, pools: &Pools, components: &ComponentPool, out: &mut String) -> Result<()> {
    let ename = entity_name(comp.name());
    writeln!(out, "architecture structural of {ename} is")?;

    let mut declared = std::collections::HashSet::new();
    for inst in comp.instances() {
        if !declared.insert(inst.component_name.clone()) {
            continue;
        }
        let Some(source) = components.get(&inst.component_name) else {
            continue;
        };
        if super::is_primitive(source) {
            continue;
        }
        emit_component_declaration(&inst.component_name, source, pools, out)?;
    }

    for sig in comp.signals() {
        out.push_str(&flatten_decl_lines(comp, pools, &sig.name, Direction::In, &sig.ty, true)?.join("\n"));
        out.push('\n');
    }
    for arr in comp.arrays() {
        let base = comp.node(arr.base)?;
        if !base.is_signal() {
            continue;
        }
        writeln!(out, "{}", array_signal_line(comp, pools, arr)?)?;
    }

    writeln!(out, "begin")?;
    for inst in comp.instances() {
        emit_instance(comp, pools, components, inst, out)?;
    }
    for edge in comp.edges() {
        let touches_instance_port = matches!(edge.src, EndpointId::Local(id) if comp.is_instance_port(id))
            || matches!(edge.dst, EndpointId::Local(id) if comp.is_instance_port(id));
        if touches_instance_port {
            continue;
        }
        emit_assignment(comp, pools, edge, out)?;
    }
    writeln!(out, "end architecture structural;")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Component;
    use crate::node::Direction;
    use crate::pool::{intl, Pools};
    use crate::types::{bit, vector};

    #[test]
    fn emits_simple_entity_with_literal_width_port() {
        let mut pools = Pools::new();
        let mut comp = Component::new("adder");
        let w = intl(&mut pools, 8);
        comp.port("a", vector("v", w), Direction::In).unwrap();
        comp.port("b", bit(), Direction::Out).unwrap();
        let components = ComponentPool::new();
        let text = emit_component(&comp, &mut pools, &components).unwrap();
        assert!(text.contains("entity ADDER is"));
        assert!(text.contains("A : in std_logic_vector(7 downto 0)"));
        assert!(text.contains("B : out std_logic"));
        assert!(text.contains("end entity ADDER;"));
    }

    #[test]
    fn generic_width_port_renders_symbolically() {
        let mut pools = Pools::new();
        let mut comp = Component::new("gen");
        let default = pools.literals.intern(LiteralValue::Int(8));
        let w = comp.parameter(&mut pools, "vec_width", crate::types::integer(), default).unwrap();
        comp.port("data", vector("v", EndpointId::Local(w)), Direction::In).unwrap();
        let components = ComponentPool::new();
        let text = emit_component(&comp, &mut pools, &components).unwrap();
        assert!(text.contains("VEC_WIDTH : integer := 8"));
        assert!(text.contains("DATA : in std_logic_vector(VEC_WIDTH-1 downto 0)"));
    }

    #[test]
    fn instantiation_rebinds_generic_to_parent_name() {
        let mut pools = Pools::new();
        let mut child = Component::new("child");
        let default = pools.literals.intern(LiteralValue::Int(8));
        let cw = child.parameter(&mut pools, "width", crate::types::integer(), default).unwrap();
        child.port("data", vector("v", EndpointId::Local(cw)), Direction::In).unwrap();

        let mut parent = Component::new("top");
        let top_default = pools.literals.intern(LiteralValue::Int(16));
        let top_width = parent.parameter(&mut pools, "top_width", crate::types::integer(), top_default).unwrap();
        let inst_id = parent.instantiate(&mut pools, &mut child, Some("xi")).unwrap();
        let inst = parent.instance(inst_id).unwrap();
        let inst_width = inst.aparam("width").unwrap();
        parent
            .connect(&mut pools, EndpointId::Local(inst_width), EndpointId::Local(top_width))
            .unwrap();

        let mut components = ComponentPool::new();
        components.add(child.clone()).unwrap();
        let text = emit_component(&parent, &mut pools, &components).unwrap();
        assert!(text.contains("WIDTH => TOP_WIDTH"));
    }
}
