//! Graphviz DOT back-end (design doc §4.I) — a styling and emission pass,
//! not a new algorithm.
//!
//! Grounded on `examples/original_source/.../cerata/dot/style.h`: physical
//! primitive types (`Bit`, `Vector`) render as ellipses, record types as
//! HTML-table records (one row per field), and parameter/literal nodes
//! render as low-emphasis diamonds. [`DotConfig`] toggles which node kinds
//! are drawn and whether records expand into a table or collapse to a
//! single opaque node.

use std::collections::BTreeSet;
use std::fmt::Write as _;

use arcstr::ArcStr;

use crate::error::Result;
use crate::graph::{Component, Edge};
use crate::node::{EndpointId, Node, NodeId, NodeKind};
use crate::pool::{LiteralId, LiteralValue, Pools};
use crate::types::TypeKind;

/// Which node kinds to draw and how much structural detail to show.
#[derive(Debug, Clone)]
pub struct DotConfig {
    pub show_signals: bool,
    pub show_parameters: bool,
    pub show_literals: bool,
    /// Render a record-typed node as an HTML field table rather than a
    /// single opaque ellipse.
    pub expand_records: bool,
}

impl Default for DotConfig {
    fn default() -> Self {
        DotConfig {
            show_signals: true,
            show_parameters: true,
            show_literals: false,
            expand_records: true,
        }
    }
}

fn dot_id(name: &str) -> String {
    format!("n_{}", crate::name::sanitize(name))
}

/// Emits `comp` as a single `digraph`, one cluster per component level
/// (the component itself, plus one nested dashed cluster per instance).
pub fn emit_component(comp: &Component, pools: &Pools, config: &DotConfig) -> Result<String> {
    tracing::debug!(component = %comp.name(), "emitting DOT graph");
    let mut out = String::new();
    let graph_name = crate::name::sanitize(comp.name());
    writeln!(out, "digraph {graph_name} {{")?;
    writeln!(out, "  rankdir=LR;")?;
    writeln!(out, "  node [fontname=\"monospace\"];")?;
    writeln!(out, "  subgraph cluster_{graph_name} {{")?;
    writeln!(out, "    label=\"{}\";", comp.name())?;

    for port in comp.ports() {
        emit_node(port, config, &mut out)?;
    }
    if config.show_signals {
        for sig in comp.signals() {
            emit_node(sig, config, &mut out)?;
        }
    }
    if config.show_parameters {
        for p in comp.parameters() {
            emit_node(p, config, &mut out)?;
        }
    }
    for arr in comp.arrays() {
        let base = comp.node(arr.base)?;
        if base.is_signal() && !config.show_signals {
            continue;
        }
        if base.is_parameter() && !config.show_parameters {
            continue;
        }
        for idx in 0..arr.len() {
            let child = comp.node(arr.get(idx).unwrap())?;
            emit_node(child, config, &mut out)?;
        }
    }

    for inst in comp.instances() {
        let cluster = crate::name::sanitize(&inst.name);
        writeln!(out, "    subgraph cluster_{cluster} {{")?;
        writeln!(out, "      label=\"{}: {}\";", inst.name, inst.component_name)?;
        writeln!(out, "      style=dashed;")?;
        for port_id in inst.ports.values() {
            emit_node(comp.node(*port_id)?, config, &mut out)?;
        }
        for arr_id in inst.port_arrays.values() {
            let arr = comp.array(*arr_id)?;
            for idx in 0..arr.len() {
                emit_node(comp.node(arr.get(idx).unwrap())?, config, &mut out)?;
            }
        }
        writeln!(out, "    }}")?;
    }
    writeln!(out, "  }}")?;

    if config.show_literals {
        emit_literal_nodes(comp, pools, &mut out)?;
    }
    for edge in comp.edges() {
        emit_edge(comp, edge, config, &mut out)?;
    }

    writeln!(out, "}}")?;
    Ok(out)
}

fn emit_node(node: &Node, config: &DotConfig, out: &mut String) -> Result<()> {
    let id = dot_id(&node.name);
    let label = escape(&node.name);
    if matches!(node.kind, NodeKind::Parameter { .. }) {
        writeln!(out, "    {id} [label=\"{label}\", shape=diamond, style=filled, fillcolor=lightgray];")?;
        return Ok(());
    }
    if let TypeKind::Record { fields } = node.ty.kind() {
        if config.expand_records {
            let mut html = String::from("<TABLE BORDER=\"0\" CELLBORDER=\"1\" CELLSPACING=\"0\">");
            write!(html, "<TR><TD BGCOLOR=\"lightyellow\">{label}</TD></TR>")?;
            for f in fields {
                write!(html, "<TR><TD PORT=\"{}\">{}</TD></TR>", escape(&f.name), escape(&f.name))?;
            }
            html.push_str("</TABLE>");
            writeln!(out, "    {id} [shape=plain, label=<{html}>];")?;
            return Ok(());
        }
    }
    writeln!(out, "    {id} [label=\"{label}\", shape=ellipse];")?;
    Ok(())
}

fn escape(s: &str) -> String {
    s.replace('"', "\\\"")
}

fn array_index(comp: &Component, id: NodeId) -> Option<usize> {
    let node = comp.node(id).ok()?;
    let array_id = node.array()?;
    let arr = comp.array(array_id).ok()?;
    arr.children.iter().position(|c| *c == id)
}

fn endpoint_dot_id(comp: &Component, ep: EndpointId) -> Result<String> {
    match ep {
        EndpointId::Local(id) => Ok(dot_id(&comp.node(id)?.name)),
        EndpointId::Literal(id) => Ok(literal_dot_id(id)),
    }
}

fn literal_dot_id(id: LiteralId) -> String {
    format!("lit_{}", format!("{id:?}").replace(['(', ')'], "_"))
}

fn emit_literal_nodes(comp: &Component, pools: &Pools, out: &mut String) -> Result<()> {
    let mut seen = BTreeSet::new();
    for edge in comp.edges() {
        if let EndpointId::Literal(id) = edge.src {
            if seen.insert(format!("{id:?}")) {
                let label = pools.literals.get(id).map(|l| literal_label(&l.value)).unwrap_or_default();
                writeln!(out, "  {} [label=\"{}\", shape=diamond, style=filled, fillcolor=whitesmoke];", literal_dot_id(id), escape(&label))?;
            }
        }
    }
    Ok(())
}

fn literal_label(v: &LiteralValue) -> ArcStr {
    match v {
        LiteralValue::Int(n) => arcstr::format!("{n}"),
        LiteralValue::Bool(b) => arcstr::format!("{b}"),
        LiteralValue::Str(s) => s.clone(),
    }
}

fn emit_edge(comp: &Component, edge: &Edge, config: &DotConfig, out: &mut String) -> Result<()> {
    if !config.show_literals && matches!(edge.src, EndpointId::Literal(_)) {
        return Ok(());
    }
    let src_id = endpoint_dot_id(comp, edge.src)?;
    let dst_id = endpoint_dot_id(comp, edge.dst)?;
    let label = match edge.dst {
        EndpointId::Local(id) => array_index(comp, id),
        EndpointId::Literal(_) => None,
    }
    .or(match edge.src {
        EndpointId::Local(id) => array_index(comp, id),
        EndpointId::Literal(_) => None,
    })
    .map(|idx| format!("[{idx}]"))
    .unwrap_or_else(|| escape(&edge.name));
    writeln!(out, "  {src_id} -> {dst_id} [label=\"{label}\"];")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Component;
    use crate::node::Direction;
    use crate::pool::{intl, Pools};
    use crate::types::{bit, field, record, vector};

    #[test]
    fn emits_digraph_with_port_nodes() {
        let mut pools = Pools::new();
        let mut comp = Component::new("top");
        let w = intl(&mut pools, 4);
        comp.port("a", vector("v", w), Direction::In).unwrap();
        comp.port("b", bit(), Direction::Out).unwrap();
        let text = emit_component(&comp, &pools, &DotConfig::default()).unwrap();
        assert!(text.starts_with("digraph top {"));
        assert!(text.contains("n_a"));
        assert!(text.contains("n_b"));
        assert!(text.ends_with("}\n"));
    }

    #[test]
    fn record_port_expands_into_html_table() {
        let mut pools = Pools::new();
        let mut comp = Component::new("top");
        let w = intl(&mut pools, 8);
        let ty = record("handshake", vec![field("valid", bit()), field("data", vector("v", w))]).unwrap();
        comp.port("h", ty, Direction::Out).unwrap();
        let text = emit_component(&comp, &pools, &DotConfig::default()).unwrap();
        assert!(text.contains("shape=plain"));
        assert!(text.contains("TABLE"));
    }

    #[test]
    fn hiding_signals_omits_signal_nodes() {
        let mut pools = Pools::new();
        let mut comp = Component::new("top");
        comp.signal("s", bit()).unwrap();
        let mut config = DotConfig::default();
        config.show_signals = false;
        let text = emit_component(&comp, &pools, &config).unwrap();
        assert!(!text.contains("n_s "));
    }
}
