//! Back-ends: VHDL synthesis emission and graphviz DOT visualization
//! (design doc §4.H, §4.I), plus the multi-component emission driver that
//! walks a component's transitive instance closure.

pub mod dot;
pub mod vhdl;

use std::collections::HashSet;

use arcstr::ArcStr;

use crate::error::{Error, Result};
use crate::graph::Component;
use crate::pool::{ComponentPool, Pools};

/// `true` iff `comp` is tagged as an externally-defined primitive (external
/// interfaces §6: `meta["primitive"] == "true"`) — such components are
/// never emitted as their own VHDL file, and are instantiated by direct
/// entity reference rather than a `component` declaration.
pub(crate) fn is_primitive(comp: &Component) -> bool {
    comp.meta.get("primitive").map(|v| v == "true").unwrap_or(false)
}

/// One top-level component to emit, alongside everything it transitively
/// instantiates (external interfaces §6: `OutputSpec`).
pub struct OutputSpec<'a> {
    pub component: &'a Component,
}

impl<'a> OutputSpec<'a> {
    pub fn new(component: &'a Component) -> Self {
        OutputSpec { component }
    }
}

/// Emits one VHDL source file's worth of text per unique, non-primitive
/// component reachable from a set of top-level specs, children before
/// parents (external interfaces §6: a `Job` is the batch emission driver).
pub struct Job<'a> {
    specs: Vec<OutputSpec<'a>>,
}

impl<'a> Job<'a> {
    pub fn new(specs: Vec<OutputSpec<'a>>) -> Self {
        Job { specs }
    }

    /// Returns `(component_name, vhdl_source)` pairs in emission order.
    /// `components` must contain every component transitively instantiated
    /// by a spec, registered under its own name.
    pub fn run(&self, pools: &mut Pools, components: &ComponentPool) -> Result<Vec<(ArcStr, String)>> {
        let mut seen = HashSet::new();
        let mut order = Vec::new();
        for spec in &self.specs {
            visit(spec.component.name(), components, &mut seen, &mut order)?;
        }
        let mut out = Vec::new();
        for name in order {
            let comp = components
                .get(&name)
                .ok_or_else(|| Error::NoSuchObject("component", name.clone(), ArcStr::from("job")))?;
            if is_primitive(comp) {
                continue;
            }
            let text = vhdl::emit_component(comp, pools, components)?;
            out.push((name, text));
        }
        Ok(out)
    }
}

fn visit(name: &ArcStr, components: &ComponentPool, seen: &mut HashSet<ArcStr>, order: &mut Vec<ArcStr>) -> Result<()> {
    if seen.contains(name) {
        return Ok(());
    }
    seen.insert(name.clone());
    let comp = components
        .get(name)
        .ok_or_else(|| Error::NoSuchObject("component", name.clone(), ArcStr::from("job")))?;
    for inst in comp.instances() {
        visit(&inst.component_name, components, seen, order)?;
    }
    order.push(name.clone());
    Ok(())
}
