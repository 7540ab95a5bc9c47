//! Hierarchy resolution.
//!
//! Runs once over a fully built [`Design`]: resolves every referenced
//! name to a circuit, model, or configured primitive, checks pin counts,
//! rejects cyclic hierarchies, and selects the unique uninstantiated
//! circuit as the root.
//!
//! All changes are staged and applied only if every check passes,
//! so a failed resolution leaves the design untouched.

use std::collections::HashSet;
use std::ops::RangeInclusive;

use arcstr::ArcStr;
use indexmap::IndexSet;
use tracing::{span, Level};

use crate::config::NameKey;
use crate::db::{Circuit, CircuitId, Design, DeviceType, Node, PrimitiveKind};
use crate::error::{Error, Result};

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum Visit {
    New,
    Active,
    Done,
}

/// A node whose device type changes on commit.
struct Resolved {
    circuit: usize,
    node: usize,
    device: DeviceType,
}

pub(crate) fn resolve(design: &mut Design) -> Result<CircuitId> {
    let _guard = span!(
        Level::INFO,
        "resolving hierarchy",
        circuits = design.circuits.len()
    )
    .entered();

    let case = design.config.case_policy();
    let primitives: HashSet<NameKey> = design
        .config
        .primitives
        .iter()
        .map(|name| case.key(name.clone()))
        .collect();

    let mut staged = Vec::new();
    let mut edges: Vec<IndexSet<usize>> = vec![IndexSet::new(); design.circuits.len()];
    for circuit in design.circuits.iter() {
        let _guard = span!(
            Level::INFO,
            "resolving circuit",
            circuit.id = %circuit.id,
            circuit.name = %circuit.name
        )
        .entered();
        for (index, node) in circuit.nodes.iter().enumerate() {
            let Some(device) = resolve_node(design, &primitives, circuit, node)? else {
                continue;
            };
            if let DeviceType::Subcircuit { id, .. } = device {
                edges[circuit.id.index()].insert(id.index());
            }
            staged.push(Resolved {
                circuit: circuit.id.index(),
                node: index,
                device,
            });
        }
    }

    if let Some(cycle) = find_cycle(&edges) {
        return Err(Error::CyclicHierarchy {
            cycle: cycle
                .into_iter()
                .map(|index| design.circuits[index].name.clone())
                .collect(),
        });
    }

    let mut instantiated = vec![false; edges.len()];
    for child in edges.iter().flatten() {
        instantiated[*child] = true;
    }
    let candidates: Vec<usize> = (0..edges.len()).filter(|&i| !instantiated[i]).collect();
    let root = match candidates.as_slice() {
        [root] => CircuitId::new(*root),
        _ => {
            return Err(Error::AmbiguousRoot {
                candidates: candidates
                    .into_iter()
                    .map(|index| design.circuits[index].name.clone())
                    .collect(),
            })
        }
    };

    for Resolved {
        circuit,
        node,
        device,
    } in staged
    {
        design.circuits[circuit].nodes[node].device = device;
    }
    for (circuit, children) in design.circuits.iter_mut().zip(edges) {
        circuit.children = children.into_iter().map(CircuitId::new).collect();
    }
    design.root = Some(root);
    tracing::info!(root = %design.circuits[root.index()].name, "resolved hierarchy");
    Ok(root)
}

/// Returns the new device type of a node, or [`None`] if it is unchanged.
fn resolve_node(
    design: &Design,
    primitives: &HashSet<NameKey>,
    circuit: &Circuit,
    node: &Node,
) -> Result<Option<DeviceType>> {
    match &node.device {
        DeviceType::Reference(name) => {
            if let Some(child) = design.circuit_named(name) {
                return instantiate(circuit, node, child).map(Some);
            }
            if let Some(model) = design.model_named(name) {
                check_primitive(circuit, node, model.kind(), model.name())?;
                return Ok(Some(DeviceType::Primitive {
                    kind: model.kind(),
                    model: Some(model.name().clone()),
                }));
            }
            if primitives.contains(&design.config.case_policy().key(name.clone())) {
                return Ok(Some(DeviceType::Primitive {
                    kind: PrimitiveKind::Model,
                    model: Some(name.clone()),
                }));
            }
            Err(Error::UnresolvedReference {
                line: node.line,
                circuit: circuit.name.clone(),
                node: node.name.clone(),
                master: name.clone(),
            })
        }
        DeviceType::Primitive { kind, model } => {
            // Element statements may name a subcircuit in place of a model.
            if let Some(child) = model.as_ref().and_then(|m| design.circuit_named(m)) {
                return instantiate(circuit, node, child).map(Some);
            }
            check_primitive(circuit, node, *kind, &node.device.name())?;
            Ok(None)
        }
        DeviceType::Subcircuit { .. } => Ok(None),
    }
}

fn instantiate(circuit: &Circuit, node: &Node, child: &Circuit) -> Result<DeviceType> {
    if node.pin_count() != child.port_count() {
        return Err(Error::PortArity {
            line: node.line,
            circuit: circuit.name.clone(),
            node: node.name.clone(),
            master: child.name.clone(),
            expected: child.port_count().to_string(),
            actual: node.pin_count(),
        });
    }
    Ok(DeviceType::Subcircuit {
        id: child.id,
        name: child.name.clone(),
    })
}

fn check_primitive(circuit: &Circuit, node: &Node, kind: PrimitiveKind, master: &ArcStr) -> Result<()> {
    match kind.terminal_counts() {
        Some(counts) if !counts.contains(&node.pin_count()) => Err(Error::PortArity {
            line: node.line,
            circuit: circuit.name.clone(),
            node: node.name.clone(),
            master: master.clone(),
            expected: fmt_counts(&counts),
            actual: node.pin_count(),
        }),
        _ => Ok(()),
    }
}

fn fmt_counts(counts: &RangeInclusive<usize>) -> String {
    if counts.start() == counts.end() {
        counts.start().to_string()
    } else {
        format!("{} to {}", counts.start(), counts.end())
    }
}

/// Finds a cycle in the instantiation graph.
///
/// The returned path starts and ends with the same circuit.
fn find_cycle(edges: &[IndexSet<usize>]) -> Option<Vec<usize>> {
    let mut state = vec![Visit::New; edges.len()];
    let mut path = Vec::new();
    (0..edges.len()).find_map(|start| dfs(start, edges, &mut state, &mut path))
}

fn dfs(
    id: usize,
    edges: &[IndexSet<usize>],
    state: &mut [Visit],
    path: &mut Vec<usize>,
) -> Option<Vec<usize>> {
    match state[id] {
        Visit::Done => return None,
        Visit::Active => {
            let start = path.iter().position(|&p| p == id)?;
            let mut cycle = path[start..].to_vec();
            cycle.push(id);
            return Some(cycle);
        }
        Visit::New => {}
    }

    state[id] = Visit::Active;
    path.push(id);
    for &child in edges[id].iter() {
        if let Some(cycle) = dfs(child, edges, state, path) {
            return Some(cycle);
        }
    }
    path.pop();
    state[id] = Visit::Done;
    None
}
