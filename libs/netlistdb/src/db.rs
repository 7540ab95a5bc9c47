//! The hierarchical circuit database.
//!
//! A [`Design`] owns an arena of [`Circuit`]s indexed by [`CircuitId`].
//! Each circuit owns its nodes and nets; pins refer to nets by index
//! within the same circuit, and subcircuit instances refer to other
//! circuits by [`CircuitId`] once the design is resolved.
//!
//! The database is read-only outside this crate. It is populated by the
//! [`NetlistBuilder`](crate::NetlistBuilder) and cross-linked by
//! [`Design::resolve_root`].

use std::collections::HashMap;
use std::fmt::Display;
use std::ops::RangeInclusive;

use arcstr::ArcStr;
use indexmap::IndexMap;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::config::{CasePolicy, NameKey, ParseConfig};
use crate::error::{Error, Result};
use crate::issues::{IssueSet, ParseIssue};
use crate::resolver;

/// An opaque circuit identifier.
///
/// A circuit ID created in the context of one design must
/// *not* be used in the context of another design.
#[derive(Copy, Clone, Debug, Default, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
pub struct CircuitId(usize);

/// A pin's position on a node.
#[derive(Copy, Clone, Debug, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct PinRef {
    /// The index of the node within its circuit.
    pub node: usize,
    /// The position of the pin on the node.
    pub pin: usize,
}

/// One terminal of a node.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Pin {
    position: usize,
    net: usize,
}

/// A named connection point within a circuit.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Net {
    pub(crate) name: ArcStr,
    pub(crate) pins: Vec<PinRef>,
    pub(crate) port: Option<usize>,
    pub(crate) global: bool,
}

/// An instance within a circuit.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Node {
    pub(crate) name: ArcStr,
    pub(crate) line: usize,
    pub(crate) device: DeviceType,
    pub(crate) pins: Vec<Pin>,
    pub(crate) params: Params,
    pub(crate) values: Vec<Value>,
}

/// What a node places.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum DeviceType {
    /// A primitive device.
    Primitive {
        /// The device kind.
        kind: PrimitiveKind,
        /// The model name, if any.
        model: Option<ArcStr>,
    },
    /// A name not yet resolved.
    ///
    /// Only present in designs that have not been resolved.
    Reference(ArcStr),
    /// An instance of another circuit.
    Subcircuit {
        /// The instantiated circuit.
        id: CircuitId,
        /// The name of the instantiated circuit.
        name: ArcStr,
    },
}

/// Primitive device kinds.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum PrimitiveKind {
    /// A MOS transistor.
    Mosfet,
    /// A resistor.
    Resistor,
    /// A capacitor.
    Capacitor,
    /// An inductor.
    Inductor,
    /// A diode.
    Diode,
    /// A bipolar transistor.
    Bjt,
    /// A junction field-effect transistor.
    Jfet,
    /// An independent voltage source.
    VoltageSource,
    /// An independent current source.
    CurrentSource,
    /// A voltage-controlled voltage source.
    Vcvs,
    /// A voltage-controlled current source.
    Vccs,
    /// A current-controlled voltage source.
    Ccvs,
    /// A current-controlled current source.
    Cccs,
    /// Mutual inductance between inductors.
    MutualInductor,
    /// A behavioral source.
    Behavioral,
    /// A transmission line.
    TransmissionLine,
    /// A voltage-controlled switch.
    Switch,
    /// A current-controlled switch.
    CurrentSwitch,
    /// A port terminating an external connection.
    Port,
    /// A model whose terminal count is not known.
    Model,
}

/// Parameter values keyed by name, in declaration order.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct Params {
    values: IndexMap<ArcStr, Value>,
}

/// A parameter or positional value.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum Value {
    /// A numeric literal.
    Numeric {
        /// The resolved scalar.
        value: Decimal,
        /// The literal as written.
        text: ArcStr,
    },
    /// An identifier, string or expression, as written.
    Text(ArcStr),
}

/// A device model declared in the netlist.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Model {
    pub(crate) name: ArcStr,
    pub(crate) base: ArcStr,
    pub(crate) kind: PrimitiveKind,
    pub(crate) line: usize,
}

/// The nets declared global, in declaration order.
#[derive(Clone, Debug)]
pub struct GlobalNets {
    case: CasePolicy,
    names: IndexMap<NameKey, ArcStr>,
}

/// A named scope: a subcircuit definition or the top-level netlist.
#[derive(Clone, Debug)]
pub struct Circuit {
    pub(crate) name: ArcStr,
    pub(crate) id: CircuitId,
    pub(crate) line: Option<usize>,
    pub(crate) implicit: bool,
    pub(crate) case: CasePolicy,
    pub(crate) ports: Vec<usize>,
    pub(crate) params: Params,
    pub(crate) nodes: Vec<Node>,
    pub(crate) nets: Vec<Net>,
    pub(crate) net_names: HashMap<NameKey, usize>,
    pub(crate) node_names: HashMap<NameKey, usize>,
    pub(crate) children: Vec<CircuitId>,
}

/// A parsed netlist.
#[derive(Clone, Debug)]
pub struct Design {
    pub(crate) config: ParseConfig,
    pub(crate) circuits: Vec<Circuit>,
    pub(crate) names: HashMap<NameKey, CircuitId>,
    pub(crate) globals: GlobalNets,
    pub(crate) models: IndexMap<NameKey, Model>,
    pub(crate) issues: IssueSet<ParseIssue>,
    pub(crate) root: Option<CircuitId>,
}

impl CircuitId {
    pub(crate) fn new(index: usize) -> Self {
        Self(index)
    }

    /// The index of this circuit in its design.
    #[inline]
    pub fn index(&self) -> usize {
        self.0
    }
}

impl Display for CircuitId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "circuit{}", self.0)
    }
}

impl Pin {
    pub(crate) fn new(position: usize, net: usize) -> Self {
        Self { position, net }
    }

    /// The position of this pin on its node, in declared terminal order.
    #[inline]
    pub fn position(&self) -> usize {
        self.position
    }

    /// The index of the net this pin connects to, within the node's circuit.
    #[inline]
    pub fn net_index(&self) -> usize {
        self.net
    }
}

impl Net {
    /// The name of this net.
    #[inline]
    pub fn name(&self) -> &ArcStr {
        &self.name
    }

    /// The pins connected to this net, in connection order.
    #[inline]
    pub fn pins(&self) -> &[PinRef] {
        &self.pins
    }

    /// Returns `true` if this net is a port of its circuit.
    #[inline]
    pub fn is_port(&self) -> bool {
        self.port.is_some()
    }

    /// The port position of this net, if it is a port.
    #[inline]
    pub fn port_position(&self) -> Option<usize> {
        self.port
    }

    /// Returns `true` if this net is a global net.
    #[inline]
    pub fn is_global(&self) -> bool {
        self.global
    }
}

impl Node {
    /// The instance label.
    #[inline]
    pub fn name(&self) -> &ArcStr {
        &self.name
    }

    /// The line on which this instance is declared.
    #[inline]
    pub fn line(&self) -> usize {
        self.line
    }

    /// What this node places.
    #[inline]
    pub fn device(&self) -> &DeviceType {
        &self.device
    }

    /// The instantiated circuit, if this node is a subcircuit instance.
    pub fn subcircuit(&self) -> Option<CircuitId> {
        match self.device {
            DeviceType::Subcircuit { id, .. } => Some(id),
            _ => None,
        }
    }

    /// The number of pins on this node.
    #[inline]
    pub fn pin_count(&self) -> usize {
        self.pins.len()
    }

    /// The pin at the given position.
    pub fn pin(&self, index: usize) -> Result<&Pin> {
        self.pins
            .get(index)
            .ok_or_else(|| Error::index("pin", index, self.pins.len()))
    }

    /// The pins of this node, in declared terminal order.
    #[inline]
    pub fn pins(&self) -> &[Pin] {
        &self.pins
    }

    /// Keyword parameters, in declaration order.
    #[inline]
    pub fn params(&self) -> &Params {
        &self.params
    }

    /// Positional values following the terminals.
    #[inline]
    pub fn values(&self) -> &[Value] {
        &self.values
    }
}

impl DeviceType {
    /// The name this device type is displayed under.
    ///
    /// For primitives, this is the model name if one was given.
    pub fn name(&self) -> ArcStr {
        match self {
            Self::Primitive { model: Some(model), .. } => model.clone(),
            Self::Primitive { kind, model: None } => arcstr::format!("{kind}"),
            Self::Reference(name) | Self::Subcircuit { name, .. } => name.clone(),
        }
    }
}

impl PrimitiveKind {
    /// The number of terminals this kind of device accepts.
    ///
    /// Returns [`None`] if any number of terminals is accepted.
    pub fn terminal_counts(&self) -> Option<RangeInclusive<usize>> {
        Some(match self {
            Self::Mosfet | Self::Vcvs | Self::Vccs | Self::TransmissionLine => 4..=4,
            Self::Resistor
            | Self::Capacitor
            | Self::Inductor
            | Self::Diode
            | Self::VoltageSource
            | Self::CurrentSource
            | Self::Ccvs
            | Self::Cccs
            | Self::Behavioral
            | Self::CurrentSwitch
            | Self::Port => 2..=2,
            Self::Bjt => 3..=4,
            Self::Jfet => 3..=3,
            Self::Switch => 2..=4,
            Self::MutualInductor => 0..=0,
            Self::Model => return None,
        })
    }

    /// Maps a model's base type to a device kind.
    ///
    /// Both HSPICE model types (`nmos`, `npn`, `d`, ...) and Spectre
    /// model types (`bsim4`, `bjt`, `diode`, ...) are understood.
    /// Unknown types map to [`PrimitiveKind::Model`].
    pub fn from_model_type(base: &str) -> Self {
        let base = base.to_ascii_lowercase();
        match base.as_str() {
            "nmos" | "pmos" | "mos" | "bsim3" | "bsim3v3" | "bsim4" | "bsimbulk" | "psp"
            | "psp102" | "psp103" | "mos1" | "mos2" | "mos3" | "mos9" | "mos11" | "ekv" => {
                Self::Mosfet
            }
            "npn" | "pnp" | "bjt" | "vbic" | "hicum" | "mextram" => Self::Bjt,
            "d" | "diode" | "juncap" => Self::Diode,
            "njf" | "pjf" | "jfet" => Self::Jfet,
            "r" | "res" | "resistor" => Self::Resistor,
            "c" | "cap" | "capacitor" => Self::Capacitor,
            "l" | "inductor" => Self::Inductor,
            "sw" | "switch" => Self::Switch,
            "csw" => Self::CurrentSwitch,
            _ => Self::Model,
        }
    }
}

impl Display for PrimitiveKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Mosfet => "mosfet",
            Self::Resistor => "resistor",
            Self::Capacitor => "capacitor",
            Self::Inductor => "inductor",
            Self::Diode => "diode",
            Self::Bjt => "bjt",
            Self::Jfet => "jfet",
            Self::VoltageSource => "vsource",
            Self::CurrentSource => "isource",
            Self::Vcvs => "vcvs",
            Self::Vccs => "vccs",
            Self::Ccvs => "ccvs",
            Self::Cccs => "cccs",
            Self::MutualInductor => "mutual_inductor",
            Self::Behavioral => "bsource",
            Self::TransmissionLine => "tline",
            Self::Switch => "switch",
            Self::CurrentSwitch => "cswitch",
            Self::Port => "port",
            Self::Model => "model",
        };
        write!(f, "{name}")
    }
}

impl Params {
    /// Inserts a parameter, replacing any earlier value with the same name.
    pub fn insert(&mut self, key: impl Into<ArcStr>, value: Value) {
        self.values.insert(key.into(), value);
    }

    /// Gets a parameter by its exact name.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// Iterates over parameters in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (&ArcStr, &Value)> {
        self.values.iter()
    }

    /// The number of parameters.
    #[inline]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns `true` if there are no parameters.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl Value {
    /// The resolved scalar, if this value is numeric.
    pub fn as_decimal(&self) -> Option<Decimal> {
        match self {
            Self::Numeric { value, .. } => Some(*value),
            Self::Text(_) => None,
        }
    }

    /// The value as written.
    pub fn text(&self) -> &ArcStr {
        match self {
            Self::Numeric { text, .. } | Self::Text(text) => text,
        }
    }
}

impl Model {
    /// The model name.
    #[inline]
    pub fn name(&self) -> &ArcStr {
        &self.name
    }

    /// The base type as written.
    #[inline]
    pub fn base(&self) -> &ArcStr {
        &self.base
    }

    /// The device kind of the base type.
    #[inline]
    pub fn kind(&self) -> PrimitiveKind {
        self.kind
    }

    /// The line on which the model is declared.
    #[inline]
    pub fn line(&self) -> usize {
        self.line
    }
}

impl GlobalNets {
    pub(crate) fn new(case: CasePolicy) -> Self {
        Self {
            case,
            names: IndexMap::new(),
        }
    }

    /// Registers a global net, returning its declaration index.
    pub(crate) fn declare(&mut self, name: &ArcStr) -> usize {
        let entry = self.names.entry(self.case.key(name.clone()));
        let index = entry.index();
        entry.or_insert_with(|| name.clone());
        index
    }

    /// The declaration index of the given global net.
    pub(crate) fn position(&self, name: &str) -> Option<usize> {
        self.names.get_index_of(&self.case.key(name))
    }

    /// Returns `true` if a net with the given name has been declared global.
    pub fn contains(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    /// Iterates over the global nets in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = &ArcStr> {
        self.names.values()
    }

    /// The number of global nets.
    #[inline]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Returns `true` if no global nets have been declared.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

impl Circuit {
    /// The name of this circuit.
    #[inline]
    pub fn name(&self) -> &ArcStr {
        &self.name
    }

    /// The ID of this circuit.
    #[inline]
    pub fn id(&self) -> CircuitId {
        self.id
    }

    /// The line on which this circuit is declared.
    ///
    /// [`None`] for the implicit top-level circuit.
    #[inline]
    pub fn line(&self) -> Option<usize> {
        self.line
    }

    /// Returns `true` if this is the implicit top-level circuit.
    #[inline]
    pub fn is_implicit(&self) -> bool {
        self.implicit
    }

    /// The number of ports.
    #[inline]
    pub fn port_count(&self) -> usize {
        self.ports.len()
    }

    /// The net indices of the ports, in declared order.
    #[inline]
    pub fn ports(&self) -> &[usize] {
        &self.ports
    }

    /// Default parameter values declared on the subcircuit header.
    #[inline]
    pub fn params(&self) -> &Params {
        &self.params
    }

    /// The number of nodes.
    #[inline]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// The node at the given index.
    pub fn node(&self, index: usize) -> Result<&Node> {
        self.nodes
            .get(index)
            .ok_or_else(|| Error::index("node", index, self.nodes.len()))
    }

    /// Iterates over the nodes in declaration order.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter()
    }

    /// The node with the given name, under the design's case policy.
    pub fn node_named(&self, name: &str) -> Option<&Node> {
        let index = self.node_names.get(&self.case.key(name))?;
        self.nodes.get(*index)
    }

    /// The number of nets.
    #[inline]
    pub fn net_count(&self) -> usize {
        self.nets.len()
    }

    /// The net at the given index.
    pub fn net(&self, index: usize) -> Result<&Net> {
        self.nets
            .get(index)
            .ok_or_else(|| Error::index("net", index, self.nets.len()))
    }

    /// Iterates over the nets in creation order.
    pub fn nets(&self) -> impl Iterator<Item = &Net> {
        self.nets.iter()
    }

    /// The index of the net with the given name, under the design's case policy.
    pub fn net_index(&self, name: &str) -> Option<usize> {
        self.net_names.get(&self.case.key(name)).copied()
    }

    /// The net with the given name, under the design's case policy.
    pub fn net_named(&self, name: &str) -> Option<&Net> {
        self.nets.get(self.net_index(name)?)
    }

    /// The circuits this circuit instantiates, without duplicates, in first-instance order.
    ///
    /// Empty until the design is resolved.
    #[inline]
    pub fn children(&self) -> &[CircuitId] {
        &self.children
    }
}

impl Design {
    /// The configuration this design was parsed with.
    #[inline]
    pub fn config(&self) -> &ParseConfig {
        &self.config
    }

    /// The number of circuits.
    #[inline]
    pub fn circuit_count(&self) -> usize {
        self.circuits.len()
    }

    /// The circuit at the given index.
    pub fn circuit(&self, index: usize) -> Result<&Circuit> {
        self.circuits
            .get(index)
            .ok_or_else(|| Error::index("circuit", index, self.circuits.len()))
    }

    /// The circuit with the given name, under the design's case policy.
    pub fn circuit_named(&self, name: &str) -> Option<&Circuit> {
        let id = self.names.get(&self.config.case_policy().key(name))?;
        self.circuits.get(id.index())
    }

    /// Iterates over the circuits in index order.
    pub fn circuits(&self) -> impl Iterator<Item = &Circuit> {
        self.circuits.iter()
    }

    /// The root circuit.
    ///
    /// Fails with [`Error::NotResolved`] if the design has not been resolved.
    pub fn root(&self) -> Result<CircuitId> {
        self.root.ok_or(Error::NotResolved)
    }

    /// The root circuit.
    pub fn root_circuit(&self) -> Result<&Circuit> {
        self.circuit(self.root()?.index())
    }

    /// Returns `true` if the hierarchy has been resolved.
    #[inline]
    pub fn is_resolved(&self) -> bool {
        self.root.is_some()
    }

    /// Resolves subcircuit references and returns the root circuit.
    ///
    /// On failure, the design is left unresolved and unchanged.
    /// Calling this on a resolved design returns the existing root.
    pub fn resolve_root(&mut self) -> Result<CircuitId> {
        if let Some(root) = self.root {
            return Ok(root);
        }
        resolver::resolve(self)
    }

    /// The global nets declared in the netlist.
    #[inline]
    pub fn globals(&self) -> &GlobalNets {
        &self.globals
    }

    /// The models declared in the netlist, in declaration order.
    pub fn models(&self) -> impl Iterator<Item = &Model> {
        self.models.values()
    }

    /// The model with the given name, under the design's case policy.
    pub fn model_named(&self, name: &str) -> Option<&Model> {
        self.models.get(&self.config.case_policy().key(name))
    }

    /// Non-fatal issues found while parsing.
    #[inline]
    pub fn issues(&self) -> &IssueSet<ParseIssue> {
        &self.issues
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn model_types() {
        assert_eq!(PrimitiveKind::from_model_type("NMOS"), PrimitiveKind::Mosfet);
        assert_eq!(PrimitiveKind::from_model_type("bsim4"), PrimitiveKind::Mosfet);
        assert_eq!(PrimitiveKind::from_model_type("npn"), PrimitiveKind::Bjt);
        assert_eq!(PrimitiveKind::from_model_type("d"), PrimitiveKind::Diode);
        assert_eq!(PrimitiveKind::from_model_type("bsimcmg"), PrimitiveKind::Model);
    }

    #[test]
    fn terminal_counts() {
        assert_eq!(PrimitiveKind::Mosfet.terminal_counts(), Some(4..=4));
        assert_eq!(PrimitiveKind::Bjt.terminal_counts(), Some(3..=4));
        assert_eq!(PrimitiveKind::MutualInductor.terminal_counts(), Some(0..=0));
        assert_eq!(PrimitiveKind::Model.terminal_counts(), None);
    }

    #[test]
    fn global_registry_folds_case() {
        let mut globals = GlobalNets::new(CasePolicy::Insensitive);
        assert_eq!(globals.declare(&arcstr::literal!("VDD")), 0);
        assert_eq!(globals.declare(&arcstr::literal!("gnd")), 1);
        assert_eq!(globals.declare(&arcstr::literal!("vdd")), 0);
        assert!(globals.contains("Gnd"));
        assert_eq!(
            globals.iter().map(|s| s.as_str()).collect::<Vec<_>>(),
            vec!["VDD", "gnd"]
        );
    }
}
