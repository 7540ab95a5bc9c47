//! Populates a [`Design`] from a stream of statements.

use std::collections::HashMap;

use arcstr::ArcStr;
use indexmap::IndexMap;

use crate::config::{CasePolicy, GlobalPolicy, NameKey, ParseConfig};
use crate::db::{
    Circuit, CircuitId, Design, DeviceType, GlobalNets, Model, Net, Node, Params, Pin, PinRef,
    PrimitiveKind,
};
use crate::dialect::{DeviceInstance, DeviceRef, Statement, StatementKind};
use crate::error::{Error, Result};
use crate::issues::{Cause, IssueSet, ParseIssue};

/// The name of the implicit top-level circuit when none is configured.
pub const DEFAULT_TOP_NAME: &str = "top";

/// Builds an unresolved [`Design`] one statement at a time.
///
/// The implicit top-level circuit is open for the entire input;
/// every subcircuit start pushes a new scope on top of it.
pub struct NetlistBuilder {
    config: ParseConfig,
    case: CasePolicy,
    allows_nesting: bool,
    /// Whether the implicit top-level circuit's name was configured.
    explicit_top: bool,
    /// Open scopes, innermost last. The first scope is always the implicit top.
    stack: Vec<Scope>,
    /// Sealed circuits, indexed by the ID assigned when they were opened.
    sealed: Vec<Option<Circuit>>,
    /// Every circuit opened so far, with the line it was declared on.
    names: HashMap<NameKey, (CircuitId, usize)>,
    globals: GlobalNets,
    models: IndexMap<NameKey, Model>,
    issues: IssueSet<ParseIssue>,
}

/// A circuit that is still accepting nodes.
struct Scope {
    circuit: Circuit,
    /// The number of global nets visible in this scope.
    horizon: usize,
}

impl Scope {
    fn open(
        name: ArcStr,
        id: CircuitId,
        line: Option<usize>,
        case: CasePolicy,
        params: Params,
        horizon: usize,
    ) -> Self {
        Self {
            circuit: Circuit {
                name,
                id,
                line,
                implicit: line.is_none(),
                case,
                ports: Vec::new(),
                params,
                nodes: Vec::new(),
                nets: Vec::new(),
                net_names: HashMap::new(),
                node_names: HashMap::new(),
                children: Vec::new(),
            },
            horizon,
        }
    }

    fn is_visible_global(&self, globals: &GlobalNets, name: &str) -> bool {
        globals
            .position(name)
            .is_some_and(|position| position < self.horizon)
    }

    /// Resolves a net name within this scope, creating the net on first use.
    fn net(&mut self, globals: &GlobalNets, name: &ArcStr) -> usize {
        let key = self.circuit.case.key(name.clone());
        if let Some(&index) = self.circuit.net_names.get(&key) {
            return index;
        }
        let global = self.is_visible_global(globals, name);
        let index = self.circuit.nets.len();
        self.circuit.nets.push(Net {
            name: name.clone(),
            pins: Vec::new(),
            port: None,
            global,
        });
        self.circuit.net_names.insert(key, index);
        index
    }
}

impl NetlistBuilder {
    /// Creates a builder with the implicit top-level circuit open.
    pub fn new(config: ParseConfig) -> Self {
        let case = config.case_policy();
        let top_name = config
            .top_name
            .clone()
            .unwrap_or_else(|| ArcStr::from(DEFAULT_TOP_NAME));
        let top = Scope::open(top_name, CircuitId::new(0), None, case, Params::default(), 0);
        Self {
            allows_nesting: config.dialect.allows_nesting(),
            explicit_top: config.top_name.is_some(),
            config,
            case,
            stack: vec![top],
            sealed: vec![None],
            names: HashMap::new(),
            globals: GlobalNets::new(case),
            models: IndexMap::new(),
            issues: IssueSet::new(),
        }
    }

    /// Names the implicit top-level circuit, unless a name was configured.
    ///
    /// If a subcircuit later takes this name, the top-level circuit
    /// is renamed with a numeric suffix instead.
    pub fn with_default_top_name(mut self, name: impl Into<ArcStr>) -> Self {
        if !self.explicit_top {
            self.stack[0].circuit.name = name.into();
        }
        self
    }

    /// Consumes one statement.
    pub fn push(&mut self, statement: Statement) -> Result<()> {
        let line = statement.line;
        match statement.kind {
            StatementKind::SubcircuitStart {
                name,
                ports,
                params,
            } => self.open(line, name, ports, params),
            StatementKind::SubcircuitEnd { name } => self.close(line, name),
            StatementKind::DeviceInstance(instance) => self.instance(line, instance),
            StatementKind::GlobalNetDeclaration { names } => {
                self.declare_globals(line, names);
                Ok(())
            }
            StatementKind::ModelDefinition { name, base } => {
                self.declare_model(line, name, base);
                Ok(())
            }
            StatementKind::Directive { name } => {
                self.issues
                    .add(ParseIssue::new_and_log(line, Cause::IgnoredDirective { name }));
                Ok(())
            }
            StatementKind::Unrecognized { reason } => {
                self.issues.add(ParseIssue::new_and_log(
                    line,
                    Cause::UnrecognizedStatement { reason },
                ));
                Ok(())
            }
        }
    }

    /// The innermost open scope. The implicit top is never popped.
    fn current(&mut self) -> &mut Scope {
        let last = self.stack.len() - 1;
        &mut self.stack[last]
    }

    fn open(&mut self, line: usize, name: ArcStr, ports: Vec<ArcStr>, params: Params) -> Result<()> {
        if !self.allows_nesting && self.stack.len() > 1 {
            return Err(Error::NestedDefinition {
                line,
                name,
                parent: self.current().circuit.name.clone(),
            });
        }
        let key = self.case.key(name.clone());
        if let Some(&(_, first_line)) = self.names.get(&key) {
            return Err(Error::DuplicateDefinition {
                line,
                name,
                first_line: Some(first_line),
            });
        }

        let id = CircuitId::new(self.sealed.len());
        self.sealed.push(None);
        self.names.insert(key, (id, line));

        let mut scope = Scope::open(
            name.clone(),
            id,
            Some(line),
            self.case,
            params,
            self.globals.len(),
        );
        for (position, port) in ports.iter().enumerate() {
            let key = self.case.key(port.clone());
            if scope.circuit.net_names.contains_key(&key) {
                return Err(Error::DuplicatePort {
                    line,
                    circuit: name,
                    port: port.clone(),
                });
            }
            let visible = scope.is_visible_global(&self.globals, port);
            let global = visible && self.config.global_policy == GlobalPolicy::Merge;
            if visible && !global {
                self.issues.add(ParseIssue::new_and_log(
                    line,
                    Cause::GlobalShadowed {
                        circuit: name.clone(),
                        net: port.clone(),
                    },
                ));
            }
            let index = scope.circuit.nets.len();
            scope.circuit.nets.push(Net {
                name: port.clone(),
                pins: Vec::new(),
                port: Some(position),
                global,
            });
            scope.circuit.net_names.insert(key, index);
            scope.circuit.ports.push(index);
        }

        tracing::debug!(circuit = %name, line, ports = ports.len(), "opened subcircuit");
        self.stack.push(scope);
        Ok(())
    }

    fn close(&mut self, line: usize, name: Option<ArcStr>) -> Result<()> {
        if self.stack.len() == 1 {
            return Err(Error::UnbalancedScope { line, name });
        }
        let open = self.current().circuit.name.clone();
        if let Some(name) = name {
            if self.case.key(name.clone()) != self.case.key(open.clone()) {
                return Err(Error::MismatchedEnd {
                    line,
                    expected: open,
                    found: name,
                });
            }
        }
        if let Some(scope) = self.stack.pop() {
            let circuit = scope.circuit;
            tracing::debug!(
                circuit = %circuit.name,
                nodes = circuit.nodes.len(),
                nets = circuit.nets.len(),
                "sealed subcircuit"
            );
            let id = circuit.id.index();
            self.sealed[id] = Some(circuit);
        }
        Ok(())
    }

    fn instance(&mut self, line: usize, instance: DeviceInstance) -> Result<()> {
        let DeviceInstance {
            name,
            device,
            terminals,
            params,
            values,
        } = instance;
        let globals = &self.globals;
        let last = self.stack.len() - 1;
        let scope = &mut self.stack[last];

        let key = scope.circuit.case.key(name.clone());
        if scope.circuit.node_names.contains_key(&key) {
            return Err(Error::DuplicateInstance {
                line,
                circuit: scope.circuit.name.clone(),
                name,
            });
        }

        let node = scope.circuit.nodes.len();
        let mut pins = Vec::with_capacity(terminals.len());
        for (position, terminal) in terminals.iter().enumerate() {
            let net = scope.net(globals, terminal);
            scope.circuit.nets[net].pins.push(PinRef {
                node,
                pin: position,
            });
            pins.push(Pin::new(position, net));
        }

        let device = match device {
            DeviceRef::Primitive { kind, model } => DeviceType::Primitive { kind, model },
            DeviceRef::Reference(name) => DeviceType::Reference(name),
        };
        scope.circuit.node_names.insert(key, node);
        scope.circuit.nodes.push(Node {
            name,
            line,
            device,
            pins,
            params,
            values,
        });
        Ok(())
    }

    /// Records a model. A binned model (`nch.1`) also declares its stem (`nch`).
    fn declare_model(&mut self, line: usize, name: ArcStr, base: ArcStr) {
        let kind = PrimitiveKind::from_model_type(&base);
        tracing::debug!(model = %name, %base, ?kind, "declared model");
        if let Some((stem, bin)) = name.rsplit_once('.') {
            if !stem.is_empty() && !bin.is_empty() && bin.chars().all(|c| c.is_ascii_digit()) {
                let stem = ArcStr::from(stem);
                self.models
                    .entry(self.case.key(stem.clone()))
                    .or_insert_with(|| Model {
                        name: stem,
                        base: base.clone(),
                        kind,
                        line,
                    });
            }
        }
        self.models.insert(
            self.case.key(name.clone()),
            Model {
                name,
                base,
                kind,
                line,
            },
        );
    }

    fn declare_globals(&mut self, line: usize, names: Vec<ArcStr>) {
        for name in &names {
            self.globals.declare(name);
        }
        tracing::debug!(line, nets = ?names, "declared global nets");

        let horizon = self.globals.len();
        let merge = self.config.global_policy == GlobalPolicy::Merge;
        for scope in self.stack.iter_mut() {
            scope.horizon = horizon;
            for name in &names {
                let Some(&index) = scope.circuit.net_names.get(&self.case.key(name.clone()))
                else {
                    continue;
                };
                let net = &mut scope.circuit.nets[index];
                if net.global {
                    continue;
                }
                if net.is_port() && !merge {
                    self.issues.add(ParseIssue::new_and_log(
                        line,
                        Cause::GlobalShadowed {
                            circuit: scope.circuit.name.clone(),
                            net: net.name.clone(),
                        },
                    ));
                } else {
                    net.global = true;
                }
            }
        }
    }

    /// The first of `base_1`, `base_2`, ... not taken by a subcircuit.
    fn unique_name(&self, base: &str) -> ArcStr {
        let mut suffix = 1usize;
        loop {
            let name = arcstr::format!("{base}_{suffix}");
            if !self.names.contains_key(&self.case.key(name.clone())) {
                return name;
            }
            suffix += 1;
        }
    }

    /// Seals the implicit top-level circuit and returns the unresolved design.
    ///
    /// The implicit top-level circuit is kept at index 0 only if it contains
    /// at least one node.
    pub fn finish(mut self) -> Result<Design> {
        if self.stack.len() > 1 {
            let scope = &self.current().circuit;
            return Err(Error::UnbalancedScope {
                line: scope.line.unwrap_or_default(),
                name: Some(scope.name.clone()),
            });
        }
        let Some(top) = self.stack.pop() else {
            return Err(Error::UnbalancedScope {
                line: 0,
                name: None,
            });
        };
        let mut top = top.circuit;

        let keep_top = !top.nodes.is_empty();
        if keep_top {
            if let Some(&(_, line)) = self.names.get(&self.case.key(top.name.clone())) {
                if self.explicit_top {
                    return Err(Error::DuplicateDefinition {
                        line,
                        name: top.name,
                        first_line: None,
                    });
                }
                let renamed = self.unique_name(&top.name);
                tracing::debug!(from = %top.name, to = %renamed, "renamed implicit top-level circuit");
                top.name = renamed;
            }
            self.sealed[0] = Some(top);
        }

        let mut circuits: Vec<Circuit> = self.sealed.into_iter().flatten().collect();
        let mut names = HashMap::with_capacity(circuits.len());
        for (index, circuit) in circuits.iter_mut().enumerate() {
            circuit.id = CircuitId::new(index);
            names.insert(self.case.key(circuit.name.clone()), circuit.id);
        }
        tracing::debug!(
            circuits = circuits.len(),
            implicit_top = keep_top,
            "finished building design"
        );

        Ok(Design {
            config: self.config,
            circuits,
            names,
            globals: self.globals,
            models: self.models,
            issues: self.issues,
            root: None,
        })
    }
}
