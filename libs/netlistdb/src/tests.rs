use std::path::PathBuf;

use arcstr::ArcStr;
use test_log::test;

use super::*;

pub const TEST_DATA_DIR: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/../../tests/data");

#[inline]
pub fn test_data(file_name: &str) -> PathBuf {
    PathBuf::from(TEST_DATA_DIR).join(file_name)
}

fn hspice(text: &str) -> Result<Design> {
    Parser::parse_str(ParseConfig::new(Dialect::Hspice), text)
}

fn spectre(text: &str) -> Result<Design> {
    Parser::parse_str(ParseConfig::new(Dialect::Spectre), text)
}

/// The names of the nets connected to a node's pins, in pin order.
fn pin_nets(circuit: &Circuit, node: &str) -> Vec<String> {
    let node = circuit.node_named(node).unwrap();
    node.pins()
        .iter()
        .map(|pin| circuit.net(pin.net_index()).unwrap().name().to_string())
        .collect()
}

#[test]
fn parse_hspice_buff() {
    let design = Parser::parse_file(ParseConfig::new(Dialect::Hspice), test_data("hspice/buff.sp"))
        .unwrap();
    assert_eq!(design.circuit_count(), 4);
    let root = design.root_circuit().unwrap();
    assert_eq!(root.name(), "BUFF");
    assert_eq!(
        design.circuits().map(|c| c.name().as_str()).collect::<Vec<_>>(),
        vec!["INV", "DRV", "BUFF", "LOAD"]
    );

    let drv = design.circuit_named("drv").unwrap();
    let inv = design.circuit_named("INV").unwrap();
    let load = design.circuit_named("LOAD").unwrap();
    assert_eq!(root.children(), &[drv.id(), load.id()]);
    assert_eq!(drv.children(), &[inv.id()]);
    assert!(inv.children().is_empty());
    assert_eq!(drv.params().get("m").and_then(Value::as_decimal), Some(rust_decimal::Decimal::ONE));

    assert!(inv.net_named("vdd").unwrap().is_global());
    assert!(inv.net_named("in").unwrap().is_port());
    assert!(!inv.net_named("in").unwrap().is_global());
    let mp0 = inv.node_named("MP0").unwrap();
    assert_eq!(pin_nets(inv, "MP0"), vec!["out", "in", "vdd", "vdd"]);
    assert_eq!(mp0.params().len(), 2);
    assert_eq!(
        mp0.device(),
        &DeviceType::Primitive {
            kind: PrimitiveKind::Mosfet,
            model: Some(arcstr::literal!("pch"))
        }
    );

    assert_eq!(pin_nets(drv, "Rs"), vec!["y", "y_int"]);
    assert_eq!(design.globals().len(), 2);
    assert_eq!(design.models().count(), 2);
    assert!(!design.issues().has_warning());
    assert_eq!(design.issues().len(), 4);
}

#[test]
fn parse_spectre_comparator() {
    let design = Parser::parse_file(
        ParseConfig::new(Dialect::Spectre),
        test_data("spectre/comparator.scs"),
    )
    .unwrap();
    assert_eq!(design.circuit_count(), 18);
    assert_eq!(design.root().unwrap().index(), 0);

    let top = design.circuit(0).unwrap();
    assert_eq!(top.name(), "comparator");
    assert!(top.is_implicit());
    assert_eq!(top.node_count(), 19);

    let expected = [
        ("M0", ["GND", "INTERN", "GND", "GND"]),
        ("M22", ["GND", "INTERP", "GND", "GND"]),
        ("M16", ["OUTM", "CROSSP", "GND", "GND"]),
        ("M17", ["OUTP", "CROSSN", "GND", "GND"]),
        ("M4", ["CROSSN", "CROSSP", "INTERN", "GND"]),
        ("M3", ["CROSSP", "CROSSN", "INTERP", "GND"]),
        ("M7", ["net050", "CLK", "GND", "GND"]),
        ("M5", ["INTERN", "VI+", "net050", "GND"]),
        ("M6", ["INTERP", "VI-", "net050", "GND"]),
        ("M8", ["OUTM", "CROSSP", "VDD", "VDD"]),
        ("M18", ["INTERN", "CLK", "VDD", "VDD"]),
        ("M15", ["OUTP", "CROSSN", "VDD", "VDD"]),
        ("M19", ["INTERP", "CLK", "VDD", "VDD"]),
        ("M10", ["CROSSN", "CLK", "VDD", "VDD"]),
        ("M12", ["CROSSP", "CLK", "VDD", "VDD"]),
        ("M14", ["CROSSN", "CROSSP", "VDD", "VDD"]),
        ("M13", ["CROSSP", "CROSSN", "VDD", "VDD"]),
    ];
    for (node, nets) in expected {
        assert_eq!(pin_nets(top, node), nets, "nets of {node}");
    }

    let m7 = top.node_named("M7").unwrap();
    assert!(m7.params().get("m").is_some());
    let nmos4 = design.circuit_named("nmos4").unwrap();
    assert_eq!(
        m7.device(),
        &DeviceType::Subcircuit {
            id: nmos4.id(),
            name: arcstr::literal!("nmos4")
        }
    );
    assert_eq!(
        nmos4.node_named("M0").unwrap().device(),
        &DeviceType::Primitive {
            kind: PrimitiveKind::Mosfet,
            model: Some(arcstr::literal!("nch"))
        }
    );

    let reset_p = design.circuit_named("reset_p").unwrap();
    let reset_pair = design.circuit_named("reset_pair").unwrap();
    assert_eq!(reset_pair.children(), &[reset_p.id()]);
    assert!(reset_p.id() > reset_pair.id());

    let load = design.circuit_named("load_cap").unwrap();
    assert!(load.net_named("0").unwrap().is_global());
    assert!(!design.issues().has_warning());
}

#[test]
fn round_trip_root_selection() {
    let text = "
.subckt A p
R0 p 0 1k
.ends
.subckt B p
XA p A
.ends
.subckt C p
XB p B
.ends
.subckt TOP
XC n C
XA n A
.ends
";
    let first = hspice(text).unwrap();
    let second = hspice(text).unwrap();
    assert_eq!(first.root_circuit().unwrap().name(), "TOP");
    assert_eq!(first.root().unwrap().index(), 3);
    assert_eq!(
        first.root_circuit().unwrap().name(),
        second.root_circuit().unwrap().name()
    );
}

#[test]
fn net_merging_is_order_independent() {
    let forward = spectre(
        "
subckt cell (a)
    R0 (a x) resistor r=1k
    R1 (x a) resistor r=1k
ends
",
    )
    .unwrap();
    let backward = spectre(
        "
subckt cell (a)
    R1 (x a) resistor r=1k
    R0 (a x) resistor r=1k
ends
",
    )
    .unwrap();
    for design in [&forward, &backward] {
        let cell = design.circuit_named("cell").unwrap();
        let r0 = cell.node_named("R0").unwrap();
        let r1 = cell.node_named("R1").unwrap();
        assert_eq!(r0.pin(1).unwrap().net_index(), r1.pin(0).unwrap().net_index());
        assert_eq!(r0.pin(0).unwrap().net_index(), r1.pin(1).unwrap().net_index());
        assert_eq!(cell.net_count(), 2);
        assert_eq!(cell.net_named("x").unwrap().pins().len(), 2);
    }
}

#[test]
fn pin_order_follows_declaration() {
    let design = hspice(".subckt S d g s b\nM1 b s g d nch\n.ends\n").unwrap();
    let s = design.circuit(0).unwrap();
    assert_eq!(pin_nets(s, "M1"), vec!["b", "s", "g", "d"]);
    let m1 = s.node(0).unwrap();
    assert_eq!(m1.pin_count(), 4);
    assert_eq!(
        m1.pins().iter().map(Pin::position).collect::<Vec<_>>(),
        vec![0, 1, 2, 3]
    );
    assert!(matches!(m1.pin(4), Err(Error::Index { kind: "pin", .. })));
}

#[test]
fn unmatched_end_is_unbalanced() {
    let err = hspice(".subckt A a\nR0 a 0 1\n.ends\n.ends\n").unwrap_err();
    assert!(matches!(err, Error::UnbalancedScope { line: 4, .. }));
}

#[test]
fn unclosed_subcircuit_is_unbalanced() {
    let err = spectre("subckt A (a)\nR0 (a 0) resistor\n").unwrap_err();
    match err {
        Error::UnbalancedScope { line, name } => {
            assert_eq!(line, 1);
            assert_eq!(name.as_deref(), Some("A"));
        }
        err => panic!("unexpected error: {err}"),
    }
}

#[test]
fn mismatched_end_name() {
    let err = hspice(".subckt A a\n.ends B\n").unwrap_err();
    assert!(matches!(err, Error::MismatchedEnd { line: 2, .. }));
}

#[test]
fn hspice_rejects_nested_definitions() {
    let err = hspice(".subckt A a\n.subckt B b\n.ends\n.ends\n").unwrap_err();
    assert!(matches!(err, Error::NestedDefinition { line: 2, .. }));
}

#[test]
fn mutual_instantiation_is_cyclic() {
    let err = hspice(".subckt A a\nXB a B\n.ends\n.subckt B b\nXA b A\n.ends\n").unwrap_err();
    match err {
        Error::CyclicHierarchy { cycle } => {
            assert_eq!(cycle.iter().map(ArcStr::as_str).collect::<Vec<_>>(), vec!["A", "B", "A"])
        }
        err => panic!("unexpected error: {err}"),
    }
}

#[test]
fn disconnected_tops_are_ambiguous() {
    let err = hspice(".subckt A a\nR0 a 0 1\n.ends\n.subckt B b\nR0 b 0 1\n.ends\n").unwrap_err();
    match err {
        Error::AmbiguousRoot { candidates } => {
            assert_eq!(candidates.iter().map(ArcStr::as_str).collect::<Vec<_>>(), vec!["A", "B"])
        }
        err => panic!("unexpected error: {err}"),
    }
}

#[test]
fn empty_netlist_has_no_root() {
    let err = hspice("* only a comment\n.end\n").unwrap_err();
    match err {
        Error::AmbiguousRoot { candidates } => assert!(candidates.is_empty()),
        err => panic!("unexpected error: {err}"),
    }
}

#[test]
fn subcircuit_port_arity() {
    let err = hspice(".subckt A a b\nR0 a b 1\n.ends\n.subckt T\nX0 n A\n.ends\n").unwrap_err();
    match err {
        Error::PortArity {
            line,
            node,
            master,
            expected,
            actual,
            ..
        } => {
            assert_eq!(line, 5);
            assert_eq!(node.as_str(), "X0");
            assert_eq!(master.as_str(), "A");
            assert_eq!(expected, "2");
            assert_eq!(actual, 1);
        }
        err => panic!("unexpected error: {err}"),
    }
}

#[test]
fn primitive_arity() {
    let err = hspice(".subckt T a\nM0 a a a nch\n.ends\n").unwrap_err();
    assert!(matches!(err, Error::PortArity { actual: 3, .. }));

    let err = spectre("model nch bsim4\nM0 (a b) nch\n").unwrap_err();
    assert!(matches!(err, Error::PortArity { actual: 2, .. }));
}

#[test]
fn unresolved_reference() {
    let err = hspice(".subckt T a\nX0 a MISSING\n.ends\n").unwrap_err();
    match err {
        Error::UnresolvedReference {
            line,
            circuit,
            node,
            master,
        } => {
            assert_eq!(line, 2);
            assert_eq!(circuit.as_str(), "T");
            assert_eq!(node.as_str(), "X0");
            assert_eq!(master.as_str(), "MISSING");
        }
        err => panic!("unexpected error: {err}"),
    }
}

#[test]
fn configured_primitives_resolve() {
    let text = "subckt T (d g s b)\n    M0 (d g s b) nch_mac w=1u\nends T\n";
    assert!(matches!(
        spectre(text),
        Err(Error::UnresolvedReference { .. })
    ));

    let config = ParseConfig::new(Dialect::Spectre).with_primitive("nch_mac");
    let design = Parser::parse_str(config, text).unwrap();
    let m0 = design.circuit(0).unwrap().node(0).unwrap();
    assert_eq!(
        m0.device(),
        &DeviceType::Primitive {
            kind: PrimitiveKind::Model,
            model: Some(arcstr::literal!("nch_mac"))
        }
    );
}

#[test]
fn binned_models_declare_their_stem() {
    let design = spectre(
        "
model nch.1 bsim4 lmin=0 lmax=1u
model nch.2 bsim4 lmin=1u lmax=10u
subckt T (d g s b)
    M0 (d g s b) nch
ends T
",
    )
    .unwrap();
    assert!(design.model_named("nch").is_some());
    assert_eq!(design.models().count(), 3);
}

#[test]
fn element_may_name_a_subcircuit() {
    let design = hspice(
        "
.subckt nch_rf d g s b
M0 d g s b nch
.ends
.subckt T d g s
M1 d g s s nch_rf
.ends
",
    )
    .unwrap();
    let t = design.circuit_named("T").unwrap();
    assert!(matches!(
        t.node_named("M1").unwrap().device(),
        DeviceType::Subcircuit { .. }
    ));
    assert_eq!(design.root_circuit().unwrap().name(), "T");
}

#[test]
fn file_stem_yields_to_subcircuit_names() {
    let design = Parser::parse_file(ParseConfig::new(Dialect::Hspice), test_data("hspice/inv.sp"))
        .unwrap();
    assert_eq!(design.circuit_count(), 2);
    let top = design.root_circuit().unwrap();
    assert!(top.is_implicit());
    assert_eq!(top.name(), "inv_1");

    let inv = design.circuit_named("inv").unwrap();
    assert!(!inv.is_implicit());
    assert_eq!(top.children(), &[inv.id()]);
    assert_eq!(
        top.node_named("X1").unwrap().device(),
        &DeviceType::Subcircuit {
            id: inv.id(),
            name: arcstr::literal!("inv")
        }
    );
}

#[test]
fn default_top_name_yields_to_subcircuit_names() {
    let design = hspice(".subckt top a\n.ends\n.subckt top_1 a\n.ends\nX0 n top\nX1 n top_1\n").unwrap();
    assert_eq!(design.root_circuit().unwrap().name(), "top_2");
}

#[test]
fn duplicate_definitions() {
    let err = hspice(".subckt A a\n.ends\n.subckt a b\n.ends\n").unwrap_err();
    assert!(matches!(
        err,
        Error::DuplicateDefinition {
            line: 3,
            first_line: Some(1),
            ..
        }
    ));

    let config = ParseConfig::new(Dialect::Hspice).with_top_name("A");
    let err = Parser::parse_str(config, ".subckt A a\n.ends\nX0 n A\n").unwrap_err();
    assert!(matches!(
        err,
        Error::DuplicateDefinition {
            line: 1,
            first_line: None,
            ..
        }
    ));
}

#[test]
fn duplicate_instances_and_ports() {
    let err = hspice(".subckt A a b\nR0 a b 1\nr0 b a 1\n.ends\n").unwrap_err();
    assert!(matches!(err, Error::DuplicateInstance { line: 3, .. }));

    let err = spectre("subckt A (a b a)\nends\n").unwrap_err();
    assert!(matches!(err, Error::DuplicatePort { line: 1, .. }));
}

#[test]
fn case_policy_per_dialect() {
    let design = hspice(".subckt Inv A Y\nR0 A y 1\n.ends\n.subckt T a\nx0 a a INV\n.ends\n").unwrap();
    let inv = design.circuit_named("INV").unwrap();
    assert_eq!(inv.name(), "Inv");
    assert_eq!(inv.net_count(), 2);
    assert_eq!(inv.net_named("Y").unwrap().name(), "Y");

    let err = spectre("subckt inv (a y)\nends\nsubckt T (a)\n    X0 (a a) INV\nends\n").unwrap_err();
    assert!(matches!(err, Error::UnresolvedReference { .. }));
}

#[test]
fn global_policy_merge_and_shadow() {
    let text = ".global vdd\n.subckt A vdd a\nR0 vdd a 1\n.ends\n.subckt B a\nXA vdd a A\n.ends\n";

    let merged = hspice(text).unwrap();
    let a = merged.circuit_named("A").unwrap();
    let vdd = a.net_named("vdd").unwrap();
    assert!(vdd.is_port() && vdd.is_global());
    assert_eq!(merged.issues().len(), 0);

    let config = ParseConfig::new(Dialect::Hspice).with_global_policy(GlobalPolicy::Shadow);
    let shadowed = Parser::parse_str(config, text).unwrap();
    let a = shadowed.circuit_named("A").unwrap();
    let vdd = a.net_named("vdd").unwrap();
    assert!(vdd.is_port() && !vdd.is_global());
    assert!(shadowed.circuit_named("B").unwrap().net_named("vdd").unwrap().is_global());
    assert!(matches!(
        shadowed.issues().iter().next().map(ParseIssue::cause),
        Some(Cause::GlobalShadowed { .. })
    ));
}

#[test]
fn globals_apply_to_later_scopes() {
    let design = hspice(
        ".subckt A a\nR0 a gnd 1\n.ends\n.global gnd\n.subckt B a\nR0 a gnd 1\nXA a A\n.ends\n",
    )
    .unwrap();
    let a = design.circuit_named("A").unwrap();
    let b = design.circuit_named("B").unwrap();
    assert!(!a.net_named("gnd").unwrap().is_global());
    assert!(b.net_named("gnd").unwrap().is_global());
}

#[test]
fn unknown_statements_are_warnings() {
    let design = hspice(".subckt A a\n.frobnicate 3\nZ0 a 0 zz\nR0 a 0 1\n.ends\n").unwrap();
    assert_eq!(design.issues().num_warnings(), 2);
    assert_eq!(design.circuit(0).unwrap().node_count(), 1);
    let lines: Vec<_> = design.issues().iter().map(ParseIssue::line).collect();
    assert_eq!(lines, vec![2, 3]);
}

#[test]
fn title_line_is_skipped() {
    let config = ParseConfig::new(Dialect::Hspice).with_title_line(true);
    let design = Parser::parse_str(config, "R1 title text\nR0 a 0 1k\n").unwrap();
    let top = design.root_circuit().unwrap();
    assert_eq!(top.name(), builder::DEFAULT_TOP_NAME);
    assert_eq!(top.node_count(), 1);
    assert_eq!(top.node(0).unwrap().line(), 2);
}

#[test]
fn globals_apply_to_the_open_scope() {
    let text = ".subckt A a\nR0 a gnd 1\n.global gnd\nR1 gnd a 1\n.ends\n";
    for policy in [GlobalPolicy::Merge, GlobalPolicy::Shadow] {
        let config = ParseConfig::new(Dialect::Hspice).with_global_policy(policy);
        let design = Parser::parse_str(config, text).unwrap();
        let a = design.circuit_named("A").unwrap();
        assert_eq!(a.net_count(), 2);
        assert!(a.net_named("gnd").unwrap().is_global());
        assert_eq!(
            a.node_named("R0").unwrap().pin(1).unwrap().net_index(),
            a.node_named("R1").unwrap().pin(0).unwrap().net_index()
        );
        assert!(design.issues().is_empty());
    }
}

#[test]
fn globals_declared_inside_a_scope_meet_its_ports() {
    let text = ".subckt B gnd a\nR0 a gnd 1\n.global gnd\nR1 gnd a 1\n.ends\n";

    let merged = hspice(text).unwrap();
    let b = merged.circuit_named("B").unwrap();
    let gnd = b.net_named("gnd").unwrap();
    assert!(gnd.is_port() && gnd.is_global());
    assert!(merged.issues().is_empty());

    let config = ParseConfig::new(Dialect::Hspice).with_global_policy(GlobalPolicy::Shadow);
    let shadowed = Parser::parse_str(config, text).unwrap();
    let b = shadowed.circuit_named("B").unwrap();
    let gnd = b.net_named("gnd").unwrap();
    assert!(gnd.is_port() && !gnd.is_global());
    assert_eq!(b.net_count(), 2);
    assert_eq!(gnd.pins().len(), 2);

    let issues: Vec<_> = shadowed.issues().iter().collect();
    assert_eq!(issues.len(), 1);
    assert_eq!(issues[0].line(), 3);
    match issues[0].cause() {
        Cause::GlobalShadowed { circuit, net } => {
            assert_eq!(circuit.as_str(), "B");
            assert_eq!(net.as_str(), "gnd");
        }
        cause => panic!("unexpected cause: {cause}"),
    }
}

#[test]
fn digit_led_names_are_numbers() {
    let err = hspice(".subckt A a\nR0 a 1<0> 1k\n.ends\n").unwrap_err();
    assert!(matches!(err, Error::Tokenize(_)));
    assert_eq!(err.line(), Some(2));

    let design = hspice(".subckt A a\nR0 a 10 1k\n.ends\n").unwrap();
    assert!(design.circuit_named("A").unwrap().net_named("10").is_some());
}

#[test]
fn tokenize_errors_carry_lines() {
    let err = hspice(".subckt A a\nR0 a 0 1.2.3k\n.ends\n").unwrap_err();
    assert!(matches!(err, Error::Tokenize(_)));
    assert_eq!(err.line(), Some(2));

    let err = spectre("R0 (a b) resistor r=\"1k\n").unwrap_err();
    assert_eq!(err.line(), Some(1));
}

#[test]
fn missing_file_is_io_error() {
    let err = Parser::parse_file(
        ParseConfig::new(Dialect::Hspice),
        test_data("hspice/does_not_exist.sp"),
    )
    .unwrap_err();
    assert!(matches!(err, Error::Io { path: Some(_), .. }));
}

#[test]
fn unresolved_designs_report_not_resolved() {
    let text = ".subckt A a\nXB a B\n.ends\n.subckt B b\nR0 b 0 1\n.ends\n";
    let config = ParseConfig::new(Dialect::Hspice);
    let lines = LineAssembler::new(text.as_bytes(), config.dialect.line_rules());
    let mut design = Parser::build(config, lines).unwrap();

    assert!(!design.is_resolved());
    assert!(matches!(design.root(), Err(Error::NotResolved)));
    assert!(design.circuit_named("A").unwrap().children().is_empty());
    assert!(matches!(
        design.circuit(0).unwrap().node(0).unwrap().device(),
        DeviceType::Reference(_)
    ));

    let root = design.resolve_root().unwrap();
    assert_eq!(design.circuit(root.index()).unwrap().name(), "A");
    assert_eq!(design.resolve_root().unwrap(), root);
    assert!(matches!(design.circuit(7), Err(Error::Index { kind: "circuit", index: 7, len: 2 })));
}

#[test]
fn failed_resolution_leaves_design_unchanged() {
    let text = ".subckt A a\nXB a B\nXC a C\n.ends\n.subckt B b\nXA b A\n.ends\n.subckt C c\nR0 c 0 1\n.ends\n";
    let config = ParseConfig::new(Dialect::Hspice);
    let lines = LineAssembler::new(text.as_bytes(), config.dialect.line_rules());
    let mut design = Parser::build(config, lines).unwrap();

    assert!(matches!(
        design.resolve_root(),
        Err(Error::CyclicHierarchy { .. })
    ));
    assert!(!design.is_resolved());
    for circuit in design.circuits() {
        assert!(circuit.children().is_empty());
        for node in circuit.nodes() {
            assert!(node.subcircuit().is_none());
        }
    }
}

#[test]
fn builder_accepts_statements_directly() {
    let mut builder = NetlistBuilder::new(ParseConfig::new(Dialect::Spectre));
    builder
        .push(Statement {
            line: 1,
            kind: StatementKind::SubcircuitStart {
                name: arcstr::literal!("cell"),
                ports: vec![arcstr::literal!("a")],
                params: Params::default(),
            },
        })
        .unwrap();
    builder
        .push(Statement {
            line: 2,
            kind: StatementKind::SubcircuitEnd { name: None },
        })
        .unwrap();
    let mut design = builder.finish().unwrap();
    assert_eq!(design.circuit_count(), 1);
    assert_eq!(design.resolve_root().unwrap().index(), 0);
}
