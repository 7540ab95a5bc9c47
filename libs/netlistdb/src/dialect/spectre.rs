//! Spectre statement recognition.

use std::collections::{HashMap, HashSet};

use arcstr::ArcStr;
use lazy_static::lazy_static;

use super::{
    first_param, name_of, names_of, parse_params, DeviceInstance, DeviceRef, Recognizer,
    StatementKind,
};
use crate::assembler::LogicalLine;
use crate::db::{Params, PrimitiveKind};
use crate::error::{Error, Result};
use crate::tokenizer::{Punct, Token};

lazy_static! {
    static ref DIRECTIVES: HashSet<&'static str> = [
        "simulator", "parameters", "include", "ahdl_include", "library", "endlibrary", "section",
        "endsection", "save", "ic", "nodeset", "real", "statistics", "paramset",
    ]
    .into_iter()
    .collect();

    /// Masters that turn an instance line into an analysis or control statement.
    static ref ANALYSES: HashSet<&'static str> = [
        "dc", "ac", "tran", "noise", "xf", "sp", "pss", "pac", "pnoise", "hb", "info", "options",
        "set", "shell", "alter", "altergroup", "check", "sweep", "montecarlo",
    ]
    .into_iter()
    .collect();

    static ref PRIMITIVES: HashMap<&'static str, PrimitiveKind> = [
        ("resistor", PrimitiveKind::Resistor),
        ("capacitor", PrimitiveKind::Capacitor),
        ("inductor", PrimitiveKind::Inductor),
        ("vsource", PrimitiveKind::VoltageSource),
        ("isource", PrimitiveKind::CurrentSource),
        ("diode", PrimitiveKind::Diode),
        ("vcvs", PrimitiveKind::Vcvs),
        ("vccs", PrimitiveKind::Vccs),
        ("ccvs", PrimitiveKind::Ccvs),
        ("cccs", PrimitiveKind::Cccs),
        ("mutual_inductor", PrimitiveKind::MutualInductor),
        ("bsource", PrimitiveKind::Behavioral),
        ("switch", PrimitiveKind::Switch),
        ("tline", PrimitiveKind::TransmissionLine),
        ("port", PrimitiveKind::Port),
    ]
    .into_iter()
    .collect();
}

/// Recognizes Spectre statements.
///
/// Keywords are matched exactly; Spectre is case-sensitive.
#[derive(Copy, Clone, Debug, Default)]
pub struct SpectreRecognizer;

impl Recognizer for SpectreRecognizer {
    fn classify(&self, line: &LogicalLine, tokens: &[Token]) -> Result<StatementKind> {
        let line = line.line;
        let Some(Token::Ident(first)) = tokens.first() else {
            return Ok(StatementKind::unrecognized(match tokens.first() {
                Some(token) => format!("statement starts with `{token}`"),
                None => "empty statement".to_string(),
            }));
        };
        let rest = &tokens[1..];
        match first.as_str() {
            "subckt" => subckt(line, rest),
            "inline" if matches!(rest.first(), Some(Token::Ident(s)) if s.as_str() == "subckt") => {
                subckt(line, &rest[1..])
            }
            "ends" => Ok(StatementKind::SubcircuitEnd {
                name: rest
                    .first()
                    .map(|token| name_of(line, Some(token), "subcircuit name"))
                    .transpose()?,
            }),
            "global" => {
                if rest.is_empty() {
                    return Err(Error::syntax(line, "`global` names no nets"));
                }
                Ok(StatementKind::GlobalNetDeclaration {
                    names: names_of(line, rest, "global net name")?,
                })
            }
            "model" => Ok(StatementKind::ModelDefinition {
                name: name_of(line, rest.first(), "model name")?,
                base: name_of(line, rest.get(1), "model type")?,
            }),
            directive if DIRECTIVES.contains(directive) => Ok(StatementKind::Directive {
                name: first.to_arcstr(),
            }),
            _ => instance(line, first.to_arcstr(), rest),
        }
    }
}

/// Returns the index of the `)` closing the list opened at `tokens[0]`.
fn closing_paren(line: usize, tokens: &[Token]) -> Result<usize> {
    tokens
        .iter()
        .position(|t| t.is_punct(Punct::RParen))
        .ok_or_else(|| Error::syntax(line, "unterminated terminal list"))
}

/// Reads a parenthesized or bare list of names, returning the names and the remaining tokens.
fn name_list<'a>(line: usize, tokens: &'a [Token], what: &str) -> Result<(Vec<ArcStr>, &'a [Token])> {
    match tokens.first() {
        Some(t) if t.is_punct(Punct::LParen) => {
            let close = closing_paren(line, tokens)?;
            let names = tokens[1..close]
                .iter()
                .filter(|t| !t.is_punct(Punct::Comma))
                .map(|t| name_of(line, Some(t), what))
                .collect::<Result<Vec<_>>>()?;
            Ok((names, &tokens[close + 1..]))
        }
        _ => {
            let end = first_param(tokens);
            Ok((names_of(line, &tokens[..end], what)?, &tokens[end..]))
        }
    }
}

fn subckt(line: usize, tokens: &[Token]) -> Result<StatementKind> {
    let name = name_of(line, tokens.first(), "subcircuit name")?;
    let (ports, rest) = name_list(line, &tokens[1..], "port name")?;
    Ok(StatementKind::SubcircuitStart {
        name,
        ports,
        params: parse_params(line, rest)?,
    })
}

fn instance(line: usize, name: ArcStr, tokens: &[Token]) -> Result<StatementKind> {
    let (terminals, master, params) = match tokens.first() {
        Some(t) if t.is_punct(Punct::LParen) => {
            let (terminals, rest) = name_list(line, tokens, "terminal name")?;
            let master = name_of(line, rest.first(), "master name")?;
            (terminals, master, rest.get(1..).unwrap_or_default())
        }
        _ => {
            let end = first_param(tokens);
            let Some((master, terminals)) = tokens[..end].split_last() else {
                return Ok(StatementKind::unrecognized(format_args!(
                    "`{name}` is not followed by terminals or a master"
                )));
            };
            (
                names_of(line, terminals, "terminal name")?,
                name_of(line, Some(master), "master name")?,
                &tokens[end..],
            )
        }
    };

    if ANALYSES.contains(master.as_str()) {
        return Ok(StatementKind::Directive { name: master });
    }
    let params: Params = parse_params(line, params)?;
    let device = match PRIMITIVES.get(master.as_str()) {
        Some(&kind) => DeviceRef::Primitive { kind, model: None },
        None => DeviceRef::Reference(master),
    };
    Ok(StatementKind::DeviceInstance(DeviceInstance {
        name,
        device,
        terminals,
        params,
        values: Vec::new(),
    }))
}
