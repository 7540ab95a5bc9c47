//! HSPICE statement recognition.

use std::collections::HashSet;

use arcstr::ArcStr;
use lazy_static::lazy_static;

use super::{
    first_param, name_of, names_of, parse_params, value_of, DeviceInstance, DeviceRef, Recognizer,
    StatementKind,
};
use crate::assembler::LogicalLine;
use crate::db::{PrimitiveKind, Value};
use crate::error::{Error, Result};
use crate::tokenizer::{Punct, Token};

lazy_static! {
    static ref DIRECTIVES: HashSet<&'static str> = [
        ".end", ".option", ".options", ".param", ".params", ".include", ".inc", ".lib", ".endl",
        ".temp", ".tran", ".ac", ".dc", ".op", ".noise", ".print", ".probe", ".plot", ".meas",
        ".measure", ".ic", ".nodeset", ".alter", ".data", ".enddata", ".protect", ".unprotect",
        ".prot", ".unprot", ".save", ".connect", ".title",
    ]
    .into_iter()
    .collect();
}

/// Recognizes HSPICE statements.
///
/// Keywords and element prefixes are case-insensitive.
#[derive(Copy, Clone, Debug, Default)]
pub struct HspiceRecognizer;

impl Recognizer for HspiceRecognizer {
    fn classify(&self, line: &LogicalLine, tokens: &[Token]) -> Result<StatementKind> {
        match tokens.first() {
            Some(Token::Keyword(keyword)) => self.keyword(line.line, keyword, &tokens[1..]),
            Some(Token::Ident(name)) => element(line.line, name.to_arcstr(), &tokens[1..]),
            Some(token) => Ok(StatementKind::unrecognized(format_args!(
                "statement starts with `{token}`"
            ))),
            None => Ok(StatementKind::unrecognized("empty statement")),
        }
    }
}

impl HspiceRecognizer {
    fn keyword(&self, line: usize, keyword: &str, rest: &[Token]) -> Result<StatementKind> {
        let lower = keyword.to_ascii_lowercase();
        match lower.as_str() {
            ".subckt" | ".macro" => {
                let name = name_of(line, rest.first(), "subcircuit name")?;
                let rest = rest.get(1..).unwrap_or_default();
                let end = port_end(rest);
                let ports = names_of(line, &rest[..end], "port name")?;
                let rest = match rest.get(end) {
                    Some(token) if is_params_marker(token) => &rest[end + 1..],
                    _ => &rest[end..],
                };
                Ok(StatementKind::SubcircuitStart {
                    name,
                    ports,
                    params: parse_params(line, rest)?,
                })
            }
            ".ends" | ".eom" => Ok(StatementKind::SubcircuitEnd {
                name: rest
                    .first()
                    .map(|token| name_of(line, Some(token), "subcircuit name"))
                    .transpose()?,
            }),
            ".global" => {
                if rest.is_empty() {
                    return Err(Error::syntax(line, "`.global` names no nets"));
                }
                Ok(StatementKind::GlobalNetDeclaration {
                    names: names_of(line, rest, "global net name")?,
                })
            }
            ".model" => Ok(StatementKind::ModelDefinition {
                name: name_of(line, rest.first(), "model name")?,
                base: name_of(line, rest.get(1), "model type")?,
            }),
            directive if DIRECTIVES.contains(directive) => Ok(StatementKind::Directive {
                name: ArcStr::from(keyword),
            }),
            _ => Ok(StatementKind::unrecognized(format_args!(
                "unknown keyword `{keyword}`"
            ))),
        }
    }
}

fn is_params_marker(token: &Token) -> bool {
    token.is_word("params:") || token.is_word("param:")
}

/// The number of leading tokens of a subcircuit header that are ports.
fn port_end(tokens: &[Token]) -> usize {
    let marker = tokens
        .iter()
        .position(is_params_marker)
        .unwrap_or(tokens.len());
    first_param(tokens).min(marker)
}

/// Classifies an element statement by the first letter of its name.
fn element(line: usize, name: ArcStr, rest: &[Token]) -> Result<StatementKind> {
    let split = first_param(rest);
    let (positional, params) = rest.split_at(split);
    let positional = match positional.split_last() {
        Some((last, init)) if is_params_marker(last) => init,
        _ => positional,
    };

    let Some(prefix) = name.chars().next().map(|c| c.to_ascii_uppercase()) else {
        return Ok(StatementKind::unrecognized("empty element name"));
    };
    let (device, terminals, values) = match prefix {
        'M' | 'D' | 'J' | 'Q' | 'S' => {
            let kind = match prefix {
                'M' => PrimitiveKind::Mosfet,
                'D' => PrimitiveKind::Diode,
                'J' => PrimitiveKind::Jfet,
                'Q' => PrimitiveKind::Bjt,
                _ => PrimitiveKind::Switch,
            };
            // The model is the last identifier; numbers after it are area factors.
            let Some(at) = positional.iter().rposition(|t| matches!(t, Token::Ident(_))) else {
                return Err(Error::syntax(
                    line,
                    format!("element `{name}` is missing a model name"),
                ));
            };
            let model = name_of(line, positional.get(at), "model name")?;
            (
                DeviceRef::Primitive {
                    kind,
                    model: Some(model),
                },
                names_of(line, &positional[..at], "terminal name")?,
                values_of(&positional[at + 1..]),
            )
        }
        'X' => {
            let Some((master, terminals)) = positional.split_last() else {
                return Err(Error::syntax(
                    line,
                    format!("instance `{name}` is missing a subcircuit name"),
                ));
            };
            (
                DeviceRef::Reference(name_of(line, Some(master), "subcircuit name")?),
                names_of(line, terminals, "terminal name")?,
                Vec::new(),
            )
        }
        'R' | 'C' | 'L' => {
            let kind = match prefix {
                'R' => PrimitiveKind::Resistor,
                'C' => PrimitiveKind::Capacitor,
                _ => PrimitiveKind::Inductor,
            };
            let (terminals, rest) = split_terminals(line, positional, 2)?;
            let model = match rest.first() {
                Some(Token::Ident(model)) => Some(model.to_arcstr()),
                _ => None,
            };
            (DeviceRef::Primitive { kind, model }, terminals, values_of(rest))
        }
        'V' | 'I' | 'B' | 'F' | 'H' | 'W' | 'E' | 'G' | 'T' | 'K' => {
            let (kind, count) = match prefix {
                'V' => (PrimitiveKind::VoltageSource, 2),
                'I' => (PrimitiveKind::CurrentSource, 2),
                'B' => (PrimitiveKind::Behavioral, 2),
                'F' => (PrimitiveKind::Cccs, 2),
                'H' => (PrimitiveKind::Ccvs, 2),
                'W' => (PrimitiveKind::CurrentSwitch, 2),
                'E' => (PrimitiveKind::Vcvs, 4),
                'G' => (PrimitiveKind::Vccs, 4),
                'T' => (PrimitiveKind::TransmissionLine, 4),
                _ => (PrimitiveKind::MutualInductor, 0),
            };
            let (terminals, rest) = split_terminals(line, positional, count)?;
            (
                DeviceRef::Primitive { kind, model: None },
                terminals,
                values_of(rest),
            )
        }
        _ => {
            return Ok(StatementKind::unrecognized(format_args!(
                "unknown element type of `{name}`"
            )))
        }
    };

    Ok(StatementKind::DeviceInstance(DeviceInstance {
        name,
        device,
        terminals,
        params: parse_params(line, params)?,
        values,
    }))
}

/// Takes up to `count` leading terminal names.
fn split_terminals(line: usize, tokens: &[Token], count: usize) -> Result<(Vec<ArcStr>, &[Token])> {
    let count = count.min(tokens.len());
    let (terminals, rest) = tokens.split_at(count);
    Ok((names_of(line, terminals, "terminal name")?, rest))
}

/// Groups positional value tokens.
///
/// A token followed by a parenthesized list (e.g. `PULSE(0 1 1n)`)
/// forms a single value.
pub(crate) fn values_of(tokens: &[Token]) -> Vec<Value> {
    let mut values = Vec::new();
    let mut rest = tokens;
    while !rest.is_empty() {
        let mut end = 1;
        let starts_group = rest[0].is_punct(Punct::LParen);
        if starts_group || rest.get(1).is_some_and(|t| t.is_punct(Punct::LParen)) {
            let open = if starts_group { 0 } else { 1 };
            let mut depth = 0usize;
            end = rest.len();
            for (i, token) in rest.iter().enumerate().skip(open) {
                if token.is_punct(Punct::LParen) {
                    depth += 1;
                } else if token.is_punct(Punct::RParen) {
                    depth -= 1;
                    if depth == 0 {
                        end = i + 1;
                        break;
                    }
                }
            }
        }
        values.push(value_of(&rest[..end]));
        rest = &rest[end..];
    }
    values
}
