//! Dialect-specific statement recognition.
//!
//! Each dialect maps the token sequence of a logical line to one
//! [`StatementKind`]. The [`NetlistBuilder`](crate::NetlistBuilder)
//! only ever sees statement kinds, never dialect syntax.

use std::fmt::Display;
use std::str::FromStr;

use arcstr::ArcStr;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::assembler::{LineRules, LogicalLine};
use crate::config::CasePolicy;
use crate::db::{Params, PrimitiveKind, Value};
use crate::error::{Error, Result};
use crate::tokenizer::{Punct, Token};

pub mod hspice;
pub mod spectre;


/// A SPICE-family netlist dialect.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    /// Synopsys HSPICE.
    Hspice,
    /// Cadence Spectre.
    Spectre,
}

/// An error parsing a netlist dialect from a string.
#[derive(Copy, Clone, Debug, Error)]
#[error("error parsing netlist dialect")]
pub struct ParseDialectError;

/// Maps the tokens of a logical line to a statement.
pub trait Recognizer {
    /// Classifies one logical line.
    ///
    /// `tokens` is never empty. Statements that the dialect does not
    /// understand are returned as [`StatementKind::Unrecognized`];
    /// an error is returned only for a recognized statement shape
    /// that is missing required pieces.
    fn classify(&self, line: &LogicalLine, tokens: &[Token]) -> Result<StatementKind>;
}

/// A classified statement.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Statement {
    /// The line on which the statement starts.
    pub line: usize,
    /// The statement contents.
    pub kind: StatementKind,
}

/// The closed set of statements every dialect produces.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum StatementKind {
    /// Opens a subcircuit definition.
    SubcircuitStart {
        /// The subcircuit name.
        name: ArcStr,
        /// The ordered port names.
        ports: Vec<ArcStr>,
        /// Default parameter values declared on the header.
        params: Params,
    },
    /// Closes the current subcircuit definition.
    SubcircuitEnd {
        /// The name given on the end statement, if any.
        name: Option<ArcStr>,
    },
    /// A device or subcircuit instance.
    DeviceInstance(DeviceInstance),
    /// Declares nets available in every scope opened afterwards.
    GlobalNetDeclaration {
        /// The global net names.
        names: Vec<ArcStr>,
    },
    /// Declares a device model.
    ModelDefinition {
        /// The model name.
        name: ArcStr,
        /// The model's base device type, as written.
        base: ArcStr,
    },
    /// A simulation or control statement with no structural meaning.
    Directive {
        /// The directive keyword.
        name: ArcStr,
    },
    /// A statement the dialect does not understand.
    Unrecognized {
        /// Why the statement was not understood.
        reason: ArcStr,
    },
}

/// An instance statement.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct DeviceInstance {
    /// The instance label.
    pub name: ArcStr,
    /// The device the instance places.
    pub device: DeviceRef,
    /// The ordered terminal net names.
    pub terminals: Vec<ArcStr>,
    /// Keyword parameters.
    pub params: Params,
    /// Positional values following the terminals (e.g. `1k` on a resistor).
    pub values: Vec<Value>,
}

/// What an instance statement places.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum DeviceRef {
    /// A device whose type is known from the statement itself.
    Primitive {
        /// The device kind.
        kind: PrimitiveKind,
        /// The model name, if one was given.
        model: Option<ArcStr>,
    },
    /// A name the hierarchy resolver must look up.
    ///
    /// Resolves to a subcircuit, a model, or a configured primitive.
    Reference(ArcStr),
}

impl Dialect {
    /// The statement recognizer for this dialect.
    pub fn recognizer(&self) -> &'static dyn Recognizer {
        match self {
            Self::Hspice => &hspice::HspiceRecognizer,
            Self::Spectre => &spectre::SpectreRecognizer,
        }
    }

    /// Comment and continuation markers for this dialect.
    pub fn line_rules(&self) -> LineRules {
        match self {
            Self::Hspice => LineRules::HSPICE,
            Self::Spectre => LineRules::SPECTRE,
        }
    }

    /// The name comparison policy used when none is configured.
    pub fn default_case(&self) -> CasePolicy {
        match self {
            Self::Hspice => CasePolicy::Insensitive,
            Self::Spectre => CasePolicy::Sensitive,
        }
    }

    /// Whether subcircuit definitions may be nested.
    pub fn allows_nesting(&self) -> bool {
        match self {
            Self::Hspice => false,
            Self::Spectre => true,
        }
    }
}

impl Display for Dialect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Hspice => write!(f, "hspice"),
            Self::Spectre => write!(f, "spectre"),
        }
    }
}

impl FromStr for Dialect {
    type Err = ParseDialectError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "hspice" | "sp" => Ok(Self::Hspice),
            "spectre" | "scs" => Ok(Self::Spectre),
            _ => Err(ParseDialectError),
        }
    }
}

impl StatementKind {
    pub(crate) fn unrecognized(reason: impl Display) -> Self {
        Self::Unrecognized {
            reason: arcstr::format!("{reason}"),
        }
    }
}

/// Returns the text of a token usable as a name, or a syntax error naming `what`.
pub(crate) fn name_of(line: usize, token: Option<&Token>, what: &str) -> Result<ArcStr> {
    match token.and_then(Token::as_name) {
        Some(name) => Ok(name.to_arcstr()),
        None => Err(Error::syntax(
            line,
            match token {
                Some(token) => format!("expected {what}, found `{token}`"),
                None => format!("missing {what}"),
            },
        )),
    }
}

/// Returns the index of the first `key=value` pair in `tokens`.
pub(crate) fn first_param(tokens: &[Token]) -> usize {
    tokens
        .windows(2)
        .position(|w| w[0].as_name().is_some() && w[1].is_punct(Punct::Equals))
        .unwrap_or(tokens.len())
}

/// Parses a run of `key=value` pairs.
///
/// A value is every token up to the next `key=`. A single numeric token
/// keeps its resolved scalar; anything else is kept as text.
pub(crate) fn parse_params(line: usize, tokens: &[Token]) -> Result<Params> {
    let mut params = Params::default();
    let mut rest = tokens;
    while !rest.is_empty() {
        let key = match rest {
            [key, eq, ..] if eq.is_punct(Punct::Equals) => name_of(line, Some(key), "parameter name")?,
            [token, ..] => {
                return Err(Error::syntax(
                    line,
                    format!("expected a `key=value` parameter, found `{token}`"),
                ))
            }
            [] => break,
        };
        rest = &rest[2..];
        let end = first_param(rest);
        if end == 0 {
            return Err(Error::syntax(
                line,
                format!("parameter `{key}` has no value"),
            ));
        }
        params.insert(key, value_of(&rest[..end]));
        rest = &rest[end..];
    }
    Ok(params)
}

/// Builds a value from the tokens that make it up.
pub(crate) fn value_of(tokens: &[Token]) -> Value {
    match tokens {
        [Token::Number { value, text }] => Value::Numeric {
            value: *value,
            text: text.to_arcstr(),
        },
        [Token::Str(s)] | [Token::Ident(s)] => Value::Text(s.to_arcstr()),
        tokens => {
            let mut text = String::new();
            let mut after_word = false;
            for token in tokens {
                let word = !matches!(token, Token::Punct(_));
                if word && after_word {
                    text.push(' ');
                }
                match token {
                    Token::Str(s) => text.push_str(s),
                    token => text.push_str(&token.to_string()),
                }
                after_word = word;
            }
            Value::Text(ArcStr::from(text))
        }
    }
}

/// Splits positional tokens into names, reporting the first non-name token.
pub(crate) fn names_of(line: usize, tokens: &[Token], what: &str) -> Result<Vec<ArcStr>> {
    tokens
        .iter()
        .map(|token| name_of(line, Some(token), what))
        .collect()
}
