//! Errors produced while parsing and resolving a netlist.

use std::path::PathBuf;

use arcstr::ArcStr;
use itertools::Itertools;
use thiserror::Error;

use crate::tokenizer::TokenizeError;

/// A netlist parsing result.
pub type Result<T> = std::result::Result<T, Error>;

/// A fatal error arising from parsing, resolving, or querying a netlist.
///
/// Every variant aborts the parse of the current file.
/// A [`Design`](crate::Design) is never handed out in a resolved state
/// after one of these errors.
#[derive(Debug, Error)]
pub enum Error {
    /// The input could not be read.
    #[error("failed to read netlist{}: {source}", fmt_path(.path))]
    Io {
        /// The path being read, if the input came from a file.
        path: Option<PathBuf>,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },
    /// A malformed numeric literal or an unterminated string.
    #[error(transparent)]
    Tokenize(#[from] TokenizeError),
    /// The parse configuration could not be read.
    #[error("invalid parse configuration: {0}")]
    Config(#[from] toml::de::Error),
    /// A statement was recognized but is missing required pieces.
    #[error("syntax error on line {line}: {message}")]
    Syntax {
        /// The line on which the statement starts.
        line: usize,
        /// A description of the problem.
        message: String,
    },
    /// A subcircuit end with no matching start,
    /// or a subcircuit start that is never closed.
    #[error("unbalanced subcircuit scope on line {line}{}", fmt_name(.name))]
    UnbalancedScope {
        /// The offending line.
        ///
        /// For a subcircuit left open at end of input, this is the line
        /// on which the subcircuit was declared.
        line: usize,
        /// The name of the subcircuit involved, if known.
        name: Option<ArcStr>,
    },
    /// A subcircuit end names a different circuit than the one currently open.
    #[error("line {line}: end of subcircuit `{found}` does not match open subcircuit `{expected}`")]
    MismatchedEnd {
        /// The line of the end statement.
        line: usize,
        /// The name of the open circuit.
        expected: ArcStr,
        /// The name given on the end statement.
        found: ArcStr,
    },
    /// A subcircuit definition was nested inside another
    /// in a dialect that does not allow nesting.
    #[error("line {line}: subcircuit `{name}` is defined inside `{parent}`, but nested definitions are not supported by this dialect")]
    NestedDefinition {
        /// The line of the nested definition.
        line: usize,
        /// The name of the nested subcircuit.
        name: ArcStr,
        /// The name of the enclosing subcircuit.
        parent: ArcStr,
    },
    /// Two circuits share a name.
    #[error("line {line}: duplicate definition of circuit `{name}` (first defined {})", fmt_first(.first_line))]
    DuplicateDefinition {
        /// The line of the second definition.
        line: usize,
        /// The duplicated name.
        name: ArcStr,
        /// The line of the first definition.
        ///
        /// [`None`] when the first definition is the implicit top-level circuit.
        first_line: Option<usize>,
    },
    /// Two nodes in the same circuit share a name.
    #[error("line {line}: duplicate instance `{name}` in circuit `{circuit}`")]
    DuplicateInstance {
        /// The line of the second instance.
        line: usize,
        /// The circuit containing both instances.
        circuit: ArcStr,
        /// The duplicated instance name.
        name: ArcStr,
    },
    /// A port name is listed more than once in a subcircuit header.
    #[error("line {line}: port `{port}` is listed more than once on subcircuit `{circuit}`")]
    DuplicatePort {
        /// The line of the subcircuit header.
        line: usize,
        /// The subcircuit being declared.
        circuit: ArcStr,
        /// The repeated port.
        port: ArcStr,
    },
    /// An instance references no known device type or circuit.
    #[error("line {line}: instance `{node}` in circuit `{circuit}` references `{master}`, which is neither a defined circuit nor a known device")]
    UnresolvedReference {
        /// The line of the instance.
        line: usize,
        /// The circuit containing the instance.
        circuit: ArcStr,
        /// The instance name.
        node: ArcStr,
        /// The name the instance references.
        master: ArcStr,
    },
    /// An instance's pin count does not match the port count of what it references.
    #[error("line {line}: instance `{node}` in circuit `{circuit}` connects {actual} pins, but `{master}` expects {expected}")]
    PortArity {
        /// The line of the instance.
        line: usize,
        /// The circuit containing the instance.
        circuit: ArcStr,
        /// The instance name.
        node: ArcStr,
        /// The referenced circuit or device type.
        master: ArcStr,
        /// A description of the expected pin count (e.g. `4` or `3 to 4`).
        expected: String,
        /// The number of pins on the instance.
        actual: usize,
    },
    /// No unique uninstantiated circuit exists.
    ///
    /// An empty candidate list means the design contains no circuits at all.
    #[error("ambiguous root circuit: {}", fmt_candidates(.candidates))]
    AmbiguousRoot {
        /// Circuits that are never instantiated.
        candidates: Vec<ArcStr>,
    },
    /// The instantiation graph contains a cycle.
    #[error("cyclic hierarchy: {}", .cycle.iter().join(" -> "))]
    CyclicHierarchy {
        /// The circuits along the cycle, starting and ending with the same circuit.
        cycle: Vec<ArcStr>,
    },
    /// The root circuit was queried before hierarchy resolution.
    #[error("the design has not been resolved")]
    NotResolved,
    /// An index was out of range.
    #[error("{kind} index {index} is out of range (length {len})")]
    Index {
        /// The kind of entity being indexed.
        kind: &'static str,
        /// The requested index.
        index: usize,
        /// The number of entities available.
        len: usize,
    },
}

impl Error {
    /// The line on which this error originated, if any.
    pub fn line(&self) -> Option<usize> {
        match self {
            Self::Tokenize(err) => Some(err.line()),
            Self::Syntax { line, .. }
            | Self::UnbalancedScope { line, .. }
            | Self::MismatchedEnd { line, .. }
            | Self::NestedDefinition { line, .. }
            | Self::DuplicateDefinition { line, .. }
            | Self::DuplicateInstance { line, .. }
            | Self::DuplicatePort { line, .. }
            | Self::UnresolvedReference { line, .. }
            | Self::PortArity { line, .. } => Some(*line),
            Self::Io { .. }
            | Self::Config(_)
            | Self::AmbiguousRoot { .. }
            | Self::CyclicHierarchy { .. }
            | Self::NotResolved
            | Self::Index { .. } => None,
        }
    }

    pub(crate) fn syntax(line: usize, message: impl Into<String>) -> Self {
        Self::Syntax {
            line,
            message: message.into(),
        }
    }

    pub(crate) fn index(kind: &'static str, index: usize, len: usize) -> Self {
        Self::Index { kind, index, len }
    }
}

fn fmt_path(path: &Option<PathBuf>) -> String {
    match path {
        Some(path) => format!(" at `{}`", path.display()),
        None => String::new(),
    }
}

fn fmt_name(name: &Option<ArcStr>) -> String {
    match name {
        Some(name) => format!(" (subcircuit `{name}`)"),
        None => String::new(),
    }
}

fn fmt_first(line: &Option<usize>) -> String {
    match line {
        Some(line) => format!("on line {line}"),
        None => "as the top-level circuit".to_string(),
    }
}

fn fmt_candidates(candidates: &[ArcStr]) -> String {
    if candidates.is_empty() {
        "the design contains no circuits".to_string()
    } else {
        format!(
            "{} circuits are never instantiated: {}",
            candidates.len(),
            candidates.iter().map(|c| format!("`{c}`")).join(", ")
        )
    }
}
