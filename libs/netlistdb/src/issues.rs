//! Non-fatal findings recorded while building a design.

use std::fmt::{Debug, Display};

use arcstr::ArcStr;
use serde::{Deserialize, Serialize};
use tracing::Level;

/// A finding that should be reported to users.
pub trait Diagnostic: Debug + Display {
    /// What users can change to make the finding go away, if anything.
    fn help(&self) -> Option<Box<dyn Display>> {
        None
    }

    /// How serious the finding is.
    fn severity(&self) -> Severity;
}

/// How serious a [`Diagnostic`] is. No diagnostic aborts a parse;
/// fatal problems are reported as [`Error`](crate::Error)s instead.
#[derive(Copy, Clone, Debug, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
pub enum Severity {
    /// Input that was understood and deliberately set aside.
    Info,
    /// Input that was not understood and was skipped.
    Warning,
}

/// The issues recorded for one design, in input order.
#[derive(Debug, Clone)]
pub struct IssueSet<T> {
    issues: Vec<T>,
    num_warnings: usize,
}

/// A non-fatal issue found while parsing a netlist.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct ParseIssue {
    line: usize,
    cause: Cause,
    severity: Severity,
}

/// The cause of a [`ParseIssue`].
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum Cause {
    /// A statement no dialect rule understands. The statement is skipped.
    UnrecognizedStatement {
        /// The reason the statement was not understood.
        reason: ArcStr,
    },
    /// A simulation or control directive with no structural meaning.
    IgnoredDirective {
        /// The directive keyword.
        name: ArcStr,
    },
    /// A port of a subcircuit shares its name with a global net
    /// and is kept local.
    GlobalShadowed {
        /// The circuit declaring the port.
        circuit: ArcStr,
        /// The shadowed net name.
        net: ArcStr,
    },
}

impl<T> IssueSet<T> {
    /// Creates an empty issue set.
    #[inline]
    pub fn new() -> Self {
        Self {
            issues: Vec::new(),
            num_warnings: 0,
        }
    }

    /// Iterates over the issues in input order.
    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.issues.iter()
    }

    /// The number of issues.
    #[inline]
    pub fn len(&self) -> usize {
        self.issues.len()
    }

    /// Returns `true` if nothing was recorded.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }
}

impl<T: Diagnostic> IssueSet<T> {
    pub(crate) fn add(&mut self, issue: T) {
        if issue.severity() == Severity::Warning {
            self.num_warnings += 1;
        }
        self.issues.push(issue);
    }

    /// Returns `true` if any statement was skipped as unrecognized.
    pub fn has_warning(&self) -> bool {
        self.num_warnings > 0
    }

    /// The number of warnings.
    #[inline]
    pub fn num_warnings(&self) -> usize {
        self.num_warnings
    }

    /// Iterates over the warnings in input order.
    pub fn warnings(&self) -> impl Iterator<Item = &T> {
        self.issues
            .iter()
            .filter(|issue| issue.severity() == Severity::Warning)
    }
}

impl<T> Default for IssueSet<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match *self {
            Self::Info => write!(f, "info"),
            Self::Warning => write!(f, "warning"),
        }
    }
}

impl ParseIssue {
    /// Creates a new issue with the default severity of its cause.
    pub(crate) fn new(line: usize, cause: Cause) -> Self {
        let severity = cause.default_severity();
        Self {
            line,
            cause,
            severity,
        }
    }

    /// Creates a new issue and logs it immediately.
    ///
    /// The log level is selected according to the issue's severity.
    pub(crate) fn new_and_log(line: usize, cause: Cause) -> Self {
        let result = Self::new(line, cause);
        match result.severity {
            Severity::Info => tracing::event!(Level::INFO, issue = ?result.cause, "{}", result),
            Severity::Warning => tracing::event!(Level::WARN, issue = ?result.cause, "{}", result),
        }
        result
    }

    /// The line of the statement that produced this issue.
    #[inline]
    pub fn line(&self) -> usize {
        self.line
    }

    /// Gets the underlying cause of this issue.
    #[inline]
    pub fn cause(&self) -> &Cause {
        &self.cause
    }
}

impl Cause {
    fn default_severity(&self) -> Severity {
        match self {
            Self::UnrecognizedStatement { .. } => Severity::Warning,
            Self::IgnoredDirective { .. } | Self::GlobalShadowed { .. } => Severity::Info,
        }
    }
}

impl Diagnostic for ParseIssue {
    fn help(&self) -> Option<Box<dyn Display>> {
        match &self.cause {
            Cause::GlobalShadowed { .. } => Some(Box::new(
                "set `global_policy = \"merge\"` to connect ports to global nets of the same name",
            )),
            _ => None,
        }
    }

    fn severity(&self) -> Severity {
        self.severity
    }
}

impl Display for ParseIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "line {}: {}", self.line, self.cause)
    }
}

impl Display for Cause {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnrecognizedStatement { reason } => {
                write!(f, "unrecognized statement skipped: {reason}")
            }
            Self::IgnoredDirective { name } => write!(f, "ignored directive `{name}`"),
            Self::GlobalShadowed { circuit, net } => write!(
                f,
                "port `{net}` of circuit `{circuit}` shadows the global net of the same name"
            ),
        }
    }
}
