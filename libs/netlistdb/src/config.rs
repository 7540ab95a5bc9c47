//! Parse configuration.

use arcstr::ArcStr;
use serde::{Deserialize, Serialize};
use unicase::UniCase;

use crate::dialect::Dialect;
use crate::error::Result;

/// How names are compared.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CasePolicy {
    /// Names match only if they are spelled identically.
    Sensitive,
    /// Names match regardless of letter case.
    ///
    /// The first spelling seen is kept for display.
    Insensitive,
}

/// How a subcircuit port is treated when it shares a name with a global net.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GlobalPolicy {
    /// The port stays a local net of the subcircuit.
    Shadow,
    /// The port is the global net.
    #[default]
    Merge,
}

/// Options controlling a single parse.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ParseConfig {
    /// The netlist dialect. Never inferred from content.
    pub dialect: Dialect,
    /// The name comparison policy.
    ///
    /// [`None`] selects the dialect's default.
    #[serde(default)]
    pub case: Option<CasePolicy>,
    /// Port and global net clash handling.
    #[serde(default)]
    pub global_policy: GlobalPolicy,
    /// The name of the implicit top-level circuit.
    #[serde(default)]
    pub top_name: Option<ArcStr>,
    /// Model names treated as primitive devices with no terminal count rule.
    #[serde(default)]
    pub primitives: Vec<ArcStr>,
    /// Whether the first physical line is a title.
    #[serde(default)]
    pub title_line: bool,
}

/// A name as used for lookups under a [`CasePolicy`].
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub(crate) enum NameKey {
    Exact(ArcStr),
    Folded(UniCase<ArcStr>),
}

impl CasePolicy {
    pub(crate) fn key(&self, name: impl Into<ArcStr>) -> NameKey {
        match self {
            Self::Sensitive => NameKey::Exact(name.into()),
            Self::Insensitive => NameKey::Folded(UniCase::new(name.into())),
        }
    }
}

impl ParseConfig {
    /// Creates a configuration with defaults for the given dialect.
    pub fn new(dialect: Dialect) -> Self {
        Self {
            dialect,
            case: None,
            global_policy: GlobalPolicy::default(),
            top_name: None,
            primitives: Vec::new(),
            title_line: false,
        }
    }

    /// Reads a configuration from TOML text.
    ///
    /// ```
    /// # use netlistdb::{ParseConfig, Dialect, GlobalPolicy};
    /// let config = ParseConfig::from_toml_str(r#"
    ///     dialect = "hspice"
    ///     global_policy = "shadow"
    /// "#).unwrap();
    /// assert_eq!(config.dialect, Dialect::Hspice);
    /// assert_eq!(config.global_policy, GlobalPolicy::Shadow);
    /// ```
    pub fn from_toml_str(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Sets the name comparison policy.
    pub fn with_case(mut self, case: CasePolicy) -> Self {
        self.case = Some(case);
        self
    }

    /// Sets the port and global net clash policy.
    pub fn with_global_policy(mut self, policy: GlobalPolicy) -> Self {
        self.global_policy = policy;
        self
    }

    /// Sets the name of the implicit top-level circuit.
    pub fn with_top_name(mut self, name: impl Into<ArcStr>) -> Self {
        self.top_name = Some(name.into());
        self
    }

    /// Adds a model name treated as a primitive device.
    pub fn with_primitive(mut self, name: impl Into<ArcStr>) -> Self {
        self.primitives.push(name.into());
        self
    }

    /// Sets whether the first physical line is a title.
    pub fn with_title_line(mut self, title_line: bool) -> Self {
        self.title_line = title_line;
        self
    }

    /// The effective name comparison policy.
    pub fn case_policy(&self) -> CasePolicy {
        self.case.unwrap_or_else(|| self.dialect.default_case())
    }
}
