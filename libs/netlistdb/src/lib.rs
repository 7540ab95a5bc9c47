//! Parses HSPICE and Spectre netlists into a hierarchical circuit database.
//!
//! ```
//! use netlistdb::{Dialect, ParseConfig, Parser};
//!
//! let design = Parser::parse_str(
//!     ParseConfig::new(Dialect::Hspice),
//!     "
//! .subckt inv a y vdd vss
//! M0 y a vss vss nch
//! M1 y a vdd vdd pch
//! .ends
//! .subckt buf a y vdd vss
//! X0 a x vdd vss inv
//! X1 x y vdd vss inv
//! .ends
//! .model nch nmos
//! .model pch pmos
//! ",
//! )
//! .unwrap();
//!
//! assert_eq!(design.circuit_count(), 2);
//! assert_eq!(design.root_circuit().unwrap().name(), "buf");
//! ```
//!
//! # Limitations
//!
//! A word beginning with a digit is always read as a number. Net names
//! such as `1<0>`, `2e` or `3#` are therefore rejected with
//! [`Error::Tokenize`]; all-digit names like `0` or `10` are accepted.
//! Strings and brace expressions must close on the logical line that
//! opens them.
#![warn(missing_docs)]

use std::io::BufRead;
use std::path::Path;

use arcstr::ArcStr;
use tracing::{span, Level};

pub mod assembler;
pub mod builder;
pub mod config;
pub mod db;
pub mod dialect;
pub mod error;
pub mod issues;
mod resolver;
pub mod tokenizer;
mod units;

#[cfg(test)]
mod tests;

pub use assembler::{LineAssembler, LineRules, LogicalLine};
pub use builder::NetlistBuilder;
pub use config::{CasePolicy, GlobalPolicy, ParseConfig};
pub use db::{
    Circuit, CircuitId, Design, DeviceType, GlobalNets, Model, Net, Node, Params, Pin, PinRef,
    PrimitiveKind, Value,
};
pub use dialect::{Dialect, Recognizer, Statement, StatementKind};
pub use error::{Error, Result};
pub use issues::{Cause, Diagnostic, IssueSet, ParseIssue, Severity};

/// Runs the netlist pipeline.
pub struct Parser;

impl Parser {
    /// Parses netlist text.
    pub fn parse_str(config: ParseConfig, text: &str) -> Result<Design> {
        Self::parse_reader(config, text.as_bytes())
    }

    /// Parses a netlist file.
    ///
    /// Unless configured otherwise, the implicit top-level circuit
    /// is named after the file stem.
    pub fn parse_file(config: ParseConfig, path: impl AsRef<Path>) -> Result<Design> {
        let path = path.as_ref();
        tracing::debug!("reading netlist file: {:?}", path);
        let file = std::fs::File::open(path).map_err(|source| Error::Io {
            path: Some(path.into()),
            source,
        })?;
        let lines = LineAssembler::new(std::io::BufReader::new(file), config.dialect.line_rules())
            .with_path(path);
        Self::run(config, lines)
    }

    /// Parses a netlist from any buffered reader.
    pub fn parse_reader(config: ParseConfig, reader: impl BufRead) -> Result<Design> {
        let lines = LineAssembler::new(reader, config.dialect.line_rules());
        Self::run(config, lines)
    }

    /// Builds an unresolved design from the logical lines of a netlist.
    ///
    /// If the lines come from a file and no top name is configured,
    /// the implicit top-level circuit is named after the file stem.
    pub fn build<R: BufRead>(config: ParseConfig, lines: LineAssembler<R>) -> Result<Design> {
        let _guard = span!(Level::INFO, "building design", dialect = %config.dialect).entered();
        let recognizer = config.dialect.recognizer();
        let lines = lines.skip_title(config.title_line);
        let stem = lines
            .path()
            .and_then(Path::file_stem)
            .map(|stem| ArcStr::from(stem.to_string_lossy().as_ref()));
        let mut builder = NetlistBuilder::new(config);
        if let Some(stem) = stem {
            builder = builder.with_default_top_name(stem);
        }
        for line in lines {
            let line = line?;
            let tokens = tokenizer::tokenize(&line)?;
            if tokens.is_empty() {
                continue;
            }
            let kind = recognizer.classify(&line, &tokens)?;
            tracing::trace!(line = line.line, ?kind, "classified statement");
            builder.push(Statement {
                line: line.line,
                kind,
            })?;
        }
        builder.finish()
    }

    fn run<R: BufRead>(config: ParseConfig, lines: LineAssembler<R>) -> Result<Design> {
        let mut design = Self::build(config, lines)?;
        design.resolve_root()?;
        Ok(design)
    }
}
