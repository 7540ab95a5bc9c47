//! Joins physical lines into logical statement lines.

use std::io::BufRead;
use std::path::{Path, PathBuf};

use arcstr::ArcStr;

use crate::error::{Error, Result};

/// A complete statement line, with continuations joined and comments removed.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct LogicalLine {
    /// The 1-based physical line on which the statement starts.
    pub line: usize,
    /// The statement text.
    pub text: ArcStr,
}

/// Comment and continuation markers for a dialect.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct LineRules {
    /// Prefixes that mark a whole line as a comment.
    pub comment_prefixes: &'static [&'static str],
    /// Markers that start a comment running to the end of the line.
    ///
    /// Only recognized outside quotes, at the start of a line or after whitespace.
    pub inline_comments: &'static [&'static str],
    /// A marker at the start of a line that continues the previous statement.
    pub leading_continuation: Option<char>,
    /// A marker at the end of a line that continues the statement on the next line.
    pub trailing_continuation: Option<char>,
}

impl LineRules {
    /// HSPICE comment and continuation markers.
    pub const HSPICE: Self = Self {
        comment_prefixes: &["*"],
        inline_comments: &["$"],
        leading_continuation: Some('+'),
        trailing_continuation: None,
    };

    /// Spectre comment and continuation markers.
    pub const SPECTRE: Self = Self {
        comment_prefixes: &["//", "*"],
        inline_comments: &["//"],
        leading_continuation: None,
        trailing_continuation: Some('\\'),
    };

    fn is_comment(&self, line: &str) -> bool {
        self.comment_prefixes.iter().any(|p| line.starts_with(p))
    }

    fn strip_inline<'a>(&self, line: &'a str) -> &'a str {
        let mut quote = None;
        let mut after_ws = true;
        for (i, c) in line.char_indices() {
            match quote {
                Some(q) if c == q => quote = None,
                Some(_) => {}
                None if c == '\'' || c == '"' => quote = Some(c),
                None if after_ws && self.inline_comments.iter().any(|m| line[i..].starts_with(m)) => {
                    return &line[..i];
                }
                None => {}
            }
            after_ws = c.is_whitespace();
        }
        line
    }
}

/// A lazy iterator over the logical lines of a netlist.
///
/// Cloning an assembler over a cloneable reader (such as `&[u8]`)
/// yields an independent iterator that restarts from the same position.
#[derive(Clone, Debug)]
pub struct LineAssembler<R> {
    reader: R,
    rules: LineRules,
    path: Option<PathBuf>,
    skip_title: bool,
    physical: usize,
    buf: String,
    pending: Option<(usize, String)>,
    open_trailing: bool,
    done: bool,
}

impl<R: BufRead> LineAssembler<R> {
    /// Creates an assembler reading from `reader` with the given markers.
    pub fn new(reader: R, rules: LineRules) -> Self {
        Self {
            reader,
            rules,
            path: None,
            skip_title: false,
            physical: 0,
            buf: String::new(),
            pending: None,
            open_trailing: false,
            done: false,
        }
    }

    /// Records the path being read, for error reporting.
    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// The path being read, if one was recorded.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Treats the first physical line as a title and skips it.
    pub fn skip_title(mut self, skip: bool) -> Self {
        self.skip_title = skip;
        self
    }

    /// Reads the next physical line, returning `false` at end of input.
    fn read_physical(&mut self) -> Result<bool> {
        self.buf.clear();
        let n = self.reader.read_line(&mut self.buf).map_err(|source| Error::Io {
            path: self.path.clone(),
            source,
        })?;
        if n > 0 {
            self.physical += 1;
        }
        Ok(n > 0)
    }

    /// Folds one physical line into the pending statement.
    ///
    /// Returns a completed logical line if this physical line starts a new statement.
    fn absorb(&mut self) -> Option<LogicalLine> {
        if self.skip_title && self.physical == 1 {
            return None;
        }
        let line = self.buf.trim_end_matches(['\n', '\r']).trim();
        if line.is_empty() || self.rules.is_comment(line) {
            return None;
        }
        let line = self.rules.strip_inline(line).trim_end();
        if line.is_empty() {
            return None;
        }

        let (line, continuation) = match self.rules.leading_continuation {
            Some(marker) if line.starts_with(marker) => (line[marker.len_utf8()..].trim_start(), true),
            _ => (line, false),
        };
        let (line, continues) = match self.rules.trailing_continuation {
            Some(marker) if line.ends_with(marker) => {
                (line[..line.len() - marker.len_utf8()].trim_end(), true)
            }
            _ => (line, false),
        };
        let joins = continuation || self.open_trailing;
        self.open_trailing = continues;

        if joins {
            if let Some((_, text)) = self.pending.as_mut() {
                if !line.is_empty() {
                    if !text.is_empty() {
                        text.push(' ');
                    }
                    text.push_str(line);
                }
                return None;
            }
            tracing::warn!(
                line = self.physical,
                "continuation line has no statement to continue; treating it as a new statement"
            );
        }

        let next = (self.physical, line.to_string());
        self.pending.replace(next).and_then(finish)
    }
}

fn finish((line, text): (usize, String)) -> Option<LogicalLine> {
    if text.is_empty() {
        None
    } else {
        Some(LogicalLine {
            line,
            text: ArcStr::from(text),
        })
    }
}

impl<R: BufRead> Iterator for LineAssembler<R> {
    type Item = Result<LogicalLine>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.done {
            match self.read_physical() {
                Ok(true) => {
                    if let Some(line) = self.absorb() {
                        return Some(Ok(line));
                    }
                }
                Ok(false) => {
                    self.done = true;
                    if let Some(line) = self.pending.take().and_then(finish) {
                        return Some(Ok(line));
                    }
                }
                Err(err) => {
                    self.done = true;
                    self.pending = None;
                    return Some(Err(err));
                }
            }
        }
        None
    }
}
