//! Splits logical netlist lines into typed tokens.
//!
//! The tokenizer does not know which dialect it is reading:
//! the same token stream is handed to every [`Recognizer`](crate::dialect::Recognizer).

use std::borrow::Borrow;
use std::fmt::Display;
use std::ops::Deref;

use arcstr::ArcStr;
use nom::bytes::complete::take_till;
use rust_decimal::Decimal;
use thiserror::Error;

use crate::assembler::LogicalLine;
use crate::units::{parse_scalar, starts_number};

/// A substring of a logical line.
#[derive(Clone, Default, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
#[repr(transparent)]
pub struct Substr(arcstr::Substr);

/// A punctuation token.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum Punct {
    /// `=`
    Equals,
    /// `(`
    LParen,
    /// `)`
    RParen,
    /// `,`
    Comma,
    /// `*`
    Star,
    /// `/`
    Slash,
}

/// A netlist token.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Token {
    /// A word that starts with a dot followed by a letter.
    ///
    /// Examples: ".subckt", ".ends", ".global".
    ///
    /// Case matches the input; no conversion is made.
    Keyword(Substr),
    /// An identifier.
    Ident(Substr),
    /// A numeric literal.
    Number {
        /// The resolved scalar value, with any scale suffix applied.
        value: Decimal,
        /// The literal as written.
        text: Substr,
    },
    /// A quoted string or a braced expression, without its delimiters.
    Str(Substr),
    /// A punctuation character.
    Punct(Punct),
}

/// A malformed numeric literal or an unterminated string.
#[derive(Debug, Clone, Error)]
#[error("line {line}: {message} (token `{token}`)")]
pub struct TokenizeError {
    line: usize,
    token: ArcStr,
    message: ArcStr,
}

/// Produces the tokens of a single logical line.
pub struct Tokenizer {
    line: usize,
    data: ArcStr,
    ofs: usize,
}

#[inline]
fn is_delimiter(c: char) -> bool {
    c.is_whitespace() || matches!(c, '=' | '(' | ')' | ',' | '*' | '/' | '\'' | '"' | '{' | '}')
}

impl Tokenizer {
    /// Creates a tokenizer over the given logical line.
    pub fn new(line: &LogicalLine) -> Self {
        Self {
            line: line.line,
            data: line.text.clone(),
            ofs: 0,
        }
    }

    /// Returns the next token, or [`None`] at the end of the line.
    pub fn get(&mut self) -> Result<Option<Token>, TokenizeError> {
        self.take_ws();
        let Some(c) = self.peek() else {
            return Ok(None);
        };

        let punct = match c {
            '=' => Some(Punct::Equals),
            '(' => Some(Punct::LParen),
            ')' => Some(Punct::RParen),
            ',' => Some(Punct::Comma),
            '*' => Some(Punct::Star),
            '/' => Some(Punct::Slash),
            _ => None,
        };
        if let Some(punct) = punct {
            self.ofs += c.len_utf8();
            return Ok(Some(Token::Punct(punct)));
        }

        match c {
            '\'' | '"' => self.take_quoted(c, c).map(Some),
            '{' => self.take_quoted('{', '}').map(Some),
            '}' => Err(self.err("unmatched closing brace", "}")),
            _ => {
                let word = self.take_word();
                if starts_number(&word) {
                    let value = parse_scalar(&word).map_err(|e| self.err(e.message(), &*word))?;
                    Ok(Some(Token::Number { value, text: word }))
                } else if word.starts_with('.')
                    && word[1..].starts_with(|c: char| c.is_ascii_alphabetic())
                {
                    Ok(Some(Token::Keyword(word)))
                } else {
                    Ok(Some(Token::Ident(word)))
                }
            }
        }
    }

    fn rem(&self) -> &str {
        &self.data[self.ofs..]
    }

    fn peek(&self) -> Option<char> {
        self.rem().chars().next()
    }

    fn take_ws(&mut self) {
        let rem = self.rem();
        self.ofs += rem.len() - rem.trim_start().len();
    }

    fn take_word(&mut self) -> Substr {
        let (_, word) = take_till::<_, _, ()>(is_delimiter)(self.rem()).unwrap_or(("", ""));
        let start = self.ofs;
        self.ofs += word.len();
        Substr(self.data.substr(start..self.ofs))
    }

    /// Consumes a delimited string, honoring nesting for distinct delimiters.
    fn take_quoted(&mut self, open: char, close: char) -> Result<Token, TokenizeError> {
        let start = self.ofs;
        let body = start + open.len_utf8();
        let mut depth = 0usize;
        for (i, c) in self.data[body..].char_indices() {
            if c == close && depth == 0 {
                let end = body + i;
                self.ofs = end + close.len_utf8();
                return Ok(Token::Str(Substr(self.data.substr(body..end))));
            } else if c == close {
                depth -= 1;
            } else if c == open && open != close {
                depth += 1;
            }
        }
        let token = &self.data[start..];
        Err(self.err("unterminated string", token))
    }

    fn err(&self, message: impl Into<ArcStr>, token: &str) -> TokenizeError {
        TokenizeError {
            line: self.line,
            token: ArcStr::from(token),
            message: message.into(),
        }
    }
}

/// Tokenizes a complete logical line.
pub fn tokenize(line: &LogicalLine) -> Result<Vec<Token>, TokenizeError> {
    Tokenizer::new(line).into_iter().collect()
}

/// An iterator over the tokens of a logical line.
pub struct Tokens {
    tok: Tokenizer,
}

impl Iterator for Tokens {
    type Item = Result<Token, TokenizeError>;
    fn next(&mut self) -> Option<Self::Item> {
        self.tok.get().transpose()
    }
}

impl IntoIterator for Tokenizer {
    type Item = Result<Token, TokenizeError>;
    type IntoIter = Tokens;
    fn into_iter(self) -> Self::IntoIter {
        Tokens { tok: self }
    }
}

impl Token {
    /// Returns the token's text as a name, if it can be used as one.
    ///
    /// Identifiers and numbers are valid names; `0` is a common ground net.
    pub fn as_name(&self) -> Option<&Substr> {
        match self {
            Self::Ident(s) => Some(s),
            Self::Number { text, .. } => Some(text),
            _ => None,
        }
    }

    /// Returns `true` if this token is the given punctuation character.
    #[inline]
    pub fn is_punct(&self, punct: Punct) -> bool {
        matches!(self, Self::Punct(p) if *p == punct)
    }

    /// Returns `true` if this token is an identifier equal to `word`, ignoring ASCII case.
    pub fn is_word(&self, word: &str) -> bool {
        matches!(self, Self::Ident(s) if s.eq_ignore_ascii_case(word))
    }
}

impl Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Keyword(s) | Self::Ident(s) => write!(f, "{s}"),
            Self::Number { text, .. } => write!(f, "{text}"),
            Self::Str(s) => write!(f, "'{s}'"),
            Self::Punct(p) => write!(f, "{p}"),
        }
    }
}

impl Display for Punct {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let c = match self {
            Self::Equals => '=',
            Self::LParen => '(',
            Self::RParen => ')',
            Self::Comma => ',',
            Self::Star => '*',
            Self::Slash => '/',
        };
        write!(f, "{c}")
    }
}

impl TokenizeError {
    /// The line on which the offending token appears.
    #[inline]
    pub fn line(&self) -> usize {
        self.line
    }

    /// The offending substring.
    #[inline]
    pub fn token(&self) -> &str {
        &self.token
    }
}

impl Substr {
    /// Copies this substring into an owned [`ArcStr`].
    pub fn to_arcstr(&self) -> ArcStr {
        ArcStr::from(self.as_str())
    }
}

impl Deref for Substr {
    type Target = arcstr::Substr;
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl Display for Substr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Substr {
    fn from(value: &str) -> Self {
        Self(arcstr::Substr::from(value))
    }
}

impl Borrow<str> for Substr {
    fn borrow(&self) -> &str {
        &self.0
    }
}
