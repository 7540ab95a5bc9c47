//! Numeric literals with SPICE engineering suffixes.
//!
//! A literal is a decimal mantissa, an optional exponent, an optional
//! scale factor, and optional trailing unit letters that carry no meaning:
//!
//! ```text
//! 1k      -> 1000
//! 2.5u    -> 0.0000025
//! 10pF    -> 0.00000000001
//! 1.2e-3  -> 0.0012
//! 3meg    -> 3000000
//! ```
//!
//! Scale factors are matched case-insensitively and do not depend on the dialect.

use lazy_static::lazy_static;
use nom::branch::alt;
use nom::bytes::complete::tag_no_case;
use nom::character::complete::{char, digit0, digit1, one_of};
use nom::combinator::{opt, recognize};
use nom::sequence::{pair, tuple};
use nom::IResult;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

lazy_static! {
    /// Scale suffixes and their multipliers.
    ///
    /// Multi-letter suffixes come first so that `meg` and `mil` win over `m`.
    static ref SCALES: Vec<(&'static str, Decimal)> = vec![
        ("meg", dec!(1000000)),
        ("mil", dec!(0.0000254)),
        ("t", dec!(1000000000000)),
        ("g", dec!(1000000000)),
        ("x", dec!(1000000)),
        ("k", dec!(1000)),
        ("m", dec!(0.001)),
        ("u", dec!(0.000001)),
        ("n", dec!(0.000000001)),
        ("p", dec!(0.000000000001)),
        ("f", dec!(0.000000000000001)),
        ("a", dec!(0.000000000000000001)),
    ];
}

/// The reason a numeric literal could not be resolved.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub(crate) enum NumberError {
    /// The text does not follow the literal grammar.
    Malformed,
    /// The exponent marker is not followed by any digits.
    EmptyExponent,
    /// The value does not fit in a [`Decimal`].
    OutOfRange,
}

impl NumberError {
    pub(crate) fn message(self) -> &'static str {
        match self {
            Self::Malformed => "malformed numeric literal",
            Self::EmptyExponent => "numeric literal has an empty exponent",
            Self::OutOfRange => "numeric literal is out of range",
        }
    }
}

/// Returns `true` if `text` should be read as a numeric literal.
///
/// Numbers start with a digit, or with `.`, `+` or `-` followed by a digit.
pub(crate) fn starts_number(text: &str) -> bool {
    let mut chars = text.chars();
    match chars.next() {
        Some(c) if c.is_ascii_digit() => true,
        Some('+') | Some('-') => match chars.next() {
            Some(c) if c.is_ascii_digit() => true,
            Some('.') => chars.next().is_some_and(|c| c.is_ascii_digit()),
            _ => false,
        },
        Some('.') => chars.next().is_some_and(|c| c.is_ascii_digit()),
        _ => false,
    }
}

fn mantissa(input: &str) -> IResult<&str, &str> {
    recognize(pair(
        opt(one_of("+-")),
        alt((
            recognize(pair(digit1, opt(pair(char('.'), digit0)))),
            recognize(pair(char('.'), digit1)),
        )),
    ))(input)
}

fn exponent(input: &str) -> IResult<&str, &str> {
    recognize(tuple((one_of("eE"), opt(one_of("+-")), digit1)))(input)
}

fn scale(input: &str) -> IResult<&str, Decimal> {
    for (suffix, factor) in SCALES.iter() {
        if let Ok((rest, _)) = tag_no_case::<_, _, nom::error::Error<&str>>(*suffix)(input) {
            return Ok((rest, *factor));
        }
    }
    Ok((input, Decimal::ONE))
}

#[inline]
fn is_unit_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Resolves a numeric literal to its canonical scalar value.
pub(crate) fn parse_scalar(text: &str) -> Result<Decimal, NumberError> {
    let (rest, mantissa) = mantissa(text).map_err(|_| NumberError::Malformed)?;
    let (rest, exponent) = match exponent(rest) {
        Ok((rest, exponent)) => (rest, Some(exponent)),
        Err(_) => {
            if rest.starts_with(['e', 'E']) {
                return Err(NumberError::EmptyExponent);
            }
            (rest, None)
        }
    };
    let (units, factor) = scale(rest).map_err(|_| NumberError::Malformed)?;
    if !units.chars().all(is_unit_char) {
        return Err(NumberError::Malformed);
    }

    let mantissa = mantissa.strip_suffix('.').unwrap_or(mantissa);
    let mantissa = mantissa.strip_prefix('+').unwrap_or(mantissa);
    let mantissa = match mantissa.strip_prefix('-') {
        Some(digits) if digits.starts_with('.') => format!("-0{digits}"),
        _ if mantissa.starts_with('.') => format!("0{mantissa}"),
        _ => mantissa.to_string(),
    };
    let value = match exponent {
        Some(exponent) => {
            Decimal::from_scientific(&format!("{mantissa}{}", exponent.to_ascii_lowercase()))
                .map_err(|_| NumberError::OutOfRange)?
        }
        None => mantissa
            .parse::<Decimal>()
            .map_err(|_| NumberError::OutOfRange)?,
    };
    value.checked_mul(factor).ok_or(NumberError::OutOfRange)
}
