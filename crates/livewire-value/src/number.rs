//! Arbitrary-precision numbers that don't fit `i64`/`f64`.

use std::fmt;

use num_bigint::BigInt;
use num_rational::BigRational;
use num_traits::Zero;

use crate::ValueError;

/// An arbitrary-precision decimal, carried as its decimal text.
///
/// The host evaluates these at [`BigFloat::PRECISION`] bits. The text is
/// validated on construction so it always parses on the other side, but
/// it is otherwise kept verbatim: `1.50` and `1.5` are different values.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BigFloat {
    text: String,
}

impl BigFloat {
    /// Mantissa precision, in bits, the host computes with.
    pub const PRECISION: u32 = 256;

    /// Parses a decimal literal: optional sign, digits with an optional
    /// fraction, optional exponent. At least one digit is required.
    ///
    /// # Errors
    /// Returns [`ValueError::InvalidDecimal`] for anything else,
    /// including `NaN` and infinities.
    pub fn parse(text: &str) -> Result<Self, ValueError> {
        if is_decimal_literal(text) {
            Ok(Self {
                text: text.to_owned(),
            })
        } else {
            Err(ValueError::InvalidDecimal(text.to_owned()))
        }
    }

    /// The decimal text.
    pub fn as_str(&self) -> &str {
        &self.text
    }
}

impl fmt::Display for BigFloat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}M", self.text)
    }
}

fn is_decimal_literal(text: &str) -> bool {
    let body = text.strip_prefix(['-', '+']).unwrap_or(text);
    let (mantissa, exponent) = match body.split_once(['e', 'E']) {
        Some((m, e)) => (m, Some(e)),
        None => (body, None),
    };

    let (int_part, frac_part) = match mantissa.split_once('.') {
        Some((i, f)) => (i, f),
        None => (mantissa, ""),
    };
    let all_digits = |s: &str| s.bytes().all(|b| b.is_ascii_digit());
    if int_part.is_empty() && frac_part.is_empty() {
        return false;
    }
    if !all_digits(int_part) || !all_digits(frac_part) {
        return false;
    }

    match exponent {
        None => true,
        Some(exp) => {
            let digits = exp.strip_prefix(['-', '+']).unwrap_or(exp);
            !digits.is_empty() && all_digits(digits)
        }
    }
}

/// Builds a ratio, rejecting a zero denominator. The result is reduced.
///
/// # Errors
/// Returns [`ValueError::ZeroDenominator`] when `denominator` is zero.
pub fn ratio(numerator: BigInt, denominator: BigInt) -> Result<BigRational, ValueError> {
    if denominator.is_zero() {
        return Err(ValueError::ZeroDenominator);
    }
    Ok(BigRational::new(numerator, denominator))
}
