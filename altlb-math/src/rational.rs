//! Conversions between machine floats and exact rationals.
//!
//! Search constants are chosen as `f64` (doubling and bisection only ever
//! produce dyadic values), but every linear program is solved exactly.
//! A finite `f64` converts to a [`BigRational`] without rounding.

use num_bigint::BigInt;
use num_rational::BigRational;
use num_traits::{Signed, ToPrimitive, Zero};

/// Helper to create an integral rational.
pub fn rat(n: i64) -> BigRational {
    BigRational::from_integer(BigInt::from(n))
}

/// Exact rational value of a finite float. Returns `None` for NaN and infinities.
pub fn from_f64(value: f64) -> Option<BigRational> {
    BigRational::from_float(value)
}

/// Nearest float to a rational. Values outside the `f64` range saturate to infinity.
pub fn to_f64(value: &BigRational) -> f64 {
    value.to_f64().unwrap_or_else(|| {
        if value.is_negative() {
            f64::NEG_INFINITY
        } else if value.is_zero() {
            0.0
        } else {
            f64::INFINITY
        }
    })
}

/// Parse `p`, `p/q` or a decimal literal such as `1.25` into an exact rational.
pub fn parse(text: &str) -> Option<BigRational> {
    let text = text.trim();
    if let Ok(value) = text.parse::<BigRational>() {
        return Some(value);
    }

    let (negative, digits) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text),
    };
    let (int_part, frac_part) = digits.split_once('.')?;
    if int_part.is_empty() && frac_part.is_empty() {
        return None;
    }
    if !int_part.chars().chain(frac_part.chars()).all(|c| c.is_ascii_digit()) {
        return None;
    }

    let numer: BigInt = format!("{int_part}{frac_part}").parse().ok()?;
    let denom = num_traits::pow(BigInt::from(10), frac_part.len());
    let value = BigRational::new(numer, denom);
    Some(if negative { -value } else { value })
}

/// Absolute difference `|lhs - rhs|`.
pub fn abs_diff(lhs: &BigRational, rhs: &BigRational) -> BigRational {
    (lhs - rhs).abs()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_f64_is_exact_for_dyadics() {
        assert_eq!(from_f64(1.5), Some(rat(3) / rat(2)));
        assert_eq!(from_f64(0.375), Some(rat(3) / rat(8)));
        assert_eq!(from_f64(f64::NAN), None);
        assert_eq!(from_f64(f64::INFINITY), None);
    }

    #[test]
    fn test_to_f64_round_trips_dyadics() {
        let value = rat(7) / rat(4);
        assert_eq!(to_f64(&value), 1.75);
    }

    #[test]
    fn test_parse_forms() {
        assert_eq!(parse("3"), Some(rat(3)));
        assert_eq!(parse("-3/4"), Some(rat(-3) / rat(4)));
        assert_eq!(parse("1.25"), Some(rat(5) / rat(4)));
        assert_eq!(parse("-0.5"), Some(rat(-1) / rat(2)));
        assert_eq!(parse(".5"), Some(rat(1) / rat(2)));
        assert_eq!(parse("abc"), None);
        assert_eq!(parse("."), None);
        assert_eq!(parse("1.2.3"), None);
    }

    #[test]
    fn test_abs_diff() {
        assert_eq!(abs_diff(&rat(2), &rat(5)), rat(3));
    }
}
