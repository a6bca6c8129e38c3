//! Property-based tests for float/rational conversion

use altlb_math::rational::{from_f64, parse, rat, to_f64};
use proptest::prelude::*;

proptest! {
    /// Every finite float converts exactly and back
    #[test]
    fn float_conversion_is_exact(value in -1.0e6f64..1.0e6f64) {
        let exact = from_f64(value).expect("finite");
        prop_assert_eq!(to_f64(&exact), value);
    }

    /// Halving a dyadic stays exact
    #[test]
    fn halving_stays_exact(n in 1i64..10_000, k in 0u32..40) {
        let value = n as f64 / 2f64.powi(k as i32);
        let exact = from_f64(value).expect("finite");
        prop_assert_eq!(exact * rat(1i64 << k), rat(n));
    }

    /// Fractions written as text parse to their value
    #[test]
    fn parse_fraction(p in -1000i64..1000, q in 1i64..1000) {
        let parsed = parse(&format!("{p}/{q}")).expect("fraction");
        prop_assert_eq!(parsed, rat(p) / rat(q));
    }
}
