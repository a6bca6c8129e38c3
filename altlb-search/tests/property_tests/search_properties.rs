//! Property-based tests for the proof search
//!
//! This module tests:
//! - Monotonicity of provability in the constant
//! - Monotonicity of provability in the maximum length
//! - Soundness of every witness returned

use altlb_math::rational::rat;
use altlb_search::{RuleCatalog, SearchConfig, SearchDriver, SimplexOracle, verify_witness};
use proptest::prelude::*;

fn driver() -> SearchDriver<SimplexOracle> {
    let config = SearchConfig::new().with_threads(1);
    SearchDriver::new(RuleCatalog::standard(), SimplexOracle::new(), config).unwrap()
}

/// Strategy for constants around the interesting range, in 1/64 steps
fn constant_strategy() -> impl Strategy<Value = f64> {
    (48u32..112).prop_map(|k| f64::from(k) / 64.0)
}

#[cfg(test)]
mod monotonicity {
    use super::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(24))]

        /// Provable at c implies provable at every smaller c
        #[test]
        fn provable_downward_closed(c in constant_strategy(), shrink in 1u32..16) {
            let driver = driver();
            let smaller = c - f64::from(shrink) / 64.0;
            if driver.is_provable(c, 5).unwrap().is_some() {
                prop_assert!(driver.is_provable(smaller, 5).unwrap().is_some());
            }
        }

        /// Allowing longer proofs never loses a proof
        #[test]
        fn provable_upward_in_length(c in constant_strategy()) {
            let driver = driver();
            if driver.is_provable(c, 3).unwrap().is_some() {
                prop_assert!(driver.is_provable(c, 5).unwrap().is_some());
            }
        }
    }
}

#[cfg(test)]
mod soundness {
    use super::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(24))]

        /// Every returned witness satisfies its rebuilt program exactly
        #[test]
        fn witnesses_verify(c in constant_strategy()) {
            let driver = driver();
            if let Some(witness) = driver.is_provable(c, 5).unwrap() {
                prop_assert!(witness.constant_f64() == c);
                prop_assert!(verify_witness(driver.catalog(), &witness, &rat(0)).is_ok());
            }
        }

        /// Every tied witness verifies too
        #[test]
        fn all_witnesses_verify(c in constant_strategy()) {
            let driver = driver();
            for witness in driver.witnesses_at(c, 5).unwrap() {
                prop_assert!(verify_witness(driver.catalog(), &witness, &rat(0)).is_ok());
            }
        }
    }
}
