//! Property-based tests for the annotation enumerator
//!
//! This module tests:
//! - Every enumerated sequence validates
//! - Every valid sequence is enumerated
//! - Compact form round-trips

use altlb_search::{Annotation, RuleCatalog, RuleKind};
use proptest::prelude::*;
use std::collections::HashSet;

/// Strategy for generating arbitrary rule sequences
fn kinds_strategy(max_len: usize) -> impl Strategy<Value = Vec<RuleKind>> {
    prop::collection::vec(
        prop_oneof![
            Just(RuleKind::Open),
            Just(RuleKind::Speedup),
            Just(RuleKind::Slowdown),
        ],
        0..=max_len,
    )
}

#[cfg(test)]
mod enumeration_completeness {
    use super::*;

    proptest! {
        /// A sequence validates exactly when the enumerator yields it
        #[test]
        fn validation_matches_enumeration(kinds in kinds_strategy(9)) {
            let catalog = RuleCatalog::standard();
            let enumerated: HashSet<Vec<RuleKind>> = catalog
                .enumerate(9)
                .map(|a| a.kinds().to_vec())
                .collect();

            let valid = Annotation::new(&catalog, kinds.iter().copied()).is_ok();
            prop_assert_eq!(valid, enumerated.contains(&kinds));
        }

        /// Two-step catalog: only Speedup, Slowdown is valid
        #[test]
        fn two_step_accepts_single_sequence(kinds in kinds_strategy(5)) {
            let catalog = RuleCatalog::two_step();
            let valid = Annotation::new(&catalog, kinds.iter().copied()).is_ok();
            prop_assert_eq!(valid, kinds == vec![RuleKind::Speedup, RuleKind::Slowdown]);
        }
    }
}

#[cfg(test)]
mod annotation_shape {
    use super::*;

    proptest! {
        /// Depth profile starts and ends at zero and stays positive in between
        #[test]
        fn depth_profile_is_balanced(max_length in 1usize..10) {
            let catalog = RuleCatalog::standard();
            for annotation in catalog.enumerate(max_length) {
                let profile = annotation.depth_profile();
                prop_assert_eq!(profile.len(), annotation.len() + 1);
                prop_assert_eq!(profile[0], 0);
                prop_assert_eq!(profile[profile.len() - 1], 0);
                prop_assert!(profile[1..profile.len() - 1].iter().all(|&d| d >= 1));
                prop_assert!(annotation.width() >= 3);
                prop_assert!(annotation.width() > annotation.max_depth());
            }
        }

        /// The compact form parses back to the same annotation
        #[test]
        fn compact_round_trip(max_length in 1usize..10) {
            let catalog = RuleCatalog::standard();
            for annotation in catalog.enumerate(max_length) {
                let parsed = Annotation::parse(&catalog, &annotation.compact()).unwrap();
                prop_assert_eq!(parsed, annotation);
            }
        }

        /// Enumeration up to a smaller length is a prefix of a longer one
        #[test]
        fn enumeration_prefix(short in 1usize..8, extra in 0usize..3) {
            let catalog = RuleCatalog::standard();
            let small: Vec<Annotation> = catalog.enumerate(short).collect();
            let large: Vec<Annotation> = catalog.enumerate(short + extra).collect();
            prop_assert!(large.len() >= small.len());
            prop_assert_eq!(&large[..small.len()], &small[..]);
        }
    }
}
