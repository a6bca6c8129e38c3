//! Property-based tests for LP solver
//!
//! This module tests:
//! - LP algorithm correctness
//! - Optimal solution properties
//! - Infeasibility detection

use altlb_math::lp_core::{ConstraintSense, LPResult, LPSolver, OptDir};
use altlb_math::rational::rat;
use num_rational::BigRational;
use num_traits::{Signed, Zero};
use proptest::prelude::*;

/// Strategy for generating small LP coefficients
fn lp_coeff_strategy() -> impl Strategy<Value = i64> {
    -10i64..10i64
}

/// Strategy for generating positive coefficients
fn positive_coeff_strategy() -> impl Strategy<Value = i64> {
    1i64..10i64
}

#[cfg(test)]
mod simplex_basic_properties {
    use super::*;

    proptest! {
        /// A box-constrained single variable LP is optimal at a bound
        #[test]
        fn simplex_single_var_box(
            c in lp_coeff_strategy(),
            bound in positive_coeff_strategy()
        ) {
            // maximize c*x subject to 0 <= x <= bound
            let mut lp = LPSolver::new();
            let x = lp.new_continuous();

            lp.set_objective(x, rat(c));
            lp.set_direction(OptDir::Maximize);
            lp.new_constraint([(x, rat(1))], ConstraintSense::Le, rat(bound));

            match lp.solve() {
                LPResult::Optimal { objective, values } => {
                    let expected = if c > 0 { rat(c * bound) } else { rat(0) };
                    prop_assert_eq!(objective, expected);
                    prop_assert!(values[&x] >= BigRational::zero());
                    prop_assert!(values[&x] <= rat(bound));
                }
                other => prop_assert!(false, "unexpected result {:?}", other),
            }
        }

        /// Pure feasibility problems report a feasible point
        #[test]
        fn simplex_zero_objective(lo in 0i64..5, width in 0i64..5) {
            // lo <= x <= lo + width
            let mut lp = LPSolver::new();
            let x = lp.new_continuous();
            lp.new_constraint([(x, rat(1))], ConstraintSense::Ge, rat(lo));
            lp.new_constraint([(x, rat(1))], ConstraintSense::Le, rat(lo + width));

            match lp.solve() {
                LPResult::Optimal { values, objective } => {
                    prop_assert!(objective.is_zero());
                    prop_assert!(values[&x] >= rat(lo));
                    prop_assert!(values[&x] <= rat(lo + width));
                }
                other => prop_assert!(false, "unexpected result {:?}", other),
            }
        }

        /// Crossed bounds are detected as infeasible
        #[test]
        fn simplex_crossed_bounds_infeasible(hi in 0i64..5, gap in 1i64..5) {
            let mut lp = LPSolver::new();
            let x = lp.new_continuous();
            lp.new_constraint([(x, rat(1))], ConstraintSense::Ge, rat(hi + gap));
            lp.new_constraint([(x, rat(1))], ConstraintSense::Le, rat(hi));

            prop_assert_eq!(lp.solve(), LPResult::Infeasible);
        }
    }
}

#[cfg(test)]
mod simplex_optimality_properties {
    use super::*;

    proptest! {
        /// Test that optimal solution satisfies all constraints
        #[test]
        fn simplex_solution_satisfies_constraints(
            c1 in lp_coeff_strategy(),
            c2 in lp_coeff_strategy(),
            b in positive_coeff_strategy(),
            e in 0i64..3
        ) {
            // maximize c1*x1 + c2*x2 subject to x1 + x2 <= b, x1 - x2 = e - 1 (when feasible)
            let mut lp = LPSolver::new();
            let x1 = lp.new_continuous();
            let x2 = lp.new_continuous();

            lp.set_objective(x1, rat(c1));
            lp.set_objective(x2, rat(c2));
            lp.set_direction(OptDir::Maximize);

            lp.new_constraint([(x1, rat(1)), (x2, rat(1))], ConstraintSense::Le, rat(b));
            lp.new_constraint([(x1, rat(1)), (x2, rat(-1))], ConstraintSense::Eq, rat(e - 1));

            if let LPResult::Optimal { values, .. } = lp.solve() {
                let val1 = values[&x1].clone();
                let val2 = values[&x2].clone();

                // Check non-negativity (implicit lower bound is 0)
                prop_assert!(val1 >= BigRational::zero());
                prop_assert!(val2 >= BigRational::zero());

                // Check constraint satisfaction
                prop_assert!(&val1 + &val2 <= rat(b));
                prop_assert_eq!(&val1 - &val2, rat(e - 1));
            }
        }

        /// Test that minimizing is equivalent to maximizing negative
        #[test]
        fn simplex_min_equals_max_negative(
            c in lp_coeff_strategy(),
            bound in positive_coeff_strategy()
        ) {
            let mut lp_min = LPSolver::new();
            let x1 = lp_min.new_continuous();
            lp_min.set_objective(x1, rat(c));
            lp_min.set_direction(OptDir::Minimize);
            lp_min.new_constraint([(x1, rat(1))], ConstraintSense::Le, rat(bound));

            let mut lp_max = LPSolver::new();
            let x2 = lp_max.new_continuous();
            lp_max.set_objective(x2, rat(-c));
            lp_max.set_direction(OptDir::Maximize);
            lp_max.new_constraint([(x2, rat(1))], ConstraintSense::Le, rat(bound));

            match (lp_min.solve(), lp_max.solve()) {
                (
                    LPResult::Optimal { objective: val_min, .. },
                    LPResult::Optimal { objective: val_max, .. },
                ) => {
                    // min c*x = -max(-c*x), exactly
                    prop_assert!((&val_min + &val_max).abs().is_zero());
                }
                other => prop_assert!(false, "unexpected results {:?}", other),
            }
        }
    }
}

#[cfg(test)]
mod simplex_sensitivity_properties {
    use super::*;

    proptest! {
        /// Test that increasing RHS increases optimal value (for maximize)
        #[test]
        fn simplex_rhs_sensitivity(
            c in positive_coeff_strategy(),
            b1 in 1i64..5i64,
            delta in 1i64..5i64
        ) {
            let b2 = b1 + delta;

            let mut lp1 = LPSolver::new();
            let x1 = lp1.new_continuous();
            lp1.set_objective(x1, rat(c));
            lp1.set_direction(OptDir::Maximize);
            lp1.new_constraint([(x1, rat(1))], ConstraintSense::Le, rat(b1));

            let mut lp2 = LPSolver::new();
            let x2 = lp2.new_continuous();
            lp2.set_objective(x2, rat(c));
            lp2.set_direction(OptDir::Maximize);
            lp2.new_constraint([(x2, rat(1))], ConstraintSense::Le, rat(b2));

            if let (LPResult::Optimal { objective: val1, .. }, LPResult::Optimal { objective: val2, .. }) = (lp1.solve(), lp2.solve()) {
                prop_assert!(val2 >= val1);
            }
        }

        /// Tightening a `>=` threshold can only turn feasible into infeasible
        #[test]
        fn simplex_threshold_monotonicity(
            t1 in 0i64..6,
            delta in 0i64..6,
            cap in 0i64..8
        ) {
            let solve_with = |threshold: i64| {
                let mut lp = LPSolver::new();
                let x = lp.new_continuous();
                let y = lp.new_continuous();
                lp.new_constraint([(x, rat(1)), (y, rat(1))], ConstraintSense::Ge, rat(threshold));
                lp.new_constraint([(x, rat(1))], ConstraintSense::Le, rat(cap));
                lp.new_constraint([(y, rat(2)), (x, rat(-1))], ConstraintSense::Le, rat(0));
                lp.solve().is_optimal()
            };

            if solve_with(t1 + delta) {
                prop_assert!(solve_with(t1));
            }
        }
    }
}
