//! altlb Math - Exact Linear Programming
//!
//! This crate provides the arithmetic foundation of the altlb proof search:
//! - [`lp_core::LPSolver`], a two-phase primal simplex over arbitrary
//!   precision rationals with wall-clock and iteration limits
//! - [`lp::Tableau`], the dense pivoting kernel used by the solver
//! - [`rational`] helpers for moving between `f64` and [`BigRational`]
//!
//! # Examples
//!
//! ```
//! use altlb_math::lp_core::{ConstraintSense, LPResult, LPSolver, OptDir};
//! use altlb_math::rational::rat;
//!
//! // maximize x + y subject to x + 2y <= 4, 3x + y <= 6
//! let mut lp = LPSolver::new();
//! let x = lp.new_continuous();
//! let y = lp.new_continuous();
//! lp.set_objective(x, rat(1));
//! lp.set_objective(y, rat(1));
//! lp.set_direction(OptDir::Maximize);
//! lp.new_constraint([(x, rat(1)), (y, rat(2))], ConstraintSense::Le, rat(4));
//! lp.new_constraint([(x, rat(3)), (y, rat(1))], ConstraintSense::Le, rat(6));
//!
//! match lp.solve() {
//!     LPResult::Optimal { objective, .. } => assert_eq!(objective, rat(14) / rat(5)),
//!     other => panic!("unexpected result: {other:?}"),
//! }
//! ```
//!
//! [`BigRational`]: num_rational::BigRational

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod lp;
pub mod lp_core;
pub mod rational;

pub use lp::{PivotLimits, PivotOutcome, Tableau, TableauStats};
pub use lp_core::{ConstraintSense, LPResult, LPSolver, LPStats, OptDir};
