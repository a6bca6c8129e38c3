//! Simplex kernel.
//!
//! [`Tableau`] holds a dense simplex tableau in exact arithmetic and
//! implements primal pivoting with Bland's rule. Model building and the
//! two-phase driver live in [`crate::lp_core`].

pub mod tableau;

pub use tableau::{PivotLimits, PivotOutcome, Tableau, TableauStats};

/// Column identifier inside a tableau.
pub type ColId = usize;
