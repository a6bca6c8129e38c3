//! Property-based tests for altlb-math
//!
//! This module contains property tests for:
//! - Simplex LP solver correctness
//! - Exactness of the float/rational conversions

mod rational_properties;
mod simplex_properties;
