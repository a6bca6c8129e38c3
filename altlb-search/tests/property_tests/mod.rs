//! Property-based tests for altlb-search
//!
//! This module contains property tests for:
//! - Admissibility of enumerated annotations
//! - Monotonicity of provability in the constant and in the length
//! - Soundness of returned witnesses

mod enumeration_properties;
mod search_properties;
