//! Property-based testing entry point for altlb-math
//!
//! Run with: cargo test --test property_based

mod property_tests;
