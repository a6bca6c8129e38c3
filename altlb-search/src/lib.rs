//! altlb Search - Proof Search for Alternation-Trading Lower Bounds
//!
//! An alternation-trading proof derives a contradiction from the assumption
//! that nondeterministic linear time fits in `n^c` time and small space. A
//! proof is a sequence of speedup and slowdown rules (an *annotation*); for
//! a fixed annotation and constant `c`, the existence of valid exponents is
//! a linear feasibility problem. This crate finds the largest `c` for which
//! some annotation of bounded length yields a feasible program.
//!
//! # Components
//!
//! - [`catalog`]: the closed set of rules and their adjacency
//! - [`annotation`]: validated rule sequences and their enumeration
//! - [`program`] and [`builder`]: the linear program for one query
//! - [`oracle`]: the pluggable feasibility backend
//! - [`probe`] and [`driver`]: parallel probing and the search state machine
//! - [`verify`], [`sweep`], [`report`]: witnesses, sweeps and results
//!
//! # Examples
//!
//! ```
//! use altlb_search::{RuleCatalog, SearchConfig, SearchDriver, SimplexOracle};
//!
//! let config = SearchConfig::new().with_max_length(3).with_epsilon(0.01);
//! let driver = SearchDriver::new(RuleCatalog::standard(), SimplexOracle::new(), config)?;
//! let report = driver.run()?;
//!
//! // The only annotation of length 3 proves exactly the constants up to sqrt(2).
//! let best = report.best_constant.unwrap_or_default();
//! assert!(best <= std::f64::consts::SQRT_2 && best > 1.4);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

#![deny(unsafe_code)]

pub mod annotation;
pub mod builder;
pub mod catalog;
pub mod config;
pub mod driver;
pub mod error;
pub mod oracle;
pub mod probe;
pub mod program;
pub mod report;
pub mod sweep;
pub mod verify;

pub use annotation::{Annotation, AnnotationEnumerator};
pub use builder::{ObjectiveMode, ProgramBuilder, ProgramLayout};
pub use catalog::{Alternation, CatalogChoice, Rule, RuleCatalog, RuleKind};
pub use config::SearchConfig;
pub use driver::{Phase, SearchDriver};
pub use error::{
    AnnotationError, CatalogError, ConfigError, Result, SearchError, SearchFailure,
};
pub use oracle::{FeasibilityOracle, InstabilityReason, OracleError, SimplexOracle, Verdict};
pub use probe::{Parallelism, ProbeOutcome, Prober};
pub use program::{Assignment, ConstraintViolation, LinearExpr, LinearProgram, Relation};
pub use report::{
    LineReport, ProbeRecord, RuleInstance, SearchOutcome, SearchReport, SearchStats,
    UnstableQuery, Witness, WitnessReport,
};
pub use sweep::{
    AnnotationRank, SweepConfig, SweepRow, rank_annotations, run_sweep, validate_sweep,
};
pub use verify::{VerifyError, verify_report, verify_witness, witness_from_report};
