//! Error types shared across the search crate.

use crate::catalog::RuleKind;
use crate::report::SearchReport;
use std::time::Duration;
use thiserror::Error;

/// Errors raised while constructing a rule catalog
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CatalogError {
    #[error("catalog has no initial rule")]
    NoInitialRule,
    #[error("catalog has no terminal rule")]
    NoTerminalRule,
    #[error("`Open` may only start an annotation, but it follows {0}")]
    OpenNotInitial(RuleKind),
    #[error("slowdown weight must be finite and positive, got {0}")]
    InvalidAlpha(f64),
    #[error("unknown catalog `{0}` (expected `standard` or `two-step`)")]
    UnknownCatalog(String),
}

/// Reasons a rule sequence is not a valid annotation
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AnnotationError {
    #[error("annotation is empty")]
    Empty,
    #[error("rule {kind} at position {position} is not in the catalog")]
    UnknownKind { position: usize, kind: RuleKind },
    #[error("annotation may not start with {0}")]
    NotInitial(RuleKind),
    #[error("annotation may not end with {0}")]
    NotTerminal(RuleKind),
    #[error("{to} may not follow {from} (position {position})")]
    IllegalAdjacency {
        position: usize,
        from: RuleKind,
        to: RuleKind,
    },
    #[error("quantifier depth {depth} after position {position} is not admissible")]
    Depth { position: usize, depth: i32 },
    #[error("unknown rule symbol `{0}` (expected `O`, `+` or `-`)")]
    Symbol(char),
}

/// Invalid search configuration
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("max_length must be at least 1")]
    ZeroLength,
    #[error("initial_constant must be finite and positive, got {0}")]
    InitialConstant(f64),
    #[error("epsilon must be finite and positive, got {0}")]
    Epsilon(f64),
    #[error("a sweep needs at least one weight and one length")]
    EmptySweep,
    #[error("failed to build thread pool: {0}")]
    ThreadPool(String),
}

/// Errors that abort a search run
#[derive(Error, Debug, Clone)]
pub enum SearchError {
    #[error("feasibility oracle unavailable: {0}")]
    OracleUnavailable(String),
    #[error("search deadline of {0:?} exceeded")]
    DeadlineExceeded(Duration),
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("invalid catalog: {0}")]
    Catalog(#[from] CatalogError),
}

/// A fatal error together with everything established before it
#[derive(Error, Debug, Clone)]
#[error("search aborted: {error}")]
pub struct SearchFailure {
    #[source]
    pub error: SearchError,
    pub partial: Box<SearchReport>,
}

/// Result type for search operations
pub type Result<T> = std::result::Result<T, SearchError>;
