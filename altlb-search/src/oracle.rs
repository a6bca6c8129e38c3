//! Feasibility Oracle.
//!
//! The search is written against [`FeasibilityOracle`] so any LP backend
//! can be plugged in. [`SimplexOracle`] is the bundled backend: the exact
//! rational simplex from `altlb-math`. Since it never rounds, it reports
//! instability only when a query runs out of time or pivots.

use crate::program::{Assignment, LinearProgram};
use altlb_math::LPResult;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::trace;

/// Why a query could not be decided.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum InstabilityReason {
    /// The per-query time limit expired
    Timeout,
    /// The iteration cap was reached
    IterationLimit,
    /// The solver reported an unbounded objective
    Unbounded,
}

impl fmt::Display for InstabilityReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Timeout => "timeout",
            Self::IterationLimit => "iteration limit",
            Self::Unbounded => "unbounded",
        })
    }
}

/// Answer to a single feasibility query.
#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    /// A satisfying assignment, indexed like the program's variables
    Feasible(Assignment),
    /// No assignment exists
    Infeasible,
    /// Undecided; treated as not provable by the search
    NumericallyUnstable(InstabilityReason),
}

impl Verdict {
    /// Whether the verdict carries a satisfying assignment.
    pub fn is_feasible(&self) -> bool {
        matches!(self, Self::Feasible(_))
    }
}

/// The oracle cannot answer any query.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OracleError {
    #[error("{0}")]
    Unavailable(String),
}

/// Decides feasibility of linear programs. Shared across worker threads.
pub trait FeasibilityOracle: Send + Sync {
    /// Backend name for logs and reports.
    fn name(&self) -> &str;

    /// Decide `program` within `timeout`.
    fn solve(
        &self,
        program: &LinearProgram,
        timeout: Option<Duration>,
    ) -> Result<Verdict, OracleError>;
}

impl<T: FeasibilityOracle + ?Sized> FeasibilityOracle for &T {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn solve(
        &self,
        program: &LinearProgram,
        timeout: Option<Duration>,
    ) -> Result<Verdict, OracleError> {
        (**self).solve(program, timeout)
    }
}

impl<T: FeasibilityOracle + ?Sized> FeasibilityOracle for Arc<T> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn solve(
        &self,
        program: &LinearProgram,
        timeout: Option<Duration>,
    ) -> Result<Verdict, OracleError> {
        (**self).solve(program, timeout)
    }
}

/// Exact two-phase simplex backend.
#[derive(Debug, Clone)]
pub struct SimplexOracle {
    max_pivots: usize,
}

impl Default for SimplexOracle {
    fn default() -> Self {
        Self {
            max_pivots: 100_000,
        }
    }
}

impl SimplexOracle {
    /// Create an oracle with the default pivot cap.
    pub fn new() -> Self {
        Self::default()
    }

    /// Cap the pivots per phase.
    pub fn with_max_pivots(mut self, max_pivots: usize) -> Self {
        self.max_pivots = max_pivots;
        self
    }
}

impl FeasibilityOracle for SimplexOracle {
    fn name(&self) -> &str {
        "exact-simplex"
    }

    fn solve(
        &self,
        program: &LinearProgram,
        timeout: Option<Duration>,
    ) -> Result<Verdict, OracleError> {
        let start = Instant::now();
        let mut lp = program.to_solver();
        lp.set_max_pivots(self.max_pivots);
        if let Some(limit) = timeout {
            lp.set_time_limit(limit);
        }

        let result = lp.solve();
        trace!(
            program = program.name(),
            rows = lp.stats().rows,
            cols = lp.stats().cols,
            pivots = lp.stats().phase_one_pivots + lp.stats().phase_two_pivots,
            "simplex finished"
        );

        Ok(match result {
            LPResult::Optimal { values, .. } => Verdict::Feasible(Assignment::from_solver(
                program.variables().len(),
                &values,
            )),
            LPResult::Infeasible => Verdict::Infeasible,
            LPResult::Unbounded => Verdict::NumericallyUnstable(InstabilityReason::Unbounded),
            LPResult::Unknown => {
                let timed_out = timeout.is_some_and(|limit| start.elapsed() >= limit);
                Verdict::NumericallyUnstable(if timed_out {
                    InstabilityReason::Timeout
                } else {
                    InstabilityReason::IterationLimit
                })
            }
        })
    }
}
