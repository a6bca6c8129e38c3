//! Search results.
//!
//! [`SearchReport`] is the serializable record of a run: the outcome, the
//! best proven constant with its witness, every probe in order, every
//! query the oracle could not decide, and counters. Witness assignments
//! are stored as exact rationals (`p/q` strings) so a report can be
//! re-verified without loss.

use crate::annotation::Annotation;
use crate::builder::ProgramLayout;
use crate::catalog::RuleKind;
use crate::driver::Phase;
use crate::oracle::InstabilityReason;
use crate::program::Assignment;
use altlb_math::rational::to_f64;
use num_rational::BigRational;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A proof: an annotation whose program is feasible at `constant`.
#[derive(Debug, Clone, PartialEq)]
pub struct Witness {
    /// Annotation
    pub annotation: Annotation,
    /// Constant proven, exact
    pub constant: BigRational,
    /// Satisfying assignment, indexed by [`ProgramLayout`]
    pub assignment: Assignment,
}

impl Witness {
    /// Proven constant as a float.
    pub fn constant_f64(&self) -> f64 {
        to_f64(&self.constant)
    }

    /// Serializable form with the full line table.
    pub fn to_report(&self) -> WitnessReport {
        let layout = ProgramLayout::for_annotation(&self.annotation);
        let names = layout.names();
        let value = |var: usize| self.assignment.get(var).map_or(0.0, to_f64);

        let rules = self
            .annotation
            .kinds()
            .iter()
            .enumerate()
            .map(|(position, &kind)| {
                let mut parameters = BTreeMap::new();
                if let Some(x) = layout.x(position + 1) {
                    parameters.insert("x".to_string(), value(x));
                }
                RuleInstance {
                    position,
                    kind,
                    parameters,
                }
            })
            .collect();

        let lines = self
            .annotation
            .depth_profile()
            .into_iter()
            .enumerate()
            .map(|(index, depth)| LineReport {
                index,
                depth,
                a: (0..layout.width()).map(|k| value(layout.a(index, k))).collect(),
                b: (0..layout.width()).map(|k| value(layout.b(index, k))).collect(),
            })
            .collect();

        let assignment = names
            .into_iter()
            .zip(self.assignment.values())
            .map(|(name, value)| (name, value.to_string()))
            .collect();

        WitnessReport {
            annotation: self.annotation.kinds().to_vec(),
            compact: self.annotation.compact(),
            constant: self.constant_f64(),
            constant_exact: self.constant.to_string(),
            rules,
            lines,
            assignment,
        }
    }
}

/// One rule of a witness with its parameter values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleInstance {
    /// Position in the annotation
    pub position: usize,
    /// Rule kind
    pub kind: RuleKind,
    /// Parameter values by name
    pub parameters: BTreeMap<String, f64>,
}

/// Exponents of one line of a witness.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineReport {
    /// Line index
    pub index: usize,
    /// Quantifier depth
    pub depth: i32,
    /// Time exponents `a[index][k]`
    pub a: Vec<f64>,
    /// Block exponents `b[index][k]`
    pub b: Vec<f64>,
}

/// Serializable witness.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WitnessReport {
    /// Rule kinds
    pub annotation: Vec<RuleKind>,
    /// Compact annotation
    pub compact: String,
    /// Constant proven
    pub constant: f64,
    /// Constant proven, as `p/q`
    pub constant_exact: String,
    /// Rules with parameters
    pub rules: Vec<RuleInstance>,
    /// Line table
    pub lines: Vec<LineReport>,
    /// Exact value of every variable, as `p/q`
    pub assignment: BTreeMap<String, String>,
}

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchOutcome {
    /// A constant was proven and the bracket closed (or saturated)
    Done,
    /// No constant could be proven
    Exhausted,
    /// A fatal error stopped the run
    Aborted,
}

/// One probed constant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbeRecord {
    /// Phase that issued the probe
    pub phase: Phase,
    /// Constant probed
    pub constant: f64,
    /// Whether some annotation proved it
    pub provable: bool,
    /// Compact form of the proving annotation
    pub witness: Option<String>,
    /// Oracle queries issued
    pub queries: usize,
}

/// A query the oracle could not decide.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnstableQuery {
    /// Compact annotation
    pub annotation: String,
    /// Constant queried
    pub constant: f64,
    /// Reason
    pub reason: InstabilityReason,
}

/// Counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchStats {
    /// Constants probed
    pub probes: usize,
    /// Oracle queries issued
    pub queries: usize,
    /// Feasible verdicts
    pub feasible: usize,
    /// Infeasible verdicts
    pub infeasible: usize,
    /// Undecided verdicts
    pub unstable: usize,
    /// Queries skipped after an earlier annotation succeeded
    pub skipped: usize,
}

impl SearchStats {
    /// Add another set of counters.
    pub fn absorb(&mut self, other: &SearchStats) {
        self.probes += other.probes;
        self.queries += other.queries;
        self.feasible += other.feasible;
        self.infeasible += other.infeasible;
        self.unstable += other.unstable;
        self.skipped += other.skipped;
    }
}

/// Result of a search run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchReport {
    /// Outcome
    pub outcome: SearchOutcome,
    /// Catalog name
    pub catalog: String,
    /// Slowdown weight
    pub alpha: f64,
    /// Oracle backend
    pub oracle: String,
    /// Longest annotation considered
    pub max_length: usize,
    /// Number of candidate annotations
    pub annotations: usize,
    /// Largest constant proven
    pub best_constant: Option<f64>,
    /// Smallest constant known unprovable
    pub unprovable_constant: Option<f64>,
    /// The doubling cap was hit with every probe provable
    pub saturated: bool,
    /// Witness for `best_constant`
    pub witness: Option<WitnessReport>,
    /// Probes in order
    pub probes: Vec<ProbeRecord>,
    /// Undecided queries
    pub unstable_queries: Vec<UnstableQuery>,
    /// Counters
    pub stats: SearchStats,
    /// Wall-clock time in milliseconds
    pub elapsed_ms: u64,
}

impl SearchReport {
    /// Serialize as pretty JSON.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Parse a report written by [`SearchReport::to_json`].
    pub fn from_json(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }

    /// Constants probed, in order.
    pub fn probed_constants(&self) -> Vec<f64> {
        self.probes.iter().map(|probe| probe.constant).collect()
    }
}
