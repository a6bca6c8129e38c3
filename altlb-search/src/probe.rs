//! Parallel probing of one constant over a candidate set.
//!
//! Every candidate annotation is an independent feasibility query. Queries
//! run on a rayon pool; an atomic holds the smallest candidate index found
//! feasible so far, and a task whose index is larger skips its query. A
//! second atomic holds the smallest index whose query failed. All indices
//! below either minimum are always decided, so the witness (or the error)
//! is the earliest in enumeration order regardless of scheduling.

use crate::annotation::Annotation;
use crate::builder::ProgramBuilder;
use crate::error::SearchError;
use crate::oracle::{FeasibilityOracle, InstabilityReason, OracleError, Verdict};
use crate::program::Assignment;
use crate::report::{SearchStats, UnstableQuery, Witness};
use altlb_math::rational::to_f64;
use num_rational::BigRational;
use rayon::ThreadPool;
use rayon::prelude::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Where queries run.
#[derive(Debug, Clone, Copy)]
pub enum Parallelism<'a> {
    /// One query after another on the calling thread
    Sequential,
    /// The global rayon pool
    Global,
    /// A dedicated pool
    Pool(&'a ThreadPool),
}

/// Everything learned by probing one constant.
#[derive(Debug, Clone, Default)]
pub struct ProbeOutcome {
    /// Earliest provable annotation, with its assignment
    pub witness: Option<Witness>,
    /// Every provable annotation, in order (only when collecting all)
    pub all_witnesses: Vec<Witness>,
    /// Undecided queries
    pub unstable: Vec<UnstableQuery>,
    /// Counters for this probe
    pub stats: SearchStats,
}

enum Task {
    Feasible(Assignment),
    Infeasible,
    Unstable(InstabilityReason),
    Skipped,
}

/// Runs the queries of one probe.
pub struct Prober<'a, O: FeasibilityOracle + ?Sized> {
    builder: ProgramBuilder<'a>,
    oracle: &'a O,
    parallelism: Parallelism<'a>,
    query_timeout: Option<Duration>,
    deadline: Option<(Instant, Duration)>,
}

impl<'a, O: FeasibilityOracle + ?Sized> Prober<'a, O> {
    /// Create a sequential prober.
    pub fn new(builder: ProgramBuilder<'a>, oracle: &'a O) -> Self {
        Self {
            builder,
            oracle,
            parallelism: Parallelism::Sequential,
            query_timeout: None,
            deadline: None,
        }
    }

    /// Choose where queries run.
    pub fn with_parallelism(mut self, parallelism: Parallelism<'a>) -> Self {
        self.parallelism = parallelism;
        self
    }

    /// Time limit handed to every oracle query.
    pub fn with_query_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.query_timeout = timeout;
        self
    }

    /// Abort with [`SearchError::DeadlineExceeded`] once `deadline` passes.
    pub fn with_deadline(mut self, deadline: Option<(Instant, Duration)>) -> Self {
        self.deadline = deadline;
        self
    }

    /// Find the earliest candidate provable at `constant`.
    pub fn probe(
        &self,
        candidates: &[Annotation],
        constant: &BigRational,
    ) -> Result<ProbeOutcome, SearchError> {
        self.run(candidates, constant, true)
    }

    /// Decide every candidate at `constant`, without cancellation.
    pub fn probe_all(
        &self,
        candidates: &[Annotation],
        constant: &BigRational,
    ) -> Result<ProbeOutcome, SearchError> {
        self.run(candidates, constant, false)
    }

    fn run(
        &self,
        candidates: &[Annotation],
        constant: &BigRational,
        first_only: bool,
    ) -> Result<ProbeOutcome, SearchError> {
        let best = AtomicUsize::new(usize::MAX);
        let failed_at = AtomicUsize::new(usize::MAX);

        let evaluate = |index: usize, annotation: &Annotation| -> Result<Task, SearchError> {
            if failed_at.load(Ordering::Acquire) < index
                || (first_only && best.load(Ordering::Acquire) < index)
            {
                return Ok(Task::Skipped);
            }
            if let Some((deadline, budget)) = self.deadline
                && Instant::now() >= deadline
            {
                failed_at.fetch_min(index, Ordering::AcqRel);
                return Err(SearchError::DeadlineExceeded(budget));
            }

            let program = self.builder.build(annotation, constant);
            match self.oracle.solve(&program, self.query_timeout) {
                Ok(Verdict::Feasible(assignment)) => {
                    best.fetch_min(index, Ordering::AcqRel);
                    Ok(Task::Feasible(assignment))
                }
                Ok(Verdict::Infeasible) => Ok(Task::Infeasible),
                Ok(Verdict::NumericallyUnstable(reason)) => {
                    warn!(
                        annotation = %annotation.compact(),
                        constant = to_f64(constant),
                        %reason,
                        "query undecided, treating as not provable"
                    );
                    Ok(Task::Unstable(reason))
                }
                Err(OracleError::Unavailable(message)) => {
                    failed_at.fetch_min(index, Ordering::AcqRel);
                    Err(SearchError::OracleUnavailable(message))
                }
            }
        };

        let results: Vec<Result<Task, SearchError>> = match self.parallelism {
            Parallelism::Sequential => {
                let mut results = Vec::with_capacity(candidates.len());
                for (index, annotation) in candidates.iter().enumerate() {
                    let result = evaluate(index, annotation);
                    let stop = match &result {
                        Ok(Task::Feasible(_)) => first_only,
                        Err(_) => true,
                        _ => false,
                    };
                    results.push(result);
                    if stop {
                        break;
                    }
                }
                results.resize_with(candidates.len(), || Ok(Task::Skipped));
                results
            }
            Parallelism::Global => candidates
                .par_iter()
                .enumerate()
                .map(|(index, annotation)| evaluate(index, annotation))
                .collect(),
            Parallelism::Pool(pool) => pool.install(|| {
                candidates
                    .par_iter()
                    .enumerate()
                    .map(|(index, annotation)| evaluate(index, annotation))
                    .collect()
            }),
        };

        let mut outcome = ProbeOutcome::default();
        outcome.stats.probes = 1;
        for (annotation, result) in candidates.iter().zip(results) {
            let task = match result {
                Ok(task) => task,
                // Failures after the earliest witness cannot change it.
                Err(_) if first_only && outcome.witness.is_some() => {
                    outcome.stats.skipped += 1;
                    continue;
                }
                Err(e) => return Err(e),
            };
            match task {
                Task::Feasible(assignment) => {
                    outcome.stats.queries += 1;
                    outcome.stats.feasible += 1;
                    let witness = Witness {
                        annotation: annotation.clone(),
                        constant: constant.clone(),
                        assignment,
                    };
                    if outcome.witness.is_none() {
                        outcome.witness = Some(witness.clone());
                    }
                    if !first_only {
                        outcome.all_witnesses.push(witness);
                    }
                }
                Task::Infeasible => {
                    outcome.stats.queries += 1;
                    outcome.stats.infeasible += 1;
                }
                Task::Unstable(reason) => {
                    outcome.stats.queries += 1;
                    outcome.stats.unstable += 1;
                    outcome.unstable.push(UnstableQuery {
                        annotation: annotation.compact(),
                        constant: to_f64(constant),
                        reason,
                    });
                }
                Task::Skipped => outcome.stats.skipped += 1,
            }
        }

        debug!(
            constant = to_f64(constant),
            queries = outcome.stats.queries,
            skipped = outcome.stats.skipped,
            witness = outcome.witness.as_ref().map(|w| w.annotation.compact()),
            "probe finished"
        );
        Ok(outcome)
    }
}
