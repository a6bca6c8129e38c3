//! Proof Search Driver.
//!
//! Finds the largest constant provable by some annotation of bounded length.
//! Provability is monotone in the constant, so the driver first doubles from
//! the initial constant until a probe fails (halving instead when the
//! initial constant is already unprovable), then bisects the bracket.
//!
//! ```text
//! Init ──provable──▶ Doubling ──unprovable──▶ Bracketed ──▶ BinarySearch ──▶ Done
//!   │                  ▲  │
//!   │                  │  └──cap reached──▶ Done (saturated)
//!   └──unprovable──▶ DownwardFallback ──cap reached──▶ Exhausted
//! ```

use crate::annotation::Annotation;
use crate::builder::ProgramBuilder;
use crate::catalog::RuleCatalog;
use crate::config::SearchConfig;
use crate::error::{ConfigError, Result, SearchError, SearchFailure};
use crate::oracle::FeasibilityOracle;
use crate::probe::{Parallelism, ProbeOutcome, Prober};
use crate::report::{
    ProbeRecord, SearchOutcome, SearchReport, SearchStats, UnstableQuery, Witness,
};
use altlb_math::rational::from_f64;
use rayon::ThreadPool;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Phase of the search state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Probing the initial constant
    Init,
    /// Halving after the initial constant failed
    DownwardFallback,
    /// Doubling while probes succeed
    Doubling,
    /// A provable and an unprovable constant are known
    Bracketed,
    /// Bisecting the bracket
    BinarySearch,
    /// Finished with a proven constant
    Done,
    /// Finished without any proven constant
    Exhausted,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Init => "init",
            Self::DownwardFallback => "downward-fallback",
            Self::Doubling => "doubling",
            Self::Bracketed => "bracketed",
            Self::BinarySearch => "binary-search",
            Self::Done => "done",
            Self::Exhausted => "exhausted",
        })
    }
}

/// A proven constant and its witness.
#[derive(Debug, Clone)]
struct Proven {
    constant: f64,
    witness: Witness,
}

/// State of the machine, with the data each phase owns.
#[derive(Debug, Clone)]
enum State {
    Init,
    DownwardFallback {
        ceiling: f64,
        halvings: usize,
    },
    Doubling {
        floor: Proven,
        ceiling: Option<f64>,
        doublings: usize,
    },
    Bracketed {
        floor: Proven,
        ceiling: f64,
    },
    BinarySearch {
        floor: Proven,
        ceiling: f64,
        bisections: usize,
    },
    Done {
        floor: Proven,
        ceiling: Option<f64>,
    },
    Exhausted {
        ceiling: f64,
    },
}

impl State {
    fn phase(&self) -> Phase {
        match self {
            Self::Init => Phase::Init,
            Self::DownwardFallback { .. } => Phase::DownwardFallback,
            Self::Doubling { .. } => Phase::Doubling,
            Self::Bracketed { .. } => Phase::Bracketed,
            Self::BinarySearch { .. } => Phase::BinarySearch,
            Self::Done { .. } => Phase::Done,
            Self::Exhausted { .. } => Phase::Exhausted,
        }
    }

    fn floor(&self) -> Option<&Proven> {
        match self {
            Self::Doubling { floor, .. }
            | Self::Bracketed { floor, .. }
            | Self::BinarySearch { floor, .. }
            | Self::Done { floor, .. } => Some(floor),
            _ => None,
        }
    }

    fn ceiling(&self) -> Option<f64> {
        match self {
            Self::Init => None,
            Self::DownwardFallback { ceiling, .. }
            | Self::Bracketed { ceiling, .. }
            | Self::BinarySearch { ceiling, .. }
            | Self::Exhausted { ceiling } => Some(*ceiling),
            Self::Doubling { ceiling, .. } | Self::Done { ceiling, .. } => *ceiling,
        }
    }
}

/// Bookkeeping of one run.
struct Run<'c> {
    candidates: &'c [Annotation],
    max_length: usize,
    started: Instant,
    deadline: Option<(Instant, Duration)>,
    probes: Vec<ProbeRecord>,
    unstable: Vec<UnstableQuery>,
    stats: SearchStats,
}

/// Drives the search for the best provable constant.
pub struct SearchDriver<O: FeasibilityOracle> {
    catalog: RuleCatalog,
    oracle: O,
    config: SearchConfig,
    pool: Option<ThreadPool>,
}

impl<O: FeasibilityOracle> SearchDriver<O> {
    /// Create a driver. Fails on an invalid configuration.
    pub fn new(catalog: RuleCatalog, oracle: O, config: SearchConfig) -> Result<Self> {
        config.validate()?;
        let pool = if config.threads > 1 {
            Some(
                rayon::ThreadPoolBuilder::new()
                    .num_threads(config.threads)
                    .thread_name(|i| format!("altlb-worker-{i}"))
                    .build()
                    .map_err(|e| ConfigError::ThreadPool(e.to_string()))?,
            )
        } else {
            None
        };

        Ok(Self {
            catalog,
            oracle,
            config,
            pool,
        })
    }

    /// Catalog in use.
    pub fn catalog(&self) -> &RuleCatalog {
        &self.catalog
    }

    /// Configuration in use.
    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    /// Oracle in use.
    pub fn oracle(&self) -> &O {
        &self.oracle
    }

    /// Every admissible annotation up to `max_length`, in enumeration order.
    pub fn annotations(&self, max_length: usize) -> Vec<Annotation> {
        self.catalog.enumerate(max_length).collect()
    }

    fn prober(&self, deadline: Option<(Instant, Duration)>) -> Prober<'_, O> {
        let parallelism = match (&self.pool, self.config.threads) {
            (Some(pool), _) => Parallelism::Pool(pool),
            (None, 1) => Parallelism::Sequential,
            (None, _) => Parallelism::Global,
        };
        let builder = ProgramBuilder::new(&self.catalog).with_objective(self.config.objective);
        Prober::new(builder, &self.oracle)
            .with_parallelism(parallelism)
            .with_query_timeout(self.config.query_timeout())
            .with_deadline(deadline)
    }

    fn probe_once(&self, candidates: &[Annotation], constant: f64) -> Result<ProbeOutcome> {
        let deadline = self
            .config
            .total_timeout()
            .map(|budget| (Instant::now() + budget, budget));
        match from_f64(constant) {
            Some(exact) => self.prober(deadline).probe(candidates, &exact),
            None => Ok(ProbeOutcome::default()),
        }
    }

    /// Whether some annotation of length at most `max_length` proves `constant`.
    ///
    /// Returns the earliest such annotation in enumeration order.
    pub fn is_provable(&self, constant: f64, max_length: usize) -> Result<Option<Witness>> {
        let candidates = self.annotations(max_length);
        Ok(self.probe_once(&candidates, constant)?.witness)
    }

    /// Every annotation of length at most `max_length` that proves `constant`.
    pub fn witnesses_at(&self, constant: f64, max_length: usize) -> Result<Vec<Witness>> {
        let candidates = self.annotations(max_length);
        let deadline = self
            .config
            .total_timeout()
            .map(|budget| (Instant::now() + budget, budget));
        match from_f64(constant) {
            Some(exact) => Ok(self
                .prober(deadline)
                .probe_all(&candidates, &exact)?
                .all_witnesses),
            None => Ok(Vec::new()),
        }
    }

    /// Search over every annotation up to the configured maximum length.
    pub fn run(&self) -> std::result::Result<SearchReport, SearchFailure> {
        let candidates = self.annotations(self.config.max_length);
        info!(
            catalog = self.catalog.name(),
            alpha = self.catalog.alpha_f64(),
            max_length = self.config.max_length,
            candidates = candidates.len(),
            oracle = self.oracle.name(),
            "starting proof search"
        );
        self.search(&candidates, self.config.max_length)
    }

    /// Search restricted to a single annotation; yields its supremum.
    pub fn search_annotation(
        &self,
        annotation: &Annotation,
    ) -> std::result::Result<SearchReport, SearchFailure> {
        debug!(annotation = %annotation, "searching single annotation");
        self.search(std::slice::from_ref(annotation), annotation.len())
    }

    fn search(
        &self,
        candidates: &[Annotation],
        max_length: usize,
    ) -> std::result::Result<SearchReport, SearchFailure> {
        let started = Instant::now();
        let mut run = Run {
            candidates,
            max_length,
            started,
            deadline: self
                .config
                .total_timeout()
                .map(|budget| (started + budget, budget)),
            probes: Vec::new(),
            unstable: Vec::new(),
            stats: SearchStats::default(),
        };

        let mut state = State::Init;
        loop {
            if matches!(state, State::Done { .. } | State::Exhausted { .. }) {
                break;
            }
            match self.step(&state, &mut run) {
                Ok(next) => {
                    if next.phase() != state.phase() {
                        info!(
                            from = %state.phase(),
                            to = %next.phase(),
                            floor = next.floor().map(|p| p.constant),
                            ceiling = next.ceiling(),
                            "phase transition"
                        );
                    }
                    state = next;
                }
                Err(error) => {
                    let partial = self.report(&state, run, SearchOutcome::Aborted);
                    return Err(SearchFailure {
                        error,
                        partial: Box::new(partial),
                    });
                }
            }
        }

        let outcome = match state {
            State::Done { .. } => SearchOutcome::Done,
            _ => SearchOutcome::Exhausted,
        };
        let report = self.report(&state, run, outcome);
        info!(
            outcome = ?report.outcome,
            best = report.best_constant,
            witness = report.witness.as_ref().map(|w| w.compact.as_str()),
            saturated = report.saturated,
            "proof search finished"
        );
        Ok(report)
    }

    /// Probe `constant`, recording the probe.
    fn probe(&self, run: &mut Run<'_>, phase: Phase, constant: f64) -> Result<Option<Witness>> {
        if let Some((deadline, budget)) = run.deadline
            && Instant::now() >= deadline
        {
            return Err(SearchError::DeadlineExceeded(budget));
        }
        let outcome = match from_f64(constant) {
            Some(exact) => self
                .prober(run.deadline)
                .probe(run.candidates, &exact)?,
            None => ProbeOutcome::default(),
        };

        debug!(
            %phase,
            constant,
            provable = outcome.witness.is_some(),
            "probed constant"
        );
        run.stats.absorb(&outcome.stats);
        run.unstable.extend(outcome.unstable);
        run.probes.push(ProbeRecord {
            phase,
            constant,
            provable: outcome.witness.is_some(),
            witness: outcome.witness.as_ref().map(|w| w.annotation.compact()),
            queries: outcome.stats.queries,
        });
        Ok(outcome.witness)
    }

    fn step(&self, state: &State, run: &mut Run<'_>) -> Result<State> {
        let config = &self.config;
        Ok(match state {
            State::Init => {
                let constant = config.initial_constant;
                match self.probe(run, Phase::Init, constant)? {
                    Some(witness) => State::Doubling {
                        floor: Proven { constant, witness },
                        ceiling: None,
                        doublings: 0,
                    },
                    None => State::DownwardFallback {
                        ceiling: constant,
                        halvings: 0,
                    },
                }
            }

            State::DownwardFallback { ceiling, halvings } => {
                if *halvings >= config.max_halvings {
                    return Ok(State::Exhausted { ceiling: *ceiling });
                }
                let constant = ceiling / 2.0;
                match self.probe(run, Phase::DownwardFallback, constant)? {
                    // The old ceiling is already known unprovable and is never probed again.
                    Some(witness) => State::Doubling {
                        floor: Proven { constant, witness },
                        ceiling: Some(*ceiling),
                        doublings: 0,
                    },
                    None => State::DownwardFallback {
                        ceiling: constant,
                        halvings: halvings + 1,
                    },
                }
            }

            State::Doubling {
                floor,
                ceiling,
                doublings,
            } => {
                let constant = floor.constant * 2.0;
                if let Some(ceiling) = *ceiling
                    && constant >= ceiling
                {
                    return Ok(State::Bracketed {
                        floor: floor.clone(),
                        ceiling,
                    });
                }
                if *doublings >= config.max_doublings || !constant.is_finite() {
                    return Ok(State::Done {
                        floor: floor.clone(),
                        ceiling: None,
                    });
                }
                match self.probe(run, Phase::Doubling, constant)? {
                    Some(witness) => State::Doubling {
                        floor: Proven { constant, witness },
                        ceiling: *ceiling,
                        doublings: doublings + 1,
                    },
                    None => State::Bracketed {
                        floor: floor.clone(),
                        ceiling: constant,
                    },
                }
            }

            State::Bracketed { floor, ceiling } => State::BinarySearch {
                floor: floor.clone(),
                ceiling: *ceiling,
                bisections: 0,
            },

            State::BinarySearch {
                floor,
                ceiling,
                bisections,
            } => {
                let capped = config.max_bisections.is_some_and(|cap| *bisections >= cap);
                if ceiling - floor.constant < config.epsilon || capped {
                    return Ok(State::Done {
                        floor: floor.clone(),
                        ceiling: Some(*ceiling),
                    });
                }
                let constant = floor.constant + (ceiling - floor.constant) / 2.0;
                // Adjacent floats: the bracket cannot shrink any further.
                if constant <= floor.constant || constant >= *ceiling {
                    return Ok(State::Done {
                        floor: floor.clone(),
                        ceiling: Some(*ceiling),
                    });
                }
                match self.probe(run, Phase::BinarySearch, constant)? {
                    Some(witness) => State::BinarySearch {
                        floor: Proven { constant, witness },
                        ceiling: *ceiling,
                        bisections: bisections + 1,
                    },
                    None => State::BinarySearch {
                        floor: floor.clone(),
                        ceiling: constant,
                        bisections: bisections + 1,
                    },
                }
            }

            State::Done { .. } | State::Exhausted { .. } => state.clone(),
        })
    }

    fn report(&self, state: &State, run: Run<'_>, outcome: SearchOutcome) -> SearchReport {
        let floor = state.floor();
        SearchReport {
            outcome,
            catalog: self.catalog.name().to_string(),
            alpha: self.catalog.alpha_f64(),
            oracle: self.oracle.name().to_string(),
            max_length: run.max_length,
            annotations: run.candidates.len(),
            best_constant: floor.map(|p| p.constant),
            unprovable_constant: state.ceiling(),
            saturated: matches!(state, State::Done { ceiling: None, .. }),
            witness: floor.map(|p| p.witness.to_report()),
            probes: run.probes,
            unstable_queries: run.unstable,
            stats: run.stats,
            elapsed_ms: run.started.elapsed().as_millis() as u64,
        }
    }
}
