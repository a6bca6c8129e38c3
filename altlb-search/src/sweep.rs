//! Parameter sweeps and per-annotation rankings.
//!
//! A sweep runs the driver for every combination of slowdown weight and
//! maximum proof length and records the best constant together with every
//! annotation that ties it. A ranking computes the supremum of each
//! annotation of one length separately and sorts them best first.

use crate::catalog::CatalogChoice;
use crate::config::SearchConfig;
use crate::driver::SearchDriver;
use crate::error::{ConfigError, Result};
use crate::oracle::FeasibilityOracle;
use crate::report::SearchOutcome;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Configuration of a sweep
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SweepConfig {
    /// Catalog to instantiate for every weight
    pub catalog: CatalogChoice,
    /// Slowdown weights
    pub alphas: Vec<f64>,
    /// Maximum proof lengths
    pub lengths: Vec<usize>,
    /// Settings shared by every run; `max_length` is overridden
    pub search: SearchConfig,
    /// List every annotation that reaches the best constant
    pub collect_ties: bool,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            catalog: CatalogChoice::Standard,
            alphas: vec![1.0],
            lengths: vec![3, 5, 7],
            search: SearchConfig::default(),
            collect_ties: true,
        }
    }
}

/// One cell of a sweep
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepRow {
    /// Slowdown weight
    pub alpha: f64,
    /// Maximum proof length
    pub max_length: usize,
    /// Outcome of the run
    pub outcome: SearchOutcome,
    /// Best constant proven
    pub best_constant: Option<f64>,
    /// Doubling cap reached
    pub saturated: bool,
    /// Earliest proving annotation
    pub witness: Option<String>,
    /// Every annotation provable at the best constant, in enumeration order
    pub ties: Vec<String>,
    /// Probes issued
    pub probes: usize,
    /// Wall-clock time in milliseconds
    pub elapsed_ms: u64,
}

/// Supremum of a single annotation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnotationRank {
    /// Compact annotation
    pub annotation: String,
    /// Best constant proven
    pub best_constant: Option<f64>,
    /// Smallest constant known unprovable
    pub unprovable_constant: Option<f64>,
}

/// Run the driver over every `(alpha, length)` pair, weights outermost.
pub fn run_sweep<O: FeasibilityOracle>(oracle: &O, config: &SweepConfig) -> Result<Vec<SweepRow>> {
    let mut rows = Vec::with_capacity(config.alphas.len() * config.lengths.len());

    for &alpha in &config.alphas {
        let catalog = config.catalog.build().with_alpha(alpha)?;
        for &max_length in &config.lengths {
            let search = config.search.clone().with_max_length(max_length);
            let driver = SearchDriver::new(catalog.clone(), oracle, search)?;
            let report = driver.run().map_err(|failure| {
                warn!(
                    alpha,
                    max_length,
                    best = failure.partial.best_constant,
                    "sweep run aborted"
                );
                failure.error
            })?;

            let ties = match (config.collect_ties, report.best_constant) {
                (true, Some(best)) => driver
                    .witnesses_at(best, max_length)?
                    .into_iter()
                    .map(|witness| witness.annotation.compact())
                    .collect(),
                _ => Vec::new(),
            };

            info!(
                alpha,
                max_length,
                best = report.best_constant,
                ties = ties.len(),
                "sweep cell finished"
            );
            rows.push(SweepRow {
                alpha,
                max_length,
                outcome: report.outcome,
                best_constant: report.best_constant,
                saturated: report.saturated,
                witness: report.witness.map(|w| w.compact),
                ties,
                probes: report.probes.len(),
                elapsed_ms: report.elapsed_ms,
            });
        }
    }

    Ok(rows)
}

/// Supremum of every annotation of exactly `length`, best first.
///
/// Annotations with equal suprema keep their enumeration order.
pub fn rank_annotations<O: FeasibilityOracle>(
    driver: &SearchDriver<O>,
    length: usize,
) -> Result<Vec<AnnotationRank>> {
    let mut ranks = Vec::new();
    for annotation in driver
        .annotations(length)
        .into_iter()
        .filter(|a| a.len() == length)
    {
        let report = driver
            .search_annotation(&annotation)
            .map_err(|failure| failure.error)?;
        ranks.push(AnnotationRank {
            annotation: annotation.compact(),
            best_constant: report.best_constant,
            unprovable_constant: report.unprovable_constant,
        });
    }

    let key = |rank: &AnnotationRank| rank.best_constant.unwrap_or(f64::NEG_INFINITY);
    ranks.sort_by(|a, b| key(b).total_cmp(&key(a)));
    Ok(ranks)
}

/// Reject sweeps that would run nothing.
pub fn validate_sweep(config: &SweepConfig) -> Result<()> {
    if config.alphas.is_empty() || config.lengths.is_empty() {
        return Err(ConfigError::EmptySweep.into());
    }
    config.search.validate()?;
    Ok(())
}
