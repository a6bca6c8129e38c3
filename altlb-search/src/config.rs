//! Search configuration.

use crate::builder::ObjectiveMode;
use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration of a proof search run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Longest annotation considered
    pub max_length: usize,
    /// First constant probed
    pub initial_constant: f64,
    /// Bisection stops once the bracket is narrower than this
    pub epsilon: f64,
    /// Doubling steps before the run is declared saturated
    pub max_doublings: usize,
    /// Halving steps before the run is declared exhausted
    pub max_halvings: usize,
    /// Optional cap on bisection steps
    pub max_bisections: Option<usize>,
    /// Time limit per oracle query, in milliseconds
    pub query_timeout_ms: Option<u64>,
    /// Time limit for the whole run, in milliseconds
    pub total_timeout_ms: Option<u64>,
    /// Worker threads (0 = rayon default, 1 = sequential)
    pub threads: usize,
    /// Objective attached to every program
    pub objective: ObjectiveMode,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            max_length: 5,
            initial_constant: 1.0,
            epsilon: 1e-3,
            max_doublings: 8,
            max_halvings: 8,
            max_bisections: None,
            query_timeout_ms: Some(10_000),
            total_timeout_ms: None,
            threads: 0,
            objective: ObjectiveMode::Feasibility,
        }
    }
}

impl SearchConfig {
    /// Create a new config with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Set maximum annotation length
    pub fn with_max_length(mut self, max_length: usize) -> Self {
        self.max_length = max_length;
        self
    }

    /// Set the first probed constant
    pub fn with_initial_constant(mut self, constant: f64) -> Self {
        self.initial_constant = constant;
        self
    }

    /// Set bisection precision
    pub fn with_epsilon(mut self, epsilon: f64) -> Self {
        self.epsilon = epsilon;
        self
    }

    /// Set the doubling cap
    pub fn with_max_doublings(mut self, max_doublings: usize) -> Self {
        self.max_doublings = max_doublings;
        self
    }

    /// Set the halving cap
    pub fn with_max_halvings(mut self, max_halvings: usize) -> Self {
        self.max_halvings = max_halvings;
        self
    }

    /// Set the bisection cap
    pub fn with_max_bisections(mut self, max_bisections: usize) -> Self {
        self.max_bisections = Some(max_bisections);
        self
    }

    /// Set per-query timeout
    pub fn with_query_timeout(mut self, timeout: Duration) -> Self {
        self.query_timeout_ms = Some(timeout.as_millis() as u64);
        self
    }

    /// Remove the per-query timeout
    pub fn without_query_timeout(mut self) -> Self {
        self.query_timeout_ms = None;
        self
    }

    /// Set total run timeout
    pub fn with_total_timeout(mut self, timeout: Duration) -> Self {
        self.total_timeout_ms = Some(timeout.as_millis() as u64);
        self
    }

    /// Set number of worker threads
    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = threads;
        self
    }

    /// Set the program objective
    pub fn with_objective(mut self, objective: ObjectiveMode) -> Self {
        self.objective = objective;
        self
    }

    /// Per-query timeout
    pub fn query_timeout(&self) -> Option<Duration> {
        self.query_timeout_ms.map(Duration::from_millis)
    }

    /// Total run timeout
    pub fn total_timeout(&self) -> Option<Duration> {
        self.total_timeout_ms.map(Duration::from_millis)
    }

    /// Reject values the search cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_length == 0 {
            return Err(ConfigError::ZeroLength);
        }
        if !self.initial_constant.is_finite() || self.initial_constant <= 0.0 {
            return Err(ConfigError::InitialConstant(self.initial_constant));
        }
        if !self.epsilon.is_finite() || self.epsilon <= 0.0 {
            return Err(ConfigError::Epsilon(self.epsilon));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SearchConfig::default();
        assert_eq!(config.max_length, 5);
        assert_eq!(config.initial_constant, 1.0);
        assert_eq!(config.query_timeout(), Some(Duration::from_secs(10)));
        assert_eq!(config.total_timeout(), None);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builders() {
        let config = SearchConfig::new()
            .with_max_length(7)
            .with_epsilon(0.01)
            .with_threads(2)
            .with_max_bisections(4)
            .with_total_timeout(Duration::from_secs(3))
            .without_query_timeout();
        assert_eq!(config.max_length, 7);
        assert_eq!(config.epsilon, 0.01);
        assert_eq!(config.threads, 2);
        assert_eq!(config.max_bisections, Some(4));
        assert_eq!(config.total_timeout(), Some(Duration::from_secs(3)));
        assert_eq!(config.query_timeout(), None);
    }

    #[test]
    fn test_validation() {
        assert_eq!(
            SearchConfig::new().with_max_length(0).validate(),
            Err(ConfigError::ZeroLength)
        );
        assert!(matches!(
            SearchConfig::new().with_initial_constant(-1.0).validate(),
            Err(ConfigError::InitialConstant(_))
        ));
        assert!(matches!(
            SearchConfig::new().with_epsilon(f64::NAN).validate(),
            Err(ConfigError::Epsilon(_))
        ));
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: SearchConfig =
            serde_json::from_str(r#"{"max_length": 9, "objective": "minimize-start-exponent"}"#)
                .unwrap();
        assert_eq!(config.max_length, 9);
        assert_eq!(config.objective, ObjectiveMode::MinimizeStartExponent);
        assert_eq!(config.max_doublings, 8);
    }
}
