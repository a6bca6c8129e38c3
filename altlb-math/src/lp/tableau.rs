//! Dense Simplex Tableau with Bland's Rule.
//!
//! Each row stores `num_cols` coefficients followed by its right-hand side.
//! The tableau is kept in canonical form: the basic column of a row has a
//! unit entry in that row and zeros elsewhere, and every right-hand side
//! is non-negative. The reduced cost row is maintained alongside.
//!
//! ## References
//!
//! - Bland: "New finite pivoting rules for the simplex method" (1977)
//! - Chvátal: "Linear Programming", chapter 3 (1983)

use super::ColId;
use num_rational::BigRational;
use num_traits::{One, Signed, Zero};
use rustc_hash::FxHashMap;
use std::time::Instant;

/// Tableau statistics.
#[derive(Debug, Clone, Default)]
pub struct TableauStats {
    /// Number of pivot operations
    pub pivots: usize,
    /// Number of ratio tests
    pub ratio_tests: usize,
    /// Rows removed as redundant
    pub dropped_rows: usize,
}

/// Result of a pivoting run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PivotOutcome {
    /// No improving column remains
    Optimal,
    /// An improving column has no blocking row
    Unbounded,
    /// Iteration cap or deadline reached
    LimitReached,
}

/// Limits applied to a pivoting run.
#[derive(Debug, Clone, Copy)]
pub struct PivotLimits {
    /// Maximum number of pivots
    pub max_pivots: usize,
    /// Wall-clock deadline
    pub deadline: Option<Instant>,
}

impl Default for PivotLimits {
    fn default() -> Self {
        Self {
            max_pivots: 100_000,
            deadline: None,
        }
    }
}

/// Simplex tableau in canonical form.
#[derive(Debug, Clone)]
pub struct Tableau {
    /// Constraint rows, `num_cols` coefficients then the right-hand side
    rows: Vec<Vec<BigRational>>,
    /// Basic column of each row
    basis: Vec<ColId>,
    /// Reduced costs, one per column
    costs: Vec<BigRational>,
    /// Columns that may never enter the basis
    blocked: Vec<bool>,
    num_cols: usize,
    stats: TableauStats,
}

impl Tableau {
    /// Create a tableau from rows already in canonical form for `basis`.
    pub fn new(rows: Vec<Vec<BigRational>>, basis: Vec<ColId>, num_cols: usize) -> Self {
        debug_assert_eq!(rows.len(), basis.len());
        debug_assert!(rows.iter().all(|row| row.len() == num_cols + 1));
        Self {
            rows,
            basis,
            costs: vec![BigRational::zero(); num_cols],
            blocked: vec![false; num_cols],
            num_cols,
            stats: TableauStats::default(),
        }
    }

    /// Number of rows.
    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }

    /// Number of columns (excluding the right-hand side).
    pub fn num_cols(&self) -> usize {
        self.num_cols
    }

    /// Basic column of every row.
    pub fn basis(&self) -> &[ColId] {
        &self.basis
    }

    /// Coefficient at `(row, col)`.
    pub fn entry(&self, row: usize, col: ColId) -> &BigRational {
        &self.rows[row][col]
    }

    /// Right-hand side of `row`.
    pub fn rhs(&self, row: usize) -> &BigRational {
        &self.rows[row][self.num_cols]
    }

    /// Get statistics.
    pub fn stats(&self) -> &TableauStats {
        &self.stats
    }

    /// Forbid `col` from entering the basis.
    pub fn block_column(&mut self, col: ColId) {
        self.blocked[col] = true;
    }

    /// Install a cost vector (to be minimized) and price out the basic columns.
    pub fn set_costs(&mut self, costs: &[BigRational]) {
        debug_assert_eq!(costs.len(), self.num_cols);
        self.costs = costs.to_vec();
        for (row, &basic) in self.rows.iter().zip(&self.basis) {
            let factor = costs[basic].clone();
            if factor.is_zero() {
                continue;
            }
            for (cost, coeff) in self.costs.iter_mut().zip(row.iter()) {
                if !coeff.is_zero() {
                    *cost -= &factor * coeff;
                }
            }
        }
    }

    /// Objective value `sum(costs[basis[i]] * rhs[i])` for the given costs.
    pub fn objective_value(&self, costs: &[BigRational]) -> BigRational {
        self.basis
            .iter()
            .enumerate()
            .fold(BigRational::zero(), |acc, (row, &col)| {
                acc + &costs[col] * self.rhs(row)
            })
    }

    /// Pivot until optimal, unbounded or a limit is hit.
    pub fn optimize(&mut self, limits: &PivotLimits) -> PivotOutcome {
        let mut pivots = 0;
        loop {
            let Some(col) = self.select_entering() else {
                return PivotOutcome::Optimal;
            };
            let Some(row) = self.select_leaving(col) else {
                return PivotOutcome::Unbounded;
            };

            if pivots >= limits.max_pivots {
                return PivotOutcome::LimitReached;
            }
            if let Some(deadline) = limits.deadline
                && Instant::now() >= deadline
            {
                return PivotOutcome::LimitReached;
            }

            self.pivot(row, col);
            pivots += 1;
        }
    }

    /// Bland's rule: the lowest-index unblocked column with negative reduced cost.
    fn select_entering(&self) -> Option<ColId> {
        self.costs
            .iter()
            .enumerate()
            .find(|(col, cost)| !self.blocked[*col] && cost.is_negative())
            .map(|(col, _)| col)
    }

    /// Minimum ratio test, ties broken by the lowest basic column.
    fn select_leaving(&mut self, col: ColId) -> Option<usize> {
        self.stats.ratio_tests += 1;

        let mut best: Option<(usize, BigRational)> = None;
        for (i, row) in self.rows.iter().enumerate() {
            let coeff = &row[col];
            if !coeff.is_positive() {
                continue;
            }
            let ratio = &row[self.num_cols] / coeff;
            let better = match &best {
                None => true,
                Some((best_row, best_ratio)) => {
                    ratio < *best_ratio
                        || (ratio == *best_ratio && self.basis[i] < self.basis[*best_row])
                }
            };
            if better {
                best = Some((i, ratio));
            }
        }

        best.map(|(row, _)| row)
    }

    /// Make `col` basic in `row`.
    pub fn pivot(&mut self, row: usize, col: ColId) {
        let pivot_element = self.rows[row][col].clone();
        if pivot_element.is_zero() {
            return; // Degenerate pivot
        }

        let mut pivot_row = std::mem::take(&mut self.rows[row]);
        if !pivot_element.is_one() {
            for elem in pivot_row.iter_mut().filter(|e| !e.is_zero()) {
                *elem = &*elem / &pivot_element;
            }
        }

        // Only the non-zero positions of the pivot row change other rows.
        let support: Vec<usize> = pivot_row
            .iter()
            .enumerate()
            .filter(|(_, e)| !e.is_zero())
            .map(|(j, _)| j)
            .collect();

        for (i, other) in self.rows.iter_mut().enumerate() {
            if i == row {
                continue;
            }
            let multiplier = other[col].clone();
            if multiplier.is_zero() {
                continue;
            }
            for &j in &support {
                other[j] -= &multiplier * &pivot_row[j];
            }
        }

        let cost_multiplier = self.costs[col].clone();
        if !cost_multiplier.is_zero() {
            for &j in support.iter().filter(|&&j| j < self.num_cols) {
                self.costs[j] -= &cost_multiplier * &pivot_row[j];
            }
        }

        self.rows[row] = pivot_row;
        self.basis[row] = col;
        self.stats.pivots += 1;
    }

    /// Any non-zero column of `row` accepted by `eligible`, lowest index first.
    pub fn find_pivot_column(
        &self,
        row: usize,
        eligible: impl Fn(ColId) -> bool,
    ) -> Option<ColId> {
        self.rows[row][..self.num_cols]
            .iter()
            .enumerate()
            .find(|(col, coeff)| eligible(*col) && !coeff.is_zero())
            .map(|(col, _)| col)
    }

    /// Remove a row, e.g. a redundant equality whose basic column is artificial.
    pub fn drop_row(&mut self, row: usize) {
        self.rows.remove(row);
        self.basis.remove(row);
        self.stats.dropped_rows += 1;
    }

    /// Value of every basic column.
    pub fn basic_values(&self) -> FxHashMap<ColId, BigRational> {
        let mut solution = FxHashMap::default();

        for (i, &col) in self.basis.iter().enumerate() {
            solution.insert(col, self.rhs(i).clone());
        }

        solution
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rational::rat;

    /// x + y + s1 = 4, x + 3y + s2 = 6, basis {s1, s2}
    fn small_tableau() -> Tableau {
        let rows = vec![
            vec![rat(1), rat(1), rat(1), rat(0), rat(4)],
            vec![rat(1), rat(3), rat(0), rat(1), rat(6)],
        ];
        Tableau::new(rows, vec![2, 3], 4)
    }

    #[test]
    fn test_tableau_creation() {
        let tableau = small_tableau();
        assert_eq!(tableau.num_rows(), 2);
        assert_eq!(tableau.num_cols(), 4);
        assert_eq!(tableau.stats().pivots, 0);
    }

    #[test]
    fn test_pivot_keeps_canonical_form() {
        let mut tableau = small_tableau();
        tableau.pivot(1, 1);

        assert_eq!(tableau.basis(), &[2, 1]);
        assert_eq!(tableau.entry(1, 1), &rat(1));
        assert_eq!(tableau.entry(0, 1), &rat(0));
        assert_eq!(tableau.rhs(1), &rat(2));
        assert_eq!(tableau.rhs(0), &rat(2));
    }

    #[test]
    fn test_optimize_minimizes() {
        // minimize -x - 2y
        let mut tableau = small_tableau();
        let costs = vec![rat(-1), rat(-2), rat(0), rat(0)];
        tableau.set_costs(&costs);

        let outcome = tableau.optimize(&PivotLimits::default());
        assert_eq!(outcome, PivotOutcome::Optimal);
        // Optimum at x = 3, y = 1
        assert_eq!(tableau.objective_value(&costs), rat(-5));
        let values = tableau.basic_values();
        assert_eq!(values.get(&0), Some(&rat(3)));
        assert_eq!(values.get(&1), Some(&rat(1)));
    }

    #[test]
    fn test_blocked_column_never_enters() {
        let mut tableau = small_tableau();
        tableau.block_column(1);
        tableau.set_costs(&[rat(0), rat(-1), rat(0), rat(0)]);

        assert_eq!(tableau.optimize(&PivotLimits::default()), PivotOutcome::Optimal);
        assert_eq!(tableau.basis(), &[2, 3]);
    }

    #[test]
    fn test_unbounded_detection() {
        // x - y + s = 1: y can grow without bound
        let rows = vec![vec![rat(1), rat(-1), rat(1), rat(1)]];
        let mut tableau = Tableau::new(rows, vec![2], 3);
        tableau.set_costs(&[rat(0), rat(-1), rat(0)]);

        assert_eq!(
            tableau.optimize(&PivotLimits::default()),
            PivotOutcome::Unbounded
        );
    }

    #[test]
    fn test_pivot_limit() {
        let mut tableau = small_tableau();
        tableau.set_costs(&[rat(-1), rat(-2), rat(0), rat(0)]);
        let limits = PivotLimits {
            max_pivots: 0,
            deadline: None,
        };

        assert_eq!(tableau.optimize(&limits), PivotOutcome::LimitReached);
    }

    #[test]
    fn test_drop_row() {
        let mut tableau = small_tableau();
        tableau.drop_row(0);
        assert_eq!(tableau.num_rows(), 1);
        assert_eq!(tableau.basis(), &[3]);
        assert_eq!(tableau.stats().dropped_rows, 1);
    }
}
