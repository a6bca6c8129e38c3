//! Two-Phase Primal Simplex over Exact Rationals.
//!
//! Variables are continuous with an implicit lower bound of zero and an
//! optional upper bound. Constraints are `sum(coeff * var) {<=,>=,=} rhs`.
//!
//! ## Algorithm
//!
//! - Rows are normalized to a non-negative right-hand side.
//! - `<=` rows receive a slack column that starts basic; `>=` rows a
//!   surplus and an artificial column; `=` rows an artificial column.
//! - Phase 1 minimizes the sum of artificials. A positive optimum proves
//!   infeasibility. Remaining zero-valued artificials are pivoted out or
//!   their (redundant) rows are dropped.
//! - Phase 2 optimizes the user objective with artificials blocked.
//!
//! Bland's rule guarantees termination; the pivot cap and deadline only
//! bound wall-clock time.

use crate::lp::{PivotLimits, PivotOutcome, Tableau};
use num_rational::BigRational;
use num_traits::{One, Signed, Zero};
use rustc_hash::FxHashMap;
use std::time::{Duration, Instant};
use tracing::trace;

/// Variable identifier.
pub type VarId = usize;

/// Constraint identifier.
pub type ConstraintId = usize;

/// Optimization direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OptDir {
    /// Minimize the objective
    #[default]
    Minimize,
    /// Maximize the objective
    Maximize,
}

/// Relation between a row's left-hand side and its right-hand side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstraintSense {
    /// `lhs <= rhs`
    Le,
    /// `lhs >= rhs`
    Ge,
    /// `lhs = rhs`
    Eq,
}

impl ConstraintSense {
    /// Sense obtained by multiplying both sides by -1.
    pub fn flipped(self) -> Self {
        match self {
            Self::Le => Self::Ge,
            Self::Ge => Self::Le,
            Self::Eq => Self::Eq,
        }
    }
}

/// Result of solving an LP.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LPResult {
    /// Optimal solution found
    Optimal {
        /// Value of every variable
        values: FxHashMap<VarId, BigRational>,
        /// Objective value at the optimum
        objective: BigRational,
    },
    /// Problem is infeasible
    Infeasible,
    /// Problem is unbounded
    Unbounded,
    /// Unknown (iteration limit or deadline reached)
    Unknown,
}

impl LPResult {
    /// Whether a feasible point was produced.
    pub fn is_optimal(&self) -> bool {
        matches!(self, Self::Optimal { .. })
    }
}

/// LP solver statistics.
#[derive(Debug, Clone, Default)]
pub struct LPStats {
    /// Number of `solve` calls
    pub solves: u64,
    /// Pivots spent in phase 1
    pub phase_one_pivots: usize,
    /// Pivots spent in phase 2
    pub phase_two_pivots: usize,
    /// Redundant rows dropped after phase 1
    pub dropped_rows: usize,
    /// Rows of the last tableau
    pub rows: usize,
    /// Columns of the last tableau
    pub cols: usize,
}

#[derive(Debug, Clone)]
struct Row {
    coeffs: Vec<(VarId, BigRational)>,
    sense: ConstraintSense,
    rhs: BigRational,
}

/// Linear program solver.
#[derive(Debug, Clone, Default)]
pub struct LPSolver {
    num_vars: usize,
    objective: FxHashMap<VarId, BigRational>,
    direction: OptDir,
    rows: Vec<Row>,
    upper_bounds: FxHashMap<VarId, BigRational>,
    max_pivots: Option<usize>,
    time_limit: Option<Duration>,
    stats: LPStats,
}

impl LPSolver {
    /// Create an empty problem.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a continuous variable with domain `[0, inf)`.
    pub fn new_continuous(&mut self) -> VarId {
        let id = self.num_vars;
        self.num_vars += 1;
        id
    }

    /// Number of variables.
    pub fn num_vars(&self) -> usize {
        self.num_vars
    }

    /// Number of constraints (upper bounds excluded).
    pub fn num_constraints(&self) -> usize {
        self.rows.len()
    }

    /// Ids past the last variable declare every variable up to them.
    fn declare(&mut self, var: VarId) {
        self.num_vars = self.num_vars.max(var + 1);
    }

    /// Set the objective coefficient of `var`.
    pub fn set_objective(&mut self, var: VarId, coeff: BigRational) {
        self.declare(var);
        if coeff.is_zero() {
            self.objective.remove(&var);
        } else {
            self.objective.insert(var, coeff);
        }
    }

    /// Set the optimization direction.
    pub fn set_direction(&mut self, direction: OptDir) {
        self.direction = direction;
    }

    /// Restrict `var <= bound`.
    pub fn set_upper_bound(&mut self, var: VarId, bound: BigRational) {
        self.declare(var);
        self.upper_bounds.insert(var, bound);
    }

    /// Cap the number of pivots per phase.
    pub fn set_max_pivots(&mut self, max_pivots: usize) {
        self.max_pivots = Some(max_pivots);
    }

    /// Bound the wall-clock time of each `solve` call.
    pub fn set_time_limit(&mut self, limit: Duration) {
        self.time_limit = Some(limit);
    }

    /// Add `sum(coeff * var) sense rhs`. Repeated variables are summed.
    pub fn new_constraint<I>(
        &mut self,
        coeffs: I,
        sense: ConstraintSense,
        rhs: BigRational,
    ) -> ConstraintId
    where
        I: IntoIterator<Item = (VarId, BigRational)>,
    {
        let mut merged: Vec<(VarId, BigRational)> = Vec::new();
        for (var, coeff) in coeffs {
            self.declare(var);
            match merged.iter_mut().find(|(v, _)| *v == var) {
                Some((_, existing)) => *existing += coeff,
                None => merged.push((var, coeff)),
            }
        }
        merged.retain(|(_, coeff)| !coeff.is_zero());

        self.rows.push(Row {
            coeffs: merged,
            sense,
            rhs,
        });
        self.rows.len() - 1
    }

    /// Get statistics.
    pub fn stats(&self) -> &LPStats {
        &self.stats
    }

    /// Solve the problem.
    pub fn solve(&mut self) -> LPResult {
        self.stats.solves += 1;
        let limits = PivotLimits {
            max_pivots: self.max_pivots.unwrap_or(PivotLimits::default().max_pivots),
            deadline: self.time_limit.map(|limit| Instant::now() + limit),
        };

        let mut rows: Vec<Row> = self.rows.clone();
        for (&var, bound) in &self.upper_bounds {
            rows.push(Row {
                coeffs: vec![(var, BigRational::one())],
                sense: ConstraintSense::Le,
                rhs: bound.clone(),
            });
        }

        // Rows with no variables are decided on the spot.
        let mut kept = Vec::with_capacity(rows.len());
        for row in rows {
            if row.coeffs.is_empty() {
                let zero = BigRational::zero();
                let holds = match row.sense {
                    ConstraintSense::Le => zero <= row.rhs,
                    ConstraintSense::Ge => zero >= row.rhs,
                    ConstraintSense::Eq => row.rhs.is_zero(),
                };
                if !holds {
                    return LPResult::Infeasible;
                }
            } else {
                kept.push(row);
            }
        }

        let layout = StandardForm::build(self.num_vars, kept);
        self.stats.rows = layout.tableau.num_rows();
        self.stats.cols = layout.tableau.num_cols();
        let StandardForm {
            mut tableau,
            artificial,
        } = layout;

        // Phase 1
        let num_cols = tableau.num_cols();
        let mut phase_one_costs = vec![BigRational::zero(); num_cols];
        for &col in &artificial {
            phase_one_costs[col] = BigRational::one();
        }
        if !artificial.is_empty() {
            tableau.set_costs(&phase_one_costs);
            let before = tableau.stats().pivots;
            let outcome = tableau.optimize(&limits);
            self.stats.phase_one_pivots += tableau.stats().pivots - before;
            match outcome {
                PivotOutcome::Optimal => {}
                // The phase-1 objective is bounded below by zero.
                PivotOutcome::Unbounded | PivotOutcome::LimitReached => return LPResult::Unknown,
            }
            if tableau.objective_value(&phase_one_costs).is_positive() {
                trace!(pivots = self.stats.phase_one_pivots, "phase 1 proved infeasibility");
                return LPResult::Infeasible;
            }
            let is_artificial = |col: usize| col >= artificial[0];
            Self::evict_artificials(&mut tableau, &is_artificial);
            self.stats.dropped_rows += tableau.stats().dropped_rows;
            for &col in &artificial {
                tableau.block_column(col);
            }
        }

        // Phase 2
        let mut costs = vec![BigRational::zero(); num_cols];
        for (&var, coeff) in &self.objective {
            costs[var] = match self.direction {
                OptDir::Minimize => coeff.clone(),
                OptDir::Maximize => -coeff.clone(),
            };
        }
        tableau.set_costs(&costs);
        let before = tableau.stats().pivots;
        let outcome = tableau.optimize(&limits);
        self.stats.phase_two_pivots += tableau.stats().pivots - before;
        match outcome {
            PivotOutcome::Optimal => {}
            PivotOutcome::Unbounded => return LPResult::Unbounded,
            PivotOutcome::LimitReached => return LPResult::Unknown,
        }

        let basic = tableau.basic_values();
        let values: FxHashMap<VarId, BigRational> = (0..self.num_vars)
            .map(|var| {
                let value = basic.get(&var).cloned().unwrap_or_else(BigRational::zero);
                (var, value)
            })
            .collect();
        let objective = self
            .objective
            .iter()
            .filter_map(|(var, coeff)| values.get(var).map(|value| coeff * value))
            .fold(BigRational::zero(), |acc, term| acc + term);

        LPResult::Optimal { values, objective }
    }

    /// Pivot zero-valued artificials out of the basis; drop rows where impossible.
    fn evict_artificials(tableau: &mut Tableau, is_artificial: &impl Fn(usize) -> bool) {
        let mut row = 0;
        while row < tableau.num_rows() {
            let basic = tableau.basis()[row];
            if !is_artificial(basic) {
                row += 1;
                continue;
            }
            debug_assert!(tableau.rhs(row).is_zero());
            match tableau.find_pivot_column(row, |col| !is_artificial(col)) {
                Some(col) => {
                    tableau.pivot(row, col);
                    row += 1;
                }
                None => tableau.drop_row(row),
            }
        }
    }
}

/// Tableau in canonical form plus the artificial column range.
struct StandardForm {
    tableau: Tableau,
    artificial: Vec<usize>,
}

impl StandardForm {
    /// Columns: structural variables, then slack/surplus, then artificials.
    fn build(num_vars: usize, rows: Vec<Row>) -> Self {
        let mut normalized = Vec::with_capacity(rows.len());
        for mut row in rows {
            // A `>=` row with zero right-hand side becomes a `<=` row with a basic slack.
            let flip = row.rhs.is_negative()
                || (row.rhs.is_zero() && row.sense == ConstraintSense::Ge);
            if flip {
                for (_, coeff) in &mut row.coeffs {
                    *coeff = -coeff.clone();
                }
                row.rhs = -row.rhs;
                row.sense = row.sense.flipped();
            }
            normalized.push(row);
        }

        let num_slacks = normalized
            .iter()
            .filter(|row| row.sense != ConstraintSense::Eq)
            .count();
        let num_artificial = normalized
            .iter()
            .filter(|row| row.sense != ConstraintSense::Le)
            .count();
        let num_cols = num_vars + num_slacks + num_artificial;

        let mut table = Vec::with_capacity(normalized.len());
        let mut basis = Vec::with_capacity(normalized.len());
        let mut artificial = Vec::with_capacity(num_artificial);
        let mut next_slack = num_vars;
        let mut next_artificial = num_vars + num_slacks;

        for row in normalized {
            let mut dense = vec![BigRational::zero(); num_cols + 1];
            for (var, coeff) in row.coeffs {
                dense[var] = coeff;
            }
            dense[num_cols] = row.rhs;

            match row.sense {
                ConstraintSense::Le => {
                    dense[next_slack] = BigRational::one();
                    basis.push(next_slack);
                    next_slack += 1;
                }
                ConstraintSense::Ge => {
                    dense[next_slack] = -BigRational::one();
                    next_slack += 1;
                    dense[next_artificial] = BigRational::one();
                    basis.push(next_artificial);
                    artificial.push(next_artificial);
                    next_artificial += 1;
                }
                ConstraintSense::Eq => {
                    dense[next_artificial] = BigRational::one();
                    basis.push(next_artificial);
                    artificial.push(next_artificial);
                    next_artificial += 1;
                }
            }
            table.push(dense);
        }

        Self {
            tableau: Tableau::new(table, basis, num_cols),
            artificial,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rational::rat;

    #[test]
    fn test_empty_problem_is_optimal() {
        let mut lp = LPSolver::new();
        let x = lp.new_continuous();
        match lp.solve() {
            LPResult::Optimal { values, objective } => {
                assert_eq!(values[&x], rat(0));
                assert_eq!(objective, rat(0));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_equalities_and_lower_bounds() {
        // x = 2, y >= x + 1, minimize y
        let mut lp = LPSolver::new();
        let x = lp.new_continuous();
        let y = lp.new_continuous();
        lp.new_constraint([(x, rat(1))], ConstraintSense::Eq, rat(2));
        lp.new_constraint([(y, rat(1)), (x, rat(-1))], ConstraintSense::Ge, rat(1));
        lp.set_objective(y, rat(1));

        match lp.solve() {
            LPResult::Optimal { values, objective } => {
                assert_eq!(values[&x], rat(2));
                assert_eq!(values[&y], rat(3));
                assert_eq!(objective, rat(3));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_undeclared_ids_are_declared_on_use() {
        let mut lp = LPSolver::new();
        let x = lp.new_continuous();
        lp.set_objective(3, rat(1));
        lp.new_constraint([(5, rat(1)), (x, rat(1))], ConstraintSense::Ge, rat(2));
        lp.set_objective(5, rat(2));
        assert_eq!(lp.num_vars(), 6);

        match lp.solve() {
            LPResult::Optimal { values, objective } => {
                assert_eq!(values.len(), 6);
                assert_eq!(values[&3], rat(0));
                assert_eq!(values[&5], rat(0));
                assert!(values[&x] >= rat(2));
                assert_eq!(objective, rat(0));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_infeasible() {
        // x >= 3 and x <= 1
        let mut lp = LPSolver::new();
        let x = lp.new_continuous();
        lp.new_constraint([(x, rat(1))], ConstraintSense::Ge, rat(3));
        lp.new_constraint([(x, rat(1))], ConstraintSense::Le, rat(1));
        assert_eq!(lp.solve(), LPResult::Infeasible);
    }

    #[test]
    fn test_negative_rhs_normalization() {
        // -x <= -2 means x >= 2
        let mut lp = LPSolver::new();
        let x = lp.new_continuous();
        lp.new_constraint([(x, rat(-1))], ConstraintSense::Le, rat(-2));
        lp.set_objective(x, rat(1));
        match lp.solve() {
            LPResult::Optimal { objective, .. } => assert_eq!(objective, rat(2)),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_redundant_equalities_are_dropped() {
        let mut lp = LPSolver::new();
        let x = lp.new_continuous();
        lp.new_constraint([(x, rat(1))], ConstraintSense::Eq, rat(1));
        lp.new_constraint([(x, rat(2))], ConstraintSense::Eq, rat(2));
        match lp.solve() {
            LPResult::Optimal { values, .. } => assert_eq!(values[&x], rat(1)),
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(lp.stats().dropped_rows, 1);
    }

    #[test]
    fn test_upper_bound_and_unbounded() {
        let mut lp = LPSolver::new();
        let x = lp.new_continuous();
        lp.set_objective(x, rat(1));
        lp.set_direction(OptDir::Maximize);
        assert_eq!(lp.clone().solve(), LPResult::Unbounded);

        lp.set_upper_bound(x, rat(5));
        match lp.solve() {
            LPResult::Optimal { objective, .. } => assert_eq!(objective, rat(5)),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_constant_rows() {
        let mut lp = LPSolver::new();
        let x = lp.new_continuous();
        lp.new_constraint([(x, rat(1)), (x, rat(-1))], ConstraintSense::Ge, rat(1));
        assert_eq!(lp.solve(), LPResult::Infeasible);
    }

    #[test]
    fn test_pivot_cap_yields_unknown() {
        let mut lp = LPSolver::new();
        let x = lp.new_continuous();
        lp.new_constraint([(x, rat(1))], ConstraintSense::Ge, rat(1));
        lp.set_max_pivots(0);
        assert_eq!(lp.solve(), LPResult::Unknown);
    }
}
