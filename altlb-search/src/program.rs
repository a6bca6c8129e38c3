//! Linear programs over non-negative real variables.
//!
//! A [`LinearProgram`] is a solver-independent model: named variables with
//! a domain, labelled constraints and an optional objective. It can be
//! checked against an [`Assignment`] in exact arithmetic, exported as CPLEX
//! LP text, or lowered into [`LPSolver`].

use altlb_math::lp_core::{ConstraintSense, LPSolver, OptDir, VarId};
use altlb_math::rational::to_f64;
use num_rational::BigRational;
use num_traits::{One, Signed, Zero};
use rustc_hash::FxHashMap;
use smallvec::SmallVec;
use std::fmt::{self, Write as _};
use thiserror::Error;

/// Relation of a constraint. Shared with the solver's row sense.
pub type Relation = ConstraintSense;

/// Domain of a variable: `[0, upper]`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Domain {
    /// Optional upper bound
    pub upper: Option<BigRational>,
}

impl Domain {
    /// `[0, inf)`.
    pub fn non_negative() -> Self {
        Self::default()
    }

    /// Whether `value` lies in the domain widened by `tolerance` on both ends.
    pub fn contains(&self, value: &BigRational, tolerance: &BigRational) -> bool {
        !(value + tolerance).is_negative()
            && self
                .upper
                .as_ref()
                .is_none_or(|upper| *value <= upper + tolerance)
    }
}

/// A named variable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Variable {
    /// Name, valid as a CPLEX LP identifier
    pub name: String,
    /// Domain
    pub domain: Domain,
}

/// Sparse linear expression `sum(coeff * var)`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LinearExpr {
    terms: SmallVec<[(VarId, BigRational); 4]>,
}

impl LinearExpr {
    /// The empty expression.
    pub fn new() -> Self {
        Self::default()
    }

    /// `1 * var`.
    pub fn var(var: VarId) -> Self {
        Self::new().term(var, BigRational::one())
    }

    /// Append `coeff * var`.
    pub fn term(mut self, var: VarId, coeff: BigRational) -> Self {
        self.terms.push((var, coeff));
        self
    }

    /// Append `-1 * var`.
    pub fn minus(self, var: VarId) -> Self {
        self.term(var, -BigRational::one())
    }

    /// Append `1 * var`.
    pub fn plus(self, var: VarId) -> Self {
        self.term(var, BigRational::one())
    }

    /// Terms in insertion order.
    pub fn terms(&self) -> &[(VarId, BigRational)] {
        &self.terms
    }

    /// Value under `assignment`. Unassigned variables count as zero.
    pub fn evaluate(&self, assignment: &Assignment) -> BigRational {
        self.terms
            .iter()
            .fold(BigRational::zero(), |acc, (var, coeff)| {
                match assignment.get(*var) {
                    Some(value) => acc + coeff * value,
                    None => acc,
                }
            })
    }
}

/// A labelled constraint `lhs relation rhs`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Constraint {
    /// Label, valid as a CPLEX LP identifier
    pub label: String,
    /// Left-hand side
    pub lhs: LinearExpr,
    /// Relation
    pub relation: Relation,
    /// Right-hand side constant
    pub rhs: BigRational,
}

impl Constraint {
    /// Whether the constraint holds for `value` of the left-hand side, up to `tolerance`.
    pub fn holds(&self, value: &BigRational, tolerance: &BigRational) -> bool {
        match self.relation {
            Relation::Le => *value <= &self.rhs + tolerance,
            Relation::Ge => *value >= &self.rhs - tolerance,
            Relation::Eq => altlb_math::rational::abs_diff(value, &self.rhs) <= *tolerance,
        }
    }
}

/// Objective function.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Objective {
    /// Direction
    pub direction: OptDir,
    /// Expression
    pub expr: LinearExpr,
}

/// Values of every variable of a program, indexed by [`VarId`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Assignment {
    values: Vec<BigRational>,
}

impl Assignment {
    /// Wrap values indexed by variable.
    pub fn new(values: Vec<BigRational>) -> Self {
        Self { values }
    }

    /// Collect solver output; missing variables are zero.
    pub fn from_solver(num_vars: usize, values: &FxHashMap<VarId, BigRational>) -> Self {
        Self {
            values: (0..num_vars)
                .map(|var| values.get(&var).cloned().unwrap_or_else(BigRational::zero))
                .collect(),
        }
    }

    /// Value of `var`.
    pub fn get(&self, var: VarId) -> Option<&BigRational> {
        self.values.get(var)
    }

    /// All values.
    pub fn values(&self) -> &[BigRational] {
        &self.values
    }

    /// Number of values.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether no values are present.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// A constraint or domain that an assignment violates.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConstraintViolation {
    #[error("assignment has {found} values, program has {expected} variables")]
    Arity { expected: usize, found: usize },
    #[error("variable {name} = {value} is outside its domain")]
    Domain { name: String, value: f64 },
    #[error("constraint {label} violated: lhs = {lhs}, expected {relation} {rhs}")]
    Constraint {
        label: String,
        lhs: f64,
        relation: &'static str,
        rhs: f64,
    },
}

fn relation_symbol(relation: Relation) -> &'static str {
    match relation {
        Relation::Le => "<=",
        Relation::Ge => ">=",
        Relation::Eq => "=",
    }
}

/// A linear program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinearProgram {
    name: String,
    variables: Vec<Variable>,
    constraints: Vec<Constraint>,
    objective: Option<Objective>,
}

impl LinearProgram {
    /// Create an empty program.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            variables: Vec::new(),
            constraints: Vec::new(),
            objective: None,
        }
    }

    /// Program name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Add a variable and return its id.
    pub fn add_variable(&mut self, name: impl Into<String>, domain: Domain) -> VarId {
        self.variables.push(Variable {
            name: name.into(),
            domain,
        });
        self.variables.len() - 1
    }

    /// Add `lhs relation rhs`.
    pub fn add_constraint(
        &mut self,
        label: impl Into<String>,
        lhs: LinearExpr,
        relation: Relation,
        rhs: BigRational,
    ) {
        self.constraints.push(Constraint {
            label: label.into(),
            lhs,
            relation,
            rhs,
        });
    }

    /// Install an objective.
    pub fn set_objective(&mut self, direction: OptDir, expr: LinearExpr) {
        self.objective = Some(Objective { direction, expr });
    }

    /// Variables, indexed by [`VarId`].
    pub fn variables(&self) -> &[Variable] {
        &self.variables
    }

    /// Constraints in insertion order.
    pub fn constraints(&self) -> &[Constraint] {
        &self.constraints
    }

    /// Objective, if any.
    pub fn objective(&self) -> Option<&Objective> {
        self.objective.as_ref()
    }

    /// Look a variable up by name.
    pub fn variable(&self, name: &str) -> Option<VarId> {
        self.variables.iter().position(|v| v.name == name)
    }

    /// Value of the objective under `assignment`.
    pub fn evaluate(&self, assignment: &Assignment) -> Option<BigRational> {
        self.objective
            .as_ref()
            .map(|objective| objective.expr.evaluate(assignment))
    }

    /// Check every domain and constraint, stopping at the first violation.
    pub fn check(
        &self,
        assignment: &Assignment,
        tolerance: &BigRational,
    ) -> Result<(), ConstraintViolation> {
        if assignment.len() != self.variables.len() {
            return Err(ConstraintViolation::Arity {
                expected: self.variables.len(),
                found: assignment.len(),
            });
        }

        for (variable, value) in self.variables.iter().zip(assignment.values()) {
            if !variable.domain.contains(value, tolerance) {
                return Err(ConstraintViolation::Domain {
                    name: variable.name.clone(),
                    value: to_f64(value),
                });
            }
        }

        for constraint in &self.constraints {
            let lhs = constraint.lhs.evaluate(assignment);
            if !constraint.holds(&lhs, tolerance) {
                return Err(ConstraintViolation::Constraint {
                    label: constraint.label.clone(),
                    lhs: to_f64(&lhs),
                    relation: relation_symbol(constraint.relation),
                    rhs: to_f64(&constraint.rhs),
                });
            }
        }

        Ok(())
    }

    /// Lower into the bundled exact simplex. Variable ids are preserved.
    pub fn to_solver(&self) -> LPSolver {
        let mut lp = LPSolver::new();
        for variable in &self.variables {
            let id = lp.new_continuous();
            if let Some(upper) = &variable.domain.upper {
                lp.set_upper_bound(id, upper.clone());
            }
        }
        for constraint in &self.constraints {
            lp.new_constraint(
                constraint.lhs.terms().iter().cloned(),
                constraint.relation,
                constraint.rhs.clone(),
            );
        }
        if let Some(objective) = &self.objective {
            lp.set_direction(objective.direction);
            for (var, coeff) in objective.expr.terms() {
                lp.set_objective(*var, coeff.clone());
            }
        }
        lp
    }

    /// Render as CPLEX LP text.
    pub fn to_lp_format(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "\\ {}", self.name);

        let (direction, expr) = match &self.objective {
            Some(objective) => (objective.direction, Some(&objective.expr)),
            None => (OptDir::Minimize, None),
        };
        out.push_str(match direction {
            OptDir::Minimize => "Minimize\n",
            OptDir::Maximize => "Maximize\n",
        });
        out.push_str(" obj:");
        match expr {
            Some(expr) if !expr.terms().is_empty() => self.write_expr(&mut out, expr),
            _ => {
                if let Some(first) = self.variables.first() {
                    let _ = write!(out, " 0 {}", first.name);
                }
            }
        }
        out.push('\n');

        out.push_str("Subject To\n");
        for constraint in &self.constraints {
            let _ = write!(out, " {}:", constraint.label);
            if constraint.lhs.terms().is_empty() {
                out.push_str(" 0");
            } else {
                self.write_expr(&mut out, &constraint.lhs);
            }
            let _ = writeln!(
                out,
                " {} {}",
                relation_symbol(constraint.relation),
                LpNumber(&constraint.rhs)
            );
        }

        let bounded: Vec<&Variable> = self
            .variables
            .iter()
            .filter(|v| v.domain.upper.is_some())
            .collect();
        if !bounded.is_empty() {
            out.push_str("Bounds\n");
            for variable in bounded {
                if let Some(upper) = &variable.domain.upper {
                    let _ = writeln!(out, " 0 <= {} <= {}", variable.name, LpNumber(upper));
                }
            }
        }
        out.push_str("End\n");
        out
    }

    fn write_expr(&self, out: &mut String, expr: &LinearExpr) {
        for (i, (var, coeff)) in expr.terms().iter().enumerate() {
            let name = self
                .variables
                .get(*var)
                .map_or("?", |variable| variable.name.as_str());
            let sign = if coeff.is_negative() { '-' } else { '+' };
            let magnitude = coeff.abs();
            if i == 0 && sign == '+' {
                out.push(' ');
            } else {
                let _ = write!(out, " {sign} ");
            }
            if magnitude.is_one() {
                out.push_str(name);
            } else {
                let _ = write!(out, "{} {name}", LpNumber(&magnitude));
            }
        }
    }
}

/// Decimal rendering of a rational for LP text.
struct LpNumber<'a>(&'a BigRational);

impl fmt::Display for LpNumber<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_integer() {
            write!(f, "{}", self.0.numer())
        } else {
            write!(f, "{}", to_f64(self.0))
        }
    }
}
