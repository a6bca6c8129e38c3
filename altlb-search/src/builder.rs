//! Program Builder: annotation plus target constant to linear program.
//!
//! Every line `i` of an annotation gets `width` pairs of exponent
//! variables `a_i_k`, `b_i_k`; every rule with a speedup parameter gets
//! `x_i` on the line it produces. The rule at position `p` relates line
//! `p` to line `p + 1`.

use crate::annotation::Annotation;
use crate::catalog::{RuleCatalog, RuleKind};
use crate::program::{Domain, LinearExpr, LinearProgram, Relation};
use altlb_math::lp_core::{OptDir, VarId};
use num_rational::BigRational;
use num_traits::{One, Zero};
use serde::{Deserialize, Serialize};

/// What the program optimizes once feasible.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ObjectiveMode {
    /// Pure feasibility
    #[default]
    Feasibility,
    /// Minimize the starting time exponent `a_0_0`
    MinimizeStartExponent,
}

/// Variable layout of the program for one annotation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgramLayout {
    lines: usize,
    width: usize,
    params: Vec<Option<VarId>>,
}

impl ProgramLayout {
    /// Layout for `annotation`: all `a`, then all `b`, then parameters by line.
    pub fn for_annotation(annotation: &Annotation) -> Self {
        let lines = annotation.len() + 1;
        let width = annotation.width();
        let mut next = 2 * lines * width;
        let mut params = vec![None; lines];
        for (position, kind) in annotation.kinds().iter().enumerate() {
            if kind.has_parameter() {
                params[position + 1] = Some(next);
                next += 1;
            }
        }
        Self {
            lines,
            width,
            params,
        }
    }

    /// Number of lines.
    pub fn lines(&self) -> usize {
        self.lines
    }

    /// Pairs per line.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Total number of variables.
    pub fn num_variables(&self) -> usize {
        2 * self.lines * self.width + self.params.iter().flatten().count()
    }

    /// Time exponent `a[line][k]`.
    pub fn a(&self, line: usize, k: usize) -> VarId {
        debug_assert!(line < self.lines && k < self.width);
        line * self.width + k
    }

    /// Block exponent `b[line][k]`.
    pub fn b(&self, line: usize, k: usize) -> VarId {
        debug_assert!(line < self.lines && k < self.width);
        self.lines * self.width + line * self.width + k
    }

    /// Speedup parameter of the rule producing `line`.
    pub fn x(&self, line: usize) -> Option<VarId> {
        self.params.get(line).copied().flatten()
    }

    /// Name of every variable, indexed by id.
    pub fn names(&self) -> Vec<String> {
        let mut names = Vec::with_capacity(self.num_variables());
        for prefix in ["a", "b"] {
            for line in 0..self.lines {
                for k in 0..self.width {
                    names.push(format!("{prefix}_{line}_{k}"));
                }
            }
        }
        for (line, param) in self.params.iter().enumerate() {
            if param.is_some() {
                names.push(format!("x_{line}"));
            }
        }
        names
    }
}

/// Builds one linear program per `(annotation, constant)` query.
#[derive(Debug, Clone)]
pub struct ProgramBuilder<'a> {
    catalog: &'a RuleCatalog,
    objective: ObjectiveMode,
}

impl<'a> ProgramBuilder<'a> {
    /// Create a builder for `catalog`.
    pub fn new(catalog: &'a RuleCatalog) -> Self {
        Self {
            catalog,
            objective: ObjectiveMode::default(),
        }
    }

    /// Set the objective mode.
    pub fn with_objective(mut self, objective: ObjectiveMode) -> Self {
        self.objective = objective;
        self
    }

    /// Build the program whose feasibility proves `constant` via `annotation`.
    pub fn build(&self, annotation: &Annotation, constant: &BigRational) -> LinearProgram {
        self.build_with_layout(annotation, constant).0
    }

    /// Like [`ProgramBuilder::build`], also returning the variable layout.
    pub fn build_with_layout(
        &self,
        annotation: &Annotation,
        constant: &BigRational,
    ) -> (LinearProgram, ProgramLayout) {
        let layout = ProgramLayout::for_annotation(annotation);
        let mut program = LinearProgram::new(format!("{} c={constant}", annotation.compact()));
        for name in layout.names() {
            program.add_variable(name, Domain::non_negative());
        }

        let mut emit = Emitter {
            program: &mut program,
            layout: &layout,
        };
        let last = annotation.len();
        emit.boundary(0);
        emit.boundary(last);
        emit.ge(
            "closure",
            layout.a(0, 0),
            layout.a(last, 0),
            BigRational::one(),
        );

        let scaled = constant * self.catalog.alpha();
        for (position, &kind) in annotation.kinds().iter().enumerate() {
            let line = position + 1;
            match kind {
                RuleKind::Open => emit.open(line),
                RuleKind::Speedup => emit.speedup(line),
                RuleKind::Slowdown => emit.slowdown(line, constant, &scaled),
            }
        }

        if self.objective == ObjectiveMode::MinimizeStartExponent {
            program.set_objective(OptDir::Minimize, LinearExpr::var(layout.a(0, 0)));
        }
        (program, layout)
    }
}

struct Emitter<'p> {
    program: &'p mut LinearProgram,
    layout: &'p ProgramLayout,
}

impl Emitter<'_> {
    fn constrain(&mut self, label: String, lhs: LinearExpr, relation: Relation, rhs: BigRational) {
        self.program.add_constraint(label, lhs, relation, rhs);
    }

    /// `var = value`
    fn fix(&mut self, label: String, var: VarId, value: i64) {
        let value = BigRational::from_integer(value.into());
        self.constrain(label, LinearExpr::var(var), Relation::Eq, value);
    }

    /// `var >= value`
    fn at_least(&mut self, label: String, var: VarId, value: i64) {
        let value = BigRational::from_integer(value.into());
        self.constrain(label, LinearExpr::var(var), Relation::Ge, value);
    }

    /// `lhs >= factor * rhs`
    fn ge(&mut self, label: impl Into<String>, lhs: VarId, rhs: VarId, factor: BigRational) {
        let expr = LinearExpr::var(lhs).term(rhs, -factor);
        self.constrain(label.into(), expr, Relation::Ge, BigRational::zero());
    }

    /// `lhs = rhs`
    fn same(&mut self, label: String, lhs: VarId, rhs: VarId) {
        let expr = LinearExpr::var(lhs).minus(rhs);
        self.constrain(label, expr, Relation::Eq, BigRational::zero());
    }

    fn param(&self, line: usize) -> VarId {
        match self.layout.x(line) {
            Some(x) => x,
            None => unreachable!("line {line} has no speedup parameter"),
        }
    }

    fn boundary(&mut self, line: usize) {
        let l = self.layout;
        self.at_least(format!("l{line}_a0"), l.a(line, 0), 1);
        self.fix(format!("l{line}_b0"), l.b(line, 0), 1);
        for k in 1..l.width() {
            self.fix(format!("l{line}_a{k}"), l.a(line, k), 0);
            self.fix(format!("l{line}_b{k}"), l.b(line, k), 0);
        }
    }

    fn open(&mut self, i: usize) {
        let l = self.layout;
        let x = self.param(i);
        let one = BigRational::one();
        // a[i][0] = a[i-1][0] - x
        self.constrain(
            format!("r{i}_open_a0"),
            LinearExpr::var(l.a(i, 0)).minus(l.a(i - 1, 0)).plus(x),
            Relation::Eq,
            BigRational::zero(),
        );
        self.fix(format!("r{i}_open_b0"), l.b(i, 0), 1);
        self.fix(format!("r{i}_open_a1"), l.a(i, 1), 0);
        self.ge(format!("r{i}_open_b1_x"), l.b(i, 1), x, one);
        self.at_least(format!("r{i}_open_b1"), l.b(i, 1), 1);
        self.same(format!("r{i}_open_a2"), l.a(i, 2), x);
        self.fix(format!("r{i}_open_b2"), l.b(i, 2), 1);
        for k in 3..l.width() {
            self.fix(format!("r{i}_open_a{k}"), l.a(i, k), 0);
            self.fix(format!("r{i}_open_b{k}"), l.b(i, k), 0);
        }
    }

    fn speedup(&mut self, i: usize) {
        let l = self.layout;
        let x = self.param(i);
        let one = BigRational::one;
        self.at_least(format!("r{i}_up_a0"), l.a(i, 0), 1);
        // a[i][0] >= a[i-1][0] - x
        self.constrain(
            format!("r{i}_up_a0_x"),
            LinearExpr::var(l.a(i, 0)).minus(l.a(i - 1, 0)).plus(x),
            Relation::Ge,
            BigRational::zero(),
        );
        self.ge(format!("r{i}_up_b0"), l.b(i, 0), l.b(i - 1, 0), one());
        self.fix(format!("r{i}_up_a1"), l.a(i, 1), 0);
        self.ge(format!("r{i}_up_b1_x"), l.b(i, 1), x, one());
        self.ge(format!("r{i}_up_b1"), l.b(i, 1), l.b(i - 1, 0), one());
        self.ge(format!("r{i}_up_a2"), l.a(i, 2), l.a(i - 1, 1), one());
        self.ge(format!("r{i}_up_a2_x"), l.a(i, 2), x, one());
        self.ge(format!("r{i}_up_b2"), l.b(i, 2), l.b(i - 1, 1), one());
        for k in 3..l.width() {
            self.same(format!("r{i}_up_a{k}"), l.a(i, k), l.a(i - 1, k - 1));
            self.same(format!("r{i}_up_b{k}"), l.b(i, k), l.b(i - 1, k - 1));
        }
    }

    fn slowdown(&mut self, i: usize, c: &BigRational, c_alpha: &BigRational) {
        let l = self.layout;
        self.ge(format!("r{i}_down_a0_a0"), l.a(i, 0), l.a(i - 1, 0), c.clone());
        self.ge(format!("r{i}_down_a0_a1"), l.a(i, 0), l.a(i - 1, 1), c.clone());
        self.ge(format!("r{i}_down_a0_b0"), l.a(i, 0), l.b(i - 1, 0), c_alpha.clone());
        self.ge(format!("r{i}_down_a0_b1"), l.a(i, 0), l.b(i - 1, 1), c_alpha.clone());
        self.same(format!("r{i}_down_b0"), l.b(i, 0), l.b(i - 1, 1));
        let top = l.width() - 1;
        for k in 1..top {
            self.same(format!("r{i}_down_a{k}"), l.a(i, k), l.a(i - 1, k + 1));
            self.same(format!("r{i}_down_b{k}"), l.b(i, k), l.b(i - 1, k + 1));
        }
        self.fix(format!("r{i}_down_a{top}"), l.a(i, top), 0);
        self.fix(format!("r{i}_down_b{top}"), l.b(i, top), 0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::program::Assignment;
    use altlb_math::rational::{from_f64, rat};
    use altlb_math::LPResult;

    fn solve(program: &LinearProgram) -> Option<Assignment> {
        match program.to_solver().solve() {
            LPResult::Optimal { values, .. } => {
                Some(Assignment::from_solver(program.variables().len(), &values))
            }
            _ => None,
        }
    }

    fn feasible(catalog: &RuleCatalog, compact: &str, c: f64) -> bool {
        let annotation = Annotation::parse(catalog, compact).unwrap();
        let constant = from_f64(c).unwrap();
        let program = ProgramBuilder::new(catalog).build(&annotation, &constant);
        match solve(&program) {
            Some(assignment) => {
                assert!(program.check(&assignment, &rat(0)).is_ok());
                true
            }
            None => false,
        }
    }

    #[test]
    fn test_layout_ids_are_dense() {
        let catalog = RuleCatalog::standard();
        let annotation = Annotation::parse(&catalog, "O+---").unwrap();
        let layout = ProgramLayout::for_annotation(&annotation);
        assert_eq!(layout.lines(), 6);
        assert_eq!(layout.width(), 4);
        assert_eq!(layout.num_variables(), 2 * 6 * 4 + 2);
        assert_eq!(layout.a(0, 0), 0);
        assert_eq!(layout.b(0, 0), 24);
        assert_eq!(layout.x(1), Some(48));
        assert_eq!(layout.x(2), Some(49));
        assert_eq!(layout.x(3), None);

        let names = layout.names();
        assert_eq!(names.len(), layout.num_variables());
        assert_eq!(names[layout.a(2, 3)], "a_2_3");
        assert_eq!(names[layout.b(5, 1)], "b_5_1");
        assert_eq!(names[48], "x_1");
    }

    #[test]
    fn test_program_shape() {
        let catalog = RuleCatalog::standard();
        let annotation = Annotation::parse(&catalog, "O--").unwrap();
        let program = ProgramBuilder::new(&catalog).build(&annotation, &rat(1));
        assert_eq!(program.variables().len(), 2 * 4 * 3 + 1);
        assert!(program.objective().is_none());
        assert!(program.constraints().iter().any(|c| c.label == "closure"));
        assert!(program.constraints().iter().any(|c| c.label == "r1_open_a0"));
        assert!(program.constraints().iter().any(|c| c.label == "r3_down_b2"));
    }

    #[test]
    fn test_sqrt_two_bound() {
        let catalog = RuleCatalog::standard();
        assert!(feasible(&catalog, "O--", 1.0));
        assert!(feasible(&catalog, "O--", 1.4));
        assert!(!feasible(&catalog, "O--", 1.42));
        assert!(!feasible(&catalog, "O--", 2.0));
    }

    #[test]
    fn test_two_step_bound() {
        let catalog = RuleCatalog::two_step();
        assert!(feasible(&catalog, "+-", 0.5));
        assert!(feasible(&catalog, "+-", 1.0));
        assert!(!feasible(&catalog, "+-", 1.0625));
    }

    #[test]
    fn test_alpha_scales_slowdown() {
        // A smaller slowdown weight can only help.
        let catalog = RuleCatalog::standard().with_alpha(0.5).unwrap();
        assert!(feasible(&catalog, "O--", 1.42));
    }

    #[test]
    fn test_minimize_start_exponent() {
        let catalog = RuleCatalog::standard();
        let annotation = Annotation::parse(&catalog, "O--").unwrap();
        let builder =
            ProgramBuilder::new(&catalog).with_objective(ObjectiveMode::MinimizeStartExponent);
        let (program, layout) = builder.build_with_layout(&annotation, &rat(1));
        assert!(program.objective().is_some());
        let assignment = solve(&program).unwrap();
        // Line 0 is a boundary line, so a_0_0 >= 1.
        let start = assignment.get(layout.a(0, 0)).unwrap().clone();
        assert!(start >= rat(1));
        assert!(program.check(&assignment, &rat(0)).is_ok());
    }
}
