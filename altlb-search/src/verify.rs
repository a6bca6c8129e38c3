//! Independent witness verification.
//!
//! A witness is re-checked by rebuilding its program from scratch and
//! evaluating every constraint in exact arithmetic. Serialized witnesses
//! are matched to the rebuilt program by variable name.

use crate::annotation::Annotation;
use crate::builder::ProgramBuilder;
use crate::catalog::RuleCatalog;
use crate::error::AnnotationError;
use crate::program::{Assignment, ConstraintViolation};
use crate::report::{Witness, WitnessReport};
use altlb_math::rational::parse;
use num_rational::BigRational;
use thiserror::Error;

/// Why a witness does not verify
#[derive(Error, Debug, Clone, PartialEq)]
pub enum VerifyError {
    #[error("invalid annotation: {0}")]
    Annotation(#[from] AnnotationError),
    #[error("cannot parse {field} value `{text}`")]
    Number { field: String, text: String },
    #[error("witness does not assign {0}")]
    MissingVariable(String),
    #[error(transparent)]
    Violation(#[from] ConstraintViolation),
}

/// Check `witness` against a freshly built program.
pub fn verify_witness(
    catalog: &RuleCatalog,
    witness: &Witness,
    tolerance: &BigRational,
) -> Result<(), VerifyError> {
    // Re-validate: the witness may come from a different catalog.
    let annotation = Annotation::new(catalog, witness.annotation.kinds().iter().copied())?;
    let program = ProgramBuilder::new(catalog).build(&annotation, &witness.constant);
    program.check(&witness.assignment, tolerance)?;
    Ok(())
}

/// Check a serialized witness, e.g. read back from a JSON report.
pub fn verify_report(
    catalog: &RuleCatalog,
    report: &WitnessReport,
    tolerance: &BigRational,
) -> Result<(), VerifyError> {
    let witness = witness_from_report(catalog, report)?;
    verify_witness(catalog, &witness, tolerance)
}

/// Rebuild an in-memory witness from its serialized form.
pub fn witness_from_report(
    catalog: &RuleCatalog,
    report: &WitnessReport,
) -> Result<Witness, VerifyError> {
    let annotation = Annotation::new(catalog, report.annotation.iter().copied())?;
    let constant = parse(&report.constant_exact).ok_or_else(|| VerifyError::Number {
        field: "constant".to_string(),
        text: report.constant_exact.clone(),
    })?;

    let program = ProgramBuilder::new(catalog).build(&annotation, &constant);
    let values = program
        .variables()
        .iter()
        .map(|variable| {
            let text = report
                .assignment
                .get(&variable.name)
                .ok_or_else(|| VerifyError::MissingVariable(variable.name.clone()))?;
            parse(text).ok_or_else(|| VerifyError::Number {
                field: variable.name.clone(),
                text: text.clone(),
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Witness {
        annotation,
        constant,
        assignment: Assignment::new(values),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::{FeasibilityOracle, SimplexOracle, Verdict};
    use altlb_math::rational::{from_f64, rat};

    fn solved_witness(compact: &str, c: f64) -> Witness {
        let catalog = RuleCatalog::standard();
        let annotation = Annotation::parse(&catalog, compact).unwrap();
        let constant = from_f64(c).unwrap();
        let program = ProgramBuilder::new(&catalog).build(&annotation, &constant);
        match SimplexOracle::new().solve(&program, None).unwrap() {
            Verdict::Feasible(assignment) => Witness {
                annotation,
                constant,
                assignment,
            },
            other => panic!("unexpected verdict: {other:?}"),
        }
    }

    #[test]
    fn test_solver_witness_verifies() {
        let catalog = RuleCatalog::standard();
        let witness = solved_witness("O--", 1.375);
        assert!(verify_witness(&catalog, &witness, &rat(0)).is_ok());
    }

    #[test]
    fn test_witness_fails_at_larger_constant() {
        let catalog = RuleCatalog::standard();
        let mut witness = solved_witness("O--", 1.0);
        witness.constant = rat(2);
        assert!(matches!(
            verify_witness(&catalog, &witness, &rat(0)),
            Err(VerifyError::Violation(_))
        ));
    }

    #[test]
    fn test_report_round_trip_verifies() {
        let catalog = RuleCatalog::standard();
        let report = solved_witness("O+---", 1.25).to_report();
        let json = serde_json::to_string(&report).unwrap();
        let parsed: WitnessReport = serde_json::from_str(&json).unwrap();
        assert!(verify_report(&catalog, &parsed, &rat(0)).is_ok());
    }

    #[test]
    fn test_tampered_report_is_rejected() {
        let catalog = RuleCatalog::standard();
        let mut report = solved_witness("O--", 1.25).to_report();
        report.assignment.insert("b_0_0".to_string(), "3".to_string());
        assert!(verify_report(&catalog, &report, &rat(0)).is_err());

        let mut report = solved_witness("O--", 1.25).to_report();
        report.assignment.remove("x_1");
        assert_eq!(
            verify_report(&catalog, &report, &rat(0)),
            Err(VerifyError::MissingVariable("x_1".to_string()))
        );

        let mut report = solved_witness("O--", 1.25).to_report();
        report.constant_exact = "one".to_string();
        assert!(matches!(
            verify_report(&catalog, &report, &rat(0)),
            Err(VerifyError::Number { .. })
        ));
    }

    #[test]
    fn test_foreign_catalog_is_rejected() {
        let witness = solved_witness("O--", 1.0);
        assert!(matches!(
            verify_witness(&RuleCatalog::two_step(), &witness, &rat(0)),
            Err(VerifyError::Annotation(_))
        ));
    }
}
