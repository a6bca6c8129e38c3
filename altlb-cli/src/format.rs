//! Output formatting and display utilities for altlb CLI

use altlb_search::{
    Annotation, AnnotationRank, SearchOutcome, SearchReport, SweepRow, WitnessReport,
};
use owo_colors::{OwoColorize, Stream};
use serde::Serialize;
use std::fmt::Write;

use crate::OutputFormat;

/// How results are rendered
#[derive(Debug, Clone, Copy)]
pub(crate) struct Style {
    /// Colorize when the stream supports it
    pub color: bool,
    /// Include probe history and witness details
    pub verbose: bool,
    /// Text or JSON
    pub format: OutputFormat,
}

impl Style {
    fn green(&self, text: &str) -> String {
        if self.color {
            text.if_supports_color(Stream::Stdout, |t| t.green()).to_string()
        } else {
            text.to_string()
        }
    }

    fn red(&self, text: &str) -> String {
        if self.color {
            text.if_supports_color(Stream::Stdout, |t| t.red()).to_string()
        } else {
            text.to_string()
        }
    }

    fn yellow(&self, text: &str) -> String {
        if self.color {
            text.if_supports_color(Stream::Stdout, |t| t.yellow()).to_string()
        } else {
            text.to_string()
        }
    }

    fn bold(&self, text: &str) -> String {
        if self.color {
            text.if_supports_color(Stream::Stdout, |t| t.bold()).to_string()
        } else {
            text.to_string()
        }
    }
}

/// Serialize to pretty JSON, degrading to an error object
pub(crate) fn to_json<T: Serialize + ?Sized>(value: &T) -> String {
    serde_json::to_string_pretty(value)
        .unwrap_or_else(|e| format!("{{\"error\": \"Failed to serialize JSON: {}\"}}", e))
}

fn constant(value: Option<f64>) -> String {
    value.map_or_else(|| "-".to_string(), |c| c.to_string())
}

fn outcome_label(outcome: SearchOutcome, style: &Style) -> String {
    match outcome {
        SearchOutcome::Done => style.green("done"),
        SearchOutcome::Exhausted => style.yellow("exhausted"),
        SearchOutcome::Aborted => style.red("aborted"),
    }
}

/// Render a search report
pub(crate) fn format_report(report: &SearchReport, style: &Style) -> String {
    if style.format == OutputFormat::Json {
        return to_json(report);
    }

    let mut out = String::new();
    let _ = writeln!(
        out,
        "{} {} (alpha = {}), {} annotations up to length {}",
        style.bold("catalog:"),
        report.catalog,
        report.alpha,
        report.annotations,
        report.max_length
    );
    let _ = writeln!(
        out,
        "{} {}",
        style.bold("outcome:"),
        outcome_label(report.outcome, style)
    );

    let mut best = constant(report.best_constant);
    if report.saturated {
        best.push_str(" (saturated)");
    }
    let _ = writeln!(out, "{} {}", style.bold("best constant:"), style.green(&best));
    let _ = writeln!(
        out,
        "{} {}",
        style.bold("smallest unprovable:"),
        constant(report.unprovable_constant)
    );

    if let Some(witness) = &report.witness {
        let _ = writeln!(
            out,
            "{} {} at c = {}",
            style.bold("witness:"),
            witness.compact,
            witness.constant_exact
        );
    }

    let stats = &report.stats;
    let _ = write!(
        out,
        "{} {} probes, {} queries ({} feasible, {} infeasible, {} unstable, {} skipped) in {} ms",
        style.bold("work:"),
        stats.probes,
        stats.queries,
        stats.feasible,
        stats.infeasible,
        stats.unstable,
        stats.skipped,
        report.elapsed_ms
    );

    if !report.unstable_queries.is_empty() {
        let _ = write!(
            out,
            "\n{} {} queries returned no verdict",
            style.yellow("warning:"),
            report.unstable_queries.len()
        );
    }

    if style.verbose {
        out.push_str("\n\nProbes:");
        for (i, probe) in report.probes.iter().enumerate() {
            let verdict = if probe.provable {
                style.green("provable")
            } else {
                style.red("unprovable")
            };
            let _ = write!(
                out,
                "\n  {:>3}  {:<17} c = {:<12} {}",
                i + 1,
                probe.phase.to_string(),
                probe.constant,
                verdict
            );
            if let Some(witness) = &probe.witness {
                let _ = write!(out, " by {}", witness);
            }
        }
        for query in &report.unstable_queries {
            let _ = write!(
                out,
                "\n  unstable: {} at c = {} ({:?})",
                query.annotation, query.constant, query.reason
            );
        }
        if let Some(witness) = &report.witness {
            out.push_str("\n\n");
            out.push_str(&format_witness(witness, style));
        }
    }

    out
}

/// Rule-by-rule and line-by-line view of a witness
pub(crate) fn format_witness(witness: &WitnessReport, style: &Style) -> String {
    let mut out = String::new();
    let _ = write!(
        out,
        "{} {} at c = {}",
        style.bold("Witness"),
        witness.compact,
        witness.constant
    );

    for rule in &witness.rules {
        let _ = write!(out, "\n  rule {:>2}: {}", rule.position, rule.kind);
        for (name, value) in &rule.parameters {
            let _ = write!(out, " {} = {}", name, value);
        }
    }

    for line in &witness.lines {
        let exponents = |values: &[f64]| {
            values
                .iter()
                .map(f64::to_string)
                .collect::<Vec<_>>()
                .join(" ")
        };
        let _ = write!(
            out,
            "\n  line {:>2} (depth {}): a = [{}] b = [{}]",
            line.index,
            line.depth,
            exponents(&line.a),
            exponents(&line.b)
        );
    }
    out
}

/// Render sweep rows as a table
pub(crate) fn format_sweep(rows: &[SweepRow], style: &Style) -> String {
    if style.format == OutputFormat::Json {
        return to_json(rows);
    }

    let mut out = style.bold(&format!(
        "{:>8}  {:>6}  {:<12}  {:<10}  witness",
        "alpha", "length", "best", "outcome"
    ));
    for row in rows {
        let mut best = constant(row.best_constant);
        if row.saturated {
            best.push('+');
        }
        let mut witness = row.witness.clone().unwrap_or_else(|| "-".to_string());
        if row.ties.len() > 1 {
            let _ = write!(witness, " (+{} tied)", row.ties.len() - 1);
        }
        let outcome = match row.outcome {
            SearchOutcome::Done => "done",
            SearchOutcome::Exhausted => "exhausted",
            SearchOutcome::Aborted => "aborted",
        };
        let _ = write!(
            out,
            "\n{:>8}  {:>6}  {:<12}  {:<10}  {}",
            row.alpha, row.max_length, best, outcome, witness
        );
    }
    out
}

/// Render an annotation ranking
pub(crate) fn format_ranks(ranks: &[AnnotationRank], style: &Style) -> String {
    if style.format == OutputFormat::Json {
        return to_json(ranks);
    }

    let mut out = String::new();
    for (i, rank) in ranks.iter().enumerate() {
        if i > 0 {
            out.push('\n');
        }
        let _ = write!(
            out,
            "{:>3}. {:<16} {}",
            i + 1,
            rank.annotation,
            style.green(&constant(rank.best_constant))
        );
    }
    out
}

/// One annotation per line, in enumeration order
pub(crate) fn format_annotations(annotations: &[Annotation], style: &Style) -> String {
    if style.format == OutputFormat::Json {
        let entries: Vec<serde_json::Value> = annotations
            .iter()
            .map(|a| {
                serde_json::json!({
                    "compact": a.compact(),
                    "length": a.len(),
                    "max_depth": a.max_depth(),
                    "kinds": a,
                })
            })
            .collect();
        return to_json(&entries);
    }

    annotations
        .iter()
        .map(|a| {
            if style.verbose {
                format!("{:<16} {}", a.compact(), a)
            } else {
                a.compact()
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Confirmation line for a verified witness
pub(crate) fn format_verified(witness: &WitnessReport, catalog: &str, style: &Style) -> String {
    if style.format == OutputFormat::Json {
        return to_json(&serde_json::json!({
            "verified": true,
            "catalog": catalog,
            "annotation": witness.compact,
            "constant": witness.constant_exact,
        }));
    }
    format!(
        "{} {} at c = {} ({} catalog)",
        style.green("verified:"),
        witness.compact,
        witness.constant_exact,
        catalog
    )
}

/// Print an error message to stderr in red
pub(crate) fn eprintln_colored(color: bool, text: &str) {
    if color {
        eprintln!("{}", text.if_supports_color(Stream::Stderr, |t| t.red()));
    } else {
        eprintln!("{}", text);
    }
}
