//! Rule Catalog.
//!
//! The proof rules form a closed set ([`RuleKind`]). A [`RuleCatalog`]
//! selects which kinds may start and end an annotation, which kinds may
//! follow each other, and how quantifier depth is policed. Catalogs are
//! immutable after construction and shared read-only by the enumerator,
//! the program builder and every worker thread.

use crate::error::CatalogError;
use num_rational::BigRational;
use num_traits::{One, Signed};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// A proof-step kind.
///
/// The declaration order is the enumeration order of annotations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleKind {
    /// First speedup, applied to a quantifier-free line; adds two quantifiers
    Open,
    /// Speedup of the innermost deterministic tail; adds one quantifier
    Speedup,
    /// Slowdown by the simulation assumption; removes one quantifier
    Slowdown,
}

impl RuleKind {
    /// Every kind, in enumeration order.
    pub const ALL: [RuleKind; 3] = [RuleKind::Open, RuleKind::Speedup, RuleKind::Slowdown];

    /// Dense index in `0..3`.
    pub fn index(self) -> usize {
        match self {
            Self::Open => 0,
            Self::Speedup => 1,
            Self::Slowdown => 2,
        }
    }

    /// Change in the number of quantifiers caused by the rule.
    pub fn quantifier_delta(self) -> i32 {
        match self {
            Self::Open => 2,
            Self::Speedup => 1,
            Self::Slowdown => -1,
        }
    }

    /// Names of the free parameters of the rule.
    pub fn parameters(self) -> &'static [&'static str] {
        match self {
            Self::Open | Self::Speedup => &["x"],
            Self::Slowdown => &[],
        }
    }

    /// Whether the rule carries a speedup parameter.
    pub fn has_parameter(self) -> bool {
        !self.parameters().is_empty()
    }

    /// Single-character form used in compact annotations.
    pub fn symbol(self) -> char {
        match self {
            Self::Open => 'O',
            Self::Speedup => '+',
            Self::Slowdown => '-',
        }
    }

    /// Inverse of [`RuleKind::symbol`].
    pub fn from_symbol(symbol: char) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.symbol() == symbol)
    }

    /// Human readable name.
    pub fn name(self) -> &'static str {
        match self {
            Self::Open => "Open",
            Self::Speedup => "Speedup",
            Self::Slowdown => "Slowdown",
        }
    }
}

impl fmt::Display for RuleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Immutable descriptor of a rule in a catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rule {
    /// Kind of the rule
    pub kind: RuleKind,
    /// Whether an annotation may start with this rule
    pub initial: bool,
    /// Whether an annotation may end with this rule
    pub terminal: bool,
    /// Kinds allowed immediately after this rule, sorted
    pub following: Vec<RuleKind>,
}

impl Rule {
    /// Number of free parameters.
    pub fn arity(&self) -> usize {
        self.kind.parameters().len()
    }
}

/// How quantifier depth constrains admissible annotations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Alternation {
    /// Depth stays positive on interior lines and returns to zero at the end
    #[default]
    Balanced,
    /// Only start, end and adjacency are enforced
    Unchecked,
}

/// Built-in catalogs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CatalogChoice {
    /// Open, Speedup and Slowdown with balanced alternation
    #[default]
    Standard,
    /// A single Speedup followed by a single Slowdown
    TwoStep,
}

impl CatalogChoice {
    /// Instantiate the catalog.
    pub fn build(self) -> RuleCatalog {
        match self {
            Self::Standard => RuleCatalog::standard(),
            Self::TwoStep => RuleCatalog::two_step(),
        }
    }

    /// Stable name, as accepted by [`FromStr`].
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Standard => "standard",
            Self::TwoStep => "two-step",
        }
    }
}

impl fmt::Display for CatalogChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CatalogChoice {
    type Err = CatalogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "standard" => Ok(Self::Standard),
            "two-step" | "two_step" | "twostep" => Ok(Self::TwoStep),
            other => Err(CatalogError::UnknownCatalog(other.to_string())),
        }
    }
}

/// A closed set of rules with adjacency and alternation policy.
#[derive(Debug, Clone, PartialEq)]
pub struct RuleCatalog {
    name: String,
    rules: BTreeMap<RuleKind, Rule>,
    initial: Vec<RuleKind>,
    terminal: Vec<RuleKind>,
    alternation: Alternation,
    alpha: BigRational,
}

impl RuleCatalog {
    /// Create a catalog from an adjacency list.
    ///
    /// Kinds mentioned anywhere become part of the catalog. `Open` may
    /// only start an annotation because it needs a quantifier-free line.
    pub fn new(
        name: impl Into<String>,
        adjacency: &[(RuleKind, RuleKind)],
        initial: &[RuleKind],
        terminal: &[RuleKind],
        alternation: Alternation,
    ) -> Result<Self, CatalogError> {
        if initial.is_empty() {
            return Err(CatalogError::NoInitialRule);
        }
        if terminal.is_empty() {
            return Err(CatalogError::NoTerminalRule);
        }
        if let Some((from, _)) = adjacency.iter().find(|(_, to)| *to == RuleKind::Open) {
            return Err(CatalogError::OpenNotInitial(*from));
        }

        let mut rules: BTreeMap<RuleKind, Rule> = BTreeMap::new();
        let mentioned = adjacency
            .iter()
            .flat_map(|(from, to)| [*from, *to])
            .chain(initial.iter().copied())
            .chain(terminal.iter().copied());
        for kind in mentioned {
            rules.entry(kind).or_insert_with(|| Rule {
                kind,
                initial: initial.contains(&kind),
                terminal: terminal.contains(&kind),
                following: Vec::new(),
            });
        }
        for &(from, to) in adjacency {
            if let Some(rule) = rules.get_mut(&from)
                && !rule.following.contains(&to)
            {
                rule.following.push(to);
            }
        }
        for rule in rules.values_mut() {
            rule.following.sort();
        }

        let mut initial = initial.to_vec();
        initial.sort();
        initial.dedup();
        let mut terminal = terminal.to_vec();
        terminal.sort();
        terminal.dedup();

        Ok(Self {
            name: name.into(),
            rules,
            initial,
            terminal,
            alternation,
            alpha: BigRational::one(),
        })
    }

    /// The alternation-trading rule set: `Open`, then any mix of speedups
    /// and slowdowns that returns to a quantifier-free line only at the end.
    pub fn standard() -> Self {
        use RuleKind::{Open, Slowdown, Speedup};
        let adjacency = [
            (Open, Speedup),
            (Open, Slowdown),
            (Speedup, Speedup),
            (Speedup, Slowdown),
            (Slowdown, Speedup),
            (Slowdown, Slowdown),
        ];
        Self::from_builtin("standard", &adjacency, &[Open], &[Slowdown], Alternation::Balanced)
    }

    /// The smallest catalog: `Speedup -> Slowdown`, no depth policing.
    ///
    /// Its only annotation proves exactly the constants `c <= 1`.
    pub fn two_step() -> Self {
        use RuleKind::{Slowdown, Speedup};
        Self::from_builtin(
            "two-step",
            &[(Speedup, Slowdown)],
            &[Speedup],
            &[Slowdown],
            Alternation::Unchecked,
        )
    }

    fn from_builtin(
        name: &str,
        adjacency: &[(RuleKind, RuleKind)],
        initial: &[RuleKind],
        terminal: &[RuleKind],
        alternation: Alternation,
    ) -> Self {
        match Self::new(name, adjacency, initial, terminal, alternation) {
            Ok(catalog) => catalog,
            Err(err) => unreachable!("built-in catalog `{name}` is invalid: {err}"),
        }
    }

    /// Replace the slowdown input weight `alpha` (default 1).
    pub fn with_alpha(mut self, alpha: f64) -> Result<Self, CatalogError> {
        match altlb_math::rational::from_f64(alpha) {
            Some(value) if value.is_positive() => {
                self.alpha = value;
                Ok(self)
            }
            _ => Err(CatalogError::InvalidAlpha(alpha)),
        }
    }

    /// Catalog name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Slowdown input weight, exact.
    pub fn alpha(&self) -> &BigRational {
        &self.alpha
    }

    /// Slowdown input weight as a float.
    pub fn alpha_f64(&self) -> f64 {
        altlb_math::rational::to_f64(&self.alpha)
    }

    /// Alternation policy.
    pub fn alternation(&self) -> Alternation {
        self.alternation
    }

    /// Kinds present in the catalog, sorted.
    pub fn kinds(&self) -> impl Iterator<Item = RuleKind> + '_ {
        self.rules.keys().copied()
    }

    /// Whether `kind` belongs to the catalog.
    pub fn contains(&self, kind: RuleKind) -> bool {
        self.rules.contains_key(&kind)
    }

    /// Descriptor of `kind`, if present.
    pub fn rule(&self, kind: RuleKind) -> Option<&Rule> {
        self.rules.get(&kind)
    }

    /// Descriptors of the rules an annotation may begin with, restricted to `kind`.
    pub fn rules_starting_with(&self, kind: RuleKind) -> Vec<&Rule> {
        self.rules
            .get(&kind)
            .filter(|rule| rule.initial)
            .into_iter()
            .collect()
    }

    /// Kinds that may start an annotation, sorted.
    pub fn initial_kinds(&self) -> &[RuleKind] {
        &self.initial
    }

    /// Kinds that may end an annotation, sorted.
    pub fn terminal_kinds(&self) -> &[RuleKind] {
        &self.terminal
    }

    /// Kinds legally adjacent after `kind`, sorted. Empty for unknown kinds.
    pub fn rules_following(&self, kind: RuleKind) -> &[RuleKind] {
        self.rules
            .get(&kind)
            .map(|rule| rule.following.as_slice())
            .unwrap_or(&[])
    }

    /// Whether `kind` may start an annotation.
    pub fn is_initial(&self, kind: RuleKind) -> bool {
        self.initial.contains(&kind)
    }

    /// Whether `kind` may end an annotation.
    pub fn is_terminal(&self, kind: RuleKind) -> bool {
        self.terminal.contains(&kind)
    }

    /// Running depth after applying `kind` at `depth`, as tracked by the policy.
    ///
    /// Under [`Alternation::Unchecked`] depth is not tracked and stays 0.
    pub fn step_depth(&self, depth: i32, kind: RuleKind) -> i32 {
        match self.alternation {
            Alternation::Balanced => depth + kind.quantifier_delta(),
            Alternation::Unchecked => 0,
        }
    }

    /// Whether a line of the given tracked depth is admissible.
    pub fn admits_depth(&self, depth: i32, is_final: bool) -> bool {
        match self.alternation {
            Alternation::Balanced if is_final => depth == 0,
            Alternation::Balanced => depth >= 1,
            Alternation::Unchecked => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use RuleKind::{Open, Slowdown, Speedup};

    #[test]
    fn test_standard_catalog() {
        let catalog = RuleCatalog::standard();
        assert_eq!(catalog.initial_kinds(), &[Open]);
        assert_eq!(catalog.terminal_kinds(), &[Slowdown]);
        assert_eq!(catalog.rules_following(Open), &[Speedup, Slowdown]);
        assert_eq!(catalog.rules_following(Slowdown), &[Speedup, Slowdown]);
        assert!(catalog.is_initial(Open));
        assert!(!catalog.is_initial(Speedup));
        assert!(catalog.is_terminal(Slowdown));
        assert_eq!(catalog.alternation(), Alternation::Balanced);
        assert_eq!(catalog.alpha_f64(), 1.0);
    }

    #[test]
    fn test_two_step_catalog() {
        let catalog = RuleCatalog::two_step();
        assert_eq!(catalog.kinds().collect::<Vec<_>>(), vec![Speedup, Slowdown]);
        assert_eq!(catalog.rules_following(Speedup), &[Slowdown]);
        assert!(catalog.rules_following(Slowdown).is_empty());
        assert!(catalog.rules_following(Open).is_empty());
        assert!(!catalog.contains(Open));
    }

    #[test]
    fn test_rules_starting_with() {
        let catalog = RuleCatalog::standard();
        let open = catalog.rules_starting_with(Open);
        assert_eq!(open.len(), 1);
        assert_eq!(open[0].arity(), 1);
        assert!(catalog.rules_starting_with(Slowdown).is_empty());
    }

    #[test]
    fn test_open_must_be_initial() {
        let err = RuleCatalog::new(
            "bad",
            &[(Slowdown, Open)],
            &[Open],
            &[Slowdown],
            Alternation::Balanced,
        )
        .unwrap_err();
        assert!(matches!(err, CatalogError::OpenNotInitial(Slowdown)));
    }

    #[test]
    fn test_missing_endpoints() {
        assert!(matches!(
            RuleCatalog::new("x", &[], &[], &[Slowdown], Alternation::Balanced),
            Err(CatalogError::NoInitialRule)
        ));
        assert!(matches!(
            RuleCatalog::new("x", &[], &[Open], &[], Alternation::Balanced),
            Err(CatalogError::NoTerminalRule)
        ));
    }

    #[test]
    fn test_alpha_validation() {
        let catalog = RuleCatalog::standard().with_alpha(0.5).unwrap();
        assert_eq!(catalog.alpha_f64(), 0.5);
        assert!(RuleCatalog::standard().with_alpha(0.0).is_err());
        assert!(RuleCatalog::standard().with_alpha(f64::NAN).is_err());
    }

    #[test]
    fn test_depth_policy() {
        let standard = RuleCatalog::standard();
        assert_eq!(standard.step_depth(0, Open), 2);
        assert_eq!(standard.step_depth(2, Slowdown), 1);
        assert!(standard.admits_depth(1, false));
        assert!(!standard.admits_depth(0, false));
        assert!(standard.admits_depth(0, true));
        assert!(!standard.admits_depth(1, true));

        let two_step = RuleCatalog::two_step();
        assert_eq!(two_step.step_depth(0, Speedup), 0);
        assert!(two_step.admits_depth(0, false));
    }

    #[test]
    fn test_symbols_round_trip() {
        for kind in RuleKind::ALL {
            assert_eq!(RuleKind::from_symbol(kind.symbol()), Some(kind));
        }
        assert_eq!(RuleKind::from_symbol('x'), None);
    }

    #[test]
    fn test_catalog_choice_parse() {
        assert_eq!("standard".parse::<CatalogChoice>().unwrap(), CatalogChoice::Standard);
        assert_eq!("two-step".parse::<CatalogChoice>().unwrap(), CatalogChoice::TwoStep);
        assert!("nope".parse::<CatalogChoice>().is_err());
        assert_eq!(CatalogChoice::TwoStep.build().name(), "two-step");
    }
}
