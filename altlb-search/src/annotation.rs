//! Annotations and their enumeration.
//!
//! An [`Annotation`] is a validated, non-empty sequence of rule kinds. It
//! can only be obtained through [`Annotation::new`], [`Annotation::parse`]
//! or the [`AnnotationEnumerator`], so every annotation seen by the program
//! builder satisfies the catalog's start, end, adjacency and depth rules.
//!
//! The enumerator walks the rule graph depth-first with an explicit stack,
//! shortest lengths first and lexicographically by [`RuleKind`] within a
//! length. A reachability table precomputed for the catalog prunes every
//! prefix that cannot be completed, so only admissible annotations are
//! ever materialized.

use crate::catalog::{RuleCatalog, RuleKind};
use crate::error::AnnotationError;
use serde::Serialize;
use smallvec::SmallVec;
use std::fmt;

/// A validated rule sequence.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Annotation {
    kinds: SmallVec<[RuleKind; 16]>,
}

impl Annotation {
    /// Validate `kinds` against `catalog`.
    pub fn new(
        catalog: &RuleCatalog,
        kinds: impl IntoIterator<Item = RuleKind>,
    ) -> Result<Self, AnnotationError> {
        let kinds: SmallVec<[RuleKind; 16]> = kinds.into_iter().collect();
        let (&first, &last) = match (kinds.first(), kinds.last()) {
            (Some(first), Some(last)) => (first, last),
            _ => return Err(AnnotationError::Empty),
        };

        if let Some((position, &kind)) = kinds
            .iter()
            .enumerate()
            .find(|(_, kind)| !catalog.contains(**kind))
        {
            return Err(AnnotationError::UnknownKind { position, kind });
        }
        if !catalog.is_initial(first) {
            return Err(AnnotationError::NotInitial(first));
        }
        if !catalog.is_terminal(last) {
            return Err(AnnotationError::NotTerminal(last));
        }

        let mut depth = 0;
        for (position, &kind) in kinds.iter().enumerate() {
            if position > 0 {
                let from = kinds[position - 1];
                if !catalog.rules_following(from).contains(&kind) {
                    return Err(AnnotationError::IllegalAdjacency {
                        position,
                        from,
                        to: kind,
                    });
                }
            }
            depth = catalog.step_depth(depth, kind);
            if !catalog.admits_depth(depth, position + 1 == kinds.len()) {
                return Err(AnnotationError::Depth { position, depth });
            }
        }

        Ok(Self { kinds })
    }

    /// Parse the compact form, e.g. `O--` for `[Open, Slowdown, Slowdown]`.
    ///
    /// Whitespace and commas are ignored.
    pub fn parse(catalog: &RuleCatalog, text: &str) -> Result<Self, AnnotationError> {
        let kinds = text
            .chars()
            .filter(|c| !c.is_whitespace() && *c != ',')
            .map(|c| RuleKind::from_symbol(c).ok_or(AnnotationError::Symbol(c)))
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(catalog, kinds)
    }

    fn from_validated(kinds: SmallVec<[RuleKind; 16]>) -> Self {
        Self { kinds }
    }

    /// Rule kinds in order.
    pub fn kinds(&self) -> &[RuleKind] {
        &self.kinds
    }

    /// Number of rules. The annotation spans `len() + 1` lines.
    pub fn len(&self) -> usize {
        self.kinds.len()
    }

    /// Always false for a validated annotation.
    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty()
    }

    /// Quantifier depth of every line, starting with line 0 (depth 0).
    pub fn depth_profile(&self) -> Vec<i32> {
        let mut profile = Vec::with_capacity(self.kinds.len() + 1);
        let mut depth = 0;
        profile.push(depth);
        for kind in &self.kinds {
            depth += kind.quantifier_delta();
            profile.push(depth);
        }
        profile
    }

    /// Largest quantifier depth reached.
    pub fn max_depth(&self) -> usize {
        self.depth_profile()
            .into_iter()
            .max()
            .map_or(0, |depth| depth.max(0) as usize)
    }

    /// Number of `(a, b)` pairs per line.
    pub fn width(&self) -> usize {
        (self.max_depth() + 1).max(3)
    }

    /// Compact form, inverse of [`Annotation::parse`].
    pub fn compact(&self) -> String {
        self.kinds.iter().map(|kind| kind.symbol()).collect()
    }
}

impl fmt::Display for Annotation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (i, kind) in self.kinds.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{kind}")?;
        }
        f.write_str("]")
    }
}

/// `reach[remaining][kind][depth]`: a line reached by `kind` at `depth` can
/// be completed with exactly `remaining` more rules.
#[derive(Debug, Clone)]
struct Reachability {
    table: Vec<[Vec<bool>; 3]>,
    max_depth: i32,
}

impl Reachability {
    fn new(catalog: &RuleCatalog, max_length: usize) -> Self {
        let max_depth = 2 * max_length as i32 + 2;
        let levels = max_length.max(1);
        let mut table: Vec<[Vec<bool>; 3]> = Vec::with_capacity(levels);
        let slots = max_depth as usize + 1;

        let mut done = std::array::from_fn(|_| vec![false; slots]);
        for kind in catalog.kinds() {
            for depth in 0..=max_depth {
                done[kind.index()][depth as usize] =
                    catalog.is_terminal(kind) && catalog.admits_depth(depth, true);
            }
        }
        table.push(done);

        for remaining in 1..levels {
            let mut level: [Vec<bool>; 3] = std::array::from_fn(|_| vec![false; slots]);
            for kind in catalog.kinds() {
                for depth in 0..=max_depth {
                    level[kind.index()][depth as usize] =
                        catalog.rules_following(kind).iter().any(|&next| {
                            let next_depth = catalog.step_depth(depth, next);
                            (0..=max_depth).contains(&next_depth)
                                && catalog.admits_depth(next_depth, remaining == 1)
                                && table[remaining - 1][next.index()][next_depth as usize]
                        });
                }
            }
            table.push(level);
        }

        Self { table, max_depth }
    }

    fn can_finish(&self, remaining: usize, kind: RuleKind, depth: i32) -> bool {
        (0..=self.max_depth).contains(&depth)
            && self
                .table
                .get(remaining)
                .is_some_and(|level| level[kind.index()][depth as usize])
    }
}

#[derive(Debug, Clone)]
struct Frame {
    candidates: SmallVec<[(RuleKind, i32); 4]>,
    cursor: usize,
}

/// Lazily yields every admissible annotation up to a maximum length.
///
/// Cloning an enumerator that has not been advanced restarts it.
#[derive(Debug, Clone)]
pub struct AnnotationEnumerator<'a> {
    catalog: &'a RuleCatalog,
    max_length: usize,
    length: usize,
    fresh: bool,
    stack: Vec<Frame>,
    reach: Reachability,
}

impl<'a> AnnotationEnumerator<'a> {
    /// Enumerate annotations of length `1..=max_length`.
    pub fn new(catalog: &'a RuleCatalog, max_length: usize) -> Self {
        Self {
            catalog,
            max_length,
            length: 1,
            fresh: true,
            stack: Vec::new(),
            reach: Reachability::new(catalog, max_length),
        }
    }

    /// Maximum length enumerated.
    pub fn max_length(&self) -> usize {
        self.max_length
    }

    /// Viable next rules at `position` after `prev`, in kind order.
    fn candidates(
        &self,
        prev: Option<(RuleKind, i32)>,
        position: usize,
    ) -> SmallVec<[(RuleKind, i32); 4]> {
        let (options, depth) = match prev {
            None => (self.catalog.initial_kinds(), 0),
            Some((kind, depth)) => (self.catalog.rules_following(kind), depth),
        };
        let remaining = self.length - position - 1;
        options
            .iter()
            .map(|&kind| (kind, self.catalog.step_depth(depth, kind)))
            .filter(|&(kind, next)| {
                self.catalog.admits_depth(next, remaining == 0)
                    && self.reach.can_finish(remaining, kind, next)
            })
            .collect()
    }

    fn advance_length(&mut self) {
        self.length += 1;
        self.fresh = true;
        self.stack.clear();
    }
}

impl Iterator for AnnotationEnumerator<'_> {
    type Item = Annotation;

    fn next(&mut self) -> Option<Annotation> {
        loop {
            if self.length > self.max_length {
                return None;
            }
            if self.fresh {
                self.fresh = false;
                let candidates = self.candidates(None, 0);
                if candidates.is_empty() {
                    self.advance_length();
                    continue;
                }
                self.stack.push(Frame {
                    candidates,
                    cursor: 0,
                });
            }

            let Some(top) = self.stack.last() else {
                self.advance_length();
                continue;
            };
            if top.cursor >= top.candidates.len() {
                self.stack.pop();
                if let Some(parent) = self.stack.last_mut() {
                    parent.cursor += 1;
                }
                continue;
            }

            let current = top.candidates[top.cursor];
            if self.stack.len() == self.length {
                let kinds = self
                    .stack
                    .iter()
                    .map(|frame| frame.candidates[frame.cursor].0)
                    .collect();
                if let Some(top) = self.stack.last_mut() {
                    top.cursor += 1;
                }
                return Some(Annotation::from_validated(kinds));
            }

            let position = self.stack.len();
            let candidates = self.candidates(Some(current), position);
            // An empty frame is popped on the next turn, advancing its parent.
            self.stack.push(Frame {
                candidates,
                cursor: 0,
            });
        }
    }
}

impl RuleCatalog {
    /// Enumerate the catalog's annotations up to `max_length`.
    pub fn enumerate(&self, max_length: usize) -> AnnotationEnumerator<'_> {
        AnnotationEnumerator::new(self, max_length)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use RuleKind::{Open, Slowdown, Speedup};

    fn compact_all(catalog: &RuleCatalog, max_length: usize) -> Vec<String> {
        catalog.enumerate(max_length).map(|a| a.compact()).collect()
    }

    #[test]
    fn test_standard_lengths_follow_catalan() {
        let catalog = RuleCatalog::standard();
        let all: Vec<Annotation> = catalog.enumerate(7).collect();
        let count = |len| all.iter().filter(|a| a.len() == len).count();
        assert_eq!(count(1), 0);
        assert_eq!(count(2), 0);
        assert_eq!(count(3), 1);
        assert_eq!(count(4), 0);
        assert_eq!(count(5), 2);
        assert_eq!(count(7), 5);
    }

    #[test]
    fn test_standard_order() {
        let catalog = RuleCatalog::standard();
        assert_eq!(compact_all(&catalog, 5), vec!["O--", "O+---", "O-+--"]);
    }

    #[test]
    fn test_lengths_ascending() {
        let catalog = RuleCatalog::standard();
        let lengths: Vec<usize> = catalog.enumerate(9).map(|a| a.len()).collect();
        assert!(lengths.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(lengths.len(), 1 + 2 + 5 + 14);
    }

    #[test]
    fn test_enumeration_is_restartable() {
        let catalog = RuleCatalog::standard();
        let enumerator = catalog.enumerate(7);
        let first: Vec<_> = enumerator.clone().collect();
        let second: Vec<_> = enumerator.collect();
        assert_eq!(first, second);
    }

    #[test]
    fn test_two_step_enumeration() {
        let catalog = RuleCatalog::two_step();
        assert!(catalog.enumerate(1).next().is_none());
        let all: Vec<_> = catalog.enumerate(2).collect();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].kinds(), &[Speedup, Slowdown]);
        assert_eq!(catalog.enumerate(6).count(), 1);
    }

    #[test]
    fn test_zero_max_length() {
        let catalog = RuleCatalog::standard();
        assert_eq!(catalog.enumerate(0).count(), 0);
    }

    #[test]
    fn test_enumerated_annotations_validate() {
        let catalog = RuleCatalog::standard();
        for annotation in catalog.enumerate(9) {
            let rebuilt = Annotation::new(&catalog, annotation.kinds().iter().copied()).unwrap();
            assert_eq!(rebuilt, annotation);
        }
    }

    #[test]
    fn test_validation_errors() {
        let catalog = RuleCatalog::standard();
        assert_eq!(
            Annotation::new(&catalog, Vec::<RuleKind>::new()).unwrap_err(),
            AnnotationError::Empty
        );
        assert_eq!(
            Annotation::new(&catalog, [Slowdown]).unwrap_err(),
            AnnotationError::NotInitial(Slowdown)
        );
        assert_eq!(
            Annotation::new(&catalog, [Open, Speedup]).unwrap_err(),
            AnnotationError::NotTerminal(Speedup)
        );
        assert_eq!(
            Annotation::new(&catalog, [Open, Open, Slowdown]).unwrap_err(),
            AnnotationError::IllegalAdjacency {
                position: 1,
                from: Open,
                to: Open
            }
        );
        // Depth returns to zero too early.
        assert_eq!(
            Annotation::new(&catalog, [Open, Slowdown, Slowdown, Speedup, Slowdown]).unwrap_err(),
            AnnotationError::Depth {
                position: 2,
                depth: 0
            }
        );
        assert!(matches!(
            Annotation::new(&RuleCatalog::two_step(), [Open, Slowdown]),
            Err(AnnotationError::UnknownKind { position: 0, .. })
        ));
    }

    #[test]
    fn test_parse_and_display() {
        let catalog = RuleCatalog::standard();
        let annotation = Annotation::parse(&catalog, "O+---").unwrap();
        assert_eq!(annotation.kinds(), &[Open, Speedup, Slowdown, Slowdown, Slowdown]);
        assert_eq!(
            annotation.to_string(),
            "[Open, Speedup, Slowdown, Slowdown, Slowdown]"
        );
        assert_eq!(annotation.compact(), "O+---");
        assert_eq!(Annotation::parse(&catalog, "O - -").unwrap().len(), 3);
        assert_eq!(
            Annotation::parse(&catalog, "OX").unwrap_err(),
            AnnotationError::Symbol('X')
        );
    }

    #[test]
    fn test_depth_profile_and_width() {
        let catalog = RuleCatalog::standard();
        let annotation = Annotation::parse(&catalog, "O+---").unwrap();
        assert_eq!(annotation.depth_profile(), vec![0, 2, 3, 2, 1, 0]);
        assert_eq!(annotation.max_depth(), 3);
        assert_eq!(annotation.width(), 4);

        let short = Annotation::parse(&catalog, "O--").unwrap();
        assert_eq!(short.width(), 3);
    }
}
