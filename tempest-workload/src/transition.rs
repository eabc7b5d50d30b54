//! Weighted transitions between states.
//!
//! Outgoing edges keep the order they were declared in. That order decides
//! which target a given random draw lands on, so it is part of what makes a
//! seeded run reproducible.

use serde::{Deserialize, Serialize};

/// Order in which outgoing edges are walked when selecting a transition.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransitionOrder {
    /// Edges are walked in the order they were declared.
    #[default]
    Declared,
    /// Edges are walked sorted by target name.
    Lexicographic,
}

/// A single weighted edge.
#[derive(Debug, Clone, PartialEq)]
pub struct Edge {
    /// Target state name.
    pub target: String,
    /// Relative weight (not normalized).
    pub weight: f64,
}

/// Outgoing edges of one state, in declaration order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Transitions {
    edges: Vec<Edge>,
}

impl Transitions {
    /// Creates an empty edge set.
    #[must_use]
    pub const fn new() -> Self {
        Self { edges: Vec::new() }
    }

    /// Adds an edge, returning self for chaining.
    #[must_use]
    pub fn with(mut self, target: impl Into<String>, weight: f64) -> Self {
        self.insert(target, weight);
        self
    }

    /// Adds an edge or replaces the weight of an existing one in place.
    pub fn insert(&mut self, target: impl Into<String>, weight: f64) {
        let target = target.into();
        if let Some(edge) = self.edges.iter_mut().find(|e| e.target == target) {
            edge.weight = weight;
        } else {
            self.edges.push(Edge { target, weight });
        }
    }

    /// Removes the edge to `target`, returning its weight.
    pub fn remove(&mut self, target: &str) -> Option<f64> {
        let index = self.edges.iter().position(|e| e.target == target)?;
        Some(self.edges.remove(index).weight)
    }

    /// Returns the weight of the edge to `target`.
    #[must_use]
    pub fn weight(&self, target: &str) -> Option<f64> {
        self.edges
            .iter()
            .find(|e| e.target == target)
            .map(|e| e.weight)
    }

    /// Iterates edges in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = &Edge> {
        self.edges.iter()
    }

    /// Returns the number of edges.
    #[must_use]
    pub fn len(&self) -> usize {
        self.edges.len()
    }

    /// Returns true if there are no edges.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    /// Sum of all positive weights.
    #[must_use]
    pub fn total_weight(&self) -> f64 {
        self.edges
            .iter()
            .map(|e| e.weight)
            .filter(|w| *w > 0.0)
            .sum()
    }

    /// Returns edges in the requested walk order.
    #[must_use]
    pub fn ordered(&self, order: TransitionOrder) -> Vec<&Edge> {
        let mut edges: Vec<&Edge> = self.edges.iter().collect();
        if order == TransitionOrder::Lexicographic {
            edges.sort_by(|a, b| a.target.cmp(&b.target));
        }
        edges
    }
}

impl<S: Into<String>> FromIterator<(S, f64)> for Transitions {
    fn from_iter<I: IntoIterator<Item = (S, f64)>>(iter: I) -> Self {
        let mut transitions = Self::new();
        for (target, weight) in iter {
            transitions.insert(target, weight);
        }
        transitions
    }
}

/// Picks the next state from weighted outgoing edges.
#[derive(Debug, Clone, Copy, Default)]
pub struct TransitionSelector {
    order: TransitionOrder,
}

impl TransitionSelector {
    /// Creates a selector that walks edges in the given order.
    #[must_use]
    pub const fn new(order: TransitionOrder) -> Self {
        Self { order }
    }

    /// Returns the walk order.
    #[must_use]
    pub const fn order(&self) -> TransitionOrder {
        self.order
    }

    /// Selects the next state for a uniform draw in `[0, 1)`.
    ///
    /// Walks the cumulative weight in order and returns the first target whose
    /// cumulative weight exceeds `draw * total`. Returns `None` if no edge has
    /// positive weight.
    #[must_use]
    pub fn next<'a>(&self, transitions: &'a Transitions, draw: f64) -> Option<&'a str> {
        let total = transitions.total_weight();
        if total <= 0.0 || !total.is_finite() {
            return None;
        }

        let edges = transitions.ordered(self.order);
        let threshold = draw * total;
        let mut cumulative = 0.0;
        for edge in &edges {
            if edge.weight <= 0.0 {
                continue;
            }
            cumulative += edge.weight;
            if cumulative > threshold {
                return Some(edge.target.as_str());
            }
        }

        // Accumulated rounding can leave the last bucket just short.
        edges
            .iter()
            .rev()
            .find(|e| e.weight > 0.0)
            .map(|e| e.target.as_str())
    }
}

#[cfg(test)]
mod tests {
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha8Rng;

    use super::*;

    #[test]
    fn test_insert_preserves_declaration_order() {
        let mut t = Transitions::new().with("b", 1.0).with("a", 2.0);
        t.insert("b", 5.0);
        let targets: Vec<_> = t.iter().map(|e| e.target.as_str()).collect();
        assert_eq!(targets, vec!["b", "a"]);
        assert_eq!(t.weight("b"), Some(5.0));
        assert_eq!(t.remove("a"), Some(2.0));
        assert_eq!(t.len(), 1);
    }

    #[test]
    fn test_select_walks_cumulative_weights() {
        let t: Transitions = [("a", 1.0), ("b", 3.0)].into_iter().collect();
        let selector = TransitionSelector::default();

        assert_eq!(selector.next(&t, 0.0), Some("a"));
        assert_eq!(selector.next(&t, 0.24), Some("a"));
        assert_eq!(selector.next(&t, 0.25), Some("b"));
        assert_eq!(selector.next(&t, 0.999), Some("b"));
    }

    #[test]
    fn test_select_skips_zero_weights() {
        let t = Transitions::new().with("never", 0.0).with("always", 2.0);
        let selector = TransitionSelector::default();
        assert_eq!(selector.next(&t, 0.0), Some("always"));
        assert_eq!(selector.next(&t, 0.5), Some("always"));
    }

    #[test]
    fn test_select_empty_or_zero_total() {
        let selector = TransitionSelector::default();
        assert_eq!(selector.next(&Transitions::new(), 0.3), None);
        let zero = Transitions::new().with("a", 0.0);
        assert_eq!(selector.next(&zero, 0.3), None);
    }

    #[test]
    fn test_order_changes_selection_for_equal_weights() {
        let t = Transitions::new().with("zeta", 1.0).with("alpha", 1.0);

        let declared = TransitionSelector::new(TransitionOrder::Declared);
        let sorted = TransitionSelector::new(TransitionOrder::Lexicographic);

        assert_eq!(declared.next(&t, 0.1), Some("zeta"));
        assert_eq!(sorted.next(&t, 0.1), Some("alpha"));
    }

    #[test]
    fn test_select_self_loop() {
        let t = Transitions::new().with("steady", 1.0);
        let selector = TransitionSelector::default();
        for draw in [0.0, 0.5, 0.99] {
            assert_eq!(selector.next(&t, draw), Some("steady"));
        }
    }

    #[test]
    #[allow(clippy::cast_precision_loss)]
    fn test_selection_frequency_tracks_weights() {
        let t = Transitions::new()
            .with("read", 6.0)
            .with("write", 3.0)
            .with("delete", 1.0);
        let selector = TransitionSelector::default();
        let mut rng = ChaCha8Rng::seed_from_u64(7);

        let draws = 100_000;
        let mut counts = [0u32; 3];
        for _ in 0..draws {
            match selector.next(&t, rng.gen::<f64>()) {
                Some("read") => counts[0] += 1,
                Some("write") => counts[1] += 1,
                Some("delete") => counts[2] += 1,
                other => panic!("unexpected selection {other:?}"),
            }
        }

        let expected = [0.6, 0.3, 0.1];
        for (count, p) in counts.iter().zip(expected) {
            let observed = f64::from(*count) / f64::from(draws);
            assert!(
                (observed - p).abs() < 0.01,
                "observed {observed}, expected {p}"
            );
        }
    }
}
