use rand::distributions::{Distribution, WeightedIndex};
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::candidates::CandidateSet;

/// Marks the best-scoring candidate as selected and returns its index.
pub fn select_greedy(candidates: &mut CandidateSet) -> Option<usize> {
    let best = candidates.argmax()?;
    candidates.select(best);
    Some(best)
}

/// Final weighted draw over whatever candidates the stages left.
///
/// The RNG is created once per stream and advanced by every draw.
pub struct DistSelector {
    rng: StdRng,
}

impl DistSelector {
    /// `None` seeds from OS entropy.
    pub fn new(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self { rng }
    }

    /// Draw one candidate and mark it selected.
    ///
    /// Falls back to the highest-logit candidate when the probabilities
    /// cannot form a distribution (all zero or non-finite).
    pub fn select(&mut self, candidates: &mut CandidateSet) -> Option<usize> {
        if candidates.is_empty() {
            return None;
        }

        candidates.softmax();

        let dist = match WeightedIndex::new(candidates.items().iter().map(|c| c.prob)) {
            Ok(d) => d,
            Err(err) => {
                tracing::debug!(%err, "degenerate distribution, selecting highest logit");
                return select_greedy(candidates);
            }
        };

        let index = dist.sample(&mut self.rng);
        candidates.select(index);
        Some(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_greedy() {
        let mut set = CandidateSet::from_logits(&[0.1, 0.9, 0.3]);
        assert_eq!(select_greedy(&mut set), Some(1));
        assert_eq!(set.selected_candidate().map(|c| c.id), Some(1));
    }

    #[test]
    fn test_empty() {
        let mut set = CandidateSet::new();
        assert_eq!(select_greedy(&mut set), None);
        assert_eq!(DistSelector::new(Some(0)).select(&mut set), None);
    }

    #[test]
    fn test_same_seed_same_draws() {
        let logits = [1.0, 1.2, 0.8, 1.1, 0.9];
        let draw = |seed| {
            let mut selector = DistSelector::new(Some(seed));
            let mut set = CandidateSet::new();
            (0..20)
                .map(|_| {
                    set.load(&logits);
                    selector.select(&mut set);
                    set.selected_candidate().map(|c| c.id)
                })
                .collect::<Vec<_>>()
        };
        assert_eq!(draw(42), draw(42));
    }

    #[test]
    fn test_rng_advances_between_draws() {
        let mut selector = DistSelector::new(Some(7));
        let mut set = CandidateSet::new();
        let mut seen = std::collections::HashSet::new();
        for _ in 0..50 {
            set.load(&[0.0; 4]);
            selector.select(&mut set);
            seen.insert(set.selected_candidate().map(|c| c.id));
        }
        assert!(seen.len() > 1);
    }

    #[test]
    fn test_dominant_token_wins() {
        let mut selector = DistSelector::new(Some(1));
        let mut set = CandidateSet::new();
        for _ in 0..20 {
            set.load(&[0.0, 50.0, 0.0]);
            selector.select(&mut set);
            assert_eq!(set.selected_candidate().map(|c| c.id), Some(1));
        }
    }

    #[test]
    fn test_degenerate_falls_back_to_argmax() {
        let mut selector = DistSelector::new(Some(3));
        let mut set = CandidateSet::from_logits(&[f32::NEG_INFINITY, f32::NEG_INFINITY]);
        assert!(selector.select(&mut set).is_some());
        assert_eq!(set.selected_candidate().map(|c| c.id), Some(0));
    }
}
