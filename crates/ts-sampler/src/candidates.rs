use std::cmp::Ordering;

/// Vocabulary entry identifier.
pub type Token = u32;

/// A token ID paired with its logit and (once normalized) its probability.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candidate {
    pub id: Token,
    pub logit: f32,
    /// Stale until a normalizing stage has run `CandidateSet::softmax`.
    pub prob: f32,
}

/// Descending by logit, ascending by id among equal logits.
fn by_logit_desc(a: &Candidate, b: &Candidate) -> Ordering {
    b.logit.total_cmp(&a.logit).then_with(|| a.id.cmp(&b.id))
}

/// Working set of candidates for one sampling call.
///
/// Stages narrow or re-weight the set in place. Ids removed by a truncating
/// operation never come back until the next `load`, and no operation here
/// leaves the set empty once it has been loaded with at least one logit.
#[derive(Debug, Default, Clone)]
pub struct CandidateSet {
    items: Vec<Candidate>,
    selected: Option<usize>,
    sorted: bool,
    /// `prob` fields hold a softmax over exactly the live items.
    normalized: bool,
}

impl CandidateSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a fresh set from a logits slice (token_id = index).
    pub fn from_logits(logits: &[f32]) -> Self {
        let mut set = Self::new();
        set.load(logits);
        set
    }

    /// Overwrite the set with `logits`, reusing the existing allocation.
    ///
    /// Clears the selection and the sorted flag. NaN scores are loaded as
    /// -inf so they can never outrank a real score.
    pub fn load(&mut self, logits: &[f32]) {
        self.items.clear();
        self.items.extend(logits.iter().enumerate().map(|(i, &logit)| Candidate {
            id: i as Token,
            logit: if logit.is_nan() { f32::NEG_INFINITY } else { logit },
            prob: 0.0,
        }));
        self.selected = None;
        self.sorted = false;
        self.normalized = false;
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn items(&self) -> &[Candidate] {
        &self.items
    }

    /// Mutable access to the live candidates.
    ///
    /// Callers may rewrite logits arbitrarily, so the sorted flag is cleared.
    pub fn items_mut(&mut self) -> &mut [Candidate] {
        self.sorted = false;
        self.normalized = false;
        &mut self.items
    }

    /// Whether the items are ordered by descending logit.
    pub fn is_sorted(&self) -> bool {
        self.sorted
    }

    pub fn selected(&self) -> Option<usize> {
        self.selected
    }

    pub fn selected_candidate(&self) -> Option<&Candidate> {
        self.selected.and_then(|i| self.items.get(i))
    }

    /// Mark the candidate at `index` as the chosen one. Out-of-range indices are ignored.
    pub fn select(&mut self, index: usize) {
        if index < self.items.len() {
            self.selected = Some(index);
        }
    }

    /// Multiply every logit by `factor`. A positive factor preserves ordering.
    pub fn scale_logits(&mut self, factor: f32) {
        for c in self.items.iter_mut() {
            c.logit *= factor;
        }
        self.normalized = false;
        if factor <= 0.0 {
            self.sorted = false;
        }
    }

    /// Sort descending by logit. No-op when already sorted.
    pub fn sort(&mut self) {
        if self.sorted {
            return;
        }
        let selected_id = self.selected_candidate().map(|c| c.id);
        self.items.sort_unstable_by(by_logit_desc);
        self.sorted = true;
        if let Some(id) = selected_id {
            self.selected = self.items.iter().position(|c| c.id == id);
        }
    }

    /// Keep only the `k` highest-logit candidates, leaving them sorted.
    ///
    /// Unsorted input is partially sorted: a selection pass moves the top `k`
    /// to the front, then only that prefix is ordered.
    pub fn keep_top(&mut self, k: usize) {
        if k == 0 || k >= self.items.len() {
            return;
        }
        if !self.sorted {
            self.items.select_nth_unstable_by(k - 1, by_logit_desc);
            self.items.truncate(k);
            self.items.sort_unstable_by(by_logit_desc);
            self.sorted = true;
        } else {
            self.items.truncate(k);
        }
        self.selected = None;
        self.normalized = false;
    }

    /// Sort if needed and write softmax probabilities into every candidate.
    ///
    /// If the largest logit is not finite (every candidate at -inf) all
    /// probabilities are set to zero.
    pub fn softmax(&mut self) {
        if self.items.is_empty() {
            return;
        }
        self.sort();

        let max_logit = self.items[0].logit;
        if !max_logit.is_finite() {
            for c in self.items.iter_mut() {
                c.prob = 0.0;
            }
            self.normalized = false;
            return;
        }

        let mut sum = 0.0f32;
        for c in self.items.iter_mut() {
            c.prob = (c.logit - max_logit).exp();
            sum += c.prob;
        }
        for c in self.items.iter_mut() {
            c.prob /= sum;
        }
        self.normalized = true;
    }

    /// Drop everything past the first `n` candidates. `n == 0` is ignored.
    pub fn truncate(&mut self, n: usize) {
        if n == 0 || n >= self.items.len() {
            return;
        }
        self.items.truncate(n);
        self.normalized = false;
        if self.selected.is_some_and(|i| i >= n) {
            self.selected = None;
        }
    }

    /// Keep only the candidates matching `keep`, preserving relative order.
    ///
    /// When nothing would survive the set is left untouched and `false` is
    /// returned.
    pub fn retain_nonempty<F>(&mut self, mut keep: F) -> bool
    where
        F: FnMut(&Candidate) -> bool,
    {
        if !self.items.iter().any(&mut keep) {
            return false;
        }
        let selected_id = self.selected_candidate().map(|c| c.id);
        self.items.retain(|c| keep(c));
        self.normalized = false;
        self.selected = selected_id.and_then(|id| self.items.iter().position(|c| c.id == id));
        true
    }

    /// Index of the highest-logit candidate (lowest id among ties).
    pub fn argmax(&self) -> Option<usize> {
        if self.items.is_empty() {
            return None;
        }
        if self.sorted {
            return Some(0);
        }
        let mut best = 0;
        for (i, c) in self.items.iter().enumerate().skip(1) {
            if by_logit_desc(c, &self.items[best]) == Ordering::Less {
                best = i;
            }
        }
        Some(best)
    }

    /// Number of live candidates ranked above the one at `index`.
    pub fn rank_of(&self, index: usize) -> Option<usize> {
        let target = self.items.get(index)?;
        if self.sorted {
            return Some(index);
        }
        Some(
            self.items
                .iter()
                .filter(|c| by_logit_desc(c, target) == Ordering::Less)
                .count(),
        )
    }

    /// Softmax probability of the candidate at `index` over the live set.
    ///
    /// Reuses stored probabilities when they are current, otherwise computes
    /// the value without touching the set.
    pub fn probability_of(&self, index: usize) -> Option<f32> {
        let target = self.items.get(index)?;
        if self.normalized {
            return Some(target.prob);
        }
        let max_logit = self
            .items
            .iter()
            .map(|c| c.logit)
            .fold(f32::NEG_INFINITY, f32::max);
        if !max_logit.is_finite() {
            return Some(0.0);
        }
        let sum: f32 = self.items.iter().map(|c| (c.logit - max_logit).exp()).sum();
        Some((target.logit - max_logit).exp() / sum)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn ids(set: &CandidateSet) -> Vec<Token> {
        set.items().iter().map(|c| c.id).collect()
    }

    #[test]
    fn test_load_resets_state() {
        let mut set = CandidateSet::from_logits(&[1.0, 5.0, 2.0]);
        set.sort();
        set.select(0);
        set.load(&[3.0, 1.0]);
        assert_eq!(set.len(), 2);
        assert_eq!(ids(&set), vec![0, 1]);
        assert!(!set.is_sorted());
        assert!(set.selected().is_none());
        assert_eq!(set.items()[0].prob, 0.0);
    }

    #[test]
    fn test_nan_loads_as_neg_inf() {
        let mut set = CandidateSet::from_logits(&[1.0, f32::NAN, 0.5]);
        assert_eq!(set.items()[1].logit, f32::NEG_INFINITY);
        assert_eq!(set.argmax(), Some(0));
        set.softmax();
        assert_eq!(set.items()[0].id, 0);
        assert_eq!(set.items()[2].id, 1);
        assert_eq!(set.items()[2].prob, 0.0);
        assert!(set.items()[0].prob > 0.5);
    }

    #[test]
    fn test_rank_and_probability_unsorted() {
        let set = CandidateSet::from_logits(&[1.0, 5.0, 2.0, 4.0, 0.0]);
        assert_eq!(set.rank_of(1), Some(0));
        assert_eq!(set.rank_of(3), Some(1));
        assert_eq!(set.rank_of(4), Some(4));
        assert_eq!(set.rank_of(9), None);

        let mut sorted = set.clone();
        sorted.softmax();
        let p = set.probability_of(1).unwrap();
        assert_relative_eq!(p, sorted.items()[0].prob, epsilon = 1e-6);
        assert!(!set.is_sorted());
    }

    #[test]
    fn test_probability_after_truncation_is_renormalized() {
        let mut set = CandidateSet::from_logits(&[0.0, 0.0, 0.0, 0.0]);
        set.softmax();
        set.truncate(2);
        assert_relative_eq!(set.probability_of(0).unwrap(), 0.5, epsilon = 1e-6);
    }

    #[test]
    fn test_argmax_first_of_ties() {
        let set = CandidateSet::from_logits(&[1.0, 5.0, 2.0, 5.0]);
        assert_eq!(set.argmax(), Some(1));
        assert_eq!(CandidateSet::new().argmax(), None);
    }

    #[test]
    fn test_keep_top_partial_sort() {
        let mut set = CandidateSet::from_logits(&[1.0, 5.0, 2.0, 4.0, 0.0]);
        set.keep_top(3);
        assert_eq!(ids(&set), vec![1, 3, 2]);
        assert!(set.is_sorted());
    }

    #[test]
    fn test_keep_top_ties_prefer_low_ids() {
        let mut set = CandidateSet::from_logits(&[2.0, 2.0, 2.0, 2.0]);
        set.keep_top(2);
        assert_eq!(ids(&set), vec![0, 1]);
    }

    #[test]
    fn test_softmax_sums_to_one() {
        let mut set = CandidateSet::from_logits(&[1.0, 2.0, 3.0]);
        set.softmax();
        assert_eq!(ids(&set), vec![2, 1, 0]);
        let total: f32 = set.items().iter().map(|c| c.prob).sum();
        assert_relative_eq!(total, 1.0, epsilon = 1e-6);
        assert!(set.items()[0].prob > set.items()[1].prob);
    }

    #[test]
    fn test_softmax_all_neg_inf() {
        let mut set = CandidateSet::from_logits(&[f32::NEG_INFINITY, f32::NEG_INFINITY]);
        set.softmax();
        assert!(set.items().iter().all(|c| c.prob == 0.0));
    }

    #[test]
    fn test_sort_tracks_selection() {
        let mut set = CandidateSet::from_logits(&[1.0, 5.0, 2.0]);
        set.select(2);
        set.sort();
        assert_eq!(set.selected_candidate().map(|c| c.id), Some(2));
        assert_eq!(set.selected(), Some(1));
    }

    #[test]
    fn test_retain_nonempty_refuses_to_empty() {
        let mut set = CandidateSet::from_logits(&[1.0, 2.0, 3.0]);
        assert!(!set.retain_nonempty(|_| false));
        assert_eq!(set.len(), 3);
        assert!(set.retain_nonempty(|c| c.id != 1));
        assert_eq!(ids(&set), vec![0, 2]);
    }

    #[test]
    fn test_truncate_zero_is_ignored() {
        let mut set = CandidateSet::from_logits(&[1.0, 2.0]);
        set.truncate(0);
        assert_eq!(set.len(), 2);
        set.truncate(1);
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_scale_keeps_sorted_flag() {
        let mut set = CandidateSet::from_logits(&[1.0, 2.0]);
        set.sort();
        set.scale_logits(0.5);
        assert!(set.is_sorted());
        assert_relative_eq!(set.items()[0].logit, 1.0);
        let _ = set.items_mut();
        assert!(!set.is_sorted());
    }
}
