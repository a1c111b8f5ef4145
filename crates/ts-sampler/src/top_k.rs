use crate::candidates::CandidateSet;
use crate::history::RecencyBuffer;
use crate::sampler::SamplerStage;

/// Truncates the candidate set to its `k` best-scoring entries, leaving them
/// sorted for any probability stage that follows.
pub struct TopKSampler {
    k: i32,
}

impl TopKSampler {
    /// `k <= 0` disables the stage.
    pub fn new(k: i32) -> Self {
        Self { k }
    }
}

impl SamplerStage for TopKSampler {
    fn name(&self) -> &str {
        "top_k"
    }

    fn apply(&self, candidates: &mut CandidateSet, _history: &RecencyBuffer) {
        if self.k <= 0 {
            return;
        }
        candidates.keep_top(self.k as usize);
    }
}
