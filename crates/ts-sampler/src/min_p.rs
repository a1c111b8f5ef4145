use crate::candidates::CandidateSet;
use crate::history::RecencyBuffer;
use crate::sampler::SamplerStage;

/// Drops tokens whose probability falls below `p` times the probability of
/// the most likely token, keeping at least `min_keep`.
pub struct MinPSampler {
    p: f32,
    min_keep: usize,
}

impl MinPSampler {
    pub fn new(p: f32, min_keep: usize) -> Self {
        Self { p, min_keep }
    }
}

impl SamplerStage for MinPSampler {
    fn name(&self) -> &str {
        "min_p"
    }

    fn apply(&self, candidates: &mut CandidateSet, _history: &RecencyBuffer) {
        if self.p <= 0.0 || candidates.is_empty() {
            return;
        }

        candidates.softmax();

        let threshold = candidates.items()[0].prob * self.p;
        let kept = candidates
            .items()
            .iter()
            .take_while(|c| c.prob >= threshold)
            .count();

        candidates.truncate(kept.max(self.min_keep));
    }
}
