use crate::candidates::CandidateSet;
use crate::history::RecencyBuffer;
use crate::sampler::SamplerStage;

/// Nucleus sampling: keeps the smallest prefix of tokens (by descending
/// probability) whose cumulative probability reaches the threshold `p`,
/// never fewer than `min_keep`.
pub struct TopPSampler {
    p: f32,
    min_keep: usize,
}

impl TopPSampler {
    pub fn new(p: f32, min_keep: usize) -> Self {
        Self { p, min_keep }
    }
}

impl SamplerStage for TopPSampler {
    fn name(&self) -> &str {
        "top_p"
    }

    fn apply(&self, candidates: &mut CandidateSet, _history: &RecencyBuffer) {
        if self.p >= 1.0 || candidates.is_empty() {
            return;
        }

        candidates.softmax();

        // Shortest prefix with mass >= p and at least min_keep entries.
        let mut cumulative = 0.0f32;
        let mut cutoff = candidates.len();
        for (i, c) in candidates.items().iter().enumerate() {
            cumulative += c.prob;
            if cumulative >= self.p && i + 1 >= self.min_keep {
                cutoff = i + 1;
                break;
            }
        }

        candidates.truncate(cutoff);
    }
}
