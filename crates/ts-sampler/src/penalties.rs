use std::collections::HashMap;

use crate::candidates::{CandidateSet, Token};
use crate::history::RecencyBuffer;
use crate::sampler::SamplerStage;

/// Lowers the scores of tokens emitted within the last `last_n` steps.
///
/// For every candidate seen `count > 0` times in that window:
/// - Positive logits are divided by `repeat`, negative logits multiplied by it.
/// - `count * frequency + presence` is then subtracted.
pub struct PenaltiesSampler {
    last_n: usize,
    repeat: f32,
    frequency: f32,
    presence: f32,
}

impl PenaltiesSampler {
    /// `repeat` of 1.0 and `frequency`/`presence` of 0.0 leave logits as they are.
    pub fn new(last_n: usize, repeat: f32, frequency: f32, presence: f32) -> Self {
        Self {
            last_n,
            repeat,
            frequency,
            presence,
        }
    }

    /// True when applying the stage cannot change any logit.
    pub fn is_neutral(&self) -> bool {
        self.last_n == 0 || (self.repeat == 1.0 && self.frequency == 0.0 && self.presence == 0.0)
    }
}

impl SamplerStage for PenaltiesSampler {
    fn name(&self) -> &str {
        "penalties"
    }

    fn lookback(&self) -> usize {
        self.last_n
    }

    fn apply(&self, candidates: &mut CandidateSet, history: &RecencyBuffer) {
        if self.is_neutral() || history.is_empty() {
            return;
        }

        let mut counts: HashMap<Token, u32> = HashMap::new();
        for token in history.last_n(self.last_n) {
            *counts.entry(token).or_insert(0) += 1;
        }

        for c in candidates.items_mut() {
            let Some(&count) = counts.get(&c.id) else {
                continue;
            };
            if c.logit <= 0.0 {
                c.logit *= self.repeat;
            } else {
                c.logit /= self.repeat;
            }
            c.logit -= count as f32 * self.frequency + self.presence;
        }
    }
}
