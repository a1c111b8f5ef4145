use crate::candidates::CandidateSet;
use crate::history::RecencyBuffer;
use crate::sampler::SamplerStage;

/// Divides every logit by `temperature` so later probability stages see a
/// flatter (`t > 1`) or sharper (`t < 1`) distribution.
///
/// `t <= 0`, or a `t` so small that `1 / t` or the scaled logits leave the
/// f32 range, ends the chain with the top-scoring candidate selected.
pub struct TemperatureSampler {
    temperature: f32,
}

impl TemperatureSampler {
    pub fn new(temperature: f32) -> Self {
        Self { temperature }
    }

    pub fn temperature(&self) -> f32 {
        self.temperature
    }
}

impl SamplerStage for TemperatureSampler {
    fn name(&self) -> &str {
        "temp"
    }

    fn apply(&self, candidates: &mut CandidateSet, _history: &RecencyBuffer) {
        let factor = 1.0 / self.temperature;
        if self.temperature <= 0.0 || !factor.is_finite() || overflows(candidates, factor) {
            if let Some(best) = candidates.argmax() {
                candidates.select(best);
            }
            return;
        }

        candidates.scale_logits(factor);
    }
}

/// Whether scaling some finite logit by `factor` would reach infinity.
fn overflows(candidates: &CandidateSet, factor: f32) -> bool {
    let max_abs = candidates
        .items()
        .iter()
        .map(|c| c.logit.abs())
        .filter(|l| l.is_finite())
        .fold(0.0f32, f32::max);
    (max_abs * factor).is_infinite()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn history() -> RecencyBuffer {
        RecencyBuffer::new(4).unwrap()
    }

    #[test]
    fn test_divides_logits() {
        let mut set = CandidateSet::from_logits(&[1.0, -2.0, 4.0]);
        TemperatureSampler::new(2.0).apply(&mut set, &history());
        let logits: Vec<f32> = set.items().iter().map(|c| c.logit).collect();
        assert_relative_eq!(logits[0], 0.5);
        assert_relative_eq!(logits[1], -1.0);
        assert_relative_eq!(logits[2], 2.0);
        assert!(set.selected().is_none());
    }

    #[test]
    fn test_zero_selects_argmax() {
        let mut set = CandidateSet::from_logits(&[1.0, 5.0, 2.0, 4.0, 0.0]);
        TemperatureSampler::new(0.0).apply(&mut set, &history());
        assert_eq!(set.selected_candidate().map(|c| c.id), Some(1));
        // Logits are left untouched in greedy mode.
        assert_relative_eq!(set.items()[1].logit, 5.0);
    }

    #[test]
    fn test_negative_is_greedy() {
        let mut set = CandidateSet::from_logits(&[3.0, 1.0]);
        TemperatureSampler::new(-1.0).apply(&mut set, &history());
        assert_eq!(set.selected(), Some(0));
    }

    #[test]
    fn test_tiny_temperature_is_greedy() {
        for t in [1e-39, f32::MIN_POSITIVE] {
            let mut set = CandidateSet::from_logits(&[1.0, 5.0, 2.0, 4.0, 0.0]);
            TemperatureSampler::new(t).apply(&mut set, &history());
            assert_eq!(set.selected_candidate().map(|c| c.id), Some(1));
            assert!(set.items().iter().all(|c| c.logit.is_finite()));
        }
    }

    #[test]
    fn test_small_temperature_with_finite_result_scales() {
        let mut set = CandidateSet::from_logits(&[1.0, 2.0]);
        TemperatureSampler::new(0.01).apply(&mut set, &history());
        assert!(set.selected().is_none());
        assert_relative_eq!(set.items()[1].logit, 200.0, epsilon = 1e-3);
    }
}
