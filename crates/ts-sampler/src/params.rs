use serde::{Deserialize, Serialize};

use crate::candidates::Token;
use crate::error::{Result, SamplerError};
use crate::grammar::GrammarHandle;

/// Recency buffers are never smaller than this, whatever the caller asks for.
pub const MIN_RECENCY_CAPACITY: usize = 32;

/// Stages that can be named in [`SamplingParams::stages`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageKind {
    Penalties,
    Temperature,
    TopK,
    TopP,
    MinP,
}

/// Parameters controlling token sampling for one generation stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplingParams {
    /// <= 0.0 selects greedy decoding.
    pub temperature: f32,
    /// <= 0 disables top-k.
    pub top_k: i32,
    pub top_p: f32,
    /// 0.0 disables min-p.
    pub min_p: f32,
    /// Floor on the number of candidates the probability cutoffs may leave.
    pub min_keep: usize,
    pub recency_capacity: usize,
    /// Tokens inspected by the penalties stage; -1 means the whole history.
    pub penalty_last_n: i32,
    pub repeat_penalty: f32,
    pub frequency_penalty: f32,
    pub presence_penalty: f32,
    pub grammar_lazy: bool,
    pub grammar_trigger_words: Vec<String>,
    pub grammar_trigger_tokens: Vec<Token>,
    /// `None` seeds the RNG from OS entropy.
    pub seed: Option<u64>,
    /// Order in which the numeric stages run.
    pub stages: Vec<StageKind>,
    #[serde(skip)]
    pub grammar: Option<GrammarHandle>,
}

impl Default for SamplingParams {
    fn default() -> Self {
        Self {
            temperature: 0.8,
            top_k: 40,
            top_p: 0.95,
            min_p: 0.0,
            min_keep: 1,
            recency_capacity: 64,
            penalty_last_n: 64,
            repeat_penalty: 1.0,
            frequency_penalty: 0.0,
            presence_penalty: 0.0,
            grammar_lazy: false,
            grammar_trigger_words: Vec::new(),
            grammar_trigger_tokens: Vec::new(),
            seed: None,
            stages: vec![
                StageKind::Penalties,
                StageKind::Temperature,
                StageKind::TopK,
                StageKind::TopP,
                StageKind::MinP,
            ],
            grammar: None,
        }
    }
}

impl SamplingParams {
    /// Greedy decoding with every other stage left at its default.
    pub fn greedy() -> Self {
        Self {
            temperature: 0.0,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !self.temperature.is_finite() {
            return Err(invalid(format!(
                "temperature must be finite, got {}",
                self.temperature
            )));
        }
        if !(self.top_p > 0.0 && self.top_p <= 1.0) {
            return Err(invalid(format!("top_p must be in (0, 1], got {}", self.top_p)));
        }
        if !(0.0..=1.0).contains(&self.min_p) {
            return Err(invalid(format!("min_p must be in [0, 1], got {}", self.min_p)));
        }
        if self.min_keep == 0 {
            return Err(invalid("min_keep must be at least 1"));
        }
        if self.penalty_last_n < -1 {
            return Err(invalid(format!(
                "penalty_last_n must be -1 or non-negative, got {}",
                self.penalty_last_n
            )));
        }
        if !(self.repeat_penalty.is_finite() && self.repeat_penalty > 0.0) {
            return Err(invalid(format!(
                "repeat_penalty must be positive, got {}",
                self.repeat_penalty
            )));
        }
        if !self.frequency_penalty.is_finite() || !self.presence_penalty.is_finite() {
            return Err(invalid("frequency and presence penalties must be finite"));
        }
        if self.grammar.is_some()
            && self.grammar_lazy
            && self.grammar_trigger_words.iter().all(String::is_empty)
            && self.grammar_trigger_tokens.is_empty()
        {
            return Err(invalid("lazy grammar needs at least one trigger word or token"));
        }
        Ok(())
    }

    /// Recency capacity after clamping up to the penalty window and
    /// [`MIN_RECENCY_CAPACITY`].
    pub fn effective_recency_capacity(&self) -> usize {
        let window = usize::try_from(self.penalty_last_n).unwrap_or(0);
        self.recency_capacity.max(window).max(MIN_RECENCY_CAPACITY)
    }

    /// Penalty lookback in tokens, with -1 resolved to the full buffer.
    pub fn penalty_window(&self) -> usize {
        match self.penalty_last_n {
            -1 => self.effective_recency_capacity(),
            n => usize::try_from(n).unwrap_or(0),
        }
    }
}

fn invalid(msg: impl Into<String>) -> SamplerError {
    SamplerError::InvalidParameter(msg.into())
}
