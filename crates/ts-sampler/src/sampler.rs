use crate::candidates::{CandidateSet, Token};
use crate::error::{Result, SamplerError};
use crate::grammar::GrammarHandle;
#[cfg(feature = "grammar")]
use crate::grammar::GrammarMaskSampler;
use crate::history::RecencyBuffer;
use crate::min_p::MinPSampler;
use crate::params::{SamplingParams, StageKind, MIN_RECENCY_CAPACITY};
use crate::penalties::PenaltiesSampler;
use crate::select::DistSelector;
use crate::temperature::TemperatureSampler;
use crate::top_k::TopKSampler;
use crate::top_p::TopPSampler;
#[cfg(feature = "grammar")]
use crate::trigger::GrammarTrigger;

/// A unit transform applied to the candidate set at every sampling step.
pub trait SamplerStage: Send {
    /// Short label used by `SamplerChain::describe`.
    fn name(&self) -> &str;

    /// Filter, reorder, or re-weight candidates in place.
    ///
    /// A stage may mark a candidate selected, which ends the chain for this
    /// step. It must never add ids or leave the set empty.
    fn apply(&self, candidates: &mut CandidateSet, history: &RecencyBuffer);

    /// Observe a token that was appended to the stream.
    fn accept(&mut self, _token: Token) {}

    /// Drop per-stream state. Default implementation does nothing.
    fn reset(&mut self) {}

    /// How many recent tokens `apply` reads from the history.
    fn lookback(&self) -> usize {
        0
    }
}

/// What the chain picked on its last call, for debugging and telemetry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Selection {
    pub token: Token,
    /// Number of live candidates that scored higher (0 = best).
    pub rank: usize,
    /// Softmax probability over the live candidates at selection time.
    pub prob: f32,
    /// Live candidates at selection time.
    pub candidates: usize,
}

/// Ordered stages plus the per-stream state they share.
///
/// Owns the candidate buffer (reused across calls), the recency history and
/// the RNG. The stage list is fixed once built. Not meant to be shared
/// between threads; run one chain per stream.
pub struct SamplerChain {
    n_vocab: usize,
    stages: Vec<Box<dyn SamplerStage>>,
    candidates: CandidateSet,
    history: RecencyBuffer,
    selector: DistSelector,
    last_selection: Option<Selection>,
}

impl SamplerChain {
    /// Start building a chain for a vocabulary of `n_vocab` tokens.
    pub fn builder(n_vocab: usize) -> ChainBuilder {
        ChainBuilder::new(n_vocab)
    }

    /// Build the standard chain described by `params`.
    ///
    /// A grammar, when present, runs first. The numeric stages follow in the
    /// order of `params.stages`; stages that cannot change anything with the
    /// given values are left out.
    pub fn from_params(n_vocab: usize, params: &SamplingParams) -> Result<Self> {
        params.validate()?;

        let mut builder = Self::builder(n_vocab)
            .seed(params.seed)
            .recency_capacity(params.effective_recency_capacity());

        if let Some(handle) = &params.grammar {
            builder = builder.stage(grammar_stage(handle, params)?);
        }

        for kind in &params.stages {
            builder = match kind {
                StageKind::Penalties => {
                    let penalties = PenaltiesSampler::new(
                        params.penalty_window(),
                        params.repeat_penalty,
                        params.frequency_penalty,
                        params.presence_penalty,
                    );
                    if penalties.is_neutral() {
                        builder
                    } else {
                        builder.stage(Box::new(penalties))
                    }
                }
                StageKind::Temperature => {
                    builder.stage(Box::new(TemperatureSampler::new(params.temperature)))
                }
                StageKind::TopK => builder.stage(Box::new(TopKSampler::new(params.top_k))),
                StageKind::TopP => {
                    builder.stage(Box::new(TopPSampler::new(params.top_p, params.min_keep)))
                }
                StageKind::MinP if params.min_p > 0.0 => {
                    builder.stage(Box::new(MinPSampler::new(params.min_p, params.min_keep)))
                }
                StageKind::MinP => builder,
            };
        }

        builder.build()
    }

    /// Pick the next token of the stream from one step's logits.
    ///
    /// 1. Loads the logits into the candidate buffer (token_id = index).
    /// 2. Applies each stage in sequence, stopping early once one selects.
    /// 3. Otherwise draws from the surviving candidates.
    /// 4. Records the token in the history and hands it to every stage.
    pub fn sample(&mut self, logits: &[f32]) -> Result<Token> {
        if logits.len() != self.n_vocab {
            return Err(SamplerError::VocabMismatch {
                expected: self.n_vocab,
                got: logits.len(),
            });
        }

        self.candidates.load(logits);

        for stage in &self.stages {
            stage.apply(&mut self.candidates, &self.history);
            if self.candidates.selected().is_some() {
                break;
            }
        }

        let index = match self.candidates.selected() {
            Some(index) => index,
            None => self
                .selector
                .select(&mut self.candidates)
                .ok_or(SamplerError::EmptyVocabulary)?,
        };

        let chosen = self.candidates.items()[index];
        let selection = Selection {
            token: chosen.id,
            rank: self.candidates.rank_of(index).unwrap_or(index),
            prob: self.candidates.probability_of(index).unwrap_or(0.0),
            candidates: self.candidates.len(),
        };
        self.last_selection = Some(selection);
        tracing::trace!(
            token = selection.token,
            rank = selection.rank,
            prob = selection.prob,
            "sampled"
        );

        self.accept(chosen.id);
        Ok(chosen.id)
    }

    /// Append a token to the stream without sampling it, e.g. prompt tokens.
    pub fn accept(&mut self, token: Token) {
        self.history.push(token);
        for stage in self.stages.iter_mut() {
            stage.accept(token);
        }
    }

    /// Begin a new stream: forget history, trigger and grammar progress.
    /// Stage configuration and RNG state are kept.
    pub fn reset(&mut self) {
        self.history.clear();
        self.last_selection = None;
        for stage in self.stages.iter_mut() {
            stage.reset();
        }
    }

    pub fn n_vocab(&self) -> usize {
        self.n_vocab
    }

    pub fn history(&self) -> &RecencyBuffer {
        &self.history
    }

    /// Most recently appended token.
    pub fn last(&self) -> Option<Token> {
        self.history.back()
    }

    /// Candidate set as left by the last `sample` call.
    pub fn candidates(&self) -> &CandidateSet {
        &self.candidates
    }

    pub fn last_selection(&self) -> Option<Selection> {
        self.last_selection
    }

    /// Stage order as a readable string, e.g. `temp -> top_k -> dist`.
    pub fn describe(&self) -> String {
        let mut names: Vec<&str> = self.stages.iter().map(|s| s.name()).collect();
        names.push("dist");
        names.join(" -> ")
    }
}

/// Collects stages and stream settings for a [`SamplerChain`].
pub struct ChainBuilder {
    n_vocab: usize,
    stages: Vec<Box<dyn SamplerStage>>,
    seed: Option<u64>,
    recency_capacity: usize,
}

impl ChainBuilder {
    fn new(n_vocab: usize) -> Self {
        Self {
            n_vocab,
            stages: Vec::new(),
            seed: None,
            recency_capacity: MIN_RECENCY_CAPACITY,
        }
    }

    /// Append `stage`; stages run in the order they are added.
    pub fn stage(mut self, stage: Box<dyn SamplerStage>) -> Self {
        self.stages.push(stage);
        self
    }

    /// Seed for the final draw; `None` uses OS entropy.
    pub fn seed(mut self, seed: Option<u64>) -> Self {
        self.seed = seed;
        self
    }

    /// Requested history size. `build` raises it to cover every stage's
    /// lookback and [`MIN_RECENCY_CAPACITY`].
    pub fn recency_capacity(mut self, capacity: usize) -> Self {
        self.recency_capacity = capacity;
        self
    }

    pub fn build(self) -> Result<SamplerChain> {
        if self.n_vocab == 0 {
            return Err(SamplerError::EmptyVocabulary);
        }
        let lookback = self.stages.iter().map(|s| s.lookback()).max().unwrap_or(0);
        let capacity = self
            .recency_capacity
            .max(lookback)
            .max(MIN_RECENCY_CAPACITY);
        let history = RecencyBuffer::new(capacity)?;

        let chain = SamplerChain {
            n_vocab: self.n_vocab,
            stages: self.stages,
            candidates: CandidateSet::new(),
            history,
            selector: DistSelector::new(self.seed),
            last_selection: None,
        };
        tracing::debug!(
            n_vocab = chain.n_vocab,
            recency_capacity = chain.history.capacity(),
            stages = %chain.describe(),
            "sampler chain ready"
        );
        Ok(chain)
    }
}

#[cfg(feature = "grammar")]
fn grammar_stage(handle: &GrammarHandle, params: &SamplingParams) -> Result<Box<dyn SamplerStage>> {
    if !params.grammar_lazy {
        return Ok(Box::new(GrammarMaskSampler::eager(handle.grammar.clone())));
    }
    let trigger = GrammarTrigger::new(
        params.grammar_trigger_words.iter().cloned(),
        params.grammar_trigger_tokens.iter().copied(),
    );
    Ok(Box::new(GrammarMaskSampler::lazy(handle.clone(), trigger)?))
}

#[cfg(not(feature = "grammar"))]
fn grammar_stage(_handle: &GrammarHandle, _params: &SamplingParams) -> Result<Box<dyn SamplerStage>> {
    Err(SamplerError::GrammarUnavailable)
}
