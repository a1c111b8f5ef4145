use std::fmt;
use std::sync::Arc;

use crate::candidates::Token;
#[cfg(feature = "grammar")]
use crate::candidates::CandidateSet;
#[cfg(feature = "grammar")]
use crate::error::{Result, SamplerError};
#[cfg(feature = "grammar")]
use crate::history::RecencyBuffer;
#[cfg(feature = "grammar")]
use crate::sampler::SamplerStage;
#[cfg(feature = "grammar")]
use crate::trigger::GrammarTrigger;

/// A compiled grammar constraint, shareable across streams.
///
/// Implementations must be safe to query from several threads at once; all
/// per-stream progress lives in the matchers they hand out.
pub trait Grammar: Send + Sync {
    /// Create a matcher positioned at the start of the grammar.
    fn matcher(&self) -> Box<dyn GrammarMatcher>;
}

/// Per-stream position inside a [`Grammar`].
pub trait GrammarMatcher: Send {
    /// Whether emitting `token` next keeps the output inside the grammar.
    fn allows(&self, token: Token) -> bool;

    /// Advance past an emitted token.
    fn accept(&mut self, token: Token);
}

/// Maps token ids to their text pieces.
pub trait Vocabulary: Send + Sync {
    fn piece(&self, token: Token) -> Option<&str>;
}

impl Vocabulary for Vec<String> {
    fn piece(&self, token: Token) -> Option<&str> {
        self.get(token as usize).map(String::as_str)
    }
}

/// A compiled grammar plus the text source needed for trigger words.
#[derive(Clone)]
pub struct GrammarHandle {
    pub grammar: Arc<dyn Grammar>,
    pub vocabulary: Option<Arc<dyn Vocabulary>>,
}

impl GrammarHandle {
    pub fn new(grammar: Arc<dyn Grammar>) -> Self {
        Self {
            grammar,
            vocabulary: None,
        }
    }

    pub fn with_vocabulary(mut self, vocabulary: Arc<dyn Vocabulary>) -> Self {
        self.vocabulary = Some(vocabulary);
        self
    }
}

impl fmt::Debug for GrammarHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GrammarHandle")
            .field("vocabulary", &self.vocabulary.is_some())
            .finish_non_exhaustive()
    }
}

/// Removes candidates the grammar would reject.
///
/// An eager mask is always on. A lazy mask stays off until its trigger fires
/// and then stays on for the rest of the stream; the matcher only starts
/// consuming tokens after activation. If masking would remove every
/// candidate the stage does nothing, so generation can always proceed.
#[cfg(feature = "grammar")]
pub struct GrammarMaskSampler {
    grammar: Arc<dyn Grammar>,
    vocabulary: Option<Arc<dyn Vocabulary>>,
    matcher: Box<dyn GrammarMatcher>,
    trigger: Option<GrammarTrigger>,
}

#[cfg(feature = "grammar")]
impl GrammarMaskSampler {
    /// A mask that applies from the first token.
    pub fn eager(grammar: Arc<dyn Grammar>) -> Self {
        let matcher = grammar.matcher();
        Self {
            grammar,
            vocabulary: None,
            matcher,
            trigger: None,
        }
    }

    /// A mask that waits for `trigger` to fire.
    pub fn lazy(handle: GrammarHandle, trigger: GrammarTrigger) -> Result<Self> {
        if !trigger.has_triggers() {
            return Err(SamplerError::InvalidParameter(
                "lazy grammar needs at least one trigger word or token".to_string(),
            ));
        }
        if trigger.has_words() && handle.vocabulary.is_none() {
            return Err(SamplerError::MissingVocabulary);
        }
        let matcher = handle.grammar.matcher();
        Ok(Self {
            grammar: handle.grammar,
            vocabulary: handle.vocabulary,
            matcher,
            trigger: Some(trigger),
        })
    }

    pub fn is_active(&self) -> bool {
        self.trigger.as_ref().map_or(true, GrammarTrigger::is_active)
    }
}

#[cfg(feature = "grammar")]
impl SamplerStage for GrammarMaskSampler {
    fn name(&self) -> &str {
        "grammar"
    }

    fn apply(&self, candidates: &mut CandidateSet, _history: &RecencyBuffer) {
        if !self.is_active() {
            return;
        }
        if !candidates.retain_nonempty(|c| self.matcher.allows(c.id)) {
            tracing::debug!(
                candidates = candidates.len(),
                "grammar rejects every candidate, leaving set unmasked"
            );
        }
    }

    fn accept(&mut self, token: Token) {
        let Some(trigger) = self.trigger.as_mut() else {
            self.matcher.accept(token);
            return;
        };
        if trigger.is_active() {
            self.matcher.accept(token);
            return;
        }
        let piece = self.vocabulary.as_deref().and_then(|v| v.piece(token));
        if trigger.observe(token, piece) {
            tracing::debug!(token, "lazy grammar activated");
        }
    }

    fn reset(&mut self) {
        self.matcher = self.grammar.matcher();
        if let Some(trigger) = self.trigger.as_mut() {
            trigger.reset();
        }
    }
}

#[cfg(all(test, feature = "grammar"))]
pub(crate) mod tests {
    use super::*;

    /// Accepts a fixed token sequence, one position at a time.
    pub(crate) struct SequenceGrammar(pub Vec<Token>);

    struct SequenceMatcher {
        expected: Vec<Token>,
        pos: usize,
    }

    impl Grammar for SequenceGrammar {
        fn matcher(&self) -> Box<dyn GrammarMatcher> {
            Box::new(SequenceMatcher {
                expected: self.0.clone(),
                pos: 0,
            })
        }
    }

    impl GrammarMatcher for SequenceMatcher {
        fn allows(&self, token: Token) -> bool {
            self.expected.get(self.pos) == Some(&token)
        }

        fn accept(&mut self, _token: Token) {
            self.pos += 1;
        }
    }

    fn ids(set: &CandidateSet) -> Vec<Token> {
        set.items().iter().map(|c| c.id).collect()
    }

    fn history() -> RecencyBuffer {
        RecencyBuffer::new(4).unwrap()
    }

    #[test]
    fn test_eager_masks_immediately() {
        let mask = GrammarMaskSampler::eager(Arc::new(SequenceGrammar(vec![2, 0])));
        let mut set = CandidateSet::from_logits(&[1.0, 2.0, 3.0]);
        mask.apply(&mut set, &history());
        assert_eq!(ids(&set), vec![2]);
    }

    #[test]
    fn test_matcher_advances_on_accept() {
        let mut mask = GrammarMaskSampler::eager(Arc::new(SequenceGrammar(vec![2, 0])));
        mask.accept(2);
        let mut set = CandidateSet::from_logits(&[1.0, 2.0, 3.0]);
        mask.apply(&mut set, &history());
        assert_eq!(ids(&set), vec![0]);
    }

    #[test]
    fn test_fails_open() {
        let mask = GrammarMaskSampler::eager(Arc::new(SequenceGrammar(vec![9])));
        let mut set = CandidateSet::from_logits(&[1.0, 2.0, 3.0]);
        mask.apply(&mut set, &history());
        assert_eq!(set.len(), 3);
    }

    #[test]
    fn test_lazy_waits_for_token() {
        let handle = GrammarHandle::new(Arc::new(SequenceGrammar(vec![1])));
        let mut mask =
            GrammarMaskSampler::lazy(handle, GrammarTrigger::new(Vec::<String>::new(), [0])).unwrap();
        assert!(!mask.is_active());

        let mut set = CandidateSet::from_logits(&[1.0, 2.0, 3.0]);
        mask.apply(&mut set, &history());
        assert_eq!(set.len(), 3);

        mask.accept(0);
        assert!(mask.is_active());
        let mut set = CandidateSet::from_logits(&[1.0, 2.0, 3.0]);
        mask.apply(&mut set, &history());
        assert_eq!(ids(&set), vec![1]);
    }

    #[test]
    fn test_lazy_word_needs_vocabulary() {
        let handle = GrammarHandle::new(Arc::new(SequenceGrammar(vec![1])));
        let result = GrammarMaskSampler::lazy(handle, GrammarTrigger::new(["{"], []));
        assert!(matches!(result, Err(SamplerError::MissingVocabulary)));
    }

    #[test]
    fn test_lazy_without_triggers_rejected() {
        let handle = GrammarHandle::new(Arc::new(SequenceGrammar(vec![1])));
        let result =
            GrammarMaskSampler::lazy(handle, GrammarTrigger::new(Vec::<String>::new(), []));
        assert!(matches!(result, Err(SamplerError::InvalidParameter(_))));
    }

    #[test]
    fn test_reset_restarts_matcher_and_trigger() {
        let handle = GrammarHandle::new(Arc::new(SequenceGrammar(vec![1, 2])));
        let mut mask =
            GrammarMaskSampler::lazy(handle, GrammarTrigger::new(Vec::<String>::new(), [0])).unwrap();
        mask.accept(0);
        mask.accept(1);
        mask.reset();
        assert!(!mask.is_active());
        mask.accept(0);
        let mut set = CandidateSet::from_logits(&[1.0, 2.0, 3.0]);
        mask.apply(&mut set, &history());
        assert_eq!(ids(&set), vec![1]);
    }
}
