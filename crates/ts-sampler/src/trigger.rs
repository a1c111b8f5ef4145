use std::collections::HashSet;

use crate::candidates::Token;

/// Activation state of a lazy grammar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerState {
    Inactive,
    Active,
}

/// One-way latch that turns a lazy grammar on once a cue shows up in the
/// emitted stream.
///
/// A cue is either a trigger token id or a trigger word found in the
/// concatenated text of emitted tokens. Words may span token boundaries; only
/// a window as long as the longest word is retained between observations.
#[derive(Debug, Clone)]
pub struct GrammarTrigger {
    words: Vec<String>,
    tokens: HashSet<Token>,
    state: TriggerState,
    window: String,
    max_word_len: usize,
}

impl GrammarTrigger {
    pub fn new<W, S, T>(words: W, tokens: T) -> Self
    where
        W: IntoIterator<Item = S>,
        S: Into<String>,
        T: IntoIterator<Item = Token>,
    {
        let words: Vec<String> = words
            .into_iter()
            .map(Into::into)
            .filter(|w| !w.is_empty())
            .collect();
        let max_word_len = words.iter().map(String::len).max().unwrap_or(0);
        Self {
            words,
            tokens: tokens.into_iter().collect(),
            state: TriggerState::Inactive,
            window: String::new(),
            max_word_len,
        }
    }

    pub fn state(&self) -> TriggerState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        self.state == TriggerState::Active
    }

    pub fn has_words(&self) -> bool {
        !self.words.is_empty()
    }

    /// Whether any cue can ever fire.
    pub fn has_triggers(&self) -> bool {
        self.has_words() || !self.tokens.is_empty()
    }

    /// Feed one emitted token and its text piece.
    ///
    /// Returns `true` only on the observation that activates the trigger.
    pub fn observe(&mut self, token: Token, piece: Option<&str>) -> bool {
        if self.is_active() {
            return false;
        }
        if self.tokens.contains(&token) {
            self.activate();
            return true;
        }
        let Some(piece) = piece else {
            return false;
        };
        if self.words.is_empty() {
            return false;
        }

        self.window.push_str(piece);
        if self.words.iter().any(|w| self.window.contains(w.as_str())) {
            self.activate();
            return true;
        }

        // A future match needs at least one new byte, so at most
        // max_word_len - 1 old bytes can take part in it.
        let keep = self.max_word_len - 1;
        if self.window.len() > keep {
            let mut cut = self.window.len() - keep;
            while !self.window.is_char_boundary(cut) {
                cut += 1;
            }
            self.window.drain(..cut);
        }
        false
    }

    /// Return to `Inactive`. Only used when a new stream starts.
    pub fn reset(&mut self) {
        self.state = TriggerState::Inactive;
        self.window.clear();
    }

    fn activate(&mut self) {
        self.state = TriggerState::Active;
        self.window.clear();
    }
}
