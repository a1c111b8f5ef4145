use crate::candidates::Token;
use crate::error::{Result, SamplerError};

/// Fixed-capacity ring of previously emitted tokens.
///
/// Holds the last `min(capacity, pushed)` tokens; once full, each push
/// overwrites the oldest entry.
#[derive(Debug, Clone)]
pub struct RecencyBuffer {
    data: Vec<Token>,
    capacity: usize,
    first: usize,
    len: usize,
}

impl RecencyBuffer {
    /// Create an empty buffer. Fails on a zero capacity.
    pub fn new(capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(SamplerError::ZeroCapacity);
        }
        Ok(Self {
            data: Vec::with_capacity(capacity),
            capacity,
            first: 0,
            len: 0,
        })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn push(&mut self, token: Token) {
        if self.data.len() < self.capacity {
            self.data.push(token);
            self.len += 1;
            return;
        }
        // Full: the slot at `first` holds the oldest token.
        self.data[self.first] = token;
        self.first = (self.first + 1) % self.capacity;
    }

    /// Oldest token still held.
    pub fn front(&self) -> Option<Token> {
        self.get(0)
    }

    /// Most recently pushed token.
    pub fn back(&self) -> Option<Token> {
        self.len.checked_sub(1).and_then(|i| self.get(i))
    }

    /// Token at logical position `index` (0 = oldest).
    pub fn get(&self, index: usize) -> Option<Token> {
        if index >= self.len {
            return None;
        }
        Some(self.data[(self.first + index) % self.capacity])
    }

    /// Iterate oldest to newest.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = Token> + ExactSizeIterator + '_ {
        (0..self.len).map(move |i| self.data[(self.first + i) % self.capacity])
    }

    /// Contents oldest to newest.
    pub fn as_sequence(&self) -> Vec<Token> {
        self.iter().collect()
    }

    /// The newest `min(n, len)` tokens, oldest first.
    pub fn last_n(&self, n: usize) -> impl Iterator<Item = Token> + '_ {
        self.iter().skip(self.len.saturating_sub(n))
    }

    /// Forget all tokens. Capacity is unchanged.
    pub fn clear(&mut self) {
        self.data.clear();
        self.first = 0;
        self.len = 0;
    }
}
