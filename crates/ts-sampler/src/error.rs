use thiserror::Error;

#[derive(Error, Debug)]
pub enum SamplerError {
    #[error("logits length mismatch: expected {expected}, got {got}")]
    VocabMismatch { expected: usize, got: usize },
    #[error("vocabulary size must be at least 1")]
    EmptyVocabulary,
    #[error("invalid sampling parameter: {0}")]
    InvalidParameter(String),
    #[error("recency buffer capacity must be at least 1")]
    ZeroCapacity,
    #[error("grammar trigger words require a token text source")]
    MissingVocabulary,
    #[error("grammar constraints requested but ts-sampler was built without the `grammar` feature")]
    GrammarUnavailable,
}

pub type Result<T> = std::result::Result<T, SamplerError>;
