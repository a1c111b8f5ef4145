//! `ts-sampler` - Per-token sampling pipeline for token-sampling.
//!
//! This crate provides:
//! - A `CandidateSet` working buffer of (token, logit, probability) triples
//! - A `SamplerStage` trait with temperature, top-k, top-p, min-p,
//!   penalty and grammar-mask stages
//! - A `RecencyBuffer` ring of emitted tokens for history-aware stages
//! - A `GrammarTrigger` latch for lazily activated grammars
//! - A `SamplerChain` that runs the stages and picks one token per step

pub mod candidates;
pub mod error;
pub mod grammar;
pub mod history;
pub mod min_p;
pub mod params;
pub mod penalties;
pub mod sampler;
pub mod select;
pub mod temperature;
pub mod top_k;
pub mod top_p;
#[cfg(feature = "grammar")]
pub mod trigger;

// Re-export primary types at the crate root for convenience.
pub use candidates::{Candidate, CandidateSet, Token};
pub use error::{Result, SamplerError};
#[cfg(feature = "grammar")]
pub use grammar::GrammarMaskSampler;
pub use grammar::{Grammar, GrammarHandle, GrammarMatcher, Vocabulary};
pub use history::RecencyBuffer;
pub use min_p::MinPSampler;
pub use params::{SamplingParams, StageKind, MIN_RECENCY_CAPACITY};
pub use penalties::PenaltiesSampler;
pub use sampler::{ChainBuilder, SamplerChain, SamplerStage, Selection};
pub use select::{select_greedy, DistSelector};
pub use temperature::TemperatureSampler;
pub use top_k::TopKSampler;
pub use top_p::TopPSampler;
#[cfg(feature = "grammar")]
pub use trigger::{GrammarTrigger, TriggerState};
