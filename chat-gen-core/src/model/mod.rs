//! Word-level Markov text generation.
//!
//! - `TransitionModel`: interned vocabulary plus sparse transition counts
//! - `TransitionTable`: the square word → (word → count) view of a model

/// Learned word transitions and the weighted-random text walk.
pub mod transition;

/// Outgoing edges of one word, with weighted sampling.
///
/// Not exposed publicly.
mod state;

pub use transition::{TransitionModel, TransitionTable};
