//! Response engine for a group-chat quotation bot.
//!
//! This crate provides everything between an incoming chat message and a
//! reply ready to be sent:
//! - Word-level Markov text generation learned per conversation
//! - Quotation corpora and a rarity-first search over them
//! - A weighted, rate-limited choice between staying idle, quoting and generating
//! - Persistence of conversation states
//! - A worker pool delivering replies off the ingestion path
//!
//! The chat transport itself is not part of this crate: anything able to
//! hand over an [`engine::IncomingMessage`] and to deliver an
//! [`engine::Reply`] can drive it.

/// Word transition model and text generation.
pub mod model;

/// Quotation corpora, catalog, search and reply composition.
pub mod quotation;

/// Action coefficients and the minimum-interval gate.
pub mod scheduler;

/// Per-conversation state.
pub mod conversation;

/// All conversation states, with JSON persistence.
pub mod store;

/// Engine-wide defaults.
pub mod settings;

/// Message ingestion and action decisions.
pub mod engine;

/// Reply delivery worker pool.
pub mod dispatch;

/// Word extraction from raw message text.
pub mod tokenizer;

pub mod error;

/// I/O utilities (file loading, atomic writes, directory listing).
pub mod io;

pub use conversation::{ConversationId, ConversationState, MessageId};
pub use engine::{ActionOutcome, Engine, IncomingMessage, Reply};
pub use error::EngineError;
