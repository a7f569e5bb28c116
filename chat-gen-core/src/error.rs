use crate::conversation::ConversationId;

/// Errors surfaced by the engine.
///
/// Soft failures (an unreadable corpus, a search against an empty corpus)
/// never show up here: they are logged and turned into regular values.
/// Everything below is either a broken caller contract or bad input.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
	/// `generate` was called on a model that has never seen a word pair.
	#[error("cannot pick a word: the transition model holds no data")]
	NoData,

	/// Every action coefficient would be zero.
	#[error("at least one action coefficient must be positive")]
	DegenerateCoefficients,

	#[error("corpus #{0} does not exist")]
	UnknownCorpus(usize),

	#[error("conversation {0} is not known")]
	UnknownConversation(ConversationId),

	/// Decoded state breaks a data-model invariant.
	#[error("invalid conversation state: {0}")]
	InvalidState(String),

	#[error(transparent)]
	Io(#[from] std::io::Error),

	#[error(transparent)]
	Json(#[from] serde_json::Error),

	#[error(transparent)]
	Binary(#[from] postcard::Error),
}
