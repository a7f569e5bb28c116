use std::collections::BTreeMap;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::model::TransitionModel;
use crate::scheduler::ActionScheduler;

/// Identifier of a conversation (chat) on the transport side.
pub type ConversationId = i64;

/// Identifier of a message inside a conversation.
pub type MessageId = i64;

/// Everything the engine knows about one conversation.
///
/// # Responsibilities
/// - Count qualifying words since the last quotation round
/// - Remember which message carried which words, to reply to the right one
/// - Feed the conversation's transition model
/// - Hold the conversation settings and the action scheduler
///
/// # Invariants
/// - Every word buffered in `messages` is a key of `frequency`
/// - `frequency` and `messages` are only ever cleared together
///
/// Only the ingestion path mutates a state; search and generation read it.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct ConversationState {
	pub id: ConversationId,
	/// Qualifying words seen over the whole lifetime of the conversation.
	pub word_count: u64,
	frequency: BTreeMap<String, u64>,
	messages: BTreeMap<MessageId, Vec<String>>,
	model: TransitionModel,
	/// Index of the selected corpus in the catalog.
	pub corpus_index: usize,
	/// Reduce quotations to the sentence mentioning the matched word.
	pub shorten: bool,
	pub scheduler: ActionScheduler,
}

impl ConversationState {
	pub fn new(id: ConversationId) -> Self {
		Self::with_scheduler(id, ActionScheduler::default())
	}

	pub fn with_scheduler(id: ConversationId, scheduler: ActionScheduler) -> Self {
		Self {
			id,
			word_count: 0,
			frequency: BTreeMap::new(),
			messages: BTreeMap::new(),
			model: TransitionModel::new(),
			corpus_index: 0,
			shorten: false,
			scheduler,
		}
	}

	/// Word frequencies of the current round.
	pub fn frequency(&self) -> &BTreeMap<String, u64> {
		&self.frequency
	}

	/// Qualifying words of each message of the current round.
	pub fn messages(&self) -> &BTreeMap<MessageId, Vec<String>> {
		&self.messages
	}

	pub fn model(&self) -> &TransitionModel {
		&self.model
	}

	/// Records one incoming message.
	///
	/// - `words`: qualifying words, counted and buffered under `message_id`
	/// - `sequence`: word sequence learned by the transition model
	///   (pass an empty slice to keep the model untouched)
	///
	/// A message id already buffered is ignored entirely.
	pub fn update<W, S>(&mut self, message_id: MessageId, words: &[W], sequence: &[S])
	where
		W: AsRef<str>,
		S: AsRef<str>,
	{
		if self.messages.contains_key(&message_id) {
			debug!("Message {message_id} of conversation {} already recorded, skipping", self.id);
			return;
		}

		let words: Vec<String> = words.iter().map(|w| w.as_ref().to_owned()).collect();
		for word in &words {
			*self.frequency.entry(word.clone()).or_insert(0) += 1;
		}
		self.word_count += words.len() as u64;
		self.messages.insert(message_id, words);

		self.model.add_sequence(sequence);
	}

	/// Forgets the current round: word frequencies and buffered messages.
	///
	/// The transition model and the settings are kept.
	pub fn clear_round(&mut self) {
		self.frequency.clear();
		self.messages.clear();
		debug!("Conversation {} round cleared", self.id);
	}

	/// First buffered message, by id, containing `word`.
	pub fn reply_target(&self, word: &str) -> Option<MessageId> {
		self.messages
			.iter()
			.find(|(_, words)| words.iter().any(|w| w == word))
			.map(|(id, _)| *id)
	}

	/// Checks the invariants serde cannot express on its own.
	///
	/// The transition table and the coefficients are already validated while
	/// decoding.
	///
	/// # Errors
	/// Returns `EngineError::InvalidState` describing the first violation.
	pub fn validate(&self) -> Result<(), EngineError> {
		for (message_id, words) in &self.messages {
			if let Some(word) = words.iter().find(|w| !self.frequency.contains_key(*w)) {
				return Err(EngineError::InvalidState(format!(
					"conversation {}: word '{word}' of message {message_id} is not counted",
					self.id
				)));
			}
		}
		Ok(())
	}

	/// Encodes the state into a compact binary blob.
	pub fn to_bytes(&self) -> Result<Vec<u8>, EngineError> {
		Ok(postcard::to_stdvec(self)?)
	}

	/// Decodes and validates a blob produced by `to_bytes`.
	pub fn from_bytes(bytes: &[u8]) -> Result<Self, EngineError> {
		let state: Self = postcard::from_bytes(bytes)?;
		state.validate()?;
		Ok(state)
	}

	/// Encodes the state as JSON.
	pub fn to_json(&self) -> Result<String, EngineError> {
		Ok(serde_json::to_string(self)?)
	}

	/// Decodes and validates JSON produced by `to_json`.
	pub fn from_json(json: &str) -> Result<Self, EngineError> {
		let state: Self = serde_json::from_str(json)?;
		state.validate()?;
		Ok(state)
	}

	/// Decodes and validates an already parsed JSON value.
	pub fn from_value(value: serde_json::Value) -> Result<Self, EngineError> {
		let state: Self = serde_json::from_value(value)?;
		state.validate()?;
		Ok(state)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::scheduler::Action;

	fn sample() -> ConversationState {
		let mut state = ConversationState::new(42);
		state.update(1, &["революция", "партия"], &["Революция", "и", "партия"]);
		state.update(2, &["партия"], &["Партия", "ведёт"]);
		state
	}

	#[test]
	fn update_counts_and_buffers() {
		let state = sample();
		assert_eq!(state.frequency()["партия"], 2);
		assert_eq!(state.frequency()["революция"], 1);
		assert_eq!(state.messages().len(), 2);
		assert_eq!(state.word_count, 3);
		assert_eq!(state.model().count("и", "партия"), 1);
	}

	#[test]
	fn duplicate_message_is_ignored() {
		let mut state = sample();
		state.update(2, &["партия"], &["Партия", "ведёт"]);
		assert_eq!(state.frequency()["партия"], 2);
		assert_eq!(state.model().count("Партия", "ведёт"), 1);
	}

	#[test]
	fn clear_round_keeps_model_and_settings() {
		let mut state = sample();
		state.shorten = true;
		state.clear_round();

		assert!(state.frequency().is_empty());
		assert!(state.messages().is_empty());
		assert!(!state.model().is_empty());
		assert!(state.shorten);
		assert_eq!(state.word_count, 3);
	}

	#[test]
	fn reply_target_is_first_message_with_word() {
		let state = sample();
		assert_eq!(state.reply_target("партия"), Some(1));
		assert_eq!(state.reply_target("отсутствует"), None);
	}

	#[test]
	fn binary_round_trip() {
		let mut state = sample();
		state.scheduler.coefficients.set(Action::Quote, 10).unwrap();
		let decoded = ConversationState::from_bytes(&state.to_bytes().unwrap()).unwrap();

		assert_eq!(decoded.frequency(), state.frequency());
		assert_eq!(decoded.messages(), state.messages());
		assert_eq!(decoded.model().table(), state.model().table());
		assert_eq!(decoded.scheduler, state.scheduler);
	}

	#[test]
	fn json_with_uncounted_words_is_rejected() {
		let mut value = serde_json::to_value(sample()).unwrap();
		value["frequency"] = serde_json::json!({});
		assert!(matches!(
			ConversationState::from_value(value),
			Err(EngineError::InvalidState(_))
		));
	}

	#[test]
	fn json_with_degenerate_coefficients_is_rejected() {
		let mut value = serde_json::to_value(sample()).unwrap();
		value["scheduler"]["coefficients"] = serde_json::json!({"Idle": 0, "Quote": 0, "Generate": 0});
		assert!(ConversationState::from_json(&value.to_string()).is_err());
	}
}
