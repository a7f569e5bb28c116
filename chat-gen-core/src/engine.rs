use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::conversation::{ConversationId, ConversationState, MessageId};
use crate::error::EngineError;
use crate::quotation::compose::{compose_quotation, no_source_notice, not_found_notice};
use crate::quotation::search::uniform_frequencies;
use crate::quotation::{CorpusCatalog, QuotationSearch, SearchResult, SearchStatus};
use crate::scheduler::{Action, ActionCoefficients};
use crate::settings::EngineSettings;
use crate::store::ConversationStore;
use crate::tokenizer;

/// A chat message as handed over by the transport.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct IncomingMessage {
	pub id: MessageId,
	pub text: String,
	/// Forwarded messages are counted but not learned by the transition model.
	#[serde(default)]
	pub forwarded: bool,
}

/// A fully composed message to send, detached from any conversation state.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Reply {
	pub conversation_id: ConversationId,
	/// Message to answer to, if any.
	pub reply_to: Option<MessageId>,
	pub text: String,
}

/// What the engine decided to say, if anything.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(tag = "kind", content = "reply", rename_all = "snake_case")]
pub enum ActionOutcome {
	None,
	/// A quotation matching the conversation.
	Quote(Reply),
	/// Text produced by the transition model.
	Generated(Reply),
	/// An explanation that no quotation could be provided.
	Notice(Reply),
}

impl ActionOutcome {
	pub fn reply(&self) -> Option<&Reply> {
		match self {
			ActionOutcome::None => None,
			ActionOutcome::Quote(reply) | ActionOutcome::Generated(reply) | ActionOutcome::Notice(reply) => {
				Some(reply)
			}
		}
	}

	pub fn into_reply(self) -> Option<Reply> {
		match self {
			ActionOutcome::None => None,
			ActionOutcome::Quote(reply) | ActionOutcome::Generated(reply) | ActionOutcome::Notice(reply) => {
				Some(reply)
			}
		}
	}
}

/// Settings of one conversation, as shown to its members.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct ConversationSettings {
	pub coefficients: ActionCoefficients,
	pub min_interval: u32,
	pub corpus_index: usize,
	pub corpus_description: String,
	pub shorten: bool,
}

/// The response engine: conversation states plus the shared corpora.
///
/// # Responsibilities
/// - Feed incoming messages into their conversation state
/// - Decide, per message, whether to quote, generate or stay idle
/// - Serve manual quote requests and conversation settings
///
/// # Notes
/// - Every method runs synchronously on the caller's thread; the engine is
///   meant to be owned by a single ingestion loop
/// - Replies are returned by value, ready to be queued for sending
#[derive(Debug)]
pub struct Engine {
	store: ConversationStore,
	catalog: CorpusCatalog,
	settings: EngineSettings,
}

impl Engine {
	pub fn new(catalog: CorpusCatalog, settings: EngineSettings) -> Self {
		Self::with_store(ConversationStore::new(), catalog, settings)
	}

	/// Creates an engine around previously saved conversations.
	pub fn with_store(store: ConversationStore, catalog: CorpusCatalog, settings: EngineSettings) -> Self {
		Self { store, catalog, settings }
	}

	pub fn store(&self) -> &ConversationStore {
		&self.store
	}

	pub fn store_mut(&mut self) -> &mut ConversationStore {
		&mut self.store
	}

	pub fn into_store(self) -> ConversationStore {
		self.store
	}

	pub fn catalog(&self) -> &CorpusCatalog {
		&self.catalog
	}

	/// Tokenizes and records a message.
	///
	/// Qualifying words feed the round statistics; the whitespace-split text
	/// feeds the transition model unless the message was forwarded.
	pub fn ingest(&mut self, conversation_id: ConversationId, message: &IncomingMessage) {
		let words = tokenizer::extract_words(&message.text);
		let sequence = if message.forwarded {
			Vec::new()
		} else {
			tokenizer::split_sequence(&message.text)
		};
		self.ingest_tokens(conversation_id, message.id, &words, &sequence);
	}

	/// Records an already tokenized message.
	pub fn ingest_tokens<W, S>(
		&mut self,
		conversation_id: ConversationId,
		message_id: MessageId,
		words: &[W],
		sequence: &[S],
	) where
		W: AsRef<str>,
		S: AsRef<str>,
	{
		let state = self.conversation(conversation_id);
		state.update(message_id, words, sequence);
		debug!(
			"Conversation {conversation_id}: message {message_id} brought {} words",
			words.len()
		);
	}

	/// Rolls with the thread-local RNG. See [`Engine::maybe_act_with`].
	pub fn maybe_act(&mut self, conversation_id: ConversationId, now: DateTime<Utc>) -> Result<ActionOutcome, EngineError> {
		self.maybe_act_with(&mut rand::rng(), conversation_id, now)
	}

	/// Lets the scheduler decide whether the conversation gets a reply.
	///
	/// # Behavior
	/// - Gate closed or `Idle` drawn: `ActionOutcome::None`
	/// - `Quote`: searches the selected corpus with the round frequencies
	///   - found: a quotation replying to the message that carried the word
	///   - not found: a notice
	///   - in both cases the round is cleared and the timer restarted
	///   - empty corpus: nothing is sent, the round and timer are kept
	/// - `Generate`: 1 to `max_generated_steps` continuation words from the
	///   transition model, nothing when the model is still empty
	///
	/// # Errors
	/// Returns `EngineError::UnknownConversation` if no message was ever
	/// ingested for `conversation_id`.
	pub fn maybe_act_with<R: Rng + ?Sized>(
		&mut self,
		rng: &mut R,
		conversation_id: ConversationId,
		now: DateTime<Utc>,
	) -> Result<ActionOutcome, EngineError> {
		let Self { store, catalog, settings } = self;
		let state = store
			.get_mut(conversation_id)
			.ok_or(EngineError::UnknownConversation(conversation_id))?;

		let Some(action) = state.scheduler.roll_with(rng, now) else {
			return Ok(ActionOutcome::None);
		};
		info!("Conversation {conversation_id} rolled {action}");

		match action {
			Action::Idle => Ok(ActionOutcome::None),
			Action::Quote => {
				let result = search(rng, catalog, state, None);
				let outcome = match result.status {
					SearchStatus::NoSource => {
						warn!("Conversation {conversation_id} selected an empty corpus, no quotation sent");
						return Ok(ActionOutcome::None);
					}
					SearchStatus::Found => ActionOutcome::Quote(quotation_reply(state, &result)),
					SearchStatus::NotFound => {
						let description = &catalog.get(state.corpus_index).description;
						ActionOutcome::Notice(Reply {
							conversation_id,
							reply_to: None,
							text: not_found_notice(description, &[], false),
						})
					}
				};
				state.scheduler.mark_acted(now);
				state.clear_round();
				Ok(outcome)
			}
			Action::Generate => {
				if state.model().is_empty() {
					info!("Conversation {conversation_id} has nothing to generate from yet");
					return Ok(ActionOutcome::None);
				}
				let steps = rng.random_range(1..=settings.max_generated_steps.max(1));
				let text = state.model().generate_with(rng, None, steps)?;
				state.scheduler.mark_acted(now);
				Ok(ActionOutcome::Generated(Reply {
					conversation_id,
					reply_to: None,
					text,
				}))
			}
		}
	}

	/// Answers an explicit quote request.
	///
	/// Uses `words` with equal weights when given, the round frequencies
	/// otherwise. Unlike a scheduled quote, it never clears the round nor
	/// touches the timer, and always produces something to send.
	pub fn force_quote(
		&mut self,
		conversation_id: ConversationId,
		words: Option<&[String]>,
	) -> Result<ActionOutcome, EngineError> {
		self.force_quote_with(&mut rand::rng(), conversation_id, words)
	}

	pub fn force_quote_with<R: Rng + ?Sized>(
		&mut self,
		rng: &mut R,
		conversation_id: ConversationId,
		words: Option<&[String]>,
	) -> Result<ActionOutcome, EngineError> {
		let words: Option<Vec<String>> = words.map(|list| list.iter().map(|w| w.to_lowercase()).collect());

		let Self { store, catalog, settings } = self;
		let state = store.get_or_create(conversation_id, || settings.scheduler());
		info!("Manual quote requested in conversation {conversation_id}");

		let result = search(rng, catalog, state, words.as_deref());
		let description = &catalog.get(state.corpus_index).description;
		let outcome = match result.status {
			SearchStatus::Found => ActionOutcome::Quote(quotation_reply(state, &result)),
			SearchStatus::NotFound => {
				let tried: Vec<&str> = match &words {
					Some(list) => list.iter().map(String::as_str).collect(),
					None => state.frequency().keys().map(String::as_str).collect(),
				};
				ActionOutcome::Notice(Reply {
					conversation_id,
					reply_to: None,
					text: not_found_notice(description, &tried, true),
				})
			}
			SearchStatus::NoSource => ActionOutcome::Notice(Reply {
				conversation_id,
				reply_to: None,
				text: no_source_notice(description),
			}),
		};
		Ok(outcome)
	}

	/// Forgets the round statistics of a conversation.
	pub fn clear_round(&mut self, conversation_id: ConversationId) -> Result<(), EngineError> {
		self.store
			.get_mut(conversation_id)
			.ok_or(EngineError::UnknownConversation(conversation_id))?
			.clear_round();
		Ok(())
	}

	/// Current settings of a conversation.
	pub fn settings(&self, conversation_id: ConversationId) -> Result<ConversationSettings, EngineError> {
		let state = self
			.store
			.get(conversation_id)
			.ok_or(EngineError::UnknownConversation(conversation_id))?;
		Ok(ConversationSettings {
			coefficients: state.scheduler.coefficients.clone(),
			min_interval: state.scheduler.min_interval,
			corpus_index: state.corpus_index,
			corpus_description: self.catalog.get(state.corpus_index).description.clone(),
			shorten: state.shorten,
		})
	}

	/// # Errors
	/// Returns `EngineError::DegenerateCoefficients` if every weight would be 0.
	pub fn set_coefficient(
		&mut self,
		conversation_id: ConversationId,
		action: Action,
		weight: u32,
	) -> Result<(), EngineError> {
		self.conversation(conversation_id)
			.scheduler
			.coefficients
			.set(action, weight)?;
		info!("Conversation {conversation_id}: {action} weight set to {weight}");
		Ok(())
	}

	pub fn set_min_interval(&mut self, conversation_id: ConversationId, seconds: u32) {
		self.conversation(conversation_id).scheduler.min_interval = seconds;
		info!("Conversation {conversation_id}: minimum interval set to {seconds}s");
	}

	/// # Errors
	/// Returns `EngineError::UnknownCorpus` if `index` is not in the catalog.
	pub fn select_corpus(&mut self, conversation_id: ConversationId, index: usize) -> Result<(), EngineError> {
		if !self.catalog.contains(index) {
			return Err(EngineError::UnknownCorpus(index));
		}
		self.conversation(conversation_id).corpus_index = index;
		info!("Conversation {conversation_id}: corpus #{index} selected");
		Ok(())
	}

	pub fn set_shorten(&mut self, conversation_id: ConversationId, shorten: bool) {
		self.conversation(conversation_id).shorten = shorten;
	}

	/// State of `conversation_id`, created with the engine defaults if needed.
	fn conversation(&mut self, conversation_id: ConversationId) -> &mut ConversationState {
		let settings = &self.settings;
		self.store.get_or_create(conversation_id, || settings.scheduler())
	}
}

/// Searches the conversation's corpus, with explicit words or the round frequencies.
fn search<R: Rng + ?Sized>(
	rng: &mut R,
	catalog: &CorpusCatalog,
	state: &ConversationState,
	words: Option<&[String]>,
) -> SearchResult {
	let corpus = &catalog.get(state.corpus_index).corpus;
	let search = QuotationSearch::new(corpus);
	match words {
		Some(words) => search.search_with(rng, &uniform_frequencies(words)),
		None => search.search_with(rng, state.frequency()),
	}
}

fn quotation_reply(state: &ConversationState, result: &SearchResult) -> Reply {
	let reply_to = state.reply_target(&result.word);
	if reply_to.is_none() {
		debug!("No buffered message carries '{}', replying without a target", result.word);
	}
	Reply {
		conversation_id: state.id,
		reply_to,
		text: compose_quotation(result, state.shorten),
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::quotation::{QuotationCorpus, QuotationRecord};
	use rand::SeedableRng;
	use rand::rngs::StdRng;

	fn at(seconds: i64) -> DateTime<Utc> {
		DateTime::from_timestamp(1_700_000_000 + seconds, 0).unwrap()
	}

	fn catalog() -> CorpusCatalog {
		CorpusCatalog::single(
			"Цитаты",
			QuotationCorpus::new(vec![QuotationRecord::new(
				"Мао Цзэдун",
				"Цитатник",
				"Всякая революционная война есть война масс.",
			)]),
		)
	}

	fn message(id: MessageId, text: &str) -> IncomingMessage {
		IncomingMessage { id, text: text.to_owned(), forwarded: false }
	}

	fn only(action: Action) -> EngineSettings {
		let coefficients = match action {
			Action::Idle => ActionCoefficients::new(1, 0, 0),
			Action::Quote => ActionCoefficients::new(0, 1, 0),
			Action::Generate => ActionCoefficients::new(0, 0, 1),
		};
		EngineSettings {
			coefficients: coefficients.unwrap(),
			..EngineSettings::default()
		}
	}

	#[test]
	fn unknown_conversation_is_an_error() {
		let mut engine = Engine::new(catalog(), EngineSettings::default());
		assert!(matches!(engine.maybe_act(1, at(0)), Err(EngineError::UnknownConversation(1))));
		assert!(engine.clear_round(1).is_err());
	}

	#[test]
	fn found_quote_replies_and_closes_the_round() {
		let mut engine = Engine::new(catalog(), only(Action::Quote));
		engine.ingest(1, &message(10, "Наша революция продолжается"));
		engine.ingest(1, &message(11, "революция революция"));

		let outcome = engine.maybe_act(1, at(0)).unwrap();
		let ActionOutcome::Quote(reply) = outcome else {
			panic!("expected a quote, got {outcome:?}");
		};
		assert_eq!(reply.reply_to, Some(10));
		assert!(reply.text.contains("«революция»"));

		let state = engine.store().get(1).unwrap();
		assert!(state.frequency().is_empty());
		assert_eq!(state.scheduler.last_action, Some(at(0)));
	}

	#[test]
	fn idle_changes_nothing() {
		let mut engine = Engine::new(catalog(), only(Action::Idle));
		engine.ingest(1, &message(1, "революция"));

		assert_eq!(engine.maybe_act(1, at(0)).unwrap(), ActionOutcome::None);
		let state = engine.store().get(1).unwrap();
		assert_eq!(state.scheduler.last_action, None);
		assert_eq!(state.frequency().len(), 1);
	}

	#[test]
	fn generate_uses_the_model() {
		let mut engine = Engine::new(catalog(), only(Action::Generate));
		engine.ingest(1, &message(1, "я хочу есть"));
		let mut rng = StdRng::seed_from_u64(1);

		let outcome = engine.maybe_act_with(&mut rng, 1, at(0)).unwrap();
		let ActionOutcome::Generated(reply) = outcome else {
			panic!("expected generated text, got {outcome:?}");
		};
		let count = reply.text.split(' ').count();
		assert!((2..=21).contains(&count), "got {count} words");
		assert!(reply.text.split(' ').all(|w| ["я", "хочу", "есть"].contains(&w)));
	}

	#[test]
	fn generate_on_empty_model_stays_silent() {
		let mut engine = Engine::new(catalog(), only(Action::Generate));
		engine.ingest(1, &message(1, "одно"));

		assert_eq!(engine.maybe_act(1, at(0)).unwrap(), ActionOutcome::None);
		assert_eq!(engine.store().get(1).unwrap().scheduler.last_action, None);
	}

	#[test]
	fn forwarded_messages_are_not_learned() {
		let mut engine = Engine::new(catalog(), EngineSettings::default());
		engine.ingest(1, &IncomingMessage { id: 1, text: "пересланное длинное сообщение".into(), forwarded: true });

		let state = engine.store().get(1).unwrap();
		assert!(state.model().is_empty());
		assert_eq!(state.frequency().len(), 3);
	}

	#[test]
	fn forced_quote_keeps_the_round() {
		let mut engine = Engine::new(catalog(), EngineSettings::default());
		engine.ingest(1, &message(1, "революция"));

		let outcome = engine.force_quote(1, None).unwrap();
		assert!(matches!(outcome, ActionOutcome::Quote(_)));
		let state = engine.store().get(1).unwrap();
		assert_eq!(state.frequency().len(), 1);
		assert_eq!(state.scheduler.last_action, None);
	}

	#[test]
	fn forced_quote_with_words_reports_misses() {
		let mut engine = Engine::new(catalog(), EngineSettings::default());
		let words = vec!["Капитал".to_owned()];

		let outcome = engine.force_quote(5, Some(&words)).unwrap();
		let ActionOutcome::Notice(reply) = outcome else {
			panic!("expected a notice, got {outcome:?}");
		};
		assert!(reply.text.contains("«капитал»"));
		assert_eq!(engine.store().get(5).unwrap().scheduler, EngineSettings::default().scheduler());
	}

	#[test]
	fn settings_round_trip() {
		let mut engine = Engine::new(catalog(), EngineSettings::default());
		engine.set_coefficient(3, Action::Quote, 50).unwrap();
		engine.set_min_interval(3, 5);
		engine.set_shorten(3, true);
		assert!(matches!(engine.select_corpus(3, 4), Err(EngineError::UnknownCorpus(4))));
		assert!(engine.set_coefficient(4, Action::Idle, 0).is_ok());

		let settings = engine.settings(3).unwrap();
		assert_eq!(settings.coefficients.weight(Action::Quote), 50);
		assert_eq!(settings.min_interval, 5);
		assert!(settings.shorten);
		assert_eq!(settings.corpus_description, "Цитаты");
	}
}
