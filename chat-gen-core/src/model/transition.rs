use std::collections::{BTreeMap, HashMap};

use rand::Rng;
use serde::{Deserialize, Serialize};

use super::state::WordState;
use crate::error::EngineError;

/// Square word → (next word → count) view of a transition model.
///
/// Every word known to the model is an outer key and an inner key of every
/// row, cells never observed read as zero.
pub type TransitionTable = BTreeMap<String, BTreeMap<String, u64>>;

/// First-order word transition model ("Markov chain").
///
/// Words are interned into an arena and addressed by integer id. Each word
/// owns a sparse `WordState` holding its positive outgoing counts, so adding
/// a previously unseen word costs O(1) instead of growing every row.
///
/// # Responsibilities
/// - Learn word pairs from ordered word sequences
/// - Generate text by walking the chain with weighted random draws
/// - Round-trip through serde as a nested word map
///
/// # Invariants
/// - `words`, `index` and `states` always have the same length
/// - `index[words[i]] == i`
/// - Every id stored in a `WordState` is `< words.len()`
///
/// Seen through `table()`, these give the square-matrix invariant: the outer
/// key set equals the key set of every row.
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
#[serde(try_from = "TransitionTable", into = "TransitionTable")]
pub struct TransitionModel {
	words: Vec<String>,
	index: HashMap<String, usize>,
	states: Vec<WordState>,
}

impl TransitionModel {
	pub fn new() -> Self {
		Self::default()
	}

	/// Number of distinct words known to the model.
	pub fn vocabulary_len(&self) -> usize {
		self.words.len()
	}

	/// Returns `true` while no word has been learned.
	pub fn is_empty(&self) -> bool {
		self.words.is_empty()
	}

	/// Known words, in the order they were first seen.
	pub fn words(&self) -> impl Iterator<Item = &str> {
		self.words.iter().map(String::as_str)
	}

	/// Returns the id of `word`, interning it first if needed.
	///
	/// A new word starts with no outgoing edge; every other row implicitly
	/// gains a zero cell for it.
	pub fn ensure_key(&mut self, word: &str) -> usize {
		if let Some(id) = self.index.get(word) {
			return *id;
		}
		let id = self.words.len();
		self.words.push(word.to_owned());
		self.index.insert(word.to_owned(), id);
		self.states.push(WordState::default());
		id
	}

	/// Learns every adjacent pair of `words`.
	///
	/// Sequences shorter than two words carry no transition and are ignored.
	pub fn add_sequence<S: AsRef<str>>(&mut self, words: &[S]) {
		if words.len() < 2 {
			return;
		}
		for pair in words.windows(2) {
			let current = self.ensure_key(pair[0].as_ref());
			let next = self.ensure_key(pair[1].as_ref());
			self.states[current].add_transition(next, 1);
		}
	}

	/// How many times `next` was seen right after `word`.
	///
	/// Returns 0 for unknown words.
	pub fn count(&self, word: &str, next: &str) -> u64 {
		match (self.index.get(word), self.index.get(next)) {
			(Some(w), Some(n)) => self.states[*w].count(*n),
			_ => 0,
		}
	}

	/// Builds the full square table, zero cells included.
	///
	/// This is O(V²) in the vocabulary size; meant for inspection and tests.
	pub fn table(&self) -> TransitionTable {
		let mut table = TransitionTable::new();
		for (id, word) in self.words.iter().enumerate() {
			let row = self
				.words
				.iter()
				.enumerate()
				.map(|(next, next_word)| (next_word.clone(), self.states[id].count(next)))
				.collect();
			table.insert(word.clone(), row);
		}
		table
	}

	/// Generates text using the thread-local RNG.
	///
	/// See [`TransitionModel::generate_with`].
	pub fn generate(&self, start: Option<&str>, steps: usize) -> Result<String, EngineError> {
		self.generate_with(&mut rand::rng(), start, steps)
	}

	/// Generates `steps + 1` words joined by single spaces.
	///
	/// The first word is `start` when it is known and has at least one
	/// outgoing edge, otherwise a word drawn uniformly from the vocabulary.
	/// Each following word is drawn from the current word's outgoing counts,
	/// falling back to a uniform draw when the current word has none.
	///
	/// # Errors
	/// Returns `EngineError::NoData` if the model is empty.
	pub fn generate_with<R: Rng + ?Sized>(
		&self,
		rng: &mut R,
		start: Option<&str>,
		steps: usize,
	) -> Result<String, EngineError> {
		if self.is_empty() {
			return Err(EngineError::NoData);
		}

		let mut current = match start.and_then(|word| self.index.get(word)) {
			Some(id) if self.states[*id].has_successors() => *id,
			_ => self.random_word(rng),
		};

		let mut text = self.words[current].clone();
		for _ in 0..steps {
			current = self.states[current]
				.predict(rng)
				.unwrap_or_else(|| self.random_word(rng));
			text.push(' ');
			text.push_str(&self.words[current]);
		}
		Ok(text)
	}

	/// Uniform draw over the whole vocabulary. The model must not be empty.
	fn random_word<R: Rng + ?Sized>(&self, rng: &mut R) -> usize {
		rng.random_range(0..self.words.len())
	}
}

/// Sparse snapshot: every word is an outer key, rows only list positive counts.
impl From<TransitionModel> for TransitionTable {
	fn from(model: TransitionModel) -> Self {
		let mut table = TransitionTable::new();
		for (id, word) in model.words.iter().enumerate() {
			let row = model.states[id]
				.transitions()
				.map(|(next, count)| (model.words[next].clone(), count))
				.collect();
			table.insert(word.clone(), row);
		}
		table
	}
}

/// Accepts both the sparse snapshot and a zero-filled square table.
///
/// # Errors
/// Returns `EngineError::InvalidState` when a row references a word that is
/// not an outer key.
impl TryFrom<TransitionTable> for TransitionModel {
	type Error = EngineError;

	fn try_from(table: TransitionTable) -> Result<Self, Self::Error> {
		let mut model = TransitionModel::new();
		for word in table.keys() {
			model.ensure_key(word);
		}
		for (word, row) in &table {
			let current = model.index[word];
			for (next_word, count) in row {
				let Some(next) = model.index.get(next_word).copied() else {
					return Err(EngineError::InvalidState(format!(
						"transition {word} -> {next_word} points outside the vocabulary"
					)));
				};
				model.states[current].add_transition(next, *count);
			}
		}
		Ok(model)
	}
}
