use std::collections::HashMap;
use std::path::Path;

use log::{info, warn};

use crate::conversation::{ConversationId, ConversationState};
use crate::error::EngineError;
use crate::io::{read_file, write_atomic};
use crate::scheduler::ActionScheduler;

/// All conversation states of a running bot, keyed by conversation id.
///
/// Passed explicitly to whoever needs it; there is no global registry.
#[derive(Debug, Default)]
pub struct ConversationStore {
	conversations: HashMap<ConversationId, ConversationState>,
}

impl ConversationStore {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn len(&self) -> usize {
		self.conversations.len()
	}

	pub fn is_empty(&self) -> bool {
		self.conversations.is_empty()
	}

	/// Known conversation ids, in ascending order.
	pub fn ids(&self) -> Vec<ConversationId> {
		let mut ids: Vec<_> = self.conversations.keys().copied().collect();
		ids.sort_unstable();
		ids
	}

	pub fn get(&self, id: ConversationId) -> Option<&ConversationState> {
		self.conversations.get(&id)
	}

	pub fn get_mut(&mut self, id: ConversationId) -> Option<&mut ConversationState> {
		self.conversations.get_mut(&id)
	}

	/// Returns the state of `id`, creating it with `scheduler` on first use.
	pub fn get_or_create(
		&mut self,
		id: ConversationId,
		scheduler: impl FnOnce() -> ActionScheduler,
	) -> &mut ConversationState {
		self.conversations.entry(id).or_insert_with(|| {
			info!("New conversation {id}");
			ConversationState::with_scheduler(id, scheduler())
		})
	}

	/// Inserts or replaces a state.
	pub fn insert(&mut self, state: ConversationState) {
		self.conversations.insert(state.id, state);
	}

	/// Writes every conversation to `path` as a JSON array, atomically.
	pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), EngineError> {
		let mut states: Vec<&ConversationState> = self.conversations.values().collect();
		states.sort_by_key(|state| state.id);
		let json = serde_json::to_vec_pretty(&states)?;
		write_atomic(&path, &json)?;
		info!("Saved {} conversations to {}", states.len(), path.as_ref().display());
		Ok(())
	}

	/// Loads conversations saved by `save`.
	///
	/// # Behavior
	/// - Missing file: empty store
	/// - File that is not a JSON array (truncated, hand-edited): logged,
	///   empty store
	/// - Entries are decoded one by one; an invalid entry is logged and
	///   skipped without affecting the others
	///
	/// # Errors
	/// Returns an error only if the file exists but cannot be read.
	pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, EngineError> {
		let path = path.as_ref();
		let mut store = Self::new();
		if !path.exists() {
			info!("No saved conversations at {}", path.display());
			return Ok(store);
		}

		let entries: Vec<serde_json::Value> = match serde_json::from_str(&read_file(path)?) {
			Ok(entries) => entries,
			Err(e) => {
				warn!("Saved conversations at {} are unreadable, starting empty: {e}", path.display());
				return Ok(store);
			}
		};
		let total = entries.len();
		for (position, entry) in entries.into_iter().enumerate() {
			match ConversationState::from_value(entry) {
				Ok(state) => store.insert(state),
				Err(e) => warn!("Skipping saved conversation #{position}: {e}"),
			}
		}
		info!("Loaded {} of {total} conversations from {}", store.len(), path.display());
		Ok(store)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::fs;

	#[test]
	fn get_or_create_creates_once() {
		let mut store = ConversationStore::new();
		store.get_or_create(7, ActionScheduler::default).shorten = true;
		assert!(store.get_or_create(7, ActionScheduler::default).shorten);
		assert_eq!(store.len(), 1);
	}

	#[test]
	fn save_then_load() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("conversations.json");

		let mut store = ConversationStore::new();
		store
			.get_or_create(1, ActionScheduler::default)
			.update(10, &["революция"], &["a", "b"]);
		store.get_or_create(2, ActionScheduler::default);
		store.save(&path).unwrap();

		let loaded = ConversationStore::load(&path).unwrap();
		assert_eq!(loaded.ids(), vec![1, 2]);
		assert_eq!(loaded.get(1).unwrap().frequency()["революция"], 1);
		assert_eq!(loaded.get(1).unwrap().model().count("a", "b"), 1);
	}

	#[test]
	fn malformed_entry_does_not_spoil_others() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("conversations.json");

		let mut store = ConversationStore::new();
		store.get_or_create(1, ActionScheduler::default);
		store.save(&path).unwrap();

		let mut entries: Vec<serde_json::Value> =
			serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
		entries.push(serde_json::json!({"id": 2, "garbage": true}));
		fs::write(&path, serde_json::to_string(&entries).unwrap()).unwrap();

		let loaded = ConversationStore::load(&path).unwrap();
		assert_eq!(loaded.ids(), vec![1]);
	}

	#[test]
	fn truncated_file_is_an_empty_store() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("conversations.json");
		fs::write(&path, r#"{"truncated": "#).unwrap();

		assert!(ConversationStore::load(&path).unwrap().is_empty());
	}

	#[test]
	fn missing_file_is_an_empty_store() {
		let dir = tempfile::tempdir().unwrap();
		assert!(ConversationStore::load(dir.path().join("none.json")).unwrap().is_empty());
	}
}
