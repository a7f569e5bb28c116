use std::path::PathBuf;

use chat_gen_core::store::ConversationStore;
use log::{debug, error};

/// Deferred saving of the conversation store.
///
/// Request handlers only flag the store as changed; a periodic task (and the
/// shutdown path) calls `flush`, so no request waits on a disk write.
#[derive(Debug, Default)]
pub struct Persistence {
	path: Option<PathBuf>,
	dirty: bool,
}

impl Persistence {
	/// Without a path, every flush is a no-op.
	pub fn new(path: Option<PathBuf>) -> Self {
		Self { path, dirty: false }
	}

	pub fn mark_dirty(&mut self) {
		self.dirty = true;
	}

	pub fn is_dirty(&self) -> bool {
		self.dirty
	}

	/// Saves `store` if it changed since the last successful save.
	///
	/// Returns `true` when a file was written. A failed save is logged and
	/// keeps the store flagged, so the next flush retries.
	pub fn flush(&mut self, store: &ConversationStore) -> bool {
		let Some(path) = &self.path else {
			return false;
		};
		if !self.dirty {
			debug!("No conversation changed, nothing to save");
			return false;
		}
		match store.save(path) {
			Ok(()) => {
				self.dirty = false;
				true
			}
			Err(e) => {
				error!("Failed to save conversations: {e}");
				false
			}
		}
	}
}
