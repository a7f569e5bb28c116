use std::path::Path;
use std::sync::Arc;

use log::warn;
use serde::{Deserialize, Serialize};

use super::corpus::QuotationCorpus;
use crate::io;

/// A corpus file to load, with the text shown to users when picking it.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct CorpusSource {
	pub file: String,
	pub description: String,
}

/// A loaded corpus, shared between every conversation that selects it.
#[derive(Clone, Debug)]
pub struct CorpusEntry {
	pub file: String,
	pub description: String,
	pub corpus: Arc<QuotationCorpus>,
}

/// The selectable corpora, indexed by position.
///
/// # Invariants
/// - Holds at least one entry (an empty placeholder when nothing was configured)
/// - Each file is loaded exactly once
#[derive(Clone, Debug)]
pub struct CorpusCatalog {
	entries: Vec<CorpusEntry>,
}

impl CorpusCatalog {
	/// Loads every listed source from `dir`.
	///
	/// Unreadable files become empty corpora; see `QuotationCorpus::load`.
	pub fn load<P: AsRef<Path>>(dir: P, sources: &[CorpusSource]) -> Self {
		let entries = sources
			.iter()
			.map(|source| CorpusEntry {
				file: source.file.clone(),
				description: source.description.clone(),
				corpus: Arc::new(QuotationCorpus::load(dir.as_ref().join(&source.file))),
			})
			.collect();
		Self::from_entries(entries)
	}

	/// Loads every `.json` file found directly in `dir`, sorted by name.
	///
	/// The description of each corpus is its file stem.
	///
	/// # Errors
	/// Returns an error if the directory cannot be listed.
	pub fn discover<P: AsRef<Path>>(dir: P) -> std::io::Result<Self> {
		let mut sources = Vec::new();
		for file in io::list_files(&dir, "json")? {
			let description = io::get_filename(&file)?;
			sources.push(CorpusSource { file, description });
		}
		Ok(Self::load(dir, &sources))
	}

	/// Builds a catalog from already loaded corpora.
	pub fn from_entries(mut entries: Vec<CorpusEntry>) -> Self {
		if entries.is_empty() {
			warn!("No quotation corpus configured, quotes will report a missing source");
			entries.push(CorpusEntry {
				file: String::new(),
				description: String::new(),
				corpus: Arc::new(QuotationCorpus::default()),
			});
		}
		Self { entries }
	}

	/// Convenience constructor for a single in-memory corpus.
	pub fn single(description: &str, corpus: QuotationCorpus) -> Self {
		Self::from_entries(vec![CorpusEntry {
			file: String::new(),
			description: description.to_owned(),
			corpus: Arc::new(corpus),
		}])
	}

	pub fn len(&self) -> usize {
		self.entries.len()
	}

	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}

	pub fn contains(&self, index: usize) -> bool {
		index < self.entries.len()
	}

	/// Returns the entry at `index`, or entry 0 if the index is out of range.
	pub fn get(&self, index: usize) -> &CorpusEntry {
		match self.entries.get(index) {
			Some(entry) => entry,
			None => {
				warn!("Corpus #{index} does not exist, falling back to #0");
				&self.entries[0]
			}
		}
	}

	/// Descriptions of every corpus, in index order.
	pub fn descriptions(&self) -> Vec<String> {
		self.entries.iter().map(|e| e.description.clone()).collect()
	}
}
