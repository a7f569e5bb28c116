use std::fmt;
use std::path::Path;

use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::io::read_file;

/// One quotation of a corpus.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct QuotationRecord {
	pub author: String,
	pub source: String,
	pub text: String,
}

impl QuotationRecord {
	pub fn new(author: &str, source: &str, text: &str) -> Self {
		Self {
			author: author.to_owned(),
			source: source.to_owned(),
			text: text.to_owned(),
		}
	}
}

/// Renders `text`, a blank line, then `author. source.`
impl fmt::Display for QuotationRecord {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}\n\n{}.", self.text, self.author)?;
		if !self.source.is_empty() {
			write!(f, " {}", self.source)?;
			if !self.source.ends_with('.') {
				write!(f, ".")?;
			}
		}
		Ok(())
	}
}

/// Immutable, ordered collection of quotations loaded from one file.
///
/// # Invariants
/// - Never modified after loading; shared read-only between conversations
/// - An empty corpus is a valid, permanent state (failed or empty load)
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
#[serde(transparent)]
pub struct QuotationCorpus {
	quotations: Vec<QuotationRecord>,
}

impl QuotationCorpus {
	pub fn new(quotations: Vec<QuotationRecord>) -> Self {
		Self { quotations }
	}

	/// Loads a corpus from a JSON file holding an array of
	/// `{ "author", "source", "text" }` objects.
	///
	/// Never fails: a missing or malformed file is logged and yields an
	/// empty corpus.
	pub fn load<P: AsRef<Path>>(path: P) -> Self {
		let path = path.as_ref();
		let corpus = match read_file(path) {
			Ok(contents) => Self::from_json(&contents),
			Err(e) => {
				warn!("Cannot read quotations from {}: {e}", path.display());
				return Self::default();
			}
		};
		info!("Loaded {} quotations from {}", corpus.len(), path.display());
		corpus
	}

	/// Parses a corpus from a JSON string, same soft-failure contract as `load`.
	pub fn from_json(contents: &str) -> Self {
		match serde_json::from_str(contents) {
			Ok(corpus) => corpus,
			Err(e) => {
				warn!("Quotation corpus is malformed, using an empty one: {e}");
				Self::default()
			}
		}
	}

	pub fn len(&self) -> usize {
		self.quotations.len()
	}

	pub fn is_empty(&self) -> bool {
		self.quotations.is_empty()
	}

	pub fn get(&self, index: usize) -> Option<&QuotationRecord> {
		self.quotations.get(index)
	}

	/// Iterates over the quotations in file order. Can be called any number of times.
	pub fn iter(&self) -> std::slice::Iter<'_, QuotationRecord> {
		self.quotations.iter()
	}
}

impl<'a> IntoIterator for &'a QuotationCorpus {
	type Item = &'a QuotationRecord;
	type IntoIter = std::slice::Iter<'a, QuotationRecord>;

	fn into_iter(self) -> Self::IntoIter {
		self.iter()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn parses_records_in_order() {
		let corpus = QuotationCorpus::from_json(
			r#"[
				{"author": "A", "source": "S1", "text": "first"},
				{"author": "B", "source": "", "text": "second"}
			]"#,
		);
		assert_eq!(corpus.len(), 2);
		let texts: Vec<_> = corpus.iter().map(|q| q.text.as_str()).collect();
		assert_eq!(texts, vec!["first", "second"]);
		// restartable
		assert_eq!(corpus.iter().count(), 2);
	}

	#[test]
	fn malformed_json_gives_empty_corpus() {
		assert!(QuotationCorpus::from_json("{not json").is_empty());
		assert!(QuotationCorpus::from_json(r#"[{"author": "A"}]"#).is_empty());
	}

	#[test]
	fn missing_file_gives_empty_corpus() {
		let dir = tempfile::tempdir().unwrap();
		assert!(QuotationCorpus::load(dir.path().join("absent.json")).is_empty());
	}

	#[test]
	fn display_does_not_double_dots() {
		let with_source = QuotationRecord::new("Мао Цзэдун", "Цитатник.", "Текст");
		assert_eq!(with_source.to_string(), "Текст\n\nМао Цзэдун. Цитатник.");

		let no_source = QuotationRecord::new("Мао Цзэдун", "", "Текст");
		assert_eq!(no_source.to_string(), "Текст\n\nМао Цзэдун.");
	}
}
