use std::collections::BTreeMap;

use log::{debug, info};
use rand::Rng;
use rand::seq::IndexedRandom;
use serde::{Deserialize, Serialize};

use super::corpus::{QuotationCorpus, QuotationRecord};

/// Outcome class of a quotation search.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum SearchStatus {
	Found,
	NotFound,
	/// The corpus holds no quotation at all.
	NoSource,
}

/// Result of a quotation search.
///
/// Only `Found` results carry a word and quotation fields, the others
/// leave them empty.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct SearchResult {
	pub status: SearchStatus,
	/// The conversation word that matched, untrimmed.
	pub word: String,
	pub quotation: String,
	pub source: String,
	pub author: String,
}

impl SearchResult {
	fn empty(status: SearchStatus) -> Self {
		Self {
			status,
			word: String::new(),
			quotation: String::new(),
			source: String::new(),
			author: String::new(),
		}
	}

	fn found(word: &str, record: &QuotationRecord) -> Self {
		Self {
			status: SearchStatus::Found,
			word: word.to_owned(),
			quotation: record.text.clone(),
			source: record.source.clone(),
			author: record.author.clone(),
		}
	}
}

/// Drops the last character of `word`.
fn trim_last_char(word: &str) -> &str {
	match word.char_indices().next_back() {
		Some((i, _)) => &word[..i],
		None => word,
	}
}

/// Rarity-first quotation lookup over one corpus.
///
/// Words of a conversation are tried from the least to the most frequent,
/// so the quotation picked is about what makes the conversation specific
/// rather than about its filler words.
pub struct QuotationSearch<'a> {
	corpus: &'a QuotationCorpus,
}

impl<'a> QuotationSearch<'a> {
	pub fn new(corpus: &'a QuotationCorpus) -> Self {
		Self { corpus }
	}

	/// Searches with the thread-local RNG. See [`QuotationSearch::search_with`].
	pub fn search(&self, frequencies: &BTreeMap<String, u64>) -> SearchResult {
		self.search_with(&mut rand::rng(), frequencies)
	}

	/// Finds a quotation matching the rarest possible word of `frequencies`.
	///
	/// # Behavior
	/// - Empty corpus: `NoSource`, without looking at the words
	/// - Words are scanned by ascending count, ties in map order
	/// - The probe for a word is the word minus its last character, matched
	///   as a case-sensitive substring of each quotation text
	/// - Words whose probe would be empty are skipped: an empty probe would
	///   match every quotation
	/// - The first word with matches wins; one of its quotations is picked
	///   uniformly
	/// - No match for any word: `NotFound`
	pub fn search_with<R: Rng + ?Sized>(
		&self,
		rng: &mut R,
		frequencies: &BTreeMap<String, u64>,
	) -> SearchResult {
		if self.corpus.is_empty() {
			info!("Quotation corpus is empty, nothing to search");
			return SearchResult::empty(SearchStatus::NoSource);
		}

		let mut words: Vec<(&String, &u64)> = frequencies.iter().collect();
		// Stable: equal counts keep the map's order
		words.sort_by_key(|(_, count)| **count);

		for (word, _) in words {
			let probe = trim_last_char(word);
			if probe.is_empty() {
				debug!("Skipping '{word}': too short to search");
				continue;
			}

			let matches: Vec<&QuotationRecord> = self
				.corpus
				.iter()
				.filter(|quotation| quotation.text.contains(probe))
				.collect();
			debug!("{} quotations contain '{word}'", matches.len());

			if let Some(record) = matches.choose(rng) {
				info!("Found a quotation for '{word}'");
				return SearchResult::found(word, record);
			}
		}

		info!("No quotation matches any of {} words", frequencies.len());
		SearchResult::empty(SearchStatus::NotFound)
	}
}

/// Shortens with the thread-local RNG. See [`shorten_with`].
pub fn shorten(result: &SearchResult) -> String {
	shorten_with(&mut rand::rng(), result)
}

/// Reduces a found quotation to one sentence mentioning the matched word.
///
/// # Behavior
/// - Anything but a `Found` result with a word: the quotation unchanged
/// - The probe is the word minus its last character when the word is longer
///   than 3 characters, the word itself otherwise
/// - Sentences end right after `.`, `!` or `?`; they are trimmed and empty
///   pieces are dropped. A trailing fragment without terminator still counts
/// - No sentence contains the probe: the whole quotation
/// - Otherwise one of the matching sentences, picked uniformly
pub fn shorten_with<R: Rng + ?Sized>(rng: &mut R, result: &SearchResult) -> String {
	if result.status != SearchStatus::Found || result.word.is_empty() {
		return result.quotation.clone();
	}

	let probe = if result.word.chars().count() > 3 {
		trim_last_char(&result.word)
	} else {
		result.word.as_str()
	};

	let matching: Vec<&str> = split_sentences(&result.quotation)
		.into_iter()
		.filter(|sentence| sentence.contains(probe))
		.collect();

	match matching.choose(rng) {
		Some(sentence) => (*sentence).to_owned(),
		None => result.quotation.clone(),
	}
}

const SENTENCE_END: [char; 3] = ['.', '!', '?'];

/// Splits text right after each `.`, `!` or `?`, trimming the pieces.
fn split_sentences(text: &str) -> Vec<&str> {
	text.split_inclusive(SENTENCE_END)
		.map(str::trim)
		.filter(|sentence| !sentence.is_empty())
		.collect()
}

/// Builds a frequency table giving every distinct word a count of 1.
///
/// Used when a quote is requested for an explicit list of words.
pub fn uniform_frequencies<S: AsRef<str>>(words: &[S]) -> BTreeMap<String, u64> {
	words.iter().map(|word| (word.as_ref().to_owned(), 1)).collect()
}

#[cfg(test)]
mod tests {
	use super::*;
	use rand::SeedableRng;
	use rand::rngs::StdRng;

	fn corpus(texts: &[&str]) -> QuotationCorpus {
		QuotationCorpus::new(texts.iter().map(|t| QuotationRecord::new("Автор", "Источник", t)).collect())
	}

	fn frequencies(pairs: &[(&str, u64)]) -> BTreeMap<String, u64> {
		pairs.iter().map(|(w, c)| (w.to_string(), *c)).collect()
	}

	#[test]
	fn empty_corpus_reports_no_source() {
		let corpus = QuotationCorpus::default();
		let search = QuotationSearch::new(&corpus);

		assert_eq!(search.search(&frequencies(&[])).status, SearchStatus::NoSource);
		assert_eq!(search.search(&frequencies(&[("революция", 1)])).status, SearchStatus::NoSource);
	}

	#[test]
	fn non_empty_corpus_never_reports_no_source() {
		let corpus = corpus(&["что-то"]);
		let search = QuotationSearch::new(&corpus);
		assert_eq!(search.search(&frequencies(&[])).status, SearchStatus::NotFound);
	}

	#[test]
	fn rarer_word_wins() {
		let corpus = corpus(&["Народ творит историю.", "Партия ведёт народ."]);
		let search = QuotationSearch::new(&corpus);
		let result = search.search(&frequencies(&[("народы", 5), ("историю", 1)]));

		assert_eq!(result.status, SearchStatus::Found);
		assert_eq!(result.word, "историю");
		assert_eq!(result.quotation, "Народ творит историю.");
	}

	#[test]
	fn falls_through_to_the_next_rarest_word() {
		let corpus = corpus(&["Всякая революционная война есть война масс."]);
		let search = QuotationSearch::new(&corpus);
		let result = search.search(&frequencies(&[("сознание", 1), ("революция", 5)]));

		assert_eq!(result.status, SearchStatus::Found);
		assert_eq!(result.word, "революция");
		assert_eq!(result.author, "Автор");
		assert_eq!(result.source, "Источник");
	}

	#[test]
	fn matching_is_case_sensitive() {
		let corpus = corpus(&["Революционная война."]);
		let search = QuotationSearch::new(&corpus);
		assert_eq!(search.search(&frequencies(&[("революция", 1)])).status, SearchStatus::NotFound);
	}

	#[test]
	fn single_character_words_are_skipped() {
		let corpus = corpus(&["anything at all"]);
		let search = QuotationSearch::new(&corpus);
		assert_eq!(search.search(&frequencies(&[("a", 1)])).status, SearchStatus::NotFound);
	}

	#[test]
	fn picks_uniformly_among_matches() {
		let corpus = corpus(&["один народ", "другой народ"]);
		let search = QuotationSearch::new(&corpus);
		let freq = frequencies(&[("народы", 1)]);
		let mut rng = StdRng::seed_from_u64(9);

		let first = (0..1000)
			.filter(|_| search.search_with(&mut rng, &freq).quotation == "один народ")
			.count();
		assert!((400..600).contains(&first), "got {first}");
	}

	fn found(word: &str, quotation: &str) -> SearchResult {
		SearchResult {
			status: SearchStatus::Found,
			word: word.to_owned(),
			quotation: quotation.to_owned(),
			source: String::new(),
			author: String::new(),
		}
	}

	#[test]
	fn shorten_keeps_matching_sentence() {
		let quotation = "Учиться, учиться и ещё раз учиться! Народ — творец истории. Так ли это?";
		let result = found("истории", quotation);
		assert_eq!(shorten(&result), "Народ — творец истории.");
	}

	#[test]
	fn shorten_falls_back_to_full_text() {
		let result = found("капитал", "Нет здесь нужного слова. Совсем нет.");
		assert_eq!(shorten(&result), result.quotation);
	}

	#[test]
	fn shorten_ignores_results_that_were_not_found() {
		let mut result = found("слово", "Слово. слово.");
		result.status = SearchStatus::NotFound;
		assert_eq!(shorten(&result), "Слово. слово.");

		let result = found("", "Раз. Два.");
		assert_eq!(shorten(&result), "Раз. Два.");
	}

	#[test]
	fn shorten_uses_short_words_verbatim() {
		// "мир" is not trimmed to "ми", so "мило" does not match
		let result = found("мир", "Это мило. Миру мир!");
		assert_eq!(shorten(&result), "Миру мир!");
	}

	#[test]
	fn shorten_returns_one_of_the_matching_sentences() {
		let quotation = "Первое предложение о войне. Второе о мире! Третье о войне? Хвост о войне";
		let result = found("войне", quotation);
		let mut rng = StdRng::seed_from_u64(2);

		let expected = ["Первое предложение о войне.", "Третье о войне?", "Хвост о войне"];
		for _ in 0..50 {
			let short = shorten_with(&mut rng, &result);
			assert!(expected.contains(&short.as_str()), "got {short}");
		}
	}

	#[test]
	fn unterminated_tail_is_a_sentence() {
		let result = found("войне", "Мир. Слово о войне");
		assert_eq!(shorten(&result), "Слово о войне");
	}

	#[test]
	fn blank_pieces_are_not_sentences() {
		assert_eq!(split_sentences("Раз.  Два!! "), vec!["Раз.", "Два!", "!"]);
		assert!(split_sentences("   ").is_empty());
	}

	#[test]
	fn uniform_frequencies_dedupes() {
		let freq = uniform_frequencies(&["мир", "труд", "мир"]);
		assert_eq!(freq, frequencies(&[("мир", 1), ("труд", 1)]));
	}
}
