//! Turns raw chat text into the word lists the engine consumes.

use std::sync::LazyLock;

use regex::Regex;

/// Words this short or shorter never qualify.
pub const MIN_WORD_LEN: usize = 4;

static CYRILLIC_WORD: LazyLock<Regex> =
	LazyLock::new(|| Regex::new("[а-яА-ЯёЁ]+").expect("static pattern is valid"));

/// Extracts qualifying words from a message.
///
/// A qualifying word is a maximal run of Cyrillic letters, lowercased, and
/// longer than [`MIN_WORD_LEN`] characters. Order and repetitions are kept.
pub fn extract_words(text: &str) -> Vec<String> {
	CYRILLIC_WORD
		.find_iter(text)
		.map(|m| m.as_str().to_lowercase())
		.filter(|word| word.chars().count() > MIN_WORD_LEN)
		.collect()
}

/// Splits a message on whitespace, the sequence fed to the transition model.
///
/// Punctuation and case are kept as typed.
pub fn split_sequence(text: &str) -> Vec<String> {
	text.split_whitespace().map(str::to_owned).collect()
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn keeps_long_cyrillic_words_lowercased() {
		let words = extract_words("Товарищи! Революция — это не званый обед, hello world.");
		assert_eq!(words, vec!["товарищи", "революция", "званый"]);
	}

	#[test]
	fn drops_short_and_latin_words() {
		assert!(extract_words("я иду в дом, ok?").is_empty());
	}

	#[test]
	fn yo_is_a_letter() {
		assert_eq!(extract_words("ЁЛОЧКА"), vec!["ёлочка"]);
	}

	#[test]
	fn split_sequence_keeps_raw_tokens() {
		assert_eq!(split_sequence("  Я  хочу\tесть! "), vec!["Я", "хочу", "есть!"]);
	}
}
