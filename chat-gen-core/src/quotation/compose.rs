//! Chat-facing texts built from search results.

use super::search::{SearchResult, shorten};

/// Appends a dot unless the text is empty or already ends with one.
fn with_dot(text: &str) -> String {
	if text.is_empty() || text.ends_with('.') {
		text.to_owned()
	} else {
		format!("{text}.")
	}
}

/// Builds the reply announcing a found quotation.
///
/// Layout: a header naming the matched word, a blank line, the quotation
/// (reduced to one sentence when `shorten_quote` is set), then, when known,
/// a blank line and the `Author. Source.` attribution.
pub fn compose_quotation(result: &SearchResult, shorten_quote: bool) -> String {
	let quotation = if shorten_quote {
		shorten(result)
	} else {
		result.quotation.clone()
	};

	let mut message = format!("⚡ Актуальная мудрость на тему «{}» ⚡\n\n{quotation}", result.word);

	let attribution: Vec<String> = [&result.author, &result.source]
		.into_iter()
		.filter(|part| !part.is_empty())
		.map(|part| with_dot(part))
		.collect();
	if !attribution.is_empty() {
		message.push_str("\n\n");
		message.push_str(&attribution.join(" "));
	}
	message
}

/// Notice sent when no quotation matched.
///
/// A manual request names the words that were tried; an automatic round
/// blames the conversation instead.
pub fn not_found_notice(description: &str, words: &[&str], manual: bool) -> String {
	if manual {
		format!(
			"{description} на тему «{}» не найдены.\n\nПопробуй что-то более адекватное.",
			words.join(" ")
		)
	} else {
		format!("Вы недостаточно много обсуждаете {description}, поэтому не получите тематическую цитату.")
	}
}

/// Notice sent when the selected corpus has no quotation at all.
pub fn no_source_notice(description: &str) -> String {
	format!("Файл «{description}» пока что не готов. Выберите другой файл.")
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::quotation::search::SearchStatus;

	fn result(author: &str, source: &str) -> SearchResult {
		SearchResult {
			status: SearchStatus::Found,
			word: "революция".to_owned(),
			quotation: "Революция не есть званый обед. Революция есть восстание.".to_owned(),
			source: source.to_owned(),
			author: author.to_owned(),
		}
	}

	#[test]
	fn full_quotation_with_attribution() {
		let message = compose_quotation(&result("Мао Цзэдун", "Цитатник"), false);
		assert_eq!(
			message,
			"⚡ Актуальная мудрость на тему «революция» ⚡\n\n\
			 Революция не есть званый обед. Революция есть восстание.\n\n\
			 Мао Цзэдун. Цитатник."
		);
	}

	#[test]
	fn missing_attribution_parts_are_omitted() {
		let message = compose_quotation(&result("Мао Цзэдун.", ""), false);
		assert!(message.ends_with("восстание.\n\nМао Цзэдун."));

		let message = compose_quotation(&result("", ""), false);
		assert!(message.ends_with("восстание."));
	}

	#[test]
	fn shortened_quotation_is_one_sentence() {
		let message = compose_quotation(&result("", ""), true);
		assert!(message.starts_with("⚡ Актуальная мудрость на тему «революция» ⚡\n\n"));
		// "революци" is lowercase and neither sentence matches, the whole text stays
		assert!(message.ends_with("Революция не есть званый обед. Революция есть восстание."));
	}

	#[test]
	fn notices_mention_the_corpus() {
		assert!(not_found_notice("Цитаты", &["мир", "труд"], true).contains("«мир труд»"));
		assert!(not_found_notice("Цитаты", &[], false).contains("Цитаты"));
		assert!(no_source_notice("Цитаты").contains("«Цитаты»"));
	}
}
