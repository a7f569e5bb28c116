use std::collections::BTreeMap;

use rand::Rng;

/// Outgoing edges of a single word in the transition model.
///
/// A `WordState` is a row of the transition table: it maps the id of every
/// word observed right after this one to the number of times that pair was
/// seen.
///
/// Conceptually, this is a node in a Markov chain where outgoing edges
/// are weighted by their number of observations.
///
/// ## Invariants
/// - Every stored count is strictly positive (zero cells are simply absent)
/// - Keys are ids interned by the owning `TransitionModel`
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub(crate) struct WordState {
	/// Outgoing transitions indexed by the next word id.
	/// Example: { 3 => 42, 7 => 1 }
	transitions: BTreeMap<usize, u64>,
}

impl WordState {
	/// Records `occurrence` more observations of the transition toward `next`.
	pub(crate) fn add_transition(&mut self, next: usize, occurrence: u64) {
		if occurrence == 0 {
			return;
		}
		*self.transitions.entry(next).or_insert(0) += occurrence;
	}

	/// Number of times `next` followed this word.
	pub(crate) fn count(&self, next: usize) -> u64 {
		self.transitions.get(&next).copied().unwrap_or(0)
	}

	/// Whether the word has at least one positive outgoing edge.
	pub(crate) fn has_successors(&self) -> bool {
		!self.transitions.is_empty()
	}

	/// Iterates over `(next_id, count)` pairs, all counts positive.
	pub(crate) fn transitions(&self) -> impl Iterator<Item = (usize, u64)> + '_ {
		self.transitions.iter().map(|(next, count)| (*next, *count))
	}

	/// Picks the next word id using weighted random sampling.
	///
	/// The probability of selecting a word is proportional to its
	/// occurrence count. Performs one O(n) scan with a cumulative
	/// subtraction to find the bucket.
	///
	/// Returns `None` if the word has no successors.
	pub(crate) fn predict<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<usize> {
		let total: u64 = self.transitions.values().sum();
		if total == 0 {
			return None;
		}

		let mut r = rng.random_range(0..total);
		for (next, occurrence) in &self.transitions {
			if r < *occurrence {
				return Some(*next);
			}
			r -= occurrence;
		}

		// Unreachable: r < total
		self.transitions.keys().next_back().copied()
	}
}
