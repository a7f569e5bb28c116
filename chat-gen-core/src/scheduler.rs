use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Duration, Utc};
use log::debug;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::EngineError;

/// What the bot may do after a message.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Action {
	/// Stay silent. A regular outcome, not a failure.
	Idle,
	/// Post a quotation matching the conversation.
	Quote,
	/// Post text generated by the transition model.
	Generate,
}

impl Action {
	pub const ALL: [Action; 3] = [Action::Idle, Action::Quote, Action::Generate];
}

impl fmt::Display for Action {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let name = match self {
			Action::Idle => "idle",
			Action::Quote => "quote",
			Action::Generate => "generate",
		};
		f.write_str(name)
	}
}

/// Relative weights of each action.
///
/// # Invariants
/// - At least one weight is positive, so a draw is always possible
/// - A weight of 0 excludes its action
///
/// Weights are summed as `u64`, so any three `u32` weights are valid.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(try_from = "BTreeMap<Action, u32>", into = "BTreeMap<Action, u32>")]
pub struct ActionCoefficients {
	weights: BTreeMap<Action, u32>,
}

impl ActionCoefficients {
	/// # Errors
	/// Returns `EngineError::DegenerateCoefficients` if every weight is 0.
	pub fn new(idle: u32, quote: u32, generate: u32) -> Result<Self, EngineError> {
		Self::try_from(BTreeMap::from([
			(Action::Idle, idle),
			(Action::Quote, quote),
			(Action::Generate, generate),
		]))
	}

	pub fn weight(&self, action: Action) -> u32 {
		self.weights.get(&action).copied().unwrap_or(0)
	}

	/// Changes the weight of one action.
	///
	/// # Errors
	/// Returns `EngineError::DegenerateCoefficients`, leaving the weights
	/// untouched, if the change would zero every weight.
	pub fn set(&mut self, action: Action, weight: u32) -> Result<(), EngineError> {
		let others: u64 = Action::ALL
			.iter()
			.filter(|a| **a != action)
			.map(|a| u64::from(self.weight(*a)))
			.sum();
		if weight == 0 && others == 0 {
			return Err(EngineError::DegenerateCoefficients);
		}
		self.weights.insert(action, weight);
		Ok(())
	}

	fn total(&self) -> u64 {
		Action::ALL.iter().map(|action| u64::from(self.weight(*action))).sum()
	}

	/// Draws one action, each with probability proportional to its weight.
	///
	/// One uniform draw over the total, then a cumulative subtraction to
	/// find the action it lands on; an action of weight 0 owns no value.
	pub fn draw<R: Rng + ?Sized>(&self, rng: &mut R) -> Action {
		let mut pick = rng.random_range(0..self.total());
		for action in Action::ALL {
			let weight = u64::from(self.weight(action));
			if pick < weight {
				return action;
			}
			pick -= weight;
		}
		unreachable!("pick is below the total of the weights")
	}
}

impl Default for ActionCoefficients {
	fn default() -> Self {
		Self {
			weights: BTreeMap::from([(Action::Idle, 66), (Action::Quote, 3), (Action::Generate, 30)]),
		}
	}
}

impl TryFrom<BTreeMap<Action, u32>> for ActionCoefficients {
	type Error = EngineError;

	fn try_from(weights: BTreeMap<Action, u32>) -> Result<Self, Self::Error> {
		if weights.values().all(|weight| *weight == 0) {
			return Err(EngineError::DegenerateCoefficients);
		}
		Ok(Self { weights })
	}
}

impl From<ActionCoefficients> for BTreeMap<Action, u32> {
	fn from(coefficients: ActionCoefficients) -> Self {
		coefficients.weights
	}
}

/// Default minimum delay between two actions, in seconds.
pub const DEFAULT_MIN_INTERVAL: u32 = 30;

/// Per-conversation chooser deciding whether the bot speaks.
///
/// A roll first checks the minimum-interval gate, then draws an action from
/// the coefficients. Recording that an action actually produced output is
/// left to the caller (`mark_acted`), so a quote against an empty corpus
/// does not cost the conversation its turn.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct ActionScheduler {
	pub coefficients: ActionCoefficients,
	/// When the bot last produced output, `None` if it never did.
	pub last_action: Option<DateTime<Utc>>,
	/// Minimum delay between two actions, in seconds.
	pub min_interval: u32,
}

impl Default for ActionScheduler {
	fn default() -> Self {
		Self::new(ActionCoefficients::default(), DEFAULT_MIN_INTERVAL)
	}
}

impl ActionScheduler {
	pub fn new(coefficients: ActionCoefficients, min_interval: u32) -> Self {
		Self {
			coefficients,
			last_action: None,
			min_interval,
		}
	}

	/// Time left before the gate opens, `None` when it is open.
	pub fn remaining(&self, now: DateTime<Utc>) -> Option<Duration> {
		let last = self.last_action?;
		let interval = Duration::seconds(i64::from(self.min_interval));
		let elapsed = now - last;
		if elapsed < interval {
			Some(interval - elapsed)
		} else {
			None
		}
	}

	/// Rolls with the thread-local RNG. See [`ActionScheduler::roll_with`].
	pub fn roll(&self, now: DateTime<Utc>) -> Option<Action> {
		self.roll_with(&mut rand::rng(), now)
	}

	/// Returns `None` while the gate is closed, otherwise one weighted draw.
	pub fn roll_with<R: Rng + ?Sized>(&self, rng: &mut R, now: DateTime<Utc>) -> Option<Action> {
		if let Some(remaining) = self.remaining(now) {
			debug!("Too early to act, {}s left", remaining.num_seconds());
			return None;
		}
		Some(self.coefficients.draw(rng))
	}

	/// Records that an action produced output at `now`.
	pub fn mark_acted(&mut self, now: DateTime<Utc>) {
		self.last_action = Some(now);
	}
}
