use serde::{Deserialize, Serialize};

use crate::scheduler::{ActionCoefficients, ActionScheduler, DEFAULT_MIN_INTERVAL};

/// Engine-wide defaults, applied to conversations when they are created.
#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(default)]
pub struct EngineSettings {
	pub coefficients: ActionCoefficients,
	/// Minimum delay between two actions of a conversation, in seconds.
	pub min_interval: u32,
	/// Generated texts continue for 1 to this many words after the first one.
	pub max_generated_steps: usize,
}

impl Default for EngineSettings {
	fn default() -> Self {
		Self {
			coefficients: ActionCoefficients::default(),
			min_interval: DEFAULT_MIN_INTERVAL,
			max_generated_steps: 20,
		}
	}
}

impl EngineSettings {
	/// A fresh scheduler carrying these defaults.
	pub fn scheduler(&self) -> ActionScheduler {
		ActionScheduler::new(self.coefficients.clone(), self.min_interval)
	}
}
