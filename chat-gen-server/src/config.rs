use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use chat_gen_core::io::normalize_folder;
use chat_gen_core::settings::EngineSettings;
use log::warn;

/// Server configuration, read from the environment (and `.env` if present).
///
/// | Variable               | Default          |
/// |------------------------|------------------|
/// | `CHAT_GEN_BIND`        | `127.0.0.1:5000` |
/// | `CHAT_GEN_CORPUS_DIR`  | `./data`         |
/// | `CHAT_GEN_CORPORA`     | unset            |
/// | `CHAT_GEN_STATE`       | unset            |
/// | `CHAT_GEN_WORKERS`     | CPU count        |
/// | `CHAT_GEN_MIN_INTERVAL`| `30`             |
/// | `CHAT_GEN_MAX_STEPS`   | `20`             |
/// | `CHAT_GEN_SAVE_INTERVAL`| `60`            |
///
/// `CHAT_GEN_CORPORA` names a JSON list of `{file, description}` pairs;
/// without it every `.json` file of the corpus directory is loaded.
/// Without `CHAT_GEN_STATE` conversations live in memory only.
#[derive(Debug, Clone)]
pub struct Config {
	pub bind: String,
	pub corpus_dir: PathBuf,
	pub corpora: Option<PathBuf>,
	pub state_path: Option<PathBuf>,
	/// Delivery threads, one per CPU when unset.
	pub workers: Option<usize>,
	/// Seconds between two saves of changed conversations.
	pub save_interval: u64,
	pub engine: EngineSettings,
}

impl Config {
	pub fn from_env() -> Self {
		let defaults = EngineSettings::default();
		Self {
			bind: env::var("CHAT_GEN_BIND").unwrap_or_else(|_| "127.0.0.1:5000".to_owned()),
			corpus_dir: normalize_folder(&env::var("CHAT_GEN_CORPUS_DIR").unwrap_or_else(|_| "./data".to_owned())),
			corpora: env::var("CHAT_GEN_CORPORA").ok().map(PathBuf::from),
			state_path: env::var("CHAT_GEN_STATE").ok().map(PathBuf::from),
			workers: env::var("CHAT_GEN_WORKERS").ok().and_then(|raw| raw.trim().parse().ok()),
			save_interval: parse_or("CHAT_GEN_SAVE_INTERVAL", 60),
			engine: EngineSettings {
				min_interval: parse_or("CHAT_GEN_MIN_INTERVAL", defaults.min_interval),
				max_generated_steps: parse_or("CHAT_GEN_MAX_STEPS", defaults.max_generated_steps),
				..defaults
			},
		}
	}
}

/// Parses a variable, falling back to `default` when unset or invalid.
fn parse_or<T: FromStr>(name: &str, default: T) -> T {
	match env::var(name) {
		Ok(raw) => match raw.trim().parse() {
			Ok(value) => value,
			Err(_) => {
				warn!("{name}={raw} is not valid, using the default");
				default
			}
		},
		Err(_) => default,
	}
}
