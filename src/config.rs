use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Runtime configuration for one solving run.
///
/// Always passed into the engine explicitly; the core never reads process
/// environment on its own.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct AppConfig {
	/// Event base URL; the day index is appended to form the challenge URL
	#[serde(default = "default_base_url")]
	pub base_url: String,
	/// Session cookie value used to bypass interactive login
	#[serde(default)]
	pub session: Option<String>,
	/// Literal prefix of bracketed answer tokens (e.g. "THM" for `THM{...}`)
	#[serde(default = "default_flag_prefix")]
	pub flag_prefix: String,
	/// Run with visible browser window (non-headless mode)
	#[serde(default)]
	pub visible: bool,
	/// Settle delay after navigation, in ms (default: 3000)
	#[serde(default = "default_nav_settle_ms")]
	pub nav_settle_ms: u64,
	/// Settle delay after clicking the submit control, in ms (default: 2000)
	#[serde(default = "default_submit_settle_ms")]
	pub submit_settle_ms: u64,
}

fn default_base_url() -> String {
	"https://tryhackme.com/adventofcyber25".to_string()
}

fn default_flag_prefix() -> String {
	"THM".to_string()
}

fn default_nav_settle_ms() -> u64 {
	3000
}

fn default_submit_settle_ms() -> u64 {
	2000
}

impl Default for AppConfig {
	fn default() -> Self {
		Self {
			base_url: default_base_url(),
			session: None,
			flag_prefix: default_flag_prefix(),
			visible: false,
			nav_settle_ms: default_nav_settle_ms(),
			submit_settle_ms: default_submit_settle_ms(),
		}
	}
}

impl AppConfig {
	pub fn nav_settle(&self) -> Duration {
		Duration::from_millis(self.nav_settle_ms)
	}

	pub fn submit_settle(&self) -> Duration {
		Duration::from_millis(self.submit_settle_ms)
	}
}
