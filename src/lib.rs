use std::{collections::BTreeMap, fmt};

use chrono::Datelike;
use serde::{Deserialize, Serialize};

pub mod browser;
pub mod classify;
pub mod config;
pub mod engine;
pub mod extract;
pub mod login;
pub mod selector;

/// Highest challenge day the event publishes
pub const MAX_CHALLENGE_DAY: u32 = 24;

/// One daily challenge to solve, fixed at the start of a run
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct ChallengeTarget {
	/// Challenge day, 1..=24
	pub index: u32,
	/// Full URL of the challenge page
	pub url: String,
}

impl ChallengeTarget {
	/// Build the target for a specific day, clamping into the valid range
	pub fn for_day(base_url: &str, day: u32) -> Self {
		let index = day.clamp(1, MAX_CHALLENGE_DAY);
		let url = format!("{}/{}", base_url.trim_end_matches('/'), index);
		Self { index, url }
	}

	/// Build today's target from the local day of month, capped at 24
	pub fn for_today(base_url: &str) -> Self {
		Self::for_day(base_url, chrono::Local::now().day())
	}
}

/// One element lifted out of the live DOM at capture time
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct ElementInfo {
	/// Lowercase tag name ("input", "button", ...)
	pub tag: String,
	/// The `type` attribute for inputs, if any
	#[serde(default)]
	pub input_type: Option<String>,
	/// Attributes worth matching on (id, name, class, placeholder, ...)
	#[serde(default)]
	pub attrs: BTreeMap<String, String>,
	/// Visible text content, whitespace-collapsed
	#[serde(default)]
	pub text: String,
	/// CSS path that re-addresses this node for fill/click
	pub locator: String,
}

impl ElementInfo {
	pub fn handle(&self) -> ElementHandle {
		ElementHandle { locator: self.locator.clone() }
	}
}

/// Opaque reference to a captured element, usable for later fill/click calls
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ElementHandle {
	pub locator: String,
}

/// Immutable capture of the page at one point in time.
/// Never mutated; the orchestrator re-captures instead of diffing.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct PageSnapshot {
	/// The page body's rendered inner text
	pub raw_text: String,
	/// Interactive/marker elements present at capture time
	#[serde(default)]
	pub elements: Vec<ElementInfo>,
}

/// Terminal result of one solving run. Produced exactly once.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Outcome {
	/// The challenge was already at 100% before we touched anything
	AlreadyComplete,
	/// Completion confirmed (or a percentage marker observed) after submit
	Solved { progress: String },
	/// No extraction strategy produced a candidate answer
	NoAnswersFound,
	/// The run finished without a fatal error but completion was not confirmed
	PartialFailure { reason: String },
	/// A collaborator (navigation, browser, auth) failed; run aborted
	Fatal { reason: String },
}

impl Outcome {
	/// Process exit code convention: 0 success, 1 degraded, 2 fatal
	pub fn exit_code(&self) -> i32 {
		match self {
			Outcome::AlreadyComplete | Outcome::Solved { .. } => 0,
			Outcome::NoAnswersFound | Outcome::PartialFailure { .. } => 1,
			Outcome::Fatal { .. } => 2,
		}
	}

	pub fn progress(&self) -> &str {
		match self {
			Outcome::AlreadyComplete => "100",
			Outcome::Solved { progress } => progress,
			_ => "unknown",
		}
	}

	pub fn reason(&self) -> Option<&str> {
		match self {
			Outcome::PartialFailure { reason } | Outcome::Fatal { reason } => Some(reason),
			_ => None,
		}
	}

	pub fn status_str(&self) -> &'static str {
		match self {
			Outcome::AlreadyComplete => "already_complete",
			Outcome::Solved { .. } => "solved",
			Outcome::NoAnswersFound => "no_answers_found",
			Outcome::PartialFailure { .. } => "partial_failure",
			Outcome::Fatal { .. } => "fatal",
		}
	}
}

impl fmt::Display for Outcome {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Outcome::AlreadyComplete => write!(f, "already complete"),
			Outcome::Solved { progress } => write!(f, "solved ({progress}%)"),
			Outcome::NoAnswersFound => write!(f, "no answers found"),
			Outcome::PartialFailure { reason } => write!(f, "partial failure: {reason}"),
			Outcome::Fatal { reason } => write!(f, "fatal: {reason}"),
		}
	}
}

/// The final report printed for the caller, one per run
#[derive(Clone, Debug, Serialize)]
pub struct RunReport {
	pub index: u32,
	pub status: &'static str,
	pub progress: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub reason: Option<String>,
	/// Degraded-path observations (strategy used, skipped fields, ...)
	#[serde(skip_serializing_if = "Vec::is_empty")]
	pub notes: Vec<String>,
	pub timestamp: String,
}

impl RunReport {
	pub fn new(target: &ChallengeTarget, outcome: &Outcome, notes: Vec<String>) -> Self {
		Self {
			index: target.index,
			status: outcome.status_str(),
			progress: outcome.progress().to_string(),
			reason: outcome.reason().map(|r| r.to_string()),
			notes,
			timestamp: chrono::Utc::now().to_rfc3339(),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn target_day_is_capped_at_24() {
		let t = ChallengeTarget::for_day("https://example.com/adventofcyber25", 31);
		assert_eq!(t.index, 24);
		assert_eq!(t.url, "https://example.com/adventofcyber25/24");
	}

	#[test]
	fn target_day_floor_is_one() {
		let t = ChallengeTarget::for_day("https://example.com/x/", 0);
		assert_eq!(t.index, 1);
		assert_eq!(t.url, "https://example.com/x/1");
	}

	#[test]
	fn exit_codes_follow_convention() {
		assert_eq!(Outcome::AlreadyComplete.exit_code(), 0);
		assert_eq!(Outcome::Solved { progress: "100".into() }.exit_code(), 0);
		assert_eq!(Outcome::NoAnswersFound.exit_code(), 1);
		assert_eq!(Outcome::PartialFailure { reason: "x".into() }.exit_code(), 1);
		assert_eq!(Outcome::Fatal { reason: "x".into() }.exit_code(), 2);
	}

	#[test]
	fn report_serializes_with_flat_status() {
		let t = ChallengeTarget::for_day("https://example.com", 3);
		let report = RunReport::new(&t, &Outcome::Solved { progress: "100".into() }, vec![]);
		let json = serde_json::to_value(&report).unwrap();
		assert_eq!(json["status"], "solved");
		assert_eq!(json["index"], 3);
		assert_eq!(json["progress"], "100");
		assert!(json.get("reason").is_none());
	}
}
