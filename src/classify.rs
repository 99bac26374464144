//! Completion detection over a page snapshot.
//!
//! The same predicate runs twice per solve: before touching the page (skip
//! if already done) and after submission (confirm success).

use regex::Regex;

use crate::PageSnapshot;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Completion {
	AlreadyComplete,
	Incomplete,
}

/// A page is complete when any one of these holds:
/// - the raw text contains "100%" anywhere,
/// - a progress-bearing element's text is exactly "100%",
/// - the raw text carries a literal "complete"/"Completed" marker.
pub fn classify(snapshot: &PageSnapshot) -> Completion {
	let text = &snapshot.raw_text;
	if text.contains("100%") || text.contains("complete") || text.contains("Completed") {
		return Completion::AlreadyComplete;
	}

	let progress_element_full = snapshot.elements.iter().any(|el| {
		let marks_progress = ["class", "id"].iter().any(|attr| el.attrs.get(*attr).is_some_and(|v| v.to_lowercase().contains("progress")));
		marks_progress && el.text.trim() == "100%"
	});
	if progress_element_full {
		return Completion::AlreadyComplete;
	}

	Completion::Incomplete
}

/// First digit-run-before-`%` in the text, e.g. "Progress: 40%" -> "40"
pub fn progress_percent(text: &str) -> Option<String> {
	let re = Regex::new(r"(\d+)%").ok()?;
	re.captures(text).map(|caps| caps[1].to_string())
}
