//! Answer extraction from raw page text.
//!
//! Strategies are tried in priority order and the first one that yields
//! anything wins. The extractor never looks at page structure, only text,
//! so it works unchanged across layout changes.

use std::fmt;

use regex::Regex;

/// Which heuristic produced an answer
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ExtractionStrategy {
	/// `PREFIX{...}` token scan
	BracketedToken,
	/// First long word on a line mentioning "answer" or "flag"
	LabeledLine,
}

impl fmt::Display for ExtractionStrategy {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			ExtractionStrategy::BracketedToken => write!(f, "bracketed-token"),
			ExtractionStrategy::LabeledLine => write!(f, "labeled-line"),
		}
	}
}

/// One candidate answer; confidence is implicit in strategy and text order
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ExtractedAnswer {
	pub value: String,
	pub strategy: ExtractionStrategy,
}

/// Extract candidate answers from page text.
///
/// Returns an empty vec when no strategy matches; that is a valid result,
/// not an error. Deterministic: identical text yields identical output.
pub fn extract(raw_text: &str, prefix: &str) -> Vec<ExtractedAnswer> {
	let bracketed = extract_bracketed(raw_text, prefix);
	if !bracketed.is_empty() {
		return bracketed;
	}
	extract_labeled_lines(raw_text)
}

/// Strategy 1: all non-overlapping `PREFIX{...}` tokens, in order of appearance
fn extract_bracketed(raw_text: &str, prefix: &str) -> Vec<ExtractedAnswer> {
	let pattern = format!(r"{}\{{[^}}]+\}}", regex::escape(prefix));
	let Ok(re) = Regex::new(&pattern) else {
		return Vec::new();
	};
	re.find_iter(raw_text)
		.map(|m| ExtractedAnswer {
			value: m.as_str().to_string(),
			strategy: ExtractionStrategy::BracketedToken,
		})
		.collect()
}

/// Strategy 2: lines mentioning "answer" or "flag" donate their first
/// plausible token (longer than 3 chars, no period, not the label word itself)
fn extract_labeled_lines(raw_text: &str) -> Vec<ExtractedAnswer> {
	raw_text
		.lines()
		.filter(|line| {
			let lower = line.to_lowercase();
			lower.contains("answer") || lower.contains("flag")
		})
		.filter_map(|line| {
			line.split(|c: char| c.is_whitespace() || c == ':' || c == ',')
				.filter(|tok| !tok.is_empty())
				.find(|tok| {
					// Only the label word itself is disqualified; tokens that
					// merely contain it ("flagship2024") are fair answers
					let lower = tok.to_lowercase();
					tok.chars().count() > 3 && !tok.contains('.') && lower != "answer" && lower != "flag"
				})
				.map(|tok| ExtractedAnswer {
					value: tok.to_string(),
					strategy: ExtractionStrategy::LabeledLine,
				})
		})
		.collect()
}
