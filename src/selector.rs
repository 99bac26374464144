//! Ordered-fallback element resolution over a captured snapshot.
//!
//! Page markup for the target site shifts release to release; a single
//! selector is brittle, so every lookup goes through an ordered candidate
//! chain that short-circuits on the first candidate matching at least one
//! live element.

use std::fmt;

use regex::RegexBuilder;

use crate::{ElementInfo, PageSnapshot};

/// One declarative rule for locating an element, tried as part of a chain
#[derive(Clone, Debug)]
pub enum SelectorKind {
	/// Named attribute matched against a case-insensitive pattern.
	/// The pattern is compiled as a regex; if that fails it degrades to a
	/// case-insensitive substring check.
	Attribute { name: String, pattern: String },
	/// Tag equality, optionally narrowed by input `type` equality
	TypeMatch { tag: String, input_type: Option<String> },
	/// Case-sensitive substring of the element's text content; any one of
	/// the needles qualifies, so document order decides between elements
	/// matching different needles
	TextContains { needles: Vec<String> },
	/// The n-th element of a tag in document order. Layout-fragile;
	/// only ever placed last in a chain.
	Positional { tag: String, index: usize },
}

impl SelectorKind {
	fn matches(&self, el: &ElementInfo) -> bool {
		match self {
			SelectorKind::TypeMatch { tag, input_type } => {
				if !el.tag.eq_ignore_ascii_case(tag) {
					return false;
				}
				match input_type {
					Some(t) => el.input_type.as_deref().is_some_and(|et| et.eq_ignore_ascii_case(t)),
					None => true,
				}
			}
			SelectorKind::TextContains { needles } => needles.iter().any(|needle| el.text.contains(needle.as_str())),
			// Attribute and Positional are resolved over the whole snapshot
			SelectorKind::Attribute { .. } | SelectorKind::Positional { .. } => false,
		}
	}
}

impl fmt::Display for SelectorKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			SelectorKind::Attribute { name, pattern } => write!(f, "attribute {name}~'{pattern}'"),
			SelectorKind::TypeMatch { tag, input_type } => match input_type {
				Some(t) => write!(f, "type {tag}[type={t}]"),
				None => write!(f, "type {tag}"),
			},
			SelectorKind::TextContains { needles } => write!(f, "text contains any of {needles:?}"),
			SelectorKind::Positional { tag, index } => write!(f, "positional {tag}#{index}"),
		}
	}
}

/// Collect every element the candidate matches, in document order
fn matches_in<'a>(snapshot: &'a PageSnapshot, candidate: &SelectorKind) -> Vec<&'a ElementInfo> {
	match candidate {
		// Compiled once per candidate, not per element
		SelectorKind::Attribute { name, pattern } => {
			let re = RegexBuilder::new(pattern).case_insensitive(true).build().ok();
			let lowered = pattern.to_lowercase();
			snapshot
				.elements
				.iter()
				.filter(|el| {
					el.attrs.get(name).is_some_and(|value| match &re {
						Some(re) => re.is_match(value),
						None => value.to_lowercase().contains(&lowered),
					})
				})
				.collect()
		}
		SelectorKind::Positional { tag, index } => snapshot
			.elements
			.iter()
			.filter(|el| el.tag.eq_ignore_ascii_case(tag))
			.nth(*index)
			.into_iter()
			.collect(),
		other => snapshot.elements.iter().filter(|el| other.matches(el)).collect(),
	}
}

/// Try candidates strictly in order; return the first element of the first
/// candidate that matches anything, along with the index of that candidate.
/// `None` only when the whole chain is exhausted.
pub fn resolve<'a>(snapshot: &'a PageSnapshot, candidates: &[SelectorKind]) -> Option<(usize, &'a ElementInfo)> {
	resolve_all(snapshot, candidates).and_then(|(i, els)| els.first().copied().map(|el| (i, el)))
}

/// Like [`resolve`], but returns every element matched by the winning candidate
pub fn resolve_all<'a>(snapshot: &'a PageSnapshot, candidates: &[SelectorKind]) -> Option<(usize, Vec<&'a ElementInfo>)> {
	for (i, candidate) in candidates.iter().enumerate() {
		let found = matches_in(snapshot, candidate);
		if !found.is_empty() {
			return Some((i, found));
		}
	}
	None
}
