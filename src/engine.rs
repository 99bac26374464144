//! The solving orchestrator: an explicit state machine that sequences
//! completion-check, extraction, field binding, submit and re-verification.
//!
//! Decision logic lives in the pure [`advance`] transition function; every
//! effectful call goes through the [`PageDriver`] seam so the whole pipeline
//! is testable without a browser.

use std::time::Duration;

use color_eyre::Result;
use tracing::{info, warn};

use crate::{
	ChallengeTarget, ElementHandle, Outcome, PageSnapshot,
	classify::{self, Completion},
	config::AppConfig,
	extract::{self, ExtractedAnswer},
	selector::{self, SelectorKind},
};

/// Effectful collaborators the orchestrator drives (browser in production,
/// a scripted mock in tests). Failures on navigation/snapshot are fatal;
/// type/click failures are degraded and handled per-call.
#[allow(async_fn_in_trait)]
pub trait PageDriver {
	async fn navigate_to(&mut self, url: &str) -> Result<PageSnapshot>;
	async fn current_snapshot(&mut self) -> Result<PageSnapshot>;
	async fn type_into_field(&mut self, field: &ElementHandle, text: &str) -> Result<()>;
	async fn click(&mut self, control: &ElementHandle) -> Result<()>;
	async fn settle(&mut self, duration: Duration);
}

/// Orchestration states. `Submitting` carries whether its single allowed
/// retry has been spent.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum SolveState {
	CheckingCompletion,
	Extracting,
	BindingFields,
	Submitting { retried: bool },
	/// `submit_skipped` remembers the degraded no-control path so the
	/// terminal reason can say so when verification comes up empty
	VerifyingCompletion { submit_skipped: bool },
	Done(Outcome),
}

/// What the current state's effects observed
#[derive(Clone, Debug)]
pub enum SolveEvent {
	Classified(Completion),
	Extracted { count: usize },
	FieldsBound { filled: usize, skipped: usize },
	SubmitClicked,
	SubmitNotFound,
	SubmitTransientFailure,
	Verified { complete: bool, percent: Option<String> },
	CollaboratorFailed { reason: String },
}

/// Pure transition function. All terminal classification happens here;
/// the driver loop only produces events and executes effects.
pub fn advance(state: SolveState, event: SolveEvent) -> SolveState {
	use SolveEvent as E;
	use SolveState as S;

	if let E::CollaboratorFailed { reason } = event {
		return S::Done(Outcome::Fatal { reason });
	}

	match (state, event) {
		(S::CheckingCompletion, E::Classified(Completion::AlreadyComplete)) => S::Done(Outcome::AlreadyComplete),
		(S::CheckingCompletion, E::Classified(Completion::Incomplete)) => S::Extracting,

		(S::Extracting, E::Extracted { count: 0 }) => S::Done(Outcome::NoAnswersFound),
		(S::Extracting, E::Extracted { .. }) => S::BindingFields,

		(S::BindingFields, E::FieldsBound { .. }) => S::Submitting { retried: false },

		(S::Submitting { .. }, E::SubmitClicked) => S::VerifyingCompletion { submit_skipped: false },
		// Degraded path: nothing to click, go straight to verification
		(S::Submitting { .. }, E::SubmitNotFound) => S::VerifyingCompletion { submit_skipped: true },
		(S::Submitting { retried: false }, E::SubmitTransientFailure) => S::Submitting { retried: true },
		(S::Submitting { retried: true }, E::SubmitTransientFailure) => S::Done(Outcome::PartialFailure {
			reason: "submit control failed twice".to_string(),
		}),

		(S::VerifyingCompletion { .. }, E::Verified { complete: true, percent }) => S::Done(Outcome::Solved {
			progress: percent.unwrap_or_else(|| "100".to_string()),
		}),
		(S::VerifyingCompletion { .. }, E::Verified { complete: false, percent: Some(percent) }) => S::Done(Outcome::Solved { progress: percent }),
		(S::VerifyingCompletion { submit_skipped }, E::Verified { complete: false, percent: None }) => S::Done(Outcome::PartialFailure {
			reason: if submit_skipped {
				"no progress change; submit control not found".to_string()
			} else {
				"no progress change".to_string()
			},
		}),

		(state, event) => S::Done(Outcome::Fatal {
			reason: format!("unexpected event {event:?} in state {state:?}"),
		}),
	}
}

/// Result of one run: the single terminal outcome plus degraded-path notes
#[derive(Clone, Debug)]
pub struct SolveRun {
	pub outcome: Outcome,
	pub notes: Vec<String>,
}

/// Candidate chain for fillable answer fields
fn field_candidates() -> Vec<SelectorKind> {
	vec![
		SelectorKind::TypeMatch { tag: "input".to_string(), input_type: Some("text".to_string()) },
		SelectorKind::TypeMatch { tag: "textarea".to_string(), input_type: None },
	]
}

/// Candidate chain for the submit control, evaluated over button-like
/// elements only. One candidate matching either token: the first button in
/// document order wins, whichever word it carries. Case-sensitive on purpose.
fn submit_candidates() -> Vec<SelectorKind> {
	vec![SelectorKind::TextContains {
		needles: vec!["Check".to_string(), "Submit".to_string()],
	}]
}

fn is_button_like(el: &crate::ElementInfo) -> bool {
	el.tag == "button" || (el.tag == "input" && el.input_type.as_deref() == Some("submit")) || el.attrs.get("role").is_some_and(|r| r == "button")
}

/// Drive one challenge to a terminal outcome.
///
/// Exactly one `Outcome` is produced per call, even on fatal collaborator
/// errors. The snapshot is owned here and replaced (never diffed) at each
/// re-capture point.
pub async fn run<D: PageDriver>(driver: &mut D, target: &ChallengeTarget, config: &AppConfig) -> SolveRun {
	let mut notes: Vec<String> = Vec::new();

	info!("Loading day {} challenge: {}", target.index, target.url);
	if let Err(e) = driver.navigate_to(&target.url).await {
		return SolveRun {
			outcome: Outcome::Fatal { reason: format!("navigation failed: {e}") },
			notes,
		};
	}
	driver.settle(config.nav_settle()).await;

	// Capture after the settle so late-rendering content is present
	let mut snapshot = match driver.current_snapshot().await {
		Ok(s) => s,
		Err(e) =>
			return SolveRun {
				outcome: Outcome::Fatal { reason: format!("snapshot failed: {e}") },
				notes,
			},
	};

	let mut state = SolveState::CheckingCompletion;
	let mut answers: Vec<ExtractedAnswer> = Vec::new();

	loop {
		let event = match &state {
			SolveState::CheckingCompletion => SolveEvent::Classified(classify::classify(&snapshot)),

			SolveState::Extracting => {
				answers = extract::extract(&snapshot.raw_text, &config.flag_prefix);
				if let Some(first) = answers.first() {
					info!("Found {} candidate answer(s) via {}", answers.len(), first.strategy);
					notes.push(format!("extraction strategy: {}", first.strategy));
				}
				SolveEvent::Extracted { count: answers.len() }
			}

			SolveState::BindingFields => {
				let fields = match selector::resolve_all(&snapshot, &field_candidates()) {
					Some((idx, found)) => {
						notes.push(format!("field selector fired: candidate #{idx}"));
						found.iter().map(|el| el.handle()).collect::<Vec<_>>()
					}
					None => Vec::new(),
				};

				// Positional binding: i-th field gets the i-th answer;
				// leftovers on either side are skipped, never an error.
				let bound = fields.len().min(answers.len());
				if fields.len() != answers.len() {
					notes.push(format!("bound {bound} of {} field(s) / {} answer(s)", fields.len(), answers.len()));
				}
				let mut filled = 0;
				let mut skipped = 0;
				for (field, answer) in fields.iter().zip(answers.iter()).take(bound) {
					info!("Filling {} with {}", field.locator, answer.value);
					match driver.type_into_field(field, &answer.value).await {
						Ok(()) => filled += 1,
						Err(e) => {
							warn!("Could not fill {}: {e}", field.locator);
							notes.push(format!("fill skipped for {}: {e}", field.locator));
							skipped += 1;
						}
					}
				}
				SolveEvent::FieldsBound { filled, skipped }
			}

			SolveState::Submitting { retried } => {
				let buttons = PageSnapshot {
					raw_text: String::new(),
					elements: snapshot.elements.iter().filter(|el| is_button_like(el)).cloned().collect(),
				};
				match selector::resolve(&buttons, &submit_candidates()) {
					Some((_, control)) => {
						info!("Clicking submit control {}", control.locator);
						match driver.click(&control.handle()).await {
							Ok(()) => {
								driver.settle(config.submit_settle()).await;
								SolveEvent::SubmitClicked
							}
							Err(e) => {
								warn!("Submit click failed (retried: {retried}): {e}");
								if !retried {
									driver.settle(Duration::from_millis(500)).await;
								} else {
									notes.push(format!("submit click failed twice: {e}"));
								}
								SolveEvent::SubmitTransientFailure
							}
						}
					}
					None => {
						warn!("No submit control found; verifying without clicking");
						notes.push("submit control not found; proceeded without clicking".to_string());
						SolveEvent::SubmitNotFound
					}
				}
			}

			SolveState::VerifyingCompletion { .. } => match driver.current_snapshot().await {
				Ok(fresh) => {
					snapshot = fresh;
					let complete = classify::classify(&snapshot) == Completion::AlreadyComplete;
					let percent = classify::progress_percent(&snapshot.raw_text);
					SolveEvent::Verified { complete, percent }
				}
				Err(e) => SolveEvent::CollaboratorFailed { reason: format!("re-snapshot failed: {e}") },
			},

			SolveState::Done(outcome) => {
				info!("Day {}: {}", target.index, outcome);
				return SolveRun { outcome: outcome.clone(), notes };
			}
		};

		state = advance(state, event);
	}
}

#[cfg(test)]
mod tests {
	use std::collections::BTreeMap;

	use color_eyre::eyre::eyre;

	use super::*;
	use crate::ElementInfo;

	fn el(tag: &str, input_type: Option<&str>, text: &str, locator: &str) -> ElementInfo {
		ElementInfo {
			tag: tag.to_string(),
			input_type: input_type.map(|s| s.to_string()),
			attrs: BTreeMap::new(),
			text: text.to_string(),
			locator: locator.to_string(),
		}
	}

	fn snap(text: &str, elements: Vec<ElementInfo>) -> PageSnapshot {
		PageSnapshot { raw_text: text.to_string(), elements }
	}

	/// Scripted driver: serves snapshots in order (the last one repeats)
	/// and records every fill/click.
	#[derive(Default)]
	struct MockDriver {
		snapshots: Vec<PageSnapshot>,
		served: usize,
		typed: Vec<(String, String)>,
		clicked: Vec<String>,
		fail_fill_locators: Vec<String>,
		click_failures_remaining: u32,
		fail_navigation: bool,
	}

	impl MockDriver {
		fn with_snapshots(snapshots: Vec<PageSnapshot>) -> Self {
			Self { snapshots, ..Default::default() }
		}

		fn next_snapshot(&mut self) -> PageSnapshot {
			let idx = self.served.min(self.snapshots.len() - 1);
			self.served += 1;
			self.snapshots[idx].clone()
		}
	}

	impl PageDriver for MockDriver {
		async fn navigate_to(&mut self, _url: &str) -> Result<PageSnapshot> {
			if self.fail_navigation {
				return Err(eyre!("net::ERR_NAME_NOT_RESOLVED"));
			}
			Ok(self.next_snapshot())
		}

		async fn current_snapshot(&mut self) -> Result<PageSnapshot> {
			Ok(self.next_snapshot())
		}

		async fn type_into_field(&mut self, field: &ElementHandle, text: &str) -> Result<()> {
			if self.fail_fill_locators.contains(&field.locator) {
				return Err(eyre!("element not interactable"));
			}
			self.typed.push((field.locator.clone(), text.to_string()));
			Ok(())
		}

		async fn click(&mut self, control: &ElementHandle) -> Result<()> {
			if self.click_failures_remaining > 0 {
				self.click_failures_remaining -= 1;
				return Err(eyre!("node detached"));
			}
			self.clicked.push(control.locator.clone());
			Ok(())
		}

		async fn settle(&mut self, _duration: Duration) {}
	}

	fn target() -> ChallengeTarget {
		ChallengeTarget::for_day("https://example.com/event", 5)
	}

	fn config() -> AppConfig {
		AppConfig { nav_settle_ms: 0, submit_settle_ms: 0, ..AppConfig::default() }
	}

	// --- pure transition table ---

	#[test]
	fn transitions_follow_the_table() {
		use SolveEvent as E;
		use SolveState as S;

		assert_eq!(advance(S::CheckingCompletion, E::Classified(Completion::AlreadyComplete)), S::Done(Outcome::AlreadyComplete));
		assert_eq!(advance(S::CheckingCompletion, E::Classified(Completion::Incomplete)), S::Extracting);
		assert_eq!(advance(S::Extracting, E::Extracted { count: 0 }), S::Done(Outcome::NoAnswersFound));
		assert_eq!(advance(S::Extracting, E::Extracted { count: 2 }), S::BindingFields);
		assert_eq!(advance(S::BindingFields, E::FieldsBound { filled: 1, skipped: 0 }), S::Submitting { retried: false });
		assert_eq!(advance(S::Submitting { retried: false }, E::SubmitClicked), S::VerifyingCompletion { submit_skipped: false });
		assert_eq!(advance(S::Submitting { retried: false }, E::SubmitNotFound), S::VerifyingCompletion { submit_skipped: true });
	}

	#[test]
	fn submit_retries_exactly_once() {
		use SolveEvent as E;
		use SolveState as S;

		let after_first = advance(S::Submitting { retried: false }, E::SubmitTransientFailure);
		assert_eq!(after_first, S::Submitting { retried: true });
		match advance(after_first, E::SubmitTransientFailure) {
			S::Done(Outcome::PartialFailure { .. }) => {}
			other => panic!("expected partial failure, got {other:?}"),
		}
	}

	#[test]
	fn verification_maps_to_solved_or_partial() {
		use SolveEvent as E;
		use SolveState as S;

		assert_eq!(
			advance(S::VerifyingCompletion { submit_skipped: false }, E::Verified { complete: true, percent: Some("100".into()) }),
			S::Done(Outcome::Solved { progress: "100".into() })
		);
		// a bare percentage marker counts as progress even if the classifier disagrees
		assert_eq!(
			advance(S::VerifyingCompletion { submit_skipped: false }, E::Verified { complete: false, percent: Some("60".into()) }),
			S::Done(Outcome::Solved { progress: "60".into() })
		);
		assert_eq!(
			advance(S::VerifyingCompletion { submit_skipped: false }, E::Verified { complete: false, percent: None }),
			S::Done(Outcome::PartialFailure { reason: "no progress change".into() })
		);
		// the degraded no-control path surfaces in the terminal reason
		assert_eq!(
			advance(S::VerifyingCompletion { submit_skipped: true }, E::Verified { complete: false, percent: None }),
			S::Done(Outcome::PartialFailure { reason: "no progress change; submit control not found".into() })
		);
	}

	#[test]
	fn collaborator_failure_is_fatal_from_any_state() {
		use SolveEvent as E;
		use SolveState as S;

		for state in [
			S::CheckingCompletion,
			S::Extracting,
			S::BindingFields,
			S::Submitting { retried: false },
			S::VerifyingCompletion { submit_skipped: false },
		] {
			match advance(state, E::CollaboratorFailed { reason: "boom".into() }) {
				S::Done(Outcome::Fatal { reason }) => assert_eq!(reason, "boom"),
				other => panic!("expected fatal, got {other:?}"),
			}
		}
	}

	// --- end-to-end scenarios against the mock driver ---

	#[tokio::test]
	async fn already_complete_touches_nothing() {
		let mut driver = MockDriver::with_snapshots(vec![snap("Progress: 100%", vec![])]);
		let run = run(&mut driver, &target(), &config()).await;
		assert_eq!(run.outcome, Outcome::AlreadyComplete);
		assert!(driver.typed.is_empty());
		assert!(driver.clicked.is_empty());
	}

	#[tokio::test]
	async fn fills_both_fields_in_order_clicks_and_reverifies() {
		let challenge = snap("Question 1\nTHM{abc123}\nQuestion 2\nTHM{xyz789}", vec![
			el("input", Some("text"), "", "#field-0"),
			el("input", Some("text"), "", "#field-1"),
			el("button", None, "Check Answers", "#check"),
		]);
		let after_submit = snap("Progress: 100%", vec![]);
		// served: navigate, post-settle capture, post-click verification
		let mut driver = MockDriver::with_snapshots(vec![challenge.clone(), challenge, after_submit]);

		let run = run(&mut driver, &target(), &config()).await;
		assert_eq!(run.outcome, Outcome::Solved { progress: "100".into() });
		assert_eq!(driver.typed, vec![
			("#field-0".to_string(), "THM{abc123}".to_string()),
			("#field-1".to_string(), "THM{xyz789}".to_string()),
		]);
		assert_eq!(driver.clicked, vec!["#check".to_string()]);
	}

	#[tokio::test]
	async fn no_answers_found_touches_no_fields() {
		let page = snap("Just a story, nothing to extract here", vec![el("input", Some("text"), "", "#field-0")]);
		let mut driver = MockDriver::with_snapshots(vec![page]);
		let run = run(&mut driver, &target(), &config()).await;
		assert_eq!(run.outcome, Outcome::NoAnswersFound);
		assert!(driver.typed.is_empty());
		assert!(driver.clicked.is_empty());
	}

	#[tokio::test]
	async fn missing_submit_control_degrades_but_still_verifies() {
		let challenge = snap("THM{only}", vec![el("input", Some("text"), "", "#field-0")]);
		// careful: "incomplete" would trip the substring classifier
		let unchanged = snap("THM{only} still unsolved, no markers", vec![]);
		let mut driver = MockDriver::with_snapshots(vec![challenge.clone(), challenge, unchanged]);

		let run = run(&mut driver, &target(), &config()).await;
		assert_eq!(run.outcome, Outcome::PartialFailure { reason: "no progress change; submit control not found".into() });
		assert!(driver.clicked.is_empty());
		assert!(run.notes.iter().any(|n| n.contains("submit control not found")));
	}

	#[tokio::test]
	async fn binding_consumes_min_of_fields_and_answers() {
		// m=3 fields, n=5 answers: 3 pairs, first 3 answers
		let text = "THM{a1} THM{a2} THM{a3} THM{a4} THM{a5}";
		let challenge = snap(text, vec![
			el("input", Some("text"), "", "#f0"),
			el("input", Some("text"), "", "#f1"),
			el("input", Some("text"), "", "#f2"),
			el("button", None, "Submit", "#s"),
		]);
		let mut driver = MockDriver::with_snapshots(vec![challenge.clone(), challenge, snap("100%", vec![])]);
		run(&mut driver, &target(), &config()).await;
		assert_eq!(driver.typed.len(), 3);
		assert_eq!(driver.typed[2], ("#f2".to_string(), "THM{a3}".to_string()));

		// m=5 fields, n=2 answers: 2 pairs, 3 fields untouched
		let text = "THM{b1} THM{b2}";
		let fields: Vec<ElementInfo> = (0..5).map(|i| el("input", Some("text"), "", &format!("#g{i}"))).collect();
		let mut elements = fields;
		elements.push(el("button", None, "Submit", "#s"));
		let challenge = snap(text, elements);
		let mut driver = MockDriver::with_snapshots(vec![challenge.clone(), challenge, snap("100%", vec![])]);
		let run = run(&mut driver, &target(), &config()).await;
		assert_eq!(driver.typed.len(), 2);
		assert!(matches!(run.outcome, Outcome::Solved { .. }));
	}

	#[tokio::test]
	async fn fill_failure_is_skipped_not_fatal() {
		let challenge = snap("THM{a} THM{b}", vec![
			el("input", Some("text"), "", "#ok"),
			el("input", Some("text"), "", "#broken"),
			el("button", None, "Check", "#check"),
		]);
		let mut driver = MockDriver::with_snapshots(vec![challenge.clone(), challenge, snap("100%", vec![])]);
		driver.fail_fill_locators = vec!["#broken".to_string()];

		let run = run(&mut driver, &target(), &config()).await;
		assert_eq!(run.outcome, Outcome::Solved { progress: "100".into() });
		assert_eq!(driver.typed.len(), 1);
		assert!(run.notes.iter().any(|n| n.contains("fill skipped")));
	}

	#[tokio::test]
	async fn transient_click_failure_is_retried_once() {
		let challenge = snap("THM{a}", vec![el("input", Some("text"), "", "#f"), el("button", None, "Submit", "#s")]);
		let mut driver = MockDriver::with_snapshots(vec![challenge.clone(), challenge, snap("100%", vec![])]);
		driver.click_failures_remaining = 1;

		let run = run(&mut driver, &target(), &config()).await;
		assert_eq!(run.outcome, Outcome::Solved { progress: "100".into() });
		assert_eq!(driver.clicked, vec!["#s".to_string()]);
	}

	#[tokio::test]
	async fn two_click_failures_end_in_partial_failure() {
		let challenge = snap("THM{a}", vec![el("input", Some("text"), "", "#f"), el("button", None, "Submit", "#s")]);
		let mut driver = MockDriver::with_snapshots(vec![challenge.clone(), challenge]);
		driver.click_failures_remaining = 2;

		let run = run(&mut driver, &target(), &config()).await;
		assert_eq!(run.outcome, Outcome::PartialFailure { reason: "submit control failed twice".into() });
	}

	#[tokio::test]
	async fn navigation_failure_is_fatal() {
		let mut driver = MockDriver::with_snapshots(vec![snap("", vec![])]);
		driver.fail_navigation = true;

		let run = run(&mut driver, &target(), &config()).await;
		match run.outcome {
			Outcome::Fatal { reason } => assert!(reason.contains("navigation failed")),
			other => panic!("expected fatal, got {other:?}"),
		}
	}

	#[tokio::test]
	async fn first_button_with_either_token_wins_in_document_order() {
		let challenge = snap("THM{a}", vec![
			el("input", Some("text"), "", "#f"),
			el("button", None, "Submit all", "#submit"),
			el("button", None, "Check Answers", "#check"),
		]);
		let mut driver = MockDriver::with_snapshots(vec![challenge.clone(), challenge, snap("100%", vec![])]);
		run(&mut driver, &target(), &config()).await;
		assert_eq!(driver.clicked, vec!["#submit".to_string()]);
	}

	#[tokio::test]
	async fn non_button_text_matches_are_ignored_for_submit() {
		// a div containing "Submit" must not be treated as the control
		let challenge = snap("THM{a}", vec![el("input", Some("text"), "", "#f"), el("div", None, "Submit your answers below", "#d")]);
		let unchanged = snap("no change", vec![]);
		let mut driver = MockDriver::with_snapshots(vec![challenge.clone(), challenge, unchanged]);

		let run = run(&mut driver, &target(), &config()).await;
		assert!(driver.clicked.is_empty());
		assert_eq!(run.outcome, Outcome::PartialFailure { reason: "no progress change; submit control not found".into() });
	}
}
