//! chromiumoxide-backed implementation of the [`PageDriver`] seam.
//!
//! All DOM reads go through one injected snapshot script that returns JSON;
//! fills dispatch real input/change events so framework-bound fields notice
//! the value.

use std::time::Duration;

use chromiumoxide::Page;
use color_eyre::{Result, eyre::eyre};
use tracing::debug;

use crate::{ElementHandle, PageSnapshot, engine::PageDriver};

pub struct ChromeDriver {
	page: Page,
}

impl ChromeDriver {
	pub fn new(page: Page) -> Self {
		Self { page }
	}

	async fn capture(&self) -> Result<PageSnapshot> {
		let result = self.page.evaluate(SNAPSHOT_SCRIPT).await.map_err(|e| eyre!("snapshot script failed: {e}"))?;
		let json_str = result.value().and_then(|v| v.as_str()).ok_or_else(|| eyre!("snapshot script returned no payload"))?;
		let snapshot: PageSnapshot = serde_json::from_str(json_str).map_err(|e| eyre!("snapshot payload not parseable: {e}"))?;
		debug!("Captured snapshot: {} chars of text, {} elements", snapshot.raw_text.len(), snapshot.elements.len());
		Ok(snapshot)
	}
}

impl PageDriver for ChromeDriver {
	async fn navigate_to(&mut self, url: &str) -> Result<PageSnapshot> {
		self.page.goto(url).await.map_err(|e| eyre!("failed to navigate to {url}: {e}"))?;
		// Navigation may already be done by the time we wait; that's fine
		let _ = self.page.wait_for_navigation().await;
		self.capture().await
	}

	async fn current_snapshot(&mut self) -> Result<PageSnapshot> {
		self.capture().await
	}

	async fn type_into_field(&mut self, field: &ElementHandle, text: &str) -> Result<()> {
		let script = format!(
			r#"
			(function() {{
				const el = document.querySelector("{}");
				if (el) {{
					el.value = "{}";
					el.dispatchEvent(new Event('input', {{ bubbles: true }}));
					el.dispatchEvent(new Event('change', {{ bubbles: true }}));
					return true;
				}}
				return false;
			}})()
			"#,
			js_escape(&field.locator),
			js_escape(text)
		);

		let result = self.page.evaluate(script).await.map_err(|e| eyre!("failed to fill field: {e}"))?;
		if result.value().and_then(|v| v.as_bool()) != Some(true) {
			return Err(eyre!("field {} not found for fill", field.locator));
		}
		Ok(())
	}

	async fn click(&mut self, control: &ElementHandle) -> Result<()> {
		// Prefer a real CDP click; fall back to a JS click when the element
		// resists hit-testing (overlays, off-screen controls)
		if let Ok(element) = self.page.find_element(&control.locator).await {
			if element.click().await.is_ok() {
				return Ok(());
			}
		}

		let script = format!(
			r#"
			(function() {{
				const el = document.querySelector("{}");
				if (el) {{ el.click(); return true; }}
				return false;
			}})()
			"#,
			js_escape(&control.locator)
		);
		let result = self.page.evaluate(script).await.map_err(|e| eyre!("failed to click: {e}"))?;
		if result.value().and_then(|v| v.as_bool()) != Some(true) {
			return Err(eyre!("control {} not found for click", control.locator));
		}
		Ok(())
	}

	async fn settle(&mut self, duration: Duration) {
		tokio::time::sleep(duration).await;
	}
}

/// Escape a string for embedding inside a double-quoted JS literal
fn js_escape(s: &str) -> String {
	s.replace('\\', "\\\\").replace('"', "\\\"").replace('\n', "\\n").replace('\r', "\\r").replace('\t', "\\t")
}

/// Lifts the page text plus every interactive/progress-marker element into
/// the JSON shape of [`PageSnapshot`]. Locators are stable CSS paths so the
/// same node can be addressed again for fill/click.
const SNAPSHOT_SCRIPT: &str = r#"
	(function() {
		function cssPath(el) {
			const parts = [];
			while (el && el.nodeType === Node.ELEMENT_NODE && el.tagName.toLowerCase() !== 'html') {
				let part = el.tagName.toLowerCase();
				if (el.id) {
					parts.unshift(part + '#' + CSS.escape(el.id));
					break;
				}
				const parent = el.parentNode;
				if (parent) {
					const siblings = Array.from(parent.children).filter(s => s.tagName === el.tagName);
					if (siblings.length > 1) {
						part += ':nth-of-type(' + (siblings.indexOf(el) + 1) + ')';
					}
				}
				parts.unshift(part);
				el = parent;
			}
			return parts.join(' > ');
		}

		const picked = document.querySelectorAll(
			'input, textarea, button, [role="button"], [class*="progress" i], [id*="progress" i]'
		);
		const elements = [];
		for (const el of picked) {
			const tag = el.tagName.toLowerCase();
			const attrs = {};
			for (const name of ['id', 'name', 'class', 'placeholder', 'role', 'aria-label', 'data-testid']) {
				const v = el.getAttribute(name);
				if (v) attrs[name] = v;
			}
			elements.push({
				tag: tag,
				input_type: tag === 'input' ? (el.getAttribute('type') || 'text') : null,
				attrs: attrs,
				text: ((el.innerText || el.value || '') + '').replace(/\s+/g, ' ').trim(),
				locator: cssPath(el)
			});
		}

		return JSON.stringify({
			raw_text: document.body ? document.body.innerText : '',
			elements: elements
		});
	})()
"#;
