//! Session-cookie authentication.
//!
//! The event site accepts a pre-existing `Session` cookie, so there is no
//! interactive login flow: attach the cookie before the first navigation and
//! probe for a logged-in marker afterwards.

use chromiumoxide::{Page, cdp::browser_protocol::network::CookieParam};
use color_eyre::{Result, eyre::eyre};
use tracing::{info, warn};

use crate::config::AppConfig;

/// Attach the configured session cookie to the browser, scoped to the
/// event's domain. A missing token is allowed (public pages still render);
/// a malformed cookie or CDP failure is fatal.
pub async fn authenticate(page: &Page, config: &AppConfig) -> Result<()> {
	let Some(session) = config.session.as_deref() else {
		warn!("No session token provided; proceeding unauthenticated");
		return Ok(());
	};

	let domain = cookie_domain(&config.base_url)?;
	info!("Setting authentication cookie for {domain}...");

	let cookie = CookieParam::builder()
		.name("Session")
		.value(session)
		.domain(domain)
		.path("/")
		.build()
		.map_err(|e| eyre!("invalid session cookie: {e}"))?;

	page.set_cookies(vec![cookie]).await.map_err(|e| eyre!("failed to set session cookie: {e}"))?;
	Ok(())
}

/// Check for a logged-in marker on the current page. Absence is reported,
/// not fatal: some challenge pages render without a user menu.
pub async fn verify_session(page: &Page) -> bool {
	let logged_in = page.find_element("a[href*='logout'], .usermenu, [data-testid='user-menu']").await.is_ok();
	if logged_in {
		info!("Session verified: user menu present");
	} else {
		warn!("Could not verify session: no user menu found");
	}
	logged_in
}

/// Derive the cookie domain from the event base URL
fn cookie_domain(base_url: &str) -> Result<String> {
	let stripped = base_url.split("://").nth(1).unwrap_or(base_url);
	let host = stripped.split('/').next().unwrap_or_default();
	let host = host.split(':').next().unwrap_or(host);
	if host.is_empty() {
		return Err(eyre!("cannot derive cookie domain from '{base_url}'"));
	}
	Ok(host.to_string())
}
