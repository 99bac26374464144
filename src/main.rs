use chromiumoxide::browser::{Browser, BrowserConfig};
use clap::Parser;
use color_eyre::Result;
use futures::StreamExt;
use thm_headless::{
	ChallengeTarget, Outcome, RunReport,
	browser::ChromeDriver,
	config::AppConfig,
	engine::{self, SolveRun},
	login,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "thm_headless")]
#[command(about = "Automated TryHackMe Advent of Cyber daily-challenge solver", long_about = None)]
struct Args {
	/// Run with visible browser window (non-headless mode)
	#[arg(long)]
	visible: bool,

	/// Session cookie value used to bypass login
	#[arg(long, env = "THM_SESSION", hide_env_values = true)]
	session: Option<String>,

	/// Event base URL; the day index is appended to it
	#[arg(long, default_value = "https://tryhackme.com/adventofcyber25")]
	base_url: String,

	/// Override the date-derived challenge day (clamped to 1..=24)
	#[arg(long)]
	day: Option<u32>,

	/// Literal prefix of bracketed answer tokens
	#[arg(long, default_value = "THM")]
	flag_prefix: String,
}

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;
	tracing_subscriber::fmt()
		.with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
		.with_writer(std::io::stderr)
		.init();

	let args = Args::parse();
	let config = AppConfig {
		base_url: args.base_url,
		session: args.session,
		flag_prefix: args.flag_prefix,
		visible: args.visible,
		..AppConfig::default()
	};

	// The target is fixed once per run, before any navigation
	let target = match args.day {
		Some(day) => ChallengeTarget::for_day(&config.base_url, day),
		None => ChallengeTarget::for_today(&config.base_url),
	};
	info!("Auto-solver started for day {} ({})", target.index, target.url);

	// Configure browser based on visibility flag
	let mut builder = BrowserConfig::builder().window_size(1280, 1024).no_sandbox();
	if config.visible {
		builder = builder.with_head();
	}
	let browser_config = builder.build().map_err(|e| color_eyre::eyre::eyre!("Failed to build browser config: {}", e))?;

	let (mut browser, mut handler) = Browser::launch(browser_config)
		.await
		.map_err(|e| color_eyre::eyre::eyre!("Failed to launch browser: {}", e))?;

	// Drain browser events so the connection does not stall
	let handle = tokio::spawn(async move {
		while let Some(_event) = handler.next().await {
			// Silently consume events
		}
	});

	let page = browser
		.new_page("about:blank")
		.await
		.map_err(|e| color_eyre::eyre::eyre!("Failed to create new page: {}", e))?;

	let run = solve(&page, &target, &config).await;
	let report = RunReport::new(&target, &run.outcome, run.notes);
	println!("{}", serde_json::to_string_pretty(&report)?);

	drop(page);
	browser.close().await.ok();
	drop(browser);
	handle.abort();

	std::process::exit(run.outcome.exit_code());
}

/// Authenticate, verify the session, then hand control to the engine.
/// Always yields exactly one outcome, fatal errors included.
async fn solve(page: &chromiumoxide::Page, target: &ChallengeTarget, config: &AppConfig) -> SolveRun {
	if let Err(e) = login::authenticate(page, config).await {
		return SolveRun {
			outcome: Outcome::Fatal { reason: format!("authentication failed: {e}") },
			notes: vec![],
		};
	}

	// Warm-up navigation to the event root; the logged-in check is advisory
	if let Err(e) = page.goto(&config.base_url).await {
		return SolveRun {
			outcome: Outcome::Fatal { reason: format!("failed to reach {}: {e}", config.base_url) },
			notes: vec![],
		};
	}
	tokio::time::sleep(config.nav_settle()).await;
	login::verify_session(page).await;

	let mut driver = ChromeDriver::new(page.clone());
	engine::run(&mut driver, target, config).await
}
