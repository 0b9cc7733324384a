// Dugout entry point.
//
// Startup sequence:
// 1. Initialize tracing (log to file, stdout is the report)
// 2. Load config and park factors
// 3. Build the HTTP client and source adapters
// 4. Run one fetch cycle into a fresh analysis session
// 5. Print the database summary, waiver suggestions for `my_team`, and
//    streaming options for the next week

use dugout_core::config;
use dugout_core::session::{AnalysisSession, RefreshSummary, StreamingReport};
use dugout_core::sources::http::{self, ScheduleClient};
use dugout_core::valuation::streaming::load_park_factors;

use anyhow::Context;
use chrono::{Days, Utc};
use std::path::Path;
use tracing::{info, warn};

/// Streaming window, today inclusive.
const STREAMING_DAYS: u64 = 6;
const STREAMING_ROWS: usize = 15;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Initialize tracing
    init_tracing()?;
    info!("dugout starting up");

    // 2. Load config and park factors
    let config = config::load_config().context("failed to load configuration")?;
    info!(
        league_id = %config.league.league_id,
        season = config.league.season,
        "config loaded"
    );
    let park_factors = load_park_factors(Path::new(&config.data_paths.park_factors), &config.team_table())
        .context("failed to load park factors")?;

    // 3. HTTP client and adapters
    let fetch = config.fetch_policy();
    let client = http::build_client(fetch.timeout).context("failed to build HTTP client")?;
    let adapters = http::adapters(&client, &config);

    // 4. Fetch cycle
    let mut session = AnalysisSession::from_config(&config, park_factors);
    let summary = session.refresh(&adapters).await;
    print_summary(&summary);

    // 5. Reports
    if let Some(team) = config.league.my_team.as_deref() {
        print_waivers(&session, team);
    }

    let today = Utc::now().date_naive();
    let end = today.checked_add_days(Days::new(STREAMING_DAYS)).unwrap_or(today);
    let schedule = ScheduleClient::new(client, &config);
    match schedule.probable_starts(today, end).await {
        Ok(starts) => {
            let report = session.streaming_candidates(&starts, true);
            print_streaming(&report);
        }
        Err(e) => warn!(error = %e, "schedule unavailable; skipping streaming report"),
    }

    info!("dugout finished");
    Ok(())
}

fn print_summary(summary: &RefreshSummary) {
    println!("{} players from {} records", summary.players, summary.records);
    for (source, count) in &summary.records_per_source {
        println!("  {source:<12} {count:>6}");
    }
    for (source, message) in &summary.failures {
        println!("  {source:<12} unavailable: {message}");
    }
    if summary.field_warnings > 0 {
        println!("  injury status defaulted for {} players", summary.field_warnings);
    }
}

fn print_waivers(session: &AnalysisSession, team: &str) {
    let db = session.get_unified_database();
    let roster = db.roster_of(team);
    if roster.is_empty() {
        warn!(team, "configured team owns no players");
        return;
    }
    println!();
    println!("Waiver upgrades for {team}");
    for player in roster {
        match session.waiver_replacements(&player.canonical_id) {
            Ok(result) => {
                let Some(best) = result.candidates.first() else {
                    continue;
                };
                let status = if result.target_injured { " [IL]" } else { "" };
                println!(
                    "  {:<24} {:>7.1}  ->  {:<24} {:>7.1} ({:+.1}){status}",
                    player.display_name,
                    result.target_composite,
                    best.display_name,
                    best.composite,
                    best.improvement
                );
            }
            Err(e) => warn!(player = %player.canonical_id, error = %e, "waiver analysis skipped"),
        }
    }
}

fn print_streaming(report: &StreamingReport) {
    println!();
    println!("Streaming starts (unrostered)");
    for score in report.scores.iter().take(STREAMING_ROWS) {
        let date = score.date.map(|d| d.format("%a %m-%d").to_string()).unwrap_or_default();
        let matchup = match (&score.opponent, &score.park) {
            (Some(opponent), Some(park)) if park == opponent => format!("@{opponent}"),
            (Some(opponent), _) => format!("vs {opponent}"),
            _ => String::new(),
        };
        let value = if score.is_scored() {
            format!("{:>6.1}", score.score)
        } else {
            "     -".to_string()
        };
        println!("  {date:<10} {:<24} {:<4} {matchup:<8} {value}", score.display_name, score.team);
    }
    if !report.unresolved.is_empty() {
        println!("  ({} scheduled starters not matched)", report.unresolved.len());
    }
}

/// Initialize tracing to log to a file; stdout carries the report.
fn init_tracing() -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let log_dir = std::env::current_dir()?.join("logs");
    std::fs::create_dir_all(&log_dir)?;

    let log_file = std::fs::File::create(log_dir.join("dugout.log"))?;

    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("dugout_core=info,dugout=info,warn")),
        )
        .with_writer(log_file)
        .with_ansi(false)
        .with_target(true)
        .with_line_number(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("failed to set tracing subscriber")?;

    Ok(())
}
