//! Ownerhub CLI - franchise owner dashboard in the terminal.
//!
//! Logs in against the owner hub backend, keeps the session in an encrypted
//! local store and shows the KPI dashboard, served from cache when offline.

use std::io::{self, Write};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use chrono::{Local, TimeZone};
use futures::StreamExt;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use ownerhub_core::cache::CACHE_TTL_MILLIS;
use ownerhub_core::config::{ENV_PASSWORD, ENV_USERNAME};
use ownerhub_core::models::{DashboardStats, Franchise, Trend};
use ownerhub_core::usecase::DashboardViewState;
use ownerhub_core::{key_source_from, AuthRepository, Config, Outcome, OwnerHub};

const USAGE: &str = "\
Usage: ownerhub <command>

Commands:
  login [identifier]     Log in (password from OWNERHUB_PASSWORD or prompt)
  logout                 End the session and clear local owner data
  status                 Show session, franchise and cache state
  franchises             List franchises cached at login
  use <franchise-id>     Make a franchise active
  dashboard [--refresh]  Show the KPI dashboard
  watch                  Keep the dashboard on screen, refreshing it periodically
";

/// Initialize the tracing subscriber for logging.
///
/// Logs go to stderr (filtered by `RUST_LOG`, default `warn`) and to a daily
/// file in the data directory. The guard must live until exit.
fn init_tracing(config: &Config) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let stderr = fmt::layer().with_writer(io::stderr);

    let file = config
        .log_dir()
        .and_then(|dir| {
            std::fs::create_dir_all(&dir)?;
            Ok(dir)
        })
        .ok()
        .map(|dir| {
            let appender = tracing_appender::rolling::daily(dir, "ownerhub.log");
            tracing_appender::non_blocking(appender)
        });

    match file {
        Some((writer, guard)) => {
            tracing_subscriber::registry()
                .with(stderr)
                .with(fmt::layer().with_ansi(false).with_writer(writer))
                .with(filter)
                .init();
            Some(guard)
        }
        None => {
            tracing_subscriber::registry().with(stderr).with(filter).init();
            None
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let config = Config::load().context("Failed to load config")?;
    let _guard = init_tracing(&config);
    info!(base_url = %config.api_base_url, "Ownerhub starting");

    let args: Vec<String> = std::env::args().skip(1).collect();
    let Some(command) = args.first().map(String::as_str) else {
        eprint!("{}", USAGE);
        return Ok(());
    };
    if matches!(command, "-h" | "--help" | "help") {
        print!("{}", USAGE);
        return Ok(());
    }

    let key_source = key_source_from(|k| std::env::var(k).ok());
    let mut hub = OwnerHub::open(config, &key_source)?;

    match command {
        "login" => login(&mut hub, args.get(1).cloned()).await,
        "logout" => logout(&hub).await,
        "status" => status(&hub).await,
        "franchises" => franchises(&hub),
        "use" => {
            let id = args
                .get(1)
                .context("Missing franchise id")?
                .parse::<i32>()
                .context("Franchise id must be a number")?;
            use_franchise(&hub, id)
        }
        "dashboard" => dashboard(&hub, args.iter().any(|a| a == "--refresh")).await,
        "watch" => watch(&hub).await,
        other => {
            eprint!("{}", USAGE);
            bail!("Unknown command: {}", other)
        }
    }
}

fn prompt(label: &str) -> Result<String> {
    print!("{}", label);
    io::stdout().flush()?;
    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    Ok(input.trim().to_string())
}

async fn login(hub: &mut OwnerHub, identifier: Option<String>) -> Result<()> {
    let identifier = match identifier.or_else(|| std::env::var(ENV_USERNAME).ok()) {
        Some(id) => id,
        None => match hub.config.last_username.clone() {
            Some(last) => {
                let input = prompt(&format!("Username or email [{}]: ", last))?;
                if input.is_empty() {
                    last
                } else {
                    input
                }
            }
            None => prompt("Username or email: ")?,
        },
    };
    let password = match std::env::var(ENV_PASSWORD) {
        Ok(password) => password,
        Err(_) => rpassword::prompt_password("Password: ")?,
    };

    println!("Authenticating...");
    let user = match hub.login().execute(&identifier, &password).await {
        Outcome::Success(user) => user,
        Outcome::Error(failure) => bail!("{}", failure.display_message()),
        Outcome::Loading => bail!("Login did not complete"),
    };
    println!("Welcome, {}!", user.display_name());

    hub.config.last_username = Some(identifier);
    if let Err(e) = hub.config.save() {
        warn!(error = %e, "Failed to save config");
    }

    let franchises = hub.auth.user_franchises().await;
    match franchises.as_slice() {
        [] => println!("No franchises are linked to this account."),
        [only] => {
            let outcome = hub.select_franchise().execute(only.id);
            if let Some(failure) = outcome.failure() {
                warn!(franchise_id = only.id, error = %failure, "Failed to select franchise");
            }
            println!("{}", selection_message(only, &outcome));
        }
        _ => {
            print_franchises(hub);
            println!("\nRun `ownerhub use <id>` to pick a franchise.");
        }
    }
    Ok(())
}

fn selection_message(franchise: &Franchise, outcome: &Outcome<Franchise>) -> String {
    match outcome.failure() {
        Some(failure) => format!(
            "Could not select {}: {}. Run `ownerhub use {}` to retry.",
            franchise.name,
            failure.display_message(),
            franchise.id
        ),
        None => format!("Active franchise: {}", franchise.name),
    }
}

async fn logout(hub: &OwnerHub) -> Result<()> {
    match hub.logout().execute().await {
        Outcome::Error(failure) => bail!("{}", failure.display_message()),
        _ => {
            println!("Logged out.");
            Ok(())
        }
    }
}

async fn status(hub: &OwnerHub) -> Result<()> {
    let logged_in = hub.auth.is_logged_in().await;
    println!("Server:     {}", hub.config.api_base_url);
    println!("Session:    {}", if logged_in { "logged in" } else { "logged out" });

    match hub.franchise.active_franchise() {
        Some(f) => println!("Franchise:  {} (#{}, {})", f.name, f.id, f.display_branch_count()),
        None => println!("Franchise:  none selected"),
    }

    match hub.cache.load_dashboard_stats(hub.franchise.active_franchise_id()) {
        Some(cached) => println!(
            "Dashboard:  cached {}{}",
            cached.age_display(),
            if cached.is_stale() { " (stale)" } else { "" }
        ),
        None => println!("Dashboard:  not cached"),
    }
    Ok(())
}

fn print_franchises(hub: &OwnerHub) {
    let active = hub.franchise.active_franchise_id();
    for f in hub.franchise.all_franchises() {
        let marker = if Some(f.id) == active { "*" } else { " " };
        println!("{} {:>5}  {:<30} {}", marker, f.id, f.name, f.display_branch_count());
    }
}

fn franchises(hub: &OwnerHub) -> Result<()> {
    if hub.franchise.all_franchises().is_empty() {
        println!("No franchises cached. Log in first.");
    } else {
        print_franchises(hub);
    }
    Ok(())
}

fn use_franchise(hub: &OwnerHub, id: i32) -> Result<()> {
    match hub.select_franchise().execute(id) {
        Outcome::Success(f) => {
            println!("Active franchise: {}", f.name);
            Ok(())
        }
        Outcome::Error(failure) => bail!("{}", failure.display_message()),
        Outcome::Loading => Ok(()),
    }
}

fn require_session(logged_in: bool) -> Result<()> {
    if !logged_in {
        bail!("Not logged in. Run `ownerhub login` first.");
    }
    Ok(())
}

async fn dashboard(hub: &OwnerHub, force_refresh: bool) -> Result<()> {
    require_session(hub.auth.is_logged_in().await)?;

    let mut view = DashboardViewState::default();
    if force_refresh {
        view.begin_refresh();
        view.finish_refresh(hub.refresh_dashboard().execute().await);
    } else {
        let (tx, mut rx) = tokio::sync::mpsc::channel(8);
        hub.observe_dashboard().once(&tx).await;
        drop(tx);
        while let Some(outcome) = rx.recv().await {
            view.apply(outcome);
        }
    }
    render(hub, &view)
}

async fn watch(hub: &OwnerHub) -> Result<()> {
    require_session(hub.auth.is_logged_in().await)?;

    let mut view = DashboardViewState::default();
    let mut updates = Box::pin(hub.observe_dashboard().stream());
    let mut ticker = tokio::time::interval(Duration::from_millis(CACHE_TTL_MILLIS as u64));
    ticker.tick().await;

    loop {
        tokio::select! {
            update = updates.next() => {
                let Some(outcome) = update else { return Ok(()) };
                let settled = !outcome.is_loading();
                view.apply(outcome);
                if settled {
                    render(hub, &view)?;
                }
            }
            _ = ticker.tick() => {
                view.begin_refresh();
                view.finish_refresh(hub.refresh_dashboard().execute().await);
                render(hub, &view)?;
            }
        }
    }
}

fn format_updated(millis: i64) -> String {
    match Local.timestamp_millis_opt(millis).single() {
        Some(t) => t.format("%Y-%m-%d %H:%M").to_string(),
        None => "unknown".to_string(),
    }
}

fn kpi_line(label: &str, value: String, trend: Trend) {
    println!("  {:<18} {:>16}  {}", label, value, trend.arrow());
}

fn render_stats(stats: &DashboardStats) {
    kpi_line("Sales (MTD)", format!("{:.2}", stats.sales_mtd), stats.sales_trend);
    kpi_line("Cash balance", format!("{:.2}", stats.cash_balance), stats.cash_trend);
    kpi_line("Inventory value", format!("{:.2}", stats.inventory_value), stats.inventory_trend);
    kpi_line("Total BV", format!("{:.2}", stats.total_bv), stats.bv_trend);
    kpi_line("Pending approvals", stats.pending_approvals.to_string(), stats.approvals_trend);
}

fn render(hub: &OwnerHub, view: &DashboardViewState) -> Result<()> {
    let title = hub
        .franchise
        .active_franchise()
        .map(|f| f.name)
        .unwrap_or_else(|| "All franchises".to_string());

    let mut out = io::stdout().lock();
    writeln!(out, "\n{}", title)?;
    writeln!(out, "{}", "-".repeat(title.chars().count().max(20)))?;
    drop(out);

    match view.stats {
        Some(ref stats) => {
            render_stats(stats);
            if let Some(updated) = view.last_updated {
                let note = if view.is_stale { "  (stale, could not refresh)" } else { "" };
                println!("\n  Last updated {}{}", format_updated(updated), note);
            }
        }
        None if view.has_error() => {
            if let Some(ref error) = view.error {
                bail!("{}", error);
            }
        }
        None => println!("  No dashboard data yet."),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ownerhub_core::{ErrorKind, Failure};

    #[test]
    fn test_selection_message_reports_failure() {
        let franchise = Franchise::new(3, "Thika", 1);

        let ok = Outcome::Success(franchise.clone());
        assert_eq!(selection_message(&franchise, &ok), "Active franchise: Thika");

        let failed = Outcome::Error(
            Failure::new(ErrorKind::Data, "write failed").with_message("Could not save selection"),
        );
        let message = selection_message(&franchise, &failed);
        assert!(message.starts_with("Could not select Thika: Could not save selection"));
        assert!(message.contains("ownerhub use 3"));
    }
}
