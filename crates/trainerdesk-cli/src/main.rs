//! Trainerdesk CLI - refresh and inspect payment status from a terminal.
//!
//! Reads the API endpoint from `--api-url`, `TRAINERDESK_API_URL` or the
//! config file, and the session from `TRAINERDESK_TOKEN` and
//! `TRAINERDESK_USER_ID`. A `.env` file in the working directory is honored.

use std::io;
use std::path::Path;

use anyhow::{bail, Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand, ValueEnum};
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use trainerdesk_core::models::{NewPayment, PaymentMethod};
use trainerdesk_core::resilience::SmartRefreshOutcome;
use trainerdesk_core::utils::{format_amount, format_date, format_days, truncate_string};
use trainerdesk_core::views::SeriesBucket;
use trainerdesk_core::{
    Config, Dashboard, RefreshOutcome, RestClient, SessionData, SessionEvent, SyncEngine,
    TracingNotifier,
};

/// Width of the name column in the status table
const NAME_WIDTH: usize = 24;

const LOG_FILE_PREFIX: &str = "trainerdesk.log";

#[derive(Parser)]
#[command(name = "trainerdesk")]
#[command(about = "Refresh and inspect trainer payment data")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// Base URL of the data service
    #[arg(long)]
    api_url: Option<String>,

    /// Print JSON instead of tables
    #[arg(long, default_value = "false")]
    json: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Show payment status for every student (default)
    Status,
    /// Force-refresh everything, retrying transient failures
    Refresh,
    /// Revenue over the last N days
    Series {
        #[arg(long, default_value = "30")]
        days: u32,
    },
    /// Record a payment for a student
    Pay {
        person_id: String,
        amount: f64,
        #[arg(long, value_enum, default_value = "cash")]
        method: MethodArg,
        #[arg(long)]
        subscription: Option<String>,
        #[arg(long)]
        notes: Option<String>,
    },
    /// Cancel a subscription
    Cancel { subscription_id: String },
}

#[derive(Clone, Copy, ValueEnum)]
enum MethodArg {
    Cash,
    Transfer,
    Card,
    Other,
}

impl From<MethodArg> for PaymentMethod {
    fn from(arg: MethodArg) -> Self {
        match arg {
            MethodArg::Cash => PaymentMethod::Cash,
            MethodArg::Transfer => PaymentMethod::Transfer,
            MethodArg::Card => PaymentMethod::Card,
            MethodArg::Other => PaymentMethod::Other,
        }
    }
}

/// Initialize the tracing subscriber for logging.
///
/// Logs go to stderr, filtered by `RUST_LOG` (default `warn`). When the
/// config names a log directory, a daily rolling file is written there too;
/// the returned guard must live until exit so it gets flushed.
fn init_tracing(log_dir: Option<&Path>) -> Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let stderr_layer = fmt::layer().with_writer(io::stderr);

    match log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create log directory {}", dir.display()))?;
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::registry()
                .with(filter)
                .with(stderr_layer)
                .with(fmt::layer().with_writer(writer).with_ansi(false))
                .init();
            Ok(Some(guard))
        }
        None => {
            tracing_subscriber::registry()
                .with(filter)
                .with(stderr_layer)
                .init();
            Ok(None)
        }
    }
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    let mut config = Config::load()?;
    let _log_guard = init_tracing(config.log_dir.as_deref())?;

    let api_url = cli
        .api_url
        .clone()
        .or_else(|| env_var("TRAINERDESK_API_URL"))
        .or_else(|| config.api_url.clone())
        .context("No API URL configured. Pass --api-url or set TRAINERDESK_API_URL")?;
    let token = env_var("TRAINERDESK_TOKEN").context("TRAINERDESK_TOKEN is not set")?;
    let user_id = env_var("TRAINERDESK_USER_ID")
        .or_else(|| config.last_user_id.clone())
        .context("TRAINERDESK_USER_ID is not set")?;

    let client = RestClient::new(&api_url)?;
    let engine = SyncEngine::new(client, TracingNotifier, &config.sync);

    info!(user = %user_id, api = %api_url, "Starting session");
    match engine
        .on_session_event(SessionEvent::Ready(SessionData::new(&user_id, token)))
        .await
    {
        Some(Ok(RefreshOutcome::Completed(report))) => {
            info!(fetched = report.fetched.len(), "Initial load complete")
        }
        Some(Ok(outcome)) => warn!(?outcome, "Initial load did not complete"),
        Some(Err(e)) => warn!(error = %e, "Initial load failed"),
        None => {}
    }

    if config.last_user_id.as_deref() != Some(user_id.as_str()) || config.api_url.is_none() {
        config.last_user_id = Some(user_id.clone());
        config.api_url.get_or_insert(api_url);
        if let Err(e) = config.save() {
            warn!(error = %e, "Failed to save config");
        }
    }

    match cli.command.unwrap_or(Command::Status) {
        Command::Status => {
            let dashboard = engine.dashboard();
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&dashboard)?);
            } else {
                print_dashboard(&dashboard, &currency(&engine));
            }
        }
        Command::Refresh => {
            let summary = engine.smart_refresh(false).await;
            match &summary.outcome {
                SmartRefreshOutcome::Refreshed => println!(
                    "Refreshed {} resources in {} attempt(s) ({} ms)",
                    summary.fetched.len(),
                    summary.attempts,
                    summary.elapsed.as_millis()
                ),
                SmartRefreshOutcome::Failed(message) => bail!("Refresh failed: {}", message),
                other => bail!("Refresh did not complete: {:?}", other),
            }
        }
        Command::Series { days } => {
            let series = engine.revenue_series(days);
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&series)?);
            } else {
                print_series(&series, &currency(&engine));
            }
        }
        Command::Pay {
            person_id,
            amount,
            method,
            subscription,
            notes,
        } => {
            let mut payment = NewPayment::new(person_id, amount);
            payment.method = method.into();
            payment.subscription_id = subscription;
            payment.notes = notes;
            payment.paid_at = Some(Utc::now());

            let tx = engine.record_payment(payment).await?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&tx)?);
            } else {
                println!(
                    "Recorded {} ({}) for {}",
                    format_amount(tx.amount, &currency(&engine)),
                    tx.method,
                    tx.person_id
                );
            }
        }
        Command::Cancel { subscription_id } => {
            let subscription = engine.cancel_subscription(&subscription_id).await?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&subscription)?);
            } else {
                println!("Cancelled subscription {}", subscription.id);
            }
        }
    }

    engine.shutdown();
    Ok(())
}

fn currency<R, N>(engine: &SyncEngine<R, N>) -> String
where
    R: trainerdesk_core::RemoteService,
    N: trainerdesk_core::Notifier,
{
    engine.store().read(|state| {
        state
            .data
            .payment_settings
            .as_ref()
            .map(|s| s.currency.clone())
            .unwrap_or_else(|| "USD".to_string())
    })
}

fn print_dashboard(dashboard: &Dashboard, currency: &str) {
    let stats = &dashboard.stats;
    println!(
        "Revenue: {} total, {} this month | Pending: {} | Overdue: {}",
        format_amount(stats.total_revenue, currency),
        format_amount(stats.monthly_revenue, currency),
        format_amount(stats.pending_amount, currency),
        format_amount(stats.overdue_amount, currency),
    );
    println!(
        "Students: {} paid, {} due soon, {} overdue, {} inactive",
        stats.paid, stats.due_soon, stats.overdue, stats.inactive
    );
    println!();

    for status in &dashboard.statuses {
        let expiry = match status.days_until_expiry {
            Some(days) => format_days(days),
            None => "-".to_string(),
        };
        println!(
            "{:<width$}  {:<9}  {:>14}  {:<12}  last paid {}",
            truncate_string(&status.name, NAME_WIDTH),
            status.status.label(),
            format_amount(status.amount_due, currency),
            expiry,
            format_date(status.last_payment, "never"),
            width = NAME_WIDTH,
        );
    }

    if !dashboard.occupancy.is_empty() {
        println!();
        for plan in &dashboard.occupancy {
            match plan.capacity {
                Some(capacity) => println!("{}: {}/{}", plan.plan_name, plan.active, capacity),
                None => println!("{}: {}", plan.plan_name, plan.active),
            }
        }
    }
}

fn print_series(series: &[SeriesBucket], currency: &str) {
    for bucket in series {
        println!(
            "{:<10}  paid {:>14}  pending {:>14}",
            bucket.label,
            format_amount(bucket.paid, currency),
            format_amount(bucket.pending, currency),
        );
    }
}
