pub mod cli;
pub mod core;
pub mod providers;
pub mod store;

use crate::core::aggregation::{CalendarView, Period};
use crate::core::config::AppConfig;
use crate::core::rank::MarketFilter;
use chrono::NaiveDate;
use anyhow::Result;
use tracing::{debug, info};

pub use crate::store::ALL_SCOPE;

/// Commands that need a loaded configuration.
#[derive(Debug, Clone)]
pub enum AppCommand {
    Quote {
        symbols: Vec<String>,
        use_cache: bool,
    },
    Snapshot {
        scope: Option<String>,
    },
    History {
        scope: String,
        limit: Option<usize>,
    },
    Overview {
        scope: String,
        period: Period,
    },
    Calendar {
        scope: String,
        view: CalendarView,
    },
    Rank {
        scope: String,
        market: MarketFilter,
    },
    Health,
    CheckSnapshot {
        scope: Option<String>,
    },
    FixSnapshot {
        scope: Option<String>,
        dates: Vec<NaiveDate>,
    },
}

pub async fn run_command(command: AppCommand, config_path: Option<&str>) -> Result<()> {
    info!("quotewise starting...");

    let config = match config_path {
        Some(path) => AppConfig::load_from_path(path)?,
        None => AppConfig::load()?,
    };
    debug!("Loaded config: {config:#?}");

    let ctx = cli::AppContext::build(config)?;
    run_with_context(&ctx, command).await
}

/// Runs a command against already-built services.
pub async fn run_with_context(ctx: &cli::AppContext, command: AppCommand) -> Result<()> {
    match command {
        AppCommand::Quote { symbols, use_cache } => cli::quote::run(ctx, &symbols, use_cache).await,
        AppCommand::Snapshot { scope } => cli::snapshot::take(ctx, scope.as_deref()).await,
        AppCommand::History { scope, limit } => cli::snapshot::history(ctx, &scope, limit).await,
        AppCommand::Overview { scope, period } => {
            cli::analysis::overview(ctx, &scope, period).await
        }
        AppCommand::Calendar { scope, view } => cli::analysis::calendar(ctx, &scope, view).await,
        AppCommand::Rank { scope, market } => cli::analysis::rank(ctx, &scope, market).await,
        AppCommand::Health => cli::health::run(ctx).await,
        AppCommand::CheckSnapshot { scope } => cli::snapshot::check(ctx, scope.as_deref()).await,
        AppCommand::FixSnapshot { scope, dates } => {
            cli::snapshot::fix(ctx, scope.as_deref(), &dates).await
        }
    }
}
