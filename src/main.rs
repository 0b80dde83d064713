use anyhow::Result;
use chrono::NaiveDate;
use clap::{CommandFactory, Parser, Subcommand};
use quotewise::core::aggregation::{CalendarView, Period};
use quotewise::core::log::init_logging;
use quotewise::core::rank::MarketFilter;

#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to optional configuration file
    #[arg(short, long, global = true)]
    config_path: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

impl From<Commands> for quotewise::AppCommand {
    fn from(cmd: Commands) -> quotewise::AppCommand {
        match cmd {
            Commands::Quote { symbols, no_cache } => quotewise::AppCommand::Quote {
                symbols,
                use_cache: !no_cache,
            },
            Commands::Snapshot { scope } => quotewise::AppCommand::Snapshot { scope },
            Commands::History { scope, limit } => quotewise::AppCommand::History { scope, limit },
            Commands::Overview { scope, period } => {
                quotewise::AppCommand::Overview { scope, period }
            }
            Commands::Calendar { scope, view } => quotewise::AppCommand::Calendar { scope, view },
            Commands::Rank { scope, market } => quotewise::AppCommand::Rank { scope, market },
            Commands::Health => quotewise::AppCommand::Health,
            Commands::CheckSnapshot { scope } => quotewise::AppCommand::CheckSnapshot { scope },
            Commands::FixSnapshot { scope, dates } => {
                quotewise::AppCommand::FixSnapshot { scope, dates }
            }
            Commands::Setup => unreachable!("Setup command should be handled separately"),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Create default configuration
    Setup,
    /// Show current quotes for symbols
    Quote {
        #[arg(required = true)]
        symbols: Vec<String>,
        /// Always fetch from the network
        #[arg(long)]
        no_cache: bool,
    },
    /// Take today's snapshot (every scope unless one is given)
    Snapshot {
        #[arg(short, long)]
        scope: Option<String>,
    },
    /// List stored snapshots
    History {
        #[arg(short, long, default_value = quotewise::ALL_SCOPE)]
        scope: String,
        #[arg(short, long)]
        limit: Option<usize>,
    },
    /// P&L for the current day, month, year or all time
    Overview {
        #[arg(short, long, default_value = quotewise::ALL_SCOPE)]
        scope: String,
        #[arg(short, long, default_value = "day")]
        period: Period,
    },
    /// P&L per day, month or year
    Calendar {
        #[arg(short, long, default_value = quotewise::ALL_SCOPE)]
        scope: String,
        #[arg(long, default_value = "day")]
        view: CalendarView,
    },
    /// Holdings ranked by P&L (market: all, a, hk, us or fund)
    Rank {
        #[arg(short, long, default_value = quotewise::ALL_SCOPE)]
        scope: String,
        #[arg(short, long, default_value = "all")]
        market: MarketFilter,
    },
    /// Query quote sources and show their health
    Health,
    /// Check whether today's snapshot has been taken
    CheckSnapshot {
        #[arg(short, long)]
        scope: Option<String>,
    },
    /// Reset the day P&L of snapshots wrongly taken on closed days
    FixSnapshot {
        #[arg(short, long)]
        scope: Option<String>,
        /// Dates to fix, YYYY-MM-DD
        #[arg(short, long = "date", required = true)]
        dates: Vec<NaiveDate>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    let result = match cli.command {
        Some(Commands::Setup) => match cli.config_path.as_deref() {
            Some(path) => quotewise::cli::setup::setup_at_path(path),
            None => quotewise::cli::setup::setup(),
        },
        Some(cmd) => quotewise::run_command(cmd.into(), cli.config_path.as_deref()).await,
        None => {
            Cli::command().print_help()?;
            Ok(())
        }
    };

    if let Err(e) = &result {
        tracing::error!(error = %e, "Application failed");
    }
    result
}
