//! Core business logic abstractions

pub mod aggregation;
pub mod cache;
pub mod config;
pub mod currency;
pub mod diagnostics;
pub mod health;
pub mod log;
pub mod metrics;
pub mod portfolio;
pub mod quote;
pub mod quotes;
pub mod rank;
pub mod resolver;
pub mod snapshot;
pub mod symbol;

// Re-export main types for cleaner imports
pub use aggregation::{CalendarReport, CalendarView, Period, PnlOverview};
pub use cache::QuoteCache;
pub use currency::CurrencyRateProvider;
pub use diagnostics::PriceHealthReport;
pub use health::SourceHealth;
pub use metrics::{RuntimeMetrics, RuntimeStats};
pub use portfolio::{AccountStore, BalanceEntry, Holding};
pub use quote::Quote;
pub use quotes::QuoteService;
pub use rank::{MarketFilter, PnlRank};
pub use resolver::SourceResolver;
pub use snapshot::{DailySnapshot, SnapshotEngine, SnapshotStore};
pub use symbol::{MarketClass, SymbolKind};
