//! Command implementations and the services they share.

pub mod analysis;
pub mod health;
pub mod quote;
pub mod setup;
pub mod snapshot;
pub mod ui;

use crate::core::cache::QuoteCache;
use crate::core::config::AppConfig;
use crate::core::health::SourceHealth;
use crate::core::metrics::RuntimeMetrics;
use crate::core::quotes::QuoteService;
use crate::core::resolver::SourceResolver;
use crate::core::snapshot::{MarketClock, SnapshotEngine, SnapshotStore};
use crate::providers::build_client;
use crate::providers::sina::SinaFxProvider;
use crate::store::{ConfigAccountStore, open_snapshot_store};
use anyhow::Result;
use std::sync::Arc;
use tracing::debug;

/// Services built once per run from the configuration.
pub struct AppContext {
    pub config: AppConfig,
    pub quotes: Arc<QuoteService>,
    pub engine: SnapshotEngine,
}

impl AppContext {
    pub fn build(config: AppConfig) -> Result<Self> {
        let snapshots = open_snapshot_store(&config)?;
        Self::with_store(config, snapshots)
    }

    pub fn with_store(config: AppConfig, snapshots: Arc<dyn SnapshotStore>) -> Result<Self> {
        let market = &config.market;
        let client = build_client(market.request_timeout())?;

        let health = Arc::new(SourceHealth::new(market.health_config()));
        let resolver = SourceResolver::with_default_chains(
            health.clone(),
            market.retry_policy(),
            &config.providers,
            client.clone(),
        );
        let quotes = Arc::new(QuoteService::new(
            QuoteCache::new(market.cache_ttl(), market.stale_ttl()),
            resolver,
            health,
            Arc::new(RuntimeMetrics::new()),
            market.batch_concurrency,
        ));

        let accounts = Arc::new(ConfigAccountStore::new(
            config.accounts.clone(),
            &config.currency,
        ));
        let mut engine = SnapshotEngine::new(
            quotes.clone(),
            accounts,
            snapshots,
            MarketClock::new(&market.trading_hours)?,
            &config.currency,
            market.default_fx_rates.clone(),
        );
        // Live rates are quoted against CNY
        if config.currency.eq_ignore_ascii_case("CNY") {
            let currencies = market.default_fx_rates.keys().cloned().collect();
            engine = engine.with_fx_provider(Arc::new(SinaFxProvider::new(
                &config.providers.sina,
                client,
                currencies,
            )));
        } else {
            debug!("No live FX source for base {}, using configured rates", config.currency);
        }

        Ok(Self {
            config,
            quotes,
            engine,
        })
    }

    /// The requested scope, or every scope when none is given.
    pub async fn scopes_for(&self, scope: Option<&str>) -> Result<Vec<String>> {
        match scope {
            Some(scope) => Ok(vec![scope.to_string()]),
            None => self.engine.scopes().await,
        }
    }
}
