use std::collections::HashMap;
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::core::config::ProvidersConfig;
use crate::core::health::{Outcome, SourceHealth};
use crate::core::quote::Quote;
use crate::core::symbol::SymbolKind;
use crate::providers::eastmoney::{
    EastmoneyFundF10Provider, EastmoneyFundMobileProvider, EastmoneyUsProvider,
};
use crate::providers::scrape::{FtFundProvider, OverseasFundHtmlProvider};
use crate::providers::sina::SinaProvider;
use crate::providers::tencent::TencentProvider;
use crate::providers::tiantian::TiantianFundProvider;
use crate::providers::util::{RetryPolicy, with_retry};
use crate::providers::{QuoteSource, SourceError};

pub type SourceChain = Vec<Arc<dyn QuoteSource>>;

/// Walks the ordered source chain for a symbol's kind until one source
/// yields a usable quote.
pub struct SourceResolver {
    chains: HashMap<SymbolKind, SourceChain>,
    health: Arc<SourceHealth>,
    retry: RetryPolicy,
}

impl SourceResolver {
    pub fn new(health: Arc<SourceHealth>, retry: RetryPolicy) -> Self {
        SourceResolver {
            chains: HashMap::new(),
            health,
            retry,
        }
    }

    /// Registers (or replaces) the chain used for one symbol kind.
    pub fn with_chain(mut self, kind: SymbolKind, chain: SourceChain) -> Self {
        self.chains.insert(kind, chain);
        self
    }

    /// The production chains, all sharing one HTTP client.
    pub fn with_default_chains(
        health: Arc<SourceHealth>,
        retry: RetryPolicy,
        providers: &ProvidersConfig,
        client: reqwest::Client,
    ) -> Self {
        let tencent: Arc<dyn QuoteSource> =
            Arc::new(TencentProvider::new(&providers.tencent, client.clone()));
        let sina: Arc<dyn QuoteSource> =
            Arc::new(SinaProvider::new(&providers.sina, client.clone()));
        let eastmoney_us: Arc<dyn QuoteSource> = Arc::new(EastmoneyUsProvider::new(
            &providers.eastmoney_push,
            client.clone(),
        ));
        let ft: Arc<dyn QuoteSource> = Arc::new(FtFundProvider::new(&providers.ft, client.clone()));
        let fund_chain: SourceChain = vec![
            Arc::new(TiantianFundProvider::new(&providers.tiantian, client.clone())),
            Arc::new(EastmoneyFundF10Provider::new(
                &providers.eastmoney_fund_f10,
                client.clone(),
            )),
            Arc::new(EastmoneyFundMobileProvider::new(
                &providers.eastmoney_fund_mobile,
                client.clone(),
            )),
            Arc::new(OverseasFundHtmlProvider::new(&providers.overseas_fund, client)),
        ];

        let equity_chain = vec![tencent, sina.clone()];
        Self::new(health, retry)
            .with_chain(SymbolKind::DomesticEquity, equity_chain.clone())
            .with_chain(SymbolKind::HkEquity, equity_chain.clone())
            .with_chain(SymbolKind::Index, equity_chain)
            .with_chain(SymbolKind::UsEquity, vec![sina, eastmoney_us])
            .with_chain(SymbolKind::FundWrapper, vec![ft])
            .with_chain(SymbolKind::OffExchangeFund, fund_chain)
    }

    pub fn chain_names(&self, kind: SymbolKind) -> Vec<&'static str> {
        self.chains
            .get(&kind)
            .map(|chain| chain.iter().map(|source| source.name()).collect())
            .unwrap_or_default()
    }

    /// Returns the first usable quote, or [`Quote::none`] once every source
    /// in the chain has been skipped or has failed.
    pub async fn resolve(&self, symbol: &str) -> Quote {
        let kind = SymbolKind::classify(symbol);
        let Some(chain) = self.chains.get(&kind) else {
            warn!(symbol, %kind, "No source chain registered");
            return Quote::none();
        };

        for source in chain {
            let name = source.name();
            if !source.supports(symbol) {
                debug!(source = name, symbol, "Source does not cover symbol");
                continue;
            }
            if !self.health.can_attempt(name) {
                info!(source = name, symbol, reason = "circuit_open", "Skipping source");
                continue;
            }

            match self.attempt(source.as_ref(), symbol).await {
                Ok(quote) if quote.is_usable() => {
                    debug!(source = name, symbol, price = %quote.price, "Resolved quote");
                    return quote;
                }
                Ok(_) => debug!(source = name, symbol, "Source returned no usable price"),
                Err(e) => warn!(source = name, symbol, error = %e, "Source failed"),
            }
        }

        warn!(symbol, %kind, "All sources exhausted");
        Quote::none()
    }

    /// One source with retries. Every try is reported to the health tracker.
    async fn attempt(&self, source: &dyn QuoteSource, symbol: &str) -> Result<Quote, SourceError> {
        let name = source.name();
        let health = &self.health;
        with_retry(
            || async move {
                let started = Instant::now();
                let result = source.fetch_quote(symbol).await;
                let duration_ms = started.elapsed().as_secs_f64() * 1000.0;
                match &result {
                    Err(e) if e.is_source_failure() => health.record(
                        name,
                        Outcome::failed(duration_ms, e.is_timeout(), e.to_string()),
                    ),
                    _ => health.record(name, Outcome::ok(duration_ms)),
                }
                result
            },
            &self.retry,
            SourceError::is_retryable,
        )
        .await
    }
}
