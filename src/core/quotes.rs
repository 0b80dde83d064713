use futures::stream::{self, StreamExt};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::core::cache::QuoteCache;
use crate::core::diagnostics::PriceHealthReport;
use crate::core::health::SourceHealth;
use crate::core::metrics::RuntimeMetrics;
use crate::core::quote::Quote;
use crate::core::resolver::SourceResolver;

/// Entry point for quotes: cache first, then the source chains, then the
/// stale entry.
pub struct QuoteService {
    cache: QuoteCache,
    resolver: SourceResolver,
    health: Arc<SourceHealth>,
    metrics: Arc<RuntimeMetrics>,
    batch_concurrency: usize,
}

impl QuoteService {
    pub fn new(
        cache: QuoteCache,
        resolver: SourceResolver,
        health: Arc<SourceHealth>,
        metrics: Arc<RuntimeMetrics>,
        batch_concurrency: usize,
    ) -> Self {
        QuoteService {
            cache,
            resolver,
            health,
            metrics,
            batch_concurrency: batch_concurrency.max(1),
        }
    }

    /// Returns the quote for one symbol, or [`Quote::none`] when nothing
    /// usable is known.
    ///
    /// With `use_cache` a fresh cache entry is returned without touching the
    /// network. Without it the network is always tried, but a stale entry
    /// still backs up a failed refresh.
    pub async fn get_quote(&self, symbol: &str, use_cache: bool) -> Quote {
        if use_cache {
            if let Some(quote) = self.cache.get(symbol).await {
                self.metrics.record_cache_hit();
                return quote;
            }
        }
        let stale = self.cache.get_stale(symbol).await;

        self.metrics.record_network_fetch();
        let quote = self.resolver.resolve(symbol).await;
        if quote.is_usable() {
            self.cache.set(symbol, quote).await;
            return quote;
        }

        self.metrics.record_network_fail();
        match stale {
            Some(quote) => {
                self.metrics.record_stale_hit();
                info!(symbol, "Serving stale quote after failed refresh");
                quote
            }
            None => {
                warn!(symbol, "No quote available");
                Quote::none()
            }
        }
    }

    /// Quotes for many symbols. Fresh cache hits are answered directly; the
    /// remaining distinct symbols are fetched with at most
    /// `batch_concurrency` requests in flight. Every requested symbol is
    /// present in the result.
    pub async fn batch_get(&self, symbols: &[String], use_cache: bool) -> HashMap<String, Quote> {
        self.batch_get_with_progress(symbols, use_cache, |_| {}).await
    }

    /// Same as [`QuoteService::batch_get`], calling `on_done` once per
    /// distinct symbol as soon as its quote is settled.
    pub async fn batch_get_with_progress<F>(
        &self,
        symbols: &[String],
        use_cache: bool,
        on_done: F,
    ) -> HashMap<String, Quote>
    where
        F: Fn(&str) + Sync,
    {
        let mut quotes = HashMap::with_capacity(symbols.len());
        let mut misses = Vec::new();
        let mut seen = HashSet::new();

        for symbol in symbols {
            if !seen.insert(symbol.as_str()) {
                continue;
            }
            if use_cache {
                if let Some(quote) = self.cache.get(symbol).await {
                    self.metrics.record_cache_hit();
                    on_done(symbol);
                    quotes.insert(symbol.clone(), quote);
                    continue;
                }
            }
            misses.push(symbol.clone());
        }

        debug!(
            hits = quotes.len(),
            misses = misses.len(),
            "Batch quote request"
        );

        let on_done = &on_done;
        let fetched: Vec<(String, Quote)> = stream::iter(misses)
            .map(|symbol| async move {
                let quote = self.get_quote(&symbol, false).await;
                on_done(&symbol);
                (symbol, quote)
            })
            .buffer_unordered(self.batch_concurrency)
            .collect()
            .await;

        quotes.extend(fetched);
        quotes
    }

    pub fn health_report(&self) -> PriceHealthReport {
        PriceHealthReport {
            runtime: self.metrics.snapshot(),
            sources: self.health.snapshot(),
        }
    }

    pub fn cache(&self) -> &QuoteCache {
        &self.cache
    }
}
