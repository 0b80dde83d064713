//! Daily portfolio snapshots.
//!
//! A snapshot is the portfolio rolled up into base-currency totals for one
//! local calendar day. `total_pnl` is cumulative, so any span can later be
//! recovered as a difference of two snapshots; `day_pnl` is only
//! meaningful on trading days and is zeroed otherwise.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Datelike, FixedOffset, NaiveDate, NaiveTime, Utc, Weekday};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::core::config::TradingHours;
use crate::core::currency::{CurrencyRateProvider, rate_for, resolve_rates};
use crate::core::portfolio::{AccountStore, BalanceEntry, Holding};
use crate::core::quote::Quote;
use crate::core::quotes::QuoteService;
use crate::core::rank::{MarketFilter, PnlRank, RankItem};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailySnapshot {
    pub date: NaiveDate,
    pub scope: String,
    pub total_asset: Decimal,
    pub total_invest: Decimal,
    pub total_cash: Decimal,
    pub total_other: Decimal,
    pub total_liability: Decimal,
    pub total_pnl: Decimal,
    pub day_pnl: Decimal,
}

/// Persistence for snapshots. At most one row exists per `(scope, date)`.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Inserts or replaces the row for the snapshot's scope and date.
    async fn upsert(&self, snapshot: &DailySnapshot) -> Result<()>;
    /// All rows of a scope, oldest first.
    async fn list(&self, scope: &str) -> Result<Vec<DailySnapshot>>;
    async fn get(&self, scope: &str, date: NaiveDate) -> Result<Option<DailySnapshot>>;
}

/// Trading-hours calendar of the home market.
#[derive(Debug, Clone, Copy)]
pub struct MarketClock {
    open: NaiveTime,
    close: NaiveTime,
    offset: FixedOffset,
}

impl MarketClock {
    pub fn new(hours: &TradingHours) -> Result<Self> {
        let (open, close) = hours.parse_window()?;
        let offset = FixedOffset::east_opt(hours.utc_offset_minutes * 60).with_context(|| {
            format!("Invalid UTC offset: {} minutes", hours.utc_offset_minutes)
        })?;
        Ok(MarketClock {
            open,
            close,
            offset,
        })
    }

    pub fn local_date(&self, now: DateTime<Utc>) -> NaiveDate {
        now.with_timezone(&self.offset).date_naive()
    }

    /// Closed on weekends and outside `[open, close)` local time.
    pub fn is_closed(&self, now: DateTime<Utc>) -> bool {
        let local = now.with_timezone(&self.offset);
        if matches!(local.weekday(), Weekday::Sat | Weekday::Sun) {
            return true;
        }
        let time = local.time();
        time < self.open || time >= self.close
    }
}

pub struct SnapshotEngine {
    quotes: Arc<QuoteService>,
    accounts: Arc<dyn AccountStore>,
    store: Arc<dyn SnapshotStore>,
    fx: Option<Arc<dyn CurrencyRateProvider>>,
    default_rates: HashMap<String, Decimal>,
    base_currency: String,
    clock: MarketClock,
}

impl SnapshotEngine {
    pub fn new(
        quotes: Arc<QuoteService>,
        accounts: Arc<dyn AccountStore>,
        store: Arc<dyn SnapshotStore>,
        clock: MarketClock,
        base_currency: &str,
        default_rates: HashMap<String, Decimal>,
    ) -> Self {
        SnapshotEngine {
            quotes,
            accounts,
            store,
            fx: None,
            default_rates,
            base_currency: base_currency.to_uppercase(),
            clock,
        }
    }

    /// Live exchange rates, overlaid on the configured defaults.
    pub fn with_fx_provider(mut self, fx: Arc<dyn CurrencyRateProvider>) -> Self {
        self.fx = Some(fx);
        self
    }

    pub fn clock(&self) -> &MarketClock {
        &self.clock
    }

    pub async fn compute_stats(&self, scope: &str) -> Result<DailySnapshot> {
        self.compute_stats_at(scope, Utc::now()).await
    }

    /// Values the scope at `now`. `day_pnl` is zero when the market is
    /// closed at that instant.
    pub async fn compute_stats_at(&self, scope: &str, now: DateTime<Utc>) -> Result<DailySnapshot> {
        let date = self.clock.local_date(now);
        let holdings = self
            .accounts
            .holdings(scope)
            .await
            .with_context(|| format!("Failed to read holdings for {scope}"))?;
        let cash = self.accounts.cash(scope).await?;
        let other_assets = self.accounts.other_assets(scope).await?;
        let liabilities = self.accounts.liabilities(scope).await?;
        let realized_today = self.accounts.realized_pnl_on(scope, date).await?;

        let symbols: Vec<String> = holdings.iter().map(|h| h.symbol.clone()).collect();
        let quotes = self.quotes.batch_get(&symbols, true).await;
        let rates = resolve_rates(
            self.fx.as_deref(),
            &self.default_rates,
            &self.base_currency,
        )
        .await;

        let mut total_invest = Decimal::ZERO;
        let mut total_pnl = Decimal::ZERO;
        let mut day_pnl = Decimal::ZERO;
        for holding in &holdings {
            let quote = quotes.get(&holding.symbol).copied().unwrap_or_else(Quote::none);
            let rate = rate_for(&rates, &holding.currency);
            let (current, reference) = price_points(holding, &quote);

            total_invest += current * holding.quantity * rate;
            day_pnl += (current - reference) * holding.quantity * rate;
            total_pnl += (current - holding.cost_basis) * holding.quantity * rate
                + holding.cumulative_adjustment * rate;
            debug!(
                symbol = %holding.symbol,
                %current,
                %reference,
                %rate,
                "Valued holding"
            );
        }
        day_pnl += realized_today;

        let total_cash = sum_balances(&cash, &rates, false);
        let total_other = sum_balances(&other_assets, &rates, false);
        let total_liability = sum_balances(&liabilities, &rates, true);
        let total_asset = total_cash + total_invest + total_other - total_liability;

        if self.clock.is_closed(now) {
            debug!(scope, computed = %day_pnl, "Market closed, day P&L set to 0");
            day_pnl = Decimal::ZERO;
        }

        Ok(DailySnapshot {
            date,
            scope: scope.to_string(),
            total_asset: total_asset.round_dp(2),
            total_invest: total_invest.round_dp(2),
            total_cash: total_cash.round_dp(2),
            total_other: total_other.round_dp(2),
            total_liability: total_liability.round_dp(2),
            total_pnl: total_pnl.round_dp(2),
            day_pnl: day_pnl.round_dp(2),
        })
    }

    pub async fn take_snapshot(&self, scope: &str) -> Result<DailySnapshot> {
        self.take_snapshot_at(scope, Utc::now()).await
    }

    /// Computes and stores today's snapshot, replacing any earlier one for
    /// the same local date.
    pub async fn take_snapshot_at(&self, scope: &str, now: DateTime<Utc>) -> Result<DailySnapshot> {
        let snapshot = self.compute_stats_at(scope, now).await?;
        self.store
            .upsert(&snapshot)
            .await
            .with_context(|| format!("Failed to save snapshot for {scope}"))?;
        info!(
            scope,
            date = %snapshot.date,
            total_asset = %snapshot.total_asset,
            day_pnl = %snapshot.day_pnl,
            "Snapshot saved"
        );
        Ok(snapshot)
    }

    /// Stored snapshots, oldest first; with `limit` only the most recent
    /// ones.
    pub async fn history(&self, scope: &str, limit: Option<usize>) -> Result<Vec<DailySnapshot>> {
        let mut snapshots = self.store.list(scope).await?;
        if let Some(limit) = limit {
            let skip = snapshots.len().saturating_sub(limit);
            snapshots.drain(..skip);
        }
        Ok(snapshots)
    }

    /// Rewrites `day_pnl` to zero on the stored rows of `dates`, for days
    /// recorded as trading days by mistake. Cumulative figures are kept.
    /// Returns how many rows were corrected; dates without a row are skipped.
    pub async fn fix_day_pnl(&self, scope: &str, dates: &[NaiveDate]) -> Result<usize> {
        let mut fixed = 0;
        for date in dates {
            let Some(mut snapshot) = self.store.get(scope, *date).await? else {
                warn!(scope, %date, "No snapshot to fix");
                continue;
            };
            snapshot.day_pnl = Decimal::ZERO;
            self.store
                .upsert(&snapshot)
                .await
                .with_context(|| format!("Failed to fix snapshot for {scope} on {date}"))?;
            info!(scope, %date, "Day P&L reset to 0");
            fixed += 1;
        }
        Ok(fixed)
    }

    /// Per-holding P&L in the base currency, split into gains and losses.
    pub async fn rank(&self, scope: &str, filter: MarketFilter) -> Result<PnlRank> {
        let holdings: Vec<Holding> = self
            .accounts
            .holdings(scope)
            .await
            .with_context(|| format!("Failed to read holdings for {scope}"))?
            .into_iter()
            .filter(|h| filter.matches(h.market_class))
            .collect();
        if holdings.is_empty() {
            return Ok(PnlRank::default());
        }

        let symbols: Vec<String> = holdings.iter().map(|h| h.symbol.clone()).collect();
        let quotes = self.quotes.batch_get(&symbols, true).await;
        let rates = resolve_rates(
            self.fx.as_deref(),
            &self.default_rates,
            &self.base_currency,
        )
        .await;

        let items = holdings
            .into_iter()
            .map(|holding| {
                let quote = quotes.get(&holding.symbol).copied().unwrap_or_else(Quote::none);
                let rate = rate_for(&rates, &holding.currency);
                let (current, _) = price_points(&holding, &quote);

                let cost = holding.cost_basis * holding.quantity * rate;
                let pnl = current * holding.quantity * rate - cost
                    + holding.cumulative_adjustment * rate;
                let pnl_rate = if cost > Decimal::ZERO {
                    (pnl / cost * Decimal::ONE_HUNDRED).round_dp(2)
                } else {
                    Decimal::ZERO
                };
                RankItem {
                    symbol: holding.symbol,
                    name: holding.display_name,
                    market: holding.market_class,
                    pnl: pnl.round_dp(2),
                    pnl_rate,
                }
            })
            .collect();
        Ok(PnlRank::from_items(items))
    }

    pub async fn has_snapshot_for(&self, scope: &str, date: NaiveDate) -> Result<bool> {
        Ok(self.store.get(scope, date).await?.is_some())
    }

    pub async fn scopes(&self) -> Result<Vec<String>> {
        self.accounts.scopes().await
    }
}

/// Current price and the close it is compared against for the day.
///
/// A missing quote falls back to the previous close, then to the cost; the
/// reference close falls back to the current price.
fn price_points(holding: &Holding, quote: &Quote) -> (Decimal, Decimal) {
    let current = if quote.price > Decimal::ZERO {
        quote.price
    } else if quote.prev_close > Decimal::ZERO {
        quote.prev_close
    } else {
        holding.cost_basis
    };
    let reference = if quote.prev_close > Decimal::ZERO {
        quote.prev_close
    } else {
        current
    };
    (current, reference)
}

fn sum_balances(entries: &[BalanceEntry], rates: &HashMap<String, Decimal>, absolute: bool) -> Decimal {
    entries
        .iter()
        .map(|entry| {
            let amount = if absolute {
                entry.amount.abs()
            } else {
                entry.amount
            };
            amount * rate_for(rates, &entry.currency)
        })
        .sum()
}
