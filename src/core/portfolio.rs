//! Holdings and balances as the snapshot engine sees them.

use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::core::symbol::{MarketClass, SymbolKind};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Holding {
    pub symbol: String,
    pub display_name: String,
    pub quantity: Decimal,
    pub cost_basis: Decimal,
    pub currency: String,
    /// Realized P&L and corrections carried from earlier partial sells, in
    /// the holding's currency.
    pub cumulative_adjustment: Decimal,
    pub market_class: MarketClass,
}

impl Holding {
    /// Builds a holding, inferring its market and, when `currency` is not
    /// given, a default currency. The listing venue decides the currency, so
    /// a US-listed ETF stays in USD even though it ranks as a fund.
    pub fn new(
        symbol: &str,
        display_name: &str,
        quantity: Decimal,
        cost_basis: Decimal,
        currency: Option<&str>,
    ) -> Self {
        let market_class = MarketClass::infer(symbol, display_name);
        let currency = currency
            .filter(|c| !c.trim().is_empty())
            .map(|c| c.trim().to_uppercase())
            .unwrap_or_else(|| default_currency(symbol, market_class).to_string());
        Holding {
            symbol: symbol.trim().to_string(),
            display_name: display_name.to_string(),
            quantity,
            cost_basis,
            currency,
            cumulative_adjustment: Decimal::ZERO,
            market_class,
        }
    }

    pub fn with_adjustment(mut self, adjustment: Decimal) -> Self {
        self.cumulative_adjustment = adjustment;
        self
    }
}

fn default_currency(symbol: &str, market_class: MarketClass) -> &'static str {
    match SymbolKind::classify(symbol) {
        SymbolKind::UsEquity => "USD",
        SymbolKind::HkEquity => "HKD",
        _ => market_class.default_currency(),
    }
}

/// Cash, other assets and liabilities share one shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BalanceEntry {
    pub name: String,
    pub amount: Decimal,
    pub currency: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RealizedSale {
    pub symbol: String,
    pub date: NaiveDate,
    /// Realized profit in the base currency.
    pub pnl: Decimal,
}

/// Read access to one user's accounts, addressed by scope.
#[async_trait]
pub trait AccountStore: Send + Sync {
    async fn holdings(&self, scope: &str) -> Result<Vec<Holding>>;
    async fn cash(&self, scope: &str) -> Result<Vec<BalanceEntry>>;
    async fn other_assets(&self, scope: &str) -> Result<Vec<BalanceEntry>>;
    async fn liabilities(&self, scope: &str) -> Result<Vec<BalanceEntry>>;
    /// Sum of realized P&L from sales on `date`, in the base currency.
    async fn realized_pnl_on(&self, scope: &str, date: NaiveDate) -> Result<Decimal>;
    /// Every scope that can be snapshotted.
    async fn scopes(&self) -> Result<Vec<String>>;
}
