//! Per-holding P&L ranking.

use rust_decimal::Decimal;
use serde::Serialize;
use std::fmt::Display;
use std::str::FromStr;

use crate::core::symbol::MarketClass;

/// Which holdings a ranking covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarketFilter {
    All,
    Market(MarketClass),
}

impl MarketFilter {
    pub fn matches(&self, class: MarketClass) -> bool {
        match self {
            MarketFilter::All => true,
            MarketFilter::Market(market) => *market == class,
        }
    }
}

impl Display for MarketFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MarketFilter::All => write!(f, "all"),
            MarketFilter::Market(market) => write!(f, "{market}"),
        }
    }
}

impl FromStr for MarketFilter {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("all") {
            return Ok(MarketFilter::All);
        }
        s.parse::<MarketClass>().map(MarketFilter::Market)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankItem {
    pub symbol: String,
    pub name: String,
    pub market: MarketClass,
    /// Unrealized plus carried realized P&L, in the base currency.
    pub pnl: Decimal,
    /// Percentage of the cost, two decimals.
    pub pnl_rate: Decimal,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PnlRank {
    pub gain: Vec<RankItem>,
    pub loss: Vec<RankItem>,
}

impl PnlRank {
    /// Winners biggest first, losers biggest loss first. Flat holdings are
    /// in neither list.
    pub fn from_items(items: Vec<RankItem>) -> Self {
        let (mut gain, mut loss): (Vec<RankItem>, Vec<RankItem>) = items
            .into_iter()
            .filter(|item| !item.pnl.is_zero())
            .partition(|item| item.pnl > Decimal::ZERO);
        gain.sort_by(|a, b| b.pnl.cmp(&a.pnl));
        loss.sort_by(|a, b| a.pnl.cmp(&b.pnl));
        PnlRank { gain, loss }
    }

    pub fn is_empty(&self) -> bool {
        self.gain.is_empty() && self.loss.is_empty()
    }
}
