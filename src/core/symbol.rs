//! Symbol shapes and the per-market code conventions of upstream sources.
//!
//! Users write symbols the way the exchanges and fund houses print them:
//! `600000`, `sh600000`, `00700.HK`, `gb_aapl`, `AAPL`, `s_sh000001`,
//! `f_000001`, `ft_LU0000000000`. Classification is a pure function of that
//! text so the same symbol always walks the same provider chain.

use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::str::FromStr;

/// Which provider chain serves a symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SymbolKind {
    DomesticEquity,
    HkEquity,
    UsEquity,
    Index,
    FundWrapper,
    OffExchangeFund,
}

impl SymbolKind {
    pub fn classify(symbol: &str) -> Self {
        let lower = symbol.trim().to_lowercase();

        if lower.starts_with("f_") {
            return SymbolKind::OffExchangeFund;
        }
        if lower.starts_with("ft_") {
            return SymbolKind::FundWrapper;
        }
        if lower.starts_with("s_") || lower.contains("ixic") || lower.contains("hstech") {
            return SymbolKind::Index;
        }
        if is_hk_shape(&lower) {
            return SymbolKind::HkEquity;
        }
        if is_us_shape(&lower) {
            return SymbolKind::UsEquity;
        }
        SymbolKind::DomesticEquity
    }
}

impl Display for SymbolKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            SymbolKind::DomesticEquity => "domestic",
            SymbolKind::HkEquity => "hk",
            SymbolKind::UsEquity => "us",
            SymbolKind::Index => "index",
            SymbolKind::FundWrapper => "fund_wrapper",
            SymbolKind::OffExchangeFund => "off_exchange_fund",
        };
        write!(f, "{label}")
    }
}

/// Market a holding belongs to, used for its default currency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarketClass {
    Domestic,
    Hk,
    Us,
    Fund,
}

impl MarketClass {
    /// Infers the market from the symbol shape, using the display name as a
    /// hint for exchange-traded funds.
    pub fn infer(symbol: &str, name: &str) -> Self {
        let lower = symbol.trim().to_lowercase();
        if lower.is_empty() {
            return MarketClass::Domestic;
        }
        if lower.starts_with("f_") || lower.starts_with("ft_") {
            return MarketClass::Fund;
        }
        if is_hk_shape(&lower) {
            return MarketClass::Hk;
        }
        let upper_name = name.to_uppercase();
        if upper_name.contains("ETF") || upper_name.contains("FUND") || name.contains("基金") {
            return MarketClass::Fund;
        }
        if is_us_shape(&lower) {
            return MarketClass::Us;
        }
        MarketClass::Domestic
    }

    pub fn default_currency(&self) -> &'static str {
        match self {
            MarketClass::Domestic | MarketClass::Fund => "CNY",
            MarketClass::Hk => "HKD",
            MarketClass::Us => "USD",
        }
    }
}

impl Display for MarketClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            MarketClass::Domestic => "domestic",
            MarketClass::Hk => "hk",
            MarketClass::Us => "us",
            MarketClass::Fund => "fund",
        };
        write!(f, "{label}")
    }
}

impl FromStr for MarketClass {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "domestic" | "a" => Ok(MarketClass::Domestic),
            "hk" => Ok(MarketClass::Hk),
            "us" => Ok(MarketClass::Us),
            "fund" => Ok(MarketClass::Fund),
            _ => Err(anyhow::anyhow!("Invalid market class: {}", s)),
        }
    }
}

fn is_hk_shape(lower: &str) -> bool {
    lower.ends_with(".hk") || lower.starts_with("hk") || lower.starts_with("rt_hk")
}

fn is_us_shape(lower: &str) -> bool {
    if lower.starts_with("gb_") || lower.starts_with("us.") {
        return true;
    }
    lower.chars().any(|c| c.is_ascii_alphabetic())
        && lower.chars().all(|c| c.is_ascii_alphabetic() || c == '.')
}

/// Keeps only the ASCII digits of a symbol.
pub fn digits(symbol: &str) -> String {
    symbol.chars().filter(|c| c.is_ascii_digit()).collect()
}

/// Exchange-prefixed A-share code: `600000` becomes `sh600000`, `000001`
/// becomes `sz000001`. Already prefixed codes are lowercased and kept.
pub fn domestic_code(symbol: &str) -> String {
    let lower = symbol.trim().to_lowercase();
    if lower.len() == 6 && lower.chars().all(|c| c.is_ascii_digit()) {
        let exchange = if lower.starts_with(['5', '6', '9']) {
            "sh"
        } else {
            "sz"
        };
        return format!("{exchange}{lower}");
    }
    lower
}

/// Five-digit Hong Kong board code, e.g. `700.HK` gives `00700`.
pub fn hk_code(symbol: &str) -> String {
    format!("{:0>5}", digits(symbol))
}

/// Bare US ticker in upper case, without `gb_` or `us.` prefixes.
pub fn us_ticker(symbol: &str) -> String {
    let lower = symbol.trim().to_lowercase();
    let bare = lower
        .strip_prefix("gb_")
        .or_else(|| lower.strip_prefix("us."))
        .unwrap_or(&lower);
    bare.to_uppercase()
}
