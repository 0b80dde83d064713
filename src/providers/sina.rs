use anyhow::{Result, anyhow};
use async_trait::async_trait;
use rust_decimal::Decimal;
use std::collections::HashMap;
use tracing::{debug, instrument};

use crate::core::currency::CurrencyRateProvider;
use crate::core::quote::Quote;
use crate::core::symbol::{self, SymbolKind};
use crate::providers::util::{parse_decimal, quoted_payload};
use crate::providers::{QuoteSource, SourceError, get_text, referer};

const SINA_REFERER: &str = "https://finance.sina.com.cn";

/// Sina `hq.sinajs.cn` quotes. Covers every equity market and indices, and
/// is the primary source for US stocks.
pub struct SinaProvider {
    base_url: String,
    client: reqwest::Client,
}

impl SinaProvider {
    pub fn new(base_url: &str, client: reqwest::Client) -> Self {
        SinaProvider {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        }
    }
}

/// Maps a user symbol to the code Sina expects.
pub fn sina_code(symbol: &str) -> String {
    let lower = symbol.trim().to_lowercase();
    match SymbolKind::classify(symbol) {
        SymbolKind::Index if lower.contains("ixic") => "gb_ixic".to_string(),
        SymbolKind::Index if lower.contains("hstech") => "rt_hkHSTECH".to_string(),
        SymbolKind::Index => lower,
        SymbolKind::HkEquity => format!("rt_hk{}", symbol::hk_code(symbol)),
        SymbolKind::UsEquity => format!("gb_{}", symbol::us_ticker(symbol).to_lowercase()),
        _ => symbol::domestic_code(symbol),
    }
}

/// Parses `var hq_str_<code>="..."`. The CSV layout depends on the market:
///
/// * `s_` index: name, price, change, ...
/// * `gb_` US: name, price, ..., after-hours price at 21, previous close at 26
/// * `rt_hk` Hong Kong: previous close at 3, price at 6
/// * A-share: name, open, previous close, price, ...
pub fn parse_sina(code: &str, body: &str) -> Result<Quote, SourceError> {
    let payload = quoted_payload(body)
        .ok_or_else(|| SourceError::Malformed(format!("unexpected Sina payload for {code}")))?;
    let fields: Vec<&str> = payload.split(',').collect();
    let field = |index: usize| fields.get(index).map_or(Decimal::ZERO, |v| parse_decimal(v));

    if fields.len() < 3 {
        return Err(SourceError::NoData(code.to_string()));
    }

    let quote = if code.starts_with("s_") {
        Quote::from_change_amount(field(1), field(2))
    } else if code.starts_with("gb_") {
        let prev_close = field(26);
        let mut price = field(1);
        if price <= Decimal::ZERO {
            price = field(21);
        }
        if price <= Decimal::ZERO {
            price = prev_close;
        }
        if prev_close <= Decimal::ZERO && code == "gb_ixic" {
            Quote::from_change_amount(price, field(2))
        } else {
            Quote::from_close(price, prev_close)
        }
    } else if code.starts_with("rt_hk") {
        Quote::from_close(field(6), field(3))
    } else {
        Quote::from_close(field(3), field(2))
    };

    if !quote.is_usable() {
        return Err(SourceError::NoData(code.to_string()));
    }
    Ok(quote)
}

#[async_trait]
impl QuoteSource for SinaProvider {
    fn name(&self) -> &'static str {
        "sina"
    }

    #[instrument(name = "SinaQuoteFetch", skip(self), fields(symbol = %symbol))]
    async fn fetch_quote(&self, symbol: &str) -> Result<Quote, SourceError> {
        let code = sina_code(symbol);
        let url = format!("{}/list={}", self.base_url, code);
        let body = get_text(&self.client, &url, referer(SINA_REFERER)).await?;
        parse_sina(&code, &body)
    }
}

/// Exchange rates to CNY from Sina's `hf_<CUR>CNY` forex quotes.
pub struct SinaFxProvider {
    base_url: String,
    client: reqwest::Client,
    currencies: Vec<String>,
}

impl SinaFxProvider {
    pub fn new(base_url: &str, client: reqwest::Client, currencies: Vec<String>) -> Self {
        SinaFxProvider {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
            currencies,
        }
    }
}

/// Parses one `var hq_str_hf_USDCNY="7.2500,...";` line per currency. The
/// first field is the latest rate.
pub fn parse_sina_fx(body: &str) -> HashMap<String, Decimal> {
    let mut rates = HashMap::new();
    for line in body.lines() {
        let Some(start) = line.find("hf_") else {
            continue;
        };
        let Some(pair) = line[start + 3..].split('=').next() else {
            continue;
        };
        let Some(currency) = pair.strip_suffix("CNY") else {
            continue;
        };
        let Some(payload) = quoted_payload(line) else {
            continue;
        };
        let rate = payload.split(',').next().map_or(Decimal::ZERO, parse_decimal);
        if rate > Decimal::ZERO {
            debug!("Updated {} rate: {}", currency, rate);
            rates.insert(currency.to_string(), rate);
        }
    }
    rates
}

#[async_trait]
impl CurrencyRateProvider for SinaFxProvider {
    async fn get_rates(&self) -> Result<HashMap<String, Decimal>> {
        let codes: Vec<String> = self
            .currencies
            .iter()
            .filter(|c| !c.eq_ignore_ascii_case("CNY"))
            .map(|c| format!("hf_{}CNY", c.to_uppercase()))
            .collect();
        if codes.is_empty() {
            return Ok(HashMap::new());
        }

        let url = format!("{}/list={}", self.base_url, codes.join(","));
        let body = get_text(&self.client, &url, referer(SINA_REFERER))
            .await
            .map_err(|e| anyhow!("Failed to fetch forex rates: {}", e))?;

        let rates = parse_sina_fx(&body);
        if rates.is_empty() {
            return Err(anyhow!("No forex rates found in Sina response"));
        }
        Ok(rates)
    }
}
