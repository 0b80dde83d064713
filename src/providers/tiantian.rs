use async_trait::async_trait;
use reqwest::header::HeaderMap;
use rust_decimal::Decimal;
use serde_json::Value;
use tracing::instrument;

use crate::core::quote::Quote;
use crate::core::symbol;
use crate::providers::util::decimal_from_value;
use crate::providers::{QuoteSource, SourceError, get_text};

/// Tiantian fund intraday NAV estimates (`fundgz.1234567.com.cn`).
pub struct TiantianFundProvider {
    base_url: String,
    client: reqwest::Client,
}

impl TiantianFundProvider {
    pub fn new(base_url: &str, client: reqwest::Client) -> Self {
        TiantianFundProvider {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        }
    }
}

/// Parses `jsonpgz({"dwjz":"1.2000","gsz":"1.2300","gszzl":"2.50",...});`.
///
/// `dwjz` is the last published NAV and `gsz` today's estimate. Without an
/// estimate the published NAV stands in for the price.
pub fn parse_jsonpgz(symbol: &str, body: &str) -> Result<Quote, SourceError> {
    let start = body
        .find("jsonpgz(")
        .ok_or_else(|| SourceError::Malformed(format!("unexpected Tiantian payload for {symbol}")))?
        + "jsonpgz(".len();
    let end = body
        .rfind(')')
        .filter(|end| *end >= start)
        .ok_or_else(|| SourceError::Malformed(format!("unterminated Tiantian payload for {symbol}")))?;
    let inner = body[start..end].trim();
    if inner.is_empty() {
        return Err(SourceError::NoData(symbol.to_string()));
    }

    let data: Value =
        serde_json::from_str(inner).map_err(|e| SourceError::Malformed(e.to_string()))?;
    let nav = decimal_from_value(data.get("dwjz"));
    let estimate = decimal_from_value(data.get("gsz"));
    let estimate_change = decimal_from_value(data.get("gszzl"));

    let quote = if estimate > Decimal::ZERO && nav > Decimal::ZERO {
        Quote::from_close(estimate, nav)
    } else {
        let price = if estimate > Decimal::ZERO { estimate } else { nav };
        Quote::derive(price, None, None, Some(estimate_change))
    };

    if !quote.is_usable() {
        return Err(SourceError::NoData(symbol.to_string()));
    }
    Ok(quote)
}

#[async_trait]
impl QuoteSource for TiantianFundProvider {
    fn name(&self) -> &'static str {
        "tiantian_fund"
    }

    #[instrument(name = "TiantianQuoteFetch", skip(self), fields(symbol = %symbol))]
    async fn fetch_quote(&self, symbol: &str) -> Result<Quote, SourceError> {
        let code = symbol::digits(symbol);
        if code.is_empty() {
            return Err(SourceError::NoData(symbol.to_string()));
        }
        let url = format!("{}/js/{}.js", self.base_url, code);
        let body = get_text(&self.client, &url, HeaderMap::new()).await?;
        parse_jsonpgz(symbol, &body)
    }
}
