use async_trait::async_trait;
use reqwest::header::HeaderMap;
use rust_decimal::Decimal;
use serde_json::Value;
use tracing::{debug, instrument};

use crate::core::quote::Quote;
use crate::core::symbol;
use crate::providers::util::decimal_from_value;
use crate::providers::{QuoteSource, SourceError, get_json, referer};

/// Exchange ids tried in order for a US ticker: NASDAQ, NYSE, AMEX.
const US_MARKETS: [u32; 3] = [105, 106, 107];

/// Eastmoney `push2` realtime quotes, the fallback for US stocks.
pub struct EastmoneyUsProvider {
    base_url: String,
    client: reqwest::Client,
}

impl EastmoneyUsProvider {
    pub fn new(base_url: &str, client: reqwest::Client) -> Self {
        EastmoneyUsProvider {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        }
    }
}

#[async_trait]
impl QuoteSource for EastmoneyUsProvider {
    fn name(&self) -> &'static str {
        "eastmoney_us"
    }

    #[instrument(name = "EastmoneyUsQuoteFetch", skip(self), fields(symbol = %symbol))]
    async fn fetch_quote(&self, symbol: &str) -> Result<Quote, SourceError> {
        let ticker = symbol::us_ticker(symbol);
        for market in US_MARKETS {
            let url = format!(
                "{}/api/qt/stock/get?invt=2&fltt=2&fields=f43,f60&secid={}.{}",
                self.base_url, market, ticker
            );
            let json = get_json(&self.client, &url, HeaderMap::new()).await?;
            let Some(data) = json.get("data").filter(|d| d.is_object()) else {
                debug!("No data for {} on market {}", ticker, market);
                continue;
            };

            let prev_close = decimal_from_value(data.get("f60"));
            let mut price = decimal_from_value(data.get("f43"));
            if price <= Decimal::ZERO {
                price = prev_close;
            }
            if price > Decimal::ZERO {
                return Ok(Quote::from_close(price, prev_close));
            }
        }
        Err(SourceError::NoData(symbol.to_string()))
    }
}

/// Builds a quote from the two most recent NAV records, newest first.
fn quote_from_nav_records(
    symbol: &str,
    records: Option<&Vec<Value>>,
) -> Result<Quote, SourceError> {
    let records = match records {
        Some(records) if !records.is_empty() => records,
        _ => return Err(SourceError::NoData(symbol.to_string())),
    };

    let latest = decimal_from_value(records[0].get("DWJZ"));
    if latest <= Decimal::ZERO {
        return Err(SourceError::NoData(symbol.to_string()));
    }
    let previous = records
        .get(1)
        .map(|record| decimal_from_value(record.get("DWJZ")))
        .filter(|nav| *nav > Decimal::ZERO);
    let reported_change = decimal_from_value(records[0].get("JZZZL"));

    Ok(Quote::derive(latest, previous, None, Some(reported_change)))
}

/// Eastmoney F10 historical NAV list, suited to ordinary off-exchange funds.
pub struct EastmoneyFundF10Provider {
    base_url: String,
    client: reqwest::Client,
}

impl EastmoneyFundF10Provider {
    pub fn new(base_url: &str, client: reqwest::Client) -> Self {
        EastmoneyFundF10Provider {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        }
    }
}

#[async_trait]
impl QuoteSource for EastmoneyFundF10Provider {
    fn name(&self) -> &'static str {
        "eastmoney_fund_f10"
    }

    #[instrument(name = "EastmoneyF10QuoteFetch", skip(self), fields(symbol = %symbol))]
    async fn fetch_quote(&self, symbol: &str) -> Result<Quote, SourceError> {
        let code = symbol::digits(symbol);
        if code.is_empty() {
            return Err(SourceError::NoData(symbol.to_string()));
        }
        let url = format!(
            "{}/f10/lsjz?fundCode={}&pageIndex=1&pageSize=2",
            self.base_url, code
        );
        let json = get_json(
            &self.client,
            &url,
            referer("https://fundf10.eastmoney.com/"),
        )
        .await?;

        let records = json
            .get("Data")
            .and_then(|data| data.get("LSJZList"))
            .and_then(Value::as_array);
        quote_from_nav_records(symbol, records)
    }
}

/// Eastmoney mobile NAV history, which also lists mutual-recognition funds.
pub struct EastmoneyFundMobileProvider {
    base_url: String,
    client: reqwest::Client,
}

impl EastmoneyFundMobileProvider {
    pub fn new(base_url: &str, client: reqwest::Client) -> Self {
        EastmoneyFundMobileProvider {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        }
    }
}

#[async_trait]
impl QuoteSource for EastmoneyFundMobileProvider {
    fn name(&self) -> &'static str {
        "eastmoney_fund_mobile"
    }

    #[instrument(name = "EastmoneyMobileQuoteFetch", skip(self), fields(symbol = %symbol))]
    async fn fetch_quote(&self, symbol: &str) -> Result<Quote, SourceError> {
        let code = symbol::digits(symbol);
        if code.is_empty() {
            return Err(SourceError::NoData(symbol.to_string()));
        }
        let url = format!(
            "{}/FundMNewApi/FundMNHisNetList?FCODE={}&pageIndex=1&pageSize=2&deviceid=Wap&plat=Wap&product=EFund&version=2.0.0",
            self.base_url, code
        );
        let json = get_json(&self.client, &url, HeaderMap::new()).await?;
        let records = json.get("Datas").and_then(Value::as_array);
        quote_from_nav_records(symbol, records)
    }
}
