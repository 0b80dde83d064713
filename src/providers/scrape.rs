//! HTML sources with no JSON endpoint: the overseas fund pages on
//! `overseas.1234567.com.cn` and FT fund tearsheets.
//!
//! [`Html`] is not `Send`, so documents are parsed in plain functions after
//! the body has been downloaded.

use async_trait::async_trait;
use lazy_static::lazy_static;
use regex::Regex;
use rust_decimal::Decimal;
use scraper::{Html, Selector};
use tracing::instrument;

use crate::core::quote::Quote;
use crate::core::symbol;
use crate::providers::util::parse_decimal;
use crate::providers::{QuoteSource, SourceError, get_text, referer};

lazy_static! {
    static ref OVERSEAS_PRICE_PATTERNS: Vec<Regex> = [
        r"fix_dwjz[^>]*>([\d.]+)",
        r#"class="dwjz"[^>]*>([\d.]+)"#,
        r">([\d.]+)元",
        r"([\d.]+)\(([-\d.]+)，",
        r"单位净值[^>]*>([\d.]+)",
    ]
    .iter()
    .filter_map(|p| Regex::new(p).ok())
    .collect();

    static ref OVERSEAS_CHANGE_WITH_AMOUNT: Option<Regex> =
        Regex::new(r"\(([-\d.]+)，([-\d.]+)%\)").ok();

    static ref OVERSEAS_CHANGE_PATTERNS: Vec<Regex> = [
        r"fix_zzl[^>]*>([-\d.]+)%",
        r"涨跌幅[^>]*>([-\d.]+)%",
    ]
    .iter()
    .filter_map(|p| Regex::new(p).ok())
    .collect();

    static ref PERCENTAGE: Option<Regex> = Regex::new(r"([-+]?[\d.]+)%").ok();
}

/// Overseas fund detail pages. Only funds whose code starts with `968`
/// (mutual-recognition funds) are listed there.
pub struct OverseasFundHtmlProvider {
    base_url: String,
    client: reqwest::Client,
}

impl OverseasFundHtmlProvider {
    pub fn new(base_url: &str, client: reqwest::Client) -> Self {
        OverseasFundHtmlProvider {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        }
    }
}

pub fn parse_overseas_fund(symbol: &str, html: &str) -> Result<Quote, SourceError> {
    let price = OVERSEAS_PRICE_PATTERNS
        .iter()
        .filter_map(|pattern| pattern.captures(html))
        .map(|caps| parse_decimal(&caps[1]))
        .find(|price| *price > Decimal::ZERO)
        .ok_or_else(|| SourceError::NoData(symbol.to_string()))?;

    if let Some(caps) = OVERSEAS_CHANGE_WITH_AMOUNT
        .as_ref()
        .and_then(|re| re.captures(html))
    {
        let amount = parse_decimal(&caps[1]);
        let percentage = parse_decimal(&caps[2]);
        return Ok(Quote::derive(price, None, Some(amount), Some(percentage)));
    }

    let percentage = OVERSEAS_CHANGE_PATTERNS
        .iter()
        .find_map(|pattern| pattern.captures(html))
        .map(|caps| parse_decimal(&caps[1]));
    Ok(Quote::derive(price, None, None, percentage))
}

#[async_trait]
impl QuoteSource for OverseasFundHtmlProvider {
    fn name(&self) -> &'static str {
        "overseas_fund_html"
    }

    fn supports(&self, symbol: &str) -> bool {
        symbol::digits(symbol).starts_with("968")
    }

    #[instrument(name = "OverseasFundQuoteFetch", skip(self), fields(symbol = %symbol))]
    async fn fetch_quote(&self, symbol: &str) -> Result<Quote, SourceError> {
        let code = symbol::digits(symbol);
        let url = format!("{}/{}.html", self.base_url, code);
        let html = get_text(
            &self.client,
            &url,
            referer("https://overseas.1234567.com.cn/"),
        )
        .await?;
        parse_overseas_fund(symbol, &html)
    }
}

/// FT tearsheets for fund wrappers, keyed by ISIN (`ft_<ISIN>`).
pub struct FtFundProvider {
    base_url: String,
    client: reqwest::Client,
}

impl FtFundProvider {
    pub fn new(base_url: &str, client: reqwest::Client) -> Self {
        FtFundProvider {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        }
    }
}

fn first_text(document: &Html, selectors: &[&str]) -> Option<String> {
    selectors.iter().find_map(|raw| {
        let selector = Selector::parse(raw).ok()?;
        document
            .select(&selector)
            .next()
            .map(|element| element.text().collect::<String>())
    })
}

pub fn parse_ft_tearsheet(symbol: &str, html: &str) -> Result<Quote, SourceError> {
    let document = Html::parse_document(html);
    let price_text = first_text(
        &document,
        &[
            "span.mod-tearsheet-overview__quote__value",
            "span.mod-ui-data-list__value",
        ],
    )
    .ok_or_else(|| SourceError::NoData(symbol.to_string()))?;

    let price = parse_decimal(&price_text.replace(',', ""));
    if price <= Decimal::ZERO {
        return Err(SourceError::NoData(symbol.to_string()));
    }

    // The change cell reads like "+0.12 / +0.50%"; only the percentage is kept
    let percentage = first_text(&document, &["span.mod-tearsheet-overview__quote__chg"])
        .map(|text| {
            PERCENTAGE
                .as_ref()
                .and_then(|re| re.captures(&text))
                .map_or_else(|| parse_decimal(&text), |caps| parse_decimal(&caps[1]))
        });
    Ok(Quote::derive(price, None, None, percentage))
}

#[async_trait]
impl QuoteSource for FtFundProvider {
    fn name(&self) -> &'static str {
        "ft_fund"
    }

    #[instrument(name = "FtFundQuoteFetch", skip(self), fields(symbol = %symbol))]
    async fn fetch_quote(&self, symbol: &str) -> Result<Quote, SourceError> {
        let isin = symbol
            .strip_prefix("ft_")
            .unwrap_or(symbol)
            .to_uppercase();
        let url = format!(
            "{}/data/equities/tearsheet/summary?s={}:USD",
            self.base_url, isin
        );
        let html = get_text(&self.client, &url, referer("https://markets.ft.com/")).await?;
        parse_ft_tearsheet(symbol, &html)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_overseas_supports_only_968_funds() {
        let provider = OverseasFundHtmlProvider::new("http://localhost", reqwest::Client::new());
        assert!(provider.supports("f_968012"));
        assert!(!provider.supports("f_000001"));
    }

    #[test]
    fn test_parse_overseas_with_amount_and_percentage() {
        let html = r#"<div><span class="fix_dwjz bold">10.4000</span><span>10.4000(0.4000，4.00%)</span></div>"#;
        let quote = parse_overseas_fund("f_968012", html).unwrap();
        assert_eq!(quote.price, dec!(10.4));
        assert_eq!(quote.prev_close, dec!(10.0));
        assert_eq!(quote.change_amount, dec!(0.4));
    }

    #[test]
    fn test_parse_overseas_percentage_only() {
        let html = r#"<p>单位净值<b>2.0000</b></p><p class="fix_zzl red">0.00%</p>"#;
        let quote = parse_overseas_fund("f_968012", html).unwrap();
        assert_eq!(quote.price, dec!(2));
        assert_eq!(quote.change_amount, Decimal::ZERO);
    }

    #[test]
    fn test_parse_overseas_without_price_is_no_data() {
        let err = parse_overseas_fund("f_968012", "<html><body>维护中</body></html>").unwrap_err();
        assert!(matches!(err, SourceError::NoData(_)));
    }

    #[test]
    fn test_parse_ft_tearsheet() {
        let html = r#"<html><body>
            <span class="mod-tearsheet-overview__quote__value">1,105.00</span>
            <span class="mod-tearsheet-overview__quote__chg">+5.00 / +0.4545%</span>
        </body></html>"#;
        let quote = parse_ft_tearsheet("ft_LU0000000001", html).unwrap();
        assert_eq!(quote.price, dec!(1105));
        assert_eq!(quote.change_percentage.round_dp(2), dec!(0.45));
    }

    #[tokio::test]
    async fn test_ft_fetch() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/data/equities/tearsheet/summary"))
            .and(query_param("s", "LU0000000001:USD"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"<span class="mod-tearsheet-overview__quote__value">25.10</span>"#,
            ))
            .mount(&mock_server)
            .await;

        let provider = FtFundProvider::new(&mock_server.uri(), reqwest::Client::new());
        let quote = provider.fetch_quote("ft_lu0000000001").await.unwrap();
        assert_eq!(quote.price, dec!(25.10));
        assert_eq!(quote.prev_close, dec!(25.10));
    }

    #[tokio::test]
    async fn test_overseas_fetch() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/968012.html"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(r#"<span class="fix_dwjz">1.2345</span>"#),
            )
            .mount(&mock_server)
            .await;

        let provider = OverseasFundHtmlProvider::new(&mock_server.uri(), reqwest::Client::new());
        let quote = provider.fetch_quote("f_968012").await.unwrap();
        assert_eq!(quote.price, dec!(1.2345));
    }
}
