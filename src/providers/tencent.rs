use async_trait::async_trait;
use reqwest::header::HeaderMap;
use rust_decimal::Decimal;
use tracing::instrument;

use crate::core::quote::Quote;
use crate::core::symbol::{self, SymbolKind};
use crate::providers::util::{parse_decimal, quoted_payload};
use crate::providers::{QuoteSource, SourceError, get_text};

/// Tencent `qt.gtimg.cn` realtime quotes for A-shares, Hong Kong stocks and
/// indices.
pub struct TencentProvider {
    base_url: String,
    client: reqwest::Client,
}

impl TencentProvider {
    pub fn new(base_url: &str, client: reqwest::Client) -> Self {
        TencentProvider {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        }
    }
}

/// Maps a user symbol to the code Tencent expects.
pub fn tencent_code(symbol: &str) -> String {
    let lower = symbol.trim().to_lowercase();
    match SymbolKind::classify(symbol) {
        SymbolKind::Index if lower.contains("ixic") => "us.IXIC".to_string(),
        SymbolKind::Index if lower.contains("hstech") => "hkHSTECH".to_string(),
        SymbolKind::Index => lower,
        SymbolKind::HkEquity => format!("hk{}", symbol::hk_code(symbol)),
        _ => symbol::domestic_code(symbol),
    }
}

/// Parses `v_<code>="1~name~code~price~prev~..."`.
///
/// Simple index codes (`s_` prefix) carry the day change in field 4 instead
/// of the previous close.
pub fn parse_tencent(code: &str, body: &str) -> Result<Quote, SourceError> {
    let payload = quoted_payload(body)
        .ok_or_else(|| SourceError::Malformed(format!("unexpected Tencent payload for {code}")))?;
    let fields: Vec<&str> = payload.split('~').collect();
    if fields.len() < 5 {
        return Err(SourceError::NoData(code.to_string()));
    }

    let price = parse_decimal(fields[3]);
    if price <= Decimal::ZERO {
        return Err(SourceError::NoData(code.to_string()));
    }

    let quote = if code.starts_with("s_") {
        Quote::from_change_amount(price, parse_decimal(fields[4]))
    } else {
        Quote::from_close(price, parse_decimal(fields[4]))
    };
    Ok(quote)
}

#[async_trait]
impl QuoteSource for TencentProvider {
    fn name(&self) -> &'static str {
        "tencent"
    }

    #[instrument(name = "TencentQuoteFetch", skip(self), fields(symbol = %symbol))]
    async fn fetch_quote(&self, symbol: &str) -> Result<Quote, SourceError> {
        let code = tencent_code(symbol);
        let url = format!("{}/q={}", self.base_url, code);
        let body = get_text(&self.client, &url, HeaderMap::new()).await?;
        parse_tencent(&code, &body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn create_mock_server(code: &str, status: u16, body: &str) -> MockServer {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(format!("/q={code}")))
            .respond_with(ResponseTemplate::new(status).set_body_string(body))
            .mount(&mock_server)
            .await;
        mock_server
    }

    #[test]
    fn test_tencent_code() {
        assert_eq!(tencent_code("600000"), "sh600000");
        assert_eq!(tencent_code("00700.HK"), "hk00700");
        assert_eq!(tencent_code("s_sh000001"), "s_sh000001");
        assert_eq!(tencent_code("gb_ixic"), "us.IXIC");
        assert_eq!(tencent_code("rt_hkHSTECH"), "hkHSTECH");
    }

    #[test]
    fn test_parse_index_layout() {
        let body = r#"v_s_sh000001="1~上证指数~000001~3050.12~-12.30~-0.40~2000~3000~~";"#;
        let quote = parse_tencent("s_sh000001", body).unwrap();
        assert_eq!(quote.price, dec!(3050.12));
        assert_eq!(quote.prev_close, dec!(3062.42));
        assert_eq!(quote.change_amount, dec!(-12.30));
    }

    #[test]
    fn test_parse_empty_payload_is_no_data() {
        let err = parse_tencent("sh600000", r#"v_pv_none_match="1";"#).unwrap_err();
        assert!(matches!(err, SourceError::NoData(_)));
        let err = parse_tencent("sh600000", "<html>").unwrap_err();
        assert!(matches!(err, SourceError::Malformed(_)));
    }

    #[tokio::test]
    async fn test_successful_quote_fetch() {
        let body = r#"v_sh600000="1~浦发银行~600000~10.50~10.00~10.02~1000~";"#;
        let mock_server = create_mock_server("sh600000", 200, body).await;
        let provider = TencentProvider::new(&mock_server.uri(), reqwest::Client::new());

        let quote = provider.fetch_quote("600000").await.unwrap();
        assert_eq!(quote.price, dec!(10.50));
        assert_eq!(quote.prev_close, dec!(10.00));
        assert_eq!(quote.change_amount, dec!(0.50));
        assert_eq!(quote.change_percentage, dec!(5));
    }

    #[tokio::test]
    async fn test_hk_quote_fetch() {
        let body = r#"v_hk00700="100~腾讯控股~00700~380.20~375.00~376.00~";"#;
        let mock_server = create_mock_server("hk00700", 200, body).await;
        let provider = TencentProvider::new(&mock_server.uri(), reqwest::Client::new());

        let quote = provider.fetch_quote("00700.HK").await.unwrap();
        assert_eq!(quote.price, dec!(380.20));
        assert_eq!(quote.prev_close, dec!(375.00));
    }

    #[tokio::test]
    async fn test_server_error_maps_to_status() {
        let mock_server = create_mock_server("sh600000", 503, "").await;
        let provider = TencentProvider::new(&mock_server.uri(), reqwest::Client::new());

        let err = provider.fetch_quote("sh600000").await.unwrap_err();
        assert!(matches!(err, SourceError::Status(503)));
        assert!(err.is_retryable());
    }
}
