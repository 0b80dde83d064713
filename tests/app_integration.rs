use chrono::{DateTime, TimeZone, Utc};
use quotewise::cli::AppContext;
use quotewise::core::aggregation::{CalendarView, Period};
use quotewise::core::config::AppConfig;
use quotewise::core::quote::Quote;
use quotewise::core::rank::MarketFilter;
use quotewise::store::MemorySnapshotStore;
use quotewise::{AppCommand, run_command};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::fs;
use std::sync::Arc;
use tracing::info;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

mod test_utils {
    use super::*;

    pub fn tencent_body(code: &str, price: &str, prev_close: &str) -> String {
        format!(r#"v_{code}="1~TEST~{code}~{price}~{prev_close}~10.01~12345~6000~6345";"#)
    }

    pub async fn mount_tencent(server: &MockServer, code: &str, price: &str, prev_close: &str) {
        Mock::given(method("GET"))
            .and(path(format!("/q={code}")))
            .respond_with(
                ResponseTemplate::new(200).set_body_string(tencent_body(code, price, prev_close)),
            )
            .mount(server)
            .await;
    }

    /// Every provider points at `server`; unmatched routes answer 404.
    pub fn config_yaml(server: &MockServer, data_path: &str, market: &str, accounts: &str) -> String {
        let uri = server.uri();
        format!(
            r#"
currency: "CNY"
data_path: "{data_path}"
providers:
  tencent: "{uri}"
  sina: "{uri}"
  eastmoney_push: "{uri}"
  eastmoney_fund_f10: "{uri}"
  eastmoney_fund_mobile: "{uri}"
  tiantian: "{uri}"
  overseas_fund: "{uri}"
  ft: "{uri}"
market:
  retry_delay_ms: 0
  request_timeout_ms: 2000
  default_fx_rates:
    USD: 7.00
    CNY: 1
{market}
accounts:
{accounts}
"#
        )
    }

    pub fn context(yaml: &str) -> AppContext {
        let config: AppConfig = serde_yaml::from_str(yaml).expect("Failed to parse config");
        AppContext::with_store(config, Arc::new(MemorySnapshotStore::new()))
            .expect("Failed to build context")
    }

    /// Wednesday 2026-10-14, 10:00 at UTC+8.
    pub fn trading_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 14, 2, 0, 0).unwrap()
    }

    /// Saturday 2026-10-17, 10:00 at UTC+8.
    pub fn weekend_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 17, 2, 0, 0).unwrap()
    }
}

const USD_HOLDING: &str = r#"
  - name: "main"
    holdings:
      - symbol: "600000"
        quantity: 100
        cost_basis: 10.00
        currency: "USD"
"#;

#[test_log::test(tokio::test)]
async fn test_full_app_flow_with_mock() {
    let mock_server = MockServer::start().await;
    test_utils::mount_tencent(&mock_server, "sh600000", "10.50", "10.00").await;
    test_utils::mount_tencent(&mock_server, "hk00700", "380.00", "375.00").await;

    let data_dir = tempfile::tempdir().expect("Failed to create temp dir");
    let config_file = tempfile::NamedTempFile::new().expect("Failed to create temp file");
    let config_content = test_utils::config_yaml(
        &mock_server,
        data_dir.path().to_str().unwrap(),
        "",
        r#"
  - name: "main"
    holdings:
      - symbol: "600000"
        quantity: 100
        cost_basis: 9.00
      - symbol: "00700.HK"
        quantity: 10
        cost_basis: 300
    cash:
      - name: "Bank"
        amount: 1000
"#,
    );
    fs::write(config_file.path(), &config_content).expect("Failed to write config file");
    let config_path = config_file.path().to_str().unwrap();

    let commands = vec![
        AppCommand::Quote {
            symbols: vec!["600000".to_string(), "00700.HK".to_string()],
            use_cache: true,
        },
        AppCommand::Snapshot { scope: None },
        AppCommand::History {
            scope: "main".to_string(),
            limit: Some(5),
        },
        AppCommand::Overview {
            scope: "all".to_string(),
            period: Period::Month,
        },
        AppCommand::Calendar {
            scope: "main".to_string(),
            view: CalendarView::Day,
        },
        AppCommand::Rank {
            scope: "main".to_string(),
            market: MarketFilter::All,
        },
        AppCommand::CheckSnapshot { scope: None },
        AppCommand::FixSnapshot {
            scope: Some("main".to_string()),
            dates: vec![chrono::NaiveDate::from_ymd_opt(2026, 10, 17).unwrap()],
        },
        AppCommand::Health,
    ];
    for command in commands {
        info!(?command, "Running command");
        let result = run_command(command.clone(), Some(config_path)).await;
        assert!(
            result.is_ok(),
            "{command:?} failed with: {:?}",
            result.err()
        );
    }

    // The snapshot command persisted one row per scope
    let config = AppConfig::load_from_path(config_path).unwrap();
    let ctx = AppContext::build(config).unwrap();
    let today = ctx.engine.clock().local_date(Utc::now());
    assert!(ctx.engine.has_snapshot_for("main", today).await.unwrap());
    assert!(ctx.engine.has_snapshot_for("all", today).await.unwrap());
}

#[test_log::test(tokio::test)]
async fn test_unknown_scope_fails() {
    let mock_server = MockServer::start().await;
    let data_dir = tempfile::tempdir().unwrap();
    let config_file = tempfile::NamedTempFile::new().unwrap();
    let yaml = test_utils::config_yaml(
        &mock_server,
        data_dir.path().to_str().unwrap(),
        "",
        USD_HOLDING,
    );
    fs::write(config_file.path(), yaml).unwrap();

    let result = run_command(
        AppCommand::Snapshot {
            scope: Some("missing".to_string()),
        },
        config_file.path().to_str(),
    )
    .await;
    assert!(result.is_err());
}

#[test_log::test(tokio::test)]
async fn test_fx_converted_snapshot() {
    let mock_server = MockServer::start().await;
    test_utils::mount_tencent(&mock_server, "sh600000", "10.50", "10.00").await;
    let ctx = test_utils::context(&test_utils::config_yaml(&mock_server, "/unused", "", USD_HOLDING));

    let snapshot = ctx
        .engine
        .take_snapshot_at("main", test_utils::trading_time())
        .await
        .unwrap();
    assert_eq!(snapshot.total_pnl, dec!(350.00));
    assert_eq!(snapshot.day_pnl, dec!(350.00));
    assert_eq!(snapshot.total_invest, dec!(7350.00));
}

#[test_log::test(tokio::test)]
async fn test_closed_market_snapshot_has_zero_day_pnl() {
    let mock_server = MockServer::start().await;
    test_utils::mount_tencent(&mock_server, "sh600000", "10.50", "10.00").await;
    let ctx = test_utils::context(&test_utils::config_yaml(&mock_server, "/unused", "", USD_HOLDING));

    let snapshot = ctx
        .engine
        .take_snapshot_at("main", test_utils::weekend_time())
        .await
        .unwrap();
    assert_eq!(snapshot.day_pnl, Decimal::ZERO);
    assert_eq!(snapshot.total_pnl, dec!(350.00));

    let history = ctx.engine.history("main", None).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].day_pnl, Decimal::ZERO);
}

#[test_log::test(tokio::test)]
async fn test_batch_only_fetches_misses() {
    let mock_server = MockServer::start().await;
    for code in ["sh600000", "sh600001", "sh600002"] {
        Mock::given(method("GET"))
            .and(path(format!("/q={code}")))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(test_utils::tencent_body(code, "10.50", "10.00")),
            )
            .expect(1)
            .mount(&mock_server)
            .await;
    }
    let ctx = test_utils::context(&test_utils::config_yaml(&mock_server, "/unused", "", "  []"));

    ctx.quotes.get_quote("600000", true).await;
    let symbols: Vec<String> = ["600000", "600001", "600002"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    let quotes = ctx.quotes.batch_get(&symbols, true).await;

    assert_eq!(quotes.len(), 3);
    assert!(quotes.values().all(|q| q.price == dec!(10.50)));
    let runtime = ctx.quotes.health_report().runtime;
    assert_eq!(runtime.cache_hits, 1);
    assert_eq!(runtime.network_fetch, 3);
    mock_server.verify().await;
}

#[test_log::test(tokio::test)]
async fn test_stale_quote_and_open_circuit_after_failures() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/q=sh600000"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(test_utils::tencent_body("sh600000", "10.50", "10.00")),
        )
        .up_to_n_times(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/q=sh600000"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&mock_server)
        .await;

    let market = r#"  cache_ttl_secs: 0
  stale_ttl_secs: 300
  retry_attempts: 2
  fail_threshold: 2
  cooldown_secs: 600"#;
    let ctx = test_utils::context(&test_utils::config_yaml(&mock_server, "/unused", market, "  []"));

    let first = ctx.quotes.get_quote("600000", true).await;
    assert_eq!(first.price, dec!(10.50));

    // Tencent fails twice and Sina has no route, so the stale entry is served
    let second = ctx.quotes.get_quote("600000", true).await;
    assert_eq!(second, first);

    let report = ctx.quotes.health_report();
    assert_eq!(report.runtime.network_fail, 1);
    assert_eq!(report.runtime.stale_hits, 1);
    let tencent = &report.sources["tencent"];
    assert_eq!(tencent.ok_count, 1);
    assert_eq!(tencent.fail_count, 2);
    assert!(tencent.circuit_open);
    assert!(tencent.circuit_open_remaining_secs > 0);
    assert_eq!(report.sources["sina"].fail_count, 1);

    // With the circuit open Tencent is skipped entirely
    let requests_before = mock_server.received_requests().await.unwrap().len();
    ctx.quotes.get_quote("600000", false).await;
    let requests = mock_server.received_requests().await.unwrap();
    let tencent_requests = requests[requests_before..]
        .iter()
        .filter(|r| r.url.path() == "/q=sh600000")
        .count();
    assert_eq!(tencent_requests, 0);
}

#[test_log::test(tokio::test)]
async fn test_fund_chain_failure_serves_stale_quote() {
    let mock_server = MockServer::start().await;
    for route in ["/js/000001.js", "/f10/lsjz", "/FundMNewApi/FundMNHisNetList"] {
        Mock::given(method("GET"))
            .and(path(route))
            .respond_with(ResponseTemplate::new(500))
            .mount(&mock_server)
            .await;
    }

    let market = r#"  cache_ttl_secs: 0
  stale_ttl_secs: 300
  fail_threshold: 10"#;
    let ctx = test_utils::context(&test_utils::config_yaml(&mock_server, "/unused", market, "  []"));

    // Cold cache: every fund source fails, so nothing is known
    let cold = ctx.quotes.get_quote("f_000001", true).await;
    assert_eq!(cold, Quote::none());
    let report = ctx.quotes.health_report();
    assert_eq!(report.runtime.network_fail, 1);
    assert_eq!(report.runtime.stale_hits, 0);
    for source in ["tiantian_fund", "eastmoney_fund_f10", "eastmoney_fund_mobile"] {
        assert_eq!(report.sources[source].fail_count, 2, "{source}");
    }
    // Only 968 funds are sold through the overseas site
    assert!(!report.sources.contains_key("overseas_fund_html"));

    // A value cached earlier is served once the chain fails again
    let cached = Quote::from_close(dec!(1.2345), dec!(1.2000));
    ctx.quotes.cache().set("f_000001", cached).await;
    let warm = ctx.quotes.get_quote("f_000001", true).await;
    assert_eq!(warm, cached);

    let after = ctx.quotes.health_report().runtime;
    assert_eq!(after.stale_hits, report.runtime.stale_hits + 1);
    assert_eq!(after.network_fail, 2);
}
