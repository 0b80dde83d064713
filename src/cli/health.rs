use super::{AppContext, ui};
use crate::core::diagnostics::{PriceHealthReport, evaluate_alerts};
use crate::core::metrics::RuntimeStats;
use anyhow::Result;
use comfy_table::{Cell, Color};

impl PriceHealthReport {
    pub fn display_as_table(&self) -> String {
        let runtime = &self.runtime;
        let mut counters = ui::new_styled_table();
        counters.set_header(vec![
            ui::header_cell("Cache Hits"),
            ui::header_cell("Stale Hits"),
            ui::header_cell("Network Fetch"),
            ui::header_cell("Network Fail"),
            ui::header_cell("Last Fetch"),
        ]);
        counters.add_row(vec![
            Cell::new(runtime.cache_hits),
            Cell::new(runtime.stale_hits),
            Cell::new(runtime.network_fetch),
            Cell::new(runtime.network_fail),
            ui::format_optional_cell(runtime.last_fetch_at, |at| {
                at.format("%Y-%m-%d %H:%M:%S").to_string()
            }),
        ]);

        let mut sources = ui::new_styled_table();
        sources.set_header(vec![
            ui::header_cell("Source"),
            ui::header_cell("OK"),
            ui::header_cell("Fail"),
            ui::header_cell("Timeout"),
            ui::header_cell("Consecutive"),
            ui::header_cell("Latency (ms)"),
            ui::header_cell("Circuit"),
            ui::header_cell("Last Error"),
        ]);
        for (name, stats) in &self.sources {
            let circuit = if stats.circuit_open {
                Cell::new(format!("open ({}s)", stats.circuit_open_remaining_secs)).fg(Color::Red)
            } else {
                Cell::new("closed").fg(Color::Green)
            };
            sources.add_row(vec![
                Cell::new(name),
                Cell::new(stats.ok_count),
                Cell::new(stats.fail_count),
                Cell::new(stats.timeout_count),
                Cell::new(stats.consecutive_fail_count),
                Cell::new(format!("{:.1}", stats.ema_latency_ms)),
                circuit,
                Cell::new(&stats.last_error),
            ]);
        }

        format!(
            "{}\n\n{}\n\n{}\n\n{}",
            ui::style_text("Runtime", ui::StyleType::Title),
            counters,
            ui::style_text("Sources", ui::StyleType::Title),
            sources
        )
    }
}

/// Fetches every held symbol once without the cache, then reports counters,
/// per-source health and tripped alerts. Counter deltas cover this run.
pub async fn run(ctx: &AppContext) -> Result<()> {
    let mut symbols: Vec<String> = ctx
        .config
        .accounts
        .iter()
        .flat_map(|account| account.holdings.iter().map(|h| h.symbol.clone()))
        .collect();
    symbols.sort();
    symbols.dedup();

    let pb = ui::new_progress_bar(symbols.len() as u64, true);
    pb.set_message("Probing sources...");
    ctx.quotes
        .batch_get_with_progress(&symbols, false, |_| pb.inc(1))
        .await;
    pb.finish_and_clear();

    let report = ctx.quotes.health_report();
    println!("{}", report.display_as_table());
    println!(
        "\n{}",
        ui::style_text(
            &format!("Cached quotes: {}", ctx.quotes.cache().len().await),
            ui::StyleType::Subtle
        )
    );

    let alerts = evaluate_alerts(
        &report,
        Some(&RuntimeStats::default()),
        &ctx.config.market.alerts,
    );
    if alerts.is_empty() {
        println!("\n{}", ui::style_text("No alerts", ui::StyleType::Subtle));
    } else {
        println!("\n{}", ui::style_text("Alerts", ui::StyleType::Warning));
        for alert in &alerts {
            println!("  - {alert}");
        }
    }
    Ok(())
}
