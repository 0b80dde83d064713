use super::{AppContext, ui};
use crate::core::quote::Quote;
use crate::core::symbol::SymbolKind;
use anyhow::Result;
use comfy_table::Cell;
use std::collections::HashMap;

fn display_as_table(symbols: &[String], quotes: &HashMap<String, Quote>) -> String {
    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Symbol"),
        ui::header_cell("Market"),
        ui::header_cell("Price"),
        ui::header_cell("Prev Close"),
        ui::header_cell("Change"),
        ui::header_cell("Change (%)"),
    ]);

    for symbol in symbols {
        let quote = quotes.get(symbol).copied().unwrap_or_else(Quote::none);
        let usable = quote.is_usable().then_some(quote);
        table.add_row(vec![
            Cell::new(symbol),
            Cell::new(SymbolKind::classify(symbol).to_string()),
            ui::format_optional_cell(usable, |q| format!("{:.4}", q.price)),
            ui::format_optional_cell(usable, |q| format!("{:.4}", q.prev_close)),
            usable.map_or_else(|| ui::na_cell(true), |q| ui::pnl_cell(q.change_amount)),
            usable.map_or_else(
                || ui::na_cell(true),
                |q| ui::change_cell(q.change_percentage),
            ),
        ]);
    }

    table.to_string()
}

pub async fn run(ctx: &AppContext, symbols: &[String], use_cache: bool) -> Result<()> {
    let mut ordered: Vec<String> = Vec::with_capacity(symbols.len());
    for symbol in symbols {
        if !ordered.contains(symbol) {
            ordered.push(symbol.clone());
        }
    }

    let pb = ui::new_progress_bar(ordered.len() as u64, true);
    pb.set_message("Fetching quotes...");
    let quotes = ctx
        .quotes
        .batch_get_with_progress(&ordered, use_cache, |_| pb.inc(1))
        .await;
    pb.finish_and_clear();

    println!("{}", display_as_table(&ordered, &quotes));

    let missing = ordered
        .iter()
        .filter(|s| !quotes.get(*s).is_some_and(Quote::is_usable))
        .count();
    if missing > 0 {
        println!(
            "\n{}",
            ui::style_text(
                &format!("No quote available for {missing} symbol(s)"),
                ui::StyleType::Error
            )
        );
    }
    Ok(())
}
