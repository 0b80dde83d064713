use super::{AppContext, ui};
use crate::core::aggregation::{self, CalendarReport, CalendarView, Period, PnlOverview};
use crate::core::rank::{MarketFilter, PnlRank, RankItem};
use anyhow::Result;
use chrono::Utc;
use comfy_table::Cell;

impl PnlOverview {
    pub fn display_as_table(&self, scope: &str, period: Period) -> String {
        let mut table = ui::new_styled_table();
        table.set_header(vec![
            ui::header_cell("Period"),
            ui::header_cell("P&L"),
            ui::header_cell("Rate"),
            ui::header_cell("Base"),
        ]);
        table.add_row(vec![
            Cell::new(period.to_string()),
            ui::pnl_cell(self.pnl),
            ui::change_cell(self.pnl_rate),
            ui::amount_cell(self.base_value),
        ]);
        format!(
            "Scope: {}\n\n{}",
            ui::style_text(scope, ui::StyleType::Title),
            table
        )
    }
}

impl CalendarReport {
    pub fn display_as_table(&self, scope: &str) -> String {
        let mut table = ui::new_styled_table();
        table.set_header(vec![ui::header_cell("Bucket"), ui::header_cell("P&L")]);
        for item in &self.items {
            table.add_row(vec![Cell::new(&item.label), ui::pnl_cell(item.pnl)]);
        }

        let mut output = format!(
            "Scope: {} ({})\n\n",
            ui::style_text(scope, ui::StyleType::Title),
            self.title
        );
        output.push_str(&table.to_string());
        output.push_str(&format!(
            "\n\n{}: {:+.2} ({:.2}%)",
            ui::style_text("Total", ui::StyleType::TotalLabel),
            self.total_pnl,
            self.total_rate
        ));
        output
    }
}

fn rank_table(items: &[RankItem]) -> String {
    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("#"),
        ui::header_cell("Symbol"),
        ui::header_cell("Name"),
        ui::header_cell("Market"),
        ui::header_cell("P&L"),
        ui::header_cell("Rate"),
    ]);
    for (i, item) in items.iter().enumerate() {
        table.add_row(vec![
            Cell::new(i + 1),
            Cell::new(&item.symbol),
            Cell::new(&item.name),
            Cell::new(item.market.to_string()),
            ui::pnl_cell(item.pnl),
            ui::change_cell(item.pnl_rate),
        ]);
    }
    table.to_string()
}

impl PnlRank {
    pub fn display_as_table(&self, scope: &str, filter: MarketFilter) -> String {
        let mut output = format!(
            "Scope: {} (market: {})\n",
            ui::style_text(scope, ui::StyleType::Title),
            filter
        );
        for (title, items) in [("Gains", &self.gain), ("Losses", &self.loss)] {
            output.push_str(&format!(
                "\n{}\n",
                ui::style_text(title, ui::StyleType::TotalLabel)
            ));
            if items.is_empty() {
                output.push_str(&ui::style_text("None", ui::StyleType::Subtle));
                output.push('\n');
            } else {
                output.push_str(&rank_table(items));
                output.push('\n');
            }
        }
        output
    }
}

pub async fn overview(ctx: &AppContext, scope: &str, period: Period) -> Result<()> {
    let snapshots = ctx.engine.history(scope, None).await?;
    let today = ctx.engine.clock().local_date(Utc::now());
    let result = aggregation::overview(&snapshots, period, today);
    println!("{}", result.display_as_table(scope, period));
    Ok(())
}

pub async fn calendar(ctx: &AppContext, scope: &str, view: CalendarView) -> Result<()> {
    let snapshots = ctx.engine.history(scope, None).await?;
    let today = ctx.engine.clock().local_date(Utc::now());
    let report = aggregation::calendar(&snapshots, view, today);
    println!("{}", report.display_as_table(scope));
    Ok(())
}

pub async fn rank(ctx: &AppContext, scope: &str, filter: MarketFilter) -> Result<()> {
    let rank = ctx.engine.rank(scope, filter).await?;
    println!("{}", rank.display_as_table(scope, filter));
    Ok(())
}
