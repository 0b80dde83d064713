use super::{AppContext, ui};
use crate::core::snapshot::DailySnapshot;
use anyhow::Result;
use chrono::{NaiveDate, Utc};
use comfy_table::Cell;

fn display_as_table(title: &str, snapshots: &[DailySnapshot]) -> String {
    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Date"),
        ui::header_cell("Total Asset"),
        ui::header_cell("Invested"),
        ui::header_cell("Cash"),
        ui::header_cell("Other"),
        ui::header_cell("Liability"),
        ui::header_cell("Total P&L"),
        ui::header_cell("Day P&L"),
    ]);

    for snapshot in snapshots {
        table.add_row(vec![
            Cell::new(snapshot.date.format("%Y-%m-%d")),
            ui::amount_cell(snapshot.total_asset),
            ui::amount_cell(snapshot.total_invest),
            ui::amount_cell(snapshot.total_cash),
            ui::amount_cell(snapshot.total_other),
            ui::amount_cell(snapshot.total_liability),
            ui::pnl_cell(snapshot.total_pnl),
            ui::pnl_cell(snapshot.day_pnl),
        ]);
    }

    format!(
        "Scope: {}\n\n{}",
        ui::style_text(title, ui::StyleType::Title),
        table
    )
}

/// Takes today's snapshot for one scope, or for every scope.
pub async fn take(ctx: &AppContext, scope: Option<&str>) -> Result<()> {
    let scopes = ctx.scopes_for(scope).await?;
    let pb = ui::new_progress_bar(scopes.len() as u64, true);
    pb.set_message("Taking snapshots...");

    let mut taken = Vec::with_capacity(scopes.len());
    for scope in &scopes {
        let snapshot = ctx.engine.take_snapshot(scope).await?;
        pb.inc(1);
        taken.push(snapshot);
    }
    pb.finish_and_clear();

    if ctx.engine.clock().is_closed(Utc::now()) {
        println!(
            "{}\n",
            ui::style_text("Market closed: day P&L recorded as 0", ui::StyleType::Subtle)
        );
    }
    for (i, snapshot) in taken.iter().enumerate() {
        println!(
            "{}",
            display_as_table(&snapshot.scope, std::slice::from_ref(snapshot))
        );
        if i + 1 < taken.len() {
            ui::print_separator();
        }
    }
    Ok(())
}

pub async fn history(ctx: &AppContext, scope: &str, limit: Option<usize>) -> Result<()> {
    let snapshots = ctx.engine.history(scope, limit).await?;
    if snapshots.is_empty() {
        println!(
            "{}",
            ui::style_text(&format!("No snapshots for {scope}"), ui::StyleType::Subtle)
        );
        return Ok(());
    }
    println!("{}", display_as_table(scope, &snapshots));
    Ok(())
}

/// Reports whether today's snapshot exists for each scope.
pub async fn check(ctx: &AppContext, scope: Option<&str>) -> Result<()> {
    let today = ctx.engine.clock().local_date(Utc::now());
    let mut table = ui::new_styled_table();
    table.set_header(vec![ui::header_cell("Scope"), ui::header_cell(&today.to_string())]);

    for scope in ctx.scopes_for(scope).await? {
        let status = if ctx.engine.has_snapshot_for(&scope, today).await? {
            Cell::new("taken").fg(comfy_table::Color::Green)
        } else {
            Cell::new("missing").fg(comfy_table::Color::Red)
        };
        table.add_row(vec![Cell::new(scope), status]);
    }

    println!("{table}");
    Ok(())
}

/// Resets the stored day P&L of `dates` to zero, for one scope or every
/// scope.
pub async fn fix(ctx: &AppContext, scope: Option<&str>, dates: &[NaiveDate]) -> Result<()> {
    let mut table = ui::new_styled_table();
    table.set_header(vec![ui::header_cell("Scope"), ui::header_cell("Rows Fixed")]);

    for scope in ctx.scopes_for(scope).await? {
        let fixed = ctx.engine.fix_day_pnl(&scope, dates).await?;
        table.add_row(vec![Cell::new(scope), Cell::new(fixed)]);
    }

    println!("{table}");
    Ok(())
}
