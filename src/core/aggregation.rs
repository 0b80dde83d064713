//! P&L over periods, reconstructed from the cumulative `total_pnl` series.
//!
//! `day_pnl` is zeroed on closed-market days, so summing it does not give
//! the change over a span. Every figure here is instead the difference of
//! two cumulative readings.

use chrono::{Datelike, NaiveDate};
use rust_decimal::Decimal;
use serde::Serialize;
use std::fmt::Display;
use std::str::FromStr;

use crate::core::snapshot::DailySnapshot;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Period {
    Day,
    Month,
    Year,
    All,
}

impl Display for Period {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Period::Day => "day",
                Period::Month => "month",
                Period::Year => "year",
                Period::All => "all",
            }
        )
    }
}

impl FromStr for Period {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "day" | "d" => Ok(Period::Day),
            "month" | "m" => Ok(Period::Month),
            "year" | "y" => Ok(Period::Year),
            "all" => Ok(Period::All),
            _ => Err(anyhow::anyhow!("Invalid period: {}", s)),
        }
    }
}

impl Period {
    /// First day of the period containing `today`; `None` for all time.
    pub fn start(&self, today: NaiveDate) -> Option<NaiveDate> {
        match self {
            Period::Day => Some(today),
            Period::Month => today.with_day(1),
            Period::Year => NaiveDate::from_ymd_opt(today.year(), 1, 1),
            Period::All => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalendarView {
    /// Each day of the current month.
    Day,
    /// Each month of the current year.
    Month,
    /// Each year since the first snapshot.
    Year,
}

impl Display for CalendarView {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                CalendarView::Day => "day",
                CalendarView::Month => "month",
                CalendarView::Year => "year",
            }
        )
    }
}

impl FromStr for CalendarView {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "day" | "d" => Ok(CalendarView::Day),
            "month" | "m" => Ok(CalendarView::Month),
            "year" | "y" => Ok(CalendarView::Year),
            _ => Err(anyhow::anyhow!("Invalid calendar view: {}", s)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PnlOverview {
    pub pnl: Decimal,
    /// Percentage of `base_value`, two decimals.
    pub pnl_rate: Decimal,
    pub base_value: Decimal,
}

impl PnlOverview {
    fn empty() -> Self {
        PnlOverview {
            pnl: Decimal::ZERO,
            pnl_rate: Decimal::ZERO,
            base_value: Decimal::ZERO,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CalendarItem {
    pub label: String,
    pub pnl: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CalendarReport {
    pub title: String,
    pub items: Vec<CalendarItem>,
    pub total_pnl: Decimal,
    pub total_rate: Decimal,
}

fn rate(pnl: Decimal, base: Decimal) -> Decimal {
    if base.is_zero() {
        Decimal::ZERO
    } else {
        (pnl / base * Decimal::ONE_HUNDRED).round_dp(2)
    }
}

fn non_zero_or(value: Decimal, fallback: Decimal) -> Decimal {
    if value.is_zero() { fallback } else { value }
}

/// P&L of the period containing `today`.
///
/// The period's value is the last cumulative reading in it minus the last
/// reading before it starts, or minus its own first reading when nothing
/// older exists. With no reading inside the period the latest earlier one
/// stands in, which yields zero. `snapshots` must be sorted by date.
///
/// The rate base is the baseline's invested value, except for
/// [`Period::Day`] where it is today's; a day without its own snapshot
/// reports nothing.
pub fn overview(snapshots: &[DailySnapshot], period: Period, today: NaiveDate) -> PnlOverview {
    let upto_today: Vec<&DailySnapshot> = snapshots.iter().filter(|s| s.date <= today).collect();

    let (baseline, last) = match period.start(today) {
        None => match (upto_today.first(), upto_today.last()) {
            (Some(first), Some(last)) => (*first, *last),
            _ => return PnlOverview::empty(),
        },
        Some(start) => {
            let before = upto_today.iter().rev().find(|s| s.date < start).copied();
            let first_in = upto_today.iter().find(|s| s.date >= start).copied();
            let last = match upto_today.last() {
                Some(last) => *last,
                None => return PnlOverview::empty(),
            };
            match before.or(first_in) {
                Some(baseline) => (baseline, last),
                None => return PnlOverview::empty(),
            }
        }
    };

    // The day view needs today's own reading and is measured against it
    if period == Period::Day && last.date != today {
        return PnlOverview::empty();
    }
    let pnl = last.total_pnl - baseline.total_pnl;
    let base_value = match period {
        Period::Day => non_zero_or(last.total_invest, Decimal::ONE),
        _ => non_zero_or(
            baseline.total_invest,
            non_zero_or(last.total_invest, Decimal::ONE),
        ),
    };
    PnlOverview {
        pnl,
        pnl_rate: rate(pnl, base_value),
        base_value,
    }
}

/// Per-bucket P&L for a calendar view.
///
/// Each bucket is the difference between the last cumulative reading up to
/// its end and the one carried in from the previous bucket, so a bucket
/// without snapshots reads zero. The first bucket starts from the last
/// reading before the view, or from the view's own first reading.
pub fn calendar(snapshots: &[DailySnapshot], view: CalendarView, today: NaiveDate) -> CalendarReport {
    let upto_today: Vec<&DailySnapshot> = snapshots.iter().filter(|s| s.date <= today).collect();

    let (title, buckets): (String, Vec<(String, NaiveDate)>) = match view {
        CalendarView::Day => {
            let buckets = (1..=today.day())
                .filter_map(|day| today.with_day(day))
                .map(|date| (date.format("%Y-%m-%d").to_string(), date))
                .collect();
            (format!("{} to date", today.format("%Y-%m")), buckets)
        }
        CalendarView::Month => {
            let buckets = (1..=today.month())
                .filter_map(|month| month_end(today.year(), month))
                .map(|end| (end.format("%Y-%m").to_string(), end.min(today)))
                .collect();
            (format!("{} to date", today.year()), buckets)
        }
        CalendarView::Year => {
            let first_year = upto_today.first().map_or(today.year(), |s| s.date.year());
            let buckets = if upto_today.is_empty() {
                Vec::new()
            } else {
                (first_year..=today.year())
                    .filter_map(|year| NaiveDate::from_ymd_opt(year, 12, 31))
                    .map(|end| (end.format("%Y").to_string(), end.min(today)))
                    .collect()
            };
            ("All time".to_string(), buckets)
        }
    };

    let view_start = match view {
        CalendarView::Day => today.with_day(1),
        CalendarView::Month => NaiveDate::from_ymd_opt(today.year(), 1, 1),
        CalendarView::Year => upto_today.first().map(|s| s.date),
    };
    let mut carried = view_start.and_then(|start| {
        upto_today
            .iter()
            .rev()
            .find(|s| s.date < start)
            .or_else(|| upto_today.iter().find(|s| s.date >= start))
            .map(|s| s.total_pnl)
    });

    let mut items = Vec::with_capacity(buckets.len());
    let mut total_pnl = Decimal::ZERO;
    for (label, end) in buckets {
        let current = upto_today
            .iter()
            .rev()
            .find(|s| s.date <= end)
            .map(|s| s.total_pnl)
            .or(carried);
        let pnl = match (current, carried) {
            (Some(current), Some(previous)) => current - previous,
            _ => Decimal::ZERO,
        };
        carried = current;
        total_pnl += pnl;
        items.push(CalendarItem { label, pnl });
    }

    let base = upto_today
        .first()
        .map_or(Decimal::ONE, |s| non_zero_or(s.total_invest, Decimal::ONE));
    CalendarReport {
        title,
        items,
        total_pnl,
        total_rate: rate(total_pnl, base),
    }
}

fn month_end(year: i32, month: u32) -> Option<NaiveDate> {
    let next = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)
    };
    next.and_then(|d| d.pred_opt())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn snap(date: NaiveDate, total_pnl: Decimal, total_invest: Decimal) -> DailySnapshot {
        DailySnapshot {
            date,
            scope: "main".to_string(),
            total_asset: total_invest,
            total_invest,
            total_cash: Decimal::ZERO,
            total_other: Decimal::ZERO,
            total_liability: Decimal::ZERO,
            total_pnl,
            day_pnl: Decimal::ZERO,
        }
    }

    fn series() -> Vec<DailySnapshot> {
        vec![
            snap(date(2025, 12, 30), dec!(100), dec!(1000)),
            snap(date(2026, 9, 30), dec!(300), dec!(2000)),
            snap(date(2026, 10, 9), dec!(350), dec!(2000)),
            // 10-10 and 10-11 form a weekend gap
            snap(date(2026, 10, 12), dec!(320), dec!(2000)),
            snap(date(2026, 10, 16), dec!(400), dec!(2000)),
        ]
    }

    #[test]
    fn test_period_parsing() {
        assert_eq!("Month".parse::<Period>().unwrap(), Period::Month);
        assert_eq!("all".parse::<Period>().unwrap(), Period::All);
        assert!("week".parse::<Period>().is_err());
        assert_eq!("y".parse::<CalendarView>().unwrap(), CalendarView::Year);
    }

    #[test]
    fn test_overview_all_is_last_minus_first() {
        let today = date(2026, 10, 16);
        let result = overview(&series(), Period::All, today);
        assert_eq!(result.pnl, dec!(300));
        assert_eq!(result.base_value, dec!(1000));
        assert_eq!(result.pnl_rate, dec!(30.00));
    }

    #[test]
    fn test_overview_uses_last_reading_before_period() {
        let today = date(2026, 10, 16);
        let month = overview(&series(), Period::Month, today);
        assert_eq!(month.pnl, dec!(100));
        assert_eq!(month.base_value, dec!(2000));
        assert_eq!(month.pnl_rate, dec!(5.00));

        let year = overview(&series(), Period::Year, today);
        assert_eq!(year.pnl, dec!(300));

        let day = overview(&series(), Period::Day, today);
        assert_eq!(day.pnl, dec!(80));
    }

    #[test]
    fn test_overview_falls_back_to_first_in_period() {
        let snapshots = vec![
            snap(date(2026, 10, 5), dec!(10), dec!(0)),
            snap(date(2026, 10, 16), dec!(25), dec!(500)),
        ];
        let month = overview(&snapshots, Period::Month, date(2026, 10, 16));
        assert_eq!(month.pnl, dec!(15));
        // Baseline has no invested value, so the latest one is used
        assert_eq!(month.base_value, dec!(500));
        assert_eq!(month.pnl_rate, dec!(3.00));
    }

    #[test]
    fn test_overview_without_reading_in_period_is_zero() {
        let today = date(2026, 10, 17);
        let day = overview(&series(), Period::Day, today);
        assert_eq!(day, PnlOverview::empty());
        assert_eq!(overview(&[], Period::Month, today), PnlOverview::empty());
    }

    #[test]
    fn test_day_overview_is_measured_against_todays_invest() {
        let snapshots = vec![
            snap(date(2026, 10, 15), dec!(100), dec!(1000)),
            snap(date(2026, 10, 16), dec!(150), dec!(2500)),
        ];
        let day = overview(&snapshots, Period::Day, date(2026, 10, 16));
        assert_eq!(day.pnl, dec!(50));
        assert_eq!(day.base_value, dec!(2500));
        assert_eq!(day.pnl_rate, dec!(2.00));

        // Other periods keep the baseline's invested value
        let month = overview(&snapshots, Period::Month, date(2026, 10, 16));
        assert_eq!(month.base_value, dec!(1000));
    }

    #[test]
    fn test_day_calendar_carries_gaps() {
        let today = date(2026, 10, 16);
        let report = calendar(&series(), CalendarView::Day, today);
        assert_eq!(report.items.len(), 16);
        assert_eq!(report.items[0].label, "2026-10-01");

        let pnl: Vec<Decimal> = report.items.iter().map(|i| i.pnl).collect();
        assert_eq!(pnl[8], dec!(50)); // 10-09
        assert_eq!(pnl[9], Decimal::ZERO); // weekend
        assert_eq!(pnl[10], Decimal::ZERO);
        assert_eq!(pnl[11], dec!(-30)); // 10-12
        assert_eq!(pnl[15], dec!(80)); // 10-16
        assert_eq!(report.total_pnl, dec!(100));
        assert_eq!(report.title, "2026-10 to date");
    }

    #[test]
    fn test_month_overview_matches_day_calendar() {
        let today = date(2026, 10, 16);
        let report = calendar(&series(), CalendarView::Day, today);
        let month = overview(&series(), Period::Month, today);
        let sum: Decimal = report.items.iter().map(|i| i.pnl).sum();
        assert_eq!(sum, month.pnl);
    }

    #[test]
    fn test_month_calendar() {
        let report = calendar(&series(), CalendarView::Month, date(2026, 10, 16));
        assert_eq!(report.items.len(), 10);
        assert_eq!(report.items[0].label, "2026-01");
        assert_eq!(report.items[0].pnl, Decimal::ZERO);
        assert_eq!(report.items[8].pnl, dec!(200)); // September
        assert_eq!(report.items[9].pnl, dec!(100));
        assert_eq!(report.total_pnl, dec!(300));
        // Rate against the first snapshot ever taken
        assert_eq!(report.total_rate, dec!(30.00));
    }

    #[test]
    fn test_year_calendar() {
        let report = calendar(&series(), CalendarView::Year, date(2026, 10, 16));
        let labels: Vec<&str> = report.items.iter().map(|i| i.label.as_str()).collect();
        assert_eq!(labels, vec!["2025", "2026"]);
        assert_eq!(report.items[0].pnl, Decimal::ZERO);
        assert_eq!(report.items[1].pnl, dec!(300));
        assert_eq!(report.title, "All time");

        let empty = calendar(&[], CalendarView::Year, date(2026, 10, 16));
        assert!(empty.items.is_empty());
        assert_eq!(empty.total_pnl, Decimal::ZERO);
    }
}
