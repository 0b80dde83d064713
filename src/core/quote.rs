//! Quote type and the numeric rules shared by every upstream source

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A priced snapshot of a security.
///
/// `price <= 0` means "no usable quote". It is never treated as a valid zero
/// price; callers check [`Quote::is_usable`] instead of matching on errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Quote {
    pub price: Decimal,
    pub prev_close: Decimal,
    pub change_amount: Decimal,
    pub change_percentage: Decimal,
}

impl Quote {
    /// The all-zero sentinel returned when every source in a chain failed.
    pub fn none() -> Self {
        Self::default()
    }

    pub fn is_usable(&self) -> bool {
        self.price > Decimal::ZERO
    }

    /// Builds a quote from the current price and the previous close.
    ///
    /// An unknown previous close (`<= 0`) collapses to the current price,
    /// which yields a zero day change.
    pub fn from_close(price: Decimal, prev_close: Decimal) -> Self {
        let prev_close = if prev_close > Decimal::ZERO {
            prev_close
        } else {
            price
        };
        Self {
            price,
            prev_close,
            change_amount: price - prev_close,
            change_percentage: change_percentage(price, prev_close),
        }
    }

    /// Builds a quote from the current price and an absolute day change.
    pub fn from_change_amount(price: Decimal, change_amount: Decimal) -> Self {
        Self::from_close(price, price - change_amount)
    }

    /// Builds a quote from the current price and a day change in percent.
    pub fn from_change_percentage(price: Decimal, percentage: Decimal) -> Self {
        let factor = Decimal::ONE + percentage / Decimal::ONE_HUNDRED;
        if factor <= Decimal::ZERO {
            return Self::from_close(price, price);
        }
        Self::from_close(price, price / factor)
    }

    /// Fills in a missing previous close from whatever the source returned.
    ///
    /// Preference order: explicit previous close, change amount, change
    /// percentage, and finally the current price.
    pub fn derive(
        price: Decimal,
        prev_close: Option<Decimal>,
        change_amount: Option<Decimal>,
        change_percentage: Option<Decimal>,
    ) -> Self {
        match (prev_close, change_amount, change_percentage) {
            (Some(prev), _, _) if prev > Decimal::ZERO => Self::from_close(price, prev),
            (_, Some(amount), _) if !amount.is_zero() => Self::from_change_amount(price, amount),
            (_, _, Some(pct)) if !pct.is_zero() => Self::from_change_percentage(price, pct),
            _ => Self::from_close(price, price),
        }
    }
}

/// `(current - prev_close) / prev_close * 100`, or zero when the previous
/// close is unknown.
pub fn change_percentage(current: Decimal, prev_close: Decimal) -> Decimal {
    if prev_close <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    (current - prev_close) / prev_close * Decimal::ONE_HUNDRED
}
