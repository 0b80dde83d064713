//! Currency conversion abstractions

use anyhow::Result;
use async_trait::async_trait;
use rust_decimal::Decimal;
use std::collections::HashMap;
use tracing::{debug, warn};

/// Live exchange rates, keyed by currency code, expressed as units of the
/// base currency per unit of that currency.
#[async_trait]
pub trait CurrencyRateProvider: Send + Sync {
    async fn get_rates(&self) -> Result<HashMap<String, Decimal>>;
}

/// Overlays live rates on the configured defaults. A failed lookup keeps the
/// defaults; the base currency always converts at 1.
pub async fn resolve_rates(
    provider: Option<&dyn CurrencyRateProvider>,
    defaults: &HashMap<String, Decimal>,
    base_currency: &str,
) -> HashMap<String, Decimal> {
    let mut rates: HashMap<String, Decimal> = defaults
        .iter()
        .map(|(currency, rate)| (currency.to_uppercase(), *rate))
        .collect();

    if let Some(provider) = provider {
        match provider.get_rates().await {
            Ok(live) => {
                for (currency, rate) in live {
                    if rate > Decimal::ZERO {
                        debug!("Using live {} rate: {}", currency, rate);
                        rates.insert(currency.to_uppercase(), rate);
                    }
                }
            }
            Err(e) => warn!("Failed to get forex rates: {e}, using defaults"),
        }
    }

    rates.insert(base_currency.to_uppercase(), Decimal::ONE);
    rates
}

/// Rate for `currency`, falling back to 1 when it is unknown.
pub fn rate_for(rates: &HashMap<String, Decimal>, currency: &str) -> Decimal {
    match rates.get(&currency.to_uppercase()) {
        Some(rate) => *rate,
        None => {
            warn!("No exchange rate for {}, converting at 1", currency);
            Decimal::ONE
        }
    }
}
