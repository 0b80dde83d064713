use crate::core::config::{AccountConfig, BalanceConfig};
use crate::core::portfolio::{AccountStore, BalanceEntry, Holding};
use anyhow::{Result, bail};
use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;

/// Scope that rolls every configured account into one.
pub const ALL_SCOPE: &str = "all";

/// Accounts declared in the configuration file. Each account name is a
/// scope, and [`ALL_SCOPE`] covers all of them.
pub struct ConfigAccountStore {
    accounts: Vec<AccountConfig>,
    base_currency: String,
}

impl ConfigAccountStore {
    pub fn new(accounts: Vec<AccountConfig>, base_currency: &str) -> Self {
        Self {
            accounts,
            base_currency: base_currency.to_uppercase(),
        }
    }

    fn accounts_in(&self, scope: &str) -> Result<Vec<&AccountConfig>> {
        if scope == ALL_SCOPE {
            return Ok(self.accounts.iter().collect());
        }
        match self.accounts.iter().find(|a| a.name == scope) {
            Some(account) => Ok(vec![account]),
            None => bail!("Unknown account: {}", scope),
        }
    }

    fn balances(
        &self,
        scope: &str,
        select: impl Fn(&AccountConfig) -> &Vec<BalanceConfig>,
    ) -> Result<Vec<BalanceEntry>> {
        Ok(self
            .accounts_in(scope)?
            .into_iter()
            .flat_map(|account| select(account).iter())
            .map(|balance| BalanceEntry {
                name: balance.name.clone(),
                amount: balance.amount,
                currency: balance
                    .currency
                    .as_deref()
                    .unwrap_or(self.base_currency.as_str())
                    .to_uppercase(),
            })
            .collect())
    }
}

#[async_trait]
impl AccountStore for ConfigAccountStore {
    async fn holdings(&self, scope: &str) -> Result<Vec<Holding>> {
        Ok(self
            .accounts_in(scope)?
            .into_iter()
            .flat_map(|account| account.holdings.iter())
            .map(|h| {
                Holding::new(
                    &h.symbol,
                    &h.name,
                    h.quantity,
                    h.cost_basis,
                    h.currency.as_deref(),
                )
                .with_adjustment(h.adjustment)
            })
            .collect())
    }

    async fn cash(&self, scope: &str) -> Result<Vec<BalanceEntry>> {
        self.balances(scope, |a| &a.cash)
    }

    async fn other_assets(&self, scope: &str) -> Result<Vec<BalanceEntry>> {
        self.balances(scope, |a| &a.other_assets)
    }

    async fn liabilities(&self, scope: &str) -> Result<Vec<BalanceEntry>> {
        self.balances(scope, |a| &a.liabilities)
    }

    async fn realized_pnl_on(&self, scope: &str, date: NaiveDate) -> Result<Decimal> {
        Ok(self
            .accounts_in(scope)?
            .into_iter()
            .flat_map(|account| account.realized.iter())
            .filter(|sale| sale.date == date)
            .map(|sale| sale.pnl)
            .sum())
    }

    async fn scopes(&self) -> Result<Vec<String>> {
        let mut scopes = vec![ALL_SCOPE.to_string()];
        scopes.extend(self.accounts.iter().map(|a| a.name.clone()));
        Ok(scopes)
    }
}
