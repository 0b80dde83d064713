use anyhow::{Context, Result};
use chrono::{NaiveDate, NaiveTime};
use directories::ProjectDirs;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use std::{fs, path::PathBuf};
use tracing::debug;

use crate::core::diagnostics::AlertThresholds;
use crate::core::health::HealthConfig;
use crate::providers::util::RetryPolicy;

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct HoldingConfig {
    pub symbol: String,
    #[serde(default)]
    pub name: String,
    pub quantity: Decimal,
    pub cost_basis: Decimal,
    pub currency: Option<String>,
    /// Realized P&L and corrections carried from earlier partial sells.
    #[serde(default)]
    pub adjustment: Decimal,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct BalanceConfig {
    pub name: String,
    pub amount: Decimal,
    pub currency: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct RealizedSaleConfig {
    pub symbol: String,
    pub date: NaiveDate,
    pub pnl: Decimal,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AccountConfig {
    pub name: String,
    #[serde(default)]
    pub holdings: Vec<HoldingConfig>,
    #[serde(default)]
    pub cash: Vec<BalanceConfig>,
    #[serde(default)]
    pub other_assets: Vec<BalanceConfig>,
    #[serde(default)]
    pub liabilities: Vec<BalanceConfig>,
    #[serde(default)]
    pub realized: Vec<RealizedSaleConfig>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct ProvidersConfig {
    pub tencent: String,
    pub sina: String,
    pub eastmoney_push: String,
    pub eastmoney_fund_f10: String,
    pub eastmoney_fund_mobile: String,
    pub tiantian: String,
    pub overseas_fund: String,
    pub ft: String,
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        ProvidersConfig {
            tencent: "http://qt.gtimg.cn".to_string(),
            sina: "http://hq.sinajs.cn".to_string(),
            eastmoney_push: "https://push2.eastmoney.com".to_string(),
            eastmoney_fund_f10: "https://api.fund.eastmoney.com".to_string(),
            eastmoney_fund_mobile: "https://fundmobapi.eastmoney.com".to_string(),
            tiantian: "https://fundgz.1234567.com.cn".to_string(),
            overseas_fund: "https://overseas.1234567.com.cn".to_string(),
            ft: "https://markets.ft.com".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct TradingHours {
    /// Local opening time, `HH:MM`.
    pub open: String,
    /// Local closing time, `HH:MM`. The market is closed from this minute on.
    pub close: String,
    pub utc_offset_minutes: i32,
}

impl Default for TradingHours {
    fn default() -> Self {
        TradingHours {
            open: "09:30".to_string(),
            close: "15:00".to_string(),
            utc_offset_minutes: 480,
        }
    }
}

impl TradingHours {
    pub fn parse_window(&self) -> Result<(NaiveTime, NaiveTime)> {
        let open = NaiveTime::parse_from_str(&self.open, "%H:%M")
            .with_context(|| format!("Invalid trading hours open time: {}", self.open))?;
        let close = NaiveTime::parse_from_str(&self.close, "%H:%M")
            .with_context(|| format!("Invalid trading hours close time: {}", self.close))?;
        Ok((open, close))
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct MarketConfig {
    pub cache_ttl_secs: u64,
    pub stale_ttl_secs: u64,
    /// Total attempts per source per symbol.
    pub retry_attempts: usize,
    pub retry_delay_ms: u64,
    pub fail_threshold: u32,
    pub cooldown_secs: u64,
    pub batch_concurrency: usize,
    pub request_timeout_ms: u64,
    pub trading_hours: TradingHours,
    pub default_fx_rates: HashMap<String, Decimal>,
    pub alerts: AlertThresholds,
}

impl Default for MarketConfig {
    fn default() -> Self {
        let default_fx_rates = [
            ("USD", Decimal::new(725, 2)),
            ("HKD", Decimal::new(93, 2)),
            ("CNY", Decimal::ONE),
        ]
        .into_iter()
        .map(|(currency, rate)| (currency.to_string(), rate))
        .collect();

        MarketConfig {
            cache_ttl_secs: 60,
            stale_ttl_secs: 300,
            retry_attempts: 2,
            retry_delay_ms: 500,
            fail_threshold: 3,
            cooldown_secs: 30,
            batch_concurrency: 10,
            request_timeout_ms: 3000,
            trading_hours: TradingHours::default(),
            default_fx_rates,
            alerts: AlertThresholds::default(),
        }
    }
}

impl MarketConfig {
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn stale_ttl(&self) -> Duration {
        Duration::from_secs(self.stale_ttl_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.retry_attempts,
            Duration::from_millis(self.retry_delay_ms),
        )
    }

    pub fn health_config(&self) -> HealthConfig {
        HealthConfig {
            fail_threshold: self.fail_threshold,
            cooldown: Duration::from_secs(self.cooldown_secs),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AppConfig {
    #[serde(default)]
    pub accounts: Vec<AccountConfig>,
    #[serde(default)]
    pub providers: ProvidersConfig,
    #[serde(default)]
    pub market: MarketConfig,
    pub currency: String,
    pub data_path: Option<String>,
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        debug!("Loading default config");
        let config_path = Self::default_config_path()?;
        Self::load_from_path(&config_path)
    }

    pub fn default_config_path() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("dev", "quotewise", "quotewise")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.config_dir().join("config.yaml"))
    }

    pub fn default_data_path(&self) -> Result<PathBuf> {
        if let Some(custom_path) = &self.data_path {
            return Ok(PathBuf::from(custom_path));
        }
        let proj_dirs = ProjectDirs::from("dev", "quotewise", "quotewise")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.data_dir().to_path_buf())
    }

    pub fn load_from_path<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let config_str = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: Self = serde_yaml::from_str(&config_str)
            .with_context(|| format!("Failed to parse config file: {}", path.as_ref().display()))?;
        config
            .market
            .trading_hours
            .parse_window()
            .with_context(|| format!("Invalid market config in {}", path.as_ref().display()))?;
        debug!("Successfully loaded config");
        Ok(config)
    }
}
