//! Run configuration loaded from TOML.
//!
//! ```toml
//! [data]
//! dir = "data"
//!
//! [backtest]
//! symbol = "^GSPC"
//! start = "2000-01-01"
//! end = "2023-12-31"
//! output = "hammer_backtest.csv"
//! non_finite = "skip"
//!
//! [scan]
//! symbols = ["BTC-USD", "^GSPC"]
//! window_days = 365
//! ```
//!
//! Every key is optional; missing ones fall back to [`Config::default`].

use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::returns::NonFinitePolicy;
use crate::{BacktestError, Result};

/// Tickers scanned when no basket is configured.
pub const DEFAULT_BASKET: [&str; 10] = [
    "BTC-USD", "ETH-USD", "XRP-USD", "LTC-USD", "BCH-USD", "^N225", "^HSI", "^GDAXI", "^DJI",
    "^GSPC",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataSection {
    /// Directory holding `{SYMBOL}.csv` history files
    pub dir: PathBuf,
}

impl Default for DataSection {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("data"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BacktestSection {
    pub symbol: String,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub output: PathBuf,
    pub non_finite: NonFinitePolicy,
    pub validate_data: bool,
}

impl Default for BacktestSection {
    fn default() -> Self {
        Self {
            symbol: "^GSPC".into(),
            start: NaiveDate::from_ymd_opt(2000, 1, 1).unwrap_or_default(),
            end: NaiveDate::from_ymd_opt(2023, 12, 31).unwrap_or_default(),
            output: PathBuf::from("hammer_backtest.csv"),
            non_finite: NonFinitePolicy::Skip,
            validate_data: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanSection {
    pub symbols: Vec<String>,
    /// Calendar days of history ending at the scan date
    pub window_days: u32,
    pub output: Option<PathBuf>,
}

impl Default for ScanSection {
    fn default() -> Self {
        Self {
            symbols: DEFAULT_BASKET.iter().map(|s| s.to_string()).collect(),
            window_days: 365,
            output: None,
        }
    }
}

/// Complete configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub data: DataSection,
    pub backtest: BacktestSection,
    pub scan: ScanSection,
}

impl Config {
    /// Load and validate a config file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse and validate a TOML string.
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let bt = &self.backtest;
        if bt.symbol.trim().is_empty() {
            return Err(invalid("backtest.symbol is empty"));
        }
        if bt.start > bt.end {
            return Err(invalid(format!(
                "backtest.start {} is after backtest.end {}",
                bt.start, bt.end
            )));
        }
        if self.scan.window_days == 0 {
            return Err(invalid("scan.window_days must be > 0"));
        }
        if let Some(bad) = self.scan.symbols.iter().find(|s| s.trim().is_empty()) {
            return Err(invalid(format!("scan.symbols contains an empty entry: {bad:?}")));
        }
        Ok(())
    }
}

fn invalid(msg: impl Into<String>) -> BacktestError {
    BacktestError::InvalidConfig(msg.into())
}
