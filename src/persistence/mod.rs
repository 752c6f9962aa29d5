//! JSON file persistence.
//!
//! Keeps small state records across restarts:
//! - [`BotState`]: holding, entry price and daily counters of the rotator
//! - the paper wallet when running without live trading
//!
//! Files are written to a sibling temp file and renamed into place, so a
//! crash mid-write leaves the previous version intact. Files are never
//! deleted.

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Flat rotator state record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BotState {
    /// Held alt pair, `None` while in quote
    pub holding: Option<String>,
    pub entry_price: Option<Decimal>,
    pub last_trade_at: Option<DateTime<Utc>>,
    /// Running equity estimate in quote units
    pub equity: Option<Decimal>,
    pub trading_day: Option<NaiveDate>,
    pub trades_today: u32,
    pub losses_today: u32,
    pub realized_pnl: Decimal,
    pub total_trades: u64,
    /// Pair of an order whose outcome was never confirmed; balances are
    /// re-read before the next decision
    pub unsettled_order: Option<String>,
}

/// A JSON document on disk holding one `T`.
#[derive(Debug, Clone)]
pub struct JsonFile<T> {
    path: PathBuf,
    _marker: PhantomData<T>,
}

impl<T> JsonFile<T>
where
    T: Serialize + DeserializeOwned + Default,
{
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            _marker: PhantomData,
        }
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Read the file, or `T::default()` if it does not exist yet.
    pub fn load(&self) -> Result<T> {
        if !self.path.exists() {
            info!(path = %self.path.display(), "📂 [PERSISTENCE] No state file, using defaults");
            return Ok(T::default());
        }

        let raw = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read {}", self.path.display()))?;
        let value = serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse {}", self.path.display()))?;

        info!(path = %self.path.display(), "📂 [PERSISTENCE] State loaded");
        Ok(value)
    }

    /// Atomically replace the file contents.
    pub fn save(&self, value: &T) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }

        let json = serde_json::to_string_pretty(value).context("Failed to serialize state")?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json).with_context(|| format!("Failed to write {}", tmp.display()))?;
        fs::rename(&tmp, &self.path)
            .with_context(|| format!("Failed to replace {}", self.path.display()))?;

        debug!(path = %self.path.display(), "💾 [PERSISTENCE] State saved");
        Ok(())
    }
}
