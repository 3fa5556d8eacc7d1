//! Disk-backed TTL cache for market snapshots
//!
//! One JSON blob per symbol under the cache directory, valid for five
//! minutes by timestamp comparison. There is no locking: a race between two
//! requests refreshing the same ticker costs at most a redundant fetch.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::data::{CloseSeries, MarketSnapshot, PriceDataSource, PriceSeries};
use crate::error::Result;

pub const DEFAULT_TTL: Duration = Duration::from_secs(5 * 60);

#[derive(Serialize, Deserialize)]
struct CacheEntry {
    timestamp: DateTime<Utc>,
    symbol: String,
    ticker_data: PriceSeries,
    index_data: CloseSeries,
}

pub struct DiskCache {
    dir: PathBuf,
    ttl: Duration,
    inner: Box<dyn PriceDataSource>,
}

impl DiskCache {
    pub fn new(dir: impl Into<PathBuf>, inner: Box<dyn PriceDataSource>) -> Self {
        Self {
            dir: dir.into(),
            ttl: DEFAULT_TTL,
            inner,
        }
    }

    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    fn cache_path(&self, symbol: &str) -> PathBuf {
        // Symbols like ^GSPC or 005930.KS must stay filesystem-safe
        let safe: String = symbol
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '.' || c == '-' { c } else { '_' })
            .collect();
        self.dir.join(format!("{}_cache.json", safe))
    }

    fn load_valid(&self, path: &Path) -> Option<MarketSnapshot> {
        let raw = std::fs::read_to_string(path).ok()?;
        let entry: CacheEntry = match serde_json::from_str(&raw) {
            Ok(entry) => entry,
            Err(err) => {
                warn!(path = %path.display(), %err, "unreadable cache entry");
                return None;
            }
        };

        let age = Utc::now().signed_duration_since(entry.timestamp);
        if age.num_seconds() < 0 || age.to_std().map_or(true, |a| a >= self.ttl) {
            return None;
        }

        Some(MarketSnapshot {
            symbol: entry.symbol,
            ticker: entry.ticker_data,
            index: entry.index_data,
        })
    }

    fn store(&self, snapshot: &MarketSnapshot) {
        let entry = CacheEntry {
            timestamp: Utc::now(),
            symbol: snapshot.symbol.clone(),
            ticker_data: snapshot.ticker.clone(),
            index_data: snapshot.index.clone(),
        };
        let path = self.cache_path(&snapshot.symbol);
        let write = std::fs::create_dir_all(&self.dir)
            .and_then(|_| std::fs::write(&path, serde_json::to_string(&entry).unwrap_or_default()));
        if let Err(err) = write {
            // Cache write failure never fails the request
            warn!(path = %path.display(), %err, "failed to write cache entry");
        }
    }
}

#[async_trait]
impl PriceDataSource for DiskCache {
    fn name(&self) -> &'static str {
        "cache"
    }

    async fn fetch(&self, symbol: &str) -> Result<MarketSnapshot> {
        let path = self.cache_path(symbol);
        if let Some(snapshot) = self.load_valid(&path) {
            debug!(%symbol, "serving cached data");
            return Ok(snapshot);
        }

        let snapshot = self.inner.fetch(symbol).await?;
        self.store(&snapshot);
        Ok(snapshot)
    }
}
