//! Static ticker-to-industry table
//!
//! Loaded per request from a committed CSV (`ticker,name,industry`); backs
//! the industry-sensitivity regression, which compares a stock against an
//! equal-weighted portfolio of its industry peers.

use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;

use crate::error::{Error, Result};

/// Peer-portfolio size cap; keeps the fan-out to the data provider bounded
pub const MAX_PEERS: usize = 10;

#[derive(Debug, Deserialize)]
struct IndustryRow {
    ticker: String,
    #[allow(dead_code)]
    name: String,
    industry: String,
}

#[derive(Debug, Clone, Default)]
pub struct IndustryMap {
    map: HashMap<String, String>,
}

impl IndustryMap {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut reader = csv::Reader::from_path(path).map_err(|err| {
            Error::Io(format!("industry map {} unreadable: {}", path.display(), err))
        })?;

        let mut map = HashMap::new();
        for record in reader.deserialize::<IndustryRow>() {
            let row = record?;
            map.insert(row.ticker.to_uppercase(), row.industry);
        }

        if map.is_empty() {
            return Err(Error::Parse(format!(
                "industry map {} has no entries",
                path.display()
            )));
        }
        Ok(Self { map })
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn industry_of(&self, ticker: &str) -> Result<&str> {
        self.map
            .get(&ticker.to_uppercase())
            .map(String::as_str)
            .ok_or_else(|| Error::NotFound(format!("{} is not in the industry map", ticker)))
    }

    /// Same-industry tickers excluding `ticker` itself, capped at
    /// [`MAX_PEERS`], in a stable order
    pub fn peers_of(&self, ticker: &str) -> Result<Vec<String>> {
        let upper = ticker.to_uppercase();
        let industry = self.industry_of(&upper)?;
        let mut peers: Vec<String> = self
            .map
            .iter()
            .filter(|(t, ind)| *t != &upper && ind.as_str() == industry)
            .map(|(t, _)| t.clone())
            .collect();
        peers.sort();
        peers.truncate(MAX_PEERS);
        Ok(peers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::path::PathBuf;

    fn write_map(tag: &str) -> PathBuf {
        let path =
            std::env::temp_dir().join(format!("speedtraffic-industry-{}-{}.csv", tag, std::process::id()));
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "ticker,name,industry").unwrap();
        writeln!(file, "005930.KS,Samsung Electronics,Semiconductors").unwrap();
        writeln!(file, "000660.KS,SK Hynix,Semiconductors").unwrap();
        writeln!(file, "005380.KS,Hyundai Motor,Automobiles").unwrap();
        writeln!(file, "000270.KS,Kia,Automobiles").unwrap();
        path
    }

    #[test]
    fn test_lookup_is_case_insensitive() {
        let map = IndustryMap::load(write_map("case")).unwrap();
        assert_eq!(map.industry_of("005930.ks").unwrap(), "Semiconductors");
    }

    #[test]
    fn test_peers_exclude_self() {
        let map = IndustryMap::load(write_map("peers")).unwrap();
        let peers = map.peers_of("005930.KS").unwrap();
        assert_eq!(peers, vec!["000660.KS".to_string()]);
    }

    #[test]
    fn test_unknown_ticker() {
        let map = IndustryMap::load(write_map("unknown")).unwrap();
        assert!(matches!(map.industry_of("XXXX"), Err(Error::NotFound(_))));
    }
}
