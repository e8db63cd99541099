//! Exchange identifiers and their provider/storage mappings.
//!
//! The set of supported exchanges is closed, so the provider suffix and
//! table locations are plain `match` lookups rather than anything dynamic.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

/// A supported stock exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Exchange {
    Nse,
    Bse,
    Nasdaq,
    Nyse,
    Tse,
    Lse,
    Hkse,
    Xetra,
    Sse,
    Asx,
    Bmv,
    Tsx,
    Euronext,
}

#[derive(Debug, Error)]
#[error("unknown exchange: {0}")]
pub struct UnknownExchange(String);

impl Exchange {
    /// All supported exchanges, for bootstrap loops and CLI help text.
    pub const ALL: [Exchange; 13] = [
        Exchange::Nse,
        Exchange::Bse,
        Exchange::Nasdaq,
        Exchange::Nyse,
        Exchange::Tse,
        Exchange::Lse,
        Exchange::Hkse,
        Exchange::Xetra,
        Exchange::Sse,
        Exchange::Asx,
        Exchange::Bmv,
        Exchange::Tsx,
        Exchange::Euronext,
    ];

    /// Lowercase identifier used in paths and the CLI.
    pub fn as_str(&self) -> &'static str {
        match self {
            Exchange::Nse => "nse",
            Exchange::Bse => "bse",
            Exchange::Nasdaq => "nasdaq",
            Exchange::Nyse => "nyse",
            Exchange::Tse => "tse",
            Exchange::Lse => "lse",
            Exchange::Hkse => "hkse",
            Exchange::Xetra => "xetra",
            Exchange::Sse => "sse",
            Exchange::Asx => "asx",
            Exchange::Bmv => "bmv",
            Exchange::Tsx => "tsx",
            Exchange::Euronext => "euronext",
        }
    }

    /// Ticker suffix the market-data provider expects for this exchange.
    ///
    /// US exchanges use bare symbols.
    pub fn provider_suffix(&self) -> &'static str {
        match self {
            Exchange::Nse => ".NS",
            Exchange::Bse => ".BO",
            Exchange::Nasdaq => "",
            Exchange::Nyse => "",
            Exchange::Tse => ".T",
            Exchange::Lse => ".L",
            Exchange::Hkse => ".HK",
            Exchange::Xetra => ".X",
            Exchange::Sse => ".S",
            Exchange::Asx => ".A",
            Exchange::Bmv => ".M",
            Exchange::Tsx => ".C",
            Exchange::Euronext => ".F",
        }
    }

    /// Human-readable exchange name.
    pub fn full_name(&self) -> &'static str {
        match self {
            Exchange::Nse => "National Stock Exchange of India",
            Exchange::Bse => "Bombay Stock Exchange",
            Exchange::Nasdaq => "Nasdaq Stock Exchange",
            Exchange::Nyse => "New York Stock Exchange",
            Exchange::Tse => "Tokyo Stock Exchange",
            Exchange::Lse => "London Stock Exchange",
            Exchange::Hkse => "Hong Kong Stock Exchange",
            Exchange::Xetra => "Frankfurt Stock Exchange",
            Exchange::Sse => "Shanghai Stock Exchange",
            Exchange::Asx => "Australian Securities Exchange",
            Exchange::Bmv => "Mexico Stock Exchange",
            Exchange::Tsx => "Toronto Stock Exchange",
            Exchange::Euronext => "Euronext",
        }
    }

    /// Location of this exchange's ticker-history table under `root`.
    pub fn history_dir(&self, root: &Path) -> PathBuf {
        root.join(self.as_str()).join("ticker_history")
    }

    /// Location of this exchange's equity reference table under `root`.
    pub fn equity_dir(&self, root: &Path) -> PathBuf {
        root.join(self.as_str()).join("equity")
    }

    /// Map a bare ticker to the provider's symbol for this exchange.
    ///
    /// Any existing suffix is stripped first, so already-qualified input
    /// ("TCS.NS") and bare input ("TCS") produce the same request symbol.
    pub fn provider_symbol(&self, ticker: &str) -> String {
        let bare = ticker.split('.').next().unwrap_or(ticker);
        format!("{}{}", bare.to_uppercase(), self.provider_suffix())
    }
}

impl fmt::Display for Exchange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Exchange {
    type Err = UnknownExchange;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.to_lowercase();
        Exchange::ALL
            .into_iter()
            .find(|e| e.as_str() == lower)
            .ok_or_else(|| UnknownExchange(s.to_string()))
    }
}
