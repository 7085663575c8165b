//! Ticker snapshot - point-in-time prices, read-only for one run
//!
//! The snapshot is fetched elsewhere; this module only decides which field
//! of a ticker is the price. Extraction is an ordered list of
//! [`PriceExtractor`] strategies, the first non-null field wins.

use crate::core_types::Symbol;
use crate::error::SkipReason;
use crate::logging::TARGET_RECORD;
use crate::precision::{PrecisionError, parse_price};
use bigdecimal::BigDecimal;
use rustc_hash::FxHashMap;
use serde::Deserialize;
use serde_json::Value;

/// One ticker as returned by an exchange "fetch all tickers" call.
///
/// Unknown fields are ignored; every price field may be missing or null.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TickerEntry {
    #[serde(default)]
    pub last: Option<Value>,
    #[serde(default)]
    pub close: Option<Value>,
    /// Raw exchange payload, carries `lastPrice` as a fallback
    #[serde(default)]
    pub info: Option<Value>,
}

impl TickerEntry {
    pub fn with_last(last: &str) -> Self {
        TickerEntry {
            last: Some(Value::String(last.to_string())),
            ..Default::default()
        }
    }
}

/// Price field lookup strategies, tried in [`PriceExtractor::ORDER`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PriceExtractor {
    Last,
    Close,
    InfoLastPrice,
}

impl PriceExtractor {
    pub const ORDER: [PriceExtractor; 3] = [
        PriceExtractor::Last,
        PriceExtractor::Close,
        PriceExtractor::InfoLastPrice,
    ];

    /// The raw field value if present and non-null.
    pub fn extract<'a>(&self, ticker: &'a TickerEntry) -> Option<&'a Value> {
        let value = match self {
            PriceExtractor::Last => ticker.last.as_ref(),
            PriceExtractor::Close => ticker.close.as_ref(),
            PriceExtractor::InfoLastPrice => ticker.info.as_ref().and_then(|i| i.get("lastPrice")),
        }?;
        (!value.is_null()).then_some(value)
    }
}

/// One snapshot slot. Entries that are not ticker objects are kept so the
/// lookup can say why there is no price, instead of failing the load.
#[derive(Debug, Clone)]
enum Slot {
    Ticker(TickerEntry),
    Malformed(Value),
}

/// Immutable symbol -> ticker map for one run.
#[derive(Debug, Clone, Default)]
pub struct TickerSnapshot {
    tickers: FxHashMap<Symbol, Slot>,
}

impl TickerSnapshot {
    pub fn new(tickers: FxHashMap<Symbol, TickerEntry>) -> Self {
        let tickers = tickers
            .into_iter()
            .map(|(symbol, entry)| (symbol, Slot::Ticker(entry)))
            .collect();
        TickerSnapshot { tickers }
    }

    /// Parse the JSON object form `{"BTC/USDT": {"last": ...}, ...}`.
    ///
    /// Only a top level that is not an object is an error. Each entry is
    /// converted on its own; a malformed one only loses its own price.
    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        let raw: FxHashMap<Symbol, Value> = serde_json::from_str(json)?;
        let mut malformed = 0usize;
        let tickers = raw
            .into_iter()
            .map(|(symbol, value)| {
                let slot = match serde_json::from_value::<TickerEntry>(value.clone()) {
                    Ok(entry) => Slot::Ticker(entry),
                    Err(e) => {
                        malformed += 1;
                        tracing::debug!(
                            target: TARGET_RECORD,
                            %symbol,
                            error = %e,
                            "Malformed ticker entry"
                        );
                        Slot::Malformed(value)
                    }
                };
                (symbol, slot)
            })
            .collect();
        if malformed > 0 {
            tracing::warn!("{} ticker entries are not ticker objects", malformed);
        }
        Ok(TickerSnapshot { tickers })
    }

    /// Convenience for tests and fixtures: symbol -> last price string.
    pub fn from_last_prices<'a>(prices: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        let tickers = prices
            .into_iter()
            .map(|(symbol, last)| (symbol.to_string(), TickerEntry::with_last(last)))
            .collect();
        Self::new(tickers)
    }

    /// Raw entry count, usable or not.
    pub fn len(&self) -> usize {
        self.tickers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tickers.is_empty()
    }

    /// Entries that yield a price: the effective view of the snapshot.
    pub fn priced_len(&self) -> usize {
        self.tickers
            .keys()
            .filter(|symbol| self.price(symbol).is_ok())
            .count()
    }

    /// Strictly positive price of `symbol`, or why there is none.
    pub fn price(&self, symbol: &str) -> Result<BigDecimal, SkipReason> {
        let ticker = match self.tickers.get(symbol) {
            None => return Err(SkipReason::MissingTicker),
            Some(Slot::Malformed(Value::Null)) => return Err(SkipReason::NoPrice),
            Some(Slot::Malformed(other)) => {
                return Err(SkipReason::UnparsablePrice(other.to_string()));
            }
            Some(Slot::Ticker(ticker)) => ticker,
        };
        let raw = PriceExtractor::ORDER
            .iter()
            .find_map(|extractor| extractor.extract(ticker))
            .ok_or(SkipReason::NoPrice)?;

        let text = match raw {
            Value::Number(n) => n.to_string(),
            Value::String(s) => s.clone(),
            other => return Err(SkipReason::UnparsablePrice(other.to_string())),
        };

        parse_price(&text).map_err(|e| match e {
            PrecisionError::NonPositive(v) => SkipReason::NonPositivePrice(v),
            PrecisionError::InvalidFormat(v) => SkipReason::UnparsablePrice(v),
            PrecisionError::DivisionByZero => {
                SkipReason::Arithmetic(PrecisionError::DivisionByZero.to_string())
            }
        })
    }
}
