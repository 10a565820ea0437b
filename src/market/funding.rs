//! Perpetual funding-rate feed adapter and its five minute cache

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::{Result, SimulatorError};

/// Annualized funding rate (percent) used when the feed is unavailable
pub const FALLBACK_FUNDING_RATE: f64 = 8.0;

/// Max leverage used when the feed is unavailable
pub const FALLBACK_MAX_LEVERAGE: f64 = 25.0;

/// How long a fetched snapshot stays fresh
pub const FUNDING_CACHE_TTL_SECS: i64 = 5 * 60;

/// Funding and market state of one perpetual market
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FundingSnapshot {
    /// Hourly rate extrapolated to a year, in percent (positive: shorts receive)
    pub funding_rate_annualized: f64,

    /// Raw hourly rate, in percent
    pub hourly_rate: f64,

    pub mark_price: f64,
    pub oracle_price: f64,
    pub max_leverage: f64,
    pub open_interest: f64,
}

impl FundingSnapshot {
    pub fn fallback() -> Self {
        Self {
            funding_rate_annualized: FALLBACK_FUNDING_RATE,
            hourly_rate: 0.0,
            mark_price: 0.0,
            oracle_price: 0.0,
            max_leverage: FALLBACK_MAX_LEVERAGE,
            open_interest: 0.0,
        }
    }

    /// Snapshot with only the annualized rate known (e.g. user override)
    pub fn with_rate(funding_rate_annualized: f64) -> Self {
        Self {
            funding_rate_annualized,
            ..Self::fallback()
        }
    }
}

impl Default for FundingSnapshot {
    fn default() -> Self {
        Self::fallback()
    }
}

/// Simple extrapolation of an hourly fraction to an annual percent
pub fn annualize_hourly_rate(hourly: f64) -> f64 {
    hourly * 24.0 * 365.0 * 100.0
}

#[derive(Debug, Deserialize)]
struct PerpUniverse {
    universe: Vec<PerpAsset>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PerpAsset {
    name: String,
    max_leverage: f64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PerpAssetCtx {
    funding: String,
    open_interest: String,
    oracle_px: String,
    mark_px: String,
}

fn parse_number(field: &str, value: &str) -> Result<f64> {
    value
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| SimulatorError::InvalidNumber {
            field: field.to_string(),
            value: value.to_string(),
        })
}

/// Parse a `metaAndAssetCtxs` response and extract the snapshot for `asset`.
///
/// The payload is a two element array: the market universe and a parallel
/// array of per-asset contexts with string-encoded numbers.
pub fn parse_meta_and_asset_ctxs(payload: &str, asset: &str) -> Result<FundingSnapshot> {
    let (meta, contexts): (PerpUniverse, Vec<PerpAssetCtx>) = serde_json::from_str(payload)?;

    let index = meta
        .universe
        .iter()
        .position(|a| a.name == asset)
        .ok_or_else(|| SimulatorError::AssetNotFound(asset.to_string()))?;

    let ctx = contexts.get(index).ok_or_else(|| {
        SimulatorError::MalformedPayload(format!(
            "no asset context at index {} ({} contexts)",
            index,
            contexts.len()
        ))
    })?;

    let hourly = parse_number("funding", &ctx.funding)?;

    Ok(FundingSnapshot {
        funding_rate_annualized: annualize_hourly_rate(hourly),
        hourly_rate: hourly * 100.0,
        mark_price: parse_number("markPx", &ctx.mark_px)?,
        oracle_price: parse_number("oraclePx", &ctx.oracle_px)?,
        max_leverage: meta.universe[index].max_leverage,
        open_interest: parse_number("openInterest", &ctx.open_interest)?,
    })
}

/// Cached view of the funding feed.
///
/// Keeps the last good snapshot across failed refreshes and records the
/// most recent error so the host can surface it.
#[derive(Debug, Clone)]
pub struct FundingFeed {
    asset: String,
    last_good: Option<(FundingSnapshot, DateTime<Utc>)>,
    last_error: Option<String>,
    ttl: Duration,
    invalidated: bool,
}

impl FundingFeed {
    pub fn new(asset: &str) -> Self {
        Self {
            asset: asset.to_string(),
            last_good: None,
            last_error: None,
            ttl: Duration::seconds(FUNDING_CACHE_TTL_SECS),
            invalidated: false,
        }
    }

    pub fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        match &self.last_good {
            Some((_, fetched_at)) if !self.invalidated => {
                now.signed_duration_since(*fetched_at) < self.ttl
            }
            _ => false,
        }
    }

    pub fn needs_refresh(&self, now: DateTime<Utc>) -> bool {
        !self.is_fresh(now)
    }

    /// Parse a raw feed payload fetched at `now`.
    ///
    /// On failure the error is recorded and the previous snapshot kept.
    pub fn ingest(&mut self, payload: &str, now: DateTime<Utc>) -> Result<FundingSnapshot> {
        match parse_meta_and_asset_ctxs(payload, &self.asset) {
            Ok(snapshot) => {
                self.record(snapshot.clone(), now);
                Ok(snapshot)
            }
            Err(e) => {
                log::warn!("funding feed refresh failed, keeping last good value: {}", e);
                self.last_error = Some(e.to_string());
                Err(e)
            }
        }
    }

    pub fn record(&mut self, snapshot: FundingSnapshot, now: DateTime<Utc>) {
        self.last_good = Some((snapshot, now));
        self.last_error = None;
        self.invalidated = false;
    }

    /// Record a transport-level failure reported by the host
    pub fn record_error(&mut self, message: impl Into<String>) {
        self.last_error = Some(message.into());
    }

    /// Last good snapshot, or the fallback constants if none was ever fetched
    pub fn current(&self) -> FundingSnapshot {
        match &self.last_good {
            Some((snapshot, _)) => snapshot.clone(),
            None => FundingSnapshot::fallback(),
        }
    }

    pub fn last_updated(&self) -> Option<DateTime<Utc>> {
        self.last_good.as_ref().map(|(_, at)| *at)
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Force the next `needs_refresh` check to report stale
    pub fn invalidate(&mut self) {
        self.invalidated = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const PAYLOAD: &str = r#"[
        {"universe": [
            {"szDecimals": 5, "name": "BTC", "maxLeverage": 40, "marginTableId": 56},
            {"szDecimals": 4, "name": "ETH", "maxLeverage": 25, "marginTableId": 55}
        ]},
        [
            {"funding": "0.0000100", "openInterest": "1000.0", "prevDayPx": "1", "dayNtlVlm": "1",
             "premium": "0", "oraclePx": "95000.0", "markPx": "95010.0", "midPx": "95005.0",
             "impactPxs": ["95000.0", "95010.0"], "dayBaseVlm": "1"},
            {"funding": "0.0000125", "openInterest": "250000.5", "prevDayPx": "3400", "dayNtlVlm": "1",
             "premium": "0", "oraclePx": "3499.5", "markPx": "3500.5", "midPx": "3500.0",
             "impactPxs": ["3499.0", "3501.0"], "dayBaseVlm": "1"}
        ]
    ]"#;

    #[test]
    fn test_annualize_hourly_rate() {
        // 0.00125% per hour -> 10.95% per year
        assert_relative_eq!(annualize_hourly_rate(0.0000125), 10.95, epsilon = 1e-9);
    }

    #[test]
    fn test_parse_eth_snapshot() {
        let snapshot = parse_meta_and_asset_ctxs(PAYLOAD, "ETH").unwrap();

        assert_relative_eq!(snapshot.funding_rate_annualized, 10.95, epsilon = 1e-9);
        assert_relative_eq!(snapshot.hourly_rate, 0.00125, epsilon = 1e-12);
        assert_eq!(snapshot.mark_price, 3500.5);
        assert_eq!(snapshot.oracle_price, 3499.5);
        assert_eq!(snapshot.max_leverage, 25.0);
        assert_eq!(snapshot.open_interest, 250000.5);
    }

    #[test]
    fn test_missing_asset_is_error() {
        let err = parse_meta_and_asset_ctxs(PAYLOAD, "SOL").unwrap_err();
        assert!(matches!(err, SimulatorError::AssetNotFound(_)));
    }

    #[test]
    fn test_bad_number_is_error() {
        let payload = PAYLOAD.replace("0.0000125", "n/a");
        let err = parse_meta_and_asset_ctxs(&payload, "ETH").unwrap_err();
        assert!(matches!(err, SimulatorError::InvalidNumber { .. }));
    }

    #[test]
    fn test_feed_falls_back_without_data() {
        let feed = FundingFeed::new("ETH");
        let current = feed.current();
        assert_eq!(current.funding_rate_annualized, FALLBACK_FUNDING_RATE);
        assert_eq!(current.max_leverage, FALLBACK_MAX_LEVERAGE);
        assert!(feed.needs_refresh(Utc::now()));
    }

    #[test]
    fn test_feed_cache_ttl() {
        let mut feed = FundingFeed::new("ETH");
        let t0 = Utc::now();
        feed.ingest(PAYLOAD, t0).unwrap();

        assert!(feed.is_fresh(t0 + Duration::seconds(299)));
        assert!(feed.needs_refresh(t0 + Duration::seconds(300)));

        feed.invalidate();
        assert!(feed.needs_refresh(t0));
    }

    #[test]
    fn test_feed_keeps_last_good_on_error() {
        let mut feed = FundingFeed::new("ETH");
        let t0 = Utc::now();
        feed.ingest(PAYLOAD, t0).unwrap();

        assert!(feed.ingest("not json", t0).is_err());
        assert!(feed.last_error().is_some());
        assert_relative_eq!(feed.current().funding_rate_annualized, 10.95, epsilon = 1e-9);
        assert_eq!(feed.last_updated(), Some(t0));
    }
}
