//! Terrain elevation: risk tiers, the per-lookup result type, the GeoNames
//! SRTM3 client and a rate-limited batch resolver.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::task::JoinSet;
use tracing::{debug, warn};

use crate::geo::CoordKey;
use crate::models::Report;

/// SRTM3 marker for ocean or missing data.
const SRTM3_NO_DATA: f64 = -32768.0;

#[derive(Debug, Error)]
pub enum ElevationError {
    #[error("elevation request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("elevation provider returned HTTP {0}")]
    Status(reqwest::StatusCode),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ElevationRiskLevel {
    Critical,
    High,
    Medium,
    Low,
    Minimal,
    Unknown,
}

impl ElevationRiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            ElevationRiskLevel::Critical => "CRITICAL",
            ElevationRiskLevel::High => "HIGH",
            ElevationRiskLevel::Medium => "MEDIUM",
            ElevationRiskLevel::Low => "LOW",
            ElevationRiskLevel::Minimal => "MINIMAL",
            ElevationRiskLevel::Unknown => "UNKNOWN",
        }
    }
}

/// Flood-risk points and tier for a ground elevation in meters.
///
/// - < 5m: coastal or extremely low, 15 points
/// - < 15m: low-lying flood plain, 10 points
/// - < 50m: moderate, 5 points
/// - < 100m: flash-flood exposure only, 2 points
/// - otherwise hill country, 0 points
pub fn elevation_risk(elevation_m: Option<f64>) -> (u32, ElevationRiskLevel) {
    match elevation_m {
        None => (0, ElevationRiskLevel::Unknown),
        Some(m) if m < 5.0 => (15, ElevationRiskLevel::Critical),
        Some(m) if m < 15.0 => (10, ElevationRiskLevel::High),
        Some(m) if m < 50.0 => (5, ElevationRiskLevel::Medium),
        Some(m) if m < 100.0 => (2, ElevationRiskLevel::Low),
        Some(_) => (0, ElevationRiskLevel::Minimal),
    }
}

/// Outcome of one elevation lookup as seen by the scoring function.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub enum ElevationLookup {
    Resolved(f64),
    #[default]
    Unresolved,
}

impl ElevationLookup {
    pub fn meters(&self) -> Option<f64> {
        match self {
            ElevationLookup::Resolved(m) => Some(*m),
            ElevationLookup::Unresolved => None,
        }
    }
}

#[async_trait]
pub trait ElevationSource: Send + Sync {
    /// Ground elevation in meters, `None` when the provider has no data.
    async fn elevation(&self, lat: f64, lon: f64) -> Result<Option<f64>, ElevationError>;
}

/// Used when no elevation provider is configured.
pub struct NoElevation;

#[async_trait]
impl ElevationSource for NoElevation {
    async fn elevation(&self, _lat: f64, _lon: f64) -> Result<Option<f64>, ElevationError> {
        Ok(None)
    }
}

#[derive(Debug, Deserialize)]
struct Srtm3Response {
    srtm3: Option<f64>,
}

pub struct GeoNamesClient {
    client: reqwest::Client,
    base_url: String,
    username: String,
}

impl GeoNamesClient {
    pub fn new(
        client: reqwest::Client,
        base_url: impl Into<String>,
        username: impl Into<String>,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            username: username.into(),
        }
    }
}

#[async_trait]
impl ElevationSource for GeoNamesClient {
    async fn elevation(&self, lat: f64, lon: f64) -> Result<Option<f64>, ElevationError> {
        let url = format!("{}/srtm3JSON", self.base_url.trim_end_matches('/'));
        let response = self
            .client
            .get(&url)
            .query(&[
                ("lat", lat.to_string()),
                ("lng", lon.to_string()),
                ("username", self.username.clone()),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ElevationError::Status(response.status()));
        }

        let payload: Srtm3Response = response.json().await?;
        Ok(payload.srtm3.filter(|m| *m != SRTM3_NO_DATA))
    }
}

/// Memoises resolved elevations at two-decimal coordinate precision.
/// Misses and failures are not cached so a later run can retry them.
pub struct CachedElevation<S> {
    inner: S,
    cache: Mutex<HashMap<CoordKey, f64>>,
}

impl<S> CachedElevation<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            cache: Mutex::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl<S: ElevationSource> ElevationSource for CachedElevation<S> {
    async fn elevation(&self, lat: f64, lon: f64) -> Result<Option<f64>, ElevationError> {
        let key = CoordKey::new(lat, lon);
        if let Some(m) = self.cache.lock().get(&key).copied() {
            return Ok(Some(m));
        }

        let resolved = self.inner.elevation(lat, lon).await?;
        if let Some(m) = resolved {
            self.cache.lock().insert(key, m);
        }
        Ok(resolved)
    }
}

/// Rate limits for one run's elevation lookups.
#[derive(Debug, Clone, Copy)]
pub struct ElevationBatching {
    /// Distinct coordinates looked up per run; the rest stay unresolved.
    pub max_lookups: usize,
    /// Lookups in flight at once.
    pub batch_size: usize,
    /// Pause between consecutive batches.
    pub batch_pause: Duration,
}

impl Default for ElevationBatching {
    fn default() -> Self {
        Self {
            max_lookups: 50,
            batch_size: 10,
            batch_pause: Duration::from_millis(500),
        }
    }
}

/// Resolve elevations for every coordinate-bearing report.
///
/// Reports are deduplicated by `CoordKey` in input order, so the first
/// `max_lookups` distinct locations get a lookup. Any failure only leaves
/// that location unresolved.
pub async fn resolve_elevations(
    source: Arc<dyn ElevationSource>,
    reports: &[Report],
    batching: ElevationBatching,
) -> HashMap<CoordKey, ElevationLookup> {
    let mut pending: Vec<(CoordKey, f64, f64)> = Vec::new();
    let mut seen = std::collections::HashSet::new();
    for (lat, lon) in reports.iter().filter_map(Report::coordinates) {
        let key = CoordKey::new(lat, lon);
        if seen.insert(key) {
            pending.push((key, lat, lon));
        }
    }

    if pending.len() > batching.max_lookups {
        debug!(
            skipped = pending.len() - batching.max_lookups,
            "elevation lookup cap reached"
        );
        pending.truncate(batching.max_lookups);
    }

    let mut resolved = HashMap::with_capacity(pending.len());
    for (index, batch) in pending.chunks(batching.batch_size.max(1)).enumerate() {
        if index > 0 && !batching.batch_pause.is_zero() {
            tokio::time::sleep(batching.batch_pause).await;
        }

        let mut tasks = JoinSet::new();
        for &(key, lat, lon) in batch {
            let source = Arc::clone(&source);
            tasks.spawn(async move { (key, source.elevation(lat, lon).await) });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((key, Ok(Some(m)))) => {
                    resolved.insert(key, ElevationLookup::Resolved(m));
                }
                Ok((key, Ok(None))) => {
                    resolved.insert(key, ElevationLookup::Unresolved);
                }
                Ok((key, Err(err))) => {
                    warn!(?key, error = %err, "elevation lookup failed");
                    resolved.insert(key, ElevationLookup::Unresolved);
                }
                Err(err) => warn!(error = %err, "elevation lookup task aborted"),
            }
        }
    }

    resolved
}
