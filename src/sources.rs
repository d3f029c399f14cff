//! Report and weather sources feeding the engine, plus their adapters.
//!
//! Adapters own all normalization of loosely-typed upstream records, so
//! the scoring and clustering stages only ever see well-formed `Report`s.

use std::collections::HashMap;
use std::path::PathBuf;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::Deserialize;
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, info};

use crate::models::{
    normalize_district, DistrictWeather, Report, WaterLevel, MAX_PEOPLE_PER_REPORT,
};

pub const ALERT_THRESHOLD_YELLOW_MM: f64 = 50.0;
pub const ALERT_THRESHOLD_ORANGE_MM: f64 = 100.0;
pub const ALERT_THRESHOLD_RED_MM: f64 = 150.0;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("request to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid JSON in {origin}: {source}")]
    Json {
        origin: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid CSV in {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
    #[error("unexpected payload from {origin}: {detail}")]
    Payload { origin: String, detail: String },
}

#[async_trait]
pub trait ReportSource: Send + Sync {
    async fn fetch_reports(&self) -> Result<Vec<Report>, SourceError>;
}

#[async_trait]
pub trait WeatherSource: Send + Sync {
    async fn fetch_weather(&self) -> Result<Vec<DistrictWeather>, SourceError>;
}

/// Alert level for 24h rainfall when the weather record carries none.
pub fn alert_level_for_rainfall(rainfall_24h_mm: f64) -> &'static str {
    if rainfall_24h_mm >= ALERT_THRESHOLD_RED_MM {
        "red"
    } else if rainfall_24h_mm >= ALERT_THRESHOLD_ORANGE_MM {
        "orange"
    } else if rainfall_24h_mm >= ALERT_THRESHOLD_YELLOW_MM {
        "yellow"
    } else {
        "green"
    }
}

fn parse_f64(value: Option<&Value>) -> Option<f64> {
    let parsed: Option<f64> = match value? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    };
    parsed.filter(|v| v.is_finite())
}

fn parse_u32(value: Option<&Value>) -> Option<u32> {
    parse_f64(value).filter(|v| *v >= 0.0).map(|v| v.min(u32::MAX as f64) as u32)
}

fn parse_bool(value: Option<&Value>, default: bool) -> bool {
    match value {
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => match s.trim().to_lowercase().as_str() {
            "true" | "yes" | "1" => true,
            "false" | "no" | "0" => false,
            _ => default,
        },
        Some(Value::Number(n)) => n.as_f64().map(|v| v != 0.0).unwrap_or(default),
        _ => default,
    }
}

fn parse_string(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Normalize one floodsupport.org SOS record. Records without an id are
/// dropped; everything else is repaired rather than rejected.
pub fn normalize_sos_record(item: &Value) -> Option<Report> {
    let obj = item.as_object()?;
    let id = parse_string(obj.get("id"))?;

    Some(Report {
        id,
        reference: parse_string(obj.get("referenceNumber")),
        name: parse_string(obj.get("fullName")),
        district: normalize_district(obj.get("district").and_then(Value::as_str)),
        latitude: parse_f64(obj.get("latitude")),
        longitude: parse_f64(obj.get("longitude")),
        water_level: obj
            .get("waterLevel")
            .and_then(Value::as_str)
            .map(WaterLevel::parse)
            .unwrap_or_default(),
        number_of_people: parse_u32(obj.get("numberOfPeople"))
            .unwrap_or(1)
            .clamp(1, MAX_PEOPLE_PER_REPORT),
        has_medical_emergency: parse_bool(obj.get("hasMedicalEmergency"), false),
        has_disabled: parse_bool(obj.get("hasDisabled"), false),
        has_elderly: parse_bool(obj.get("hasElderly"), false),
        has_children: parse_bool(obj.get("hasChildren"), false),
        has_food: parse_bool(obj.get("hasFood"), true),
        has_water: parse_bool(obj.get("hasWater"), true),
        has_power: parse_bool(obj.get("hasPowerBank"), false),
        battery_percent: parse_u32(obj.get("batteryPercentage")),
        safe_for_hours: parse_f64(obj.get("safeForHours")),
        status: parse_string(obj.get("status")),
        created_at: parse_string(obj.get("createdAt")),
    })
}

/// Unwrap the record list from either a bare array or a `data` /
/// `results` envelope.
fn sos_records(payload: Value) -> Vec<Value> {
    match payload {
        Value::Array(items) => items,
        Value::Object(mut obj) => match obj.remove("data").or_else(|| obj.remove("results")) {
            Some(Value::Array(items)) => items,
            Some(other) => vec![other],
            None => vec![Value::Object(obj)],
        },
        _ => Vec::new(),
    }
}

/// Client for the floodsupport.org SOS API with an id-keyed merge cache.
pub struct SosApiClient {
    client: reqwest::Client,
    url: String,
    limit: usize,
    cache: Mutex<HashMap<String, Report>>,
}

impl SosApiClient {
    pub fn new(client: reqwest::Client, url: impl Into<String>, limit: usize) -> Self {
        Self {
            client,
            url: url.into(),
            limit,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Merge fresh records into the cache, returning (added, updated).
    fn merge(&self, fresh: Vec<Report>) -> (usize, usize) {
        let mut cache = self.cache.lock();
        let (mut added, mut updated) = (0, 0);
        for report in fresh {
            match cache.get(&report.id) {
                Some(existing) if *existing == report => {}
                Some(_) => {
                    updated += 1;
                    cache.insert(report.id.clone(), report);
                }
                None => {
                    added += 1;
                    cache.insert(report.id.clone(), report);
                }
            }
        }
        (added, updated)
    }

    /// Cached reports in a stable order.
    fn cached_reports(&self) -> Vec<Report> {
        let mut reports: Vec<Report> = self.cache.lock().values().cloned().collect();
        reports.sort_by(|a, b| a.id.cmp(&b.id));
        reports
    }
}

#[async_trait]
impl ReportSource for SosApiClient {
    async fn fetch_reports(&self) -> Result<Vec<Report>, SourceError> {
        let http_err = |source| SourceError::Http {
            url: self.url.clone(),
            source,
        };
        let response = self
            .client
            .get(&self.url)
            .query(&[("limit", self.limit)])
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(http_err)?;
        let payload: Value = response.json().await.map_err(http_err)?;

        let fresh: Vec<Report> = sos_records(payload)
            .iter()
            .filter_map(normalize_sos_record)
            .collect();
        let fetched = fresh.len();
        let (added, updated) = self.merge(fresh);
        info!(fetched, added, updated, "fetched SOS reports");

        Ok(self.cached_reports())
    }
}

#[derive(Debug, Deserialize)]
struct CsvRow {
    id: String,
    reference: Option<String>,
    name: Option<String>,
    district: Option<String>,
    latitude: Option<String>,
    longitude: Option<String>,
    water_level: Option<String>,
    number_of_people: Option<String>,
    has_medical_emergency: Option<bool>,
    has_disabled: Option<bool>,
    has_elderly: Option<bool>,
    has_children: Option<bool>,
    has_food: Option<bool>,
    has_water: Option<bool>,
    has_power: Option<bool>,
    battery_percent: Option<String>,
    safe_for_hours: Option<String>,
    status: Option<String>,
    created_at: Option<String>,
}

impl CsvRow {
    fn into_report(self) -> Report {
        let number = |raw: &Option<String>| parse_f64(raw.clone().map(Value::String).as_ref());
        Report {
            latitude: number(&self.latitude),
            longitude: number(&self.longitude),
            number_of_people: number(&self.number_of_people)
                .filter(|v| *v >= 1.0)
                .map(|v| (v as u32).min(MAX_PEOPLE_PER_REPORT))
                .unwrap_or(1),
            battery_percent: number(&self.battery_percent).filter(|v| *v >= 0.0).map(|v| v as u32),
            safe_for_hours: number(&self.safe_for_hours),
            id: self.id,
            reference: self.reference,
            name: self.name,
            district: normalize_district(self.district.as_deref()),
            water_level: self.water_level.as_deref().map(WaterLevel::parse).unwrap_or_default(),
            has_medical_emergency: self.has_medical_emergency.unwrap_or(false),
            has_disabled: self.has_disabled.unwrap_or(false),
            has_elderly: self.has_elderly.unwrap_or(false),
            has_children: self.has_children.unwrap_or(false),
            has_food: self.has_food.unwrap_or(true),
            has_water: self.has_water.unwrap_or(true),
            has_power: self.has_power.unwrap_or(false),
            status: self.status,
            created_at: self.created_at,
        }
    }
}

/// Reads SOS reports from a CSV export with snake_case headers.
pub struct CsvReportSource {
    path: PathBuf,
}

impl CsvReportSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn read_reports(&self) -> Result<Vec<Report>, SourceError> {
        let csv_err = |source| SourceError::Csv {
            path: self.path.clone(),
            source,
        };
        let mut reader = csv::Reader::from_path(&self.path).map_err(csv_err)?;
        let mut reports = Vec::new();
        for row in reader.deserialize::<CsvRow>() {
            let row = row.map_err(csv_err)?;
            if row.id.trim().is_empty() {
                continue;
            }
            reports.push(row.into_report());
        }
        Ok(reports)
    }
}

#[async_trait]
impl ReportSource for CsvReportSource {
    async fn fetch_reports(&self) -> Result<Vec<Report>, SourceError> {
        let reports = self.read_reports()?;
        info!(path = %self.path.display(), count = reports.len(), "loaded SOS reports from CSV");
        Ok(reports)
    }
}

/// Reads the per-district weather snapshot written by the weather poller.
///
/// Accepts either a JSON array of district records or the poller's disk
/// cache layout: `{ "weather": { "<name>": { "district": .., "data": {..} } } }`.
pub struct WeatherFileSource {
    path: PathBuf,
}

impl WeatherFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

/// Build one `DistrictWeather`, keeping unrecognised fields in `extra`.
fn district_weather(mut fields: Map<String, Value>) -> Option<DistrictWeather> {
    let district = parse_string(fields.get("district"))?;
    fields.remove("district");

    let forecast = parse_f64(fields.remove("forecast_precip_24h_mm").as_ref()).unwrap_or(0.0);
    let alert_level = match fields.remove("alert_level") {
        Some(Value::String(level)) if !level.trim().is_empty() => level.trim().to_lowercase(),
        _ => {
            let rainfall = parse_f64(fields.get("rainfall_24h_mm")).unwrap_or(0.0);
            alert_level_for_rainfall(rainfall).to_string()
        }
    };

    Some(DistrictWeather {
        district,
        forecast_precip_24h_mm: forecast,
        alert_level,
        extra: fields,
    })
}

pub fn parse_weather(payload: Value, origin: &str) -> Result<Vec<DistrictWeather>, SourceError> {
    let entries: Vec<Map<String, Value>> = match payload {
        Value::Array(items) => items
            .into_iter()
            .filter_map(|item| match item {
                Value::Object(obj) => Some(obj),
                _ => None,
            })
            .collect(),
        Value::Object(mut obj) => match obj.remove("weather") {
            Some(Value::Object(by_name)) => by_name
                .into_iter()
                .filter_map(|(name, cached)| {
                    let Value::Object(mut cached) = cached else {
                        return None;
                    };
                    let mut fields = match cached.remove("data") {
                        Some(Value::Object(data)) => data,
                        _ => Map::new(),
                    };
                    let district = cached.remove("district").unwrap_or(Value::String(name));
                    fields.insert("district".to_string(), district);
                    fields.extend(cached);
                    Some(fields)
                })
                .collect(),
            _ => {
                return Err(SourceError::Payload {
                    origin: origin.to_string(),
                    detail: "expected an array or a `weather` object".to_string(),
                })
            }
        },
        _ => {
            return Err(SourceError::Payload {
                origin: origin.to_string(),
                detail: "expected an array or a `weather` object".to_string(),
            })
        }
    };

    let total = entries.len();
    let records: Vec<DistrictWeather> = entries.into_iter().filter_map(district_weather).collect();
    if records.len() < total {
        debug!(skipped = total - records.len(), "weather entries without a district");
    }
    Ok(records)
}

#[async_trait]
impl WeatherSource for WeatherFileSource {
    async fn fetch_weather(&self) -> Result<Vec<DistrictWeather>, SourceError> {
        let raw = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|source| SourceError::Io {
                path: self.path.clone(),
                source,
            })?;
        let origin = self.path.display().to_string();
        let payload: Value = serde_json::from_str(&raw).map_err(|source| SourceError::Json {
            origin: origin.clone(),
            source,
        })?;
        let records = parse_weather(payload, &origin)?;
        info!(path = %origin, districts = records.len(), "loaded weather snapshot");
        Ok(records)
    }
}
