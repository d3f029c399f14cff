use std::collections::{BTreeMap, HashMap};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::elevation::ElevationRiskLevel;

pub const UNKNOWN_DISTRICT: &str = "Unknown";

/// Upper bound on the head count a single report may claim.
pub const MAX_PEOPLE_PER_REPORT: u32 = 10_000;

/// Lookup key for district names: trimmed and lower-cased.
///
/// Every cross-stage district match (weather join, summary grouping,
/// district intel filtering) goes through this one helper.
pub fn district_key(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Display form of a possibly missing district; blank becomes "Unknown".
pub fn normalize_district(raw: Option<&str>) -> String {
    match raw.map(str::trim) {
        Some(name) if !name.is_empty() => name.to_string(),
        _ => UNKNOWN_DISTRICT.to_string(),
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum WaterLevel {
    Ankle,
    #[default]
    Unknown,
    Waist,
    Chest,
    Neck,
    Roof,
}

impl WaterLevel {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_uppercase().as_str() {
            "ROOF" => WaterLevel::Roof,
            "NECK" => WaterLevel::Neck,
            "CHEST" => WaterLevel::Chest,
            "WAIST" => WaterLevel::Waist,
            "ANKLE" => WaterLevel::Ankle,
            _ => WaterLevel::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            WaterLevel::Roof => "ROOF",
            WaterLevel::Neck => "NECK",
            WaterLevel::Chest => "CHEST",
            WaterLevel::Waist => "WAIST",
            WaterLevel::Ankle => "ANKLE",
            WaterLevel::Unknown => "UNKNOWN",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum UrgencyTier {
    Critical,
    High,
    Medium,
    Low,
}

impl UrgencyTier {
    pub fn from_score(score: u32) -> Self {
        match score {
            70.. => UrgencyTier::Critical,
            50..=69 => UrgencyTier::High,
            30..=49 => UrgencyTier::Medium,
            _ => UrgencyTier::Low,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            UrgencyTier::Critical => "CRITICAL",
            UrgencyTier::High => "HIGH",
            UrgencyTier::Medium => "MEDIUM",
            UrgencyTier::Low => "LOW",
        }
    }
}

impl FromStr for UrgencyTier {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_uppercase().as_str() {
            "CRITICAL" => Ok(UrgencyTier::Critical),
            "HIGH" => Ok(UrgencyTier::High),
            "MEDIUM" => Ok(UrgencyTier::Medium),
            "LOW" => Ok(UrgencyTier::Low),
            other => Err(format!("unknown urgency tier `{other}`")),
        }
    }
}

/// One SOS emergency report as delivered by the report source.
///
/// Adapters normalize raw records before building this: district is never
/// blank, people count is at least 1, unparseable coordinates are `None`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub id: String,
    pub reference: Option<String>,
    pub name: Option<String>,
    pub district: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub water_level: WaterLevel,
    pub number_of_people: u32,
    pub has_medical_emergency: bool,
    pub has_disabled: bool,
    pub has_elderly: bool,
    pub has_children: bool,
    pub has_food: bool,
    pub has_water: bool,
    pub has_power: bool,
    pub battery_percent: Option<u32>,
    pub safe_for_hours: Option<f64>,
    pub status: Option<String>,
    pub created_at: Option<String>,
}

impl Report {
    /// Coordinates usable for geographic work. Zero or non-finite values
    /// count as missing, since upstream encodes "no fix" as 0.
    pub fn coordinates(&self) -> Option<(f64, f64)> {
        match (self.latitude, self.longitude) {
            (Some(lat), Some(lon))
                if lat.is_finite() && lon.is_finite() && lat != 0.0 && lon != 0.0 =>
            {
                Some((lat, lon))
            }
            _ => None,
        }
    }

    /// Head count used for totals, within `1..=MAX_PEOPLE_PER_REPORT`.
    pub fn people(&self) -> u32 {
        self.number_of_people.clamp(1, MAX_PEOPLE_PER_REPORT)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredReport {
    #[serde(flatten)]
    pub report: Report,
    pub urgency_score: u32,
    pub urgency_tier: UrgencyTier,
    pub score_factors: Vec<String>,
    pub weather_risk: u32,
    pub elevation_m: Option<f64>,
    pub elevation_risk: u32,
    pub elevation_risk_level: ElevationRiskLevel,
}

/// Weather snapshot for one district. Fields beyond the ones the engine
/// reads are carried through untouched in `extra`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistrictWeather {
    pub district: String,
    #[serde(default)]
    pub forecast_precip_24h_mm: f64,
    #[serde(default = "default_alert_level")]
    pub alert_level: String,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

fn default_alert_level() -> String {
    "green".to_string()
}

/// District weather keyed by `district_key`.
#[derive(Debug, Clone, Default)]
pub struct WeatherContext {
    by_district: HashMap<String, DistrictWeather>,
}

impl WeatherContext {
    pub fn from_records(records: Vec<DistrictWeather>) -> Self {
        let by_district = records
            .into_iter()
            .map(|record| (district_key(&record.district), record))
            .collect();
        Self { by_district }
    }

    pub fn get(&self, district: &str) -> Option<&DistrictWeather> {
        self.by_district.get(&district_key(district))
    }

    pub fn len(&self) -> usize {
        self.by_district.len()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Centroid {
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vulnerabilities {
    pub medical_emergency: bool,
    pub elderly: bool,
    pub children: bool,
    pub disabled: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cluster {
    pub cluster_id: String,
    pub name: String,
    pub districts: Vec<String>,
    pub report_count: usize,
    pub total_people: u32,
    pub total_urgency: u32,
    pub avg_urgency: f64,
    pub critical_count: usize,
    pub high_count: usize,
    pub centroid: Option<Centroid>,
    pub vulnerabilities: Vulnerabilities,
    pub reports: Vec<String>,
    pub top_reports: Vec<ScoredReport>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DistrictSummary {
    pub count: usize,
    pub total_people: u32,
    pub critical: usize,
    pub high: usize,
    pub medium: usize,
    pub low: usize,
    pub avg_urgency: f64,
    pub needs_food: usize,
    pub needs_water: usize,
    pub has_medical: usize,
    pub forecast_rain_24h: f64,
    pub current_alert_level: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UrgencyBreakdown {
    pub critical: usize,
    pub high: usize,
    pub medium: usize,
    pub low: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceNeeds {
    pub needs_food: usize,
    pub needs_water: usize,
    pub medical_emergencies: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VulnerabilityCounts {
    pub with_elderly: usize,
    pub with_children: usize,
    pub with_disabled: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AffectedDistrict {
    pub district: String,
    #[serde(flatten)]
    pub stats: DistrictSummary,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlobalSummary {
    pub total_reports: usize,
    pub total_people_affected: u32,
    pub total_clusters: usize,
    pub urgency_breakdown: UrgencyBreakdown,
    pub resource_needs: ResourceNeeds,
    pub vulnerability_counts: VulnerabilityCounts,
    pub most_affected_districts: Vec<AffectedDistrict>,
    pub districts: BTreeMap<String, DistrictSummary>,
    pub analyzed_at: DateTime<Utc>,
}

/// One fully published analysis run.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisSnapshot {
    pub run_id: Uuid,
    pub analyzed_at: DateTime<Utc>,
    pub priorities: Vec<ScoredReport>,
    pub clusters: Vec<Cluster>,
    pub summary: GlobalSummary,
}

#[derive(Debug, Clone, Serialize)]
pub struct DistrictIntel {
    pub district: String,
    pub reports: Vec<ScoredReport>,
    pub clusters: Vec<Cluster>,
    pub summary: Option<DistrictSummary>,
    pub report_count: usize,
    pub total_people: u32,
}

#[derive(Debug, Clone)]
pub struct RunRecord {
    pub run_id: Uuid,
    pub analyzed_at: DateTime<Utc>,
    pub total_reports: i32,
    pub total_people: i32,
    pub total_clusters: i32,
    pub critical_count: i32,
    pub high_count: i32,
}
