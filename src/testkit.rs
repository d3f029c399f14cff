//! Builders shared by unit tests.

use crate::elevation::ElevationRiskLevel;
use crate::models::{Report, ScoredReport, UrgencyTier, WaterLevel};

/// A calm report: one person, supplies and power on hand, no GPS fix.
pub fn report(id: &str, district: &str) -> Report {
    Report {
        id: id.to_string(),
        reference: None,
        name: None,
        district: district.to_string(),
        latitude: None,
        longitude: None,
        water_level: WaterLevel::Unknown,
        number_of_people: 1,
        has_medical_emergency: false,
        has_disabled: false,
        has_elderly: false,
        has_children: false,
        has_food: true,
        has_water: true,
        has_power: true,
        battery_percent: None,
        safe_for_hours: None,
        status: None,
        created_at: None,
    }
}

/// A pre-scored report, bypassing the scoring function.
pub fn scored(id: &str, district: &str, score: u32, coords: Option<(f64, f64)>) -> ScoredReport {
    let mut base = report(id, district);
    if let Some((lat, lon)) = coords {
        base.latitude = Some(lat);
        base.longitude = Some(lon);
    }
    ScoredReport {
        report: base,
        urgency_score: score,
        urgency_tier: UrgencyTier::from_score(score),
        score_factors: Vec::new(),
        weather_risk: 0,
        elevation_m: None,
        elevation_risk: 0,
        elevation_risk_level: ElevationRiskLevel::Unknown,
    }
}
