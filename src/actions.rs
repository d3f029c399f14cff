//! Recommended response actions derived from a published snapshot.
//!
//! Each action kind is emitted at most once and only when it has
//! something to target. Actions come out in fixed priority order.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::models::{AnalysisSnapshot, Centroid, ScoredReport, UrgencyTier, WaterLevel};

/// Only the top of the ranking is scanned for rescue and medical targets.
pub const PRIORITY_SCAN_LIMIT: usize = 100;
pub const CLUSTER_RESCUE_MIN_AVG_URGENCY: f64 = 50.0;
pub const WEATHER_ALERT_RAIN_MM: f64 = 50.0;

const REPORT_TARGETS: usize = 10;
const SUPPLY_TARGETS: usize = 5;
const CLUSTER_TARGETS: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionKind {
    ImmediateRescue,
    MedicalResponse,
    SupplyDistribution,
    ClusterRescue,
    WeatherAlert,
}

impl ActionKind {
    pub fn priority(&self) -> u8 {
        match self {
            ActionKind::ImmediateRescue => 1,
            ActionKind::MedicalResponse => 2,
            ActionKind::SupplyDistribution => 3,
            ActionKind::ClusterRescue => 4,
            ActionKind::WeatherAlert => 5,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::ImmediateRescue => "IMMEDIATE_RESCUE",
            ActionKind::MedicalResponse => "MEDICAL_RESPONSE",
            ActionKind::SupplyDistribution => "SUPPLY_DISTRIBUTION",
            ActionKind::ClusterRescue => "CLUSTER_RESCUE",
            ActionKind::WeatherAlert => "WEATHER_ALERT",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ActionTarget {
    Report {
        id: String,
        district: String,
        people: u32,
        water_level: WaterLevel,
    },
    Supplies {
        district: String,
        needs_water: usize,
        needs_food: usize,
        total_people: u32,
    },
    Cluster {
        cluster_id: String,
        name: String,
        report_count: usize,
        total_people: u32,
        centroid: Option<Centroid>,
        critical_count: usize,
    },
    Weather {
        district: String,
        forecast_rain_24h: f64,
        current_cases: usize,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecommendedAction {
    pub priority: u8,
    pub action: ActionKind,
    pub description: String,
    pub targets: Vec<ActionTarget>,
}

impl RecommendedAction {
    fn new(action: ActionKind, description: String, targets: Vec<ActionTarget>) -> Self {
        Self {
            priority: action.priority(),
            action,
            description,
            targets,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActionPlan {
    pub generated_at: DateTime<Utc>,
    pub total_actions: usize,
    pub actions: Vec<RecommendedAction>,
}

pub fn recommend_actions(snapshot: &AnalysisSnapshot) -> ActionPlan {
    let summary = &snapshot.summary;
    let scanned = &snapshot.priorities[..snapshot.priorities.len().min(PRIORITY_SCAN_LIMIT)];
    let mut actions = Vec::new();

    let report_target = |scored: &&ScoredReport| ActionTarget::Report {
        id: scored.report.id.clone(),
        district: scored.report.district.clone(),
        people: scored.report.people(),
        water_level: scored.report.water_level,
    };

    let critical: Vec<_> = scanned
        .iter()
        .filter(|s| s.urgency_tier == UrgencyTier::Critical)
        .collect();
    if !critical.is_empty() {
        actions.push(RecommendedAction::new(
            ActionKind::ImmediateRescue,
            format!(
                "Deploy rescue teams to {} CRITICAL cases immediately",
                critical.len()
            ),
            critical.iter().take(REPORT_TARGETS).map(report_target).collect(),
        ));
    }

    let medical: Vec<_> = scanned
        .iter()
        .filter(|s| s.report.has_medical_emergency)
        .collect();
    if !medical.is_empty() {
        actions.push(RecommendedAction::new(
            ActionKind::MedicalResponse,
            format!(
                "Dispatch medical teams to {} cases with medical emergencies",
                medical.len()
            ),
            medical.iter().take(REPORT_TARGETS).map(report_target).collect(),
        ));
    }

    let needs = &summary.resource_needs;
    if needs.needs_water > 0 || needs.needs_food > 0 {
        let mut districts: Vec<_> = summary.most_affected_districts.iter().collect();
        districts.sort_by_key(|d| std::cmp::Reverse(d.stats.needs_water + d.stats.needs_food));
        actions.push(RecommendedAction::new(
            ActionKind::SupplyDistribution,
            format!(
                "Distribute supplies: {} need water, {} need food",
                needs.needs_water, needs.needs_food
            ),
            districts
                .into_iter()
                .take(SUPPLY_TARGETS)
                .map(|d| ActionTarget::Supplies {
                    district: d.district.clone(),
                    needs_water: d.stats.needs_water,
                    needs_food: d.stats.needs_food,
                    total_people: d.stats.total_people,
                })
                .collect(),
        ));
    }

    let urgent_clusters: Vec<_> = snapshot
        .clusters
        .iter()
        .filter(|c| c.avg_urgency >= CLUSTER_RESCUE_MIN_AVG_URGENCY)
        .collect();
    if !urgent_clusters.is_empty() {
        actions.push(RecommendedAction::new(
            ActionKind::ClusterRescue,
            format!(
                "Coordinate rescue operations for {} high-urgency clusters",
                urgent_clusters.len()
            ),
            urgent_clusters
                .into_iter()
                .take(CLUSTER_TARGETS)
                .map(|c| ActionTarget::Cluster {
                    cluster_id: c.cluster_id.clone(),
                    name: c.name.clone(),
                    report_count: c.report_count,
                    total_people: c.total_people,
                    centroid: c.centroid,
                    critical_count: c.critical_count,
                })
                .collect(),
        ));
    }

    let escalating: Vec<ActionTarget> = summary
        .most_affected_districts
        .iter()
        .filter(|d| d.stats.forecast_rain_24h > WEATHER_ALERT_RAIN_MM)
        .map(|d| ActionTarget::Weather {
            district: d.district.clone(),
            forecast_rain_24h: d.stats.forecast_rain_24h,
            current_cases: d.stats.count,
        })
        .collect();
    if !escalating.is_empty() {
        actions.push(RecommendedAction::new(
            ActionKind::WeatherAlert,
            format!(
                "Issue warnings for {} districts expecting >{:.0}mm rain in 24hrs",
                escalating.len(),
                WEATHER_ALERT_RAIN_MM
            ),
            escalating,
        ));
    }

    ActionPlan {
        generated_at: summary.analyzed_at,
        total_actions: actions.len(),
        actions,
    }
}
