//! Analysis orchestrator.
//!
//! `IntelEngine` pulls reports and weather, runs score -> cluster ->
//! summarize, and publishes the result as one immutable snapshot. Readers
//! always see either the previous snapshot or the new one, never a mix.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use thiserror::Error;
use tracing::{debug, info, info_span, Instrument};
use uuid::Uuid;

use crate::actions::{recommend_actions, ActionPlan};
use crate::cluster::build_clusters;
use crate::elevation::{resolve_elevations, ElevationBatching, ElevationSource};
use crate::models::{
    district_key, AnalysisSnapshot, Cluster, DistrictIntel, GlobalSummary, ScoredReport,
    UrgencyTier, WeatherContext,
};
use crate::risk::score_reports;
use crate::sources::{ReportSource, SourceError, WeatherSource};
use crate::summary::summarize;

#[derive(Debug, Error)]
pub enum IntelError {
    #[error("failed to fetch SOS reports")]
    ReportFetch(#[source] SourceError),
    #[error("failed to fetch weather snapshot")]
    WeatherFetch(#[source] SourceError),
}

pub struct IntelEngine {
    reports: Arc<dyn ReportSource>,
    weather: Arc<dyn WeatherSource>,
    elevation: Arc<dyn ElevationSource>,
    batching: ElevationBatching,
    run_lock: tokio::sync::Mutex<()>,
    snapshot: RwLock<Option<Arc<AnalysisSnapshot>>>,
}

impl IntelEngine {
    pub fn new(
        reports: Arc<dyn ReportSource>,
        weather: Arc<dyn WeatherSource>,
        elevation: Arc<dyn ElevationSource>,
    ) -> Self {
        Self {
            reports,
            weather,
            elevation,
            batching: ElevationBatching::default(),
            run_lock: tokio::sync::Mutex::new(()),
            snapshot: RwLock::new(None),
        }
    }

    pub fn with_batching(mut self, batching: ElevationBatching) -> Self {
        self.batching = batching;
        self
    }

    /// Run the full pipeline and publish its result.
    ///
    /// Concurrent calls are serialized. If either fetch fails, or the future
    /// is dropped before completion, the previously published snapshot stays.
    pub async fn run_analysis(&self) -> Result<Arc<AnalysisSnapshot>, IntelError> {
        let _guard = self.run_lock.lock().await;
        let run_id = Uuid::new_v4();

        async {
            info!("running intelligence analysis");

            let (reports, weather) =
                tokio::join!(self.reports.fetch_reports(), self.weather.fetch_weather());
            let reports = reports.map_err(IntelError::ReportFetch)?;
            let weather = WeatherContext::from_records(weather.map_err(IntelError::WeatherFetch)?);
            debug!(reports = reports.len(), weather_districts = weather.len(), "inputs fetched");

            let elevations =
                resolve_elevations(Arc::clone(&self.elevation), &reports, self.batching).await;

            let priorities = score_reports(&reports, &weather, &elevations);
            let clusters = build_clusters(&priorities);
            let analyzed_at = Utc::now();
            let summary = summarize(&priorities, &clusters, &weather, analyzed_at);

            let snapshot = Arc::new(AnalysisSnapshot {
                run_id,
                analyzed_at,
                priorities,
                clusters,
                summary,
            });
            *self.snapshot.write() = Some(Arc::clone(&snapshot));

            info!(
                reports = snapshot.priorities.len(),
                clusters = snapshot.clusters.len(),
                districts = snapshot.summary.districts.len(),
                critical = snapshot.summary.urgency_breakdown.critical,
                "analysis complete"
            );
            Ok::<_, IntelError>(snapshot)
        }
        .instrument(info_span!("analysis", %run_id))
        .await
    }

    /// Latest published snapshot, if any run has completed.
    pub fn snapshot(&self) -> Option<Arc<AnalysisSnapshot>> {
        self.snapshot.read().clone()
    }

    pub fn last_analysis(&self) -> Option<DateTime<Utc>> {
        self.snapshot().map(|s| s.analyzed_at)
    }

    pub fn get_priorities(&self, limit: usize) -> Vec<ScoredReport> {
        self.get_priorities_filtered(limit, None, None)
    }

    /// Ranked reports narrowed to a district and/or tier, then limited.
    pub fn get_priorities_filtered(
        &self,
        limit: usize,
        district: Option<&str>,
        tier: Option<UrgencyTier>,
    ) -> Vec<ScoredReport> {
        let key = district.map(district_key);
        self.snapshot()
            .map(|s| {
                s.priorities
                    .iter()
                    .filter(|r| {
                        key.as_ref()
                            .map_or(true, |k| district_key(&r.report.district) == *k)
                    })
                    .filter(|r| tier.map_or(true, |t| r.urgency_tier == t))
                    .take(limit)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn get_clusters(&self) -> Vec<Cluster> {
        self.get_clusters_in(None)
    }

    /// Clusters touching `district`, or all of them.
    pub fn get_clusters_in(&self, district: Option<&str>) -> Vec<Cluster> {
        let key = district.map(district_key);
        self.snapshot()
            .map(|s| {
                s.clusters
                    .iter()
                    .filter(|c| {
                        key.as_ref()
                            .map_or(true, |k| c.districts.iter().any(|d| district_key(d) == *k))
                    })
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn get_recommended_actions(&self) -> Option<ActionPlan> {
        self.snapshot().map(|s| recommend_actions(&s))
    }

    pub fn get_summary(&self) -> Option<GlobalSummary> {
        self.snapshot().map(|s| s.summary.clone())
    }

    pub fn get_district_intel(&self, district: &str) -> DistrictIntel {
        let key = district_key(district);
        let Some(snapshot) = self.snapshot() else {
            return DistrictIntel {
                district: district.to_string(),
                reports: Vec::new(),
                clusters: Vec::new(),
                summary: None,
                report_count: 0,
                total_people: 0,
            };
        };

        let reports: Vec<ScoredReport> = snapshot
            .priorities
            .iter()
            .filter(|r| district_key(&r.report.district) == key)
            .cloned()
            .collect();
        let clusters = snapshot
            .clusters
            .iter()
            .filter(|c| c.districts.iter().any(|d| district_key(d) == key))
            .cloned()
            .collect();
        let summary = snapshot
            .summary
            .districts
            .iter()
            .find(|(name, _)| district_key(name) == key)
            .map(|(_, stats)| stats.clone());

        DistrictIntel {
            district: district.to_string(),
            report_count: reports.len(),
            total_people: reports
                .iter()
                .map(|r| r.report.people())
                .fold(0, u32::saturating_add),
            reports,
            clusters,
            summary,
        }
    }
}
