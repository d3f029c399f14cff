use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};

use crate::cluster::round_tenth;
use crate::models::{
    district_key, normalize_district, AffectedDistrict, Cluster, DistrictSummary, GlobalSummary,
    ResourceNeeds, ScoredReport, UrgencyBreakdown, UrgencyTier, VulnerabilityCounts,
    WeatherContext,
};

pub const MOST_AFFECTED_LIMIT: usize = 10;

/// Roll scored reports up into per-district and global counts.
///
/// Districts are grouped case-insensitively and displayed under the first
/// spelling seen. `analyzed_at` is stamped onto the summary as given.
pub fn summarize(
    reports: &[ScoredReport],
    clusters: &[Cluster],
    weather: &WeatherContext,
    analyzed_at: DateTime<Utc>,
) -> GlobalSummary {
    let mut order: Vec<(String, String)> = Vec::new();
    let mut stats: HashMap<String, (DistrictSummary, u32)> = HashMap::new();

    for scored in reports {
        let report = &scored.report;
        let display = normalize_district(Some(&report.district));
        let key = district_key(&display);
        let (entry, urgency_sum) = stats.entry(key.clone()).or_insert_with(|| {
            order.push((key, display));
            (DistrictSummary::default(), 0)
        });

        entry.count += 1;
        entry.total_people = entry.total_people.saturating_add(report.people());
        match scored.urgency_tier {
            UrgencyTier::Critical => entry.critical += 1,
            UrgencyTier::High => entry.high += 1,
            UrgencyTier::Medium => entry.medium += 1,
            UrgencyTier::Low => entry.low += 1,
        }
        if !report.has_food {
            entry.needs_food += 1;
        }
        if !report.has_water {
            entry.needs_water += 1;
        }
        if report.has_medical_emergency {
            entry.has_medical += 1;
        }
        *urgency_sum += scored.urgency_score;
    }

    let mut ranked: Vec<(String, DistrictSummary)> = order
        .into_iter()
        .filter_map(|(key, display)| stats.remove(&key).map(|s| (display, s)))
        .map(|(display, (mut district, urgency_sum))| {
            if district.count > 0 {
                district.avg_urgency = round_tenth(urgency_sum as f64 / district.count as f64);
            }
            match weather.get(&display) {
                Some(w) => {
                    district.forecast_rain_24h = w.forecast_precip_24h_mm;
                    district.current_alert_level = w.alert_level.clone();
                }
                None => {
                    district.forecast_rain_24h = 0.0;
                    district.current_alert_level = "green".to_string();
                }
            }
            (display, district)
        })
        .collect();

    let districts: BTreeMap<String, DistrictSummary> = ranked.iter().cloned().collect();

    ranked.sort_by(|(_, a), (_, b)| {
        (b.critical + b.high, b.count).cmp(&(a.critical + a.high, a.count))
    });
    let most_affected_districts = ranked
        .into_iter()
        .take(MOST_AFFECTED_LIMIT)
        .map(|(district, stats)| AffectedDistrict { district, stats })
        .collect();

    let mut urgency_breakdown = UrgencyBreakdown::default();
    let mut resource_needs = ResourceNeeds::default();
    let mut vulnerability_counts = VulnerabilityCounts::default();
    for scored in reports {
        match scored.urgency_tier {
            UrgencyTier::Critical => urgency_breakdown.critical += 1,
            UrgencyTier::High => urgency_breakdown.high += 1,
            UrgencyTier::Medium => urgency_breakdown.medium += 1,
            UrgencyTier::Low => urgency_breakdown.low += 1,
        }
        let report = &scored.report;
        resource_needs.needs_food += usize::from(!report.has_food);
        resource_needs.needs_water += usize::from(!report.has_water);
        resource_needs.medical_emergencies += usize::from(report.has_medical_emergency);
        vulnerability_counts.with_elderly += usize::from(report.has_elderly);
        vulnerability_counts.with_children += usize::from(report.has_children);
        vulnerability_counts.with_disabled += usize::from(report.has_disabled);
    }

    GlobalSummary {
        total_reports: reports.len(),
        total_people_affected: reports
            .iter()
            .map(|r| r.report.people())
            .fold(0, u32::saturating_add),
        total_clusters: clusters.len(),
        urgency_breakdown,
        resource_needs,
        vulnerability_counts,
        most_affected_districts,
        districts,
        analyzed_at,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DistrictWeather;
    use crate::testkit::scored;
    use pretty_assertions::assert_eq;

    fn weather() -> WeatherContext {
        WeatherContext::from_records(vec![DistrictWeather {
            district: "colombo".to_string(),
            forecast_precip_24h_mm: 88.5,
            alert_level: "orange".to_string(),
            extra: serde_json::Map::new(),
        }])
    }

    #[test]
    fn empty_input_produces_zero_counts() {
        let now = Utc::now();
        let summary = summarize(&[], &[], &WeatherContext::default(), now);
        assert_eq!(summary.total_reports, 0);
        assert_eq!(summary.total_people_affected, 0);
        assert_eq!(summary.total_clusters, 0);
        assert_eq!(summary.urgency_breakdown, UrgencyBreakdown::default());
        assert!(summary.districts.is_empty());
        assert!(summary.most_affected_districts.is_empty());
        assert_eq!(summary.analyzed_at, now);
    }

    #[test]
    fn district_stats_and_weather_join() {
        let mut a = scored("a", "Colombo", 80, None);
        a.report.number_of_people = 3;
        a.report.has_food = false;
        let mut b = scored("b", "COLOMBO", 45, None);
        b.report.has_water = false;
        b.report.has_medical_emergency = true;
        let c = scored("c", "Gampaha", 20, None);

        let summary = summarize(&[a, b, c], &[], &weather(), Utc::now());
        let colombo = &summary.districts["Colombo"];
        assert_eq!(colombo.count, 2);
        assert_eq!(colombo.total_people, 4);
        assert_eq!(colombo.critical, 1);
        assert_eq!(colombo.medium, 1);
        assert_eq!(colombo.avg_urgency, 62.5);
        assert_eq!(colombo.needs_food, 1);
        assert_eq!(colombo.needs_water, 1);
        assert_eq!(colombo.has_medical, 1);
        assert_eq!(colombo.forecast_rain_24h, 88.5);
        assert_eq!(colombo.current_alert_level, "orange");

        let gampaha = &summary.districts["Gampaha"];
        assert_eq!(gampaha.forecast_rain_24h, 0.0);
        assert_eq!(gampaha.current_alert_level, "green");
        assert_eq!(gampaha.low, 1);
    }

    #[test]
    fn global_counts_cover_all_reports() {
        let mut a = scored("a", "Galle", 90, None);
        a.report.has_elderly = true;
        a.report.has_children = true;
        let mut b = scored("b", "Matara", 55, None);
        b.report.has_disabled = true;
        b.report.number_of_people = 6;
        let c = scored("c", "", 10, None);

        let summary = summarize(&[a, b, c], &[], &WeatherContext::default(), Utc::now());
        assert_eq!(summary.total_reports, 3);
        assert_eq!(summary.total_people_affected, 8);
        assert_eq!(
            summary.urgency_breakdown,
            UrgencyBreakdown {
                critical: 1,
                high: 1,
                medium: 0,
                low: 1
            }
        );
        assert_eq!(summary.vulnerability_counts.with_elderly, 1);
        assert_eq!(summary.vulnerability_counts.with_children, 1);
        assert_eq!(summary.vulnerability_counts.with_disabled, 1);
        assert_eq!(summary.districts["Unknown"].count, 1);

        let district_people: u32 = summary.districts.values().map(|d| d.total_people).sum();
        assert_eq!(district_people, summary.total_people_affected);
    }

    #[test]
    fn most_affected_ranks_by_severe_then_total() {
        let reports = vec![
            scored("a1", "Kegalle", 20, None),
            scored("a2", "Kegalle", 20, None),
            scored("a3", "Kegalle", 20, None),
            scored("b1", "Ratnapura", 75, None),
            scored("c1", "Kalutara", 60, None),
            scored("c2", "Kalutara", 20, None),
        ];
        let summary = summarize(&reports, &[], &WeatherContext::default(), Utc::now());
        let ranked: Vec<&str> = summary
            .most_affected_districts
            .iter()
            .map(|d| d.district.as_str())
            .collect();
        assert_eq!(ranked, vec!["Kalutara", "Ratnapura", "Kegalle"]);
        assert_eq!(summary.most_affected_districts[0].stats.count, 2);
    }

    #[test]
    fn most_affected_is_capped() {
        let reports: Vec<ScoredReport> = (0..14)
            .map(|i| scored(&format!("r{i}"), &format!("District {i}"), 50, None))
            .collect();
        let summary = summarize(&reports, &[], &WeatherContext::default(), Utc::now());
        assert_eq!(summary.most_affected_districts.len(), MOST_AFFECTED_LIMIT);
        assert_eq!(summary.districts.len(), 14);
    }
}
