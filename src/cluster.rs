//! Groups ranked reports into rescue-routing clusters.
//!
//! Reports with a GPS fix are clustered greedily around seeds in ranking
//! order: each unassigned report seeds a cluster and absorbs every other
//! unassigned report within `CLUSTER_RADIUS_KM` of the seed itself. Radius
//! is measured from the seed only; absorbed members never extend the
//! cluster. Reports without a fix are grouped by district.

use std::collections::HashMap;

use crate::geo::haversine_km;
use crate::models::{
    district_key, normalize_district, Centroid, Cluster, ScoredReport, UrgencyTier, Vulnerabilities,
};

pub const CLUSTER_RADIUS_KM: f64 = 2.0;
pub const PREVIEW_SIZE: usize = 5;

pub fn build_clusters(reports: &[ScoredReport]) -> Vec<Cluster> {
    let (located, unlocated): (Vec<&ScoredReport>, Vec<&ScoredReport>) =
        reports.iter().partition(|r| r.report.coordinates().is_some());

    let mut clusters = if located.is_empty() {
        cluster_by_district(&unlocated, "")
    } else {
        let mut clusters = cluster_by_distance(&located);
        clusters.extend(cluster_by_district(&unlocated, " (no GPS)"));
        clusters
    };

    clusters.sort_by(|a, b| b.total_urgency.cmp(&a.total_urgency));
    clusters
}

fn cluster_by_distance(reports: &[&ScoredReport]) -> Vec<Cluster> {
    let mut assigned = vec![false; reports.len()];
    let mut clusters = Vec::new();

    for (i, seed) in reports.iter().enumerate() {
        if assigned[i] {
            continue;
        }
        assigned[i] = true;
        let Some((seed_lat, seed_lon)) = seed.report.coordinates() else {
            continue;
        };

        let mut members = vec![*seed];
        for (j, other) in reports.iter().enumerate() {
            if assigned[j] {
                continue;
            }
            let Some((lat, lon)) = other.report.coordinates() else {
                continue;
            };
            if haversine_km(seed_lat, seed_lon, lat, lon) <= CLUSTER_RADIUS_KM {
                members.push(*other);
                assigned[j] = true;
            }
        }

        let districts = member_districts(&members);
        let name = format!("Cluster near {}", districts[0]);
        let id = format!("cluster_{}", seed.report.id);
        clusters.push(build_cluster(id, name, districts, &members));
    }

    clusters
}

/// One cluster per distinct district, in order of first appearance.
fn cluster_by_district(reports: &[&ScoredReport], suffix: &str) -> Vec<Cluster> {
    let mut order: Vec<String> = Vec::new();
    let mut groups: HashMap<String, (String, Vec<&ScoredReport>)> = HashMap::new();

    for report in reports {
        let display = normalize_district(Some(&report.report.district));
        let key = district_key(&display);
        groups
            .entry(key.clone())
            .or_insert_with(|| {
                order.push(key);
                (display, Vec::new())
            })
            .1
            .push(*report);
    }

    order
        .into_iter()
        .filter_map(|key| groups.remove(&key).map(|group| (key, group)))
        .map(|(key, (display, members))| {
            let tag = suffix.replace([' ', '(', ')'], "");
            let id = format!("district_{}{tag}", key.replace(' ', "_"));
            let name = format!("{display}{suffix}");
            build_cluster(id, name, vec![display], &members)
        })
        .collect()
}

/// Distinct member districts, case-insensitively, in member order.
fn member_districts(members: &[&ScoredReport]) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    members
        .iter()
        .filter(|m| seen.insert(district_key(&m.report.district)))
        .map(|m| m.report.district.clone())
        .collect()
}

fn build_cluster(
    cluster_id: String,
    name: String,
    districts: Vec<String>,
    members: &[&ScoredReport],
) -> Cluster {
    let total_people = members
        .iter()
        .map(|m| m.report.people())
        .fold(0, u32::saturating_add);
    let total_urgency: u32 = members.iter().map(|m| m.urgency_score).sum();
    let avg_urgency = if members.is_empty() {
        0.0
    } else {
        round_tenth(total_urgency as f64 / members.len() as f64)
    };

    let coords: Vec<(f64, f64)> = members.iter().filter_map(|m| m.report.coordinates()).collect();
    let centroid = (!coords.is_empty()).then(|| {
        let n = coords.len() as f64;
        Centroid {
            latitude: coords.iter().map(|c| c.0).sum::<f64>() / n,
            longitude: coords.iter().map(|c| c.1).sum::<f64>() / n,
        }
    });

    let vulnerabilities = members.iter().fold(Vulnerabilities::default(), |acc, m| Vulnerabilities {
        medical_emergency: acc.medical_emergency || m.report.has_medical_emergency,
        elderly: acc.elderly || m.report.has_elderly,
        children: acc.children || m.report.has_children,
        disabled: acc.disabled || m.report.has_disabled,
    });

    Cluster {
        cluster_id,
        name,
        districts,
        report_count: members.len(),
        total_people,
        total_urgency,
        avg_urgency,
        critical_count: members.iter().filter(|m| m.urgency_tier == UrgencyTier::Critical).count(),
        high_count: members.iter().filter(|m| m.urgency_tier == UrgencyTier::High).count(),
        centroid,
        vulnerabilities,
        reports: members.iter().map(|m| m.report.id.clone()).collect(),
        top_reports: members.iter().take(PREVIEW_SIZE).map(|m| (*m).clone()).collect(),
    }
}

pub(crate) fn round_tenth(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}
