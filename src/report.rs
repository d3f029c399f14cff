use std::fmt::Write;

use crate::actions::recommend_actions;
use crate::models::AnalysisSnapshot;

const TOP_CLUSTERS: usize = 10;
const TOP_PRIORITIES: usize = 10;

pub fn build_report(snapshot: &AnalysisSnapshot) -> String {
    let summary = &snapshot.summary;
    let mut output = String::new();

    let _ = writeln!(output, "# Flood Response Intelligence Brief");
    let _ = writeln!(
        output,
        "Analysis {} completed {}",
        snapshot.run_id,
        snapshot.analyzed_at.format("%Y-%m-%d %H:%M UTC")
    );
    let _ = writeln!(output);
    let _ = writeln!(output, "## Overview");
    let _ = writeln!(output, "- Reports: {}", summary.total_reports);
    let _ = writeln!(output, "- People affected: {}", summary.total_people_affected);
    let _ = writeln!(output, "- Rescue clusters: {}", summary.total_clusters);

    let breakdown = &summary.urgency_breakdown;
    let _ = writeln!(output);
    let _ = writeln!(output, "## Urgency");
    let _ = writeln!(
        output,
        "- CRITICAL {} / HIGH {} / MEDIUM {} / LOW {}",
        breakdown.critical, breakdown.high, breakdown.medium, breakdown.low
    );

    let needs = &summary.resource_needs;
    let vulnerable = &summary.vulnerability_counts;
    let _ = writeln!(output);
    let _ = writeln!(output, "## Needs");
    let _ = writeln!(output, "- Without food: {}", needs.needs_food);
    let _ = writeln!(output, "- Without water: {}", needs.needs_water);
    let _ = writeln!(output, "- Medical emergencies: {}", needs.medical_emergencies);
    let _ = writeln!(
        output,
        "- Households with elderly {}, children {}, disabled {}",
        vulnerable.with_elderly, vulnerable.with_children, vulnerable.with_disabled
    );

    let plan = recommend_actions(snapshot);
    let _ = writeln!(output);
    let _ = writeln!(output, "## Recommended Actions");
    if plan.actions.is_empty() {
        let _ = writeln!(output, "No actions recommended.");
    } else {
        for action in plan.actions.iter() {
            let _ = writeln!(
                output,
                "{}. **{}**: {}",
                action.priority,
                action.action.as_str(),
                action.description
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Most Affected Districts");
    if summary.most_affected_districts.is_empty() {
        let _ = writeln!(output, "No districts reporting.");
    } else {
        for entry in summary.most_affected_districts.iter() {
            let stats = &entry.stats;
            let _ = writeln!(
                output,
                "- {}: {} reports ({} critical, {} high), {} people, avg urgency {:.1}, \
                 forecast {:.0}mm, alert {}",
                entry.district,
                stats.count,
                stats.critical,
                stats.high,
                stats.total_people,
                stats.avg_urgency,
                stats.forecast_rain_24h,
                stats.current_alert_level
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Rescue Clusters");
    if snapshot.clusters.is_empty() {
        let _ = writeln!(output, "No clusters.");
    } else {
        for cluster in snapshot.clusters.iter().take(TOP_CLUSTERS) {
            let location = match cluster.centroid {
                Some(c) => format!("{:.4}, {:.4}", c.latitude, c.longitude),
                None => "no GPS".to_string(),
            };
            let _ = writeln!(
                output,
                "- {} [{}]: {} reports, {} people, total urgency {}, {} critical",
                cluster.name,
                location,
                cluster.report_count,
                cluster.total_people,
                cluster.total_urgency,
                cluster.critical_count
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Top Priorities");
    if snapshot.priorities.is_empty() {
        let _ = writeln!(output, "No open SOS reports.");
    } else {
        for scored in snapshot.priorities.iter().take(TOP_PRIORITIES) {
            let _ = writeln!(
                output,
                "- {} ({}) score {} {}: {}",
                scored.report.id,
                scored.report.district,
                scored.urgency_score,
                scored.urgency_tier.as_str(),
                scored.score_factors.join(", ")
            );
        }
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::build_clusters;
    use crate::models::WeatherContext;
    use crate::summary::summarize;
    use crate::testkit::scored;
    use chrono::Utc;
    use uuid::Uuid;

    fn snapshot(priorities: Vec<crate::models::ScoredReport>) -> AnalysisSnapshot {
        let clusters = build_clusters(&priorities);
        let analyzed_at = Utc::now();
        let summary = summarize(&priorities, &clusters, &WeatherContext::default(), analyzed_at);
        AnalysisSnapshot {
            run_id: Uuid::new_v4(),
            analyzed_at,
            priorities,
            clusters,
            summary,
        }
    }

    #[test]
    fn empty_snapshot_renders_placeholders() {
        let report = build_report(&snapshot(Vec::new()));
        assert!(report.starts_with("# Flood Response Intelligence Brief"));
        assert!(report.contains("- Reports: 0"));
        assert!(report.contains("No districts reporting."));
        assert!(report.contains("No clusters."));
        assert!(report.contains("No open SOS reports."));
        assert!(report.contains("No actions recommended."));
    }

    #[test]
    fn renders_districts_clusters_and_priorities() {
        let mut top = scored("sos-9", "Ratnapura", 88, Some((6.68, 80.40)));
        top.score_factors = vec!["water_level:ROOF=40".to_string(), "people=4".to_string()];
        let report = build_report(&snapshot(vec![top, scored("sos-2", "Kegalle", 20, None)]));

        assert!(report.contains("- Reports: 2"));
        assert!(report.contains("- CRITICAL 1 / HIGH 0 / MEDIUM 0 / LOW 1"));
        assert!(report.contains(
            "1. **IMMEDIATE_RESCUE**: Deploy rescue teams to 1 CRITICAL cases immediately"
        ));
        assert!(report.contains("4. **CLUSTER_RESCUE**"));
        assert!(report.contains("- Ratnapura: 1 reports (1 critical, 0 high)"));
        assert!(report.contains("alert green"));
        assert!(report.contains("Cluster near Ratnapura [6.6800, 80.4000]"));
        assert!(report.contains("Kegalle (no GPS) [no GPS]"));
        assert!(report
            .contains("- sos-9 (Ratnapura) score 88 CRITICAL: water_level:ROOF=40, people=4"));
    }
}
