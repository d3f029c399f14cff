use anyhow::Context;
use sqlx::types::Json;
use sqlx::{PgPool, Row};
use tracing::info;

use crate::models::{AnalysisSnapshot, RunRecord};

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

fn as_i32(value: usize) -> i32 {
    i32::try_from(value).unwrap_or(i32::MAX)
}

/// Store one published analysis run. Re-recording the same run is a no-op.
pub async fn record_run(pool: &PgPool, snapshot: &AnalysisSnapshot) -> anyhow::Result<bool> {
    let summary = &snapshot.summary;
    let result = sqlx::query(
        r#"
        INSERT INTO flood_intel.intel_runs
        (id, analyzed_at, total_reports, total_people, total_clusters,
         critical_count, high_count, summary)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        ON CONFLICT (id) DO NOTHING
        "#,
    )
    .bind(snapshot.run_id)
    .bind(snapshot.analyzed_at)
    .bind(as_i32(summary.total_reports))
    .bind(i32::try_from(summary.total_people_affected).unwrap_or(i32::MAX))
    .bind(as_i32(summary.total_clusters))
    .bind(as_i32(summary.urgency_breakdown.critical))
    .bind(as_i32(summary.urgency_breakdown.high))
    .bind(Json(summary))
    .execute(pool)
    .await
    .context("failed to record analysis run")?;

    let inserted = result.rows_affected() > 0;
    if inserted {
        info!(run_id = %snapshot.run_id, "recorded analysis run");
    }
    Ok(inserted)
}

pub async fn recent_runs(pool: &PgPool, limit: i64) -> anyhow::Result<Vec<RunRecord>> {
    let rows = sqlx::query(
        r#"
        SELECT id, analyzed_at, total_reports, total_people, total_clusters,
               critical_count, high_count
        FROM flood_intel.intel_runs
        ORDER BY analyzed_at DESC
        LIMIT $1
        "#,
    )
    .bind(limit.max(1))
    .fetch_all(pool)
    .await
    .context("failed to load analysis history")?;

    let mut runs = Vec::new();
    for row in rows {
        runs.push(RunRecord {
            run_id: row.get("id"),
            analyzed_at: row.get("analyzed_at"),
            total_reports: row.get("total_reports"),
            total_people: row.get("total_people"),
            total_clusters: row.get("total_clusters"),
            critical_count: row.get("critical_count"),
            high_count: row.get("high_count"),
        });
    }

    Ok(runs)
}
