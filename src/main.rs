use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

mod actions;
mod cluster;
mod config;
mod db;
mod elevation;
mod engine;
mod geo;
mod models;
mod report;
mod risk;
mod sources;
mod summary;
#[cfg(test)]
mod testkit;

use config::Settings;
use engine::IntelEngine;
use models::UrgencyTier;

#[derive(Parser)]
#[command(name = "flood-intel")]
#[command(
    about = "Flood response intelligence from SOS reports, weather and terrain",
    long_about = None
)]
struct Cli {
    #[command(flatten)]
    settings: Settings,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the run history schema
    InitDb,
    /// Run one analysis and list the most urgent reports
    Analyze {
        #[arg(long, default_value_t = 50)]
        limit: usize,
        /// Only reports from this district
        #[arg(long)]
        district: Option<String>,
        /// Only reports in this tier (critical, high, medium, low)
        #[arg(long)]
        urgency: Option<UrgencyTier>,
        #[arg(long)]
        json: bool,
        /// Store the run in Postgres
        #[arg(long)]
        record: bool,
    },
    /// Run one analysis and list rescue clusters
    Clusters {
        /// Only clusters touching this district
        #[arg(long)]
        district: Option<String>,
        #[arg(long)]
        json: bool,
    },
    /// Run one analysis and list recommended response actions
    Actions {
        #[arg(long)]
        json: bool,
    },
    /// Run one analysis and print the global summary
    Summary {
        #[arg(long)]
        json: bool,
    },
    /// Run one analysis and print intelligence for one district
    District {
        name: String,
        #[arg(long)]
        json: bool,
    },
    /// Generate a markdown intelligence brief
    Report {
        #[arg(long, default_value = "intel-brief.md")]
        out: PathBuf,
    },
    /// Re-run the analysis on a fixed interval until interrupted
    Watch {
        #[arg(long, default_value_t = 30)]
        interval_mins: u64,
        #[arg(long)]
        record: bool,
    },
    /// List recently recorded runs
    History {
        #[arg(long, default_value_t = 10)]
        limit: i64,
    },
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn watch(
    engine: &IntelEngine,
    settings: &Settings,
    interval_mins: u64,
    record: bool,
) -> anyhow::Result<()> {
    let pool = if record { Some(settings.connect_db().await?) } else { None };
    let mut ticker = tokio::time::interval(Duration::from_secs(interval_mins.max(1) * 60));
    info!(interval_mins, "scheduled intelligence analysis");

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                match engine.run_analysis().await {
                    Ok(snapshot) => {
                        let top = engine.get_priorities(1);
                        info!(
                            clusters = engine.get_clusters().len(),
                            top_report = top.first().map(|r| r.report.id.as_str()),
                            top_score = top.first().map(|r| r.urgency_score),
                            "intelligence refreshed"
                        );
                        if let Some(pool) = &pool {
                            if let Err(err) = db::record_run(pool, &snapshot).await {
                                error!(error = ?err, "failed to record run");
                            }
                        }
                    }
                    Err(err) => error!(
                        error = ?anyhow::Error::from(err),
                        "analysis failed; keeping previous results"
                    ),
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("shutting down");
                return Ok(());
            }
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("flood_intel=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let settings = cli.settings;

    if let Commands::InitDb = cli.command {
        let pool = settings.connect_db().await?;
        db::init_db(&pool).await?;
        println!("Schema ready.");
        return Ok(());
    }
    if let Commands::History { limit } = cli.command {
        let pool = settings.connect_db().await?;
        let runs = db::recent_runs(&pool, limit).await?;
        if runs.is_empty() {
            println!("No recorded runs.");
        }
        for run in runs {
            println!(
                "- {} at {}: {} reports, {} people, {} clusters ({} critical, {} high)",
                run.run_id,
                run.analyzed_at,
                run.total_reports,
                run.total_people,
                run.total_clusters,
                run.critical_count,
                run.high_count
            );
        }
        return Ok(());
    }

    let engine = settings.build_engine()?;

    if let Commands::Watch { interval_mins, record } = cli.command {
        return watch(&engine, &settings, interval_mins, record).await;
    }

    let snapshot = engine.run_analysis().await.context("intelligence analysis failed")?;

    match cli.command {
        Commands::Analyze {
            limit,
            district,
            urgency,
            json,
            record,
        } => {
            if record {
                let pool = settings.connect_db().await?;
                db::record_run(&pool, &snapshot).await?;
            }
            let priorities = engine.get_priorities_filtered(limit, district.as_deref(), urgency);
            if json {
                print_json(&priorities)?;
            } else if priorities.is_empty() {
                println!("No SOS reports to rank.");
            } else {
                println!("Most urgent reports:");
                for scored in priorities.iter() {
                    println!(
                        "- {} ({}) score {} {} [{}]",
                        scored.report.id,
                        scored.report.district,
                        scored.urgency_score,
                        scored.urgency_tier.as_str(),
                        scored.score_factors.join(", ")
                    );
                }
            }
        }
        Commands::Clusters { district, json } => {
            let clusters = engine.get_clusters_in(district.as_deref());
            if json {
                print_json(&clusters)?;
            } else {
                println!("{} clusters:", clusters.len());
                for cluster in clusters.iter() {
                    println!(
                        "- {} ({}): {} reports, {} people, urgency {} (avg {:.1})",
                        cluster.name,
                        cluster.cluster_id,
                        cluster.report_count,
                        cluster.total_people,
                        cluster.total_urgency,
                        cluster.avg_urgency
                    );
                }
            }
        }
        Commands::Summary { json } => {
            let summary = engine.get_summary().context("no analysis published")?;
            if json {
                print_json(&summary)?;
            } else {
                if let Some(at) = engine.last_analysis() {
                    println!("Analysis completed {}", at.format("%Y-%m-%d %H:%M:%S UTC"));
                }
                println!(
                    "{} reports, {} people, {} clusters; {} critical, {} high",
                    summary.total_reports,
                    summary.total_people_affected,
                    summary.total_clusters,
                    summary.urgency_breakdown.critical,
                    summary.urgency_breakdown.high
                );
                for entry in summary.most_affected_districts.iter() {
                    println!(
                        "- {}: {} reports, {} critical, {} high",
                        entry.district, entry.stats.count, entry.stats.critical, entry.stats.high
                    );
                }
            }
        }
        Commands::District { name, json } => {
            let intel = engine.get_district_intel(&name);
            if json {
                print_json(&intel)?;
            } else {
                println!(
                    "{}: {} reports, {} people, {} clusters",
                    intel.district,
                    intel.report_count,
                    intel.total_people,
                    intel.clusters.len()
                );
                if let Some(stats) = &intel.summary {
                    println!(
                        "avg urgency {:.1}, forecast {:.0}mm, alert {}",
                        stats.avg_urgency, stats.forecast_rain_24h, stats.current_alert_level
                    );
                }
                for scored in intel.reports.iter().take(10) {
                    println!(
                        "- {} score {} {} (terrain {})",
                        scored.report.id,
                        scored.urgency_score,
                        scored.urgency_tier.as_str(),
                        scored.elevation_risk_level.as_str()
                    );
                }
            }
        }
        Commands::Actions { json } => {
            let plan = engine.get_recommended_actions().context("no analysis published")?;
            if json {
                print_json(&plan)?;
            } else if plan.actions.is_empty() {
                println!("No actions recommended.");
            } else {
                for action in plan.actions.iter() {
                    println!(
                        "{}. {}: {} ({} targets)",
                        action.priority,
                        action.action.as_str(),
                        action.description,
                        action.targets.len()
                    );
                }
            }
        }
        Commands::Report { out } => {
            let brief = report::build_report(&snapshot);
            std::fs::write(&out, brief)
                .with_context(|| format!("failed to write {}", out.display()))?;
            println!("Report written to {}.", out.display());
        }
        Commands::InitDb | Commands::History { .. } | Commands::Watch { .. } => {}
    }

    Ok(())
}
