use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Args;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::info;

use crate::elevation::{
    CachedElevation, ElevationBatching, ElevationSource, GeoNamesClient, NoElevation,
};
use crate::engine::IntelEngine;
use crate::sources::{CsvReportSource, ReportSource, SosApiClient, WeatherFileSource};

#[derive(Debug, Clone, Args)]
pub struct Settings {
    /// SOS reports endpoint
    #[arg(
        long,
        env = "SOS_API_URL",
        default_value = "https://floodsupport.org/api/sos",
        global = true
    )]
    pub sos_api_url: String,

    /// Maximum SOS records requested per fetch
    #[arg(long, env = "SOS_LIMIT", default_value_t = 10_000, global = true)]
    pub sos_limit: usize,

    /// Read reports from a CSV export instead of the SOS API
    #[arg(long, global = true)]
    pub reports_csv: Option<PathBuf>,

    /// Per-district weather snapshot (JSON)
    #[arg(long, env = "WEATHER_FILE", default_value = "cache/weather_data.json", global = true)]
    pub weather_file: PathBuf,

    /// GeoNames account; elevation lookups are skipped when unset
    #[arg(long, env = "GEONAMES_USERNAME", global = true)]
    pub geonames_username: Option<String>,

    #[arg(
        long,
        env = "GEONAMES_BASE_URL",
        default_value = "http://api.geonames.org",
        global = true
    )]
    pub geonames_url: String,

    /// Postgres connection for run history
    #[arg(long, env = "DATABASE_URL", global = true)]
    pub database_url: Option<String>,

    #[arg(long, default_value_t = 60, global = true)]
    pub http_timeout_secs: u64,

    /// Distinct locations looked up per run
    #[arg(long, default_value_t = 50, global = true)]
    pub elevation_max_lookups: usize,
}

impl Settings {
    fn http_client(&self) -> anyhow::Result<reqwest::Client> {
        reqwest::Client::builder()
            .timeout(Duration::from_secs(self.http_timeout_secs.max(1)))
            .build()
            .context("failed to build HTTP client")
    }

    fn report_source(&self, client: &reqwest::Client) -> Arc<dyn ReportSource> {
        match &self.reports_csv {
            Some(path) => Arc::new(CsvReportSource::new(path)),
            None => Arc::new(SosApiClient::new(client.clone(), &self.sos_api_url, self.sos_limit)),
        }
    }

    fn elevation_source(&self, client: &reqwest::Client) -> Arc<dyn ElevationSource> {
        match &self.geonames_username {
            Some(username) if !username.trim().is_empty() => {
                let geonames =
                    GeoNamesClient::new(client.clone(), &self.geonames_url, username.trim());
                Arc::new(CachedElevation::new(geonames))
            }
            _ => {
                info!("GEONAMES_USERNAME not set; elevation risk disabled");
                Arc::new(NoElevation)
            }
        }
    }

    pub fn build_engine(&self) -> anyhow::Result<IntelEngine> {
        let client = self.http_client()?;
        Ok(IntelEngine::new(
            self.report_source(&client),
            Arc::new(WeatherFileSource::new(&self.weather_file)),
            self.elevation_source(&client),
        )
        .with_batching(ElevationBatching {
            max_lookups: self.elevation_max_lookups,
            ..ElevationBatching::default()
        }))
    }

    pub async fn connect_db(&self) -> anyhow::Result<PgPool> {
        let database_url = self
            .database_url
            .as_deref()
            .context("DATABASE_URL must be set to record or read analysis history")?;

        PgPoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await
            .context("failed to connect to Postgres")
    }
}
