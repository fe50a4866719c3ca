use anyhow::Context;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    /// Origin serving the static base dataset file.
    pub base_origin: String,
    /// Path under the origin the app is mounted at; "/" means the root.
    pub base_path: String,
    /// File name of the world-countries GeoJSON dataset.
    pub dataset_file: String,
    /// Overpass API interpreter endpoint.
    pub overpass_endpoint: String,
    /// Vector style document consumed by map instances.
    pub map_style_url: String,
    /// Maximum size of the DuckDB connection pool.
    pub pool_size: u32,
    /// Engine extensions installed and loaded on every connection checkout.
    pub extensions: Vec<String>,
    /// Maximum attempts for an external HTTP fetch.
    pub fetch_max_attempts: u32,
    /// Base backoff between fetch retries, doubled per attempt.
    pub fetch_backoff_ms: u64,
    /// Log format: "compact" or "json".
    pub log_format: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            base_origin: "http://localhost:5173".to_string(),
            base_path: "/".to_string(),
            dataset_file: "ne_110m_admin_0_countries.json".to_string(),
            overpass_endpoint: "https://z.overpass-api.de/api/interpreter".to_string(),
            map_style_url: "https://tile.openstreetmap.jp/styles/osm-bright/style.json"
                .to_string(),
            pool_size: 4,
            extensions: vec!["json".to_string(), "spatial".to_string()],
            fetch_max_attempts: 3,
            fetch_backoff_ms: 250,
            log_format: "compact".to_string(),
        }
    }
}

impl AppConfig {
    pub fn load() -> anyhow::Result<Self> {
        let defaults_json = serde_json::to_string(&Self::default())
            .with_context(|| "failed to serialize defaults")?;
        let settings = config::Config::builder()
            .add_source(
                config::File::from_str(&defaults_json, config::FileFormat::Json).required(false),
            )
            .add_source(config::Environment::with_prefix("GEOLAKE"))
            .build()
            .with_context(|| "failed to load configuration")?;
        let cfg: AppConfig = settings
            .try_deserialize()
            .with_context(|| "failed to deserialize configuration")?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// URL of the base dataset file, derived from the configured origin and
    /// mount path: the path is appended only when it is not the root.
    pub fn dataset_source(&self) -> String {
        let mut base = self.base_origin.trim_end_matches('/').to_string();
        if self.base_path != "/" {
            let path = self.base_path.trim_matches('/');
            if !path.is_empty() {
                base.push('/');
                base.push_str(path);
            }
        }
        format!("{base}/{}", self.dataset_file)
    }

    fn validate(&self) -> anyhow::Result<()> {
        if self.pool_size == 0 {
            anyhow::bail!("pool_size must be at least 1");
        }
        if self.fetch_max_attempts == 0 {
            anyhow::bail!("fetch_max_attempts must be at least 1");
        }
        Ok(())
    }
}
