use serde::Deserialize;
use std::time::Duration;

/// Application configuration loaded from environment variables
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Server host address
    #[serde(default = "default_host")]
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Catalog service base URL
    #[serde(default = "default_catalog_url")]
    pub catalog_url: String,

    /// Deadline for a single catalog fetch
    #[serde(default = "default_catalog_fetch_timeout_ms")]
    pub catalog_fetch_timeout_ms: u64,

    /// Period between catalog refreshes while the catalog is healthy
    #[serde(default = "default_refresh_interval_secs")]
    pub refresh_interval_secs: u64,

    /// First retry delay after a failed refresh
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,

    /// Upper bound for retry delays
    #[serde(default = "default_backoff_ceiling_secs")]
    pub backoff_ceiling_secs: u64,

    /// Snapshot age beyond which responses are flagged as degraded
    #[serde(default = "default_staleness_threshold_secs")]
    pub staleness_threshold_secs: u64,

    #[serde(default = "default_max_concurrent_requests")]
    pub max_concurrent_requests: usize,

    /// Largest `count` a caller may request
    #[serde(default = "default_max_recommendations")]
    pub max_recommendations: usize,

    #[serde(default = "default_request_timeout_ms")]
    pub default_request_timeout_ms: u64,

    /// Optional JSON product list published as the seed snapshot
    #[serde(default)]
    pub catalog_seed_path: Option<String>,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_catalog_url() -> String {
    "http://localhost:8081".to_string()
}

fn default_catalog_fetch_timeout_ms() -> u64 {
    5_000
}

fn default_refresh_interval_secs() -> u64 {
    30
}

fn default_backoff_base_ms() -> u64 {
    1_000
}

fn default_backoff_ceiling_secs() -> u64 {
    300
}

fn default_staleness_threshold_secs() -> u64 {
    120
}

fn default_max_concurrent_requests() -> usize {
    64
}

fn default_max_recommendations() -> usize {
    50
}

fn default_request_timeout_ms() -> u64 {
    250
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            catalog_url: default_catalog_url(),
            catalog_fetch_timeout_ms: default_catalog_fetch_timeout_ms(),
            refresh_interval_secs: default_refresh_interval_secs(),
            backoff_base_ms: default_backoff_base_ms(),
            backoff_ceiling_secs: default_backoff_ceiling_secs(),
            staleness_threshold_secs: default_staleness_threshold_secs(),
            max_concurrent_requests: default_max_concurrent_requests(),
            max_recommendations: default_max_recommendations(),
            default_request_timeout_ms: default_request_timeout_ms(),
            catalog_seed_path: None,
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        let config = envy::from_env::<Config>()
            .map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects settings the server cannot run with
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.max_concurrent_requests == 0 {
            anyhow::bail!("MAX_CONCURRENT_REQUESTS must be at least 1");
        }
        if self.max_recommendations == 0 {
            anyhow::bail!("MAX_RECOMMENDATIONS must be at least 1");
        }
        if self.refresh_interval_secs == 0 || self.backoff_base_ms == 0 {
            anyhow::bail!("refresh interval and backoff base must be non-zero");
        }
        if self.catalog_fetch_timeout_ms == 0 || self.default_request_timeout_ms == 0 {
            anyhow::bail!("fetch and request timeouts must be non-zero");
        }
        if self.backoff_ceiling() < self.backoff_base() {
            anyhow::bail!("BACKOFF_CEILING_SECS must not be below BACKOFF_BASE_MS");
        }
        Ok(())
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn catalog_fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.catalog_fetch_timeout_ms)
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }

    pub fn backoff_base(&self) -> Duration {
        Duration::from_millis(self.backoff_base_ms)
    }

    pub fn backoff_ceiling(&self) -> Duration {
        Duration::from_secs(self.backoff_ceiling_secs)
    }

    pub fn staleness_threshold(&self) -> Duration {
        Duration::from_secs(self.staleness_threshold_secs)
    }

    pub fn default_request_timeout(&self) -> Duration {
        Duration::from_millis(self.default_request_timeout_ms)
    }
}
