//! Configuration parsing and validation for the relay
//!
//! Everything comes from command-line flags, with environment variables as fallbacks so the
//! relay can run on platforms that only hand over `PORT` and a key.
use anyhow::anyhow;
use clap::Parser;
use intapi::client::PoolConfig;
use intapi::upstream::Upstream;
use std::time::Duration;
use url::Url;

#[derive(Clone, Parser)]
#[command(version, about, long_about = None)]
pub struct Config {
    /// The port on which the relay will listen.
    #[arg(short = 'p', long, env = "PORT", default_value_t = 3000)]
    pub port: u16,

    /// Bearer credential sent to the upstream.
    #[arg(long, env = "key", hide_env_values = true)]
    pub api_key: String,

    /// Base URL of the upstream; requests are POSTed to `<base>/chat/completions`.
    #[arg(long, env = "UPSTREAM_URL", default_value = "https://api.chatanywhere.org/v1")]
    pub upstream_url: Url,

    /// Give up on the upstream after this many seconds. Unset means wait forever.
    #[arg(long, env = "UPSTREAM_TIMEOUT_SECS")]
    pub upstream_timeout_secs: Option<u64>,

    /// Reject unknown models on /v1/responses too, not just on /v1/chat/completions.
    #[arg(long, env = "VALIDATE_RESPONSES_MODEL", default_value_t = false)]
    pub validate_responses_model: bool,

    /// Whether to enable the metrics endpoint.
    #[arg(short = 'm', long, env = "METRICS", default_value_t = false)]
    pub metrics: bool,

    /// The port on which the metrics server will listen.
    #[arg(long, env = "METRICS_PORT", default_value_t = 9090)]
    pub metrics_port: u16,

    /// The prefix to use for metrics.
    #[arg(long, default_value = "intapi")]
    pub metrics_prefix: String,

    /// Maximum number of idle HTTP connections to keep alive to the upstream.
    #[arg(long, default_value_t = 100)]
    pub pool_max_idle_per_host: usize,

    /// How long (in seconds) to keep idle HTTP connections alive.
    #[arg(long, default_value_t = 90)]
    pub pool_idle_timeout_secs: u64,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("port", &self.port)
            .field("api_key", &"<redacted>")
            .field("upstream_url", &self.upstream_url.as_str())
            .field("upstream_timeout_secs", &self.upstream_timeout_secs)
            .field("validate_responses_model", &self.validate_responses_model)
            .field("metrics", &self.metrics)
            .field("metrics_port", &self.metrics_port)
            .field("metrics_prefix", &self.metrics_prefix)
            .field("pool_max_idle_per_host", &self.pool_max_idle_per_host)
            .field("pool_idle_timeout_secs", &self.pool_idle_timeout_secs)
            .finish()
    }
}

impl Config {
    pub fn validate(self) -> Result<Self, anyhow::Error> {
        if self.api_key.trim().is_empty() {
            return Err(anyhow!("Upstream API key must not be empty"));
        }
        if self.metrics && self.metrics_port == self.port {
            return Err(anyhow!(
                "Metrics port {} clashes with the relay port",
                self.metrics_port
            ));
        }
        if self.upstream_timeout_secs == Some(0) {
            return Err(anyhow!("Upstream timeout must be at least one second"));
        }
        // Surfaces a bad URL or key at startup rather than on the first request.
        self.upstream()?;
        Ok(self)
    }

    pub fn upstream(&self) -> anyhow::Result<Upstream> {
        Upstream::builder()
            .base_url(self.upstream_url.clone())
            .api_key(self.api_key.clone())
            .maybe_timeout(self.upstream_timeout_secs.map(Duration::from_secs))
            .build()
    }

    pub fn pool(&self) -> PoolConfig {
        PoolConfig {
            max_idle_per_host: self.pool_max_idle_per_host,
            idle_timeout: Duration::from_secs(self.pool_idle_timeout_secs),
        }
    }
}
