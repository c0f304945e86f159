use std::net::SocketAddr;
use std::time::Duration;

use clap::Parser;
use thiserror::Error;
use url::Url;

pub const DEFAULT_ENDPOINT: &str = "http://localhost:3000/api/users";
pub const DEFAULT_ITERATIONS: usize = 100;
pub const DEFAULT_WARMUP: usize = 5;
pub const DEFAULT_PROGRESS_EVERY: usize = 10;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid endpoint URL {url:?}: {source}")]
    InvalidEndpoint {
        url: String,
        #[source]
        source: url::ParseError,
    },
    #[error("endpoint must use http or https, got {0:?}")]
    UnsupportedScheme(String),
    #[error("{0} must be greater than zero")]
    Zero(&'static str),
}

// ─── Server ──────────────────────────────────────────────────────

#[derive(Parser, Debug, Clone)]
#[command(name = "latency-lab", about = "Timed create-user API")]
pub struct ServerConfig {
    /// Address to bind
    #[arg(long, env = "LAB_LISTEN", default_value = "0.0.0.0:3000")]
    pub listen: SocketAddr,

    /// Cap on stored users; inserts past it fail with 500
    #[arg(long, env = "LAB_MAX_USERS")]
    pub max_users: Option<usize>,
}

// ─── Benchmark ───────────────────────────────────────────────────

#[derive(Clone, Debug)]
pub struct BenchmarkConfig {
    pub endpoint: Url,
    /// Measured iterations, ≥ 1
    pub iterations: usize,
    /// Discarded iterations before measuring
    pub warmup: usize,
    /// Progress is reported after every `progress_every` measured iterations
    pub progress_every: usize,
    /// Pause between warmup requests
    pub warmup_pause: Duration,
}

impl BenchmarkConfig {
    pub fn try_new(
        endpoint: impl AsRef<str>,
        iterations: usize,
        warmup: usize,
    ) -> Result<Self, ConfigError> {
        let raw = endpoint.as_ref();
        let endpoint = Url::parse(raw).map_err(|source| ConfigError::InvalidEndpoint {
            url: raw.to_owned(),
            source,
        })?;
        if !matches!(endpoint.scheme(), "http" | "https") {
            return Err(ConfigError::UnsupportedScheme(endpoint.scheme().to_owned()));
        }
        if iterations == 0 {
            return Err(ConfigError::Zero("iterations"));
        }

        Ok(Self {
            endpoint,
            iterations,
            warmup,
            progress_every: DEFAULT_PROGRESS_EVERY,
            warmup_pause: Duration::ZERO,
        })
    }

    pub fn with_progress_every(mut self, every: usize) -> Result<Self, ConfigError> {
        if every == 0 {
            return Err(ConfigError::Zero("progress_every"));
        }
        self.progress_every = every;
        Ok(self)
    }

    pub fn with_warmup_pause(mut self, pause: Duration) -> Self {
        self.warmup_pause = pause;
        self
    }
}
