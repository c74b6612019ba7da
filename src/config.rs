use dotenvy::dotenv;
use serde::Deserialize;
use std::env;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackend {
    /// Process-local store; the default, and what the test suites use.
    Memory,
    Redis,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server_port: u16,
    pub database_url: String,
    pub cache_backend: CacheBackend,
    /// Required when `cache_backend` is `redis`.
    pub redis_url: Option<String>,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenv().ok();

        let cache_backend = match env::var("CACHE_BACKEND")
            .unwrap_or_else(|_| "memory".to_string())
            .to_lowercase()
            .as_str()
        {
            "memory" => CacheBackend::Memory,
            "redis" => CacheBackend::Redis,
            other => anyhow::bail!("unsupported CACHE_BACKEND '{other}' (expected memory or redis)"),
        };

        let redis_url = env::var("REDIS_URL").ok();
        if cache_backend == CacheBackend::Redis && redis_url.is_none() {
            anyhow::bail!("REDIS_URL is required when CACHE_BACKEND=redis");
        }

        Ok(Config {
            server_port: env::var("SERVER_PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()?,
            database_url: env::var("DATABASE_URL")?,
            cache_backend,
            redis_url,
        })
    }
}
