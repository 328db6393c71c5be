//! Server configuration, read once from the environment at startup.

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use watcharr_core::secret::JWT_SECRET_ENV;
use watcharr_core::{CostParameters, SecretKey};

const DEFAULT_PORT: u16 = 3080;
const DEFAULT_HOST: &str = "127.0.0.1";

/// Load `.env` from the working directory or one of its parents into the
/// process environment. Variables that are already set are kept.
pub fn load_dotenv() -> Option<PathBuf> {
    loaded(dotenvy::dotenv())
}

fn loaded(result: dotenvy::Result<PathBuf>) -> Option<PathBuf> {
    match result {
        Ok(path) => Some(path),
        Err(e) if e.not_found() => None,
        Err(e) => {
            tracing::warn!("ignoring unreadable .env file: {e}");
            None
        }
    }
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub data_dir: PathBuf,
    pub host: String,
    pub port: u16,
    pub jwt_secret: SecretKey,
    pub hash_params: CostParameters,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the config from an arbitrary variable source. Blank values count
    /// as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let jwt_secret = SecretKey::new(var(JWT_SECRET_ENV).unwrap_or_default())
            .with_context(|| format!("{JWT_SECRET_ENV} env var missing"))?;

        let data_dir = var("WATCHARR_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("data"));
        let host = var("WATCHARR_HOST").unwrap_or_else(|| DEFAULT_HOST.into());
        let port = match var("PORT") {
            Some(p) => p.trim().parse().with_context(|| format!("invalid PORT: {p}"))?,
            None => DEFAULT_PORT,
        };

        let defaults = CostParameters::default();
        let cost = |key: &str, default: u32| parse_u32(var(key), key, default);
        let hash_params = CostParameters {
            memory_kib: cost("WATCHARR_HASH_MEMORY_KIB", defaults.memory_kib)?,
            iterations: cost("WATCHARR_HASH_ITERATIONS", defaults.iterations)?,
            parallelism: cost("WATCHARR_HASH_PARALLELISM", defaults.parallelism)?,
            ..defaults
        };

        Ok(Self {
            data_dir,
            host,
            port,
            jwt_secret,
            hash_params,
        })
    }
}

fn parse_u32(value: Option<String>, key: &str, default: u32) -> Result<u32> {
    let Some(raw) = value else {
        return Ok(default);
    };
    let parsed: u32 = raw
        .trim()
        .parse()
        .with_context(|| format!("invalid {key}: {raw}"))?;
    if parsed == 0 {
        bail!("{key} must be greater than zero");
    }
    Ok(parsed)
}
