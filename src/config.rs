// ⚙️ Configuration - environment driven, with logged defaults

use anyhow::{Context, Result};
use std::{env, fmt::Display, path::PathBuf, str::FromStr};
use tracing::info;

use crate::session::DEFAULT_PAGE_SIZE;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// SQLite database file (`CLINIC_DB`)
    pub db_path: PathBuf,
    /// Stats server bind address (`CLINIC_HOST`)
    pub host: String,
    /// Stats server port (`PORT`)
    pub port: u16,
    /// Visits per page (`CLINIC_PAGE_SIZE`)
    pub page_size: usize,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            db_path: PathBuf::from("clinic.db"),
            host: "0.0.0.0".to_string(),
            port: 4242,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from any key lookup. Unset keys fall back to defaults;
    /// set but unparsable keys are errors.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let page_size: usize = try_load(&lookup, "CLINIC_PAGE_SIZE", DEFAULT_PAGE_SIZE)?;
        if page_size == 0 {
            anyhow::bail!("Invalid CLINIC_PAGE_SIZE value: must be at least 1");
        }

        Ok(Config {
            db_path: try_load(&lookup, "CLINIC_DB", "clinic.db")?,
            host: try_load(&lookup, "CLINIC_HOST", "0.0.0.0")?,
            port: try_load(&lookup, "PORT", 4242)?,
            page_size,
        })
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn try_load<F, T, D>(lookup: &F, key: &str, default: D) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: Display,
    D: Display,
{
    let raw = lookup(key).unwrap_or_else(|| {
        info!("{key} not set, using default: {default}");
        default.to_string()
    });

    raw.trim()
        .parse()
        .map_err(|e| anyhow::anyhow!("{e}"))
        .with_context(|| format!("Invalid {key} value: {raw:?}"))
}

/// Install the stderr log subscriber. `RUST_LOG` overrides `default_filter`.
pub fn init_tracing(default_filter: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}
