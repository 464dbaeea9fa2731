use std::path::PathBuf;

use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::Deserialize;

/// Runtime settings for the installer client. Defaults point at a backend on
/// the same host; an optional `installer.toml` in the working directory and
/// `BDM_INSTALLER_*` environment variables override them, in that order.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// Backend origin, e.g. `http://127.0.0.1:8000`.
    pub api_base_url: String,
    /// Path prefix the backend mounts the API under.
    pub api_base: String,
    pub request_timeout_secs: u64,
    /// Overrides the default wizard state file location.
    pub state_file: Option<PathBuf>,
}

impl Settings {
    pub fn load() -> Result<Self> {
        Config::builder()
            .set_default("api_base_url", "http://127.0.0.1:8000")?
            .set_default("api_base", "/api")?
            .set_default("request_timeout_secs", 15_i64)?
            .add_source(File::with_name("installer").required(false))
            .add_source(Environment::with_prefix("BDM_INSTALLER"))
            .build()
            .context("Failed to assemble settings")?
            .try_deserialize()
            .context("Failed to parse settings")
    }
}
