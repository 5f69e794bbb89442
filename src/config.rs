use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, de::DeserializeOwned};

use crate::index_file::{INDEX_FILE, NO_IMAGES_FILE};

fn default_data_dir() -> String {
    "data".to_string()
}

fn default_batch_size() -> usize {
    25
}

fn default_request_delay_ms() -> u64 {
    500
}

/// The env vars for a run. Only `DATABASE_URL` is optional, because the
/// fetch-only commands never touch the database.
#[derive(Debug, Deserialize)]
pub struct AppEnv {
    pub database_url: Option<String>,
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_request_delay_ms")]
    pub request_delay_ms: u64,
}

pub struct AppConfig {
    env: AppEnv,
}

impl AppConfig {
    pub fn new() -> anyhow::Result<Self> {
        let env = AppEnv::load_from_env()?;
        Ok(Self { env })
    }

    pub fn database_url(&self) -> anyhow::Result<&str> {
        self.env
            .database_url
            .as_deref()
            .context("DATABASE_URL must be set for commands that touch the database")
    }

    pub fn data_dir(&self) -> PathBuf {
        PathBuf::from(&self.env.data_dir)
    }

    pub fn index_path(&self) -> PathBuf {
        self.data_dir().join(INDEX_FILE)
    }

    pub fn no_images_path(&self) -> PathBuf {
        self.data_dir().join(NO_IMAGES_FILE)
    }

    pub fn batch_size(&self) -> usize {
        self.env.batch_size
    }

    /// Minimum delay between consecutive calls to the same provider.
    pub fn request_delay(&self) -> Duration {
        Duration::from_millis(self.env.request_delay_ms)
    }
}

// Extension trait.
pub trait LoadFromEnv: DeserializeOwned {
    fn load_from_env() -> anyhow::Result<Self> {
        // Don't throw an error if .env file doesn't exist.
        let _ = dotenv::dotenv();
        let config =
            envy::from_env::<Self>().context("failed to load env variables into config struct")?;
        Ok(config)
    }
}

impl<T: DeserializeOwned> LoadFromEnv for T {}
