//! Environment-driven service settings.
//!
//! Loaded once at startup; a `.env` file is honored when present so local
//! runs do not need exported variables.

use anyhow::{Context, Result};

#[derive(Debug, Clone)]
pub struct Settings {
    /// Connection string for the SQLite pool, e.g. `sqlite://studykit.db`.
    pub database_url: String,
    /// Study whose participants are managed through the symptom diary.
    pub sormas_study: String,
}

impl Settings {
    pub fn from_env() -> Result<Self> {
        if dotenvy::dotenv().is_ok() {
            log::debug!("loaded settings from .env file");
        }

        Ok(Self {
            database_url: std::env::var("DATABASE_URL")
                .context("DATABASE_URL must be set")?,
            sormas_study: std::env::var("SORMAS_STUDY")
                .context("SORMAS_STUDY must be set")?,
        })
    }
}
