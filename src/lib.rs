#[macro_use]
extern crate log;

#[cfg(test)]
#[macro_use]
extern crate store_test;

use config::{Environment, File};
use serde::Deserialize;

pub mod asm;
pub mod controller;
pub mod crypto;
pub mod error;
pub mod logging;
pub mod model;
pub mod service;
pub mod store;

pub use controller::{AuditWorkflow, CountyRoundStatus, RoundSize, RoundStartReport};
pub use error::{Error, Result};

/// Engine configuration, read from `Rla.toml` (if present) and `RLA_*`
/// environment variables, the latter taking precedence.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    db_uri: String,
    database: String,
}

impl Config {
    /// Load from `Rla.toml` in the working directory.
    pub fn load() -> Result<Self> {
        Self::load_from("Rla")
    }

    /// Load from the named file (extension optional), which need not exist.
    pub fn load_from(file: &str) -> Result<Self> {
        let config = config::Config::builder()
            .set_default("database", "rla")?
            .add_source(File::with_name(file).required(false))
            .add_source(Environment::with_prefix("RLA"))
            .build()?;
        Ok(config.try_deserialize()?)
    }

    /// MongoDB connection string.
    /// Configured via `RLA_DB_URI`.
    pub fn db_uri(&self) -> &str {
        &self.db_uri
    }

    /// Name of the database holding the audit.
    /// Configured via `RLA_DATABASE`; defaults to `rla`.
    pub fn database(&self) -> &str {
        &self.database
    }
}

/// A fresh database for one store test.
#[cfg(test)]
pub(crate) fn test_database(name: &str) -> mongodb::sync::Database {
    let db_uri = std::env::var("RLA_TEST_DB_URI")
        .unwrap_or_else(|_| "mongodb://localhost:27017".to_string());
    let client = mongodb::sync::Client::with_uri_str(db_uri).unwrap();
    client.database(&format!("rla_test_{name}"))
}
