//! Process settings from the environment (optionally seeded from `.env`).

use crate::error::ConfigError;
use std::path::PathBuf;

#[derive(Clone, Debug)]
pub struct Settings {
    pub database_url: String,
    /// Database schema introspected for the catalog.
    pub schema: String,
    /// When set, the catalog is read from this manifest instead of introspection.
    pub catalog_path: Option<PathBuf>,
    pub bind_addr: String,
    pub max_connections: u32,
    pub body_limit_bytes: usize,
    /// `OWNERSHIP_FIELDS=weapon:asset,species;armour:asset`, laid over the loaded catalog.
    pub ownership_fields: Vec<(String, Vec<String>)>,
}

impl Settings {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let max_connections = match lookup("MAX_CONNECTIONS") {
            Some(v) => v
                .parse()
                .map_err(|_| ConfigError::Settings(format!("MAX_CONNECTIONS must be a number, got {}", v)))?,
            None => 5,
        };
        let body_limit_bytes = match lookup("BODY_LIMIT_BYTES") {
            Some(v) => v
                .parse()
                .map_err(|_| ConfigError::Settings(format!("BODY_LIMIT_BYTES must be a number, got {}", v)))?,
            None => 1024 * 1024,
        };
        Ok(Settings {
            database_url: lookup("DATABASE_URL").unwrap_or_else(|| "postgres://localhost/elemental".into()),
            schema: lookup("ELEMENTAL_SCHEMA").unwrap_or_else(|| "public".into()),
            catalog_path: lookup("CATALOG_PATH").filter(|s| !s.is_empty()).map(PathBuf::from),
            bind_addr: lookup("BIND_ADDR").unwrap_or_else(|| "127.0.0.1:3000".into()),
            max_connections,
            body_limit_bytes,
            ownership_fields: match lookup("OWNERSHIP_FIELDS") {
                Some(v) => parse_ownership_fields(&v)?,
                None => Vec::new(),
            },
        })
    }
}

fn parse_ownership_fields(raw: &str) -> Result<Vec<(String, Vec<String>)>, ConfigError> {
    raw.split(';')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|entry| -> Result<(String, Vec<String>), ConfigError> {
            let (table, fields) = entry
                .split_once(':')
                .ok_or_else(|| ConfigError::Settings(format!("OWNERSHIP_FIELDS entry {} must be table:field,...", entry)))?;
            let fields: Vec<String> = fields
                .split(',')
                .map(str::trim)
                .filter(|f| !f.is_empty())
                .map(String::from)
                .collect();
            Ok((table.trim().to_string(), fields))
        })
        .collect()
}
