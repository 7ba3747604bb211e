//! SQLite configuration store.
//!
//! Each configuration is stored as its JSON body, with the version, algorithm
//! and default flag duplicated into columns for querying.

use crate::domain::configuration::Configuration;
use crate::domain::error::BreadthError;
use crate::ports::config_port::ConfigPort;
use crate::ports::config_store_port::ConfigStorePort;
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{OptionalExtension, params};
use tracing::debug;

pub struct SqliteConfigStore {
    pool: Pool<SqliteConnectionManager>,
}

fn storage_error(e: impl std::fmt::Display) -> BreadthError {
    BreadthError::Storage {
        reason: e.to_string(),
    }
}

impl SqliteConfigStore {
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, BreadthError> {
        let db_path =
            config
                .get_string("sqlite", "path")
                .ok_or_else(|| BreadthError::SettingsInvalid {
                    section: "sqlite".into(),
                    key: "path".into(),
                    reason: "path is required for the sqlite backend".into(),
                })?;

        let pool_size = config.get_int("sqlite", "pool_size", 4).max(1) as u32;

        let manager = SqliteConnectionManager::file(&db_path);
        let pool = Pool::builder()
            .max_size(pool_size)
            .build(manager)
            .map_err(storage_error)?;

        debug!(path = %db_path, pool_size, "opened sqlite configuration store");
        Ok(Self { pool })
    }

    pub fn in_memory() -> Result<Self, BreadthError> {
        let manager = SqliteConnectionManager::memory();
        let pool = Pool::builder()
            .max_size(1)
            .build(manager)
            .map_err(storage_error)?;

        Ok(Self { pool })
    }

    fn conn(&self) -> Result<PooledConnection<SqliteConnectionManager>, BreadthError> {
        self.pool.get().map_err(storage_error)
    }

    pub fn initialize_schema(&self) -> Result<(), BreadthError> {
        self.conn()?
            .execute_batch(
                "CREATE TABLE IF NOT EXISTS configurations (
                    version TEXT PRIMARY KEY NOT NULL,
                    algorithm TEXT NOT NULL,
                    is_default INTEGER NOT NULL DEFAULT 0,
                    body TEXT NOT NULL,
                    updated_at TEXT NOT NULL
                );
                CREATE INDEX IF NOT EXISTS idx_configurations_algorithm
                    ON configurations(algorithm, is_default);",
            )
            .map_err(storage_error)
    }

    fn decode(body: String) -> Result<Configuration, BreadthError> {
        Ok(serde_json::from_str(&body)?)
    }
}

impl ConfigStorePort for SqliteConfigStore {
    fn get(&self, version: &str) -> Result<Option<Configuration>, BreadthError> {
        let body: Option<String> = self
            .conn()?
            .query_row(
                "SELECT body FROM configurations WHERE version = ?1",
                params![version],
                |row| row.get(0),
            )
            .optional()
            .map_err(storage_error)?;
        body.map(Self::decode).transpose()
    }

    fn list(&self) -> Result<Vec<Configuration>, BreadthError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare("SELECT body FROM configurations ORDER BY version ASC")
            .map_err(storage_error)?;
        let rows = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .map_err(storage_error)?;

        let mut configs = Vec::new();
        for row in rows {
            configs.push(Self::decode(row.map_err(storage_error)?)?);
        }
        Ok(configs)
    }

    fn insert(&self, config: &Configuration) -> Result<(), BreadthError> {
        let body = serde_json::to_string(config)?;
        self.conn()?
            .execute(
                "INSERT INTO configurations (version, algorithm, is_default, body, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    config.version,
                    config.algorithm.as_str(),
                    config.is_default,
                    body,
                    config.updated_at.to_rfc3339()
                ],
            )
            .map_err(storage_error)?;
        Ok(())
    }

    fn update(&self, config: &Configuration) -> Result<(), BreadthError> {
        let body = serde_json::to_string(config)?;
        let changed = self
            .conn()?
            .execute(
                "UPDATE configurations
                 SET algorithm = ?2, is_default = ?3, body = ?4, updated_at = ?5
                 WHERE version = ?1",
                params![
                    config.version,
                    config.algorithm.as_str(),
                    config.is_default,
                    body,
                    config.updated_at.to_rfc3339()
                ],
            )
            .map_err(storage_error)?;
        if changed == 0 {
            return Err(BreadthError::ConfigNotFound {
                version: config.version.clone(),
            });
        }
        Ok(())
    }

    fn delete(&self, version: &str) -> Result<bool, BreadthError> {
        let changed = self
            .conn()?
            .execute(
                "DELETE FROM configurations WHERE version = ?1",
                params![version],
            )
            .map_err(storage_error)?;
        Ok(changed > 0)
    }
}
