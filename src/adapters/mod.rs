//! Concrete adapter implementations for ports.

pub mod csv_adapter;
pub mod file_config_adapter;
pub mod memory_config_store;
#[cfg(feature = "sqlite")]
pub mod sqlite_config_store;
