//! Port traits the domain depends on.

pub mod config_port;
pub mod config_store_port;
pub mod data_port;
