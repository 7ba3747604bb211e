//! Core domain types and logic.

pub mod breadth_record;
pub mod standardize;
pub mod statistics;
pub mod formula;
pub mod formula_parser;
pub mod formula_eval;
pub mod validation;
pub mod configuration;
pub mod config_validation;
pub mod settings;
pub mod market_condition;
pub mod result;
pub mod scoring;
pub mod algorithm;
pub mod config_manager;
pub mod engine;
pub mod error;
