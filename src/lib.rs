//! Per-day short task lists with an offline cache for the application shell.

pub mod config;
pub mod db;
pub mod logging;
pub mod store;
pub mod worker;
