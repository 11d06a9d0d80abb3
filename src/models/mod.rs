// src/models/mod.rs

//! Domain models for the stock watcher.

mod check;
mod config;

// Re-export all public types
pub use check::{CycleStats, Signal};
pub use config::{
    Config, DetectorConfig, FetcherConfig, NotifyConfig, StoreConfig, WatchConfig, WatchTarget,
};
