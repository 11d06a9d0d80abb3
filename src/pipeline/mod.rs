// src/pipeline/mod.rs

//! Pipeline entry points for watcher operations.
//!
//! - `run_cycle`: one sequential pass over the watchlist

pub mod check;

pub use check::run_cycle;
