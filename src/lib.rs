// src/lib.rs

//! stockwatch library
//!
//! Polls a fixed watchlist of product pages, extracts an availability
//! signal per page, and notifies a webhook when the purchase-relevant
//! content changes.

pub mod detector;
pub mod error;
pub mod fetch;
pub mod models;
pub mod notify;
pub mod pipeline;
pub mod storage;
