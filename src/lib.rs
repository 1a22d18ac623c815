//! mp-challenge library
//!
//! Fetches the challenge dataset, normalizes and caches it, and serves it as
//! a queryable table. The binary and the integration tests use these modules.

pub mod admin;
pub mod cache;
pub mod cli;
pub mod config;
pub mod data;
pub mod endpoint;
pub mod export;
pub mod logging;
pub mod proxy;
pub mod request;
pub mod table;
