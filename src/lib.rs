//! Marquee: a cached movie-list query service.
//!
//! Scrapes IMDb charts and user lists on demand, keeps snapshots in an
//! in-memory TTL cache with single-flight loading, and serves filtered
//! JSON over HTTP.

pub mod application;
pub mod cache;
pub mod config;
pub mod domain;
pub mod infra;
