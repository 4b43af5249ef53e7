//! TourCache - on-demand photo cache for map locations
//!
//! This library lists photos near a location from a remote search service,
//! persists placeholder entries for them, and downloads each photo's bytes
//! lazily, at most once, caching the result locally.
//!
//! - [`coord`]: validated location keys
//! - [`provider`]: remote locator fetchers and the HTTP client abstraction
//! - [`store`]: persistent entry stores
//! - [`cache`]: the resource cache with request coalescing
//! - [`config`]: INI configuration file
//! - [`logging`]: tracing subscriber setup

pub mod cache;
pub mod config;
pub mod coord;
pub mod logging;
pub mod provider;
pub mod store;
