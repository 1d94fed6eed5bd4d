//! Periodic HTTP health checks with webhook alerts and a live status feed.
//!
//! [`engine::Monitor`] probes every configured target once per round through
//! [`prober::Prober`], alerts through [`notifier::Notifier`] and records each
//! verdict in [`store::Store`], which [`api::ApiServer`] exposes over HTTP.

pub mod api;
pub mod config;
pub mod engine;
pub mod error;
pub mod models;
pub mod notifier;
pub mod prober;
pub mod store;
