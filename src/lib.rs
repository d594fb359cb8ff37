//! Storeguard Server - rate limiting and attack screening for storefront handlers.
//!
//! The defense logic lives in `storeguard-service`; the axum adapter in
//! `storeguard-http`. This crate adds configuration and the binary.

pub mod config;

pub use storeguard_http::{AppState, router};
