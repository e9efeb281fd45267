//! services/api/src/lib.rs
//!
//! The digital library HTTP service: adapters for Postgres and local asset
//! storage, credential and token handling, the asset gate and the axum router.

pub mod adapters;
pub mod assets;
pub mod auth;
pub mod config;
pub mod error;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
pub mod web;
