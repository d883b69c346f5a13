//! Huntboard Server - API for the bounty hunter marketplace
//!
//! This crate provides the REST API server for the huntboard marketplace:
//! administrators post bounties, hunters submit work against them,
//! submissions are voted on and scored by external screener services, and
//! winners receive crypto-denominated rewards.

pub mod auth;
pub mod db;
pub mod error;
pub mod logstream;
pub mod models;
pub mod objectstore;
pub mod policy;
pub mod pricefeed;
pub mod rewards;
pub mod routes;
pub mod scoring;

pub use error::AppError;
pub use routes::{create_router, AppState};
