//! # Core314 Common Library
//!
//! Shared code for all Core314 microservices including:
//! - Database models and schema initialization
//! - API authentication (bearer tokens, webhook signatures)
//! - Configuration loading
//! - Common error types

pub mod api;
pub mod config;
pub mod db;
pub mod error;

pub use error::{Error, Result};
