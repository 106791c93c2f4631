//! Shared API concerns: bearer-token auth and webhook signature verification

pub mod auth;
pub mod signature;
