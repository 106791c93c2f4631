//! Database access layer

pub mod init;
pub mod models;
pub mod reliability;

pub use init::{create_schema, init_database};
