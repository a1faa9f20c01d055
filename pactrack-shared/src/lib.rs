//! # Pactrack Shared Library
//!
//! Domain types and business logic shared by the Pactrack API server and the
//! legacy data migrator.
//!
//! ## Module Organization
//!
//! - `status`: contract expiry status calculation
//! - `models`: users, contracts, audit history, statistics
//! - `storage`: the `Storage` trait and its memory, PostgreSQL and
//!   spreadsheet implementations
//! - `auth`: password hashing, JWT, middleware and access rules
//! - `db`: connection pool and migrations
//! - `sheets`: Google Sheets REST client
//! - `dadata`: company lookup client

pub mod auth;
pub mod dadata;
pub mod db;
pub mod models;
pub mod sheets;
pub mod status;
pub mod storage;

/// Current version of the Pactrack shared library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
