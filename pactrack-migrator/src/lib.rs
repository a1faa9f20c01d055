//! # Pactrack Legacy Migrator
//!
//! One-shot import of users and contracts from the legacy Google
//! spreadsheet into a [`pactrack_shared::storage::Storage`] backend.
//!
//! ## Modules
//!
//! - `config`: environment configuration
//! - `legacy`: legacy row parsing
//! - `source`: where rows are read from
//! - `migrate`: the migration itself and its report
//!
//! ## Example
//!
//! ```no_run
//! use pactrack_migrator::{migrate, source::FixtureSource};
//! use pactrack_shared::storage::MemStorage;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let source = FixtureSource::new();
//! let storage = MemStorage::new();
//! let report = migrate::run(&source, &storage, "password123").await?;
//! println!("users: {}", report.users);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod legacy;
pub mod migrate;
pub mod source;
