/// Google Sheets access
///
/// A small client for the Sheets v4 REST API, authenticated as a Google
/// service account. Used by [`crate::storage::SheetsStorage`] and by the
/// legacy data migrator.
///
/// # Modules
///
/// - `auth`: service-account key loading and access-token exchange
/// - `client`: value range reads and writes, sheet management
/// - `memory`: an in-process spreadsheet with the same range semantics

use async_trait::async_trait;
use std::fmt::Debug;
use thiserror::Error;

pub mod auth;
pub mod client;
pub mod memory;

pub use auth::ServiceAccountKey;
pub use client::SheetsClient;
pub use memory::InMemorySheets;

/// The value-range operations a spreadsheet backend is built on
///
/// Ranges use A1 notation (`contracts!A2:J`). Cells are plain strings.
#[async_trait]
pub trait SheetsTransport: Debug + Send + Sync {
    /// Rows of a range; trailing empty rows are omitted, inner ones are empty
    async fn get_values(&self, range: &str) -> Result<Vec<Vec<String>>, SheetsError>;

    /// Writes rows after the range's table and returns the first row number
    async fn append_values(&self, range: &str, rows: Vec<Vec<String>>) -> Result<u32, SheetsError>;

    async fn update_values(&self, range: &str, rows: Vec<Vec<String>>) -> Result<(), SheetsError>;

    async fn clear_values(&self, range: &str) -> Result<(), SheetsError>;

    async fn sheet_titles(&self) -> Result<Vec<String>, SheetsError>;

    async fn add_sheet(&self, title: &str) -> Result<(), SheetsError>;
}

/// Errors from the Sheets API or its authentication
#[derive(Debug, Error)]
pub enum SheetsError {
    #[error("Failed to read credentials: {0}")]
    Credentials(String),

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Sheets API returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid range: {0}")]
    InvalidRange(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(#[from] serde_json::Error),
}
