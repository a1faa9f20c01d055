/// Where legacy rows come from
///
/// Production reads the legacy Google spreadsheet; tests and dry runs use
/// [`FixtureSource`], which serves rows from memory.

use async_trait::async_trait;
use pactrack_shared::sheets::{SheetsClient, SheetsError};
use std::collections::HashMap;

#[async_trait]
pub trait LegacySource: Send + Sync {
    /// Cell values of an A1 range, row-major
    async fn fetch_rows(&self, range: &str) -> Result<Vec<Vec<String>>, SheetsError>;
}

#[async_trait]
impl LegacySource for SheetsClient {
    async fn fetch_rows(&self, range: &str) -> Result<Vec<Vec<String>>, SheetsError> {
        self.get_values(range).await
    }
}

/// In-memory rows keyed by range
#[derive(Debug, Default, Clone)]
pub struct FixtureSource {
    ranges: HashMap<String, Vec<Vec<String>>>,
}

impl FixtureSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_range(mut self, range: &str, rows: Vec<Vec<String>>) -> Self {
        self.ranges.insert(range.to_string(), rows);
        self
    }
}

#[async_trait]
impl LegacySource for FixtureSource {
    async fn fetch_rows(&self, range: &str) -> Result<Vec<Vec<String>>, SheetsError> {
        Ok(self.ranges.get(range).cloned().unwrap_or_default())
    }
}
