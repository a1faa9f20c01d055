/// Google Sheets v4 REST client
///
/// Only the handful of calls the storage backend and migrator need:
/// reading, appending, overwriting and clearing value ranges, plus listing
/// and adding sheets. All values are exchanged as strings (`RAW` input).
///
/// # Example
///
/// ```no_run
/// use pactrack_shared::sheets::{ServiceAccountKey, SheetsClient};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let key = ServiceAccountKey::from_file("credentials.json").await?;
/// let client = SheetsClient::new(key, "1AbCdEf")?;
///
/// let rows = client.get_values("users!A2:C").await?;
/// println!("{} users", rows.len());
/// # Ok(())
/// # }
/// ```

use async_trait::async_trait;
use reqwest::{RequestBuilder, Response, Url};
use serde::Deserialize;
use serde_json::{json, Value as JsonValue};
use std::time::Duration;
use tracing::{debug, warn};

use super::auth::{ServiceAccountKey, TokenProvider, SPREADSHEETS_SCOPE};
use super::{SheetsError, SheetsTransport};

const SHEETS_API: &str = "https://sheets.googleapis.com/v4/spreadsheets";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<JsonValue>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AppendResponse {
    updates: AppendUpdates,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AppendUpdates {
    updated_range: String,
}

#[derive(Debug, Deserialize)]
struct Spreadsheet {
    #[serde(default)]
    sheets: Vec<SheetEntry>,
}

#[derive(Debug, Deserialize)]
struct SheetEntry {
    properties: SheetProperties,
}

#[derive(Debug, Deserialize)]
struct SheetProperties {
    title: String,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
}

/// Client bound to a single spreadsheet
#[derive(Debug)]
pub struct SheetsClient {
    http: reqwest::Client,
    tokens: TokenProvider,
    spreadsheet_id: String,
}

impl SheetsClient {
    pub fn new(key: ServiceAccountKey, spreadsheet_id: impl Into<String>) -> Result<Self, SheetsError> {
        let http = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;

        Ok(Self {
            tokens: TokenProvider::new(key, SPREADSHEETS_SCOPE, http.clone()),
            http,
            spreadsheet_id: spreadsheet_id.into(),
        })
    }

    pub fn spreadsheet_id(&self) -> &str {
        &self.spreadsheet_id
    }

    /// Reads a range; trailing empty rows are omitted by the API
    pub async fn get_values(&self, range: &str) -> Result<Vec<Vec<String>>, SheetsError> {
        let url = self.url(&["values", range])?;
        let response = self.send(self.http.get(url)).await?;
        let body: ValueRange = response.json().await?;

        Ok(body
            .values
            .into_iter()
            .map(|row| row.into_iter().map(cell_to_string).collect())
            .collect())
    }

    /// Writes rows into the first empty row after the range's table
    ///
    /// Existing rows are never moved, so a cleared row inside the data is
    /// filled rather than pushing later rows down. Returns the 1-based sheet
    /// row number the first appended row landed on.
    pub async fn append_values(
        &self,
        range: &str,
        rows: Vec<Vec<String>>,
    ) -> Result<u32, SheetsError> {
        let url = append_url(&self.spreadsheet_id, range)?;
        let response = self
            .send(self.http.post(url).json(&json!({ "values": rows })))
            .await?;
        let body: AppendResponse = response.json().await?;

        first_row_of_range(&body.updates.updated_range)
            .ok_or(SheetsError::InvalidRange(body.updates.updated_range))
    }

    /// Overwrites a range with the given rows
    pub async fn update_values(
        &self,
        range: &str,
        rows: Vec<Vec<String>>,
    ) -> Result<(), SheetsError> {
        let mut url = self.url(&["values", range])?;
        url.query_pairs_mut().append_pair("valueInputOption", "RAW");

        self.send(self.http.put(url).json(&json!({ "values": rows })))
            .await?;
        Ok(())
    }

    /// Clears values in a range, leaving the cells in place
    pub async fn clear_values(&self, range: &str) -> Result<(), SheetsError> {
        let url = self.url(&["values", &format!("{}:clear", range)])?;
        self.send(self.http.post(url).json(&json!({}))).await?;
        Ok(())
    }

    /// Titles of all sheets in the spreadsheet
    pub async fn sheet_titles(&self) -> Result<Vec<String>, SheetsError> {
        let mut url = self.url(&[])?;
        url.query_pairs_mut()
            .append_pair("fields", "sheets.properties.title");

        let response = self.send(self.http.get(url)).await?;
        let body: Spreadsheet = response.json().await?;
        Ok(body.sheets.into_iter().map(|s| s.properties.title).collect())
    }

    /// Adds an empty sheet
    pub async fn add_sheet(&self, title: &str) -> Result<(), SheetsError> {
        let url = self.batch_update_url()?;
        let body = json!({
            "requests": [{ "addSheet": { "properties": { "title": title } } }]
        });

        self.send(self.http.post(url).json(&body)).await?;
        debug!(title, "Sheet added");
        Ok(())
    }

    fn url(&self, segments: &[&str]) -> Result<Url, SheetsError> {
        spreadsheet_url(&self.spreadsheet_id, segments)
    }

    fn batch_update_url(&self) -> Result<Url, SheetsError> {
        let mut url = Url::parse(SHEETS_API)
            .map_err(|e| SheetsError::InvalidRange(e.to_string()))?;
        url.path_segments_mut()
            .map_err(|_| SheetsError::InvalidRange(SHEETS_API.to_string()))?
            .push(&format!("{}:batchUpdate", self.spreadsheet_id));
        Ok(url)
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, SheetsError> {
        let token = self.tokens.access_token().await?;
        let response = request.bearer_auth(token).send().await?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let text = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ApiErrorBody>(&text)
            .map(|body| body.error.message)
            .unwrap_or(text);

        warn!(status = status.as_u16(), %message, "Sheets API request failed");
        Err(SheetsError::Api {
            status: status.as_u16(),
            message,
        })
    }
}

#[async_trait]
impl SheetsTransport for SheetsClient {
    async fn get_values(&self, range: &str) -> Result<Vec<Vec<String>>, SheetsError> {
        SheetsClient::get_values(self, range).await
    }

    async fn append_values(&self, range: &str, rows: Vec<Vec<String>>) -> Result<u32, SheetsError> {
        SheetsClient::append_values(self, range, rows).await
    }

    async fn update_values(&self, range: &str, rows: Vec<Vec<String>>) -> Result<(), SheetsError> {
        SheetsClient::update_values(self, range, rows).await
    }

    async fn clear_values(&self, range: &str) -> Result<(), SheetsError> {
        SheetsClient::clear_values(self, range).await
    }

    async fn sheet_titles(&self) -> Result<Vec<String>, SheetsError> {
        SheetsClient::sheet_titles(self).await
    }

    async fn add_sheet(&self, title: &str) -> Result<(), SheetsError> {
        SheetsClient::add_sheet(self, title).await
    }
}

fn spreadsheet_url(spreadsheet_id: &str, segments: &[&str]) -> Result<Url, SheetsError> {
    let mut url = Url::parse(SHEETS_API).map_err(|e| SheetsError::InvalidRange(e.to_string()))?;
    {
        let mut path = url
            .path_segments_mut()
            .map_err(|_| SheetsError::InvalidRange(SHEETS_API.to_string()))?;
        path.push(spreadsheet_id);
        path.extend(segments);
    }
    Ok(url)
}

/// `values:append` with `OVERWRITE`: row positions are record ids
fn append_url(spreadsheet_id: &str, range: &str) -> Result<Url, SheetsError> {
    let mut url = spreadsheet_url(spreadsheet_id, &["values", &format!("{}:append", range)])?;
    url.query_pairs_mut()
        .append_pair("valueInputOption", "RAW")
        .append_pair("insertDataOption", "OVERWRITE");
    Ok(url)
}

fn cell_to_string(cell: JsonValue) -> String {
    match cell {
        JsonValue::String(s) => s,
        JsonValue::Null => String::new(),
        other => other.to_string(),
    }
}

/// Extracts the first row number from an A1 range such as `contracts!A5:J5`
pub fn first_row_of_range(range: &str) -> Option<u32> {
    let cells = range.rsplit_once('!').map_or(range, |(_, cells)| cells);
    let first = cells.split(':').next()?;
    let digits: String = first
        .trim_start_matches(|c: char| c.is_ascii_alphabetic() || c == '$')
        .chars()
        .filter(|c| *c != '$')
        .collect();
    digits.parse().ok()
}
