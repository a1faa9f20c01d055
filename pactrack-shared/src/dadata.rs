/// Company lookup via the DaData suggestions API
///
/// Resolves Russian companies by taxpayer id (INN) or by free-text query,
/// used to prefill contract forms.
///
/// # Example
///
/// ```no_run
/// use pactrack_shared::dadata::DadataClient;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let client = DadataClient::new("token", None)?;
/// if let Some(company) = client.find_company("7707083893").await? {
///     println!("{} ({})", company.name, company.address);
/// }
/// # Ok(())
/// # }
/// ```

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

const DEFAULT_BASE_URL: &str = "https://suggestions.dadata.ru/suggestions/api/4_1/rs";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Shortest free-text query accepted by [`DadataClient::suggest_companies`]
pub const MIN_QUERY_LEN: usize = 3;

/// Upper bound on suggestions per request
pub const MAX_SUGGESTIONS: u32 = 20;

#[derive(Debug, Error)]
pub enum DadataError {
    #[error("Query must be at least 3 characters")]
    QueryTooShort,

    #[error("Invalid API token")]
    InvalidToken,

    #[error("DaData returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Company details as exposed to clients
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompanyInfo {
    pub name: String,
    pub inn: String,
    pub kpp: Option<String>,
    pub ogrn: Option<String>,
    pub address: String,
    pub status: Option<String>,

    /// Unix milliseconds, as reported by DaData
    pub registration_date: Option<i64>,

    pub director: Option<String>,
    pub director_position: Option<String>,
    pub okved: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SuggestResponse {
    #[serde(default)]
    suggestions: Vec<Suggestion>,
}

#[derive(Debug, Deserialize)]
struct Suggestion {
    value: String,
    #[serde(default)]
    data: PartyData,
}

#[derive(Debug, Default, Deserialize)]
struct PartyData {
    inn: Option<String>,
    kpp: Option<String>,
    ogrn: Option<String>,
    okved: Option<String>,
    address: Option<AddressData>,
    state: Option<StateData>,
    management: Option<ManagementData>,
}

#[derive(Debug, Deserialize)]
struct AddressData {
    value: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StateData {
    status: Option<String>,
    registration_date: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct ManagementData {
    name: Option<String>,
    post: Option<String>,
}

impl From<Suggestion> for CompanyInfo {
    fn from(s: Suggestion) -> Self {
        let data = s.data;
        let (status, registration_date) = data
            .state
            .map(|st| (st.status, st.registration_date))
            .unwrap_or((None, None));
        let (director, director_position) = data
            .management
            .map(|m| (m.name, m.post))
            .unwrap_or((None, None));

        Self {
            name: s.value,
            inn: data.inn.unwrap_or_default(),
            kpp: data.kpp,
            ogrn: data.ogrn,
            address: data.address.and_then(|a| a.value).unwrap_or_default(),
            status,
            registration_date,
            director,
            director_position,
            okved: data.okved,
        }
    }
}

/// DaData API client
#[derive(Debug, Clone)]
pub struct DadataClient {
    http: reqwest::Client,
    base_url: String,
}

impl DadataClient {
    /// Creates a client with the API token and optional secret key
    pub fn new(token: &str, secret: Option<&str>) -> Result<Self, DadataError> {
        Self::with_base_url(token, secret, DEFAULT_BASE_URL)
    }

    pub fn with_base_url(
        token: &str,
        secret: Option<&str>,
        base_url: &str,
    ) -> Result<Self, DadataError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Token {}", token))
                .map_err(|_| DadataError::InvalidToken)?,
        );
        if let Some(secret) = secret {
            headers.insert(
                "X-Secret",
                HeaderValue::from_str(secret).map_err(|_| DadataError::InvalidToken)?,
            );
        }

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Looks up a single company by INN
    pub async fn find_company(&self, inn: &str) -> Result<Option<CompanyInfo>, DadataError> {
        let response = self
            .post("findById/party", json!({ "query": inn.trim() }))
            .await?;
        let company = response.suggestions.into_iter().next().map(CompanyInfo::from);

        debug!(inn, found = company.is_some(), "DaData lookup");
        Ok(company)
    }

    /// Free-text company search
    pub async fn suggest_companies(
        &self,
        query: &str,
        count: u32,
    ) -> Result<Vec<CompanyInfo>, DadataError> {
        let query = query.trim();
        if query.chars().count() < MIN_QUERY_LEN {
            return Err(DadataError::QueryTooShort);
        }

        let count = count.clamp(1, MAX_SUGGESTIONS);
        let response = self
            .post("suggest/party", json!({ "query": query, "count": count }))
            .await?;

        Ok(response
            .suggestions
            .into_iter()
            .map(CompanyInfo::from)
            .collect())
    }

    async fn post(
        &self,
        path: &str,
        body: serde_json::Value,
    ) -> Result<SuggestResponse, DadataError> {
        let url = format!("{}/{}", self.base_url, path);
        let response = self.http.post(&url).json(&body).send().await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), %message, "DaData request failed");
            return Err(DadataError::Api {
                status: status.as_u16(),
                message,
            });
        }

        Ok(response.json().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FIND_BY_ID: &str = r#"{
        "suggestions": [{
            "value": "PAO SBERBANK",
            "unrestricted_value": "PAO SBERBANK",
            "data": {
                "inn": "7707083893",
                "kpp": "773601001",
                "ogrn": "1027700132195",
                "okved": "64.19",
                "address": { "value": "g Moskva, ul Vavilova, d 19" },
                "state": { "status": "ACTIVE", "registration_date": 677376000000 },
                "management": { "name": "Gref German Oskarovich", "post": "President" }
            }
        }]
    }"#;

    #[test]
    fn test_company_mapping() {
        let response: SuggestResponse = serde_json::from_str(FIND_BY_ID).unwrap();
        let company = CompanyInfo::from(response.suggestions.into_iter().next().unwrap());

        assert_eq!(company.name, "PAO SBERBANK");
        assert_eq!(company.inn, "7707083893");
        assert_eq!(company.kpp.as_deref(), Some("773601001"));
        assert_eq!(company.address, "g Moskva, ul Vavilova, d 19");
        assert_eq!(company.status.as_deref(), Some("ACTIVE"));
        assert_eq!(company.registration_date, Some(677376000000));
        assert_eq!(company.director.as_deref(), Some("Gref German Oskarovich"));
        assert_eq!(company.director_position.as_deref(), Some("President"));
    }

    #[test]
    fn test_sparse_suggestion_mapping() {
        let response: SuggestResponse =
            serde_json::from_str(r#"{"suggestions":[{"value":"IP Ivanov","data":{"inn":"500100732259"}}]}"#)
                .unwrap();
        let company = CompanyInfo::from(response.suggestions.into_iter().next().unwrap());
        assert_eq!(company.address, "");
        assert!(company.director.is_none());
        assert!(company.registration_date.is_none());
    }

    #[test]
    fn test_company_wire_format() {
        let response: SuggestResponse = serde_json::from_str(FIND_BY_ID).unwrap();
        let company = CompanyInfo::from(response.suggestions.into_iter().next().unwrap());
        let json = serde_json::to_value(&company).unwrap();
        assert_eq!(json["directorPosition"], "President");
        assert_eq!(json["registrationDate"], 677376000000i64);
    }

    #[tokio::test]
    async fn test_short_query_rejected_without_request() {
        let client = DadataClient::with_base_url("token", None, "http://127.0.0.1:9").unwrap();
        let err = client.suggest_companies(" ab ", 5).await.unwrap_err();
        assert!(matches!(err, DadataError::QueryTooShort));
    }

    #[test]
    fn test_invalid_token_rejected() {
        assert!(matches!(
            DadataClient::new("bad\ntoken", None),
            Err(DadataError::InvalidToken)
        ));
    }
}
