use super::auth::{AuthSession, MetadataServerToken, StaticToken, TokenSource, METADATA_TOKEN_URL};
use super::{AppendResponse, SheetsApi};
use crate::errors::LedgerError;
use async_trait::async_trait;
use log::{debug, warn};
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tokio::sync::OnceCell;
use url::Url;

pub const SHEETS_API_BASE: &str = "https://sheets.googleapis.com/v4/";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// How the process authenticates against the Sheets API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credentials {
    AccessToken(String),
    MetadataServer { token_url: String },
}

impl Default for Credentials {
    fn default() -> Self {
        Credentials::MetadataServer {
            token_url: METADATA_TOKEN_URL.to_string(),
        }
    }
}

impl Credentials {
    fn token_source(&self) -> Box<dyn TokenSource> {
        match self {
            Credentials::AccessToken(token) => Box::new(StaticToken(token.clone())),
            Credentials::MetadataServer { token_url } => Box::new(MetadataServerToken {
                url: token_url.clone(),
            }),
        }
    }
}

struct Session {
    http: reqwest::Client,
    auth: AuthSession,
}

/// Google Sheets `values:append` over HTTPS. The HTTP client and token
/// cache are created on first use and then shared for the process lifetime.
pub struct HttpSheetsApi {
    base: Url,
    credentials: Credentials,
    session: OnceCell<Session>,
}

impl HttpSheetsApi {
    pub fn new(credentials: Credentials) -> Result<Self, LedgerError> {
        Self::with_base(SHEETS_API_BASE, credentials)
    }

    pub fn with_base(base: &str, credentials: Credentials) -> Result<Self, LedgerError> {
        let base = Url::parse(base).map_err(|e| LedgerError::Transport(format!("{base}: {e}")))?;
        Ok(Self {
            base,
            credentials,
            session: OnceCell::new(),
        })
    }

    async fn session(&self) -> Result<&Session, LedgerError> {
        self.session
            .get_or_try_init(|| async {
                debug!("Creating ledger session");
                let http = reqwest::Client::builder()
                    .timeout(REQUEST_TIMEOUT)
                    .build()
                    .map_err(|e| LedgerError::Transport(e.to_string()))?;
                Ok::<_, LedgerError>(Session {
                    http,
                    auth: AuthSession::new(self.credentials.token_source()),
                })
            })
            .await
    }

    fn append_url(&self, spreadsheet_id: &str, range: &str) -> Result<Url, LedgerError> {
        let endpoint = format!("{range}:append");
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| LedgerError::Transport(format!("{} cannot be a base URL", self.base)))?
            .pop_if_empty()
            .extend(["spreadsheets", spreadsheet_id, "values", endpoint.as_str()]);
        url.query_pairs_mut()
            .append_pair("valueInputOption", "RAW")
            .append_pair("insertDataOption", "INSERT_ROWS");
        Ok(url)
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AppendBody {
    updates: Option<Updates>,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct Updates {
    #[serde(default)]
    updated_range: String,
    #[serde(default)]
    updated_rows: u64,
    #[serde(default)]
    updated_cells: u64,
}

#[async_trait]
impl SheetsApi for HttpSheetsApi {
    async fn append_rows(
        &self,
        spreadsheet_id: &str,
        range: &str,
        rows: Vec<Vec<Value>>,
    ) -> Result<AppendResponse, LedgerError> {
        let session = self.session().await?;
        let token = session.auth.bearer(&session.http).await?;
        let url = self.append_url(spreadsheet_id, range)?;

        let response = session
            .http
            .post(url)
            .bearer_auth(token)
            .json(&json!({ "majorDimension": "ROWS", "values": rows }))
            .send()
            .await
            .map_err(|e| LedgerError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            if status == StatusCode::UNAUTHORIZED {
                // next append fetches a new token; this one is not retried
                session.auth.invalidate().await;
            }
            warn!("Sheets append returned {}: {}", status, body);
            return Err(classify_error(status, &body));
        }

        let body: AppendBody = response
            .json()
            .await
            .map_err(|e| LedgerError::Transport(format!("unreadable append response: {e}")))?;
        let updates = body.updates.unwrap_or_default();

        Ok(AppendResponse {
            updated_range: updates.updated_range,
            updated_rows: updates.updated_rows,
            updated_cells: updates.updated_cells,
        })
    }
}

/// Maps an error response of the Sheets API onto the ledger taxonomy.
pub fn classify_error(status: StatusCode, body: &str) -> LedgerError {
    let message = serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v["error"]["message"].as_str().map(str::to_string))
        .unwrap_or_else(|| body.to_string());

    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => LedgerError::Auth(message),
        StatusCode::NOT_FOUND => LedgerError::NotFound(message),
        StatusCode::TOO_MANY_REQUESTS => LedgerError::RateLimited(message),
        StatusCode::BAD_REQUEST => LedgerError::Schema(message),
        _ => LedgerError::Api {
            status: status.as_u16(),
            message,
        },
    }
}
