use crate::errors::LedgerError;
use async_trait::async_trait;
use log::{debug, info};
use serde::Deserialize;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

/// Default service-account token endpoint of the GCE/Cloud Run metadata server.
pub const METADATA_TOKEN_URL: &str =
    "http://metadata.google.internal/computeMetadata/v1/instance/service-accounts/default/token";

/// Refresh this long before the token actually expires.
const EXPIRY_SKEW: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
pub struct AccessToken {
    pub value: String,
    pub expires_at: Option<Instant>,
}

impl AccessToken {
    fn is_fresh(&self) -> bool {
        self.expires_at
            .map_or(true, |at| Instant::now() + EXPIRY_SKEW < at)
    }
}

#[async_trait]
pub trait TokenSource: Send + Sync {
    async fn fetch(&self, http: &reqwest::Client) -> Result<AccessToken, LedgerError>;
}

/// A bearer token handed in through configuration. Never expires locally.
pub struct StaticToken(pub String);

#[async_trait]
impl TokenSource for StaticToken {
    async fn fetch(&self, _http: &reqwest::Client) -> Result<AccessToken, LedgerError> {
        Ok(AccessToken {
            value: self.0.clone(),
            expires_at: None,
        })
    }
}

#[derive(Deserialize)]
struct MetadataToken {
    access_token: String,
    expires_in: u64,
}

/// Application-default credentials of the runtime's service account.
pub struct MetadataServerToken {
    pub url: String,
}

impl Default for MetadataServerToken {
    fn default() -> Self {
        Self {
            url: METADATA_TOKEN_URL.to_string(),
        }
    }
}

#[async_trait]
impl TokenSource for MetadataServerToken {
    async fn fetch(&self, http: &reqwest::Client) -> Result<AccessToken, LedgerError> {
        let response = http
            .get(&self.url)
            .header("Metadata-Flavor", "Google")
            .send()
            .await
            .map_err(|e| LedgerError::Auth(format!("metadata server unreachable: {e}")))?;

        if !response.status().is_success() {
            return Err(LedgerError::Auth(format!(
                "metadata server returned {}",
                response.status()
            )));
        }

        let token: MetadataToken = response
            .json()
            .await
            .map_err(|e| LedgerError::Auth(format!("bad metadata token payload: {e}")))?;

        Ok(AccessToken {
            value: token.access_token,
            expires_at: Some(Instant::now() + Duration::from_secs(token.expires_in)),
        })
    }
}

/// Caches the current token and refreshes it lazily. One per process.
pub struct AuthSession {
    source: Box<dyn TokenSource>,
    cached: Mutex<Option<AccessToken>>,
}

impl AuthSession {
    pub fn new(source: Box<dyn TokenSource>) -> Self {
        Self {
            source,
            cached: Mutex::new(None),
        }
    }

    /// Returns a fresh bearer token, fetching a new one only when needed.
    /// The lock is held across the fetch so concurrent callers share it.
    pub async fn bearer(&self, http: &reqwest::Client) -> Result<String, LedgerError> {
        let mut cached = self.cached.lock().await;
        if let Some(token) = cached.as_ref().filter(|t| t.is_fresh()) {
            return Ok(token.value.clone());
        }

        debug!("Fetching ledger access token");
        let token = self.source.fetch(http).await?;
        let value = token.value.clone();
        *cached = Some(token);
        info!("Ledger access token refreshed");
        Ok(value)
    }

    /// Drops the cached token, e.g. after the API answered 401.
    pub async fn invalidate(&self) {
        self.cached.lock().await.take();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct CountingSource {
        calls: Arc<AtomicUsize>,
        ttl: Option<Duration>,
    }

    #[async_trait]
    impl TokenSource for CountingSource {
        async fn fetch(&self, _http: &reqwest::Client) -> Result<AccessToken, LedgerError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(AccessToken {
                value: format!("token-{n}"),
                expires_at: self.ttl.map(|ttl| Instant::now() + ttl),
            })
        }
    }

    #[tokio::test]
    async fn test_token_is_cached() {
        let calls = Arc::new(AtomicUsize::new(0));
        let session = AuthSession::new(Box::new(CountingSource {
            calls: calls.clone(),
            ttl: Some(Duration::from_secs(3600)),
        }));
        let http = reqwest::Client::new();

        assert_eq!(session.bearer(&http).await.unwrap(), "token-0");
        assert_eq!(session.bearer(&http).await.unwrap(), "token-0");
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        session.invalidate().await;
        assert_eq!(session.bearer(&http).await.unwrap(), "token-1");
    }

    #[tokio::test]
    async fn test_expiring_token_is_refreshed() {
        let calls = Arc::new(AtomicUsize::new(0));
        let session = AuthSession::new(Box::new(CountingSource {
            calls: calls.clone(),
            ttl: Some(Duration::from_secs(30)),
        }));
        let http = reqwest::Client::new();

        session.bearer(&http).await.unwrap();
        session.bearer(&http).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
