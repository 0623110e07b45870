use crate::errors::ConfigError;
use async_trait::async_trait;
use ethers_core::abi::{Abi, Function, ParamType};
use log::{debug, info};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// Name of the router quote function every ABI must declare.
pub const QUOTE_FUNCTION: &str = "getAmountsOut";

const REMOTE_FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Parsed router ABI, guaranteed to expose the quote function.
#[derive(Debug, Clone)]
pub struct ContractInterface {
    abi: Arc<Abi>,
}

impl ContractInterface {
    pub fn abi(&self) -> &Abi {
        &self.abi
    }

    pub fn quote_function(&self) -> Option<&Function> {
        self.abi
            .functions
            .get(QUOTE_FUNCTION)
            .and_then(|overloads| overloads.iter().find(|f| is_quote_signature(f)))
    }
}

/// Somewhere the raw ABI JSON can be read from.
#[async_trait]
pub trait AbiSource: Send + Sync {
    /// Human readable origin used in errors and logs.
    fn origin(&self) -> String;

    async fn raw(&self) -> Result<Vec<u8>, ConfigError>;
}

/// ABI text supplied directly, e.g. through an environment variable.
pub struct InlineAbi {
    label: String,
    json: String,
}

impl InlineAbi {
    pub fn new(label: impl Into<String>, json: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            json: json.into(),
        }
    }
}

#[async_trait]
impl AbiSource for InlineAbi {
    fn origin(&self) -> String {
        format!("inline value {}", self.label)
    }

    async fn raw(&self) -> Result<Vec<u8>, ConfigError> {
        Ok(self.json.as_bytes().to_vec())
    }
}

pub struct FileAbi {
    path: PathBuf,
}

impl FileAbi {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl AbiSource for FileAbi {
    fn origin(&self) -> String {
        format!("file {}", self.path.display())
    }

    async fn raw(&self) -> Result<Vec<u8>, ConfigError> {
        tokio::fs::read(&self.path)
            .await
            .map_err(|e| ConfigError::AbiUnavailable {
                origin: self.origin(),
                reason: e.to_string(),
            })
    }
}

pub struct RemoteAbi {
    url: Url,
    http: reqwest::Client,
}

impl RemoteAbi {
    pub fn new(url: Url) -> Self {
        Self::with_client(url, reqwest::Client::new())
    }

    pub fn with_client(url: Url, http: reqwest::Client) -> Self {
        Self { url, http }
    }
}

#[async_trait]
impl AbiSource for RemoteAbi {
    fn origin(&self) -> String {
        format!("url {}", self.url)
    }

    async fn raw(&self) -> Result<Vec<u8>, ConfigError> {
        let unavailable = |reason: String| ConfigError::AbiUnavailable {
            origin: self.origin(),
            reason,
        };

        let response = self
            .http
            .get(self.url.clone())
            .timeout(REMOTE_FETCH_TIMEOUT)
            .send()
            .await
            .map_err(|e| unavailable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(unavailable(format!("HTTP {status}")));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| unavailable(e.to_string()))?;
        Ok(body.to_vec())
    }
}

/// Reads, parses and validates an ABI from any source.
pub async fn resolve(source: &dyn AbiSource) -> Result<ContractInterface, ConfigError> {
    let origin = source.origin();
    debug!("Resolving router ABI from {}", origin);

    let raw = source.raw().await?;
    let interface = parse_interface(&origin, &raw)?;

    info!("Resolved router ABI from {}", origin);
    Ok(interface)
}

/// Validation shared by every source: a non-empty JSON array of ABI
/// entries that includes the quote function with the expected signature.
pub fn parse_interface(origin: &str, raw: &[u8]) -> Result<ContractInterface, ConfigError> {
    let malformed = |reason: String| ConfigError::MalformedAbi {
        origin: origin.to_string(),
        reason,
    };

    let value: serde_json::Value =
        serde_json::from_slice(raw).map_err(|e| malformed(e.to_string()))?;

    let entries = value
        .as_array()
        .ok_or_else(|| malformed("expected a JSON array of ABI entries".to_string()))?;
    if entries.is_empty() {
        return Err(ConfigError::EmptyAbi {
            origin: origin.to_string(),
        });
    }

    let abi: Abi = serde_json::from_value(value).map_err(|e| malformed(e.to_string()))?;
    let interface = ContractInterface { abi: Arc::new(abi) };

    if interface.quote_function().is_none() {
        return Err(ConfigError::MissingQuoteFunction {
            origin: origin.to_string(),
        });
    }

    Ok(interface)
}

fn is_quote_signature(function: &Function) -> bool {
    let inputs: Vec<&ParamType> = function.inputs.iter().map(|p| &p.kind).collect();
    let outputs: Vec<&ParamType> = function.outputs.iter().map(|p| &p.kind).collect();

    matches!(
        inputs.as_slice(),
        [ParamType::Uint(256), ParamType::Array(path)] if **path == ParamType::Address
    ) && matches!(
        outputs.as_slice(),
        [ParamType::Array(amounts)] if **amounts == ParamType::Uint(256)
    )
}

/// Minimal router ABI with only the quote function, handy for tests and demos.
pub const GET_AMOUNTS_OUT_ABI: &str = r#"[
  {
    "inputs": [
      { "internalType": "uint256", "name": "amountIn", "type": "uint256" },
      { "internalType": "address[]", "name": "path", "type": "address[]" }
    ],
    "name": "getAmountsOut",
    "outputs": [
      { "internalType": "uint256[]", "name": "amounts", "type": "uint256[]" }
    ],
    "stateMutability": "view",
    "type": "function"
  }
]"#;
