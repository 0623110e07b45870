use crate::abi::{AbiSource, FileAbi, InlineAbi, RemoteAbi};
use crate::errors::ConfigError;
use crate::ledger::{ColumnSchema, Credentials, LedgerTarget, SheetRange};
use crate::types::{parse_checksummed, parse_token, RESERVED_RECORD_KEYS};
use log::LevelFilter;
use std::collections::HashSet;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use url::Url;
use validator::{Validate, ValidationError};

// Defaults mirror the BSC deployment the ledger was started with.
pub const DEFAULT_RPC_URL: &str = "https://bsc-dataseed.binance.org/";
pub const DEFAULT_ROUTERS: &str = "pancakeswap=0x10ED43C718714eb63d5aA57B78B54704E256024E,\
                                   bakeryswap=0xCDe540d7eAFE93aC5fE6233Bee57E1270D3E330F";
pub const DEFAULT_SHEET_RANGE: &str = "ArbitrageBotSheet!A2:E";
pub const DEFAULT_TOKEN_IN: &str = "0xbb4CdB9CBd36B01bD1cBaEBF2De08d9173bc095c"; // WBNB
pub const DEFAULT_TOKEN_OUT: &str = "0xe9e7CEA3DedcA5984780Bafc599bD69ADd087D56"; // BUSD
pub const DEFAULT_QUOTE_TIMEOUT_MS: u64 = 5000;
pub const DEFAULT_HTTP_PORT: u16 = 8080;
pub const DEFAULT_METRICS_PORT: u16 = 9090;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbiResolution {
    /// Resolve every router ABI before serving; any failure aborts startup.
    Eager,
    /// Resolve on first use; failures only make that router unavailable.
    Lazy,
}

impl FromStr for AbiResolution {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "eager" => Ok(AbiResolution::Eager),
            "lazy" => Ok(AbiResolution::Lazy),
            other => Err(format!("expected eager or lazy, got {other}")),
        }
    }
}

/// Where a router's ABI comes from.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub enum AbiConfig {
    Inline { key: String, json: String },
    File(PathBuf),
    Remote(Url),
}

impl AbiConfig {
    pub fn source(&self) -> Box<dyn AbiSource> {
        match self {
            AbiConfig::Inline { key, json } => Box::new(InlineAbi::new(key.clone(), json.clone())),
            AbiConfig::File(path) => Box::new(FileAbi::new(path.clone())),
            AbiConfig::Remote(url) => Box::new(RemoteAbi::new(url.clone())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct RouterConfig {
    pub name: String,
    pub address: String,
    pub abi: AbiConfig,
}

#[derive(Debug, Clone, Validate)]
pub struct ServiceConfig {
    #[validate(custom = "validate_rpc_url")]
    pub rpc_url: String,
    #[validate(custom = "validate_router_count")]
    pub routers: Vec<RouterConfig>,
    pub abi_resolution: AbiResolution,
    #[validate(length(min = 1, message = "SPREADSHEET_ID must not be empty"))]
    pub spreadsheet_id: String,
    pub sheet_range: SheetRange,
    pub credentials: Credentials,
    pub default_token_in: String,
    pub default_token_out: String,
    #[validate(range(min = 100, max = 120000))]
    pub quote_timeout_ms: u64,
    pub http_port: u16,
    pub metrics_port: u16,
    pub log_level: LevelFilter,
}

impl ServiceConfig {
    /// Reads the process environment (after `.env` has been loaded).
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds and validates the config from any key/value lookup.
    /// Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let get_or = |key: &str, default: &str| get(key).unwrap_or_else(|| default.to_string());

        let routers = parse_routers(&get_or("ROUTERS", DEFAULT_ROUTERS), &get)?;

        let sheet_range = get_or("SHEET_RANGE", DEFAULT_SHEET_RANGE)
            .parse::<SheetRange>()
            .map_err(|reason| invalid("SHEET_RANGE", reason))?;

        let credentials = match get("GOOGLE_ACCESS_TOKEN") {
            Some(token) => Credentials::AccessToken(token),
            None => Credentials::default(),
        };

        let config = Self {
            rpc_url: get_or("RPC_URL", DEFAULT_RPC_URL),
            routers,
            abi_resolution: parse_key(&get, "ABI_RESOLUTION", AbiResolution::Eager)?,
            spreadsheet_id: get("SPREADSHEET_ID")
                .ok_or_else(|| ConfigError::MissingSetting("SPREADSHEET_ID".to_string()))?,
            sheet_range,
            credentials,
            default_token_in: get_or("DEFAULT_TOKEN_IN", DEFAULT_TOKEN_IN),
            default_token_out: get_or("DEFAULT_TOKEN_OUT", DEFAULT_TOKEN_OUT),
            quote_timeout_ms: parse_key(&get, "QUOTE_TIMEOUT_MS", DEFAULT_QUOTE_TIMEOUT_MS)?,
            http_port: parse_key(&get, "HTTP_PORT", DEFAULT_HTTP_PORT)?,
            metrics_port: parse_key(&get, "METRICS_PORT", DEFAULT_METRICS_PORT)?,
            log_level: parse_key(&get, "LOG_LEVEL", LevelFilter::Info)?,
        };
        config.validate_all()?;
        Ok(config)
    }

    pub fn validate_all(&self) -> Result<(), ConfigError> {
        // Run validator derive validations
        self.validate().map_err(|e| invalid("config", e.to_string()))?;

        for router in &self.routers {
            parse_checksummed(&router.address).map_err(|reason| ConfigError::InvalidRouterAddress {
                router: router.name.clone(),
                reason,
            })?;
        }
        parse_token("DEFAULT_TOKEN_IN", &self.default_token_in)
            .map_err(|e| invalid("DEFAULT_TOKEN_IN", e.to_string()))?;
        parse_token("DEFAULT_TOKEN_OUT", &self.default_token_out)
            .map_err(|e| invalid("DEFAULT_TOKEN_OUT", e.to_string()))?;

        self.ledger_target().map(|_| ())
    }

    pub fn router_names(&self) -> Vec<String> {
        self.routers.iter().map(|r| r.name.clone()).collect()
    }

    /// Ledger columns follow the configured router order.
    pub fn ledger_target(&self) -> Result<LedgerTarget, ConfigError> {
        LedgerTarget::new(
            self.spreadsheet_id.clone(),
            self.sheet_range.clone(),
            ColumnSchema::new(self.router_names()),
        )
    }

    pub fn quote_timeout(&self) -> Duration {
        Duration::from_millis(self.quote_timeout_ms)
    }
}

fn invalid(key: &str, reason: impl Into<String>) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        reason: reason.into(),
    }
}

fn parse_key<G, T>(get: &G, key: &str, default: T) -> Result<T, ConfigError>
where
    G: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match get(key) {
        Some(raw) => raw.parse().map_err(|e: T::Err| invalid(key, format!("{raw}: {e}"))),
        None => Ok(default),
    }
}

/// `name=address[,name=address...]`, each with exactly one of
/// `<NAME>_ABI`, `<NAME>_ABI_PATH` or `<NAME>_ABI_URL` set.
fn parse_routers<G>(list: &str, get: &G) -> Result<Vec<RouterConfig>, ConfigError>
where
    G: Fn(&str) -> Option<String>,
{
    let mut seen = HashSet::new();
    let mut routers = Vec::new();

    for entry in list.split(',').map(str::trim).filter(|e| !e.is_empty()) {
        let (name, address) = entry
            .split_once('=')
            .ok_or_else(|| invalid("ROUTERS", format!("{entry}: expected name=address")))?;
        let name = name.trim().to_ascii_lowercase();

        if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(invalid("ROUTERS", format!("invalid router name '{name}'")));
        }
        if RESERVED_RECORD_KEYS.iter().any(|k| k.eq_ignore_ascii_case(&name)) {
            return Err(invalid("ROUTERS", format!("router name '{name}' is reserved")));
        }
        if !seen.insert(name.clone()) {
            return Err(invalid("ROUTERS", format!("duplicate router name '{name}'")));
        }

        let abi = abi_config(&name, get)?;
        routers.push(RouterConfig {
            name,
            address: address.trim().to_string(),
            abi,
        });
    }

    Ok(routers)
}

fn abi_config<G>(name: &str, get: &G) -> Result<AbiConfig, ConfigError>
where
    G: Fn(&str) -> Option<String>,
{
    let prefix = name.to_ascii_uppercase();
    let inline_key = format!("{prefix}_ABI");
    let path_key = format!("{prefix}_ABI_PATH");
    let url_key = format!("{prefix}_ABI_URL");

    let mut found = Vec::new();
    if let Some(json) = get(&inline_key) {
        found.push(AbiConfig::Inline {
            key: inline_key.clone(),
            json,
        });
    }
    if let Some(path) = get(&path_key) {
        found.push(AbiConfig::File(PathBuf::from(path)));
    }
    if let Some(raw) = get(&url_key) {
        let url = Url::parse(&raw).map_err(|e| invalid(&url_key, format!("{raw}: {e}")))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(invalid(&url_key, format!("{raw}: only http(s) is supported")));
        }
        found.push(AbiConfig::Remote(url));
    }

    match found.len() {
        1 => Ok(found.remove(0)),
        0 => Err(ConfigError::MissingSetting(format!(
            "{inline_key}, {path_key} or {url_key}"
        ))),
        _ => Err(invalid(
            &inline_key,
            format!("set only one of {inline_key}, {path_key}, {url_key}"),
        )),
    }
}

// Custom validators
fn validate_router_count(routers: &[RouterConfig]) -> Result<(), ValidationError> {
    if routers.len() < 2 {
        let mut err = ValidationError::new("too_few_routers");
        err.message = Some("at least two routers are needed for a comparison".into());
        return Err(err);
    }
    Ok(())
}

fn validate_rpc_url(url: &str) -> Result<(), ValidationError> {
    if !url.starts_with("http://") && !url.starts_with("https://") {
        return Err(ValidationError::new("invalid_rpc_url"));
    }
    Url::parse(url).map_err(|_| ValidationError::new("invalid_rpc_url"))?;
    Ok(())
}
