use thiserror::Error;

/// Fatal startup errors. The service must not serve requests after one of these.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing required setting: {0}")]
    MissingSetting(String),

    #[error("Invalid value for {key}: {reason}")]
    InvalidValue { key: String, reason: String },

    #[error("Invalid router address for {router}: {reason}")]
    InvalidRouterAddress { router: String, reason: String },

    #[error("ABI from {origin} could not be read: {reason}")]
    AbiUnavailable { origin: String, reason: String },

    #[error("ABI from {origin} is malformed: {reason}")]
    MalformedAbi { origin: String, reason: String },

    #[error("ABI from {origin} is empty")]
    EmptyAbi { origin: String },

    #[error("ABI from {origin} does not declare getAmountsOut(uint256,address[]) returns (uint256[])")]
    MissingQuoteFunction { origin: String },
}

/// Caller-side faults, rejected before any outbound call.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    #[error("Invalid token address for {field}: {value}")]
    InvalidToken { field: &'static str, value: String },

    #[error("Quote path needs at least 2 tokens, got {0}")]
    PathTooShort(usize),

    #[error("Input amount must be greater than zero")]
    ZeroAmount,

    #[error("tokenIn and tokenOut must differ")]
    IdenticalTokens,
}

/// Per-router failures. These end up inside a failed `Quote`, never raised.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QuoteError {
    #[error("source unavailable: {reason}")]
    SourceUnavailable { reason: String },

    #[error("timed out after {after_ms}ms")]
    Timeout { after_ms: u64 },

    #[error("chain call failed: {reason}")]
    Chain { reason: String },

    #[error("malformed response: {reason}")]
    MalformedResponse { reason: String },

    #[error("unit conversion failed: {reason}")]
    Conversion { reason: String },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AggregationError {
    #[error("All {} sources failed: {}", .failures.len(), format_failures(.failures))]
    AllSourcesFailed { failures: Vec<(String, QuoteError)> },
}

fn format_failures(failures: &[(String, QuoteError)]) -> String {
    failures
        .iter()
        .map(|(source, error)| format!("{source}: {error}"))
        .collect::<Vec<_>>()
        .join("; ")
}

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("Record rejected: {0}")]
    Validation(#[from] ValidationError),

    #[error("Record does not match ledger schema: {0}")]
    Schema(String),

    #[error("Ledger authentication failed: {0}")]
    Auth(String),

    #[error("Ledger target not found: {0}")]
    NotFound(String),

    #[error("Ledger rate limit exceeded: {0}")]
    RateLimited(String),

    #[error("Ledger API error {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Ledger transport error: {0}")]
    Transport(String),
}

/// Request-level failures reported to the boundary.
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Aggregation(#[from] AggregationError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),
}
