use crate::abi::ContractInterface;
use crate::errors::{QuoteError, ValidationError};
use ethers::types::{Address, U256};
use ethers::utils::to_checksum;
use serde::ser::{Serialize, SerializeMap, Serializer};
use std::collections::BTreeMap;
use std::str::FromStr;

/// Record keys that router names may not shadow.
pub const RESERVED_RECORD_KEYS: &[&str] = &["timestamp", "tokenIn", "tokenOut", "errors"];

/// One configured router contract. Built once at startup (or on first use
/// when ABI resolution is deferred) and never changed afterwards.
#[derive(Debug, Clone)]
pub struct RouterSource {
    name: String,
    address: Address,
    interface: ContractInterface,
}

impl RouterSource {
    /// `address` must be in EIP-55 checksummed form.
    pub fn new(
        name: impl Into<String>,
        address: &str,
        interface: ContractInterface,
    ) -> Result<Self, String> {
        Ok(Self {
            name: name.into(),
            address: parse_checksummed(address)?,
            interface,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn interface(&self) -> &ContractInterface {
        &self.interface
    }
}

/// Parses a `0x`-prefixed 20-byte hex address in any letter case.
pub fn parse_address(value: &str) -> Result<Address, String> {
    let hex = value
        .strip_prefix("0x")
        .ok_or_else(|| format!("{value} is missing the 0x prefix"))?;
    if hex.len() != 40 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(format!("{value} is not a 20-byte hex address"));
    }
    Address::from_str(hex).map_err(|e| format!("{value}: {e}"))
}

/// Like `parse_address` but also requires the EIP-55 checksum casing.
pub fn parse_checksummed(value: &str) -> Result<Address, String> {
    let address = parse_address(value)?;
    if to_checksum(&address, None) != value {
        return Err(format!("{value} is not in checksummed form"));
    }
    Ok(address)
}

pub fn parse_token(field: &'static str, value: &str) -> Result<Address, ValidationError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ValidationError::MissingField(field));
    }
    parse_address(value).map_err(|_| ValidationError::InvalidToken {
        field,
        value: value.to_string(),
    })
}

/// Token route plus input amount in smallest units.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuotePath {
    tokens: Vec<Address>,
    amount_in: U256,
}

impl QuotePath {
    pub fn new(tokens: Vec<Address>, amount_in: U256) -> Result<Self, ValidationError> {
        if tokens.len() < 2 {
            return Err(ValidationError::PathTooShort(tokens.len()));
        }
        if amount_in.is_zero() {
            return Err(ValidationError::ZeroAmount);
        }
        Ok(Self { tokens, amount_in })
    }

    pub fn tokens(&self) -> &[Address] {
        &self.tokens
    }

    pub fn amount_in(&self) -> U256 {
        self.amount_in
    }

    pub fn token_in(&self) -> Address {
        self.tokens[0]
    }

    pub fn token_out(&self) -> Address {
        self.tokens[self.tokens.len() - 1]
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QuoteAmount {
    /// Output in smallest units, as reported by the router.
    pub raw: U256,
    pub decimal: f64,
}

/// One router's answer for one path.
#[derive(Debug, Clone, PartialEq)]
pub struct Quote {
    pub source: String,
    pub outcome: Result<QuoteAmount, QuoteError>,
}

impl Quote {
    pub fn filled(source: impl Into<String>, amount: QuoteAmount) -> Self {
        Self {
            source: source.into(),
            outcome: Ok(amount),
        }
    }

    pub fn failed(source: impl Into<String>, error: QuoteError) -> Self {
        Self {
            source: source.into(),
            outcome: Err(error),
        }
    }

    pub fn is_success(&self) -> bool {
        self.outcome.is_ok()
    }
}

/// Price slot of a single source inside a record. `price` is `None` when
/// the source failed; it is never zero-filled.
#[derive(Debug, Clone, PartialEq)]
pub struct SourcePrice {
    pub source: String,
    pub price: Option<f64>,
    pub error: Option<String>,
}

impl From<Quote> for SourcePrice {
    fn from(quote: Quote) -> Self {
        match quote.outcome {
            Ok(amount) => Self {
                source: quote.source,
                price: Some(amount.decimal),
                error: None,
            },
            Err(e) => Self {
                source: quote.source,
                price: None,
                error: Some(e.to_string()),
            },
        }
    }
}

/// The unit of ledger persistence.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceRecord {
    pub timestamp: String,
    pub token_in: String,
    pub token_out: String,
    pub prices: Vec<SourcePrice>,
}

impl PriceRecord {
    pub fn price(&self, source: &str) -> Option<f64> {
        self.slot(source).and_then(|slot| slot.price)
    }

    pub fn slot(&self, source: &str) -> Option<&SourcePrice> {
        self.prices.iter().find(|slot| slot.source == source)
    }
}

impl Serialize for PriceRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let errors: BTreeMap<&str, &str> = self
            .prices
            .iter()
            .filter_map(|slot| slot.error.as_deref().map(|e| (slot.source.as_str(), e)))
            .collect();

        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry("timestamp", &self.timestamp)?;
        map.serialize_entry("tokenIn", &self.token_in)?;
        map.serialize_entry("tokenOut", &self.token_out)?;
        for slot in &self.prices {
            map.serialize_entry(&slot.source, &slot.price)?;
        }
        if !errors.is_empty() {
            map.serialize_entry("errors", &errors)?;
        }
        map.end()
    }
}
