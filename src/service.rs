use crate::aggregator::PriceAggregator;
use crate::errors::{ServiceError, ValidationError};
use crate::ledger::{AppendAck, LedgerTarget, LedgerWriter};
use crate::metrics::METRIC_REQUESTS;
use crate::types::{parse_token, QuotePath};
use crate::units::one_unit;
use ethers::types::U256;
use log::info;
use metrics::counter;
use serde::Deserialize;
use std::sync::Arc;

/// Incoming price comparison request.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceRequest {
    #[serde(default)]
    pub token_in: String,
    #[serde(default)]
    pub token_out: String,
}

impl PriceRequest {
    pub fn new(token_in: impl Into<String>, token_out: impl Into<String>) -> Self {
        Self {
            token_in: token_in.into(),
            token_out: token_out.into(),
        }
    }
}

/// Validate → aggregate → persist, for one request.
pub struct PriceService {
    aggregator: PriceAggregator,
    ledger: Arc<dyn LedgerWriter>,
    target: LedgerTarget,
    amount_in: U256,
}

impl PriceService {
    pub fn new(
        aggregator: PriceAggregator,
        ledger: Arc<dyn LedgerWriter>,
        target: LedgerTarget,
    ) -> Self {
        Self {
            aggregator,
            ledger,
            target,
            amount_in: one_unit(),
        }
    }

    pub fn source_names(&self) -> Vec<String> {
        self.aggregator.source_names()
    }

    pub fn target(&self) -> &LedgerTarget {
        &self.target
    }

    /// The ledger is only reached with a record the aggregator fully built;
    /// dropping this future earlier abandons the router calls and writes nothing.
    pub async fn handle(&self, request: &PriceRequest) -> Result<AppendAck, ServiceError> {
        counter!(METRIC_REQUESTS, 1);

        let token_in = parse_token("tokenIn", &request.token_in)?;
        let token_out = parse_token("tokenOut", &request.token_out)?;
        if token_in == token_out {
            return Err(ValidationError::IdenticalTokens.into());
        }
        let path = QuotePath::new(vec![token_in, token_out], self.amount_in)?;

        let record = self.aggregator.compare_quotes(&path).await?;
        let ack = self.ledger.append(&self.target, record).await?;

        info!(
            "Recorded {} -> {} at {} ({} cells)",
            ack.record.token_in, ack.record.token_out, ack.record.timestamp, ack.updated_cells
        );
        Ok(ack)
    }
}
