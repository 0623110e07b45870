pub mod auth;
pub mod sheets;
pub mod target;

pub use sheets::{Credentials, HttpSheetsApi};
pub use target::{ColumnSchema, LedgerTarget, SheetRange};

use crate::errors::{LedgerError, ValidationError};
use crate::metrics::{METRIC_LEDGER_APPENDS, METRIC_LEDGER_APPEND_FAILURES};
use crate::types::PriceRecord;
use async_trait::async_trait;
use log::{error, info};
use metrics::counter;
use serde_json::Value;

/// What the store reported back for one append.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AppendResponse {
    pub updated_range: String,
    pub updated_rows: u64,
    pub updated_cells: u64,
}

/// Successful append. Hands the record back to the caller.
#[derive(Debug, Clone)]
pub struct AppendAck {
    pub record: PriceRecord,
    pub updated_range: String,
    pub updated_rows: u64,
    pub updated_cells: u64,
}

/// Append-only sink for price records.
#[async_trait]
pub trait LedgerWriter: Send + Sync {
    /// Appends exactly one row. Never retried: a lost acknowledgement
    /// followed by a blind retry would duplicate the row.
    async fn append(
        &self,
        target: &LedgerTarget,
        record: PriceRecord,
    ) -> Result<AppendAck, LedgerError>;
}

/// Raw spreadsheet append call.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SheetsApi: Send + Sync {
    async fn append_rows(
        &self,
        spreadsheet_id: &str,
        range: &str,
        rows: Vec<Vec<Value>>,
    ) -> Result<AppendResponse, LedgerError>;
}

/// Ledger writer on top of a spreadsheet API.
pub struct SheetsLedger<A> {
    api: A,
}

impl<A: SheetsApi> SheetsLedger<A> {
    pub fn new(api: A) -> Self {
        Self { api }
    }
}

#[async_trait]
impl<A: SheetsApi> LedgerWriter for SheetsLedger<A> {
    async fn append(
        &self,
        target: &LedgerTarget,
        record: PriceRecord,
    ) -> Result<AppendAck, LedgerError> {
        let row = build_row(&target.schema, &record)?;
        let range = target.range.to_string();

        match self.api.append_rows(&target.spreadsheet_id, &range, vec![row]).await {
            Ok(response) => {
                counter!(METRIC_LEDGER_APPENDS, 1);
                info!(
                    "Data written to ledger {}: {} cells",
                    response.updated_range, response.updated_cells
                );
                Ok(AppendAck {
                    record,
                    updated_range: response.updated_range,
                    updated_rows: response.updated_rows,
                    updated_cells: response.updated_cells,
                })
            }
            Err(e) => {
                counter!(METRIC_LEDGER_APPEND_FAILURES, 1);
                error!("Failed to write record {} to ledger: {}", record.timestamp, e);
                Err(e)
            }
        }
    }
}

/// Logs rows instead of writing them. Used by `snapshot --dry-run`.
pub struct DryRunLedger;

#[async_trait]
impl LedgerWriter for DryRunLedger {
    async fn append(
        &self,
        target: &LedgerTarget,
        record: PriceRecord,
    ) -> Result<AppendAck, LedgerError> {
        let row = build_row(&target.schema, &record)?;
        info!("[dry-run] would append to {}: {}", target.range, Value::Array(row.clone()));
        Ok(AppendAck {
            record,
            updated_range: target.range.to_string(),
            updated_rows: 0,
            updated_cells: 0,
        })
    }
}

/// Mandatory fields must be present: the ledger is positional, so a
/// missing value would shift every later column.
pub fn validate_record(record: &PriceRecord) -> Result<(), ValidationError> {
    if record.timestamp.trim().is_empty() {
        return Err(ValidationError::MissingField("timestamp"));
    }
    if record.token_in.trim().is_empty() {
        return Err(ValidationError::MissingField("tokenIn"));
    }
    if record.token_out.trim().is_empty() {
        return Err(ValidationError::MissingField("tokenOut"));
    }
    Ok(())
}

/// Lays a record out in schema order. Failed sources become empty cells.
pub fn build_row(schema: &ColumnSchema, record: &PriceRecord) -> Result<Vec<Value>, LedgerError> {
    validate_record(record)?;

    if record.prices.len() != schema.sources.len() {
        return Err(LedgerError::Schema(format!(
            "record has {} price slots, schema v{} expects {}",
            record.prices.len(),
            schema.version,
            schema.sources.len()
        )));
    }

    let mut row = vec![
        Value::from(record.timestamp.clone()),
        Value::from(record.token_in.clone()),
        Value::from(record.token_out.clone()),
    ];
    for source in &schema.sources {
        let slot = record.slot(source).ok_or_else(|| {
            LedgerError::Schema(format!("record has no slot for column {source}"))
        })?;
        row.push(match slot.price {
            Some(price) => Value::from(price),
            None => Value::from(""),
        });
    }
    Ok(row)
}
