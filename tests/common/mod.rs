#![allow(dead_code)]

use async_trait::async_trait;
use ethers::types::{Address, U256};
use ethers::utils::to_checksum;
use quote_ledger::abi::{parse_interface, GET_AMOUNTS_OUT_ABI};
use quote_ledger::errors::{LedgerError, QuoteError};
use quote_ledger::ledger::{AppendResponse, ColumnSchema, LedgerTarget, SheetsApi};
use quote_ledger::quoter::{RouterCaller, RouterEntry};
use quote_ledger::types::RouterSource;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const WBNB: &str = "0xbb4CdB9CBd36B01bD1cBaEBF2De08d9173bc095c";
pub const BUSD: &str = "0xe9e7CEA3DedcA5984780Bafc599bD69ADd087D56";

/// `whole` tokens plus `tenths`/10, in 18-decimal base units.
pub fn amount(whole: u64, tenths: u64) -> U256 {
    U256::exp10(18) * U256::from(whole) + U256::exp10(17) * U256::from(tenths)
}

pub fn router(name: &str) -> RouterEntry {
    let interface = parse_interface("test", GET_AMOUNTS_OUT_ABI.as_bytes()).unwrap();
    let address = to_checksum(&Address::random(), None);
    RouterSource::new(name, &address, interface).unwrap().into()
}

pub fn target(sources: &[&str]) -> LedgerTarget {
    let last_column = (b'A' + 2 + sources.len() as u8) as char;
    LedgerTarget::new(
        "sheet-id",
        format!("ArbitrageBotSheet!A2:{last_column}").parse().unwrap(),
        ColumnSchema::new(sources.iter().map(|s| s.to_string()).collect()),
    )
    .unwrap()
}

#[derive(Clone)]
pub enum Behaviour {
    /// Replies with `[amount_in, out]` after `delay`.
    Quote { out: U256, delay: Duration },
    /// Replies with exactly these amounts.
    Raw(Vec<U256>),
    /// Quotes `factor` times the last byte of the output token, after a
    /// delay that also depends on the path, so concurrent requests finish
    /// out of order.
    Echo { factor: u64 },
    Fail(QuoteError),
    Hang,
}

impl Behaviour {
    pub fn quote(out: U256) -> Self {
        Behaviour::Quote {
            out,
            delay: Duration::ZERO,
        }
    }

    pub fn slow(out: U256, delay: Duration) -> Self {
        Behaviour::Quote { out, delay }
    }
}

/// Scripted router caller keyed by router name. Tracks how many calls
/// overlap so tests can tell a fan-out from a sequential loop.
#[derive(Default)]
pub struct FakeCaller {
    behaviours: HashMap<String, Behaviour>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    calls: Mutex<Vec<(String, Vec<Address>)>>,
}

impl FakeCaller {
    pub fn new(behaviours: impl IntoIterator<Item = (&'static str, Behaviour)>) -> Self {
        Self {
            behaviours: behaviours
                .into_iter()
                .map(|(name, b)| (name.to_string(), b))
                .collect(),
            ..Default::default()
        }
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> Vec<(String, Vec<Address>)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl RouterCaller for FakeCaller {
    async fn get_amounts_out(
        &self,
        router: &RouterSource,
        amount_in: U256,
        path: &[Address],
    ) -> Result<Vec<U256>, QuoteError> {
        self.calls
            .lock()
            .unwrap()
            .push((router.name().to_string(), path.to_vec()));
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        let behaviour = self
            .behaviours
            .get(router.name())
            .cloned()
            .unwrap_or(Behaviour::Fail(QuoteError::Chain {
                reason: "unscripted router".into(),
            }));

        let result = match behaviour {
            Behaviour::Quote { out, delay } => {
                tokio::time::sleep(delay).await;
                Ok(vec![amount_in, out])
            }
            Behaviour::Echo { factor } => {
                let tag = path.last().map(|t| t.as_bytes()[19]).unwrap_or_default();
                tokio::time::sleep(Duration::from_millis(u64::from(tag % 7) * 5)).await;
                Ok(vec![amount_in, U256::exp10(18) * U256::from(u64::from(tag) * factor)])
            }
            Behaviour::Raw(amounts) => Ok(amounts),
            Behaviour::Fail(e) => Err(e),
            Behaviour::Hang => std::future::pending::<Result<Vec<U256>, QuoteError>>().await,
        };

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

/// In-memory spreadsheet that keeps every appended row.
#[derive(Clone, Default)]
pub struct FakeSheets {
    rows: Arc<Mutex<Vec<Vec<Value>>>>,
    fail_with: Option<u16>,
}

impl FakeSheets {
    pub fn failing(status: u16) -> Self {
        Self {
            fail_with: Some(status),
            ..Default::default()
        }
    }

    pub fn rows(&self) -> Vec<Vec<Value>> {
        self.rows.lock().unwrap().clone()
    }
}

#[async_trait]
impl SheetsApi for FakeSheets {
    async fn append_rows(
        &self,
        _spreadsheet_id: &str,
        range: &str,
        rows: Vec<Vec<Value>>,
    ) -> Result<AppendResponse, LedgerError> {
        if let Some(status) = self.fail_with {
            return Err(LedgerError::Api {
                status,
                message: "backend unavailable".into(),
            });
        }

        let mut stored = self.rows.lock().unwrap();
        let updated_cells = rows.iter().map(|r| r.len() as u64).sum();
        let updated_rows = rows.len() as u64;
        stored.extend(rows);

        Ok(AppendResponse {
            updated_range: format!("{range} (row {})", stored.len() + 1),
            updated_rows,
            updated_cells,
        })
    }
}
