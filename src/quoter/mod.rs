pub mod router;

pub use router::{DeferredRouter, RouterEntry};

use crate::abi::QUOTE_FUNCTION;
use crate::errors::QuoteError;
use crate::metrics::{METRIC_QUOTES, METRIC_QUOTE_LATENCY};
use crate::types::{Quote, QuoteAmount, QuotePath, RouterSource};
use crate::units::to_decimal;
use async_trait::async_trait;
use ethers::contract::Contract;
use ethers::providers::Middleware;
use ethers::types::{Address, U256};
use log::{debug, warn};
use metrics::{counter, histogram};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Read-only access to a router's `getAmountsOut`.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RouterCaller: Send + Sync {
    async fn get_amounts_out(
        &self,
        router: &RouterSource,
        amount_in: U256,
        path: &[Address],
    ) -> Result<Vec<U256>, QuoteError>;
}

/// `RouterCaller` backed by an ethers middleware (an `eth_call`, no transaction).
pub struct EthersRouterCaller<M> {
    client: Arc<M>,
}

impl<M: Middleware + 'static> EthersRouterCaller<M> {
    pub fn new(client: Arc<M>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl<M: Middleware + 'static> RouterCaller for EthersRouterCaller<M> {
    async fn get_amounts_out(
        &self,
        router: &RouterSource,
        amount_in: U256,
        path: &[Address],
    ) -> Result<Vec<U256>, QuoteError> {
        // call by selector so an overloaded ABI hits the validated signature
        let selector = router
            .interface()
            .quote_function()
            .map(|f| f.short_signature())
            .ok_or_else(|| QuoteError::SourceUnavailable {
                reason: format!("{} has no {} function", router.name(), QUOTE_FUNCTION),
            })?;

        let contract = Contract::<M>::new(
            router.address(),
            router.interface().abi().clone(),
            self.client.clone(),
        );

        let call = contract
            .method_hash::<_, Vec<U256>>(selector, (amount_in, path.to_vec()))
            .map_err(|e| QuoteError::MalformedResponse {
                reason: e.to_string(),
            })?;

        call.call().await.map_err(|e| QuoteError::Chain {
            reason: e.to_string(),
        })
    }
}

/// Quotes `path` on one router. Never fails: every error, including the
/// timeout and a deferred ABI that cannot be resolved, lands in the `Quote`.
pub async fn get_quote(
    caller: &dyn RouterCaller,
    router: &RouterEntry,
    path: &QuotePath,
    timeout: Duration,
) -> Quote {
    let name = router.name().to_string();
    let started = Instant::now();

    let outcome = match tokio::time::timeout(timeout, fetch_amount(caller, router, path)).await {
        Ok(outcome) => outcome,
        Err(_) => Err(QuoteError::Timeout {
            after_ms: timeout.as_millis() as u64,
        }),
    };

    histogram!(METRIC_QUOTE_LATENCY, started.elapsed().as_secs_f64(), "source" => name.clone());

    match outcome {
        Ok(amount) => {
            debug!("{} quoted {} for {:?}", name, amount.decimal, path.tokens());
            counter!(METRIC_QUOTES, 1, "source" => name.clone(), "outcome" => "ok");
            Quote::filled(name, amount)
        }
        Err(e) => {
            warn!("{} failed to quote: {}", name, e);
            counter!(METRIC_QUOTES, 1, "source" => name.clone(), "outcome" => "failed");
            Quote::failed(name, e)
        }
    }
}

async fn fetch_amount(
    caller: &dyn RouterCaller,
    router: &RouterEntry,
    path: &QuotePath,
) -> Result<QuoteAmount, QuoteError> {
    let source = router.source().await?;
    let amounts = caller
        .get_amounts_out(&source, path.amount_in(), path.tokens())
        .await?;

    let raw = output_amount(&amounts, path.tokens().len())?;
    Ok(QuoteAmount {
        raw,
        decimal: to_decimal(raw)?,
    })
}

/// The last element is the amount of the final token; earlier ones are hops.
fn output_amount(amounts: &[U256], path_len: usize) -> Result<U256, QuoteError> {
    if amounts.len() != path_len {
        return Err(QuoteError::MalformedResponse {
            reason: format!(
                "expected {} amounts for a {}-token path, got {}",
                path_len,
                path_len,
                amounts.len()
            ),
        });
    }
    amounts.last().copied().ok_or_else(|| QuoteError::MalformedResponse {
        reason: "empty amounts array".to_string(),
    })
}
