use crate::errors::AggregationError;
use crate::metrics::METRIC_AGGREGATIONS_FAILED;
use crate::quoter::{get_quote, RouterCaller, RouterEntry};
use crate::types::{PriceRecord, QuotePath, SourcePrice};
use crate::utils::MonotonicClock;
use ethers::utils::to_checksum;
use futures::future::join_all;
use itertools::Itertools;
use log::{info, warn};
use metrics::counter;
use std::sync::Arc;
use std::time::Duration;

/// 5 seconds per router call unless configured otherwise
pub const DEFAULT_QUOTE_TIMEOUT: Duration = Duration::from_secs(5);

/// Fans a quote request out to every configured router and folds the
/// answers into one `PriceRecord`.
pub struct PriceAggregator {
    caller: Arc<dyn RouterCaller>,
    routers: Vec<RouterEntry>,
    quote_timeout: Duration,
    clock: MonotonicClock,
}

impl PriceAggregator {
    pub fn new(
        caller: Arc<dyn RouterCaller>,
        routers: Vec<RouterEntry>,
        quote_timeout: Duration,
    ) -> Self {
        Self {
            caller,
            routers,
            quote_timeout,
            clock: MonotonicClock::new(),
        }
    }

    pub fn source_names(&self) -> Vec<String> {
        self.routers.iter().map(|r| r.name().to_string()).collect()
    }

    /// Queries all routers concurrently. Each call is bounded by the quote
    /// timeout on its own, so one hung router cannot hold up the others.
    /// Fails only when no router produced a price.
    pub async fn compare_quotes(&self, path: &QuotePath) -> Result<PriceRecord, AggregationError> {
        info!(
            "Comparing quotes from [{}] for {:?}",
            self.routers.iter().map(|r| r.name()).join(", "),
            path.tokens()
        );

        let quotes = join_all(
            self.routers
                .iter()
                .map(|router| get_quote(self.caller.as_ref(), router, path, self.quote_timeout)),
        )
        .await;

        if !quotes.iter().any(|q| q.is_success()) {
            counter!(METRIC_AGGREGATIONS_FAILED, 1);
            let failures = quotes
                .into_iter()
                .filter_map(|q| q.outcome.err().map(|e| (q.source, e)))
                .collect();
            let err = AggregationError::AllSourcesFailed { failures };
            warn!("{}", err);
            return Err(err);
        }

        let record = PriceRecord {
            timestamp: self.clock.next_timestamp(),
            token_in: to_checksum(&path.token_in(), None),
            token_out: to_checksum(&path.token_out(), None),
            prices: quotes.into_iter().map(SourcePrice::from).collect(),
        };

        info!(
            "Price record {}: {}",
            record.timestamp,
            record
                .prices
                .iter()
                .map(|slot| match slot.price {
                    Some(price) => format!("{}={}", slot.source, price),
                    None => format!("{}=n/a", slot.source),
                })
                .join(" ")
        );
        Ok(record)
    }
}
