use crate::abi::{self, AbiSource};
use crate::errors::{ConfigError, QuoteError};
use crate::types::RouterSource;
use log::{info, warn};
use std::fmt;
use std::sync::Arc;
use tokio::sync::OnceCell;

/// A router whose ABI is resolved on first use and cached afterwards.
/// A failed resolution leaves the cell empty so the next request retries.
pub struct DeferredRouter {
    name: String,
    address: String,
    source: Box<dyn AbiSource>,
    resolved: OnceCell<Arc<RouterSource>>,
}

impl DeferredRouter {
    pub fn new(
        name: impl Into<String>,
        address: impl Into<String>,
        source: Box<dyn AbiSource>,
    ) -> Self {
        Self {
            name: name.into(),
            address: address.into(),
            source,
            resolved: OnceCell::new(),
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.resolved.initialized()
    }

    async fn get(&self) -> Result<Arc<RouterSource>, QuoteError> {
        self.resolved
            .get_or_try_init(|| async {
                let interface = abi::resolve(self.source.as_ref()).await?;
                let router = RouterSource::new(self.name.clone(), &self.address, interface)
                    .map_err(|reason| ConfigError::InvalidRouterAddress {
                        router: self.name.clone(),
                        reason,
                    })?;
                info!("Router {} resolved on first use", self.name);
                Ok::<_, ConfigError>(Arc::new(router))
            })
            .await
            .cloned()
            .map_err(|e| {
                warn!("Router {} unavailable: {}", self.name, e);
                QuoteError::SourceUnavailable {
                    reason: e.to_string(),
                }
            })
    }
}

impl fmt::Debug for DeferredRouter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeferredRouter")
            .field("name", &self.name)
            .field("address", &self.address)
            .field("source", &self.source.origin())
            .field("resolved", &self.is_resolved())
            .finish()
    }
}

/// A configured router slot, either ready at startup or deferred.
#[derive(Debug, Clone)]
pub enum RouterEntry {
    Ready(Arc<RouterSource>),
    Deferred(Arc<DeferredRouter>),
}

impl RouterEntry {
    pub fn name(&self) -> &str {
        match self {
            RouterEntry::Ready(router) => router.name(),
            RouterEntry::Deferred(router) => &router.name,
        }
    }

    pub async fn source(&self) -> Result<Arc<RouterSource>, QuoteError> {
        match self {
            RouterEntry::Ready(router) => Ok(router.clone()),
            RouterEntry::Deferred(router) => router.get().await,
        }
    }
}

impl From<RouterSource> for RouterEntry {
    fn from(router: RouterSource) -> Self {
        RouterEntry::Ready(Arc::new(router))
    }
}

impl From<DeferredRouter> for RouterEntry {
    fn from(router: DeferredRouter) -> Self {
        RouterEntry::Deferred(Arc::new(router))
    }
}
