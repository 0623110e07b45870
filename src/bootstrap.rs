use crate::abi;
use crate::aggregator::PriceAggregator;
use crate::config::{AbiResolution, RouterConfig, ServiceConfig};
use crate::errors::ConfigError;
use crate::ledger::{DryRunLedger, HttpSheetsApi, LedgerWriter, SheetsLedger};
use crate::quoter::{DeferredRouter, EthersRouterCaller, RouterCaller, RouterEntry};
use crate::service::PriceService;
use crate::types::RouterSource;
use ethers::providers::{Http, Provider};
use futures::future::try_join_all;
use log::info;
use std::sync::Arc;

/// Wires the configured routers and ledger into a ready `PriceService`.
/// Any error here is fatal: the process must not start serving.
pub async fn build_service(
    config: &ServiceConfig,
    dry_run: bool,
) -> Result<PriceService, ConfigError> {
    let provider = Provider::<Http>::try_from(config.rpc_url.as_str()).map_err(|e| {
        ConfigError::InvalidValue {
            key: "RPC_URL".to_string(),
            reason: e.to_string(),
        }
    })?;
    let caller: Arc<dyn RouterCaller> = Arc::new(EthersRouterCaller::new(Arc::new(provider)));

    let routers = build_routers(&config.routers, config.abi_resolution).await?;
    let aggregator = PriceAggregator::new(caller, routers, config.quote_timeout());

    let target = config.ledger_target()?;
    let ledger: Arc<dyn LedgerWriter> = if dry_run {
        info!("Ledger writes disabled (dry run)");
        Arc::new(DryRunLedger)
    } else {
        let api = HttpSheetsApi::new(config.credentials.clone()).map_err(|e| {
            ConfigError::InvalidValue {
                key: "GOOGLE_ACCESS_TOKEN".to_string(),
                reason: e.to_string(),
            }
        })?;
        Arc::new(SheetsLedger::new(api))
    };

    info!(
        "Ledger target {} in spreadsheet {} (schema v{})",
        target.range, target.spreadsheet_id, target.schema.version
    );
    Ok(PriceService::new(aggregator, ledger, target))
}

/// Eager mode resolves every ABI up front and fails on the first bad one.
/// Lazy mode only wraps the sources; they resolve on first quote.
pub async fn build_routers(
    routers: &[RouterConfig],
    resolution: AbiResolution,
) -> Result<Vec<RouterEntry>, ConfigError> {
    match resolution {
        AbiResolution::Eager => {
            try_join_all(routers.iter().map(|router| async move {
                let interface = abi::resolve(router.abi.source().as_ref()).await?;
                let source = RouterSource::new(router.name.clone(), &router.address, interface)
                    .map_err(|reason| ConfigError::InvalidRouterAddress {
                        router: router.name.clone(),
                        reason,
                    })?;
                info!("Router {} ready at {}", router.name, router.address);
                Ok::<_, ConfigError>(RouterEntry::from(source))
            }))
            .await
        }
        AbiResolution::Lazy => Ok(routers
            .iter()
            .map(|router| {
                info!("Router {} deferred until first use", router.name);
                RouterEntry::from(DeferredRouter::new(
                    router.name.clone(),
                    router.address.clone(),
                    router.abi.source(),
                ))
            })
            .collect()),
    }
}
