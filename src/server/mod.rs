use crate::errors::{LedgerError, ServiceError};
use crate::service::{PriceRequest, PriceService};
use log::info;
use serde::Serialize;
use serde_json::json;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use warp::http::StatusCode;
use warp::{Filter, Rejection, Reply};

const MAX_BODY_BYTES: u64 = 4 * 1024;

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: &'static str,
    pub detail: String,
}

/// `GET|POST /prices` and `GET /health`, with permissive CORS.
pub fn routes(
    service: Arc<PriceService>,
) -> impl Filter<Extract = impl Reply, Error = Infallible> + Clone {
    let with_service = warp::any().map(move || service.clone());

    let get_prices = warp::path!("prices")
        .and(warp::get())
        .and(warp::query::<PriceRequest>())
        .and(with_service.clone())
        .and_then(handle_prices);

    let post_prices = warp::path!("prices")
        .and(warp::post())
        .and(warp::body::content_length_limit(MAX_BODY_BYTES))
        .and(warp::body::json::<PriceRequest>())
        .and(with_service.clone())
        .and_then(handle_prices);

    let health = warp::path!("health")
        .and(warp::get())
        .and(with_service)
        .map(|service: Arc<PriceService>| {
            warp::reply::json(&json!({
                "status": "ok",
                "routers": service.source_names(),
                "ledgerRange": service.target().range.to_string(),
            }))
        });

    let cors = warp::cors()
        .allow_any_origin()
        .allow_methods(vec!["GET", "POST", "OPTIONS"])
        .allow_headers(vec!["content-type"]);

    get_prices
        .or(post_prices)
        .or(health)
        .with(cors)
        .with(warp::log("quote_ledger::server"))
        .recover(handle_rejection)
}

pub async fn serve(service: Arc<PriceService>, addr: SocketAddr) -> Result<(), warp::Error> {
    let (bound, server) = warp::serve(routes(service)).try_bind_with_graceful_shutdown(addr, async {
        tokio::signal::ctrl_c().await.ok();
        info!("Shutdown signal received");
    })?;
    info!("Price service listening on {}", bound);
    server.await;
    Ok(())
}

async fn handle_prices(
    request: PriceRequest,
    service: Arc<PriceService>,
) -> Result<warp::reply::WithStatus<warp::reply::Json>, Infallible> {
    let reply = match service.handle(&request).await {
        Ok(ack) => warp::reply::with_status(warp::reply::json(&ack.record), StatusCode::OK),
        Err(e) => {
            let (status, kind) = error_status(&e);
            warp::reply::with_status(
                warp::reply::json(&ErrorBody {
                    error: kind,
                    detail: e.to_string(),
                }),
                status,
            )
        }
    };
    Ok(reply)
}

/// Transport status and short error kind for each request-level failure.
pub fn error_status(error: &ServiceError) -> (StatusCode, &'static str) {
    match error {
        ServiceError::Validation(_) => (StatusCode::BAD_REQUEST, "validation_error"),
        ServiceError::Aggregation(_) => (StatusCode::BAD_GATEWAY, "all_sources_failed"),
        ServiceError::Ledger(LedgerError::Validation(_) | LedgerError::Schema(_)) => {
            (StatusCode::INTERNAL_SERVER_ERROR, "ledger_error")
        }
        ServiceError::Ledger(LedgerError::RateLimited(_)) => {
            (StatusCode::SERVICE_UNAVAILABLE, "ledger_error")
        }
        ServiceError::Ledger(_) => (StatusCode::BAD_GATEWAY, "ledger_error"),
    }
}

async fn handle_rejection(err: Rejection) -> Result<impl Reply, Infallible> {
    let (status, detail) = if err.is_not_found() {
        (StatusCode::NOT_FOUND, "not found".to_string())
    } else if let Some(e) = err.find::<warp::filters::body::BodyDeserializeError>() {
        (StatusCode::BAD_REQUEST, e.to_string())
    } else if let Some(e) = err.find::<warp::reject::InvalidQuery>() {
        (StatusCode::BAD_REQUEST, e.to_string())
    } else if err.find::<warp::reject::PayloadTooLarge>().is_some() {
        (StatusCode::PAYLOAD_TOO_LARGE, "payload too large".to_string())
    } else if let Some(e) = err.find::<warp::filters::cors::CorsForbidden>() {
        (StatusCode::FORBIDDEN, e.to_string())
    } else if err.find::<warp::reject::MethodNotAllowed>().is_some() {
        (StatusCode::METHOD_NOT_ALLOWED, "method not allowed".to_string())
    } else {
        (StatusCode::INTERNAL_SERVER_ERROR, format!("{err:?}"))
    };

    Ok(warp::reply::with_status(
        warp::reply::json(&ErrorBody {
            error: "request_error",
            detail,
        }),
        status,
    ))
}
