//! Axum router and handlers.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tower::ServiceBuilder;
use tower_http::{
    limit::RequestBodyLimitLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use crate::config::ListenerConfig;
use crate::model::{ConfigValue, KnownConfig};
use crate::proxy::{Admission, ConfigRequest, ProxyCoordinator};
use crate::upstream::UpstreamSource;

/// JSON body of `POST /config/v1/get`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GetConfigBody {
    pub namespace: String,
    pub name: String,
    #[serde(default)]
    pub def_checksum: String,
    #[serde(default)]
    pub generation: i64,
    #[serde(default)]
    pub content_checksum: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
}

impl From<GetConfigBody> for ConfigRequest {
    fn from(body: GetConfigBody) -> Self {
        ConfigRequest {
            namespace: body.namespace,
            name: body.name,
            def_checksum: body.def_checksum,
            known: KnownConfig::new(body.generation, body.content_checksum),
            timeout: body.timeout_ms.map(Duration::from_millis),
        }
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(ErrorBody { error: message.into() })).into_response()
}

/// Build the router for `coordinator`.
pub fn router<U: UpstreamSource>(coordinator: Arc<ProxyCoordinator<U>>, config: &ListenerConfig) -> Router {
    Router::new()
        .route("/config/v1/get", post(get_config::<U>))
        .route("/status", get(get_status::<U>))
        .route("/cache", get(get_cache::<U>))
        .with_state(coordinator)
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                .layer(TraceLayer::new_for_http())
                .layer(PropagateRequestIdLayer::x_request_id())
                .layer(RequestBodyLimitLayer::new(config.max_body_bytes)),
        )
}

/// Serve `router` on `listener` until `shutdown` resolves and in-flight requests finish.
pub async fn serve<F>(listener: TcpListener, router: Router, shutdown: F) -> Result<(), std::io::Error>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr = listener.local_addr()?;
    tracing::info!(address = %addr, "Config proxy listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await?;

    tracing::info!("HTTP frontend stopped");
    Ok(())
}

async fn get_config<U: UpstreamSource>(
    State(coordinator): State<Arc<ProxyCoordinator<U>>>,
    Json(body): Json<GetConfigBody>,
) -> Response {
    let (tx, rx) = oneshot::channel::<Arc<ConfigValue>>();

    match coordinator.get_config(body.into(), Box::new(tx)) {
        Admission::Immediate(value) => Json(value.as_ref()).into_response(),
        Admission::Deferred => match rx.await {
            Ok(value) => Json(value.as_ref()).into_response(),
            Err(_) => error_response(StatusCode::SERVICE_UNAVAILABLE, "request dropped without reply"),
        },
        Admission::Rejected(e) if e.is_client_error() => {
            error_response(StatusCode::BAD_REQUEST, e.to_string())
        }
        Admission::Rejected(e) => error_response(StatusCode::SERVICE_UNAVAILABLE, e.to_string()),
    }
}

async fn get_status<U: UpstreamSource>(State(coordinator): State<Arc<ProxyCoordinator<U>>>) -> Response {
    Json(coordinator.status()).into_response()
}

async fn get_cache<U: UpstreamSource>(State(coordinator): State<Arc<ProxyCoordinator<U>>>) -> Response {
    Json(coordinator.cached()).into_response()
}
