use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use axum::body::Body;
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use rendez_registry::Registry;
use rendez_types::{NodeAddr, PeerAddr, PeerProfile};
use serde::Serialize;
use tower_http::trace::TraceLayer;
use tracing::info;

/// Shared state handed to every request handler.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<Registry>,
    pub node_id: String,
    pub start_time: Instant,
    pub req_count: Arc<AtomicUsize>,
}

impl AppState {
    pub fn new(registry: Arc<Registry>, node_id: impl Into<String>) -> Self {
        Self {
            registry,
            node_id: node_id.into(),
            start_time: Instant::now(),
            req_count: Arc::new(AtomicUsize::new(0)),
        }
    }

    fn record_request(&self) -> u64 {
        self.req_count.fetch_add(1, Ordering::Relaxed) as u64 + 1
    }

    fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}

type SharedState = Arc<AppState>;

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    node_id: String,
    uptime_secs: u64,
    peer_count: usize,
    node_count: usize,
    req_total: u64,
}

#[derive(Debug, Serialize)]
struct VersionResponse {
    node_id: String,
    version: &'static str,
}

#[derive(Debug, Serialize)]
struct PortResponse {
    port: u16,
}

#[derive(Debug, Serialize)]
struct NodesResponse {
    nodes: Vec<NodeAddr>,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request<S: Into<String>>(message: S) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::bad_request(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let payload = Json(ErrorResponse {
            error: self.message,
        });
        (self.status, payload).into_response()
    }
}

pub async fn start_server(state: AppState, addr: &str) -> Result<()> {
    let shared = Arc::new(state);
    let app = build_router(shared);
    let listener = bind_listener(addr).await?;
    axum::serve(listener, app)
        .await
        .context("registry server terminated unexpectedly")
}

async fn bind_listener(addr: &str) -> Result<tokio::net::TcpListener> {
    if let Ok(socket_addr) = addr.parse::<SocketAddr>() {
        tokio::net::TcpListener::bind(socket_addr)
            .await
            .with_context(|| format!("failed to bind listener on {socket_addr}"))
    } else {
        tokio::net::TcpListener::bind(addr)
            .await
            .with_context(|| format!("failed to bind listener on {addr}"))
    }
}

fn build_router(state: SharedState) -> Router {
    Router::new()
        .route("/health", get(handle_health))
        .route("/version", get(handle_version))
        .route("/metrics", get(handle_metrics))
        .route("/topology", get(handle_topology))
        .route("/peers/enroll", post(handle_enroll))
        .route("/peers/remove", post(handle_remove))
        .route("/port", get(handle_port))
        .route("/nodes", get(handle_nodes).post(handle_announce))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn handle_health(State(state): State<SharedState>) -> Json<HealthResponse> {
    let req_total = state.record_request();
    Json(HealthResponse {
        status: "ok",
        node_id: state.node_id.clone(),
        uptime_secs: state.uptime_seconds(),
        peer_count: state.registry.topology.len(),
        node_count: state.registry.directory.len(),
        req_total,
    })
}

async fn handle_version(State(state): State<SharedState>) -> Json<VersionResponse> {
    state.record_request();
    Json(VersionResponse {
        node_id: state.node_id.clone(),
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn handle_metrics(State(state): State<SharedState>) -> Response {
    let req_total = state.record_request();
    let uptime = state.uptime_seconds();
    let peer_count = state.registry.topology.len();
    let node_count = state.registry.directory.len();

    let mut metrics =
        "# HELP rendez_http_requests_total Total number of API requests handled\n".to_string();
    metrics.push_str("# TYPE rendez_http_requests_total counter\n");
    metrics.push_str(&format!("rendez_http_requests_total {req_total}\n"));
    metrics.push_str("# HELP rendez_uptime_seconds Uptime of the registry in seconds\n");
    metrics.push_str("# TYPE rendez_uptime_seconds gauge\n");
    metrics.push_str(&format!("rendez_uptime_seconds {uptime}\n"));
    metrics.push_str("# HELP rendez_peer_count Peers currently present in the topology\n");
    metrics.push_str("# TYPE rendez_peer_count gauge\n");
    metrics.push_str(&format!("rendez_peer_count {peer_count}\n"));
    metrics.push_str("# HELP rendez_node_count Entries in the node address directory\n");
    metrics.push_str("# TYPE rendez_node_count gauge\n");
    metrics.push_str(&format!("rendez_node_count {node_count}\n"));

    let mut response = Response::new(Body::from(metrics));
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/plain; version=0.0.4"),
    );
    response
}

async fn handle_topology(
    State(state): State<SharedState>,
) -> Json<HashMap<PeerAddr, PeerProfile>> {
    state.record_request();
    Json(state.registry.topology.snapshot())
}

async fn handle_enroll(
    State(state): State<SharedState>,
    payload: Result<Json<PeerProfile>, JsonRejection>,
) -> Result<(StatusCode, Json<PeerProfile>), ApiError> {
    state.record_request();
    let Json(profile) = payload?;

    state.registry.topology.enroll(profile.clone());
    info!(peer = %profile.addr, "Enroll request successful");

    Ok((StatusCode::CREATED, Json(profile)))
}

async fn handle_remove(
    State(state): State<SharedState>,
    payload: Result<Json<PeerProfile>, JsonRejection>,
) -> Result<StatusCode, ApiError> {
    state.record_request();
    let Json(profile) = payload?;

    state.registry.topology.remove(&profile);
    state.registry.directory.forget(profile.addr.as_str());
    info!(peer = %profile.addr, "Remove request successful");

    Ok(StatusCode::NO_CONTENT)
}

async fn handle_port(State(state): State<SharedState>) -> Json<PortResponse> {
    state.record_request();
    let port = state.registry.ports.next_port();
    info!(port, "Allocated peer port");
    Json(PortResponse { port })
}

async fn handle_announce(
    State(state): State<SharedState>,
    payload: Result<Json<NodeAddr>, JsonRejection>,
) -> Result<(StatusCode, Json<NodeAddr>), ApiError> {
    state.record_request();
    let Json(node) = payload?;

    state.registry.directory.announce(node.clone());

    Ok((StatusCode::CREATED, Json(node)))
}

async fn handle_nodes(State(state): State<SharedState>) -> Json<NodesResponse> {
    state.record_request();
    Json(NodesResponse {
        nodes: state.registry.directory.all(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use serde_json::Value;
    use tower::ServiceExt;

    fn test_router() -> Router {
        let state = AppState::new(Arc::new(Registry::new()), "test-node");
        build_router(Arc::new(state))
    }

    fn json_post(uri: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get_request(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    async fn body_json(response: Response) -> Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn enroll_is_created_and_echoes_the_profile() {
        let app = test_router();

        let body = r#"{"addr":"10.0.0.5:3500","port":3500,"neighbors":["10.0.0.6:3500"],"alive":true}"#;
        let response = app.clone().oneshot(json_post("/peers/enroll", body)).await.unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let echoed = body_json(response).await;
        assert_eq!(echoed["addr"], "10.0.0.5:3500");
        assert_eq!(echoed["port"], 3500);

        let response = app.oneshot(get_request("/topology")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let graph = body_json(response).await;
        assert_eq!(graph["10.0.0.5:3500"]["neighbors"][0], "10.0.0.6:3500");
        assert_eq!(graph["10.0.0.6:3500"]["neighbors"][0], "10.0.0.5:3500");
    }

    #[tokio::test]
    async fn malformed_enroll_body_yields_structured_error() {
        let app = test_router();

        let response = app
            .oneshot(json_post("/peers/enroll", "{ not json"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let error = body_json(response).await;
        assert!(!error["error"].as_str().unwrap().is_empty());
    }

    #[tokio::test]
    async fn port_requests_hand_out_increasing_ports() {
        let app = test_router();

        let response = app.clone().oneshot(get_request("/port")).await.unwrap();
        assert_eq!(body_json(response).await["port"], 3500);

        let response = app.oneshot(get_request("/port")).await.unwrap();
        assert_eq!(body_json(response).await["port"], 3501);
    }

    #[tokio::test]
    async fn remove_prunes_topology_and_directory() {
        let app = test_router();

        let enroll = r#"{"addr":"10.0.0.5","neighbors":["10.0.0.6"],"alive":true}"#;
        app.clone().oneshot(json_post("/peers/enroll", enroll)).await.unwrap();
        let announce = r#"{"physical_addr":"10.0.0.5","transport_addr":"10.0.0.5:3500"}"#;
        app.clone().oneshot(json_post("/nodes", announce)).await.unwrap();

        let response = app
            .clone()
            .oneshot(json_post("/peers/remove", enroll))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        let graph = body_json(app.clone().oneshot(get_request("/topology")).await.unwrap()).await;
        assert!(graph.as_object().unwrap().is_empty());

        let nodes = body_json(app.oneshot(get_request("/nodes")).await.unwrap()).await;
        assert!(nodes["nodes"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn announce_then_list_returns_the_node() {
        let app = test_router();

        let announce = r#"{"physical_addr":"10.0.0.1","transport_addr":"10.0.0.1:9000"}"#;
        let response = app.clone().oneshot(json_post("/nodes", announce)).await.unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let echoed = body_json(response).await;
        assert_eq!(echoed["physical_addr"], "10.0.0.1");

        let nodes = body_json(app.oneshot(get_request("/nodes")).await.unwrap()).await;
        assert_eq!(nodes["nodes"].as_array().unwrap().len(), 1);
        assert_eq!(nodes["nodes"][0]["transport_addr"], "10.0.0.1:9000");
    }

    #[tokio::test]
    async fn health_reports_registry_counters() {
        let app = test_router();

        let enroll = r#"{"addr":"10.0.0.5","neighbors":["10.0.0.6"]}"#;
        app.clone().oneshot(json_post("/peers/enroll", enroll)).await.unwrap();

        let response = app.oneshot(get_request("/health")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let health = body_json(response).await;
        assert_eq!(health["status"], "ok");
        assert_eq!(health["node_id"], "test-node");
        assert_eq!(health["peer_count"], 2);
        assert_eq!(health["node_count"], 0);
    }

    #[tokio::test]
    async fn metrics_expose_request_and_peer_gauges() {
        let app = test_router();

        let response = app.oneshot(get_request("/metrics")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let text = String::from_utf8(bytes.to_vec()).unwrap();
        assert!(text.contains("rendez_http_requests_total 1"));
        assert!(text.contains("rendez_peer_count 0"));
    }
}
