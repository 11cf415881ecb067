use std::path::PathBuf;
use std::sync::Arc;

use axum::extract::{Path as AxumPath, State};
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use clap::Parser;
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tokio::sync::RwLock;
use tower_http::cors::CorsLayer;

use crate::session::NodeDetails;
use crate::traversal::Generation;
use crate::*;

/// Arguments for running the graphwalk web server
#[derive(Debug, Clone, Parser)]
#[command(name = "graphwalk serve", about = "Serve an interactive graph session over HTTP.")]
pub struct ServeArgs {
    /// Address to bind the HTTP server to.
    #[arg(long, default_value = "127.0.0.1")]
    pub host: String,

    /// Port to listen on.
    #[arg(long, default_value_t = 5151)]
    pub port: u16,

    /// Background color for rendered SVG previews.
    #[arg(long = "background-color", default_value = "white")]
    pub background_color: String,

    /// JSON config file; falls back to GRAPHWALK_CONFIG and the user config dir.
    #[arg(long)]
    pub config: Option<PathBuf>,
}

pub struct ServeState {
    session: RwLock<GraphSession>,
    background: String,
}

impl ServeState {
    pub fn new(session: GraphSession, background: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            session: RwLock::new(session),
            background: background.into(),
        })
    }

    pub async fn summary(&self) -> Summary {
        self.session.read().await.summary()
    }
}

#[derive(Debug, Serialize)]
struct GraphPayload {
    background: String,
    frame: Frame,
    summary: Summary,
}

#[derive(Debug, Serialize)]
struct CommandPayload {
    command: Option<Command>,
    summary: Summary,
}

#[derive(Debug, Serialize)]
struct TraversalStarted {
    kind: TraversalKind,
    start: NodeId,
    generation: Generation,
}

#[derive(Debug, Deserialize)]
struct SelectionRequest {
    node: NodeId,
    #[serde(default)]
    toggle: bool,
}

#[derive(Debug, Deserialize)]
struct PointerRequest {
    button: PointerButton,
    x: f32,
    y: f32,
    #[serde(default)]
    shift: bool,
}

#[derive(Debug, Deserialize)]
struct LongPressRequest {
    x: f32,
    y: f32,
    held_ms: u64,
}

#[derive(Debug, Deserialize)]
struct KeyRequest {
    key: String,
}

#[derive(Debug, Deserialize)]
struct WheelRequest {
    x: f32,
    y: f32,
    delta_y: f32,
}

#[derive(Debug, Deserialize)]
struct PanRequest {
    dx: f32,
    dy: f32,
}

#[derive(Debug, Deserialize)]
struct PinchRequest {
    previous: [Point; 2],
    current: [Point; 2],
}

#[derive(Debug, Deserialize)]
struct ResizeRequest {
    width: f32,
    height: f32,
}

#[derive(Debug, Deserialize)]
struct TraversalRequest {
    kind: TraversalKind,
    #[serde(default)]
    start: Option<NodeId>,
}

pub fn build_router(state: Arc<ServeState>) -> Router {
    Router::new()
        .route("/api/graph", get(get_graph))
        .route("/api/graph/svg", get(get_svg))
        .route("/api/graph/selection", post(post_selection))
        .route("/api/graph/pointer", post(post_pointer))
        .route("/api/graph/long-press", post(post_long_press))
        .route("/api/graph/key", post(post_key))
        .route("/api/graph/wheel", post(post_wheel))
        .route("/api/graph/pan", post(post_pan))
        .route("/api/graph/pinch", post(post_pinch))
        .route("/api/graph/resize", post(post_resize))
        .route("/api/graph/traversal", post(post_traversal))
        .route("/api/graph/clear", post(post_clear))
        .route("/api/graph/restore", post(post_restore))
        .route("/api/graph/edges/:from/:to", delete(delete_edge))
        .route("/api/graph/nodes/:id", get(get_node))
        .with_state(state)
        .layer(CorsLayer::permissive())
}

pub async fn run_serve(args: ServeArgs) -> Result<()> {
    let config = Config::load(args.config.as_deref()).context("failed to load configuration")?;
    let session = GraphSession::new(config).context("failed to build graph session")?;
    let state = ServeState::new(session, args.background_color.clone());
    let app = build_router(state);

    let addr = format!("{}:{}", args.host, args.port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind HTTP server to {addr}"))?;

    println!("graphwalk server listening on http://{addr}");
    println!("Press Ctrl+C to stop.");
    tracing::info!(%addr, "server started");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await
        .context("HTTP server error")?;

    tracing::info!("server stopped");
    Ok(())
}

/// Plays `generation` out in the background. The session lock is held for a
/// single step or settle and never across the pause between them.
fn spawn_traversal(state: Arc<ServeState>, generation: Generation) {
    tokio::spawn(async move {
        loop {
            let outcome = state.session.write().await.step(generation);
            match outcome {
                StepOutcome::Advanced { delay, .. } => {
                    tokio::time::sleep(delay).await;
                    state.session.write().await.settle(generation);
                }
                StepOutcome::Finished => {
                    tracing::info!(generation = generation.0, "traversal complete");
                    break;
                }
                StepOutcome::Stale => {
                    tracing::debug!(generation = generation.0, "traversal superseded");
                    break;
                }
            }
        }
    });
}

fn follow_up(state: &Arc<ServeState>, command: Option<Command>) {
    if let Some(Command::Traverse { generation, .. }) = command {
        spawn_traversal(Arc::clone(state), generation);
    }
}

async fn get_graph(State(state): State<Arc<ServeState>>) -> Json<GraphPayload> {
    let session = state.session.read().await;
    Json(GraphPayload {
        background: state.background.clone(),
        frame: session.frame(),
        summary: session.summary(),
    })
}

async fn get_svg(State(state): State<Arc<ServeState>>) -> Result<Response, (StatusCode, String)> {
    let svg = state
        .session
        .read()
        .await
        .render_svg(&state.background)
        .map_err(internal_error)?;

    let mut response = Response::new(svg.into());
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("image/svg+xml"),
    );
    Ok(response)
}

async fn post_selection(
    State(state): State<Arc<ServeState>>,
    Json(request): Json<SelectionRequest>,
) -> Result<Json<Summary>, (StatusCode, String)> {
    let mut session = state.session.write().await;
    let result = if request.toggle {
        session.toggle_selection(request.node)
    } else {
        session.select_only(request.node)
    };
    result.map_err(session_error)?;
    Ok(Json(session.summary()))
}

async fn post_pointer(
    State(state): State<Arc<ServeState>>,
    Json(request): Json<PointerRequest>,
) -> Json<CommandPayload> {
    let payload = {
        let mut session = state.session.write().await;
        let command = session.pointer_down(
            request.button,
            Point::new(request.x, request.y),
            request.shift,
        );
        CommandPayload {
            command,
            summary: session.summary(),
        }
    };
    follow_up(&state, payload.command);
    Json(payload)
}

async fn post_long_press(
    State(state): State<Arc<ServeState>>,
    Json(request): Json<LongPressRequest>,
) -> Json<CommandPayload> {
    let payload = {
        let mut session = state.session.write().await;
        let command = session.long_press(
            Point::new(request.x, request.y),
            std::time::Duration::from_millis(request.held_ms),
        );
        CommandPayload {
            command,
            summary: session.summary(),
        }
    };
    follow_up(&state, payload.command);
    Json(payload)
}

async fn post_key(
    State(state): State<Arc<ServeState>>,
    Json(request): Json<KeyRequest>,
) -> Json<CommandPayload> {
    let payload = {
        let mut session = state.session.write().await;
        let command = session.key(&request.key);
        CommandPayload {
            command,
            summary: session.summary(),
        }
    };
    follow_up(&state, payload.command);
    Json(payload)
}

async fn post_wheel(
    State(state): State<Arc<ServeState>>,
    Json(request): Json<WheelRequest>,
) -> Json<ViewportTransform> {
    let mut session = state.session.write().await;
    session.wheel(Point::new(request.x, request.y), request.delta_y);
    Json(*session.view())
}

async fn post_pan(
    State(state): State<Arc<ServeState>>,
    Json(request): Json<PanRequest>,
) -> Json<ViewportTransform> {
    let mut session = state.session.write().await;
    session.pan(request.dx, request.dy);
    Json(*session.view())
}

async fn post_pinch(
    State(state): State<Arc<ServeState>>,
    Json(request): Json<PinchRequest>,
) -> Json<ViewportTransform> {
    let [previous_a, previous_b] = request.previous;
    let [current_a, current_b] = request.current;
    let mut session = state.session.write().await;
    session.pinch((previous_a, previous_b), (current_a, current_b));
    Json(*session.view())
}

async fn post_resize(
    State(state): State<Arc<ServeState>>,
    Json(request): Json<ResizeRequest>,
) -> Json<ViewportTransform> {
    let mut session = state.session.write().await;
    session.resize(request.width, request.height);
    Json(*session.view())
}

async fn post_traversal(
    State(state): State<Arc<ServeState>>,
    Json(request): Json<TraversalRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let started = {
        let mut session = state.session.write().await;
        let start = match request.start {
            Some(node) => node,
            None => session
                .selection()
                .first()
                .copied()
                .ok_or_else(|| session_error(SessionError::NoSelection))?,
        };
        let generation = session
            .start_traversal_from(request.kind, start)
            .map_err(session_error)?;
        TraversalStarted {
            kind: request.kind,
            start,
            generation,
        }
    };

    spawn_traversal(Arc::clone(&state), started.generation);
    Ok((StatusCode::ACCEPTED, Json(started)))
}

async fn post_clear(State(state): State<Arc<ServeState>>) -> Json<Summary> {
    let mut session = state.session.write().await;
    session.clear_all();
    Json(session.summary())
}

async fn post_restore(State(state): State<Arc<ServeState>>) -> Json<Summary> {
    let mut session = state.session.write().await;
    session.restore_canonical();
    Json(session.summary())
}

async fn delete_edge(
    State(state): State<Arc<ServeState>>,
    AxumPath((from, to)): AxumPath<(NodeId, NodeId)>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    if state.session.write().await.delete_edge(from, to) {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err((StatusCode::NOT_FOUND, format!("edge '{from} -> {to}' not found")))
    }
}

async fn get_node(
    State(state): State<Arc<ServeState>>,
    AxumPath(id): AxumPath<NodeId>,
) -> Result<Json<NodeDetails>, (StatusCode, String)> {
    let details = state
        .session
        .read()
        .await
        .node_details(id)
        .map_err(session_error)?;
    Ok(Json(details))
}

fn session_error(err: SessionError) -> (StatusCode, String) {
    match err {
        SessionError::NoSelection => (StatusCode::BAD_REQUEST, err.to_string()),
        SessionError::UnknownNode(_) => (StatusCode::NOT_FOUND, err.to_string()),
        SessionError::Graph(_) | SessionError::Config(_) => internal_error(err.into()),
    }
}

fn internal_error(err: anyhow::Error) -> (StatusCode, String) {
    tracing::error!(error = %err, "request failed");
    (StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use axum::body::{Body, to_bytes};
    use axum::http::Request;
    use serde_json::Value;
    use tower::ServiceExt;

    use super::*;
    use crate::config::TraversalTiming;

    fn state() -> Arc<ServeState> {
        let config = Config {
            traversal: TraversalTiming {
                bfs_delay_ms: 1,
                dfs_delay_ms: 1,
            },
            ..Config::default()
        };
        ServeState::new(GraphSession::new(config).unwrap(), "white")
    }

    fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn empty_request(method: &str, uri: &str) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap()
    }

    async fn body_json(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn graph_payload_has_frame_and_summary() {
        let app = build_router(state());
        let response = app.oneshot(empty_request("GET", "/api/graph")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let payload = body_json(response).await;
        assert_eq!(payload["summary"]["nodes_total"], 22);
        assert_eq!(payload["summary"]["components"], 1);
        assert_eq!(payload["frame"]["nodes"].as_array().map(Vec::len), Some(22));
        assert_eq!(payload["background"], "white");
    }

    #[tokio::test]
    async fn svg_route_sets_content_type() {
        let app = build_router(state());
        let response = app.oneshot(empty_request("GET", "/api/graph/svg")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE),
            Some(&HeaderValue::from_static("image/svg+xml"))
        );
    }

    #[tokio::test]
    async fn traversal_without_start_is_rejected() {
        let app = build_router(state());
        let response = app
            .oneshot(json_request("POST", "/api/graph/traversal", serde_json::json!({ "kind": "bfs" })))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn traversal_from_selection_runs_to_completion() {
        let state = state();
        let app = build_router(Arc::clone(&state));

        let response = app
            .clone()
            .oneshot(json_request(
                "POST",
                "/api/graph/selection",
                serde_json::json!({ "node": 1 }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app
            .oneshot(json_request("POST", "/api/graph/traversal", serde_json::json!({ "kind": "bfs" })))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);
        let started = body_json(response).await;
        assert_eq!(started["start"], 1);

        for _ in 0..400 {
            if state.summary().await.status == traversal::TraversalStatus::Idle {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        let summary = state.summary().await;
        assert_eq!(summary.status, traversal::TraversalStatus::Idle);
        assert_eq!(summary.visited, 22);
        assert_eq!(summary.last_traversal, Some(TraversalKind::Bfs));
    }

    #[tokio::test]
    async fn deleting_edges_reports_absence() {
        let app = build_router(state());
        let response = app
            .clone()
            .oneshot(empty_request("DELETE", "/api/graph/edges/1/2"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        let response = app
            .clone()
            .oneshot(empty_request("DELETE", "/api/graph/edges/1/2"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = app.oneshot(empty_request("GET", "/api/graph/nodes/1")).await.unwrap();
        let details = body_json(response).await;
        assert_eq!(details["out_degree"], 7);
        assert_eq!(details["in_degree"], 8);
    }

    #[tokio::test]
    async fn unknown_node_is_not_found() {
        let app = build_router(state());
        let response = app
            .oneshot(empty_request("GET", "/api/graph/nodes/99"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn restore_brings_edges_back() {
        let state = state();
        let app = build_router(Arc::clone(&state));
        app.clone()
            .oneshot(empty_request("DELETE", "/api/graph/edges/13/14"))
            .await
            .unwrap();
        assert_eq!(state.summary().await.edges_total, 35);

        let response = app
            .oneshot(empty_request("POST", "/api/graph/restore"))
            .await
            .unwrap();
        let summary = body_json(response).await;
        assert_eq!(summary["edges_total"], 36);
        assert_eq!(summary["selected"], serde_json::json!([]));
    }

    #[tokio::test]
    async fn key_enter_removes_selected_pair() {
        let state = state();
        let app = build_router(Arc::clone(&state));
        for (node, toggle) in [(2, false), (1, true)] {
            app.clone()
                .oneshot(json_request(
                    "POST",
                    "/api/graph/selection",
                    serde_json::json!({ "node": node, "toggle": toggle }),
                ))
                .await
                .unwrap();
        }

        let response = app
            .oneshot(json_request("POST", "/api/graph/key", serde_json::json!({ "key": "Enter" })))
            .await
            .unwrap();
        let payload = body_json(response).await;
        assert_eq!(payload["command"]["command"], "remove_edge");
        assert_eq!(payload["command"]["removed"], true);
        assert_eq!(payload["summary"]["edges_total"], 35);
        assert_eq!(payload["summary"]["selected"], serde_json::json!([]));
    }
}
