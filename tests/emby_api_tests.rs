//! Wire-level tests against a local stand-in Emby server, plus the HTTP
//! trigger surface.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use assert_matches::assert_matches;
use axum::{
    Json, Router,
    body::Body,
    extract::{Path, Query, State},
    http::{Request, StatusCode},
    routing::{get, post},
};
use chrono::NaiveDate;
use pretty_assertions::assert_eq;
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;

use freshen::error::{ErrorKind, PipelineError};
use freshen::pipeline::{
    CatalogQuery, OperationMode, PathMapper, RunCoordinator, RunSettings, ServerHandle,
    ServerTarget, TimeWindow, TriggerDispatcher,
};
use freshen::services::{EmbyClient, LogNotifier, MediaServer};

// ============================================================================
// Stand-in Emby
// ============================================================================

type Params = HashMap<String, String>;

#[derive(Default)]
struct EmbyState {
    listings: Mutex<Vec<Params>>,
    refreshes: Mutex<Vec<(String, Params)>>,
}

async fn list_items(State(state): State<Arc<EmbyState>>, Query(params): Query<Params>) -> Json<Value> {
    let recent = params.contains_key("MinPremiereDate");
    state.listings.lock().unwrap().push(params);
    if recent {
        Json(json!({
            "Items": [
                {"Id": "101", "Name": "Pilot", "SeriesName": "Show", "Path": "/data/tv/Show S01E01.mkv"},
                {"Id": "broken", "Name": "Second", "SeriesName": "Show"}
            ]
        }))
    } else {
        Json(json!({"Items": []}))
    }
}

async fn refresh(
    State(state): State<Arc<EmbyState>>,
    Path(id): Path<String>,
    Query(params): Query<Params>,
) -> StatusCode {
    state.refreshes.lock().unwrap().push((id.clone(), params));
    if id == "broken" {
        StatusCode::INTERNAL_SERVER_ERROR
    } else {
        StatusCode::NO_CONTENT
    }
}

async fn spawn_emby() -> (SocketAddr, Arc<EmbyState>) {
    let state = Arc::new(EmbyState::default());
    let app = Router::new()
        .route("/emby/Items", get(list_items))
        .route("/emby/Items/{id}/Refresh", post(refresh))
        .with_state(state.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (addr, state)
}

fn client_for(addr: SocketAddr) -> EmbyClient {
    // No scheme and no trailing slash, as users tend to configure it
    let target = ServerTarget::new("local", &addr.to_string(), "secret");
    EmbyClient::new(target, Duration::from_secs(5)).unwrap()
}

fn fixed_today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 3, 2).unwrap()
}

// ============================================================================
// Emby client
// ============================================================================

#[tokio::test]
async fn test_listing_sends_window_filter() {
    let (addr, state) = spawn_emby().await;
    let client = client_for(addr);

    let items = client
        .list_items(&CatalogQuery {
            window: TimeWindow::recent(fixed_today(), 3),
            include_path: true,
        })
        .await
        .unwrap();

    assert_eq!(items.len(), 2);
    assert_eq!(items[0].id, "101");
    assert_eq!(items[0].path.as_deref(), Some("/data/tv/Show S01E01.mkv"));
    assert_eq!(items[1].path, None);

    let listings = state.listings.lock().unwrap();
    let params = &listings[0];
    assert_eq!(params["IncludeItemTypes"], "Episode");
    assert_eq!(params["MinPremiereDate"], "2024-02-28");
    assert_eq!(params["IsMissing"], "false");
    assert_eq!(params["Recursive"], "true");
    assert_eq!(params["Fields"], "Path");
    assert_eq!(params["api_key"], "secret");
}

#[tokio::test]
async fn test_undated_listing_uses_max_date() {
    let (addr, state) = spawn_emby().await;
    let client = client_for(addr);

    let items = client
        .list_items(&CatalogQuery {
            window: TimeWindow::undated(),
            include_path: false,
        })
        .await
        .unwrap();

    assert!(items.is_empty());
    let listings = state.listings.lock().unwrap();
    assert_eq!(listings[0]["MaxPremiereDate"], "1900-01-01");
    assert!(!listings[0].contains_key("Fields"));
}

#[tokio::test]
async fn test_refresh_requests_full_replace() {
    let (addr, state) = spawn_emby().await;
    let client = client_for(addr);

    client.refresh_item("101").await.unwrap();

    let refreshes = state.refreshes.lock().unwrap();
    let (id, params) = &refreshes[0];
    assert_eq!(id, "101");
    assert_eq!(params["MetadataRefreshMode"], "FullRefresh");
    assert_eq!(params["ImageRefreshMode"], "FullRefresh");
    assert_eq!(params["ReplaceAllMetadata"], "true");
    assert_eq!(params["ReplaceAllImages"], "true");
}

#[tokio::test]
async fn test_refresh_error_status_is_connectivity_failure() {
    let (addr, _state) = spawn_emby().await;
    let client = client_for(addr);

    let err = client.refresh_item("broken").await.unwrap_err();

    assert_matches!(err, PipelineError::Connectivity { .. });
    assert_eq!(err.kind(), ErrorKind::ConnectivityFailure);
}

#[tokio::test]
async fn test_unreachable_server_is_connectivity_failure() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let err = client_for(addr)
        .list_items(&CatalogQuery {
            window: TimeWindow::undated(),
            include_path: false,
        })
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::ConnectivityFailure);
}

// ============================================================================
// Full run over HTTP
// ============================================================================

fn dispatcher_for(addr: SocketAddr) -> Arc<TriggerDispatcher> {
    let client = client_for(addr);
    let coordinator = RunCoordinator::new(
        RunSettings {
            mode: OperationMode::Refresh,
            offset_days: 3,
            notify_on_completion: true,
            request_timeout: Duration::from_secs(5),
        },
        vec![ServerHandle {
            target: client.target().clone(),
            client: Arc::new(client),
        }],
        PathMapper::default(),
        Arc::new(LogNotifier),
    )
    .with_clock(fixed_today);
    Arc::new(TriggerDispatcher::new(Arc::new(coordinator), CancellationToken::new()))
}

#[tokio::test]
async fn test_refresh_run_against_emby() {
    let (addr, state) = spawn_emby().await;
    let dispatcher = dispatcher_for(addr);

    let summary = dispatcher.run().await.unwrap();

    assert_eq!(summary.total, 2);
    assert_eq!(summary.succeeded, 1);
    assert_eq!(summary.failed, 1);
    assert!(!summary.degraded);
    assert_eq!(state.listings.lock().unwrap().len(), 2);
    assert_eq!(state.refreshes.lock().unwrap().len(), 2);
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_action_endpoint_runs_pipeline() {
    let (addr, _state) = spawn_emby().await;
    let app = freshen::api::router(dispatcher_for(addr));

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/actions/refresh-recent")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["total"], 2);
    assert_eq!(body["mode"], "refresh");
}

#[tokio::test]
async fn test_unknown_action_is_not_found() {
    let (addr, state) = spawn_emby().await;
    let app = freshen::api::router(dispatcher_for(addr));

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/actions/runcmd")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert!(state.listings.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_health_reports_action() {
    let (addr, _state) = spawn_emby().await;
    let app = freshen::api::router(dispatcher_for(addr));

    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["action"], "refresh-recent");
    assert_eq!(body["running"], false);
}
