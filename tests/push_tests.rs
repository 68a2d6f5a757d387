// PushService tests against a local axum receiver

mod common;

use axum::{
    Json, Router,
    extract::State,
    http::{HeaderMap, StatusCode},
    routing::post,
};
use common::{FakeHost, FakeRuntime, container};
use sentinel::push::{PushConfig, PushError, PushService};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Clone, Default)]
struct Received {
    requests: Arc<Mutex<Vec<(Option<String>, serde_json::Value)>>>,
}

async fn receive(
    State(rx): State<Received>,
    headers: HeaderMap,
    Json(body): Json<serde_json::Value>,
) -> StatusCode {
    let auth = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    assert_eq!(
        headers.get("user-agent").and_then(|v| v.to_str().ok()),
        Some(sentinel::version::user_agent().as_str())
    );
    rx.requests.lock().unwrap().push((auth, body));
    StatusCode::OK
}

async fn serve(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}/api/v1/sentinel/push")
}

fn push_config(url: String) -> PushConfig {
    PushConfig {
        url,
        token: "secret".into(),
        interval: Duration::from_secs(60),
        timeout: Duration::from_secs(2),
    }
}

fn runtime() -> FakeRuntime {
    let mut labelled = container("c1", "api");
    labelled
        .labels
        .insert("coolify.name".into(), "api-prod".into());
    let mut rt = FakeRuntime::with_containers(vec![
        labelled,
        container("c2", "worker"),
        container("c3", "cron"),
    ]);
    rt.health.insert("c1".into(), Ok(Some("healthy".into())));
    rt.health.insert("c3".into(), Err("inspect failed".into()));
    rt
}

#[tokio::test]
async fn push_once_posts_snapshot_with_bearer_token() {
    let received = Received::default();
    let router = Router::new()
        .route("/api/v1/sentinel/push", post(receive))
        .with_state(received.clone());
    let url = serve(router).await;

    let service = PushService::new(
        Arc::new(FakeHost::default()),
        Arc::new(runtime()),
        push_config(url),
    )
    .unwrap();
    service.push_once().await.unwrap();

    let requests = received.requests.lock().unwrap();
    assert_eq!(requests.len(), 1);
    let (auth, body) = &requests[0];
    assert_eq!(auth.as_deref(), Some("Bearer secret"));
    assert_eq!(body["filesystem_usage_root"]["used_percentage"], "42");

    let containers = body["containers"].as_array().unwrap();
    assert_eq!(containers.len(), 3);
    assert_eq!(containers[0]["id"], "c1");
    assert_eq!(containers[0]["name"], "api");
    assert_eq!(containers[0]["image"], "api:latest");
    assert_eq!(containers[0]["state"], "running");
    assert_eq!(containers[0]["labels"]["coolify.name"], "api-prod");
    assert_eq!(containers[0]["health_status"], "healthy");
    assert_eq!(containers[1]["health_status"], "unhealthy");
    assert_eq!(containers[2]["health_status"], "unknown");
    let time = containers[0]["time"].as_str().unwrap();
    assert!(chrono::DateTime::parse_from_rfc3339(time).is_ok(), "{time}");
}

#[tokio::test]
async fn non_200_is_reported() {
    let router = Router::new().route(
        "/api/v1/sentinel/push",
        post(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "nope") }),
    );
    let url = serve(router).await;
    let service = PushService::new(
        Arc::new(FakeHost::default()),
        Arc::new(runtime()),
        push_config(url),
    )
    .unwrap();
    match service.push_once().await {
        Err(PushError::Status { status, body, .. }) => {
            assert_eq!(status.as_u16(), 500);
            assert_eq!(body, "nope");
        }
        other => panic!("expected status error, got {other:?}"),
    }
}

#[tokio::test]
async fn unreachable_endpoint_is_a_transport_error() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    let service = PushService::new(
        Arc::new(FakeHost::default()),
        Arc::new(runtime()),
        push_config(format!("http://{addr}/push")),
    )
    .unwrap();
    assert!(matches!(
        service.push_once().await,
        Err(PushError::Transport { .. })
    ));
}

#[tokio::test]
async fn list_failure_skips_the_push() {
    let rt = FakeRuntime {
        list_fails: true,
        ..Default::default()
    };
    let service = PushService::new(
        Arc::new(FakeHost::default()),
        Arc::new(rt),
        push_config("http://127.0.0.1:9/push".into()),
    )
    .unwrap();
    assert!(matches!(
        service.build_snapshot().await,
        Err(PushError::Snapshot(_))
    ));
}

#[tokio::test(start_paused = true)]
async fn health_inspects_overlap_and_keep_list_order() {
    let containers: Vec<_> = (0..8)
        .map(|i| container(&format!("id{i}"), &format!("c{i}")))
        .collect();
    let rt = FakeRuntime {
        health_delay: Some(Duration::from_secs(1)),
        ..FakeRuntime::with_containers(containers)
    };
    let service = PushService::new(
        Arc::new(FakeHost::default()),
        Arc::new(rt),
        push_config("http://127.0.0.1:9/push".into()),
    )
    .unwrap();

    let started = tokio::time::Instant::now();
    let snapshot = service.build_snapshot().await.unwrap();
    assert!(started.elapsed() < Duration::from_secs(2), "{:?}", started.elapsed());
    let ids: Vec<_> = snapshot.containers.iter().map(|c| c.id.as_str()).collect();
    assert_eq!(ids, ["id0", "id1", "id2", "id3", "id4", "id5", "id6", "id7"]);
}

#[tokio::test]
async fn run_stops_on_cancel() {
    let service = PushService::new(
        Arc::new(FakeHost::default()),
        Arc::new(runtime()),
        push_config("http://127.0.0.1:9/push".into()),
    )
    .unwrap();
    let cancel = tokio_util::sync::CancellationToken::new();
    let handle = service.spawn(cancel.clone());
    cancel.cancel();
    tokio::time::timeout(Duration::from_secs(2), handle)
        .await
        .expect("push loop did not stop")
        .unwrap();
}
