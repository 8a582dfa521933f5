// tests/http_transport.rs
//
// Exercises the reqwest transport and the retry loop against a real local
// socket served by axum.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::post,
    Json, Router,
};
use serde_json::{json, Value};

use ioc_feed_etl::ingest::fetch::{FeedTransport, Fetcher, HttpTransport, TransportError, AUTH_HEADER};
use ioc_feed_etl::ingest::retry::{RecordingSleeper, RetryPolicy};
use ioc_feed_etl::ingest::types::FeedQuery;

#[derive(Clone, Default)]
struct FeedState {
    hits: Arc<AtomicUsize>,
    seen: Arc<Mutex<Vec<(Option<String>, Value)>>>,
}

/// First request is rate limited, the rest succeed.
async fn flaky_feed(
    State(st): State<FeedState>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> axum::response::Response {
    let key = headers
        .get(AUTH_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    st.seen.lock().unwrap().push((key, body));

    if st.hits.fetch_add(1, Ordering::SeqCst) == 0 {
        return (StatusCode::TOO_MANY_REQUESTS, [("retry-after", "0")], "slow down").into_response();
    }
    Json(json!({"query_status": "ok", "data": [{"id": "41"}, {"id": "42"}]})).into_response()
}

async fn slow_feed() -> &'static str {
    tokio::time::sleep(Duration::from_secs(5)).await;
    "{}"
}

async fn serve(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}/api/v1/")
}

fn query(endpoint: String) -> FeedQuery {
    FeedQuery {
        endpoint,
        auth_key: "test-key".into(),
        days: 3,
    }
}

#[tokio::test]
async fn rate_limited_then_ok_over_http() {
    let st = FeedState::default();
    let app = Router::new()
        .route("/api/v1/", post(flaky_feed))
        .with_state(st.clone());
    let endpoint = serve(app).await;

    let fetcher = Fetcher::new(
        HttpTransport::new(Duration::from_secs(5)).unwrap(),
        RecordingSleeper::new(),
        RetryPolicy::default(),
    );
    let raw = fetcher.fetch(&query(endpoint)).await.expect("fetch ok");

    assert_eq!(raw.data_len(), 2);
    assert_eq!(st.hits.load(Ordering::SeqCst), 2);
    assert_eq!(fetcher.sleeper().recorded(), vec![Duration::ZERO]);

    let seen = st.seen.lock().unwrap().clone();
    for (key, body) in seen {
        assert_eq!(key.as_deref(), Some("test-key"));
        assert_eq!(body, json!({"query": "get_iocs", "days": 3}));
    }
}

#[tokio::test]
async fn slow_server_is_classified_as_timeout() {
    let app = Router::new().route("/api/v1/", post(slow_feed));
    let endpoint = serve(app).await;

    let transport = HttpTransport::new(Duration::from_millis(200)).unwrap();
    let err = transport.send(&query(endpoint)).await.unwrap_err();
    assert!(matches!(err, TransportError::Timeout(_)), "got {err:?}");
}

#[tokio::test]
async fn closed_port_is_classified_as_connect_failure() {
    // Bind then drop to get a port with nothing listening.
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let transport = HttpTransport::new(Duration::from_secs(2)).unwrap();
    let err = transport
        .send(&query(format!("http://{addr}/api/v1/")))
        .await
        .unwrap_err();
    assert!(matches!(err, TransportError::Connect(_)), "got {err:?}");
}
