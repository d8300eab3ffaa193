// tests/influx_http.rs
use axum::extract::{RawQuery, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::post;
use axum::Router;
use chrono::{TimeZone, Utc};
use feedflux::sink::{InfluxConfig, InfluxHttpStore, TimeSeriesStore, WriteError};
use feedflux::{CanonicalEvent, Sink};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Debug, Clone)]
struct Seen {
    path: &'static str,
    query: Option<String>,
    auth: Option<String>,
    body: String,
}

#[derive(Clone, Default)]
struct Recorder {
    seen: Arc<Mutex<Vec<Seen>>>,
    reject_writes: bool,
    query_error: Option<&'static str>,
}

fn auth(headers: &HeaderMap) -> Option<String> {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

async fn query(
    State(r): State<Recorder>,
    headers: HeaderMap,
    RawQuery(q): RawQuery,
    body: String,
) -> (StatusCode, String) {
    r.seen.lock().unwrap().push(Seen {
        path: "/query",
        query: q,
        auth: auth(&headers),
        body,
    });
    let payload = match r.query_error {
        Some(e) => format!(r#"{{"results":[{{"statement_id":0,"error":"{e}"}}]}}"#),
        None => r#"{"results":[{"statement_id":0}]}"#.to_string(),
    };
    (StatusCode::OK, payload)
}

async fn write(
    State(r): State<Recorder>,
    headers: HeaderMap,
    RawQuery(q): RawQuery,
    body: String,
) -> (StatusCode, String) {
    r.seen.lock().unwrap().push(Seen {
        path: "/write",
        query: q,
        auth: auth(&headers),
        body,
    });
    if r.reject_writes {
        (
            StatusCode::BAD_REQUEST,
            r#"{"error":"unable to parse"}"#.to_string(),
        )
    } else {
        (StatusCode::NO_CONTENT, String::new())
    }
}

async fn spawn_influx(rec: Recorder) -> u16 {
    let app = Router::new()
        .route("/query", post(query))
        .route("/write", post(write))
        .with_state(rec);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("listener should bind");
    let port = listener.local_addr().expect("local addr").port();
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("server should run");
    });
    port
}

fn cfg(port: u16, username: &str) -> InfluxConfig {
    InfluxConfig {
        host: "127.0.0.1".into(),
        port,
        database: "rss".into(),
        username: username.into(),
        password: "secret".into(),
        timeout: Duration::from_secs(2),
    }
}

fn event() -> CanonicalEvent {
    CanonicalEvent {
        title: "A &amp; B".into(),
        text: "line1<br>line2".into(),
        url: String::new(),
        id: "1".into(),
        timestamp: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        measurement: "https://blog.example.test/atom.xml".into(),
    }
}

#[tokio::test]
async fn ensure_database_posts_create_statement() {
    let rec = Recorder::default();
    let port = spawn_influx(rec.clone()).await;
    let store = InfluxHttpStore::connect(&cfg(port, "")).unwrap();

    store.ensure_database("rss").await.expect("create ok");

    let seen = rec.seen.lock().unwrap();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].path, "/query");
    assert_eq!(seen[0].body, "q=CREATE+DATABASE+%22rss%22");
    assert!(seen[0].auth.is_none());
}

#[tokio::test]
async fn statement_error_surfaces() {
    let rec = Recorder {
        query_error: Some("authorization failed"),
        ..Recorder::default()
    };
    let port = spawn_influx(rec.clone()).await;
    let store = InfluxHttpStore::connect(&cfg(port, "")).unwrap();

    let err = store.ensure_database("rss").await.unwrap_err();
    assert!(matches!(err, WriteError::Query(ref m) if m == "authorization failed"));
}

#[tokio::test]
async fn sink_writes_one_line_per_event() {
    let rec = Recorder::default();
    let port = spawn_influx(rec.clone()).await;
    let store = InfluxHttpStore::connect(&cfg(port, "admin")).unwrap();
    let sink = Sink::new(Arc::new(store));

    sink.write(&event()).await.expect("write ok");

    let seen = rec.seen.lock().unwrap();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].path, "/write");
    assert_eq!(seen[0].query.as_deref(), Some("db=rss&precision=s"));
    assert!(seen[0]
        .auth
        .as_deref()
        .is_some_and(|a| a.starts_with("Basic ")));
    assert_eq!(
        seen[0].body,
        r"https://blog.example.test/atom.xml,id=1,text=line1<br>line2,title=A\ &amp;\ B timestamp=1704067200i 1704067200"
    );
}

#[tokio::test]
async fn rejected_write_is_a_status_error() {
    let rec = Recorder {
        reject_writes: true,
        ..Recorder::default()
    };
    let port = spawn_influx(rec.clone()).await;
    let sink = Sink::new(Arc::new(InfluxHttpStore::connect(&cfg(port, "")).unwrap()));

    let err = sink.write(&event()).await.unwrap_err();
    assert!(matches!(err, WriteError::Status { status: 400, .. }));
    // at-most-once: exactly one attempt reached the store
    assert_eq!(rec.seen.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn unreachable_store_is_a_request_error() {
    // bind then drop to get a port nobody listens on
    let port = {
        let l = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        l.local_addr().unwrap().port()
    };
    let store = InfluxHttpStore::connect(&cfg(port, "")).unwrap();
    let err = store.ensure_database("rss").await.unwrap_err();
    assert!(matches!(err, WriteError::Request(_)));
}
