use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use chrono::Utc;
use futures::{SinkExt, StreamExt};
use serde_json::Value;
use statuswatch::api::ApiServer;
use statuswatch::models::CheckResult;
use statuswatch::store::Store;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_tungstenite::tungstenite::Message;
use tower::ServiceExt;

fn result(url: &str, status: bool) -> CheckResult {
    CheckResult {
        url: url.to_string(),
        status_code: if status { 200 } else { 503 },
        time_taken: "12.000 ms".into(),
        status,
        last_checked: Utc::now(),
    }
}

async fn get_json(server: &ApiServer, uri: &str) -> Value {
    let response = server
        .router()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn results_endpoint_returns_map_by_url() {
    let store = Arc::new(Store::new());
    store.update_result(result("http://a", true)).await;
    store.update_result(result("http://b", false)).await;
    let server = ApiServer::new(Arc::clone(&store), 0);

    let json = get_json(&server, "/api/results").await;
    let map = json.as_object().unwrap();
    assert_eq!(map.len(), 2);
    assert_eq!(map["http://a"]["status"], true);
    assert_eq!(map["http://b"]["statusCode"], 503);
    assert_eq!(map["http://b"]["timeTaken"], "12.000 ms");
}

#[tokio::test]
async fn history_endpoint_is_newest_first() {
    let store = Arc::new(Store::new());
    store.update_result(result("http://a", true)).await;
    store.update_result(result("http://a", false)).await;
    let server = ApiServer::new(Arc::clone(&store), 0);

    let json = get_json(&server, "/api/history").await;
    let history = json.as_array().unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0]["status"], "DOWN");
    assert_eq!(history[1]["status"], "UP");
}

#[tokio::test]
async fn static_dir_is_served_as_fallback() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("index.html"), "<h1>status</h1>").unwrap();
    let server = ApiServer::new(Arc::new(Store::new()), 0).with_static_dir(dir.path());

    let response = server
        .router()
        .oneshot(Request::builder().uri("/index.html").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&bytes[..], b"<h1>status</h1>");
}

async fn next_json<S>(ws: &mut S) -> Value
where
    S: futures::Stream<Item = Result<Message, tokio_tungstenite::tungstenite::Error>> + Unpin,
{
    let msg = tokio::time::timeout(Duration::from_secs(5), ws.next())
        .await
        .expect("timed out waiting for envelope")
        .unwrap()
        .unwrap();
    serde_json::from_str(&msg.into_text().unwrap()).unwrap()
}

#[tokio::test]
async fn websocket_streams_snapshots_and_updates() {
    let store = Arc::new(Store::new());
    store.update_result(result("http://a", true)).await;

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = ApiServer::new(Arc::clone(&store), addr.port());
    tokio::spawn(server.serve_with_listener(listener));

    let (mut ws, _) = tokio_tungstenite::connect_async(format!("ws://{addr}/ws"))
        .await
        .unwrap();

    let initial = next_json(&mut ws).await;
    assert_eq!(initial["type"], "results");
    assert_eq!(initial["data"]["http://a"]["status"], true);
    let initial = next_json(&mut ws).await;
    assert_eq!(initial["type"], "history");
    assert_eq!(initial["data"].as_array().unwrap().len(), 1);

    store.update_result(result("http://b", false)).await;

    let pushed = next_json(&mut ws).await;
    assert_eq!(pushed["type"], "results");
    assert_eq!(pushed["data"].as_object().unwrap().len(), 2);
    let pushed = next_json(&mut ws).await;
    assert_eq!(pushed["type"], "history");
    assert_eq!(pushed["data"][0]["url"], "http://b");
    assert_eq!(pushed["data"][0]["status"], "DOWN");

    ws.send(Message::Close(None)).await.unwrap();
    drop(ws);

    let unsubscribed = tokio::time::timeout(Duration::from_secs(5), async {
        while store.subscriber_count().await > 0 {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await;
    assert!(unsubscribed.is_ok(), "subscriber was not removed after close");
}
