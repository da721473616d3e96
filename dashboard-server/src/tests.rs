use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use futures_util::StreamExt;
use serde_json::{json, Value};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tower::ServiceExt;

use pratiraksha_core::logic::events::{names, EventBus};
use pratiraksha_core::logic::model::ModelInfo;
use pratiraksha_core::logic::threat::FrontendThreat;
use pratiraksha_core::logic::threat_log::ThreatStore;

use crate::config::Config;
use crate::{create_router, AppState};

fn test_state() -> AppState {
    AppState {
        config: Config {
            port: 0,
            model_path: PathBuf::from("missing.json"),
            model_info_path: PathBuf::from("missing_info.json"),
            database_path: PathBuf::from(":memory:"),
            monitor_enabled: false,
            monitor_delay: (0.0, 0.0),
            event_capacity: 16,
            json_logs: false,
        },
        store: Arc::new(ThreatStore::open_in_memory().unwrap()),
        bus: EventBus::new(16),
        detector: None,
        model_info: Arc::new(ModelInfo::default()),
    }
}

async fn call(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn flow(duration: f32) -> Value {
    json!({
        "src_ip": "192.168.7.7",
        "dst_ip": "10.0.1.9",
        "duration": duration,
        "protocol": 6,
        "src_bytes": 1200.0,
        "dst_bytes": 800.0,
        "packets": 12,
        "tcp_flags": 24,
        "active_time": 4.0,
        "idle_time": 1.0
    })
}

#[tokio::test]
async fn test_health() {
    let (status, body) = call(create_router(test_state()), get("/health")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "status": "healthy", "service": "PRATIRAKSHA-Lite" }));
}

#[tokio::test]
async fn test_stats_start_empty() {
    let (status, body) = call(create_router(test_state()), get("/api/stats")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total_flows"], 0);
    assert_eq!(body["threats_detected"], 0);
    assert_eq!(body["detection_rate"], 0.0);
}

#[tokio::test]
async fn test_model_reports_defaults_without_checkpoint() {
    let (status, body) = call(create_router(test_state()), get("/api/model")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["model_architecture"], "GCN-Threat-Detector");
    assert_eq!(body["accuracy_percentage"], 78.47);
    assert_eq!(body["status"], "Running");
    assert_eq!(body["engine"]["model_loaded"], false);
}

#[tokio::test]
async fn test_detect_logs_and_broadcasts() {
    let state = test_state();
    let mut events = state.bus.subscribe();
    let app = create_router(state);

    // Long flow trips the indicator rule
    let (status, body) = call(app.clone(), post_json("/api/detect", flow(80.0))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["threat_type"], "Ransomware");
    assert_eq!(body["status"], "BLOCKED");
    assert_eq!(body["method"], "fallback");

    let (_, body) = call(app.clone(), post_json("/api/detect", flow(10.0))).await;
    assert_eq!(body["threat_type"], "Benign");

    let first = events.try_recv().unwrap();
    assert_eq!(first.event, names::NEW_THREAT);
    assert_eq!(first.data["threat_type"], "Ransomware");
    assert_eq!(events.try_recv().unwrap().event, names::STATS_UPDATE);

    let (_, stats) = call(app.clone(), get("/api/stats")).await;
    assert_eq!(stats["total_flows"], 2);
    assert_eq!(stats["threats_detected"], 1);
    assert_eq!(stats["threat_types"]["Ransomware"], 1);

    let (status, threats) = call(app, get("/api/threats?limit=5")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(threats.as_array().unwrap().len(), 1);
    assert_eq!(threats[0]["source_ip"], "192.168.7.7");
}

#[tokio::test]
async fn test_detect_rejects_negative_values() {
    let (status, body) = call(create_router(test_state()), post_json("/api/detect", flow(-1.0))).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], 400);
    assert!(body["error"].as_str().unwrap().contains("duration"));
}

#[tokio::test]
async fn test_threat_limit_validation() {
    let (status, body) = call(create_router(test_state()), get("/api/threats?limit=0")).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], 400);
}

#[tokio::test]
async fn test_detect_rejects_negative_byte_counts() {
    let mut body = flow(10.0);
    body["dst_bytes"] = json!(-5.0);
    let (status, body) = call(create_router(test_state()), post_json("/api/detect", body)).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("dst_bytes"));
}

// ============================================================================
// WEBSOCKET
// ============================================================================

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

async fn next_envelope(client: &mut Client) -> Value {
    loop {
        let frame = tokio::time::timeout(Duration::from_secs(5), client.next())
            .await
            .expect("no frame within 5s")
            .expect("socket closed")
            .unwrap();
        if let WsMessage::Text(text) = frame {
            return serde_json::from_str(&text).unwrap();
        }
    }
}

#[tokio::test]
async fn test_ws_greets_then_forwards_bus_events() {
    let state = test_state();
    let bus = state.bus.clone();

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, create_router(state)).await.unwrap();
    });

    let (mut client, _) = tokio_tungstenite::connect_async(format!("ws://{}/ws", addr))
        .await
        .unwrap();

    let first = next_envelope(&mut client).await;
    assert_eq!(first["event"], names::MODEL_INFO);
    assert_eq!(first["data"]["model_architecture"], "GCN-Threat-Detector");
    assert_eq!(first["data"]["status"], "Running");

    let second = next_envelope(&mut client).await;
    assert_eq!(second["event"], names::STATS_UPDATE);
    assert_eq!(second["data"]["total_flows"], 0);
    assert_eq!(second["data"]["threats_detected"], 0);

    // The handler subscribes before greeting
    assert_eq!(bus.subscriber_count(), 1);
    let threat = FrontendThreat {
        timestamp: "2026-10-18 12:00:00".to_string(),
        source_ip: "192.168.3.3".to_string(),
        dest_ip: "10.0.9.9".to_string(),
        threat_type: "Locky".to_string(),
        confidence: "91%".to_string(),
        status: "BLOCKED".to_string(),
    };
    assert_eq!(bus.emit_new_threat(&threat), 1);

    let third = next_envelope(&mut client).await;
    assert_eq!(third.as_object().unwrap().len(), 2);
    assert_eq!(third["event"], names::NEW_THREAT);
    assert_eq!(
        third["data"],
        json!({
            "timestamp": "2026-10-18 12:00:00",
            "source_ip": "192.168.3.3",
            "dest_ip": "10.0.9.9",
            "threat_type": "Locky",
            "confidence": "91%",
            "status": "BLOCKED"
        })
    );
}
