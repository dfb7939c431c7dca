//! End-to-end tests for the webhook relay: real HTTP listener, real
//! transports, mock downstream endpoints.

use alertrelay::{
    core::LogQuerier,
    dispatch::{ChannelSet, Dispatcher},
    enrichment::LokiClient,
    server::{self, AppState},
    transport::{FeishuTransport, SyslogProtocol, SyslogTransport},
};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::sync::mpsc;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn registry(entries: &[(&str, &str)]) -> BTreeMap<String, String> {
    entries
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

fn build_state(
    feishu_targets: BTreeMap<String, String>,
    syslog_targets: BTreeMap<String, String>,
    enricher: Option<Arc<dyn LogQuerier>>,
) -> Arc<AppState> {
    let feishu = ChannelSet {
        targets: feishu_targets,
        transport: Arc::new(FeishuTransport::new(Duration::from_secs(2)).unwrap()),
    };
    let syslog = ChannelSet {
        targets: syslog_targets,
        transport: Arc::new(SyslogTransport::new(
            SyslogProtocol::Tcp,
            Duration::from_secs(2),
        )),
    };

    let mut dispatcher = Dispatcher::new(feishu, syslog);
    if let Some(enricher) = enricher {
        dispatcher = dispatcher.with_enricher(enricher, 10, 5);
    }

    Arc::new(AppState {
        dispatcher,
        prometheus: None,
    })
}

/// Binds the relay on an ephemeral port and returns its base URL.
async fn spawn_relay(state: Arc<AppState>) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, server::router(state)).await.unwrap();
    });
    format!("http://{addr}")
}

fn firing_batch(alert_name: &str, annotations: serde_json::Value) -> serde_json::Value {
    serde_json::json!({
        "version": "4",
        "groupKey": "{}:{}",
        "status": "firing",
        "receiver": "relay",
        "groupLabels": {},
        "commonLabels": {},
        "commonAnnotations": {},
        "externalURL": "http://alertmanager:9093",
        "alerts": [{
            "status": "firing",
            "labels": {"alertname": alert_name},
            "annotations": annotations,
            "startsAt": "2024-05-01T10:00:00Z",
            "endsAt": "0001-01-01T00:00:00Z",
            "generatorURL": "",
            "fingerprint": "abcdef0123456789"
        }]
    })
}

#[tokio::test]
async fn malformed_json_is_rejected_with_400() {
    let state = build_state(registry(&[("ops", "http://unused")]), registry(&[]), None);
    let base = spawn_relay(state).await;

    let response = reqwest::Client::new()
        .post(format!("{base}/feishu"))
        .header("content-type", "application/json")
        .body("this is not json")
        .send()
        .await
        .unwrap();

    assert_eq!(response.status().as_u16(), 400);
    assert_eq!(response.text().await.unwrap(), "Invalid JSON");
}

#[tokio::test]
async fn empty_alerts_acknowledged_without_deliveries() {
    let feishu = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/hook"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&feishu)
        .await;

    let state = build_state(
        registry(&[("ops", &format!("{}/hook", feishu.uri()))]),
        registry(&[]),
        None,
    );
    let base = spawn_relay(state).await;

    let mut body = firing_batch("HighCPU", serde_json::json!({}));
    body["alerts"] = serde_json::json!([]);

    let response = reqwest::Client::new()
        .post(format!("{base}/feishu"))
        .json(&body)
        .send()
        .await
        .unwrap();

    assert_eq!(response.status().as_u16(), 200);
    assert_eq!(response.text().await.unwrap(), "ok");
}

#[tokio::test]
async fn unknown_target_acknowledged_without_deliveries() {
    let feishu = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&feishu)
        .await;

    let state = build_state(
        registry(&[("ops", &format!("{}/hook", feishu.uri()))]),
        registry(&[]),
        None,
    );
    let base = spawn_relay(state).await;

    let response = reqwest::Client::new()
        .post(format!("{base}/feishu?target=nonexistent"))
        .json(&firing_batch("HighCPU", serde_json::json!({})))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status().as_u16(), 200);
}

#[tokio::test]
async fn firing_alert_reaches_feishu_with_alert_name() {
    let feishu = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/hook"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&feishu)
        .await;

    let state = build_state(
        registry(&[("ops", &format!("{}/hook", feishu.uri()))]),
        registry(&[]),
        None,
    );
    let base = spawn_relay(state).await;

    let response = reqwest::Client::new()
        .post(format!("{base}/feishu?target=ops"))
        .json(&firing_batch(
            "HighCPU",
            serde_json::json!({"summary": "cpu high"}),
        ))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);
    assert_eq!(response.text().await.unwrap(), "ok");

    let requests = feishu.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert_eq!(body["msg_type"], "text");
    let text = body["content"]["text"].as_str().unwrap();
    assert!(text.contains("HighCPU"));
    assert!(text.contains("cpu high"));
    assert!(!text.contains("Trigger Logs"));
}

#[tokio::test]
async fn one_failed_target_does_not_stop_the_other() {
    let feishu = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/hook"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&feishu)
        .await;

    // Bind-then-drop guarantees nothing is listening on the dead port.
    let dead = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let dead_addr = dead.local_addr().unwrap();
    drop(dead);

    let state = build_state(
        registry(&[
            ("alive", &format!("{}/hook", feishu.uri())),
            ("dead", &format!("http://{dead_addr}/hook")),
        ]),
        registry(&[]),
        None,
    );
    let base = spawn_relay(state).await;

    let response = reqwest::Client::new()
        .post(format!("{base}/feishu"))
        .json(&firing_batch("HighCPU", serde_json::json!({})))
        .send()
        .await
        .unwrap();

    // Delivery failure is invisible to the sender.
    assert_eq!(response.status().as_u16(), 200);
    assert_eq!(feishu.received_requests().await.unwrap().len(), 1);
}

#[tokio::test]
async fn syslog_target_receives_framed_alert() {
    let collector = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let collector_addr = collector.local_addr().unwrap();
    let (tx, mut rx) = mpsc::channel::<String>(1);

    tokio::spawn(async move {
        let (mut socket, _) = collector.accept().await.unwrap();
        let mut buf = String::new();
        socket.read_to_string(&mut buf).await.unwrap();
        tx.send(buf).await.unwrap();
    });

    let state = build_state(
        registry(&[]),
        registry(&[("siem", &collector_addr.to_string())]),
        None,
    );
    let base = spawn_relay(state).await;

    let response = reqwest::Client::new()
        .post(format!("{base}/syslog"))
        .json(&firing_batch(
            "DiskFull",
            serde_json::json!({"summary": "disk almost full"}),
        ))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);

    let received = tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("collector timed out")
        .expect("collector closed");
    assert!(received.starts_with("<129>"));
    assert!(received.contains("DiskFull"));
    assert!(received.contains("disk almost full"));
}

#[tokio::test]
async fn alert_with_log_query_is_enriched_from_loki() {
    let loki = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/loki/api/v1/query_range"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "status": "success",
            "data": {
                "resultType": "streams",
                "result": [{
                    "stream": {"job": "node"},
                    "values": [
                        ["1700000000000000001", "oom-killer invoked"],
                        ["1700000000000000000", "memory pressure high"]
                    ]
                }]
            }
        })))
        .mount(&loki)
        .await;

    let feishu = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/hook"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&feishu)
        .await;

    let enricher: Arc<dyn LogQuerier> = Arc::new(
        LokiClient::new(loki.uri(), None, None, Duration::from_secs(2)).unwrap(),
    );
    let state = build_state(
        registry(&[("ops", &format!("{}/hook", feishu.uri()))]),
        registry(&[]),
        Some(enricher),
    );
    let base = spawn_relay(state).await;

    let response = reqwest::Client::new()
        .post(format!("{base}/feishu"))
        .json(&firing_batch(
            "OomRisk",
            serde_json::json!({"log_query": "{job=\"node\"}"}),
        ))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);

    let requests = feishu.received_requests().await.unwrap();
    let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
    let text = body["content"]["text"].as_str().unwrap();
    assert!(text.contains("Trigger Logs:"));
    assert!(text.contains("1. oom-killer invoked"));
    assert!(text.contains("2. memory pressure high"));
}
