//! Transmission backend against an in-process fake RPC endpoint

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use portpusher_backend_transmission::{SESSION_ID_HEADER, TransmissionPusher};
use portpusher_core::config::{BackendConfig, BackendKind};
use portpusher_core::{Error, PortPusher, PushOutcome};
use serde_json::{Value, json};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;
use tokio_test::assert_ok;

/// `admin:password` in Basic form
const EXPECTED_AUTH: &str = "Basic YWRtaW46cGFzc3dvcmQ=";

#[derive(Default)]
struct Behaviour {
    /// Answer every request with 401
    reject_credentials: bool,
    /// Leave the session id header out of 409 responses
    omit_session_header: bool,
    /// Rotate the session id on every request so no id is ever accepted
    rotate_every_request: bool,
    /// Echo a different tag than the one received
    wrong_tag: bool,
    /// Result string to report instead of "success"
    result_override: Option<String>,
}

#[derive(Default)]
struct Counters {
    requests: usize,
    conflicts: usize,
    session_sets: Vec<Value>,
}

struct FakeTransmission {
    valid_session_id: Mutex<String>,
    peer_port: Mutex<u16>,
    random_on_start: Mutex<bool>,
    behaviour: Mutex<Behaviour>,
    counters: Mutex<Counters>,
}

impl FakeTransmission {
    fn new(peer_port: u16, random_on_start: bool) -> Arc<Self> {
        Arc::new(Self {
            valid_session_id: Mutex::new("session-1".to_string()),
            peer_port: Mutex::new(peer_port),
            random_on_start: Mutex::new(random_on_start),
            behaviour: Mutex::new(Behaviour::default()),
            counters: Mutex::new(Counters::default()),
        })
    }

    fn conflicts(&self) -> usize {
        self.counters.lock().unwrap().conflicts
    }

    fn requests(&self) -> usize {
        self.counters.lock().unwrap().requests
    }

    fn session_sets(&self) -> Vec<Value> {
        self.counters.lock().unwrap().session_sets.clone()
    }
}

async fn rpc(
    State(fake): State<Arc<FakeTransmission>>,
    headers: HeaderMap,
    Json(request): Json<Value>,
) -> Response {
    fake.counters.lock().unwrap().requests += 1;
    let behaviour = fake.behaviour.lock().unwrap();

    let authorization = headers.get("authorization").and_then(|v| v.to_str().ok());
    if behaviour.reject_credentials || authorization != Some(EXPECTED_AUTH) {
        return StatusCode::UNAUTHORIZED.into_response();
    }

    let presented = headers
        .get(SESSION_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    {
        let mut valid = fake.valid_session_id.lock().unwrap();
        if behaviour.rotate_every_request {
            *valid = format!("{}x", *valid);
        }
        if presented.as_deref() != Some(valid.as_str()) {
            fake.counters.lock().unwrap().conflicts += 1;
            if behaviour.omit_session_header {
                return StatusCode::CONFLICT.into_response();
            }
            return (StatusCode::CONFLICT, [(SESSION_ID_HEADER, valid.clone())]).into_response();
        }
    }

    let tag = request["tag"].as_u64().unwrap_or_default();
    let echoed_tag = if behaviour.wrong_tag { tag + 100 } else { tag };
    let result = behaviour
        .result_override
        .clone()
        .unwrap_or_else(|| "success".to_string());

    let arguments = match request["method"].as_str() {
        Some("session-get") => json!({
            "peer-port": *fake.peer_port.lock().unwrap(),
            "peer-port-random-on-start": *fake.random_on_start.lock().unwrap(),
        }),
        Some("session-set") => {
            let args = request["arguments"].clone();
            if let Some(port) = args["peer-port"].as_u64() {
                *fake.peer_port.lock().unwrap() = port as u16;
            }
            if let Some(random) = args["peer-port-random-on-start"].as_bool() {
                *fake.random_on_start.lock().unwrap() = random;
            }
            fake.counters.lock().unwrap().session_sets.push(args);
            json!({})
        }
        _ => return StatusCode::BAD_REQUEST.into_response(),
    };

    Json(json!({ "arguments": arguments, "result": result, "tag": echoed_tag })).into_response()
}

async fn spawn_transmission(fake: Arc<FakeTransmission>) -> SocketAddr {
    let app = Router::new()
        .route("/transmission/rpc", post(rpc))
        .with_state(fake);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    addr
}

fn pusher_for(addr: SocketAddr) -> TransmissionPusher {
    let config = BackendConfig::new(BackendKind::Transmission, addr.ip().to_string())
        .with_port(addr.port());
    TransmissionPusher::new(&config).unwrap()
}

#[tokio::test]
async fn first_push_performs_exactly_one_handshake() {
    let fake = FakeTransmission::new(12345, false);
    let addr = spawn_transmission(fake.clone()).await;
    let pusher = pusher_for(addr);

    let outcome = assert_ok!(pusher.push(12345).await);

    assert_eq!(outcome, PushOutcome::Unchanged { port: 12345 });
    assert_eq!(fake.conflicts(), 1);
    assert_eq!(fake.requests(), 2);
    assert!(fake.session_sets().is_empty());
    assert_eq!(pusher.session_id().await.as_deref(), Some("session-1"));
}

#[tokio::test]
async fn mismatched_port_is_set_once_then_left_alone() {
    let fake = FakeTransmission::new(9999, false);
    let addr = spawn_transmission(fake.clone()).await;
    let pusher = pusher_for(addr);

    let first = assert_ok!(pusher.push(12345).await);
    let second = assert_ok!(pusher.push(12345).await);

    assert_eq!(
        first,
        PushOutcome::Pushed {
            previous_port: Some(9999),
            port: 12345
        }
    );
    assert_eq!(second, PushOutcome::Unchanged { port: 12345 });
    assert_eq!(
        fake.session_sets(),
        vec![json!({ "peer-port": 12345, "peer-port-random-on-start": false })]
    );
    // Session id stays cached across pushes
    assert_eq!(fake.conflicts(), 1);
}

#[tokio::test]
async fn random_on_start_forces_a_write() {
    let fake = FakeTransmission::new(12345, true);
    let addr = spawn_transmission(fake.clone()).await;

    let outcome = assert_ok!(pusher_for(addr).push(12345).await);

    assert!(outcome.changed());
    assert_eq!(fake.session_sets().len(), 1);
    assert!(!*fake.random_on_start.lock().unwrap());
}

#[tokio::test]
async fn unauthorized_clears_session_and_next_push_renegotiates() {
    let fake = FakeTransmission::new(12345, false);
    let addr = spawn_transmission(fake.clone()).await;
    let pusher = pusher_for(addr);

    assert_ok!(pusher.push(12345).await);
    assert!(pusher.session_id().await.is_some());

    fake.behaviour.lock().unwrap().reject_credentials = true;
    let err = pusher.push(12345).await.unwrap_err();
    assert!(matches!(err, Error::Authentication(_)));
    assert!(pusher.session_id().await.is_none());

    fake.behaviour.lock().unwrap().reject_credentials = false;
    assert_ok!(pusher.push(12345).await);
    assert_eq!(fake.conflicts(), 2);
}

#[tokio::test]
async fn conflict_without_session_header_is_handshake_error() {
    let fake = FakeTransmission::new(12345, false);
    fake.behaviour.lock().unwrap().omit_session_header = true;
    let addr = spawn_transmission(fake.clone()).await;

    let err = pusher_for(addr).push(12345).await.unwrap_err();

    assert!(matches!(err, Error::Handshake(_)));
    assert_eq!(fake.requests(), 1);
}

#[tokio::test]
async fn second_conflict_is_not_retried_again() {
    let fake = FakeTransmission::new(12345, false);
    fake.behaviour.lock().unwrap().rotate_every_request = true;
    let addr = spawn_transmission(fake.clone()).await;

    let err = pusher_for(addr).push(12345).await.unwrap_err();

    assert!(matches!(err, Error::Handshake(_)));
    assert_eq!(fake.requests(), 2);
}

#[tokio::test]
async fn non_success_result_is_rpc_error() {
    let fake = FakeTransmission::new(9999, false);
    fake.behaviour.lock().unwrap().result_override = Some("invalid argument".to_string());
    let addr = spawn_transmission(fake.clone()).await;

    let err = pusher_for(addr).push(12345).await.unwrap_err();

    assert!(matches!(err, Error::Rpc { .. }));
    assert!(err.to_string().contains("invalid argument"));
    assert!(fake.session_sets().is_empty());
}

#[tokio::test]
async fn mismatched_tag_is_protocol_error() {
    let fake = FakeTransmission::new(12345, false);
    fake.behaviour.lock().unwrap().wrong_tag = true;
    let addr = spawn_transmission(fake).await;

    let err = pusher_for(addr).push(12345).await.unwrap_err();

    assert!(matches!(err, Error::Protocol(_)));
}
