#![allow(clippy::unwrap_used)]
// MQTT stream lifecycle tests: reconnect loop, fail-fast commands, shutdown.
//
// No broker is needed: the key login is served by wiremock. Fault tests
// point the broker at a closed local port; the connect-cycle test drives
// the loop through a scripted connector.

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, OnceLock};
use std::time::Duration;

use rumqttc::{ConnAck, ConnectReturnCode, Event, MqttOptions, Packet, Publish, QoS};
use serde_json::{Value, json};
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use sigen_api::stream::COMMAND_TOPIC;
use sigen_api::{
    AuthSession, BrokerConnector, BrokerEvents, BrokerLink, ConnectionState, Credentials, Error,
    ReconnectPolicy, Region, StreamConfig, StreamEvent, StreamHandle, SubscriptionDescriptor,
};

// ── Helpers ─────────────────────────────────────────────────────────

fn key_session(server: &MockServer) -> Arc<AuthSession> {
    Arc::new(AuthSession::new(
        reqwest::Client::new(),
        Url::parse(&format!("{}/", server.uri())).unwrap(),
        Credentials::AppKey {
            app_key: "APPKEY".into(),
            app_secret: "secret".to_string().into(),
        },
    ))
}

fn fast_config(ca_cert: PathBuf) -> StreamConfig {
    let mut config = StreamConfig::for_region(Region::Eu, "APPKEY", vec!["S1".into()], ca_cert);
    // Port 1 on loopback is never listening.
    config.broker = "127.0.0.1".into();
    config.port = 1;
    config.reconnect = ReconnectPolicy {
        broker_fault: Duration::from_millis(50),
        unexpected_fault: Duration::from_millis(50),
    };
    config
}

fn ca_file() -> tempfile::NamedTempFile {
    let file = tempfile::NamedTempFile::new().unwrap();
    std::fs::write(file.path(), b"-----BEGIN CERTIFICATE-----\n").unwrap();
    file
}

async fn login_attempts(server: &MockServer) -> usize {
    server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .filter(|r| r.url.path() == "/openapi/auth/login/key")
        .count()
}

async fn wait_for_attempts(server: &MockServer, want: usize) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while login_attempts(server).await < want {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();
}

async fn mount_key_login(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/openapi/auth/login/key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "code": 0,
            "data": { "accessToken": "nb-token", "expiresIn": 43199 }
        })))
        .mount(server)
        .await;
}

// ── Scripted broker ─────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
enum Call {
    Connect,
    Publish {
        topic: String,
        payload: Value,
        state: ConnectionState,
    },
    Subscribe {
        topic: String,
        state: ConnectionState,
    },
}

/// Every broker interaction, tagged with the stream state at the time.
#[derive(Clone, Default)]
struct CallLog {
    calls: Arc<Mutex<Vec<Call>>>,
    state: Arc<OnceLock<watch::Receiver<ConnectionState>>>,
}

impl CallLog {
    fn push(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }

    fn current_state(&self) -> ConnectionState {
        self.state
            .get()
            .map_or(ConnectionState::Idle, |rx| rx.borrow().clone())
    }

    fn snapshot(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    fn connects(&self) -> usize {
        self.snapshot().iter().filter(|c| **c == Call::Connect).count()
    }
}

struct ScriptedLink {
    log: CallLog,
}

impl BrokerLink for ScriptedLink {
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<(), Error> {
        self.log.push(Call::Publish {
            topic: topic.into(),
            payload: serde_json::from_slice(&payload).unwrap(),
            state: self.log.current_state(),
        });
        Ok(())
    }

    async fn subscribe(&self, topic: &str) -> Result<(), Error> {
        self.log.push(Call::Subscribe {
            topic: topic.into(),
            state: self.log.current_state(),
        });
        Ok(())
    }
}

type Script = mpsc::UnboundedReceiver<Result<Event, Error>>;

/// Replays queued events; once the script runs dry the connection idles.
struct ScriptedEvents {
    script: Option<Script>,
}

impl BrokerEvents for ScriptedEvents {
    async fn next_event(&mut self) -> Result<Event, Error> {
        let next = match self.script.as_mut() {
            Some(script) => script.recv().await,
            None => None,
        };
        match next {
            Some(next) => next,
            None => std::future::pending().await,
        }
    }
}

struct ScriptedConnector {
    log: CallLog,
    scripts: Mutex<VecDeque<Script>>,
}

impl BrokerConnector for ScriptedConnector {
    type Link = ScriptedLink;
    type Events = ScriptedEvents;

    fn connect(&self, _options: MqttOptions, _capacity: usize) -> (ScriptedLink, ScriptedEvents) {
        self.log.push(Call::Connect);
        let script = self.scripts.lock().unwrap().pop_front();
        (
            ScriptedLink {
                log: self.log.clone(),
            },
            ScriptedEvents { script },
        )
    }
}

fn connack() -> Result<Event, Error> {
    Ok(Event::Incoming(Packet::ConnAck(ConnAck {
        session_present: false,
        code: ConnectReturnCode::Success,
    })))
}

/// Connect, the three subscription requests, then one subscribe per topic.
fn expected_cycle(descriptor: &SubscriptionDescriptor) -> Vec<Call> {
    let request = json!({ "accessToken": "nb-token", "systemIdList": descriptor.system_ids() });
    let mut calls = vec![Call::Connect];
    calls.extend(
        descriptor
            .request_topics()
            .into_iter()
            .map(|topic| Call::Publish {
                topic,
                payload: request.clone(),
                state: ConnectionState::Subscribing,
            }),
    );
    calls.extend(descriptor.topics().into_iter().map(|topic| Call::Subscribe {
        topic,
        state: ConnectionState::Subscribing,
    }));
    calls
}

async fn wait_for_state(state: &mut watch::Receiver<ConnectionState>, want: ConnectionState) {
    tokio::time::timeout(Duration::from_secs(5), state.wait_for(|s| *s == want))
        .await
        .unwrap()
        .unwrap();
}

// ── Tests ───────────────────────────────────────────────────────────

#[tokio::test]
async fn test_every_connect_republishes_and_resubscribes() {
    let server = MockServer::start().await;
    mount_key_login(&server).await;

    let (first_tx, first_rx) = mpsc::unbounded_channel();
    let (second_tx, second_rx) = mpsc::unbounded_channel();
    let log = CallLog::default();
    let connector = ScriptedConnector {
        log: log.clone(),
        scripts: Mutex::new(VecDeque::from([first_rx, second_rx])),
    };

    let ca = ca_file();
    let mut config = fast_config(ca.path().to_path_buf());
    config.system_ids = vec!["S1".into(), "S2".into()];
    let descriptor = config.descriptor();

    let handle = StreamHandle::spawn_with(
        connector,
        key_session(&server),
        config,
        CancellationToken::new(),
    )
    .unwrap();
    log.state.set(handle.state()).unwrap();
    let mut events = handle.subscribe();
    let mut state = handle.state();

    // First connection: ConnAck → Subscribing → Streaming.
    first_tx.send(connack()).unwrap();
    wait_for_state(&mut state, ConnectionState::Streaming).await;

    handle
        .send_command(&[json!({ "op": "charge" })])
        .await
        .unwrap();

    first_tx
        .send(Ok(Event::Incoming(Packet::Publish(Publish::new(
            "openapi/alarm/APPKEY/S1",
            QoS::AtMostOnce,
            br#"{"alarmCode":7}"#.to_vec(),
        )))))
        .unwrap();
    let event = tokio::time::timeout(Duration::from_secs(5), events.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(*event, StreamEvent::Alarm(json!({ "alarmCode": 7 })));

    // Broker drops the connection; the loop reconnects on its own.
    first_tx
        .send(Err(Error::Broker(rumqttc::ConnectionError::RequestsDone)))
        .unwrap();
    tokio::time::timeout(Duration::from_secs(5), async {
        while log.connects() < 2 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();

    second_tx.send(connack()).unwrap();
    wait_for_state(&mut state, ConnectionState::Streaming).await;

    let mut expected = expected_cycle(&descriptor);
    expected.push(Call::Publish {
        topic: COMMAND_TOPIC.into(),
        payload: json!({ "accessToken": "nb-token", "commands": [{ "op": "charge" }] }),
        state: ConnectionState::Streaming,
    });
    expected.extend(expected_cycle(&descriptor));
    assert_eq!(log.snapshot(), expected);

    // The token was still valid on reconnect.
    assert_eq!(login_attempts(&server).await, 1);

    handle.shutdown();
    let state = handle.state();
    handle.join().await;
    assert_eq!(*state.borrow(), ConnectionState::Idle);
}

#[tokio::test]
async fn test_auth_failure_keeps_retrying_until_shutdown() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/openapi/auth/login/key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "code": 11003,
            "msg": "invalid key"
        })))
        .mount(&server)
        .await;

    let ca = ca_file();
    let cancel = CancellationToken::new();
    let handle = StreamHandle::spawn(
        key_session(&server),
        fast_config(ca.path().to_path_buf()),
        cancel.clone(),
    )
    .unwrap();
    let mut state = handle.state();

    // Each attempt re-runs the login.
    wait_for_attempts(&server, 3).await;

    tokio::time::timeout(Duration::from_secs(5), async {
        while !matches!(*state.borrow_and_update(), ConnectionState::Faulted(_)) {
            state.changed().await.unwrap();
        }
    })
    .await
    .unwrap();

    let err = handle.send_command(&[json!({ "op": "noop" })]).await.unwrap_err();
    assert!(matches!(err, Error::NotConnected), "got {err:?}");

    handle.shutdown();
    let state = handle.state();
    handle.join().await;
    assert_eq!(*state.borrow(), ConnectionState::Idle);
}

#[tokio::test]
async fn test_broker_fault_reconnects_with_fresh_login() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/openapi/auth/login/key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "code": 0,
            "data": { "accessToken": "nb-token", "expiresIn": 43199 }
        })))
        .mount(&server)
        .await;

    let ca = ca_file();
    let handle = StreamHandle::spawn(
        key_session(&server),
        fast_config(ca.path().to_path_buf()),
        CancellationToken::new(),
    )
    .unwrap();

    // The token stays valid, so only the first attempt logs in; the loop
    // keeps cycling through Connecting → Faulted against the closed port.
    let mut state = handle.state();
    let mut faults = 0;
    tokio::time::timeout(Duration::from_secs(5), async {
        while faults < 2 {
            state.changed().await.unwrap();
            if matches!(*state.borrow_and_update(), ConnectionState::Faulted(_)) {
                faults += 1;
            }
        }
    })
    .await
    .unwrap();
    assert_eq!(login_attempts(&server).await, 1);

    handle.shutdown();
    handle.join().await;
}

#[tokio::test]
async fn test_oversized_batch_rejected_before_connection_check() {
    let server = MockServer::start().await;
    let ca = ca_file();
    let cancel = CancellationToken::new();
    cancel.cancel();

    let handle =
        StreamHandle::spawn(key_session(&server), fast_config(ca.path().to_path_buf()), cancel)
            .unwrap();

    let batch: Vec<_> = (0..25).map(|i| json!({ "seq": i })).collect();
    let err = handle.send_command(&batch).await.unwrap_err();
    assert!(matches!(err, Error::CommandBatchTooLarge { len: 25, max: 24 }));

    let err = handle.send_command(&batch[..24]).await.unwrap_err();
    assert!(matches!(err, Error::NotConnected));

    handle.join().await;
}

#[tokio::test]
async fn test_spawn_validates_configuration() {
    let server = MockServer::start().await;
    let ca = ca_file();

    // Password credentials cannot open the stream.
    let password_session = Arc::new(AuthSession::new(
        reqwest::Client::new(),
        Url::parse(&format!("{}/", server.uri())).unwrap(),
        Credentials::Password {
            username: "alice".into(),
            password: "pw".to_string().into(),
        },
    ));
    let err = StreamHandle::spawn(
        password_session,
        fast_config(ca.path().to_path_buf()),
        CancellationToken::new(),
    )
    .err()
    .unwrap();
    assert!(matches!(err, Error::Validation { .. }));

    // Missing CA file.
    let err = StreamHandle::spawn(
        key_session(&server),
        fast_config(PathBuf::from("/nonexistent/ca.pem")),
        CancellationToken::new(),
    )
    .err()
    .unwrap();
    assert!(matches!(err, Error::Tls(_)));

    // Client certificate without its key.
    let mut config = fast_config(ca.path().to_path_buf());
    config.client_cert = Some(ca.path().to_path_buf());
    let err = StreamHandle::spawn(key_session(&server), config, CancellationToken::new())
        .err()
        .unwrap();
    assert!(matches!(err, Error::Validation { .. }));
}
