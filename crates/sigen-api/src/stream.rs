//! MQTT telemetry stream with auto-reconnect.
//!
//! Connects to the regional broker over TLS, (re-)publishes the
//! subscription requests after every connect, subscribes to the
//! per-system topics, and fans decoded messages out through a
//! [`tokio::sync::broadcast`] channel. Faults are recovered inside the
//! background task with a fixed pause; only cancellation ends it.
//!
//! ```text
//! Idle → Connecting → Subscribing → Streaming ─┐
//!            ▲                                 │ fault
//!            └────── (pause) ◄── Faulted ◄─────┘
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use sigen_api::stream::{StreamConfig, StreamEvent, StreamHandle};
//! use tokio_util::sync::CancellationToken;
//!
//! let cancel = CancellationToken::new();
//! let handle = StreamHandle::spawn(session, config, cancel.clone())?;
//! let mut rx = handle.subscribe();
//!
//! while let Ok(event) = rx.recv().await {
//!     if let StreamEvent::Telemetry(rec) = event.as_ref() {
//!         println!("{} pv={}kW soc={}%", rec.system_id, rec.pv_power_kw, rec.soc_percent);
//!     }
//! }
//! ```

use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwapOption;
use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Packet, QoS, Transport};
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use serde_json::{Value, json};
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use crate::auth::{AuthSession, Mechanism};
use crate::error::Error;
use crate::region::{DEFAULT_MQTT_PORT, Region};
use crate::telemetry::{self, FieldCatalog, TelemetryRecord};

// ── Constants ────────────────────────────────────────────────────────

const EVENT_CHANNEL_CAPACITY: usize = 1024;

/// Largest command batch the broker accepts.
pub const MAX_COMMAND_BATCH: usize = 24;

/// Outbound control instructions.
pub const COMMAND_TOPIC: &str = "openapi/instruction/command";

/// Telemetry arrays for multi-device systems exceed rumqttc's 10 KiB default.
const MAX_PACKET_SIZE: usize = 256 * 1024;

/// Request-queue headroom beyond the subscription burst, for commands.
const REQUEST_HEADROOM: usize = 32;

// ── Channels & subscriptions ─────────────────────────────────────────

/// The three message families the cloud publishes per system.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    /// Periodic telemetry (about every 5 minutes).
    Period,
    /// On-change system data.
    Change,
    /// Alarms.
    Alarm,
}

impl Channel {
    pub const ALL: [Self; 3] = [Self::Period, Self::Change, Self::Alarm];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Period => "period",
            Self::Change => "change",
            Self::Alarm => "alarm",
        }
    }

    /// Broadcast topic on which the subscription request is published.
    pub fn request_topic(self) -> String {
        format!("openapi/subscription/{}", self.as_str())
    }

    /// Per-system data topic.
    pub fn data_topic(self, app_key: &str, system_id: &str) -> String {
        format!("openapi/{}/{app_key}/{system_id}", self.as_str())
    }

    /// Classify an inbound topic by its `/period/`, `/change/` or `/alarm/` segment.
    pub fn from_topic(topic: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|c| topic.contains(&format!("/{}/", c.as_str())))
    }
}

/// The systems to stream and the topics derived from them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionDescriptor {
    app_key: String,
    system_ids: Vec<String>,
}

impl SubscriptionDescriptor {
    pub fn new(app_key: impl Into<String>, system_ids: Vec<String>) -> Self {
        Self {
            app_key: app_key.into(),
            system_ids,
        }
    }

    pub fn system_ids(&self) -> &[String] {
        &self.system_ids
    }

    /// The three subscription-request topics, in publish order.
    pub fn request_topics(&self) -> Vec<String> {
        Channel::ALL.into_iter().map(Channel::request_topic).collect()
    }

    /// Three data topics per system id.
    pub fn topics(&self) -> Vec<String> {
        self.system_ids
            .iter()
            .flat_map(|id| {
                Channel::ALL
                    .into_iter()
                    .map(move |c| c.data_topic(&self.app_key, id))
            })
            .collect()
    }

    /// `{accessToken, systemIdList}` body of every subscription request.
    pub fn request_payload(&self, token: &SecretString) -> Result<Vec<u8>, Error> {
        #[derive(Serialize)]
        #[serde(rename_all = "camelCase")]
        struct SubscriptionRequest<'a> {
            access_token: &'a str,
            system_id_list: &'a [String],
        }

        serde_json::to_vec(&SubscriptionRequest {
            access_token: token.expose_secret(),
            system_id_list: &self.system_ids,
        })
        .map_err(|e| Error::Deserialization {
            message: format!("failed to encode subscription request: {e}"),
            body: String::new(),
        })
    }

    /// Requests the broker queue must hold for one subscription burst.
    fn burst_len(&self) -> usize {
        Channel::ALL.len() * (1 + self.system_ids.len())
    }
}

// ── Broker seam ──────────────────────────────────────────────────────

/// Publish/subscribe operations the stream needs from a live connection.
///
/// Implemented for [`rumqttc::AsyncClient`].
pub trait BrokerLink: Send + Sync {
    fn publish(&self, topic: &str, payload: Vec<u8>)
    -> impl Future<Output = Result<(), Error>> + Send;

    fn subscribe(&self, topic: &str) -> impl Future<Output = Result<(), Error>> + Send;
}

impl BrokerLink for AsyncClient {
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<(), Error> {
        AsyncClient::publish(self, topic, QoS::AtMostOnce, false, payload).await?;
        Ok(())
    }

    async fn subscribe(&self, topic: &str) -> Result<(), Error> {
        AsyncClient::subscribe(self, topic, QoS::AtMostOnce).await?;
        Ok(())
    }
}

/// Inbound side of a live connection.
///
/// Implemented for [`rumqttc::EventLoop`].
pub trait BrokerEvents: Send {
    fn next_event(&mut self) -> impl Future<Output = Result<Event, Error>> + Send;
}

impl BrokerEvents for EventLoop {
    async fn next_event(&mut self) -> Result<Event, Error> {
        Ok(EventLoop::poll(self).await?)
    }
}

/// Opens one broker connection per attempt.
pub trait BrokerConnector: Send + Sync + 'static {
    type Link: BrokerLink + 'static;
    type Events: BrokerEvents + 'static;

    /// `capacity` is the outbound request queue length.
    fn connect(&self, options: MqttOptions, capacity: usize) -> (Self::Link, Self::Events);
}

/// Connects through [`rumqttc`].
#[derive(Debug, Clone, Copy, Default)]
pub struct RumqttConnector;

impl BrokerConnector for RumqttConnector {
    type Link = AsyncClient;
    type Events = EventLoop;

    fn connect(&self, options: MqttOptions, capacity: usize) -> (AsyncClient, EventLoop) {
        AsyncClient::new(options, capacity)
    }
}

/// Publish the three subscription requests, then subscribe to every data topic.
///
/// Must run after every successful connect: the broker forgets
/// subscriptions across sessions.
pub async fn subscribe_all<L: BrokerLink>(
    link: &L,
    descriptor: &SubscriptionDescriptor,
    token: &SecretString,
) -> Result<(), Error> {
    let payload = descriptor.request_payload(token)?;
    for channel in Channel::ALL {
        link.publish(&channel.request_topic(), payload.clone())
            .await?;
        info!(
            channel = channel.as_str(),
            systems = ?descriptor.system_ids(),
            "published subscription request"
        );
    }

    for topic in descriptor.topics() {
        link.subscribe(&topic).await?;
    }
    info!(
        topics = descriptor.topics().len(),
        "subscribed to system topics"
    );
    Ok(())
}

/// Validate a command batch and encode `{accessToken, commands}`.
pub fn command_payload(token: &SecretString, commands: &[Value]) -> Result<Vec<u8>, Error> {
    if commands.is_empty() || commands.len() > MAX_COMMAND_BATCH {
        return Err(Error::CommandBatchTooLarge {
            len: commands.len(),
            max: MAX_COMMAND_BATCH,
        });
    }
    let body = json!({
        "accessToken": token.expose_secret(),
        "commands": commands,
    });
    Ok(body.to_string().into_bytes())
}

// ── Events & state ───────────────────────────────────────────────────

/// A message delivered to stream subscribers.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// One decoded entry from a `period` message.
    Telemetry(TelemetryRecord),
    /// Raw `change` payload.
    SystemChange(Value),
    /// Raw `alarm` payload.
    Alarm(Value),
}

/// Lifecycle of the stream task. Owned by the task; observable through
/// [`StreamHandle::state`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Idle,
    Connecting,
    Subscribing,
    Streaming,
    Faulted(String),
}

// ── Configuration ────────────────────────────────────────────────────

/// Fixed pauses before reconnecting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconnectPolicy {
    /// After the broker connection fails. Default: 30s.
    pub broker_fault: Duration,
    /// After any other error (auth, TLS, client). Default: 60s.
    pub unexpected_fault: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            broker_fault: Duration::from_secs(30),
            unexpected_fault: Duration::from_secs(60),
        }
    }
}

impl ReconnectPolicy {
    pub fn delay_for(&self, err: &Error) -> Duration {
        if err.is_broker_fault() {
            self.broker_fault
        } else {
            self.unexpected_fault
        }
    }
}

/// Broker endpoint, TLS material locations, and the systems to stream.
#[derive(Debug, Clone)]
pub struct StreamConfig {
    pub broker: String,
    pub port: u16,
    /// MQTT username and topic namespace.
    pub app_key: String,
    pub system_ids: Vec<String>,
    /// PEM CA certificate (required).
    pub ca_cert: PathBuf,
    /// PEM client certificate for mutual TLS (optional, needs `client_key`).
    pub client_cert: Option<PathBuf>,
    /// PEM client key for mutual TLS (optional, needs `client_cert`).
    pub client_key: Option<PathBuf>,
    pub keep_alive: Duration,
    pub reconnect: ReconnectPolicy,
}

impl StreamConfig {
    /// Defaults for a region's broker.
    pub fn for_region(
        region: Region,
        app_key: impl Into<String>,
        system_ids: Vec<String>,
        ca_cert: PathBuf,
    ) -> Self {
        Self {
            broker: region.mqtt_broker(),
            port: DEFAULT_MQTT_PORT,
            app_key: app_key.into(),
            system_ids,
            ca_cert,
            client_cert: None,
            client_key: None,
            keep_alive: Duration::from_secs(60),
            reconnect: ReconnectPolicy::default(),
        }
    }

    pub fn descriptor(&self) -> SubscriptionDescriptor {
        SubscriptionDescriptor::new(self.app_key.clone(), self.system_ids.clone())
    }
}

/// Certificate bytes, read once when the stream is spawned.
#[derive(Debug, Clone)]
struct TlsMaterials {
    ca: Vec<u8>,
    client_auth: Option<(Vec<u8>, Vec<u8>)>,
}

impl TlsMaterials {
    fn load(config: &StreamConfig) -> Result<Self, Error> {
        let read = |path: &PathBuf, what: &str| {
            std::fs::read(path)
                .map_err(|e| Error::Tls(format!("failed to read MQTT {what} {}: {e}", path.display())))
        };

        let ca = read(&config.ca_cert, "CA certificate")?;
        let client_auth = match (&config.client_cert, &config.client_key) {
            (Some(cert), Some(key)) => Some((read(cert, "client certificate")?, read(key, "client key")?)),
            (None, None) => None,
            _ => {
                return Err(Error::Validation {
                    field: "client_cert".into(),
                    reason: "MQTT client certificate and key must be provided together".into(),
                });
            }
        };

        Ok(Self { ca, client_auth })
    }
}

// ── StreamHandle ─────────────────────────────────────────────────────

/// State shared between the background task and the handle.
struct Shared<C: BrokerConnector> {
    connector: C,
    session: Arc<AuthSession>,
    config: StreamConfig,
    descriptor: SubscriptionDescriptor,
    tls: TlsMaterials,
    state: watch::Sender<ConnectionState>,
    events: broadcast::Sender<Arc<StreamEvent>>,
    /// Live client while `Streaming`; `None` otherwise.
    link: ArcSwapOption<C::Link>,
    fields: FieldCatalog,
}

impl<C: BrokerConnector> Shared<C> {
    fn set_state(&self, state: ConnectionState) {
        trace!(?state, "stream state");
        self.state.send_replace(state);
    }
}

/// Handle to the running stream task.
///
/// Drop all event receivers and call [`shutdown`](Self::shutdown) to tear
/// the task down.
pub struct StreamHandle<C: BrokerConnector = RumqttConnector> {
    shared: Arc<Shared<C>>,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl StreamHandle<RumqttConnector> {
    /// Validate the configuration, load the TLS material, and spawn the
    /// connect/subscribe/reconnect loop.
    ///
    /// Returns immediately; the first connection attempt happens in the
    /// background. The session must use key credentials.
    pub fn spawn(
        session: Arc<AuthSession>,
        config: StreamConfig,
        cancel: CancellationToken,
    ) -> Result<Self, Error> {
        Self::spawn_with(RumqttConnector, session, config, cancel)
    }
}

impl<C: BrokerConnector> StreamHandle<C> {
    /// [`spawn`](StreamHandle::spawn) over a custom connector.
    pub fn spawn_with(
        connector: C,
        session: Arc<AuthSession>,
        config: StreamConfig,
        cancel: CancellationToken,
    ) -> Result<Self, Error> {
        if session.mechanism() != Mechanism::Key {
            return Err(Error::Validation {
                field: "credentials".into(),
                reason: "the MQTT stream requires app key credentials".into(),
            });
        }
        if config.system_ids.is_empty() {
            return Err(Error::Validation {
                field: "system_ids".into(),
                reason: "at least one system id is required".into(),
            });
        }

        let tls = TlsMaterials::load(&config)?;
        let (state, _) = watch::channel(ConnectionState::Idle);
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        let shared = Arc::new(Shared {
            connector,
            session,
            descriptor: config.descriptor(),
            config,
            tls,
            state,
            events,
            link: ArcSwapOption::empty(),
            fields: FieldCatalog::new(),
        });

        let task = tokio::spawn(stream_loop(Arc::clone(&shared), cancel.clone()));
        Ok(Self {
            shared,
            cancel,
            task,
        })
    }

    /// Register a new event receiver. Messages for which no receiver is
    /// registered are dropped.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<StreamEvent>> {
        self.shared.events.subscribe()
    }

    /// Watch the connection state.
    pub fn state(&self) -> watch::Receiver<ConnectionState> {
        self.shared.state.subscribe()
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.shared.state.borrow().clone()
    }

    /// Publish a batch of control instructions with the current token.
    ///
    /// Fails fast when the stream is not `Streaming`; nothing is queued.
    pub async fn send_command(&self, commands: &[Value]) -> Result<(), Error> {
        if commands.is_empty() || commands.len() > MAX_COMMAND_BATCH {
            return Err(Error::CommandBatchTooLarge {
                len: commands.len(),
                max: MAX_COMMAND_BATCH,
            });
        }
        if *self.shared.state.borrow() != ConnectionState::Streaming {
            return Err(Error::NotConnected);
        }
        let link = self.shared.link.load_full().ok_or(Error::NotConnected)?;

        let token = self.shared.session.ensure_valid().await?;
        let payload = command_payload(&token, commands)?;
        BrokerLink::publish(link.as_ref(), COMMAND_TOPIC, payload).await?;
        debug!(count = commands.len(), "published command batch");
        Ok(())
    }

    /// Signal the background task to stop. The state settles at `Idle`.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    /// Wait for the background task to finish (after [`shutdown`](Self::shutdown)).
    pub async fn join(self) {
        if let Err(e) = self.task.await {
            warn!(error = %e, "stream task ended abnormally");
        }
    }
}

// ── Background loop ──────────────────────────────────────────────────

/// Main loop: connect → subscribe → stream → on fault, pause → reconnect.
async fn stream_loop<C: BrokerConnector>(shared: Arc<Shared<C>>, cancel: CancellationToken) {
    let mut attempt: u32 = 0;

    loop {
        shared.set_state(ConnectionState::Connecting);

        let result = tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            result = connect_and_stream(&shared) => result,
        };
        shared.link.store(None);

        let err = match result {
            Ok(()) => break,
            Err(e) => e,
        };

        attempt = attempt.saturating_add(1);
        let delay = shared.config.reconnect.delay_for(&err);
        if err.is_broker_fault() {
            error!(error = %err, attempt, delay_secs = delay.as_secs(), "MQTT connection lost, reconnecting");
        } else {
            error!(error = %err, attempt, delay_secs = delay.as_secs(), "MQTT unexpected error, reconnecting");
        }
        shared.set_state(ConnectionState::Faulted(err.to_string()));

        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            () = tokio::time::sleep(delay) => {}
        }
    }

    shared.link.store(None);
    shared.set_state(ConnectionState::Idle);
    info!("MQTT stream stopped");
}

/// One connection lifecycle. Only returns on error; cancellation drops
/// the future from the outer `select!`.
async fn connect_and_stream<C: BrokerConnector>(shared: &Shared<C>) -> Result<(), Error> {
    // Fresh token per attempt: an expired one triggers a new login here.
    let token = shared.session.ensure_valid().await?;
    let options = mqtt_options(&shared.config, &shared.tls, &token);
    let capacity = shared.descriptor.burst_len() + REQUEST_HEADROOM;
    let (client, mut events) = shared.connector.connect(options, capacity);

    info!(broker = %shared.config.broker, port = shared.config.port, "connecting to MQTT broker");
    loop {
        if let Event::Incoming(Packet::ConnAck(ack)) = events.next_event().await? {
            debug!(session_present = ack.session_present, "MQTT connected");
            break;
        }
    }

    shared.set_state(ConnectionState::Subscribing);
    // The request queue holds the whole burst, so this completes before
    // the event loop is polled again; the loop then flushes it in order.
    subscribe_all(&client, &shared.descriptor, &token).await?;

    shared.link.store(Some(Arc::new(client)));
    shared.set_state(ConnectionState::Streaming);

    loop {
        match events.next_event().await? {
            Event::Incoming(Packet::Publish(publish)) => {
                trace!(topic = %publish.topic, bytes = publish.payload.len(), "MQTT message");
                dispatch(&publish.topic, &publish.payload, &shared.events, &shared.fields);
            }
            Event::Incoming(Packet::SubAck(ack)) => {
                debug!(pkid = ack.pkid, "subscription acknowledged");
            }
            Event::Incoming(Packet::Disconnect) => {
                warn!("broker sent disconnect");
            }
            _ => {}
        }
    }
}

fn mqtt_options(config: &StreamConfig, tls: &TlsMaterials, token: &SecretString) -> MqttOptions {
    let client_id = format!("sigen-{}", uuid::Uuid::new_v4().simple());

    let mut options = MqttOptions::new(client_id, config.broker.clone(), config.port);
    options
        .set_credentials(config.app_key.clone(), token.expose_secret())
        .set_keep_alive(config.keep_alive)
        .set_clean_session(true)
        .set_max_packet_size(MAX_PACKET_SIZE, MAX_PACKET_SIZE)
        .set_transport(Transport::tls(
            tls.ca.clone(),
            tls.client_auth.clone(),
            None,
        ));
    options
}

// ── Message dispatch ─────────────────────────────────────────────────

/// Route one inbound message by topic and broadcast the resulting events.
///
/// Non-JSON payloads are logged and skipped. Returns the number of events
/// delivered to at least one receiver.
pub(crate) fn dispatch(
    topic: &str,
    payload: &[u8],
    events: &broadcast::Sender<Arc<StreamEvent>>,
    fields: &FieldCatalog,
) -> usize {
    if events.receiver_count() == 0 {
        trace!(topic, "no stream receivers, message dropped");
        return 0;
    }

    let value: Value = match serde_json::from_slice(payload) {
        Ok(v) => v,
        Err(e) => {
            warn!(topic, error = %e, "non-JSON MQTT message");
            return 0;
        }
    };

    let outgoing: Vec<StreamEvent> = match Channel::from_topic(topic) {
        Some(Channel::Period) => telemetry::entries(&value)
            .into_iter()
            .map(|entry| {
                fields.observe(entry);
                StreamEvent::Telemetry(TelemetryRecord::from_entry(entry))
            })
            .collect(),
        Some(Channel::Change) => vec![StreamEvent::SystemChange(value)],
        Some(Channel::Alarm) => vec![StreamEvent::Alarm(value)],
        None => {
            debug!(topic, "message on unrecognised topic");
            Vec::new()
        }
    };

    outgoing
        .into_iter()
        .map(|event| events.send(Arc::new(event)))
        .filter(Result::is_ok)
        .count()
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    #[derive(Default)]
    struct RecordingLink {
        calls: Mutex<Vec<(String, String)>>,
    }

    impl BrokerLink for RecordingLink {
        async fn publish(&self, topic: &str, _payload: Vec<u8>) -> Result<(), Error> {
            self.calls
                .lock()
                .unwrap()
                .push(("publish".into(), topic.into()));
            Ok(())
        }

        async fn subscribe(&self, topic: &str) -> Result<(), Error> {
            self.calls
                .lock()
                .unwrap()
                .push(("subscribe".into(), topic.into()));
            Ok(())
        }
    }

    fn descriptor() -> SubscriptionDescriptor {
        SubscriptionDescriptor::new("APPKEY", vec!["S1".into(), "S2".into()])
    }

    #[test]
    fn topics_are_derived_per_system() {
        let topics = descriptor().topics();
        assert_eq!(
            topics,
            vec![
                "openapi/period/APPKEY/S1",
                "openapi/change/APPKEY/S1",
                "openapi/alarm/APPKEY/S1",
                "openapi/period/APPKEY/S2",
                "openapi/change/APPKEY/S2",
                "openapi/alarm/APPKEY/S2",
            ]
        );
        assert_eq!(
            descriptor().request_topics(),
            vec![
                "openapi/subscription/period",
                "openapi/subscription/change",
                "openapi/subscription/alarm",
            ]
        );
    }

    #[test]
    fn request_payload_carries_token_and_systems() {
        let token: SecretString = "tok".to_string().into();
        let payload = descriptor().request_payload(&token).unwrap();
        let value: Value = serde_json::from_slice(&payload).unwrap();
        assert_eq!(value, json!({ "accessToken": "tok", "systemIdList": ["S1", "S2"] }));
    }

    #[tokio::test]
    async fn subscribe_all_publishes_requests_before_subscribing() {
        let token: SecretString = "tok".to_string().into();
        let desc = descriptor();

        for _ in 0..3 {
            let link = RecordingLink::default();
            subscribe_all(&link, &desc, &token).await.unwrap();
            let calls = link.calls.into_inner().unwrap();

            let publishes: Vec<_> = calls.iter().take(3).collect();
            assert!(publishes.iter().all(|(kind, _)| kind == "publish"));
            assert_eq!(
                publishes.iter().map(|(_, t)| t.clone()).collect::<Vec<_>>(),
                desc.request_topics()
            );

            let subscribed: Vec<String> = calls
                .iter()
                .skip(3)
                .map(|(kind, topic)| {
                    assert_eq!(kind, "subscribe");
                    topic.clone()
                })
                .collect();
            assert_eq!(subscribed, desc.topics());
        }
    }

    #[test]
    fn channel_from_topic() {
        assert_eq!(Channel::from_topic("openapi/period/K/S1"), Some(Channel::Period));
        assert_eq!(Channel::from_topic("openapi/change/K/S1"), Some(Channel::Change));
        assert_eq!(Channel::from_topic("openapi/alarm/K/S1"), Some(Channel::Alarm));
        assert_eq!(Channel::from_topic("openapi/other/K/S1"), None);
    }

    #[test]
    fn reconnect_policy_picks_pause_by_fault_kind() {
        let policy = ReconnectPolicy::default();
        let broker = Error::Broker(rumqttc::ConnectionError::RequestsDone);
        let other = Error::Authentication {
            message: "bad key".into(),
        };
        assert_eq!(policy.delay_for(&broker), Duration::from_secs(30));
        assert_eq!(policy.delay_for(&other), Duration::from_secs(60));
    }

    #[test]
    fn command_batch_limit_is_enforced() {
        let token: SecretString = "tok".to_string().into();
        let batch: Vec<Value> = (0..25).map(|i| json!({ "seq": i })).collect();

        let err = command_payload(&token, &batch).unwrap_err();
        assert!(matches!(err, Error::CommandBatchTooLarge { len: 25, max: 24 }));

        let payload = command_payload(&token, &batch[..24]).unwrap();
        let value: Value = serde_json::from_slice(&payload).unwrap();
        assert_eq!(value["accessToken"], "tok");
        assert_eq!(value["commands"].as_array().unwrap().len(), 24);

        assert!(command_payload(&token, &[]).is_err());
    }

    #[test]
    fn dispatch_decodes_period_arrays() {
        let (tx, mut rx) = broadcast::channel(16);
        let fields = FieldCatalog::new();
        let payload = json!([
            { "systemId": "S1", "value": { "pvPowerW": "1000" } },
            { "systemId": "S1", "value": { "pvPowerW": "2000" } }
        ])
        .to_string();

        let sent = dispatch("openapi/period/K/S1", payload.as_bytes(), &tx, &fields);
        assert_eq!(sent, 2);

        let first = rx.try_recv().unwrap();
        match first.as_ref() {
            StreamEvent::Telemetry(rec) => assert!((rec.pv_power_kw - 1.0).abs() < 1e-9),
            other => panic!("expected telemetry, got {other:?}"),
        }
    }

    #[test]
    fn dispatch_forwards_change_and_alarm_raw() {
        let (tx, mut rx) = broadcast::channel(16);
        let fields = FieldCatalog::new();

        dispatch("openapi/change/K/S1", br#"{"onGrid":true}"#, &tx, &fields);
        dispatch("openapi/alarm/K/S1", br#"{"alarmCode":7}"#, &tx, &fields);

        assert_eq!(
            *rx.try_recv().unwrap(),
            StreamEvent::SystemChange(json!({ "onGrid": true }))
        );
        assert_eq!(
            *rx.try_recv().unwrap(),
            StreamEvent::Alarm(json!({ "alarmCode": 7 }))
        );
    }

    #[test]
    fn dispatch_skips_non_json_payloads() {
        let (tx, mut rx) = broadcast::channel::<Arc<StreamEvent>>(16);
        let fields = FieldCatalog::new();

        let sent = dispatch("openapi/period/K/S1", b"\x00\x01 not json", &tx, &fields);
        assert_eq!(sent, 0);
        assert!(rx.try_recv().is_err());

        // A later valid message still goes through.
        let sent = dispatch("openapi/alarm/K/S1", b"{}", &tx, &fields);
        assert_eq!(sent, 1);
    }

    #[test]
    fn dispatch_without_receivers_is_a_noop() {
        let (tx, rx) = broadcast::channel::<Arc<StreamEvent>>(16);
        drop(rx);
        let fields = FieldCatalog::new();
        assert_eq!(dispatch("openapi/alarm/K/S1", b"{}", &tx, &fields), 0);
    }
}
