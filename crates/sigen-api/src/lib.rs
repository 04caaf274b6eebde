// sigen-api: Async Rust client for the Sigenergy cloud (app REST, northbound, MQTT telemetry)

pub mod auth;
pub mod client;
pub mod cloud;
pub mod credential;
pub mod error;
pub mod northbound;
pub mod region;
pub mod stream;
pub mod telemetry;
pub mod transport;

pub use auth::{AuthSession, Credentials, Mechanism, TokenState, TokenStore};
pub use client::ApiClient;
pub use cloud::models::{
    CurrentMode, EnergyProfile, OperationalModes, SmartLoadCard, SmartLoadConsumption,
    SmartLoadDetails, StationInfo, WorkingMode,
};
pub use error::Error;
pub use northbound::{BoardResult, NorthboundMode};
pub use region::Region;
pub use stream::{
    BrokerConnector, BrokerEvents, BrokerLink, ConnectionState, ReconnectPolicy, RumqttConnector,
    StreamConfig, StreamEvent, StreamHandle, SubscriptionDescriptor,
};
pub use telemetry::TelemetryRecord;
pub use transport::TransportConfig;
