// sigen-core: Station-level facade between sigen-api and consumers (CLI).

pub mod catalog;
pub mod client;
pub mod config;
pub mod error;
pub mod model;

// ── Primary re-exports ──────────────────────────────────────────────
pub use catalog::{LoadCatalog, ModeCatalog, ModeEntry, ModeSelector, normalize_name};
pub use client::{SigenClient, UNKNOWN_MODE};
pub use config::{ClientConfig, StreamSettings};
pub use error::CoreError;
pub use model::{NO_CONSUMPTION, SmartLoad};

// Wire types consumers need alongside the facade.
pub use sigen_api::cloud::NO_PROFILE;
pub use sigen_api::stream::{ConnectionState, MAX_COMMAND_BATCH, StreamEvent, StreamHandle};
pub use sigen_api::{
    BoardResult, Credentials, NorthboundMode, Region, StationInfo, TelemetryRecord,
};
