// ── Runtime client configuration ──
//
// These types describe *how* to reach the Sigenergy cloud. They carry
// credential data and connection tuning, but never touch disk. The CLI
// builds a `ClientConfig` (usually through `sigen-config`) and hands it in.

use std::path::PathBuf;
use std::time::Duration;

use sigen_api::stream::{ReconnectPolicy, StreamConfig};
use sigen_api::{Credentials, Region, TransportConfig};
use url::Url;

/// MQTT stream settings. The app key comes from the key credentials.
#[derive(Debug, Clone)]
pub struct StreamSettings {
    /// Broker host; defaults to the region's broker.
    pub broker: Option<String>,
    /// Broker port; defaults to 8883.
    pub port: Option<u16>,
    /// Systems to subscribe to; defaults to the station id.
    pub system_ids: Vec<String>,
    pub ca_cert: PathBuf,
    pub client_cert: Option<PathBuf>,
    pub client_key: Option<PathBuf>,
    pub reconnect: ReconnectPolicy,
}

impl StreamSettings {
    pub fn new(ca_cert: PathBuf) -> Self {
        Self {
            broker: None,
            port: None,
            system_ids: Vec::new(),
            ca_cert,
            client_cert: None,
            client_key: None,
            reconnect: ReconnectPolicy::default(),
        }
    }

    /// Resolve against a region, app key and fallback system id.
    pub(crate) fn to_stream_config(
        &self,
        region: Region,
        app_key: &str,
        fallback_system: Option<&str>,
    ) -> StreamConfig {
        let system_ids = if self.system_ids.is_empty() {
            fallback_system.map(str::to_owned).into_iter().collect()
        } else {
            self.system_ids.clone()
        };

        let mut config =
            StreamConfig::for_region(region, app_key, system_ids, self.ca_cert.clone());
        if let Some(broker) = &self.broker {
            config.broker.clone_from(broker);
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        config.client_cert.clone_from(&self.client_cert);
        config.client_key.clone_from(&self.client_key);
        config.reconnect = self.reconnect.clone();
        config
    }
}

/// Configuration for one station account.
///
/// Built by the CLI, passed to [`SigenClient`](crate::SigenClient); core
/// never reads config files.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub region: Region,
    /// Overrides the region's API base URL (tests, proxies).
    pub base_url: Option<Url>,
    /// Credentials for the app REST API.
    pub auth: Credentials,
    /// Credentials for the northbound API, if different from `auth`.
    ///
    /// When `None` and `auth` is already a northbound mechanism (key or
    /// account), the main session is used for northbound calls too.
    pub northbound: Option<Credentials>,
    pub stream: Option<StreamSettings>,
    pub timeout: Duration,
    /// Extra root CA for the REST client.
    pub ca_cert: Option<PathBuf>,
}

impl ClientConfig {
    pub fn new(region: Region, auth: Credentials) -> Self {
        Self {
            region,
            base_url: None,
            auth,
            northbound: None,
            stream: None,
            timeout: Duration::from_secs(30),
            ca_cert: None,
        }
    }

    /// The REST base URL, guaranteed to end with `/`.
    pub fn api_base_url(&self) -> Url {
        match &self.base_url {
            Some(url) if url.path().ends_with('/') => url.clone(),
            Some(url) => {
                let mut url = url.clone();
                let path = format!("{}/", url.path());
                url.set_path(&path);
                url
            }
            None => self.region.api_base_url(),
        }
    }

    pub(crate) fn transport(&self) -> TransportConfig {
        TransportConfig {
            timeout: self.timeout,
            ca_cert: self.ca_cert.clone(),
        }
    }
}
