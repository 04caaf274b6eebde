// ── Station client ──
//
// One account, one station. Owns the REST client (and an optional
// northbound client), caches the station identity, the mode and load
// lookup tables, and the load-path → smartLoadId map.

use std::sync::Arc;

use arc_swap::ArcSwapOption;
use dashmap::DashMap;
use serde_json::Value;
use sigen_api::cloud::{SMART_LOAD_OFF, SMART_LOAD_ON};
use sigen_api::stream::StreamHandle;
use sigen_api::{
    ApiClient, AuthSession, BoardResult, CurrentMode, Mechanism, StationInfo,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::catalog::{LoadCatalog, ModeCatalog, ModeSelector};
use crate::config::ClientConfig;
use crate::error::CoreError;
use crate::model::SmartLoad;

/// Label reported when the current mode matches nothing in the catalog.
pub const UNKNOWN_MODE: &str = "Unknown mode";

/// The main entry point for consumers.
///
/// Cheaply cloneable. Station data is fetched lazily on first use, or up
/// front by [`initialize()`](Self::initialize).
#[derive(Clone)]
pub struct SigenClient {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    config: ClientConfig,
    api: ApiClient,
    northbound: Option<ApiClient>,
    station: ArcSwapOption<StationInfo>,
    modes: ArcSwapOption<ModeCatalog>,
    loads: ArcSwapOption<LoadCatalog>,
    /// load path → smartLoadId
    load_ids: DashMap<i64, i64>,
}

impl SigenClient {
    /// Build the HTTP clients and auth sessions. Does NOT log in.
    pub fn new(config: ClientConfig) -> Result<Self, CoreError> {
        let http = config.transport().build_client()?;
        let base_url = config.api_base_url();

        let session = Arc::new(AuthSession::new(
            http.clone(),
            base_url.clone(),
            config.auth.clone(),
        ));
        let api = ApiClient::with_session(http.clone(), session);

        let northbound = match &config.northbound {
            Some(credentials) => {
                let session = Arc::new(AuthSession::new(http.clone(), base_url, credentials.clone()));
                Some(ApiClient::with_session(http, session))
            }
            None if config.auth.mechanism() != Mechanism::Password => Some(api.clone()),
            None => None,
        };

        Ok(Self {
            inner: Arc::new(ClientInner {
                config,
                api,
                northbound,
                station: ArcSwapOption::empty(),
                modes: ArcSwapOption::empty(),
                loads: ArcSwapOption::empty(),
                load_ids: DashMap::new(),
            }),
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    /// The underlying REST client.
    pub fn api(&self) -> &ApiClient {
        &self.inner.api
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    /// Full start-up: login → station info → smart-load id cache → mode
    /// and load catalogs.
    pub async fn initialize(&self) -> Result<(), CoreError> {
        self.inner.api.login().await?;
        let station = self.refresh_station().await?;
        self.cache_smart_load_ids(&station.station_id()).await?;
        let modes = self.refresh_modes().await?;
        let loads = self.smart_loads().await?;

        info!(
            station_id = %station.station_id(),
            modes = modes.names().len(),
            loads = loads.len(),
            "client initialized"
        );
        Ok(())
    }

    // ── Station ──────────────────────────────────────────────────────

    /// Cached station info, fetching it on first use.
    pub async fn station(&self) -> Result<Arc<StationInfo>, CoreError> {
        match self.inner.station.load_full() {
            Some(station) => Ok(station),
            None => self.refresh_station().await,
        }
    }

    /// Re-fetch station info (station id, AC/DC serials).
    pub async fn refresh_station(&self) -> Result<Arc<StationInfo>, CoreError> {
        let station = Arc::new(self.inner.api.station().await?);
        self.inner.station.store(Some(Arc::clone(&station)));
        Ok(station)
    }

    pub async fn station_id(&self) -> Result<String, CoreError> {
        Ok(self.station().await?.station_id())
    }

    /// First AC charger serial, if the station has one.
    pub async fn ac_serial(&self) -> Result<Option<String>, CoreError> {
        Ok(self.station().await?.ac_serial().map(str::to_owned))
    }

    pub async fn dc_serial(&self) -> Result<Option<String>, CoreError> {
        Ok(self.station().await?.dc_serial().map(str::to_owned))
    }

    // ── Energy ───────────────────────────────────────────────────────

    pub async fn energy_flow(&self) -> Result<Value, CoreError> {
        let station_id = self.station_id().await?;
        Ok(self.inner.api.energy_flow(&station_id).await?)
    }

    // ── Operational modes ────────────────────────────────────────────

    /// Cached mode catalog, fetching it on first use.
    pub async fn modes(&self) -> Result<Arc<ModeCatalog>, CoreError> {
        match self.inner.modes.load_full() {
            Some(modes) => Ok(modes),
            None => self.refresh_modes().await,
        }
    }

    pub async fn refresh_modes(&self) -> Result<Arc<ModeCatalog>, CoreError> {
        let station_id = self.station_id().await?;
        let modes = self.inner.api.operational_modes(&station_id).await?;
        let catalog = Arc::new(ModeCatalog::from_modes(modes));
        debug!(modes = ?catalog.names(), "mode catalog built");
        self.inner.modes.store(Some(Arc::clone(&catalog)));
        Ok(catalog)
    }

    pub async fn current_mode(&self) -> Result<CurrentMode, CoreError> {
        let station_id = self.station_id().await?;
        Ok(self.inner.api.current_mode(&station_id).await?)
    }

    /// Label of the current mode, or [`UNKNOWN_MODE`].
    pub async fn current_mode_label(&self) -> Result<String, CoreError> {
        let catalog = self.modes().await?;
        let current = self.current_mode().await?;
        Ok(catalog
            .resolve_label(current)
            .unwrap_or(UNKNOWN_MODE)
            .to_owned())
    }

    /// Raw mode switch. Use [`NO_PROFILE`](sigen_api::cloud::NO_PROFILE)
    /// for built-in modes.
    pub async fn set_mode_raw(&self, mode: i64, profile_id: i64) -> Result<Value, CoreError> {
        let station = self.station().await?;
        Ok(self
            .inner
            .api
            .set_operational_mode(&station.station_id_raw, mode, profile_id)
            .await?)
    }

    pub async fn set_mode(&self, selector: ModeSelector) -> Result<Value, CoreError> {
        self.set_mode_raw(selector.mode_value(), selector.profile_id())
            .await
    }

    /// Select a mode by (normalised) label or profile name.
    pub async fn set_mode_by_name(&self, name: &str) -> Result<Value, CoreError> {
        let catalog = self.modes().await?;
        let selector = catalog.get(name).ok_or_else(|| {
            CoreError::not_found(
                "Mode",
                format!("{name} (available: {})", catalog.names().join(", ")),
            )
        })?;
        info!(name, ?selector, "switching operational mode");
        self.set_mode(selector).await
    }

    // ── Smart loads ──────────────────────────────────────────────────

    /// All smart loads with consumption counters.
    ///
    /// Ids come from the cache first. A load whose id or counters cannot
    /// be fetched keeps the `0.00 kWh` defaults; it never fails the list.
    pub async fn smart_loads(&self) -> Result<Vec<SmartLoad>, CoreError> {
        let station_id = self.station_id().await?;
        let cards = self.inner.api.smart_load_cards(&station_id).await?;
        self.inner
            .loads
            .store(Some(Arc::new(LoadCatalog::from_cards(&cards))));

        let mut loads = Vec::with_capacity(cards.len());
        for card in &cards {
            let mut load = SmartLoad::from_card(card);
            if let Some(path) = card.path {
                load.smart_load_id = self.resolve_smart_load_id(&station_id, path, &load.name).await;
                if let Some(id) = load.smart_load_id {
                    match self
                        .inner
                        .api
                        .smart_load_consumption(&station_id, path, id)
                        .await
                    {
                        Ok(consumption) => {
                            load.apply_consumption(consumption);
                            debug!(
                                name = %load.name,
                                today = %load.today_consumption,
                                month = %load.month_consumption,
                                lifetime = %load.lifetime_consumption,
                                "smart load consumption"
                            );
                        }
                        Err(e) => {
                            error!(name = %load.name, error = %e, "failed to fetch smart load consumption");
                        }
                    }
                }
            }
            loads.push(load);
        }
        Ok(loads)
    }

    /// Cached load-name catalog, fetching the cards on first use.
    pub async fn load_catalog(&self) -> Result<Arc<LoadCatalog>, CoreError> {
        if let Some(loads) = self.inner.loads.load_full() {
            return Ok(loads);
        }
        let station_id = self.station_id().await?;
        let cards = self.inner.api.smart_load_cards(&station_id).await?;
        let catalog = Arc::new(LoadCatalog::from_cards(&cards));
        self.inner.loads.store(Some(Arc::clone(&catalog)));
        Ok(catalog)
    }

    /// Cached smartLoadId for a load path.
    pub fn cached_smart_load_id(&self, path: i64) -> Option<i64> {
        self.inner.load_ids.get(&path).map(|id| *id)
    }

    pub async fn set_smart_load(&self, path: i64, on: bool) -> Result<Value, CoreError> {
        let station_id = self.station_id().await?;
        let state = if on { SMART_LOAD_ON } else { SMART_LOAD_OFF };
        Ok(self
            .inner
            .api
            .set_smart_load_state(&station_id, path, state)
            .await?)
    }

    /// Switch a load by (normalised) name.
    pub async fn set_smart_load_by_name(&self, name: &str, on: bool) -> Result<Value, CoreError> {
        let catalog = self.load_catalog().await?;
        let path = catalog.get(name).ok_or_else(|| {
            CoreError::not_found(
                "Smart load",
                format!("{name} (available: {})", catalog.names().join(", ")),
            )
        })?;
        info!(name, path, on, "switching smart load");
        self.set_smart_load(path, on).await
    }

    /// Populate the id cache for every load. Failures are per load.
    async fn cache_smart_load_ids(&self, station_id: &str) -> Result<(), CoreError> {
        let cards = self.inner.api.smart_load_cards(station_id).await?;
        for card in &cards {
            if let Some(path) = card.path {
                self.resolve_smart_load_id(station_id, path, &card.display_name())
                    .await;
            }
        }
        info!(count = self.inner.load_ids.len(), "cached smart load ids");
        Ok(())
    }

    async fn resolve_smart_load_id(&self, station_id: &str, path: i64, name: &str) -> Option<i64> {
        if let Some(id) = self.cached_smart_load_id(path) {
            return Some(id);
        }

        match self.inner.api.smart_load_details(station_id, path).await {
            Ok(Some(details)) => {
                let id = details.smart_load_id?;
                self.inner.load_ids.insert(path, id);
                debug!(name, path, smart_load_id = id, "resolved smart load id");
                Some(id)
            }
            Ok(None) => None,
            Err(e) => {
                error!(name, path, error = %e, "failed to fetch smart load id");
                None
            }
        }
    }

    // ── Northbound ───────────────────────────────────────────────────

    fn northbound(&self, operation: &str) -> Result<&ApiClient, CoreError> {
        self.inner
            .northbound
            .as_ref()
            .ok_or_else(|| CoreError::Unsupported {
                operation: operation.to_owned(),
                required: "northbound credentials (app key or account)".into(),
            })
    }

    /// `system_id` defaults to the station id.
    async fn system_or_station(&self, system_id: Option<&str>) -> Result<String, CoreError> {
        match system_id {
            Some(id) => Ok(id.to_owned()),
            None => self.station_id().await,
        }
    }

    pub async fn nb_onboard(&self, system_ids: &[String]) -> Result<Vec<BoardResult>, CoreError> {
        Ok(self.northbound("onboard")?.onboard(system_ids).await?)
    }

    pub async fn nb_offboard(&self, system_ids: &[String]) -> Result<Vec<BoardResult>, CoreError> {
        Ok(self.northbound("offboard")?.offboard(system_ids).await?)
    }

    pub async fn nb_query_mode(&self, system_id: Option<&str>) -> Result<i64, CoreError> {
        let client = self.northbound("query mode")?;
        let system_id = self.system_or_station(system_id).await?;
        Ok(client.query_mode(&system_id).await?)
    }

    pub async fn nb_switch_mode(
        &self,
        system_id: Option<&str>,
        mode: i64,
    ) -> Result<Value, CoreError> {
        let client = self.northbound("switch mode")?;
        let system_id = self.system_or_station(system_id).await?;
        info!(%system_id, mode, "switching northbound mode");
        Ok(client.switch_mode(&system_id, mode).await?)
    }

    // ── Stream ───────────────────────────────────────────────────────

    /// Start the MQTT telemetry stream.
    ///
    /// Needs stream settings and app key credentials (as the main or the
    /// northbound credentials). Without explicit system ids the station
    /// id is streamed.
    pub async fn start_stream(&self, cancel: CancellationToken) -> Result<StreamHandle, CoreError> {
        let settings = self
            .inner
            .config
            .stream
            .as_ref()
            .ok_or_else(|| CoreError::Config {
                message: "no MQTT stream settings configured".into(),
            })?;

        let session = [Some(&self.inner.api), self.inner.northbound.as_ref()]
            .into_iter()
            .flatten()
            .map(ApiClient::session)
            .find(|s| s.mechanism() == Mechanism::Key)
            .cloned()
            .ok_or_else(|| CoreError::Unsupported {
                operation: "telemetry stream".into(),
                required: "app key credentials".into(),
            })?;
        let app_key = session
            .credentials()
            .app_key()
            .ok_or_else(|| CoreError::Internal("key session without app key".into()))?
            .to_owned();

        let fallback = if settings.system_ids.is_empty() {
            Some(self.station_id().await?)
        } else {
            None
        };
        let config =
            settings.to_stream_config(self.inner.config.region, &app_key, fallback.as_deref());

        if config.system_ids.is_empty() {
            warn!("no system ids to stream");
        }
        info!(broker = %config.broker, systems = ?config.system_ids, "starting telemetry stream");
        Ok(StreamHandle::spawn(session, config, cancel)?)
    }
}
