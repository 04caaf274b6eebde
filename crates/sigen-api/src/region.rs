// Regional endpoints
//
// Each cloud region has one REST host (shared by the app API and the
// northbound developer API) and one MQTT broker.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoEnumIterator};
use url::Url;

use crate::error::Error;

/// TLS port of every regional MQTT broker.
pub const DEFAULT_MQTT_PORT: u16 = 8883;

/// A Sigenergy cloud region.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Display, EnumString, EnumIter, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub enum Region {
    #[default]
    Eu,
    Cn,
    Apac,
    Us,
}

impl Region {
    /// Parse a region name, listing the supported ones on failure.
    pub fn parse(raw: &str) -> Result<Self, Error> {
        raw.trim().parse().map_err(|_| Error::Validation {
            field: "region".into(),
            reason: format!(
                "unsupported region '{raw}', supported regions: {}",
                Self::iter().map(|r| r.to_string()).collect::<Vec<_>>().join(", ")
            ),
        })
    }

    /// REST base URL, always with a trailing slash so relative paths join cleanly.
    pub fn api_base_url(self) -> Url {
        let raw = format!("https://api-{self}.sigencloud.com/");
        Url::parse(&raw).expect("invalid region base URL")
    }

    /// Hostname of the regional MQTT broker.
    pub fn mqtt_broker(self) -> String {
        format!("mqtt-{self}.sigencloud.com")
    }
}
