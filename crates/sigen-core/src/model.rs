// Domain types handed to consumers.

use serde::Serialize;
use sigen_api::{SmartLoadCard, SmartLoadConsumption};

/// Consumption shown when a counter is missing or could not be fetched.
pub const NO_CONSUMPTION: &str = "0.00 kWh";

/// A smart load with its consumption counters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SmartLoad {
    pub path: Option<i64>,
    pub name: String,
    pub smart_load_id: Option<i64>,
    pub today_consumption: String,
    pub month_consumption: String,
    pub lifetime_consumption: String,
}

impl SmartLoad {
    /// A load with default counters and no resolved id.
    pub fn from_card(card: &SmartLoadCard) -> Self {
        Self {
            path: card.path,
            name: card.display_name(),
            smart_load_id: None,
            today_consumption: NO_CONSUMPTION.to_owned(),
            month_consumption: NO_CONSUMPTION.to_owned(),
            lifetime_consumption: NO_CONSUMPTION.to_owned(),
        }
    }

    /// Overwrite the counters the cloud actually reported.
    pub fn apply_consumption(&mut self, consumption: SmartLoadConsumption) {
        let reported = |value: Option<String>| value.filter(|v| !v.trim().is_empty());

        if let Some(today) = reported(consumption.today_consumption) {
            self.today_consumption = today;
        }
        if let Some(month) = reported(consumption.month_consumption) {
            self.month_consumption = month;
        }
        if let Some(lifetime) = reported(consumption.lifetime_consumption) {
            self.lifetime_consumption = lifetime;
        }
    }
}
