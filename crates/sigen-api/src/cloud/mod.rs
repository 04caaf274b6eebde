// App REST endpoints (station, energy flow, operational modes, smart loads).
//
// Each file adds inherent methods to `ApiClient`; all of them go through
// the authenticated-request contract in `client.rs`.

mod energy;
pub mod models;
mod modes;
mod smart_loads;
mod station;

pub use modes::NO_PROFILE;
pub use smart_loads::{SMART_LOAD_OFF, SMART_LOAD_ON};
