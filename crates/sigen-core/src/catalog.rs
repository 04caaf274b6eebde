// ── Name lookup tables ──
//
// Operational modes and smart loads are addressed by name from the CLI.
// Both tables are built once from the fetched lists and keyed by the
// normalised name (lower-case, spaces and hyphens folded to `_`).

use indexmap::IndexMap;
use serde::Serialize;
use sigen_api::cloud::NO_PROFILE;
use sigen_api::cloud::models::CUSTOM_PROFILE_MODE;
use sigen_api::{CurrentMode, OperationalModes, SmartLoadCard};
use tracing::debug;

/// `"Maximum Self-Consumption"` → `"maximum_self_consumption"`.
pub fn normalize_name(name: &str) -> String {
    name.trim().to_lowercase().replace([' ', '-'], "_")
}

// ── Modes ────────────────────────────────────────────────────────────

/// What to send to select a mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum ModeSelector {
    /// Built-in working mode by value.
    Default(i64),
    /// Custom energy profile by profile id (sent as mode 9).
    Profile(i64),
}

impl ModeSelector {
    pub fn mode_value(self) -> i64 {
        match self {
            Self::Default(value) => value,
            Self::Profile(_) => CUSTOM_PROFILE_MODE,
        }
    }

    pub fn profile_id(self) -> i64 {
        match self {
            Self::Default(_) => NO_PROFILE,
            Self::Profile(id) => id,
        }
    }
}

/// One named entry, for listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModeEntry {
    pub name: String,
    pub label: String,
    pub selector: ModeSelector,
}

/// Normalised mode name → selector, plus the raw lists for label lookups.
#[derive(Debug, Clone, Default)]
pub struct ModeCatalog {
    entries: IndexMap<String, ModeEntry>,
    source: OperationalModes,
}

impl ModeCatalog {
    /// Built-in modes first, then custom profiles. A profile whose name
    /// collides with a built-in mode replaces it.
    pub fn from_modes(modes: OperationalModes) -> Self {
        let mut entries = IndexMap::new();

        for mode in &modes.default_working_modes {
            let Some(value) = mode.mode_value() else {
                debug!(label = %mode.label, value = %mode.value, "skipping mode with non-numeric value");
                continue;
            };
            let name = normalize_name(&mode.label);
            entries.insert(
                name.clone(),
                ModeEntry {
                    name,
                    label: mode.label.clone(),
                    selector: ModeSelector::Default(value),
                },
            );
        }

        for profile in &modes.energy_profile_items {
            let name = normalize_name(&profile.name);
            entries.insert(
                name.clone(),
                ModeEntry {
                    name,
                    label: profile.name.clone(),
                    selector: ModeSelector::Profile(profile.profile_id),
                },
            );
        }

        Self {
            entries,
            source: modes,
        }
    }

    /// Look up by name; the input is normalised first.
    pub fn get(&self, name: &str) -> Option<ModeSelector> {
        self.entries.get(&normalize_name(name)).map(|e| e.selector)
    }

    pub fn entries(&self) -> impl Iterator<Item = &ModeEntry> {
        self.entries.values()
    }

    pub fn names(&self) -> Vec<&str> {
        self.entries.keys().map(String::as_str).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn modes(&self) -> &OperationalModes {
        &self.source
    }

    /// Label for a current-mode reading (mode 9 matches by profile id).
    pub fn resolve_label(&self, current: CurrentMode) -> Option<&str> {
        self.source.label_for(current)
    }
}

// ── Smart loads ──────────────────────────────────────────────────────

/// Normalised load name → load path.
#[derive(Debug, Clone, Default)]
pub struct LoadCatalog {
    loads: IndexMap<String, i64>,
}

impl LoadCatalog {
    /// Cards without a path or a name are not addressable and are skipped.
    pub fn from_cards(cards: &[SmartLoadCard]) -> Self {
        let loads = cards
            .iter()
            .filter_map(|card| Some((normalize_name(card.name.as_deref()?), card.path?)))
            .collect();
        Self { loads }
    }

    pub fn get(&self, name: &str) -> Option<i64> {
        self.loads.get(&normalize_name(name)).copied()
    }

    pub fn names(&self) -> Vec<&str> {
        self.loads.keys().map(String::as_str).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, i64)> {
        self.loads.iter().map(|(name, path)| (name.as_str(), *path))
    }

    pub fn is_empty(&self) -> bool {
        self.loads.is_empty()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    fn catalog() -> ModeCatalog {
        let modes: OperationalModes = serde_json::from_value(json!({
            "defaultWorkingModes": [
                { "label": "Maximum Self-Consumption", "value": "0" },
                { "label": "Fully Feed-in", "value": "5" },
                { "label": "Broken", "value": "n/a" }
            ],
            "energyProfileItems": [
                { "profileId": 42, "name": "Night Charge" }
            ]
        }))
        .unwrap();
        ModeCatalog::from_modes(modes)
    }

    #[test]
    fn names_are_normalised() {
        assert_eq!(normalize_name("Maximum Self-Consumption"), "maximum_self_consumption");
        assert_eq!(normalize_name("  Pool Pump "), "pool_pump");
    }

    #[test]
    fn mode_lookup_by_any_spelling() {
        let catalog = catalog();
        assert_eq!(
            catalog.get("Fully Feed-in"),
            Some(ModeSelector::Default(5))
        );
        assert_eq!(catalog.get("fully_feed_in"), Some(ModeSelector::Default(5)));
        assert_eq!(catalog.get("night charge"), Some(ModeSelector::Profile(42)));
        assert_eq!(catalog.get("broken"), None);
        assert_eq!(
            catalog.names(),
            vec!["maximum_self_consumption", "fully_feed_in", "night_charge"]
        );
    }

    #[test]
    fn selectors_map_to_wire_values() {
        assert_eq!(ModeSelector::Default(5).mode_value(), 5);
        assert_eq!(ModeSelector::Default(5).profile_id(), -1);
        assert_eq!(ModeSelector::Profile(42).mode_value(), 9);
        assert_eq!(ModeSelector::Profile(42).profile_id(), 42);
    }

    #[test]
    fn label_resolution_uses_profile_for_mode_nine() {
        let catalog = catalog();
        let label = catalog.resolve_label(CurrentMode {
            current_mode: 9,
            current_profile_id: Some(42),
        });
        assert_eq!(label, Some("Night Charge"));
    }

    #[test]
    fn load_catalog_skips_unaddressable_cards() {
        let cards: Vec<SmartLoadCard> = serde_json::from_value(json!([
            { "path": 1, "name": "Pool Pump" },
            { "name": "No Path" },
            { "path": 3 }
        ]))
        .unwrap();
        let loads = LoadCatalog::from_cards(&cards);
        assert_eq!(loads.get("pool-pump"), Some(1));
        assert_eq!(loads.names(), vec!["pool_pump"]);
    }
}
