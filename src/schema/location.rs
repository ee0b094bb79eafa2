use serde::{Deserialize, Serialize};
use std::fmt;

use super::condition::UnlockCondition;

/// Danger classification of a location or encounter. Ordered from safest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum DangerLevel {
    Safe,
    Neutral,
    Dangerous,
    Deadly,
}

impl DangerLevel {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Safe => "safe",
            Self::Neutral => "neutral",
            Self::Dangerous => "dangerous",
            Self::Deadly => "deadly",
        }
    }
}

impl fmt::Display for DangerLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Services a location offers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocationFeatures {
    #[serde(default)]
    pub can_rest: bool,
    #[serde(default)]
    pub can_train: bool,
    #[serde(default)]
    pub can_save: bool,
    #[serde(default)]
    pub has_shop: bool,
}

/// A sub-area of a location or scene the player can look around in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExplorationArea {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Vec<String>,
    /// Must be explored before the player may leave or continue.
    #[serde(default)]
    pub required: bool,
    /// Discovery flag set on first visit.
    #[serde(default)]
    pub discovery: Option<String>,
}

/// A node in the navigation graph.
///
/// Edges in `connected_to` are directional as authored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NavigationLocation {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub danger: DangerLevel,
    pub connected_to: Vec<String>,
    #[serde(default)]
    pub encounters: Vec<String>,
    #[serde(default)]
    pub encounter_chance: f64,
    #[serde(default)]
    pub unlock: Option<UnlockCondition>,
    #[serde(default)]
    pub features: LocationFeatures,
    #[serde(default)]
    pub areas: Vec<ExplorationArea>,
}

impl NavigationLocation {
    pub fn is_connected_to(&self, id: &str) -> bool {
        self.connected_to.iter().any(|c| c == id)
    }

    pub fn area(&self, id: &str) -> Option<&ExplorationArea> {
        self.areas.iter().find(|a| a.id == id)
    }

    pub fn required_areas(&self) -> impl Iterator<Item = &ExplorationArea> {
        self.areas.iter().filter(|a| a.required)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn danger_ordering() {
        assert!(DangerLevel::Safe < DangerLevel::Neutral);
        assert!(DangerLevel::Neutral < DangerLevel::Dangerous);
        assert!(DangerLevel::Dangerous < DangerLevel::Deadly);
        assert_eq!(DangerLevel::Deadly.to_string(), "deadly");
    }

    #[test]
    fn location_from_ron_with_defaults() {
        let loc: NavigationLocation = ron::from_str(
            r#"(
                id: "safehouse",
                name: "The Safehouse",
                danger: Safe,
                connected_to: ["lower-streets"],
                features: (can_rest: true, can_save: true),
                areas: [(id: "cellar", name: "Cellar", required: true)],
            )"#,
        )
        .unwrap();
        assert!(loc.encounters.is_empty());
        assert_eq!(loc.encounter_chance, 0.0);
        assert!(loc.unlock.is_none());
        assert!(loc.features.can_rest && !loc.features.has_shop);
        assert!(loc.is_connected_to("lower-streets"));
        assert!(!loc.is_connected_to("docks"));
        assert_eq!(loc.required_areas().count(), 1);
        assert!(loc.area("cellar").is_some_and(|a| a.discovery.is_none()));
    }
}
