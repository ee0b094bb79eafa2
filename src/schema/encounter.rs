use serde::{Deserialize, Serialize};

use super::location::DangerLevel;

/// A random encounter definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Encounter {
    pub id: String,
    pub name: String,
    pub danger: DangerLevel,
    /// Enemy template ids spawned by this encounter.
    pub enemies: Vec<String>,
}

/// What the combat subsystem receives when an encounter fires.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncounterDescriptor {
    pub encounter_id: String,
    pub location_id: String,
    pub danger: DangerLevel,
    pub enemies: Vec<String>,
}

impl EncounterDescriptor {
    pub fn new(encounter: &Encounter, location_id: &str) -> Self {
        Self {
            encounter_id: encounter.id.clone(),
            location_id: location_id.to_string(),
            danger: encounter.danger,
            enemies: encounter.enemies.clone(),
        }
    }
}

/// How a combat handed off from navigation ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CombatOutcome {
    Victory,
    Defeat,
    Fled,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn descriptor_copies_encounter() {
        let encounter = Encounter {
            id: "street-punk".to_string(),
            name: "Street Punk".to_string(),
            danger: DangerLevel::Neutral,
            enemies: vec!["punk".to_string()],
        };
        let descriptor = EncounterDescriptor::new(&encounter, "gang-territory");
        assert_eq!(descriptor.encounter_id, "street-punk");
        assert_eq!(descriptor.location_id, "gang-territory");
        assert_eq!(descriptor.danger, DangerLevel::Neutral);
        assert_eq!(descriptor.enemies, vec!["punk".to_string()]);
    }
}
