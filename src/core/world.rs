/// Location graph: indexed, validated navigation content.
use rustc_hash::{FxHashMap, FxHashSet};
use serde::Deserialize;
use std::collections::BTreeSet;
use std::path::Path;

use crate::core::error::ContentError;
use crate::schema::condition::{ConditionContext, UnlockCondition};
use crate::schema::encounter::Encounter;
use crate::schema::location::{ExplorationArea, NavigationLocation};

#[derive(Debug, Deserialize)]
#[serde(rename = "World")]
struct RonWorld {
    locations: Vec<NavigationLocation>,
    #[serde(default)]
    encounters: Vec<Encounter>,
}

/// The static graph of navigable locations and the encounter table.
///
/// Loaded once and shared read-only by the engines.
#[derive(Debug, Clone, Default)]
pub struct LocationGraph {
    locations: Vec<NavigationLocation>,
    index: FxHashMap<String, usize>,
    encounters: FxHashMap<String, Encounter>,
}

impl LocationGraph {
    /// Build and validate a graph from its parts.
    pub fn new(
        locations: Vec<NavigationLocation>,
        encounters: Vec<Encounter>,
    ) -> Result<LocationGraph, ContentError> {
        let mut index = FxHashMap::default();
        for (i, location) in locations.iter().enumerate() {
            if index.insert(location.id.clone(), i).is_some() {
                return Err(ContentError::Integrity(format!(
                    "duplicate location id '{}'",
                    location.id
                )));
            }
        }

        let mut table = FxHashMap::default();
        for encounter in encounters {
            let id = encounter.id.clone();
            if table.insert(id.clone(), encounter).is_some() {
                return Err(ContentError::Integrity(format!(
                    "duplicate encounter id '{}'",
                    id
                )));
            }
        }

        let graph = LocationGraph {
            locations,
            index,
            encounters: table,
        };
        graph.validate()?;
        Ok(graph)
    }

    /// Index locations without validating their references.
    #[cfg(test)]
    fn unchecked(locations: Vec<NavigationLocation>) -> LocationGraph {
        let index = locations
            .iter()
            .enumerate()
            .map(|(i, l)| (l.id.clone(), i))
            .collect();
        LocationGraph {
            locations,
            index,
            encounters: FxHashMap::default(),
        }
    }

    /// Load a graph from a RON file.
    pub fn load_from_ron(path: &Path) -> Result<LocationGraph, ContentError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse_ron(&contents)
    }

    /// Parse a graph from a RON string.
    pub fn parse_ron(input: &str) -> Result<LocationGraph, ContentError> {
        let raw: RonWorld = ron::from_str(input)?;
        Self::new(raw.locations, raw.encounters)
    }

    fn validate(&self) -> Result<(), ContentError> {
        for location in &self.locations {
            let id = &location.id;
            for target in &location.connected_to {
                if !self.index.contains_key(target) {
                    return Err(ContentError::Integrity(format!(
                        "location '{}' connects to unknown location '{}'",
                        id, target
                    )));
                }
            }

            let chance = location.encounter_chance;
            if !(0.0..=1.0).contains(&chance) {
                return Err(ContentError::Integrity(format!(
                    "location '{}' has encounter chance {} outside [0, 1]",
                    id, chance
                )));
            }
            if location.encounters.is_empty() != (chance == 0.0) {
                return Err(ContentError::Integrity(format!(
                    "location '{}' must have an empty encounter pool iff its chance is 0",
                    id
                )));
            }
            for encounter in &location.encounters {
                if !self.encounters.contains_key(encounter) {
                    return Err(ContentError::Integrity(format!(
                        "location '{}' references unknown encounter '{}'",
                        id, encounter
                    )));
                }
            }

            let mut seen = FxHashSet::default();
            for area in &location.areas {
                if !seen.insert(area.id.as_str()) {
                    return Err(ContentError::Integrity(format!(
                        "location '{}' has duplicate area '{}'",
                        id, area.id
                    )));
                }
            }

            if let Some(condition) = &location.unlock {
                let mut missing = None;
                condition.for_each_leaf(&mut |leaf: &UnlockCondition| {
                    if let UnlockCondition::LocationVisited(target) = leaf {
                        if !self.index.contains_key(target) {
                            missing = Some(target.clone());
                        }
                    }
                });
                if let Some(target) = missing {
                    return Err(ContentError::Integrity(format!(
                        "unlock condition of '{}' names unknown location '{}'",
                        id, target
                    )));
                }
            }
        }
        Ok(())
    }

    pub fn location(&self, id: &str) -> Option<&NavigationLocation> {
        self.index.get(id).map(|&i| &self.locations[i])
    }

    /// Locations reachable from `id`, in authored order.
    ///
    /// Ids that fail to resolve are skipped; validated graphs have none.
    /// An unknown `id` yields nothing.
    pub fn connected(&self, id: &str) -> Vec<&NavigationLocation> {
        self.location(id)
            .map(|location| {
                location
                    .connected_to
                    .iter()
                    .filter_map(|target| self.location(target))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn exploration_areas(&self, id: &str) -> Option<&[ExplorationArea]> {
        self.location(id).map(|l| l.areas.as_slice())
    }

    pub fn encounter(&self, id: &str) -> Option<&Encounter> {
        self.encounters.get(id)
    }

    pub fn locations(&self) -> impl Iterator<Item = &NavigationLocation> {
        self.locations.iter()
    }

    pub fn len(&self) -> usize {
        self.locations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locations.is_empty()
    }

    /// Whether a location's unlock condition (if any) holds.
    pub fn is_unlocked<C: ConditionContext + ?Sized>(
        location: &NavigationLocation,
        ctx: &C,
    ) -> bool {
        location.unlock.as_ref().map_or(true, |c| c.evaluate(ctx))
    }

    /// Ids of conditionally-locked locations whose condition currently holds.
    pub fn unlocked_ids<C: ConditionContext + ?Sized>(&self, ctx: &C) -> BTreeSet<String> {
        self.locations
            .iter()
            .filter(|l| l.unlock.as_ref().is_some_and(|c| c.evaluate(ctx)))
            .map(|l| l.id.clone())
            .collect()
    }

    /// Edges `(from, to)` with no authored edge back from `to`.
    pub fn asymmetric_edges(&self) -> Vec<(String, String)> {
        let mut edges = Vec::new();
        for location in &self.locations {
            for target in &location.connected_to {
                let back = self
                    .location(target)
                    .is_some_and(|t| t.is_connected_to(&location.id));
                if !back {
                    edges.push((location.id.clone(), target.clone()));
                }
            }
        }
        edges
    }

    /// Every `SceneComplete` scene id referenced by an unlock condition.
    pub fn referenced_scenes(&self) -> Vec<(&str, String)> {
        let mut out = Vec::new();
        for location in &self.locations {
            if let Some(condition) = &location.unlock {
                condition.for_each_leaf(&mut |leaf: &UnlockCondition| {
                    if let UnlockCondition::SceneComplete(scene) = leaf {
                        out.push((location.id.as_str(), scene.clone()));
                    }
                });
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::flag::FlagValue;

    const WORLD: &str = r#"World(
        locations: [
            (
                id: "safehouse",
                name: "Safehouse",
                danger: Safe,
                connected_to: ["lower-streets"],
                features: (can_rest: true),
            ),
            (
                id: "lower-streets",
                name: "Lower Streets",
                danger: Neutral,
                connected_to: ["safehouse", "gang-territory", "canal"],
                encounters: ["street-punk"],
                encounter_chance: 0.15,
            ),
            (
                id: "gang-territory",
                name: "Gang Territory",
                danger: Dangerous,
                connected_to: ["lower-streets"],
                encounters: ["street-punk", "alley-brawler"],
                encounter_chance: 0.35,
                unlock: Some(SceneComplete("1-2-awakening")),
            ),
            (
                id: "canal",
                name: "Canal",
                danger: Neutral,
                connected_to: [],
            ),
        ],
        encounters: [
            (id: "street-punk", name: "Street Punk", danger: Neutral, enemies: ["punk"]),
            (id: "alley-brawler", name: "Alley Brawler", danger: Dangerous, enemies: ["brawler"]),
        ],
    )"#;

    struct Completed(Vec<&'static str>);

    impl ConditionContext for Completed {
        fn flag(&self, _name: &str) -> Option<FlagValue> {
            None
        }
        fn scene_completed(&self, scene: &str) -> bool {
            self.0.contains(&scene)
        }
        fn location_visited(&self, _location: &str) -> bool {
            false
        }
        fn stat(&self, _stat: &str) -> Option<i64> {
            None
        }
        fn item_count(&self, _item: &str) -> u32 {
            0
        }
    }

    #[test]
    fn parse_and_lookup() {
        let graph = LocationGraph::parse_ron(WORLD).unwrap();
        assert_eq!(graph.len(), 4);
        assert_eq!(graph.location("canal").unwrap().name, "Canal");
        assert!(graph.location("docks").is_none());
        assert_eq!(graph.encounter("street-punk").unwrap().enemies, vec!["punk"]);
    }

    #[test]
    fn connected_preserves_order() {
        let graph = LocationGraph::parse_ron(WORLD).unwrap();
        let ids: Vec<&str> = graph
            .connected("lower-streets")
            .iter()
            .map(|l| l.id.as_str())
            .collect();
        assert_eq!(ids, vec!["safehouse", "gang-territory", "canal"]);
        assert!(graph.connected("canal").is_empty());
        assert!(graph.connected("nowhere").is_empty());
    }

    #[test]
    fn unknown_edge_rejected() {
        let bad = WORLD.replace(r#"connected_to: [],"#, r#"connected_to: ["docks"],"#);
        let err = LocationGraph::parse_ron(&bad).unwrap_err();
        assert!(matches!(err, ContentError::Integrity(msg) if msg.contains("docks")));
    }

    #[test]
    fn pool_and_chance_must_agree() {
        let bad = WORLD.replace("encounter_chance: 0.15,", "");
        assert!(matches!(
            LocationGraph::parse_ron(&bad),
            Err(ContentError::Integrity(_))
        ));
    }

    #[test]
    fn unknown_encounter_rejected() {
        let bad = WORLD.replace(
            r#"encounters: ["street-punk"],"#,
            r#"encounters: ["ghost"],"#,
        );
        assert!(matches!(
            LocationGraph::parse_ron(&bad),
            Err(ContentError::Integrity(msg)) if msg.contains("ghost")
        ));
    }

    fn location(id: &str, connected_to: &[&str]) -> NavigationLocation {
        NavigationLocation {
            id: id.to_string(),
            name: id.to_uppercase(),
            description: String::new(),
            danger: crate::schema::location::DangerLevel::Safe,
            connected_to: connected_to.iter().map(|c| c.to_string()).collect(),
            encounters: vec![],
            encounter_chance: 0.0,
            unlock: None,
            features: Default::default(),
            areas: vec![],
        }
    }

    #[test]
    fn duplicate_location_rejected() {
        let loc = location("a", &[]);
        let result = LocationGraph::new(vec![loc.clone(), loc], vec![]);
        assert!(matches!(result, Err(ContentError::Integrity(_))));
    }

    #[test]
    fn connected_skips_unresolved_ids() {
        let graph = LocationGraph::unchecked(vec![
            location("a", &["b", "ghost", "c"]),
            location("b", &["a"]),
            location("c", &[]),
        ]);
        let ids: Vec<&str> = graph.connected("a").iter().map(|l| l.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "c"]);
        assert!(LocationGraph::new(graph.locations().cloned().collect(), vec![]).is_err());
    }

    #[test]
    fn unlocked_ids_tracks_conditions() {
        let graph = LocationGraph::parse_ron(WORLD).unwrap();
        assert!(graph.unlocked_ids(&Completed(vec![])).is_empty());
        let after = graph.unlocked_ids(&Completed(vec!["1-2-awakening"]));
        assert_eq!(after.into_iter().collect::<Vec<_>>(), vec!["gang-territory"]);
    }

    #[test]
    fn asymmetric_edges_found() {
        let graph = LocationGraph::parse_ron(WORLD).unwrap();
        assert_eq!(
            graph.asymmetric_edges(),
            vec![("lower-streets".to_string(), "canal".to_string())]
        );
    }

    #[test]
    fn referenced_scenes_collected() {
        let graph = LocationGraph::parse_ron(WORLD).unwrap();
        assert_eq!(
            graph.referenced_scenes(),
            vec![("gang-territory", "1-2-awakening".to_string())]
        );
    }
}
