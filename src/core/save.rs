/// Save snapshots: serializable game state and its validation on restore.
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::content::StoryContent;
use crate::core::error::ErrorKind;
use crate::core::state::{GameState, RELATIONSHIP_MAX, RELATIONSHIP_MIN};
use crate::core::world::LocationGraph;

/// Current snapshot format version.
pub const SAVE_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum SaveError {
    #[error("RON serialization error: {0}")]
    Serialize(#[from] ron::Error),
    #[error("RON deserialization error: {0}")]
    Deserialize(#[from] ron::error::SpannedError),
    #[error("version mismatch: expected {expected}, found {found}")]
    VersionMismatch { expected: u32, found: u32 },
    #[error("corrupt save data: {0}")]
    Corrupt(String),
}

impl SaveError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            // Failing to write a snapshot means the state itself is unrepresentable.
            Self::Serialize(_) => ErrorKind::InvalidOperation,
            _ => ErrorKind::CorruptSaveData,
        }
    }
}

/// Everything persistence needs to resume a game.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveSnapshot {
    pub version: u32,
    pub state: GameState,
}

impl SaveSnapshot {
    pub fn new(state: GameState) -> Self {
        Self {
            version: SAVE_VERSION,
            state,
        }
    }

    pub fn to_ron(&self) -> Result<String, SaveError> {
        Ok(ron::ser::to_string_pretty(
            self,
            ron::ser::PrettyConfig::default(),
        )?)
    }

    pub fn from_ron(input: &str) -> Result<SaveSnapshot, SaveError> {
        Ok(ron::from_str(input)?)
    }

    /// Check the snapshot against loaded content. Every reference must
    /// resolve and every invariant must hold.
    pub fn validate(&self, world: &LocationGraph, story: &StoryContent) -> Result<(), SaveError> {
        if self.version != SAVE_VERSION {
            return Err(SaveError::VersionMismatch {
                expected: SAVE_VERSION,
                found: self.version,
            });
        }
        let state = &self.state;
        let nav = &state.navigation;

        let current = world
            .location(&nav.current_location)
            .ok_or_else(|| corrupt(format!("unknown location '{}'", nav.current_location)))?;
        if !nav.visited_locations.contains(&current.id) {
            return Err(corrupt(format!(
                "current location '{}' is not marked visited",
                current.id
            )));
        }
        for id in nav
            .visited_locations
            .iter()
            .chain(nav.previous_location.iter())
            .chain(nav.cleared_locations.iter())
        {
            if world.location(id).is_none() {
                return Err(corrupt(format!("unknown location '{}'", id)));
            }
        }
        if let Some(encounter) = &nav.pending_encounter {
            if !current.encounters.contains(encounter) {
                return Err(corrupt(format!(
                    "pending encounter '{}' does not belong to '{}'",
                    encounter, current.id
                )));
            }
        }

        let progress = &state.story;
        match (&progress.chapter_id, &progress.scene_id) {
            (Some(chapter), Some(scene_id)) => {
                let scene = story.scene(chapter, scene_id).ok_or_else(|| {
                    corrupt(format!("scene '{}' is not in chapter '{}'", scene_id, chapter))
                })?;
                if progress.block_index > scene.blocks.len() {
                    return Err(corrupt(format!(
                        "block index {} past the end of {}/{}",
                        progress.block_index, chapter, scene_id
                    )));
                }
                if progress.scene_complete
                    && (progress.block_index != scene.blocks.len()
                        || !progress.visited_scenes.contains(scene_id))
                {
                    return Err(corrupt(format!(
                        "{}/{} marked complete mid-scene",
                        chapter, scene_id
                    )));
                }
            }
            (None, None) => {
                if progress.scene_complete || progress.block_index != 0 {
                    return Err(corrupt("story cursor set without a scene".to_string()));
                }
            }
            _ => return Err(corrupt("chapter and scene must be set together".to_string())),
        }
        for scene in &progress.visited_scenes {
            if !story.has_scene_id(scene) {
                return Err(corrupt(format!("unknown visited scene '{}'", scene)));
            }
        }
        for path in progress.path_affinity.keys() {
            if !story.has_path(path) {
                return Err(corrupt(format!("unknown path '{}'", path)));
            }
        }

        for (item, quantity) in &state.inventory {
            if *quantity == 0 {
                return Err(corrupt(format!("inventory holds zero '{}'", item)));
            }
        }
        for (npc, value) in &state.relationships {
            if !(RELATIONSHIP_MIN..=RELATIONSHIP_MAX).contains(value) {
                return Err(corrupt(format!(
                    "relationship with '{}' = {} outside [{}, {}]",
                    npc, value, RELATIONSHIP_MIN, RELATIONSHIP_MAX
                )));
            }
        }

        for (name, stat) in &state.stats.0 {
            if !stat.is_within_range() {
                return Err(corrupt(format!(
                    "stat '{}' = {} outside [{}, {}]",
                    name, stat.value, stat.min, stat.max
                )));
            }
        }
        Ok(())
    }
}

fn corrupt(message: String) -> SaveError {
    SaveError::Corrupt(message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::state::{NavigationState, Stat, StoryState};

    fn world() -> LocationGraph {
        LocationGraph::parse_ron(
            r#"World(locations: [
                (id: "a", name: "A", danger: Safe, connected_to: ["b"]),
                (id: "b", name: "B", danger: Neutral, connected_to: ["a"]),
            ])"#,
        )
        .unwrap()
    }

    fn story() -> StoryContent {
        StoryContent::parse_ron(
            r#"Story(paths: ["honor"], chapters: [
                (id: "1", scenes: [(id: "intro", blocks: [Narration("Hi.")])]),
            ])"#,
        )
        .unwrap()
    }

    fn valid_state() -> GameState {
        GameState {
            story: StoryState::new(&["honor".to_string()]),
            navigation: NavigationState::new("a"),
            ..GameState::default()
        }
    }

    #[test]
    fn ron_round_trip_preserves_state() {
        let mut state = valid_state();
        state.story.chapter_id = Some("1".into());
        state.story.scene_id = Some("intro".into());
        state.story.flags.set("met_mara", true.into());
        state.inventory.insert("coin".into(), 4);
        let snapshot = SaveSnapshot::new(state);

        let text = snapshot.to_ron().unwrap();
        let restored = SaveSnapshot::from_ron(&text).unwrap();
        assert_eq!(restored, snapshot);
        restored.validate(&world(), &story()).unwrap();
    }

    #[test]
    fn unknown_location_is_corrupt() {
        let mut state = valid_state();
        state.navigation.current_location = "atlantis".into();
        let err = SaveSnapshot::new(state).validate(&world(), &story()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CorruptSaveData);
    }

    #[test]
    fn scene_outside_chapter_is_corrupt() {
        let mut state = valid_state();
        state.story.chapter_id = Some("2".into());
        state.story.scene_id = Some("intro".into());
        assert!(matches!(
            SaveSnapshot::new(state).validate(&world(), &story()),
            Err(SaveError::Corrupt(_))
        ));
    }

    #[test]
    fn half_set_scene_is_corrupt() {
        let mut state = valid_state();
        state.story.scene_id = Some("intro".into());
        assert!(SaveSnapshot::new(state).validate(&world(), &story()).is_err());
    }

    #[test]
    fn stat_out_of_range_is_corrupt() {
        let mut state = valid_state();
        state.stats.0.insert(
            "hp".into(),
            Stat {
                value: -4,
                min: 0,
                max: 100,
            },
        );
        assert!(SaveSnapshot::new(state).validate(&world(), &story()).is_err());
    }

    #[test]
    fn unreachable_inventory_and_relationships_are_corrupt() {
        let mut state = valid_state();
        state.inventory.insert("coin".into(), 0);
        assert!(matches!(
            SaveSnapshot::new(state).validate(&world(), &story()),
            Err(SaveError::Corrupt(msg)) if msg.contains("zero 'coin'")
        ));

        let mut state = valid_state();
        state.relationships.insert("mara".into(), 101);
        assert!(matches!(
            SaveSnapshot::new(state).validate(&world(), &story()),
            Err(SaveError::Corrupt(msg)) if msg.contains("mara")
        ));

        let mut state = valid_state();
        state.relationships.insert("mara".into(), -100);
        SaveSnapshot::new(state).validate(&world(), &story()).unwrap();
    }

    #[test]
    fn completion_flag_must_match_cursor() {
        let mut state = valid_state();
        state.story.chapter_id = Some("1".into());
        state.story.scene_id = Some("intro".into());
        state.story.scene_complete = true;
        assert!(SaveSnapshot::new(state.clone()).validate(&world(), &story()).is_err());

        state.story.block_index = 1;
        assert!(SaveSnapshot::new(state.clone()).validate(&world(), &story()).is_err());

        state.story.visited_scenes.insert("intro".into());
        SaveSnapshot::new(state).validate(&world(), &story()).unwrap();

        let mut idle = valid_state();
        idle.story.block_index = 2;
        assert!(SaveSnapshot::new(idle).validate(&world(), &story()).is_err());
    }

    #[test]
    fn version_mismatch_rejected() {
        let mut snapshot = SaveSnapshot::new(valid_state());
        snapshot.version = 99;
        assert!(matches!(
            snapshot.validate(&world(), &story()),
            Err(SaveError::VersionMismatch { found: 99, .. })
        ));
    }

    #[test]
    fn garbage_is_corrupt() {
        let err = SaveSnapshot::from_ron("(version: 1, state: ???)").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CorruptSaveData);
    }
}
