/// Story content: chapters and scenes indexed for lookup.
use rustc_hash::{FxHashMap, FxHashSet};
use serde::Deserialize;
use std::path::Path;

use crate::core::error::ContentError;
use crate::schema::condition::UnlockCondition;
use crate::schema::story::{Chapter, ChoiceEffect, Scene, SceneBlock, SceneRef};

#[derive(Debug, Deserialize)]
#[serde(rename = "Story")]
struct RonStory {
    #[serde(default)]
    paths: Vec<String>,
    chapters: Vec<Chapter>,
}

/// All chapters of the story plus the declared path-affinity dimensions.
#[derive(Debug, Clone, Default)]
pub struct StoryContent {
    paths: Vec<String>,
    chapters: Vec<Chapter>,
    chapter_index: FxHashMap<String, usize>,
    scene_index: FxHashMap<(String, String), (usize, usize)>,
    /// Owning chapter of each scene id. Scene ids are story-wide.
    scene_ids: FxHashMap<String, String>,
}

impl StoryContent {
    /// Build and validate story content. `paths` order is the tie-break order
    /// for the dominant path.
    pub fn new(paths: Vec<String>, chapters: Vec<Chapter>) -> Result<StoryContent, ContentError> {
        let mut seen_paths = FxHashSet::default();
        for path in &paths {
            if !seen_paths.insert(path.as_str()) {
                return Err(ContentError::Integrity(format!(
                    "duplicate path dimension '{}'",
                    path
                )));
            }
        }

        let mut chapter_index = FxHashMap::default();
        let mut scene_index = FxHashMap::default();
        let mut scene_ids: FxHashMap<String, String> = FxHashMap::default();
        for (ci, chapter) in chapters.iter().enumerate() {
            if chapter_index.insert(chapter.id.clone(), ci).is_some() {
                return Err(ContentError::Integrity(format!(
                    "duplicate chapter id '{}'",
                    chapter.id
                )));
            }
            for (si, scene) in chapter.scenes.iter().enumerate() {
                let key = (chapter.id.clone(), scene.id.clone());
                if scene_index.insert(key, (ci, si)).is_some() {
                    return Err(ContentError::Integrity(format!(
                        "duplicate scene id '{}' in chapter '{}'",
                        scene.id, chapter.id
                    )));
                }
                if let Some(owner) = scene_ids.insert(scene.id.clone(), chapter.id.clone()) {
                    return Err(ContentError::Integrity(format!(
                        "scene id '{}' is used in chapters '{}' and '{}'",
                        scene.id, owner, chapter.id
                    )));
                }
            }
        }

        let content = StoryContent {
            paths,
            chapters,
            chapter_index,
            scene_index,
            scene_ids,
        };
        content.validate()?;
        Ok(content)
    }

    /// Load story content from a RON file.
    pub fn load_from_ron(path: &Path) -> Result<StoryContent, ContentError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse_ron(&contents)
    }

    /// Parse story content from a RON string.
    pub fn parse_ron(input: &str) -> Result<StoryContent, ContentError> {
        let raw: RonStory = ron::from_str(input)?;
        Self::new(raw.paths, raw.chapters)
    }

    fn validate(&self) -> Result<(), ContentError> {
        for chapter in &self.chapters {
            for scene in &chapter.scenes {
                let at = SceneRef::new(&chapter.id, &scene.id);
                self.validate_scene(&at, scene)?;
            }
        }
        Ok(())
    }

    fn validate_scene(&self, at: &SceneRef, scene: &Scene) -> Result<(), ContentError> {
        if let Some(next) = &scene.next {
            self.require_scene(at, next)?;
        }

        let mut areas = FxHashSet::default();
        for area in &scene.areas {
            if !areas.insert(area.id.as_str()) {
                return Err(ContentError::Integrity(format!(
                    "scene {} has duplicate area '{}'",
                    at, area.id
                )));
            }
        }

        for block in &scene.blocks {
            let SceneBlock::Choice(choice_block) = block else {
                continue;
            };
            if choice_block.choices.is_empty() {
                return Err(ContentError::Integrity(format!(
                    "scene {} has a choice block with no choices",
                    at
                )));
            }
            let mut ids = FxHashSet::default();
            for choice in &choice_block.choices {
                if !ids.insert(choice.id.as_str()) {
                    return Err(ContentError::Integrity(format!(
                        "scene {} has duplicate choice '{}'",
                        at, choice.id
                    )));
                }
                if let Some(condition) = &choice.requires {
                    self.validate_condition(at, condition)?;
                }

                let mut jumps = 0;
                for effect in &choice.effects {
                    match effect {
                        ChoiceEffect::Jump(target) => {
                            jumps += 1;
                            self.require_scene(at, target)?;
                        }
                        ChoiceEffect::ClearFlag(name) if self.is_scene_discovery(name) => {
                            return Err(ContentError::Integrity(format!(
                                "choice '{}' in scene {} clears discovery flag '{}'",
                                choice.id, at, name
                            )));
                        }
                        ChoiceEffect::Path { path, .. } if !self.has_path(path) => {
                            return Err(ContentError::Integrity(format!(
                                "choice '{}' in scene {} shifts undeclared path '{}'",
                                choice.id, at, path
                            )));
                        }
                        _ => {}
                    }
                }
                if jumps > 1 {
                    return Err(ContentError::Integrity(format!(
                        "choice '{}' in scene {} has more than one jump",
                        choice.id, at
                    )));
                }
            }
        }
        Ok(())
    }

    fn validate_condition(
        &self,
        at: &SceneRef,
        condition: &UnlockCondition,
    ) -> Result<(), ContentError> {
        let mut missing = None;
        condition.for_each_leaf(&mut |leaf: &UnlockCondition| {
            if let UnlockCondition::SceneComplete(scene) = leaf {
                if !self.scene_ids.contains_key(scene) {
                    missing = Some(scene.clone());
                }
            }
        });
        match missing {
            Some(scene) => Err(ContentError::Integrity(format!(
                "condition in scene {} names unknown scene '{}'",
                at, scene
            ))),
            None => Ok(()),
        }
    }

    fn require_scene(&self, at: &SceneRef, target: &SceneRef) -> Result<(), ContentError> {
        if self.scene(&target.chapter, &target.scene).is_none() {
            return Err(ContentError::Integrity(format!(
                "scene {} points at missing scene {}",
                at, target
            )));
        }
        Ok(())
    }

    fn is_scene_discovery(&self, flag: &str) -> bool {
        self.chapters
            .iter()
            .flat_map(|c| &c.scenes)
            .flat_map(|s| &s.areas)
            .any(|a| a.discovery.as_deref() == Some(flag))
    }

    /// Every `(scene, flag)` a choice effect clears.
    pub fn cleared_flags(&self) -> Vec<(SceneRef, &str)> {
        let mut cleared = Vec::new();
        for chapter in &self.chapters {
            for scene in &chapter.scenes {
                let choices = scene
                    .blocks
                    .iter()
                    .filter_map(SceneBlock::as_choice)
                    .flat_map(|b| &b.choices);
                for choice in choices {
                    for effect in &choice.effects {
                        if let ChoiceEffect::ClearFlag(name) = effect {
                            cleared.push((SceneRef::new(&chapter.id, &scene.id), name.as_str()));
                        }
                    }
                }
            }
        }
        cleared
    }

    /// Declared path-affinity dimensions, in declaration order.
    pub fn paths(&self) -> &[String] {
        &self.paths
    }

    pub fn has_path(&self, path: &str) -> bool {
        self.paths.iter().any(|p| p == path)
    }

    pub fn chapters(&self) -> &[Chapter] {
        &self.chapters
    }

    pub fn chapter(&self, id: &str) -> Option<&Chapter> {
        self.chapter_index.get(id).map(|&i| &self.chapters[i])
    }

    pub fn scene(&self, chapter: &str, scene: &str) -> Option<&Scene> {
        self.scene_index
            .get(&(chapter.to_string(), scene.to_string()))
            .map(|&(ci, si)| &self.chapters[ci].scenes[si])
    }

    pub fn scene_at(&self, at: &SceneRef) -> Option<&Scene> {
        self.scene(&at.chapter, &at.scene)
    }

    /// Whether any chapter has a scene with this id.
    pub fn has_scene_id(&self, scene: &str) -> bool {
        self.scene_ids.contains_key(scene)
    }

    /// The scene that follows `at`: its explicit `next`, else the following
    /// scene in the same chapter.
    pub fn next_scene(&self, at: &SceneRef) -> Option<SceneRef> {
        let &(ci, si) = self
            .scene_index
            .get(&(at.chapter.clone(), at.scene.clone()))?;
        let chapter = &self.chapters[ci];
        if let Some(next) = &chapter.scenes[si].next {
            return Some(next.clone());
        }
        chapter
            .scenes
            .get(si + 1)
            .map(|s| SceneRef::new(&chapter.id, &s.id))
    }
}
