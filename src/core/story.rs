/// Story engine: scene progression, choice resolution and path affinity.
use std::fmt;
use thiserror::Error;

use crate::core::content::StoryContent;
use crate::core::error::ErrorKind;
use crate::core::navigation::ExplorationResult;
use crate::core::state::{GameState, GameStore, RELATIONSHIP_MAX, RELATIONSHIP_MIN};
use crate::core::world::LocationGraph;
use crate::schema::flag::FlagValue;
use crate::schema::location::ExplorationArea;
use crate::schema::story::{ChoiceEffect, Scene, SceneBlock, SceneRef};

#[derive(Debug, Error)]
pub enum StoryError {
    #[error("scene not found: {0}")]
    SceneNotFound(SceneRef),
    #[error("no scene is active")]
    NoActiveScene,
    #[error("a choice must be resolved before the scene can advance")]
    NotAdvanceable,
    #[error("scene {0} is already complete")]
    SceneAlreadyComplete(SceneRef),
    #[error("no choice is pending")]
    NoChoicePending,
    #[error("invalid choice: {0}")]
    InvalidChoice(String),
    #[error("choice '{0}' is not available")]
    ChoiceUnavailable(String),
    #[error("effect rejected: {0}")]
    EffectRejected(String),
    #[error("area '{area}' of scene {scene} must be explored first")]
    RequiredAreaUnexplored { scene: SceneRef, area: String },
    #[error("area not found: {0}")]
    AreaNotFound(String),
    #[error("content integrity error: {0}")]
    ContentIntegrity(String),
}

impl StoryError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::SceneNotFound(_) | Self::InvalidChoice(_) | Self::AreaNotFound(_) => {
                ErrorKind::NotFound
            }
            Self::ChoiceUnavailable(_)
            | Self::EffectRejected(_)
            | Self::RequiredAreaUnexplored { .. } => ErrorKind::PreconditionFailed,
            Self::NoActiveScene
            | Self::NotAdvanceable
            | Self::SceneAlreadyComplete(_)
            | Self::NoChoicePending => ErrorKind::InvalidOperation,
            Self::ContentIntegrity(_) => ErrorKind::ContentIntegrity,
        }
    }
}

/// Where the story cursor stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoryPhase {
    Idle,
    Presenting,
    AwaitingChoice,
    SceneComplete,
}

/// What a story operation hands back to the presentation layer.
#[derive(Debug, Clone, PartialEq)]
pub enum StoryResult {
    SceneStarted { scene: SceneRef, title: String },
    Block { index: usize, block: SceneBlock },
    SceneComplete { scene: SceneRef, next: Option<SceneRef> },
    ChoiceResolved(ChoiceOutcome),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChoiceOutcome {
    pub choice_id: String,
    pub applied: Vec<AppliedEffect>,
    /// Scene finished by a jump.
    pub completed: Option<SceneRef>,
    pub jumped_to: Option<SceneRef>,
    pub newly_unlocked: Vec<String>,
}

/// An effect as it actually landed, after clamping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppliedEffect {
    FlagSet { name: String, value: FlagValue, changed: bool },
    FlagCleared { name: String, changed: bool },
    Stat { stat: String, requested: i64, applied: i64, value: i64 },
    Path { path: String, delta: i64, total: i64 },
    Relationship { npc: String, applied: i64, value: i64 },
    ItemGained { item: String, quantity: u32 },
    ItemLost { item: String, quantity: u32 },
}

impl AppliedEffect {
    /// Flag bookkeeping is not shown to the player.
    pub fn is_visible(&self) -> bool {
        !matches!(self, Self::FlagSet { .. } | Self::FlagCleared { .. })
    }
}

fn display_name(name: &str) -> String {
    if name.len() <= 2 {
        return name.to_uppercase();
    }
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

impl fmt::Display for AppliedEffect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FlagSet { name, value, .. } => write!(f, "{} = {}", name, value),
            Self::FlagCleared { name, .. } => write!(f, "{} cleared", name),
            Self::Stat { stat, applied, .. } => write!(f, "{:+} {}", applied, display_name(stat)),
            Self::Path { path, delta, .. } => write!(f, "{:+} {}", delta, display_name(path)),
            Self::Relationship { npc, applied, .. } => {
                write!(f, "{:+} {}", applied, display_name(npc))
            }
            Self::ItemGained { item, quantity } => write!(f, "+{} {}", quantity, item),
            Self::ItemLost { item, quantity } => write!(f, "-{} {}", quantity, item),
        }
    }
}

/// One choice as offered to the player.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChoiceView {
    pub id: String,
    pub text: String,
    pub selectable: bool,
}

/// Advances the player through [`StoryContent`].
///
/// When given the location graph, choice results also report which
/// locations the choice unlocked.
#[derive(Debug, Clone, Copy)]
pub struct StoryEngine<'a> {
    story: &'a StoryContent,
    world: Option<&'a LocationGraph>,
}

impl<'a> StoryEngine<'a> {
    pub fn new(story: &'a StoryContent) -> Self {
        Self { story, world: None }
    }

    pub fn with_world(mut self, world: &'a LocationGraph) -> Self {
        self.world = Some(world);
        self
    }

    pub fn phase(&self, state: &GameState) -> StoryPhase {
        let Some(at) = state.story.current_scene() else {
            return StoryPhase::Idle;
        };
        let Some(scene) = self.story.scene_at(&at) else {
            return StoryPhase::Idle;
        };
        if state.story.scene_complete {
            return StoryPhase::SceneComplete;
        }
        match scene.blocks.get(state.story.block_index) {
            Some(block) if block.is_choice() => StoryPhase::AwaitingChoice,
            _ => StoryPhase::Presenting,
        }
    }

    /// The block at the cursor: the next to deliver, or the pending choice.
    pub fn current_block(&self, state: &GameState) -> Option<&'a SceneBlock> {
        if state.story.scene_complete {
            return None;
        }
        let at = state.story.current_scene()?;
        self.story
            .scene_at(&at)?
            .blocks
            .get(state.story.block_index)
    }

    /// Enter a scene with the cursor on its first block.
    ///
    /// The scene is recorded as visited only when it completes.
    pub fn start_scene(
        &self,
        store: &mut GameStore,
        chapter: &str,
        scene: &str,
    ) -> Result<StoryResult, StoryError> {
        let at = SceneRef::new(chapter, scene);
        store.transact(|_, draft| {
            let entered = self.begin(draft, &at)?;
            tracing::debug!(scene = %at, "scene started");
            Ok(StoryResult::SceneStarted {
                scene: at.clone(),
                title: entered.title.clone(),
            })
        })
    }

    /// Deliver the next narration or dialogue block, or complete the scene
    /// once its blocks are exhausted.
    pub fn advance(&self, store: &mut GameStore) -> Result<StoryResult, StoryError> {
        store.transact(|live, draft| {
            let (at, scene) = self.active(live)?;
            if live.story.scene_complete {
                return Err(StoryError::SceneAlreadyComplete(at));
            }

            let index = live.story.block_index;
            match scene.blocks.get(index) {
                Some(block) if block.is_choice() => Err(StoryError::NotAdvanceable),
                Some(block) => {
                    draft.story.block_index = index + 1;
                    Ok(StoryResult::Block {
                        index,
                        block: block.clone(),
                    })
                }
                None => {
                    self.finish(draft, &at, scene)?;
                    let next = self.story.next_scene(&at);
                    tracing::debug!(scene = %at, next = ?next, "scene complete");
                    Ok(StoryResult::SceneComplete { scene: at, next })
                }
            }
        })
    }

    /// Choices of the pending choice block, minus hidden locked ones.
    pub fn available_choices(&self, state: &GameState) -> Result<Vec<ChoiceView>, StoryError> {
        let block = self
            .current_block(state)
            .and_then(SceneBlock::as_choice)
            .ok_or(StoryError::NoChoicePending)?;
        Ok(block
            .choices
            .iter()
            .filter_map(|choice| {
                let selectable = choice.requires.as_ref().map_or(true, |c| c.evaluate(state));
                if !selectable && choice.hidden_when_locked {
                    return None;
                }
                Some(ChoiceView {
                    id: choice.id.clone(),
                    text: choice.text.clone(),
                    selectable,
                })
            })
            .collect())
    }

    /// Resolve the pending choice block with `choice_id`.
    ///
    /// Effects apply in declaration order. Any failure rejects the whole
    /// choice and leaves the state as it was.
    pub fn resolve_choice(
        &self,
        store: &mut GameStore,
        choice_id: &str,
    ) -> Result<StoryResult, StoryError> {
        store.transact(|live, draft| {
            let (at, scene) = self.active(live)?;
            if live.story.scene_complete {
                return Err(StoryError::NoChoicePending);
            }
            let block = scene
                .blocks
                .get(live.story.block_index)
                .and_then(SceneBlock::as_choice)
                .ok_or(StoryError::NoChoicePending)?;
            let choice = block
                .choice(choice_id)
                .ok_or_else(|| StoryError::InvalidChoice(choice_id.to_string()))?;
            if let Some(condition) = &choice.requires {
                if !condition.evaluate(live) {
                    return Err(StoryError::ChoiceUnavailable(choice_id.to_string()));
                }
            }

            let mut applied = Vec::with_capacity(choice.effects.len());
            for effect in &choice.effects {
                if let Some(done) = self.apply_effect(draft, effect)? {
                    applied.push(done);
                }
            }

            let mut completed = None;
            let mut jumped_to = None;
            match choice.jump_target() {
                Some(target) => {
                    self.finish(draft, &at, scene)?;
                    self.begin(draft, target).map_err(|_| {
                        StoryError::ContentIntegrity(format!(
                            "choice '{}' in {} jumps to missing scene {}",
                            choice.id, at, target
                        ))
                    })?;
                    completed = Some(at.clone());
                    jumped_to = Some(target.clone());
                }
                None => draft.story.block_index += 1,
            }

            tracing::debug!(scene = %at, choice = %choice.id, effects = applied.len(), "choice resolved");

            Ok(StoryResult::ChoiceResolved(ChoiceOutcome {
                choice_id: choice.id.clone(),
                applied,
                completed,
                jumped_to,
                newly_unlocked: self.newly_unlocked(live, draft),
            }))
        })
    }

    /// Exploration areas of the active scene.
    pub fn scene_areas(&self, state: &GameState) -> Result<&'a [ExplorationArea], StoryError> {
        let (_, scene) = self.active(state)?;
        Ok(&scene.areas)
    }

    /// Visit an area of the active scene, setting its discovery flag the
    /// first time.
    pub fn explore_area(
        &self,
        store: &mut GameStore,
        area_id: &str,
    ) -> Result<ExplorationResult, StoryError> {
        store.transact(|live, draft| {
            let (at, scene) = self.active(live)?;
            let area = scene
                .area(area_id)
                .ok_or_else(|| StoryError::AreaNotFound(format!("{}/{}", at, area_id)))?;

            let first_visit = draft
                .story
                .explored_areas
                .insert(scene_area_key(&at, &area.id));
            let discovery = area
                .discovery
                .as_ref()
                .filter(|flag| !live.has_discovered(flag))
                .filter(|flag| draft.story.discoveries.insert((*flag).clone()))
                .cloned();

            Ok(ExplorationResult {
                area: area.clone(),
                first_visit,
                discovery,
                newly_unlocked: self.newly_unlocked(live, draft),
            })
        })
    }

    /// The path with the highest affinity; ties go to the path declared
    /// first. `None` while every declared path is at zero.
    pub fn dominant_path(&self, state: &GameState) -> Option<&'a str> {
        let mut best: Option<(&'a str, i64)> = None;
        let mut any_nonzero = false;
        for path in self.story.paths() {
            let score = state.story.affinity(path);
            any_nonzero |= score != 0;
            if best.map_or(true, |(_, top)| score > top) {
                best = Some((path.as_str(), score));
            }
        }
        if !any_nonzero {
            return None;
        }
        best.map(|(path, _)| path)
    }

    fn active(&self, state: &GameState) -> Result<(SceneRef, &'a Scene), StoryError> {
        let at = state
            .story
            .current_scene()
            .ok_or(StoryError::NoActiveScene)?;
        let scene = self.story.scene_at(&at).ok_or_else(|| {
            StoryError::ContentIntegrity(format!("active scene {} does not exist", at))
        })?;
        Ok((at, scene))
    }

    fn begin(&self, draft: &mut GameState, at: &SceneRef) -> Result<&'a Scene, StoryError> {
        let scene = self
            .story
            .scene_at(at)
            .ok_or_else(|| StoryError::SceneNotFound(at.clone()))?;
        let story = &mut draft.story;
        story.chapter_id = Some(at.chapter.clone());
        story.scene_id = Some(at.scene.clone());
        story.block_index = 0;
        story.scene_complete = false;
        Ok(scene)
    }

    fn finish(&self, draft: &mut GameState, at: &SceneRef, scene: &Scene) -> Result<(), StoryError> {
        let unexplored = scene
            .areas
            .iter()
            .filter(|a| a.required)
            .find(|a| !draft.story.explored_areas.contains(&scene_area_key(at, &a.id)));
        if let Some(area) = unexplored {
            return Err(StoryError::RequiredAreaUnexplored {
                scene: at.clone(),
                area: area.id.clone(),
            });
        }
        draft.story.visited_scenes.insert(scene.id.clone());
        draft.story.block_index = scene.blocks.len();
        draft.story.scene_complete = true;
        Ok(())
    }

    fn apply_effect(
        &self,
        draft: &mut GameState,
        effect: &ChoiceEffect,
    ) -> Result<Option<AppliedEffect>, StoryError> {
        let applied = match effect {
            ChoiceEffect::SetFlag { name, value } => AppliedEffect::FlagSet {
                name: name.clone(),
                value: value.clone(),
                changed: draft.story.flags.set(name, value.clone()),
            },
            ChoiceEffect::ClearFlag(name) => AppliedEffect::FlagCleared {
                name: name.clone(),
                changed: draft.story.flags.clear(name),
            },
            ChoiceEffect::Stat { stat, delta } => {
                let entry = draft.stats.get_mut(stat).ok_or_else(|| {
                    StoryError::ContentIntegrity(format!("unknown stat '{}'", stat))
                })?;
                let applied = entry.apply(*delta);
                AppliedEffect::Stat {
                    stat: stat.clone(),
                    requested: *delta,
                    applied,
                    value: entry.value,
                }
            }
            ChoiceEffect::Path { path, delta } => {
                if !self.story.has_path(path) {
                    return Err(StoryError::ContentIntegrity(format!(
                        "undeclared path '{}'",
                        path
                    )));
                }
                let total = draft.story.path_affinity.entry(path.clone()).or_insert(0);
                *total = total.saturating_add(*delta);
                AppliedEffect::Path {
                    path: path.clone(),
                    delta: *delta,
                    total: *total,
                }
            }
            ChoiceEffect::Relationship { npc, delta } => {
                let value = draft.relationships.entry(npc.clone()).or_insert(0);
                let before = *value;
                *value = before
                    .saturating_add(*delta)
                    .clamp(RELATIONSHIP_MIN, RELATIONSHIP_MAX);
                AppliedEffect::Relationship {
                    npc: npc.clone(),
                    applied: *value - before,
                    value: *value,
                }
            }
            ChoiceEffect::GiveItem { quantity: 0, .. } => return Ok(None),
            ChoiceEffect::GiveItem { item, quantity } => {
                let held = draft.inventory.entry(item.clone()).or_insert(0);
                *held = held.saturating_add(*quantity);
                AppliedEffect::ItemGained {
                    item: item.clone(),
                    quantity: *quantity,
                }
            }
            ChoiceEffect::TakeItem { item, quantity } => {
                let held = draft.inventory.get(item).copied().unwrap_or(0);
                if held < *quantity {
                    return Err(StoryError::EffectRejected(format!(
                        "needs {} {} but holds {}",
                        quantity, item, held
                    )));
                }
                if held == *quantity {
                    draft.inventory.remove(item);
                } else {
                    draft.inventory.insert(item.clone(), held - quantity);
                }
                AppliedEffect::ItemLost {
                    item: item.clone(),
                    quantity: *quantity,
                }
            }
            ChoiceEffect::Jump(_) => return Ok(None),
        };
        Ok(Some(applied))
    }

    fn newly_unlocked(&self, before: &GameState, after: &GameState) -> Vec<String> {
        let Some(world) = self.world else {
            return Vec::new();
        };
        let was = world.unlocked_ids(before);
        world
            .unlocked_ids(after)
            .into_iter()
            .filter(|id| !was.contains(id))
            .collect()
    }
}

fn scene_area_key(at: &SceneRef, area: &str) -> String {
    format!("{}/{}/{}", at.chapter, at.scene, area)
}
