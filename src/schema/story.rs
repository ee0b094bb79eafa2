use serde::{Deserialize, Serialize};
use std::fmt;

use super::condition::UnlockCondition;
use super::flag::FlagValue;
use super::location::ExplorationArea;

/// A fully-qualified pointer to a scene.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SceneRef {
    pub chapter: String,
    pub scene: String,
}

impl SceneRef {
    pub fn new(chapter: &str, scene: &str) -> Self {
        Self {
            chapter: chapter.to_string(),
            scene: scene.to_string(),
        }
    }
}

impl fmt::Display for SceneRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.chapter, self.scene)
    }
}

/// One unit of scene content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SceneBlock {
    Narration(String),
    Dialogue { speaker: String, text: String },
    Choice(ChoiceBlock),
}

impl SceneBlock {
    pub fn is_choice(&self) -> bool {
        matches!(self, Self::Choice(_))
    }

    pub fn as_choice(&self) -> Option<&ChoiceBlock> {
        match self {
            Self::Choice(block) => Some(block),
            _ => None,
        }
    }
}

/// A decision point. The scene does not move past it until one choice resolves.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChoiceBlock {
    #[serde(default)]
    pub prompt: String,
    pub choices: Vec<Choice>,
}

impl ChoiceBlock {
    pub fn choice(&self, id: &str) -> Option<&Choice> {
        self.choices.iter().find(|c| c.id == id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Choice {
    pub id: String,
    pub text: String,
    #[serde(default)]
    pub requires: Option<UnlockCondition>,
    /// Omit from choice listings while `requires` is false.
    #[serde(default)]
    pub hidden_when_locked: bool,
    #[serde(default)]
    pub effects: Vec<ChoiceEffect>,
}

impl Choice {
    /// The scene-jump target, if any. Content validation allows at most one.
    pub fn jump_target(&self) -> Option<&SceneRef> {
        self.effects.iter().find_map(|e| match e {
            ChoiceEffect::Jump(target) => Some(target),
            _ => None,
        })
    }
}

/// A state change carried by a choice, applied in declaration order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ChoiceEffect {
    SetFlag { name: String, value: FlagValue },
    ClearFlag(String),
    /// Additive, clamped to the stat's declared range.
    Stat { stat: String, delta: i64 },
    /// Additive path-affinity shift, never clamped.
    Path { path: String, delta: i64 },
    /// Additive, clamped to the relationship range.
    Relationship { npc: String, delta: i64 },
    GiveItem { item: String, quantity: u32 },
    TakeItem { item: String, quantity: u32 },
    Jump(SceneRef),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scene {
    pub id: String,
    #[serde(default)]
    pub title: String,
    pub blocks: Vec<SceneBlock>,
    #[serde(default)]
    pub areas: Vec<ExplorationArea>,
    /// Explicit follow-up; defaults to the next scene in the chapter.
    #[serde(default)]
    pub next: Option<SceneRef>,
}

impl Scene {
    pub fn area(&self, id: &str) -> Option<&ExplorationArea> {
        self.areas.iter().find(|a| a.id == id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chapter {
    pub id: String,
    #[serde(default)]
    pub title: String,
    pub scenes: Vec<Scene>,
}

impl Chapter {
    pub fn scene(&self, id: &str) -> Option<&Scene> {
        self.scenes.iter().find(|s| s.id == id)
    }
}
