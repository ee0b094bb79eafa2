/// Game session: content, state and engines wired together.
///
/// Owns the shared state store and the random source, builds engines on
/// demand over the read-only content, and routes results between them
/// (an encounter defeat jumps the story, a story choice may unlock travel).
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::core::content::StoryContent;
use crate::core::error::{ContentError, ErrorKind};
use crate::core::navigation::{
    EncounterAftermath, ExplorationResult, NavigationEngine, NavigationError, NavigationResult,
    TravelOption,
};
use crate::core::save::{SaveError, SaveSnapshot};
use crate::core::state::{
    GameState, GameStats, GameStore, NavigationState, Settings, Stat, StoryState, Subscription,
};
use crate::core::story::{ChoiceView, StoryEngine, StoryError, StoryPhase, StoryResult};
use crate::core::world::LocationGraph;
use crate::schema::encounter::{CombatOutcome, EncounterDescriptor};
use crate::schema::location::ExplorationArea;
use crate::schema::story::SceneRef;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("content error: {0}")]
    Content(#[from] ContentError),
    #[error("navigation error: {0}")]
    Navigation(#[from] NavigationError),
    #[error("story error: {0}")]
    Story(#[from] StoryError),
    #[error("save error: {0}")]
    Save(#[from] SaveError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("RON error: {0}")]
    Ron(#[from] ron::error::SpannedError),
    #[error("configuration error: {0}")]
    Config(String),
}

impl SessionError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Content(e) => e.kind(),
            Self::Navigation(e) => e.kind(),
            Self::Story(e) => e.kind(),
            Self::Save(e) => e.kind(),
            Self::Io(_) | Self::Ron(_) | Self::Config(_) => ErrorKind::ContentIntegrity,
        }
    }
}

/// A stat's starting value and range as written in `config.ron`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatConfig {
    pub value: i64,
    pub min: i64,
    pub max: i64,
}

/// New-game configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionConfig {
    pub start_location: String,
    #[serde(default)]
    pub opening_scene: Option<SceneRef>,
    /// Scene started when the player loses a fight.
    #[serde(default)]
    pub defeat_scene: Option<SceneRef>,
    /// Starting stats; empty means the built-in defaults.
    #[serde(default)]
    pub stats: BTreeMap<String, StatConfig>,
    #[serde(default)]
    pub settings: Settings,
}

impl SessionConfig {
    pub fn new(start_location: &str) -> Self {
        Self {
            start_location: start_location.to_string(),
            opening_scene: None,
            defeat_scene: None,
            stats: BTreeMap::new(),
            settings: Settings::default(),
        }
    }

    pub fn load_from_ron(path: &Path) -> Result<SessionConfig, SessionError> {
        let contents = std::fs::read_to_string(path)?;
        Ok(ron::from_str(&contents)?)
    }

    fn initial_stats(&self) -> GameStats {
        if self.stats.is_empty() {
            return GameStats::default();
        }
        GameStats(
            self.stats
                .iter()
                .map(|(name, s)| (name.clone(), Stat::new(s.value, s.min, s.max)))
                .collect(),
        )
    }
}

/// Result of handing a finished combat back to the session.
#[derive(Debug, Clone, PartialEq)]
pub struct EncounterReport {
    pub aftermath: EncounterAftermath,
    /// Set when defeat started the configured defeat scene.
    pub story: Option<StoryResult>,
}

/// One running game. Built via `GameSession::builder()`.
pub struct GameSession {
    world: LocationGraph,
    story: StoryContent,
    config: SessionConfig,
    store: GameStore,
    rng: StdRng,
    seed: u64,
}

/// Builder for constructing a `GameSession`.
pub struct GameSessionBuilder {
    content_dir: Option<PathBuf>,
    seed: u64,
    /// Directly provided content (for tests without files).
    world: Option<LocationGraph>,
    story: Option<StoryContent>,
    config: Option<SessionConfig>,
}

impl GameSession {
    pub fn builder() -> GameSessionBuilder {
        GameSessionBuilder {
            content_dir: None,
            seed: 0,
            world: None,
            story: None,
            config: None,
        }
    }

    fn navigation(&self) -> NavigationEngine<'_> {
        NavigationEngine::new(&self.world)
    }

    fn story_engine(&self) -> StoryEngine<'_> {
        StoryEngine::new(&self.story).with_world(&self.world)
    }

    pub fn world(&self) -> &LocationGraph {
        &self.world
    }

    pub fn story(&self) -> &StoryContent {
        &self.story
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Read-only view of the current state.
    pub fn state(&self) -> &GameState {
        self.store.state()
    }

    pub fn subscribe<F>(&mut self, listener: F) -> Subscription
    where
        F: FnMut(&GameState) + 'static,
    {
        self.store.subscribe(listener)
    }

    pub fn unsubscribe(&mut self, subscription: Subscription) -> bool {
        self.store.unsubscribe(subscription)
    }

    pub fn set_settings(&mut self, settings: Settings) {
        self.store.set_settings(settings);
    }

    /// Reset to a fresh game and start the opening scene, if any.
    pub fn new_game(&mut self) -> Result<Option<StoryResult>, SessionError> {
        let state = initial_state(&self.config, &self.story);
        self.store.replace(state);
        tracing::debug!(start = %self.config.start_location, "new game");
        match self.config.opening_scene.clone() {
            Some(opening) => Ok(Some(self.start_scene(&opening.chapter, &opening.scene)?)),
            None => Ok(None),
        }
    }

    pub fn travel_to(&mut self, destination: &str) -> Result<NavigationResult, SessionError> {
        let engine = NavigationEngine::new(&self.world);
        Ok(engine.travel_to(&mut self.store, destination, &mut self.rng)?)
    }

    pub fn travel_options(&self) -> Vec<TravelOption> {
        self.navigation().travel_options(self.store.state())
    }

    pub fn exploration_areas(&self, location_id: &str) -> Result<&[ExplorationArea], SessionError> {
        Ok(self.navigation().exploration_areas(location_id)?)
    }

    pub fn explore(&mut self, area_id: &str) -> Result<ExplorationResult, SessionError> {
        let engine = NavigationEngine::new(&self.world);
        Ok(engine.explore(&mut self.store, area_id)?)
    }

    /// Rest where the location allows it: cleared locations repopulate,
    /// then HP refills.
    pub fn rest(&mut self) -> Result<(), SessionError> {
        let engine = NavigationEngine::new(&self.world);
        engine.rest(&mut self.store)?;
        self.store.transact(|_, draft| {
            draft.stats.heal_full();
            Ok::<_, SessionError>(())
        })
    }

    /// The encounter awaiting combat, if any.
    pub fn pending_encounter(&self) -> Option<EncounterDescriptor> {
        let nav = &self.store.state().navigation;
        let id = nav.pending_encounter.as_ref()?;
        let encounter = self.world.encounter(id)?;
        Some(EncounterDescriptor::new(encounter, &nav.current_location))
    }

    /// Hand a combat result back. Defeat starts the configured defeat scene.
    pub fn conclude_encounter(
        &mut self,
        outcome: CombatOutcome,
    ) -> Result<EncounterReport, SessionError> {
        let engine = NavigationEngine::new(&self.world);
        let aftermath = engine.conclude_encounter(&mut self.store, outcome)?;
        let story = match (outcome, self.config.defeat_scene.clone()) {
            (CombatOutcome::Defeat, Some(scene)) => {
                Some(self.start_scene(&scene.chapter, &scene.scene)?)
            }
            _ => None,
        };
        Ok(EncounterReport { aftermath, story })
    }

    pub fn start_scene(&mut self, chapter: &str, scene: &str) -> Result<StoryResult, SessionError> {
        let engine = StoryEngine::new(&self.story).with_world(&self.world);
        Ok(engine.start_scene(&mut self.store, chapter, scene)?)
    }

    pub fn advance(&mut self) -> Result<StoryResult, SessionError> {
        let engine = StoryEngine::new(&self.story).with_world(&self.world);
        Ok(engine.advance(&mut self.store)?)
    }

    pub fn resolve_choice(&mut self, choice_id: &str) -> Result<StoryResult, SessionError> {
        let engine = StoryEngine::new(&self.story).with_world(&self.world);
        Ok(engine.resolve_choice(&mut self.store, choice_id)?)
    }

    pub fn explore_scene_area(&mut self, area_id: &str) -> Result<ExplorationResult, SessionError> {
        let engine = StoryEngine::new(&self.story).with_world(&self.world);
        Ok(engine.explore_area(&mut self.store, area_id)?)
    }

    pub fn available_choices(&self) -> Result<Vec<ChoiceView>, SessionError> {
        Ok(self.story_engine().available_choices(self.store.state())?)
    }

    pub fn story_phase(&self) -> StoryPhase {
        self.story_engine().phase(self.store.state())
    }

    pub fn dominant_path(&self) -> Option<&str> {
        self.story_engine().dominant_path(self.store.state())
    }

    pub fn snapshot(&self) -> SaveSnapshot {
        SaveSnapshot::new(self.store.snapshot())
    }

    /// Replace the state with a validated snapshot. On failure nothing changes.
    pub fn restore(&mut self, snapshot: SaveSnapshot) -> Result<(), SessionError> {
        snapshot.validate(&self.world, &self.story)?;
        self.store.replace(snapshot.state);
        tracing::debug!("state restored from snapshot");
        Ok(())
    }
}

fn initial_state(config: &SessionConfig, story: &StoryContent) -> GameState {
    GameState {
        story: StoryState::new(story.paths()),
        navigation: NavigationState::new(&config.start_location),
        stats: config.initial_stats(),
        settings: config.settings.clone(),
        ..GameState::default()
    }
}

impl GameSessionBuilder {
    /// Directory holding `world.ron`, `story.ron` and optionally `config.ron`.
    pub fn content_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.content_dir = Some(path.into());
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Provide the location graph directly (for testing without files).
    pub fn with_world(mut self, world: LocationGraph) -> Self {
        self.world = Some(world);
        self
    }

    /// Provide story content directly (for testing without files).
    pub fn with_story(mut self, story: StoryContent) -> Self {
        self.story = Some(story);
        self
    }

    pub fn with_config(mut self, config: SessionConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Load anything not provided directly, cross-check content, and start a
    /// new game.
    pub fn build(self) -> Result<GameSession, SessionError> {
        let dir = self.content_dir.as_deref();
        let world = match (self.world, dir) {
            (Some(world), _) => world,
            (None, Some(dir)) => LocationGraph::load_from_ron(&dir.join("world.ron"))?,
            (None, None) => {
                return Err(SessionError::Config("no location graph provided".to_string()))
            }
        };
        let story = match (self.story, dir) {
            (Some(story), _) => story,
            (None, Some(dir)) => StoryContent::load_from_ron(&dir.join("story.ron"))?,
            (None, None) => StoryContent::default(),
        };
        let config = match (self.config, dir) {
            (Some(config), _) => config,
            (None, Some(dir)) if dir.join("config.ron").exists() => {
                SessionConfig::load_from_ron(&dir.join("config.ron"))?
            }
            _ => {
                let first = world.locations().next().ok_or_else(|| {
                    SessionError::Config("location graph is empty".to_string())
                })?;
                SessionConfig::new(&first.id)
            }
        };

        cross_check(&world, &story, &config)?;

        let mut session = GameSession {
            store: GameStore::new(initial_state(&config, &story)),
            world,
            story,
            config,
            rng: StdRng::seed_from_u64(self.seed),
            seed: self.seed,
        };
        session.new_game()?;
        Ok(session)
    }
}

/// References between the two content tables and the config.
fn cross_check(
    world: &LocationGraph,
    story: &StoryContent,
    config: &SessionConfig,
) -> Result<(), ContentError> {
    if world.location(&config.start_location).is_none() {
        return Err(ContentError::Integrity(format!(
            "start location '{}' does not exist",
            config.start_location
        )));
    }
    for scene in config.opening_scene.iter().chain(config.defeat_scene.iter()) {
        if story.scene_at(scene).is_none() {
            return Err(ContentError::Integrity(format!(
                "configured scene {} does not exist",
                scene
            )));
        }
    }
    for (location, scene) in world.referenced_scenes() {
        if !story.has_scene_id(&scene) {
            return Err(ContentError::Integrity(format!(
                "unlock condition of '{}' names unknown scene '{}'",
                location, scene
            )));
        }
    }
    for (scene, flag) in story.cleared_flags() {
        let found = world
            .locations()
            .flat_map(|l| &l.areas)
            .any(|a| a.discovery.as_deref() == Some(flag));
        if found {
            return Err(ContentError::Integrity(format!(
                "scene {} clears discovery flag '{}'",
                scene, flag
            )));
        }
    }
    for (name, stat) in &config.stats {
        if stat.min > stat.max {
            return Err(ContentError::Integrity(format!(
                "stat '{}' has min above max",
                name
            )));
        }
    }
    Ok(())
}
