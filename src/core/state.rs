/// Shared game state: the single mutable source of truth and its observers.
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::schema::condition::ConditionContext;
use crate::schema::flag::{FlagValue, GameFlags};
use crate::schema::story::SceneRef;

pub const RELATIONSHIP_MIN: i64 = -100;
pub const RELATIONSHIP_MAX: i64 = 100;

/// Story progress.
///
/// `scene_complete` marks the terminal per-scene state; `visited_scenes`
/// only ever holds scenes that reached it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoryState {
    pub chapter_id: Option<String>,
    pub scene_id: Option<String>,
    /// Index of the next block to deliver.
    pub block_index: usize,
    pub scene_complete: bool,
    pub visited_scenes: BTreeSet<String>,
    pub path_affinity: BTreeMap<String, i64>,
    pub flags: GameFlags,
    /// Scene exploration areas seen, keyed `chapter/scene/area`.
    pub explored_areas: BTreeSet<String>,
    /// Discovery flags set by exploring scene areas.
    #[serde(default)]
    pub discoveries: BTreeSet<String>,
}

impl StoryState {
    /// Fresh story state with every declared path at zero.
    pub fn new(paths: &[String]) -> Self {
        Self {
            path_affinity: paths.iter().map(|p| (p.clone(), 0)).collect(),
            ..Self::default()
        }
    }

    pub fn current_scene(&self) -> Option<SceneRef> {
        match (&self.chapter_id, &self.scene_id) {
            (Some(chapter), Some(scene)) => Some(SceneRef::new(chapter, scene)),
            _ => None,
        }
    }

    pub fn affinity(&self, path: &str) -> i64 {
        self.path_affinity.get(path).copied().unwrap_or(0)
    }
}

/// Where the player is on the location graph.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NavigationState {
    pub current_location: String,
    pub previous_location: Option<String>,
    pub visited_locations: BTreeSet<String>,
    /// Discovery flags set by exploring location areas.
    pub discoveries: BTreeSet<String>,
    /// Location exploration areas seen, keyed `location/area`.
    pub explored_areas: BTreeSet<String>,
    /// Locations whose encounters were beaten; no rolls there until a rest.
    pub cleared_locations: BTreeSet<String>,
    /// Encounter handed to combat and not yet concluded.
    pub pending_encounter: Option<String>,
}

impl NavigationState {
    pub fn new(start: &str) -> Self {
        Self {
            current_location: start.to_string(),
            visited_locations: BTreeSet::from([start.to_string()]),
            ..Self::default()
        }
    }
}

/// A bounded numeric stat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stat {
    pub value: i64,
    pub min: i64,
    pub max: i64,
}

impl Stat {
    pub fn new(value: i64, min: i64, max: i64) -> Self {
        Self {
            value: value.clamp(min, max),
            min,
            max,
        }
    }

    /// Add `delta`, clamping to `[min, max]`. Returns the change actually applied.
    pub fn apply(&mut self, delta: i64) -> i64 {
        let before = self.value;
        self.value = before.saturating_add(delta).clamp(self.min, self.max);
        self.value - before
    }

    pub fn is_within_range(&self) -> bool {
        self.min <= self.value && self.value <= self.max
    }
}

/// Player stats by name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameStats(pub BTreeMap<String, Stat>);

impl GameStats {
    pub const HP: &'static str = "hp";

    pub fn get(&self, name: &str) -> Option<&Stat> {
        self.0.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Stat> {
        self.0.get_mut(name)
    }

    pub fn value(&self, name: &str) -> Option<i64> {
        self.0.get(name).map(|s| s.value)
    }

    /// Restore HP to its maximum. No-op if there is no HP stat.
    pub fn heal_full(&mut self) {
        if let Some(hp) = self.0.get_mut(Self::HP) {
            hp.value = hp.max;
        }
    }
}

impl Default for GameStats {
    fn default() -> Self {
        Self(BTreeMap::from([
            (Self::HP.to_string(), Stat::new(100, 0, 100)),
            ("level".to_string(), Stat::new(1, 1, 99)),
            ("xp".to_string(), Stat::new(0, 0, i64::MAX)),
            ("gold".to_string(), Stat::new(0, 0, 999_999)),
            ("strength".to_string(), Stat::new(5, 0, 20)),
            ("agility".to_string(), Stat::new(5, 0, 20)),
            ("wits".to_string(), Stat::new(5, 0, 20)),
        ]))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TextSpeed {
    Slow,
    #[default]
    Normal,
    Fast,
    Instant,
}

/// Player preferences. The only part of the state set directly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub text_speed: TextSpeed,
    #[serde(default)]
    pub auto_save: bool,
    #[serde(default = "default_true")]
    pub show_effects: bool,
}

fn default_true() -> bool {
    true
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            text_speed: TextSpeed::Normal,
            auto_save: false,
            show_effects: true,
        }
    }
}

/// The whole mutable aggregate both engines read and write.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameState {
    pub story: StoryState,
    pub navigation: NavigationState,
    pub stats: GameStats,
    pub inventory: BTreeMap<String, u32>,
    pub relationships: BTreeMap<String, i64>,
    pub settings: Settings,
}

impl GameState {
    pub fn relationship(&self, npc: &str) -> i64 {
        self.relationships.get(npc).copied().unwrap_or(0)
    }

    /// Whether a location or scene area has set this discovery flag.
    pub fn has_discovered(&self, flag: &str) -> bool {
        self.navigation.discoveries.contains(flag) || self.story.discoveries.contains(flag)
    }
}

impl ConditionContext for GameState {
    fn flag(&self, name: &str) -> Option<FlagValue> {
        if let Some(value) = self.story.flags.get(name) {
            return Some(value.clone());
        }
        self.has_discovered(name).then_some(FlagValue::Bool(true))
    }

    fn scene_completed(&self, scene: &str) -> bool {
        self.story.visited_scenes.contains(scene)
    }

    fn location_visited(&self, location: &str) -> bool {
        self.navigation.visited_locations.contains(location)
    }

    fn stat(&self, stat: &str) -> Option<i64> {
        self.stats.value(stat)
    }

    fn item_count(&self, item: &str) -> u32 {
        self.inventory.get(item).copied().unwrap_or(0)
    }
}

/// Handle returned by [`GameStore::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Subscription(u64);

type Listener = Box<dyn FnMut(&GameState)>;

/// Observable owner of the [`GameState`].
///
/// Mutation happens through engine operations that run against a draft copy;
/// the draft replaces the live state only if the operation succeeds, so a
/// failed operation leaves the state untouched. Listeners run synchronously
/// after each committed change, before the operation returns.
pub struct GameStore {
    state: GameState,
    listeners: Vec<(Subscription, Listener)>,
    next_subscription: u64,
}

impl GameStore {
    pub fn new(state: GameState) -> Self {
        Self {
            state,
            listeners: Vec::new(),
            next_subscription: 0,
        }
    }

    /// Read-only view of the current state.
    pub fn state(&self) -> &GameState {
        &self.state
    }

    /// Owned copy of the current state.
    pub fn snapshot(&self) -> GameState {
        self.state.clone()
    }

    pub fn subscribe<F>(&mut self, listener: F) -> Subscription
    where
        F: FnMut(&GameState) + 'static,
    {
        let id = Subscription(self.next_subscription);
        self.next_subscription += 1;
        self.listeners.push((id, Box::new(listener)));
        id
    }

    /// Remove a listener. Returns false if it was already gone.
    pub fn unsubscribe(&mut self, subscription: Subscription) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(id, _)| *id != subscription);
        self.listeners.len() != before
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    pub fn set_settings(&mut self, settings: Settings) {
        if self.state.settings != settings {
            self.state.settings = settings;
            self.notify();
        }
    }

    /// Replace the whole state (new game, restore).
    pub(crate) fn replace(&mut self, state: GameState) {
        self.state = state;
        self.notify();
    }

    /// Run `op` against a draft of the state and commit it on success.
    pub(crate) fn transact<T, E, F>(&mut self, op: F) -> Result<T, E>
    where
        F: FnOnce(&GameState, &mut GameState) -> Result<T, E>,
    {
        let mut draft = self.state.clone();
        let out = op(&self.state, &mut draft)?;
        if draft != self.state {
            self.state = draft;
            self.notify();
        }
        Ok(out)
    }

    fn notify(&mut self) {
        let state = &self.state;
        for (_, listener) in self.listeners.iter_mut() {
            listener(state);
        }
    }
}

impl fmt::Debug for GameStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GameStore")
            .field("state", &self.state)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn stat_clamps_both_ways() {
        let mut hp = Stat::new(30, 0, 100);
        assert_eq!(hp.apply(-50), -30);
        assert_eq!(hp.value, 0);
        assert_eq!(hp.apply(500), 100);
        assert_eq!(hp.value, 100);
        assert!(hp.is_within_range());
    }

    #[test]
    fn stat_new_clamps_initial_value() {
        assert_eq!(Stat::new(150, 0, 100).value, 100);
    }

    #[test]
    fn discovery_flags_read_as_true() {
        let mut state = GameState::default();
        state.navigation.discoveries.insert("found_stash".into());
        assert_eq!(state.flag("found_stash"), Some(FlagValue::Bool(true)));
        state.story.flags.set("found_stash", FlagValue::Int(2));
        assert_eq!(state.flag("found_stash"), Some(FlagValue::Int(2)));
        assert_eq!(state.flag("nothing"), None);

        state.story.discoveries.insert("saw_scar".into());
        assert_eq!(state.flag("saw_scar"), Some(FlagValue::Bool(true)));
        assert!(state.has_discovered("saw_scar"));
    }

    #[test]
    fn story_state_zeroes_paths() {
        let story = StoryState::new(&["honor".to_string(), "cunning".to_string()]);
        assert_eq!(story.affinity("honor"), 0);
        assert_eq!(story.path_affinity.len(), 2);
        assert!(story.current_scene().is_none());
    }

    #[test]
    fn listeners_see_committed_changes() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let mut store = GameStore::new(GameState::default());
        let sink = Rc::clone(&seen);
        store.subscribe(move |s| sink.borrow_mut().push(s.navigation.current_location.clone()));

        store
            .transact(|_, draft| {
                draft.navigation.current_location = "docks".into();
                Ok::<_, ()>(())
            })
            .unwrap();
        assert_eq!(*seen.borrow(), vec!["docks".to_string()]);
    }

    #[test]
    fn failed_transaction_discards_draft() {
        let calls = Rc::new(RefCell::new(0));
        let mut store = GameStore::new(GameState::default());
        let counter = Rc::clone(&calls);
        store.subscribe(move |_| *counter.borrow_mut() += 1);

        let before = store.snapshot();
        let result: Result<(), &str> = store.transact(|_, draft| {
            draft.inventory.insert("coin".into(), 3);
            Err("nope")
        });
        assert!(result.is_err());
        assert_eq!(store.state(), &before);
        assert_eq!(*calls.borrow(), 0);
    }

    #[test]
    fn unsubscribe_stops_notifications() {
        let calls = Rc::new(RefCell::new(0));
        let mut store = GameStore::new(GameState::default());
        let counter = Rc::clone(&calls);
        let sub = store.subscribe(move |_| *counter.borrow_mut() += 1);

        store.set_settings(Settings {
            text_speed: TextSpeed::Fast,
            ..Settings::default()
        });
        assert_eq!(*calls.borrow(), 1);

        assert!(store.unsubscribe(sub));
        assert!(!store.unsubscribe(sub));
        store.set_settings(Settings::default());
        assert_eq!(*calls.borrow(), 1);
        assert_eq!(store.listener_count(), 0);
    }
}
