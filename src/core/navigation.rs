/// Navigation engine: travel, exploration and encounter hand-off.
use rand::Rng;
use thiserror::Error;

use crate::core::encounter::resolve_encounter;
use crate::core::error::ErrorKind;
use crate::core::state::{GameState, GameStore};
use crate::core::world::LocationGraph;
use crate::schema::encounter::{CombatOutcome, EncounterDescriptor};
use crate::schema::location::{DangerLevel, ExplorationArea, NavigationLocation};

#[derive(Debug, Error)]
pub enum NavigationError {
    #[error("location not found: {0}")]
    LocationNotFound(String),
    #[error("'{to}' is not reachable from '{from}'")]
    InvalidDestination { from: String, to: String },
    #[error("location is locked: {0}")]
    LocationLocked(String),
    #[error("area '{area}' of '{location}' must be explored first")]
    RequiredAreaUnexplored { location: String, area: String },
    #[error("area not found: {location}/{area}")]
    AreaNotFound { location: String, area: String },
    #[error("encounter '{0}' has not been resolved")]
    EncounterPending(String),
    #[error("no encounter is pending")]
    NoPendingEncounter,
    #[error("cannot rest at '{0}'")]
    RestUnavailable(String),
    #[error("content integrity error: {0}")]
    ContentIntegrity(String),
}

impl NavigationError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::LocationNotFound(_) | Self::AreaNotFound { .. } => ErrorKind::NotFound,
            Self::LocationLocked(_)
            | Self::RequiredAreaUnexplored { .. }
            | Self::RestUnavailable(_) => ErrorKind::PreconditionFailed,
            Self::InvalidDestination { .. }
            | Self::EncounterPending(_)
            | Self::NoPendingEncounter => ErrorKind::InvalidOperation,
            Self::ContentIntegrity(_) => ErrorKind::ContentIntegrity,
        }
    }
}

/// Outcome of a successful `travel_to`.
#[derive(Debug, Clone, PartialEq)]
pub struct NavigationResult {
    pub location: NavigationLocation,
    pub first_visit: bool,
    pub encounter: Option<EncounterDescriptor>,
    /// Locations whose unlock condition started holding because of this move.
    pub newly_unlocked: Vec<String>,
}

/// One entry of the travel menu. Locked entries are listed but not traversable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TravelOption {
    pub id: String,
    pub name: String,
    pub danger: DangerLevel,
    pub locked: bool,
    pub visited: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExplorationResult {
    pub area: ExplorationArea,
    pub first_visit: bool,
    /// Discovery flag newly set by this visit.
    pub discovery: Option<String>,
    pub newly_unlocked: Vec<String>,
}

/// State changes made when combat hands control back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncounterAftermath {
    pub encounter_id: String,
    pub outcome: CombatOutcome,
    /// Where the player stands afterwards.
    pub location: String,
    pub cleared: bool,
    pub retreated_to: Option<String>,
}

/// Drives movement over a [`LocationGraph`]. Mutates only navigation state;
/// story state is read for unlock conditions.
#[derive(Debug, Clone, Copy)]
pub struct NavigationEngine<'a> {
    world: &'a LocationGraph,
}

impl<'a> NavigationEngine<'a> {
    pub fn new(world: &'a LocationGraph) -> Self {
        Self { world }
    }

    pub fn current_location(
        &self,
        state: &GameState,
    ) -> Result<&'a NavigationLocation, NavigationError> {
        let id = &state.navigation.current_location;
        self.world.location(id).ok_or_else(|| {
            NavigationError::ContentIntegrity(format!("current location '{}' does not exist", id))
        })
    }

    /// Move to a connected, unlocked location and roll for an encounter there.
    pub fn travel_to<R: Rng + ?Sized>(
        &self,
        store: &mut GameStore,
        destination: &str,
        rng: &mut R,
    ) -> Result<NavigationResult, NavigationError> {
        store.transact(|live, draft| {
            if let Some(pending) = &live.navigation.pending_encounter {
                return Err(NavigationError::EncounterPending(pending.clone()));
            }

            let from = self.current_location(live)?;
            if !from.is_connected_to(destination) {
                return Err(NavigationError::InvalidDestination {
                    from: from.id.clone(),
                    to: destination.to_string(),
                });
            }
            let target = self.world.location(destination).ok_or_else(|| {
                NavigationError::ContentIntegrity(format!(
                    "'{}' connects to missing location '{}'",
                    from.id, destination
                ))
            })?;

            if let Some(area) = self.unexplored_required_area(live, from) {
                return Err(NavigationError::RequiredAreaUnexplored {
                    location: from.id.clone(),
                    area: area.id.clone(),
                });
            }
            if !LocationGraph::is_unlocked(target, live) {
                return Err(NavigationError::LocationLocked(target.id.clone()));
            }

            let nav = &mut draft.navigation;
            nav.previous_location = Some(from.id.clone());
            nav.current_location = target.id.clone();
            let first_visit = nav.visited_locations.insert(target.id.clone());

            let mut encounter = None;
            if !nav.cleared_locations.contains(&target.id) {
                if let Some(id) = resolve_encounter(&target.encounters, target.encounter_chance, rng)
                {
                    let found = self.world.encounter(id).ok_or_else(|| {
                        NavigationError::ContentIntegrity(format!(
                            "'{}' references missing encounter '{}'",
                            target.id, id
                        ))
                    })?;
                    nav.pending_encounter = Some(found.id.clone());
                    encounter = Some(EncounterDescriptor::new(found, &target.id));
                }
            }

            tracing::debug!(
                from = %from.id,
                to = %target.id,
                encounter = ?encounter.as_ref().map(|e| &e.encounter_id),
                "travel"
            );

            Ok(NavigationResult {
                location: target.clone(),
                first_visit,
                encounter,
                newly_unlocked: self.newly_unlocked(live, draft),
            })
        })
    }

    /// Every connected location with its lock status, in authored order.
    pub fn travel_options(&self, state: &GameState) -> Vec<TravelOption> {
        self.world
            .connected(&state.navigation.current_location)
            .into_iter()
            .map(|location| TravelOption {
                id: location.id.clone(),
                name: location.name.clone(),
                danger: location.danger,
                locked: !LocationGraph::is_unlocked(location, state),
                visited: state.navigation.visited_locations.contains(&location.id),
            })
            .collect()
    }

    pub fn exploration_areas(
        &self,
        location_id: &str,
    ) -> Result<&'a [ExplorationArea], NavigationError> {
        self.world
            .exploration_areas(location_id)
            .ok_or_else(|| NavigationError::LocationNotFound(location_id.to_string()))
    }

    /// Visit an area of the current location.
    pub fn explore(
        &self,
        store: &mut GameStore,
        area_id: &str,
    ) -> Result<ExplorationResult, NavigationError> {
        store.transact(|live, draft| {
            let location = self.current_location(live)?;
            let area = location
                .area(area_id)
                .ok_or_else(|| NavigationError::AreaNotFound {
                    location: location.id.clone(),
                    area: area_id.to_string(),
                })?;

            let nav = &mut draft.navigation;
            let first_visit = nav
                .explored_areas
                .insert(location_area_key(&location.id, &area.id));
            let discovery = area
                .discovery
                .as_ref()
                .filter(|flag| !live.has_discovered(flag))
                .filter(|flag| nav.discoveries.insert((*flag).clone()))
                .cloned();

            tracing::trace!(location = %location.id, area = %area.id, first_visit, "explore");

            Ok(ExplorationResult {
                area: area.clone(),
                first_visit,
                discovery,
                newly_unlocked: self.newly_unlocked(live, draft),
            })
        })
    }

    /// Apply the combat result for the pending encounter.
    ///
    /// Victory clears the location until the next rest, fleeing steps back to
    /// the previous location, defeat leaves navigation where it is.
    pub fn conclude_encounter(
        &self,
        store: &mut GameStore,
        outcome: CombatOutcome,
    ) -> Result<EncounterAftermath, NavigationError> {
        store.transact(|live, draft| {
            let encounter_id = live
                .navigation
                .pending_encounter
                .clone()
                .ok_or(NavigationError::NoPendingEncounter)?;

            let nav = &mut draft.navigation;
            nav.pending_encounter = None;
            let mut cleared = false;
            let mut retreated_to = None;
            match outcome {
                CombatOutcome::Victory => {
                    cleared = nav.cleared_locations.insert(nav.current_location.clone());
                }
                CombatOutcome::Fled => {
                    if let Some(previous) = nav.previous_location.take() {
                        let here = std::mem::replace(&mut nav.current_location, previous.clone());
                        nav.previous_location = Some(here);
                        retreated_to = Some(previous);
                    }
                }
                CombatOutcome::Defeat => {}
            }

            tracing::debug!(encounter = %encounter_id, ?outcome, "encounter concluded");

            Ok(EncounterAftermath {
                encounter_id,
                outcome,
                location: nav.current_location.clone(),
                cleared,
                retreated_to,
            })
        })
    }

    /// Rest at the current location: cleared locations repopulate.
    pub fn rest(&self, store: &mut GameStore) -> Result<(), NavigationError> {
        store.transact(|live, draft| {
            if let Some(pending) = &live.navigation.pending_encounter {
                return Err(NavigationError::EncounterPending(pending.clone()));
            }
            let location = self.current_location(live)?;
            if !location.features.can_rest {
                return Err(NavigationError::RestUnavailable(location.id.clone()));
            }
            draft.navigation.cleared_locations.clear();
            Ok(())
        })
    }

    fn unexplored_required_area(
        &self,
        state: &GameState,
        location: &'a NavigationLocation,
    ) -> Option<&'a ExplorationArea> {
        location.required_areas().find(|area| {
            !state
                .navigation
                .explored_areas
                .contains(&location_area_key(&location.id, &area.id))
        })
    }

    fn newly_unlocked(&self, before: &GameState, after: &GameState) -> Vec<String> {
        let was = self.world.unlocked_ids(before);
        self.world
            .unlocked_ids(after)
            .into_iter()
            .filter(|id| !was.contains(id))
            .collect()
    }
}

fn location_area_key(location: &str, area: &str) -> String {
    format!("{}/{}", location, area)
}
