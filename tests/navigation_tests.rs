/// Navigation integration tests: travel, locks and encounters over the shipped content.

use narrative_rpg::core::navigation::{NavigationError, NavigationResult};
use narrative_rpg::core::world::LocationGraph;
use narrative_rpg::schema::encounter::CombatOutcome;
use narrative_rpg::{ErrorKind, GameSession, SessionError};
use std::path::Path;

fn session(seed: u64) -> GameSession {
    GameSession::builder()
        .content_dir("content")
        .seed(seed)
        .build()
        .unwrap()
}

/// Travel and win any fight that breaks out on arrival.
fn arrive(session: &mut GameSession, destination: &str) -> NavigationResult {
    let result = session.travel_to(destination).unwrap();
    if result.encounter.is_some() {
        session.conclude_encounter(CombatOutcome::Victory).unwrap();
    }
    result
}

/// Play chapter one up to the end of the awakening scene.
fn finish_awakening(session: &mut GameSession) {
    session.advance().unwrap();
    session.advance().unwrap();
    session.resolve_choice("stand").unwrap();
    session.advance().unwrap();
    session.start_scene("1", "1-2-awakening").unwrap();
    session.advance().unwrap();
    session.advance().unwrap();
    session.resolve_choice("thank").unwrap();
    session.explore_scene_area("mirror").unwrap();
    session.advance().unwrap();
}

#[test]
fn shipped_world_loads() {
    let world = LocationGraph::load_from_ron(Path::new("content/world.ron")).unwrap();
    assert_eq!(world.len(), 6);

    let streets = world.location("lower-streets").unwrap();
    assert!((streets.encounter_chance - 0.15).abs() < f64::EPSILON);

    let gang = world.location("gang-territory").unwrap();
    assert_eq!(
        gang.encounters,
        vec!["street-punk", "alley-brawler", "scarred-enforcer"]
    );
    assert!((gang.encounter_chance - 0.35).abs() < f64::EPSILON);
}

#[test]
fn gang_territory_locked_until_awakening_complete() {
    let mut session = session(1);
    arrive(&mut session, "lower-streets");
    assert_eq!(session.state().navigation.current_location, "lower-streets");

    let before = session.state().clone();
    let err = session.travel_to("gang-territory").unwrap_err();
    assert!(matches!(
        err,
        SessionError::Navigation(NavigationError::LocationLocked(ref id)) if id == "gang-territory"
    ));
    assert_eq!(err.kind(), ErrorKind::PreconditionFailed);
    assert_eq!(session.state(), &before);

    finish_awakening(&mut session);
    assert!(session
        .state()
        .story
        .visited_scenes
        .contains("1-2-awakening"));

    let result = session.travel_to("gang-territory").unwrap();
    assert_eq!(result.location.id, "gang-territory");
    assert!(result.first_visit);
    assert_eq!(session.state().navigation.current_location, "gang-territory");
    assert!(session
        .state()
        .navigation
        .visited_locations
        .contains("gang-territory"));
    if let Some(encounter) = result.encounter {
        assert!(result.location.encounters.contains(&encounter.encounter_id));
        assert_eq!(encounter.location_id, "gang-territory");
    }
}

#[test]
fn travel_options_show_lock_status() {
    let mut session = session(2);
    arrive(&mut session, "lower-streets");
    let options = session.travel_options();
    let ids: Vec<&str> = options.iter().map(|o| o.id.as_str()).collect();
    assert_eq!(ids, vec!["safehouse", "market", "gang-territory"]);

    let gang = options.iter().find(|o| o.id == "gang-territory").unwrap();
    assert!(gang.locked);
    let home = options.iter().find(|o| o.id == "safehouse").unwrap();
    assert!(home.visited);
    assert!(!home.locked);
}

#[test]
fn non_adjacent_destination_rejected() {
    let mut session = session(3);
    let err = session.travel_to("old-docks").unwrap_err();
    assert!(matches!(
        err,
        SessionError::Navigation(NavigationError::InvalidDestination { .. })
    ));
    assert_eq!(err.kind(), ErrorKind::InvalidOperation);
    assert_eq!(session.state().navigation.current_location, "safehouse");
}

#[test]
fn discovery_unlocks_rooftops() {
    let mut session = session(4);
    let result = session.explore("workbench").unwrap();
    assert_eq!(result.discovery.as_deref(), Some("found_lock_pick"));
    assert_eq!(result.newly_unlocked, vec!["rooftops".to_string()]);

    // A second visit finds nothing new.
    let again = session.explore("workbench").unwrap();
    assert!(!again.first_visit);
    assert!(again.discovery.is_none());

    arrive(&mut session, "lower-streets");
    arrive(&mut session, "market");
    let result = arrive(&mut session, "rooftops");
    assert_eq!(result.location.id, "rooftops");
}

#[test]
fn pending_encounter_blocks_travel_until_concluded() {
    // Try seeds until the first trip to the streets starts a fight.
    let mut session = (0..500)
        .map(session)
        .find_map(|mut s| {
            let result = s.travel_to("lower-streets").unwrap();
            result.encounter.is_some().then_some(s)
        })
        .expect("some seed should roll an encounter at 0.15");

    let pending = session.pending_encounter().unwrap();
    assert_eq!(pending.location_id, "lower-streets");

    let err = session.travel_to("market").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidOperation);

    let report = session.conclude_encounter(CombatOutcome::Fled).unwrap();
    assert_eq!(report.aftermath.retreated_to.as_deref(), Some("safehouse"));
    assert_eq!(session.state().navigation.current_location, "safehouse");
    assert!(session.pending_encounter().is_none());
}

#[test]
fn no_pending_encounter_to_conclude() {
    let mut session = session(5);
    let err = session.conclude_encounter(CombatOutcome::Victory).unwrap_err();
    assert!(matches!(
        err,
        SessionError::Navigation(NavigationError::NoPendingEncounter)
    ));
}

#[test]
fn rest_only_where_allowed() {
    let mut session = session(6);
    session.rest().unwrap();

    arrive(&mut session, "lower-streets");
    let err = session.rest().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PreconditionFailed);
}

#[test]
fn rest_refills_hp_at_the_safehouse() {
    let mut session = session(7);
    session.advance().unwrap();
    session.advance().unwrap();
    session.resolve_choice("swing").unwrap();
    assert_eq!(session.state().stats.value("hp"), Some(90));

    let navigation = session.state().navigation.clone();
    session.rest().unwrap();
    assert_eq!(session.state().stats.value("hp"), Some(100));
    assert_eq!(session.state().navigation, navigation);
}

#[test]
fn connected_follows_authored_order() {
    let world = LocationGraph::load_from_ron(Path::new("content/world.ron")).unwrap();
    for location in world.locations() {
        let ids: Vec<&str> = world
            .connected(&location.id)
            .iter()
            .map(|l| l.id.as_str())
            .collect();
        assert_eq!(ids, location.connected_to);
    }
    assert!(world.connected("atlantis").is_empty());
    assert_eq!(
        world.asymmetric_edges(),
        vec![("rooftops".to_string(), "lower-streets".to_string())]
    );
}
