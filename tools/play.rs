/// Play: interactive shell for walking the world and reading the story.
///
/// Usage: play [--content <dir>] [--seed <n>]
///
/// Commands:
///   look                  - describe the current location and exits
///   go <location>         - travel to a connected location
///   areas                 - list areas of the current location and scene
///   explore <area>        - explore a location area (or scene area)
///   next                  - advance the story
///   choices               - list the pending choices
///   choose <id>           - resolve a choice
///   fight <win|lose|flee> - conclude the pending encounter
///   rest                  - rest at the current location
///   stats                 - show stats, inventory and path affinity
///   save <file>           - write a save snapshot
///   load <file>           - restore a save snapshot
///   new                   - start over
///   help                  - list commands
///   quit                  - exit

use narrative_rpg::core::save::SaveSnapshot;
use narrative_rpg::core::story::{AppliedEffect, StoryResult};
use narrative_rpg::schema::encounter::CombatOutcome;
use narrative_rpg::schema::story::SceneBlock;
use narrative_rpg::GameSession;
use std::io::{self, BufRead, Write};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "narrative_rpg=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    let args: Vec<String> = std::env::args().collect();

    let mut content_dir = "content".to_string();
    let mut seed: u64 = 42;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--help" | "-h" => {
                print_usage();
                return;
            }
            "--content" if i + 1 < args.len() => {
                i += 1;
                content_dir = args[i].clone();
            }
            "--seed" if i + 1 < args.len() => {
                i += 1;
                seed = args[i].parse().unwrap_or(42);
            }
            _ => {
                eprintln!("Unknown argument: {}", args[i]);
                print_usage();
                std::process::exit(1);
            }
        }
        i += 1;
    }

    let mut session = match GameSession::builder()
        .content_dir(&content_dir)
        .seed(seed)
        .build()
    {
        Ok(session) => session,
        Err(e) => {
            eprintln!("ERROR: Failed to load content from '{}': {}", content_dir, e);
            std::process::exit(1);
        }
    };

    println!(
        "Loaded {} locations, {} chapters",
        session.world().len(),
        session.story().chapters().len()
    );
    println!("Seed: {}", seed);
    println!("Type 'help' for commands.\n");

    if let Some(scene) = session.state().story.current_scene() {
        println!("== {} ==", scene);
    }
    describe_location(&session);

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    loop {
        print!("play> ");
        stdout.flush().ok();

        let mut line = String::new();
        if stdin.lock().read_line(&mut line).is_err() || line.is_empty() {
            break;
        }
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let parts: Vec<&str> = line.split_whitespace().collect();
        let cmd = parts[0].to_lowercase();

        match cmd.as_str() {
            "quit" | "exit" | "q" => {
                println!("Goodbye.");
                break;
            }
            "help" | "h" | "?" => print_help(),
            "look" | "l" => describe_location(&session),
            "go" => {
                if parts.len() < 2 {
                    println!("Usage: go <location>");
                    continue;
                }
                match session.travel_to(parts[1]) {
                    Ok(result) => {
                        println!("\n{} [{}]", result.location.name, result.location.danger);
                        println!("{}", result.location.description);
                        if result.first_visit {
                            println!("(first visit)");
                        }
                        for id in &result.newly_unlocked {
                            println!("Unlocked: {}", id);
                        }
                        if let Some(encounter) = result.encounter {
                            println!(
                                "\n!! Encounter: {} ({} enemies). Use 'fight win|lose|flee'.",
                                encounter.encounter_id,
                                encounter.enemies.len()
                            );
                        }
                    }
                    Err(e) => println!("Can't go there: {}", e),
                }
            }
            "areas" => {
                let here = session.state().navigation.current_location.clone();
                if let Ok(areas) = session.exploration_areas(&here) {
                    for area in areas {
                        let marker = if area.required { " (required)" } else { "" };
                        println!("  {} - {}{}", area.id, area.name, marker);
                    }
                }
                if let Some(scene) = session
                    .state()
                    .story
                    .current_scene()
                    .and_then(|at| session.story().scene_at(&at))
                {
                    for area in &scene.areas {
                        let marker = if area.required { " (required)" } else { "" };
                        println!("  {} - {} [scene]{}", area.id, area.name, marker);
                    }
                }
            }
            "explore" => {
                if parts.len() < 2 {
                    println!("Usage: explore <area>");
                    continue;
                }
                let result = session
                    .explore(parts[1])
                    .or_else(|_| session.explore_scene_area(parts[1]));
                match result {
                    Ok(result) => {
                        println!("\n{}", result.area.name);
                        for line in &result.area.description {
                            println!("{}", line);
                        }
                        if let Some(flag) = result.discovery {
                            println!("Discovered: {}", flag);
                        }
                        for id in &result.newly_unlocked {
                            println!("Unlocked: {}", id);
                        }
                    }
                    Err(e) => println!("Nothing to explore: {}", e),
                }
            }
            "next" | "n" => match session.advance() {
                Ok(result) => print_story_result(&session, &result),
                Err(e) => println!("{}", e),
            },
            "choices" | "c" => print_choices(&session),
            "choose" => {
                if parts.len() < 2 {
                    println!("Usage: choose <id>");
                    print_choices(&session);
                    continue;
                }
                match session.resolve_choice(parts[1]) {
                    Ok(result) => print_story_result(&session, &result),
                    Err(e) => println!("Can't choose that: {}", e),
                }
            }
            "scene" => {
                if parts.len() < 3 {
                    println!("Usage: scene <chapter> <scene>");
                    continue;
                }
                match session.start_scene(parts[1], parts[2]) {
                    Ok(result) => print_story_result(&session, &result),
                    Err(e) => println!("{}", e),
                }
            }
            "fight" => {
                let outcome = match parts.get(1).copied() {
                    Some("win") => CombatOutcome::Victory,
                    Some("lose") => CombatOutcome::Defeat,
                    Some("flee") => CombatOutcome::Fled,
                    _ => {
                        println!("Usage: fight <win|lose|flee>");
                        continue;
                    }
                };
                match session.conclude_encounter(outcome) {
                    Ok(report) => {
                        let aftermath = report.aftermath;
                        println!("{:?} against {}.", aftermath.outcome, aftermath.encounter_id);
                        if aftermath.cleared {
                            println!("{} is clear until you rest.", aftermath.location);
                        }
                        if let Some(to) = aftermath.retreated_to {
                            println!("You fall back to {}.", to);
                        }
                        if let Some(result) = report.story {
                            print_story_result(&session, &result);
                        }
                    }
                    Err(e) => println!("{}", e),
                }
            }
            "rest" => match session.rest() {
                Ok(()) => println!("You rest. HP restored."),
                Err(e) => println!("Can't rest: {}", e),
            },
            "stats" => print_stats(&session),
            "save" => {
                if parts.len() < 2 {
                    println!("Usage: save <file>");
                    continue;
                }
                let written = session
                    .snapshot()
                    .to_ron()
                    .map_err(|e| e.to_string())
                    .and_then(|text| std::fs::write(parts[1], text).map_err(|e| e.to_string()));
                match written {
                    Ok(()) => println!("Saved to {}", parts[1]),
                    Err(e) => println!("ERROR: {}", e),
                }
            }
            "load" => {
                if parts.len() < 2 {
                    println!("Usage: load <file>");
                    continue;
                }
                let loaded = std::fs::read_to_string(parts[1])
                    .map_err(|e| e.to_string())
                    .and_then(|text| SaveSnapshot::from_ron(&text).map_err(|e| e.to_string()))
                    .and_then(|snapshot| session.restore(snapshot).map_err(|e| e.to_string()));
                match loaded {
                    Ok(()) => {
                        println!("Loaded {}", parts[1]);
                        describe_location(&session);
                    }
                    Err(e) => println!("ERROR: {}", e),
                }
            }
            "new" => match session.new_game() {
                Ok(started) => {
                    println!("New game.");
                    if let Some(result) = started {
                        print_story_result(&session, &result);
                    }
                    describe_location(&session);
                }
                Err(e) => println!("ERROR: {}", e),
            },
            _ => println!("Unknown command '{}'. Type 'help'.", cmd),
        }
    }
}

fn describe_location(session: &GameSession) {
    let here = &session.state().navigation.current_location;
    if let Some(location) = session.world().location(here) {
        println!("\n{} [{}]", location.name, location.danger);
        println!("{}", location.description);
    }
    println!("Exits:");
    for option in session.travel_options() {
        let mut notes = Vec::new();
        if option.locked {
            notes.push("locked");
        }
        if option.visited {
            notes.push("visited");
        }
        println!(
            "  {} - {} [{}] {}",
            option.id,
            option.name,
            option.danger,
            notes.join(", ")
        );
    }
    if let Some(encounter) = session.pending_encounter() {
        println!("!! {} blocks the way.", encounter.encounter_id);
    }
}

fn print_story_result(session: &GameSession, result: &StoryResult) {
    match result {
        StoryResult::SceneStarted { scene, title } => {
            println!("\n== {} ({}) ==", title, scene);
        }
        StoryResult::Block { block, .. } => match block {
            SceneBlock::Narration(text) => println!("{}", text),
            SceneBlock::Dialogue { speaker, text } => println!("{}: \"{}\"", speaker, text),
            SceneBlock::Choice(_) => print_choices(session),
        },
        StoryResult::SceneComplete { scene, next } => {
            println!("-- {} complete --", scene);
            if let Some(next) = next {
                println!("Next: {} (use 'scene {} {}')", next, next.chapter, next.scene);
            }
        }
        StoryResult::ChoiceResolved(outcome) => {
            if session.state().settings.show_effects {
                let shown: Vec<String> = outcome
                    .applied
                    .iter()
                    .filter(|e| e.is_visible())
                    .map(AppliedEffect::to_string)
                    .collect();
                if !shown.is_empty() {
                    println!("[{}]", shown.join(", "));
                }
            }
            if let Some(to) = &outcome.jumped_to {
                println!("\n== {} ==", to);
            }
            for id in &outcome.newly_unlocked {
                println!("Unlocked: {}", id);
            }
        }
    }
}

fn print_choices(session: &GameSession) {
    match session.available_choices() {
        Ok(choices) => {
            for choice in choices {
                let marker = if choice.selectable { " " } else { "x" };
                println!("  [{}] {} - {}", marker, choice.id, choice.text);
            }
        }
        Err(e) => println!("{}", e),
    }
}

fn print_stats(session: &GameSession) {
    let state = session.state();
    println!("\nStats:");
    for (name, stat) in &state.stats.0 {
        println!("  {:10} {} / {}", name, stat.value, stat.max);
    }
    if !state.inventory.is_empty() {
        println!("Inventory:");
        for (item, count) in &state.inventory {
            println!("  {} x{}", item, count);
        }
    }
    println!("Paths:");
    for (path, score) in &state.story.path_affinity {
        println!("  {:10} {}", path, score);
    }
    if let Some(path) = session.dominant_path() {
        println!("Dominant path: {}", path);
    }
    if !state.relationships.is_empty() {
        println!("Relationships:");
        for (npc, value) in &state.relationships {
            println!("  {:10} {}", npc, value);
        }
    }
}

fn print_usage() {
    println!("Usage: play [--content <dir>] [--seed <n>]");
}

fn print_help() {
    println!("Commands:");
    println!("  look                  - describe the current location and exits");
    println!("  go <location>         - travel to a connected location");
    println!("  areas                 - list explorable areas");
    println!("  explore <area>        - explore an area");
    println!("  next                  - advance the story");
    println!("  choices               - list the pending choices");
    println!("  choose <id>           - resolve a choice");
    println!("  scene <ch> <scene>    - start a scene");
    println!("  fight <win|lose|flee> - conclude the pending encounter");
    println!("  rest                  - rest at the current location");
    println!("  stats                 - show stats, inventory and paths");
    println!("  save <file> / load <file>");
    println!("  new                   - start over");
    println!("  quit                  - exit");
}
