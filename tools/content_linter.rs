/// Content Linter: validates world and story content before it ships.
///
/// Usage: content_linter <content_dir>

use narrative_rpg::core::content::StoryContent;
use narrative_rpg::core::world::LocationGraph;
use narrative_rpg::schema::location::DangerLevel;
use narrative_rpg::schema::story::{ChoiceEffect, SceneBlock};
use narrative_rpg::{GameSession, SessionConfig};
use std::collections::BTreeSet;
use std::path::Path;
use std::process;

fn main() {
    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 || args[1] == "--help" || args[1] == "-h" {
        println!("Usage: content_linter <content_dir>");
        process::exit(0);
    }

    let dir = Path::new(&args[1]);
    if !dir.is_dir() {
        eprintln!("ERROR: Path '{}' is not a directory", dir.display());
        process::exit(1);
    }

    // Structural validation happens on load; a failure here is fatal.
    let world = match LocationGraph::load_from_ron(&dir.join("world.ron")) {
        Ok(world) => world,
        Err(e) => {
            eprintln!("ERROR: world.ron: {}", e);
            process::exit(1);
        }
    };
    let story = match StoryContent::load_from_ron(&dir.join("story.ron")) {
        Ok(story) => story,
        Err(e) => {
            eprintln!("ERROR: story.ron: {}", e);
            process::exit(1);
        }
    };
    println!(
        "Loaded {} locations, {} chapters",
        world.len(),
        story.chapters().len()
    );

    let (errors, warnings) = lint_content(dir, &world, &story);

    println!("\n=== Content Lint Report ===\n");

    if errors.is_empty() && warnings.is_empty() {
        println!("All checks passed!");
    }

    for warning in &warnings {
        println!("WARNING: {}", warning);
    }

    for error in &errors {
        println!("ERROR: {}", error);
    }

    println!(
        "\nSummary: {} errors, {} warnings",
        errors.len(),
        warnings.len()
    );

    if errors.is_empty() {
        process::exit(0);
    } else {
        process::exit(1);
    }
}

fn lint_content(
    dir: &Path,
    world: &LocationGraph,
    story: &StoryContent,
) -> (Vec<String>, Vec<String>) {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    // Cross-file references are checked by building a session.
    let config = dir.join("config.ron");
    let config = if config.exists() {
        match SessionConfig::load_from_ron(&config) {
            Ok(config) => Some(config),
            Err(e) => {
                errors.push(format!("config.ron: {}", e));
                None
            }
        }
    } else {
        warnings.push("No config.ron; the first location will be the start".to_string());
        None
    };
    let mut builder = GameSession::builder()
        .with_world(world.clone())
        .with_story(story.clone());
    if let Some(config) = config {
        builder = builder.with_config(config);
    }
    if let Err(e) = builder.build() {
        errors.push(e.to_string());
    }

    for (from, to) in world.asymmetric_edges() {
        warnings.push(format!(
            "Edge '{}' -> '{}' has no return edge (one-way)",
            from, to
        ));
    }

    // Reachability from every location, ignoring locks.
    let mut reachable = BTreeSet::new();
    for location in world.locations() {
        for next in world.connected(&location.id) {
            reachable.insert(next.id.clone());
        }
    }
    for location in world.locations() {
        if !reachable.contains(&location.id) {
            warnings.push(format!(
                "Location '{}' has no incoming edge",
                location.id
            ));
        }
        if location.encounters.is_empty() && location.danger > DangerLevel::Neutral {
            warnings.push(format!(
                "Location '{}' is {} but has no encounters",
                location.id, location.danger
            ));
        }
    }

    for chapter in story.chapters() {
        for scene in &chapter.scenes {
            if scene.blocks.is_empty() {
                warnings.push(format!(
                    "Scene '{}/{}' has no blocks",
                    chapter.id, scene.id
                ));
            }
            let choice_blocks = scene.blocks.iter().filter(|b| b.is_choice()).count();
            let last_in_chapter = chapter.scenes.last().map(|s| &s.id) == Some(&scene.id);
            if choice_blocks == 0 && scene.next.is_none() && last_in_chapter {
                warnings.push(format!(
                    "Scene '{}/{}' is a dead end (no choices, no next scene)",
                    chapter.id, scene.id
                ));
            }
            for block in &scene.blocks {
                if let SceneBlock::Choice(choice_block) = block {
                    if choice_block.choices.iter().all(|c| c.requires.is_some()) {
                        warnings.push(format!(
                            "Scene '{}/{}' has a choice block where every choice is gated",
                            chapter.id, scene.id
                        ));
                    }
                }
            }
        }
    }

    for path in story.paths() {
        let used = story.chapters().iter().any(|chapter| {
            chapter.scenes.iter().any(|scene| {
                scene
                    .blocks
                    .iter()
                    .filter_map(SceneBlock::as_choice)
                    .flat_map(|b| b.choices.iter())
                    .flat_map(|c| c.effects.iter())
                    .any(|e| {
                        matches!(e, ChoiceEffect::Path { path: p, .. } if p == path)
                    })
            })
        });
        if !used {
            warnings.push(format!("Path '{}' is declared but never shifted", path));
        }
    }

    (errors, warnings)
}
