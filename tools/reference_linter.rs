/// Reference Linter: validates a directory of reference scenes.
///
/// Usage: reference_linter [<reference_dir>] [--strict]
///
/// Every document is pushed through the postprocessor. Documents it cannot
/// normalize are errors; duplicate entity ids are errors; missing
/// annotations, out-of-bounds entities and overlaps are warnings (errors
/// with `--strict`).

use clap::Parser;
use rustc_hash::FxHashSet;
use scene_forge::core::library::{ReferenceLibrary, ReferenceScene};
use scene_forge::core::postprocess::{self, Postprocessor};
use scene_forge::schema::scene::SceneDocument;
use std::path::Path;
use std::process;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "reference_linter")]
#[command(version, about = "Validate reference scene documents", long_about = None)]
struct Cli {
    /// Directory of reference scene documents
    #[arg(default_value = "reference_scenes")]
    reference_dir: String,

    /// Treat warnings as errors
    #[arg(long)]
    strict: bool,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("error")),
        )
        .init();

    let cli = Cli::parse();
    let dir = Path::new(&cli.reference_dir);
    if !dir.is_dir() {
        eprintln!("ERROR: Path '{}' is not a directory", cli.reference_dir);
        process::exit(1);
    }

    let library = ReferenceLibrary::load_dir(dir);
    println!("Loaded {} reference scenes", library.len());
    if library.is_empty() {
        eprintln!("ERROR: no reference scenes could be loaded");
        process::exit(1);
    }

    let postprocessor = Postprocessor::default();
    let mut errors = Vec::new();
    let mut warnings = Vec::new();
    for scene in library.scenes() {
        lint_scene(scene, &postprocessor, &mut errors, &mut warnings);
    }

    println!("\n=== Reference Lint Report ===\n");
    for summary in library.summaries() {
        println!(
            "  {:<28} complexity {:<4} keywords [{}]",
            summary.name,
            summary.complexity,
            summary.keywords.join(", ")
        );
    }
    println!();

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

    if errors.is_empty() && !(cli.strict && !warnings.is_empty()) {
        process::exit(0);
    } else {
        process::exit(1);
    }
}

fn lint_scene(
    scene: &ReferenceScene,
    postprocessor: &Postprocessor,
    errors: &mut Vec<String>,
    warnings: &mut Vec<String>,
) {
    let name = &scene.name;

    if scene.keywords.is_empty() {
        warnings.push(format!(
            "'{}' has no keywords and is only reachable by complexity or chance",
            name
        ));
    }

    if !postprocess::validate(&scene.document) {
        warnings.push(format!(
            "'{}' is not valid as authored and relies on normalization",
            name
        ));
    }

    let processed = match postprocessor.normalize(scene.document.clone(), "lint", None) {
        Ok(processed) => processed,
        Err(e) => {
            errors.push(format!(
                "'{}' would be replaced by the minimal scene: {}",
                name, e
            ));
            return;
        }
    };

    let mut seen = FxHashSet::default();
    for entity in &processed.entities {
        if !seen.insert(entity.id.as_str()) {
            errors.push(format!("'{}' has duplicate entity id '{}'", name, entity.id));
        }
    }

    for entity in out_of_bounds(&processed) {
        warnings.push(format!(
            "'{}' entity '{}' lies outside the {}x{} canvas",
            name, entity, processed.metadata.width, processed.metadata.height
        ));
    }

    for (a, b) in overlapping_pairs(&processed) {
        warnings.push(format!(
            "'{}' entities '{}' and '{}' overlap and will be shifted on enhance",
            name, a, b
        ));
    }
}

fn out_of_bounds(scene: &SceneDocument) -> Vec<&str> {
    scene
        .entities
        .iter()
        .filter(|e| {
            e.position.x < 0.0
                || e.position.y < 0.0
                || e.position.x + e.size.width > scene.metadata.width
                || e.position.y + e.size.height > scene.metadata.height
        })
        .map(|e| e.id.as_str())
        .collect()
}

fn overlapping_pairs(scene: &SceneDocument) -> Vec<(&str, &str)> {
    let mut pairs = Vec::new();
    for (i, a) in scene.entities.iter().enumerate() {
        for b in &scene.entities[i + 1..] {
            if a.overlaps(b) {
                pairs.push((a.id.as_str(), b.id.as_str()));
            }
        }
    }
    pairs
}
