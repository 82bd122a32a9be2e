/// Scene Preview: run the generation pipeline for a prompt and print the
/// resulting scene as JSON.
///
/// Usage: scene_preview "<prompt>" [--project <id>] [--style <style>]
///        [--reference-dir <dir>] [--config <file.ron>] [--seed <n>]
///        [--assets <descriptors.json>] [--lighting] [--audio] [--status]
///
/// `USE_LOCAL_MODEL`, `MODEL_ENDPOINT`, `MODEL_NAME` and `MODEL_TIMEOUT`
/// are honoured. Set `RUST_LOG=scene_forge=debug` for pipeline tracing.

use clap::Parser;
use scene_forge::core::pipeline::SceneEngine;
use scene_forge::core::postprocess::EnhanceOptions;
use scene_forge::schema::asset::AssetDescriptor;
use scene_forge::GenerationRequest;
use std::process;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "scene_preview")]
#[command(version, about = "Generate a scene for a prompt and print it as JSON", long_about = None)]
struct Cli {
    /// What the scene should contain
    prompt: String,

    /// Project id stamped on the scene
    #[arg(short, long, default_value = "preview")]
    project: String,

    /// Game style (platformer, shooter, puzzle, rpg, adventure, ...)
    #[arg(short, long)]
    style: Option<String>,

    /// Directory of reference scene documents
    #[arg(long)]
    reference_dir: Option<String>,

    /// RON configuration file
    #[arg(short, long)]
    config: Option<String>,

    /// Seed for reference selection when the prompt carries no signal
    #[arg(long)]
    seed: Option<u64>,

    /// JSON file holding an array of asset descriptors
    #[arg(long)]
    assets: Option<String>,

    /// Attach the default lighting block
    #[arg(long)]
    lighting: bool,

    /// Attach the default audio cues
    #[arg(long)]
    audio: bool,

    /// Print the model status report after the scene
    #[arg(long)]
    status: bool,

    /// Print only the scene, without inference metadata
    #[arg(long)]
    scene_only: bool,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut builder = SceneEngine::builder().env_overrides();
    if let Some(ref path) = cli.config {
        builder = builder.config_file(path);
    }
    if let Some(ref dir) = cli.reference_dir {
        builder = builder.reference_dir(dir);
    }
    if let Some(seed) = cli.seed {
        builder = builder.seed(seed);
    }

    let engine = match builder.build() {
        Ok(engine) => engine,
        Err(e) => {
            eprintln!("ERROR: {}", e);
            process::exit(1);
        }
    };

    let mut request = GenerationRequest::new(cli.prompt.clone(), cli.project.clone());
    if let Some(style) = cli.style.clone() {
        request = request.with_style(style);
    }
    if let Some(ref path) = cli.assets {
        match load_assets(path) {
            Ok(assets) => request = request.with_assets(assets),
            Err(e) => {
                eprintln!("ERROR: failed to load assets from {}: {}", path, e);
                process::exit(1);
            }
        }
    }

    let options = EnhanceOptions {
        add_lighting: cli.lighting,
        add_audio: cli.audio,
    };

    let generated = match engine.generate(&request, &options).await {
        Ok(generated) => generated,
        Err(e) => {
            eprintln!("ERROR: {}", e);
            process::exit(1);
        }
    };

    let output = if cli.scene_only {
        serde_json::to_string_pretty(&generated.scene)
    } else {
        serde_json::to_string_pretty(&generated)
    };
    match output {
        Ok(json) => println!("{}", json),
        Err(e) => {
            eprintln!("ERROR: failed to serialize scene: {}", e);
            process::exit(1);
        }
    }

    eprintln!(
        "\n{} via {} ({} entities, {} ms)",
        generated.scene.id,
        generated.inference.status,
        generated.scene.entities.len(),
        generated.generation_time_ms
    );
    if let Some(ref sample) = generated.inference.fallback_sample {
        eprintln!("  reference: {}", sample);
    }
    if let Some(ref reason) = generated.inference.fallback_reason {
        eprintln!("  fallback reason: {}", reason);
    }

    if cli.status {
        let status = engine.status().await;
        match serde_json::to_string_pretty(&status) {
            Ok(json) => eprintln!("\n=== Model Status ===\n{}", json),
            Err(e) => eprintln!("ERROR: failed to serialize status: {}", e),
        }
    }
}

fn load_assets(path: &str) -> Result<Vec<AssetDescriptor>, Box<dyn std::error::Error>> {
    let contents = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&contents)?)
}
