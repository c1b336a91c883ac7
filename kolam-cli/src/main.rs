use std::fs;

use anyhow::{bail, Context, Result};
use tracing::info;
use uuid::Uuid;

use kolam_core::pipeline;
use kolam_core::preprocess;
use kolam_core::{KolamRequest, PipelineConfig, RecreationResponse};

const OUTPUT_DIR: &str = "img";

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args: Vec<String> = std::env::args().collect();
    if args.len() < 3 {
        print_usage();
        bail!("missing command or input path");
    }

    let cfg = PipelineConfig::default();
    match args[1].as_str() {
        "analyze" => analyze_command(&args[2], &cfg),
        "recreate" => recreate_command(&args[2], &cfg),
        "render" => render_command(&args[2]),
        other => {
            print_usage();
            bail!("unknown command: {}", other);
        }
    }
}

fn print_usage() {
    println!("Usage: kolam <command> <input>");
    println!("  analyze  <image>         detect dots and paths, print the JSON response");
    println!("  recreate <image>         rebuild a symmetric version, write an SVG artifact");
    println!("  render   <request.json>  draw a dot/path request directly to an SVG artifact");
}

fn analyze_command(path: &str, cfg: &PipelineConfig) -> Result<()> {
    let img = load_image(path)?;
    info!("analyzing {} ({}x{})", path, img.width(), img.height());
    let response = pipeline::analyze(&img, cfg);
    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}

fn recreate_command(path: &str, cfg: &PipelineConfig) -> Result<()> {
    let img = load_image(path)?;
    info!("recreating {} ({}x{})", path, img.width(), img.height());
    let mut rng = rand::rng();
    let svg = pipeline::recreate_svg(&img, cfg, &mut rng);
    let filename = write_artifact(&svg)?;
    let response = RecreationResponse {
        recreated_image: filename,
    };
    println!("{}", serde_json::to_string(&response)?);
    Ok(())
}

fn render_command(path: &str) -> Result<()> {
    let json = fs::read_to_string(path).with_context(|| format!("Failed to read {}", path))?;
    let request: KolamRequest =
        serde_json::from_str(&json).context("Failed to parse kolam request")?;
    let svg = pipeline::create_kolam(&request);
    let filename = write_artifact(&svg)?;
    println!(
        "{}",
        serde_json::json!({ "message": "Kolam created", "file": filename })
    );
    Ok(())
}

fn load_image(path: &str) -> Result<image::RgbImage> {
    let bytes = fs::read(path).with_context(|| format!("Failed to read {}", path))?;
    preprocess::load_rgb(&bytes)
}

fn write_artifact(svg: &str) -> Result<String> {
    fs::create_dir_all(OUTPUT_DIR)
        .with_context(|| format!("Failed to create {}", OUTPUT_DIR))?;
    let filename = format!("{}/{}_kolam.svg", OUTPUT_DIR, Uuid::new_v4());
    fs::write(&filename, svg).with_context(|| format!("Failed to write {}", filename))?;
    info!("wrote artifact {}", filename);
    Ok(filename)
}
