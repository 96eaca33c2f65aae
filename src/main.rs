//! Command line front end: load a calibration document or pose file and
//! print the resulting model.
//!
//! Usage:
//! ```bash
//! RUST_LOG=info perception-io --kind brown --path samples/brown.yaml
//! perception-io --kind pose --path samples/pose.txt --format yaml
//! ```

use clap::Parser;
use log::info;
use perception_io::{read_pose_file, DistortionModel};
use serde::Serialize;
use std::path::PathBuf;

/// Load camera calibration or pose files and print them
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Kind of input file (brown, omnidirectional, pose)
    #[arg(short = 'k', long)]
    kind: String,

    /// Path to the input file
    #[arg(short = 'p', long)]
    path: PathBuf,

    /// Output format (json, yaml)
    #[arg(short = 'f', long, default_value = "json")]
    format: String,
}

fn render<T: Serialize>(value: &T, format: &str) -> Result<String, Box<dyn std::error::Error>> {
    match format.to_lowercase().as_str() {
        "json" => Ok(serde_json::to_string_pretty(value)?),
        "yaml" | "yml" => Ok(serde_yaml::to_string(value)?),
        _ => Err(format!("Unsupported output format: {format}. Supported formats: json, yaml").into()),
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let cli = Cli::parse();
    info!("Loading {} from {}", cli.kind, cli.path.display());

    let output = if cli.kind.eq_ignore_ascii_case("pose") {
        render(&read_pose_file(&cli.path)?, &cli.format)?
    } else {
        render(&DistortionModel::load_from_yaml(&cli.kind, &cli.path)?, &cli.format)?
    };

    println!("{output}");
    Ok(())
}
