//! Talkie Player command line front end
//!
//! Reads one or more timeline files, composes them into a single top-level
//! JSON array and hands the blob to the engine.

use anyhow::{bail, Result};
use clap::error::ErrorKind;
use clap::Parser;
use serde_json::Value;
use std::fs;
use std::path::PathBuf;
use std::process::exit;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use talkie_player::play_list;

#[derive(Parser, Debug)]
#[command(
    name = "talkie-player",
    version,
    about = "Plays a JSON timeline of talkie messages over UDP"
)]
struct Args {
    /// Delay added to every scheduled time, in milliseconds
    #[arg(short = 'd', long = "delay", value_name = "MS", default_value_t = 0)]
    delay: u32,

    /// Enable verbose mode
    #[arg(short = 'v', long = "verbose")]
    verbose: bool,

    /// Timeline files, played together as one score
    #[arg(value_name = "FILE", required = true)]
    files: Vec<PathBuf>,
}

fn main() {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) => {
            let code = match e.kind() {
                ErrorKind::DisplayHelp => 2,
                ErrorKind::DisplayVersion => 0,
                _ => 1,
            };
            let _ = e.print();
            exit(code);
        }
    };

    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let score = match compose_score(&args.files) {
        Ok(score) => score,
        Err(e) => {
            eprintln!("talkie-player: {e}");
            exit(1);
        }
    };

    exit(play_list(&score, args.delay as f64, args.verbose));
}

/// Merge every readable input file into one top-level JSON array.
///
/// Unreadable or unparseable files are skipped with a diagnostic; the run
/// only fails when nothing at all could be read.
fn compose_score(paths: &[PathBuf]) -> Result<String> {
    let mut files_json = Vec::new();

    for path in paths {
        let parsed = fs::read_to_string(path)
            .map_err(anyhow::Error::from)
            .and_then(|text| Ok(serde_json::from_str::<Value>(&text)?));
        match parsed {
            Ok(value) => files_json.push(value),
            Err(e) => eprintln!("Skipping {}: {e}", path.display()),
        }
    }

    if files_json.is_empty() {
        bail!("no readable input files");
    }
    Ok(serde_json::to_string(&Value::Array(files_json))?)
}
