//! Run one genre lookup for a tracks file and print the result
//!
//! Useful for checking a classifier or endpoint before opening the galaxy.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use tunesphere_core::{GenreAnnotation, annotation_for, load_library_file, preview_urls};
use tunesphere_remote::{DEFAULT_LOOKUP_TIMEOUT, GenreLookup, HttpGenreLookup, ProcessGenreLookup};

/// Print the genre annotations a lookup returns for a library
#[derive(Parser, Debug)]
#[command(name = "genre-probe")]
#[command(about = "Check genre lookups for a saved-tracks file", long_about = None)]
struct Args {
    /// Saved-tracks JSON file
    #[arg(short, long)]
    tracks: PathBuf,

    /// Genre endpoint URL
    #[arg(short, long, default_value = "http://localhost:3000/getGenre")]
    endpoint: String,

    /// Run the classifier locally instead of calling the endpoint
    #[arg(long, value_name = "PROGRAM")]
    classifier: Option<String>,

    /// Classifier arguments, passed after `--`
    #[arg(last = true, requires = "classifier", value_name = "CLASSIFIER_ARGS")]
    classifier_args: Vec<String>,

    /// Timeout for the whole batch (seconds)
    #[arg(long, default_value_t = DEFAULT_LOOKUP_TIMEOUT.as_secs())]
    timeout: u64,

    /// Print the raw annotation JSON instead of a table
    #[arg(long)]
    json: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();
    let timeout = Duration::from_secs(args.timeout);

    let tracks = load_library_file(&args.tracks)
        .with_context(|| format!("Failed to read tracks: {}", args.tracks.display()))?;
    let urls = preview_urls(&tracks);
    println!(
        "{} tracks, {} with preview clips",
        tracks.len(),
        urls.len()
    );

    let lookup: Box<dyn GenreLookup> = match &args.classifier {
        Some(program) => Box::new(ProcessGenreLookup::new(
            program.clone(),
            args.classifier_args.clone(),
            timeout,
        )),
        None => Box::new(
            HttpGenreLookup::new(&args.endpoint, timeout)
                .with_context(|| format!("Invalid endpoint: {}", args.endpoint))?,
        ),
    };
    println!("Asking {}", lookup.describe());

    let annotations: Vec<GenreAnnotation> = lookup.lookup(&urls).context("Genre lookup failed")?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&annotations)?);
        return Ok(());
    }

    for track in &tracks {
        let Some(url) = track.preview_url.as_deref() else {
            continue;
        };
        match annotation_for(&annotations, url) {
            Some(a) => println!(
                "{:<14} ({:>7.2}, {:>7.2})  {} - {}",
                a.genre, a.x, a.z, track.name, track.artist
            ),
            None => println!("{:<14} {:>18}  {} - {}", "-", "", track.name, track.artist),
        }
    }

    println!("Annotated {} of {} preview clips", annotations.len(), urls.len());
    Ok(())
}
