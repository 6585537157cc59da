use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use log::{info, warn};

use imagetwin_core::{Config, ImageTwin, SearchOptions};

#[derive(Parser)]
#[command(name = "imagetwin")]
#[command(about = "Index images by perceptual fingerprint and find near-duplicates")]
#[command(version)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Override the index database path
    #[arg(long, global = true)]
    database: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Index all supported images under the given directories
    Index {
        /// Directories to index
        #[arg(required = true)]
        directories: Vec<PathBuf>,

        /// Number of worker threads (0 = auto)
        #[arg(long, default_value_t = 0)]
        threads: usize,
    },

    /// Search the index for images similar to a query image
    Search {
        /// Query image file
        image: PathBuf,

        /// Directory scope to search within
        directory: String,

        /// Minimum similarity in [0, 1]
        #[arg(short, long, default_value_t = 0.8)]
        threshold: f64,

        /// Normalize away resolution differences before hashing
        #[arg(long)]
        normalize_resolution: bool,

        /// Flatten alpha and force RGB before hashing
        #[arg(long)]
        normalize_appearance: bool,

        /// Use keypoint matching instead of hash similarity
        #[arg(long)]
        features: bool,

        /// Matches required for a confident keypoint score
        #[arg(long, default_value_t = 10)]
        min_matches: usize,

        /// Emit results as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show index totals
    Status,

    /// Remove index entries whose files no longer exist
    Prune,

    /// Wipe the whole index
    Clear,

    /// Generate default configuration file
    GenerateConfig {
        /// Path to save configuration file
        #[arg(default_value = "imagetwin.json")]
        path: PathBuf,
    },
}

fn main() -> Result<(), anyhow::Error> {
    // Initialize logger
    env_logger::init();

    let cli = Cli::parse();

    // Set up configuration
    let mut config = if let Some(config_path) = &cli.config {
        Config::from_file(config_path)?
    } else {
        Config::default()
    };
    if let Some(database) = &cli.database {
        config.database_path = database.clone();
    }

    match cli.command {
        Commands::Index {
            directories,
            threads,
        } => {
            config.threads = threads;
            config.validate()?;

            let mut engine = ImageTwin::new(config)?;

            // Ctrl-C abandons the batch between chunks; completed upserts
            // are kept
            let cancel = Arc::new(AtomicBool::new(false));
            let handler_flag = cancel.clone();
            ctrlc::set_handler(move || {
                warn!("cancellation requested, stopping after current chunk");
                handler_flag.store(true, Ordering::Relaxed);
            })?;

            info!("Starting indexing...");
            let report = engine.index(&directories, &cancel)?;

            println!("Indexed {} images", report.indexed);
            if !report.failures.is_empty() {
                println!("{} files failed:", report.failures.len());
                for failure in &report.failures {
                    println!("  [{}] {}", failure.kind, failure.path.display());
                }
            }
            if report.cancelled {
                println!("Cancelled before completion; indexed records were kept");
            }
            Ok(())
        }

        Commands::Search {
            image,
            directory,
            threshold,
            normalize_resolution,
            normalize_appearance,
            features,
            min_matches,
            json,
        } => {
            let engine = ImageTwin::new(config)?;

            if features {
                let results = engine.search_with_feature_match(
                    &image,
                    PathBuf::from(&directory).as_path(),
                    threshold,
                    min_matches,
                )?;

                if json {
                    println!("{}", serde_json::to_string_pretty(&results)?);
                } else {
                    println!("{} matches", results.len());
                    for result in &results {
                        println!("{:.4}  ({:4} kp)  {}", result.score, result.matched, result.path);
                    }
                }
                return Ok(());
            }

            let bytes = std::fs::read(&image)?;
            let options = SearchOptions {
                threshold,
                normalize_resolution,
                normalize_appearance,
            };
            let outcome = engine.search(&bytes, &directory, &options)?;

            if json {
                let payload = serde_json::json!({
                    "results": outcome.results,
                    "total": outcome.results.len(),
                    "query_hash": outcome.query_fingerprint,
                });
                println!("{}", serde_json::to_string_pretty(&payload)?);
            } else {
                println!("query hash: {}", outcome.query_fingerprint);
                println!("{} matches", outcome.results.len());
                for result in &outcome.results {
                    println!("{:.4}  {}", result.similarity, result.path);
                }
            }
            Ok(())
        }

        Commands::Status => {
            let engine = ImageTwin::new(config)?;
            let status = engine.status()?;

            println!("indexed images:   {}", status.total_images);
            println!(
                "last directory:   {}",
                status.last_directory.as_deref().unwrap_or("-")
            );
            println!(
                "feature matching: {}",
                if status.feature_match_available {
                    "available"
                } else {
                    "unavailable"
                }
            );
            Ok(())
        }

        Commands::Prune => {
            let mut engine = ImageTwin::new(config)?;
            let removed = engine.prune()?;
            println!("Removed {} stale entries", removed);
            Ok(())
        }

        Commands::Clear => {
            let mut engine = ImageTwin::new(config)?;
            engine.clear()?;
            println!("Index cleared");
            Ok(())
        }

        Commands::GenerateConfig { path } => {
            let config = Config::default();
            config.save_to_file(&path)?;
            println!("Configuration file generated at: {}", path.display());
            Ok(())
        }
    }
}
