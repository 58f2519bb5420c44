use std::env;
use std::fs;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;
use log::info;

use lexstore::import::PROGRESS_REPORT_INTERVAL;
use lexstore::store::{DEFAULT_BUCKET, DEFAULT_STORE_NAME, DEFAULT_TEMP_SUFFIX};
use lexstore::{import_csv, DbStore, StoreConfig};

const DEFAULT_CSV_DIR: &str = "./assets";
const DEFAULT_CSV_FILE: &str = "lexstore.csv";

/// Import a delimited dictionary file into the store, then compact it.
#[derive(Parser)]
#[command(name = "lexload", version)]
struct Cli {
    /// Path to the source CSV. Defaults to ./assets/lexstore.csv, then
    /// ./lexstore.csv
    #[arg(short, long)]
    csv: Option<PathBuf>,

    /// Path to the store. Defaults to the first lexstore.db found in a
    /// PATH directory, then $HOME/.cache/lexstore/lexstore.db (created if
    /// needed)
    #[arg(short = 'd', long = "db")]
    db: Option<PathBuf>,

    /// Name of the bucket within the store
    #[arg(short, long, default_value = DEFAULT_BUCKET)]
    bucket: String,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let csv_path = resolve_csv_path(cli.csv.as_deref())?;
    let db_path = match &cli.db {
        Some(path) => path.clone(),
        None => resolve_db_path()?,
    };
    info!(
        "loading '{}' into '{}' (bucket '{}')",
        csv_path.display(),
        db_path.display(),
        cli.bucket
    );

    let store = DbStore::open(StoreConfig::new(&db_path).bucket(&cli.bucket))
        .with_context(|| format!("failed to open store at '{}'", db_path.display()))?;

    let written = import_csv(&store, &csv_path, PROGRESS_REPORT_INTERVAL)
        .with_context(|| format!("failed to import '{}'", csv_path.display()))?;
    info!("imported {written} records");

    // Bulk writes leave free pages behind; compaction reclaims them. The
    // handle is consumed, which is fine: we are done with it.
    let mut temp_path = db_path.clone().into_os_string();
    temp_path.push(DEFAULT_TEMP_SUFFIX);
    store
        .compact(&PathBuf::from(temp_path))
        .context("compaction failed")?;

    info!("done");
    Ok(())
}

fn resolve_csv_path(flag: Option<&std::path::Path>) -> Result<PathBuf> {
    if let Some(path) = flag {
        if !path.exists() {
            bail!("specified CSV file '{}' not found", path.display());
        }
        return Ok(path.to_path_buf());
    }
    let in_assets = PathBuf::from(DEFAULT_CSV_DIR).join(DEFAULT_CSV_FILE);
    if in_assets.exists() {
        return Ok(in_assets);
    }
    let in_cwd = PathBuf::from(DEFAULT_CSV_FILE);
    if in_cwd.exists() {
        return Ok(in_cwd);
    }
    bail!(
        "default CSV file not found in '{DEFAULT_CSV_DIR}' or the current directory, \
         and --csv was not given"
    );
}

/// Reuse an existing store found in PATH; otherwise default to the cache
/// directory, creating it when needed.
fn resolve_db_path() -> Result<PathBuf> {
    if let Some(path_env) = env::var_os("PATH") {
        for dir in env::split_paths(&path_env) {
            let candidate = dir.join(DEFAULT_STORE_NAME);
            if candidate.exists() {
                info!("found existing store in PATH: {}", candidate.display());
                return Ok(candidate);
            }
        }
    }

    let home = env::var_os("HOME").context("HOME is not set and --db was not given")?;
    let cache_dir = PathBuf::from(home).join(".cache").join("lexstore");
    fs::create_dir_all(&cache_dir)
        .with_context(|| format!("failed to create '{}'", cache_dir.display()))?;
    Ok(cache_dir.join(DEFAULT_STORE_NAME))
}
