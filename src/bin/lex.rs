use std::env;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;
use log::warn;
use serde::Serialize;

use lexstore::store::{DEFAULT_BUCKET, DEFAULT_STORE_NAME};
use lexstore::{find_similar, DbStore, Record, StoreConfig, StoreError};

/// Fields shown by default in plain output; --full shows everything.
const DEFAULT_FIELDS: [&str; 3] = ["translation", "definition", "exchange"];

const SUGGEST_MAX_DISTANCE: usize = 1;

/// Look up a term in an offline dictionary store.
#[derive(Parser)]
#[command(name = "lex", version)]
struct Cli {
    /// The term to look up
    term: String,

    /// Path to the store. Defaults to the first lexstore.db found in a
    /// PATH directory, then $HOME/.cache/lexstore/lexstore.db
    #[arg(short = 'd', long = "db")]
    db: Option<PathBuf>,

    /// Name of the bucket within the store
    #[arg(short, long, default_value = DEFAULT_BUCKET)]
    bucket: String,

    /// Output the result as JSON
    #[arg(short, long)]
    json: bool,

    /// Show every field in plain output, not just the common ones
    #[arg(short, long)]
    full: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Serialize)]
struct JsonResult {
    term: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<Record>,
    #[serde(skip_serializing_if = "Option::is_none")]
    suggestions: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let db_path = match &cli.db {
        Some(path) => path.clone(),
        None => resolve_db_path()?,
    };
    let term = cli.term.trim().to_lowercase();

    let store = DbStore::open(
        StoreConfig::new(&db_path)
            .bucket(&cli.bucket)
            .read_only(true),
    )
    .with_context(|| format!("failed to open store at '{}'", db_path.display()))?;

    match store.get(&term) {
        Ok(Some(record)) => {
            render_found(&cli, &term, record, None);
        }
        Ok(None) | Err(StoreError::BucketNotFound(_)) => {
            let suggestions = match find_similar(&store, &term, SUGGEST_MAX_DISTANCE) {
                Ok(suggestions) => suggestions,
                Err(err) => {
                    warn!("suggestion scan failed, continuing without suggestions: {err}");
                    Vec::new()
                }
            };
            if let Some(best) = suggestions.first() {
                if let Ok(Some(record)) = store.get(best) {
                    eprintln!("(no entry for '{term}', showing closest match '{best}')");
                    render_found(&cli, best, record, Some(&suggestions));
                    return Ok(());
                }
            }
            render_not_found(&cli, &term, &suggestions);
        }
        Err(err) => {
            if cli.json {
                let result = JsonResult {
                    term,
                    data: None,
                    suggestions: None,
                    error: Some(err.to_string()),
                };
                println!("{}", serde_json::to_string_pretty(&result)?);
            }
            return Err(err).context("failed to retrieve term");
        }
    }
    Ok(())
}

fn render_found(cli: &Cli, term: &str, record: Record, suggestions: Option<&Vec<String>>) {
    if cli.json {
        let result = JsonResult {
            term: term.to_string(),
            data: Some(record),
            suggestions: suggestions.cloned(),
            error: None,
        };
        match serde_json::to_string_pretty(&result) {
            Ok(json) => println!("{json}"),
            Err(err) => eprintln!("error generating JSON: {err}"),
        }
        return;
    }

    let width = record
        .keys()
        .map(|k| k.len())
        .chain(std::iter::once("term".len()))
        .max()
        .unwrap_or(4);
    println!("{:width$}  {term}", "term");

    // Records are sorted by field name already; filter unless --full.
    for (field, value) in &record {
        if !cli.full && !DEFAULT_FIELDS.contains(&field.as_str()) {
            continue;
        }
        let value = unescape(value);
        if value.trim().is_empty() {
            continue;
        }
        let mut lines = value.lines();
        if let Some(first) = lines.next() {
            println!("{field:width$}  {first}");
        }
        for line in lines {
            println!("{:width$}  {line}", "");
        }
    }
}

fn render_not_found(cli: &Cli, term: &str, suggestions: &[String]) {
    if cli.json {
        let result = JsonResult {
            term: term.to_string(),
            data: None,
            suggestions: (!suggestions.is_empty()).then(|| suggestions.to_vec()),
            error: Some("term not found".to_string()),
        };
        match serde_json::to_string_pretty(&result) {
            Ok(json) => println!("{json}"),
            Err(err) => eprintln!("error generating JSON: {err}"),
        }
        return;
    }

    println!("term '{term}' not found");
    if !suggestions.is_empty() {
        println!("did you mean: {}", suggestions.join(", "));
    }
}

/// Turn the literal \n, \r and \t sequences stored in source data back into
/// real control characters for display.
fn unescape(value: &str) -> String {
    value
        .replace("\\n", "\n")
        .replace("\\r", "\r")
        .replace("\\t", "\t")
}

/// Search PATH directories for the store, then fall back to the cache dir.
fn resolve_db_path() -> Result<PathBuf> {
    if let Some(path_env) = env::var_os("PATH") {
        for dir in env::split_paths(&path_env) {
            let candidate = dir.join(DEFAULT_STORE_NAME);
            if candidate.exists() {
                return Ok(candidate);
            }
        }
    }

    let home = env::var_os("HOME").context("HOME is not set and --db was not given")?;
    let candidate = PathBuf::from(home)
        .join(".cache")
        .join("lexstore")
        .join(DEFAULT_STORE_NAME);
    if candidate.exists() {
        return Ok(candidate);
    }
    bail!(
        "'{DEFAULT_STORE_NAME}' not found in PATH directories or in $HOME/.cache/lexstore; \
         run lexload first or pass --db"
    );
}
