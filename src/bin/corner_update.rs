use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;

use corner_scout::config::{AppConfig, load_dotenv};
use corner_scout::db_update::{JsonExportUpdater, stage_batch};
use corner_scout::workspace::Workspace;

fn main() -> Result<()> {
    load_dotenv();
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let args = std::env::args().skip(1).collect::<Vec<_>>();
    let mut config = AppConfig::from_env();
    if let Some(data) = arg_value(&args, "--data") {
        config.data_root = PathBuf::from(data);
    }
    let uploads = arg_value(&args, "--uploads")
        .map(PathBuf::from)
        .context("pass --uploads <dir or file.json>")?;
    let files = upload_files(&uploads)?;

    let batch = stage_batch(&config.uploads_root(), &files)?;
    println!("Staged {} JSON files in {}", batch.json_files, batch.dir.display());

    let mut ws = Workspace::open(config).context("unable to load corner dataset")?;
    let updater = JsonExportUpdater::new(ws.zones().clone());
    let report = ws.apply_update(&updater, &batch)?;

    println!("Database updated");
    println!("Files processed: {}", report.files_processed);
    println!("Corner events added: {}", report.added_events_all);
    println!("Sequence events added: {}", report.added_events_full);
    println!("Header rows added: {}", report.headers_net_new_rows);
    println!("Dataset version: {}", ws.dataset_version());
    if !report.errors.is_empty() {
        println!("Errors: {}", report.errors.len());
        for err in report.errors.iter().take(8) {
            println!(" - {err}");
        }
    }

    Ok(())
}

fn upload_files(path: &PathBuf) -> Result<Vec<PathBuf>> {
    if path.is_file() {
        return Ok(vec![path.clone()]);
    }
    let mut files = Vec::new();
    for entry in fs::read_dir(path).with_context(|| format!("read {}", path.display()))? {
        files.push(entry?.path());
    }
    files.sort();
    Ok(files)
}

fn arg_value(args: &[String], flag: &str) -> Option<String> {
    let prefix = format!("{flag}=");
    for (idx, arg) in args.iter().enumerate() {
        if let Some(value) = arg.strip_prefix(&prefix) {
            let trimmed = value.trim();
            if !trimmed.is_empty() {
                return Some(trimmed.to_string());
            }
        }
        if arg == flag {
            let Some(next) = args.get(idx + 1) else {
                continue;
            };
            if !next.trim().is_empty() {
                return Some(next.clone());
            }
        }
    }
    None
}
