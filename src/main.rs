use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use tracing_subscriber::EnvFilter;

use corner_scout::config::{AppConfig, load_dotenv};
use corner_scout::error::PipelineError;
use corner_scout::report::{ReportTemplate, WorkbookFiller, build_report_request, fill_report};
use corner_scout::workspace::Workspace;

const DEFAULT_WINDOW: usize = 5;

fn main() -> Result<()> {
    load_dotenv();
    init_tracing();

    let args = std::env::args().skip(1).collect::<Vec<_>>();
    let mut config = AppConfig::from_env();
    if let Some(out) = arg_value(&args, "--out") {
        config.output_dir = PathBuf::from(out);
    }

    let mut ws = Workspace::open(config).context("unable to load corner dataset")?;
    let teams = ws.team_options()?;

    if args.iter().any(|a| a == "--list-teams") {
        for team in &teams {
            println!("{team} ({} matches)", ws.team_match_count(team.as_str()));
        }
        match ws.latest_match() {
            Some((date, name)) => {
                println!("Latest match in dataset: {} - {name}", date.format("%d-%m-%Y"))
            }
            None => println!("Latest match in dataset: -"),
        }
        return Ok(());
    }

    let Some(team) = arg_value(&args, "--team") else {
        bail!("pass --team <name> (or --list-teams to see the options)");
    };
    let requested = match arg_value(&args, "--last") {
        Some(raw) => raw
            .trim()
            .parse::<usize>()
            .with_context(|| format!("invalid --last value: {raw}"))?,
        None => DEFAULT_WINDOW,
    };

    let result = match ws.analyze(&team, requested) {
        Ok(result) => result,
        Err(err @ PipelineError::NoMatches { .. }) => {
            eprintln!("[WARN] {err}");
            return Ok(());
        }
        Err(err) => return Err(err.into()),
    };

    let template = match ws.config().template_path.as_deref() {
        Some(path) => ReportTemplate::load(path)?,
        None => ReportTemplate::default(),
    };
    let theme = ws.theme_for(&result.team);
    let request = build_report_request(&result, &theme, ws.zones(), Path::new("."))?;
    let filled = fill_report(&WorkbookFiller::new(template), request).map_err(PipelineError::from)?;

    let out_dir = &ws.config().output_dir;
    fs::create_dir_all(out_dir).with_context(|| format!("create {}", out_dir.display()))?;
    let out_path = out_dir.join(&filled.file_name);
    fs::write(&out_path, &filled.bytes)
        .with_context(|| format!("write report {}", out_path.display()))?;

    let corners = &result.corners;
    println!("Corner report for {}", result.team);
    println!(
        "Window: {} ({} of {} matches)",
        result.window_label, result.matches_analyzed, result.team_total_matches
    );
    println!(
        "Own corners: {} left, {} right",
        corners.own_left_count, corners.own_right_count
    );
    println!(
        "Shots from own corners: {} left, {} right",
        corners.attacking_shots.left.total_shots, corners.attacking_shots.right.total_shots
    );
    if let Some(top) = result.takers.left.first().or(result.takers.right.first()) {
        println!("Top taker: {} ({} corners)", top.player, top.corners);
    }
    println!("Report: {}", out_path.display());

    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
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
