use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};

use anyhow::Result;
use chrono::{DateTime, NaiveDate, NaiveDateTime};

use crate::config::{CORNER_EVENTS_FILE, EVENT_SEQUENCES_FILE, HEADERS_FILE};
use crate::error::PipelineError;
use crate::shot_index::{ShotIndex, build_shot_index};
use crate::tabular::{Table, normalize_cell, normalize_key, parse_f64, parse_i64, read_table};
use crate::team_canon::{CanonicalTeam, TeamCanonicalizer, is_not_applicable};
use crate::zones::Point;

const SEQUENCE_COLUMNS: &[&str] = &["sequenceId", "corner_sequence_id"];

#[derive(Debug, Clone)]
pub struct DataPaths {
    pub corner_events: PathBuf,
    pub sequences: PathBuf,
    pub headers: PathBuf,
}

impl DataPaths {
    pub fn under(root: &Path) -> Self {
        Self {
            corner_events: root.join(CORNER_EVENTS_FILE),
            sequences: root.join(EVENT_SEQUENCES_FILE),
            headers: root.join(HEADERS_FILE),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RawEvent {
    pub match_id: String,
    pub sequence_id: Option<String>,
    pub ordinal: u32,
    pub team_raw: String,
    pub team: Option<CanonicalTeam>,
    pub player: Option<String>,
    pub start: Option<Point>,
    pub end: Option<Point>,
    pub result: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Match {
    pub id: String,
    pub date: Option<NaiveDateTime>,
    pub name: Option<String>,
    pub events: Vec<RawEvent>,
    pub teams_canon: BTreeSet<CanonicalTeam>,
    pub teams_raw: BTreeSet<String>,
}

impl Match {
    fn new(id: String) -> Self {
        Self {
            id,
            date: None,
            name: None,
            events: Vec::new(),
            teams_canon: BTreeSet::new(),
            teams_raw: BTreeSet::new(),
        }
    }

    fn push(&mut self, event: RawEvent) {
        if let Some(team) = event.team.as_ref() {
            self.teams_canon.insert(team.clone());
        }
        if !event.team_raw.is_empty() {
            self.teams_raw.insert(event.team_raw.clone());
        }
        self.events.push(event);
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SequenceRecord {
    pub match_id: String,
    pub sequence_id: String,
    pub base_type_name: Option<String>,
    pub base_type_id: Option<i64>,
    pub team_raw: Option<String>,
    pub player: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HeaderRecord {
    pub match_id: String,
    pub sequence_id: Option<String>,
    pub player: String,
    pub club_raw: Option<String>,
    pub zone: Option<String>,
    pub won: bool,
}

#[derive(Debug, Clone, Default)]
pub struct LoadReport {
    pub corner_rows: usize,
    pub corner_skipped: usize,
    pub sequence_rows: usize,
    pub sequence_skipped: usize,
    pub header_rows: usize,
    pub header_skipped: usize,
}

#[derive(Debug, Clone, Default)]
pub struct CornerDataset {
    pub matches: Vec<Match>,
    pub sequences: Vec<SequenceRecord>,
    pub headers: Option<Vec<HeaderRecord>>,
    pub shot_index: ShotIndex,
    pub report: LoadReport,
}

impl CornerDataset {
    pub fn find_match(&self, id: &str) -> Option<&Match> {
        self.matches.iter().find(|m| m.id == id)
    }
}

pub fn load_dataset(
    paths: &DataPaths,
    canon: &TeamCanonicalizer,
    shot_type_id: i64,
) -> Result<CornerDataset, PipelineError> {
    if !paths.corner_events.exists() {
        return Err(PipelineError::MissingSource {
            path: paths.corner_events.clone(),
        });
    }

    let (corners, (sequences, headers)) = rayon::join(
        || load_corner_events(&paths.corner_events, canon),
        || {
            rayon::join(
                || load_optional(&paths.sequences, load_sequences),
                || load_optional(&paths.headers, load_headers),
            )
        },
    );

    let (matches, corner_report) = corners?;
    let (sequences, sequence_report) = sequences?.unwrap_or_default();
    let headers = headers?;

    let mut report = LoadReport {
        corner_rows: corner_report.0,
        corner_skipped: corner_report.1,
        sequence_rows: sequence_report.0,
        sequence_skipped: sequence_report.1,
        ..LoadReport::default()
    };
    let headers = headers.map(|(rows, (kept, skipped))| {
        report.header_rows = kept;
        report.header_skipped = skipped;
        rows
    });

    let shot_index = build_shot_index(&sequences, shot_type_id);
    tracing::info!(
        matches = matches.len(),
        corners = report.corner_rows,
        sequences = report.sequence_rows,
        shot_sequences = shot_index.len(),
        headers = headers.as_ref().map(|h| h.len()),
        "loaded corner dataset"
    );

    Ok(CornerDataset {
        matches,
        sequences,
        headers,
        shot_index,
        report,
    })
}

type Counts = (usize, usize);

fn load_optional<T>(
    path: &Path,
    load: fn(&Path) -> Result<(T, Counts), PipelineError>,
) -> Result<Option<(T, Counts)>, PipelineError> {
    if !path.exists() {
        tracing::warn!(path = %path.display(), "optional data source missing");
        return Ok(None);
    }
    load(path).map(Some)
}

fn read_source(path: &Path) -> Result<Table, PipelineError> {
    read_table(path).map_err(|source| PipelineError::Unreadable {
        path: path.to_path_buf(),
        source,
    })
}

fn required_column(table: &Table, path: &Path, names: &[&str]) -> Result<usize, PipelineError> {
    table
        .first_column(names)
        .ok_or_else(|| PipelineError::MissingColumn {
            path: path.to_path_buf(),
            column: names.join("|"),
        })
}

pub fn load_corner_events(
    path: &Path,
    canon: &TeamCanonicalizer,
) -> Result<(Vec<Match>, Counts), PipelineError> {
    let table = read_source(path)?;
    let match_col = required_column(&table, path, &["match_id"])?;
    let team_col = required_column(&table, path, &["teamName"])?;
    let seq_col = table.first_column(SEQUENCE_COLUMNS);
    let ordinal_col = table.first_column(&["eventId", "event_ordinal"]);
    let date_col = table.first_column(&["match_date", "date"]);
    let name_col = table.first_column(&["match_name", "matchName"]);
    let player_col = table.first_column(&["playerName"]);
    let result_col = table.first_column(&["resultName"]);
    let start_x = table.column("startPosXM");
    let start_y = table.column("startPosYM");
    let end_x = table.column("endPosXM");
    let end_y = table.column("endPosYM");

    let mut matches: Vec<Match> = Vec::new();
    let mut by_id: HashMap<String, usize> = HashMap::new();
    let mut skipped = table.skipped();
    let mut kept = 0usize;

    for row in table.rows() {
        let Some(match_id) = row.get(match_col).and_then(normalize_key) else {
            skipped += 1;
            continue;
        };
        let Some(team_raw) = row.get(team_col) else {
            skipped += 1;
            continue;
        };

        let idx = *by_id.entry(match_id.clone()).or_insert_with(|| {
            matches.push(Match::new(match_id.clone()));
            matches.len() - 1
        });
        let m = &mut matches[idx];

        if m.date.is_none() {
            m.date = row.get_opt(date_col).and_then(parse_match_date);
        }
        if m.name.is_none() {
            m.name = row.get_opt(name_col).map(str::to_string);
        }

        let ordinal = parse_i64(row.get_opt(ordinal_col))
            .and_then(|v| u32::try_from(v).ok())
            .unwrap_or(m.events.len() as u32);
        let event = RawEvent {
            match_id,
            sequence_id: row.get_opt(seq_col).and_then(normalize_key),
            ordinal,
            team_raw: team_raw.to_string(),
            team: canon.canonicalize(team_raw),
            player: row.get_opt(player_col).map(str::to_string),
            start: point(parse_f64(row.get_opt(start_x)), parse_f64(row.get_opt(start_y))),
            end: point(parse_f64(row.get_opt(end_x)), parse_f64(row.get_opt(end_y))),
            result: row.get_opt(result_col).map(str::to_string),
        };
        m.push(event);
        kept += 1;
    }

    Ok((matches, (kept, skipped)))
}

/// Missing id or base-type columns yield no records rather than an error.
pub fn load_sequences(path: &Path) -> Result<(Vec<SequenceRecord>, Counts), PipelineError> {
    let table = read_source(path)?;
    let (Some(match_col), Some(seq_col)) =
        (table.column("match_id"), table.first_column(SEQUENCE_COLUMNS))
    else {
        tracing::warn!(path = %path.display(), "sequence table lacks id columns");
        return Ok((Vec::new(), (0, table.len())));
    };
    let name_col = table.column("baseTypeName");
    let code_col = table.column("baseTypeId");
    if name_col.is_none() && code_col.is_none() {
        tracing::warn!(path = %path.display(), "sequence table lacks base type columns");
    }
    let team_col = table.column("teamName");
    let player_col = table.column("playerName");

    let mut out = Vec::with_capacity(table.len());
    let mut skipped = table.skipped();
    for row in table.rows() {
        let (Some(match_id), Some(sequence_id)) = (
            row.get(match_col).and_then(normalize_key),
            row.get(seq_col).and_then(normalize_key),
        ) else {
            skipped += 1;
            continue;
        };
        out.push(SequenceRecord {
            match_id,
            sequence_id,
            base_type_name: row.get_opt(name_col).map(str::to_string),
            base_type_id: parse_i64(row.get_opt(code_col)),
            team_raw: row.get_opt(team_col).map(str::to_string),
            player: row.get_opt(player_col).map(str::to_string),
        });
    }
    let kept = out.len();
    Ok((out, (kept, skipped)))
}

pub fn load_headers(path: &Path) -> Result<(Vec<HeaderRecord>, Counts), PipelineError> {
    let table = read_source(path)?;
    let match_col = required_column(&table, path, &["match_id"])?;
    let player_col = required_column(&table, path, &["playerName", "player"])?;
    let seq_col = table.first_column(SEQUENCE_COLUMNS);
    let club_col = table.first_column(&["club", "teamName"]);
    let zone_col = table.column("zone");
    let outcome_col = table.first_column(&["outcome", "resultName"]);

    let mut out = Vec::with_capacity(table.len());
    let mut skipped = table.skipped();
    for row in table.rows() {
        let (Some(match_id), Some(player)) =
            (row.get(match_col).and_then(normalize_key), row.get(player_col))
        else {
            skipped += 1;
            continue;
        };
        out.push(HeaderRecord {
            match_id,
            sequence_id: row.get_opt(seq_col).and_then(normalize_key),
            player: player.to_string(),
            club_raw: row.get_opt(club_col).map(str::to_string),
            zone: row.get_opt(zone_col).map(str::to_string),
            won: row.get_opt(outcome_col).is_some_and(is_won_outcome),
        });
    }
    let kept = out.len();
    Ok((out, (kept, skipped)))
}

fn is_won_outcome(raw: &str) -> bool {
    matches!(
        raw.trim().to_ascii_lowercase().as_str(),
        "won" | "win" | "successful" | "success" | "true" | "1" | "yes"
    )
}

fn point(x: Option<f64>, y: Option<f64>) -> Option<Point> {
    Some(Point { x: x?, y: y? })
}

pub fn parse_match_date(raw: &str) -> Option<NaiveDateTime> {
    let s = normalize_cell(raw)?;
    if let Ok(dt) = DateTime::parse_from_rfc3339(&s) {
        return Some(dt.naive_utc());
    }
    for fmt in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(&s, fmt) {
            return Some(dt);
        }
    }
    for fmt in ["%Y-%m-%d", "%d-%m-%Y", "%d/%m/%Y"] {
        if let Ok(d) = NaiveDate::parse_from_str(&s, fmt) {
            return d.and_hms_opt(0, 0, 0);
        }
    }
    None
}

/// Sorted canonical teams present among corner events.
pub fn canonical_team_options(matches: &[Match]) -> Vec<CanonicalTeam> {
    let mut out = BTreeSet::new();
    for m in matches {
        for ev in &m.events {
            if is_not_applicable(&ev.team_raw) {
                continue;
            }
            if let Some(team) = ev.team.as_ref() {
                out.insert(team.clone());
            }
        }
    }
    out.into_iter().collect()
}

/// Latest dated match and its display name.
pub fn latest_match_info(matches: &[Match]) -> Option<(NaiveDateTime, String)> {
    let latest = matches
        .iter()
        .filter(|m| m.date.is_some())
        .max_by(|a, b| a.date.cmp(&b.date).then_with(|| b.id.cmp(&a.id)))?;
    let name = latest.name.clone().unwrap_or_else(|| {
        latest
            .teams_raw
            .iter()
            .cloned()
            .collect::<Vec<_>>()
            .join(" - ")
    });
    Some((latest.date?, name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_common_date_shapes() {
        let expected = NaiveDate::from_ymd_opt(2024, 8, 9).unwrap();
        for raw in [
            "2024-08-09",
            "09-08-2024",
            "09/08/2024",
            "2024-08-09 18:45:00",
            "2024-08-09T18:45:00",
            "2024-08-09T18:45:00Z",
        ] {
            let dt = parse_match_date(raw).unwrap_or_else(|| panic!("{raw} should parse"));
            assert_eq!(dt.date(), expected, "{raw}");
        }
        assert!(parse_match_date("yesterday").is_none());
        assert!(parse_match_date("NaT").is_none());
    }

    #[test]
    fn outcome_spellings() {
        assert!(is_won_outcome("Won"));
        assert!(is_won_outcome("SUCCESSFUL"));
        assert!(!is_won_outcome("lost"));
        assert!(!is_won_outcome("UNSUCCESSFUL"));
    }
}
