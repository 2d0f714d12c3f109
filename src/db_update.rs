use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow, bail};
use serde::Serialize;
use serde_json::Value;
use tempfile::NamedTempFile;

use crate::config::{CORNER_EVENTS_FILE, EVENT_SEQUENCES_FILE, HEADERS_FILE};
use crate::tabular::normalize_key;
use crate::zones::{Point, Role, ZoneConfig, normalize_corner};

pub const CORNER_EVENT_COLUMNS: &[&str] = &[
    "match_id",
    "match_date",
    "match_name",
    "eventId",
    "sequenceId",
    "teamName",
    "playerName",
    "startPosXM",
    "startPosYM",
    "endPosXM",
    "endPosYM",
    "resultName",
];

pub const SEQUENCE_COLUMNS: &[&str] = &[
    "match_id",
    "eventId",
    "sequenceId",
    "teamName",
    "playerName",
    "baseTypeId",
    "baseTypeName",
    "subTypeName",
    "bodyPartName",
    "resultName",
    "startPosXM",
    "startPosYM",
];

pub const HEADER_COLUMNS: &[&str] = &[
    "match_id",
    "eventId",
    "sequenceId",
    "playerName",
    "club",
    "zone",
    "outcome",
];

/// Outcome of one update run. `ok == false` means the data files must be
/// treated as unchanged.
#[derive(Debug, Clone, Default, Serialize)]
pub struct UpdateReport {
    pub ok: bool,
    pub added_events_all: usize,
    pub added_events_full: usize,
    pub headers_net_new_rows: usize,
    pub files_processed: usize,
    pub errors: Vec<String>,
    pub error: Option<String>,
}

impl UpdateReport {
    fn failed(error: impl Into<String>) -> Self {
        Self {
            ok: false,
            error: Some(error.into()),
            ..Self::default()
        }
    }
}

pub trait DatabaseUpdater {
    fn update(&self, uploads_dir: &Path, data_dir: &Path) -> UpdateReport;
}

type CsvRow = BTreeMap<&'static str, String>;

#[derive(Debug, Clone, Default)]
struct ExportEvent {
    event_id: String,
    sequence_id: Option<String>,
    team: Option<String>,
    player: Option<String>,
    base_type_id: Option<String>,
    base_type_name: Option<String>,
    sub_type_name: Option<String>,
    body_part_name: Option<String>,
    result_name: Option<String>,
    start: Option<Point>,
    end: Option<Point>,
}

impl ExportEvent {
    fn is_corner(&self) -> bool {
        self.sub_type_name
            .as_deref()
            .is_some_and(|s| s.to_ascii_uppercase().contains("CORNER"))
    }

    fn is_header(&self) -> bool {
        self.body_part_name
            .as_deref()
            .is_some_and(|s| s.to_ascii_uppercase().contains("HEAD"))
    }
}

#[derive(Debug, Clone)]
struct ExportMatch {
    match_id: String,
    date: Option<String>,
    name: Option<String>,
    events: Vec<ExportEvent>,
}

#[derive(Debug, Default)]
struct PendingRows {
    corners: Vec<CsvRow>,
    sequences: Vec<CsvRow>,
    headers: Vec<CsvRow>,
}

/// Appends corner rows from raw SciSports match exports (`metaData` + `data`)
/// to the three flat tables.
#[derive(Debug, Clone, Default)]
pub struct JsonExportUpdater {
    pub zones: ZoneConfig,
}

impl JsonExportUpdater {
    pub fn new(zones: ZoneConfig) -> Self {
        Self { zones }
    }

    fn run(&self, uploads_dir: &Path, data_dir: &Path) -> Result<UpdateReport> {
        let files = json_files_in(uploads_dir)?;
        if files.is_empty() {
            bail!("no JSON files in {}", uploads_dir.display());
        }

        let mut report = UpdateReport::default();
        let mut pending = PendingRows::default();
        for path in &files {
            match parse_export_file(path) {
                Ok(m) => {
                    self.collect_rows(&m, &mut pending);
                    report.files_processed += 1;
                }
                Err(err) => {
                    tracing::warn!(path = %path.display(), error = %format!("{err:#}"), "export skipped");
                    report.errors.push(format!("{}: {err:#}", path.display()));
                }
            }
        }
        if report.files_processed == 0 {
            bail!("none of the {} uploaded files could be parsed", files.len());
        }

        fs::create_dir_all(data_dir)
            .with_context(|| format!("create data dir {}", data_dir.display()))?;
        let corners = plan_append(
            &data_dir.join(CORNER_EVENTS_FILE),
            CORNER_EVENT_COLUMNS,
            &pending.corners,
        )?;
        let sequences = plan_append(
            &data_dir.join(EVENT_SEQUENCES_FILE),
            SEQUENCE_COLUMNS,
            &pending.sequences,
        )?;
        let headers = plan_append(&data_dir.join(HEADERS_FILE), HEADER_COLUMNS, &pending.headers)?;
        report.added_events_all = corners.fresh.len();
        report.added_events_full = sequences.fresh.len();
        report.headers_net_new_rows = headers.fresh.len();
        commit_appends(data_dir, [corners, sequences, headers])?;
        report.ok = true;
        Ok(report)
    }

    fn collect_rows(&self, m: &ExportMatch, out: &mut PendingRows) {
        let corners: BTreeMap<&str, &ExportEvent> = m
            .events
            .iter()
            .filter(|ev| ev.is_corner())
            .filter_map(|ev| ev.sequence_id.as_deref().map(|seq| (seq, ev)))
            .collect();

        for ev in m.events.iter().filter(|ev| ev.is_corner()) {
            let mut row = base_row(m, ev);
            row.insert("match_date", m.date.clone().unwrap_or_default());
            row.insert("match_name", m.name.clone().unwrap_or_default());
            row.insert("teamName", ev.team.clone().unwrap_or_default());
            row.insert("playerName", ev.player.clone().unwrap_or_default());
            insert_point(&mut row, "startPosXM", "startPosYM", ev.start);
            insert_point(&mut row, "endPosXM", "endPosYM", ev.end);
            row.insert("resultName", ev.result_name.clone().unwrap_or_default());
            out.corners.push(row);
        }

        for ev in &m.events {
            let Some(corner) = ev.sequence_id.as_deref().and_then(|seq| corners.get(seq)) else {
                continue;
            };
            let mut row = base_row(m, ev);
            row.insert("teamName", ev.team.clone().unwrap_or_default());
            row.insert("playerName", ev.player.clone().unwrap_or_default());
            row.insert("baseTypeId", ev.base_type_id.clone().unwrap_or_default());
            row.insert("baseTypeName", ev.base_type_name.clone().unwrap_or_default());
            row.insert("subTypeName", ev.sub_type_name.clone().unwrap_or_default());
            row.insert("bodyPartName", ev.body_part_name.clone().unwrap_or_default());
            row.insert("resultName", ev.result_name.clone().unwrap_or_default());
            insert_point(&mut row, "startPosXM", "startPosYM", ev.start);
            out.sequences.push(row);

            if ev.is_header() && !ev.is_corner() {
                let mut row = base_row(m, ev);
                row.insert("playerName", ev.player.clone().unwrap_or_default());
                row.insert("club", ev.team.clone().unwrap_or_default());
                row.insert("zone", self.header_zone(corner, ev).unwrap_or_default());
                row.insert("outcome", header_outcome(ev.result_name.as_deref()).to_string());
                out.headers.push(row);
            }
        }
    }

    /// Zone of a headed contact in the frame of the corner that produced it.
    fn header_zone(&self, corner: &ExportEvent, header: &ExportEvent) -> Option<String> {
        let normalized = normalize_corner(corner.start?, header.start)?;
        let role = if corner.team == header.team {
            Role::Attacking
        } else {
            Role::Defensive
        };
        self.zones
            .layout(role, normalized.side)
            .assign(normalized.end?)
            .map(str::to_string)
    }
}

impl DatabaseUpdater for JsonExportUpdater {
    fn update(&self, uploads_dir: &Path, data_dir: &Path) -> UpdateReport {
        match self.run(uploads_dir, data_dir) {
            Ok(report) => {
                tracing::info!(
                    files = report.files_processed,
                    corners = report.added_events_all,
                    sequences = report.added_events_full,
                    headers = report.headers_net_new_rows,
                    "database updated"
                );
                report
            }
            Err(err) => {
                tracing::warn!(error = %format!("{err:#}"), "database update failed");
                UpdateReport::failed(format!("{err:#}"))
            }
        }
    }
}

fn header_outcome(result: Option<&str>) -> &'static str {
    match result.map(|r| r.trim().to_ascii_uppercase()) {
        Some(r) if r == "SUCCESSFUL" || r == "SUCCESS" || r == "WON" => "won",
        _ => "lost",
    }
}

fn base_row(m: &ExportMatch, ev: &ExportEvent) -> CsvRow {
    let mut row = CsvRow::new();
    row.insert("match_id", m.match_id.clone());
    row.insert("eventId", ev.event_id.clone());
    row.insert("sequenceId", ev.sequence_id.clone().unwrap_or_default());
    row
}

fn insert_point(row: &mut CsvRow, x_col: &'static str, y_col: &'static str, p: Option<Point>) {
    let (x, y) = p
        .map(|p| (p.x.to_string(), p.y.to_string()))
        .unwrap_or_default();
    row.insert(x_col, x);
    row.insert(y_col, y);
}

fn json_files_in(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir).with_context(|| format!("read {}", dir.display()))? {
        let path = entry?.path();
        if path.is_file() && has_json_extension(&path) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

fn has_json_extension(path: &Path) -> bool {
    has_extension(path, "json")
}

fn has_extension(path: &Path, wanted: &str) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case(wanted))
}

fn parse_export_file(path: &Path) -> Result<ExportMatch> {
    let raw = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let v: Value = serde_json::from_str(&raw).context("invalid export json")?;
    parse_export(&v).ok_or_else(|| anyhow!("missing metaData.id or data array"))
}

fn parse_export(v: &Value) -> Option<ExportMatch> {
    let meta = v.get("metaData")?;
    let match_id = meta.get("id").and_then(value_text)?;
    let events = v
        .get("data")?
        .as_array()?
        .iter()
        .filter_map(parse_event)
        .collect();
    Some(ExportMatch {
        match_id,
        date: meta
            .get("date")
            .or_else(|| meta.get("matchDate"))
            .and_then(value_text),
        name: meta.get("name").and_then(value_text),
        events,
    })
}

fn parse_event(v: &Value) -> Option<ExportEvent> {
    let text = |key: &str| v.get(key).and_then(value_text);
    let point = |x: &str, y: &str| {
        Some(Point {
            x: v.get(x)?.as_f64()?,
            y: v.get(y)?.as_f64()?,
        })
    };
    Some(ExportEvent {
        event_id: text("eventId")?,
        sequence_id: text("sequenceId"),
        team: text("teamName"),
        player: text("playerName"),
        base_type_id: text("baseTypeId"),
        base_type_name: text("baseTypeName"),
        sub_type_name: text("subTypeName"),
        body_part_name: text("bodyPartName"),
        result_name: text("resultName"),
        start: point("startPosXM", "startPosYM"),
        end: point("endPosXM", "endPosYM"),
    })
}

fn value_text(v: &Value) -> Option<String> {
    match v {
        Value::String(s) => normalize_key(s),
        Value::Number(n) => normalize_key(&n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Rows to add to one table, in the existing file's column order.
#[derive(Debug)]
struct PlannedAppend {
    path: PathBuf,
    columns: Vec<String>,
    exists: bool,
    fresh: Vec<Vec<String>>,
}

impl PlannedAppend {
    fn is_noop(&self) -> bool {
        self.exists && self.fresh.is_empty()
    }
}

/// Collects rows not already present, following the existing file's header
/// order. Rows are keyed by `(match_id, eventId)`, or by every column when the
/// file has no `eventId`. Nothing is written.
fn plan_append(path: &Path, default_columns: &[&str], rows: &[CsvRow]) -> Result<PlannedAppend> {
    let exists = path.exists();
    let (columns, mut seen) = if exists {
        existing_keys(path)?
    } else {
        (
            default_columns.iter().map(|c| c.to_string()).collect::<Vec<_>>(),
            HashSet::new(),
        )
    };
    let key_columns = key_columns(&columns);

    let fresh = rows
        .iter()
        .map(|row| {
            columns
                .iter()
                .map(|c| row.get(c.as_str()).cloned().unwrap_or_default())
                .collect::<Vec<_>>()
        })
        .filter(|record: &Vec<String>| {
            seen.insert(row_key(&key_columns, move |i| record[i].as_str()))
        })
        .collect();
    Ok(PlannedAppend {
        path: path.to_path_buf(),
        columns,
        exists,
        fresh,
    })
}

/// Writes every table to a temp file in `data_dir`, then renames them into
/// place. A failure before the renames leaves all tables untouched.
fn commit_appends<const N: usize>(data_dir: &Path, plans: [PlannedAppend; N]) -> Result<()> {
    let mut staged = Vec::with_capacity(N);
    for plan in plans.into_iter().filter(|p| !p.is_noop()) {
        let tmp = write_with_appended(data_dir, &plan)?;
        staged.push((tmp, plan.path));
    }
    for (tmp, path) in staged {
        tmp.persist(&path)
            .map_err(|err| err.error)
            .with_context(|| format!("replace {}", path.display()))?;
    }
    Ok(())
}

fn write_with_appended(data_dir: &Path, plan: &PlannedAppend) -> Result<NamedTempFile> {
    let mut tmp = NamedTempFile::new_in(data_dir)
        .with_context(|| format!("create temp file in {}", data_dir.display()))?;
    if plan.exists {
        let mut current =
            fs::read(&plan.path).with_context(|| format!("read {}", plan.path.display()))?;
        if !current.is_empty() && !current.ends_with(b"\n") {
            current.push(b'\n');
        }
        tmp.write_all(&current)?;
    }
    {
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(tmp.as_file_mut());
        if !plan.exists {
            writer.write_record(&plan.columns)?;
        }
        for record in &plan.fresh {
            writer
                .write_record(record)
                .with_context(|| format!("append to {}", plan.path.display()))?;
        }
        writer.flush()?;
    }
    Ok(tmp)
}

fn key_columns(columns: &[String]) -> Vec<usize> {
    let position = |name: &str| columns.iter().position(|c| c == name);
    match (position("match_id"), position("eventId")) {
        (Some(m), Some(e)) => vec![m, e],
        _ => (0..columns.len()).collect(),
    }
}

fn row_key<'a>(key_columns: &[usize], cell: impl Fn(usize) -> &'a str) -> Vec<String> {
    key_columns
        .iter()
        .map(|&i| normalize_key(cell(i)).unwrap_or_default())
        .collect()
}

fn existing_keys(path: &Path) -> Result<(Vec<String>, HashSet<Vec<String>>)> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("open {}", path.display()))?;
    let columns: Vec<String> = reader
        .headers()?
        .iter()
        .map(|h| h.trim_start_matches('\u{feff}').trim().to_string())
        .collect();
    let key_columns = key_columns(&columns);
    let mut seen = HashSet::new();
    for record in reader.records() {
        let Ok(record) = record else {
            continue;
        };
        seen.insert(row_key(&key_columns, |i| record.get(i).unwrap_or("")));
    }
    Ok((columns, seen))
}

#[derive(Debug, Clone)]
pub struct StagedBatch {
    pub dir: PathBuf,
    pub json_files: usize,
}

/// Copies the `.json` files among `files` into a fresh
/// `batch_<YYYYmmdd_HHMMSS>` directory under `uploads_root`. `.zip` archives
/// are unpacked: their JSON members land flat in the batch directory.
pub fn stage_batch(uploads_root: &Path, files: &[PathBuf]) -> Result<StagedBatch> {
    let dir = create_batch_dir(uploads_root)?;
    match copy_uploads(&dir, files) {
        Ok(json_files) if json_files > 0 => Ok(StagedBatch { dir, json_files }),
        Ok(_) => {
            let _ = fs::remove_dir_all(&dir);
            bail!("no JSON files found among {} uploads", files.len());
        }
        Err(err) => {
            let _ = fs::remove_dir_all(&dir);
            Err(err)
        }
    }
}

const MAX_BATCHES_PER_SECOND: u32 = 100;

/// Picks `batch_<stamp>`, or `batch_<stamp>_<n>` when that name is taken.
fn create_batch_dir(uploads_root: &Path) -> Result<PathBuf> {
    fs::create_dir_all(uploads_root)
        .with_context(|| format!("create {}", uploads_root.display()))?;
    let stamp = chrono::Utc::now().format("%Y%m%d_%H%M%S").to_string();
    for n in 1..=MAX_BATCHES_PER_SECOND {
        let name = if n == 1 {
            format!("batch_{stamp}")
        } else {
            format!("batch_{stamp}_{n}")
        };
        let dir = uploads_root.join(name);
        match fs::create_dir(&dir) {
            Ok(()) => return Ok(dir),
            Err(err) if err.kind() == io::ErrorKind::AlreadyExists => continue,
            Err(err) => {
                return Err(err).with_context(|| format!("create {}", dir.display()));
            }
        }
    }
    bail!("too many upload batches staged at {stamp}")
}

fn copy_uploads(dir: &Path, files: &[PathBuf]) -> Result<usize> {
    let mut json_files = 0usize;
    for src in files {
        let Some(name) = src.file_name() else {
            continue;
        };
        if has_json_extension(src) {
            fs::copy(src, dir.join(name)).with_context(|| format!("stage {}", src.display()))?;
            json_files += 1;
        } else if has_extension(src, "zip") {
            json_files += unpack_json_members(src, dir)?;
        }
    }
    Ok(json_files)
}

/// Extracts JSON members of a zip archive, dropping their directory part.
fn unpack_json_members(archive_path: &Path, dir: &Path) -> Result<usize> {
    let file = fs::File::open(archive_path)
        .with_context(|| format!("open {}", archive_path.display()))?;
    let mut archive = zip::ZipArchive::new(file)
        .with_context(|| format!("read zip {}", archive_path.display()))?;
    let mut extracted = 0usize;
    for idx in 0..archive.len() {
        let mut member = archive
            .by_index(idx)
            .with_context(|| format!("read member {idx} of {}", archive_path.display()))?;
        if member.is_dir() {
            continue;
        }
        let Some(name) = Path::new(member.name()).file_name().map(|n| n.to_owned()) else {
            continue;
        };
        if !has_json_extension(Path::new(&name)) {
            continue;
        }
        let out_path = dir.join(&name);
        let mut out = fs::File::create(&out_path)
            .with_context(|| format!("create {}", out_path.display()))?;
        io::copy(&mut member, &mut out)
            .with_context(|| format!("extract {}", member.name()))?;
        extracted += 1;
    }
    tracing::debug!(archive = %archive_path.display(), extracted, "unpacked upload archive");
    Ok(extracted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn export_values_normalize_like_table_keys() {
        assert_eq!(value_text(&json!(123.0)).as_deref(), Some("123"));
        assert_eq!(value_text(&json!("77")).as_deref(), Some("77"));
        assert_eq!(value_text(&json!(null)), None);
    }

    #[test]
    fn outcome_mapping() {
        assert_eq!(header_outcome(Some("SUCCESSFUL")), "won");
        assert_eq!(header_outcome(Some("UNSUCCESSFUL")), "lost");
        assert_eq!(header_outcome(None), "lost");
    }

    #[test]
    fn events_without_id_are_dropped() {
        let m = parse_export(&json!({
            "metaData": { "id": 9, "name": "A - B" },
            "data": [ { "eventId": 1 }, { "teamName": "A" } ]
        }))
        .unwrap();
        assert_eq!(m.match_id, "9");
        assert_eq!(m.events.len(), 1);
    }
}
