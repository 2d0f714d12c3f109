use std::collections::HashMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use parquet::file::reader::{FileReader, SerializedFileReader};
use parquet::record::Field;

const NULL_MARKERS: &[&str] = &[
    "nan", "none", "null", "n/a", "#n/a", "<na>", "nat",
];

/// Row-oriented table with named columns. Cells are already null-normalized.
#[derive(Debug, Clone, Default)]
pub struct Table {
    columns: Vec<String>,
    index: HashMap<String, usize>,
    rows: Vec<Vec<Option<String>>>,
    skipped: usize,
}

#[derive(Debug, Clone, Copy)]
pub struct Row<'a> {
    cells: &'a [Option<String>],
}

impl<'a> Row<'a> {
    pub fn get(&self, col: usize) -> Option<&'a str> {
        self.cells.get(col)?.as_deref()
    }

    pub fn get_opt(&self, col: Option<usize>) -> Option<&'a str> {
        self.get(col?)
    }
}

impl Table {
    pub fn new(columns: Vec<String>) -> Self {
        let index = columns
            .iter()
            .enumerate()
            .map(|(idx, name)| (name.trim().to_string(), idx))
            .collect();
        Self {
            columns,
            index,
            rows: Vec::new(),
            skipped: 0,
        }
    }

    /// Appends raw cells, normalizing null markers. Rows with the wrong arity
    /// are counted as skipped instead.
    pub fn push_raw<S: AsRef<str>>(&mut self, cells: &[S]) -> bool {
        if cells.len() != self.columns.len() {
            self.skipped += 1;
            return false;
        }
        self.rows
            .push(cells.iter().map(|c| normalize_cell(c.as_ref())).collect());
        true
    }

    fn push_normalized(&mut self, cells: Vec<Option<String>>) {
        self.rows.push(cells);
    }

    pub fn mark_skipped(&mut self) {
        self.skipped += 1;
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn column(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// First column present among `names`, in preference order.
    pub fn first_column(&self, names: &[&str]) -> Option<usize> {
        names.iter().find_map(|name| self.column(name))
    }

    pub fn rows(&self) -> impl Iterator<Item = Row<'_>> + '_ {
        self.rows.iter().map(|cells| Row { cells })
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn skipped(&self) -> usize {
        self.skipped
    }
}

pub fn read_table(path: &Path) -> Result<Table> {
    let is_parquet = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("parquet"));
    if is_parquet {
        read_parquet(path)
    } else {
        read_csv(path)
    }
}

fn read_csv(path: &Path) -> Result<Table> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("open csv {}", path.display()))?;
    let headers = reader
        .headers()
        .with_context(|| format!("read csv header {}", path.display()))?
        .iter()
        .map(|h| h.trim_start_matches('\u{feff}').trim().to_string())
        .collect::<Vec<_>>();

    let mut table = Table::new(headers);
    for record in reader.records() {
        let Ok(record) = record else {
            table.mark_skipped();
            continue;
        };
        let cells = record.iter().collect::<Vec<_>>();
        table.push_raw(&cells);
    }
    if table.skipped() > 0 {
        tracing::debug!(
            path = %path.display(),
            skipped = table.skipped(),
            "skipped malformed csv rows"
        );
    }
    Ok(table)
}

fn read_parquet(path: &Path) -> Result<Table> {
    let file = fs::File::open(path).with_context(|| format!("open {}", path.display()))?;
    let reader = SerializedFileReader::new(file).context("open parquet reader")?;
    let columns = reader
        .metadata()
        .file_metadata()
        .schema_descr()
        .root_schema()
        .get_fields()
        .iter()
        .map(|f| f.name().to_string())
        .collect::<Vec<_>>();
    let iter = reader.get_row_iter(None).context("iterate parquet rows")?;

    let mut table = Table::new(columns);
    for row in iter {
        let Ok(row) = row else {
            table.mark_skipped();
            continue;
        };
        let mut cells = vec![None; table.columns.len()];
        for (name, field) in row.get_column_iter() {
            if let Some(idx) = table.column(name) {
                cells[idx] = field_to_cell(field);
            }
        }
        table.push_normalized(cells);
    }
    Ok(table)
}

fn field_to_cell(field: &Field) -> Option<String> {
    match field {
        Field::Null => None,
        Field::Str(s) => normalize_cell(s),
        Field::Float(v) if v.is_nan() => None,
        Field::Double(v) if v.is_nan() => None,
        other => normalize_cell(&other.to_string()),
    }
}

/// Trims and maps every vendor null spelling to `None`.
pub fn normalize_cell(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    if NULL_MARKERS
        .iter()
        .any(|marker| trimmed.eq_ignore_ascii_case(marker))
    {
        return None;
    }
    Some(trimmed.to_string())
}

/// Join-key normalization: integral floats (`"123.0"`) become `"123"`.
pub fn normalize_key(raw: &str) -> Option<String> {
    let cell = normalize_cell(raw)?;
    if cell.contains(['.', 'e', 'E'])
        && let Ok(v) = cell.parse::<f64>()
        && v.is_finite()
        && v.fract() == 0.0
        && v.abs() < 1e15
    {
        return Some(format!("{}", v as i64));
    }
    Some(cell)
}

pub fn parse_f64(raw: Option<&str>) -> Option<f64> {
    let v = raw?.trim().parse::<f64>().ok()?;
    v.is_finite().then_some(v)
}

pub fn parse_i64(raw: Option<&str>) -> Option<i64> {
    let s = raw?.trim();
    if let Ok(v) = s.parse::<i64>() {
        return Some(v);
    }
    let v = s.parse::<f64>().ok()?;
    (v.is_finite() && v.fract() == 0.0).then_some(v as i64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_markers_collapse_to_none() {
        for raw in ["", "  ", "nan", "NaN", "None", "NULL", "N/A", "<NA>", "NaT"] {
            assert_eq!(normalize_cell(raw), None, "{raw:?}");
        }
        assert_eq!(normalize_cell(" Vitesse "), Some("Vitesse".to_string()));
        assert_eq!(normalize_cell("0"), Some("0".to_string()));
    }

    #[test]
    fn keys_drop_float_suffix() {
        assert_eq!(normalize_key("123.0").as_deref(), Some("123"));
        assert_eq!(normalize_key("123").as_deref(), Some("123"));
        assert_eq!(normalize_key("1.5").as_deref(), Some("1.5"));
        assert_eq!(normalize_key("abc").as_deref(), Some("abc"));
        assert_eq!(normalize_key("nan"), None);
    }

    #[test]
    fn wrong_arity_rows_are_skipped() {
        let mut table = Table::new(vec!["a".into(), "b".into()]);
        assert!(table.push_raw(&["1", "2"]));
        assert!(!table.push_raw(&["1"]));
        assert_eq!(table.len(), 1);
        assert_eq!(table.skipped(), 1);
    }

    #[test]
    fn parse_i64_accepts_float_text() {
        assert_eq!(parse_i64(Some("6.0")), Some(6));
        assert_eq!(parse_i64(Some("6")), Some(6));
        assert_eq!(parse_i64(Some("x")), None);
        assert_eq!(parse_i64(None), None);
    }
}
