use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

pub const NOT_APPLICABLE: &str = "NOT_APPLICABLE";

static DEFAULT_ALIASES: Lazy<AliasTable> = Lazy::new(|| {
    let rows: &[(&str, &[&str])] = &[
        ("ADO Den Haag", &["ADO", "Ado Den Haag", "ADO Den Haag FC"]),
        ("Almere City FC", &["Almere City", "Almere"]),
        ("De Graafschap", &["Graafschap", "BV De Graafschap"]),
        ("Eindhoven", &["FC Eindhoven"]),
        ("FC Den Bosch", &["Den Bosch", "FC Den Bosch 's-Hertogenbosch"]),
        ("FC Dordrecht", &["Dordrecht"]),
        ("FC Emmen", &["Emmen"]),
        ("Helmond Sport", &["Helmond"]),
        ("Jong AZ", &["AZ U21", "Jong AZ Alkmaar", "AZ Alkmaar II"]),
        ("Jong Ajax", &["Ajax U21", "Jong Ajax Amsterdam", "Ajax II"]),
        ("Jong FC Utrecht", &["Utrecht U21", "Jong Utrecht", "FC Utrecht II"]),
        ("Jong PSV", &["PSV U21", "Jong PSV Eindhoven", "PSV II"]),
        ("MVV Maastricht", &["MVV"]),
        ("RKC Waalwijk", &["RKC"]),
        ("Roda JC Kerkrade", &["Roda JC", "Roda"]),
        ("SC Cambuur", &["Cambuur", "Cambuur Leeuwarden", "SC Cambuur-Leeuwarden"]),
        ("TOP Oss", &["Oss", "FC Oss"]),
        ("VVV-Venlo", &["VVV", "VVV Venlo"]),
        ("Vitesse", &["Vitesse Arnhem", "SBV Vitesse"]),
        ("Willem II", &["Willem II Tilburg"]),
    ];
    let mut by_canonical = BTreeMap::new();
    for (canonical, aliases) in rows {
        by_canonical.insert(
            canonical.to_string(),
            aliases.iter().map(|a| a.to_string()).collect(),
        );
    }
    AliasTable { by_canonical }
});

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CanonicalTeam(String);

impl CanonicalTeam {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for CanonicalTeam {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CanonicalTeam {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Canonical name -> known spellings. JSON shape: `{ "Canonical": ["alias", ...] }`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AliasTable {
    by_canonical: BTreeMap<String, Vec<String>>,
}

impl AliasTable {
    pub fn builtin() -> Self {
        DEFAULT_ALIASES.clone()
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("read alias table {}", path.display()))?;
        serde_json::from_str(&raw).with_context(|| format!("parse alias table {}", path.display()))
    }

    pub fn insert(&mut self, canonical: &str, aliases: &[&str]) {
        let entry = self.by_canonical.entry(canonical.to_string()).or_default();
        entry.extend(aliases.iter().map(|a| a.to_string()));
    }

    pub fn len(&self) -> usize {
        self.by_canonical.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_canonical.is_empty()
    }
}

/// Resolves vendor team spellings to one identity: exact, then
/// case-insensitive, then whitespace-compacted, then the trimmed input itself.
#[derive(Debug, Clone)]
pub struct TeamCanonicalizer {
    exact: HashMap<String, CanonicalTeam>,
    folded: HashMap<String, CanonicalTeam>,
    compact: HashMap<String, CanonicalTeam>,
}

impl Default for TeamCanonicalizer {
    fn default() -> Self {
        Self::new(&DEFAULT_ALIASES)
    }
}

impl TeamCanonicalizer {
    pub fn new(table: &AliasTable) -> Self {
        let mut exact = HashMap::new();
        let mut folded = HashMap::new();
        let mut compact = HashMap::new();

        // BTreeMap iteration makes the first canonical name win on folding collisions.
        for (canonical, aliases) in &table.by_canonical {
            let canon = CanonicalTeam(canonical.trim().to_string());
            if canon.0.is_empty() {
                continue;
            }
            for spelling in std::iter::once(canonical).chain(aliases.iter()) {
                let spelling = spelling.trim();
                if spelling.is_empty() {
                    continue;
                }
                exact
                    .entry(spelling.to_string())
                    .or_insert_with(|| canon.clone());
                folded
                    .entry(spelling.to_uppercase())
                    .or_insert_with(|| canon.clone());
                compact
                    .entry(compact_key(spelling))
                    .or_insert_with(|| canon.clone());
            }
        }

        Self {
            exact,
            folded,
            compact,
        }
    }

    pub fn canonicalize(&self, raw: &str) -> Option<CanonicalTeam> {
        if is_not_applicable(raw) {
            return None;
        }
        let trimmed = raw.trim();
        if let Some(hit) = self.exact.get(raw).or_else(|| self.exact.get(trimmed)) {
            return Some(hit.clone());
        }
        if let Some(hit) = self.folded.get(&trimmed.to_uppercase()) {
            return Some(hit.clone());
        }
        if let Some(hit) = self.compact.get(&compact_key(trimmed)) {
            return Some(hit.clone());
        }
        Some(CanonicalTeam(trimmed.to_string()))
    }

    /// Whether `raw` resolves through the alias table rather than the fallback.
    pub fn is_known(&self, raw: &str) -> bool {
        let trimmed = raw.trim();
        !is_not_applicable(raw)
            && (self.exact.contains_key(trimmed)
                || self.folded.contains_key(&trimmed.to_uppercase())
                || self.compact.contains_key(&compact_key(trimmed)))
    }
}

pub fn is_not_applicable(raw: &str) -> bool {
    let trimmed = raw.trim();
    trimmed.is_empty() || trimmed.eq_ignore_ascii_case(NOT_APPLICABLE)
}

fn compact_key(raw: &str) -> String {
    raw.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_uppercase()
}
