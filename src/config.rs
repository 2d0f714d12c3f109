use std::env;
use std::path::{Path, PathBuf};

use crate::corner_dataset::DataPaths;

/// Bumped whenever canonicalization or shot detection semantics change, so
/// results computed under an older scheme never share a cache identity.
pub const SCHEMA_VERSION: &str = "v4_fullseq_shots";

pub const CORNER_EVENTS_FILE: &str = "corner_events_all_matches.csv";
pub const EVENT_SEQUENCES_FILE: &str = "corner_events_full_sequences.csv";
pub const HEADERS_FILE: &str = "corner_positions_headers.csv";
pub const UPLOADS_DIR: &str = "_uploads";

pub const DEFAULT_SHOT_TYPE_ID: i64 = 6;
pub const DEFAULT_MAX_PLAYERS: usize = 15;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnalysisParams {
    pub min_zone_corners: usize,
    pub max_players: usize,
    pub shot_type_id: i64,
}

impl Default for AnalysisParams {
    fn default() -> Self {
        Self {
            min_zone_corners: 0,
            max_players: DEFAULT_MAX_PLAYERS,
            shot_type_id: DEFAULT_SHOT_TYPE_ID,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub data_root: PathBuf,
    pub template_path: Option<PathBuf>,
    pub output_dir: PathBuf,
    pub zone_config_path: Option<PathBuf>,
    pub alias_table_path: Option<PathBuf>,
    pub params: AnalysisParams,
}

impl AppConfig {
    pub fn with_data_root(data_root: impl Into<PathBuf>) -> Self {
        Self {
            data_root: data_root.into(),
            template_path: None,
            output_dir: PathBuf::from("."),
            zone_config_path: None,
            alias_table_path: None,
            params: AnalysisParams::default(),
        }
    }

    pub fn from_env() -> Self {
        let defaults = AnalysisParams::default();
        Self {
            data_root: opt_env("APP_DATA_ROOT")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("data")),
            template_path: opt_env("APP_TEMPLATE").map(PathBuf::from),
            output_dir: opt_env("APP_OUTPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(".")),
            zone_config_path: opt_env("APP_ZONE_CONFIG").map(PathBuf::from),
            alias_table_path: opt_env("APP_TEAM_ALIASES").map(PathBuf::from),
            params: AnalysisParams {
                min_zone_corners: env_parse("APP_MIN_ZONE_CORNERS")
                    .unwrap_or(defaults.min_zone_corners),
                max_players: env_parse("APP_MAX_PLAYERS")
                    .unwrap_or(defaults.max_players)
                    .max(1),
                shot_type_id: env_parse("APP_SHOT_TYPE_ID").unwrap_or(defaults.shot_type_id),
            },
        }
    }

    pub fn data_paths(&self) -> DataPaths {
        DataPaths::under(&self.data_root)
    }

    pub fn uploads_root(&self) -> PathBuf {
        self.data_root.join(UPLOADS_DIR)
    }

    /// `<resolved data root>::<schema version>`. Falls back to the configured
    /// path when the root cannot be resolved (e.g. not created yet).
    pub fn dataset_id(&self) -> String {
        dataset_id_for(&self.data_root)
    }
}

pub fn dataset_id_for(data_root: &Path) -> String {
    let resolved = data_root
        .canonicalize()
        .unwrap_or_else(|_| data_root.to_path_buf());
    format!("{}::{SCHEMA_VERSION}", resolved.display())
}

pub fn load_dotenv() {
    let _ = dotenvy::from_filename(".env.local");
    let _ = dotenvy::from_filename(".env");
}

fn opt_env(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .and_then(|val| if val.trim().is_empty() { None } else { Some(val) })
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    opt_env(key).and_then(|val| val.trim().parse::<T>().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dataset_id_carries_schema_version() {
        let id = dataset_id_for(Path::new("does/not/exist"));
        assert!(id.ends_with("::v4_fullseq_shots"));
        assert!(id.starts_with("does"));
    }

    #[test]
    fn data_paths_live_under_root() {
        let cfg = AppConfig::with_data_root("/tmp/corners");
        let paths = cfg.data_paths();
        assert_eq!(
            paths.corner_events,
            PathBuf::from("/tmp/corners/corner_events_all_matches.csv")
        );
        assert_eq!(cfg.uploads_root(), PathBuf::from("/tmp/corners/_uploads"));
    }
}
