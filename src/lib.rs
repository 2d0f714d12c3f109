pub mod analysis_cache;
pub mod config;
pub mod corner_analysis;
pub mod corner_dataset;
pub mod db_update;
pub mod error;
pub mod figures;
pub mod league_stats;
pub mod match_window;
pub mod player_tables;
pub mod report;
pub mod shot_index;
pub mod tabular;
pub mod team_canon;
pub mod team_theme;
pub mod workspace;
pub mod zones;
