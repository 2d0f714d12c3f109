use std::fs;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::NaiveDateTime;

use crate::analysis_cache::{AnalysisCache, CacheStats};
use crate::config::AppConfig;
use crate::corner_analysis::{AnalysisInputs, AnalysisResult, analyze_window};
use crate::corner_dataset::{
    CornerDataset, canonical_team_options, latest_match_info, load_dataset,
};
use crate::db_update::{DatabaseUpdater, StagedBatch, UpdateReport};
use crate::error::PipelineError;
use crate::league_stats::LeagueStats;
use crate::match_window::{TeamKey, clamp_window, select_window, team_matches};
use crate::team_canon::{AliasTable, CanonicalTeam, TeamCanonicalizer};
use crate::team_theme::{TeamTheme, ThemeBook};
use crate::zones::ZoneConfig;

/// Process-owned analysis state: the loaded snapshot, its league baseline and
/// the memoized analyses. Mutation requires `&mut self`.
pub struct Workspace {
    config: AppConfig,
    canon: TeamCanonicalizer,
    zones: ZoneConfig,
    themes: ThemeBook,
    dataset: CornerDataset,
    league: Arc<LeagueStats>,
    cache: AnalysisCache<AnalysisResult>,
}

impl Workspace {
    /// Loads alias and zone overrides named by the config, then the dataset.
    pub fn open(config: AppConfig) -> Result<Self> {
        let aliases = match config.alias_table_path.as_deref() {
            Some(path) => AliasTable::load(path)?,
            None => AliasTable::builtin(),
        };
        let zones = match config.zone_config_path.as_deref() {
            Some(path) => ZoneConfig::load(path)?,
            None => ZoneConfig::default(),
        };
        Ok(Self::with_parts(config, TeamCanonicalizer::new(&aliases), zones)?)
    }

    pub fn with_parts(
        config: AppConfig,
        canon: TeamCanonicalizer,
        zones: ZoneConfig,
    ) -> Result<Self, PipelineError> {
        let dataset = load_dataset(&config.data_paths(), &canon, config.params.shot_type_id)?;
        let league = Arc::new(LeagueStats::build(&dataset.matches, &zones, &dataset.shot_index));
        let cache = AnalysisCache::new(config.dataset_id());
        Ok(Self {
            config,
            canon,
            zones,
            themes: ThemeBook::default(),
            dataset,
            league,
            cache,
        })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn dataset(&self) -> &CornerDataset {
        &self.dataset
    }

    pub fn zones(&self) -> &ZoneConfig {
        &self.zones
    }

    pub fn canonicalizer(&self) -> &TeamCanonicalizer {
        &self.canon
    }

    pub fn league(&self) -> Arc<LeagueStats> {
        Arc::clone(&self.league)
    }

    pub fn dataset_version(&self) -> u64 {
        self.cache.version()
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    pub fn team_options(&self) -> Result<Vec<CanonicalTeam>, PipelineError> {
        let teams = canonical_team_options(&self.dataset.matches);
        if teams.is_empty() {
            return Err(PipelineError::NoTeams);
        }
        Ok(teams)
    }

    pub fn team_match_count(&self, team: &str) -> usize {
        team_matches(&self.dataset.matches, &TeamKey::new(team, &self.canon)).len()
    }

    pub fn latest_match(&self) -> Option<(NaiveDateTime, String)> {
        latest_match_info(&self.dataset.matches)
    }

    pub fn theme_for(&self, team: &str) -> TeamTheme {
        self.themes.theme_for(team)
    }

    /// Analysis of the team's last `n` matches, memoized per dataset version.
    pub fn analyze(&mut self, team: &str, n: usize) -> Result<Arc<AnalysisResult>, PipelineError> {
        let key_team = TeamKey::new(team, &self.canon);
        let total = team_matches(&self.dataset.matches, &key_team).len();
        if total == 0 {
            return Err(PipelineError::NoMatches {
                team: key_team.display_name().to_string(),
            });
        }
        let window_size = clamp_window(n, total);
        let cache_team = key_team
            .canon
            .clone()
            .or_else(|| self.canon.canonicalize(&key_team.raw))
            .ok_or_else(|| PipelineError::NoMatches {
                team: key_team.raw.clone(),
            })?;
        let key = self.cache.key(cache_team, window_size);

        let inputs = AnalysisInputs {
            dataset: &self.dataset,
            zones: &self.zones,
            league: &self.league,
            canon: &self.canon,
            params: self.config.params,
        };
        self.cache.get_or_compute(key, || {
            let window = select_window(&inputs.dataset.matches, &key_team, window_size)?;
            tracing::info!(
                team = key_team.display_name(),
                window = window.size,
                of = window.team_total,
                "analyzing corners"
            );
            Ok(analyze_window(&inputs, &key_team, &window))
        })
    }

    /// Re-reads the data files. The current snapshot is kept when loading fails.
    pub fn reload(&mut self) -> Result<(), PipelineError> {
        let dataset = load_dataset(
            &self.config.data_paths(),
            &self.canon,
            self.config.params.shot_type_id,
        )?;
        self.league = Arc::new(LeagueStats::build(
            &dataset.matches,
            &self.zones,
            &dataset.shot_index,
        ));
        self.dataset = dataset;
        self.cache.set_dataset_id(self.config.dataset_id());
        self.cache.bump_version();
        Ok(())
    }

    /// Runs `updater` over a staged batch. On success the dataset is reloaded,
    /// the version bumped and the batch removed; on failure nothing changes.
    pub fn apply_update(
        &mut self,
        updater: &dyn DatabaseUpdater,
        batch: &StagedBatch,
    ) -> Result<UpdateReport, PipelineError> {
        let report = updater.update(&batch.dir, &self.config.data_root);
        if !report.ok {
            return Err(PipelineError::UpdateFailed {
                detail: report
                    .error
                    .clone()
                    .unwrap_or_else(|| "unknown error".to_string()),
            });
        }
        self.reload()?;
        if let Err(err) = remove_batch(batch) {
            tracing::warn!(error = %format!("{err:#}"), "staged batch left behind");
        }
        Ok(report)
    }
}

fn remove_batch(batch: &StagedBatch) -> Result<()> {
    fs::remove_dir_all(&batch.dir).with_context(|| format!("remove {}", batch.dir.display()))
}
