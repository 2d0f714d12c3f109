use std::cell::Cell;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use corner_scout::analysis_cache::AnalysisCache;
use corner_scout::config::AppConfig;
use corner_scout::error::PipelineError;
use corner_scout::team_canon::TeamCanonicalizer;
use corner_scout::workspace::Workspace;

fn fixture_root() -> PathBuf {
    let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.push("tests");
    path.push("fixtures");
    path.push("league");
    path
}

fn copy_fixture(to: &Path) {
    for entry in fs::read_dir(fixture_root()).unwrap() {
        let entry = entry.unwrap();
        fs::copy(entry.path(), to.join(entry.file_name())).unwrap();
    }
}

#[test]
fn same_key_computes_once() {
    let canon = TeamCanonicalizer::default();
    let team = canon.canonicalize("Vitesse").unwrap();
    let mut cache: AnalysisCache<String> = AnalysisCache::new("data::v4_fullseq_shots");
    let calls = Cell::new(0);
    let compute = || {
        calls.set(calls.get() + 1);
        Ok::<_, PipelineError>("result".to_string())
    };

    let first = cache.get_or_compute(cache.key(team.clone(), 5), compute).unwrap();
    let second = cache.get_or_compute(cache.key(team.clone(), 5), compute).unwrap();
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(calls.get(), 1);

    let stats = cache.stats();
    assert_eq!((stats.hits, stats.misses, stats.entries), (1, 1, 1));
}

#[test]
fn failed_compute_is_not_cached() {
    let canon = TeamCanonicalizer::default();
    let team = canon.canonicalize("Vitesse").unwrap();
    let mut cache: AnalysisCache<u32> = AnalysisCache::new("id");
    let err = cache
        .get_or_compute(cache.key(team.clone(), 3), || {
            Err(PipelineError::NoMatches {
                team: "Vitesse".into(),
            })
        })
        .unwrap_err();
    assert!(err.is_recoverable());
    assert!(cache.is_empty());
}

#[test]
fn version_bump_clears_every_team() {
    let canon = TeamCanonicalizer::default();
    let vitesse = canon.canonicalize("Vitesse").unwrap();
    let roda = canon.canonicalize("Roda JC").unwrap();
    let mut cache: AnalysisCache<u32> = AnalysisCache::new("id");
    cache
        .get_or_compute(cache.key(vitesse.clone(), 5), || Ok::<_, PipelineError>(1))
        .unwrap();
    cache
        .get_or_compute(cache.key(roda.clone(), 3), || Ok::<_, PipelineError>(2))
        .unwrap();
    assert_eq!(cache.len(), 2);

    assert_eq!(cache.bump_version(), 1);
    assert!(cache.is_empty());
    assert!(cache.get(&cache.key(roda, 3)).is_none());
}

#[test]
fn key_with_other_identity_invalidates() {
    let canon = TeamCanonicalizer::default();
    let team = canon.canonicalize("Vitesse").unwrap();
    let mut cache: AnalysisCache<u32> = AnalysisCache::new("a");
    cache
        .get_or_compute(cache.key(team.clone(), 5), || Ok::<_, PipelineError>(1))
        .unwrap();

    let mut foreign = cache.key(team.clone(), 5);
    foreign.dataset_id = "b".to_string();
    let v = cache
        .get_or_compute(foreign, || Ok::<_, PipelineError>(2))
        .unwrap();
    assert_eq!(*v, 2);
    assert_eq!(cache.dataset_id(), "b");
    assert_eq!(cache.len(), 1);

    cache.set_dataset_id("c");
    assert!(cache.is_empty());
}

#[test]
fn workspace_memoizes_by_clamped_window() {
    let mut ws = Workspace::open(AppConfig::with_data_root(fixture_root())).unwrap();
    let a = ws.analyze("Vitesse", 5).unwrap();
    let b = ws.analyze("vitesse arnhem", 3).unwrap();
    assert!(Arc::ptr_eq(&a, &b), "5 and 3 both clamp to the team's 3 matches");
    assert_eq!(ws.cache_stats().misses, 1);
    assert_eq!(b.window_size, 3);
    assert_eq!(b.window_label, "All");

    let c = ws.analyze("Vitesse", 2).unwrap();
    assert!(!Arc::ptr_eq(&a, &c));
}

#[test]
fn reload_bumps_version_and_drops_cache() {
    let dir = tempfile::tempdir().unwrap();
    copy_fixture(dir.path());
    let mut ws = Workspace::open(AppConfig::with_data_root(dir.path())).unwrap();
    let before = ws.analyze("Vitesse", 5).unwrap();
    ws.analyze("Willem II", 5).unwrap();
    assert_eq!(ws.cache_stats().entries, 2);

    ws.reload().unwrap();
    assert_eq!(ws.dataset_version(), 1);
    assert_eq!(ws.cache_stats().entries, 0);

    let after = ws.analyze("Vitesse", 5).unwrap();
    assert!(!Arc::ptr_eq(&before, &after));
    assert_eq!(*before, *after);
}

#[test]
fn failed_reload_keeps_snapshot() {
    let dir = tempfile::tempdir().unwrap();
    copy_fixture(dir.path());
    let mut ws = Workspace::open(AppConfig::with_data_root(dir.path())).unwrap();
    ws.analyze("Vitesse", 5).unwrap();

    fs::remove_file(dir.path().join("corner_events_all_matches.csv")).unwrap();
    let err = ws.reload().unwrap_err();
    assert!(matches!(err, PipelineError::MissingSource { .. }));
    assert_eq!(ws.dataset_version(), 0);
    assert_eq!(ws.cache_stats().entries, 1);
    assert_eq!(ws.dataset().matches.len(), 4);
}
