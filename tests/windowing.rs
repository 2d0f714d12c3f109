use std::path::PathBuf;

use corner_scout::config::DEFAULT_SHOT_TYPE_ID;
use corner_scout::corner_dataset::{CornerDataset, DataPaths, load_dataset};
use corner_scout::error::PipelineError;
use corner_scout::match_window::{TeamKey, select_window, team_matches};
use corner_scout::team_canon::TeamCanonicalizer;

fn fixture_root() -> PathBuf {
    let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.push("tests");
    path.push("fixtures");
    path.push("league");
    path
}

fn load() -> (CornerDataset, TeamCanonicalizer) {
    let canon = TeamCanonicalizer::default();
    let ds = load_dataset(&DataPaths::under(&fixture_root()), &canon, DEFAULT_SHOT_TYPE_ID)
        .expect("fixture should load");
    (ds, canon)
}

#[test]
fn last_two_matches_are_the_newest() {
    let (ds, canon) = load();
    let team = TeamKey::new("Vitesse", &canon);
    let window = select_window(&ds.matches, &team, 2).unwrap();
    assert_eq!(window.match_ids(), vec!["1003", "1002"]);
    assert_eq!(window.size, 2);
    assert_eq!(window.team_total, 3);
    assert_eq!(window.label(), "Last 2");
}

#[test]
fn window_is_clamped_to_available_matches() {
    let (ds, canon) = load();
    let team = TeamKey::new("Vitesse", &canon);

    let all = select_window(&ds.matches, &team, 50).unwrap();
    assert_eq!(all.size, 3);
    assert_eq!(all.requested, 50);
    assert_eq!(all.label(), "All");

    let one = select_window(&ds.matches, &team, 0).unwrap();
    assert_eq!(one.match_ids(), vec!["1003"]);
}

#[test]
fn undated_matches_sort_last() {
    let (ds, canon) = load();
    let team = TeamKey::new("Willem II", &canon);
    let ids = team_matches(&ds.matches, &team)
        .iter()
        .map(|m| m.id.clone())
        .collect::<Vec<_>>();
    assert_eq!(ids, vec!["1002", "1004"]);
}

#[test]
fn alias_spelling_finds_canonical_matches() {
    let (ds, canon) = load();
    let team = TeamKey::new("roda jc kerkrade", &canon);
    let ids = team_matches(&ds.matches, &team)
        .iter()
        .map(|m| m.id.clone())
        .collect::<Vec<_>>();
    assert_eq!(ids, vec!["1001", "1004"]);
}

#[test]
fn unknown_team_is_its_own_identity() {
    let (ds, canon) = load();
    let team = TeamKey::new("FC Foo W", &canon);
    assert_eq!(team.canon.as_ref().unwrap().as_str(), "FC Foo W");
    let window = select_window(&ds.matches, &team, 5).unwrap();
    assert_eq!(window.match_ids(), vec!["1003"]);
}

#[test]
fn raw_name_membership_without_canonical_hit() {
    let (ds, _) = load();
    let mut table = corner_scout::team_canon::AliasTable::default();
    table.insert("Roda", &[]);
    let other = TeamCanonicalizer::new(&table);
    // Canonical identity differs from what the loader stored; the raw spelling still matches.
    let team = TeamKey::new("Roda JC", &other);
    let ids = team_matches(&ds.matches, &team)
        .iter()
        .map(|m| m.id.clone())
        .collect::<Vec<_>>();
    assert_eq!(ids, vec!["1001"]);
}

#[test]
fn team_without_matches_is_recoverable() {
    let (ds, canon) = load();
    let team = TeamKey::new("FC Emmen", &canon);
    let err = select_window(&ds.matches, &team, 5).unwrap_err();
    assert!(matches!(err, PipelineError::NoMatches { ref team } if team == "FC Emmen"));
    assert!(err.is_recoverable());
}
