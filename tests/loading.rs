use std::fs;
use std::path::PathBuf;

use corner_scout::config::DEFAULT_SHOT_TYPE_ID;
use corner_scout::corner_dataset::{
    DataPaths, canonical_team_options, latest_match_info, load_dataset,
};
use corner_scout::error::PipelineError;
use corner_scout::team_canon::{AliasTable, TeamCanonicalizer};

fn fixture_root() -> PathBuf {
    let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.push("tests");
    path.push("fixtures");
    path.push("league");
    path
}

#[test]
fn canonicalizer_resolution_order() {
    let canon = TeamCanonicalizer::default();
    assert_eq!(canon.canonicalize("Roda JC").unwrap().as_str(), "Roda JC Kerkrade");
    assert_eq!(canon.canonicalize("  roda jc  ").unwrap().as_str(), "Roda JC Kerkrade");
    assert_eq!(canon.canonicalize("JONG   psv").unwrap().as_str(), "Jong PSV");
    assert_eq!(canon.canonicalize("FC Foo W").unwrap().as_str(), "FC Foo W");
    assert_eq!(canon.canonicalize(" FC Foo W ").unwrap().as_str(), "FC Foo W");
    assert!(canon.canonicalize("NOT_APPLICABLE").is_none());
    assert!(canon.canonicalize(" not_applicable ").is_none());
    assert!(canon.canonicalize("   ").is_none());
    for raw in ["Roda JC", "roda  jc", "FC Foo W", "NOT_APPLICABLE", "Jong PSV"] {
        assert_eq!(canon.canonicalize(raw), canon.canonicalize(raw), "{raw:?}");
    }
    let rebuilt = TeamCanonicalizer::default();
    assert_eq!(rebuilt.canonicalize("vitesse arnhem"), canon.canonicalize("vitesse arnhem"));
    assert!(canon.is_known("Vitesse Arnhem"));
    assert!(!canon.is_known("FC Foo W"));
}

#[test]
fn alias_table_loads_from_json() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("aliases.json");
    fs::write(&path, r#"{ "Ajax Vrouwen": ["Ajax W", "AFC Ajax W"] }"#).unwrap();
    let table = AliasTable::load(&path).unwrap();
    assert_eq!(table.len(), 1);
    let canon = TeamCanonicalizer::new(&table);
    assert_eq!(canon.canonicalize("afc ajax w").unwrap().as_str(), "Ajax Vrouwen");
}

#[test]
fn loads_fixture_dataset() {
    let canon = TeamCanonicalizer::default();
    let ds = load_dataset(&DataPaths::under(&fixture_root()), &canon, DEFAULT_SHOT_TYPE_ID)
        .expect("fixture should load");

    assert_eq!(ds.matches.len(), 4);
    assert_eq!(ds.report.corner_rows, 11);
    assert_eq!(ds.report.corner_skipped, 2);
    assert_eq!(ds.sequences.len(), 17);
    assert_eq!(ds.headers.as_ref().map(Vec::len), Some(8));

    let m4 = ds.find_match("1004").expect("float match id normalized");
    assert!(m4.date.is_none());
    assert_eq!(m4.events.len(), 2);

    let m1 = ds.find_match("1001").unwrap();
    assert_eq!(m1.events[2].sequence_id.as_deref(), Some("12"));
    assert_eq!(
        m1.teams_canon.iter().map(|t| t.as_str()).collect::<Vec<_>>(),
        vec!["Roda JC Kerkrade", "Vitesse"]
    );
    assert!(m1.teams_raw.contains("Roda JC"));

    let m3 = ds.find_match("1003").unwrap();
    assert!(m3.events[2].start.is_none());
    assert_eq!(m3.date.unwrap().format("%Y-%m-%d").to_string(), "2024-08-23");
}

#[test]
fn shot_index_joins_on_name_or_code() {
    let canon = TeamCanonicalizer::default();
    let ds = load_dataset(&DataPaths::under(&fixture_root()), &canon, DEFAULT_SHOT_TYPE_ID).unwrap();
    let shots = &ds.shot_index;
    assert_eq!(shots.len(), 5);
    assert!(shots.contains("1001", "10"));
    assert!(shots.contains("1001", "12"), "code 6.0 with empty name");
    assert!(shots.contains("1002", "20"), "name Shot without a code");
    assert!(shots.contains("1004", "41"));
    assert!(!shots.contains("1001", "11"));
    assert!(!shots.contains("1002", "21"));
}

#[test]
fn team_options_exclude_sentinel() {
    let canon = TeamCanonicalizer::default();
    let ds = load_dataset(&DataPaths::under(&fixture_root()), &canon, DEFAULT_SHOT_TYPE_ID).unwrap();
    let teams = canonical_team_options(&ds.matches);
    assert_eq!(
        teams.iter().map(|t| t.as_str()).collect::<Vec<_>>(),
        vec!["FC Foo W", "Roda JC Kerkrade", "Vitesse", "Willem II"]
    );

    let (date, name) = latest_match_info(&ds.matches).unwrap();
    assert_eq!(date.format("%d-%m-%Y").to_string(), "23-08-2024");
    assert_eq!(name, "FC Foo W - Vitesse");
}

#[test]
fn missing_corner_file_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let err = load_dataset(
        &DataPaths::under(dir.path()),
        &TeamCanonicalizer::default(),
        DEFAULT_SHOT_TYPE_ID,
    )
    .unwrap_err();
    assert!(matches!(err, PipelineError::MissingSource { .. }));
}

#[test]
fn missing_required_column_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let paths = DataPaths::under(dir.path());
    fs::write(&paths.corner_events, "match_id,playerName\n1,Bakker\n").unwrap();
    let err = load_dataset(&paths, &TeamCanonicalizer::default(), DEFAULT_SHOT_TYPE_ID).unwrap_err();
    match err {
        PipelineError::MissingColumn { column, .. } => assert_eq!(column, "teamName"),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn optional_sources_may_be_absent_or_untyped() {
    let dir = tempfile::tempdir().unwrap();
    let paths = DataPaths::under(dir.path());
    fs::write(
        &paths.corner_events,
        "match_id,teamName,sequenceId\n7,Vitesse,1\n",
    )
    .unwrap();
    let ds = load_dataset(&paths, &TeamCanonicalizer::default(), DEFAULT_SHOT_TYPE_ID).unwrap();
    assert!(ds.shot_index.is_empty());
    assert!(ds.headers.is_none());

    fs::write(&paths.sequences, "match_id,sequenceId,playerName\n7,1,Bakker\n").unwrap();
    let ds = load_dataset(&paths, &TeamCanonicalizer::default(), DEFAULT_SHOT_TYPE_ID).unwrap();
    assert_eq!(ds.sequences.len(), 1);
    assert!(ds.shot_index.is_empty());
}

#[test]
fn shot_name_alone_marks_the_sequence() {
    let dir = tempfile::tempdir().unwrap();
    let paths = DataPaths::under(dir.path());
    fs::write(
        &paths.corner_events,
        "match_id,teamName,sequenceId\n7,Vitesse,1\n7,Vitesse,2\n",
    )
    .unwrap();
    fs::write(
        &paths.sequences,
        "match_id,sequenceId,baseTypeName\n7,1,PASS\n7.0,1,Shot\n7,2,PASS\n",
    )
    .unwrap();
    let ds = load_dataset(&paths, &TeamCanonicalizer::default(), DEFAULT_SHOT_TYPE_ID).unwrap();
    assert_eq!(ds.shot_index.len(), 1);
    assert!(ds.shot_index.contains("7", "1"));
    assert!(!ds.shot_index.contains("7", "2"));
}
