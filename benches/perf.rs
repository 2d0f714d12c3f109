use std::collections::BTreeSet;

use criterion::{Criterion, criterion_group, criterion_main};
use std::hint::black_box;

use corner_scout::config::{AnalysisParams, DEFAULT_SHOT_TYPE_ID};
use corner_scout::corner_analysis::{AnalysisInputs, analyze_window};
use corner_scout::corner_dataset::{CornerDataset, Match, RawEvent, SequenceRecord};
use corner_scout::league_stats::LeagueStats;
use corner_scout::match_window::{TeamKey, select_window};
use corner_scout::shot_index::build_shot_index;
use corner_scout::team_canon::TeamCanonicalizer;
use corner_scout::zones::{Point, ZoneConfig};

const TEAMS: &[&str] = &[
    "Vitesse",
    "Roda JC Kerkrade",
    "Willem II",
    "Jong PSV",
    "FC Emmen",
    "De Graafschap",
];
const MATCHES: usize = 300;
const CORNERS_PER_MATCH: u32 = 10;

fn synthetic_league(canon: &TeamCanonicalizer) -> (Vec<Match>, Vec<SequenceRecord>) {
    let mut matches = Vec::with_capacity(MATCHES);
    let mut sequences = Vec::new();
    for m in 0..MATCHES {
        let home = TEAMS[m % TEAMS.len()];
        let away = TEAMS[(m / TEAMS.len() + m + 1) % TEAMS.len()];
        let id = format!("{}", 10_000 + m);
        let mut events = Vec::new();
        for k in 0..CORNERS_PER_MATCH {
            let team = if k % 2 == 0 { home } else { away };
            let seq = format!("{k}");
            let sign = if k % 3 == 0 { -1.0 } else { 1.0 };
            let lean = if k % 4 < 2 { 34.0 } else { -34.0 };
            events.push(RawEvent {
                match_id: id.clone(),
                sequence_id: Some(seq.clone()),
                ordinal: k,
                team_raw: team.to_string(),
                team: canon.canonicalize(team),
                player: Some(format!("{team} #{}", k % 3)),
                start: Some(Point {
                    x: 52.5 * sign,
                    y: lean * sign,
                }),
                end: Some(Point {
                    x: (38.0 + (k as f64 * 1.7) % 14.0) * sign,
                    y: ((k as f64 * 3.1) % 30.0 - 15.0) * sign,
                }),
                result: None,
            });
            sequences.push(SequenceRecord {
                match_id: id.clone(),
                sequence_id: seq,
                base_type_name: Some(if (m + k as usize) % 5 == 0 { "SHOT" } else { "PASS" }.to_string()),
                base_type_id: Some(if (m + k as usize) % 5 == 0 { DEFAULT_SHOT_TYPE_ID } else { 2 }),
                team_raw: Some(team.to_string()),
                player: None,
            });
        }
        let teams_canon = [home, away].iter().filter_map(|t| canon.canonicalize(t)).collect();
        let teams_raw: BTreeSet<String> = [home, away].iter().map(|t| t.to_string()).collect();
        matches.push(Match {
            id,
            date: chrono::NaiveDate::from_ymd_opt(2024, 8, 1)
                .and_then(|d| d.checked_add_days(chrono::Days::new(m as u64)))
                .and_then(|d| d.and_hms_opt(20, 0, 0)),
            name: Some(format!("{home} - {away}")),
            events,
            teams_canon,
            teams_raw,
        });
    }
    (matches, sequences)
}

fn bench_shot_index(c: &mut Criterion) {
    let canon = TeamCanonicalizer::default();
    let (_, sequences) = synthetic_league(&canon);
    c.bench_function("shot_index_build", |b| {
        b.iter(|| {
            let index = build_shot_index(black_box(&sequences), DEFAULT_SHOT_TYPE_ID);
            black_box(index.len());
        })
    });
}

fn bench_league_stats(c: &mut Criterion) {
    let canon = TeamCanonicalizer::default();
    let (matches, sequences) = synthetic_league(&canon);
    let shots = build_shot_index(&sequences, DEFAULT_SHOT_TYPE_ID);
    let zones = ZoneConfig::default();
    c.bench_function("league_stats_build", |b| {
        b.iter(|| {
            let stats = LeagueStats::build(black_box(&matches), &zones, &shots);
            black_box(stats);
        })
    });
}

fn bench_window_analysis(c: &mut Criterion) {
    let canon = TeamCanonicalizer::default();
    let (matches, sequences) = synthetic_league(&canon);
    let shot_index = build_shot_index(&sequences, DEFAULT_SHOT_TYPE_ID);
    let zones = ZoneConfig::default();
    let league = LeagueStats::build(&matches, &zones, &shot_index);
    let dataset = CornerDataset {
        matches,
        sequences,
        shot_index,
        ..CornerDataset::default()
    };
    let inputs = AnalysisInputs {
        dataset: &dataset,
        zones: &zones,
        league: &league,
        canon: &canon,
        params: AnalysisParams::default(),
    };
    let team = TeamKey::new("Vitesse", &canon);

    c.bench_function("window_analysis_last10", |b| {
        b.iter(|| {
            let window = select_window(&dataset.matches, &team, black_box(10)).unwrap();
            let result = analyze_window(&inputs, &team, &window);
            black_box(result.corners.own_left_count);
        })
    });
}

criterion_group!(perf, bench_shot_index, bench_league_stats, bench_window_analysis);
criterion_main!(perf);
