use serde::Serialize;

use crate::config::AnalysisParams;
use crate::corner_dataset::{CornerDataset, RawEvent};
use crate::league_stats::{LeagueStats, ZonePercentile};
use crate::match_window::{TeamKey, Window};
use crate::player_tables::{HeaderTables, TakenCorner, TakerRow, header_tables, taker_tables};
use crate::shot_index::ShotIndex;
use crate::team_canon::TeamCanonicalizer;
use crate::zones::{Role, Side, SideMap, ZoneConfig, ZoneLayout, normalize_corner};

/// A corner placed on a side and, when its landing point is known, a zone.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LocatedCorner<'z> {
    pub side: Side,
    pub zone: Option<&'z str>,
    pub shot: bool,
}

/// `None` when the start point is missing or on the centre line.
pub fn locate_corner<'z>(
    ev: &RawEvent,
    zones: &'z ZoneConfig,
    role: Role,
    shots: &ShotIndex,
) -> Option<LocatedCorner<'z>> {
    let corner = normalize_corner(ev.start?, ev.end)?;
    let zone = corner
        .end
        .and_then(|end| zones.layout(role, corner.side).assign(end));
    let shot = ev
        .sequence_id
        .as_deref()
        .is_some_and(|seq| shots.contains(&ev.match_id, seq));
    Some(LocatedCorner {
        side: corner.side,
        zone,
        shot,
    })
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ZoneShare {
    pub zone: String,
    pub count: usize,
    pub pct: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PositionDistribution {
    pub side_total: usize,
    pub zones: Vec<ZoneShare>,
}

impl PositionDistribution {
    pub fn share(&self, zone: &str) -> Option<&ZoneShare> {
        self.zones.iter().find(|z| z.zone == zone)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ZoneShotStat {
    pub zone: String,
    pub corners: usize,
    pub shots: usize,
    pub rate: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ZoneShotTable {
    pub total_corners: usize,
    pub total_shots: usize,
    pub zones: Vec<ZoneShotStat>,
}

impl ZoneShotTable {
    pub fn stat(&self, zone: &str) -> Option<&ZoneShotStat> {
        self.zones.iter().find(|z| z.zone == zone)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TeamCornerStats {
    pub positions: SideMap<PositionDistribution>,
    pub attacking_shots: SideMap<ZoneShotTable>,
    pub defensive_shots: SideMap<ZoneShotTable>,
    pub own_left_count: usize,
    pub own_right_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisResult {
    pub team: String,
    pub window_label: String,
    pub window_size: usize,
    pub team_total_matches: usize,
    pub matches_analyzed: usize,
    pub match_ids: Vec<String>,
    pub corners: TeamCornerStats,
    pub percentiles: SideMap<Vec<ZonePercentile>>,
    pub takers: SideMap<Vec<TakerRow>>,
    pub headers: Option<HeaderTables>,
}

/// Per-side accumulator for one role.
#[derive(Default)]
struct SideTally {
    total: usize,
    shots: usize,
    zones: Vec<(usize, usize)>,
}

impl SideTally {
    fn for_layout(layout: &ZoneLayout) -> Self {
        Self {
            zones: vec![(0, 0); layout.len()],
            ..Self::default()
        }
    }

    fn add(&mut self, layout: &ZoneLayout, located: &LocatedCorner<'_>) {
        self.total += 1;
        self.shots += usize::from(located.shot);
        if let Some(zone) = located.zone
            && let Some(idx) = layout.ids().position(|id| id == zone)
        {
            self.zones[idx].0 += 1;
            self.zones[idx].1 += usize::from(located.shot);
        }
    }

    fn positions(&self, layout: &ZoneLayout) -> PositionDistribution {
        let zones = layout
            .ids()
            .zip(&self.zones)
            .map(|(id, (count, _))| ZoneShare {
                zone: id.to_string(),
                count: *count,
                pct: (self.total > 0).then(|| 100.0 * *count as f64 / self.total as f64),
            })
            .collect();
        PositionDistribution {
            side_total: self.total,
            zones,
        }
    }

    fn shots(&self, layout: &ZoneLayout) -> ZoneShotTable {
        let zones = layout
            .ids()
            .zip(&self.zones)
            .map(|(id, (corners, shots))| ZoneShotStat {
                zone: id.to_string(),
                corners: *corners,
                shots: *shots,
                rate: (*corners > 0).then(|| *shots as f64 / *corners as f64),
            })
            .collect();
        ZoneShotTable {
            total_corners: self.total,
            total_shots: self.shots,
            zones,
        }
    }
}

pub struct AnalysisInputs<'a> {
    pub dataset: &'a CornerDataset,
    pub zones: &'a ZoneConfig,
    pub league: &'a LeagueStats,
    pub canon: &'a TeamCanonicalizer,
    pub params: AnalysisParams,
}

pub fn analyze_window(inputs: &AnalysisInputs<'_>, team: &TeamKey, window: &Window<'_>) -> AnalysisResult {
    let zones = inputs.zones;
    let shots = &inputs.dataset.shot_index;

    let mut attacking = SideMap {
        left: SideTally::for_layout(zones.layout(Role::Attacking, Side::Left)),
        right: SideTally::for_layout(zones.layout(Role::Attacking, Side::Right)),
    };
    let mut defensive = SideMap {
        left: SideTally::for_layout(zones.layout(Role::Defensive, Side::Left)),
        right: SideTally::for_layout(zones.layout(Role::Defensive, Side::Right)),
    };
    let mut taken: Vec<TakenCorner<'_>> = Vec::new();
    let mut unplaced = 0usize;

    for m in &window.matches {
        for ev in &m.events {
            let role = if team.owns_event(ev) {
                Role::Attacking
            } else if ev.team.is_some() {
                Role::Defensive
            } else {
                continue;
            };
            let Some(located) = locate_corner(ev, zones, role, shots) else {
                unplaced += 1;
                continue;
            };
            let layout = zones.layout(role, located.side);
            match role {
                Role::Attacking => {
                    attacking.get_mut(located.side).add(layout, &located);
                    taken.push(TakenCorner {
                        side: located.side,
                        event: ev,
                        shot: located.shot,
                    });
                }
                Role::Defensive => defensive.get_mut(located.side).add(layout, &located),
            }
        }
    }
    if unplaced > 0 {
        tracing::debug!(team = team.display_name(), unplaced, "corners without a side");
    }

    let corners = TeamCornerStats {
        positions: SideMap {
            left: attacking.left.positions(zones.layout(Role::Attacking, Side::Left)),
            right: attacking.right.positions(zones.layout(Role::Attacking, Side::Right)),
        },
        attacking_shots: SideMap {
            left: attacking.left.shots(zones.layout(Role::Attacking, Side::Left)),
            right: attacking.right.shots(zones.layout(Role::Attacking, Side::Right)),
        },
        defensive_shots: SideMap {
            left: defensive.left.shots(zones.layout(Role::Defensive, Side::Left)),
            right: defensive.right.shots(zones.layout(Role::Defensive, Side::Right)),
        },
        own_left_count: attacking.left.total,
        own_right_count: attacking.right.total,
    };

    let min_zone = inputs.params.min_zone_corners;
    let percentiles = SideMap {
        left: inputs.league.percentiles_for_team(
            team.canon.as_ref(),
            Side::Left,
            zones.layout(Role::Attacking, Side::Left),
            min_zone,
        ),
        right: inputs.league.percentiles_for_team(
            team.canon.as_ref(),
            Side::Right,
            zones.layout(Role::Attacking, Side::Right),
            min_zone,
        ),
    };

    let headers = inputs
        .dataset
        .headers
        .as_deref()
        .map(|rows| {
            header_tables(
                rows,
                &inputs.dataset.sequences,
                &window.matches,
                team,
                inputs.canon,
                inputs.params.max_players,
            )
        })
        .filter(|tables| !tables.is_empty());

    AnalysisResult {
        team: team.display_name().to_string(),
        window_label: window.label(),
        window_size: window.size,
        team_total_matches: window.team_total,
        matches_analyzed: window.matches.len(),
        match_ids: window.match_ids(),
        corners,
        percentiles,
        takers: taker_tables(&taken, inputs.params.max_players),
        headers,
    }
}
