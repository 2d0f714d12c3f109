use std::collections::{BTreeMap, HashMap};

use rayon::prelude::*;
use serde::Serialize;

use crate::corner_analysis::{locate_corner, LocatedCorner};
use crate::corner_dataset::Match;
use crate::shot_index::ShotIndex;
use crate::team_canon::CanonicalTeam;
use crate::zones::{Role, Side, SideMap, ZoneConfig, ZoneLayout};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ZoneCounts {
    pub corners: usize,
    pub shots: usize,
}

impl ZoneCounts {
    pub fn rate(&self) -> Option<f64> {
        if self.corners == 0 {
            None
        } else {
            Some(self.shots as f64 / self.corners as f64)
        }
    }

    fn add(&mut self, other: ZoneCounts) {
        self.corners += other.corners;
        self.shots += other.shots;
    }
}

type SideZones = SideMap<BTreeMap<String, ZoneCounts>>;

/// Attacking corner counts per canonical team, side and zone over the whole
/// dataset. The reference population for percentile placement.
#[derive(Debug, Clone, Default)]
pub struct LeagueStats {
    teams: BTreeMap<CanonicalTeam, SideZones>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum Benchmark {
    Percentile(f64),
    InsufficientData,
}

impl Benchmark {
    pub fn value(&self) -> Option<f64> {
        match self {
            Benchmark::Percentile(p) => Some(*p),
            Benchmark::InsufficientData => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ZonePercentile {
    pub zone: String,
    pub team_corners: usize,
    pub team_rate: Option<f64>,
    pub population: usize,
    pub benchmark: Benchmark,
}

impl LeagueStats {
    pub fn build(matches: &[Match], zones: &ZoneConfig, shots: &ShotIndex) -> Self {
        let teams = matches
            .par_iter()
            .fold(HashMap::new, |mut acc: HashMap<CanonicalTeam, SideZones>, m| {
                for ev in &m.events {
                    let Some(team) = ev.team.as_ref() else {
                        continue;
                    };
                    let Some(LocatedCorner {
                        side,
                        zone: Some(zone),
                        shot,
                    }) = locate_corner(ev, zones, Role::Attacking, shots)
                    else {
                        continue;
                    };
                    let counts = acc
                        .entry(team.clone())
                        .or_default()
                        .get_mut(side)
                        .entry(zone.to_string())
                        .or_default();
                    counts.add(ZoneCounts {
                        corners: 1,
                        shots: usize::from(shot),
                    });
                }
                acc
            })
            .reduce(HashMap::new, merge_team_maps);

        tracing::debug!(teams = teams.len(), "built league zone baseline");
        Self {
            teams: teams.into_iter().collect(),
        }
    }

    pub fn team_count(&self) -> usize {
        self.teams.len()
    }

    pub fn zone_counts(&self, team: &CanonicalTeam, side: Side, zone: &str) -> ZoneCounts {
        self.teams
            .get(team)
            .and_then(|sides| sides.get(side).get(zone))
            .copied()
            .unwrap_or_default()
    }

    /// Rates of every team with at least `threshold` corners in the zone.
    pub fn zone_population(&self, side: Side, zone: &str, threshold: usize) -> Vec<f64> {
        self.teams
            .values()
            .filter_map(|sides| sides.get(side).get(zone))
            .filter(|c| c.corners >= threshold)
            .filter_map(ZoneCounts::rate)
            .collect()
    }

    pub fn percentiles_for_team(
        &self,
        team: Option<&CanonicalTeam>,
        side: Side,
        layout: &ZoneLayout,
        min_zone_corners: usize,
    ) -> Vec<ZonePercentile> {
        let threshold = min_zone_corners.max(1);
        layout
            .ids()
            .map(|zone| {
                let counts = team
                    .map(|t| self.zone_counts(t, side, zone))
                    .unwrap_or_default();
                let population = self.zone_population(side, zone, threshold);
                let benchmark = match counts.rate() {
                    Some(rate) if counts.corners >= threshold => percentile_rank(&population, rate)
                        .map(Benchmark::Percentile)
                        .unwrap_or(Benchmark::InsufficientData),
                    _ => Benchmark::InsufficientData,
                };
                ZonePercentile {
                    zone: zone.to_string(),
                    team_corners: counts.corners,
                    team_rate: counts.rate(),
                    population: population.len(),
                    benchmark,
                }
            })
            .collect()
    }
}

fn merge_team_maps(
    mut left: HashMap<CanonicalTeam, SideZones>,
    right: HashMap<CanonicalTeam, SideZones>,
) -> HashMap<CanonicalTeam, SideZones> {
    for (team, sides) in right {
        let into = left.entry(team).or_default();
        for side in Side::BOTH {
            for (zone, counts) in sides.get(side) {
                into.get_mut(side)
                    .entry(zone.clone())
                    .or_default()
                    .add(*counts);
            }
        }
    }
    left
}

/// Inclusive rank: share of the population at or below `value`, in percent.
pub fn percentile_rank(population: &[f64], value: f64) -> Option<f64> {
    if population.is_empty() {
        return None;
    }
    let at_or_below = population.iter().filter(|r| **r <= value).count();
    Some(100.0 * at_or_below as f64 / population.len() as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percentile_rank_is_inclusive() {
        let pop = [0.1, 0.2, 0.2, 0.4];
        assert_eq!(percentile_rank(&pop, 0.4), Some(100.0));
        assert_eq!(percentile_rank(&pop, 0.2), Some(75.0));
        assert_eq!(percentile_rank(&pop, 0.1), Some(25.0));
        assert_eq!(percentile_rank(&[], 0.1), None);
    }

    #[test]
    fn zero_corner_rate_is_none() {
        assert_eq!(ZoneCounts::default().rate(), None);
        assert_eq!(
            ZoneCounts {
                corners: 4,
                shots: 1
            }
            .rate(),
            Some(0.25)
        );
    }
}
