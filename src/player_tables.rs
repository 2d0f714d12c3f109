use std::collections::{BTreeMap, HashMap, HashSet};

use serde::Serialize;

use crate::corner_dataset::{HeaderRecord, Match, RawEvent, SequenceRecord};
use crate::match_window::TeamKey;
use crate::team_canon::TeamCanonicalizer;
use crate::zones::{Side, SideMap};

pub const UNKNOWN_PLAYER: &str = "Unknown";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TakerRow {
    pub player: String,
    pub corners: usize,
    pub shots: usize,
    pub share_pct: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TargetRow {
    pub player: String,
    pub duels: usize,
    pub won: usize,
    pub lost: usize,
    pub win_rate: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct HeaderTables {
    pub attacking: Vec<TargetRow>,
    pub defensive: Vec<TargetRow>,
}

impl HeaderTables {
    pub fn is_empty(&self) -> bool {
        self.attacking.is_empty() && self.defensive.is_empty()
    }
}

/// One of the team's own corners, already placed on a side.
#[derive(Debug, Clone, Copy)]
pub struct TakenCorner<'a> {
    pub side: Side,
    pub event: &'a RawEvent,
    pub shot: bool,
}

pub fn taker_tables(corners: &[TakenCorner<'_>], max_players: usize) -> SideMap<Vec<TakerRow>> {
    let mut out = SideMap::<Vec<TakerRow>>::default();
    for side in Side::BOTH {
        let mut by_player: HashMap<&str, (usize, usize)> = HashMap::new();
        let mut side_total = 0usize;
        for c in corners.iter().filter(|c| c.side == side) {
            side_total += 1;
            let name = c.event.player.as_deref().unwrap_or(UNKNOWN_PLAYER);
            let entry = by_player.entry(name).or_default();
            entry.0 += 1;
            entry.1 += usize::from(c.shot);
        }
        let mut rows: Vec<TakerRow> = by_player
            .into_iter()
            .map(|(player, (corners, shots))| TakerRow {
                player: player.to_string(),
                corners,
                shots,
                share_pct: 100.0 * corners as f64 / side_total as f64,
            })
            .collect();
        rows.sort_by(|a, b| b.corners.cmp(&a.corners).then_with(|| a.player.cmp(&b.player)));
        rows.truncate(max_players);
        *out.get_mut(side) = rows;
    }
    out
}

/// Header duels of the team's own players inside the window. The player's
/// club comes from the play-by-play rows of the same sequence when present,
/// since the vendor club on header rows is unreliable.
pub fn header_tables(
    headers: &[HeaderRecord],
    sequences: &[SequenceRecord],
    window: &[&Match],
    team: &TeamKey,
    canon: &TeamCanonicalizer,
    max_players: usize,
) -> HeaderTables {
    let window_ids: HashSet<&str> = window.iter().map(|m| m.id.as_str()).collect();

    let mut club_by_player: HashMap<(&str, &str, &str), &str> = HashMap::new();
    for rec in sequences {
        if !window_ids.contains(rec.match_id.as_str()) {
            continue;
        }
        if let (Some(player), Some(club)) = (rec.player.as_deref(), rec.team_raw.as_deref()) {
            club_by_player
                .entry((rec.match_id.as_str(), rec.sequence_id.as_str(), player))
                .or_insert(club);
        }
    }

    let mut taker_by_sequence: HashMap<(&str, &str), &RawEvent> = HashMap::new();
    for m in window {
        for ev in &m.events {
            if let Some(seq) = ev.sequence_id.as_deref() {
                taker_by_sequence.entry((m.id.as_str(), seq)).or_insert(ev);
            }
        }
    }

    let mut attacking: BTreeMap<&str, (usize, usize)> = BTreeMap::new();
    let mut defensive: BTreeMap<&str, (usize, usize)> = BTreeMap::new();
    for h in headers {
        if !window_ids.contains(h.match_id.as_str()) {
            continue;
        }
        let actual_club = h
            .sequence_id
            .as_deref()
            .and_then(|seq| {
                club_by_player
                    .get(&(h.match_id.as_str(), seq, h.player.as_str()))
                    .copied()
            })
            .or(h.club_raw.as_deref());
        let Some(club) = actual_club else {
            continue;
        };
        let is_ours = match (canon.canonicalize(club), team.canon.as_ref()) {
            (Some(c), Some(t)) => &c == t,
            _ => club.trim() == team.raw,
        };
        if !is_ours {
            continue;
        }
        let our_corner = h
            .sequence_id
            .as_deref()
            .and_then(|seq| taker_by_sequence.get(&(h.match_id.as_str(), seq)))
            .is_some_and(|ev| team.owns_event(ev));
        let bucket = if our_corner {
            &mut attacking
        } else {
            &mut defensive
        };
        let entry = bucket.entry(h.player.as_str()).or_default();
        if h.won {
            entry.0 += 1;
        } else {
            entry.1 += 1;
        }
    }

    HeaderTables {
        attacking: rank_targets(attacking, max_players),
        defensive: rank_targets(defensive, max_players),
    }
}

fn rank_targets(grouped: BTreeMap<&str, (usize, usize)>, max_players: usize) -> Vec<TargetRow> {
    let mut rows: Vec<TargetRow> = grouped
        .into_iter()
        .map(|(player, (won, lost))| {
            let duels = won + lost;
            TargetRow {
                player: player.to_string(),
                duels,
                won,
                lost,
                win_rate: if duels == 0 {
                    0.0
                } else {
                    won as f64 / duels as f64
                },
            }
        })
        .collect();
    rows.sort_by(|a, b| b.duels.cmp(&a.duels).then_with(|| a.player.cmp(&b.player)));
    rows.truncate(max_players);
    rows
}

#[cfg(test)]
mod tests {
    use super::*;

    fn corner(player: Option<&str>) -> RawEvent {
        RawEvent {
            match_id: "1".into(),
            sequence_id: Some("7".into()),
            ordinal: 0,
            team_raw: "Vitesse".into(),
            team: None,
            player: player.map(str::to_string),
            start: None,
            end: None,
            result: None,
        }
    }

    #[test]
    fn takers_rank_by_volume_then_name() {
        let a = corner(Some("Bakker"));
        let b = corner(Some("Aalders"));
        let c = corner(None);
        let corners = [
            TakenCorner { side: Side::Left, event: &a, shot: true },
            TakenCorner { side: Side::Left, event: &b, shot: false },
            TakenCorner { side: Side::Left, event: &a, shot: false },
            TakenCorner { side: Side::Right, event: &c, shot: false },
        ];
        let tables = taker_tables(&corners, 15);
        assert_eq!(tables.left[0].player, "Bakker");
        assert_eq!(tables.left[0].corners, 2);
        assert_eq!(tables.left[0].shots, 1);
        assert!((tables.left[0].share_pct - 66.666).abs() < 0.01);
        assert_eq!(tables.left[1].player, "Aalders");
        assert_eq!(tables.right[0].player, UNKNOWN_PLAYER);

        let capped = taker_tables(&corners, 1);
        assert_eq!(capped.left.len(), 1);
    }
}
