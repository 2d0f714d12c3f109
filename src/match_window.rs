use std::cmp::Ordering;

use crate::corner_dataset::{Match, RawEvent};
use crate::error::PipelineError;
use crate::team_canon::{CanonicalTeam, TeamCanonicalizer};

/// A team as the user picked it: the trimmed raw string plus its canonical identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TeamKey {
    pub raw: String,
    pub canon: Option<CanonicalTeam>,
}

impl TeamKey {
    pub fn new(raw: &str, canon: &TeamCanonicalizer) -> Self {
        Self {
            raw: raw.trim().to_string(),
            canon: canon.canonicalize(raw),
        }
    }

    pub fn display_name(&self) -> &str {
        self.canon.as_ref().map(|c| c.as_str()).unwrap_or(&self.raw)
    }

    /// Canonical participation first, then a verbatim raw-name hit.
    pub fn plays_in(&self, m: &Match) -> bool {
        if let Some(canon) = self.canon.as_ref()
            && m.teams_canon.contains(canon)
        {
            return true;
        }
        !self.raw.is_empty() && m.teams_raw.contains(&self.raw)
    }

    pub fn owns_event(&self, ev: &RawEvent) -> bool {
        if let (Some(ours), Some(theirs)) = (self.canon.as_ref(), ev.team.as_ref())
            && ours == theirs
        {
            return true;
        }
        !self.raw.is_empty() && ev.team_raw.trim() == self.raw
    }
}

/// All of the team's matches, newest first. Undated matches sort last and ties
/// keep load order.
pub fn team_matches<'a>(matches: &'a [Match], team: &TeamKey) -> Vec<&'a Match> {
    let mut out: Vec<&Match> = matches.iter().filter(|m| team.plays_in(m)).collect();
    out.sort_by(|a, b| match (a.date, b.date) {
        (Some(da), Some(db)) => db.cmp(&da),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    });
    out
}

#[derive(Debug, Clone)]
pub struct Window<'a> {
    pub matches: Vec<&'a Match>,
    pub requested: usize,
    pub size: usize,
    pub team_total: usize,
}

impl Window<'_> {
    pub fn match_ids(&self) -> Vec<String> {
        self.matches.iter().map(|m| m.id.clone()).collect()
    }

    pub fn label(&self) -> String {
        window_label(self.size, self.team_total)
    }
}

pub fn clamp_window(requested: usize, total: usize) -> usize {
    requested.clamp(1, total.max(1))
}

pub fn select_window<'a>(
    matches: &'a [Match],
    team: &TeamKey,
    requested: usize,
) -> Result<Window<'a>, PipelineError> {
    let mut all = team_matches(matches, team);
    if all.is_empty() {
        return Err(PipelineError::NoMatches {
            team: team.display_name().to_string(),
        });
    }
    let team_total = all.len();
    let size = clamp_window(requested, team_total);
    all.truncate(size);
    Ok(Window {
        matches: all,
        requested,
        size,
        team_total,
    })
}

pub fn window_label(n: usize, total: usize) -> String {
    if n >= total {
        "All".to_string()
    } else {
        format!("Last {n}")
    }
}
