use std::collections::HashMap;

use once_cell::sync::Lazy;
use serde::Serialize;

pub const DEFAULT_TOP_HEX: &str = "#111827";
pub const DEFAULT_REST_HEX: &str = "#FFFFFF";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TeamTheme {
    pub top_hex: String,
    pub rest_hex: String,
    pub logo_relpath: String,
}

impl TeamTheme {
    fn new(top: &str, rest: &str, logo: &str) -> Self {
        Self {
            top_hex: top.to_string(),
            rest_hex: rest.to_string(),
            logo_relpath: logo.to_string(),
        }
    }

    pub fn fallback(team: &str) -> Self {
        let logo = if team.trim().is_empty() {
            "logos/default.png".to_string()
        } else {
            format!("logos/{}.png", slugify(team))
        };
        Self {
            top_hex: DEFAULT_TOP_HEX.to_string(),
            rest_hex: DEFAULT_REST_HEX.to_string(),
            logo_relpath: logo,
        }
    }
}

static BUILTIN_THEMES: Lazy<Vec<(&'static str, TeamTheme)>> = Lazy::new(|| {
    let t = TeamTheme::new;
    vec![
        ("ADO Den Haag", t("#00802C", "#FFE200", "logos/ado_den_haag.png")),
        ("Almere City FC", t("#E3001B", "#FFFFFF", "logos/almere_city_fc.png")),
        ("FC Dordrecht", t("#D2232A", "#FFFFFF", "logos/fc_dordrecht.png")),
        ("Jong Ajax", t("#C31F3D", "#FFFFFF", "logos/jong_ajax.png")),
        ("Jong AZ", t("#DB0021", "#FFFFFF", "logos/jong_az.png")),
        ("Jong FC Utrecht", t("#ED1A2F", "#FFFFFF", "logos/jong_fc_utrecht.png")),
        ("Jong PSV", t("#E62528", "#FFFFFF", "logos/jong_psv.png")),
        ("TOP Oss", t("#D9031F", "#FFFFFF", "logos/top_oss.png")),
        ("FC Emmen", t("#E43B3B", "#FFFFFF", "logos/fc_emmen.png")),
        ("MVV Maastricht", t("#FA292F", "#FEFDFB", "logos/mvv_maastricht.png")),
        ("De Graafschap", t("#0C8CCC", "#FFFFFF", "logos/de_graafschap.png")),
        ("Eindhoven", t("#0474BC", "#FFFFFF", "logos/eindhoven.png")),
        ("FC Den Bosch", t("#048CD4", "#FFFFFF", "logos/fc_den_bosch.png")),
        ("Helmond Sport", t("#000000", "#E2001A", "logos/helmond_sport.png")),
        ("RKC Waalwijk", t("#2B63B7", "#FEE816", "logos/rkc_waalwijk.png")),
        ("Roda JC Kerkrade", t("#070E0C", "#FAC300", "logos/roda_jc_kerkrade.png")),
        ("SC Cambuur", t("#000000", "#FFD800", "logos/sc_cambuur.png")),
        ("Vitesse", t("#000000", "#FFD500", "logos/vitesse.png")),
        ("VVV-Venlo", t("#12100B", "#FEE000", "logos/vvv_venlo.png")),
        ("Willem II", t("#242C84", "#FFFFFF", "logos/willem_ii.png")),
        ("Ajax W", t("#C31F3D", "#FFFFFF", "logos/jong_ajax.png")),
        ("ADO Den Haag W", t("#00802C", "#FFE200", "logos/ado_den_haag.png")),
        ("PSV W", t("#E62528", "#FFFFFF", "logos/jong_psv.png")),
        ("AZ W", t("#DB0021", "#FFFFFF", "logos/jong_az.png")),
        ("Utrecht W", t("#ED1A2F", "#FFFFFF", "logos/jong_fc_utrecht.png")),
        ("Excelsior Rotterdam W", t("#E2001A", "#000000", "logos/excelsior_rotterdam.png")),
        ("SC Heerenveen W", t("#004F9F", "#FFFFFF", "logos/sc_heerenveen.png")),
        ("FC Twente W", t("#E6001A", "#FFFFFF", "logos/fc_twente.png")),
        ("Hera United W", t("#191970", "#FFFFFF", "logos/hera_united.png")),
        ("NAC Breda W", t("#282828", "#FFDD25", "logos/nac_breda.png")),
        ("Feyenoord W", t("#FF0000", "#000000", "logos/feyenoord.png")),
        ("PEC Zwolle W", t("#1E59AE", "#6AC2EE", "logos/pec_zwolle.png")),
    ]
});

type Strategy = fn(&ThemeBook, &str) -> Option<TeamTheme>;

/// Tried in order; the first hit wins.
const STRATEGIES: &[Strategy] = &[by_exact, by_trimmed, by_folded, by_compact];

#[derive(Debug, Clone)]
pub struct ThemeBook {
    exact: HashMap<String, TeamTheme>,
    folded: HashMap<String, TeamTheme>,
}

impl Default for ThemeBook {
    fn default() -> Self {
        Self::from_entries(BUILTIN_THEMES.iter().map(|(k, v)| (k.to_string(), v.clone())))
    }
}

impl ThemeBook {
    pub fn from_entries(entries: impl IntoIterator<Item = (String, TeamTheme)>) -> Self {
        let mut exact = HashMap::new();
        let mut folded = HashMap::new();
        for (name, theme) in entries {
            folded
                .entry(name.to_uppercase())
                .or_insert_with(|| theme.clone());
            exact.insert(name, theme);
        }
        Self { exact, folded }
    }

    pub fn theme_for(&self, team: &str) -> TeamTheme {
        if team.is_empty() {
            return TeamTheme::fallback("");
        }
        STRATEGIES
            .iter()
            .find_map(|strategy| strategy(self, team))
            .unwrap_or_else(|| TeamTheme::fallback(team))
    }
}

fn by_exact(book: &ThemeBook, team: &str) -> Option<TeamTheme> {
    book.exact.get(team).cloned()
}

fn by_trimmed(book: &ThemeBook, team: &str) -> Option<TeamTheme> {
    book.exact.get(team.trim()).cloned()
}

fn by_folded(book: &ThemeBook, team: &str) -> Option<TeamTheme> {
    book.folded.get(&team.trim().to_uppercase()).cloned()
}

fn by_compact(book: &ThemeBook, team: &str) -> Option<TeamTheme> {
    let compact = team.split_whitespace().collect::<Vec<_>>().join(" ");
    book.folded.get(&compact.to_uppercase()).cloned()
}

/// Lowercase, punctuation dropped, separator runs collapsed to `_`.
pub fn slugify(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut pending_sep = false;
    for ch in name.trim().to_lowercase().chars() {
        if ch.is_alphanumeric() {
            if pending_sep && !out.is_empty() {
                out.push('_');
            }
            pending_sep = false;
            out.push(ch);
        } else if ch.is_whitespace() || ch == '_' || ch == '-' {
            pending_sep = true;
        }
    }
    if pending_sep {
        out.push('_');
    }
    out
}
