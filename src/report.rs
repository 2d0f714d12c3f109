use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use rust_xlsxwriter::{Color, Format, Image, Workbook, Worksheet, XlsxError};
use serde::{Deserialize, Serialize};

use crate::corner_analysis::AnalysisResult;
use crate::figures::{self, ImagePayload, parse_hex_color};
use crate::player_tables::TakerRow;
use crate::team_theme::{DEFAULT_TOP_HEX, TeamTheme, slugify};
use crate::zones::{Role, Side, ZoneConfig};

pub const SLOT_LEFT_POSITIONS: &str = "PH_Corners_left_positions_vis";
pub const SLOT_RIGHT_POSITIONS: &str = "PH_Corners_right_positions_vis";
pub const SLOT_LEFT_SHOTS: &str = "PH_Corners_left_shots_vis";
pub const SLOT_RIGHT_SHOTS: &str = "PH_Corners_right_shots_vis";
pub const SLOT_DEF_LEFT: &str = "PH_def_left";
pub const SLOT_DEF_RIGHT: &str = "PH_def_right";
pub const TOKEN_ATT_HEADERS: &str = "{att_corners_headers}";
pub const TOKEN_DEF_HEADERS: &str = "{def_corners_headers}";

#[derive(Debug, thiserror::Error)]
pub enum FillError {
    #[error("template has no slot `{slot}` on slide {slide}")]
    MissingSlot { slide: usize, slot: String },
    #[error("template has no image token `{0}`")]
    MissingToken(String),
    #[error("render failed: {0}")]
    Render(String),
}

impl From<XlsxError> for FillError {
    fn from(err: XlsxError) -> Self {
        FillError::Render(err.to_string())
    }
}

#[derive(Debug, Clone)]
pub struct SlotImage {
    pub slide: usize,
    pub slot: String,
    pub payload: ImagePayload,
}

#[derive(Debug, Clone)]
pub struct ReportRequest {
    pub team_name: String,
    pub primary_hex: String,
    pub secondary_hex: String,
    pub logo_path: Option<PathBuf>,
    pub text: BTreeMap<String, String>,
    pub images_by_slot: Vec<SlotImage>,
    /// Optional payloads; dropped on the retry after a rejected fill.
    pub images_by_token: BTreeMap<String, Vec<ImagePayload>>,
    pub left_takers: Vec<TakerRow>,
    pub right_takers: Vec<TakerRow>,
}

impl ReportRequest {
    pub fn has_optional_payloads(&self) -> bool {
        self.images_by_token.values().any(|v| !v.is_empty())
    }

    fn without_optional_payloads(mut self) -> Self {
        self.images_by_token.clear();
        self
    }

    pub fn substitute(&self, line: &str) -> String {
        self.text
            .iter()
            .fold(line.to_string(), |acc, (token, value)| acc.replace(token, value))
    }
}

#[derive(Debug, Clone)]
pub struct FilledReport {
    pub bytes: Vec<u8>,
    pub file_name: String,
}

pub trait TemplateFiller {
    fn fill(&self, request: &ReportRequest) -> Result<FilledReport, FillError>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateSlide {
    pub title: String,
    #[serde(default)]
    pub lines: Vec<String>,
    #[serde(default)]
    pub slots: Vec<String>,
    #[serde(default)]
    pub tokens: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportTemplate {
    pub slides: Vec<TemplateSlide>,
}

impl Default for ReportTemplate {
    fn default() -> Self {
        let owned = |items: &[&str]| items.iter().map(|s| s.to_string()).collect::<Vec<_>>();
        Self {
            slides: vec![
                TemplateSlide {
                    title: "Attacking corners".to_string(),
                    lines: owned(&[
                        "{TEAM_NAME} attacking corners",
                        "Window: {WINDOW} of {MATCHES_ANALYZED} matches",
                        "Left corners: {nlc}",
                        "Right corners: {nrc}",
                        "{middle_bar}",
                    ]),
                    slots: owned(&[
                        SLOT_LEFT_POSITIONS,
                        SLOT_RIGHT_POSITIONS,
                        SLOT_LEFT_SHOTS,
                        SLOT_RIGHT_SHOTS,
                    ]),
                    tokens: owned(&[TOKEN_ATT_HEADERS]),
                },
                TemplateSlide {
                    title: "Defending corners".to_string(),
                    lines: owned(&[
                        "{TEAM_NAME} defending corners",
                        "Window: {WINDOW} of {MATCHES_ANALYZED} matches",
                        "{bottom_bar}",
                    ]),
                    slots: owned(&[SLOT_DEF_LEFT, SLOT_DEF_RIGHT]),
                    tokens: owned(&[TOKEN_DEF_HEADERS]),
                },
            ],
        }
    }
}

impl ReportTemplate {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("read report template {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("parse report template {}", path.display()))
    }

    /// Every slot and token in the request must exist on the named slide.
    pub fn check(&self, request: &ReportRequest) -> Result<(), FillError> {
        for img in &request.images_by_slot {
            let known = self
                .slides
                .get(img.slide)
                .is_some_and(|s| s.slots.iter().any(|slot| *slot == img.slot));
            if !known {
                return Err(FillError::MissingSlot {
                    slide: img.slide,
                    slot: img.slot.clone(),
                });
            }
        }
        let tokens: BTreeSet<&str> = self
            .slides
            .iter()
            .flat_map(|s| s.tokens.iter().map(String::as_str))
            .collect();
        for (token, payloads) in &request.images_by_token {
            if !payloads.is_empty() && !tokens.contains(token.as_str()) {
                return Err(FillError::MissingToken(token.clone()));
            }
        }
        Ok(())
    }
}

/// Renders the report as an xlsx workbook: one worksheet per slide plus a
/// takers sheet.
#[derive(Debug, Clone, Default)]
pub struct WorkbookFiller {
    pub template: ReportTemplate,
}

const IMAGE_ROW_START: u32 = 8;
const IMAGE_ROWS: u32 = 22;
const IMAGE_COLS: u16 = 8;
const IMAGE_SCALE: f64 = 0.5;

impl WorkbookFiller {
    pub fn new(template: ReportTemplate) -> Self {
        Self { template }
    }
}

impl TemplateFiller for WorkbookFiller {
    fn fill(&self, request: &ReportRequest) -> Result<FilledReport, FillError> {
        self.template.check(request)?;

        let primary = hex_to_color(&request.primary_hex).unwrap_or(Color::Black);
        let secondary = hex_to_color(&request.secondary_hex).unwrap_or(Color::White);
        let banner = Format::new()
            .set_bold()
            .set_font_size(18)
            .set_background_color(primary)
            .set_font_color(secondary);

        let mut workbook = Workbook::new();
        for (slide_idx, slide) in self.template.slides.iter().enumerate() {
            let sheet = workbook.add_worksheet();
            sheet.set_name(sheet_name(&slide.title, slide_idx))?;
            sheet.write_string_with_format(0, 0, &request.team_name, &banner)?;
            for col in 1..IMAGE_COLS * 2 {
                sheet.write_blank(0, col, &banner)?;
            }
            if slide_idx == 0
                && let Some(logo) = request.logo_path.as_deref()
            {
                insert_logo(sheet, logo)?;
            }

            for (line_idx, line) in slide.lines.iter().enumerate() {
                let row = 2 + line_idx as u32;
                let text = request.substitute(line);
                match hex_to_color(&text) {
                    Some(color) => {
                        let band = Format::new().set_background_color(color);
                        for col in 0..IMAGE_COLS * 2 {
                            sheet.write_blank(row, col, &band)?;
                        }
                    }
                    None => {
                        sheet.write_string(row, 0, &text)?;
                    }
                }
            }

            let mut placed = 0u32;
            for slot in &slide.slots {
                let Some(img) = request
                    .images_by_slot
                    .iter()
                    .find(|i| i.slide == slide_idx && i.slot == *slot)
                else {
                    continue;
                };
                place_image(sheet, placed, &img.payload)?;
                placed += 1;
            }
            for token in &slide.tokens {
                for payload in request.images_by_token.get(token).into_iter().flatten() {
                    place_image(sheet, placed, payload)?;
                    placed += 1;
                }
            }
        }

        let sheet = workbook.add_worksheet();
        sheet.set_name("Takers")?;
        write_taker_rows(sheet, Side::Left, &request.left_takers, 0)?;
        write_taker_rows(sheet, Side::Right, &request.right_takers, 6)?;

        let bytes = workbook.save_to_buffer()?;
        Ok(FilledReport {
            bytes,
            file_name: report_file_name(&request.team_name),
        })
    }
}

fn place_image(sheet: &mut Worksheet, index: u32, payload: &ImagePayload) -> Result<(), FillError> {
    let row = IMAGE_ROW_START + (index / 2) * IMAGE_ROWS;
    let col = (index % 2) as u16 * IMAGE_COLS;
    let mut image = Image::new_from_buffer(&payload.bytes)?;
    image.set_scale_width(IMAGE_SCALE).set_scale_height(IMAGE_SCALE);
    sheet.insert_image(row, col, &image)?;
    Ok(())
}

fn insert_logo(sheet: &mut Worksheet, logo: &Path) -> Result<(), FillError> {
    match Image::new(logo) {
        Ok(mut image) => {
            image.set_scale_width(0.25).set_scale_height(0.25);
            sheet.insert_image(0, IMAGE_COLS * 2, &image)?;
        }
        Err(err) => {
            tracing::warn!(path = %logo.display(), error = %err, "logo not embedded");
        }
    }
    Ok(())
}

fn write_taker_rows(
    sheet: &mut Worksheet,
    side: Side,
    rows: &[TakerRow],
    first_col: u16,
) -> Result<(), FillError> {
    let bold = Format::new().set_bold();
    let title = format!("{} corner takers", side.label());
    sheet.write_string_with_format(0, first_col, &title, &bold)?;
    for (offset, header) in ["Player", "Corners", "Shots", "Share %"].iter().enumerate() {
        sheet.write_string_with_format(1, first_col + offset as u16, *header, &bold)?;
    }
    for (idx, row) in rows.iter().enumerate() {
        let r = 2 + idx as u32;
        sheet.write_string(r, first_col, &row.player)?;
        sheet.write_number(r, first_col + 1, row.corners as f64)?;
        sheet.write_number(r, first_col + 2, row.shots as f64)?;
        sheet.write_number(r, first_col + 3, (row.share_pct * 10.0).round() / 10.0)?;
    }
    Ok(())
}

fn hex_to_color(raw: &str) -> Option<Color> {
    let rgb = parse_hex_color(raw)?;
    Some(Color::RGB(
        (rgb[0] as u32) << 16 | (rgb[1] as u32) << 8 | rgb[2] as u32,
    ))
}

/// Worksheet names are capped at 31 chars and may not contain `[]:*?/\`.
fn sheet_name(title: &str, idx: usize) -> String {
    let cleaned: String = title
        .chars()
        .filter(|c| !matches!(c, '[' | ']' | ':' | '*' | '?' | '/' | '\\'))
        .take(31)
        .collect();
    if cleaned.trim().is_empty() {
        format!("Slide {}", idx + 1)
    } else {
        cleaned
    }
}

pub fn report_file_name(team: &str) -> String {
    let slug = slugify(team);
    if slug.is_empty() {
        "corner_report.xlsx".to_string()
    } else {
        format!("{slug}_corner_report.xlsx")
    }
}

/// Builds figures and substitutions for one analysis. Header charts are
/// best-effort: a render failure leaves them out.
pub fn build_report_request(
    result: &AnalysisResult,
    theme: &TeamTheme,
    zones: &ZoneConfig,
    logo_root: &Path,
) -> Result<ReportRequest> {
    let accent = parse_hex_color(&theme.top_hex)
        .or_else(|| parse_hex_color(DEFAULT_TOP_HEX))
        .unwrap_or(image::Rgb([17, 24, 39]));
    let corners = &result.corners;

    let mut images_by_slot = Vec::with_capacity(6);
    let mut push = |slide: usize, slot: &str, payload: ImagePayload| {
        images_by_slot.push(SlotImage {
            slide,
            slot: slot.to_string(),
            payload,
        });
    };
    for (side, pos_slot, shot_slot, def_slot) in [
        (Side::Left, SLOT_LEFT_POSITIONS, SLOT_LEFT_SHOTS, SLOT_DEF_LEFT),
        (Side::Right, SLOT_RIGHT_POSITIONS, SLOT_RIGHT_SHOTS, SLOT_DEF_RIGHT),
    ] {
        let att_layout = zones.layout(Role::Attacking, side);
        push(
            0,
            pos_slot,
            figures::position_heatmap(att_layout, corners.positions.get(side), accent)
                .with_context(|| format!("{side} position figure"))?,
        );
        push(
            0,
            shot_slot,
            figures::shot_heatmap(
                att_layout,
                corners.attacking_shots.get(side),
                Some(result.percentiles.get(side)),
                accent,
            )
            .with_context(|| format!("{side} attacking shot figure"))?,
        );
        push(
            1,
            def_slot,
            figures::shot_heatmap(
                zones.layout(Role::Defensive, side),
                corners.defensive_shots.get(side),
                None,
                accent,
            )
            .with_context(|| format!("{side} defensive shot figure"))?,
        );
    }

    let mut images_by_token = BTreeMap::new();
    let (att_headers, def_headers) = match result.headers.as_ref() {
        Some(tables) => (
            best_effort(figures::target_bars(&tables.attacking, accent), "attacking headers"),
            best_effort(figures::diverging_bars(&tables.defensive), "defensive headers"),
        ),
        None => (None, None),
    };
    images_by_token.insert(TOKEN_ATT_HEADERS.to_string(), att_headers.into_iter().collect());
    images_by_token.insert(TOKEN_DEF_HEADERS.to_string(), def_headers.into_iter().collect());

    let text = BTreeMap::from([
        ("{TEAM_NAME}".to_string(), result.team.clone()),
        ("{nlc}".to_string(), corners.own_left_count.to_string()),
        ("{nrc}".to_string(), corners.own_right_count.to_string()),
        ("{MATCHES_ANALYZED}".to_string(), result.team_total_matches.to_string()),
        ("{WINDOW}".to_string(), result.window_label.clone()),
        ("{bottom_bar}".to_string(), theme.rest_hex.clone()),
        ("{middle_bar}".to_string(), theme.rest_hex.clone()),
    ]);

    let logo_path = logo_root.join(&theme.logo_relpath);
    Ok(ReportRequest {
        team_name: result.team.clone(),
        primary_hex: theme.top_hex.clone(),
        secondary_hex: theme.rest_hex.clone(),
        logo_path: logo_path.exists().then_some(logo_path),
        text,
        images_by_slot,
        images_by_token,
        left_takers: result.takers.left.clone(),
        right_takers: result.takers.right.clone(),
    })
}

fn best_effort(rendered: Result<Option<ImagePayload>>, what: &str) -> Option<ImagePayload> {
    match rendered {
        Ok(payload) => payload,
        Err(err) => {
            tracing::warn!(figure = what, error = %format!("{err:#}"), "figure skipped");
            None
        }
    }
}

/// Fills the template; if that fails while optional payloads are present,
/// tries once more without them. A missing required slot is not retried.
pub fn fill_report(
    filler: &dyn TemplateFiller,
    request: ReportRequest,
) -> Result<FilledReport, FillError> {
    match filler.fill(&request) {
        Ok(filled) => Ok(filled),
        Err(err @ FillError::MissingSlot { .. }) => Err(err),
        Err(err) if request.has_optional_payloads() => {
            tracing::warn!(error = %err, "retrying report without optional figures");
            filler.fill(&request.without_optional_payloads())
        }
        Err(err) => Err(err),
    }
}
