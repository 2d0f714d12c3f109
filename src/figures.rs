use std::io::Cursor;

use anyhow::{Context, Result};
use image::{ImageFormat, Rgb, RgbImage};

use crate::corner_analysis::{PositionDistribution, ZoneShotTable};
use crate::league_stats::{Benchmark, ZonePercentile};
use crate::player_tables::TargetRow;
use crate::zones::{ZoneLayout, ZoneRect};

const PX_PER_M: f64 = 12.0;
const PITCH_X: (f64, f64) = (25.0, 55.0);
const PITCH_Y: (f64, f64) = (-34.0, 34.0);

const BACKGROUND: Rgb<u8> = Rgb([255, 255, 255]);
const PITCH_LINE: Rgb<u8> = Rgb([40, 40, 40]);
const NO_DATA: Rgb<u8> = Rgb([228, 228, 231]);
const ABOVE_LEAGUE: Rgb<u8> = Rgb([22, 163, 74]);
const BELOW_LEAGUE: Rgb<u8> = Rgb([220, 38, 38]);
const NEUTRAL: Rgb<u8> = Rgb([107, 114, 128]);

const BAR_HEIGHT: u32 = 22;
const BAR_GAP: u32 = 8;
const CHART_WIDTH: u32 = 640;

/// Encoded PNG ready to embed in a report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImagePayload {
    pub bytes: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

impl ImagePayload {
    pub fn from_image(img: &RgbImage) -> Result<Self> {
        let mut bytes = Vec::new();
        img.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .context("encode png")?;
        Ok(Self {
            bytes,
            width: img.width(),
            height: img.height(),
        })
    }
}

pub fn parse_hex_color(raw: &str) -> Option<Rgb<u8>> {
    let hex = raw.trim().trim_start_matches('#');
    if hex.len() != 6 || !hex.is_ascii() {
        return None;
    }
    let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
    Some(Rgb([channel(0)?, channel(2)?, channel(4)?]))
}

/// Linear blend from white (0.0) to `accent` (1.0).
fn shade(accent: Rgb<u8>, intensity: f64) -> Rgb<u8> {
    let t = intensity.clamp(0.0, 1.0);
    let mix = |c: u8| (255.0 - (255.0 - c as f64) * t).round() as u8;
    Rgb([mix(accent[0]), mix(accent[1]), mix(accent[2])])
}

struct PitchCanvas {
    img: RgbImage,
}

impl PitchCanvas {
    fn new() -> Self {
        let w = ((PITCH_X.1 - PITCH_X.0) * PX_PER_M) as u32;
        let h = ((PITCH_Y.1 - PITCH_Y.0) * PX_PER_M) as u32;
        Self {
            img: RgbImage::from_pixel(w, h, BACKGROUND),
        }
    }

    /// Pitch metres to pixel coordinates; +y is drawn at the top.
    fn to_px(&self, x: f64, y: f64) -> (i64, i64) {
        let px = ((x - PITCH_X.0) * PX_PER_M).round() as i64;
        let py = ((PITCH_Y.1 - y) * PX_PER_M).round() as i64;
        (px, py)
    }

    fn fill_rect(&mut self, x: (f64, f64), y: (f64, f64), color: Rgb<u8>) {
        let (x0, y0) = self.to_px(x.0, y.1);
        let (x1, y1) = self.to_px(x.1, y.0);
        fill_px(&mut self.img, x0, y0, x1, y1, color);
    }

    fn outline_rect(&mut self, x: (f64, f64), y: (f64, f64), color: Rgb<u8>, thickness: i64) {
        let (x0, y0) = self.to_px(x.0, y.1);
        let (x1, y1) = self.to_px(x.1, y.0);
        fill_px(&mut self.img, x0, y0, x1, y0 + thickness, color);
        fill_px(&mut self.img, x0, y1 - thickness, x1, y1, color);
        fill_px(&mut self.img, x0, y0, x0 + thickness, y1, color);
        fill_px(&mut self.img, x1 - thickness, y0, x1, y1, color);
    }

    fn zone(&mut self, zone: &ZoneRect, fill: Rgb<u8>, border: Rgb<u8>, thickness: i64) {
        let x = (zone.x_min.max(PITCH_X.0), zone.x_max.min(PITCH_X.1));
        let y = (zone.y_min.max(PITCH_Y.0), zone.y_max.min(PITCH_Y.1));
        if x.0 >= x.1 || y.0 >= y.1 {
            return;
        }
        self.fill_rect(x, y, fill);
        self.outline_rect(x, y, border, thickness);
    }

    fn pitch_lines(&mut self) {
        self.outline_rect((36.0, 52.5), (-20.16, 20.16), PITCH_LINE, 2);
        self.outline_rect((47.0, 52.5), (-9.16, 9.16), PITCH_LINE, 2);
        self.fill_rect((52.5, 52.7), PITCH_Y, PITCH_LINE);
        self.fill_rect((52.5, 54.5), (-3.66, 3.66), PITCH_LINE);
    }

    fn finish(self) -> Result<ImagePayload> {
        ImagePayload::from_image(&self.img)
    }
}

fn fill_px(img: &mut RgbImage, x0: i64, y0: i64, x1: i64, y1: i64, color: Rgb<u8>) {
    let (w, h) = (img.width() as i64, img.height() as i64);
    for y in y0.max(0)..y1.min(h) {
        for x in x0.max(0)..x1.min(w) {
            img.put_pixel(x as u32, y as u32, color);
        }
    }
}

/// Zone shading by share of the side's corners; the busiest zone gets the
/// full accent colour.
pub fn position_heatmap(
    layout: &ZoneLayout,
    dist: &PositionDistribution,
    accent: Rgb<u8>,
) -> Result<ImagePayload> {
    let mut canvas = PitchCanvas::new();
    let max_pct = dist
        .zones
        .iter()
        .filter_map(|z| z.pct)
        .fold(0.0_f64, f64::max);
    for rect in &layout.zones {
        let fill = match dist.share(&rect.id).and_then(|s| s.pct) {
            Some(pct) if max_pct > 0.0 => shade(accent, pct / max_pct),
            Some(_) => BACKGROUND,
            None => NO_DATA,
        };
        canvas.zone(rect, fill, NEUTRAL, 1);
    }
    canvas.pitch_lines();
    canvas.finish()
}

/// Zone shading by shot rate, bordered by league placement: top quartile
/// green, bottom quartile red.
pub fn shot_heatmap(
    layout: &ZoneLayout,
    table: &ZoneShotTable,
    percentiles: Option<&[ZonePercentile]>,
    accent: Rgb<u8>,
) -> Result<ImagePayload> {
    let mut canvas = PitchCanvas::new();
    for rect in &layout.zones {
        let fill = match table.stat(&rect.id).and_then(|s| s.rate) {
            Some(rate) => shade(accent, rate),
            None => NO_DATA,
        };
        let benchmark = percentiles
            .and_then(|rows| rows.iter().find(|p| p.zone == rect.id))
            .map(|p| p.benchmark);
        let (border, thickness) = match benchmark {
            Some(Benchmark::Percentile(p)) if p >= 75.0 => (ABOVE_LEAGUE, 4),
            Some(Benchmark::Percentile(p)) if p <= 25.0 => (BELOW_LEAGUE, 4),
            _ => (NEUTRAL, 1),
        };
        canvas.zone(rect, fill, border, thickness);
    }
    canvas.pitch_lines();
    canvas.finish()
}

/// Horizontal duel-volume bars, won portion in `accent`.
pub fn target_bars(rows: &[TargetRow], accent: Rgb<u8>) -> Result<Option<ImagePayload>> {
    if rows.is_empty() {
        return Ok(None);
    }
    let max = rows.iter().map(|r| r.duels).max().unwrap_or(1).max(1) as f64;
    let mut img = RgbImage::from_pixel(CHART_WIDTH, chart_height(rows.len()), BACKGROUND);
    let track = (CHART_WIDTH - 2 * BAR_GAP) as f64;
    for (i, row) in rows.iter().enumerate() {
        let top = bar_top(i);
        let total_w = (track * row.duels as f64 / max).round() as i64;
        let won_w = (track * row.won as f64 / max).round() as i64;
        let left = BAR_GAP as i64;
        fill_px(&mut img, left, top, left + total_w, top + BAR_HEIGHT as i64, NO_DATA);
        fill_px(&mut img, left, top, left + won_w, top + BAR_HEIGHT as i64, accent);
    }
    ImagePayload::from_image(&img).map(Some)
}

/// Won duels to the right of centre, lost to the left.
pub fn diverging_bars(rows: &[TargetRow]) -> Result<Option<ImagePayload>> {
    if rows.is_empty() {
        return Ok(None);
    }
    let max = rows
        .iter()
        .map(|r| r.won.max(r.lost))
        .max()
        .unwrap_or(1)
        .max(1) as f64;
    let mut img = RgbImage::from_pixel(CHART_WIDTH, chart_height(rows.len()), BACKGROUND);
    let centre = (CHART_WIDTH / 2) as i64;
    let half = (CHART_WIDTH / 2 - BAR_GAP) as f64;
    let height = img.height() as i64;
    fill_px(&mut img, centre - 1, 0, centre + 1, height, PITCH_LINE);
    for (i, row) in rows.iter().enumerate() {
        let top = bar_top(i);
        let bottom = top + BAR_HEIGHT as i64;
        let won_w = (half * row.won as f64 / max).round() as i64;
        let lost_w = (half * row.lost as f64 / max).round() as i64;
        fill_px(&mut img, centre + 1, top, centre + 1 + won_w, bottom, ABOVE_LEAGUE);
        fill_px(&mut img, centre - 1 - lost_w, top, centre - 1, bottom, BELOW_LEAGUE);
    }
    ImagePayload::from_image(&img).map(Some)
}

fn chart_height(rows: usize) -> u32 {
    BAR_GAP + rows as u32 * (BAR_HEIGHT + BAR_GAP)
}

fn bar_top(i: usize) -> i64 {
    (BAR_GAP + i as u32 * (BAR_HEIGHT + BAR_GAP)) as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_colours() {
        assert_eq!(parse_hex_color("#FFD500"), Some(Rgb([255, 213, 0])));
        assert_eq!(parse_hex_color("00802c"), Some(Rgb([0, 128, 44])));
        assert_eq!(parse_hex_color("#FFF"), None);
        assert_eq!(parse_hex_color("#GGGGGG"), None);
    }

    #[test]
    fn shade_endpoints() {
        let accent = Rgb([0, 128, 44]);
        assert_eq!(shade(accent, 0.0), BACKGROUND);
        assert_eq!(shade(accent, 1.0), accent);
    }

    #[test]
    fn empty_tables_produce_no_chart() {
        assert!(target_bars(&[], NEUTRAL).unwrap().is_none());
        assert!(diverging_bars(&[]).unwrap().is_none());
    }

    #[test]
    fn charts_encode_as_png() {
        let rows = vec![TargetRow {
            player: "Bakker".into(),
            duels: 3,
            won: 2,
            lost: 1,
            win_rate: 2.0 / 3.0,
        }];
        let payload = diverging_bars(&rows).unwrap().unwrap();
        assert_eq!(&payload.bytes[1..4], b"PNG");
        assert_eq!(payload.height, chart_height(1));
    }
}
