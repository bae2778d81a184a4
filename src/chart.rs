//! Per-year glucose chart: real-time x axis with 3-hour ticks,
//! alternating day bands from midnight to midnight, and a date label under each day.
//!
//! The layout is computed first ([`ChartLayout`]) and then drawn on a
//! drawing area handed in by the caller, so nothing is shared between renders.

use super::{min_and_max, Result, TimeGlucose};
use chrono::{Duration, NaiveDateTime, NaiveTime};
use log::{debug, info};
use plotters::coord::ranged1d::{KeyPointHint, NoDefaultFormatting, Ranged, ValueFormatter};
use plotters::coord::types::RangedCoordf64;
use plotters::coord::Shift;
use plotters::prelude::*;
use plotters::style::text_anchor::{HPos, Pos, VPos};
use std::ops::Range;
use std::path::Path;

/// Rows of the segment plotted when no window is given.
pub const DEFAULT_WINDOW: Range<usize> = 0..500;
pub const DEFAULT_SIZE: (u32, u32) = (1400, 600);

pub const TICK_HOURS: i64 = 3;
pub const TICK_FORMAT: &str = "%H";
pub const DATE_FORMAT: &str = "%Y-%m-%d";

pub const BAND_COLORS: [RGBColor; 2] = [RGBColor(0x20, 0xc2, 0xa7), RGBColor(0xcd, 0x56, 0xd8)];
pub const BAND_ALPHA: f64 = 0.2;
pub const LINE_COLOR: RGBColor = RGBColor(31, 119, 180);

/// Pixels between the bottom of the plot and the top of the date labels.
pub const DATE_LABEL_OFFSET: i32 = 30;

/// Used when the window has nothing to plot.
pub const FALLBACK_Y_RANGE: (f64, f64) = (0., 20.);

/// One calendar day [start, end) of background shading
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DayBand {
    pub index: usize,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl DayBand {
    pub fn color_index(&self) -> usize {
        self.index % BAND_COLORS.len()
    }

    pub fn color(&self) -> RGBColor {
        BAND_COLORS[self.color_index()]
    }

    pub fn label(&self) -> String {
        self.start.format(DATE_FORMAT).to_string()
    }
}

pub fn floor_to_midnight(t: NaiveDateTime) -> NaiveDateTime {
    t.date().and_time(NaiveTime::MIN)
}

/// One band per day between the first timestamp floored to midnight
/// and the last timestamp floored to midnight plus one day.
/// No valid timestamp, no bands.
pub fn day_bands(tg: &TimeGlucose) -> Vec<DayBand> {
    let (tmin, tmax) = match tg.time_range() {
        Some(r) => r,
        None => return Vec::new(),
    };
    let first = floor_to_midnight(tmin);
    let last = floor_to_midnight(tmax) + Duration::days(1);
    let num_days = (last - first).num_days();
    (0..num_days)
        .map(|i| {
            let start = first + Duration::days(i);
            DayBand {
                index: i as usize,
                start,
                end: start + Duration::days(1),
            }
        })
        .collect()
}

/// Instants every 3 hours from `start` up to and including `end`.
pub fn three_hour_ticks(start: NaiveDateTime, end: NaiveDateTime) -> Vec<NaiveDateTime> {
    let step = Duration::hours(TICK_HOURS);
    let mut ticks = Vec::new();
    let mut t = start;
    while t <= end {
        ticks.push(t);
        t += step;
    }
    ticks
}

pub fn hours_since(origin: NaiveDateTime, t: NaiveDateTime) -> f64 {
    (t - origin).num_seconds() as f64 / 3600.
}

/// Hour-of-day label for a position on the x axis.
pub fn tick_label(origin: Option<NaiveDateTime>, hours: f64) -> String {
    match origin {
        Some(o) => (o + Duration::seconds((hours * 3600.).round() as i64))
            .format(TICK_FORMAT)
            .to_string(),
        None => format!("{:02}", (hours.round() as i64).rem_euclid(24)),
    }
}

/// X axis in hours since midnight, with the key points pinned to the 3-hour ticks
/// instead of the ones plotters would pick.
#[derive(Clone)]
pub struct HourAxis {
    inner: RangedCoordf64,
    origin: Option<NaiveDateTime>,
    ticks: Vec<f64>,
}

impl HourAxis {
    pub fn new(range: Range<f64>, origin: Option<NaiveDateTime>, ticks: Vec<f64>) -> HourAxis {
        HourAxis {
            inner: range.into(),
            origin,
            ticks,
        }
    }
}

impl Ranged for HourAxis {
    type FormatOption = NoDefaultFormatting;
    type ValueType = f64;

    fn map(&self, value: &f64, limit: (i32, i32)) -> i32 {
        self.inner.map(value, limit)
    }

    fn key_points<Hint: KeyPointHint>(&self, _hint: Hint) -> Vec<f64> {
        self.ticks.clone()
    }

    fn range(&self) -> Range<f64> {
        self.inner.range()
    }
}

impl ValueFormatter<f64> for HourAxis {
    // the origin is always a midnight
    fn format(value: &f64) -> String {
        tick_label(None, *value)
    }

    fn format_ext(&self, value: &f64) -> String {
        tick_label(self.origin, *value)
    }
}

pub fn chart_title(label: &str) -> String {
    format!("Glucose Levels in {} (3-hour X-axis)", label)
}

/// Everything drawn for one window of a segment.
/// The x coordinate is in hours since `origin`, the first band's midnight.
#[derive(Debug, Clone, PartialEq)]
pub struct ChartLayout {
    pub title: String,
    pub origin: Option<NaiveDateTime>,
    pub x_range: Range<f64>,
    pub ticks: Vec<NaiveDateTime>,
    pub bands: Vec<DayBand>,
    pub y_range: Range<f64>,
    /// Line pieces, split wherever a timestamp or a glucose value is missing.
    pub runs: Vec<Vec<(f64, f64)>>,
}

impl ChartLayout {
    pub fn new(tg: &TimeGlucose, label: &str) -> ChartLayout {
        let bands = day_bands(tg);
        let origin = bands.first().map(|b| b.start);
        let (x_range, ticks) = match (bands.first(), bands.last()) {
            (Some(first), Some(last)) => (
                0.0..hours_since(first.start, last.end),
                three_hour_ticks(first.start, last.end),
            ),
            _ => (0.0..24.0, Vec::new()),
        };

        let mut runs = Vec::new();
        let mut run = Vec::new();
        for (t, &g) in tg.time.iter().zip(tg.glucose.iter()) {
            match (origin, t) {
                (Some(o), Some(t)) if g.is_finite() => run.push((hours_since(o, *t), g)),
                _ => {
                    if !run.is_empty() {
                        runs.push(std::mem::take(&mut run));
                    }
                }
            }
        }
        if !run.is_empty() {
            runs.push(run);
        }

        let (ymin, ymax) = min_and_max(runs.iter().flatten().map(|p| p.1))
            .unwrap_or(FALLBACK_Y_RANGE);
        let ymargin = if ymax > ymin { (ymax - ymin) / 10. } else { 1. };

        ChartLayout {
            title: chart_title(label),
            origin,
            x_range,
            ticks,
            bands,
            y_range: (ymin - ymargin)..(ymax + ymargin),
            runs,
        }
    }

    pub fn tick_hours(&self) -> Vec<f64> {
        match self.origin {
            Some(o) => self.ticks.iter().map(|&t| hours_since(o, t)).collect(),
            None => Vec::new(),
        }
    }

    pub fn tick_labels(&self) -> Vec<String> {
        self.tick_hours()
            .into_iter()
            .map(|h| tick_label(self.origin, h))
            .collect()
    }

    pub fn date_labels(&self) -> Vec<String> {
        self.bands.iter().map(|b| b.label()).collect()
    }

    /// Band extent in x coordinates.
    pub fn band_hours(&self, band: &DayBand) -> (f64, f64) {
        match self.origin {
            Some(o) => (hours_since(o, band.start), hours_since(o, band.end)),
            None => (0., 0.),
        }
    }

    pub fn points(&self) -> usize {
        self.runs.iter().map(|r| r.len()).sum()
    }

    /// Draws the chart on the given area, filling it first.
    pub fn draw<DB: DrawingBackend>(&self, root: &DrawingArea<DB, Shift>) -> Result<()> {
        root.fill(&WHITE)?;
        let (ymin, ymax) = (self.y_range.start, self.y_range.end);
        let mut chart = ChartBuilder::on(root)
            .caption(&self.title, ("sans-serif", 30))
            .margin(20)
            .x_label_area_size(80)
            .y_label_area_size(80)
            .build_cartesian_2d(
                HourAxis::new(self.x_range.clone(), self.origin, self.tick_hours()),
                self.y_range.clone(),
            )?;

        chart
            .configure_mesh()
            .light_line_style(&TRANSPARENT)
            .bold_line_style(RGBColor(200, 200, 200).stroke_width(1))
            .set_all_tick_mark_size(2)
            .label_style(("sans-serif", 16))
            .x_labels(self.ticks.len() + 1)
            .y_label_formatter(&|y: &f64| format!("{:.1}", y))
            .x_desc("Time")
            .y_desc("Glucose Level (mmol/L)")
            .draw()?;

        chart.draw_series(self.bands.iter().map(|b| {
            let (x0, x1) = self.band_hours(b);
            Rectangle::new([(x0, ymin), (x1, ymax)], b.color().mix(BAND_ALPHA).filled())
        }))?;

        for run in self.runs.iter() {
            chart.draw_series(LineSeries::new(
                run.iter().copied(),
                LINE_COLOR.stroke_width(2),
            ))?;
        }

        let date_style = ("sans-serif", 13)
            .into_font()
            .color(&BLUE)
            .pos(Pos::new(HPos::Center, VPos::Top));
        let base = root.get_base_pixel();
        for b in self.bands.iter() {
            let (x0, _) = self.band_hours(b);
            let (px, py) = chart.backend_coord(&(x0, ymin));
            root.draw(&Text::new(
                b.label(),
                (px - base.0, py - base.1 + DATE_LABEL_OFFSET),
                date_style.clone(),
            ))?;
        }
        Ok(())
    }
}

/// Renders rows `window` of `segment` on `root` and returns what was drawn.
pub fn render_segment<DB: DrawingBackend>(
    root: &DrawingArea<DB, Shift>,
    segment: &TimeGlucose,
    label: &str,
    window: Range<usize>,
) -> Result<ChartLayout> {
    let sub = segment.slice(window.start, window.end);
    let layout = ChartLayout::new(&sub, label);
    debug!(
        "{}: {} rows, {} day bands, {} line pieces",
        label,
        sub.len(),
        layout.bands.len(),
        layout.runs.len()
    );
    layout.draw(root)?;
    Ok(layout)
}

/// Renders to an svg file at `fout`.
pub fn render_svg<P: AsRef<Path>>(
    fout: P,
    size: (u32, u32),
    segment: &TimeGlucose,
    label: &str,
    window: Range<usize>,
) -> Result<ChartLayout> {
    let fout = fout.as_ref();
    let root = SVGBackend::new(fout, size).into_drawing_area();
    let layout = render_segment(&root, segment, label, window)?;
    root.present()?;
    info!(
        "plotted {} readings over {} days for {} to {}",
        layout.points(),
        layout.bands.len(),
        label,
        fout.display()
    );
    Ok(layout)
}
