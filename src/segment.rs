use super::{Columns, Result, TimeGlucose};
use chrono::Datelike;
use log::{info, warn};
use std::collections::BTreeMap;
use std::path::Path;

/// Row ranges of the reference export, as 0-based data rows after the header.
/// They are tied to the layout of that one file and are not checked
/// against the timestamps.
pub const DEFAULT_YEAR_RANGES: [(&str, usize, usize); 4] = [
    ("2022", 2, 261),
    ("2023", 262, 1347),
    ("2024", 1348, 2445),
    ("2025", 2446, 4416),
];

/// A labelled half-open row range [start, end)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct YearRange {
    pub label: String,
    pub start: usize,
    pub end: usize,
}

impl YearRange {
    pub fn new(label: &str, start: usize, end: usize) -> YearRange {
        YearRange {
            label: label.to_string(),
            start,
            end,
        }
    }

    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// One year of readings with the label used in the chart title
#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    pub label: String,
    pub data: TimeGlucose,
}

/// How the full series is split into year segments.
#[derive(Debug, Clone, PartialEq)]
pub enum Segmentation {
    /// Literal row ranges, in table order.
    RowRanges(Vec<YearRange>),
    /// Grouping by the calendar year of each timestamp,
    /// rows without a timestamp are dropped.
    CalendarYear,
}

impl Default for Segmentation {
    fn default() -> Self {
        Segmentation::RowRanges(
            DEFAULT_YEAR_RANGES
                .iter()
                .map(|&(label, start, end)| YearRange::new(label, start, end))
                .collect(),
        )
    }
}

impl Segmentation {
    pub fn split(&self, tg: &TimeGlucose) -> Vec<Segment> {
        match self {
            Segmentation::RowRanges(ranges) => ranges
                .iter()
                .map(|r| {
                    if r.end > tg.len() {
                        warn!(
                            "rows {}..{} for {} exceed the {} rows read, the segment is truncated",
                            r.start,
                            r.end,
                            r.label,
                            tg.len()
                        );
                    }
                    Segment {
                        label: r.label.clone(),
                        data: tg.slice(r.start, r.end),
                    }
                })
                .collect(),
            Segmentation::CalendarYear => {
                let mut years: BTreeMap<i32, TimeGlucose> = BTreeMap::new();
                for (t, &g) in tg.time.iter().zip(tg.glucose.iter()) {
                    if let Some(t) = t {
                        years
                            .entry(t.year())
                            .or_insert_with(|| TimeGlucose::new(0))
                            .push(Some(*t), g);
                    }
                }
                years
                    .into_iter()
                    .map(|(year, data)| Segment {
                        label: year.to_string(),
                        data,
                    })
                    .collect()
            }
        }
    }
}

/// Reads the export and splits it into the year segments.
pub fn read_year_segments<P: AsRef<Path>>(
    fin: P,
    columns: &Columns,
    segmentation: &Segmentation,
) -> Result<Vec<Segment>> {
    let tg = TimeGlucose::from_csv(fin, columns)?;
    let segments = segmentation.split(&tg);
    for s in segments.iter() {
        info!("segment {}: {} readings", s.label, s.data.len());
    }
    Ok(segments)
}
