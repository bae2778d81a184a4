use chrono::prelude::*;
use csv::{ReaderBuilder, StringRecord, Trim};
use log::{debug, info, trace, warn};
use std::io::Read;
use std::path::Path;
pub mod chart;
pub mod error;
pub mod filter;
pub mod plot;
pub mod segment;

pub use error::{GlucoseError, Result};
pub use segment::{read_year_segments, Segment, Segmentation, YearRange};

pub const VERSION: Option<&'static str> = option_env!("CARGO_PKG_VERSION");

pub const DEFAULT_CSVFILE: &str = "glucose_data/glucose_data.csv";
pub const DEFAULT_TIME_COLUMN: &str = "Device Timestamp";
pub const DEFAULT_GLUCOSE_COLUMN: &str = "Historic Glucose mmol/L";

/// Day-first formats first, then the ISO forms, tried in order.
/// `%Y` takes any number of digits, so the two-digit years go before it.
pub const DT_FORMATS: [&str; 16] = [
    "%d/%m/%y %H:%M",
    "%d-%m-%y %H:%M",
    "%d/%m/%Y %H:%M",
    "%d/%m/%Y %H:%M:%S",
    "%d-%m-%Y %H:%M",
    "%d-%m-%Y %H:%M:%S",
    "%d.%m.%Y %H:%M",
    "%d.%m.%Y %H:%M:%S",
    "%d/%m/%Y %I:%M %p",
    "%d-%m-%Y %I:%M %p",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%dT%H:%M:%S",
    "%Y/%m/%d %H:%M",
    "%Y/%m/%d %H:%M:%S",
];

pub const DATE_FORMATS: [&str; 6] = [
    "%d/%m/%y", "%d-%m-%y", "%d/%m/%Y", "%d-%m-%Y", "%d.%m.%Y", "%Y-%m-%d",
];

/// Header names of the two columns read from the export
#[derive(Debug, Clone, PartialEq)]
pub struct Columns {
    pub time: String,
    pub glucose: String,
}

impl Default for Columns {
    fn default() -> Self {
        Columns {
            time: DEFAULT_TIME_COLUMN.to_string(),
            glucose: DEFAULT_GLUCOSE_COLUMN.to_string(),
        }
    }
}

/// The main struct for the glucose time series.
/// Rows keep the file order; a missing timestamp is `None`
/// and a missing glucose value is NAN.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TimeGlucose {
    pub time: Vec<Option<NaiveDateTime>>,
    pub glucose: Vec<f64>,
}

impl TimeGlucose {
    pub fn new(capacity: usize) -> TimeGlucose {
        TimeGlucose {
            time: Vec::with_capacity(capacity),
            glucose: Vec::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, time: Option<NaiveDateTime>, glucose: f64) {
        self.time.push(time);
        self.glucose.push(glucose);
    }

    pub fn len(&self) -> usize {
        self.time.len()
    }

    pub fn is_empty(&self) -> bool {
        self.time.is_empty()
    }

    /// Init a TimeGlucose from a CGM export.
    /// The whole file is read before parsing; the first line is a title
    /// and the header is on the second line.
    /// Cells that do not parse become missing values, only I/O errors,
    /// a missing header, or a missing column fail the read.
    pub fn from_csv<P: AsRef<Path>>(fin: P, columns: &Columns) -> Result<TimeGlucose> {
        let fin = fin.as_ref();
        let content = std::fs::read_to_string(fin).map_err(|source| GlucoseError::Io {
            path: fin.to_path_buf(),
            source,
        })?;
        let body = match content.split_once('\n') {
            Some((title, body)) => {
                debug!("skipping title line: {}", title.trim_end());
                body
            }
            None => return Err(GlucoseError::MissingHeader(fin.to_path_buf())),
        };
        let tg = TimeGlucose::from_reader(body.as_bytes(), columns)?;
        info!("read {} readings from {}", tg.len(), fin.display());
        trace!("{}", tg);
        Ok(tg)
    }

    /// Parses csv data whose first line is the header.
    pub fn from_reader<R: Read>(rdr: R, columns: &Columns) -> Result<TimeGlucose> {
        let mut reader = ReaderBuilder::new()
            .flexible(true)
            .trim(Trim::All)
            .from_reader(rdr);
        let headers = reader.headers()?.clone();
        let time_idx = column_index(&headers, &columns.time)?;
        let glucose_idx = column_index(&headers, &columns.glucose)?;
        let mut tg = TimeGlucose::new(10000);
        let mut bad_times = 0;
        for (i, record) in reader.records().enumerate() {
            match record {
                Ok(r) => {
                    let time = parse_day_first(r.get(time_idx).unwrap_or(""));
                    if time.is_none() {
                        bad_times += 1;
                    }
                    tg.push(time, parse_glucose(r.get(glucose_idx).unwrap_or("")));
                }
                Err(e) => {
                    warn!("could not read row {}, keeping it as missing: {}", i, e);
                    bad_times += 1;
                    tg.push(None, f64::NAN);
                }
            }
        }
        if bad_times > 0 {
            debug!("{} rows without a valid timestamp", bad_times);
        }
        Ok(tg)
    }

    /// Copies the rows in [start, end), clamped to the series length.
    /// An inverted or out-of-range window gives an empty series.
    pub fn slice(&self, start: usize, end: usize) -> TimeGlucose {
        let end = end.min(self.len());
        let start = start.min(end);
        TimeGlucose {
            time: self.time[start..end].to_vec(),
            glucose: self.glucose[start..end].to_vec(),
        }
    }

    /// Iterates over the timestamps that parsed.
    pub fn valid_times(&self) -> impl Iterator<Item = NaiveDateTime> + '_ {
        self.time.iter().flatten().copied()
    }

    pub fn time_range(&self) -> Option<(NaiveDateTime, NaiveDateTime)> {
        min_and_max(self.valid_times())
    }

    pub fn glucose_range(&self) -> Option<(f64, f64)> {
        min_and_max(self.glucose.iter().copied().filter(|g| g.is_finite()))
    }
}

impl std::fmt::Display for TimeGlucose {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "datetime, glucose [mmol/L]")?;
        for (t, g) in self.time.iter().zip(self.glucose.iter()) {
            match t {
                Some(t) => writeln!(f, "{},{}", t, g)?,
                None => writeln!(f, ",{}", g)?,
            }
        }
        Ok(())
    }
}

fn column_index(headers: &StringRecord, name: &str) -> Result<usize> {
    headers
        .iter()
        .position(|h| h == name)
        .ok_or_else(|| GlucoseError::MissingColumn(name.to_string()))
}

/// Parses a timestamp with the day-first convention,
/// returning None instead of failing.
pub fn parse_day_first(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    DT_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
                .map(|d| d.and_time(NaiveTime::MIN))
        })
}

/// Lenient numeric parse, NAN when the cell is not a number.
pub fn parse_glucose(s: &str) -> f64 {
    s.trim().parse().unwrap_or(f64::NAN)
}

pub fn min_and_max<T, I>(values: I) -> Option<(T, T)>
where
    T: std::cmp::PartialOrd + Copy,
    I: IntoIterator<Item = T>,
{
    let mut values_iter = values.into_iter();
    let first = values_iter.next()?;
    let (mut min, mut max) = (first, first);
    for v in values_iter {
        if v > max {
            max = v
        }
        if v < min {
            min = v
        }
    }
    Some((min, max))
}

#[cfg(test)]
mod test {
    use super::*;

    fn dt(y: i32, m: u32, d: u32, h: u32, min: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, min, 0)
            .unwrap()
    }

    #[test]
    fn test_parse_day_first() {
        assert_eq!(
            parse_day_first("31/12/2023 08:15"),
            Some(dt(2023, 12, 31, 8, 15))
        );
        assert_eq!(
            parse_day_first("01-02-2024 23:59"),
            Some(dt(2024, 2, 1, 23, 59))
        );
        assert_eq!(
            parse_day_first("2023-12-31 08:15:00"),
            Some(dt(2023, 12, 31, 8, 15))
        );
        assert_eq!(
            parse_day_first("05/03/2022 07:30 PM"),
            Some(dt(2022, 3, 5, 19, 30))
        );
        assert_eq!(parse_day_first("05/03/2022"), Some(dt(2022, 3, 5, 0, 0)));
    }

    #[test]
    fn test_parse_two_digit_year() {
        assert_eq!(
            parse_day_first("05/03/22 07:30"),
            Some(dt(2022, 3, 5, 7, 30))
        );
        assert_eq!(
            parse_day_first("31-12-23 23:45"),
            Some(dt(2023, 12, 31, 23, 45))
        );
        assert_eq!(parse_day_first("05/03/22"), Some(dt(2022, 3, 5, 0, 0)));
        // four-digit years are not cut short by the two-digit formats
        assert_eq!(
            parse_day_first("05/03/2022 07:30"),
            Some(dt(2022, 3, 5, 7, 30))
        );
        assert_eq!(parse_day_first("05/03/2022"), Some(dt(2022, 3, 5, 0, 0)));
    }

    #[test]
    fn test_parse_day_first_invalid() {
        assert_eq!(parse_day_first("not-a-date"), None);
        assert_eq!(parse_day_first(""), None);
        assert_eq!(parse_day_first("32/01/2023 08:00"), None);
    }

    #[test]
    fn test_parse_glucose() {
        assert_eq!(parse_glucose(" 5.6 "), 5.6);
        assert!(parse_glucose("").is_nan());
        assert!(parse_glucose("HI").is_nan());
    }

    #[test]
    fn test_from_reader_columns_and_missing() {
        let data = "Device,Serial Number,Device Timestamp,Record Type,Historic Glucose mmol/L\n\
                    FreeStyle,ABC,31-12-2023 08:15,0,6.1\n\
                    FreeStyle,ABC,bogus,0,6.3\n\
                    FreeStyle,ABC,31-12-2023 08:45,1,\n\
                    FreeStyle,ABC\n";
        let tg = TimeGlucose::from_reader(data.as_bytes(), &Columns::default()).unwrap();
        assert_eq!(tg.len(), 4);
        assert_eq!(tg.time[0], Some(dt(2023, 12, 31, 8, 15)));
        assert_eq!(tg.glucose[0], 6.1);
        assert_eq!(tg.time[1], None);
        assert_eq!(tg.glucose[1], 6.3);
        assert!(tg.glucose[2].is_nan());
        assert_eq!(tg.time[3], None);
        assert!(tg.glucose[3].is_nan());
    }

    #[test]
    fn test_from_reader_missing_column() {
        let data = "Device Timestamp,Scan Glucose mmol/L\n31-12-2023 08:15,6.1\n";
        let err = TimeGlucose::from_reader(data.as_bytes(), &Columns::default()).unwrap_err();
        match err {
            GlucoseError::MissingColumn(c) => assert_eq!(c, DEFAULT_GLUCOSE_COLUMN),
            e => panic!("unexpected error {}", e),
        }
    }

    #[test]
    fn test_slice_is_clamped() {
        let mut tg = TimeGlucose::new(5);
        for i in 0..5 {
            tg.push(Some(dt(2023, 1, 1, i, 0)), i as f64);
        }
        assert_eq!(tg.slice(1, 3).glucose, vec![1., 2.]);
        assert_eq!(tg.slice(3, 500).len(), 2);
        assert!(tg.slice(4, 2).is_empty());
        assert!(tg.slice(10, 20).is_empty());
    }

    #[test]
    fn test_ranges() {
        let mut tg = TimeGlucose::new(3);
        tg.push(Some(dt(2023, 1, 2, 0, 0)), f64::NAN);
        tg.push(None, 7.5);
        tg.push(Some(dt(2023, 1, 1, 6, 0)), 4.2);
        assert_eq!(
            tg.time_range(),
            Some((dt(2023, 1, 1, 6, 0), dt(2023, 1, 2, 0, 0)))
        );
        assert_eq!(tg.glucose_range(), Some((4.2, 7.5)));
        assert_eq!(TimeGlucose::default().time_range(), None);
    }

    #[test]
    fn test_display() {
        let mut tg = TimeGlucose::new(2);
        tg.push(Some(dt(2023, 1, 1, 8, 15)), 5.5);
        tg.push(None, f64::NAN);
        assert_eq!(
            tg.to_string(),
            "datetime, glucose [mmol/L]\n2023-01-01 08:15:00,5.5\n,NaN\n"
        );
    }

    #[test]
    fn test_min_and_max() {
        assert_eq!(min_and_max(vec![3, 1, 2]), Some((1, 3)));
        assert_eq!(min_and_max(Vec::<i32>::new()), None);
    }
}
