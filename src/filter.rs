//! Filter stage applied to each segment before plotting.
//! Filters only change the glucose values, never the timestamps.

use super::{GlucoseError, Result, TimeGlucose};
use log::{debug, warn};
use std::f64::consts::{PI, SQRT_2};

pub trait Filter {
    fn apply(&self, segment: &TimeGlucose) -> TimeGlucose;
    fn name(&self) -> &'static str;
}

/// Passes the segment through unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct Identity;

impl Filter for Identity {
    fn apply(&self, segment: &TimeGlucose) -> TimeGlucose {
        segment.clone()
    }

    fn name(&self) -> &'static str {
        "none"
    }
}

/// Triangular weighted moving average of 2 * side + 1 readings.
#[derive(Debug, Clone, Copy)]
pub struct MovingAverage {
    pub side: usize,
    pub max_missing_values: usize,
    pub max_missing_pct_weight: f64,
}

impl MovingAverage {
    pub fn new(side: usize) -> MovingAverage {
        MovingAverage {
            side,
            max_missing_values: side,
            max_missing_pct_weight: 50.,
        }
    }
}

impl Filter for MovingAverage {
    fn apply(&self, segment: &TimeGlucose) -> TimeGlucose {
        let width = self.side.checked_mul(2).and_then(|w| w.checked_add(1));
        match width {
            Some(w) if w < segment.len() => {}
            _ => {
                warn!(
                    "moving average window with side {} is not shorter than the {} readings, not filtering",
                    self.side,
                    segment.len()
                );
                return segment.clone();
            }
        }
        let window = make_window(self.side);
        TimeGlucose {
            time: segment.time.clone(),
            glucose: mavg(
                &segment.glucose,
                &window,
                self.max_missing_values,
                self.max_missing_pct_weight,
            ),
        }
    }

    fn name(&self) -> &'static str {
        "mavg"
    }
}

/// Second order low-pass Butterworth, run forward and backward for zero phase.
/// `cutoff` is in cycles per sample and must lie in (0, 0.5).
#[derive(Debug, Clone, Copy)]
pub struct Butterworth {
    b: [f64; 3],
    a: [f64; 2],
}

impl Butterworth {
    pub fn new(cutoff: f64) -> Result<Butterworth> {
        if !(cutoff > 0. && cutoff < 0.5) {
            return Err(GlucoseError::InvalidArgument(format!(
                "butterworth cutoff must be in (0, 0.5) cycles/sample, got {}",
                cutoff
            )));
        }
        // bilinear transform with prewarping
        let k = (PI * cutoff).tan();
        let k2 = k * k;
        let norm = 1. / (1. + SQRT_2 * k + k2);
        let b0 = k2 * norm;
        Ok(Butterworth {
            b: [b0, 2. * b0, b0],
            a: [2. * (k2 - 1.) * norm, (1. - SQRT_2 * k + k2) * norm],
        })
    }

    /// One causal pass, with the state at rest on the first value.
    fn pass(&self, x: &[f64]) -> Vec<f64> {
        let mut y = Vec::with_capacity(x.len());
        let x0 = match x.first() {
            Some(&v) => v,
            None => return y,
        };
        let (mut x1, mut x2, mut y1, mut y2) = (x0, x0, x0, x0);
        for &xn in x {
            let yn = self.b[0] * xn + self.b[1] * x1 + self.b[2] * x2
                - self.a[0] * y1
                - self.a[1] * y2;
            x2 = x1;
            x1 = xn;
            y2 = y1;
            y1 = yn;
            y.push(yn);
        }
        y
    }

    fn filtfilt(&self, x: &[f64]) -> Vec<f64> {
        let mut y = self.pass(x);
        y.reverse();
        let mut y = self.pass(&y);
        y.reverse();
        y
    }
}

impl Filter for Butterworth {
    /// Each run of finite values is filtered on its own,
    /// the missing values are left in place.
    fn apply(&self, segment: &TimeGlucose) -> TimeGlucose {
        let mut glucose = segment.glucose.clone();
        let mut runs = 0;
        let mut i = 0;
        while i < glucose.len() {
            if !glucose[i].is_finite() {
                i += 1;
                continue;
            }
            let start = i;
            while i < glucose.len() && glucose[i].is_finite() {
                i += 1;
            }
            let smooth = self.filtfilt(&glucose[start..i]);
            glucose[start..i].copy_from_slice(&smooth);
            runs += 1;
        }
        debug!("butterworth filtered {} runs of readings", runs);
        TimeGlucose {
            time: segment.time.clone(),
            glucose,
        }
    }

    fn name(&self) -> &'static str {
        "butterworth"
    }
}

/// Selects the filter from the command line.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FilterKind {
    None,
    MovingAverage { side: usize },
    Butterworth { cutoff: f64 },
}

impl Default for FilterKind {
    fn default() -> Self {
        FilterKind::None
    }
}

impl FilterKind {
    pub const NAMES: [&'static str; 3] = ["none", "mavg", "butterworth"];

    pub fn from_name(name: &str, side: usize, cutoff: f64) -> Result<FilterKind> {
        match name {
            "none" => Ok(FilterKind::None),
            "mavg" => Ok(FilterKind::MovingAverage { side }),
            "butterworth" => Ok(FilterKind::Butterworth { cutoff }),
            other => Err(GlucoseError::InvalidArgument(format!(
                "unknown filter {}",
                other
            ))),
        }
    }

    pub fn build(&self) -> Result<Box<dyn Filter>> {
        Ok(match *self {
            FilterKind::None => Box::new(Identity),
            FilterKind::MovingAverage { side } => Box::new(MovingAverage::new(side)),
            FilterKind::Butterworth { cutoff } => Box::new(Butterworth::new(cutoff)?),
        })
    }
}

/// Triangular window of 2 * side + 1 weights summing to 1.
pub fn make_window(side: usize) -> Vec<f64> {
    let up = (1..=side + 1).map(|v| v as f64);
    let down = (1..=side).rev().map(|v| v as f64);
    let window: Vec<f64> = up.chain(down).collect();
    let sum: f64 = window.iter().sum();
    window.into_iter().map(|w| w / sum).collect()
}

/// rolls the weighted moving window w over the data v
/// fills the NAN values with the weighted average when possible:
/// 1) sufficient number of data, i.e.,
///     number missing data under the window <= max_missing_v
/// 2) the window weight associated with the present data is sufficient, i.e.,
///     the percentage of missing weight is <= max_missing_wpct
pub fn mavg(v: &[f64], w: &[f64], max_missing_v: usize, max_missing_wpct: f64) -> Vec<f64> {
    let len_v = v.len() as i64;
    let side = (w.len() as i64 - 1) / 2;
    let sum_all_w: f64 = w.iter().sum();
    let max_missing_w = sum_all_w / 100. * max_missing_wpct;
    let mut vout: Vec<f64> = Vec::with_capacity(v.len());
    let mut set_nan = 0;
    for i in 0..len_v {
        let mut missing_v = 0;
        let mut missing_w = 0.;
        let mut sum_ve_we = 0.;
        let mut sum_we = 0.;
        for (j, we) in (i - side..i + side + 1).zip(w.iter()) {
            let ve = if j < 0 || j >= len_v {
                f64::NAN
            } else {
                v[j as usize]
            };
            if ve.is_finite() {
                sum_ve_we += ve * we;
                sum_we += we;
            } else {
                missing_v += 1;
                missing_w += we;
            }
            if missing_v > max_missing_v || missing_w > max_missing_w {
                sum_ve_we = f64::NAN;
                set_nan += 1;
                break;
            }
        }
        vout.push(sum_ve_we / sum_we);
    }
    if set_nan > 0 {
        debug!("moving average set {} values to NAN", set_nan);
    }
    vout
}

#[cfg(test)]
mod test {
    use super::*;
    use chrono::NaiveDate;

    fn segment(values: &[f64]) -> TimeGlucose {
        let start = NaiveDate::from_ymd_opt(2023, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let mut tg = TimeGlucose::new(values.len());
        for (i, &g) in values.iter().enumerate() {
            tg.push(Some(start + chrono::Duration::minutes(15 * i as i64)), g);
        }
        tg
    }

    #[test]
    fn test_identity_is_exact() {
        let mut s = segment(&[5.1, f64::NAN, 7.3]);
        s.time[1] = None;
        let out = Identity.apply(&s);
        assert_eq!(out.time, s.time);
        assert_eq!(out.glucose[0], 5.1);
        assert!(out.glucose[1].is_nan());
        assert_eq!(out.glucose[2], 7.3);
    }

    #[test]
    fn test_make_window() {
        let w = make_window(2);
        assert_eq!(w.len(), 5);
        assert!((w.iter().sum::<f64>() - 1.).abs() < 1e-12);
        assert!((w[2] - 3. / 9.).abs() < 1e-12);
        assert_eq!(w[0], w[4]);
    }

    #[test]
    fn test_mavg_fills_isolated_nan() {
        let v = [4., 4., 4., f64::NAN, 4., 4., 4.];
        let out = mavg(&v, &make_window(1), 1, 50.);
        assert_eq!(out.len(), v.len());
        assert!(out.iter().all(|x| (x - 4.).abs() < 1e-12));
    }

    #[test]
    fn test_mavg_too_many_missing() {
        let v = [4., f64::NAN, f64::NAN, f64::NAN, 4.];
        let out = mavg(&v, &make_window(1), 1, 50.);
        assert!(out[2].is_nan());
    }

    #[test]
    fn test_moving_average_short_segment_unchanged() {
        let s = segment(&[5., 6.]);
        assert_eq!(MovingAverage::new(4).apply(&s), s);
    }

    #[test]
    fn test_moving_average_huge_side_unchanged() {
        let s = segment(&[5., 6., 7.]);
        assert_eq!(MovingAverage::new(usize::MAX).apply(&s), s);
        assert_eq!(MovingAverage::new(usize::MAX / 2).apply(&s), s);
        assert_eq!(MovingAverage::new(1 << 40).apply(&s), s);
    }

    #[test]
    fn test_butterworth_constant_passes() {
        let s = segment(&[6.5; 40]);
        let out = Butterworth::new(0.1).unwrap().apply(&s);
        assert!(out.glucose.iter().all(|g| (g - 6.5).abs() < 1e-9));
        assert_eq!(out.time, s.time);
    }

    #[test]
    fn test_butterworth_keeps_gaps_and_smooths() {
        let mut values: Vec<f64> = (0..60)
            .map(|i| if i % 2 == 0 { 8. } else { 4. })
            .collect();
        values[30] = f64::NAN;
        let out = Butterworth::new(0.05).unwrap().apply(&segment(&values));
        assert!(out.glucose[30].is_nan());
        assert!(out.glucose.iter().filter(|g| g.is_nan()).count() == 1);
        // the alternating component sits at the Nyquist frequency
        for g in out.glucose[5..25].iter() {
            assert!((g - 6.).abs() < 0.5, "not smoothed: {}", g);
        }
    }

    #[test]
    fn test_butterworth_rejects_bad_cutoff() {
        assert!(Butterworth::new(0.).is_err());
        assert!(Butterworth::new(0.5).is_err());
        assert!(Butterworth::new(f64::NAN).is_err());
    }

    #[test]
    fn test_filter_kind() {
        assert_eq!(
            FilterKind::from_name("mavg", 3, 0.1).unwrap(),
            FilterKind::MovingAverage { side: 3 }
        );
        assert!(FilterKind::from_name("kalman", 3, 0.1).is_err());
        assert_eq!(FilterKind::default().build().unwrap().name(), "none");
        assert_eq!(
            FilterKind::Butterworth { cutoff: 0.2 }.build().unwrap().name(),
            "butterworth"
        );
    }
}
