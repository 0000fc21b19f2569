//! Raw frame discovery and temperature/exposure classification.
//!
//! Raw frames follow a strict filename grammar:
//!
//! ```text
//! exp_<pattern>_<NNNN frame#>_<NN sec>sec_<±N>C.fit
//! ```
//!
//! Files matching `exp_<pattern>*.fit` that fail the full grammar are still
//! linked into the object directory but contribute nothing to statistics.
//!
//! Classification reproduces unit-width histogram binning exactly: bins span
//! `[min-0.5, max+1.5)`, one bin per integer value, the dominant bin is the
//! first maximum in edge order, and a series is considered uniform when the
//! dominant bin holds at least 99% of the samples. Non-uniform series report
//! every other populated bin as an outlier group.

use std::path::{Path, PathBuf};

use glob::Pattern;
use regex::Regex;
use thiserror::Error;
use tracing::{info, warn};

use crate::discovery::RAW_DIR;

/// A series is uniform when the dominant bin holds at least this fraction.
pub const UNIFORM_FRACTION: f64 = 0.99;

/// Errors locating or parsing raw frames.
#[derive(Error, Debug)]
pub enum ClassifyError {
    #[error("invalid frame filename pattern: {0}")]
    BadPattern(#[from] regex::Error),

    #[error("invalid raw file glob: {0}")]
    BadGlob(#[from] glob::PatternError),
}

/// All raw frames found for one pattern token.
#[derive(Debug, Clone, Default)]
pub struct FrameSet {
    /// Every `exp_<pattern>*.fit` file, sorted by name. Includes files that
    /// fail the strict grammar.
    pub files: Vec<PathBuf>,
    /// Frame numbers of grammar-conforming files.
    pub frame_numbers: Vec<u32>,
    /// Exposure times in whole seconds of grammar-conforming files.
    pub exposure_seconds: Vec<i32>,
    /// Sensor temperatures in Celsius of grammar-conforming files.
    pub temperatures_c: Vec<i32>,
}

/// One non-dominant populated histogram bin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutlierBin {
    /// Representative value of the bin (mean of its edges, rounded).
    pub value: i32,
    /// Number of samples in the bin.
    pub count: usize,
}

/// Result of mode-finding over one integer series.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeriesMode {
    /// Representative value of the dominant bin.
    pub value: i32,
    /// Sample count of the dominant bin.
    pub count: usize,
    /// Total number of samples.
    pub total: usize,
    /// Non-dominant populated bins, ascending by count then by bin edge.
    /// Empty when the series is uniform.
    pub outliers: Vec<OutlierBin>,
}

impl SeriesMode {
    /// Fraction of samples in the dominant bin.
    pub fn mean_fraction(&self) -> f64 {
        self.count as f64 / self.total as f64
    }

    /// Whether the dominant bin holds at least [`UNIFORM_FRACTION`].
    pub fn is_uniform(&self) -> bool {
        self.mean_fraction() >= UNIFORM_FRACTION
    }
}

/// Dominant temperature and exposure time for a stack's frames.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackClassification {
    pub temperature: SeriesMode,
    pub exposure: SeriesMode,
}

impl StackClassification {
    /// Dominant sensor temperature in Celsius.
    pub fn temperature_c(&self) -> i32 {
        self.temperature.value
    }

    /// Dominant exposure time in whole seconds.
    pub fn exposure_seconds(&self) -> i32 {
        self.exposure.value
    }
}

/// Locate all raw frames for `pattern` under `<root>/Raw/` and parse the
/// grammar-conforming ones into numeric series.
pub fn find_frames(root: &Path, pattern: &str) -> Result<FrameSet, ClassifyError> {
    let raw_glob = root
        .join(RAW_DIR)
        .join(format!("exp_{}*.fit", Pattern::escape(pattern)));
    let grammar = Regex::new(&format!(
        "^exp_{}_([0-9]{{4}})_([0-9]{{2}})sec_([-+]?[0-9]+)C\\.fit$",
        regex::escape(pattern)
    ))?;

    let mut frames = FrameSet::default();
    for path in glob::glob(&raw_glob.to_string_lossy())?.flatten() {
        frames.files.push(path);
    }
    frames.files.sort();

    for path in &frames.files {
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        // Captures are all-digit by construction; parse cannot fail except
        // on overflow, which the grammar's digit counts rule out.
        if let Some(caps) = grammar.captures(name) {
            let (Ok(frameno), Ok(exptime), Ok(temp)) = (
                caps[1].parse::<u32>(),
                caps[2].parse::<i32>(),
                caps[3].parse::<i32>(),
            ) else {
                continue;
            };
            frames.frame_numbers.push(frameno);
            frames.exposure_seconds.push(exptime);
            frames.temperatures_c.push(temp);
        }
    }

    Ok(frames)
}

/// Histogram mode-finding over an integer series.
///
/// Returns `None` for an empty series. Ties for the dominant bin resolve to
/// the lowest bin edge.
pub fn classify_series(values: &[i32]) -> Option<SeriesMode> {
    let min = *values.iter().min()?;
    let max = *values.iter().max()?;

    // Unit-width bins over [min-0.5, max+1.5): one bin per integer value,
    // indexed by offset from min.
    let mut counts = vec![0usize; (max - min) as usize + 1];
    for &v in values {
        counts[(v - min) as usize] += 1;
    }

    let mut peak = 0;
    for (i, &c) in counts.iter().enumerate() {
        if c > counts[peak] {
            peak = i;
        }
    }

    let mode = SeriesMode {
        value: min + peak as i32,
        count: counts[peak],
        total: values.len(),
        outliers: Vec::new(),
    };

    if mode.is_uniform() {
        return Some(mode);
    }

    let mut outliers: Vec<OutlierBin> = counts
        .iter()
        .enumerate()
        .filter(|&(i, &c)| i != peak && c > 0)
        .map(|(i, &c)| OutlierBin {
            value: min + i as i32,
            count: c,
        })
        .collect();
    outliers.sort_by(|a, b| a.count.cmp(&b.count).then(a.value.cmp(&b.value)));

    Some(SeriesMode { outliers, ..mode })
}

/// Classify a frame set's temperature and exposure series, logging the
/// dominant values and any outlier groups.
///
/// Returns `None` when no file matched the strict grammar.
pub fn classify_frames(frames: &FrameSet) -> Option<StackClassification> {
    let temperature = classify_series(&frames.temperatures_c)?;
    let exposure = classify_series(&frames.exposure_seconds)?;

    info!("  typical temperature = {} C", temperature.value);
    log_outliers(&temperature, "C");
    log_outliers(&exposure, "sec");

    Some(StackClassification {
        temperature,
        exposure,
    })
}

fn log_outliers(mode: &SeriesMode, unit: &str) {
    if mode.is_uniform() {
        return;
    }
    info!(
        "  fraction at dominant value: {:.0}%",
        mode.mean_fraction() * 100.0
    );
    for outlier in &mode.outliers {
        warn!(
            "--> {}/{} files at {} {unit}",
            outlier.count, mode.total, outlier.value
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn parses_grammar_conforming_frames() {
        let dir = TempDir::new().unwrap();
        let raw = dir.path().join(RAW_DIR);
        fs::create_dir_all(&raw).unwrap();
        fs::write(raw.join("exp_M31stack_0001_10sec_-5C.fit"), b"").unwrap();
        fs::write(raw.join("exp_M31stack_0002_10sec_-4C.fit"), b"").unwrap();
        fs::write(raw.join("exp_M31stack_0003_10sec_+5C.fit"), b"").unwrap();

        let frames = find_frames(dir.path(), "M31stack").unwrap();
        assert_eq!(frames.files.len(), 3);
        assert_eq!(frames.frame_numbers, [1, 2, 3]);
        assert_eq!(frames.exposure_seconds, [10, 10, 10]);
        assert_eq!(frames.temperatures_c, [-5, -4, 5]);
    }

    #[test]
    fn non_conforming_frames_are_listed_but_not_parsed() {
        let dir = TempDir::new().unwrap();
        let raw = dir.path().join(RAW_DIR);
        fs::create_dir_all(&raw).unwrap();
        fs::write(raw.join("exp_M31stack_0001_10sec_-5C.fit"), b"").unwrap();
        // Three-digit frame number fails the grammar.
        fs::write(raw.join("exp_M31stack_002_10sec_-5C.fit"), b"").unwrap();

        let frames = find_frames(dir.path(), "M31stack").unwrap();
        assert_eq!(frames.files.len(), 2);
        assert_eq!(frames.frame_numbers, [1]);
    }

    #[test]
    fn pattern_token_does_not_match_other_stacks() {
        let dir = TempDir::new().unwrap();
        let raw = dir.path().join(RAW_DIR);
        fs::create_dir_all(&raw).unwrap();
        fs::write(raw.join("exp_M31_0001_10sec_-5C.fit"), b"").unwrap();
        fs::write(raw.join("exp_M33_0001_10sec_-5C.fit"), b"").unwrap();

        let frames = find_frames(dir.path(), "M33").unwrap();
        assert_eq!(frames.files.len(), 1);
        assert_eq!(frames.temperatures_c, [-5]);
    }

    #[test]
    fn uniform_series_has_no_outliers() {
        let mode = classify_series(&[7; 200]).unwrap();
        assert_eq!(mode.value, 7);
        assert_eq!(mode.count, 200);
        assert!(mode.is_uniform());
        assert!(mode.outliers.is_empty());
    }

    #[test]
    fn dominant_value_with_one_outlier() {
        let mode = classify_series(&[-5, -5, -5, -5, -4]).unwrap();
        assert_eq!(mode.value, -5);
        assert_eq!(mode.count, 4);
        assert_eq!(mode.total, 5);
        assert_eq!(mode.mean_fraction(), 0.8);
        assert_eq!(mode.outliers, [OutlierBin { value: -4, count: 1 }]);
    }

    #[test]
    fn adjacent_bin_counts_sum_to_total() {
        let mut values = vec![-10; 90];
        values.extend([-9; 10]);
        let mode = classify_series(&values).unwrap();
        assert_eq!(mode.value, -10);
        assert!(!mode.is_uniform());
        let reported: usize = mode.count + mode.outliers.iter().map(|o| o.count).sum::<usize>();
        assert_eq!(reported, 100);
    }

    #[test]
    fn dominant_tie_resolves_to_lowest_bin_edge() {
        let mode = classify_series(&[3, 3, 5, 5]).unwrap();
        assert_eq!(mode.value, 3);
        assert_eq!(mode.outliers, [OutlierBin { value: 5, count: 2 }]);
    }

    #[test]
    fn outliers_sorted_by_count_then_edge() {
        // Dominant 0 (x5); outliers: 2 (x1), -3 (x2), 4 (x2).
        let values = [0, 0, 0, 0, 0, 2, -3, -3, 4, 4];
        let mode = classify_series(&values).unwrap();
        assert_eq!(mode.value, 0);
        assert_eq!(
            mode.outliers,
            [
                OutlierBin { value: 2, count: 1 },
                OutlierBin { value: -3, count: 2 },
                OutlierBin { value: 4, count: 2 },
            ]
        );
    }

    #[test]
    fn each_tied_outlier_bin_reported_once() {
        let values = [1, 1, 1, 2, 2, 3, 3];
        let mode = classify_series(&values).unwrap();
        assert_eq!(mode.value, 1);
        assert_eq!(
            mode.outliers,
            [
                OutlierBin { value: 2, count: 2 },
                OutlierBin { value: 3, count: 2 },
            ]
        );
    }

    #[test]
    fn uniformity_threshold_is_99_percent() {
        // 99 of 100 samples in the dominant bin: exactly 0.99, uniform.
        let mut values = vec![0; 99];
        values.push(1);
        let mode = classify_series(&values).unwrap();
        assert!(mode.is_uniform());
        assert!(mode.outliers.is_empty());

        // 98 of 99: below threshold.
        let mut values = vec![0; 98];
        values.push(1);
        let mode = classify_series(&values).unwrap();
        assert!(!mode.is_uniform());
        assert_eq!(mode.outliers.len(), 1);
    }

    #[test]
    fn empty_series_yields_none() {
        assert!(classify_series(&[]).is_none());
    }
}
