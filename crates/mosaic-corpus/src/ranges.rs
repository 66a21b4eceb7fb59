//! Per-dimension min/max range files
//!
//! One `<min> <max>` pair per line, in dimension order.

use crate::error::RangeError;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

/// Observed range of a single feature dimension.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Range {
    pub min: f32,
    pub max: f32,
}

impl Range {
    pub fn new(min: f32, max: f32) -> Self {
        Self { min, max }
    }

    /// Map `value` into unit space. A collapsed range (`max == min`) is a
    /// constant dimension and maps everything to `0.0`.
    pub fn normalize(&self, value: f32) -> f32 {
        let span = self.max - self.min;
        if span == 0.0 {
            0.0
        } else {
            (value - self.min) / span
        }
    }

    /// Inverse of [`Range::normalize`]. Unit values outside `[0, 1]`
    /// extrapolate; the endpoints map exactly onto `min` and `max`.
    pub fn denormalize(&self, unit: f32) -> f32 {
        self.min * (1.0 - unit) + self.max * unit
    }
}

/// Ranges for every dimension of a feature space.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MinMax {
    ranges: Vec<Range>,
}

impl MinMax {
    pub fn new(ranges: Vec<Range>) -> Self {
        Self { ranges }
    }

    /// Scan rows and record the per-dimension extremes. Dimensions start at
    /// `(+inf, -inf)` so the first row always replaces them.
    pub fn from_rows<'a, I>(num_coeffs: usize, rows: I) -> Self
    where
        I: IntoIterator<Item = &'a [f32]>,
    {
        let mut ranges = vec![Range::new(f32::INFINITY, f32::NEG_INFINITY); num_coeffs];
        for row in rows {
            for (range, &value) in ranges.iter_mut().zip(row) {
                range.min = range.min.min(value);
                range.max = range.max.max(value);
            }
        }
        Self { ranges }
    }

    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    pub fn ranges(&self) -> &[Range] {
        &self.ranges
    }

    /// Fail unless there is exactly one range per dimension.
    pub fn expect_len(&self, expected: usize) -> Result<(), RangeError> {
        if self.ranges.len() != expected {
            return Err(RangeError::LineCount {
                expected,
                found: self.ranges.len(),
            });
        }
        Ok(())
    }

    pub fn read(path: &Path) -> Result<Self, RangeError> {
        let file = File::open(path).map_err(|source| RangeError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        let ranges = Self::read_from(BufReader::new(file))?;
        log::debug!("Read {} ranges from {}", ranges.len(), path.display());
        Ok(ranges)
    }

    pub fn read_from<R: BufRead>(reader: R) -> Result<Self, RangeError> {
        let mut ranges = Vec::new();

        for (idx, line) in reader.lines().enumerate() {
            let line = line?;
            let line_no = idx + 1;
            let tokens: Vec<&str> = line.split_whitespace().collect();
            if tokens.is_empty() {
                continue;
            }
            if tokens.len() != 2 {
                return Err(RangeError::Malformed {
                    line: line_no,
                    found: tokens.len(),
                });
            }
            ranges.push(Range::new(
                parse_token(tokens[0], line_no)?,
                parse_token(tokens[1], line_no)?,
            ));
        }

        Ok(Self { ranges })
    }

    pub fn write(&self, path: &Path) -> Result<(), RangeError> {
        let file = File::create(path).map_err(|source| RangeError::Create {
            path: path.to_path_buf(),
            source,
        })?;
        let mut writer = BufWriter::new(file);
        self.write_to(&mut writer)?;
        writer.flush()?;
        Ok(())
    }

    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<(), RangeError> {
        for range in &self.ranges {
            writeln!(writer, "{} {}", range.min, range.max)?;
        }
        Ok(())
    }
}

fn parse_token(token: &str, line: usize) -> Result<f32, RangeError> {
    token.parse().map_err(|source| RangeError::Parse {
        line,
        token: token.to_string(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::io::Cursor;

    #[test]
    fn test_read_pairs_in_order() {
        let ranges = MinMax::read_from(Cursor::new("0 1\n\n-2.5 4\n")).unwrap();
        assert_eq!(
            ranges.ranges(),
            &[Range::new(0.0, 1.0), Range::new(-2.5, 4.0)]
        );
    }

    #[test]
    fn test_malformed_line_is_rejected() {
        let err = MinMax::read_from(Cursor::new("0 1\n0 1 2\n")).unwrap_err();
        assert!(matches!(err, RangeError::Malformed { line: 2, found: 3 }));

        let err = MinMax::read_from(Cursor::new("0 one\n")).unwrap_err();
        assert!(matches!(err, RangeError::Parse { line: 1, .. }));
    }

    #[test]
    fn test_expect_len() {
        let ranges = MinMax::new(vec![Range::new(0.0, 1.0); 3]);
        assert!(ranges.expect_len(3).is_ok());
        assert!(matches!(
            ranges.expect_len(2),
            Err(RangeError::LineCount {
                expected: 2,
                found: 3
            })
        ));
    }

    #[test]
    fn test_from_rows_tracks_extremes() {
        let rows: Vec<Vec<f32>> = vec![vec![1.0, -1.0], vec![3.0, -5.0], vec![2.0, 0.5]];
        let ranges = MinMax::from_rows(2, rows.iter().map(|r| r.as_slice()));
        assert_eq!(
            ranges.ranges(),
            &[Range::new(1.0, 3.0), Range::new(-5.0, 0.5)]
        );
    }

    #[test]
    fn test_normalize_and_denormalize_endpoints_are_exact() {
        let range = Range::new(0.1, 0.7);
        assert_eq!(range.normalize(0.1), 0.0);
        assert_eq!(range.normalize(0.7), 1.0);
        assert_eq!(range.denormalize(0.0), 0.1);
        assert_eq!(range.denormalize(1.0), 0.7);
        assert_relative_eq!(range.denormalize(range.normalize(0.4)), 0.4, epsilon = 1e-6);
    }

    #[test]
    fn test_collapsed_range_normalizes_to_zero() {
        let range = Range::new(2.0, 2.0);
        assert_eq!(range.normalize(2.0), 0.0);
        assert_eq!(range.normalize(100.0), 0.0);
    }

    #[test]
    fn test_write_then_read() {
        let ranges = MinMax::new(vec![Range::new(-1.5, 2.0), Range::new(0.0, 0.25)]);
        let mut out = Vec::new();
        ranges.write_to(&mut out).unwrap();
        assert_eq!(String::from_utf8(out.clone()).unwrap(), "-1.5 2\n0 0.25\n");
        assert_eq!(MinMax::read_from(Cursor::new(out)).unwrap(), ranges);
    }
}
