//! Two-pass corpus model reader

use crate::error::CorpusError;
use crate::format::{Corpus, META_COLUMNS};
use std::fs::File;
use std::io::{BufRead, BufReader, Seek, SeekFrom};
use std::path::Path;

pub struct CorpusReader;

impl CorpusReader {
    /// Read a corpus model file.
    pub fn read(path: &Path) -> Result<Corpus, CorpusError> {
        let file = File::open(path).map_err(|source| CorpusError::Open {
            path: path.to_path_buf(),
            source,
        })?;

        let corpus = Self::read_from(BufReader::new(file))?;

        log::info!(
            "Loaded corpus {}: {} windows x {} coefficients from {} source files",
            path.display(),
            corpus.num_points(),
            corpus.num_coeffs(),
            corpus.files.len()
        );

        Ok(corpus)
    }

    /// Read a corpus from any seekable line source.
    ///
    /// The first pass counts windows and takes the coefficient count from
    /// the last non-empty line; the second pass rewinds and parses every
    /// line against that width.
    pub fn read_from<R: BufRead + Seek>(mut reader: R) -> Result<Corpus, CorpusError> {
        let (num_points, num_coeffs) = Self::scan_dimensions(&mut reader)?;

        reader.seek(SeekFrom::Start(0))?;

        let mut corpus = Corpus::with_capacity(num_coeffs, num_points);
        let mut row = Vec::with_capacity(num_coeffs);
        let mut line = String::new();
        let mut line_no = 0;

        loop {
            line.clear();
            if reader.read_line(&mut line)? == 0 {
                break;
            }
            line_no += 1;

            let tokens: Vec<&str> = line.split_whitespace().collect();
            if tokens.is_empty() {
                continue;
            }
            if tokens.len() != num_coeffs + META_COLUMNS {
                return Err(CorpusError::ColumnCount {
                    line: line_no,
                    expected: num_coeffs + META_COLUMNS,
                    found: tokens.len(),
                });
            }

            let start_time: f64 = parse_token(tokens[1], line_no)?;

            row.clear();
            for token in &tokens[META_COLUMNS..] {
                row.push(parse_token::<f32>(token, line_no)?);
            }

            corpus.push(tokens[0], start_time, &row);
        }

        Ok(corpus)
    }

    /// First pass: `(num_points, num_coeffs)`.
    fn scan_dimensions<R: BufRead>(reader: &mut R) -> Result<(usize, usize), CorpusError> {
        let mut num_points = 0;
        let mut last_width = None;
        let mut line = String::new();
        let mut line_no = 0;

        loop {
            line.clear();
            if reader.read_line(&mut line)? == 0 {
                break;
            }
            line_no += 1;

            let width = line.split_whitespace().count();
            if width > 0 {
                num_points += 1;
                last_width = Some((line_no, width));
            }
        }

        let (line, width) = last_width.ok_or(CorpusError::Empty)?;
        if width <= META_COLUMNS {
            return Err(CorpusError::NoCoefficients { line });
        }

        Ok((num_points, width - META_COLUMNS))
    }
}

fn parse_token<T>(token: &str, line: usize) -> Result<T, CorpusError>
where
    T: std::str::FromStr<Err = std::num::ParseFloatError>,
{
    token.parse().map_err(|source| CorpusError::Parse {
        line,
        token: token.to_string(),
        source,
    })
}
