//! Corpus model writer

use crate::error::CorpusError;
use crate::format::Corpus;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

pub struct CorpusWriter;

impl CorpusWriter {
    /// Write a corpus model file, one window per line.
    pub fn write(path: &Path, corpus: &Corpus) -> Result<(), CorpusError> {
        let file = File::create(path).map_err(|source| CorpusError::Create {
            path: path.to_path_buf(),
            source,
        })?;

        let mut writer = BufWriter::new(file);
        Self::write_to(&mut writer, corpus)?;
        writer.flush()?;

        log::debug!(
            "Wrote {} windows to {}",
            corpus.num_points(),
            path.display()
        );

        Ok(())
    }

    pub fn write_to<W: Write>(writer: &mut W, corpus: &Corpus) -> Result<(), CorpusError> {
        if let Some(bad) = corpus
            .files
            .iter()
            .find(|f| f.is_empty() || f.chars().any(char::is_whitespace))
        {
            return Err(CorpusError::InvalidPath(bad.clone()));
        }

        for (window, row) in corpus.windows.iter().zip(corpus.table.rows()) {
            write!(writer, "{} {}", corpus.source_path(window), window.start_time)?;
            for value in row {
                write!(writer, " {}", value)?;
            }
            writeln!(writer)?;
        }

        Ok(())
    }
}
