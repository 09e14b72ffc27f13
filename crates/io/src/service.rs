//! Whole-file replay for CSV: save, macros, find/replace and column stats.
//!
//! The source is streamed once from top to bottom through
//! [`EditScript::replay`] into a temporary file beside the target, which then
//! replaces the target. Saving over the source file itself is fine.

use std::path::Path;

use longtable_engine::stats::StatsAccumulator;
use longtable_engine::{
    ColumnStat, Dialect, EditScript, ExportOptions, FileService, FindReplaceSpec, FindReplacer,
    MacroSpec, TransformResult,
};

use crate::error::{IoError, Result};
use crate::stream::{decode_record, open_reader, read_headers};
use crate::writer::{write_atomic, RecordWriter};

#[derive(Debug, Default, Clone, Copy)]
pub struct CsvFileService;

impl CsvFileService {
    pub fn new() -> Self {
        Self
    }

    /// Replay `script` over `path` into `target`, handing every output row
    /// to `each` before it is written. Returns the data rows written.
    fn replay_file<F>(
        &self,
        path: &Path,
        target: &Path,
        dialect: &Dialect,
        script: &EditScript,
        options: &ExportOptions,
        mut each: F,
    ) -> Result<usize>
    where
        F: FnMut(&mut Vec<String>),
    {
        let mut reader = open_reader(path, dialect)?;
        let headers = read_headers(&mut reader)?
            .ok_or_else(|| IoError::Empty(path.display().to_string()))?;
        let headers = script.reshape_headers(&headers);

        write_atomic(target, move |file| {
            let mut out = RecordWriter::new(file, dialect.delimiter, options)?;
            out.write_row(headers.as_slice())?;
            let source = reader
                .into_byte_records()
                .map(|record| record.map(|r| decode_record(&r)).map_err(IoError::from));
            let written = script.replay(source, |mut row| {
                each(&mut row);
                out.write_row(row.as_slice())
            })?;
            out.finish()?;
            Ok(written)
        })
    }
}

impl FileService for CsvFileService {
    type Error = IoError;

    fn save_with_patches(
        &mut self,
        path: &Path,
        target: &Path,
        dialect: &Dialect,
        script: &EditScript,
        options: &ExportOptions,
    ) -> Result<()> {
        let written = self.replay_file(path, target, dialect, script, options, |_| {})?;
        log::info!("wrote {} rows to {}", written, target.display());
        Ok(())
    }

    fn apply_macro_to_file(
        &mut self,
        path: &Path,
        target: &Path,
        dialect: &Dialect,
        script: &EditScript,
        spec: &MacroSpec,
        options: &ExportOptions,
    ) -> Result<TransformResult> {
        let mut applied = 0;
        self.replay_file(path, target, dialect, script, options, |row| {
            if spec.apply_to_row(row) {
                applied += 1;
            }
        })?;
        Ok(TransformResult { output_path: target.to_path_buf(), applied })
    }

    fn apply_find_replace_to_file(
        &mut self,
        path: &Path,
        target: &Path,
        dialect: &Dialect,
        script: &EditScript,
        spec: &FindReplaceSpec,
        options: &ExportOptions,
    ) -> Result<TransformResult> {
        let replacer = FindReplacer::new(spec)?;
        let mut applied = 0;
        self.replay_file(path, target, dialect, script, options, |row| {
            applied += replacer.apply_to_row(row);
        })?;
        Ok(TransformResult { output_path: target.to_path_buf(), applied })
    }

    fn compute_column_stats(
        &mut self,
        path: &Path,
        dialect: &Dialect,
        max_distinct: usize,
    ) -> Result<Vec<ColumnStat>> {
        let mut reader = open_reader(path, dialect)?;
        let headers = read_headers(&mut reader)?
            .ok_or_else(|| IoError::Empty(path.display().to_string()))?;

        let mut acc = StatsAccumulator::new(headers, max_distinct);
        let mut record = csv::ByteRecord::new();
        while reader.read_byte_record(&mut record)? {
            acc.push_row(decode_record(&record).as_slice());
        }
        Ok(acc.finish())
    }
}
