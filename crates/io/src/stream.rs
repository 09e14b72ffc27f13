//! Bounded window reads over a delimited file on disk.
//!
//! Each (path, dialect) pair gets a sparse checkpoint index: the reader
//! position of every 4096th data row. A window read seeks to the nearest
//! checkpoint at or before `start` and scans forward from there, recording
//! any new checkpoints it passes. The index is dropped when the file's
//! length or modification time changes.

use std::collections::HashMap;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use longtable_engine::{Dialect, SessionInfo, StreamProvider, WindowSlice};

use crate::dialect::{decode_field, strip_bom};
use crate::error::{IoError, Result};

/// Data rows between checkpoints.
pub const CHECKPOINT_EVERY: usize = 4096;

pub(crate) fn open_reader(path: &Path, dialect: &Dialect) -> Result<csv::Reader<File>> {
    let file = File::open(path).map_err(|source| IoError::Open {
        path: path.display().to_string(),
        source,
    })?;
    Ok(csv::ReaderBuilder::new()
        .delimiter(dialect.delimiter)
        .quote(dialect.quote)
        .has_headers(false)
        .flexible(true)
        .from_reader(file))
}

pub(crate) fn decode_record(record: &csv::ByteRecord) -> Vec<String> {
    record.iter().map(decode_field).collect()
}

/// First record of the file, BOM stripped. `None` for an empty file.
pub(crate) fn read_headers(reader: &mut csv::Reader<File>) -> Result<Option<Vec<String>>> {
    let mut record = csv::ByteRecord::new();
    if !reader.read_byte_record(&mut record)? {
        return Ok(None);
    }
    let mut headers = decode_record(&record);
    if let Some(first) = headers.first_mut() {
        *first = strip_bom(first).to_string();
    }
    Ok(Some(headers))
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct IndexKey {
    path: PathBuf,
    delimiter: u8,
    quote: u8,
}

impl IndexKey {
    fn new(path: &Path, dialect: &Dialect) -> Self {
        Self {
            path: path.to_path_buf(),
            delimiter: dialect.delimiter,
            quote: dialect.quote,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FileStamp {
    len: u64,
    modified: Option<SystemTime>,
}

impl FileStamp {
    fn of(path: &Path) -> Result<Self> {
        let meta = std::fs::metadata(path).map_err(|source| IoError::Open {
            path: path.display().to_string(),
            source,
        })?;
        Ok(Self { len: meta.len(), modified: meta.modified().ok() })
    }
}

#[derive(Debug)]
struct RowIndex {
    stamp: FileStamp,
    /// `checkpoints[i]` is the position of data row `i * CHECKPOINT_EVERY`.
    checkpoints: Vec<csv::Position>,
    /// Set once a scan has reached the end of the file.
    total_rows: Option<usize>,
}

impl RowIndex {
    fn new(stamp: FileStamp) -> Self {
        Self { stamp, checkpoints: Vec::new(), total_rows: None }
    }
}

/// Reader positioned at data row `row`, scanning forward and extending the
/// index as it goes.
struct Cursor<'a> {
    reader: csv::Reader<File>,
    index: &'a mut RowIndex,
    record: csv::ByteRecord,
    row: usize,
}

impl<'a> Cursor<'a> {
    /// Open `path` at the closest checkpoint at or before `target`.
    fn open(path: &Path, dialect: &Dialect, index: &'a mut RowIndex, target: usize) -> Result<Self> {
        let mut reader = open_reader(path, dialect)?;
        let row = if index.checkpoints.is_empty() {
            let mut header = csv::ByteRecord::new();
            if reader.read_byte_record(&mut header)? {
                index.checkpoints.push(reader.position().clone());
            } else {
                index.total_rows = Some(0);
            }
            0
        } else {
            let slot = (target / CHECKPOINT_EVERY).min(index.checkpoints.len() - 1);
            reader.seek(index.checkpoints[slot].clone())?;
            slot * CHECKPOINT_EVERY
        };
        Ok(Self { reader, index, record: csv::ByteRecord::new(), row })
    }

    /// Read the next data row into `self.record`. False at end of file.
    fn advance(&mut self) -> Result<bool> {
        if self.index.total_rows.is_some_and(|total| self.row >= total) {
            return Ok(false);
        }
        if !self.reader.read_byte_record(&mut self.record)? {
            self.index.total_rows = Some(self.row);
            return Ok(false);
        }
        self.row += 1;
        if self.row % CHECKPOINT_EVERY == 0 && self.index.checkpoints.len() == self.row / CHECKPOINT_EVERY {
            self.index.checkpoints.push(self.reader.position().clone());
        }
        Ok(true)
    }

    fn skip_to(&mut self, target: usize) -> Result<bool> {
        while self.row < target {
            if !self.advance()? {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

/// [`StreamProvider`] over CSV/TSV files.
#[derive(Debug, Default)]
pub struct CsvStreamProvider {
    next_session: u64,
    sessions: HashMap<u64, IndexKey>,
    indexes: HashMap<IndexKey, RowIndex>,
}

impl CsvStreamProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn open_sessions(&self) -> usize {
        self.sessions.len()
    }

    /// Checkpoints recorded so far for `path` under `dialect`.
    pub fn checkpoint_count(&self, path: &Path, dialect: &Dialect) -> usize {
        self.indexes
            .get(&IndexKey::new(path, dialect))
            .map_or(0, |index| index.checkpoints.len())
    }

    fn index_for(&mut self, path: &Path, dialect: &Dialect) -> Result<&mut RowIndex> {
        let stamp = FileStamp::of(path)?;
        let index = self
            .indexes
            .entry(IndexKey::new(path, dialect))
            .or_insert_with(|| RowIndex::new(stamp));
        if index.stamp != stamp {
            log::debug!("{} changed on disk, dropping row index", path.display());
            *index = RowIndex::new(stamp);
        }
        Ok(index)
    }
}

impl StreamProvider for CsvStreamProvider {
    type Error = IoError;

    fn open_session(&mut self, path: &Path, dialect: &Dialect) -> Result<SessionInfo> {
        let mut reader = open_reader(path, dialect)?;
        let headers = read_headers(&mut reader)?
            .ok_or_else(|| IoError::Empty(path.display().to_string()))?;

        self.next_session += 1;
        let session_id = self.next_session;
        self.sessions.insert(session_id, IndexKey::new(path, dialect));
        log::debug!("session {} on {} ({} columns)", session_id, path.display(), headers.len());

        Ok(SessionInfo {
            session_id,
            headers,
            delimiter: dialect.delimiter_display(),
        })
    }

    fn read_window(
        &mut self,
        path: &Path,
        dialect: &Dialect,
        start: usize,
        limit: usize,
    ) -> Result<WindowSlice> {
        let index = self.index_for(path, dialect)?;
        let mut cursor = Cursor::open(path, dialect, index, start)?;

        let mut rows = Vec::with_capacity(limit.min(CHECKPOINT_EVERY));
        if cursor.skip_to(start)? {
            while rows.len() < limit && cursor.advance()? {
                rows.push(decode_record(&cursor.record));
            }
        }
        // Peek one row past the window to settle eof.
        let eof = rows.len() < limit || !cursor.advance()?;

        Ok(WindowSlice { rows, start, eof })
    }

    fn count_rows(&mut self, path: &Path, dialect: &Dialect) -> Result<usize> {
        let index = self.index_for(path, dialect)?;
        if let Some(total) = index.total_rows {
            return Ok(total);
        }
        let mut cursor = Cursor::open(path, dialect, index, usize::MAX)?;
        while cursor.advance()? {}
        Ok(cursor.row)
    }

    fn close_session(&mut self, session_id: u64) {
        let Some(key) = self.sessions.remove(&session_id) else {
            return;
        };
        if !self.sessions.values().any(|other| *other == key) {
            self.indexes.remove(&key);
        }
    }
}
