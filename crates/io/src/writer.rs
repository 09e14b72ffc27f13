//! Record output in the configured export dialect, and atomic file replace.

use std::fs::File;
use std::io::{self, Write};
use std::path::Path;

use longtable_engine::{ExportOptions, LineEnding, TextEncoding};
use tempfile::NamedTempFile;

use crate::error::{IoError, Result};

const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];
const UTF16LE_BOM: &[u8] = &[0xFF, 0xFE];

/// Transcodes a UTF-8 byte stream to UTF-16LE. Writes may split a code
/// point; the tail is held until the rest arrives.
pub struct Utf16LeWriter<W: Write> {
    inner: W,
    pending: Vec<u8>,
}

impl<W: Write> Utf16LeWriter<W> {
    pub fn new(inner: W) -> Self {
        Self { inner, pending: Vec::new() }
    }

    fn emit(&mut self, text: &str) -> io::Result<()> {
        let mut out = Vec::with_capacity(text.len() * 2);
        for unit in text.encode_utf16() {
            out.extend_from_slice(&unit.to_le_bytes());
        }
        self.inner.write_all(&out)
    }

    pub fn finish(mut self) -> io::Result<W> {
        if !self.pending.is_empty() {
            return Err(io::Error::new(io::ErrorKind::InvalidData, "truncated UTF-8 sequence"));
        }
        self.inner.flush()?;
        Ok(self.inner)
    }
}

impl<W: Write> Write for Utf16LeWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.pending.extend_from_slice(buf);
        let pending = std::mem::take(&mut self.pending);
        let valid = match std::str::from_utf8(&pending) {
            Ok(text) => {
                self.emit(text)?;
                pending.len()
            }
            Err(e) if e.error_len().is_none() => {
                let valid = e.valid_up_to();
                let text = std::str::from_utf8(&pending[..valid])
                    .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
                self.emit(text)?;
                valid
            }
            Err(e) => return Err(io::Error::new(io::ErrorKind::InvalidData, e)),
        };
        self.pending = pending[valid..].to_vec();
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

enum Sink<W: Write> {
    Utf8(W),
    Utf16Le(Utf16LeWriter<W>),
}

impl<W: Write> Sink<W> {
    fn finish(self) -> io::Result<W> {
        match self {
            Sink::Utf8(mut w) => {
                w.flush()?;
                Ok(w)
            }
            Sink::Utf16Le(w) => w.finish(),
        }
    }
}

impl<W: Write> Write for Sink<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Sink::Utf8(w) => w.write(buf),
            Sink::Utf16Le(w) => w.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Sink::Utf8(w) => w.flush(),
            Sink::Utf16Le(w) => w.flush(),
        }
    }
}

/// CSV writer honoring [`ExportOptions`].
pub struct RecordWriter<W: Write> {
    inner: csv::Writer<Sink<W>>,
}

impl<W: Write> RecordWriter<W> {
    pub fn new(mut out: W, delimiter: u8, options: &ExportOptions) -> Result<Self> {
        if options.bom {
            out.write_all(match options.encoding {
                TextEncoding::Utf8 => UTF8_BOM,
                TextEncoding::Utf16Le => UTF16LE_BOM,
            })?;
        }
        let sink = match options.encoding {
            TextEncoding::Utf8 => Sink::Utf8(out),
            TextEncoding::Utf16Le => Sink::Utf16Le(Utf16LeWriter::new(out)),
        };
        let terminator = match options.eol {
            LineEnding::Crlf => csv::Terminator::CRLF,
            LineEnding::Lf => csv::Terminator::Any(b'\n'),
        };
        // Rows may be ragged; column ops only touch cells that exist.
        let inner = csv::WriterBuilder::new()
            .delimiter(delimiter)
            .quote(options.quote)
            .escape(options.escape)
            .double_quote(options.escape == options.quote)
            .terminator(terminator)
            .flexible(true)
            .from_writer(sink);
        Ok(Self { inner })
    }

    pub fn write_row<S: AsRef<[u8]>>(&mut self, row: &[S]) -> Result<()> {
        self.inner.write_record(row)?;
        Ok(())
    }

    pub fn finish(self) -> Result<W> {
        let sink = self.inner.into_inner().map_err(|e| IoError::Io(e.into_error()))?;
        Ok(sink.finish()?)
    }
}

/// Write through a temporary file in the target's directory, then rename it
/// over `target`. On any error the target is left as it was. An existing
/// target keeps its permissions.
pub fn write_atomic<T, F>(target: &Path, write: F) -> Result<T>
where
    F: FnOnce(&mut File) -> Result<T>,
{
    let dir = match target.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut tmp = NamedTempFile::new_in(dir)?;
    if let Ok(meta) = std::fs::metadata(target) {
        tmp.as_file().set_permissions(meta.permissions())?;
    }
    let out = write(tmp.as_file_mut())?;

    tmp.as_file_mut().flush()?;
    tmp.as_file().sync_all()?;
    tmp.persist(target).map_err(|e| IoError::Persist {
        path: target.display().to_string(),
        source: e.error,
    })?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn render(options: &ExportOptions, rows: &[&[&str]]) -> Vec<u8> {
        let mut out = RecordWriter::new(Vec::new(), b',', options).unwrap();
        for row in rows {
            out.write_row(*row).unwrap();
        }
        out.finish().unwrap()
    }

    #[test]
    fn test_default_is_crlf_without_bom() {
        let bytes = render(&ExportOptions::default(), &[&["a", "b"], &["1", "x,y"]]);
        assert_eq!(bytes, b"a,b\r\n1,\"x,y\"\r\n");
    }

    #[test]
    fn test_lf_and_utf8_bom() {
        let options = ExportOptions { eol: LineEnding::Lf, bom: true, ..Default::default() };
        let bytes = render(&options, &[&["a"]]);
        assert_eq!(bytes, b"\xEF\xBB\xBFa\n");
    }

    #[test]
    fn test_utf16le_with_bom() {
        let options = ExportOptions {
            eol: LineEnding::Lf,
            bom: true,
            encoding: TextEncoding::Utf16Le,
            ..Default::default()
        };
        let bytes = render(&options, &[&["é"]]);
        assert_eq!(bytes, vec![0xFF, 0xFE, 0xE9, 0x00, b'\n', 0x00]);
    }

    #[test]
    fn test_utf16_split_code_point() {
        let mut w = Utf16LeWriter::new(Vec::new());
        let bytes = "ü".as_bytes();
        w.write_all(&bytes[..1]).unwrap();
        w.write_all(&bytes[1..]).unwrap();
        assert_eq!(w.finish().unwrap(), vec![0xFC, 0x00]);

        let mut w = Utf16LeWriter::new(Vec::new());
        w.write_all(&bytes[..1]).unwrap();
        assert!(w.finish().is_err());
    }

    #[test]
    fn test_backslash_escape() {
        let options = ExportOptions { eol: LineEnding::Lf, escape: b'\\', ..Default::default() };
        let bytes = render(&options, &[&["say \"hi\""]]);
        assert_eq!(bytes, b"\"say \\\"hi\\\"\"\n");
    }

    #[test]
    fn test_write_atomic_replaces_target() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("out.csv");
        fs::write(&target, "old").unwrap();

        write_atomic(&target, |file| Ok(file.write_all(b"new")?)).unwrap();
        assert_eq!(fs::read_to_string(&target).unwrap(), "new");
    }

    #[cfg(unix)]
    #[test]
    fn test_write_atomic_keeps_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempdir().unwrap();
        let target = dir.path().join("out.csv");
        fs::write(&target, "old").unwrap();
        fs::set_permissions(&target, fs::Permissions::from_mode(0o644)).unwrap();

        write_atomic(&target, |file| Ok(file.write_all(b"new")?)).unwrap();
        assert_eq!(fs::read_to_string(&target).unwrap(), "new");
        let mode = fs::metadata(&target).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o644);
    }

    #[test]
    fn test_write_atomic_failure_leaves_target() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("out.csv");
        fs::write(&target, "old").unwrap();

        let result: Result<()> = write_atomic(&target, |file| {
            file.write_all(b"partial")?;
            Err(IoError::Empty("boom".into()))
        });
        assert!(result.is_err());
        assert_eq!(fs::read_to_string(&target).unwrap(), "old");
        // Only the target remains; the temp file was cleaned up.
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }
}
