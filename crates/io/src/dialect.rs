//! Delimiter parsing, sniffing and field decoding.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use longtable_engine::Dialect;

use crate::error::{IoError, Result};

/// Bytes read from the top of a file when sniffing.
pub const SNIFF_SAMPLE_BYTES: u64 = 64 * 1024;

const UTF8_BOM: &str = "\u{feff}";

/// `"\t"` (escaped) and a literal tab both mean tab; otherwise the first
/// byte wins, and an empty string means comma.
pub fn parse_delimiter(text: &str) -> u8 {
    match text {
        "" => b',',
        "\\t" | "\t" | "tab" => b'\t',
        other => other.bytes().next().unwrap_or(b','),
    }
}

const DELIMITERS: [u8; 4] = [b'\t', b';', b',', b'|'];
const QUOTES: [u8; 2] = [b'"', b'\''];

/// Records looked at per candidate dialect.
const SNIFF_RECORDS: usize = 10;

/// Field counts of the leading records of `sample` read as `dialect`.
/// Quoted fields may span lines, so this walks records, not lines.
fn field_counts(sample: &str, dialect: &Dialect) -> Vec<usize> {
    csv::ReaderBuilder::new()
        .delimiter(dialect.delimiter)
        .quote(dialect.quote)
        .has_headers(false)
        .flexible(true)
        .from_reader(sample.as_bytes())
        .records()
        .take(SNIFF_RECORDS)
        .map_while(|record| record.ok())
        .map(|record| record.len())
        .collect()
}

/// Records as wide as the header row, times that width. A one-field
/// header scores zero.
fn consistency(counts: &[usize]) -> usize {
    match counts.first() {
        Some(&width) if width > 1 => counts.iter().filter(|&&c| c == width).count() * width,
        _ => 0,
    }
}

/// Pick the delimiter and quote that split `sample` into the most
/// consistent rows. Ties go to the earlier candidate; nothing viable means
/// the default dialect.
pub fn sniff_dialect(sample: &str) -> Dialect {
    let mut best = Dialect::default();
    let mut best_score = 0;
    for quote in QUOTES {
        for delimiter in DELIMITERS {
            let dialect = Dialect { delimiter, quote };
            let score = consistency(&field_counts(sample, &dialect));
            if score > best_score {
                best = dialect;
                best_score = score;
            }
        }
    }
    best
}

pub fn sniff_delimiter(sample: &str) -> u8 {
    sniff_dialect(sample).delimiter
}

/// Sniff the dialect of the file at `path` from its first 64 KiB.
pub fn sniff_file(path: &Path) -> Result<Dialect> {
    let file = File::open(path).map_err(|source| IoError::Open {
        path: path.display().to_string(),
        source,
    })?;
    let mut sample = Vec::new();
    file.take(SNIFF_SAMPLE_BYTES).read_to_end(&mut sample)?;

    let text = decode_field(&sample);
    let dialect = sniff_dialect(strip_bom(&text));
    log::debug!(
        "sniffed delimiter {:?} quote {:?} for {}",
        dialect.delimiter as char,
        dialect.quote as char,
        path.display()
    );
    Ok(dialect)
}

/// UTF-8 when valid, otherwise Windows-1252 (common for Excel-exported CSVs).
pub fn decode_field(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(s) => s.to_string(),
        Err(_) => {
            let (decoded, _, _) = encoding_rs::WINDOWS_1252.decode(bytes);
            decoded.into_owned()
        }
    }
}

pub fn strip_bom(text: &str) -> &str {
    text.strip_prefix(UTF8_BOM).unwrap_or(text)
}
