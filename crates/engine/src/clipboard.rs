//! Clipboard capability and tab-separated encoding.

use std::cell::RefCell;
use std::rc::Rc;

/// Host clipboard, injected by the caller.
pub trait Clipboard {
    fn read_text(&mut self) -> Result<String, String>;
    fn write_text(&mut self, text: &str) -> Result<(), String>;
}

/// In-process clipboard. Clones share the same contents.
#[derive(Debug, Clone, Default)]
pub struct MemoryClipboard {
    text: Rc<RefCell<String>>,
}

impl MemoryClipboard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_text(text: &str) -> Self {
        let clipboard = Self::default();
        *clipboard.text.borrow_mut() = text.to_string();
        clipboard
    }

    pub fn text(&self) -> String {
        self.text.borrow().clone()
    }
}

impl Clipboard for MemoryClipboard {
    fn read_text(&mut self) -> Result<String, String> {
        Ok(self.text())
    }

    fn write_text(&mut self, text: &str) -> Result<(), String> {
        *self.text.borrow_mut() = text.to_string();
        Ok(())
    }
}

/// Rows joined with `\n`, cells with `\t`.
pub fn encode_tsv<R, S>(rows: &[R]) -> String
where
    R: AsRef<[S]>,
    S: AsRef<str>,
{
    rows.iter()
        .map(|row| {
            row.as_ref()
                .iter()
                .map(|cell| cell.as_ref())
                .collect::<Vec<&str>>()
                .join("\t")
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Split clipboard text into a grid. CRLF and lone CR count as line breaks;
/// trailing line breaks are dropped.
pub fn parse_tsv(text: &str) -> Vec<Vec<String>> {
    let normalized = text.replace("\r\n", "\n").replace('\r', "\n");
    let body = normalized.trim_end_matches('\n');
    if body.is_empty() {
        return Vec::new();
    }
    body.split('\n')
        .map(|line| line.split('\t').map(str::to_string).collect())
        .collect()
}
