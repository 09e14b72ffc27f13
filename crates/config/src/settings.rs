// User settings
// Loaded from ~/.config/longtable/settings.json

use std::fs;
use std::path::{Path, PathBuf};

use longtable_engine::history::HistoryConfig;
use longtable_engine::stats::DEFAULT_MAX_DISTINCT;
use longtable_engine::{ExportOptions, LineEnding, SessionConfig, TextEncoding, WindowConfig};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot write {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid settings in {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error(transparent)]
    Encode(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    // Window
    #[serde(rename = "window.memoryBudget")]
    pub memory_budget: usize,

    #[serde(rename = "window.initialRows")]
    pub initial_rows: usize,

    #[serde(rename = "window.minRows")]
    pub min_rows: usize,

    #[serde(rename = "window.maxRows")]
    pub max_rows: usize,

    #[serde(rename = "window.edgeMargin")]
    pub edge_margin: usize,

    #[serde(rename = "window.forwardLead")]
    pub forward_lead: f64,

    #[serde(rename = "window.backwardLead")]
    pub backward_lead: f64,

    #[serde(rename = "window.budgetShare")]
    pub budget_share: f64,

    #[serde(rename = "window.minRowBytes")]
    pub min_row_bytes: usize,

    // History
    #[serde(rename = "history.maxEntries")]
    pub history_max_entries: usize,

    // Stats
    #[serde(rename = "stats.maxDistinct")]
    pub stats_max_distinct: usize,

    // Export
    #[serde(rename = "export.eol")]
    pub export_eol: LineEnding,

    #[serde(rename = "export.bom")]
    pub export_bom: bool,

    #[serde(rename = "export.encoding")]
    pub export_encoding: TextEncoding,

    /// Single character.
    #[serde(rename = "export.quote")]
    pub export_quote: String,

    /// Single character. Equal to the quote means quotes are doubled.
    #[serde(rename = "export.escape")]
    pub export_escape: String,
}

impl Default for Settings {
    fn default() -> Self {
        let window = WindowConfig::default();
        let export = ExportOptions::default();
        Self {
            memory_budget: window.memory_budget,
            initial_rows: window.initial_rows,
            min_rows: window.min_rows,
            max_rows: window.max_rows,
            edge_margin: window.edge_margin,
            forward_lead: window.forward_lead,
            backward_lead: window.backward_lead,
            budget_share: window.budget_share,
            min_row_bytes: window.min_row_bytes,
            history_max_entries: HistoryConfig::default().max_entries,
            stats_max_distinct: DEFAULT_MAX_DISTINCT,
            export_eol: export.eol,
            export_bom: export.bom,
            export_encoding: export.encoding,
            export_quote: (export.quote as char).to_string(),
            export_escape: (export.escape as char).to_string(),
        }
    }
}

/// Drop lines starting with `//` so the file can carry comments.
fn strip_comments(contents: &str) -> String {
    contents
        .lines()
        .filter(|line| !line.trim().starts_with("//"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// First byte of `text`, or `fallback` when it is empty or not ASCII.
fn single_byte(text: &str, fallback: u8) -> u8 {
    match text.as_bytes() {
        [b] if b.is_ascii() => *b,
        [] => fallback,
        _ => {
            log::warn!("expected a single ASCII character, got {:?}", text);
            fallback
        }
    }
}

impl Settings {
    /// Get the settings file path
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("longtable")
            .join("settings.json")
    }

    /// Load settings from the default location, falling back to defaults
    pub fn load() -> Self {
        Self::load_or_default(&Self::config_path())
    }

    /// Like [`Settings::load_from`], but never fails: a missing file gives
    /// defaults silently, an unreadable or malformed one gives defaults and a
    /// warning.
    pub fn load_or_default(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }
        match Self::load_from(path) {
            Ok(settings) => settings,
            Err(e) => {
                log::warn!("{}; using default settings", e);
                Self::default()
            }
        }
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        serde_json::from_str(&strip_comments(&contents)).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let write_err = |source| ConfigError::Write {
            path: path.display().to_string(),
            source,
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(write_err)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json).map_err(write_err)
    }

    pub fn window_config(&self) -> WindowConfig {
        WindowConfig {
            memory_budget: self.memory_budget,
            initial_rows: self.initial_rows,
            min_rows: self.min_rows,
            max_rows: self.max_rows.max(self.min_rows),
            edge_margin: self.edge_margin,
            forward_lead: self.forward_lead.clamp(0.0, 1.0),
            backward_lead: self.backward_lead.clamp(0.0, 1.0),
            budget_share: self.budget_share.clamp(0.0, 1.0),
            min_row_bytes: self.min_row_bytes.max(1),
        }
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            window: self.window_config(),
            history: HistoryConfig { max_entries: self.history_max_entries },
        }
    }

    pub fn export_options(&self) -> ExportOptions {
        let quote = single_byte(&self.export_quote, b'"');
        ExportOptions {
            eol: self.export_eol,
            bom: self.export_bom,
            encoding: self.export_encoding,
            quote,
            escape: single_byte(&self.export_escape, quote),
        }
    }
}
