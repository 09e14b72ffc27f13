pub mod clipboard;
pub mod error;
pub mod history;
pub mod memory;
pub mod overlay;
pub mod plan;
pub mod provider;
pub mod replay;
pub mod session;
pub mod stats;
pub mod structure;
pub mod transform;
pub mod translator;
pub mod window;

pub use error::{Axis, EngineError, Result};
pub use overlay::{CellRead, PatchKey, PatchOverlay};
pub use provider::{
    ColumnStat, Dialect, ExportOptions, FileService, InferredType, LineEnding, SessionInfo,
    StreamProvider, TextEncoding, TransformResult, WindowSlice,
};
pub use replay::{CellPatch, EditScript};
pub use session::{EditSession, SessionConfig};
pub use structure::{ColumnOp, RowOp};
pub use transform::{FindReplaceSpec, FindReplacer, MacroOp, MacroSpec};
pub use translator::{FilterRule, SortDirection, SortRule, TextFilterMode};
pub use window::{FetchOutcome, FetchRequest, WindowConfig};
