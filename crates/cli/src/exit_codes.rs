//! CLI Exit Code Registry
//!
//! This is the single source of truth for all CLI exit codes.
//! Exit codes are part of the shell contract; scripts rely on them.
//!
//! | Code | Description                                        |
//! |------|----------------------------------------------------|
//! | 0    | Success                                            |
//! | 1    | General error (unspecified)                        |
//! | 2    | Usage error (bad args, missing option)             |
//! | 3    | I/O error (cannot open, read, or write a file)     |
//! | 4    | Invalid edit (bad index, row not loaded, bad script or pattern) |

use longtable_engine::EngineError;

/// Success - command completed without errors.
pub const EXIT_SUCCESS: u8 = 0;

/// General error - unspecified failure.
pub const EXIT_ERROR: u8 = 1;

/// Usage error - bad arguments, missing required options.
/// clap also exits with 2 on parse failures.
pub const EXIT_USAGE: u8 = 2;

/// A file could not be opened, read or written.
pub const EXIT_IO: u8 = 3;

/// An edit was rejected: out-of-range index, non-resident row, malformed
/// edit script or an invalid find pattern.
pub const EXIT_INVALID_EDIT: u8 = 4;

/// Map an engine error to its exit code.
pub fn engine_exit_code(err: &EngineError) -> u8 {
    match err {
        EngineError::Open { .. } | EngineError::Fetch { .. } | EngineError::Save(_) => EXIT_IO,
        EngineError::InvalidIndex { .. }
        | EngineError::NotResident { .. }
        | EngineError::Pattern(_) => EXIT_INVALID_EDIT,
        EngineError::Clipboard(_) | EngineError::NoSession => EXIT_ERROR,
    }
}
