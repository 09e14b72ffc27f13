//! CSV/TSV on disk: a windowed [`StreamProvider`](longtable_engine::StreamProvider)
//! and a replaying [`FileService`](longtable_engine::FileService).

pub mod dialect;
pub mod error;
pub mod service;
pub mod stream;
pub mod writer;

pub use dialect::{parse_delimiter, sniff_delimiter, sniff_dialect, sniff_file};
pub use error::IoError;
pub use service::CsvFileService;
pub use stream::CsvStreamProvider;
