//! Stderr logging for the CLI.
//!
//! Filtering follows `RUST_LOG` (default `warn`), e.g.
//! `RUST_LOG=longtable_engine=debug ltab peek big.csv`.
//! Library crates log through `log`; the subscriber bridges those records.

use tracing_subscriber::{fmt, EnvFilter};

pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    // A second init (tests, embedding) keeps the first subscriber.
    let _ = fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .try_init();
}
