//! Tracing setup. Mirrors the teacher's `main.rs`: the binary installs a
//! global subscriber exactly once; library code never does, so an embedding
//! caller keeps control of its own logging configuration.

use tracing::Level;
use tracing_subscriber::FmtSubscriber;

/// Installs a `tracing-subscriber` `FmtSubscriber` as the global default.
/// Call this once, from `main`, before any other crate code runs.
pub fn init(level: Level) -> Result<(), tracing::subscriber::SetGlobalDefaultError> {
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber)
}
