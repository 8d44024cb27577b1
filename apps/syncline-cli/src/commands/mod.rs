//! Subcommand implementations.

pub mod connections;
pub mod ingest;
pub mod sync;
