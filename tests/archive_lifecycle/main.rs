//! Archive lifecycle tests
//!
//! Drive the engine end to end against the in-memory catalog: export,
//! import, offline moves and revert, and the round trips between them.

#[path = "../common/mod.rs"]
mod common;

mod export;
mod import;
mod offline;
mod revert;
mod round_trip;
