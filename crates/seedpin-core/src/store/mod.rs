//! Persistent seed database (SQLite via sqlx).
//!
//! Stores seeds, their manifest entries, and per-object pin/download
//! configuration plus the checkpoints written by object jobs.

pub mod types;
pub mod db;
mod entries;
mod objects;
mod seeds;

pub use types::*;
pub use db::*;

#[cfg(test)]
mod tests;
