//! Snapshot persistence for simulation state

pub mod snapshot;

pub use snapshot::{atomic_write, load_snapshot, load_snapshot_or_default, save_snapshot, SNAPSHOT_EXTENSION};
