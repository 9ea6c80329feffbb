//! Extracted workout files and the sequential batch that uploads them.
//!
//! The workouts directory holds one subdirectory per source sport kind
//! (`RUNNING`, `CYCLING_SPORT`, ...) with the exported `*.tcx` files inside.

mod discovery;
mod runner;

pub use discovery::{discover_workouts, WorkoutError, PROCESSED_SUFFIX, WORKOUT_EXTENSION};
pub use runner::{run_batch, run_batch_with, BatchOptions, BatchReport};
