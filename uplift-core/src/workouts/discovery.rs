use glob::glob;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

/// Extension of the payload files.
pub const WORKOUT_EXTENSION: &str = "tcx";

/// Suffix appended to a file once it has been uploaded.
pub const PROCESSED_SUFFIX: &str = "processed";

#[derive(Debug, Error)]
pub enum WorkoutError {
    #[error("Workouts directory {} does not exist", .0.display())]
    MissingDirectory(PathBuf),
    #[error("Invalid workouts glob pattern '{pattern}': {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: glob::PatternError,
    },
}

/// List the `*.tcx` files one level below `root`, sorted by path.
///
/// Files already renamed to `*.tcx.processed` are not matched; unreadable
/// entries are skipped with a warning.
pub fn discover_workouts(root: &Path) -> Result<Vec<PathBuf>, WorkoutError> {
    if !root.is_dir() {
        return Err(WorkoutError::MissingDirectory(root.to_path_buf()));
    }

    let escaped = glob::Pattern::escape(&root.to_string_lossy());
    let pattern = Path::new(&escaped)
        .join("*")
        .join(format!("*.{WORKOUT_EXTENSION}"));
    let pattern = pattern.to_string_lossy().into_owned();

    let entries = glob(&pattern).map_err(|source| WorkoutError::Pattern {
        pattern: pattern.clone(),
        source,
    })?;

    let mut files = Vec::new();
    for entry in entries {
        match entry {
            Ok(path) if path.is_file() => files.push(path),
            Ok(_) => {}
            Err(err) => warn!(error = %err, "Failed to resolve workout path"),
        }
    }
    files.sort();

    debug!(root = %root.display(), count = files.len(), "Discovered workouts");
    Ok(files)
}
