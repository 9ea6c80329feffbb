//! Upload tasks built from extracted workout files.

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Payload format of the extracted workouts.
pub const DEFAULT_DATA_TYPE: &str = "tcx";

/// Activity type used when a sport kind has no mapping.
pub const FALLBACK_ACTIVITY_TYPE: &str = "workout";

#[derive(Debug, Error)]
pub enum TaskError {
    #[error("Cannot find file {}", .0.display())]
    NotFound(PathBuf),
    #[error("Cannot determine the sport kind of {}", .0.display())]
    NoSportKind(PathBuf),
    #[error("Unknown workout type: {0}. Please verify that you have correct mapping.")]
    UnknownSportKind(String),
}

/// Platform activity type for a source sport kind, if one is known.
///
/// See <https://developers.strava.com/docs/reference/#api-models-ActivityType>.
pub fn activity_type_for(sport_kind: &str) -> Option<&'static str> {
    let activity = match sport_kind {
        "CYCLING_SPORT" | "CYCLING_TRANSPORTATION" | "MOUNTAIN_BIKING" => "ride",
        "RUNNING" | "TREADMILL_RUNNING" => "run",
        "SWIMMING" => "swim",
        "HIKING" => "hike",
        "WALKING" => "walk",
        "SKIING_CROSS_COUNTRY" => "nordicski",
        "SKIING_DOWNHILL" => "alpineski",
        "AEROBICS" | "GYMNASTICS" | "WEIGHT_TRAINING" => "weighttraining",
        _ => return None,
    };
    Some(activity)
}

/// Activity name derived from the sport kind: `TREADMILL_RUNNING` -> `Treadmill running`.
pub fn display_name_for(sport_kind: &str) -> String {
    let mut chars = sport_kind.chars();
    match chars.next() {
        Some(first) => {
            let rest: String = chars.as_str().to_lowercase();
            format!("{}{}", first.to_uppercase(), rest).replace('_', " ")
        }
        None => String::new(),
    }
}

/// One file to upload. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadTask {
    activity_kind: String,
    display_name: String,
    data_type: String,
    file_path: PathBuf,
}

impl UploadTask {
    pub fn new(
        activity_kind: impl Into<String>,
        display_name: impl Into<String>,
        data_type: impl Into<String>,
        file_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            activity_kind: activity_kind.into(),
            display_name: display_name.into(),
            data_type: data_type.into(),
            file_path: file_path.into(),
        }
    }

    /// Build a task from a file whose parent directory names its sport kind.
    ///
    /// Unknown sport kinds fall back to a generic workout, except when `strict`
    /// is set (dry runs) so the mapping can be fixed before uploading.
    pub fn from_file(path: &Path, data_type: &str, strict: bool) -> Result<Self, TaskError> {
        if !path.is_file() {
            return Err(TaskError::NotFound(path.to_path_buf()));
        }

        let sport_kind = path
            .parent()
            .and_then(Path::file_name)
            .and_then(|name| name.to_str())
            .filter(|name| !name.is_empty())
            .ok_or_else(|| TaskError::NoSportKind(path.to_path_buf()))?;

        let activity_kind = match activity_type_for(sport_kind) {
            Some(activity) => activity,
            None if strict => return Err(TaskError::UnknownSportKind(sport_kind.to_string())),
            None => FALLBACK_ACTIVITY_TYPE,
        };

        Ok(Self::new(
            activity_kind,
            display_name_for(sport_kind),
            data_type,
            path,
        ))
    }

    pub fn activity_kind(&self) -> &str {
        &self.activity_kind
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn data_type(&self) -> &str {
        &self.data_type
    }

    pub fn file_path(&self) -> &Path {
        &self.file_path
    }

    /// Base name sent as the multipart file name.
    pub fn file_name(&self) -> String {
        self.file_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_workout(root: &Path, kind: &str, name: &str) -> PathBuf {
        let dir = root.join(kind);
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(name);
        std::fs::write(&path, "<TrainingCenterDatabase/>").unwrap();
        path
    }

    #[test]
    fn test_activity_type_mapping() {
        assert_eq!(activity_type_for("CYCLING_TRANSPORTATION"), Some("ride"));
        assert_eq!(activity_type_for("TREADMILL_RUNNING"), Some("run"));
        assert_eq!(activity_type_for("SKIING_DOWNHILL"), Some("alpineski"));
        assert_eq!(activity_type_for("GYMNASTICS"), Some("weighttraining"));
        assert_eq!(activity_type_for("running"), None);
        assert_eq!(activity_type_for("KITESURFING"), None);
    }

    #[test]
    fn test_display_name() {
        assert_eq!(display_name_for("TREADMILL_RUNNING"), "Treadmill running");
        assert_eq!(display_name_for("SWIMMING"), "Swimming");
        assert_eq!(display_name_for(""), "");
    }

    #[test]
    fn test_from_file_maps_parent_directory() {
        let temp = TempDir::new().unwrap();
        let path = write_workout(temp.path(), "MOUNTAIN_BIKING", "2020-05-01 10_00_00.tcx");

        let task = UploadTask::from_file(&path, DEFAULT_DATA_TYPE, true).unwrap();
        assert_eq!(task.activity_kind(), "ride");
        assert_eq!(task.display_name(), "Mountain biking");
        assert_eq!(task.data_type(), "tcx");
        assert_eq!(task.file_name(), "2020-05-01 10_00_00.tcx");
    }

    #[test]
    fn test_from_file_unknown_kind() {
        let temp = TempDir::new().unwrap();
        let path = write_workout(temp.path(), "KITESURFING", "a.tcx");

        let lenient = UploadTask::from_file(&path, DEFAULT_DATA_TYPE, false).unwrap();
        assert_eq!(lenient.activity_kind(), FALLBACK_ACTIVITY_TYPE);

        let strict = UploadTask::from_file(&path, DEFAULT_DATA_TYPE, true).unwrap_err();
        assert!(matches!(strict, TaskError::UnknownSportKind(kind) if kind == "KITESURFING"));
    }

    #[test]
    fn test_from_file_missing() {
        let temp = TempDir::new().unwrap();
        let err = UploadTask::from_file(&temp.path().join("RUNNING/nope.tcx"), "tcx", false)
            .unwrap_err();
        assert!(matches!(err, TaskError::NotFound(_)));
    }
}
