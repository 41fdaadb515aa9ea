// SPDX-License-Identifier: GPL-3.0-only

//! Output file locations for recordings

use super::FileLocations;
use crate::constants::DEFAULT_SAVE_FOLDER;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Hands out timestamped `.mp4` paths in a video directory
#[derive(Debug, Clone)]
pub struct VideoDirLocations {
    dir: PathBuf,
}

impl VideoDirLocations {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// `~/Videos/Camera`, or `output_dir` when configured
    pub fn from_config(output_dir: Option<&Path>) -> Self {
        match output_dir {
            Some(dir) => Self::new(dir),
            None => Self::new(default_video_dir()),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl FileLocations for VideoDirLocations {
    fn prepare_video_output(&self) -> Option<PathBuf> {
        if let Err(e) = std::fs::create_dir_all(&self.dir) {
            warn!(dir = %self.dir.display(), error = %e, "Cannot create video directory");
            return None;
        }

        let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
        let suffix = uuid::Uuid::new_v4().simple().to_string();
        // Two recordings within one second (raw and export) need distinct names
        let filename = format!("VID_{}_{}.mp4", timestamp, &suffix[..8]);
        Some(self.dir.join(filename))
    }
}

/// Default directory for recorded videos
pub fn default_video_dir() -> PathBuf {
    dirs::video_dir()
        .unwrap_or_else(|| dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")))
        .join(DEFAULT_SAVE_FOLDER)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths_are_fresh_and_named() {
        let dir = std::env::temp_dir().join(format!("camera-pipeline-{}", uuid::Uuid::new_v4()));
        let locations = VideoDirLocations::new(&dir);

        let first = locations.prepare_video_output().unwrap();
        let second = locations.prepare_video_output().unwrap();
        assert_ne!(first, second);
        assert_eq!(first.parent(), Some(dir.as_path()));

        let name = first.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("VID_"));
        assert!(name.ends_with(".mp4"));

        let _ = std::fs::remove_dir_all(&dir);
    }
}
