use std::path::{Path, PathBuf};

use crate::errors::PilotResult;

/// Where per-step screenshots and hierarchy dumps are written.
#[derive(Debug, Clone)]
pub struct ArtifactDirs {
    pub screenshots: PathBuf,
    pub ui_dumps: PathBuf,
}

impl ArtifactDirs {
    pub fn new(screenshots: impl Into<PathBuf>, ui_dumps: impl Into<PathBuf>) -> Self {
        Self {
            screenshots: screenshots.into(),
            ui_dumps: ui_dumps.into(),
        }
    }

    pub fn ensure(&self) -> PilotResult<()> {
        std::fs::create_dir_all(&self.screenshots)?;
        std::fs::create_dir_all(&self.ui_dumps)?;
        Ok(())
    }

    pub fn screenshot_path(&self, step: u32) -> PathBuf {
        step_file(&self.screenshots, step, "png")
    }

    pub fn ui_dump_path(&self, step: u32) -> PathBuf {
        step_file(&self.ui_dumps, step, "xml")
    }
}

fn step_file(dir: &Path, step: u32, ext: &str) -> PathBuf {
    dir.join(format!("step_{step:02}.{ext}"))
}
