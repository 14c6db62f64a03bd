//! Artifact location by naming convention.
//!
//! Layout: `<script dir>/media/videos/<script stem>/<quality dir>/<output file>`

use std::path::{Path, PathBuf};

use super::invoker::{Quality, RenderConfig};

/// The renderer exited cleanly but nothing exists at the expected path.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("no artifact at {}", path.display())]
pub struct ArtifactMissing {
    pub path: PathBuf,
}

/// Resolves where the renderer puts its primary output.
#[derive(Debug, Clone)]
pub struct ArtifactLocator {
    quality: Quality,
    output_file: String,
}

impl ArtifactLocator {
    pub fn new(quality: Quality, output_file: impl Into<String>) -> Self {
        Self {
            quality,
            output_file: output_file.into(),
        }
    }

    /// Locator matching the naming used by a render configuration.
    pub fn for_config(config: &RenderConfig) -> Self {
        Self::new(config.quality, config.output_file.clone())
    }

    /// Path the renderer writes to for `script_path`.
    pub fn expected_path(&self, script_path: &Path) -> PathBuf {
        let base = script_path.parent().unwrap_or_else(|| Path::new(""));
        let module = script_path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default();

        base.join("media")
            .join("videos")
            .join(module)
            .join(self.quality.output_dir())
            .join(&self.output_file)
    }

    /// Expected path, if a file exists there.
    pub fn locate(&self, script_path: &Path) -> Result<PathBuf, ArtifactMissing> {
        let path = self.expected_path(script_path);
        if path.is_file() {
            Ok(path)
        } else {
            Err(ArtifactMissing { path })
        }
    }
}

impl Default for ArtifactLocator {
    fn default() -> Self {
        Self::for_config(&RenderConfig::default())
    }
}
