//! Screenshot collaborator contract.
//!
//! Rendering pages is not done here. A [`ScreenshotProvider`] hands back an
//! artifact reference for a markup file, and any failure only degrades the
//! report: the affected side is recorded as `"unavailable"`.

use crate::error::CollaboratorError;
use serde::{Serialize, Serializer};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScreenshotRequest {
    pub markup_path: PathBuf,
    pub viewport: Viewport,
    pub full_page: bool,
}

impl ScreenshotRequest {
    pub fn new(markup_path: impl Into<PathBuf>) -> Self {
        Self {
            markup_path: markup_path.into(),
            viewport: Viewport::default(),
            full_page: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScreenshotArtifact {
    pub path: PathBuf,
    pub bytes: u64,
}

pub trait ScreenshotProvider: Send + Sync {
    fn capture(&self, request: &ScreenshotRequest) -> Result<ScreenshotArtifact, CollaboratorError>;
}

/// Picks up `<stem>.png` rendered next to the markup file by an external tool.
#[derive(Debug, Clone, Copy, Default)]
pub struct SiblingFileScreenshots;

impl ScreenshotProvider for SiblingFileScreenshots {
    fn capture(&self, request: &ScreenshotRequest) -> Result<ScreenshotArtifact, CollaboratorError> {
        let path = request.markup_path.with_extension("png");
        let metadata = fs::metadata(&path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => CollaboratorError::MissingArtifact {
                path: path.to_string_lossy().to_string(),
            },
            _ => CollaboratorError::Unavailable {
                reason: format!("cannot read {}: {}", path.display(), e),
            },
        })?;
        if !metadata.is_file() {
            return Err(CollaboratorError::MissingArtifact {
                path: path.to_string_lossy().to_string(),
            });
        }
        Ok(ScreenshotArtifact {
            path,
            bytes: metadata.len(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScreenshotStatus {
    Captured(ScreenshotArtifact),
    Unavailable,
}

impl Serialize for ScreenshotStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            ScreenshotStatus::Captured(artifact) => artifact.serialize(serializer),
            ScreenshotStatus::Unavailable => serializer.serialize_str("unavailable"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Screenshots {
    pub before: ScreenshotStatus,
    pub after: ScreenshotStatus,
}

/// Requests both screenshots; failures are logged and recorded as unavailable.
pub fn capture_pair(provider: &dyn ScreenshotProvider, before: &Path, after: &Path) -> Screenshots {
    let capture = |path: &Path| match provider.capture(&ScreenshotRequest::new(path)) {
        Ok(artifact) => ScreenshotStatus::Captured(artifact),
        Err(e) => {
            warn!(markup = %path.display(), error = %e, "screenshot unavailable");
            ScreenshotStatus::Unavailable
        }
    };
    Screenshots {
        before: capture(before),
        after: capture(after),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_sibling_file_found() {
        let dir = TempDir::new().unwrap();
        let markup = dir.path().join("before.html");
        fs::write(&markup, "<p></p>").unwrap();
        fs::write(dir.path().join("before.png"), [0u8; 16]).unwrap();

        let artifact = SiblingFileScreenshots
            .capture(&ScreenshotRequest::new(&markup))
            .unwrap();
        assert_eq!(artifact.path, dir.path().join("before.png"));
        assert_eq!(artifact.bytes, 16);
    }

    #[test]
    fn test_missing_sibling_file() {
        let dir = TempDir::new().unwrap();
        let result = SiblingFileScreenshots.capture(&ScreenshotRequest::new(dir.path().join("after.html")));
        assert!(matches!(result, Err(CollaboratorError::MissingArtifact { .. })));
    }

    #[test]
    fn test_unreadable_artifact_is_unavailable() {
        let dir = TempDir::new().unwrap();
        let not_a_dir = dir.path().join("pages");
        fs::write(&not_a_dir, "").unwrap();

        let result = SiblingFileScreenshots.capture(&ScreenshotRequest::new(not_a_dir.join("before.html")));
        match result {
            Err(CollaboratorError::Unavailable { reason }) => {
                assert!(reason.contains("before.png"));
            }
            other => panic!("expected Unavailable, got {:?}", other),
        }
    }

    #[test]
    fn test_failure_degrades_to_unavailable() {
        let dir = TempDir::new().unwrap();
        let shots = capture_pair(
            &SiblingFileScreenshots,
            &dir.path().join("before.html"),
            &dir.path().join("after.html"),
        );
        assert_eq!(shots.before, ScreenshotStatus::Unavailable);
        let json = serde_json::to_value(&shots).unwrap();
        assert_eq!(json["after"], "unavailable");
    }
}
