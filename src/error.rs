//! 错误类型 (Error types)
//!
//! 标注文件、镜头文件、视频与模型相关的所有错误。

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Result type for face pipeline operations.
pub type FaceResult<T> = Result<T, FaceError>;

/// Errors that can occur while running a face pipeline.
#[derive(Debug, Error)]
pub enum FaceError {
    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    #[error("{}:{line}: {reason}", path.display())]
    Malformed {
        path: PathBuf,
        line: usize,
        reason: String,
    },

    #[error("{}:{line}: expected {expected} landmarks, found {found}", path.display())]
    InconsistentLandmarks {
        path: PathBuf,
        line: usize,
        expected: usize,
        found: usize,
    },

    #[error("Invalid shot file {}: {reason}", path.display())]
    InvalidShots { path: PathBuf, reason: String },

    #[error("Video error: {0}")]
    Video(String),

    #[error("Model error: {0}")]
    Model(String),

    #[error("Model not found: {0}")]
    ModelNotFound(PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
}

impl FaceError {
    /// Create a malformed-row error.
    pub fn malformed(path: &Path, line: usize, reason: impl Into<String>) -> Self {
        Self::Malformed {
            path: path.to_path_buf(),
            line,
            reason: reason.into(),
        }
    }

    /// Create a video (decode/encode) error.
    pub fn video(message: impl Into<String>) -> Self {
        Self::Video(message.into())
    }

    /// Create a model inference error.
    pub fn model(message: impl Into<String>) -> Self {
        Self::Model(message.into())
    }

    /// True for errors caused by the content of an input file.
    pub fn is_input_format(&self) -> bool {
        matches!(
            self,
            Self::Malformed { .. } | Self::InconsistentLandmarks { .. } | Self::InvalidShots { .. }
        )
    }
}

/// Open a file for reading, mapping a missing file to [`FaceError::FileNotFound`].
pub fn open_input(path: &Path) -> FaceResult<std::fs::File> {
    std::fs::File::open(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => FaceError::FileNotFound(path.to_path_buf()),
        _ => FaceError::Io(e),
    })
}
