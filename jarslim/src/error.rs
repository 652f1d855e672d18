use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ShadeError {
    #[error("Failed to analyze class {location}")]
    ClassAnalysis {
        location: String,
        #[source]
        source: anyhow::Error,
    },
    #[error("Failed to write archive {}", path.display())]
    ArchiveWrite {
        path: PathBuf,
        #[source]
        source: anyhow::Error,
    },
    #[error("Invalid configuration: {0}")]
    Config(String),
    #[error(transparent)]
    Run(#[from] anyhow::Error),
}

impl ShadeError {
    pub fn class_analysis<E: Into<anyhow::Error>>(location: impl Into<String>, source: E) -> Self {
        ShadeError::ClassAnalysis {
            location: location.into(),
            source: source.into(),
        }
    }

    pub fn archive_write<E: Into<anyhow::Error>>(path: impl Into<PathBuf>, source: E) -> Self {
        ShadeError::ArchiveWrite {
            path: path.into(),
            source: source.into(),
        }
    }
}
