// src/error.rs

//! Error types for apkg
//!
//! Every error kind maps to a small positive process exit code so that
//! scripts can branch on the failure class without parsing messages.
//! Codes are grouped by range:
//!
//! | Range | Class |
//! |-------|-------|
//! | 10-29 | invalid usage / input |
//! | 30-39 | missing resources |
//! | 40-49 | parsing |
//! | 50-59 | remote failures |
//! | 60-69 | external commands |
//! | 70-79 | distro support |
//! | 80-89 | auto-detection |

use std::path::PathBuf;
use thiserror::Error;

/// Result type used throughout the apkg library
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid usage: {0}")]
    InvalidUsage(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Invalid version: {0}")]
    InvalidVersion(String),

    #[error("Invalid archive format: {0}")]
    InvalidArchiveFormat(String),

    #[error("Invalid source package format: {0}")]
    InvalidSourcePackageFormat(String),

    #[error(
        "Missing required config option: {option}\n\n\
         Please update project config with required information:\n\n{}",
        config_path.display()
    )]
    MissingRequiredConfigOption {
        option: String,
        config_path: PathBuf,
    },

    #[error("Missing package template for distro: {distro}\n\nyou can add it into: {}", templates_path.display())]
    MissingPackagingTemplate {
        distro: String,
        templates_path: PathBuf,
    },

    #[error("{kind} archive not found: {name}")]
    ArchiveNotFound { kind: &'static str, name: String },

    #[error("Source package not found: {0}")]
    SourcePackageNotFound(String),

    #[error("Unable to parse: {0}")]
    ParsingFailed(String),

    #[error("Failed to render template {}: {reason}", path.display())]
    TemplateRenderFailed { path: PathBuf, reason: String },

    #[error("Failed to download file{}:\n\n{url}{}",
        code.map(|c| format!(" with code {c}")).unwrap_or_default(),
        reason.as_ref().map(|r| format!("\n\n{r}")).unwrap_or_default())]
    FileDownloadFailed {
        code: Option<u16>,
        url: String,
        reason: Option<String>,
    },

    #[error("Command not found: {0}")]
    CommandNotFound(String),

    #[error("Command failed{}: {cmd}", code.map(|c| format!(" with exit code {c}")).unwrap_or_default())]
    CommandFailed {
        cmd: String,
        code: Option<i32>,
        stdout: String,
        stderr: String,
    },

    #[error("Unexpected command output: {0}")]
    UnexpectedCommandOutput(String),

    #[error("Distro not supported: {0}")]
    DistroNotSupported(String),

    #[error(
        "Unable to detect upstream version.\n\n\
         Please consider one of following:\n\n\
         1) set upstream.archive_url\n\
         2) set upstream.version_script to custom script\n\
         3) manually supply version using -v/--version option"
    )]
    UnableToDetectUpstreamVersion,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Process exit code for this error kind
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::InvalidUsage(_) => 10,
            Self::InvalidInput(_) => 11,
            Self::InvalidVersion(_) => 14,
            Self::InvalidArchiveFormat(_) => 17,
            Self::InvalidSourcePackageFormat(_) => 18,
            Self::MissingRequiredConfigOption { .. } => 31,
            Self::MissingPackagingTemplate { .. } => 32,
            Self::ArchiveNotFound { .. } => 36,
            Self::SourcePackageNotFound(_) => 37,
            Self::ParsingFailed(_) => 42,
            Self::TemplateRenderFailed { .. } => 43,
            Self::FileDownloadFailed { .. } => 52,
            Self::CommandNotFound(_) => 60,
            Self::CommandFailed { .. } => 62,
            Self::UnexpectedCommandOutput(_) => 64,
            Self::DistroNotSupported(_) => 70,
            Self::UnableToDetectUpstreamVersion => 84,
            Self::Io(_) => 1,
        }
    }

    /// Build the error a package style returns for a capability it lacks
    pub fn missing_capability(style: &str, capability: &str) -> Self {
        Self::DistroNotSupported(format!(
            "{style} package style doesn't support: {capability}"
        ))
    }
}
