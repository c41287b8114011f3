use thiserror::Error;

/// All fatal errors that can occur in pdfsort-core.
///
/// Per-file problems are not errors: they are collected as
/// [`FileIssue`](crate::models::FileIssue) values and summarized at the end
/// of a run.
#[derive(Debug, Error)]
pub enum PdfSortError {
    #[error("Invalid template: {message} at position {position}")]
    InvalidTemplate { message: String, position: usize },

    #[error("Directory does not exist: {0}")]
    DirectoryNotFound(String),

    #[error("Manifest not found: {0}")]
    ManifestNotFound(String),

    #[error("Manifest error: {0}")]
    Manifest(String),

    #[error("Config error: {0}")]
    ConfigError(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

impl PdfSortError {
    pub(crate) fn invalid_template(message: impl Into<String>, position: usize) -> Self {
        Self::InvalidTemplate {
            message: message.into(),
            position,
        }
    }

    /// Exit code the CLI should use when this error aborts a run.
    pub fn exit_code(&self) -> ExitCode {
        match self {
            Self::InvalidTemplate { .. } | Self::ConfigError(_) => ExitCode::InvalidArgs,
            Self::DirectoryNotFound(_) | Self::ManifestNotFound(_) => ExitCode::NotFound,
            Self::Io(_) => ExitCode::FileSystemError,
            _ => ExitCode::GeneralError,
        }
    }
}

/// Process exit codes used by the `pdfsort` binary.
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCode {
    Success = 0,
    GeneralError = 1,
    NotFound = 2,
    InvalidArgs = 3,
    FileSystemError = 4,
    Conflict = 7,
}

pub type Result<T> = std::result::Result<T, PdfSortError>;
