use pdfsort_core::ExtractionError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScienceError {
    #[error("invalid DOI: {0}")]
    InvalidDoi(String),

    #[error("invalid arXiv ID: {0}")]
    InvalidArxivId(String),

    #[error("PDF extraction error: {0}")]
    PdfExtraction(String),
}

pub type Result<T> = std::result::Result<T, ScienceError>;

impl From<ScienceError> for ExtractionError {
    fn from(err: ScienceError) -> Self {
        match err {
            ScienceError::PdfExtraction(msg) => ExtractionError::Unreadable(msg),
            other => ExtractionError::Other(other.to_string()),
        }
    }
}
