//! Metadata extraction seam.
//!
//! The batch processor only sees this trait; `pdfsort-science` provides the
//! lopdf-based implementation and tests plug in fakes.

use std::path::Path;

use thiserror::Error;

use crate::models::BibRecord;

/// Why a PDF could not be resolved. Never fatal for a run: the file is
/// moved to `todo/` and the reason is reported.
#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("no DOI or arXiv identifier found")]
    NoIdentifier,

    #[error("unreadable PDF: {0}")]
    Unreadable(String),

    #[error("{0}")]
    Other(String),
}

pub trait MetadataExtractor: Send + Sync {
    fn extract(&self, pdf_path: &Path) -> Result<BibRecord, ExtractionError>;
}
