//! pdfsort science: DOI / arXiv identifiers and offline PDF metadata
//! extraction.

pub mod error;
pub mod identifiers;
pub mod pdf;

pub use error::{Result, ScienceError};
pub use identifiers::{ArxivId, Doi};
pub use pdf::{PdfMetadataExtractor, PdfSources, record_from_sources};
