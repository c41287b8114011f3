pub mod batch;
pub mod config;
pub mod error;
pub mod executor;
pub mod extractor;
pub mod models;
pub mod review;
pub mod storage;
pub mod template;

pub use batch::{BatchOptions, BatchReport, run_batch};
pub use config::{LayoutConfig, NamingConfig, PdfSortConfig, ScanConfig};
pub use error::{ExitCode, PdfSortError, Result};
pub use executor::{PlannedAction, RenameOptions, RenamePlan, RenameReport};
pub use extractor::{ExtractionError, MetadataExtractor};
pub use models::*;
pub use review::{KeepProposed, OverrideProposer, TerminalReviewer};
pub use storage::manifest::{Manifest, ManifestEntry, default_manifest_path};
pub use template::{CaseStyle, Placeholder, RenderOptions, Rendered, Template};
