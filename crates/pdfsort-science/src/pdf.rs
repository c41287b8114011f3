//! Offline metadata extraction from the PDF itself: the info dictionary and
//! the text of the first pages, read with lopdf.

use std::path::Path;

use lopdf::Document;
use once_cell::sync::Lazy;
use pdfsort_core::{BibRecord, ExtractionError, Identifier, MetadataExtractor};
use regex::Regex;
use tracing::debug;

use crate::error::{Result, ScienceError};
use crate::identifiers::extract::{FoundIdentifier, find_identifier};

static YEAR_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(19|20)\d{2}\b").expect("valid regex"));
static PDF_DATE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:D:)?(\d{4})(\d{2})?(\d{2})?").expect("valid regex")
});
static JOURNAL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^((?:journal|annals|proceedings|transactions) of [a-z ,&\-]+?)\s*(?:[\(\d]|$)")
        .expect("valid regex")
});

const TITLE_SCAN_LINES: usize = 30;

/// Raw material read from one PDF.
#[derive(Debug, Clone, Default)]
pub struct PdfSources {
    pub info_title: Option<String>,
    pub info_author: Option<String>,
    pub creation_date: Option<String>,
    /// Text of the first pages.
    pub text: String,
}

impl PdfSources {
    pub fn read(pdf_path: &Path, max_pages: usize) -> Result<Self> {
        let metadata = Document::load_metadata(pdf_path);
        let text = first_pages_text(pdf_path, max_pages);

        let (metadata, text) = match (metadata, text) {
            (Err(meta_err), Err(text_err)) => {
                return Err(ScienceError::PdfExtraction(format!(
                    "{}: {meta_err}; {text_err}",
                    pdf_path.display()
                )));
            }
            (metadata, text) => (metadata.ok(), text.unwrap_or_default()),
        };

        Ok(Self {
            info_title: metadata
                .as_ref()
                .and_then(|m| m.title.as_deref())
                .and_then(clean_pdf_metadata_field),
            info_author: metadata
                .as_ref()
                .and_then(|m| m.author.as_deref())
                .and_then(clean_pdf_metadata_field),
            creation_date: metadata
                .as_ref()
                .and_then(|m| m.creation_date.clone().or_else(|| m.modification_date.clone())),
            text,
        })
    }
}

fn first_pages_text(pdf_path: &Path, max_pages: usize) -> Result<String> {
    let document = Document::load(pdf_path).map_err(|err| {
        ScienceError::PdfExtraction(format!("lopdf failed to open {}: {err}", pdf_path.display()))
    })?;
    let page_numbers: Vec<u32> = document.get_pages().keys().copied().take(max_pages).collect();
    if page_numbers.is_empty() {
        return Ok(String::new());
    }
    document.extract_text(&page_numbers).map_err(|err| {
        ScienceError::PdfExtraction(format!(
            "lopdf failed to extract text from {}: {err}",
            pdf_path.display()
        ))
    })
}

/// [`MetadataExtractor`] that needs no network: the identifier comes from
/// the PDF text (or the file name), the rest from the info dictionary and
/// first-page heuristics.
#[derive(Debug, Clone)]
pub struct PdfMetadataExtractor {
    max_pages: usize,
}

impl Default for PdfMetadataExtractor {
    fn default() -> Self {
        Self { max_pages: 2 }
    }
}

impl PdfMetadataExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_pages(mut self, max_pages: usize) -> Self {
        self.max_pages = max_pages.max(1);
        self
    }
}

impl MetadataExtractor for PdfMetadataExtractor {
    fn extract(&self, pdf_path: &Path) -> std::result::Result<BibRecord, ExtractionError> {
        let sources = PdfSources::read(pdf_path, self.max_pages)?;
        let stem = pdf_path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();
        let record = record_from_sources(&sources, &stem)?;
        debug!(file = %pdf_path.display(), id = %record.identifier.value, "extracted");
        Ok(record)
    }
}

/// Build a record from what was read out of a PDF. Fails only when no
/// identifier can be found.
pub fn record_from_sources(
    sources: &PdfSources,
    file_stem: &str,
) -> std::result::Result<BibRecord, ExtractionError> {
    let search_text = match &sources.info_title {
        Some(title) => format!("{title}\n{}", sources.text),
        None => sources.text.clone(),
    };

    let found = find_identifier(&search_text, file_stem).ok_or(ExtractionError::NoIdentifier)?;
    let mut record = match found {
        FoundIdentifier::Doi(doi) => BibRecord::new(Identifier::from(doi)),
        FoundIdentifier::Arxiv(arxiv) => {
            let (year, month) = (arxiv.year, arxiv.month);
            let mut record = BibRecord::new(Identifier::from(arxiv));
            record.year = Some(year);
            record.month = Some(month);
            record
        }
    };

    record.title = sources
        .info_title
        .clone()
        .filter(|t| is_plausible_title(t))
        .or_else(|| title_from_text(&sources.text));

    record.authors = sources
        .info_author
        .as_deref()
        .map(split_pdf_authors)
        .unwrap_or_default();

    record.journal = journal_from_text(&sources.text);

    if record.year.is_none() {
        let created = sources.creation_date.as_deref().and_then(parse_pdf_date);
        let text_year = YEAR_RE
            .find(&sources.text)
            .and_then(|m| m.as_str().parse::<i32>().ok());
        match (text_year, created) {
            (Some(year), Some((y, month, day))) if year == y => {
                record.year = Some(y);
                record.month = month;
                record.day = day;
            }
            (Some(year), _) => record.year = Some(year),
            (None, Some((y, month, day))) => {
                record.year = Some(y);
                record.month = month;
                record.day = day;
            }
            (None, None) => {}
        }
    }

    Ok(record)
}

/// `D:YYYYMMDDHHmmSS…` → year, month, day.
pub fn parse_pdf_date(value: &str) -> Option<(i32, Option<u32>, Option<u32>)> {
    let caps = PDF_DATE_RE.captures(value.trim())?;
    let year = caps[1].parse::<i32>().ok()?;
    let month = caps
        .get(2)
        .and_then(|m| m.as_str().parse::<u32>().ok())
        .filter(|m| (1..=12).contains(m));
    let day = month
        .and(caps.get(3))
        .and_then(|d| d.as_str().parse::<u32>().ok())
        .filter(|d| (1..=31).contains(d));
    Some((year, month, day))
}

fn normalize_inline_whitespace(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn clean_pdf_metadata_field(raw: &str) -> Option<String> {
    let normalized = normalize_inline_whitespace(&raw.replace('\0', " "));
    (!normalized.is_empty()).then_some(normalized)
}

/// Authors from the info dictionary: `;`, newline or ` and ` separated.
pub fn split_pdf_authors(raw: &str) -> Vec<String> {
    let parts: Vec<&str> = if raw.contains(';') {
        raw.split(';').collect()
    } else if raw.contains('\n') {
        raw.split('\n').collect()
    } else {
        raw.split(" and ").collect()
    };

    parts
        .into_iter()
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(ToOwned::to_owned)
        .collect()
}

fn is_plausible_title(value: &str) -> bool {
    let trimmed = value.trim();
    let chars = trimmed.chars().count();
    if !(8..=220).contains(&chars) {
        return false;
    }
    let words = trimmed.split_whitespace().count();
    if !(2..=30).contains(&words) {
        return false;
    }

    let lower = trimmed.to_lowercase();
    const REJECT_PREFIXES: &[&str] = &[
        "arxiv:",
        "doi:",
        "abstract",
        "keywords",
        "submitted",
        "accepted",
        "copyright",
        "microsoft word",
        "untitled",
    ];
    const REJECT_CONTAINS: &[&str] = &[
        "http://",
        "https://",
        "www.",
        "@",
        "all rights reserved",
        "university of",
        "department of",
        ".doc",
        ".tex",
    ];
    if REJECT_PREFIXES.iter().any(|p| lower.starts_with(p))
        || REJECT_CONTAINS.iter().any(|c| lower.contains(c))
        || JOURNAL_RE.is_match(trimmed)
    {
        return false;
    }

    let letters = trimmed.chars().filter(|c| c.is_alphabetic()).count();
    letters * 2 > chars
}

fn score_title_line(line: &str, index: usize) -> i32 {
    let words = line.split_whitespace().count();
    let mut score = 20 - (index as i32);
    if (4..=20).contains(&words) {
        score += 6;
    }
    let capitalized = line
        .split_whitespace()
        .filter(|w| w.chars().next().is_some_and(char::is_uppercase))
        .count();
    if capitalized * 2 >= words {
        score += 3;
    }
    if line.ends_with('.') {
        score -= 5;
    }
    score
}

/// Best title-looking line near the top of the first page.
fn title_from_text(text: &str) -> Option<String> {
    text.lines()
        .map(normalize_inline_whitespace)
        .filter(|line| !line.is_empty())
        .take(TITLE_SCAN_LINES)
        .enumerate()
        .filter(|(_, line)| is_plausible_title(line))
        .map(|(idx, line)| (score_title_line(&line, idx), idx, line))
        .max_by(|(score_a, idx_a, _), (score_b, idx_b, _)| {
            score_a.cmp(score_b).then_with(|| idx_b.cmp(idx_a))
        })
        .map(|(_, _, line)| line)
}

fn journal_from_text(text: &str) -> Option<String> {
    text.lines()
        .take(TITLE_SCAN_LINES)
        .map(normalize_inline_whitespace)
        .find_map(|line| {
            JOURNAL_RE
                .captures(&line)
                .map(|caps| caps[1].trim_end_matches([',', ' ']).to_string())
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pdfsort_core::IdentifierKind;
    use tempfile::TempDir;

    fn sources(text: &str) -> PdfSources {
        PdfSources {
            info_title: None,
            info_author: Some("Smith, John; Jones, Bob; Lee, Ann".to_string()),
            creation_date: Some("D:20200315120000+01'00'".to_string()),
            text: text.to_string(),
        }
    }

    #[test]
    fn test_record_from_doi_text() {
        let text = "Journal of Things 12 (2020) 1-10\n\
                    A Study of X in Practice\n\
                    John Smith, Bob Jones\n\
                    https://doi.org/10.1000/XYZ123\n\
                    Abstract. We study X.";
        let record = record_from_sources(&sources(text), "scan").unwrap();

        assert_eq!(record.identifier.kind, IdentifierKind::Doi);
        assert_eq!(record.identifier.value, "10.1000/xyz123");
        assert_eq!(record.entry_type, "article");
        assert_eq!(record.title.as_deref(), Some("A Study of X in Practice"));
        assert_eq!(record.authors, ["Smith, John", "Jones, Bob", "Lee, Ann"]);
        assert_eq!(record.journal.as_deref(), Some("Journal of Things"));
        assert_eq!((record.year, record.month, record.day), (Some(2020), Some(3), Some(15)));
    }

    #[test]
    fn test_arxiv_date_from_identifier() {
        let mut s = sources("Attention Is All You Need\narXiv:1706.03762v5 [cs.CL] 6 Dec 2017");
        s.info_title = Some("Attention Is All You Need".to_string());
        let record = record_from_sources(&s, "paper").unwrap();

        assert_eq!(record.identifier, Identifier::arxiv("1706.03762"));
        assert_eq!(record.entry_type, "misc");
        assert_eq!((record.year, record.month, record.day), (Some(2017), Some(6), None));
        assert_eq!(record.title.as_deref(), Some("Attention Is All You Need"));
    }

    #[test]
    fn test_implausible_info_title_ignored() {
        let mut s = sources("Deep Residual Learning for Image Recognition\ndoi:10.1109/CVPR.2016.90");
        s.info_title = Some("Microsoft Word - paper.docx".to_string());
        let record = record_from_sources(&s, "x").unwrap();
        assert_eq!(
            record.title.as_deref(),
            Some("Deep Residual Learning for Image Recognition")
        );
    }

    #[test]
    fn test_no_identifier() {
        let err = record_from_sources(&sources("Just some notes from 2020"), "notes").unwrap_err();
        assert!(matches!(err, ExtractionError::NoIdentifier));
    }

    #[test]
    fn test_parse_pdf_date() {
        assert_eq!(parse_pdf_date("D:20200315120000Z"), Some((2020, Some(3), Some(15))));
        assert_eq!(parse_pdf_date("D:2019"), Some((2019, None, None)));
        assert_eq!(parse_pdf_date("D:20191399"), Some((2019, None, None)));
        assert_eq!(parse_pdf_date("yesterday"), None);
    }

    #[test]
    fn test_split_pdf_authors() {
        assert_eq!(split_pdf_authors("A. Smith and B. Jones"), ["A. Smith", "B. Jones"]);
        assert_eq!(split_pdf_authors("Smith, A.; ; Jones, B."), ["Smith, A.", "Jones, B."]);
        assert_eq!(split_pdf_authors("Solo Author"), ["Solo Author"]);
        assert!(split_pdf_authors("  ").is_empty());
    }

    #[test]
    fn test_unreadable_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("1706.03762.pdf");
        std::fs::write(&path, "this is not a pdf").unwrap();

        let err = PdfMetadataExtractor::new().extract(&path).unwrap_err();
        assert!(matches!(err, ExtractionError::Unreadable(_)));
    }
}
