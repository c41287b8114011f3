use once_cell::sync::Lazy;
use regex::Regex;

use crate::identifiers::{arxiv::ArxivId, doi::Doi};

static DOI_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)10\.\d{4,9}/[-._;()/:A-Z0-9]+[A-Z0-9/]").expect("valid regex")
});

static ARXIV_PREFIXED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)arxiv:\s?(\d{4}\.\d{4,5}(?:v\d+)?|[a-z\-]+(?:\.[A-Z]{2})?/\d{7}(?:v\d+)?)")
        .expect("valid regex")
});

static ARXIV_BARE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:^|[^\d.])(\d{4}\.\d{4,5}(?:v\d+)?)(?:$|[^\d])").expect("valid regex")
});

/// Identifier picked for a PDF.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FoundIdentifier {
    Doi(Doi),
    Arxiv(ArxivId),
}

/// DOIs in document order, without duplicates.
pub fn find_dois(text: &str) -> Vec<Doi> {
    let mut dois: Vec<Doi> = Vec::new();
    for doi in DOI_REGEX.find_iter(text).filter_map(|m| Doi::parse(m.as_str()).ok()) {
        if !dois.iter().any(|d| d.normalized == doi.normalized) {
            dois.push(doi);
        }
    }
    dois
}

/// `arXiv:`-prefixed identifiers in document order, without duplicates.
pub fn find_arxiv_ids(text: &str) -> Vec<ArxivId> {
    let mut ids: Vec<ArxivId> = Vec::new();
    for caps in ARXIV_PREFIXED.captures_iter(text) {
        if let Ok(id) = ArxivId::parse(&caps[1])
            && !ids.iter().any(|i| i.id == id.id)
        {
            ids.push(id);
        }
    }
    ids
}

/// First DOI in `text`, else first prefixed arXiv identifier in `text`,
/// else a bare arXiv identifier in the file name (`1706.03762v5.pdf`).
pub fn find_identifier(text: &str, file_stem: &str) -> Option<FoundIdentifier> {
    if let Some(doi) = find_dois(text).into_iter().next() {
        return Some(FoundIdentifier::Doi(doi));
    }
    if let Some(id) = find_arxiv_ids(text).into_iter().next() {
        return Some(FoundIdentifier::Arxiv(id));
    }
    if let Some(id) = find_arxiv_ids(file_stem).into_iter().next() {
        return Some(FoundIdentifier::Arxiv(id));
    }
    ARXIV_BARE
        .captures_iter(file_stem)
        .find_map(|caps| ArxivId::parse(&caps[1]).ok())
        .map(FoundIdentifier::Arxiv)
}
