use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::strip_any_prefix;
use crate::error::{Result, ScienceError};

// YYMM.NNNN (until 2014) or YYMM.NNNNN, optional version
static NEW_STYLE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{2})(\d{2})\.\d{4,5}$").expect("valid regex"));

// archive[.SUBJECT]/YYMMNNN, optional version
static OLD_STYLE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([a-zA-Z\-]+(?:\.[A-Z]{2})?)/(\d{2})(\d{2})\d{3}$").expect("valid regex")
});

const ARXIV_PREFIXES: &[&str] = &[
    "https://arxiv.org/abs/",
    "http://arxiv.org/abs/",
    "https://arxiv.org/pdf/",
    "http://arxiv.org/pdf/",
    "arxiv:",
];

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ArxivId {
    /// Identifier without version.
    pub id: String,
    pub version: Option<u32>,
    pub category: Option<String>,
    /// Submission year and month, encoded in the identifier itself.
    pub year: i32,
    pub month: u32,
}

impl ArxivId {
    pub fn parse(input: &str) -> Result<Self> {
        let invalid = || ScienceError::InvalidArxivId(input.trim().to_string());

        let stripped = strip_any_prefix(input.trim(), ARXIV_PREFIXES).trim_end_matches(".pdf");
        let (id, version) = split_version(stripped);

        let (category, yy, mm) = if let Some(caps) = NEW_STYLE.captures(id) {
            (None, caps[1].parse::<i32>(), caps[2].parse::<u32>())
        } else if let Some(caps) = OLD_STYLE.captures(id) {
            (
                Some(caps[1].to_string()),
                caps[2].parse::<i32>(),
                caps[3].parse::<u32>(),
            )
        } else {
            return Err(invalid());
        };

        let yy = yy.map_err(|_| invalid())?;
        let month = mm.map_err(|_| invalid())?;
        if !(1..=12).contains(&month) {
            return Err(invalid());
        }
        // old-style identifiers start in 1991
        let year = if yy >= 91 { 1900 + yy } else { 2000 + yy };

        Ok(Self {
            id: id.to_string(),
            version,
            category,
            year,
            month,
        })
    }
}

fn split_version(s: &str) -> (&str, Option<u32>) {
    if let Some(pos) = s.rfind('v') {
        let (id, rest) = s.split_at(pos);
        if let Ok(version) = rest[1..].parse::<u32>()
            && !id.is_empty()
        {
            return (id, Some(version));
        }
    }
    (s, None)
}

impl From<ArxivId> for pdfsort_core::Identifier {
    fn from(arxiv: ArxivId) -> Self {
        Self::arxiv(arxiv.id)
    }
}
