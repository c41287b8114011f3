use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentifierKind {
    Doi,
    Arxiv,
}

impl std::fmt::Display for IdentifierKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            IdentifierKind::Doi => "doi",
            IdentifierKind::Arxiv => "arxiv",
        };
        write!(f, "{s}")
    }
}

/// Publication identifier found for a PDF.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identifier {
    pub kind: IdentifierKind,
    pub value: String,
}

impl Identifier {
    pub fn doi(value: impl Into<String>) -> Self {
        Self {
            kind: IdentifierKind::Doi,
            value: value.into(),
        }
    }

    pub fn arxiv(value: impl Into<String>) -> Self {
        Self {
            kind: IdentifierKind::Arxiv,
            value: value.into(),
        }
    }
}

/// Bibliographic data for one PDF, as produced by a
/// [`MetadataExtractor`](crate::extractor::MetadataExtractor).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BibRecord {
    #[serde(default = "default_entry_type")]
    pub entry_type: String,

    #[serde(default)]
    pub authors: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year: Option<i32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub month: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub day: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub journal: Option<String>,

    pub identifier: Identifier,
}

fn default_entry_type() -> String {
    "article".to_string()
}

impl BibRecord {
    pub fn new(identifier: Identifier) -> Self {
        let entry_type = match identifier.kind {
            IdentifierKind::Doi => "article",
            IdentifierKind::Arxiv => "misc",
        };
        Self {
            entry_type: entry_type.to_string(),
            authors: Vec::new(),
            title: None,
            year: None,
            month: None,
            day: None,
            journal: None,
            identifier,
        }
    }

    /// Last names of the authors, in order.
    pub fn last_names(&self) -> Vec<String> {
        self.authors
            .iter()
            .filter_map(|a| last_name(a))
            .collect()
    }
}

/// Family name of an author: the part before the comma in `Last, First`,
/// otherwise the last whitespace-separated token.
pub fn last_name(author: &str) -> Option<String> {
    let author = author.trim();
    let name = match author.split_once(',') {
        Some((last, _)) => last.trim(),
        None => author.split_whitespace().last().unwrap_or(""),
    };
    if name.is_empty() {
        None
    } else {
        Some(name.to_string())
    }
}
