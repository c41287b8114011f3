//! Filename templates.
//!
//! A template is literal text mixed with `{TAG}` placeholders, for example
//! `{YYYY} - {A3etal} - {T}`. Parsing is the only fallible step; rendering
//! always produces a filename, substituting the configured missing token for
//! tags the record has no data for.
//!
//! | Tag | Value |
//! |-----|-------|
//! | `{YYYY}` / `{YY}` | four / two digit year |
//! | `{MM}` / `{DD}` | two digit month / day |
//! | `{T}` | title, first `max_words_title` words |
//! | `{Aall}` | last names of all authors |
//! | `{A<n>etal}` | first `n` last names (1-9), then `etal` if the list was capped at `n` |
//! | `{Aetal}` | same as `{A1etal}` |
//! | `{J}` | journal |
//! | `{Jabbr}` | journal abbreviation, falling back to the journal |

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::config::NamingConfig;
use crate::error::{PdfSortError, Result};
use crate::models::BibRecord;

static MULTIPLE_SPACES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid regex"));

/// Characters removed from literal template text and the missing token.
const LITERAL_UNSAFE: &[char] = &[
    '<', '>', ':', '"', '/', '\\', '|', '?', '*', '{', '}', '%', '~', '$', '&', '#', '^',
];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaseStyle {
    /// Words concatenated as they are.
    #[default]
    None,
    /// `LoremIpsumDolor`
    Camel,
    /// `Lorem_ipsum_dolor`
    Snake,
    /// `Lorem-ipsum-dolor`
    Kebab,
}

impl FromStr for CaseStyle {
    type Err = PdfSortError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "none" => Ok(Self::None),
            "camel" => Ok(Self::Camel),
            "snake" => Ok(Self::Snake),
            "kebab" => Ok(Self::Kebab),
            other => Err(PdfSortError::ConfigError(format!(
                "unknown case style {other:?} (expected none, camel, snake or kebab)"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Placeholder {
    Year4,
    Year2,
    Month,
    Day,
    Title,
    AllAuthors,
    AuthorsEtAl(usize),
    Journal,
    JournalAbbr,
}

impl Placeholder {
    fn from_tag(tag: &str) -> Option<Self> {
        let placeholder = match tag {
            "YYYY" => Self::Year4,
            "YY" => Self::Year2,
            "MM" => Self::Month,
            "DD" => Self::Day,
            "T" => Self::Title,
            "Aall" => Self::AllAuthors,
            "Aetal" => Self::AuthorsEtAl(1),
            "J" => Self::Journal,
            "Jabbr" => Self::JournalAbbr,
            _ => {
                let count = tag.strip_prefix('A')?.strip_suffix("etal")?;
                let n: usize = count.parse().ok()?;
                if !(1..=9).contains(&n) {
                    return None;
                }
                Self::AuthorsEtAl(n)
            }
        };
        Some(placeholder)
    }
}

impl fmt::Display for Placeholder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Year4 => write!(f, "{{YYYY}}"),
            Self::Year2 => write!(f, "{{YY}}"),
            Self::Month => write!(f, "{{MM}}"),
            Self::Day => write!(f, "{{DD}}"),
            Self::Title => write!(f, "{{T}}"),
            Self::AllAuthors => write!(f, "{{Aall}}"),
            Self::AuthorsEtAl(n) => write!(f, "{{A{n}etal}}"),
            Self::Journal => write!(f, "{{J}}"),
            Self::JournalAbbr => write!(f, "{{Jabbr}}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Tag(Placeholder),
}

/// A parsed filename template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    source: String,
    segments: Vec<Segment>,
}

/// Naming settings plus the journal abbreviation table.
#[derive(Debug, Clone, Copy)]
pub struct RenderOptions<'a> {
    pub naming: &'a NamingConfig,
    pub abbreviations: &'a BTreeMap<String, String>,
}

/// A rendered filename stem and the tags that fell back to the missing token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rendered {
    pub stem: String,
    pub missing: Vec<Placeholder>,
}

impl Rendered {
    /// Full filename; `extension` is appended lower-cased, with or without
    /// its leading dot.
    pub fn filename(&self, extension: &str) -> String {
        let ext = extension.trim_start_matches('.').to_lowercase();
        if ext.is_empty() {
            self.stem.clone()
        } else {
            format!("{}.{ext}", self.stem)
        }
    }
}

impl Template {
    pub fn parse(source: &str) -> Result<Self> {
        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut chars = source.chars().enumerate();

        while let Some((position, c)) = chars.next() {
            match c {
                '{' => {
                    let mut tag = String::new();
                    loop {
                        match chars.next() {
                            Some((_, '}')) => break,
                            Some((inner, '{')) => {
                                return Err(PdfSortError::invalid_template("nested '{'", inner));
                            }
                            Some((_, c)) => tag.push(c),
                            None => {
                                return Err(PdfSortError::invalid_template(
                                    "unclosed '{'",
                                    position,
                                ));
                            }
                        }
                    }
                    let placeholder = Placeholder::from_tag(&tag).ok_or_else(|| {
                        PdfSortError::invalid_template(format!("unknown tag {{{tag}}}"), position)
                    })?;
                    if !literal.is_empty() {
                        segments.push(Segment::Literal(std::mem::take(&mut literal)));
                    }
                    segments.push(Segment::Tag(placeholder));
                }
                '}' => return Err(PdfSortError::invalid_template("unmatched '}'", position)),
                c => literal.push(c),
            }
        }
        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }

        if !segments.iter().any(|s| matches!(s, Segment::Tag(_))) {
            return Err(PdfSortError::invalid_template("template contains no tags", 0));
        }

        Ok(Self {
            source: source.to_string(),
            segments,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn placeholders(&self) -> impl Iterator<Item = Placeholder> + '_ {
        self.segments.iter().filter_map(|s| match s {
            Segment::Tag(p) => Some(*p),
            Segment::Literal(_) => None,
        })
    }

    pub fn render(&self, record: &BibRecord, opts: RenderOptions<'_>) -> Rendered {
        let naming = opts.naming;
        let missing_token = sanitize_literal(&naming.missing_token);
        let mut stem = String::new();
        let mut missing = Vec::new();

        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => stem.push_str(&sanitize_literal(text)),
                Segment::Tag(placeholder) => match tag_value(record, *placeholder, opts) {
                    Some(value) if !value.is_empty() => stem.push_str(&value),
                    _ => {
                        missing.push(*placeholder);
                        stem.push_str(&missing_token);
                    }
                },
            }
        }

        let stem = MULTIPLE_SPACES.replace_all(stem.trim(), " ");
        let stem = truncate_chars(&stem, naming.max_length_filename);
        let mut stem = stem
            .trim_end_matches([' ', '_', '-', '.'])
            .trim_start_matches('.')
            .to_string();
        if stem.is_empty() {
            stem = if missing_token.is_empty() {
                "NA".to_string()
            } else {
                missing_token
            };
        }

        Rendered { stem, missing }
    }
}

impl FromStr for Template {
    type Err = PdfSortError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for Template {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

fn tag_value(record: &BibRecord, placeholder: Placeholder, opts: RenderOptions<'_>) -> Option<String> {
    let naming = opts.naming;
    match placeholder {
        Placeholder::Year4 => record.year.map(|y| format!("{y:04}")),
        Placeholder::Year2 => record.year.map(|y| format!("{:02}", y.rem_euclid(100))),
        Placeholder::Month => record.month.filter(|m| (1..=12).contains(m)).map(|m| format!("{m:02}")),
        Placeholder::Day => record.day.filter(|d| (1..=31).contains(d)).map(|d| format!("{d:02}")),
        Placeholder::Title => {
            let words: Vec<String> = record
                .title
                .as_deref()?
                .split_whitespace()
                .map(clean_word)
                .filter(|w| !w.is_empty())
                .take(naming.max_words_title)
                .collect();
            Some(apply_case(&words, naming.case))
        }
        Placeholder::AllAuthors => {
            let names = author_words(record);
            (!names.is_empty()).then(|| authors_string(&names, naming))
        }
        Placeholder::AuthorsEtAl(n) => {
            let names = author_words(record);
            if names.is_empty() {
                return None;
            }
            let total = names.len();
            let mut words: Vec<String> = names.into_iter().take(n).collect();
            if total >= n && total > 1 {
                words.push("etal".to_string());
            }
            Some(authors_string(&words, naming))
        }
        Placeholder::Journal => journal_value(record.journal.as_deref()?, naming.case),
        Placeholder::JournalAbbr => {
            let journal = record.journal.as_deref()?;
            let abbreviated = lookup_abbreviation(opts.abbreviations, journal).unwrap_or(journal);
            journal_value(abbreviated, naming.case)
        }
    }
}

/// One cleaned word per author, taken from the last name.
fn author_words(record: &BibRecord) -> Vec<String> {
    record
        .last_names()
        .iter()
        .map(|name| name.split_whitespace().map(clean_word).collect::<String>())
        .filter(|w| !w.is_empty())
        .collect()
}

fn authors_string(words: &[String], naming: &NamingConfig) -> String {
    let joined = apply_case(words, naming.case);
    truncate_chars(&joined, naming.max_length_authors)
        .trim_end_matches(['_', '-'])
        .to_string()
}

fn journal_value(journal: &str, case: CaseStyle) -> Option<String> {
    let words: Vec<String> = journal
        .split_whitespace()
        .map(clean_word)
        .filter(|w| !w.is_empty())
        .collect();
    (!words.is_empty()).then(|| apply_case(&words, case))
}

fn lookup_abbreviation<'a>(table: &'a BTreeMap<String, String>, journal: &str) -> Option<&'a str> {
    if let Some(abbr) = table.get(journal) {
        return Some(abbr);
    }
    table
        .iter()
        .find(|(full, _)| full.eq_ignore_ascii_case(journal))
        .map(|(_, abbr)| abbr.as_str())
}

/// Keep alphanumerics and inner hyphens.
fn clean_word(word: &str) -> String {
    word.chars()
        .filter(|c| c.is_alphanumeric() || *c == '-')
        .collect::<String>()
        .trim_matches('-')
        .to_string()
}

fn apply_case(words: &[String], case: CaseStyle) -> String {
    match case {
        CaseStyle::None => words.concat(),
        CaseStyle::Camel => words.iter().map(|w| capitalize(w)).collect(),
        CaseStyle::Snake => separated(words, "_"),
        CaseStyle::Kebab => separated(words, "-"),
    }
}

fn separated(words: &[String], separator: &str) -> String {
    words
        .iter()
        .enumerate()
        .map(|(i, w)| if i == 0 { w.clone() } else { w.to_lowercase() })
        .collect::<Vec<_>>()
        .join(separator)
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Remove path- and BibTeX-unsafe characters from free text.
pub fn sanitize_literal(text: &str) -> String {
    text.chars()
        .filter(|c| !c.is_control() && !LITERAL_UNSAFE.contains(c))
        .collect()
}

/// Sanitize a filename typed by a person (review step): unsafe characters
/// removed, surrounding whitespace and dots trimmed.
pub fn sanitize_filename(name: &str) -> String {
    let cleaned = sanitize_literal(name);
    let collapsed = MULTIPLE_SPACES.replace_all(cleaned.trim(), " ");
    collapsed.trim_matches('.').trim().to_string()
}

fn truncate_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}
