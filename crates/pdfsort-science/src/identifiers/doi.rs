use serde::{Deserialize, Serialize};

use super::strip_any_prefix;
use crate::error::{Result, ScienceError};

const DOI_PREFIXES: &[&str] = &[
    "https://doi.org/",
    "http://doi.org/",
    "https://dx.doi.org/",
    "http://dx.doi.org/",
    "doi.org/",
    "doi:",
];

/// A DOI, lower-cased. DOIs are case-insensitive, so the normalized form is
/// what goes into the manifest.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Doi {
    pub raw: String,
    pub normalized: String,
}

impl Doi {
    pub fn parse(input: &str) -> Result<Self> {
        let input = input.trim();
        let stripped = strip_any_prefix(input, DOI_PREFIXES)
            // text extraction often glues sentence punctuation to the end
            .trim_end_matches(['.', ',', ';', ':', ')', ']']);

        let valid = stripped.starts_with("10.")
            && stripped
                .split_once('/')
                .is_some_and(|(registrant, suffix)| registrant.len() > 3 && !suffix.is_empty());
        if !valid || stripped.chars().any(char::is_whitespace) {
            return Err(ScienceError::InvalidDoi(input.to_string()));
        }

        Ok(Self {
            raw: input.to_string(),
            normalized: stripped.to_lowercase(),
        })
    }
}

impl From<Doi> for pdfsort_core::Identifier {
    fn from(doi: Doi) -> Self {
        Self::doi(doi.normalized)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_doi() {
        let doi = Doi::parse("10.1000/xyz123").unwrap();
        assert_eq!(doi.normalized, "10.1000/xyz123");
    }

    #[test]
    fn prefixed_forms() {
        for input in [
            "https://doi.org/10.1000/xyz123",
            "http://dx.doi.org/10.1000/xyz123",
            "doi:10.1000/xyz123",
            "DOI: 10.1000/XYZ123",
        ] {
            assert_eq!(Doi::parse(input).unwrap().normalized, "10.1000/xyz123", "{input}");
        }
    }

    #[test]
    fn trailing_punctuation_dropped() {
        assert_eq!(Doi::parse("10.1038/nature14539.").unwrap().normalized, "10.1038/nature14539");
    }

    #[test]
    fn rejects() {
        assert!(Doi::parse("not-a-doi").is_err());
        assert!(Doi::parse("10.1000").is_err());
        assert!(Doi::parse("10.1000/").is_err());
        assert!(Doi::parse("").is_err());
    }
}
