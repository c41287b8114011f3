//! DOI and arXiv identifiers: parsing, normalization and discovery in
//! free text.

pub mod arxiv;
pub mod doi;
pub mod extract;

pub use arxiv::ArxivId;
pub use doi::Doi;
pub use extract::{FoundIdentifier, find_arxiv_ids, find_dois, find_identifier};

/// Remove the first matching prefix (ASCII case-insensitive).
pub(crate) fn strip_any_prefix<'a>(input: &'a str, prefixes: &[&str]) -> &'a str {
    for prefix in prefixes {
        if input.len() >= prefix.len()
            && input.is_char_boundary(prefix.len())
            && input[..prefix.len()].eq_ignore_ascii_case(prefix)
        {
            return input[prefix.len()..].trim_start();
        }
    }
    input
}
