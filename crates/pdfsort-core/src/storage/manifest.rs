//! The BibTeX manifest.
//!
//! One entry per resolved PDF. Next to the usual bibliographic fields every
//! entry carries `folder`, `filename_old` and `filename_new`; the rename step
//! reads those back after the user had a chance to edit the file by hand.
//!
//! Output is canonical (known fields first, in a fixed order, then any other
//! fields alphabetically), so parsing a written manifest and writing it again
//! yields the same text.

use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use biblatex::{Field, Pair, RawBibliography, RawChunk};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::{PdfSortError, Result};
use crate::models::{BibRecord, IdentifierKind};

pub const FOLDER_FIELD: &str = "folder";
pub const FILENAME_OLD_FIELD: &str = "filename_old";
pub const FILENAME_NEW_FIELD: &str = "filename_new";

const FIELD_ORDER: &[&str] = &[
    "author",
    "title",
    "journal",
    "year",
    "month",
    "day",
    "doi",
    "eprint",
    "archiveprefix",
];

static KEY_UNSAFE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^a-z0-9]").expect("valid regex"));

/// One manifest entry: a resolved PDF and its target name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ManifestEntry {
    pub key: String,
    pub entry_type: String,
    /// Folder relative to the input directory, `/`-separated, `.` for the
    /// directory itself.
    pub folder: String,
    pub filename_old: String,
    /// Empty when the user wants the file moved to `todo/` instead.
    pub filename_new: String,
    /// Bibliographic fields, lower-case names.
    pub fields: BTreeMap<String, String>,
}

impl ManifestEntry {
    pub fn from_record(
        key: impl Into<String>,
        record: &BibRecord,
        folder: impl Into<String>,
        filename_old: impl Into<String>,
        filename_new: impl Into<String>,
    ) -> Self {
        let mut fields = BTreeMap::new();
        if !record.authors.is_empty() {
            fields.insert("author".to_string(), record.authors.join(" and "));
        }
        if let Some(title) = &record.title {
            fields.insert("title".to_string(), title.clone());
        }
        if let Some(journal) = &record.journal {
            fields.insert("journal".to_string(), journal.clone());
        }
        if let Some(year) = record.year {
            fields.insert("year".to_string(), year.to_string());
        }
        if let Some(month) = record.month {
            fields.insert("month".to_string(), month.to_string());
        }
        if let Some(day) = record.day {
            fields.insert("day".to_string(), day.to_string());
        }
        match record.identifier.kind {
            IdentifierKind::Doi => {
                fields.insert("doi".to_string(), record.identifier.value.clone());
            }
            IdentifierKind::Arxiv => {
                fields.insert("eprint".to_string(), record.identifier.value.clone());
                fields.insert("archiveprefix".to_string(), "arXiv".to_string());
            }
        }

        Self {
            key: key.into(),
            entry_type: record.entry_type.to_lowercase(),
            folder: folder.into(),
            filename_old: filename_old.into(),
            filename_new: filename_new.into(),
            fields,
        }
    }

    /// Absolute folder of the entry under `root`.
    pub fn folder_path(&self, root: &Path) -> PathBuf {
        self.folder
            .split('/')
            .filter(|part| !part.is_empty() && *part != ".")
            .fold(root.to_path_buf(), |path, part| path.join(part))
    }

    fn write_to(&self, out: &mut String) {
        out.push_str(&format!("@{}{{{},\n", self.entry_type, self.key));

        let known = FIELD_ORDER
            .iter()
            .filter_map(|name| self.fields.get_key_value(*name));
        let others = self
            .fields
            .iter()
            .filter(|(name, _)| !FIELD_ORDER.contains(&name.as_str()));
        for (name, value) in known.chain(others) {
            push_field(out, name, value);
        }

        push_field(out, FOLDER_FIELD, &self.folder);
        push_field(out, FILENAME_OLD_FIELD, &self.filename_old);
        push_field(out, FILENAME_NEW_FIELD, &self.filename_new);
        out.push_str("}\n");
    }
}

fn push_field(out: &mut String, name: &str, value: &str) {
    out.push_str(&format!("  {name} = {{{}}},\n", escape_bibtex(value)));
}

/// The entry list behind a BibTeX manifest file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Manifest {
    entries: Vec<ManifestEntry>,
}

impl Manifest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a manifest; a missing file is an empty manifest.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::new());
        }
        let contents = fs::read_to_string(path)?;
        Self::parse(&contents)
            .map_err(|e| PdfSortError::Manifest(format!("{}: {e}", path.display())))
    }

    /// Field values are taken verbatim from the source text and only our
    /// own escapes are undone, so file names survive byte for byte.
    pub fn parse(src: &str) -> Result<Self> {
        let raw = RawBibliography::parse(src).map_err(|e| PdfSortError::Manifest(e.to_string()))?;

        let mut keys = HashSet::new();
        let mut entries = Vec::new();
        for entry in raw.entries.iter().map(|spanned| &spanned.v) {
            let key = entry.key.v.to_string();
            if !keys.insert(key.clone()) {
                return Err(PdfSortError::Manifest(format!("duplicate key {key}")));
            }

            let mut fields: BTreeMap<String, String> = entry
                .fields
                .iter()
                .map(|pair| {
                    let value = field_text(&pair.value.v, &raw.abbreviations);
                    (pair.key.v.to_lowercase(), value)
                })
                .collect();

            let folder = fields.remove(FOLDER_FIELD).unwrap_or_default();
            let filename_old = fields.remove(FILENAME_OLD_FIELD).unwrap_or_default();
            let filename_new = fields.remove(FILENAME_NEW_FIELD).unwrap_or_default();

            if filename_old.is_empty() {
                warn!(key = %key, "manifest entry has no {FILENAME_OLD_FIELD} field");
            }

            entries.push(ManifestEntry {
                key,
                entry_type: entry.kind.v.to_lowercase(),
                folder: if folder.is_empty() { ".".to_string() } else { folder },
                filename_old,
                filename_new,
                fields,
            });
        }

        debug!(entries = entries.len(), "parsed manifest");
        Ok(Self { entries })
    }

    pub fn entries(&self) -> &[ManifestEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether a file is already listed.
    pub fn contains(&self, folder: &str, filename_old: &str) -> bool {
        self.entries
            .iter()
            .any(|e| e.folder == folder && e.filename_old == filename_old)
    }

    /// Append an entry for `record`, with a cite key unique in this manifest.
    pub fn add(
        &mut self,
        record: &BibRecord,
        folder: &str,
        filename_old: &str,
        filename_new: &str,
    ) -> &ManifestEntry {
        let taken: HashSet<&str> = self.entries.iter().map(|e| e.key.as_str()).collect();
        let key = unique_key(&generate_cite_key(record), &taken);
        self.entries.push(ManifestEntry::from_record(
            key,
            record,
            folder,
            filename_old,
            filename_new,
        ));
        &self.entries[self.entries.len() - 1]
    }

    pub fn to_bibtex(&self) -> String {
        let mut out = String::new();
        for (i, entry) in self.entries.iter().enumerate() {
            if i > 0 {
                out.push('\n');
            }
            entry.write_to(&mut out);
        }
        out
    }

    /// Write the manifest unless the file already holds the same text.
    /// Returns whether the file was written.
    pub fn save(&self, path: &Path) -> Result<bool> {
        let contents = self.to_bibtex();
        if fs::read_to_string(path).is_ok_and(|existing| existing == contents) {
            debug!(path = %path.display(), "manifest unchanged");
            return Ok(false);
        }
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, contents)?;
        Ok(true)
    }
}

/// `<dir>/<dirname>.bib`
pub fn default_manifest_path(dir: &Path) -> PathBuf {
    let name = dir
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .or_else(|| {
            dir.canonicalize()
                .ok()
                .and_then(|p| p.file_name().map(|n| n.to_string_lossy().to_string()))
        })
        .unwrap_or_else(|| "pdfsort".to_string());
    dir.join(format!("{name}.bib"))
}

/// `folder` relative to `root` in manifest form.
pub fn relative_folder(root: &Path, folder: &Path) -> String {
    let relative = folder.strip_prefix(root).unwrap_or(folder);
    let parts: Vec<String> = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().to_string())
        .collect();
    if parts.is_empty() {
        ".".to_string()
    } else {
        parts.join("/")
    }
}

/// `smith2020study`: first author's last name, year, first title word.
pub fn generate_cite_key(record: &BibRecord) -> String {
    let author = record
        .last_names()
        .first()
        .map(|name| KEY_UNSAFE.replace_all(&name.to_lowercase(), "").to_string())
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| "unknown".to_string());

    let year = record.year.map(|y| y.to_string()).unwrap_or_default();

    let title_word = record
        .title
        .as_deref()
        .and_then(|t| t.split_whitespace().next())
        .map(|w| KEY_UNSAFE.replace_all(&w.to_lowercase(), "").to_string())
        .unwrap_or_default();

    format!("{author}{year}{title_word}")
}

fn unique_key(base: &str, taken: &HashSet<&str>) -> String {
    if !taken.contains(base) {
        return base.to_string();
    }
    ('b'..='z')
        .map(|suffix| format!("{base}{suffix}"))
        .chain((2..).map(|n| format!("{base}{n}")))
        .find(|candidate| !taken.contains(candidate.as_str()))
        .unwrap_or_else(|| base.to_string())
}

/// `month = jan` style values resolve through `@string` definitions and
/// fall back to the bare name.
fn field_text(field: &Field<'_>, abbreviations: &[Pair<'_>]) -> String {
    field
        .iter()
        .map(|chunk| match &chunk.v {
            RawChunk::Normal(text) => unescape_bibtex(text),
            RawChunk::Abbreviation(name) => abbreviations
                .iter()
                .find(|pair| pair.key.v.eq_ignore_ascii_case(name))
                .map(|pair| field_text(&pair.value.v, &[]))
                .unwrap_or_else(|| name.to_string()),
        })
        .collect()
}

const ESCAPED: &[char] = &['\\', '&', '_', '$', '%', '#', '{', '}'];

fn escape_bibtex(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if ESCAPED.contains(&c) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

fn unescape_bibtex(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();
    while let Some(c) = chars.next() {
        match chars.peek() {
            Some(&next) if c == '\\' && ESCAPED.contains(&next) => {
                out.push(next);
                chars.next();
            }
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Identifier;
    use tempfile::TempDir;

    fn record(doi: &str, author: &str, title: &str, year: i32) -> BibRecord {
        let mut r = BibRecord::new(Identifier::doi(doi));
        r.authors = vec![author.to_string(), "Jones, Bob".to_string()];
        r.title = Some(title.to_string());
        r.year = Some(year);
        r.journal = Some("Journal of Things & Stuff".to_string());
        r
    }

    #[test]
    fn test_cite_key() {
        let r = record("10.1/a", "Smith, John", "A Study of X", 2020);
        assert_eq!(generate_cite_key(&r), "smith2020a");

        let r = BibRecord::new(Identifier::arxiv("1706.03762"));
        assert_eq!(generate_cite_key(&r), "unknown");
    }

    #[test]
    fn test_duplicate_keys_get_suffix() {
        let mut manifest = Manifest::new();
        let r = record("10.1/a", "Smith, John", "Study", 2020);
        let keys: Vec<String> = (0..3)
            .map(|i| manifest.add(&r, ".", &format!("{i}.pdf"), "x.pdf").key.clone())
            .collect();
        assert_eq!(keys, ["smith2020study", "smith2020studyb", "smith2020studyc"]);
    }

    #[test]
    fn test_write_and_parse_back() {
        let mut manifest = Manifest::new();
        manifest.add(
            &record("10.1000/xyz_123", "Smith, John", "A Study of X", 2020),
            ".",
            "scan 2020 #1 & notes.pdf",
            "SmithJonesetal_AStudyofX2020.pdf",
        );
        let mut arxiv = BibRecord::new(Identifier::arxiv("1706.03762"));
        arxiv.title = Some("Attention Is All You Need".to_string());
        manifest.add(&arxiv, "sub/deeper", "1706.03762.pdf", "");

        let text = manifest.to_bibtex();
        assert!(text.contains("@article{smith2020a,"));
        assert!(text.contains("  filename_old = {scan 2020 \\#1 \\& notes.pdf},"));
        assert!(text.contains("  archiveprefix = {arXiv},"));

        let parsed = Manifest::parse(&text).unwrap();
        assert_eq!(parsed, manifest);
        assert_eq!(parsed.to_bibtex(), text);
        assert_eq!(parsed.entries()[1].entry_type, "misc");
        assert_eq!(parsed.entries()[1].filename_new, "");
    }

    #[test]
    fn test_hand_edited_fields_survive() {
        let src = "@article{smith2020a,\n  title = {A Study},\n  note = {read this},\n  doi = {10.1/a},\n  folder = {.},\n  filename_old = {a.pdf},\n  filename_new = {Better Name.pdf},\n}\n";
        let manifest = Manifest::parse(src).unwrap();
        let entry = &manifest.entries()[0];
        assert_eq!(entry.filename_new, "Better Name.pdf");
        assert_eq!(entry.fields["note"], "read this");
        assert!(manifest.contains(".", "a.pdf"));
        assert!(!manifest.contains("sub", "a.pdf"));

        let rewritten = manifest.to_bibtex();
        assert!(rewritten.find("doi").unwrap() < rewritten.find("note").unwrap());
    }

    #[test]
    fn test_file_names_survive_byte_for_byte() {
        let names = [
            "paper  v2.pdf",
            " leading.pdf",
            "trailing .pdf",
            "a\\b.pdf",
            "ends in backslash\\",
            "tab\there.pdf",
            "Smith -- Jones --- 2020~draft.pdf",
            "{braced} 50% $x$ #3 & co_1.pdf",
        ];
        let mut manifest = Manifest::new();
        for (i, name) in names.iter().enumerate() {
            let r = record(&format!("10.1/{i}"), "Lee, Ann", "Title", 2019);
            manifest.add(&r, "sub  dir/x\\y", name, &format!("new {name}"));
        }

        let parsed = Manifest::parse(&manifest.to_bibtex()).unwrap();
        for (entry, name) in parsed.entries().iter().zip(names) {
            assert_eq!(entry.filename_old, name);
            assert_eq!(entry.filename_new, format!("new {name}"));
            assert_eq!(entry.folder, "sub  dir/x\\y");
            assert!(parsed.contains("sub  dir/x\\y", name));
        }
        assert_eq!(parsed, manifest);
    }

    #[test]
    fn test_latex_in_title_is_kept() {
        let mut manifest = Manifest::new();
        let r = record("10.1/a", "Lee, Ann", "Decay of $\\alpha$ particles", 2019);
        manifest.add(&r, ".", "a.pdf", "b.pdf");

        let text = manifest.to_bibtex();
        assert!(text.contains("  title = {Decay of \\$\\\\alpha\\$ particles},"));
        let parsed = Manifest::parse(&text).unwrap();
        assert_eq!(parsed.entries()[0].fields["title"], "Decay of $\\alpha$ particles");
    }

    #[test]
    fn test_string_abbreviations_resolve() {
        let src = "@string{ieee = {IEEE Trans.}}\n@article{a,\n  journal = ieee,\n  month = jan,\n  filename_old = {a.pdf},\n}\n";
        let manifest = Manifest::parse(src).unwrap();
        let entry = &manifest.entries()[0];
        assert_eq!(entry.fields["journal"], "IEEE Trans.");
        assert_eq!(entry.fields["month"], "jan");
        assert_eq!(entry.folder, ".");
    }

    #[test]
    fn test_duplicate_keys_rejected() {
        let src = "@misc{a,\n  filename_old = {a.pdf},\n}\n@misc{a,\n  filename_old = {b.pdf},\n}\n";
        assert!(matches!(Manifest::parse(src), Err(PdfSortError::Manifest(_))));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(matches!(
            Manifest::parse("@article{broken,\n  title = {unclosed\n"),
            Err(PdfSortError::Manifest(_))
        ));
    }

    #[test]
    fn test_save_only_when_changed() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("papers.bib");
        let mut manifest = Manifest::new();
        manifest.add(&record("10.1/a", "Lee, Ann", "Title", 2019), ".", "a.pdf", "b.pdf");

        assert!(manifest.save(&path).unwrap());
        assert!(!manifest.save(&path).unwrap());
        assert_eq!(Manifest::load(&path).unwrap(), manifest);
    }

    #[test]
    fn test_load_missing_is_empty() {
        let dir = TempDir::new().unwrap();
        assert!(Manifest::load(&dir.path().join("none.bib")).unwrap().is_empty());
    }

    #[test]
    fn test_paths() {
        let root = Path::new("/data/papers");
        assert_eq!(default_manifest_path(root), root.join("papers.bib"));
        assert_eq!(relative_folder(root, root), ".");
        assert_eq!(relative_folder(root, &root.join("a").join("b")), "a/b");

        let mut manifest = Manifest::new();
        let entry = manifest
            .add(&record("10.1/a", "Lee, Ann", "Title", 2019), "a/b", "x.pdf", "y.pdf")
            .clone();
        assert_eq!(entry.folder_path(&root.join("z")), root.join("z").join("a").join("b"));
    }
}
