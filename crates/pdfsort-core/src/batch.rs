//! Batch step: extract metadata for every PDF in a directory, write the
//! BibTeX manifest and move unresolved files to `todo/`.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::PdfSortConfig;
use crate::error::{PdfSortError, Result};
use crate::extractor::MetadataExtractor;
use crate::models::{FileIssue, IssueKind, WorkItem};
use crate::review::OverrideProposer;
use crate::storage::manifest::{Manifest, default_manifest_path, relative_folder};
use crate::storage::scan::{ScanOptions, scan_pdfs};
use crate::template::Template;

#[derive(Debug, Clone, Default)]
pub struct BatchOptions {
    /// Rebuild the manifest instead of skipping files it already lists.
    pub overwrite: bool,
    pub dry_run: bool,
    pub recursive: bool,
    /// Manifest location; `<dir>/<dirname>.bib` when unset.
    pub manifest_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub items: Vec<WorkItem>,
    pub issues: Vec<FileIssue>,
    pub manifest_path: PathBuf,
    #[serde(skip)]
    pub manifest: Manifest,
    pub manifest_written: bool,
    pub started_at: DateTime<Utc>,
}

impl BatchReport {
    pub fn resolved_count(&self) -> usize {
        self.items.iter().filter(|i| i.is_resolved()).count()
    }

    pub fn unresolved_count(&self) -> usize {
        self.items.len() - self.resolved_count()
    }

    pub fn needs_attention(&self) -> bool {
        self.issues.iter().any(FileIssue::needs_attention)
    }
}

pub fn run_batch(
    dir: &Path,
    template: &Template,
    opts: &BatchOptions,
    config: &PdfSortConfig,
    extractor: &dyn MetadataExtractor,
    proposer: &dyn OverrideProposer,
) -> Result<BatchReport> {
    let started_at = Utc::now();
    if !dir.is_dir() {
        return Err(PdfSortError::DirectoryNotFound(dir.display().to_string()));
    }

    let manifest_path = opts
        .manifest_path
        .clone()
        .unwrap_or_else(|| default_manifest_path(dir));
    let mut manifest = if opts.overwrite {
        Manifest::new()
    } else {
        Manifest::load(&manifest_path)?
    };

    let layout = &config.layout;
    let scan_opts = ScanOptions {
        recursive: opts.recursive,
        reserved_dirs: layout.reserved_dirs().iter().map(|d| d.to_string()).collect(),
    };
    let files = scan_pdfs(dir, &scan_opts)?;
    info!(dir = %dir.display(), files = files.len(), "starting batch");

    let mut items = Vec::new();
    let mut issues = Vec::new();

    for path in files {
        let parent = path.parent().unwrap_or(dir);
        let folder = relative_folder(dir, parent);
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();

        if manifest.contains(&folder, &filename) {
            debug!(file = %path.display(), "already in manifest");
            issues.push(FileIssue::new(
                &path,
                IssueKind::Conflict("already processed".to_string()),
            ));
            continue;
        }

        match extractor.extract(&path) {
            Ok(record) => {
                let rendered = template.render(&record, config.render_options());
                if !rendered.missing.is_empty() {
                    let tags: Vec<String> = rendered.missing.iter().map(|p| p.to_string()).collect();
                    debug!(file = %path.display(), missing = %tags.join(" "), "tags without data");
                }
                let extension = path
                    .extension()
                    .map(|e| e.to_string_lossy().to_string())
                    .unwrap_or_default();
                let proposed = rendered.filename(&extension);
                let chosen = proposer
                    .propose_override(&record, &proposed)
                    .unwrap_or(proposed);

                info!(file = %filename, new = %chosen, "resolved");
                manifest.add(&record, &folder, &filename, &chosen);
                items.push(WorkItem::resolved(path, record, chosen));
            }
            Err(e) => {
                warn!(file = %path.display(), "unresolved: {e}");
                issues.push(FileIssue::new(
                    &path,
                    IssueKind::ExtractionFailure(e.to_string()),
                ));
                let moved = todo_target(&path, parent, &layout.todo_dir).and_then(|target| {
                    if opts.dry_run {
                        debug!(file = %path.display(), to = %target.display(), "would move to todo");
                        Ok(())
                    } else {
                        move_into(&path, &target)
                    }
                });
                if let Err(issue) = moved {
                    warn!("{issue}");
                    issues.push(issue);
                }
                items.push(WorkItem::unresolved(path, e.to_string()));
            }
        }
    }

    let mut manifest_written = false;
    if !opts.dry_run {
        fs::create_dir_all(dir.join(&layout.todo_dir))?;
        manifest_written = manifest.save(&manifest_path)?;
        if manifest_written {
            info!(path = %manifest_path.display(), entries = manifest.len(), "wrote manifest");
        }
    }

    Ok(BatchReport {
        items,
        issues,
        manifest_path,
        manifest,
        manifest_written,
        started_at,
    })
}

/// Where `path` lands in `<folder>/<todo_dir>/`; an occupied target is a
/// collision, existing files are never replaced.
fn todo_target(
    path: &Path,
    folder: &Path,
    todo_dir: &str,
) -> std::result::Result<PathBuf, FileIssue> {
    let target = match path.file_name() {
        Some(name) => folder.join(todo_dir).join(name),
        None => return Err(FileIssue::new(path, IssueKind::Io("not a file".to_string()))),
    };
    if target.exists() {
        return Err(FileIssue::new(path, IssueKind::NameCollision(target)));
    }
    Ok(target)
}

fn move_into(path: &Path, target: &Path) -> std::result::Result<(), FileIssue> {
    let parent = target.parent().unwrap_or(target);
    fs::create_dir_all(parent)
        .and_then(|_| fs::rename(path, target))
        .map_err(|e| FileIssue::new(path, IssueKind::Io(e.to_string())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractor::ExtractionError;
    use crate::models::{BibRecord, Identifier, Outcome};
    use crate::review::KeepProposed;
    use std::collections::HashMap;
    use std::fs::File;
    use tempfile::TempDir;

    struct FakeExtractor(HashMap<String, BibRecord>);

    impl MetadataExtractor for FakeExtractor {
        fn extract(&self, pdf_path: &Path) -> std::result::Result<BibRecord, ExtractionError> {
            let name = pdf_path.file_name().unwrap().to_string_lossy().to_string();
            self.0.get(&name).cloned().ok_or(ExtractionError::NoIdentifier)
        }
    }

    struct Rename(&'static str);

    impl OverrideProposer for Rename {
        fn propose_override(&self, _record: &BibRecord, _proposed: &str) -> Option<String> {
            Some(self.0.to_string())
        }
    }

    fn study() -> BibRecord {
        let mut r = BibRecord::new(Identifier::doi("10.1000/xyz123"));
        r.authors = vec!["Smith".into(), "Jones".into(), "Lee".into()];
        r.title = Some("A Study of X".into());
        r.year = Some(2020);
        r
    }

    fn extractor() -> FakeExtractor {
        FakeExtractor(HashMap::from([("a.PDF".to_string(), study())]))
    }

    fn setup() -> TempDir {
        let dir = TempDir::new().unwrap();
        File::create(dir.path().join("a.PDF")).unwrap();
        File::create(dir.path().join("b.pdf")).unwrap();
        File::create(dir.path().join("notes.txt")).unwrap();
        dir
    }

    fn run(dir: &Path, opts: &BatchOptions) -> BatchReport {
        let template = Template::parse("{A3etal}_{T}{YYYY}").unwrap();
        run_batch(
            dir,
            &template,
            opts,
            &PdfSortConfig::default(),
            &extractor(),
            &KeepProposed,
        )
        .unwrap()
    }

    #[test]
    fn test_partitions_every_pdf() {
        let dir = setup();
        let report = run(dir.path(), &BatchOptions::default());

        assert_eq!(report.items.len(), 2);
        assert_eq!(report.resolved_count(), 1);
        assert_eq!(report.unresolved_count(), 1);

        assert!(dir.path().join("a.PDF").exists());
        assert!(!dir.path().join("b.pdf").exists());
        assert!(dir.path().join("todo").join("b.pdf").exists());
        assert!(dir.path().join("notes.txt").exists());

        let entry = &report.manifest.entries()[0];
        assert_eq!(entry.folder, ".");
        assert_eq!(entry.filename_old, "a.PDF");
        assert_eq!(entry.filename_new, "SmithJonesLeeetal_AStudyofX2020.pdf");

        assert!(report.manifest_written);
        assert_eq!(report.manifest_path, default_manifest_path(dir.path()));
        assert_eq!(Manifest::load(&report.manifest_path).unwrap(), report.manifest);
    }

    #[test]
    fn test_rerun_skips_listed_files() {
        let dir = setup();
        run(dir.path(), &BatchOptions::default());
        let again = run(dir.path(), &BatchOptions::default());

        assert!(again.items.is_empty());
        assert_eq!(again.issues.len(), 1);
        assert!(matches!(again.issues[0].kind, IssueKind::Conflict(_)));
        assert!(!again.needs_attention());
        assert!(!again.manifest_written);
        assert_eq!(again.manifest.len(), 1);
    }

    #[test]
    fn test_overwrite_rebuilds_manifest() {
        let dir = setup();
        run(dir.path(), &BatchOptions::default());
        let opts = BatchOptions {
            overwrite: true,
            ..Default::default()
        };
        let again = run(dir.path(), &opts);

        assert_eq!(again.resolved_count(), 1);
        assert!(again.issues.is_empty());
        assert_eq!(again.manifest.len(), 1);
    }

    #[test]
    fn test_dry_run_leaves_directory_alone() {
        let dir = setup();
        let opts = BatchOptions {
            dry_run: true,
            ..Default::default()
        };
        let report = run(dir.path(), &opts);

        assert_eq!(report.items.len(), 2);
        assert_eq!(report.manifest.len(), 1);
        assert!(!report.manifest_written);
        assert!(dir.path().join("b.pdf").exists());
        assert!(!dir.path().join("todo").exists());
        assert!(!report.manifest_path.exists());
    }

    #[test]
    fn test_recursive_records_folder() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("sub")).unwrap();
        File::create(dir.path().join("sub").join("a.PDF")).unwrap();
        File::create(dir.path().join("sub").join("c.pdf")).unwrap();

        let flat = run(
            dir.path(),
            &BatchOptions {
                dry_run: true,
                ..Default::default()
            },
        );
        assert!(flat.items.is_empty());

        let report = run(
            dir.path(),
            &BatchOptions {
                recursive: true,
                ..Default::default()
            },
        );
        assert_eq!(report.manifest.entries()[0].folder, "sub");
        assert!(dir.path().join("sub").join("todo").join("c.pdf").exists());
    }

    #[test]
    fn test_override_and_custom_manifest_path() {
        let dir = setup();
        let bib = dir.path().join("elsewhere").join("lib.bib");
        let opts = BatchOptions {
            manifest_path: Some(bib.clone()),
            ..Default::default()
        };
        let template = Template::parse("{T}").unwrap();
        let report = run_batch(
            dir.path(),
            &template,
            &opts,
            &PdfSortConfig::default(),
            &extractor(),
            &Rename("Custom.pdf"),
        )
        .unwrap();

        assert!(bib.exists());
        assert_eq!(report.manifest.entries()[0].filename_new, "Custom.pdf");
        match &report.items[0].outcome {
            Outcome::Resolved { proposed, .. } => assert_eq!(proposed, "Custom.pdf"),
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    fn test_todo_collision_keeps_file() {
        let dir = setup();
        fs::create_dir(dir.path().join("todo")).unwrap();
        fs::write(dir.path().join("todo").join("b.pdf"), "older").unwrap();

        let report = run(dir.path(), &BatchOptions::default());
        assert!(dir.path().join("b.pdf").exists());
        assert_eq!(
            fs::read_to_string(dir.path().join("todo").join("b.pdf")).unwrap(),
            "older"
        );
        assert!(report
            .issues
            .iter()
            .any(|i| matches!(i.kind, IssueKind::NameCollision(_))));
    }

    #[test]
    fn test_dry_run_reports_the_same_issues() {
        let dir = setup();
        fs::create_dir(dir.path().join("todo")).unwrap();
        fs::write(dir.path().join("todo").join("b.pdf"), "older").unwrap();

        let dry = run(
            dir.path(),
            &BatchOptions {
                dry_run: true,
                ..Default::default()
            },
        );
        let real = run(dir.path(), &BatchOptions::default());

        assert_eq!(dry.issues.len(), 2);
        assert_eq!(dry.issues, real.issues);
        assert_eq!(dry.manifest, real.manifest);
    }

    #[test]
    fn test_missing_directory_is_fatal() {
        let template = Template::parse("{T}").unwrap();
        let result = run_batch(
            Path::new("/nonexistent/pdfsort"),
            &template,
            &BatchOptions::default(),
            &PdfSortConfig::default(),
            &extractor(),
            &KeepProposed,
        );
        assert!(matches!(result, Err(PdfSortError::DirectoryNotFound(_))));
    }
}
