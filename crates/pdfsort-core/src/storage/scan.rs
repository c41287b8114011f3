//! PDF discovery.
//!
//! `scan_pdfs()` lists the PDFs a batch run should look at: files with a
//! `.pdf` extension (any case) directly in the root, or in every subfolder
//! when `recursive` is set. The layout folders (`todo/`, `out/`, `orig/`)
//! are never entered, so files the tool already moved are not picked up
//! again.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{PdfSortError, Result};

/// Options for scanning.
#[derive(Debug, Clone, Default)]
pub struct ScanOptions {
    /// Recursively scan subdirectories.
    pub recursive: bool,
    /// Folder names skipped at any depth.
    pub reserved_dirs: Vec<String>,
}

/// Check if a path looks like a PDF.
pub fn is_pdf(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.to_string_lossy().eq_ignore_ascii_case("pdf"))
        .unwrap_or(false)
}

/// Sorted list of PDFs under `dir`.
pub fn scan_pdfs(dir: &Path, opts: &ScanOptions) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(PdfSortError::DirectoryNotFound(dir.display().to_string()));
    }

    let mut files = Vec::new();
    walk(dir, opts, &mut files)?;
    files.sort();
    debug!(dir = %dir.display(), count = files.len(), "scanned for PDFs");
    Ok(files)
}

fn walk(dir: &Path, opts: &ScanOptions, files: &mut Vec<PathBuf>) -> Result<()> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        let file_type = entry.file_type()?;

        if file_type.is_dir() {
            if !opts.recursive {
                continue;
            }
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if name.starts_with('.') || opts.reserved_dirs.iter().any(|r| *r == name) {
                continue;
            }
            walk(&path, opts, files)?;
        } else if file_type.is_file() && is_pdf(&path) {
            files.push(path);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use tempfile::TempDir;

    fn reserved() -> Vec<String> {
        vec!["todo".into(), "out".into(), "orig".into()]
    }

    #[test]
    fn test_is_pdf() {
        assert!(is_pdf(Path::new("a.pdf")));
        assert!(is_pdf(Path::new("B.PDF")));
        assert!(!is_pdf(Path::new("notes.txt")));
        assert!(!is_pdf(Path::new("pdf")));
    }

    #[test]
    fn test_scan_top_level_only() {
        let dir = TempDir::new().unwrap();
        File::create(dir.path().join("b.pdf")).unwrap();
        File::create(dir.path().join("a.PDF")).unwrap();
        File::create(dir.path().join("readme.txt")).unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();
        File::create(dir.path().join("sub").join("c.pdf")).unwrap();

        let opts = ScanOptions {
            recursive: false,
            reserved_dirs: reserved(),
        };
        let files = scan_pdfs(dir.path(), &opts).unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, ["a.PDF", "b.pdf"]);
    }

    #[test]
    fn test_scan_recursive_skips_reserved() {
        let dir = TempDir::new().unwrap();
        for sub in ["sub", "todo", "out", "orig", ".hidden"] {
            fs::create_dir(dir.path().join(sub)).unwrap();
            File::create(dir.path().join(sub).join("x.pdf")).unwrap();
        }
        fs::create_dir_all(dir.path().join("sub").join("todo")).unwrap();
        File::create(dir.path().join("sub").join("todo").join("y.pdf")).unwrap();

        let opts = ScanOptions {
            recursive: true,
            reserved_dirs: reserved(),
        };
        let files = scan_pdfs(dir.path(), &opts).unwrap();
        assert_eq!(files, vec![dir.path().join("sub").join("x.pdf")]);
    }

    #[test]
    fn test_scan_missing_directory() {
        let result = scan_pdfs(Path::new("/nonexistent/pdfsort/dir"), &ScanOptions::default());
        assert!(matches!(result, Err(PdfSortError::DirectoryNotFound(_))));
    }
}
