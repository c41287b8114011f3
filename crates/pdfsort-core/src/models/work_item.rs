use std::path::PathBuf;

use serde::Serialize;

use super::record::BibRecord;

/// Processing outcome of one PDF.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    Resolved { record: BibRecord, proposed: String },
    Unresolved { reason: String },
}

/// A source PDF and what the batch step decided about it.
#[derive(Debug, Clone, Serialize)]
pub struct WorkItem {
    pub source: PathBuf,
    pub outcome: Outcome,
}

impl WorkItem {
    pub fn resolved(source: PathBuf, record: BibRecord, proposed: String) -> Self {
        Self {
            source,
            outcome: Outcome::Resolved { record, proposed },
        }
    }

    pub fn unresolved(source: PathBuf, reason: impl Into<String>) -> Self {
        Self {
            source,
            outcome: Outcome::Unresolved {
                reason: reason.into(),
            },
        }
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self.outcome, Outcome::Resolved { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum IssueKind {
    /// The extractor could not produce a record; the file went to `todo/`.
    ExtractionFailure(String),
    /// The file was already listed in an existing manifest.
    Conflict(String),
    /// The rename target already exists; the file was left untouched.
    NameCollision(PathBuf),
    /// A manifest entry points at a file that is neither at its source
    /// nor at its target.
    MissingSource,
    /// The requested filename is empty after sanitizing or contains a path.
    InvalidTarget(String),
    Io(String),
}

/// A non-fatal, per-file problem collected during a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileIssue {
    pub path: PathBuf,
    #[serde(flatten)]
    pub kind: IssueKind,
}

impl FileIssue {
    pub fn new(path: impl Into<PathBuf>, kind: IssueKind) -> Self {
        Self {
            path: path.into(),
            kind,
        }
    }

    /// Collisions and broken manifest entries need the user's attention; the
    /// CLI exits with a dedicated code when any are present. A file skipped
    /// because it is already listed is informational.
    pub fn needs_attention(&self) -> bool {
        matches!(
            self.kind,
            IssueKind::NameCollision(_)
                | IssueKind::MissingSource
                | IssueKind::InvalidTarget(_)
        )
    }
}

impl std::fmt::Display for FileIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let path = self.path.display();
        match &self.kind {
            IssueKind::ExtractionFailure(reason) => write!(f, "{path}: no metadata ({reason})"),
            IssueKind::Conflict(reason) => write!(f, "{path}: skipped ({reason})"),
            IssueKind::NameCollision(target) => {
                write!(f, "{path}: target {} already exists", target.display())
            }
            IssueKind::MissingSource => write!(f, "{path}: file not found"),
            IssueKind::InvalidTarget(name) => write!(f, "{path}: invalid target name {name:?}"),
            IssueKind::Io(err) => write!(f, "{path}: {err}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::record::Identifier;

    #[test]
    fn test_work_item_outcomes() {
        let record = BibRecord::new(Identifier::doi("10.1/x"));
        let done = WorkItem::resolved("a.pdf".into(), record, "A.pdf".to_string());
        let todo = WorkItem::unresolved("b.pdf".into(), "no identifier");
        assert!(done.is_resolved());
        assert!(!todo.is_resolved());
    }

    #[test]
    fn test_issue_attention_and_display() {
        let collision = FileIssue::new("a.pdf", IssueKind::NameCollision("out/A.pdf".into()));
        let failure = FileIssue::new("b.pdf", IssueKind::ExtractionFailure("no identifier".into()));
        assert!(collision.needs_attention());
        assert!(!failure.needs_attention());
        let listed = FileIssue::new("c.pdf", IssueKind::Conflict("already processed".into()));
        assert!(!listed.needs_attention());
        assert_eq!(collision.to_string(), "a.pdf: target out/A.pdf already exists");
    }

    #[test]
    fn test_issue_serializes_flat() {
        let issue = FileIssue::new("a.pdf", IssueKind::Io("denied".into()));
        let json = serde_json::to_value(&issue).unwrap();
        assert_eq!(json["path"], "a.pdf");
        assert_eq!(json["kind"], "io");
        assert_eq!(json["detail"], "denied");
    }
}
