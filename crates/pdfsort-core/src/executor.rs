//! Rename step: apply the (possibly hand-edited) manifest.
//!
//! `plan()` decides what happens to every entry without touching the disk;
//! `execute()` applies exactly that plan. Existing files are never
//! overwritten.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{info, warn};

use crate::config::LayoutConfig;
use crate::error::{PdfSortError, Result};
use crate::models::{FileIssue, IssueKind};
use crate::storage::manifest::{Manifest, ManifestEntry};

#[derive(Debug, Clone, Copy, Default)]
pub struct RenameOptions {
    pub dry_run: bool,
    /// On a name collision pick `name (2).pdf`, `name (3).pdf`, … instead
    /// of leaving the file in place.
    pub force_rename: bool,
    pub keep_originals: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum PlannedAction {
    Rename { from: PathBuf, to: PathBuf },
    ToTodo { from: PathBuf, to: PathBuf },
    AlreadyDone { path: PathBuf },
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RenamePlan {
    pub actions: Vec<PlannedAction>,
    pub issues: Vec<FileIssue>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RenameReport {
    pub dry_run: bool,
    /// Actions applied, or the planned ones on a dry run.
    pub actions: Vec<PlannedAction>,
    pub issues: Vec<FileIssue>,
}

impl RenameReport {
    pub fn count(&self, pred: impl Fn(&PlannedAction) -> bool) -> usize {
        self.actions.iter().filter(|a| pred(a)).count()
    }

    pub fn renamed(&self) -> usize {
        self.count(|a| matches!(a, PlannedAction::Rename { .. }))
    }

    pub fn to_todo(&self) -> usize {
        self.count(|a| matches!(a, PlannedAction::ToTodo { .. }))
    }

    pub fn already_done(&self) -> usize {
        self.count(|a| matches!(a, PlannedAction::AlreadyDone { .. }))
    }

    pub fn needs_attention(&self) -> bool {
        self.issues.iter().any(FileIssue::needs_attention)
    }
}

pub fn plan(
    dir: &Path,
    manifest: &Manifest,
    opts: &RenameOptions,
    layout: &LayoutConfig,
) -> Result<RenamePlan> {
    if !dir.is_dir() {
        return Err(PdfSortError::DirectoryNotFound(dir.display().to_string()));
    }

    let mut plan = RenamePlan::default();
    let mut claimed: HashSet<PathBuf> = HashSet::new();

    for entry in manifest.entries() {
        if entry.filename_old.is_empty() {
            warn!(key = %entry.key, "skipping manifest entry without old filename");
            continue;
        }
        match plan_entry(dir, entry, opts, layout, &claimed) {
            Ok(action) => {
                if let PlannedAction::Rename { to, .. } | PlannedAction::ToTodo { to, .. } = &action {
                    claimed.insert(to.clone());
                }
                plan.actions.push(action);
            }
            Err(issue) => plan.issues.push(issue),
        }
    }

    Ok(plan)
}

fn plan_entry(
    dir: &Path,
    entry: &ManifestEntry,
    opts: &RenameOptions,
    layout: &LayoutConfig,
    claimed: &HashSet<PathBuf>,
) -> std::result::Result<PlannedAction, FileIssue> {
    let folder = entry.folder_path(dir);
    let source = folder.join(&entry.filename_old);
    let new_name = entry.filename_new.trim();

    let to_todo = new_name.is_empty();
    let target = if to_todo {
        folder.join(&layout.todo_dir).join(&entry.filename_old)
    } else {
        if !is_plain_filename(new_name) {
            return Err(FileIssue::new(
                &source,
                IssueKind::InvalidTarget(new_name.to_string()),
            ));
        }
        folder.join(&layout.output_dir).join(new_name)
    };

    if !source.exists() {
        return if target.exists() {
            Ok(PlannedAction::AlreadyDone { path: target })
        } else {
            Err(FileIssue::new(&source, IssueKind::MissingSource))
        };
    }

    let taken = |path: &Path| path.exists() || claimed.contains(path);
    let target = if taken(target.as_path()) {
        let free = if opts.force_rename {
            numbered_alternatives(&target).find(|candidate| !taken(candidate.as_path()))
        } else {
            None
        };
        match free {
            Some(free) => free,
            None => return Err(FileIssue::new(&source, IssueKind::NameCollision(target))),
        }
    } else {
        target
    };

    Ok(if to_todo {
        PlannedAction::ToTodo {
            from: source,
            to: target,
        }
    } else {
        PlannedAction::Rename {
            from: source,
            to: target,
        }
    })
}

/// `name (2).pdf`, `name (3).pdf`, …
fn numbered_alternatives(target: &Path) -> impl Iterator<Item = PathBuf> + '_ {
    let stem = target
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    let extension = target
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();
    (2..10_000).map(move |n| target.with_file_name(format!("{stem} ({n}){extension}")))
}

fn is_plain_filename(name: &str) -> bool {
    name != "."
        && name != ".."
        && !name.contains(['/', '\\'])
        && !name.chars().any(char::is_control)
}

pub fn execute(
    dir: &Path,
    manifest: &Manifest,
    opts: &RenameOptions,
    layout: &LayoutConfig,
) -> Result<RenameReport> {
    let RenamePlan { actions, mut issues } = plan(dir, manifest, opts, layout)?;
    if opts.dry_run {
        return Ok(RenameReport {
            dry_run: true,
            actions,
            issues,
        });
    }

    let mut applied = Vec::with_capacity(actions.len());
    for action in actions {
        let result = match &action {
            PlannedAction::Rename { from, to } => {
                let keep = opts.keep_originals.then_some(layout.originals_dir.as_str());
                move_file(from, to, keep)
            }
            PlannedAction::ToTodo { from, to } => move_file(from, to, None),
            PlannedAction::AlreadyDone { .. } => Ok(()),
        };
        match result {
            Ok(()) => {
                if let PlannedAction::Rename { from, to } | PlannedAction::ToTodo { from, to } =
                    &action
                {
                    info!(from = %from.display(), to = %to.display(), "moved");
                }
                applied.push(action);
            }
            Err(issue) => {
                warn!("{issue}");
                issues.push(issue);
            }
        }
    }

    Ok(RenameReport {
        dry_run: false,
        actions: applied,
        issues,
    })
}

fn move_file(from: &Path, to: &Path, originals_dir: Option<&str>) -> std::result::Result<(), FileIssue> {
    if to.exists() {
        return Err(FileIssue::new(from, IssueKind::NameCollision(to.to_path_buf())));
    }
    let io = |e: std::io::Error| FileIssue::new(from, IssueKind::Io(e.to_string()));

    if let Some(originals) = originals_dir
        && let (Some(folder), Some(name)) = (from.parent(), from.file_name())
    {
        let backup_dir = folder.join(originals);
        let backup = backup_dir.join(name);
        if !backup.exists() {
            fs::create_dir_all(&backup_dir).map_err(io)?;
            fs::copy(from, &backup).map_err(io)?;
        }
    }

    if let Some(parent) = to.parent() {
        fs::create_dir_all(parent).map_err(io)?;
    }
    fs::rename(from, to).map_err(io)
}
