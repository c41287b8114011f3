use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use tracing::info;
use tracing_subscriber::EnvFilter;

use pdfsort_core::executor::{self, RenameReport};
use pdfsort_core::{
    BatchOptions, BatchReport, CaseStyle, ExitCode, IssueKind, KeepProposed, Manifest,
    OverrideProposer, PdfSortConfig, PdfSortError, PlannedAction, RenameOptions, Template,
    TerminalReviewer, default_manifest_path, run_batch,
};
use pdfsort_science::PdfMetadataExtractor;

// ─── CLI Definition ─────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(
    name = "pdfsort",
    about = "Rename academic PDFs from their bibliographic metadata",
    version,
    long_about = None
)]
struct Cli {
    /// Directory containing the PDFs.
    #[arg(required_unless_present = "add_abbreviation_file")]
    directory: Option<PathBuf>,

    /// Filename template, e.g. "{YYYY} - {A3etal} - {T}".
    #[arg(short = 'f', long = "format")]
    format: Option<String>,

    /// Show what would happen without touching any file.
    #[arg(long = "dry_run")]
    dry_run: bool,

    /// Rebuild the BibTeX file instead of skipping files it already lists.
    #[arg(long)]
    overwrite: bool,

    /// On a name collision append " (2)", " (3)", … instead of skipping.
    #[arg(long = "force_rename")]
    force_rename: bool,

    #[arg(long, value_enum, default_value_t = Step::Bib)]
    step: Step,

    /// Confirm or edit every proposed filename on the terminal.
    #[arg(long)]
    review: bool,

    /// BibTeX file to write / read (default: <DIRECTORY>/<dirname>.bib).
    #[arg(long = "bibtex_file")]
    bibtex_file: Option<PathBuf>,

    /// Also process PDFs in subfolders.
    #[arg(long = "sub_folders", visible_alias = "sf")]
    sub_folders: bool,

    /// Copy every PDF into the originals folder before renaming it.
    #[arg(long = "keep_originals")]
    keep_originals: bool,

    /// Word casing inside tag values: none, camel, snake or kebab.
    #[arg(long)]
    case: Option<CaseStyle>,

    #[arg(long = "max_length_authors")]
    max_length_authors: Option<usize>,

    #[arg(long = "max_length_filename")]
    max_length_filename: Option<usize>,

    #[arg(long = "max_words_title")]
    max_words_title: Option<usize>,

    /// Store the naming options given on this command line as defaults.
    #[arg(long = "set_default")]
    set_default: bool,

    /// Merge "FULL NAME = ABBREVIATION" lines into the abbreviation table.
    #[arg(long = "add_abbreviation_file")]
    add_abbreviation_file: Option<PathBuf>,

    /// Only log warnings and errors.
    #[arg(short = 's', long = "decrease_verbose")]
    decrease_verbose: bool,

    /// Output in JSON format (for scripts).
    /// Also enabled by setting PDFSORT_JSON=1.
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Step {
    /// Extract metadata and write the BibTeX file.
    Bib,
    /// Rename files as listed in the BibTeX file.
    Rename,
    /// Both, in one go.
    All,
}

// ─── Entry Point ────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    let start = Instant::now();
    let cli = Cli::parse();

    let json_output = cli.json || std::env::var("PDFSORT_JSON").as_deref() == Ok("1");
    init_logging(cli.decrease_verbose);

    match run(&cli, json_output, start) {
        Ok(ExitCode::Success) => Ok(()),
        Ok(code) => std::process::exit(code as i32),
        Err(err) => {
            let code = err
                .downcast_ref::<PdfSortError>()
                .map(PdfSortError::exit_code)
                .unwrap_or(ExitCode::GeneralError);
            let dur = start.elapsed().as_millis();
            if json_output {
                print_json(&serde_json::json!({
                    "status": "error",
                    "error": error_name(code),
                    "message": format!("{err:#}"),
                    "meta": { "duration_ms": dur }
                }))?;
            } else {
                eprintln!("Error: {err:#}");
            }
            std::process::exit(code as i32);
        }
    }
}

fn init_logging(quiet: bool) {
    let default = if quiet { "warn" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("PDFSORT_LOG")
                .or_else(|_| EnvFilter::try_from_default_env())
                .unwrap_or_else(|_| EnvFilter::new(default)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn run(cli: &Cli, json_output: bool, start: Instant) -> Result<ExitCode> {
    let mut config = PdfSortConfig::load()?;

    // ── Abbreviations ──────────────────────────────────────────────────

    if let Some(file) = &cli.add_abbreviation_file {
        let contents = std::fs::read_to_string(file)
            .with_context(|| format!("reading {}", file.display()))?;
        let merged = config.merge_abbreviations(&contents);
        config.save()?;
        let dur = start.elapsed().as_millis();
        if json_output {
            print_json(&serde_json::json!({
                "status": "ok",
                "data": { "merged": merged, "total": config.abbreviations.len(), "config": PdfSortConfig::config_path() },
                "meta": { "duration_ms": dur }
            }))?;
        } else {
            println!(
                "Merged {merged} abbreviations into {} ({} total)",
                PdfSortConfig::config_path().display(),
                config.abbreviations.len()
            );
        }
        return Ok(ExitCode::Success);
    }

    // ── Config overrides ───────────────────────────────────────────────

    apply_overrides(cli, &mut config);
    config.validate()?;
    let template = Template::parse(&config.naming.format)?;
    if cli.set_default {
        config.save()?;
        info!(path = %PdfSortConfig::config_path().display(), "saved defaults");
    }

    let dir = cli
        .directory
        .as_deref()
        .context("a DIRECTORY argument is required")?;
    if !dir.is_dir() {
        return Err(PdfSortError::DirectoryNotFound(dir.display().to_string()).into());
    }
    let manifest_path = cli
        .bibtex_file
        .clone()
        .unwrap_or_else(|| default_manifest_path(dir));

    // ── Bib step ───────────────────────────────────────────────────────

    let mut batch = None;
    if matches!(cli.step, Step::Bib | Step::All) {
        let opts = BatchOptions {
            overwrite: cli.overwrite,
            dry_run: cli.dry_run,
            recursive: config.scan.check_subfolders,
            manifest_path: Some(manifest_path.clone()),
        };
        let extractor = PdfMetadataExtractor::new().with_max_pages(config.scan.max_pages);
        let proposer: Box<dyn OverrideProposer> = if cli.review {
            Box::new(TerminalReviewer::new(std::io::stdin().lock(), std::io::stderr()))
        } else {
            Box::new(KeepProposed)
        };
        batch = Some(run_batch(dir, &template, &opts, &config, &extractor, proposer.as_ref())?);
    }

    // ── Rename step ────────────────────────────────────────────────────

    let mut rename = None;
    if matches!(cli.step, Step::Rename | Step::All) {
        let manifest = match &batch {
            Some(report) => report.manifest.clone(),
            None => {
                if !manifest_path.exists() {
                    return Err(PdfSortError::ManifestNotFound(
                        manifest_path.display().to_string(),
                    )
                    .into());
                }
                Manifest::load(&manifest_path)?
            }
        };
        let opts = RenameOptions {
            dry_run: cli.dry_run,
            force_rename: cli.force_rename,
            keep_originals: config.layout.keep_originals,
        };
        rename = Some(executor::execute(dir, &manifest, &opts, &config.layout)?);
    }

    // ── Summary ────────────────────────────────────────────────────────

    let dur = start.elapsed().as_millis();
    if json_output {
        print_json(&serde_json::json!({
            "status": "ok",
            "data": { "dry_run": cli.dry_run, "batch": batch, "rename": rename },
            "meta": { "duration_ms": dur }
        }))?;
    } else {
        if let Some(report) = &batch {
            print_batch_summary(dir, report, cli.dry_run);
        }
        if let Some(report) = &rename {
            print_rename_summary(dir, report);
        }
    }

    let issues = batch
        .iter()
        .flat_map(|b| b.issues.iter())
        .chain(rename.iter().flat_map(|r| r.issues.iter()));
    Ok(exit_code_for(issues))
}

fn apply_overrides(cli: &Cli, config: &mut PdfSortConfig) {
    let naming = &mut config.naming;
    if let Some(format) = &cli.format {
        naming.format = format.clone();
    }
    if let Some(case) = cli.case {
        naming.case = case;
    }
    if let Some(n) = cli.max_length_authors {
        naming.max_length_authors = n;
    }
    if let Some(n) = cli.max_length_filename {
        naming.max_length_filename = n;
    }
    if let Some(n) = cli.max_words_title {
        naming.max_words_title = n;
    }
    if cli.sub_folders {
        config.scan.check_subfolders = true;
    }
    if cli.keep_originals {
        config.layout.keep_originals = true;
    }
}

fn exit_code_for<'a>(issues: impl Iterator<Item = &'a pdfsort_core::FileIssue>) -> ExitCode {
    let mut code = ExitCode::Success;
    for issue in issues {
        if issue.needs_attention() {
            return ExitCode::Conflict;
        }
        if matches!(issue.kind, IssueKind::Io(_)) {
            code = ExitCode::FileSystemError;
        }
    }
    code
}

// ─── Output ─────────────────────────────────────────────────────────────────

fn print_batch_summary(dir: &Path, report: &BatchReport, dry_run: bool) {
    let prefix = if dry_run { "[dry run] " } else { "" };
    println!("{prefix}Processed {} PDF(s) in {}", report.items.len(), dir.display());
    println!("  resolved:   {}", report.resolved_count());
    let todo = if dry_run { "would move to todo/" } else { "moved to todo/" };
    println!("  unresolved: {} ({todo})", report.unresolved_count());

    let manifest_state = if dry_run {
        "not written"
    } else if report.manifest_written {
        "written"
    } else {
        "unchanged"
    };
    println!(
        "  bibtex:     {} ({manifest_state}, {} entries)",
        report.manifest_path.display(),
        report.manifest.len()
    );

    if dry_run {
        for entry in report.manifest.entries() {
            println!("  {} -> {}", entry.filename_old, entry.filename_new);
        }
    }
    print_issues(&report.issues);
}

fn print_rename_summary(dir: &Path, report: &RenameReport) {
    if report.dry_run {
        println!("[dry run] Planned actions in {}:", dir.display());
        for action in &report.actions {
            match action {
                PlannedAction::Rename { from, to } => {
                    println!("  rename  {} -> {}", from.display(), to.display())
                }
                PlannedAction::ToTodo { from, to } => {
                    println!("  todo    {} -> {}", from.display(), to.display())
                }
                PlannedAction::AlreadyDone { path } => println!("  done    {}", path.display()),
            }
        }
    } else {
        println!(
            "Renamed {}, moved to todo {}, already done {}",
            report.renamed(),
            report.to_todo(),
            report.already_done()
        );
    }
    print_issues(&report.issues);
}

fn print_issues(issues: &[pdfsort_core::FileIssue]) {
    if issues.is_empty() {
        return;
    }
    println!("\n{} issue(s):", issues.len());
    for issue in issues {
        println!("  - {issue}");
    }
}

// ─── Helpers ────────────────────────────────────────────────────────────────

fn print_json(val: &serde_json::Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(val)?);
    Ok(())
}

fn error_name(code: ExitCode) -> &'static str {
    match code {
        ExitCode::NotFound => "not_found",
        ExitCode::InvalidArgs => "invalid_args",
        ExitCode::FileSystemError => "filesystem",
        ExitCode::Conflict => "conflict",
        ExitCode::Success | ExitCode::GeneralError => "error",
    }
}
