//! Review step: a chance to override each proposed filename before it is
//! written to the manifest.

use std::io::{BufRead, Write};
use std::sync::Mutex;

use tracing::warn;

use crate::models::BibRecord;
use crate::template::sanitize_filename;

pub trait OverrideProposer {
    /// `Some(name)` replaces `proposed`; `None` keeps it.
    fn propose_override(&self, record: &BibRecord, proposed: &str) -> Option<String>;
}

/// Accepts every proposal.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeepProposed;

impl OverrideProposer for KeepProposed {
    fn propose_override(&self, _record: &BibRecord, _proposed: &str) -> Option<String> {
        None
    }
}

/// Line-based prompt: shows the record and the proposal, an empty answer
/// keeps the proposal.
pub struct TerminalReviewer<R, W> {
    io: Mutex<(R, W)>,
}

impl<R: BufRead, W: Write> TerminalReviewer<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self {
            io: Mutex::new((input, output)),
        }
    }
}

impl<R: BufRead, W: Write> OverrideProposer for TerminalReviewer<R, W> {
    fn propose_override(&self, record: &BibRecord, proposed: &str) -> Option<String> {
        let mut guard = self.io.lock().ok()?;
        let (input, output) = &mut *guard;

        let shown = writeln!(
            output,
            "\n{}\n  {}\n  {}",
            record.title.as_deref().unwrap_or("(no title)"),
            record.authors.join("; "),
            record.identifier.value
        )
        .and_then(|_| write!(output, "New filename [{proposed}]: "))
        .and_then(|_| output.flush());
        if let Err(e) = shown {
            warn!("review prompt failed: {e}");
            return None;
        }

        let mut line = String::new();
        match input.read_line(&mut line) {
            Ok(0) => None,
            Ok(_) => {
                let answer = sanitize_filename(&line);
                if answer.is_empty() || answer == proposed {
                    None
                } else {
                    Some(answer)
                }
            }
            Err(e) => {
                warn!("review input failed: {e}");
                None
            }
        }
    }
}
