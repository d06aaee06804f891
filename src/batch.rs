//! Batch driver: feeds script lines through the interpreter one line at a
//! time.
//!
//! Comment (`#`) and blank lines are skipped, all whitespace is stripped
//! before parsing, and a failing line is reported and skipped; the batch
//! always runs to the end. Only resource-level failures (an unreadable
//! script file) abort the run.

use crate::algebra::VolumeAlgebra;
use crate::interp::Generator;
use crate::report::LineReport;
use anyhow::Context;
use regex::Regex;
use std::path::Path;
use tracing::error;

#[derive(Debug, Clone, Copy, Default)]
pub struct BatchOptions {
    /// Remove every structure a failing line created (instead of the
    /// faithful partial-commit behavior).
    pub atomic_lines: bool,
}

/// Run a whole script text against the structure set.
pub fn run_script<A: VolumeAlgebra>(
    algebra: &mut A,
    text: &str,
    options: BatchOptions,
) -> anyhow::Result<Vec<LineReport>> {
    // The grammar is whitespace-insensitive: strip it all up front.
    let whitespace = Regex::new(r"\s+")?;

    let mut reports = Vec::new();
    for raw in text.lines() {
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let stripped = whitespace.replace_all(raw, "");

        let mut generator = Generator::new(algebra);
        let outcome = generator.run(&stripped);
        let created = generator.created().to_vec();

        match outcome {
            Ok(_) => {
                let created = created
                    .into_iter()
                    .filter_map(|h| algebra.id_of(h).ok().map(str::to_string))
                    .collect();
                reports.push(LineReport {
                    line: raw.to_string(),
                    ok: true,
                    error: None,
                    created,
                });
            }
            Err(err) => {
                error!("failure creating structure from '{raw}': {err}");
                if options.atomic_lines {
                    for handle in &created {
                        // Expansion placeholders may already be gone.
                        let _ = algebra.remove(*handle);
                    }
                }
                let surviving = created
                    .into_iter()
                    .filter_map(|h| algebra.id_of(h).ok().map(str::to_string))
                    .collect();
                reports.push(LineReport {
                    line: raw.to_string(),
                    ok: false,
                    error: Some(err.to_string()),
                    created: surviving,
                });
            }
        }
    }
    Ok(reports)
}

/// Read a script file and run it. A missing or unreadable file is a
/// resource-level failure that aborts the whole run.
pub fn run_script_file<A: VolumeAlgebra>(
    algebra: &mut A,
    path: &Path,
    options: BatchOptions,
) -> anyhow::Result<Vec<LineReport>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("read script file {}", path.display()))?;
    run_script(algebra, &text, options)
}
