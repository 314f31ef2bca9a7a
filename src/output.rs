//! CLI output formatting for tool results.
//!
//! # Information-First Display
//!
//! Each input leads with its positional index and file name; what was
//! written and how it was encoded follow as indented context lines:
//!
//! ```text
//! 001 portrait.jpg → out/portrait-passport_compressed.jpg
//!     Size: 38.2 KB (quality 85, 413×531)
//! 002 scan.pdf → out/scan-page_1.jpg
//!     Size: 112.0 KB
//! 003 broken.png: processing failed
//!
//! Processed 3 inputs, 1 failed
//! ```
//!
//! With `--json`, each result is one JSON object per line instead.
//!
//! Failure lines are deliberately generic; error details go to the debug log.
//!
//! Inputs sharing a stem (`a.jpg`, `a.png`) would write the same output
//! file; [`unique_file_name`] numbers the later ones instead.
//!
//! # Architecture
//!
//! Each display has a `format_*` function (returns `Vec<String>` or
//! `String`) for testability and a `print_*` wrapper that writes to stdout.
//! Format functions are pure: no I/O, no side effects.

use crate::imaging::EncodingResult;
use crate::tools::ToolOutput;
use serde::Serialize;
use std::collections::HashSet;
use std::path::Path;

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

fn format_kb(bytes: usize) -> String {
    format!("{:.1} KB", bytes as f64 / 1024.0)
}

// ============================================================================
// Text output
// ============================================================================

/// Format one successful result.
///
/// `target_kb` is the budget the encoder was asked to meet, if any; a result
/// over it gets an extra warning line.
pub fn format_result(
    index: usize,
    source: &str,
    written: &Path,
    output: &ToolOutput,
    target_kb: Option<f64>,
) -> Vec<String> {
    let mut lines = vec![format!(
        "{} {} \u{2192} {}",
        format_index(index),
        source,
        written.display()
    )];

    match &output.encoding {
        Some(EncodingResult {
            quality,
            width,
            height,
            ..
        }) => lines.push(format!(
            "    Size: {} (quality {}, {}\u{d7}{})",
            format_kb(output.bytes.len()),
            quality,
            width,
            height
        )),
        None => lines.push(format!("    Size: {}", format_kb(output.bytes.len()))),
    }

    if let (Some(encoding), Some(target)) = (&output.encoding, target_kb) {
        if !encoding.met_budget(target) {
            lines.push(format!(
                "    Over budget: {:.1} KB > {} KB at lowest quality",
                encoding.size_kb, target
            ));
        }
    }
    lines
}

/// Format one failed input. Carries no error detail.
pub fn format_failure(index: usize, source: &str) -> Vec<String> {
    vec![format!("{} {}: processing failed", format_index(index), source)]
}

pub fn format_summary(total: usize, failed: usize) -> String {
    let noun = if total == 1 { "input" } else { "inputs" };
    if failed == 0 {
        format!("Processed {} {}", total, noun)
    } else {
        format!("Processed {} {}, {} failed", total, noun, failed)
    }
}

pub fn print_result(
    index: usize,
    source: &str,
    written: &Path,
    output: &ToolOutput,
    target_kb: Option<f64>,
) {
    for line in format_result(index, source, written, output, target_kb) {
        println!("{}", line);
    }
}

pub fn print_failure(index: usize, source: &str) {
    for line in format_failure(index, source) {
        println!("{}", line);
    }
}

pub fn print_summary(total: usize, failed: usize) {
    println!();
    println!("{}", format_summary(total, failed));
}

// ============================================================================
// JSON output
// ============================================================================

#[derive(Serialize)]
struct JsonRecord<'a> {
    input: &'a str,
    ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    output: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    content_type: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    bytes: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    encoding: Option<&'a EncodingResult>,
}

/// One JSON line per input. `result` is `None` for a failed input.
pub fn format_json(source: &str, result: Option<(&Path, &ToolOutput)>) -> String {
    let record = match result {
        Some((written, output)) => JsonRecord {
            input: source,
            ok: true,
            output: Some(written.display().to_string()),
            content_type: Some(output.content_type),
            bytes: Some(output.bytes.len()),
            encoding: output.encoding.as_ref(),
        },
        None => JsonRecord {
            input: source,
            ok: false,
            output: None,
            content_type: None,
            bytes: None,
            encoding: None,
        },
    };
    // A struct of strings and numbers always serializes.
    serde_json::to_string(&record).unwrap_or_default()
}

pub fn print_json(source: &str, result: Option<(&Path, &ToolOutput)>) {
    println!("{}", format_json(source, result));
}

// ============================================================================
// Output file names
// ============================================================================

/// Claim `name` for this run, or the first free `stem-N.ext` variant when an
/// earlier input already took it (`a.jpg` and `a.png` share a stem).
pub fn unique_file_name(name: &str, taken: &mut HashSet<String>) -> String {
    if taken.insert(name.to_string()) {
        return name.to_string();
    }
    let (stem, ext) = match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => (stem, format!(".{ext}")),
        _ => (name, String::new()),
    };
    let mut n = 2;
    loop {
        let candidate = format!("{stem}-{n}{ext}");
        if taken.insert(candidate.clone()) {
            return candidate;
        }
        n += 1;
    }
}
