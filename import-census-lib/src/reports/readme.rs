use super::LibraryCount;
use crate::Result;
use chrono::{DateTime, Utc};
use core::fmt::Write as _;
use ohno::IntoAppError;
use regex::Regex;
use std::fs;
use std::io;
use std::path::Path;
use std::sync::LazyLock;

static NEXT_SECTION: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?m)^## ").expect("invalid regex"));

/// `## Top Python Libraries` for `python`.
#[must_use]
pub fn section_heading(language: &str) -> String {
    let mut chars = language.chars();
    let name: String = chars
        .next()
        .map(|first| first.to_uppercase().chain(chars).collect())
        .unwrap_or_default();
    format!("## Top {name} Libraries")
}

/// The Markdown section for the leading `top` entries of `counts`.
#[must_use]
pub fn render_section(heading: &str, counts: &[LibraryCount], top: usize, updated_at: DateTime<Utc>) -> String {
    let mut section = format!("{heading}\n\n| Rank | Library | Count |\n|------|---------|-------|\n");
    for (rank, entry) in counts.iter().take(top).enumerate() {
        let _ = writeln!(section, "| {} | {} | {} |", rank + 1, entry.library, entry.count);
    }
    let _ = writeln!(section, "\n*Last updated: {}*", updated_at.format("%Y-%m-%d %H:%M UTC"));
    section
}

/// Replace the section that starts with `heading`, or append it when absent.
///
/// The replaced section runs up to the next level-two heading or the end of the document.
#[must_use]
pub fn splice_section(document: &str, heading: &str, section: &str) -> String {
    let start = document
        .match_indices(heading)
        .map(|(i, _)| i)
        .find(|&i| i == 0 || document[..i].ends_with('\n'));

    let Some(start) = start else {
        let mut out = document.trim_end().to_string();
        if !out.is_empty() {
            out.push_str("\n\n");
        }
        out.push_str(section);
        return out;
    };

    let body_start = start + heading.len();
    let end = NEXT_SECTION
        .find(&document[body_start..])
        .map_or(document.len(), |m| body_start + m.start());

    let mut out = String::with_capacity(document.len() + section.len());
    out.push_str(&document[..start]);
    out.push_str(section);
    if end < document.len() {
        out.push('\n');
        out.push_str(&document[end..]);
    }
    out
}

/// Write the library table into the README at `path`, creating the file if needed.
///
/// Returns `false` and leaves the file alone when there are no counts to show.
pub fn update_readme(path: &Path, heading: &str, counts: &[LibraryCount], top: usize, updated_at: DateTime<Utc>) -> Result<bool> {
    if counts.is_empty() || top == 0 {
        return Ok(false);
    }

    let section = render_section(heading, counts, top, updated_at);
    let document = match fs::read_to_string(path) {
        Ok(existing) => splice_section(&existing, heading, &section),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            format!("# Repository Library Analysis\n\nLibraries imported by sampled public repositories.\n\n{section}")
        }
        Err(e) => return Err(e).into_app_err_with(|| format!("reading '{}'", path.display())),
    };

    fs::write(path, document).into_app_err_with(|| format!("writing '{}'", path.display()))?;
    Ok(true)
}
