//! Downloadable plain-text reports.
//!
//! The agent writes markdown; reports turn `#`, `##` and `###` headings into
//! plain titles (the first two underlined) and collapse runs of blank lines.

use chrono::NaiveDateTime;
use std::path::{Path, PathBuf};
use thiserror::Error;

const DEFAULT_NAME: &str = "report";

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("report content is empty")]
    Empty,

    #[error("failed to write report: {0}")]
    Io(#[from] std::io::Error),
}

/// A rendered report ready to download or save
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    name: String,
    body: String,
}

impl Report {
    /// Render `content` under a sanitized file stem
    pub fn new(name: Option<&str>, content: &str) -> Result<Self, ReportError> {
        let body = render(content);
        if body.is_empty() {
            return Err(ReportError::Empty);
        }

        Ok(Self {
            name: sanitize_name(name.unwrap_or(DEFAULT_NAME)),
            body,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    /// `<name>_<YYYYmmdd_HHMMSS>.txt`
    pub fn filename(&self, at: NaiveDateTime) -> String {
        format!("{}_{}.txt", self.name, at.format("%Y%m%d_%H%M%S"))
    }

    /// Save into `dir`, creating it if needed
    pub fn write_to(&self, dir: &Path, at: NaiveDateTime) -> Result<PathBuf, ReportError> {
        std::fs::create_dir_all(dir)?;
        let path = dir.join(self.filename(at));
        std::fs::write(&path, &self.body)?;
        tracing::info!("Saved report to {}", path.display());
        Ok(path)
    }
}

fn sanitize_name(name: &str) -> String {
    let cleaned: String = name
        .trim()
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    let cleaned = cleaned.trim_matches('_');

    if cleaned.is_empty() {
        DEFAULT_NAME.to_string()
    } else {
        cleaned.to_string()
    }
}

fn heading(line: &str) -> Option<(usize, &str)> {
    for (level, marker) in [(3, "### "), (2, "## "), (1, "# ")] {
        if let Some(title) = line.strip_prefix(marker) {
            return Some((level, title.trim()));
        }
    }
    None
}

/// Convert markdown-ish agent output to report text
pub fn render(content: &str) -> String {
    let mut lines: Vec<String> = Vec::new();

    for line in content.lines() {
        let line = line.trim_end();
        match heading(line) {
            Some((level, title)) => {
                if lines.last().is_some_and(|l| !l.is_empty()) {
                    lines.push(String::new());
                }
                lines.push(title.to_string());
                match level {
                    1 => lines.push("=".repeat(title.chars().count())),
                    2 => lines.push("-".repeat(title.chars().count())),
                    _ => {}
                }
            }
            None if line.is_empty() => {
                if lines.last().is_some_and(|l| !l.is_empty()) {
                    lines.push(String::new());
                }
            }
            None => lines.push(line.to_string()),
        }
    }

    while lines.last().is_some_and(|l| l.is_empty()) {
        lines.pop();
    }
    if lines.is_empty() {
        return String::new();
    }

    let mut body = lines.join("\n");
    body.push('\n');
    body
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 3, 14)
            .unwrap()
            .and_hms_opt(9, 26, 53)
            .unwrap()
    }

    #[test]
    fn test_render_headings() {
        let text = render("# HER2 Report\n## Key Findings\n### Trials\nThree phase 3 studies.");
        assert_eq!(
            text,
            "HER2 Report\n===========\n\nKey Findings\n------------\n\nTrials\nThree phase 3 studies.\n"
        );
    }

    #[test]
    fn test_render_collapses_blank_lines() {
        let text = render("\n\nfirst\n\n\n\nsecond   \n\n");
        assert_eq!(text, "first\n\nsecond\n");
    }

    #[test]
    fn test_filename() {
        let report = Report::new(Some("HER2 inhibitors/2025"), "body").unwrap();
        assert_eq!(report.filename(at()), "HER2_inhibitors_2025_20250314_092653.txt");

        let report = Report::new(None, "body").unwrap();
        assert_eq!(report.filename(at()), "report_20250314_092653.txt");
    }

    #[test]
    fn test_empty_report_rejected() {
        assert!(matches!(Report::new(None, "\n \n"), Err(ReportError::Empty)));
    }

    #[test]
    fn test_write_to_creates_dir() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("reports");

        let report = Report::new(Some("summary"), "# Title\ntext").unwrap();
        let path = report.write_to(&target, at()).unwrap();

        assert_eq!(path, target.join("summary_20250314_092653.txt"));
        assert_eq!(std::fs::read_to_string(path).unwrap(), report.body());
    }
}
