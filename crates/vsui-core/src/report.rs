//! Test reporting sink.
//!
//! Scenario code reports verdicts through the [`ReportSink`] trait, never
//! through the synchronization helpers themselves. [`TestReport`] is the
//! in-memory implementation: it keeps every entry, tags entries with the
//! section path they were recorded in, mirrors them to `tracing`, and can
//! persist them as JSON Lines.
//!
//! # Example
//!
//! ```
//! use vsui_core::report::{ReportSink, Severity, TestReport};
//!
//! let mut report = TestReport::new("tst_new_project_defaults");
//! report.begin_section("Qt Console Application");
//! report.compare(&"Debug", &"Debug", "First configuration is Debug?");
//! report.warning("Template is not supported, skipping...");
//! report.end_section();
//!
//! assert_eq!(report.summary().passes, 1);
//! assert_eq!(report.entries()[0].section, vec!["Qt Console Application".to_string()]);
//! ```

use std::fmt::Debug;
use std::io::{BufWriter, Write};
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};
use uuid::Uuid;

/// Verdict carried by a report entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Informational message, no verdict.
    Log,
    Pass,
    Warning,
    Fail,
    /// Failure after which the scenario cannot continue.
    Fatal,
}

impl Severity {
    pub fn is_failure(self) -> bool {
        matches!(self, Severity::Fail | Severity::Fatal)
    }

    pub fn name(self) -> &'static str {
        match self {
            Severity::Log => "LOG",
            Severity::Pass => "PASS",
            Severity::Warning => "WARNING",
            Severity::Fail => "FAIL",
            Severity::Fatal => "FATAL",
        }
    }
}

/// One recorded verdict.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportEntry {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub severity: Severity,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    /// Enclosing section names, outermost first.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub section: Vec<String>,
}

/// Where scenario verdicts go.
pub trait ReportSink {
    /// Records one entry.
    fn record(&mut self, severity: Severity, message: &str, detail: Option<&str>);

    fn pass(&mut self, message: &str) {
        self.record(Severity::Pass, message, None);
    }

    fn fail(&mut self, message: &str, detail: Option<&str>) {
        self.record(Severity::Fail, message, detail);
    }

    fn warning(&mut self, message: &str) {
        self.record(Severity::Warning, message, None);
    }

    fn fatal(&mut self, message: &str, detail: Option<&str>) {
        self.record(Severity::Fatal, message, detail);
    }

    fn log(&mut self, message: &str) {
        self.record(Severity::Log, message, None);
    }

    /// Records a pass when `condition` holds, a failure otherwise.
    fn verify(&mut self, condition: bool, message: &str) -> bool {
        let severity = if condition { Severity::Pass } else { Severity::Fail };
        self.record(severity, message, None);
        condition
    }

    /// Records a pass when the values are equal, otherwise a failure with
    /// both values in the detail.
    fn compare<T>(&mut self, actual: &T, expected: &T, message: &str) -> bool
    where
        Self: Sized,
        T: PartialEq + Debug + ?Sized,
    {
        if actual == expected {
            self.record(Severity::Pass, message, None);
            true
        } else {
            let detail = format!("'{:?}' and '{:?}' are not equal", actual, expected);
            self.record(Severity::Fail, message, Some(&detail));
            false
        }
    }
}

/// Entry counts by severity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Summary {
    pub passes: usize,
    pub fails: usize,
    pub warnings: usize,
    pub fatals: usize,
}

/// In-memory report with optional JSON Lines persistence.
pub struct TestReport {
    name: String,
    entries: Vec<ReportEntry>,
    sections: Vec<String>,
    log_writer: Option<BufWriter<std::fs::File>>,
}

impl TestReport {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entries: Vec::new(),
            sections: Vec::new(),
            log_writer: None,
        }
    }

    /// Also appends every entry as one JSON line to `path`.
    pub fn with_log_file(mut self, path: impl AsRef<Path>) -> std::io::Result<Self> {
        let file = std::fs::File::create(path)?;
        self.log_writer = Some(BufWriter::new(file));
        Ok(self)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn begin_section(&mut self, name: impl Into<String>) {
        let name = name.into();
        info!(report = %self.name, section = %name, "section started");
        self.sections.push(name);
    }

    pub fn end_section(&mut self) {
        if let Some(name) = self.sections.pop() {
            info!(report = %self.name, section = %name, "section ended");
        }
    }

    /// Runs `f` inside a named section.
    pub fn section<R>(&mut self, name: impl Into<String>, f: impl FnOnce(&mut Self) -> R) -> R {
        self.begin_section(name);
        let result = f(self);
        self.end_section();
        result
    }

    pub fn entries(&self) -> &[ReportEntry] {
        &self.entries
    }

    pub fn summary(&self) -> Summary {
        let mut summary = Summary::default();
        for entry in &self.entries {
            match entry.severity {
                Severity::Pass => summary.passes += 1,
                Severity::Fail => summary.fails += 1,
                Severity::Warning => summary.warnings += 1,
                Severity::Fatal => summary.fatals += 1,
                Severity::Log => {}
            }
        }
        summary
    }

    pub fn has_failures(&self) -> bool {
        self.entries.iter().any(|e| e.severity.is_failure())
    }
}

impl ReportSink for TestReport {
    fn record(&mut self, severity: Severity, message: &str, detail: Option<&str>) {
        let entry = ReportEntry {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            severity,
            message: message.to_string(),
            detail: detail.map(str::to_string),
            section: self.sections.clone(),
        };

        match severity {
            Severity::Fail | Severity::Fatal => {
                error!(report = %self.name, verdict = severity.name(), detail = ?entry.detail, "{}", message)
            }
            Severity::Warning => warn!(report = %self.name, "{}", message),
            Severity::Pass | Severity::Log => info!(report = %self.name, verdict = severity.name(), "{}", message),
        }

        if let Some(ref mut writer) = self.log_writer {
            if let Ok(json) = serde_json::to_string(&entry) {
                let _ = writeln!(writer, "{}", json);
                let _ = writer.flush();
            }
        }

        self.entries.push(entry);
    }
}

impl std::fmt::Debug for TestReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TestReport")
            .field("name", &self.name)
            .field("entries", &self.entries.len())
            .field("sections", &self.sections)
            .field("log_writer", &"<Option<BufWriter<File>>>")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_records_pass_and_fail() {
        let mut report = TestReport::new("t");
        assert!(report.verify(true, "ok?"));
        assert!(!report.verify(false, "broken?"));
        assert_eq!(report.summary(), Summary { passes: 1, fails: 1, warnings: 0, fatals: 0 });
        assert!(report.has_failures());
    }

    #[test]
    fn compare_puts_values_in_detail() {
        let mut report = TestReport::new("t");
        assert!(!report.compare(&2usize, &1usize, "rows"));
        assert_eq!(report.entries()[0].detail.as_deref(), Some("'2' and '1' are not equal"));
    }

    #[test]
    fn compare_works_on_str() {
        let mut report = TestReport::new("t");
        assert!(report.compare("Release", "Release", "second configuration"));
    }

    #[test]
    fn nested_sections_tag_entries() {
        let mut report = TestReport::new("t");
        report.section("Build System: CMake", |r| {
            r.section("Qt Widgets Application", |r| r.pass("files created"));
            r.log("between templates");
        });
        report.pass("outside");

        let entries = report.entries();
        assert_eq!(entries[0].section, vec!["Build System: CMake", "Qt Widgets Application"]);
        assert_eq!(entries[1].section, vec!["Build System: CMake"]);
        assert!(entries[2].section.is_empty());
    }

    #[test]
    fn log_entries_do_not_count() {
        let mut report = TestReport::new("t");
        report.log("Skipping template");
        assert_eq!(report.summary(), Summary::default());
        assert!(!report.has_failures());
    }

    #[test]
    fn fatal_is_failure() {
        assert!(Severity::Fatal.is_failure());
        assert!(!Severity::Warning.is_failure());
    }

    #[test]
    fn entries_persist_as_json_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.jsonl");
        let mut report = TestReport::new("t").with_log_file(&path).unwrap();
        report.fatal("No Qt versions known", Some("Did you set SQUISH_VSTOOLS_QTDIRS correctly?"));
        report.pass("done");

        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<ReportEntry> = text.lines().map(|l| serde_json::from_str(l).unwrap()).collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].severity, Severity::Fatal);
        assert_eq!(lines[1].message, "done");
    }
}
