// Copyright (c) The golden Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Prints out the results of a test run.
//!
//! The main structure in this module is [`TestReporter`].

use crate::{
    errors::WriteReportError,
    helpers::collate,
    runner::{FailureDetail, TestEvent, TestFailure, TestOutcome},
    test_list::TestId,
};
use debug_ignore::DebugIgnore;
use itertools::{Either, Itertools};
use owo_colors::{OwoColorize, Style};
use serde::Serialize;
use std::io::Write;
use swrite::{SWrite, swrite};

/// The format the final report is written in.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum MessageFormat {
    /// A human-readable report, optionally colorized.
    #[default]
    Human,

    /// A single JSON document.
    Json,
}

/// Test reporter builder.
#[derive(Debug, Default)]
pub struct TestReporterBuilder {
    message_format: MessageFormat,
    ascii_only: bool,
}

impl TestReporterBuilder {
    /// Sets the format of the final report.
    pub fn set_message_format(&mut self, message_format: MessageFormat) -> &mut Self {
        self.message_format = message_format;
        self
    }

    /// If true, pass and fail markers are written as ASCII words instead of check marks.
    pub fn set_ascii_only(&mut self, ascii_only: bool) -> &mut Self {
        self.ascii_only = ascii_only;
        self
    }

    /// Creates a new test reporter.
    pub fn build(&self) -> TestReporter {
        let glyphs = if self.ascii_only {
            Glyphs::ASCII
        } else {
            Glyphs::UNICODE
        };
        TestReporter {
            message_format: self.message_format,
            glyphs,
            styles: DebugIgnore(Box::default()),
        }
    }
}

/// Writes the final report for a test run.
#[derive(Debug)]
pub struct TestReporter {
    message_format: MessageFormat,
    glyphs: Glyphs,
    styles: DebugIgnore<Box<Styles>>,
}

impl TestReporter {
    /// Colorizes output.
    ///
    /// Has no effect on JSON reports.
    pub fn colorize(&mut self) {
        self.styles.colorize();
    }

    /// Reports a test event.
    ///
    /// Only [`TestEvent::RunFinished`] produces output: the report is written once every test has
    /// an outcome.
    pub fn report_event(
        &self,
        event: &TestEvent<'_>,
        writer: impl Write,
    ) -> Result<(), WriteReportError> {
        match event {
            TestEvent::RunFinished { outcomes, .. } => self.write_report(outcomes, writer),
            TestEvent::RunStarted { .. }
            | TestEvent::TestStarted { .. }
            | TestEvent::TestFinished { .. } => Ok(()),
        }
    }

    /// Writes the report for the given outcomes.
    ///
    /// Passed and failed tests are written in separate sections, each sorted by test identifier.
    /// The same outcomes always produce the same bytes, whatever order they are passed in.
    pub fn write_report(
        &self,
        outcomes: &[TestOutcome],
        mut writer: impl Write,
    ) -> Result<(), WriteReportError> {
        let partition = Partition::new(outcomes);
        match self.message_format {
            MessageFormat::Human => {
                let mut out = String::new();
                self.write_human(&partition, &mut out);
                writer
                    .write_all(out.as_bytes())
                    .map_err(WriteReportError::Io)?;
            }
            MessageFormat::Json => {
                serde_json::to_writer_pretty(&mut writer, &partition.to_json())
                    .map_err(WriteReportError::Json)?;
                writeln!(writer).map_err(WriteReportError::Io)?;
            }
        }
        writer.flush().map_err(WriteReportError::Io)
    }

    // ---
    // Helper methods
    // ---

    fn write_human(&self, partition: &Partition<'_>, out: &mut String) {
        let styles = &self.styles;

        if !partition.passed.is_empty() {
            swrite!(
                out,
                "==> {} successful tests:\n",
                partition.passed.len().style(styles.count),
            );
            for id in &partition.passed {
                swrite!(out, "{} {id}\n", self.glyphs.pass.style(styles.pass));
            }
        }

        if !partition.failed.is_empty() {
            swrite!(
                out,
                "==> {} failed tests:\n",
                partition.failed.len().style(styles.count),
            );
            for failure in &partition.failed {
                swrite!(out, "{} {}\n", self.glyphs.fail.style(styles.fail), failure.id);
                swrite!(out, "  expected: {}\n", failure.detail);
                swrite!(out, "  got: {}\n", failure.actual);
                if !failure.stderr.is_empty() {
                    swrite!(out, "  stderr: {}\n", failure.stderr.style(styles.fail_output));
                }
            }
        }

        let total = partition.passed.len() + partition.failed.len();
        if total > 0 {
            swrite!(
                out,
                "==> {} tests run: {} passed, {} failed\n",
                total.style(styles.count),
                partition.passed.len().style(styles.pass),
                partition.failed.len().style(if partition.failed.is_empty() {
                    styles.count
                } else {
                    styles.fail
                }),
            );
        }
    }
}

/// Outcomes split into passed and failed tests, each sorted for display.
struct Partition<'o> {
    passed: Vec<&'o TestId>,
    failed: Vec<&'o TestFailure>,
}

impl<'o> Partition<'o> {
    fn new(outcomes: &'o [TestOutcome]) -> Self {
        let (mut passed, mut failed): (Vec<_>, Vec<_>) =
            outcomes.iter().partition_map(|outcome| match outcome {
                TestOutcome::Passed(id) => Either::Left(id),
                TestOutcome::Failed(failure) => Either::Right(failure),
            });
        passed.sort_by(|a, b| collate(a.as_str(), b.as_str()));
        failed.sort_by(|a, b| collate(a.id.as_str(), b.id.as_str()));
        Self { passed, failed }
    }

    fn to_json(&self) -> JsonReport<'o> {
        JsonReport {
            total: self.passed.len() + self.failed.len(),
            passed: self.passed.iter().map(|id| id.as_str()).collect(),
            failed: self
                .failed
                .iter()
                .map(|failure| {
                    let (expected, error) = match &failure.detail {
                        FailureDetail::Mismatch { expected } => (Some(expected.as_str()), None),
                        other => (None, Some(other.to_string())),
                    };
                    JsonFailure {
                        id: failure.id.as_str(),
                        expected,
                        error,
                        actual: &failure.actual,
                        stderr: &failure.stderr,
                    }
                })
                .collect(),
        }
    }
}

#[derive(Serialize)]
struct JsonReport<'o> {
    total: usize,
    passed: Vec<&'o str>,
    failed: Vec<JsonFailure<'o>>,
}

#[derive(Serialize)]
struct JsonFailure<'o> {
    id: &'o str,
    #[serde(skip_serializing_if = "Option::is_none")]
    expected: Option<&'o str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    actual: &'o str,
    stderr: &'o str,
}

#[derive(Copy, Clone, Debug)]
struct Glyphs {
    pass: &'static str,
    fail: &'static str,
}

impl Glyphs {
    const UNICODE: Self = Self {
        pass: "✓",
        fail: "✗",
    };
    const ASCII: Self = Self {
        pass: "ok",
        fail: "FAIL",
    };
}

#[derive(Debug, Default)]
struct Styles {
    count: Style,
    pass: Style,
    fail: Style,
    fail_output: Style,
}

impl Styles {
    fn colorize(&mut self) {
        self.count = Style::new().bold();
        self.pass = Style::new().green().bold();
        self.fail = Style::new().red().bold();
        self.fail_output = Style::new().magenta();
    }
}
