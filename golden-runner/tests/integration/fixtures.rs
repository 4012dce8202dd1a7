// Copyright (c) The golden Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use camino::{Utf8Path, Utf8PathBuf};
use camino_tempfile::Utf8TempDir;
use color_eyre::eyre::{Result, ensure};
use golden_runner::{
    config::GoldenConfig,
    reporter::TestReporterBuilder,
    runner::{FailureDetail, RunStats, TestEvent, TestOutcome, TestRunnerBuilder},
    test_filter::TestFilter,
    test_list::TestList,
};
use std::sync::Once;

pub(crate) const INTERPRETER: &str = "/bin/sh";

pub(crate) fn test_init() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        color_eyre::install().expect("color-eyre installed once");
    });
}

/// A scratch test directory, with shell scripts as test programs.
pub(crate) struct TestDir {
    dir: Utf8TempDir,
}

impl TestDir {
    pub(crate) fn new() -> Result<Self> {
        Ok(Self {
            dir: Utf8TempDir::new()?,
        })
    }

    pub(crate) fn path(&self) -> &Utf8Path {
        self.dir.path()
    }

    /// Adds a test whose program is `script`, with an expected-output file if `expected` is set.
    pub(crate) fn add(&self, id: &str, script: &str, expected: Option<&str>) -> Result<&Self> {
        std::fs::write(self.path().join(format!("{id}.sh")), script)?;
        if let Some(expected) = expected {
            std::fs::write(self.path().join(format!("{id}.txt")), expected)?;
        }
        Ok(self)
    }

    pub(crate) fn discover(&self) -> Result<TestList> {
        Ok(TestList::discover(
            self.path(),
            "sh",
            "txt",
            &TestFilter::any(),
        )?)
    }

    pub(crate) fn config(&self) -> GoldenConfig {
        GoldenConfig::default_config(self.path())
    }
}

/// An owned summary of a [`TestOutcome`], so it can outlive the run.
#[derive(Clone, Debug, Eq, PartialEq)]
pub(crate) struct Observed {
    pub(crate) id: String,
    pub(crate) kind: ObservedKind,
    pub(crate) actual: String,
    pub(crate) stderr: String,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub(crate) enum ObservedKind {
    Passed,
    Mismatch { expected: String },
    FixtureRead,
    Spawn,
    Capture,
    TimedOut,
}

impl Observed {
    fn new(outcome: &TestOutcome) -> Self {
        match outcome {
            TestOutcome::Passed(id) => Self {
                id: id.to_string(),
                kind: ObservedKind::Passed,
                actual: String::new(),
                stderr: String::new(),
            },
            TestOutcome::Failed(failure) => {
                let kind = match &failure.detail {
                    FailureDetail::Mismatch { expected } => ObservedKind::Mismatch {
                        expected: expected.clone(),
                    },
                    FailureDetail::FixtureRead { .. } => ObservedKind::FixtureRead,
                    FailureDetail::Spawn { .. } => ObservedKind::Spawn,
                    FailureDetail::Capture { .. } => ObservedKind::Capture,
                    FailureDetail::TimedOut { .. } => ObservedKind::TimedOut,
                    other => panic!("unknown failure detail: {other:?}"),
                };
                Self {
                    id: failure.id.to_string(),
                    kind,
                    actual: failure.actual.clone(),
                    stderr: failure.stderr.clone(),
                }
            }
        }
    }
}

/// Everything observed over the course of a run.
#[derive(Debug)]
pub(crate) struct RunResult {
    /// Tests whose interpreter was spawned, in spawn order.
    pub(crate) started: Vec<String>,
    /// Outcomes in the order tests finished.
    pub(crate) finished: Vec<Observed>,
    /// The outcome list carried by `RunFinished`.
    pub(crate) final_outcomes: Vec<Observed>,
    pub(crate) run_finished_count: usize,
    pub(crate) stats: RunStats,
    /// The uncolored human report.
    pub(crate) report: String,
}

impl RunResult {
    pub(crate) fn get(&self, id: &str) -> &Observed {
        self.final_outcomes
            .iter()
            .find(|observed| observed.id == id)
            .unwrap_or_else(|| panic!("no outcome for {id}"))
    }
}

pub(crate) fn execute(
    test_list: &TestList,
    config: &GoldenConfig,
    builder: &TestRunnerBuilder,
) -> Result<RunResult> {
    let runner = builder.build(test_list, config)?;
    let reporter = TestReporterBuilder::default().build();

    let mut started = Vec::new();
    let mut finished = Vec::new();
    let mut final_outcomes = Vec::new();
    let mut run_finished_count = 0;
    let mut report = Vec::new();

    let stats = runner.try_execute(|event| {
        match &event {
            TestEvent::TestFinished { outcome, .. } => finished.push(Observed::new(outcome)),
            TestEvent::RunFinished { outcomes, .. } => {
                run_finished_count += 1;
                final_outcomes = outcomes.iter().map(Observed::new).collect();
            }
            TestEvent::TestStarted { test_case } => started.push(test_case.id().to_string()),
            TestEvent::RunStarted { .. } => {}
        }
        reporter.report_event(&event, &mut report)
    })?;

    ensure!(
        stats.passed + stats.failed == stats.finished_count,
        "every finished test either passed or failed: {stats:?}"
    );

    Ok(RunResult {
        started,
        finished,
        final_outcomes,
        run_finished_count,
        stats,
        report: String::from_utf8(report)?,
    })
}

pub(crate) fn interpreter() -> Utf8PathBuf {
    INTERPRETER.into()
}
