// Copyright (c) The golden Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::output::{NO_HEADING_TARGET, StderrStyles};
use camino::FromPathBufError;
use golden_runner::{
    errors::{
        ConfigParseError, TestFilterBuildError, TestListError, TestRunnerBuildError,
        TestRunnerExecuteError, WriteReportError,
    },
    exit_codes::GoldenExitCode,
};
use owo_colors::OwoColorize;
use std::error::Error;
use thiserror::Error;
use tracing::error;

pub(crate) type Result<T, E = ExpectedError> = std::result::Result<T, E>;

// Note that the #[error()] strings are mostly placeholder messages: the expected way to print out
// errors is with the display_to_stderr method, which colorizes errors.

/// An error that golden expects and knows how to report.
#[derive(Debug, Error)]
#[doc(hidden)]
pub enum ExpectedError {
    #[error("could not read current directory")]
    CurrentDirFailed {
        #[source]
        err: std::io::Error,
    },
    #[error("current directory is not valid UTF-8")]
    CurrentDirInvalidUtf8 {
        #[source]
        err: FromPathBufError,
    },
    #[error("config parse error")]
    ConfigParseError {
        #[from]
        err: ConfigParseError,
    },
    #[error("test filter build error")]
    TestFilterBuildError {
        #[from]
        err: TestFilterBuildError,
    },
    #[error("test list error")]
    TestListError {
        #[from]
        err: TestListError,
    },
    #[error("test runner build error")]
    TestRunnerBuildError {
        #[from]
        err: TestRunnerBuildError,
    },
    #[error("error writing test list")]
    WriteTestListError {
        #[source]
        err: std::io::Error,
    },
    #[error("test runner execute error")]
    TestRunnerExecuteError {
        #[from]
        err: TestRunnerExecuteError<WriteReportError>,
    },
    #[error("test run failed")]
    TestRunFailed,
}

impl ExpectedError {
    pub(crate) fn current_dir_failed(err: std::io::Error) -> Self {
        Self::CurrentDirFailed { err }
    }

    pub(crate) fn current_dir_invalid_utf8(err: FromPathBufError) -> Self {
        Self::CurrentDirInvalidUtf8 { err }
    }

    pub(crate) fn write_test_list_error(err: std::io::Error) -> Self {
        Self::WriteTestListError { err }
    }

    pub(crate) fn test_run_failed() -> Self {
        Self::TestRunFailed
    }

    /// Returns the exit code for the process.
    pub fn process_exit_code(&self) -> i32 {
        match self {
            Self::CurrentDirFailed { .. }
            | Self::CurrentDirInvalidUtf8 { .. }
            | Self::ConfigParseError { .. }
            | Self::TestFilterBuildError { .. }
            | Self::TestRunnerBuildError { .. } => GoldenExitCode::SETUP_ERROR,
            Self::TestListError { .. } => GoldenExitCode::TEST_LIST_CREATION_FAILED,
            Self::WriteTestListError { .. } => GoldenExitCode::WRITE_OUTPUT_ERROR,
            Self::TestRunnerExecuteError { err } => match err {
                TestRunnerExecuteError::Callback(_) => GoldenExitCode::WRITE_OUTPUT_ERROR,
                TestRunnerExecuteError::Incomplete { .. } => GoldenExitCode::INCOMPLETE_RUN,
                // Future variants are unexpected failures.
                _ => 1,
            },
            Self::TestRunFailed => GoldenExitCode::TEST_RUN_FAILED,
        }
    }

    /// Displays this error to stderr.
    pub fn display_to_stderr(&self, styles: &StderrStyles) {
        let mut next_error = match &self {
            Self::CurrentDirFailed { err } => {
                error!("could not read current directory");
                Some(err as &dyn Error)
            }
            Self::CurrentDirInvalidUtf8 { err } => {
                error!(
                    "current directory `{}` is not valid UTF-8",
                    err.as_path().display().style(styles.bold)
                );
                None
            }
            Self::ConfigParseError { err } => {
                error!(
                    "failed to parse golden config at `{}`",
                    err.config_file().style(styles.bold)
                );
                err.source()
            }
            Self::TestFilterBuildError { err } => {
                error!("failed to build test name filter");
                err.source()
            }
            Self::TestListError { err } => {
                error!(
                    "failed to read test directory `{}`",
                    err.dir().style(styles.bold)
                );
                err.source()
            }
            Self::TestRunnerBuildError { err } => {
                error!("failed to build test runner");
                Some(err as &dyn Error)
            }
            Self::WriteTestListError { err } => {
                error!("failed to write test list to output");
                Some(err as &dyn Error)
            }
            Self::TestRunnerExecuteError { err } => match err {
                TestRunnerExecuteError::Callback(err) => {
                    error!("failed to write report to output");
                    err.source()
                }
                other => {
                    error!("test run failed to complete");
                    Some(other as &dyn Error)
                }
            },
            Self::TestRunFailed => {
                error!("test run failed");
                None
            }
        };

        while let Some(err) = next_error {
            error!(target: NO_HEADING_TARGET, "\ncaused by:\n  {err}");
            next_error = err.source();
        }
    }
}
