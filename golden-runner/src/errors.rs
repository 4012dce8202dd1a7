// Copyright (c) The golden Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Errors produced by golden.

use camino::{Utf8Path, Utf8PathBuf};
use config::ConfigError;
use std::{fmt, io};
use thiserror::Error;

/// An error that occurred while parsing the config.
#[derive(Debug, Error)]
#[error("failed to parse golden config at `{config_file}`")]
#[non_exhaustive]
pub struct ConfigParseError {
    config_file: Utf8PathBuf,
    #[source]
    kind: ConfigParseErrorKind,
}

impl ConfigParseError {
    pub(crate) fn new(config_file: impl Into<Utf8PathBuf>, kind: ConfigParseErrorKind) -> Self {
        Self {
            config_file: config_file.into(),
            kind,
        }
    }

    /// Returns the config file for this error.
    pub fn config_file(&self) -> &Utf8Path {
        &self.config_file
    }

    /// Returns the kind of error this is.
    pub fn kind(&self) -> &ConfigParseErrorKind {
        &self.kind
    }
}

/// The kind of error that occurred while parsing a config.
///
/// Returned by [`ConfigParseError::kind`].
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigParseErrorKind {
    /// An error occurred while building the config.
    #[error(transparent)]
    BuildError(Box<ConfigError>),

    /// An error occurred while deserializing the config.
    #[error(transparent)]
    DeserializeError(Box<serde_path_to_error::Error<ConfigError>>),
}

/// Error returned while parsing a [`Jobs`](crate::config::Jobs) value from a string.
#[derive(Clone, Debug, Error)]
#[error(
    "unrecognized value for jobs: {input}\n(hint: use a positive integer or \"unlimited\")"
)]
pub struct JobsParseError {
    input: String,
}

impl JobsParseError {
    pub(crate) fn new(input: impl Into<String>) -> Self {
        Self {
            input: input.into(),
        }
    }
}

/// An error that occurred while building a [`TestFilter`](crate::test_filter::TestFilter).
#[derive(Debug, Error)]
#[error("error building test name filter")]
pub struct TestFilterBuildError {
    #[from]
    err: aho_corasick::BuildError,
}

/// An error that occurred while discovering tests in the test directory.
///
/// No tests can be run if this happens, so this error is fatal to the run.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum TestListError {
    /// The test directory could not be read.
    #[error("error reading test directory `{dir}`")]
    ReadDir {
        /// The test directory.
        dir: Utf8PathBuf,

        /// The underlying error.
        #[source]
        err: io::Error,
    },

    /// An entry in the test directory could not be read.
    #[error("error reading entry in test directory `{dir}`")]
    ReadEntry {
        /// The test directory.
        dir: Utf8PathBuf,

        /// The underlying error.
        #[source]
        err: io::Error,
    },
}

impl TestListError {
    /// Returns the test directory that could not be read.
    pub fn dir(&self) -> &Utf8Path {
        match self {
            Self::ReadDir { dir, .. } | Self::ReadEntry { dir, .. } => dir,
        }
    }
}

/// An error that occurred while building a test runner.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum TestRunnerBuildError {
    /// An error occurred while creating the Tokio runtime.
    #[error("error creating Tokio runtime")]
    TokioRuntimeCreate(#[source] io::Error),
}

/// An error that occurred while executing tests.
///
/// Per-test failures (interpreter missing, fixture missing, mismatches) are never reported
/// through this type: they become [`TestOutcome`](crate::runner::TestOutcome)s.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum TestRunnerExecuteError<E> {
    /// The event callback returned an error.
    ///
    /// Once the callback fails it is not called again, but the run still waits for every test to
    /// finish.
    #[error("error handling test event")]
    Callback(#[source] E),

    /// The outcome channel closed before every test reported an outcome.
    #[error("test run ended after {finished} of {total} tests reported an outcome")]
    Incomplete {
        /// The number of outcomes received.
        finished: usize,

        /// The number of tests in the run.
        total: usize,
    },
}

/// An error that occurred while writing a report.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum WriteReportError {
    /// An error occurred while writing the human-readable report.
    #[error("error writing report")]
    Io(#[source] io::Error),

    /// An error occurred while serializing the JSON report.
    #[error("error serializing JSON report")]
    Json(#[source] serde_json::Error),
}

/// Displays an error and its chain of sources on a single line, the way the report renders
/// fixture read errors.
pub(crate) struct DisplayErrorChain<E>(pub(crate) E);

impl<E: std::error::Error> fmt::Display for DisplayErrorChain<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)?;
        let mut source = self.0.source();
        while let Some(err) = source {
            write!(f, ": {err}")?;
            source = err.source();
        }
        Ok(())
    }
}
