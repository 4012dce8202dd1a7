// Copyright (c) The golden Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Discovering tests in a test directory.
//!
//! The main structure in this module is [`TestList`].

use crate::{errors::TestListError, helpers::collate, test_filter::TestFilter};
use camino::{Utf8Path, Utf8PathBuf};
use owo_colors::{OwoColorize, Style};
use std::{collections::BTreeSet, fmt, io};
use tracing::{debug, warn};

/// The name of a test: the file name of its program with the extension removed.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct TestId(String);

impl TestId {
    /// Creates a new test identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identifier as a string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A single test: a program to pass to the interpreter, and the output it is expected to produce.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TestCase {
    id: TestId,
    input_path: Utf8PathBuf,
    expected_path: Utf8PathBuf,
}

impl TestCase {
    /// Creates a test case for `id` within `test_dir`.
    pub fn new(
        test_dir: &Utf8Path,
        id: TestId,
        input_extension: &str,
        expected_extension: &str,
    ) -> Self {
        let input_path = test_dir.join(format!("{id}.{input_extension}"));
        let expected_path = test_dir.join(format!("{id}.{expected_extension}"));
        Self {
            id,
            input_path,
            expected_path,
        }
    }

    /// Returns the identifier of this test.
    pub fn id(&self) -> &TestId {
        &self.id
    }

    /// Returns the path to the program passed to the interpreter.
    pub fn input_path(&self) -> &Utf8Path {
        &self.input_path
    }

    /// Returns the path to the expected output.
    pub fn expected_path(&self) -> &Utf8Path {
        &self.expected_path
    }
}

/// The set of tests discovered in a test directory.
#[derive(Clone, Debug)]
pub struct TestList {
    test_dir: Utf8PathBuf,
    cases: Vec<TestCase>,
    skip_count: usize,
}

impl TestList {
    /// Discovers tests in `test_dir`.
    ///
    /// Every regular file named `<id>.<input_extension>` is a test. Tests whose identifier doesn't
    /// match `filter` are skipped. Subdirectories are not searched.
    ///
    /// Failing to read the directory is an error: no tests can be run.
    pub fn discover(
        test_dir: impl Into<Utf8PathBuf>,
        input_extension: &str,
        expected_extension: &str,
        filter: &TestFilter,
    ) -> Result<Self, TestListError> {
        let test_dir = test_dir.into();
        let ids = discover_ids(&test_dir, input_extension)?;

        let total = ids.len();
        let cases: Vec<_> = ids
            .into_iter()
            .filter(|id| filter.is_match(id.as_str()))
            .map(|id| TestCase::new(&test_dir, id, input_extension, expected_extension))
            .collect();
        let skip_count = total - cases.len();

        debug!("discovered {total} tests in {test_dir}");

        Ok(Self {
            test_dir,
            cases,
            skip_count,
        })
    }

    /// Creates a test list from already-constructed test cases.
    pub fn new(test_dir: impl Into<Utf8PathBuf>, cases: Vec<TestCase>) -> Self {
        Self {
            test_dir: test_dir.into(),
            cases,
            skip_count: 0,
        }
    }

    /// Creates an empty test list.
    pub fn empty() -> Self {
        Self::new(Utf8PathBuf::new(), Vec::new())
    }

    /// Returns the directory tests were discovered in.
    pub fn test_dir(&self) -> &Utf8Path {
        &self.test_dir
    }

    /// Returns the number of tests that will be run.
    pub fn run_count(&self) -> usize {
        self.cases.len()
    }

    /// Returns the number of tests that were skipped by the name filter.
    pub fn skip_count(&self) -> usize {
        self.skip_count
    }

    /// Returns true if there are no tests to run.
    pub fn is_empty(&self) -> bool {
        self.cases.is_empty()
    }

    /// Iterates over the tests to run, in discovery order.
    pub fn iter(&self) -> impl ExactSizeIterator<Item = &TestCase> + '_ {
        self.cases.iter()
    }

    /// Writes the identifiers of the tests to run, one per line, in display order.
    pub fn write_human(&self, mut writer: impl io::Write, colorize: bool) -> io::Result<()> {
        let style = if colorize {
            Style::new().bold()
        } else {
            Style::new()
        };

        let mut ids: Vec<_> = self.cases.iter().map(|case| case.id.as_str()).collect();
        ids.sort_by(|a, b| collate(a, b));
        for id in ids {
            writeln!(writer, "{}", id.style(style))?;
        }
        Ok(())
    }
}

fn discover_ids(test_dir: &Utf8Path, input_extension: &str) -> Result<BTreeSet<TestId>, TestListError> {
    let suffix = format!(".{input_extension}");
    let entries = test_dir.read_dir_utf8().map_err(|err| TestListError::ReadDir {
        dir: test_dir.to_owned(),
        err,
    })?;

    let mut ids = BTreeSet::new();
    for entry in entries {
        let entry = match entry {
            Ok(entry) => entry,
            // camino reports non-UTF-8 file names as InvalidData: skip those rather than failing
            // the whole run.
            Err(err) if err.kind() == io::ErrorKind::InvalidData => {
                warn!("skipping entry in {test_dir} with a non-UTF-8 file name");
                continue;
            }
            Err(err) => {
                return Err(TestListError::ReadEntry {
                    dir: test_dir.to_owned(),
                    err,
                });
            }
        };

        let Some(id) = entry.file_name().strip_suffix(&suffix) else {
            continue;
        };
        if id.is_empty() {
            continue;
        }

        // Follow symlinks: a linked program is still a test.
        let is_file = entry
            .path()
            .metadata()
            .map(|metadata| metadata.is_file())
            .unwrap_or(false);
        if !is_file {
            debug!("skipping {}: not a regular file", entry.path());
            continue;
        }

        ids.insert(TestId::new(id));
    }

    Ok(ids)
}
