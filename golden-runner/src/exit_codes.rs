// Copyright (c) The golden Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Process exit codes.

/// Documented exit codes for `golden` failures.
///
/// Unknown/unexpected failures will always result in exit code 1.
pub enum GoldenExitCode {}

impl GoldenExitCode {
    /// No errors occurred and every test passed. An empty run also exits with this code.
    pub const OK: i32 = 0;

    /// One or more tests failed.
    pub const TEST_RUN_FAILED: i32 = 100;

    /// Discovering tests in the test directory produced an error.
    pub const TEST_LIST_CREATION_FAILED: i32 = 104;

    /// The test run ended before every test reported an outcome.
    pub const INCOMPLETE_RUN: i32 = 106;

    /// Writing the report to stdout produced an error.
    pub const WRITE_OUTPUT_ERROR: i32 = 110;

    /// A user issue happened while setting up a golden invocation, such as an invalid config.
    pub const SETUP_ERROR: i32 = 96;
}
