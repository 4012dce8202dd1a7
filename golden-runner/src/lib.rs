// Copyright (c) The golden Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

#![warn(missing_docs)]

//! Core functionality for golden, a golden-file test runner.
//!
//! The basic flow: [`TestList::discover`](test_list::TestList::discover) finds the tests in a
//! directory, a [`TestRunner`](runner::TestRunner) runs the interpreter over every test at once
//! and collects one outcome per test, and a [`TestReporter`](reporter::TestReporter) writes the
//! sorted report once all outcomes are in.

pub mod config;
pub mod errors;
pub mod exit_codes;
mod helpers;
pub mod reporter;
pub mod runner;
pub mod test_filter;
pub mod test_list;
