// Copyright (c) The golden Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! A golden-file test runner.
//!
//! golden runs an interpreter over every test program in a directory at once, and checks that
//! what each program prints matches its expected-output file. The core logic lives in the
//! `golden-runner` crate; this crate is the command-line interface.

#![warn(missing_docs)]

mod dispatch;
mod errors;
mod output;

#[doc(hidden)]
pub use dispatch::*;
#[doc(hidden)]
pub use errors::*;
#[doc(hidden)]
pub use output::OutputWriter;
