// Copyright (c) The golden Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

// Interpreters in these tests are /bin/sh, so they only run on Unix.
#![cfg(unix)]

mod basic;
mod fixtures;
