// Copyright (c) The golden Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use camino::{Utf8Path, Utf8PathBuf};
use icu_collator::{Collator, CollatorBorrowed, options::CollatorOptions};
use std::cmp::Ordering;

/// Resolves a program path against `base_dir`.
///
/// Paths with more than one component (`.bin/mvm`, `./mvm`) are joined onto `base_dir`. A bare
/// name like `python3` is returned unchanged so that spawning looks it up on `PATH`.
pub(crate) fn resolve_program(base_dir: &Utf8Path, program: &Utf8Path) -> Utf8PathBuf {
    if program.is_absolute() || program.components().count() <= 1 {
        program.to_owned()
    } else {
        base_dir.join(program)
    }
}

thread_local! {
    static COLLATOR: CollatorBorrowed<'static> =
        Collator::try_new(Default::default(), CollatorOptions::default())
            .expect("root collation data is compiled in");
}

/// Compares two test identifiers for display.
///
/// Identifiers are ordered by the Unicode collation algorithm with the root locale at tertiary
/// strength, so `é` sorts with `e` and punctuation sorts before digits. Names the collator treats
/// as equal fall back to a bytewise comparison, keeping the result consistent with `==`.
pub(crate) fn collate(a: &str, b: &str) -> Ordering {
    COLLATOR
        .with(|collator| collator.compare(a, b))
        .then_with(|| a.cmp(b))
}
