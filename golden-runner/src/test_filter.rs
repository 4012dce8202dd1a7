// Copyright (c) The golden Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Filtering tests by name.

use crate::errors::TestFilterBuildError;
use aho_corasick::AhoCorasick;

/// A filter for test identifiers.
///
/// A test matches if its identifier contains any of the patterns as a substring. With no patterns,
/// every test matches.
#[derive(Clone, Debug)]
pub struct TestFilter {
    name_match: NameMatch,
}

#[derive(Clone, Debug)]
enum NameMatch {
    MatchAll,
    MatchSet(Box<AhoCorasick>),
}

impl TestFilter {
    /// Creates a new `TestFilter` from the given patterns.
    ///
    /// If an empty slice is passed, the test filter matches all possible test names.
    pub fn new(patterns: &[impl AsRef<[u8]>]) -> Result<Self, TestFilterBuildError> {
        let name_match = if patterns.is_empty() {
            NameMatch::MatchAll
        } else {
            NameMatch::MatchSet(Box::new(AhoCorasick::new(patterns)?))
        };
        Ok(Self { name_match })
    }

    /// Creates a new `TestFilter` that matches every test.
    pub fn any() -> Self {
        Self {
            name_match: NameMatch::MatchAll,
        }
    }

    /// Returns true if the given test identifier matches this filter.
    pub fn is_match(&self, test_id: &str) -> bool {
        match &self.name_match {
            NameMatch::MatchAll => true,
            NameMatch::MatchSet(set) => set.is_match(test_id),
        }
    }
}
