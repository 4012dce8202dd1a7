// Copyright (c) The golden Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration support for golden.

use crate::{
    errors::{ConfigParseError, ConfigParseErrorKind, JobsParseError},
    helpers::resolve_program,
};
use camino::{Utf8Path, Utf8PathBuf};
use config::{Config, ConfigBuilder, File, FileFormat, builder::DefaultState};
use serde::Deserialize;
use std::{fmt, str::FromStr, time::Duration};

/// Overall configuration for golden.
///
/// Configuration is layered: the defaults embedded in the binary come first, then
/// `.config/golden.toml` in the base directory (or an explicitly passed file). Command-line
/// options are applied on top of this by the caller, through
/// [`TestRunnerBuilder`](crate::runner::TestRunnerBuilder).
#[derive(Clone, Debug)]
pub struct GoldenConfig {
    base_dir: Utf8PathBuf,
    inner: GoldenConfigImpl,
}

impl GoldenConfig {
    /// The default location of the config within the base directory: `.config/golden.toml`.
    pub const CONFIG_PATH: &'static str = ".config/golden.toml";

    /// Contains the default config as a TOML file.
    ///
    /// Repository-specific configuration is layered on top of the default config.
    pub const DEFAULT_CONFIG: &'static str = include_str!("../default-config.toml");

    /// Reads the golden config from the given file, or if not specified from
    /// `.config/golden.toml` in the base directory.
    ///
    /// An explicitly specified file must exist. If no file is specified and the base directory
    /// doesn't have `.config/golden.toml`, the default config is used.
    pub fn from_sources(
        base_dir: impl Into<Utf8PathBuf>,
        config_file: Option<&Utf8Path>,
    ) -> Result<Self, ConfigParseError> {
        let base_dir = base_dir.into();

        let (config_file, source) = match config_file {
            Some(file) => (file.to_owned(), File::new(file.as_str(), FileFormat::Toml)),
            None => {
                let config_file = base_dir.join(Self::CONFIG_PATH);
                let source = File::new(config_file.as_str(), FileFormat::Toml).required(false);
                (config_file, source)
            }
        };

        let builder = Self::make_default_config().add_source(source);
        let inner = Self::build_and_deserialize_config(&builder)
            .map_err(|kind| ConfigParseError::new(config_file, kind))?;

        Ok(Self { base_dir, inner })
    }

    /// Returns the default golden config.
    pub fn default_config(base_dir: impl Into<Utf8PathBuf>) -> Self {
        let inner = Self::build_and_deserialize_config(&Self::make_default_config())
            .expect("default config is always valid");
        Self {
            base_dir: base_dir.into(),
            inner,
        }
    }

    /// Returns the absolute path to the test directory.
    pub fn test_dir(&self) -> Utf8PathBuf {
        self.base_dir.join(&self.inner.test_dir)
    }

    /// Returns the interpreter to invoke, resolved against the base directory.
    ///
    /// Bare program names (no path separator) are returned as-is, so they are looked up on
    /// `PATH` at spawn time.
    pub fn interpreter(&self) -> Utf8PathBuf {
        self.resolve_program(&self.inner.interpreter)
    }

    /// Resolves a program passed in from outside the config (e.g. on the command line) the same
    /// way [`interpreter`](Self::interpreter) is resolved.
    pub fn resolve_program(&self, program: &Utf8Path) -> Utf8PathBuf {
        resolve_program(&self.base_dir, program)
    }

    /// Returns the extension that marks test programs.
    pub fn input_extension(&self) -> &str {
        &self.inner.input_extension
    }

    /// Returns the extension of expected-output files.
    pub fn expected_extension(&self) -> &str {
        &self.inner.expected_extension
    }

    /// Returns the number of interpreters to run at once.
    pub fn jobs(&self) -> Jobs {
        self.inner.jobs
    }

    /// Returns the per-test timeout, if any.
    pub fn timeout(&self) -> Option<Duration> {
        self.inner.timeout
    }

    // ---
    // Helper methods
    // ---

    fn make_default_config() -> ConfigBuilder<DefaultState> {
        Config::builder().add_source(File::from_str(Self::DEFAULT_CONFIG, FileFormat::Toml))
    }

    fn build_and_deserialize_config(
        builder: &ConfigBuilder<DefaultState>,
    ) -> Result<GoldenConfigImpl, ConfigParseErrorKind> {
        let config = builder
            .build_cloned()
            .map_err(|err| ConfigParseErrorKind::BuildError(Box::new(err)))?;

        serde_path_to_error::deserialize(config)
            .map_err(|err| ConfigParseErrorKind::DeserializeError(Box::new(err)))
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct GoldenConfigImpl {
    test_dir: Utf8PathBuf,
    interpreter: Utf8PathBuf,
    input_extension: String,
    expected_extension: String,
    jobs: Jobs,
    #[serde(default, with = "humantime_serde")]
    timeout: Option<Duration>,
}

/// The number of interpreter processes to run at once.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Jobs {
    /// Run at most this many interpreters at once.
    Count(usize),

    /// Start every test immediately.
    Unlimited,
}

impl Jobs {
    /// Gets the actual concurrency limit for a run of `test_count` tests.
    ///
    /// The result is always at least 1.
    pub fn compute(self, test_count: usize) -> usize {
        match self {
            Self::Count(jobs) => jobs.max(1),
            Self::Unlimited => test_count.max(1),
        }
    }
}

impl FromStr for Jobs {
    type Err = JobsParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "unlimited" {
            return Ok(Self::Unlimited);
        }
        match s.parse::<usize>() {
            Ok(jobs) if jobs > 0 => Ok(Self::Count(jobs)),
            _ => Err(JobsParseError::new(s)),
        }
    }
}

impl fmt::Display for Jobs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Count(jobs) => write!(f, "{jobs}"),
            Self::Unlimited => write!(f, "unlimited"),
        }
    }
}

impl<'de> Deserialize<'de> for Jobs {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        struct V;

        impl serde::de::Visitor<'_> for V {
            type Value = Jobs;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                write!(formatter, "a positive integer or the string \"unlimited\"")
            }

            fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                if v == "unlimited" {
                    Ok(Jobs::Unlimited)
                } else {
                    Err(serde::de::Error::invalid_value(
                        serde::de::Unexpected::Str(v),
                        &self,
                    ))
                }
            }

            // Note that TOML uses i64, not u64.
            fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                if v > 0 {
                    Ok(Jobs::Count(v as usize))
                } else {
                    Err(serde::de::Error::invalid_value(
                        serde::de::Unexpected::Signed(v),
                        &self,
                    ))
                }
            }

            fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                if v > 0 {
                    Ok(Jobs::Count(v as usize))
                } else {
                    Err(serde::de::Error::invalid_value(
                        serde::de::Unexpected::Unsigned(v),
                        &self,
                    ))
                }
            }
        }

        deserializer.deserialize_any(V)
    }
}
