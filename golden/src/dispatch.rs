// Copyright (c) The golden Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::{
    ExpectedError,
    errors::Result,
    output::{OutputContext, OutputOpts, OutputWriter},
};
use camino::{Utf8Path, Utf8PathBuf};
use clap::{Args, Parser, ValueEnum};
use golden_runner::{
    config::{GoldenConfig, Jobs},
    errors::WriteReportError,
    exit_codes::GoldenExitCode,
    reporter::{MessageFormat, TestReporterBuilder},
    runner::{TestEvent, TestRunnerBuilder},
    test_filter::TestFilter,
    test_list::TestList,
};
use std::io::Write;
use tracing::{debug, info};

/// Runs an interpreter over a directory of test programs and compares what each one prints to
/// its expected output.
///
/// Every `<id>.<extension>` file in the test directory is a test: it is passed as the only
/// argument to the interpreter, and the interpreter's standard output must match
/// `<id>.<expected-extension>` exactly.
#[derive(Debug, Parser)]
#[command(
    version,
    name = "golden",
    max_term_width = 100,
    styles = crate::output::clap_styles::style()
)]
pub struct GoldenApp {
    #[command(flatten)]
    output: OutputOpts,

    #[command(flatten)]
    config_opts: ConfigOpts,

    #[command(flatten)]
    discovery_opts: DiscoveryOpts,

    #[command(flatten)]
    runner_opts: TestRunnerOpts,

    #[command(flatten)]
    reporter_opts: TestReporterOpts,

    /// List the tests that would be run, without running them
    #[arg(long)]
    list: bool,

    /// Only run tests whose names contain one of these substrings
    #[arg(value_name = "FILTERS")]
    filters: Vec<String>,
}

impl GoldenApp {
    /// Initializes the output context.
    pub fn init_output(&self) -> OutputContext {
        self.output.init()
    }

    /// Executes the app, returning the exit code.
    pub fn exec(self, output: OutputContext, output_writer: &mut OutputWriter) -> Result<i32> {
        let current_dir = std::env::current_dir().map_err(ExpectedError::current_dir_failed)?;
        let base_dir = Utf8PathBuf::try_from(current_dir)
            .map_err(ExpectedError::current_dir_invalid_utf8)?;
        self.exec_in(&base_dir, output, output_writer)
    }

    fn exec_in(
        self,
        base_dir: &Utf8Path,
        output: OutputContext,
        output_writer: &mut OutputWriter,
    ) -> Result<i32> {
        let config = self.config_opts.make_config(base_dir)?;
        let filter = TestFilter::new(&self.filters)?;
        let test_list = self.discovery_opts.discover(base_dir, &config, &filter)?;

        if self.list {
            let colorize = output.color.should_colorize(supports_color::Stream::Stdout);
            let mut writer = output_writer.stdout_writer();
            test_list
                .write_human(&mut writer, colorize)
                .and_then(|()| writer.flush())
                .map_err(ExpectedError::write_test_list_error)?;
            return Ok(GoldenExitCode::OK);
        }

        let mut reporter = self.reporter_opts.to_builder(output).build();
        if self.reporter_opts.message_format == MessageFormatOpt::Human
            && output.color.should_colorize(supports_color::Stream::Stdout)
        {
            reporter.colorize();
        }

        let runner = self.runner_opts.to_builder(&config).build(&test_list, &config)?;
        debug!(
            "running {} tests in {} with `{}` ({} at a time)",
            test_list.run_count(),
            test_list.test_dir(),
            runner.interpreter(),
            runner.jobs(),
        );
        if test_list.skip_count() > 0 {
            info!("{} tests skipped by name filter", test_list.skip_count());
        }

        let mut writer = output_writer.stdout_writer();
        let run_stats = runner.try_execute(|event| {
            if let TestEvent::TestFinished {
                outcome,
                time_taken,
                current_stats,
                ..
            } = &event
            {
                debug!(
                    "[{}/{}] {} {} in {:.3}s",
                    current_stats.finished_count,
                    current_stats.initial_run_count,
                    outcome.id(),
                    if outcome.is_success() { "passed" } else { "failed" },
                    time_taken.as_secs_f64(),
                );
            }
            reporter.report_event(&event, &mut writer)?;
            writer.flush().map_err(WriteReportError::Io)
        })?;

        if !run_stats.is_success() {
            return Err(ExpectedError::test_run_failed());
        }
        Ok(GoldenExitCode::OK)
    }
}

#[derive(Debug, Args)]
struct ConfigOpts {
    /// Config file [default: .config/golden.toml in the current directory]
    #[arg(long, value_name = "PATH", env = "GOLDEN_CONFIG_FILE")]
    config_file: Option<Utf8PathBuf>,
}

impl ConfigOpts {
    fn make_config(&self, base_dir: &Utf8Path) -> Result<GoldenConfig> {
        let config_file = self.config_file.as_deref().map(|file| base_dir.join(file));
        Ok(GoldenConfig::from_sources(base_dir, config_file.as_deref())?)
    }
}

#[derive(Debug, Args)]
#[command(next_help_heading = "Discovery options")]
struct DiscoveryOpts {
    /// Directory containing test programs and expected outputs [default: from config]
    #[arg(long, value_name = "DIR", env = "GOLDEN_TEST_DIR")]
    test_dir: Option<Utf8PathBuf>,

    /// Extension of test programs [default: from config]
    #[arg(long, value_name = "EXT", env = "GOLDEN_EXTENSION")]
    extension: Option<String>,

    /// Extension of expected-output files [default: from config]
    #[arg(long, value_name = "EXT", env = "GOLDEN_EXPECTED_EXTENSION")]
    expected_extension: Option<String>,
}

impl DiscoveryOpts {
    fn discover(
        &self,
        base_dir: &Utf8Path,
        config: &GoldenConfig,
        filter: &TestFilter,
    ) -> Result<TestList> {
        let test_dir = match &self.test_dir {
            Some(test_dir) => base_dir.join(test_dir),
            None => config.test_dir(),
        };
        let input_extension = self
            .extension
            .as_deref()
            .unwrap_or_else(|| config.input_extension());
        let expected_extension = self
            .expected_extension
            .as_deref()
            .unwrap_or_else(|| config.expected_extension());

        Ok(TestList::discover(
            test_dir,
            input_extension,
            expected_extension,
            filter,
        )?)
    }
}

#[derive(Debug, Args)]
#[command(next_help_heading = "Runner options")]
struct TestRunnerOpts {
    /// Interpreter to run each test program with [default: from config]
    #[arg(long, value_name = "PATH", env = "GOLDEN_INTERPRETER")]
    interpreter: Option<Utf8PathBuf>,

    /// Number of interpreters to run at once, or "unlimited" [default: from config]
    #[arg(long, short = 'j', value_name = "JOBS", env = "GOLDEN_JOBS")]
    jobs: Option<Jobs>,

    /// Kill interpreters that run longer than this, e.g. "30s" [default: from config]
    #[arg(long, value_name = "DURATION", env = "GOLDEN_TIMEOUT")]
    timeout: Option<humantime::Duration>,
}

impl TestRunnerOpts {
    fn to_builder(&self, config: &GoldenConfig) -> TestRunnerBuilder {
        let mut builder = TestRunnerBuilder::default();
        if let Some(interpreter) = &self.interpreter {
            builder.set_interpreter(config.resolve_program(interpreter));
        }
        if let Some(jobs) = self.jobs {
            builder.set_jobs(jobs);
        }
        if let Some(timeout) = self.timeout {
            builder.set_timeout(timeout.into());
        }
        builder
    }
}

#[derive(Debug, Args)]
#[command(next_help_heading = "Reporter options")]
struct TestReporterOpts {
    /// Format of the final report
    #[arg(
        long,
        value_enum,
        default_value_t,
        value_name = "FMT",
        env = "GOLDEN_MESSAGE_FORMAT"
    )]
    message_format: MessageFormatOpt,
}

impl TestReporterOpts {
    fn to_builder(&self, output: OutputContext) -> TestReporterBuilder {
        let mut builder = TestReporterBuilder::default();
        builder
            .set_message_format(self.message_format.into())
            .set_ascii_only(!output.unicode);
        builder
    }
}

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, ValueEnum)]
enum MessageFormatOpt {
    /// A report for humans, with colors if supported
    #[default]
    Human,
    /// A single JSON document
    Json,
}

impl From<MessageFormatOpt> for MessageFormat {
    fn from(opt: MessageFormatOpt) -> Self {
        match opt {
            MessageFormatOpt::Human => MessageFormat::Human,
            MessageFormatOpt::Json => MessageFormat::Json,
        }
    }
}
