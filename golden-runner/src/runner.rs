// Copyright (c) The golden Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The test runner.
//!
//! The main structure in this module is [`TestRunner`].
//!
//! Every test is one interpreter process. Tests are started in discovery order and finish in
//! whatever order their processes exit; each sends exactly one outcome to a single collector,
//! which emits [`TestEvent::RunFinished`] once every outcome has arrived.

use crate::{
    config::{GoldenConfig, Jobs},
    errors::{DisplayErrorChain, TestRunnerBuildError, TestRunnerExecuteError},
    test_list::{TestCase, TestId, TestList},
};
use bytes::{Bytes, BytesMut};
use camino::{Utf8Path, Utf8PathBuf};
use futures::prelude::*;
use std::{
    convert::Infallible,
    fmt, io,
    process::{ExitStatus, Stdio},
    time::{Duration, Instant},
};
use tokio::{
    io::{AsyncRead, AsyncReadExt},
    runtime::Runtime,
    sync::mpsc::UnboundedSender,
};
use tracing::{debug, error};

/// The initial capacity of each output buffer, and the amount it grows by per read.
const CHUNK_SIZE: usize = 4 * 1024;

/// Test runner options.
#[derive(Debug, Default)]
pub struct TestRunnerBuilder {
    interpreter: Option<Utf8PathBuf>,
    jobs: Option<Jobs>,
    timeout: Option<Duration>,
}

impl TestRunnerBuilder {
    /// Sets the interpreter to run each test program with.
    pub fn set_interpreter(&mut self, interpreter: impl Into<Utf8PathBuf>) -> &mut Self {
        self.interpreter = Some(interpreter.into());
        self
    }

    /// Sets the number of interpreters to run at once.
    pub fn set_jobs(&mut self, jobs: Jobs) -> &mut Self {
        self.jobs = Some(jobs);
        self
    }

    /// Sets the time after which an interpreter is killed and its test marked as failed.
    pub fn set_timeout(&mut self, timeout: Duration) -> &mut Self {
        self.timeout = Some(timeout);
        self
    }

    /// Creates a new test runner.
    ///
    /// Options not set on the builder are taken from `config`.
    pub fn build<'a>(
        &self,
        test_list: &'a TestList,
        config: &GoldenConfig,
    ) -> Result<TestRunner<'a>, TestRunnerBuildError> {
        let interpreter = self
            .interpreter
            .clone()
            .unwrap_or_else(|| config.interpreter());
        let jobs = self
            .jobs
            .unwrap_or_else(|| config.jobs())
            .compute(test_list.run_count());
        let timeout = self.timeout.or_else(|| config.timeout());

        // Interpreters are I/O bound from our side: a single thread multiplexes every pipe and
        // fixture read.
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(TestRunnerBuildError::TokioRuntimeCreate)?;

        Ok(TestRunner {
            inner: TestRunnerInner {
                interpreter,
                jobs,
                timeout,
                test_list,
            },
            runtime,
        })
    }
}

/// Context for running tests.
///
/// Created using [`TestRunnerBuilder::build`].
#[derive(Debug)]
pub struct TestRunner<'a> {
    inner: TestRunnerInner<'a>,
    runtime: Runtime,
}

impl<'a> TestRunner<'a> {
    /// Returns the interpreter tests are run with.
    pub fn interpreter(&self) -> &Utf8Path {
        &self.inner.interpreter
    }

    /// Returns the maximum number of interpreters run at once.
    pub fn jobs(&self) -> usize {
        self.inner.jobs
    }

    /// Executes the listed tests, each one in its own process.
    ///
    /// The callback is called with the results of each test.
    pub fn execute<F>(&self, mut callback: F) -> Result<RunStats, TestRunnerExecuteError<Infallible>>
    where
        F: FnMut(TestEvent<'_>),
    {
        self.try_execute::<Infallible, _>(|test_event| {
            callback(test_event);
            Ok(())
        })
    }

    /// Executes the listed tests, each one in its own process.
    ///
    /// Accepts a callback that is called with the results of each test. If the callback returns an
    /// error, the callback is no longer called, but the run continues until every test has
    /// finished: there is no cancellation.
    pub fn try_execute<E, F>(&self, callback: F) -> Result<RunStats, TestRunnerExecuteError<E>>
    where
        F: FnMut(TestEvent<'_>) -> Result<(), E>,
    {
        self.inner.try_execute(&self.runtime, callback)
    }
}

#[derive(Debug)]
struct TestRunnerInner<'a> {
    interpreter: Utf8PathBuf,
    jobs: usize,
    timeout: Option<Duration>,
    test_list: &'a TestList,
}

impl<'a> TestRunnerInner<'a> {
    fn try_execute<E, F>(
        &self,
        runtime: &Runtime,
        callback: F,
    ) -> Result<RunStats, TestRunnerExecuteError<E>>
    where
        F: FnMut(TestEvent<'_>) -> Result<(), E>,
    {
        let mut ctx = CallbackContext::new(callback, self.test_list.run_count());
        ctx.run_started(self.test_list);

        let (run_sender, mut run_receiver) = tokio::sync::mpsc::unbounded_channel();

        // The stream owns run_sender, so the channel closes once the stream is done and dropped.
        let run_fut = {
            let stream = futures::stream::iter(self.test_list.iter())
                .map(move |test_case| {
                    let this_run_sender = run_sender.clone();
                    async move { self.run_test(test_case, &this_run_sender).await }
                })
                // buffer_unordered means tests are started in order but finish in any order.
                .buffer_unordered(self.jobs);
            async move { stream.collect::<()>().await }
        };

        let ctx_mut = &mut ctx;
        let exec_fut = async move {
            while !ctx_mut.is_finished() {
                match run_receiver.recv().await {
                    Some(event) => ctx_mut.handle_event(event),
                    // Every sender is gone, so no more outcomes can arrive.
                    None => break,
                }
            }
        };

        runtime.block_on(async {
            tokio::join!(run_fut, exec_fut);
        });

        ctx.run_finished()
    }

    // ---
    // Helper methods
    // ---

    /// Runs an individual test and sends its outcome to the collector.
    async fn run_test(
        &self,
        test_case: &'a TestCase,
        run_sender: &UnboundedSender<InternalTestEvent<'a>>,
    ) {
        let start = Instant::now();
        let outcome = self.run_test_inner(test_case, run_sender).await;

        // Failure to send means the receiver was dropped.
        let _ = run_sender.send(InternalTestEvent::Finished {
            test_case,
            outcome,
            time_taken: start.elapsed(),
        });
    }

    async fn run_test_inner(
        &self,
        test_case: &'a TestCase,
        run_sender: &UnboundedSender<InternalTestEvent<'a>>,
    ) -> TestOutcome {
        let id = test_case.id().clone();

        let output = match self.run_interpreter(test_case, run_sender).await {
            Ok(output) => output,
            Err(err) => {
                debug!("[{id}] failed to execute `{}`: {err}", self.interpreter);
                return TestOutcome::Failed(TestFailure {
                    id,
                    detail: FailureDetail::Spawn {
                        interpreter: self.interpreter.clone(),
                        err,
                    },
                    actual: String::new(),
                    stderr: String::new(),
                });
            }
        };

        let actual = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

        let detail = match output.result {
            ChildResult::Exited(Ok(exit_status)) => {
                debug!("[{id}] interpreter exited with {exit_status}");
                // The exit status is not part of the verdict: only output is compared.
                match read_expected(test_case.expected_path()).await {
                    Ok(expected) if expected == actual => return TestOutcome::Passed(id),
                    Ok(expected) => FailureDetail::Mismatch { expected },
                    Err(err) => {
                        error!(
                            "[{id}] error reading expected output `{}`: {}",
                            test_case.expected_path(),
                            DisplayErrorChain(&err),
                        );
                        FailureDetail::FixtureRead {
                            path: test_case.expected_path().to_owned(),
                            err,
                        }
                    }
                }
            }
            ChildResult::Exited(Err(err)) => FailureDetail::Capture { err },
            ChildResult::TimedOut(after) => {
                debug!("[{id}] interpreter killed after {after:?}");
                FailureDetail::TimedOut { after }
            }
        };

        TestOutcome::Failed(TestFailure {
            id,
            detail,
            actual,
            stderr,
        })
    }

    /// Runs the interpreter over a test's program, capturing its output until it exits.
    ///
    /// Returns an error only if the process could not be spawned.
    async fn run_interpreter(
        &self,
        test_case: &'a TestCase,
        run_sender: &UnboundedSender<InternalTestEvent<'a>>,
    ) -> io::Result<ChildOutput> {
        let mut cmd = tokio::process::Command::new(self.interpreter.as_std_path());
        cmd.arg(test_case.input_path().as_std_path())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd.spawn()?;
        debug!(
            "[{}] spawned `{} {}` (pid {:?})",
            test_case.id(),
            self.interpreter,
            test_case.input_path(),
            child.id(),
        );
        let _ = run_sender.send(InternalTestEvent::Started { test_case });

        let child_stdout = child.stdout.take();
        let child_stderr = child.stderr.take();
        let mut stdout = BytesMut::with_capacity(CHUNK_SIZE);
        let mut stderr = BytesMut::with_capacity(CHUNK_SIZE);

        let res = {
            // The test is done once the process has exited *and* both pipes are closed, so that
            // output written just before exit isn't lost.
            let exec_fut = async {
                let (stdout_res, stderr_res, exit_res) = tokio::join!(
                    read_all(child_stdout, &mut stdout),
                    read_all(child_stderr, &mut stderr),
                    child.wait(),
                );
                stdout_res?;
                stderr_res?;
                Ok::<_, io::Error>(exit_res?)
            };

            match self.timeout {
                Some(timeout) => match tokio::time::timeout(timeout, exec_fut).await {
                    Ok(res) => ChildResult::Exited(res),
                    Err(_) => ChildResult::TimedOut(timeout),
                },
                None => ChildResult::Exited(exec_fut.await),
            }
        };

        if let ChildResult::TimedOut(_) = res {
            // The process may exit on its own between the timeout firing and the kill: ignore
            // errors here.
            let _ = child.start_kill();
            let _ = child.wait().await;
        }

        Ok(ChildOutput {
            stdout: stdout.freeze(),
            stderr: stderr.freeze(),
            result: res,
        })
    }
}

/// Reads an expected-output file, decoding it the same way interpreter output is decoded.
async fn read_expected(path: &Utf8Path) -> io::Result<String> {
    let bytes = tokio::fs::read(path).await?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Reads `reader` to completion, appending each chunk to `acc` in arrival order.
async fn read_all<R: AsyncRead + Unpin>(reader: Option<R>, acc: &mut BytesMut) -> io::Result<()> {
    if let Some(mut reader) = reader {
        loop {
            acc.reserve(CHUNK_SIZE);
            let bytes_read = reader.read_buf(acc).await?;
            if bytes_read == 0 {
                break;
            }
        }
    }
    Ok(())
}

struct ChildOutput {
    stdout: Bytes,
    stderr: Bytes,
    result: ChildResult,
}

enum ChildResult {
    Exited(io::Result<ExitStatus>),
    TimedOut(Duration),
}

/// The final verdict for a single test.
#[derive(Debug)]
pub enum TestOutcome {
    /// The interpreter's output matched the expected output exactly.
    Passed(TestId),

    /// The test failed.
    Failed(TestFailure),
}

impl TestOutcome {
    /// Returns the identifier of the test.
    pub fn id(&self) -> &TestId {
        match self {
            Self::Passed(id) => id,
            Self::Failed(failure) => &failure.id,
        }
    }

    /// Returns true if the test passed.
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Passed(_))
    }
}

/// Information about a failed test.
#[derive(Debug)]
pub struct TestFailure {
    /// The identifier of the test.
    pub id: TestId,

    /// Why the test failed.
    pub detail: FailureDetail,

    /// Everything the interpreter wrote to standard output, decoded as UTF-8 (lossily).
    pub actual: String,

    /// Everything the interpreter wrote to standard error, decoded as UTF-8 (lossily).
    pub stderr: String,
}

/// The reason a test failed.
#[derive(Debug)]
#[non_exhaustive]
pub enum FailureDetail {
    /// The interpreter ran, but its output differed from the expected output.
    Mismatch {
        /// The contents of the expected-output file, decoded as UTF-8 (lossily).
        expected: String,
    },

    /// The expected-output file could not be read.
    FixtureRead {
        /// The path to the expected-output file.
        path: Utf8PathBuf,

        /// The underlying error.
        err: io::Error,
    },

    /// The interpreter could not be started.
    Spawn {
        /// The interpreter that was invoked.
        interpreter: Utf8PathBuf,

        /// The underlying error.
        err: io::Error,
    },

    /// Reading the interpreter's output or waiting for it to exit failed.
    Capture {
        /// The underlying error.
        err: io::Error,
    },

    /// The interpreter was killed after running for too long.
    TimedOut {
        /// The timeout that was exceeded.
        after: Duration,
    },
}

impl fmt::Display for FailureDetail {
    /// Formats the detail the way the report shows it on the `expected:` line: the expected text
    /// for a mismatch, otherwise a description of the error.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Mismatch { expected } => f.write_str(expected),
            Self::FixtureRead { path, err } => {
                write!(f, "error reading `{path}`: {}", DisplayErrorChain(err))
            }
            Self::Spawn { interpreter, err } => {
                write!(f, "error executing `{interpreter}`: {}", DisplayErrorChain(err))
            }
            Self::Capture { err } => {
                write!(f, "error capturing output: {}", DisplayErrorChain(err))
            }
            Self::TimedOut { after } => {
                write!(f, "timed out after {:.3}s", after.as_secs_f64())
            }
        }
    }
}

/// A test event.
///
/// Events are produced by a [`TestRunner`] and consumed by the callback passed to
/// [`TestRunner::execute`].
#[derive(Debug)]
pub enum TestEvent<'a> {
    /// The test run started.
    RunStarted {
        /// The list of tests that will be run.
        test_list: &'a TestList,
    },

    /// A test's interpreter was spawned.
    ///
    /// Not produced for tests whose interpreter could not be started.
    TestStarted {
        /// The test that was started.
        test_case: &'a TestCase,
    },

    /// A test finished running.
    TestFinished {
        /// The test that finished.
        test_case: &'a TestCase,

        /// The outcome of the test.
        outcome: &'a TestOutcome,

        /// The time between starting the interpreter and producing the outcome.
        time_taken: Duration,

        /// Statistics for the run so far, including this test.
        current_stats: RunStats,
    },

    /// Every test has an outcome.
    ///
    /// This is produced exactly once per run.
    RunFinished {
        /// The outcome of every test, in the order the tests finished.
        outcomes: &'a [TestOutcome],

        /// Statistics for the run.
        run_stats: RunStats,

        /// The time the run took.
        elapsed: Duration,
    },
}

/// Statistics for a test run.
#[derive(Copy, Clone, Default, Debug, Eq, PartialEq)]
pub struct RunStats {
    /// The total number of tests that were expected to be run at the beginning.
    pub initial_run_count: usize,

    /// The total number of tests that finished running.
    pub finished_count: usize,

    /// The number of tests that passed.
    pub passed: usize,

    /// The number of tests that failed.
    pub failed: usize,
}

impl RunStats {
    /// Returns true if this run is considered a success.
    ///
    /// A run is a failure if any test failed, or if not every test finished.
    pub fn is_success(&self) -> bool {
        self.initial_run_count == self.finished_count && !self.any_failed()
    }

    /// Returns true if any tests failed.
    #[inline]
    pub fn any_failed(&self) -> bool {
        self.failed > 0
    }

    fn on_test_finished(&mut self, outcome: &TestOutcome) {
        self.finished_count += 1;
        match outcome {
            TestOutcome::Passed(_) => self.passed += 1,
            TestOutcome::Failed(_) => self.failed += 1,
        }
    }
}

/// The aggregate for a run: owned by the collector, and only ever touched from it.
struct CallbackContext<F, E> {
    callback: F,
    start: Instant,
    run_stats: RunStats,
    outcomes: Vec<TestOutcome>,
    reported: bool,
    first_error: Option<E>,
}

impl<'a, F, E> CallbackContext<F, E>
where
    F: FnMut(TestEvent<'_>) -> Result<(), E>,
{
    fn new(callback: F, initial_run_count: usize) -> Self {
        Self {
            callback,
            start: Instant::now(),
            run_stats: RunStats {
                initial_run_count,
                ..RunStats::default()
            },
            outcomes: Vec::with_capacity(initial_run_count),
            reported: false,
            first_error: None,
        }
    }

    fn run_started(&mut self, test_list: &'a TestList) {
        self.call(TestEvent::RunStarted { test_list });
        // An empty run is finished before it starts.
        self.maybe_report();
    }

    fn is_finished(&self) -> bool {
        self.run_stats.finished_count == self.run_stats.initial_run_count
    }

    fn handle_event(&mut self, event: InternalTestEvent<'a>) {
        match event {
            InternalTestEvent::Started { test_case } => {
                self.call(TestEvent::TestStarted { test_case });
            }
            InternalTestEvent::Finished {
                test_case,
                outcome,
                time_taken,
            } => {
                debug_assert!(
                    self.run_stats.finished_count < self.run_stats.initial_run_count,
                    "more outcomes than tests"
                );
                self.run_stats.on_test_finished(&outcome);
                self.call(TestEvent::TestFinished {
                    test_case,
                    outcome: &outcome,
                    time_taken,
                    current_stats: self.run_stats,
                });
                self.outcomes.push(outcome);
                self.maybe_report();
            }
        }
    }

    /// Emits `RunFinished` if every test has an outcome and it hasn't been emitted yet.
    fn maybe_report(&mut self) {
        if self.reported || !self.is_finished() {
            return;
        }
        self.reported = true;

        let event = TestEvent::RunFinished {
            outcomes: &self.outcomes,
            run_stats: self.run_stats,
            elapsed: self.start.elapsed(),
        };
        if self.first_error.is_none() {
            if let Err(err) = (self.callback)(event) {
                self.first_error = Some(err);
            }
        }
    }

    fn call(&mut self, event: TestEvent<'_>) {
        // Once the callback has failed, stop calling it.
        if self.first_error.is_some() {
            return;
        }
        if let Err(err) = (self.callback)(event) {
            self.first_error = Some(err);
        }
    }

    fn run_finished(self) -> Result<RunStats, TestRunnerExecuteError<E>> {
        if !self.reported {
            return Err(TestRunnerExecuteError::Incomplete {
                finished: self.run_stats.finished_count,
                total: self.run_stats.initial_run_count,
            });
        }
        match self.first_error {
            None => Ok(self.run_stats),
            Some(err) => Err(TestRunnerExecuteError::Callback(err)),
        }
    }
}

#[derive(Debug)]
enum InternalTestEvent<'a> {
    Started {
        test_case: &'a TestCase,
    },
    Finished {
        test_case: &'a TestCase,
        outcome: TestOutcome,
        time_taken: Duration,
    },
}
