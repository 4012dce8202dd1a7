// Copyright (c) The golden Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::fixtures::*;
use color_eyre::eyre::Result;
use golden_runner::{config::Jobs, runner::TestRunnerBuilder};
use indoc::indoc;
use pretty_assertions::assert_eq;
use std::{
    collections::BTreeSet,
    time::{Duration, Instant},
};
use test_case::test_case;

fn sh_builder() -> TestRunnerBuilder {
    let mut builder = TestRunnerBuilder::default();
    builder.set_interpreter(interpreter());
    builder
}

#[test]
fn test_pass_mismatch_and_missing_fixture() -> Result<()> {
    test_init();

    let dir = TestDir::new()?;
    dir.add("a", "printf 5", Some("5"))?
        .add("b", "printf 8", Some("7"))?
        .add("c", "printf 3", None)?;

    let test_list = dir.discover()?;
    let result = execute(&test_list, &dir.config(), &sh_builder())?;

    assert_eq!(result.run_finished_count, 1, "run finished exactly once");
    assert_eq!(result.stats.initial_run_count, 3);
    assert_eq!(result.stats.finished_count, 3);
    assert_eq!(result.stats.passed, 1);
    assert_eq!(result.stats.failed, 2);
    assert!(!result.stats.is_success());

    assert_eq!(result.get("a").kind, ObservedKind::Passed);
    assert_eq!(
        result.get("b").kind,
        ObservedKind::Mismatch {
            expected: "7".to_owned()
        }
    );
    assert_eq!(result.get("b").actual, "8");
    assert_eq!(result.get("c").kind, ObservedKind::FixtureRead);
    assert_eq!(result.get("c").actual, "3");

    let missing = dir.path().join("c.txt");
    let missing_err = std::fs::read_to_string(&missing).unwrap_err();
    assert_eq!(
        result.report,
        format!(
            indoc! {"
                ==> 1 successful tests:
                ✓ a
                ==> 2 failed tests:
                ✗ b
                  expected: 7
                  got: 8
                ✗ c
                  expected: error reading `{}`: {}
                  got: 3
                ==> 3 tests run: 1 passed, 2 failed
            "},
            missing, missing_err,
        ),
    );

    Ok(())
}

#[test]
fn test_empty_dir() -> Result<()> {
    test_init();

    let dir = TestDir::new()?;
    let test_list = dir.discover()?;
    assert!(test_list.is_empty());

    let start = Instant::now();
    let result = execute(&test_list, &dir.config(), &sh_builder())?;
    assert!(start.elapsed() < Duration::from_secs(5), "empty run returns promptly");

    assert_eq!(result.run_finished_count, 1);
    assert!(result.final_outcomes.is_empty());
    assert!(result.stats.is_success());
    assert_eq!(result.report, "", "neither section is printed");

    Ok(())
}

#[test_case("printf 5", "5", true ; "exact match")]
#[test_case("", "", true ; "empty output and empty fixture")]
#[test_case("echo 5", "5", false ; "trailing newline is significant")]
#[test_case("printf ' 5'", "5", false ; "leading whitespace is significant")]
#[test_case("printf 5; exit 3", "5", true ; "exit code is ignored")]
#[test_case("echo noise >&2; printf 5", "5", true ; "stderr is not compared")]
fn test_comparison(script: &str, expected: &str, passes: bool) -> Result<()> {
    test_init();

    let dir = TestDir::new()?;
    dir.add("t", script, Some(expected))?;
    let test_list = dir.discover()?;
    let result = execute(&test_list, &dir.config(), &sh_builder())?;

    assert_eq!(
        result.get("t").kind == ObservedKind::Passed,
        passes,
        "script {script:?} vs {expected:?}: {:?}",
        result.get("t"),
    );
    Ok(())
}

#[test]
fn test_stderr_retained_on_failure() -> Result<()> {
    test_init();

    let dir = TestDir::new()?;
    dir.add("t", "echo 'stack underflow' >&2; printf 1", Some("2"))?;
    let test_list = dir.discover()?;
    let result = execute(&test_list, &dir.config(), &sh_builder())?;

    let observed = result.get("t");
    assert_eq!(observed.actual, "1");
    assert_eq!(observed.stderr, "stack underflow\n");
    assert!(
        result.report.contains("  stderr: stack underflow\n"),
        "report shows stderr: {}",
        result.report,
    );
    Ok(())
}

#[test]
fn test_missing_interpreter() -> Result<()> {
    test_init();

    let dir = TestDir::new()?;
    dir.add("a", "printf 5", Some("5"))?
        .add("b", "printf 5", Some("5"))?;
    let test_list = dir.discover()?;

    let mut builder = TestRunnerBuilder::default();
    builder.set_interpreter(dir.path().join("does-not-exist"));
    let result = execute(&test_list, &dir.config(), &builder)?;

    assert_eq!(result.run_finished_count, 1);
    assert_eq!(result.stats.failed, 2);
    assert!(
        result.started.is_empty(),
        "no interpreter was spawned: {:?}",
        result.started
    );
    for id in ["a", "b"] {
        assert_eq!(result.get(id).kind, ObservedKind::Spawn);
        assert_eq!(result.get(id).actual, "");
    }
    Ok(())
}

#[test]
fn test_many_tests_out_of_order() -> Result<()> {
    test_init();

    let dir = TestDir::new()?;
    for i in 0..100 {
        // The first test in discovery order is the slowest.
        let script = if i == 0 {
            format!("sleep 1; printf {i}")
        } else {
            format!("printf {i}")
        };
        let expected = if i % 7 == 3 { "wrong".to_owned() } else { i.to_string() };
        dir.add(&format!("t{i:03}"), &script, Some(&expected))?;
    }

    let test_list = dir.discover()?;
    assert_eq!(test_list.run_count(), 100);
    let result = execute(&test_list, &dir.config(), &sh_builder())?;

    assert_eq!(result.run_finished_count, 1, "one report");
    assert_eq!(result.final_outcomes.len(), 100);
    let ids: BTreeSet<_> = result.final_outcomes.iter().map(|o| o.id.as_str()).collect();
    assert_eq!(ids.len(), 100, "no identifier twice, none missing");

    assert_ne!(
        result.finished.first().map(|o| o.id.as_str()),
        Some("t000"),
        "tests complete out of order"
    );
    assert_eq!(result.finished.last().map(|o| o.id.as_str()), Some("t000"));

    let failed_count = (0..100).filter(|i| i % 7 == 3).count();
    assert_eq!(result.stats.failed, failed_count);
    assert_eq!(result.stats.passed, 100 - failed_count);

    // Each section of the report is sorted.
    let passed_lines: Vec<_> = result
        .report
        .lines()
        .filter_map(|line| line.strip_prefix("✓ "))
        .collect();
    let mut sorted = passed_lines.clone();
    sorted.sort_unstable();
    assert_eq!(passed_lines, sorted);
    assert_eq!(passed_lines.len(), 100 - failed_count);

    Ok(())
}

#[test_case(Jobs::Count(1) ; "one at a time")]
#[test_case(Jobs::Count(4) ; "four at a time")]
#[test_case(Jobs::Unlimited ; "unlimited")]
fn test_jobs(jobs: Jobs) -> Result<()> {
    test_init();

    let dir = TestDir::new()?;
    for i in 0..10 {
        dir.add(&format!("t{i}"), &format!("printf {i}"), Some(&i.to_string()))?;
    }
    let test_list = dir.discover()?;

    let mut builder = sh_builder();
    builder.set_jobs(jobs);
    let result = execute(&test_list, &dir.config(), &builder)?;

    assert_eq!(result.stats.passed, 10);
    assert_eq!(result.started.len(), 10);
    assert!(result.stats.is_success());
    Ok(())
}

#[test]
fn test_timeout() -> Result<()> {
    test_init();

    let dir = TestDir::new()?;
    dir.add("fast", "printf 1", Some("1"))?
        .add("hang", "printf partial; exec sleep 30", Some("partial"))?;
    let test_list = dir.discover()?;

    let mut builder = sh_builder();
    builder.set_timeout(Duration::from_millis(500));

    let start = Instant::now();
    let result = execute(&test_list, &dir.config(), &builder)?;
    assert!(
        start.elapsed() < Duration::from_secs(20),
        "hung test was killed, took {:?}",
        start.elapsed()
    );

    assert_eq!(result.get("fast").kind, ObservedKind::Passed);
    let hang = result.get("hang");
    assert_eq!(hang.kind, ObservedKind::TimedOut);
    assert_eq!(hang.actual, "partial", "output captured before the timeout is kept");
    assert_eq!(result.stats.failed, 1);
    Ok(())
}

#[test]
fn test_non_utf8_output() -> Result<()> {
    test_init();

    let dir = TestDir::new()?;
    dir.add("raw", r"printf '\377'", None)?
        .add("raw_mismatch", r"printf '\101'", None)?;
    std::fs::write(dir.path().join("raw.txt"), [0xff])?;
    std::fs::write(dir.path().join("raw_mismatch.txt"), [0xff])?;
    let test_list = dir.discover()?;
    let result = execute(&test_list, &dir.config(), &sh_builder())?;

    // Output and expected output are both decoded lossily before comparison.
    assert_eq!(result.get("raw").kind, ObservedKind::Passed);
    let mismatch = result.get("raw_mismatch");
    assert_eq!(
        mismatch.kind,
        ObservedKind::Mismatch {
            expected: "\u{FFFD}".to_owned()
        }
    );
    assert_eq!(mismatch.actual, "A");
    Ok(())
}
