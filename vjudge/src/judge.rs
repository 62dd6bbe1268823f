// Copyright 2026 The vjudge Developers
// released under BSD 3-Clause License

use crate::assertion::{evaluate, AssertionParseError, AssertionResult};
use crate::discovery::{load_sources, load_tests, Test};
use crate::simulator::{Simulator, SimulatorError};
use crate::vcd::VcdParseError;
use crate::JudgeOptions;
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

/// Terminal status of a judge run. The numbering follows the exit codes of earlier
/// releases of the command line tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde1", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum ErrorCode {
    NoError = 0,
    OpeningVcdFile = 1,
    CompilingVerilogFile = 2,
    AssertionsFileWrongFormat = 3,
    AssertionsFileNotExists = 4,
    OpeningTestDirectory = 5,
    OpeningSrcDirectory = 6,
    HandlingTempDirectory = 7,
}

impl ErrorCode {
    pub fn message(self) -> &'static str {
        match self {
            ErrorCode::NoError => "Your code was judged successfully!",
            ErrorCode::OpeningVcdFile => "An error occurred while opening the .vcd file.",
            ErrorCode::CompilingVerilogFile => {
                "An error occurred while compiling your Verilog files."
            }
            ErrorCode::AssertionsFileWrongFormat => {
                "An error occurred while reading the assertion files."
            }
            ErrorCode::AssertionsFileNotExists => {
                "An error occurred while opening an assertion file."
            }
            ErrorCode::OpeningTestDirectory => {
                "An error occurred while opening the test directory."
            }
            ErrorCode::OpeningSrcDirectory => "An error occurred while opening the src directory.",
            ErrorCode::HandlingTempDirectory => {
                "An error occurred while handling the temp directory."
            }
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum JudgeError {
    #[error("[judge] failed to open src directory {path:?}")]
    OpeningSrcDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("[judge] failed to open test directory {path:?}")]
    OpeningTestDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("[judge] failed to open assertion file {path:?}")]
    AssertionsFileNotExists {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("[judge] invalid assertion file {path:?}")]
    AssertionsFileWrongFormat {
        path: PathBuf,
        #[source]
        source: AssertionParseError,
    },
    #[error("[judge] failed to simulate test `{test}`")]
    Simulation {
        test: String,
        #[source]
        source: SimulatorError,
    },
    #[error("[judge] failed to read the trace of test `{test}`")]
    Trace {
        test: String,
        #[source]
        source: VcdParseError,
    },
}

impl JudgeError {
    pub fn code(&self) -> ErrorCode {
        match self {
            JudgeError::OpeningSrcDirectory { .. } => ErrorCode::OpeningSrcDirectory,
            JudgeError::OpeningTestDirectory { .. } => ErrorCode::OpeningTestDirectory,
            JudgeError::AssertionsFileNotExists { .. } => ErrorCode::AssertionsFileNotExists,
            JudgeError::AssertionsFileWrongFormat { .. } => ErrorCode::AssertionsFileWrongFormat,
            JudgeError::Simulation { source, .. } => match source {
                SimulatorError::TempDir(_) => ErrorCode::HandlingTempDirectory,
                SimulatorError::MissingTrace { .. } => ErrorCode::OpeningVcdFile,
                SimulatorError::Spawn { .. } | SimulatorError::Failed { .. } => {
                    ErrorCode::CompilingVerilogFile
                }
            },
            JudgeError::Trace { .. } => ErrorCode::OpeningVcdFile,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde1", derive(serde::Serialize, serde::Deserialize))]
pub struct TestResult {
    pub name: String,
    /// All assertions passed. A test without assertions passes.
    pub passed: bool,
    pub passed_assertions: usize,
    pub assertions: Vec<AssertionResult>,
}

impl TestResult {
    pub fn total_assertions(&self) -> usize {
        self.assertions.len()
    }

    pub fn failed_assertions(&self) -> impl Iterator<Item = &AssertionResult> + '_ {
        self.assertions.iter().filter(|r| !r.passed)
    }
}

/// Folds the outcome of every assertion of a test into a verdict.
pub fn judge_test(name: impl Into<String>, assertions: Vec<AssertionResult>) -> TestResult {
    let passed_assertions = assertions.iter().filter(|r| r.passed).count();
    TestResult {
        name: name.into(),
        passed: passed_assertions == assertions.len(),
        passed_assertions,
        assertions,
    }
}

/// Outcome of judging one set of sources against all tests.
/// If `error` is set, the run was aborted and the counts only cover the tests
/// that were judged before the error.
#[derive(Debug)]
#[cfg_attr(feature = "serde1", derive(serde::Serialize))]
pub struct JudgeResult {
    #[cfg_attr(feature = "serde1", serde(skip))]
    pub error: Option<JudgeError>,
    pub passed: bool,
    pub passed_tests: usize,
    pub total_tests: usize,
    pub tests: Vec<TestResult>,
}

impl JudgeResult {
    /// A run that was aborted before any test could be judged.
    pub fn failed(error: JudgeError) -> Self {
        JudgeResult {
            error: Some(error),
            passed: false,
            passed_tests: 0,
            total_tests: 0,
            tests: Vec::new(),
        }
    }

    pub fn code(&self) -> ErrorCode {
        self.error
            .as_ref()
            .map(JudgeError::code)
            .unwrap_or(ErrorCode::NoError)
    }
}

/// Collects test results in order. The first error is terminal: it is kept and
/// every outcome pushed after it is dropped.
#[derive(Debug, Default)]
pub struct JudgeAggregator {
    total_tests: usize,
    passed_tests: usize,
    tests: Vec<TestResult>,
    error: Option<JudgeError>,
}

impl JudgeAggregator {
    pub fn new(total_tests: usize) -> Self {
        Self {
            total_tests,
            ..Default::default()
        }
    }

    /// Returns `false` once the run has been aborted.
    pub fn push(&mut self, outcome: Result<TestResult, JudgeError>) -> bool {
        if self.error.is_some() {
            return false;
        }
        match outcome {
            Ok(test) => {
                self.passed_tests += test.passed as usize;
                self.tests.push(test);
                true
            }
            Err(error) => {
                self.error = Some(error);
                false
            }
        }
    }

    pub fn finish(self) -> JudgeResult {
        let passed = self.error.is_none()
            && self.tests.len() == self.total_tests
            && self.passed_tests == self.total_tests;
        JudgeResult {
            error: self.error,
            passed,
            passed_tests: self.passed_tests,
            total_tests: self.total_tests,
            tests: self.tests,
        }
    }
}

/// Judges all Verilog sources in `src_dir` against every test in `test_dir`.
pub fn run_judge(
    test_dir: &Path,
    src_dir: &Path,
    simulator: &impl Simulator,
    options: &JudgeOptions,
) -> JudgeResult {
    let tests = match load_tests(test_dir) {
        Ok(tests) => tests,
        Err(e) => return aborted(e),
    };
    let sources = match load_sources(src_dir) {
        Ok(sources) => sources,
        Err(e) => return aborted(e),
    };
    tracing::debug!(
        tests = tests.len(),
        sources = sources.len(),
        "loaded tests and sources"
    );
    judge_tests(&tests, &sources, simulator, options)
}

fn aborted(error: JudgeError) -> JudgeResult {
    tracing::warn!(%error, "judge run aborted");
    JudgeResult::failed(error)
}

/// Runs every test against the same set of sources. Each test gets its own
/// simulation and trace, which makes it safe to run them on multiple threads.
pub fn judge_tests(
    tests: &[Test],
    sources: &[PathBuf],
    simulator: &impl Simulator,
    options: &JudgeOptions,
) -> JudgeResult {
    let mut aggregator = JudgeAggregator::new(tests.len());
    if options.multi_thread {
        // lowest index of a failed test, tests after it are not started anymore
        let first_failure = AtomicUsize::new(usize::MAX);
        let outcomes: Vec<_> = tests
            .par_iter()
            .enumerate()
            .map(|(index, test)| {
                if index > first_failure.load(Ordering::Relaxed) {
                    return None;
                }
                let outcome = run_test(test, sources, simulator);
                if outcome.is_err() {
                    first_failure.fetch_min(index, Ordering::Relaxed);
                }
                Some(outcome)
            })
            .collect();
        // a skipped test always comes after a failed one, so the fold stops before it
        for outcome in outcomes.into_iter().flatten() {
            if !aggregator.push(outcome) {
                break;
            }
        }
    } else {
        for test in tests {
            if !aggregator.push(run_test(test, sources, simulator)) {
                break;
            }
        }
    }
    let result = aggregator.finish();
    match &result.error {
        None => tracing::info!(
            passed = result.passed_tests,
            total = result.total_tests,
            "judged all tests"
        ),
        Some(error) => tracing::warn!(%error, "judge run aborted"),
    }
    result
}

/// Simulates a single test, parses its trace and checks all of its assertions.
pub fn run_test(
    test: &Test,
    sources: &[PathBuf],
    simulator: &impl Simulator,
) -> Result<TestResult, JudgeError> {
    tracing::debug!(test = %test.name, "simulating");
    let trace = simulator
        .compile_and_simulate(sources, &test.testbench)
        .map_err(|source| JudgeError::Simulation {
            test: test.name.clone(),
            source,
        })?;
    let doc = crate::vcd::read_from_bytes(&trace).map_err(|source| JudgeError::Trace {
        test: test.name.clone(),
        source,
    })?;
    let result = judge_test(&test.name, evaluate(&doc, &test.assertions));
    tracing::debug!(
        test = %test.name,
        passed = result.passed_assertions,
        total = result.total_assertions(),
        "checked assertions"
    );
    Ok(result)
}
