// Copyright 2026 The vjudge Developers
// released under BSD 3-Clause License

mod assertion;
mod discovery;
mod judge;
pub mod simulator;
mod trace;
pub mod vcd;

#[derive(Debug, Copy, Clone)]
pub struct JudgeOptions {
    /// Indicates that tests should be simulated and checked on multiple threads.
    pub multi_thread: bool,
}

impl Default for JudgeOptions {
    fn default() -> Self {
        Self { multi_thread: true }
    }
}

pub use assertion::{
    evaluate, parse_assertions, Assertion, AssertionParseError, AssertionResult, Observed,
};
pub use discovery::{load_sources, load_tests, Test};
pub use judge::{
    judge_test, judge_tests, run_judge, run_test, ErrorCode, JudgeAggregator, JudgeError,
    JudgeResult, TestResult,
};
pub use simulator::{IcarusVerilog, Simulator, SimulatorError};
pub use trace::{Signal, SignalRef, Time, Timescale, TimescaleUnit, TraceDocument, ValueChange};
pub use vcd::VcdParseError;
