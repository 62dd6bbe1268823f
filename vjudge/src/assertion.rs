// Copyright 2026 The vjudge Developers
// released under BSD 3-Clause License

use crate::trace::{Time, TraceDocument};
use std::fmt::{Display, Formatter};
use std::io::BufRead;

/// Expects `signal` to carry exactly `expected` at `time`.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde1", derive(serde::Serialize, serde::Deserialize))]
pub struct Assertion {
    pub signal: String,
    pub expected: String,
    pub time: Time,
}

impl Assertion {
    pub fn new(time: Time, signal: impl Into<String>, expected: impl Into<String>) -> Self {
        Self {
            signal: signal.into(),
            expected: expected.into(),
            time,
        }
    }
}

impl Display for Assertion {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}={}", self.time, self.signal, self.expected)
    }
}

/// What the trace contained for an assertion.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde1", derive(serde::Serialize, serde::Deserialize))]
pub enum Observed {
    /// The trace declares no signal with this name.
    NotFound,
    /// The signal exists, but was not assigned at or before the time of the assertion.
    Undefined,
    Value(String),
}

impl Observed {
    pub fn value(&self) -> Option<&str> {
        match self {
            Observed::Value(v) => Some(v),
            _ => None,
        }
    }
}

impl Display for Observed {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Observed::NotFound => write!(f, "not found"),
            Observed::Undefined => write!(f, "undefined"),
            Observed::Value(v) => write!(f, "{v}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde1", derive(serde::Serialize, serde::Deserialize))]
pub struct AssertionResult {
    pub assertion: Assertion,
    pub passed: bool,
    pub actual: Observed,
}

/// Checks every assertion against the trace. Results are returned in the same order
/// as the assertions. Missing signals and mismatching values are recorded as failed
/// results, they never abort the evaluation.
pub fn evaluate(doc: &TraceDocument, assertions: &[Assertion]) -> Vec<AssertionResult> {
    assertions.iter().map(|a| check(doc, a)).collect()
}

fn check(doc: &TraceDocument, assertion: &Assertion) -> AssertionResult {
    let actual = match doc.get_signal_by_name(&assertion.signal) {
        None => Observed::NotFound,
        Some(signal) => match signal.value_at(assertion.time) {
            None => Observed::Undefined,
            Some(value) => Observed::Value(value.to_string()),
        },
    };
    // values are compared as strings, `1` and `01` are different
    let passed = actual.value() == Some(assertion.expected.as_str());
    AssertionResult {
        assertion: assertion.clone(),
        passed,
        actual,
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AssertionParseError {
    #[error("[assertion] failed to read assertions")]
    Io(#[from] std::io::Error),
    #[error("[assertion] line {line}: expected `<time> <signal>=<value>`, not `{text}`")]
    WrongFormat { line: usize, text: String },
}

/// Reads assertions in the `<time> <signal>=<value>` format, one per line.
/// Empty lines are skipped.
pub fn parse_assertions(input: impl BufRead) -> Result<Vec<Assertion>, AssertionParseError> {
    let mut out = Vec::new();
    for (ii, line) in input.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let assertion = parse_assertion_line(&line).ok_or_else(|| {
            AssertionParseError::WrongFormat {
                line: ii + 1,
                text: line.clone(),
            }
        })?;
        out.push(assertion);
    }
    Ok(out)
}

fn parse_assertion_line(line: &str) -> Option<Assertion> {
    let (time, rest) = line.trim_start().split_once(char::is_whitespace)?;
    let time = time.parse::<Time>().ok()?;
    let (signal, expected) = rest.split_once('=')?;
    let signal = signal.trim();
    let expected = expected.trim();
    if signal.is_empty() || expected.is_empty() {
        return None;
    }
    Some(Assertion::new(time, signal, expected))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vcd::read_from_bytes;

    const CLK: &str = "$scope module tb $end\n$var wire 1 ! clk $end\n$var wire 4 \" cnt $end\n\
                       $upscope $end\n$enddefinitions $end\n#0\n0!\nb0 \"\n#5\n1!\nb1 \"\n#10\n0!\n";

    #[test]
    fn test_parse_assertions() {
        let input = "0 clk=0\n\n  7 clk=1\n12 cnt=b1\n15 bus = b1010  \n";
        let assertions = parse_assertions(input.as_bytes()).unwrap();
        assert_eq!(
            assertions,
            [
                Assertion::new(0, "clk", "0"),
                Assertion::new(7, "clk", "1"),
                Assertion::new(12, "cnt", "b1"),
                Assertion::new(15, "bus", "b1010"),
            ]
        );
    }

    #[test]
    fn test_parse_assertions_wrong_format() {
        for (input, bad_line) in [
            ("0 clk=0\nclk=1\n", 2),
            ("-1 clk=1\n", 1),
            ("5 clk\n", 1),
            ("5 clk=\n", 1),
            ("5 =1\n", 1),
            ("5\n", 1),
        ] {
            match parse_assertions(input.as_bytes()) {
                Err(AssertionParseError::WrongFormat { line, .. }) => {
                    assert_eq!(line, bad_line, "{input:?}")
                }
                other => panic!("{input:?} should not parse: {other:?}"),
            }
        }
    }

    #[test]
    fn test_evaluate_clock() {
        let doc = read_from_bytes(CLK.as_bytes()).unwrap();
        let results = evaluate(
            &doc,
            &[
                Assertion::new(7, "clk", "1"),
                Assertion::new(3, "clk", "1"),
                Assertion::new(7, "cnt", "b1"),
                Assertion::new(7, "cnt", "b01"),
            ],
        );
        let passed: Vec<_> = results.iter().map(|r| r.passed).collect();
        assert_eq!(passed, [true, false, true, false]);
        assert_eq!(results[1].actual, Observed::Value("0".to_string()));
        assert_eq!(results[3].actual.to_string(), "b1");
    }

    #[test]
    fn test_evaluate_missing_and_undefined() {
        let doc = read_from_bytes(CLK.as_bytes()).unwrap();
        let results = evaluate(
            &doc,
            &[
                Assertion::new(5, "rst", "0"),
                Assertion::new(5, "clk", "1"),
            ],
        );
        assert!(!results[0].passed);
        assert_eq!(results[0].actual, Observed::NotFound);
        assert_eq!(results[0].actual.to_string(), "not found");
        // evaluation continues after a missing signal
        assert!(results[1].passed);

        let doc = read_from_bytes(b"$scope module tb $end $var wire 1 ! a $end #4 1!").unwrap();
        let results = evaluate(&doc, &[Assertion::new(2, "a", "x")]);
        assert!(!results[0].passed);
        assert_eq!(results[0].actual, Observed::Undefined);
    }

    #[test]
    fn test_evaluate_keeps_order() {
        let doc = read_from_bytes(CLK.as_bytes()).unwrap();
        let assertions: Vec<_> = (0..20)
            .rev()
            .map(|t| Assertion::new(t, "clk", "1"))
            .collect();
        let results = evaluate(&doc, &assertions);
        let order: Vec<_> = results.iter().map(|r| r.assertion.clone()).collect();
        assert_eq!(order, assertions);
    }
}
