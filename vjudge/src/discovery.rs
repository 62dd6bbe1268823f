// Copyright 2026 The vjudge Developers
// released under BSD 3-Clause License
//
// Finds the tests and the sources to judge on disk.
// A test `<name>` consists of a testbench `<name>-test.v` and an assertion file
// `<name>-assertion.txt` in the same directory.

use crate::assertion::{parse_assertions, Assertion};
use crate::judge::JudgeError;
use std::io::BufReader;
use std::path::{Path, PathBuf};

const TESTBENCH_SUFFIX: &str = "-test.v";
const ASSERTION_SUFFIX: &str = "-assertion.txt";
const SOURCE_EXTENSION: &str = "v";

/// A named testbench with the assertions to check against its trace.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde1", derive(serde::Serialize, serde::Deserialize))]
pub struct Test {
    pub name: String,
    pub testbench: PathBuf,
    pub assertions: Vec<Assertion>,
}

/// Returns all tests in `test_dir`, sorted by name. Paths are absolute.
pub fn load_tests(test_dir: &Path) -> Result<Vec<Test>, JudgeError> {
    let opening_error = |source: std::io::Error| JudgeError::OpeningTestDirectory {
        path: test_dir.to_path_buf(),
        source,
    };
    let test_dir = test_dir.canonicalize().map_err(opening_error)?;
    let mut names = Vec::new();
    for entry in std::fs::read_dir(&test_dir).map_err(opening_error)? {
        let entry = entry.map_err(opening_error)?;
        if entry.file_type().map_err(opening_error)?.is_dir() {
            continue;
        }
        if let Some(name) = test_name(&entry.file_name().to_string_lossy()) {
            names.push(name.to_string());
        }
    }
    names.sort();
    names.dedup();

    names
        .into_iter()
        .map(|name| -> Result<Test, JudgeError> {
            let testbench = test_dir.join(format!("{name}{TESTBENCH_SUFFIX}"));
            let assertions = load_assertions(&test_dir.join(format!("{name}{ASSERTION_SUFFIX}")))?;
            Ok(Test {
                name,
                testbench,
                assertions,
            })
        })
        .collect()
}

fn load_assertions(path: &Path) -> Result<Vec<Assertion>, JudgeError> {
    let file = std::fs::File::open(path).map_err(|source| JudgeError::AssertionsFileNotExists {
        path: path.to_path_buf(),
        source,
    })?;
    parse_assertions(BufReader::new(file)).map_err(|source| {
        JudgeError::AssertionsFileWrongFormat {
            path: path.to_path_buf(),
            source,
        }
    })
}

/// `adder-test.v` is the testbench of test `adder`.
fn test_name(file_name: &str) -> Option<&str> {
    file_name
        .strip_suffix(TESTBENCH_SUFFIX)
        .filter(|name| !name.is_empty())
}

/// Returns all Verilog files in `src_dir`, sorted by path. Paths are absolute.
pub fn load_sources(src_dir: &Path) -> Result<Vec<PathBuf>, JudgeError> {
    let opening_error = |source: std::io::Error| JudgeError::OpeningSrcDirectory {
        path: src_dir.to_path_buf(),
        source,
    };
    let src_dir = src_dir.canonicalize().map_err(opening_error)?;
    let mut sources = Vec::new();
    for entry in std::fs::read_dir(&src_dir).map_err(opening_error)? {
        let entry = entry.map_err(opening_error)?;
        let path = entry.path();
        if path.extension().is_some_and(|e| e == SOURCE_EXTENSION)
            && !entry.file_type().map_err(opening_error)?.is_dir()
        {
            sources.push(path);
        }
    }
    sources.sort();
    Ok(sources)
}
