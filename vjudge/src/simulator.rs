// Copyright 2026 The vjudge Developers
// released under BSD 3-Clause License
//
// Compiles a testbench together with the sources under test and runs the simulation.
// Everything the judge needs from a simulator is the VCD it dumps.

use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};

#[derive(Debug, thiserror::Error)]
pub enum SimulatorError {
    #[error("[sim] failed to create a temporary directory")]
    TempDir(#[source] std::io::Error),
    #[error("[sim] failed to launch `{program}`")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("[sim] `{program}` exited with {status}")]
    Failed { program: String, status: ExitStatus },
    #[error("[sim] simulation did not produce a trace at {path:?}")]
    MissingTrace {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Turns a testbench and the sources under test into a VCD trace.
pub trait Simulator: Sync {
    fn compile_and_simulate(
        &self,
        sources: &[PathBuf],
        testbench: &Path,
    ) -> Result<Vec<u8>, SimulatorError>;
}

/// Runs `iverilog` followed by `vvp` inside a fresh temporary directory.
/// The testbench is expected to `$dumpfile` into `dump_file`, relative to the
/// working directory of the simulation.
#[derive(Debug, Clone)]
pub struct IcarusVerilog {
    pub compiler: PathBuf,
    pub runtime: PathBuf,
    pub dump_file: PathBuf,
}

impl Default for IcarusVerilog {
    fn default() -> Self {
        Self {
            compiler: PathBuf::from("iverilog"),
            runtime: PathBuf::from("vvp"),
            dump_file: PathBuf::from(".tmp.vcd"),
        }
    }
}

const COMPILED_NAME: &str = ".tmp.o";

impl Simulator for IcarusVerilog {
    fn compile_and_simulate(
        &self,
        sources: &[PathBuf],
        testbench: &Path,
    ) -> Result<Vec<u8>, SimulatorError> {
        // the directory is removed once `dir` goes out of scope
        let dir = tempfile::Builder::new()
            .prefix("vjudge-")
            .tempdir()
            .map_err(SimulatorError::TempDir)?;

        let mut compile = Command::new(&self.compiler);
        compile
            .arg("-o")
            .arg(COMPILED_NAME)
            .arg(testbench)
            .args(sources);
        run(compile, dir.path())?;

        let mut simulate = Command::new(&self.runtime);
        simulate.arg(COMPILED_NAME);
        run(simulate, dir.path())?;

        let path = dir.path().join(&self.dump_file);
        std::fs::read(&path).map_err(|source| SimulatorError::MissingTrace { path, source })
    }
}

fn run(mut cmd: Command, cwd: &Path) -> Result<(), SimulatorError> {
    let program = cmd.get_program().to_string_lossy().to_string();
    tracing::debug!(?cmd, "running simulator step");
    let status = cmd
        .current_dir(cwd)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .status()
        .map_err(|source| SimulatorError::Spawn {
            program: program.clone(),
            source,
        })?;
    if status.success() {
        Ok(())
    } else {
        Err(SimulatorError::Failed { program, status })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_compiler() {
        let sim = IcarusVerilog {
            compiler: PathBuf::from("vjudge-this-compiler-does-not-exist"),
            ..Default::default()
        };
        let err = sim
            .compile_and_simulate(&[], Path::new("tb-test.v"))
            .unwrap_err();
        match err {
            SimulatorError::Spawn { program, .. } => {
                assert_eq!(program, "vjudge-this-compiler-does-not-exist")
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_failing_compiler() {
        let sim = IcarusVerilog {
            compiler: PathBuf::from("false"),
            ..Default::default()
        };
        let err = sim
            .compile_and_simulate(&[], Path::new("tb-test.v"))
            .unwrap_err();
        assert!(matches!(err, SimulatorError::Failed { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn test_no_trace_dumped() {
        let sim = IcarusVerilog {
            compiler: PathBuf::from("true"),
            runtime: PathBuf::from("true"),
            ..Default::default()
        };
        let err = sim
            .compile_and_simulate(&[], Path::new("tb-test.v"))
            .unwrap_err();
        assert!(matches!(err, SimulatorError::MissingTrace { .. }));
    }
}
