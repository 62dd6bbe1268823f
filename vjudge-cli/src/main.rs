// Copyright 2026 The vjudge Developers
// released under BSD 3-Clause License

use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;
use vjudge::{run_judge, IcarusVerilog, JudgeOptions, JudgeResult};

#[derive(Parser, Debug)]
#[command(name = "vjudge")]
#[command(version)]
#[command(about = "A command-line tool for automatic judge of verilog HDL code.", long_about = None)]
struct Args {
    #[arg(
        short,
        long,
        value_name = "DIR",
        help = "Path to the tests directory, containing testbenches and assertions."
    )]
    test: PathBuf,
    #[arg(
        short,
        long,
        value_name = "DIR",
        help = "Path to the src directory, containing the src files to judge."
    )]
    src: PathBuf,
    #[arg(short, long, help = "Print failed assertions and debug output.")]
    verbose: bool,
    #[arg(long, help = "Run the tests one after the other.")]
    single_thread: bool,
    #[arg(long, value_name = "PROG", default_value = "iverilog")]
    compiler: PathBuf,
    #[arg(long, value_name = "PROG", default_value = "vvp")]
    runtime: PathBuf,
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn bool_str(value: bool) -> &'static str {
    if value {
        "True"
    } else {
        "False"
    }
}

fn print_judge_result(result: &JudgeResult, verbose: bool) {
    println!("{}", result.code().message());
    if let Some(error) = &result.error {
        // print the full error chain, the message above only names the category
        let mut source: Option<&dyn std::error::Error> = Some(error);
        while let Some(err) = source {
            eprintln!("  {err}");
            source = err.source();
        }
    }
    println!("Passed: {}", bool_str(result.passed));
    println!(
        "Passed Tests: {}/{}",
        result.passed_tests, result.total_tests
    );
    println!("Tests:");
    for test in result.tests.iter() {
        println!(
            "  Passed: {:<5}, Name: {} ({}/{} assertions)",
            bool_str(test.passed),
            test.name,
            test.passed_assertions,
            test.total_assertions()
        );
        if verbose {
            for failed in test.failed_assertions() {
                println!(
                    "    Assertion failed at {} on `{}`: expected '{}' but got '{}'",
                    failed.assertion.time,
                    failed.assertion.signal,
                    failed.assertion.expected,
                    failed.actual
                );
            }
        }
    }
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(args.verbose);

    let simulator = IcarusVerilog {
        compiler: args.compiler,
        runtime: args.runtime,
        ..Default::default()
    };
    let options = JudgeOptions {
        multi_thread: !args.single_thread,
    };
    tracing::debug!(test = ?args.test, src = ?args.src, "starting judge");

    let result = run_judge(&args.test, &args.src, &simulator, &options);
    print_judge_result(&result, args.verbose);
    if result.error.is_some() {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}
