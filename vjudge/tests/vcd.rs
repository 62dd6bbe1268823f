// Copyright 2026 The vjudge Developers
// released under BSD 3-Clause License

use proptest::prelude::*;
use rustc_hash::FxHashMap;
use std::io::BufReader;
use vjudge::vcd::{read_from_bytes, read_from_file};
use vjudge::{TimescaleUnit, VcdParseError};

const COUNTER_VCD: &str = "inputs/icarus/counter.vcd";

#[test]
fn test_icarus_counter() {
    let doc = read_from_file(COUNTER_VCD).expect("failed to parse");

    assert_eq!(doc.date(), Some("Sun Oct 19 12:00:00 2026"));
    assert_eq!(doc.version(), Some("Icarus Verilog"));
    let timescale = doc.timescale().unwrap();
    assert_eq!(timescale.factor, 1);
    assert_eq!(timescale.unit, TimescaleUnit::Seconds);

    // `count` aliases `out`, the `dut` vars and `late` are not part of the top module
    let names: Vec<_> = doc.signals().map(|s| s.name()).collect();
    assert_eq!(names, ["out", "clk", "reset"]);
    assert!(doc.get_signal_by_name("count").is_none());
    assert!(doc.get_signal_by_name("internal").is_none());
    assert!(doc.get_signal_by_name("late").is_none());
    assert_eq!(doc.get_signal_by_name("out").unwrap().width(), 4);

    assert_eq!(doc.value_at("out", 0), Some("bx"));
    assert_eq!(doc.value_at("out", 3), Some("bx"));
    assert_eq!(doc.value_at("out", 12), Some("b0"));
    assert_eq!(doc.value_at("out", 15), Some("b1"));
    assert_eq!(doc.value_at("out", 1000), Some("b10"));
    assert_eq!(doc.value_at("reset", 9), Some("1"));
    assert_eq!(doc.value_at("reset", 10), Some("0"));
    assert_eq!(doc.value_at("clk", 27), Some("1"));
    assert_eq!(doc.value_at("clk", 30), Some("0"));
}

/// Replays the value changes of all top level variables with the third party
/// `vcd` crate and checks that we recorded the exact same history.
#[test]
fn test_diff_counter_with_vcd_crate() {
    let doc = read_from_file(COUNTER_VCD).expect("failed to parse");

    let mut ref_parser =
        ::vcd::Parser::new(BufReader::new(std::fs::File::open(COUNTER_VCD).unwrap()));
    let header = ref_parser.parse_header().unwrap();
    let top = header
        .items
        .iter()
        .find_map(|item| match item {
            ::vcd::ScopeItem::Scope(scope) => Some(scope),
            _ => None,
        })
        .expect("no top module");

    let mut names: FxHashMap<::vcd::IdCode, String> = FxHashMap::default();
    for item in top.items.iter() {
        if let ::vcd::ScopeItem::Var(var) = item {
            names
                .entry(var.code)
                .or_insert_with(|| var.reference.clone());
        }
    }

    let mut expected: FxHashMap<String, Vec<(u64, String)>> = FxHashMap::default();
    let mut time = 0;
    for cmd in ref_parser {
        let (id, value) = match cmd.unwrap() {
            ::vcd::Command::Timestamp(t) => {
                time = t;
                continue;
            }
            ::vcd::Command::ChangeScalar(id, value) => (id, value.to_string()),
            ::vcd::Command::ChangeVector(id, value) => (id, format!("b{value}")),
            _ => continue,
        };
        if let Some(name) = names.get(&id) {
            expected.entry(name.clone()).or_default().push((time, value));
        }
    }

    assert_eq!(expected.len(), doc.num_signals());
    for signal in doc.signals() {
        let ours: Vec<_> = signal
            .changes()
            .iter()
            .map(|c| (c.time, c.value.clone()))
            .collect();
        assert_eq!(ours, expected[signal.name()], "{}", signal.name());
    }
}

#[test]
fn test_first_declaration_wins() {
    let input = b"$scope module tb $end\n\
                  $var wire 1 ! a $end\n\
                  $var wire 1 ! b $end\n\
                  $var wire 1 \" c $end\n\
                  $var wire 1 \" a $end\n\
                  $upscope $end\n\
                  $enddefinitions $end\n\
                  #0\n1!\n0\"\n";
    let doc = read_from_bytes(input).unwrap();
    // `b` is an alias of `a` and the second `a` is an alias of `c`
    assert_eq!(doc.num_signals(), 2);
    assert!(doc.get_signal_by_name("b").is_none());
    assert_eq!(doc.value_at("a", 0), Some("1"));
    assert_eq!(doc.value_at("c", 0), Some("0"));
}

#[test]
fn test_multi_char_ids_are_declared_but_never_change() {
    let input = b"$scope module tb $end\n\
                  $var wire 1 !! wide $end\n\
                  $var wire 1 ! narrow $end\n\
                  $upscope $end\n\
                  $enddefinitions $end\n\
                  #0\n1!!\n1!\n#5\nb0 !!\n";
    let doc = read_from_bytes(input).unwrap();
    assert_eq!(doc.num_signals(), 2);
    let wide = doc.get_signal_by_name("wide").unwrap();
    assert!(wide.changes().is_empty());
    assert_eq!(doc.value_at("wide", 5), None);
    assert_eq!(doc.value_at("narrow", 5), Some("1"));
}

#[test]
fn test_upscope_does_not_return_to_top_module() {
    let input = b"$var wire 1 \" early $end\n\
                  $scope module tb $end\n\
                  $var wire 1 ! a $end\n\
                  $scope module inner $end\n\
                  $var wire 1 # b $end\n\
                  $upscope $end\n\
                  $var wire 1 $ c $end\n\
                  $upscope $end\n\
                  $scope module other $end\n\
                  $var wire 1 % d $end\n\
                  $upscope $end\n\
                  $enddefinitions $end\n\
                  #1\n1!\n1\"\n1#\n1$\n1%\n";
    let doc = read_from_bytes(input).unwrap();
    let names: Vec<_> = doc.signals().map(|s| s.name()).collect();
    assert_eq!(names, ["a"]);
    assert_eq!(doc.value_at("a", 1), Some("1"));
}

#[test]
fn test_vector_spanning_lines_is_rejected() {
    let input = b"$scope module tb $end\n\
                  $var wire 2 ! a $end\n\
                  $upscope $end\n\
                  $enddefinitions $end\n\
                  #0\nb10\n!\n";
    match read_from_bytes(input) {
        Err(VcdParseError::MalformedValueChange { line, text }) => {
            assert_eq!(line, 6);
            assert_eq!(text, "b10");
        }
        other => panic!("unexpected result: {other:?}"),
    }
}

#[test]
fn test_parse_errors() {
    let header = "$scope module tb $end\n$var wire 1 ! a $end\n$upscope $end\n$enddefinitions $end\n";

    let err = read_from_bytes(format!("{header}#12a\n").as_bytes()).unwrap_err();
    assert!(matches!(err, VcdParseError::MalformedTimestamp { line: 5, .. }));

    let err = read_from_bytes(format!("{header}#-1\n").as_bytes()).unwrap_err();
    assert!(matches!(err, VcdParseError::MalformedTimestamp { .. }));

    let err = read_from_bytes(format!("{header}#0\nr1.5 !\n").as_bytes()).unwrap_err();
    assert!(matches!(err, VcdParseError::MalformedValueChange { line: 6, .. }));

    let err = read_from_bytes(b"$scope module tb $end\n$var wire 1 \x7f a $end\n").unwrap_err();
    assert!(matches!(
        err,
        VcdParseError::IdentifierOutOfRange { line: 2, .. }
    ));

    let err = read_from_bytes(format!("{header}#0\n1\x7f\n").as_bytes()).unwrap_err();
    match err {
        VcdParseError::IdentifierOutOfRange { line, code } => {
            assert_eq!(line, 6);
            assert_eq!(code, "\x7f");
        }
        other => panic!("unexpected error: {other:?}"),
    }

    let err = read_from_bytes(b"$scope module tb $end\n$foo $end\n").unwrap_err();
    assert!(matches!(
        err,
        VcdParseError::MalformedInstruction { line: 2, .. }
    ));

    let err = read_from_bytes(b"$scope module tb $end\n$var wire 1 ! a\n").unwrap_err();
    assert!(matches!(err, VcdParseError::MalformedInstruction { .. }));

    let err = read_from_file("inputs/does/not/exist.vcd").unwrap_err();
    assert!(matches!(err, VcdParseError::UnreadableSource(_)));
}

#[test]
fn test_empty_trace() {
    let doc = read_from_bytes(b"").unwrap();
    assert_eq!(doc.num_signals(), 0);
    assert_eq!(doc.value_at("a", 0), None);
}

fn single_signal_vcd(changes: &[(u64, &str)]) -> String {
    let mut out = String::from(
        "$scope module tb $end\n$var wire 1 ! sig $end\n$upscope $end\n$enddefinitions $end\n",
    );
    for (time, value) in changes {
        out.push_str(&format!("#{time}\n{value}!\n"));
    }
    out
}

proptest! {
    #[test]
    fn value_is_held_until_next_change(
        steps in prop::collection::vec((0u64..4, prop::sample::select(vec!["0", "1", "x", "z"])), 0..40),
        query in 0u64..200,
    ) {
        // turn the deltas into monotonically increasing timestamps, repeats are allowed
        let mut time = 0;
        let changes: Vec<(u64, &str)> = steps
            .iter()
            .map(|(delta, value)| {
                time += delta;
                (time, *value)
            })
            .collect();
        let doc = read_from_bytes(single_signal_vcd(&changes).as_bytes()).unwrap();

        let expected = changes
            .iter()
            .filter(|(t, _)| *t <= query)
            .last()
            .map(|(_, v)| *v);
        prop_assert_eq!(doc.value_at("sig", query), expected);
    }
}
