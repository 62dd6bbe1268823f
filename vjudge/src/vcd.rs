// Copyright 2026 The vjudge Developers
// released under BSD 3-Clause License
//
// Single pass VCD reader. Only the subset of VCD that Icarus Verilog testbenches
// produce is supported: scalar and binary vector values, single character ids and
// variables declared directly inside the top module.

use crate::trace::{SignalRef, Time, Timescale, TimescaleUnit, TraceBuilder, TraceDocument};
use std::io::BufRead;

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum VcdParseError {
    #[error("[vcd] failed to read input")]
    UnreadableSource(#[from] std::io::Error),
    #[error("[vcd] line {line}: malformed `${cmd}` command: {reason}")]
    MalformedInstruction {
        line: usize,
        cmd: String,
        reason: String,
    },
    #[error("[vcd] line {line}: failed to parse timestamp `#{text}`")]
    MalformedTimestamp { line: usize, text: String },
    #[error("[vcd] line {line}: malformed value change `{text}`")]
    MalformedValueChange { line: usize, text: String },
    #[error("[vcd] line {line}: id `{code}` is outside of the supported range `!` to `~`")]
    IdentifierOutOfRange { line: usize, code: String },
}

pub type Result<T> = std::result::Result<T, VcdParseError>;

/// Parses a VCD file. The file is memory mapped while it is being read.
pub fn read_from_file<P: AsRef<std::path::Path>>(filename: P) -> Result<TraceDocument> {
    let input_file = std::fs::File::open(filename)?;
    let mmap = unsafe { memmap2::Mmap::map(&input_file)? };
    read_from_bytes(&mmap[..])
}

pub fn read_from_bytes(bytes: &[u8]) -> Result<TraceDocument> {
    read_from_reader(bytes)
}

/// Parses a complete VCD. Either the whole input is accepted or an error is returned,
/// there is no attempt to recover from malformed input.
pub fn read_from_reader(input: impl BufRead) -> Result<TraceDocument> {
    let mut tokens = Tokenizer::new(input);
    let mut state = ParserState::new();
    parse(&mut tokens, &mut state)?;
    Ok(state.trace.finish())
}

/// Tracks how deep we are in the module hierarchy. Only the first level of scopes
/// is distinguished from all deeper levels, and `$upscope` never leaves a level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScopeState {
    BeforeModules,
    InTopModule,
    InInnerModules,
}

impl ScopeState {
    #[inline]
    fn enter_scope(self) -> Self {
        match self {
            ScopeState::BeforeModules => ScopeState::InTopModule,
            ScopeState::InTopModule | ScopeState::InInnerModules => ScopeState::InInnerModules,
        }
    }

    #[inline]
    fn declares_signals(self) -> bool {
        self == ScopeState::InTopModule
    }
}

const ID_CHAR_MIN: u8 = b'!';
const ID_CHAR_MAX: u8 = b'~';

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum IdCode {
    /// Index into the id table, computed as `id - '!'`.
    Single(usize),
    /// Longer ids are accepted, but never resolved to a signal.
    Multi,
}

impl IdCode {
    fn parse(id: &[u8], line: usize) -> Result<Self> {
        match id {
            [c] if (ID_CHAR_MIN..=ID_CHAR_MAX).contains(c) => {
                Ok(IdCode::Single((*c - ID_CHAR_MIN) as usize))
            }
            [_] => Err(VcdParseError::IdentifierOutOfRange {
                line,
                code: String::from_utf8_lossy(id).to_string(),
            }),
            _ => Ok(IdCode::Multi),
        }
    }
}

/// Maps single character ids to the signal that was first declared with them.
#[derive(Debug, Default)]
struct IdTable {
    slots: Vec<Option<SignalRef>>,
}

impl IdTable {
    /// Only slots that were assigned by an earlier declaration own a signal.
    #[inline]
    fn get(&self, slot: usize) -> Option<SignalRef> {
        self.slots.get(slot).copied().flatten()
    }

    fn assign(&mut self, slot: usize, signal: SignalRef) {
        if self.slots.len() <= slot {
            self.slots.resize(slot + 1, None);
        }
        self.slots[slot] = Some(signal);
    }
}

struct ParserState {
    trace: TraceBuilder,
    scope: ScopeState,
    ids: IdTable,
    time: Time,
}

impl ParserState {
    fn new() -> Self {
        Self {
            trace: TraceBuilder::new(),
            scope: ScopeState::BeforeModules,
            ids: IdTable::default(),
            time: 0,
        }
    }

    fn command(&mut self, cmd: VcdCmd, body: &[u8], line: usize) -> Result<()> {
        match cmd {
            VcdCmd::Date => {
                self.trace.set_date(first_line(body));
            }
            VcdCmd::Version => {
                self.trace.set_version(first_line(body));
            }
            VcdCmd::Timescale => {
                let timescale = parse_timescale(body).ok_or_else(|| {
                    malformed(cmd, line, format!("`{}`", String::from_utf8_lossy(body)))
                })?;
                self.trace.set_timescale(timescale);
            }
            VcdCmd::Scope => {
                self.scope = self.scope.enter_scope();
            }
            VcdCmd::Var => {
                let tokens = find_tokens(body);
                if tokens.len() < 4 {
                    return Err(malformed(
                        cmd,
                        line,
                        format!("expected at least 4 tokens, got: {}", list_str(&tokens)),
                    ));
                }
                let (size, id, name) = (tokens[1], tokens[2], tokens[3]);
                let width = std::str::from_utf8(size)
                    .ok()
                    .and_then(|s| s.parse::<u32>().ok())
                    .ok_or_else(|| {
                        malformed(
                            cmd,
                            line,
                            format!(
                                "failed to parse length `{}` of variable `{}`",
                                String::from_utf8_lossy(size),
                                String::from_utf8_lossy(name)
                            ),
                        )
                    })?;
                let id = IdCode::parse(id, line)?;
                if self.scope.declares_signals() {
                    self.declare(id, String::from_utf8_lossy(name).to_string(), width);
                }
            }
            VcdCmd::UpScope | VcdCmd::Comment | VcdCmd::EndDefinitions => {}
            // these never carry a body and are dispatched directly by the tokenizer loop
            VcdCmd::End | VcdCmd::DumpVars | VcdCmd::DumpAll => {}
        }
        Ok(())
    }

    fn declare(&mut self, id: IdCode, name: String, width: u32) {
        match id {
            IdCode::Single(slot) => {
                // a second declaration with the same id is an alias of the first one
                if self.ids.get(slot).is_none() {
                    let signal = self.trace.add_signal(name, width);
                    self.ids.assign(slot, signal);
                }
            }
            IdCode::Multi => {
                self.trace.add_signal(name, width);
            }
        }
    }

    #[inline]
    fn value_change(&mut self, value: &[u8], id: &[u8], line: usize) -> Result<()> {
        if id.is_empty() {
            return Err(VcdParseError::MalformedValueChange {
                line,
                text: String::from_utf8_lossy(value).to_string(),
            });
        }
        if let IdCode::Single(slot) = IdCode::parse(id, line)? {
            // changes of signals outside the top module end up here without an owner
            if let Some(signal) = self.ids.get(slot) {
                self.trace.value_change(signal, self.time, value);
            }
        }
        Ok(())
    }
}

fn parse(input: &mut Tokenizer<impl BufRead>, out: &mut ParserState) -> Result<()> {
    let mut token: Vec<u8> = Vec::with_capacity(64);
    let mut body: Vec<u8> = Vec::with_capacity(128);
    while let Some(first) = input.skip_whitespace()? {
        let line = input.line();
        token.clear();
        input.read_token(&mut token)?;
        match first {
            b'$' => {
                let name = &token[1..];
                let cmd = VcdCmd::from_bytes(name).ok_or_else(|| {
                    VcdParseError::MalformedInstruction {
                        line,
                        cmd: String::from_utf8_lossy(name).to_string(),
                        reason: format!("unknown command, valid are: {}", get_vcd_command_str()),
                    }
                })?;
                if cmd.has_body() {
                    body.clear();
                    if !input.read_until_end_token(&mut body)? {
                        return Err(malformed(cmd, line, "missing `$end`".to_string()));
                    }
                    out.command(cmd, &body, line)?;
                }
            }
            b'#' => {
                out.time = parse_time(&token[1..]).ok_or_else(|| {
                    VcdParseError::MalformedTimestamp {
                        line,
                        text: String::from_utf8_lossy(&token[1..]).to_string(),
                    }
                })?;
            }
            b'0' | b'1' | b'x' | b'X' | b'z' | b'Z' => {
                out.value_change(&token[0..1], &token[1..], line)?;
            }
            b'b' | b'B' => {
                // the id of a vector change has to be on the same line
                let mut id = Vec::with_capacity(8);
                if input.skip_blanks()?.is_some_and(|b| !is_white_space(b)) {
                    input.read_token(&mut id)?;
                }
                if id.is_empty() {
                    return Err(VcdParseError::MalformedValueChange {
                        line,
                        text: String::from_utf8_lossy(&token).to_string(),
                    });
                }
                out.value_change(&token, &id, line)?;
            }
            _ => {
                return Err(VcdParseError::MalformedValueChange {
                    line,
                    text: String::from_utf8_lossy(&token).to_string(),
                });
            }
        }
    }
    Ok(())
}

#[inline]
fn malformed(cmd: VcdCmd, line: usize, reason: String) -> VcdParseError {
    VcdParseError::MalformedInstruction {
        line,
        cmd: String::from_utf8_lossy(cmd.name()).to_string(),
        reason,
    }
}

#[inline]
fn parse_time(digits: &[u8]) -> Option<Time> {
    std::str::from_utf8(digits).ok()?.parse::<Time>().ok()
}

fn parse_timescale(body: &[u8]) -> Option<Timescale> {
    let tokens = find_tokens(body);
    let (factor, unit) = match tokens.len() {
        1 => {
            // find the first non-numeric character
            let token = tokens[0];
            match token.iter().position(|c| !c.is_ascii_digit()) {
                None => (token, &[] as &[u8]),
                Some(pos) => (&token[..pos], &token[pos..]),
            }
        }
        2 => (tokens[0], tokens[1]),
        _ => return None,
    };
    let factor = std::str::from_utf8(factor).ok()?.parse::<u32>().ok()?;
    Some(Timescale::new(factor, convert_timescale_unit(unit)))
}

fn convert_timescale_unit(name: &[u8]) -> TimescaleUnit {
    match name {
        b"fs" => TimescaleUnit::FemtoSeconds,
        b"ps" => TimescaleUnit::PicoSeconds,
        b"ns" => TimescaleUnit::NanoSeconds,
        b"us" => TimescaleUnit::MicroSeconds,
        b"ms" => TimescaleUnit::MilliSeconds,
        b"s" => TimescaleUnit::Seconds,
        _ => TimescaleUnit::Unknown,
    }
}

/// Date and version strings are reduced to their first non-empty line.
fn first_line(body: &[u8]) -> String {
    String::from_utf8_lossy(body)
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .unwrap_or_default()
        .to_string()
}

const VCD_DATE: &[u8] = b"date";
const VCD_TIMESCALE: &[u8] = b"timescale";
const VCD_VAR: &[u8] = b"var";
const VCD_SCOPE: &[u8] = b"scope";
const VCD_UP_SCOPE: &[u8] = b"upscope";
const VCD_COMMENT: &[u8] = b"comment";
const VCD_VERSION: &[u8] = b"version";
const VCD_END_DEFINITIONS: &[u8] = b"enddefinitions";
const VCD_END: &[u8] = b"end";
const VCD_DUMP_VARS: &[u8] = b"dumpvars";
const VCD_DUMP_ALL: &[u8] = b"dumpall";
const VCD_COMMANDS: [&[u8]; 11] = [
    VCD_DATE,
    VCD_TIMESCALE,
    VCD_VAR,
    VCD_SCOPE,
    VCD_UP_SCOPE,
    VCD_COMMENT,
    VCD_VERSION,
    VCD_END_DEFINITIONS,
    VCD_END,
    VCD_DUMP_VARS,
    VCD_DUMP_ALL,
];

/// Used to show all commands when printing an error message.
fn get_vcd_command_str() -> String {
    list_str(&VCD_COMMANDS)
}

fn list_str(bytes: &[&[u8]]) -> String {
    bytes
        .iter()
        .map(|c| String::from_utf8_lossy(c))
        .collect::<Vec<_>>()
        .join(", ")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum VcdCmd {
    Date,
    Timescale,
    Var,
    Scope,
    UpScope,
    Comment,
    Version,
    EndDefinitions,
    End,
    DumpVars,
    DumpAll,
}

impl VcdCmd {
    fn from_bytes(name: &[u8]) -> Option<Self> {
        match name {
            VCD_VAR => Some(VcdCmd::Var),
            VCD_SCOPE => Some(VcdCmd::Scope),
            VCD_UP_SCOPE => Some(VcdCmd::UpScope),
            VCD_DATE => Some(VcdCmd::Date),
            VCD_TIMESCALE => Some(VcdCmd::Timescale),
            VCD_COMMENT => Some(VcdCmd::Comment),
            VCD_VERSION => Some(VcdCmd::Version),
            VCD_END_DEFINITIONS => Some(VcdCmd::EndDefinitions),
            VCD_END => Some(VcdCmd::End),
            VCD_DUMP_VARS => Some(VcdCmd::DumpVars),
            VCD_DUMP_ALL => Some(VcdCmd::DumpAll),
            _ => None,
        }
    }

    fn name(self) -> &'static [u8] {
        match self {
            VcdCmd::Date => VCD_DATE,
            VcdCmd::Timescale => VCD_TIMESCALE,
            VcdCmd::Var => VCD_VAR,
            VcdCmd::Scope => VCD_SCOPE,
            VcdCmd::UpScope => VCD_UP_SCOPE,
            VcdCmd::Comment => VCD_COMMENT,
            VcdCmd::Version => VCD_VERSION,
            VcdCmd::EndDefinitions => VCD_END_DEFINITIONS,
            VcdCmd::End => VCD_END,
            VcdCmd::DumpVars => VCD_DUMP_VARS,
            VcdCmd::DumpAll => VCD_DUMP_ALL,
        }
    }

    /// `$end`, `$dumpvars` and `$dumpall` are sentinels that are skipped on their own.
    /// All other commands consume everything up to their `$end`.
    fn has_body(self) -> bool {
        !matches!(self, VcdCmd::End | VcdCmd::DumpVars | VcdCmd::DumpAll)
    }
}

#[inline]
fn find_tokens(line: &[u8]) -> Vec<&[u8]> {
    line.split(|c| is_white_space(*c))
        .filter(|e| !e.is_empty())
        .collect()
}

#[inline]
fn is_white_space(b: u8) -> bool {
    matches!(b, b' ' | b'\n' | b'\r' | b'\t')
}

/// Byte level reader that keeps track of the current line.
struct Tokenizer<R: BufRead> {
    input: R,
    line: usize,
}

impl<R: BufRead> Tokenizer<R> {
    fn new(input: R) -> Self {
        Self { input, line: 1 }
    }

    #[inline]
    fn line(&self) -> usize {
        self.line
    }

    #[inline]
    fn peek(&mut self) -> std::io::Result<Option<u8>> {
        Ok(self.input.fill_buf()?.first().copied())
    }

    #[inline]
    fn advance(&mut self, byte: u8) {
        if byte == b'\n' {
            self.line += 1;
        }
        self.input.consume(1);
    }

    /// Advances the input until the first non-whitespace character which is then returned,
    /// but not consumed. Returns `None` at the end of the input.
    #[inline]
    fn skip_whitespace(&mut self) -> std::io::Result<Option<u8>> {
        while let Some(byte) = self.peek()? {
            if !is_white_space(byte) {
                return Ok(Some(byte));
            }
            self.advance(byte);
        }
        Ok(None)
    }

    /// Like `skip_whitespace`, but stops at a line break.
    #[inline]
    fn skip_blanks(&mut self) -> std::io::Result<Option<u8>> {
        while let Some(byte) = self.peek()? {
            if !matches!(byte, b' ' | b'\t') {
                return Ok(Some(byte));
            }
            self.advance(byte);
        }
        Ok(None)
    }

    #[inline]
    fn read_token(&mut self, buf: &mut Vec<u8>) -> std::io::Result<()> {
        while let Some(byte) = self.peek()? {
            if is_white_space(byte) {
                break;
            }
            buf.push(byte);
            self.advance(byte);
        }
        Ok(())
    }

    /// Reads the body of a command up to and including `$end`. The `$end` and surrounding
    /// whitespace are not included in `buf`. Returns `false` if the input ends first.
    fn read_until_end_token(&mut self, buf: &mut Vec<u8>) -> std::io::Result<bool> {
        // count how many characters of the $end token we have recognized
        let mut end_index = 0;
        self.skip_whitespace()?;
        while let Some(byte) = self.peek()? {
            self.advance(byte);
            // we always append and then later drop the `$end` bytes.
            buf.push(byte);
            end_index = match (end_index, byte) {
                (_, b'$') => 1,
                (1, b'e') => 2,
                (2, b'n') => 3,
                (3, b'd') => {
                    buf.truncate(buf.len() - 4);
                    right_strip(buf);
                    return Ok(true);
                }
                _ => 0,
            };
        }
        Ok(false)
    }
}

#[inline]
fn right_strip(buf: &mut Vec<u8>) {
    while buf.last().is_some_and(|b| is_white_space(*b)) {
        buf.pop();
    }
}
