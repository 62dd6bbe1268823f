// Copyright 2026 The vjudge Developers
// released under BSD 3-Clause License
//
// In-memory representation of a parsed VCD trace.

use rustc_hash::FxHashMap;
use std::fmt::{Debug, Formatter};
use std::num::NonZeroU32;
use std::ops::Index;

pub type Time = u64;

#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde1", derive(serde::Serialize, serde::Deserialize))]
pub struct Timescale {
    pub factor: u32,
    pub unit: TimescaleUnit,
}

impl Timescale {
    pub fn new(factor: u32, unit: TimescaleUnit) -> Self {
        Timescale { factor, unit }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde1", derive(serde::Serialize, serde::Deserialize))]
pub enum TimescaleUnit {
    FemtoSeconds,
    PicoSeconds,
    NanoSeconds,
    MicroSeconds,
    MilliSeconds,
    Seconds,
    Unknown,
}

/// Uniquely identifies a signal inside a [`TraceDocument`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde1", derive(serde::Serialize, serde::Deserialize))]
pub struct SignalRef(NonZeroU32);

impl SignalRef {
    #[inline]
    pub fn from_index(index: usize) -> Option<Self> {
        NonZeroU32::new(index as u32 + 1).map(Self)
    }

    #[inline]
    pub fn index(&self) -> usize {
        (self.0.get() - 1) as usize
    }
}

/// A single entry in the history of a signal.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde1", derive(serde::Serialize, serde::Deserialize))]
pub struct ValueChange {
    pub time: Time,
    /// Raw value token as found in the trace, e.g. `1`, `x` or `b1010`.
    pub value: String,
}

#[derive(Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde1", derive(serde::Serialize, serde::Deserialize))]
pub struct Signal {
    name: String,
    width: u32,
    changes: Vec<ValueChange>,
}

impl Debug for Signal {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Signal({}, {} bits, {} changes)",
            self.name,
            self.width,
            self.changes.len()
        )
    }
}

impl Signal {
    fn new(name: String, width: u32) -> Self {
        Signal {
            name,
            width,
            changes: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    /// All changes in the order they were encountered in the trace.
    pub fn changes(&self) -> &[ValueChange] {
        &self.changes
    }

    /// Returns the value of the latest change at or before `time`.
    /// Returns `None` if the signal has not been assigned yet at `time`.
    ///
    /// Changes are assumed to be sorted by time. If several changes share a
    /// timestamp, the last one wins.
    pub fn value_at(&self, time: Time) -> Option<&str> {
        let after = self.changes.partition_point(|c| c.time <= time);
        match after {
            0 => None,
            n => Some(self.changes[n - 1].value.as_str()),
        }
    }

    pub fn first_change_time(&self) -> Option<Time> {
        self.changes.first().map(|c| c.time)
    }
}

/// Immutable result of parsing a single VCD trace.
#[derive(Clone, Default)]
#[cfg_attr(feature = "serde1", derive(serde::Serialize, serde::Deserialize))]
pub struct TraceDocument {
    signals: Vec<Signal>,
    lookup: FxHashMap<String, SignalRef>,
    date: Option<String>,
    version: Option<String>,
    timescale: Option<Timescale>,
}

impl Debug for TraceDocument {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "TraceDocument({} signals)", self.signals.len())
    }
}

impl TraceDocument {
    pub fn signals(&self) -> impl Iterator<Item = &Signal> + '_ {
        self.signals.iter()
    }

    pub fn num_signals(&self) -> usize {
        self.signals.len()
    }

    /// Looks up a signal by its declared name. If several top-level variables
    /// share a name, the first declaration is returned.
    pub fn lookup(&self, name: &str) -> Option<SignalRef> {
        self.lookup.get(name).copied()
    }

    pub fn get_signal_by_name(&self, name: &str) -> Option<&Signal> {
        self.lookup(name).map(|r| &self[r])
    }

    /// Value of the named signal at `time`, see [`Signal::value_at`].
    pub fn value_at(&self, name: &str, time: Time) -> Option<&str> {
        self.get_signal_by_name(name)?.value_at(time)
    }

    pub fn date(&self) -> Option<&str> {
        self.date.as_deref()
    }

    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    pub fn timescale(&self) -> Option<Timescale> {
        self.timescale
    }
}

impl Index<SignalRef> for TraceDocument {
    type Output = Signal;

    fn index(&self, index: SignalRef) -> &Self::Output {
        &self.signals[index.index()]
    }
}

/// Incrementally assembles a [`TraceDocument`]. Used by the VCD parser.
#[derive(Debug, Default)]
pub(crate) struct TraceBuilder {
    doc: TraceDocument,
}

impl TraceBuilder {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn add_signal(&mut self, name: String, width: u32) -> SignalRef {
        let signal_ref = SignalRef::from_index(self.doc.signals.len()).unwrap();
        self.doc.lookup.entry(name.clone()).or_insert(signal_ref);
        self.doc.signals.push(Signal::new(name, width));
        signal_ref
    }

    #[inline]
    pub(crate) fn value_change(&mut self, signal: SignalRef, time: Time, value: &[u8]) {
        let value = String::from_utf8_lossy(value).into_owned();
        self.doc.signals[signal.index()]
            .changes
            .push(ValueChange { time, value });
    }

    pub(crate) fn set_date(&mut self, value: String) {
        self.doc.date = Some(value);
    }

    pub(crate) fn set_version(&mut self, value: String) {
        self.doc.version = Some(value);
    }

    pub(crate) fn set_timescale(&mut self, value: Timescale) {
        self.doc.timescale = Some(value);
    }

    pub(crate) fn finish(self) -> TraceDocument {
        self.doc
    }
}
