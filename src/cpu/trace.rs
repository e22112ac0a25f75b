//! Execution trace.
//!
//! An append-only log of per-instruction snapshots, taken after address
//! resolution and before the instruction runs.

use crate::cpu::decode::Decoded;
use serde::{Serialize, Deserialize};

/// State captured for one executed instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceEntry {
    /// Program counter before the fetch.
    pub pc: usize,
    /// The fetched word (the synthesized HLT word at the memory boundary).
    pub word: u32,
    /// Fields of `word`.
    pub decoded: Decoded,
    /// Address the instruction operates on.
    pub effective_address: u16,
    /// Accumulator before dispatch.
    pub accumulator: i32,
    /// Index register before dispatch.
    pub index_register: i64,
}

/// Trace storage with an on/off switch.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TraceRecorder {
    enabled: bool,
    entries: Vec<TraceEntry>,
}

impl TraceRecorder {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            entries: Vec::new(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Turning tracing off keeps the history recorded so far.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    /// Append an entry if tracing is on.
    pub fn record(&mut self, entry: TraceEntry) {
        if self.enabled {
            self.entries.push(entry);
        }
    }

    /// A copy of the history.
    pub fn snapshot(&self) -> Vec<TraceEntry> {
        self.entries.clone()
    }

    /// The most recent `count` entries, oldest first.
    pub fn tail(&self, count: usize) -> &[TraceEntry] {
        let start = self.entries.len().saturating_sub(count);
        &self.entries[start..]
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cpu::decode::decode;

    fn entry(pc: usize) -> TraceEntry {
        TraceEntry {
            pc,
            word: 0,
            decoded: decode(0),
            effective_address: 0,
            accumulator: 0,
            index_register: 0,
        }
    }

    #[test]
    fn test_disabled_records_nothing() {
        let mut trace = TraceRecorder::default();
        trace.record(entry(0));
        assert!(trace.is_empty());
    }

    #[test]
    fn test_snapshot_is_a_copy() {
        let mut trace = TraceRecorder::new(true);
        trace.record(entry(0));
        trace.record(entry(1));

        let mut copy = trace.snapshot();
        copy.clear();
        assert_eq!(trace.len(), 2);
    }

    #[test]
    fn test_tail_and_clear() {
        let mut trace = TraceRecorder::new(true);
        for pc in 0..5 {
            trace.record(entry(pc));
        }
        let pcs: Vec<usize> = trace.tail(2).iter().map(|e| e.pc).collect();
        assert_eq!(pcs, vec![3, 4]);
        assert_eq!(trace.tail(10).len(), 5);

        trace.clear();
        assert!(trace.is_empty());
        assert!(trace.is_enabled());
    }
}
