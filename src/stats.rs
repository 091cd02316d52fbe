//! Per-stream encoding counters

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Counters updated from the encode tick; readable from any thread
#[derive(Debug, Default)]
pub struct EncodeStats {
    frames_submitted: AtomicU64,
    bytes_submitted: AtomicU64,
    bytes_truncated: AtomicU64,
    packets_emitted: AtomicU64,
    bytes_emitted: AtomicU64,
    input_stalls: AtomicU64,
    output_stalls: AtomicU64,
    idle_ticks: AtomicU64,
    assembly_failures: AtomicU64,
}

/// Point-in-time copy of [`EncodeStats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub frames_submitted: u64,
    pub bytes_submitted: u64,
    pub bytes_truncated: u64,
    pub packets_emitted: u64,
    pub bytes_emitted: u64,
    pub input_stalls: u64,
    pub output_stalls: u64,
    pub idle_ticks: u64,
    pub assembly_failures: u64,
}

impl EncodeStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_submit(&self, bytes: usize) {
        self.frames_submitted.fetch_add(1, Ordering::Relaxed);
        self.bytes_submitted.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    pub fn record_truncation(&self, bytes: usize) {
        self.bytes_truncated.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    pub fn record_packet(&self, bytes: usize) {
        self.packets_emitted.fetch_add(1, Ordering::Relaxed);
        self.bytes_emitted.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    /// No input buffer was available
    pub fn record_input_stall(&self) {
        self.input_stalls.fetch_add(1, Ordering::Relaxed);
    }

    /// No output buffer was ready
    pub fn record_output_stall(&self) {
        self.output_stalls.fetch_add(1, Ordering::Relaxed);
    }

    /// No frame arrived within the wait limit
    pub fn record_idle_tick(&self) {
        self.idle_ticks.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_assembly_failure(&self) {
        self.assembly_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            frames_submitted: self.frames_submitted.load(Ordering::Relaxed),
            bytes_submitted: self.bytes_submitted.load(Ordering::Relaxed),
            bytes_truncated: self.bytes_truncated.load(Ordering::Relaxed),
            packets_emitted: self.packets_emitted.load(Ordering::Relaxed),
            bytes_emitted: self.bytes_emitted.load(Ordering::Relaxed),
            input_stalls: self.input_stalls.load(Ordering::Relaxed),
            output_stalls: self.output_stalls.load(Ordering::Relaxed),
            idle_ticks: self.idle_ticks.load(Ordering::Relaxed),
            assembly_failures: self.assembly_failures.load(Ordering::Relaxed),
        }
    }
}
