//! Single-slot frame hand-off between the delivery thread and the encode thread
//!
//! Deposits coalesce: a frame arriving while the slot is occupied is appended
//! to the pending samples instead of blocking or being dropped. The consumer
//! takes everything pending in one go.

use parking_lot::{Condvar, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use super::frame::AudioFrame;

#[derive(Debug)]
struct Slot {
    frame: Option<AudioFrame>,
    active: bool,
}

/// Mutex-guarded optional frame plus a "slot became non-empty" condition
#[derive(Debug)]
pub struct FrameAccumulator {
    slot: Mutex<Slot>,
    ready: Condvar,
}

impl Default for FrameAccumulator {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameAccumulator {
    pub fn new() -> Self {
        Self {
            slot: Mutex::new(Slot {
                frame: None,
                active: true,
            }),
            ready: Condvar::new(),
        }
    }

    /// Store a converted frame, appending to any pending samples.
    ///
    /// Returns `false` when the frame was not taken: it was empty, or the
    /// accumulator is inactive.
    pub fn deposit(&self, frame: AudioFrame) -> bool {
        if !frame.is_valid() {
            return false;
        }

        let mut slot = self.slot.lock();
        if !slot.active {
            return false;
        }

        let merged = match slot.frame.take() {
            None => frame,
            Some(mut pending) => match pending.append(frame) {
                Ok(()) => pending,
                Err(frame) => {
                    tracing::warn!(
                        pending = %pending.caps(),
                        incoming = %frame.caps(),
                        dropped_bytes = pending.len(),
                        "caps changed with samples pending; replacing pending frame"
                    );
                    frame
                }
            },
        };
        slot.frame = Some(merged);

        self.ready.notify_all();
        true
    }

    /// Put a frame back in front of whatever is pending.
    ///
    /// Used when only part of a consumed frame could be handed to the codec.
    pub fn requeue(&self, mut frame: AudioFrame) {
        let mut slot = self.slot.lock();
        if !slot.active || frame.is_empty() {
            return;
        }

        if let Some(newer) = slot.frame.take() {
            if let Err(newer) = frame.append(newer) {
                // Newer samples win on a caps change, same as deposit().
                slot.frame = Some(newer);
                self.ready.notify_all();
                return;
            }
        }

        slot.frame = Some(frame);
        self.ready.notify_all();
    }

    /// Take the pending frame, waiting up to `timeout` for one to arrive.
    ///
    /// `None` means nothing arrived in time (or the accumulator is inactive);
    /// it is not an error.
    pub fn consume(&self, timeout: Duration) -> Option<AudioFrame> {
        let mut slot = self.slot.lock();
        self.wait_for_frame(&mut slot, Instant::now() + timeout);

        if !slot.active {
            return None;
        }

        slot.frame.take()
    }

    /// Wait up to `timeout` for samples without taking them.
    ///
    /// Returns whether a frame is pending.
    pub fn wait_pending(&self, timeout: Duration) -> bool {
        let mut slot = self.slot.lock();
        self.wait_for_frame(&mut slot, Instant::now() + timeout);
        slot.active && slot.frame.is_some()
    }

    fn wait_for_frame(&self, slot: &mut MutexGuard<'_, Slot>, deadline: Instant) {
        while slot.active && slot.frame.is_none() {
            if self.ready.wait_until(slot, deadline).timed_out() {
                break;
            }
        }
    }

    /// Accept deposits again after [`deactivate`](Self::deactivate).
    pub fn activate(&self) {
        self.slot.lock().active = true;
    }

    /// Drop pending samples, refuse deposits and release any waiting consumer.
    pub fn deactivate(&self) {
        let mut slot = self.slot.lock();
        slot.active = false;
        slot.frame = None;
        self.ready.notify_all();
    }

    /// Bytes currently waiting in the slot.
    pub fn pending_bytes(&self) -> usize {
        self.slot.lock().frame.as_ref().map_or(0, |f| f.len())
    }
}
