//! Frame gate and the latest published snapshot.
//!
//! The gate admits at most one frame into processing. A frame arriving while
//! another is in flight is dropped by the caller rather than queued. Built
//! snapshots replace the previous one whole under a single mutex, and
//! readers always leave with their own copy.

use crate::plane::Plane;
use crate::sensor::{ColorFrame, DepthFrame};
use crate::types::ColoredPoint;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateState {
    Idle,
    Processing,
}

/// Non-blocking at-most-one-in-flight guard.
#[derive(Debug, Default)]
pub struct FrameGate {
    busy: AtomicBool,
}

impl FrameGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Move Idle -> Processing. `None` when a frame is already in flight.
    /// Never waits.
    pub fn try_acquire(&self) -> Option<GateTicket<'_>> {
        self.busy
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .ok()
            .map(|_| GateTicket { gate: self })
    }

    pub fn state(&self) -> GateState {
        if self.busy.load(Ordering::Acquire) {
            GateState::Processing
        } else {
            GateState::Idle
        }
    }
}

/// Held for the duration of one frame's processing. Dropping it returns the
/// gate to Idle, including on early return.
#[derive(Debug)]
pub struct GateTicket<'a> {
    gate: &'a FrameGate,
}

impl Drop for GateTicket<'_> {
    fn drop(&mut self) {
        self.gate.busy.store(false, Ordering::Release);
    }
}

/// Everything derived from one sensor frame.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameSnapshot {
    pub frame_number: u64,
    pub points: Vec<ColoredPoint>,
    pub color: Option<ColorFrame>,
    pub depth: DepthFrame,
    /// `None` when no plane could be estimated for this frame.
    pub plane: Option<Plane>,
    /// Points near the plane, for masking overlays to the surface.
    pub band: Vec<ColoredPoint>,
}

/// The latest published snapshot.
#[derive(Debug, Default)]
pub struct SnapshotStore {
    current: Mutex<Option<Arc<FrameSnapshot>>>,
}

impl SnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Option<Arc<FrameSnapshot>>> {
        // The slot is only ever replaced whole, so a poisoned value is intact.
        self.current
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Replace the current snapshot.
    pub fn publish(&self, snapshot: FrameSnapshot) -> Arc<FrameSnapshot> {
        let snapshot = Arc::new(snapshot);
        *self.lock() = Some(snapshot.clone());
        snapshot
    }

    pub fn clear(&self) {
        *self.lock() = None;
    }

    /// Shared handle to the latest snapshot. The snapshot itself is never
    /// mutated after publication.
    pub fn latest(&self) -> Option<Arc<FrameSnapshot>> {
        self.lock().clone()
    }

    pub fn frame_number(&self) -> Option<u64> {
        self.lock().as_ref().map(|s| s.frame_number)
    }

    /// Copy of the latest plane. `None` both before the first frame and for
    /// frames without an estimate.
    pub fn plane(&self) -> Option<Plane> {
        self.lock().as_ref().and_then(|s| s.plane.clone())
    }

    pub fn points(&self) -> Option<Vec<ColoredPoint>> {
        self.lock().as_ref().map(|s| s.points.clone())
    }

    pub fn band(&self) -> Option<Vec<ColoredPoint>> {
        self.lock().as_ref().map(|s| s.band.clone())
    }

    pub fn color_image(&self) -> Option<ColorFrame> {
        self.lock().as_ref().and_then(|s| s.color.clone())
    }

    pub fn depth_image(&self) -> Option<DepthFrame> {
        self.lock().as_ref().map(|s| s.depth.clone())
    }
}
