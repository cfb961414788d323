use crate::mapping::DisplayGeometry;
use crate::store::{MarkerId, SegmentId, TimelineStore};
use crate::{LipSyncError, Result};

/// Pointer capture of a single marker, from pointer-down until pointer-up.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DragSession {
    pub marker: MarkerId,
    pub origin_pointer: f64,
    pub origin_left: f64,
}

/// Owns the one drag session allowed at a time.
#[derive(Debug, Default)]
pub struct DragController {
    active: Option<DragSession>,
}

impl DragController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn active(&self) -> Option<&DragSession> {
        self.active.as_ref()
    }

    /// Captures `marker` for dragging. `origin_left` is the marker's current
    /// pixel offset on the waveform.
    pub fn begin(
        &mut self,
        store: &TimelineStore,
        marker: MarkerId,
        pointer_x: f64,
        origin_left: f64,
    ) -> Result<()> {
        if let Some(session) = &self.active {
            return Err(LipSyncError::DragInProgress(session.marker));
        }
        if store.marker(marker).is_none() {
            return Err(LipSyncError::UnknownMarker(marker));
        }
        self.active = Some(DragSession {
            marker,
            origin_pointer: pointer_x,
            origin_left,
        });
        Ok(())
    }

    /// Follows the pointer, clamping the marker to the waveform. Returns the
    /// segments whose display must be refreshed. Without an active session
    /// pointer moves are ignored.
    pub fn drag_to(
        &mut self,
        pointer_x: f64,
        store: &mut TimelineStore,
        geometry: &DisplayGeometry,
    ) -> Result<Vec<SegmentId>> {
        let Some(session) = self.active else {
            return Ok(Vec::new());
        };
        let left = (session.origin_left + pointer_x - session.origin_pointer)
            .clamp(0.0, geometry.width.max(0.0));
        let time = geometry.offset_to_time(left);
        match store.move_marker(session.marker, time) {
            Ok(touched) => Ok(touched),
            Err(err) => {
                // The marker vanished under the pointer.
                self.active = None;
                Err(err)
            }
        }
    }

    /// Releases the capture. Releasing while idle is a no-op.
    pub fn end(&mut self) -> Option<DragSession> {
        self.active.take()
    }

    /// Drops the session if it captured a marker that no longer exists.
    pub fn forget_missing(&mut self, store: &TimelineStore) {
        if self
            .active
            .is_some_and(|session| store.marker(session.marker).is_none())
        {
            self.active = None;
        }
    }
}
