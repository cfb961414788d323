//! Markers, the segments they form, and the pending-start slot.
//!
//! The store is the sole owner of both markers and segments. Each marker
//! carries a non-owning back-reference to the segment it belongs to, so
//! cascades never need to scan.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{LipSyncError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MarkerId(u64);

impl fmt::Display for MarkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "m{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SegmentId(u64);

impl fmt::Display for SegmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "seg{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarkerRole {
    Start,
    End,
}

impl MarkerRole {
    /// Single-letter badge shown on the marker pin.
    pub fn label(self) -> char {
        match self {
            MarkerRole::Start => 'S',
            MarkerRole::End => 'E',
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Marker {
    pub id: MarkerId,
    pub time: f64,
    pub role: MarkerRole,
    /// Segment this marker belongs to, if it has been paired.
    pub segment: Option<SegmentId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub id: SegmentId,
    pub markers: [MarkerId; 2],
    pub text: String,
    start_time: f64,
    end_time: f64,
}

impl Segment {
    pub fn start_time(&self) -> f64 {
        self.start_time
    }

    pub fn end_time(&self) -> f64 {
        self.end_time
    }

    pub fn duration(&self) -> f64 {
        self.end_time - self.start_time
    }

    pub fn contains(&self, time: f64) -> bool {
        self.start_time <= time && time <= self.end_time
    }

    fn set_bounds(&mut self, a: f64, b: f64) {
        self.start_time = a.min(b);
        self.end_time = a.max(b);
    }
}

/// Plain snapshot of a segment for UI consumers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentView {
    pub id: SegmentId,
    pub start_time: f64,
    pub end_time: f64,
    pub text: String,
}

impl From<&Segment> for SegmentView {
    fn from(segment: &Segment) -> Self {
        Self {
            id: segment.id,
            start_time: segment.start_time,
            end_time: segment.end_time,
            text: segment.text.clone(),
        }
    }
}

/// Result of the start/end authoring button.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Authoring {
    /// A start marker was placed and now waits for its partner.
    Pending(MarkerId),
    /// The pending marker was paired and a segment was formed.
    Completed(SegmentId),
}

#[derive(Debug, Default)]
pub struct TimelineStore {
    markers: BTreeMap<MarkerId, Marker>,
    // Ids grow monotonically, so key order is creation order.
    segments: BTreeMap<SegmentId, Segment>,
    pending: Option<MarkerId>,
    duration: Option<f64>,
    next_marker: u64,
    next_segment: u64,
}

impl TimelineStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the media duration once the audio clip is ready. Markers that
    /// fall past the new end are pulled back onto it.
    pub fn set_duration(&mut self, duration: f64) {
        self.duration = (duration.is_finite() && duration > 0.0).then_some(duration);
        if self.duration.is_none() {
            return;
        }

        let mut clamped = 0usize;
        for marker in self.markers.values_mut() {
            let time = clamp_to_clip(marker.time, self.duration);
            if time != marker.time {
                marker.time = time;
                clamped += 1;
            }
        }
        if clamped == 0 {
            return;
        }

        let markers = &self.markers;
        for segment in self.segments.values_mut() {
            let [a, b] = segment.markers.map(|id| markers.get(&id).map(|m| m.time));
            if let (Some(a), Some(b)) = (a, b) {
                segment.set_bounds(a, b);
            }
        }
        tracing::debug!(duration, clamped, "markers clamped to new duration");
    }

    pub fn duration(&self) -> Option<f64> {
        self.duration
    }

    /// Drops every marker, segment and the pending start. Used when a new
    /// audio clip is loaded.
    pub fn reset(&mut self) {
        tracing::debug!(
            markers = self.markers.len(),
            segments = self.segments.len(),
            "clearing timeline"
        );
        self.markers.clear();
        self.segments.clear();
        self.pending = None;
        self.duration = None;
    }

    pub fn marker(&self, id: MarkerId) -> Option<&Marker> {
        self.markers.get(&id)
    }

    pub fn segment(&self, id: SegmentId) -> Option<&Segment> {
        self.segments.get(&id)
    }

    pub fn markers(&self) -> impl Iterator<Item = &Marker> {
        self.markers.values()
    }

    /// Segments in creation order.
    pub fn segments(&self) -> impl Iterator<Item = &Segment> {
        self.segments.values()
    }

    pub fn segment_views(&self) -> Vec<SegmentView> {
        self.segments().map(SegmentView::from).collect()
    }

    pub fn pending(&self) -> Option<MarkerId> {
        self.pending
    }

    /// Appends a marker. Overlap with existing markers is not checked.
    pub fn create_marker(&mut self, time: f64, role: MarkerRole) -> MarkerId {
        self.next_marker += 1;
        let id = MarkerId(self.next_marker);
        let time = self.clamp_time(time);
        self.markers.insert(
            id,
            Marker {
                id,
                time,
                role,
                segment: None,
            },
        );
        tracing::debug!(%id, time, ?role, "marker created");
        id
    }

    /// Places a start marker, or completes the pending one into a segment.
    pub fn begin_or_complete_segment(&mut self, time: f64) -> Result<Authoring> {
        if self.duration.is_none() {
            return Err(LipSyncError::not_ready("add marker"));
        }
        match self.pending {
            None => {
                let id = self.create_marker(time, MarkerRole::Start);
                self.pending = Some(id);
                Ok(Authoring::Pending(id))
            }
            Some(start) => {
                let end = self.create_marker(time, MarkerRole::End);
                let segment = self.pair_markers(start, end)?;
                self.clear_pending();
                Ok(Authoring::Completed(segment))
            }
        }
    }

    /// Clears the pending start. Clearing an empty slot is a no-op.
    pub fn clear_pending(&mut self) {
        self.pending = None;
    }

    /// Forms a segment from two existing markers. Markers that already belong
    /// to a segment are rejected.
    pub fn pair_markers(&mut self, a: MarkerId, b: MarkerId) -> Result<SegmentId> {
        if a == b {
            return Err(LipSyncError::InvalidArgument(format!(
                "marker `{a}` cannot be paired with itself"
            )));
        }
        let (time_a, time_b) = (self.unpaired_time(a)?, self.unpaired_time(b)?);

        self.next_segment += 1;
        let id = SegmentId(self.next_segment);
        let mut segment = Segment {
            id,
            markers: [a, b],
            text: String::new(),
            start_time: 0.0,
            end_time: 0.0,
        };
        segment.set_bounds(time_a, time_b);
        tracing::debug!(
            %id,
            start = segment.start_time,
            end = segment.end_time,
            "segment created"
        );
        self.segments.insert(id, segment);

        for marker in [a, b] {
            if let Some(marker) = self.markers.get_mut(&marker) {
                marker.segment = Some(id);
            }
        }
        if self.pending.is_some_and(|pending| pending == a || pending == b) {
            self.clear_pending();
        }
        Ok(id)
    }

    /// Moves a marker and synchronously refreshes the bounds of its segment.
    /// Returns the segments whose derived display is now stale.
    pub fn move_marker(&mut self, id: MarkerId, new_time: f64) -> Result<Vec<SegmentId>> {
        let time = self.clamp_time(new_time);
        let marker = self
            .markers
            .get_mut(&id)
            .ok_or(LipSyncError::UnknownMarker(id))?;
        marker.time = time;
        let Some(segment_id) = marker.segment else {
            return Ok(Vec::new());
        };

        let segment = self
            .segments
            .get(&segment_id)
            .ok_or(LipSyncError::UnknownSegment(segment_id))?;
        let [a, b] = segment.markers;
        let time_a = self.marker_time(a)?;
        let time_b = self.marker_time(b)?;
        if let Some(segment) = self.segments.get_mut(&segment_id) {
            segment.set_bounds(time_a, time_b);
        }
        Ok(vec![segment_id])
    }

    pub fn set_text(&mut self, id: SegmentId, text: impl Into<String>) -> Result<()> {
        let segment = self
            .segments
            .get_mut(&id)
            .ok_or(LipSyncError::UnknownSegment(id))?;
        segment.text = text.into();
        Ok(())
    }

    /// Removes a segment together with both of its markers.
    pub fn delete_segment(&mut self, id: SegmentId) -> Result<Segment> {
        let segment = self
            .segments
            .remove(&id)
            .ok_or(LipSyncError::UnknownSegment(id))?;
        for marker in segment.markers {
            self.markers.remove(&marker);
            if self.pending == Some(marker) {
                self.clear_pending();
            }
        }
        tracing::debug!(%id, "segment deleted");
        Ok(segment)
    }

    /// Removes a marker. A pending marker just clears the pending slot; a
    /// paired marker takes its segment and partner marker with it.
    pub fn delete_marker(&mut self, id: MarkerId) -> Result<Option<SegmentId>> {
        let marker = self
            .markers
            .get(&id)
            .ok_or(LipSyncError::UnknownMarker(id))?;
        if let Some(segment) = marker.segment {
            self.delete_segment(segment)?;
            return Ok(Some(segment));
        }

        self.markers.remove(&id);
        if self.pending == Some(id) {
            self.clear_pending();
        }
        tracing::debug!(%id, "marker deleted");
        Ok(None)
    }

    fn clamp_time(&self, time: f64) -> f64 {
        clamp_to_clip(time, self.duration)
    }

    fn marker_time(&self, id: MarkerId) -> Result<f64> {
        self.markers
            .get(&id)
            .map(|marker| marker.time)
            .ok_or(LipSyncError::UnknownMarker(id))
    }

    fn unpaired_time(&self, id: MarkerId) -> Result<f64> {
        let marker = self
            .markers
            .get(&id)
            .ok_or(LipSyncError::UnknownMarker(id))?;
        if marker.segment.is_some() {
            return Err(LipSyncError::MarkerAlreadyPaired(id));
        }
        Ok(marker.time)
    }
}

fn clamp_to_clip(time: f64, duration: Option<f64>) -> f64 {
    let time = if time.is_finite() { time.max(0.0) } else { 0.0 };
    match duration {
        Some(duration) => time.min(duration),
        None => time,
    }
}
