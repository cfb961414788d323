//! Display-side state for the segment list and the waveform overlay.
//!
//! Rows are addressed directly by [`SegmentId`]; nothing here looks a row up
//! by scanning.

use std::collections::HashMap;

use serde::Serialize;

use crate::mapping::DisplayGeometry;
use crate::store::{MarkerId, MarkerRole, SegmentId, SegmentView, TimelineStore};
use crate::Result;

/// Narrowest block drawn for a segment, so zero-length segments stay visible.
pub const MIN_BLOCK_WIDTH: f64 = 2.0;

/// Horizontal placement of a segment block on the waveform overlay.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BlockGeometry {
    pub left: f64,
    pub width: f64,
}

impl BlockGeometry {
    pub fn for_span(start: f64, end: f64, geometry: &DisplayGeometry) -> Self {
        let left = geometry.time_to_offset(start).round();
        let right = geometry.time_to_offset(end).round();
        Self {
            left,
            width: (right - left).max(MIN_BLOCK_WIDTH),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MarkerPin {
    pub id: MarkerId,
    pub role: MarkerRole,
    pub left: f64,
    pub label: char,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SegmentRow {
    pub view: SegmentView,
    pub title: String,
    pub block: BlockGeometry,
}

impl SegmentRow {
    fn new(view: SegmentView, geometry: &DisplayGeometry) -> Self {
        Self {
            title: segment_title(view.start_time, view.end_time),
            block: BlockGeometry::for_span(view.start_time, view.end_time, geometry),
            view,
        }
    }
}

pub fn segment_title(start: f64, end: f64) -> String {
    format!("Segment: {start:.2} - {end:.2}")
}

/// The segment list plus marker pins, kept in step with a [`TimelineStore`].
#[derive(Debug)]
pub struct SegmentPanel {
    geometry: DisplayGeometry,
    rows: HashMap<SegmentId, SegmentRow>,
    pins: HashMap<MarkerId, MarkerPin>,
}

impl SegmentPanel {
    pub fn new(geometry: DisplayGeometry) -> Self {
        Self {
            geometry,
            rows: HashMap::new(),
            pins: HashMap::new(),
        }
    }

    pub fn geometry(&self) -> &DisplayGeometry {
        &self.geometry
    }

    pub fn row(&self, id: SegmentId) -> Option<&SegmentRow> {
        self.rows.get(&id)
    }

    pub fn pin(&self, id: MarkerId) -> Option<&MarkerPin> {
        self.pins.get(&id)
    }

    /// Rows in segment creation order.
    pub fn rows(&self) -> Vec<&SegmentRow> {
        let mut rows: Vec<_> = self.rows.values().collect();
        rows.sort_by_key(|row| row.view.id);
        rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Rebuilds every pin and row, e.g. after a resize or zoom change.
    pub fn relayout(&mut self, store: &TimelineStore, geometry: DisplayGeometry) {
        self.geometry = geometry;
        self.pins.clear();
        self.rows.clear();
        for marker in store.markers() {
            self.sync_marker(store, marker.id);
        }
        for view in store.segment_views() {
            self.rows.insert(view.id, SegmentRow::new(view, &self.geometry));
        }
    }

    /// Refreshes the display of one segment and its two pins.
    pub fn sync_segment(&mut self, store: &TimelineStore, id: SegmentId) {
        match store.segment(id) {
            Some(segment) => {
                for marker in segment.markers {
                    self.sync_marker(store, marker);
                }
                self.rows
                    .insert(id, SegmentRow::new(segment.into(), &self.geometry));
            }
            None => {
                self.rows.remove(&id);
            }
        }
    }

    pub fn sync_marker(&mut self, store: &TimelineStore, id: MarkerId) {
        match store.marker(id) {
            Some(marker) => {
                self.pins.insert(
                    id,
                    MarkerPin {
                        id,
                        role: marker.role,
                        left: self.geometry.time_to_offset(marker.time).round(),
                        label: marker.role.label(),
                    },
                );
            }
            None => {
                self.pins.remove(&id);
            }
        }
    }

    /// Writes a text field edit back into the store.
    pub fn edit_text(
        &mut self,
        store: &mut TimelineStore,
        id: SegmentId,
        text: &str,
    ) -> Result<()> {
        store.set_text(id, text)?;
        if let Some(row) = self.rows.get_mut(&id) {
            row.view.text = text.to_string();
        }
        Ok(())
    }

    /// Deletes a segment through the store and drops its row and pins.
    pub fn delete(&mut self, store: &mut TimelineStore, id: SegmentId) -> Result<()> {
        let segment = store.delete_segment(id)?;
        for marker in segment.markers {
            self.pins.remove(&marker);
        }
        self.rows.remove(&id);
        Ok(())
    }
}
