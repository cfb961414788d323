//! Conversions between audio time and horizontal pixel offsets on the
//! waveform view.
//!
//! Nothing here holds state. Callers rebuild a [`DisplayGeometry`] whenever
//! the view is resized or zoomed and map through it.

use serde::{Deserialize, Serialize};

use crate::config::ZoomConfig;

/// Converts a playback time into a pixel offset.
///
/// The time is clamped to `[0, duration]`. A non-positive duration maps
/// everything to offset zero.
pub fn time_to_offset(time: f64, duration: f64, display_width: f64) -> f64 {
    if !(duration > 0.0) || !(display_width > 0.0) || !time.is_finite() {
        return 0.0;
    }
    time.clamp(0.0, duration) / duration * display_width
}

/// Converts a pixel offset back into a playback time.
///
/// The offset is clamped to `[0, display_width]` before conversion.
pub fn offset_to_time(offset: f64, duration: f64, display_width: f64) -> f64 {
    if !(duration > 0.0) || !(display_width > 0.0) || !offset.is_finite() {
        return 0.0;
    }
    offset.clamp(0.0, display_width) / display_width * duration
}

/// Snapshot of the waveform view geometry at one point in time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DisplayGeometry {
    pub duration: f64,
    pub width: f64,
}

impl DisplayGeometry {
    pub fn new(duration: f64, width: f64) -> Self {
        Self { duration, width }
    }

    /// Geometry for a zoomed view: the waveform never gets narrower than its
    /// container, and grows with the zoom level otherwise.
    pub fn zoomed(duration: f64, container_width: f64, zoom: Zoom) -> Self {
        let zoomed = duration.max(0.0) * zoom.px_per_second();
        Self::new(duration, container_width.max(zoomed))
    }

    pub fn time_to_offset(&self, time: f64) -> f64 {
        time_to_offset(time, self.duration, self.width)
    }

    pub fn offset_to_time(&self, offset: f64) -> f64 {
        offset_to_time(offset, self.duration, self.width)
    }

    /// Amount of time covered by a single pixel.
    pub fn seconds_per_pixel(&self) -> f64 {
        if self.width > 0.0 {
            self.duration.max(0.0) / self.width
        } else {
            0.0
        }
    }
}

/// Horizontal zoom level of the waveform, in pixels per second.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Zoom {
    px_per_second: f64,
    min: f64,
    max: f64,
}

impl Default for Zoom {
    fn default() -> Self {
        Self::from_config(&ZoomConfig::default())
    }
}

impl Zoom {
    pub fn from_config(config: &ZoomConfig) -> Self {
        let min = config.min.min(config.max);
        let max = config.max.max(config.min);
        Self {
            px_per_second: config.initial.clamp(min, max),
            min,
            max,
        }
    }

    pub fn px_per_second(&self) -> f64 {
        self.px_per_second
    }

    /// Sets the zoom level, clamped to the configured range.
    pub fn set(&mut self, px_per_second: f64) {
        if px_per_second.is_finite() {
            self.px_per_second = px_per_second.clamp(self.min, self.max);
        }
    }

    /// Computes the zoom level for a two-finger pinch.
    ///
    /// `start` is the zoom level when the gesture began, `start_distance` the
    /// finger distance at that moment and `distance` the current one.
    pub fn from_pinch(&self, start: f64, start_distance: f64, distance: f64) -> Self {
        let mut next = *self;
        if start_distance > 0.0 {
            next.set((start * distance / start_distance).round());
        }
        next
    }
}
