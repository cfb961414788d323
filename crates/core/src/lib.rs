//! Core library for the lip-sync timeline.
//!
//! A user marks segments on an audio clip, types text into each one, and the
//! crate turns playback time into a mouth-shape (viseme) frame. Each module
//! owns one piece of that pipeline: time/pixel mapping, the marker and
//! segment store, viseme resolution, per-tick rendering and export.

pub mod assets;
pub mod audio;
pub mod config;
pub mod editor;
pub mod error;
pub mod interaction;
pub mod mapping;
pub mod record;
pub mod render;
pub mod store;
pub mod timeline;
pub mod viseme;

pub use assets::{DirectoryLoader, ImageLoader, MemoryLoader};
pub use audio::{AudioSource, VirtualTransport};
pub use config::{AppConfig, PreviewConfig, VisemeConfig, ZoomConfig};
pub use editor::{BlockGeometry, MarkerPin, SegmentPanel, SegmentRow};
pub use error::{LipSyncError, Result};
pub use interaction::{DragController, DragSession};
pub use mapping::{offset_to_time, time_to_offset, DisplayGeometry, Zoom};
pub use record::{
    CaptureStatus, ExportFormat, ExportSummary, FrameSink, GifSink, MemorySink, PngSequenceSink,
    RealtimeCapture, Recorder, RecordingSettings,
};
pub use render::{select_frame, Drawn, FrameRenderer, FrameSelection, RenderOutcome};
pub use store::{
    Authoring, Marker, MarkerId, MarkerRole, Segment, SegmentId, SegmentView, TimelineStore,
};
pub use timeline::{PlaybackClock, PlaybackState, Player, TickLoop, TickToken};
pub use viseme::{VisemeGroup, VisemeHandle, VisemeResolver};
