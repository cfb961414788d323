use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use image::codecs::gif::{GifEncoder, Repeat};
use image::{Delay, Frame, RgbaImage};
use serde::{Deserialize, Serialize};

use crate::audio::AudioSource;
use crate::store::TimelineStore;
use crate::timeline::{PlaybackState, Player};
use crate::viseme::VisemeResolver;
use crate::{LipSyncError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportFormat {
    Gif,
    PngSequence,
}

/// Configuration options for the recording subsystem.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecordingSettings {
    pub output_path: String,
    pub fps: u32,
    pub format: ExportFormat,
}

impl Default for RecordingSettings {
    fn default() -> Self {
        Self {
            output_path: "lipsync_export.gif".to_string(),
            fps: 12,
            format: ExportFormat::Gif,
        }
    }
}

/// Receives rendered frames in presentation order.
pub trait FrameSink {
    fn write_frame(&mut self, frame: &RgbaImage, time: f64) -> Result<()>;

    fn finish(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Encodes frames into an endlessly looping animated GIF.
pub struct GifSink<W: Write> {
    encoder: Option<GifEncoder<W>>,
    delay: Delay,
}

impl<W: Write> GifSink<W> {
    pub fn new(writer: W, fps: u32) -> Result<Self> {
        let mut encoder = GifEncoder::new(writer);
        encoder.set_repeat(Repeat::Infinite)?;
        Ok(Self {
            encoder: Some(encoder),
            delay: Delay::from_numer_denom_ms(1000, fps.max(1)),
        })
    }
}

impl GifSink<BufWriter<File>> {
    pub fn create(path: impl AsRef<Path>, fps: u32) -> Result<Self> {
        let file = File::create(path.as_ref())?;
        Self::new(BufWriter::new(file), fps)
    }
}

impl<W: Write> FrameSink for GifSink<W> {
    fn write_frame(&mut self, frame: &RgbaImage, _time: f64) -> Result<()> {
        let encoder = self
            .encoder
            .as_mut()
            .ok_or_else(|| LipSyncError::msg("gif export already finished"))?;
        encoder.encode_frame(Frame::from_parts(frame.clone(), 0, 0, self.delay))?;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        // Dropping the encoder writes the GIF trailer.
        self.encoder.take();
        Ok(())
    }
}

/// Writes every frame as a numbered PNG file.
#[derive(Debug)]
pub struct PngSequenceSink {
    directory: PathBuf,
    written: usize,
}

impl PngSequenceSink {
    pub fn create(directory: impl Into<PathBuf>) -> Result<Self> {
        let directory = directory.into();
        std::fs::create_dir_all(&directory)?;
        Ok(Self {
            directory,
            written: 0,
        })
    }

    pub fn frame_path(&self, index: usize) -> PathBuf {
        self.directory.join(format!("frame_{index:05}.png"))
    }
}

impl FrameSink for PngSequenceSink {
    fn write_frame(&mut self, frame: &RgbaImage, _time: f64) -> Result<()> {
        frame.save(self.frame_path(self.written))?;
        self.written += 1;
        Ok(())
    }
}

/// Keeps frames in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    pub frames: Vec<(f64, RgbaImage)>,
    pub finished: bool,
}

impl FrameSink for MemorySink {
    fn write_frame(&mut self, frame: &RgbaImage, time: f64) -> Result<()> {
        self.frames.push((time, frame.clone()));
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.finished = true;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExportSummary {
    pub frames: usize,
    pub duration: f64,
}

/// Steps the renderer through the whole clip and hands frames to a sink.
#[derive(Debug, Default)]
pub struct Recorder {
    settings: RecordingSettings,
    is_recording: bool,
}

impl Recorder {
    pub fn new(settings: RecordingSettings) -> Self {
        Self {
            settings,
            is_recording: false,
        }
    }

    pub fn settings(&self) -> &RecordingSettings {
        &self.settings
    }

    pub fn is_recording(&self) -> bool {
        self.is_recording
    }

    /// Opens the sink described by the settings.
    pub fn open_sink(&self) -> Result<Box<dyn FrameSink>> {
        let path = Path::new(&self.settings.output_path);
        Ok(match self.settings.format {
            ExportFormat::Gif => Box::new(GifSink::create(path, self.settings.fps)?),
            ExportFormat::PngSequence => Box::new(PngSequenceSink::create(path)?),
        })
    }

    /// Seek-driven export: one frame every `1 / fps` seconds of the clip,
    /// rendered through the same path as live playback.
    pub fn export_stepped<A: AudioSource>(
        &mut self,
        player: &mut Player<A>,
        store: &TimelineStore,
        resolver: &mut VisemeResolver,
        sink: &mut dyn FrameSink,
    ) -> Result<ExportSummary> {
        let duration = player
            .audio()
            .duration()
            .ok_or_else(|| LipSyncError::not_ready("export"))?;
        if player.state() == PlaybackState::Running {
            player.pause();
        }

        let fps = f64::from(self.settings.fps.max(1));
        let total = frame_count(duration, fps);
        tracing::info!(duration, fps, frames = total, "export started");
        self.is_recording = true;
        resolver.preload_all();

        let result = write_stepped_frames(player, store, resolver, sink, total, fps);
        self.is_recording = false;
        result?;

        tracing::info!(frames = total, "export finished");
        Ok(ExportSummary {
            frames: total,
            duration,
        })
    }
}

fn write_stepped_frames<A: AudioSource>(
    player: &mut Player<A>,
    store: &TimelineStore,
    resolver: &mut VisemeResolver,
    sink: &mut dyn FrameSink,
    total: usize,
    fps: f64,
) -> Result<()> {
    for index in 0..total {
        let cursor = index as f64 / fps;
        let outcome = player.render_at(store, resolver, cursor);
        sink.write_frame(player.frame(), outcome.time)?;
    }
    sink.finish()
}

/// Number of frames needed to cover `duration` at `fps`.
pub fn frame_count(duration: f64, fps: f64) -> usize {
    if !(duration > 0.0) || !(fps > 0.0) {
        return 0;
    }
    // Shave rounding noise so 2.5s at 12fps is 30 frames, not 31.
    (duration * fps - 1e-9).ceil().max(0.0) as usize
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureStatus {
    Recording,
    Finished,
}

/// Real-time capture: records whatever the player draws on each live tick
/// until playback reaches the end of the clip.
pub struct RealtimeCapture<'a> {
    sink: &'a mut dyn FrameSink,
    frames: usize,
    finished: bool,
}

impl<'a> RealtimeCapture<'a> {
    /// Rewinds and starts playback.
    pub fn begin<A: AudioSource>(
        player: &mut Player<A>,
        sink: &'a mut dyn FrameSink,
    ) -> Result<Self> {
        if !player.audio().is_ready() {
            return Err(LipSyncError::not_ready("export"));
        }
        player.audio_mut().seek(0.0);
        player.play()?;
        tracing::info!("real-time capture started");
        Ok(Self {
            sink,
            frames: 0,
            finished: false,
        })
    }

    pub fn frames(&self) -> usize {
        self.frames
    }

    /// Records the frame of one host tick.
    pub fn on_tick<A: AudioSource>(
        &mut self,
        player: &mut Player<A>,
        store: &TimelineStore,
        resolver: &mut VisemeResolver,
    ) -> Result<CaptureStatus> {
        if self.finished {
            return Ok(CaptureStatus::Finished);
        }
        if let Some(outcome) = player.tick(store, resolver) {
            self.sink.write_frame(player.frame(), outcome.time)?;
            self.frames += 1;
        }
        if player.state() == PlaybackState::Idle {
            self.finished = true;
            self.sink.finish()?;
            tracing::info!(frames = self.frames, "real-time capture finished");
            return Ok(CaptureStatus::Finished);
        }
        Ok(CaptureStatus::Recording)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::MemoryLoader;
    use crate::audio::VirtualTransport;
    use crate::render::{select_frame, FrameRenderer, FrameSelection};
    use crate::store::Authoring;
    use crate::viseme::VisemeGroup;
    use image::Rgba;

    fn resolver() -> VisemeResolver {
        let mut loader = MemoryLoader::new();
        for (shade, group) in VisemeGroup::ALL.iter().enumerate() {
            let shade = shade as u8 * 10;
            let image = RgbaImage::from_pixel(6, 6, Rgba([shade, shade, shade, 255]));
            loader.insert(group.resource(), image);
        }
        VisemeResolver::new(loader)
    }

    fn store() -> TimelineStore {
        let mut store = TimelineStore::new();
        store.set_duration(3.0);
        store.begin_or_complete_segment(1.0).unwrap();
        let Authoring::Completed(id) = store.begin_or_complete_segment(2.0).unwrap() else {
            panic!("expected segment");
        };
        store.set_text(id, "MO").unwrap();
        store
    }

    fn player(duration: f64) -> Player<VirtualTransport> {
        Player::new(
            VirtualTransport::with_duration(duration),
            FrameRenderer::new(24, 24),
            30,
        )
    }

    fn settings(fps: u32) -> RecordingSettings {
        RecordingSettings {
            fps,
            ..RecordingSettings::default()
        }
    }

    #[test]
    fn frame_count_covers_the_clip() {
        assert_eq!(frame_count(10.0, 12.0), 120);
        assert_eq!(frame_count(2.5, 12.0), 30);
        assert_eq!(frame_count(0.01, 12.0), 1);
        assert_eq!(frame_count(0.0, 12.0), 0);
    }

    #[test]
    fn stepped_export_walks_the_clip_at_fixed_rate() {
        let store = store();
        let mut resolver = resolver();
        let mut player = player(3.0);
        let mut sink = MemorySink::default();
        let mut recorder = Recorder::new(settings(4));

        let summary = recorder
            .export_stepped(&mut player, &store, &mut resolver, &mut sink)
            .unwrap();
        assert_eq!(summary.frames, 12);
        assert!(sink.finished);
        assert!(!recorder.is_recording());

        let times: Vec<f64> = sink.frames.iter().map(|(time, _)| *time).collect();
        assert_eq!(times[..5], [0.0, 0.25, 0.5, 0.75, 1.0]);
        assert_eq!(*times.last().unwrap(), 2.75);
    }

    #[test]
    fn stepped_frames_match_live_playback() {
        let store = store();
        let mut export_resolver = resolver();
        let mut export_player = player(3.0);
        let mut sink = MemorySink::default();
        Recorder::new(settings(4))
            .export_stepped(&mut export_player, &store, &mut export_resolver, &mut sink)
            .unwrap();

        let mut live_resolver = resolver();
        live_resolver.preload_all();
        let mut live = player(3.0);
        live.play().unwrap();
        for (time, exported) in &sink.frames {
            live.audio_mut().seek(*time);
            live.tick(&store, &mut live_resolver).unwrap();
            assert_eq!(live.frame(), exported, "frame at t={time} diverged");
        }
        assert_eq!(select_frame(&store, 1.25), FrameSelection::Letter('M'));
    }

    #[test]
    fn export_requires_a_loaded_clip() {
        let store = TimelineStore::new();
        let mut resolver = resolver();
        let mut player = Player::new(VirtualTransport::new(), FrameRenderer::new(8, 8), 30);
        let mut sink = MemorySink::default();
        let err = Recorder::default()
            .export_stepped(&mut player, &store, &mut resolver, &mut sink)
            .unwrap_err();
        assert!(matches!(err, LipSyncError::NotReady { operation: "export" }));
        assert!(sink.frames.is_empty());
    }

    #[test]
    fn realtime_capture_records_until_playback_finishes() {
        let store = store();
        let mut resolver = resolver();
        let mut player = player(1.0);
        player.audio_mut().seek(0.5);
        let mut sink = MemorySink::default();

        let mut capture = RealtimeCapture::begin(&mut player, &mut sink).unwrap();
        let mut ticks = 0;
        while capture.on_tick(&mut player, &store, &mut resolver).unwrap()
            == CaptureStatus::Recording
        {
            player.audio_mut().advance(0.25);
            ticks += 1;
            assert!(ticks < 100, "capture never finished");
        }
        let frames = capture.frames();
        assert_eq!(frames, 5);
        assert!(sink.finished);
        assert_eq!(sink.frames[0].0, 0.0);
    }

    #[test]
    fn gif_sink_produces_an_animation() {
        let mut buffer = Vec::new();
        {
            let mut sink = GifSink::new(&mut buffer, 12).unwrap();
            let frame = RgbaImage::from_pixel(4, 4, Rgba([140, 207, 103, 255]));
            sink.write_frame(&frame, 0.0).unwrap();
            sink.write_frame(&frame, 1.0 / 12.0).unwrap();
            sink.finish().unwrap();
            assert!(sink.write_frame(&frame, 0.2).is_err());
        }
        assert!(buffer.starts_with(b"GIF89a"));
        assert_eq!(buffer.last(), Some(&0x3b));
    }

    #[test]
    fn png_sequence_numbers_its_frames() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = PngSequenceSink::create(dir.path().join("frames")).unwrap();
        let frame = RgbaImage::from_pixel(2, 2, Rgba([1, 2, 3, 255]));
        sink.write_frame(&frame, 0.0).unwrap();
        sink.write_frame(&frame, 0.1).unwrap();

        assert!(sink.frame_path(0).exists());
        assert!(sink.frame_path(1).ends_with("frame_00001.png"));
        let reloaded = image::open(sink.frame_path(1)).unwrap().to_rgba8();
        assert_eq!(reloaded.get_pixel(1, 1), &Rgba([1, 2, 3, 255]));
    }

    #[test]
    fn recorder_opens_the_configured_sink() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("out.gif");
        let recorder = Recorder::new(RecordingSettings {
            output_path: output.display().to_string(),
            fps: 12,
            format: ExportFormat::Gif,
        });
        let mut sink = recorder.open_sink().unwrap();
        sink.write_frame(&RgbaImage::new(2, 2), 0.0).unwrap();
        sink.finish().unwrap();
        drop(sink);
        assert!(output.exists());
    }
}
