use crate::timeline::PlaybackClock;

/// Transport of the loaded audio clip, as seen by the timeline.
///
/// Decoding and output belong to the implementor; the timeline only reads
/// the playhead and issues transport commands.
pub trait AudioSource {
    /// Total length in seconds, or `None` until the clip is ready.
    fn duration(&self) -> Option<f64>;
    fn current_time(&self) -> f64;
    fn seek(&mut self, time: f64);
    fn play(&mut self);
    fn pause(&mut self);
    fn is_playing(&self) -> bool;

    fn is_ready(&self) -> bool {
        self.duration().is_some()
    }

    /// True once the playhead has reached the end of the clip.
    fn is_finished(&self) -> bool {
        self.duration()
            .is_some_and(|duration| self.current_time() >= duration)
    }
}

/// Headless transport driven by explicit time steps instead of an audio
/// device. Used by the command line front end and by tests.
#[derive(Debug, Default, Clone)]
pub struct VirtualTransport {
    clock: PlaybackClock,
    duration: Option<f64>,
    playing: bool,
}

impl VirtualTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_duration(duration: f64) -> Self {
        let mut transport = Self::new();
        transport.load(duration);
        transport
    }

    /// Loads a clip of the given length and rewinds. Signals readiness.
    pub fn load(&mut self, duration: f64) {
        self.duration = (duration.is_finite() && duration > 0.0).then_some(duration);
        self.playing = false;
        self.clock.reset();
    }

    /// Moves the playhead while playing. Playback stops at the end of the clip.
    pub fn advance(&mut self, delta: f64) {
        if !self.playing {
            return;
        }
        self.clock.advance(delta);
        if let Some(duration) = self.duration {
            if self.clock.time_seconds >= duration {
                self.clock.time_seconds = duration;
                self.playing = false;
                tracing::debug!(duration, "playback reached end of clip");
            }
        }
    }
}

impl AudioSource for VirtualTransport {
    fn duration(&self) -> Option<f64> {
        self.duration
    }

    fn current_time(&self) -> f64 {
        self.clock.time_seconds
    }

    fn seek(&mut self, time: f64) {
        let limit = self.duration.unwrap_or(0.0);
        self.clock.time_seconds = if time.is_finite() { time.clamp(0.0, limit) } else { 0.0 };
    }

    fn play(&mut self) {
        if self.duration.is_some() {
            if self.is_finished() {
                self.clock.reset();
            }
            self.playing = true;
        }
    }

    fn pause(&mut self) {
        self.playing = false;
    }

    fn is_playing(&self) -> bool {
        self.playing
    }
}
