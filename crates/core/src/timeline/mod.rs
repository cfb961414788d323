use std::time::Duration;

use image::RgbaImage;

use crate::audio::{AudioSource, VirtualTransport};
use crate::render::{FrameRenderer, RenderOutcome};
use crate::store::TimelineStore;
use crate::viseme::VisemeResolver;
use crate::{LipSyncError, Result};

#[derive(Debug, Default, Clone)]
pub struct PlaybackClock {
    pub time_seconds: f64,
}

impl PlaybackClock {
    pub fn reset(&mut self) {
        self.time_seconds = 0.0;
    }

    pub fn advance(&mut self, delta: f64) {
        self.time_seconds = (self.time_seconds + delta).max(0.0);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Idle,
    Running,
}

/// Proof that a tick was scheduled by a particular run of the loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickToken {
    generation: u64,
}

/// Cancelable repeating task firing at a target rate.
///
/// Every cancel bumps the generation, so a tick scheduled before a pause can
/// never fire after it.
#[derive(Debug, Clone)]
pub struct TickLoop {
    interval: Duration,
    generation: u64,
    state: PlaybackState,
}

impl TickLoop {
    pub fn new(rate_hz: u32) -> Self {
        Self {
            interval: Duration::from_secs_f64(1.0 / f64::from(rate_hz.max(1))),
            generation: 0,
            state: PlaybackState::Idle,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    /// Starts the loop. Starting a running loop hands back the live token
    /// instead of spawning a second loop.
    pub fn start(&mut self) -> TickToken {
        if self.state == PlaybackState::Idle {
            self.generation += 1;
            self.state = PlaybackState::Running;
        }
        TickToken {
            generation: self.generation,
        }
    }

    pub fn cancel(&mut self) {
        if self.state == PlaybackState::Running {
            self.generation += 1;
            self.state = PlaybackState::Idle;
        }
    }

    pub fn is_live(&self, token: TickToken) -> bool {
        self.state == PlaybackState::Running && token.generation == self.generation
    }
}

/// Drives the renderer from an audio transport while playback runs.
#[derive(Debug)]
pub struct Player<A> {
    audio: A,
    ticks: TickLoop,
    token: Option<TickToken>,
    renderer: FrameRenderer,
}

impl<A: AudioSource> Player<A> {
    pub fn new(audio: A, renderer: FrameRenderer, tick_rate: u32) -> Self {
        Self {
            audio,
            ticks: TickLoop::new(tick_rate),
            token: None,
            renderer,
        }
    }

    pub fn audio(&self) -> &A {
        &self.audio
    }

    pub fn audio_mut(&mut self) -> &mut A {
        &mut self.audio
    }

    pub fn state(&self) -> PlaybackState {
        self.ticks.state()
    }

    pub fn tick_interval(&self) -> Duration {
        self.ticks.interval()
    }

    /// Last rendered frame.
    pub fn frame(&self) -> &RgbaImage {
        self.renderer.frame()
    }

    pub fn play(&mut self) -> Result<()> {
        if !self.audio.is_ready() {
            return Err(LipSyncError::not_ready("play"));
        }
        self.audio.play();
        self.token = Some(self.ticks.start());
        tracing::info!(time = self.audio.current_time(), "playback started");
        Ok(())
    }

    /// Pauses the audio and cancels any scheduled tick.
    pub fn pause(&mut self) {
        self.audio.pause();
        self.stop_ticking();
        tracing::info!(time = self.audio.current_time(), "playback paused");
    }

    pub fn toggle(&mut self) -> Result<PlaybackState> {
        match self.state() {
            PlaybackState::Running => self.pause(),
            PlaybackState::Idle => self.play()?,
        }
        Ok(self.state())
    }

    /// Runs one tick. Returns `None` when no live tick is scheduled.
    pub fn tick(
        &mut self,
        store: &TimelineStore,
        resolver: &mut VisemeResolver,
    ) -> Option<RenderOutcome> {
        let token = self.token?;
        if !self.ticks.is_live(token) {
            return None;
        }

        let time = self.audio.current_time();
        let outcome = self.renderer.render(store, resolver, time);
        resolver.poll_loads();

        if self.audio.is_finished() || !self.audio.is_playing() {
            self.stop_ticking();
            tracing::info!(time, "playback finished");
        }
        Some(outcome)
    }

    /// Seeks and renders exactly one frame, independent of the tick loop.
    pub fn render_at(
        &mut self,
        store: &TimelineStore,
        resolver: &mut VisemeResolver,
        time: f64,
    ) -> RenderOutcome {
        self.audio.seek(time);
        let time = self.audio.current_time();
        let outcome = self.renderer.render(store, resolver, time);
        resolver.poll_loads();
        outcome
    }

    fn stop_ticking(&mut self) {
        self.ticks.cancel();
        self.token = None;
    }
}

impl Player<VirtualTransport> {
    /// Moves the virtual playhead by `step` seconds, or by one tick interval
    /// when no step is given.
    pub fn advance(&mut self, step: Option<f64>) {
        let step = step.unwrap_or_else(|| self.tick_interval().as_secs_f64());
        self.audio.advance(step);
    }
}
