//! Per-frame viseme selection and drawing.
//!
//! Selection is a pure function of the store and a time value, shared by
//! live playback and export so both produce identical frames.

use std::collections::HashMap;
use std::sync::Arc;

use image::imageops::{overlay, resize, FilterType};
use image::{Rgba, RgbaImage};

use crate::config::PreviewConfig;
use crate::store::{Segment, TimelineStore};
use crate::viseme::{VisemeGroup, VisemeResolver};

/// Lower bound on a segment's length when computing letter progress.
pub const MIN_SEGMENT_SPAN: f64 = 1e-4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameSelection {
    Neutral,
    Letter(char),
}

/// What actually ended up on the frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Drawn {
    Viseme(VisemeGroup),
    /// Neutral mouth stretched over the whole frame.
    Neutral,
    /// Nothing was ready; only the background fill is visible.
    Background,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderOutcome {
    pub time: f64,
    pub selection: FrameSelection,
    pub drawn: Drawn,
}

/// First segment, in creation order, whose span contains `time`.
pub fn active_segment(store: &TimelineStore, time: f64) -> Option<&Segment> {
    store.segments().find(|segment| segment.contains(time))
}

/// The letter of `segment` spoken at `time`. Whitespace is skipped and the
/// remaining letters share the span evenly. Text with no letters yields
/// `None`, which renders like time outside any segment.
pub fn letter_at(segment: &Segment, time: f64) -> Option<char> {
    let letters: Vec<char> = segment.text.chars().filter(|c| !c.is_whitespace()).collect();
    if letters.is_empty() {
        return None;
    }
    let frac = (time - segment.start_time()) / segment.duration().max(MIN_SEGMENT_SPAN);
    let last = letters.len() - 1;
    let index = (frac * letters.len() as f64).floor().clamp(0.0, last as f64) as usize;
    Some(letters[index])
}

pub fn select_frame(store: &TimelineStore, time: f64) -> FrameSelection {
    active_segment(store, time)
        .and_then(|segment| letter_at(segment, time))
        .map_or(FrameSelection::Neutral, FrameSelection::Letter)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Placement {
    Fit,
    Stretch,
}

/// Owns the output frame and draws one viseme per call.
#[derive(Debug)]
pub struct FrameRenderer {
    canvas: RgbaImage,
    background: Rgba<u8>,
    fit_scale: f32,
    scaled: HashMap<(VisemeGroup, Placement), Arc<RgbaImage>>,
}

impl FrameRenderer {
    pub fn new(width: u32, height: u32) -> Self {
        Self::from_config(&PreviewConfig {
            width,
            height,
            ..PreviewConfig::default()
        })
    }

    pub fn from_config(config: &PreviewConfig) -> Self {
        let background = Rgba(config.background);
        Self {
            canvas: RgbaImage::from_pixel(config.width.max(1), config.height.max(1), background),
            background,
            fit_scale: config.fit_scale,
            scaled: HashMap::new(),
        }
    }

    pub fn frame(&self) -> &RgbaImage {
        &self.canvas
    }

    pub fn background(&self) -> Rgba<u8> {
        self.background
    }

    /// Clears the frame and draws the viseme for `time`. Images that are not
    /// loaded yet fall back to neutral for this call only.
    pub fn render(
        &mut self,
        store: &TimelineStore,
        resolver: &mut VisemeResolver,
        time: f64,
    ) -> RenderOutcome {
        self.clear();
        let selection = select_frame(store, time);

        let drawn = match selection {
            FrameSelection::Letter(c) => {
                let handle = resolver.resolve(c);
                match handle.image() {
                    Some(image) => {
                        self.draw(handle.group(), &image, Placement::Fit);
                        Drawn::Viseme(handle.group())
                    }
                    None => self.draw_neutral(resolver),
                }
            }
            FrameSelection::Neutral => self.draw_neutral(resolver),
        };

        RenderOutcome {
            time,
            selection,
            drawn,
        }
    }

    fn clear(&mut self) {
        for pixel in self.canvas.pixels_mut() {
            *pixel = self.background;
        }
    }

    fn draw_neutral(&mut self, resolver: &mut VisemeResolver) -> Drawn {
        match resolver.neutral().image() {
            Some(image) => {
                self.draw(VisemeGroup::Neutral, &image, Placement::Stretch);
                Drawn::Neutral
            }
            None => Drawn::Background,
        }
    }

    fn draw(&mut self, group: VisemeGroup, image: &RgbaImage, placement: Placement) {
        let (canvas_w, canvas_h) = self.canvas.dimensions();
        let fit_scale = self.fit_scale;
        let scaled = self
            .scaled
            .entry((group, placement))
            .or_insert_with(|| Arc::new(scale_for(image, canvas_w, canvas_h, placement, fit_scale)))
            .clone();

        let x = (i64::from(canvas_w) - i64::from(scaled.width())) / 2;
        let y = (i64::from(canvas_h) - i64::from(scaled.height())) / 2;
        overlay(&mut self.canvas, scaled.as_ref(), x, y);
    }
}

fn scale_for(
    image: &RgbaImage,
    canvas_w: u32,
    canvas_h: u32,
    placement: Placement,
    fit_scale: f32,
) -> RgbaImage {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return RgbaImage::new(1, 1);
    }
    let (target_w, target_h) = match placement {
        Placement::Stretch => (canvas_w, canvas_h),
        Placement::Fit => {
            let scale = (canvas_w as f32 / width as f32).min(canvas_h as f32 / height as f32)
                * fit_scale;
            (
                (width as f32 * scale).round().max(1.0) as u32,
                (height as f32 * scale).round().max(1.0) as u32,
            )
        }
    };
    if (target_w, target_h) == (width, height) {
        return image.clone();
    }
    resize(image, target_w, target_h, FilterType::Triangle)
}
