//! Character to mouth-shape resolution.
//!
//! Letters are grouped into a fixed set of phonetic shapes. Every group is
//! backed by one image resource, loaded lazily and kept for the lifetime of
//! the resolver.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, OnceLock};

use image::RgbaImage;
use serde::{Deserialize, Serialize};

use crate::assets::ImageLoader;

/// Phonetic mouth-shape group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VisemeGroup {
    AE,
    BMP,
    CJS,
    DGKNTXYZ,
    FV,
    H,
    IQ,
    L,
    O,
    R,
    UW,
    Neutral,
}

impl VisemeGroup {
    pub const ALL: [VisemeGroup; 12] = [
        VisemeGroup::AE,
        VisemeGroup::BMP,
        VisemeGroup::CJS,
        VisemeGroup::DGKNTXYZ,
        VisemeGroup::FV,
        VisemeGroup::H,
        VisemeGroup::IQ,
        VisemeGroup::L,
        VisemeGroup::O,
        VisemeGroup::R,
        VisemeGroup::UW,
        VisemeGroup::Neutral,
    ];

    /// Group for a single character. Input is case-normalized; anything
    /// outside the alphabet, whitespace included, is neutral.
    pub fn for_char(c: char) -> Self {
        match c.to_ascii_uppercase() {
            'A' | 'E' => Self::AE,
            'B' | 'M' | 'P' => Self::BMP,
            'C' | 'J' | 'S' => Self::CJS,
            'D' | 'G' | 'K' | 'N' | 'T' | 'X' | 'Y' | 'Z' => Self::DGKNTXYZ,
            'F' | 'V' => Self::FV,
            'H' => Self::H,
            'I' | 'Q' => Self::IQ,
            'L' => Self::L,
            'O' => Self::O,
            'R' => Self::R,
            'U' | 'W' => Self::UW,
            _ => Self::Neutral,
        }
    }

    /// Image resource backing the group, relative to the viseme root.
    pub fn resource(self) -> &'static str {
        match self {
            Self::AE => "A,E.png",
            Self::BMP => "B,M,P.png",
            Self::CJS => "C,J,S.png",
            Self::DGKNTXYZ => "D,G,K,N,T,X,Y,Z.png",
            Self::FV => "F,V.png",
            Self::H => "H.png",
            Self::IQ => "I,Q.png",
            Self::L => "L.png",
            Self::O => "O.png",
            Self::R => "R.png",
            Self::UW => "U,W.png",
            Self::Neutral => "neutral.png",
        }
    }
}

impl fmt::Display for VisemeGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.resource().trim_end_matches(".png"))
    }
}

/// Shared handle to a viseme image that may still be loading.
#[derive(Clone)]
pub struct VisemeHandle {
    group: VisemeGroup,
    slot: Arc<OnceLock<Option<Arc<RgbaImage>>>>,
}

impl VisemeHandle {
    fn new(group: VisemeGroup) -> Self {
        Self {
            group,
            slot: Arc::new(OnceLock::new()),
        }
    }

    pub fn group(&self) -> VisemeGroup {
        self.group
    }

    pub fn path(&self) -> &'static str {
        self.group.resource()
    }

    /// The decoded image, or `None` while loading or after a failed load.
    pub fn image(&self) -> Option<Arc<RgbaImage>> {
        self.slot.get().cloned().flatten()
    }

    pub fn is_settled(&self) -> bool {
        self.slot.get().is_some()
    }
}

impl fmt::Debug for VisemeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VisemeHandle")
            .field("path", &self.path())
            .field("ready", &self.image().is_some())
            .finish()
    }
}

/// Resolves characters to viseme handles through a never-evicted cache.
///
/// Loads are cooperative: [`VisemeResolver::resolve`] only queues work, and
/// [`VisemeResolver::poll_loads`] performs it between ticks.
pub struct VisemeResolver {
    loader: Box<dyn ImageLoader>,
    cache: HashMap<&'static str, VisemeHandle>,
    queue: Vec<VisemeHandle>,
}

impl VisemeResolver {
    pub fn new(loader: impl ImageLoader + 'static) -> Self {
        Self {
            loader: Box::new(loader),
            cache: HashMap::new(),
            queue: Vec::new(),
        }
    }

    /// Returns the handle for `c`, queueing a load on first use.
    pub fn resolve(&mut self, c: char) -> VisemeHandle {
        self.handle(VisemeGroup::for_char(c))
    }

    pub fn neutral(&mut self) -> VisemeHandle {
        self.handle(VisemeGroup::Neutral)
    }

    pub fn handle(&mut self, group: VisemeGroup) -> VisemeHandle {
        let queue = &mut self.queue;
        self.cache
            .entry(group.resource())
            .or_insert_with(|| {
                let handle = VisemeHandle::new(group);
                queue.push(handle.clone());
                handle
            })
            .clone()
    }

    /// Completes every queued load. Returns how many loads were attempted.
    pub fn poll_loads(&mut self) -> usize {
        let pending = std::mem::take(&mut self.queue);
        let count = pending.len();
        for handle in pending {
            let loaded = match self.loader.load(handle.path()) {
                Ok(image) => Some(Arc::new(image)),
                Err(err) => {
                    tracing::warn!(
                        path = handle.path(),
                        %err,
                        "viseme image unavailable, using neutral"
                    );
                    None
                }
            };
            let _ = handle.slot.set(loaded);
        }
        count
    }

    /// Requests every group and waits for the loads to settle.
    pub fn preload_all(&mut self) {
        for group in VisemeGroup::ALL {
            self.handle(group);
        }
        self.poll_loads();
    }

    pub fn cached_paths(&self) -> usize {
        self.cache.len()
    }

    pub fn has_pending_loads(&self) -> bool {
        !self.queue.is_empty()
    }
}

impl fmt::Debug for VisemeResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VisemeResolver")
            .field("cached", &self.cache.len())
            .field("pending", &self.queue.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::MemoryLoader;
    use image::Rgba;

    fn loader() -> MemoryLoader {
        let mut loader = MemoryLoader::new();
        for group in VisemeGroup::ALL {
            loader.insert(group.resource(), RgbaImage::from_pixel(4, 4, Rgba([0, 0, 0, 255])));
        }
        loader
    }

    #[test]
    fn groups_letters_case_insensitively() {
        assert_eq!(VisemeGroup::for_char('a'), VisemeGroup::AE);
        assert_eq!(VisemeGroup::for_char('E'), VisemeGroup::AE);
        assert_eq!(VisemeGroup::for_char('m'), VisemeGroup::BMP);
        assert_eq!(VisemeGroup::for_char('z'), VisemeGroup::DGKNTXYZ);
        assert_eq!(VisemeGroup::for_char('w'), VisemeGroup::UW);
    }

    #[test]
    fn unknown_characters_are_neutral() {
        assert_eq!(VisemeGroup::for_char('9'), VisemeGroup::Neutral);
        assert_eq!(VisemeGroup::for_char(' '), VisemeGroup::Neutral);
        assert_eq!(VisemeGroup::for_char('?'), VisemeGroup::Neutral);
        assert_eq!(VisemeGroup::for_char('é'), VisemeGroup::Neutral);

        let mut resolver = VisemeResolver::new(loader());
        assert_eq!(resolver.resolve('9').path(), "neutral.png");
    }

    #[test]
    fn handle_is_returned_before_load_completes() {
        let mut resolver = VisemeResolver::new(loader());
        let handle = resolver.resolve('h');
        assert!(handle.image().is_none());
        assert!(resolver.has_pending_loads());

        assert_eq!(resolver.poll_loads(), 1);
        assert!(handle.image().is_some());
    }

    #[test]
    fn cache_is_keyed_by_resource_path() {
        let mut resolver = VisemeResolver::new(loader());
        resolver.resolve('a');
        resolver.resolve('E');
        resolver.resolve('b');
        assert_eq!(resolver.cached_paths(), 2);
        assert_eq!(resolver.poll_loads(), 2);
        resolver.resolve('a');
        assert_eq!(resolver.poll_loads(), 0);
    }

    #[test]
    fn failed_loads_settle_without_an_image() {
        let mut resolver = VisemeResolver::new(MemoryLoader::new());
        let handle = resolver.resolve('o');
        resolver.poll_loads();
        assert!(handle.is_settled());
        assert!(handle.image().is_none());
    }

    #[test]
    fn preload_covers_the_whole_alphabet() {
        let mut resolver = VisemeResolver::new(loader());
        resolver.preload_all();
        assert_eq!(resolver.cached_paths(), VisemeGroup::ALL.len());
        assert!(!resolver.has_pending_loads());
        assert!(resolver.neutral().image().is_some());
    }
}
