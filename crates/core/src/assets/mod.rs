use std::collections::HashMap;
use std::path::PathBuf;

use image::RgbaImage;

use crate::{LipSyncError, Result};

/// Source of viseme images, addressed by resource path.
pub trait ImageLoader {
    fn load(&self, path: &str) -> Result<RgbaImage>;
}

/// Loads images from files below a root directory.
#[derive(Debug, Clone)]
pub struct DirectoryLoader {
    root: PathBuf,
}

impl DirectoryLoader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl ImageLoader for DirectoryLoader {
    fn load(&self, path: &str) -> Result<RgbaImage> {
        let full = self.root.join(path);
        let image = image::open(&full)?;
        Ok(image.to_rgba8())
    }
}

/// Registry of images that already live in memory.
#[derive(Debug, Default, Clone)]
pub struct MemoryLoader {
    images: HashMap<String, RgbaImage>,
}

impl MemoryLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, path: impl Into<String>, image: RgbaImage) {
        self.images.insert(path.into(), image);
    }

    pub fn with(mut self, path: impl Into<String>, image: RgbaImage) -> Self {
        self.insert(path, image);
        self
    }
}

impl ImageLoader for MemoryLoader {
    fn load(&self, path: &str) -> Result<RgbaImage> {
        self.images
            .get(path)
            .cloned()
            .ok_or_else(|| LipSyncError::msg(format!("no image registered for `{path}`")))
    }
}
