use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::record::RecordingSettings;
use crate::Result;

/// Top-level configuration structure for the application.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub preview: PreviewConfig,
    pub zoom: ZoomConfig,
    pub visemes: VisemeConfig,
    pub export: RecordingSettings,
}

impl AppConfig {
    /// Reads a JSON configuration file. Missing fields fall back to defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        Self::from_json(&raw)
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }
}

/// Output frame of the preview canvas.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PreviewConfig {
    pub width: u32,
    pub height: u32,
    /// Chroma-key fill drawn under every frame, as RGBA.
    pub background: [u8; 4],
    /// Fraction of the fitted size a viseme occupies.
    pub fit_scale: f32,
    /// Target rate of the playback tick loop, in Hz.
    pub tick_rate: u32,
}

impl Default for PreviewConfig {
    fn default() -> Self {
        Self {
            width: 480,
            height: 480,
            background: [0x8c, 0xcf, 0x67, 0xff],
            fit_scale: 0.9,
            tick_rate: 60,
        }
    }
}

/// Waveform zoom range, in pixels per second.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ZoomConfig {
    pub min: f64,
    pub max: f64,
    pub initial: f64,
}

impl Default for ZoomConfig {
    fn default() -> Self {
        Self {
            min: 20.0,
            max: 600.0,
            initial: 100.0,
        }
    }
}

/// Where viseme images are loaded from.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VisemeConfig {
    pub directory: PathBuf,
}

impl Default for VisemeConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("visemes"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::ExportFormat;

    #[test]
    fn empty_document_yields_defaults() {
        let config = AppConfig::from_json("{}").unwrap();
        assert_eq!(config.preview.width, 480);
        assert_eq!(config.preview.background, [0x8c, 0xcf, 0x67, 0xff]);
        assert_eq!(config.zoom.max, 600.0);
        assert_eq!(config.export.fps, 12);
    }

    #[test]
    fn partial_sections_keep_remaining_defaults() {
        let config = AppConfig::from_json(
            r#"{ "preview": { "width": 256 }, "export": { "fps": 25, "format": "png_sequence" } }"#,
        )
        .unwrap();
        assert_eq!(config.preview.width, 256);
        assert_eq!(config.preview.height, 480);
        assert_eq!(config.export.fps, 25);
        assert_eq!(config.export.format, ExportFormat::PngSequence);
    }

    #[test]
    fn reports_malformed_files() {
        let err = AppConfig::from_json("{ nope").unwrap_err();
        assert!(format!("{err}").starts_with("invalid configuration"));
    }

    #[test]
    fn loads_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lipsync.json");
        std::fs::write(&path, r#"{ "visemes": { "directory": "mouths" } }"#).unwrap();
        let config = AppConfig::load(&path).unwrap();
        assert_eq!(config.visemes.directory, PathBuf::from("mouths"));
    }
}
