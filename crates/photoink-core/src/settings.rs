//! Export settings.

use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SaveFormat {
    Png,
    #[default]
    Jpeg,
    WebP,
}

impl SaveFormat {
    /// Guess the format from a file extension (case-insensitive).
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "png" => Some(SaveFormat::Png),
            "jpg" | "jpeg" => Some(SaveFormat::Jpeg),
            "webp" => Some(SaveFormat::WebP),
            _ => None,
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            SaveFormat::Png => "png",
            SaveFormat::Jpeg => "jpg",
            SaveFormat::WebP => "webp",
        }
    }
}

/// How the flattened scene is exported.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SaveSettings {
    pub format: SaveFormat,
    /// 0 to 100; only lossy formats use it.
    pub quality: u8,
    pub strip_transparent_borders: bool,
    pub clear_after_save: bool,
}

impl Default for SaveSettings {
    fn default() -> Self {
        Self {
            format: SaveFormat::default(),
            quality: 100,
            strip_transparent_borders: false,
            clear_after_save: false,
        }
    }
}

impl SaveSettings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_format(mut self, format: SaveFormat) -> Self {
        self.format = format;
        self
    }

    /// Values above 100 are clamped.
    pub fn with_quality(mut self, quality: u8) -> Self {
        self.quality = quality.min(100);
        self
    }

    pub fn with_strip_transparent_borders(mut self, strip: bool) -> Self {
        self.strip_transparent_borders = strip;
        self
    }

    pub fn with_clear_after_save(mut self, clear: bool) -> Self {
        self.clear_after_save = clear;
        self
    }
}
