//! Editor configuration and builder.

use crate::editor::EditorCore;
use kurbo::Rect;
use peniko::Color;
use photoink_core::{
    BlockFont, BrushConfig, DrawSurface, EditorListener, FilteredSource, FontId, FontProvider,
    GestureConfig,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Behaviour knobs that do not depend on the canvas.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    /// Whether pinch gestures resize text overlays.
    pub text_pinch_scalable: bool,
    pub default_text_font: Option<FontId>,
    pub default_emoji_font: Option<FontId>,
    pub gesture: GestureConfig,
    pub brush: BrushConfig,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            text_pinch_scalable: true,
            default_text_font: None,
            default_emoji_font: None,
            gesture: GestureConfig::default(),
            brush: BrushConfig::default(),
        }
    }
}

impl EditorConfig {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

/// Assembles an [`EditorCore`] around a filtered source.
pub struct EditorBuilder {
    pub(crate) config: EditorConfig,
    pub(crate) fonts: Arc<dyn FontProvider>,
    pub(crate) delete_zone: Option<Rect>,
    pub(crate) selection_color: Option<Color>,
    pub(crate) listener: Option<Box<dyn EditorListener>>,
    pub(crate) surface: Option<Box<dyn DrawSurface>>,
}

impl Default for EditorBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl EditorBuilder {
    pub fn new() -> Self {
        Self {
            config: EditorConfig::default(),
            fonts: Arc::new(BlockFont),
            delete_zone: None,
            selection_color: None,
            listener: None,
            surface: None,
        }
    }

    /// Replace the whole configuration.
    pub fn with_config(mut self, config: EditorConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_text_pinch_scalable(mut self, scalable: bool) -> Self {
        self.config.text_pinch_scalable = scalable;
        self
    }

    pub fn with_default_text_font(mut self, font: FontId) -> Self {
        self.config.default_text_font = Some(font);
        self
    }

    pub fn with_default_emoji_font(mut self, font: FontId) -> Self {
        self.config.default_emoji_font = Some(font);
        self
    }

    pub fn with_gesture_config(mut self, gesture: GestureConfig) -> Self {
        self.config.gesture = gesture;
        self
    }

    pub fn with_brush(mut self, brush: BrushConfig) -> Self {
        self.config.brush = brush;
        self
    }

    pub fn with_fonts(mut self, fonts: Arc<dyn FontProvider>) -> Self {
        self.fonts = fonts;
        self
    }

    pub fn with_delete_zone(mut self, zone: Rect) -> Self {
        self.delete_zone = Some(zone);
        self
    }

    /// Helper box colour used by live preview.
    pub fn with_selection_color(mut self, color: Color) -> Self {
        self.selection_color = Some(color);
        self
    }

    pub fn with_listener(mut self, listener: impl EditorListener + 'static) -> Self {
        self.listener = Some(Box::new(listener));
        self
    }

    pub fn with_surface(mut self, surface: impl DrawSurface + 'static) -> Self {
        self.surface = Some(Box::new(surface));
        self
    }

    /// Create the editor; the canvas takes the source's size.
    pub fn build(self, source: impl FilteredSource + 'static) -> EditorCore {
        EditorCore::from_builder(self, Box::new(source))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_from_partial_json() {
        let config = EditorConfig::from_json(
            r#"{"text_pinch_scalable": false, "gesture": {"touch_slop": 12.0}, "brush": {"width": 5.0}}"#,
        )
        .unwrap();
        assert!(!config.text_pinch_scalable);
        assert!((config.gesture.touch_slop - 12.0).abs() < f64::EPSILON);
        assert_eq!(config.gesture.tap_timeout_ms, 300);
        assert!((config.brush.width - 5.0).abs() < f64::EPSILON);
        assert_eq!(config.brush.opacity, 255);
    }

    #[test]
    fn test_config_round_trips_through_json() {
        let config = EditorConfig {
            default_emoji_font: Some(FontId::new("emoji")),
            ..EditorConfig::default()
        };
        let json = serde_json::to_string(&config).unwrap();
        assert_eq!(EditorConfig::from_json(&json).unwrap(), config);
    }
}
