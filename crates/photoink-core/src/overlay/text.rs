//! Styled text label.

use crate::color::Rgba;
use crate::fonts::{FontId, TextRequest};
use serde::{Deserialize, Serialize};

/// Horizontal alignment of text lines inside the label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Gravity {
    Left,
    #[default]
    Center,
    Right,
}

/// Optional style fields applied to a text label.
///
/// Unset fields leave the label's current value untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TextStyle {
    pub color: Option<Rgba>,
    pub font: Option<FontId>,
    pub size_pt: Option<f64>,
    pub background: Option<Rgba>,
    pub gravity: Option<Gravity>,
    /// Opaque style token handed through to the font provider.
    pub appearance: Option<String>,
}

impl TextStyle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_color(mut self, color: Rgba) -> Self {
        self.color = Some(color);
        self
    }

    pub fn with_font(mut self, font: FontId) -> Self {
        self.font = Some(font);
        self
    }

    pub fn with_size(mut self, size_pt: f64) -> Self {
        self.size_pt = Some(size_pt);
        self
    }

    pub fn with_background(mut self, color: Rgba) -> Self {
        self.background = Some(color);
        self
    }

    pub fn with_gravity(mut self, gravity: Gravity) -> Self {
        self.gravity = Some(gravity);
        self
    }

    pub fn with_appearance(mut self, token: impl Into<String>) -> Self {
        self.appearance = Some(token.into());
        self
    }
}

/// Text overlay payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextLabel {
    pub text: String,
    pub font: Option<FontId>,
    pub size_pt: f64,
    pub color: Rgba,
    pub background: Option<Rgba>,
    pub gravity: Gravity,
    pub appearance: Option<String>,
}

impl TextLabel {
    pub const DEFAULT_SIZE_PT: f64 = 30.0;

    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            font: None,
            size_pt: Self::DEFAULT_SIZE_PT,
            color: Rgba::BLACK,
            background: None,
            gravity: Gravity::default(),
            appearance: None,
        }
    }

    /// Overwrite every field the style sets.
    pub fn apply_style(&mut self, style: &TextStyle) {
        if let Some(color) = style.color {
            self.color = color;
        }
        if let Some(font) = &style.font {
            self.font = Some(font.clone());
        }
        if let Some(size) = style.size_pt {
            if size > 0.0 {
                self.size_pt = size;
            }
        }
        if let Some(background) = style.background {
            self.background = Some(background);
        }
        if let Some(gravity) = style.gravity {
            self.gravity = gravity;
        }
        if let Some(appearance) = &style.appearance {
            self.appearance = Some(appearance.clone());
        }
    }

    pub fn request(&self) -> TextRequest<'_> {
        TextRequest {
            font: self.font.as_ref(),
            text: &self.text,
            size_px: self.size_pt,
            gravity: self.gravity,
            appearance: self.appearance.as_deref(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let label = TextLabel::new("hello");
        assert_eq!(label.text, "hello");
        assert_eq!(label.gravity, Gravity::Center);
        assert!((label.size_pt - TextLabel::DEFAULT_SIZE_PT).abs() < f64::EPSILON);
    }

    #[test]
    fn test_apply_style_only_touches_set_fields() {
        let mut label = TextLabel::new("x");
        label.apply_style(&TextStyle::new().with_background(Rgba::WHITE));
        label.apply_style(&TextStyle::new().with_color(Rgba::rgb(255, 0, 0)).with_size(12.0));

        assert_eq!(label.color, Rgba::rgb(255, 0, 0));
        assert_eq!(label.background, Some(Rgba::WHITE));
        assert!((label.size_pt - 12.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_style_from_json() {
        let style: TextStyle =
            serde_json::from_str(r#"{"gravity":"Left","size_pt":18.0}"#).unwrap();
        assert_eq!(style.gravity, Some(Gravity::Left));
        assert_eq!(style.color, None);
    }
}
