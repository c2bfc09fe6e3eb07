//! JSON edit scripts replayed over a base image.
//!
//! A script is a list of steps, each tagged by `op`:
//!
//! ```json
//! {
//!   "config": { "text_pinch_scalable": false },
//!   "steps": [
//!     { "op": "add_text", "label": "title", "text": "Hello", "color": "#ff0000" },
//!     { "op": "brush", "color": "#000000", "width": 6 },
//!     { "op": "stroke", "points": [[10, 10], [80, 40]] },
//!     { "op": "undo" },
//!     { "op": "save", "path": "out.png" }
//!   ]
//! }
//! ```
//!
//! Overlays added with a `label` can be referred to later by `edit_text` and
//! `remove`. Relative paths resolve against the script's directory.

use crate::config::{EditorBuilder, EditorConfig};
use crate::editor::EditorCore;
use base64::{Engine, engine::general_purpose::STANDARD};
use kurbo::Point;
use photoink_core::{
    Bitmap, FontId, Gravity, OverlayId, PhotoFilter, Rgba, SaveError, SaveFormat, SaveResult,
    SaveSettings, StaticImageSource, TextStyle,
};
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use thiserror::Error;

/// Errors raised while loading or replaying a script.
#[derive(Debug, Error)]
pub enum ScriptError {
    #[error("IO error: {0}")]
    Io(String),
    #[error("Parse error: {0}")]
    Parse(String),
    #[error("Image error: {0}")]
    Image(String),
    #[error("Base64 error: {0}")]
    Base64(String),
    #[error("Save failed: {0}")]
    Save(#[from] SaveError),
}

pub type ScriptResult<T> = Result<T, ScriptError>;

/// Text fields shared by `add_text` and `edit_text`. Colours are hex strings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TextArgs {
    pub color: Option<String>,
    pub background: Option<String>,
    pub size: Option<f64>,
    pub font: Option<FontId>,
    pub gravity: Option<Gravity>,
}

impl TextArgs {
    fn style(&self) -> ScriptResult<TextStyle> {
        let mut style = TextStyle::new();
        if let Some(color) = &self.color {
            style = style.with_color(parse_color(color)?);
        }
        if let Some(background) = &self.background {
            style = style.with_background(parse_color(background)?);
        }
        if let Some(size) = self.size {
            style = style.with_size(size);
        }
        if let Some(font) = &self.font {
            style = style.with_font(font.clone());
        }
        if let Some(gravity) = self.gravity {
            style = style.with_gravity(gravity);
        }
        Ok(style)
    }
}

/// One scripted edit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Step {
    AddText {
        #[serde(default)]
        label: Option<String>,
        text: String,
        #[serde(flatten)]
        args: TextArgs,
    },
    EditText {
        target: String,
        text: String,
        #[serde(flatten)]
        args: TextArgs,
    },
    AddEmoji {
        #[serde(default)]
        label: Option<String>,
        glyph: String,
        #[serde(default)]
        font: Option<FontId>,
    },
    /// Sticker from a file (`path`) or inline encoded image data (`base64`).
    AddImage {
        #[serde(default)]
        label: Option<String>,
        #[serde(default)]
        path: Option<PathBuf>,
        #[serde(default)]
        base64: Option<String>,
    },
    /// Switch to the paint brush, optionally changing its settings.
    Brush {
        #[serde(default)]
        color: Option<String>,
        #[serde(default)]
        width: Option<f64>,
        /// Percent, 0 to 100.
        #[serde(default)]
        opacity: Option<u8>,
    },
    /// Switch to the eraser.
    Eraser {
        #[serde(default)]
        width: Option<f64>,
    },
    Stroke {
        points: Vec<[f64; 2]>,
    },
    Undo,
    Redo,
    Remove {
        target: String,
    },
    Clear,
    Filter {
        filter: PhotoFilter,
    },
    /// Flatten into `path`. The format defaults to the file extension.
    Save {
        path: PathBuf,
        #[serde(default)]
        format: Option<SaveFormat>,
        #[serde(default)]
        quality: Option<u8>,
        #[serde(default)]
        strip_transparent_borders: bool,
        #[serde(default)]
        clear_after_save: bool,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Script {
    pub config: EditorConfig,
    pub steps: Vec<Step>,
}

impl Script {
    pub fn from_json(json: &str) -> ScriptResult<Self> {
        serde_json::from_str(json).map_err(|e| ScriptError::Parse(e.to_string()))
    }

    pub fn load(path: &Path) -> ScriptResult<Self> {
        let json = fs::read_to_string(path)
            .map_err(|e| ScriptError::Io(format!("Failed to read {}: {}", path.display(), e)))?;
        Self::from_json(&json)
    }

    /// Build an editor over `base` and replay every step. Returns the saved paths.
    pub fn run(&self, base: Bitmap, base_dir: &Path) -> ScriptResult<Vec<PathBuf>> {
        let mut editor = EditorBuilder::new()
            .with_config(self.config.clone())
            .build(StaticImageSource::new(base));
        self.apply(&mut editor, base_dir)
    }

    /// Replay every step on an existing editor.
    pub fn apply(&self, editor: &mut EditorCore, base_dir: &Path) -> ScriptResult<Vec<PathBuf>> {
        let mut player = Player {
            editor,
            base_dir,
            labels: HashMap::new(),
            saved: Vec::new(),
        };
        for (index, step) in self.steps.iter().enumerate() {
            log::debug!("step {}: {:?}", index, step);
            player.step(step)?;
        }
        Ok(player.saved)
    }
}

struct Player<'a> {
    editor: &'a mut EditorCore,
    base_dir: &'a Path,
    labels: HashMap<String, OverlayId>,
    saved: Vec<PathBuf>,
}

impl Player<'_> {
    fn step(&mut self, step: &Step) -> ScriptResult<()> {
        match step {
            Step::AddText { label, text, args } => {
                let id = self.editor.add_text(text, &args.style()?);
                self.remember(label, id);
            }
            Step::EditText { target, text, args } => {
                let id = self.lookup(target)?;
                if !self.editor.edit_text(id, text, &args.style()?) {
                    log::warn!("edit of '{}' had no effect", target);
                }
            }
            Step::AddEmoji { label, glyph, font } => {
                let id = self.editor.add_emoji(glyph, font.clone());
                self.remember(label, id);
            }
            Step::AddImage { label, path, base64 } => {
                let bitmap = match (path, base64) {
                    (Some(path), None) => self.open_image(path)?,
                    (None, Some(data)) => decode_inline(data)?,
                    _ => {
                        return Err(ScriptError::Parse(
                            "add_image needs exactly one of `path` or `base64`".to_string(),
                        ));
                    }
                };
                let id = self.editor.add_image(bitmap);
                self.remember(label, id);
            }
            Step::Brush { color, width, opacity } => {
                self.editor.set_brush_mode(photoink_core::BrushMode::Paint);
                if let Some(color) = color {
                    self.editor.set_brush_color(parse_color(color)?);
                }
                if let Some(width) = *width {
                    self.editor.set_brush_size(width);
                }
                if let Some(opacity) = *opacity {
                    self.editor.set_opacity(opacity);
                }
            }
            Step::Eraser { width } => {
                self.editor.brush_eraser();
                if let Some(width) = *width {
                    self.editor.set_eraser_size(width);
                }
            }
            Step::Stroke { points } => {
                let points: Vec<Point> = points.iter().map(|[x, y]| Point::new(*x, *y)).collect();
                if !self.editor.draw_stroke(&points) {
                    log::warn!("ignoring empty stroke");
                }
            }
            Step::Undo => {
                self.editor.undo();
            }
            Step::Redo => {
                self.editor.redo();
            }
            Step::Remove { target } => {
                let id = self.lookup(target)?;
                self.editor.remove_overlay(id);
            }
            Step::Clear => self.editor.clear_all_overlays(),
            Step::Filter { filter } => self.editor.set_filter_effect(*filter),
            Step::Save {
                path,
                format,
                quality,
                strip_transparent_borders,
                clear_after_save,
            } => {
                let path = self.resolve(path);
                let format = format
                    .or_else(|| SaveFormat::from_path(&path))
                    .unwrap_or_default();
                let mut settings = SaveSettings::new()
                    .with_format(format)
                    .with_strip_transparent_borders(*strip_transparent_borders)
                    .with_clear_after_save(*clear_after_save);
                if let Some(quality) = *quality {
                    settings = settings.with_quality(quality);
                }
                let written = self.save(path, settings)?;
                log::info!("wrote {}", written.display());
                self.saved.push(written);
            }
        }
        Ok(())
    }

    /// Save and wait, so later steps see the effect of `clear_after_save`.
    fn save(&mut self, path: PathBuf, settings: SaveSettings) -> ScriptResult<PathBuf> {
        let slot: Rc<RefCell<Option<SaveResult<PathBuf>>>> = Rc::default();
        let inner = Rc::clone(&slot);
        self.editor.save_as_file(path.clone(), settings, move |result| {
            *inner.borrow_mut() = Some(result);
        });
        self.editor.wait_for_saves();
        let result = slot.borrow_mut().take();
        match result {
            Some(result) => Ok(result?),
            None => Err(ScriptError::Save(SaveError::Io(format!(
                "no result for {}",
                path.display()
            )))),
        }
    }

    fn remember(&mut self, label: &Option<String>, id: OverlayId) {
        if let Some(label) = label {
            self.labels.insert(label.clone(), id);
        }
    }

    fn lookup(&self, label: &str) -> ScriptResult<OverlayId> {
        self.labels
            .get(label)
            .copied()
            .ok_or_else(|| ScriptError::Parse(format!("Unknown overlay label: {}", label)))
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir.join(path)
        }
    }

    fn open_image(&self, path: &Path) -> ScriptResult<Bitmap> {
        let path = self.resolve(path);
        open_image(&path)
    }
}

/// Decode an image file into the engine's bitmap type.
pub fn open_image(path: &Path) -> ScriptResult<Bitmap> {
    image::open(path)
        .map(|image| image.to_rgba8())
        .map_err(|e| ScriptError::Image(format!("{}: {}", path.display(), e)))
}

fn decode_inline(data: &str) -> ScriptResult<Bitmap> {
    let bytes = STANDARD
        .decode(data.trim())
        .map_err(|e| ScriptError::Base64(e.to_string()))?;
    image::load_from_memory(&bytes)
        .map(|image| image.to_rgba8())
        .map_err(|e| ScriptError::Image(e.to_string()))
}

fn parse_color(hex: &str) -> ScriptResult<Rgba> {
    Rgba::from_hex(hex).ok_or_else(|| ScriptError::Parse(format!("Invalid colour: {}", hex)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use photoink_render::encode;

    fn white(w: u32, h: u32) -> Bitmap {
        Bitmap::from_pixel(w, h, image::Rgba([255, 255, 255, 255]))
    }

    #[test]
    fn test_parse_steps() {
        let script = Script::from_json(
            r##"{
                "steps": [
                    { "op": "add_text", "label": "t", "text": "Hi", "color": "#00ff00", "size": 12 },
                    { "op": "brush", "width": 3, "opacity": 50 },
                    { "op": "stroke", "points": [[1, 2], [30, 2]] },
                    { "op": "filter", "filter": "Sepia" },
                    { "op": "undo" },
                    { "op": "save", "path": "a.png", "clear_after_save": true }
                ]
            }"##,
        )
        .unwrap();

        assert_eq!(script.steps.len(), 6);
        assert_eq!(
            script.steps[0],
            Step::AddText {
                label: Some("t".to_string()),
                text: "Hi".to_string(),
                args: TextArgs {
                    color: Some("#00ff00".to_string()),
                    size: Some(12.0),
                    ..TextArgs::default()
                },
            }
        );
        assert_eq!(script.steps[3], Step::Filter { filter: PhotoFilter::Sepia });
        assert_eq!(script.steps[4], Step::Undo);
        assert!(script.config.text_pinch_scalable);
    }

    #[test]
    fn test_parse_error() {
        let err = Script::from_json(r#"{ "steps": [ { "op": "teleport" } ] }"#).unwrap_err();
        assert!(matches!(err, ScriptError::Parse(_)));
    }

    #[test]
    fn test_run_writes_outputs() {
        let dir = tempfile::tempdir().unwrap();
        let script = Script::from_json(
            r##"{
                "steps": [
                    { "op": "add_text", "label": "t", "text": "Hi", "color": "#ff0000" },
                    { "op": "edit_text", "target": "t", "text": "Bye" },
                    { "op": "brush", "color": "#0000ff", "width": 4 },
                    { "op": "stroke", "points": [[0, 5], [40, 5]] },
                    { "op": "save", "path": "first.png" },
                    { "op": "remove", "target": "t" },
                    { "op": "save", "path": "second.png", "clear_after_save": true },
                    { "op": "save", "path": "third.png" }
                ]
            }"##,
        )
        .unwrap();

        let saved = script.run(white(40, 40), dir.path()).unwrap();
        assert_eq!(saved.len(), 3);
        assert_eq!(saved[0], dir.path().join("first.png"));

        let first = image::open(&saved[0]).unwrap().to_rgba8();
        assert_eq!(first.get_pixel(20, 5).0, [0, 0, 255, 255]);

        let third = image::open(&saved[2]).unwrap().to_rgba8();
        assert_eq!(third, white(40, 40));
    }

    #[test]
    fn test_inline_image() {
        let sticker = Bitmap::from_pixel(4, 4, image::Rgba([0, 255, 0, 255]));
        let png = encode(&sticker, SaveFormat::Png, 100).unwrap();
        let step = Step::AddImage {
            label: Some("s".to_string()),
            path: None,
            base64: Some(STANDARD.encode(png)),
        };
        let script = Script {
            steps: vec![step, Step::Save {
                path: PathBuf::from("out.png"),
                format: None,
                quality: None,
                strip_transparent_borders: false,
                clear_after_save: false,
            }],
            ..Script::default()
        };

        let dir = tempfile::tempdir().unwrap();
        let saved = script.run(white(10, 10), dir.path()).unwrap();
        let out = image::open(&saved[0]).unwrap().to_rgba8();
        assert_eq!(out.get_pixel(5, 5).0, [0, 255, 0, 255]);
        assert_eq!(out.get_pixel(0, 0).0, [255, 255, 255, 255]);
    }

    #[test]
    fn test_errors() {
        let dir = tempfile::tempdir().unwrap();
        let unknown = Script {
            steps: vec![Step::Remove { target: "nope".to_string() }],
            ..Script::default()
        };
        assert!(matches!(unknown.run(white(4, 4), dir.path()), Err(ScriptError::Parse(_))));

        let bad_data = Script {
            steps: vec![Step::AddImage {
                label: None,
                path: None,
                base64: Some("!!!".to_string()),
            }],
            ..Script::default()
        };
        assert!(matches!(bad_data.run(white(4, 4), dir.path()), Err(ScriptError::Base64(_))));

        let missing = Script {
            steps: vec![Step::AddImage {
                label: None,
                path: Some(PathBuf::from("missing.png")),
                base64: None,
            }],
            ..Script::default()
        };
        assert!(matches!(missing.run(white(4, 4), dir.path()), Err(ScriptError::Image(_))));

        let bad_color = Script::from_json(r#"{ "steps": [ { "op": "brush", "color": "blue" } ] }"#).unwrap();
        assert!(matches!(bad_color.run(white(4, 4), dir.path()), Err(ScriptError::Parse(_))));

        let non_ascii = Script::from_json(r##"{ "steps": [ { "op": "brush", "color": "#é1" } ] }"##).unwrap();
        assert!(matches!(non_ascii.run(white(4, 4), dir.path()), Err(ScriptError::Parse(_))));
    }

    #[test]
    fn test_save_into_missing_directory_fails() {
        let dir = tempfile::tempdir().unwrap();
        let script = Script::from_json(r#"{ "steps": [ { "op": "save", "path": "no/such/dir/out.png" } ] }"#).unwrap();
        assert!(matches!(script.run(white(4, 4), dir.path()), Err(ScriptError::Save(SaveError::Io(_)))));
    }
}
