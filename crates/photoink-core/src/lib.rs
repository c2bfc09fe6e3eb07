//! photoink core library
//!
//! Platform-agnostic data model and interaction logic for the photoink
//! annotation engine: overlays stacked on a base image, the brush stroke
//! buffer, the unified undo/redo view state and the multi-touch gesture
//! state machine.

pub mod color;
pub mod error;
pub mod factory;
pub mod fonts;
pub mod gesture;
pub mod listener;
pub mod overlay;
pub mod raster;
pub mod scene;
pub mod settings;
pub mod source;
pub mod strokes;
pub mod surface;
pub mod view_state;

pub use color::Rgba;
pub use error::{SaveError, SaveResult, ViewStateError};
pub use factory::OverlayFactory;
pub use fonts::{BlockFont, FontId, FontProvider, GlyphMask, TextRequest};
pub use gesture::{GestureConfig, GestureContext, GestureEngine, GestureOutput, PointerEvent, PointerId, PointerPhase};
pub use listener::EditorListener;
pub use overlay::{
    EmojiLabel, Gravity, Overlay, OverlayId, OverlayKind, OverlayPayload, OverlayTransform, Sticker,
    TextLabel, TextStyle,
};
pub use scene::Scene;
pub use settings::{SaveFormat, SaveSettings};
pub use source::{BitmapSink, CustomEffect, FilterEffect, FilteredSource, PhotoFilter, StaticImageSource};
pub use strokes::{BrushConfig, BrushMode, Stroke, StrokeBuffer};
pub use surface::DrawSurface;
pub use view_state::{ViewHandle, ViewState};

/// Raster type used throughout the engine (straight-alpha RGBA8).
pub type Bitmap = image::RgbaImage;
