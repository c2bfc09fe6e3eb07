//! photoink render library
//!
//! Deterministic flattening of a scene onto its base image, live preview
//! with helper boxes, and bitmap encoding for export.

mod compositor;
pub mod encode;

pub use compositor::{Compositor, Layer, SceneSnapshot};
pub use encode::{encode, write_file};
