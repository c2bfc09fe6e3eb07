//! photoink editor
//!
//! The `EditorCore` façade over the photoink core: overlay and brush
//! editing, unified undo/redo, pointer routing and the two-phase save
//! pipeline. Also hosts the JSON edit-script player used by the `photoink`
//! binary.

pub mod config;
pub mod editor;
mod save;
pub mod script;

pub use config::{EditorBuilder, EditorConfig};
pub use editor::EditorCore;
pub use script::{Script, ScriptError, ScriptResult, Step};
