//! Core types shared by the engine and front ends.

pub mod selection;

pub use selection::{GridBounds, Modifiers, Range, Selection, SelectionMode};
