//! HTML template personalization.
//!
//! - `render`: per-recipient placeholder substitution
//! - `pixel`: one-off embedding of the open-tracking pixel into a template

pub mod pixel;
pub mod render;

pub use pixel::{embed_pixel, has_pixel};
pub use render::{render, Placeholder, PLACEHOLDERS};
