//! Display width helpers for console text.

mod utils;

pub use utils::{clip_to_width, display_width};
