// src/vga_buffer/color.rs

//! VGA color definitions (re-exported from display module)

#[allow(unused_imports)]
pub use crate::display::color::{Color as VgaColor, ColorCode};
