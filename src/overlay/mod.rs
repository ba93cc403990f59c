mod compositor;
mod engine;
mod font;
mod render;

pub use compositor::{Overlay, OverlayCompositor};
pub use engine::{
    BLOCK_GAP, BUBBLE_LINE_GAP, BlockMetrics, CompositeLayout, LayoutBlock, STROKE_LINE_GAP,
    StandaloneLayout, calculate_text_metrics, composite_layout, max_bubble_width,
    max_text_width, split_lines, stack_blocks, standalone_layout,
};
pub use font::{
    EstimatedFont, FontFace, FontMetricsProvider, VerticalMetrics, load_font_face, resolve_font,
};
pub use render::{Raster, draw_bubble, draw_line, stroke_offsets};

use crate::color::Rgba;

/// Number of text slots the pipeline lays out together.
pub const SLOT_COUNT: usize = 3;

pub const SLOT_NAMES: [&str; SLOT_COUNT] = ["text1", "text2", "text3"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Canvas {
    pub width: u32,
    pub height: u32,
}

impl Canvas {
    pub fn width_f(&self) -> f32 {
        self.width as f32
    }

    pub fn height_f(&self) -> f32 {
        self.height as f32
    }
}

/// Fractions of the canvas kept clear of platform UI.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SafeZones {
    pub top: f32,
    pub bottom: f32,
    pub left: f32,
    pub right: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Position {
    Top,
    Center,
    Bottom,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextStyle {
    pub font_size: f32,
    pub font_family: String,
    pub font_weight: String,
    pub text_color: Rgba,
    /// No bubble is drawn when absent.
    pub bubble_color: Option<Rgba>,
    pub bubble_opacity: f32,
    pub bubble_padding: f32,
    pub horizontal_padding: f32,
    pub bubble_radius: f32,
    pub position: Position,
    /// Multiplier applied to `font_size`.
    pub line_height: f32,
    pub stroke_color: Option<Rgba>,
    pub stroke_width: Option<u32>,
}

impl TextStyle {
    pub fn line_height_px(&self) -> f32 {
        self.font_size * self.line_height
    }

    pub fn bubble_height(&self) -> f32 {
        self.line_height_px() + self.bubble_padding * 2.0
    }

    pub fn has_bubble(&self) -> bool {
        self.bubble_color.is_some()
    }

    /// Stroke color and a non-zero width, or nothing.
    pub fn stroke(&self) -> Option<(Rgba, u32)> {
        match (self.stroke_color, self.stroke_width) {
            (Some(color), Some(width)) if width > 0 => Some((color, width)),
            _ => None,
        }
    }
}
