use anyhow::Result;
use tracing::{debug, warn};

use super::wrap::split_lines;
use crate::overlay::font::FontMetricsProvider;
use crate::overlay::{Canvas, Position, SLOT_NAMES, SafeZones, TextStyle};

/// Spacing between bubble lines in standalone layout; bubbles overlap slightly.
pub const BUBBLE_LINE_GAP: f32 = -10.0;
/// Spacing between outlined lines in standalone layout.
pub const STROKE_LINE_GAP: f32 = 50.0;
/// Spacing between blocks in composite layout.
pub const BLOCK_GAP: f32 = 70.0;

#[derive(Debug, Clone, PartialEq)]
pub struct BlockMetrics {
    pub lines: Vec<String>,
    pub line_height: f32,
    pub bubble_height: f32,
    /// Lines packed edge to edge: `lines × bubble_height`.
    pub total_height: f32,
}

impl BlockMetrics {
    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

pub fn calculate_text_metrics(
    text: &str,
    style: &TextStyle,
    canvas: &Canvas,
    zones: &SafeZones,
    font: &dyn FontMetricsProvider,
) -> Result<BlockMetrics> {
    let lines = split_lines(text, style, canvas, zones, font)?;
    let line_height = style.line_height_px();
    let bubble_height = style.bubble_height();
    let total_height = lines.len() as f32 * bubble_height;
    Ok(BlockMetrics {
        lines,
        line_height,
        bubble_height,
        total_height,
    })
}

/// One block placed alone on the canvas according to its own `position`.
#[derive(Debug, Clone, PartialEq)]
pub struct StandaloneLayout {
    pub metrics: BlockMetrics,
    pub start_y: f32,
    pub line_gap: f32,
    /// Lines plus the gaps between them.
    pub stack_height: f32,
}

impl StandaloneLayout {
    pub fn line_top(&self, index: usize) -> f32 {
        self.start_y + index as f32 * (self.metrics.bubble_height + self.line_gap)
    }
}

pub fn standalone_layout(
    text: &str,
    style: &TextStyle,
    canvas: &Canvas,
    zones: &SafeZones,
    font: &dyn FontMetricsProvider,
) -> Result<Option<StandaloneLayout>> {
    let metrics = calculate_text_metrics(text, style, canvas, zones, font)?;
    if metrics.is_empty() {
        return Ok(None);
    }
    let line_gap = if style.has_bubble() {
        BUBBLE_LINE_GAP
    } else {
        STROKE_LINE_GAP
    };
    let count = metrics.line_count() as f32;
    let stack_height = count * metrics.bubble_height + (count - 1.0) * line_gap;
    let height = canvas.height_f();
    let start_y = match style.position {
        Position::Top => height * zones.top,
        Position::Bottom => height * zones.bottom - stack_height,
        Position::Center => (height - stack_height) / 2.0,
    };
    Ok(Some(StandaloneLayout {
        metrics,
        start_y,
        line_gap,
        stack_height,
    }))
}

#[derive(Debug, Clone, PartialEq)]
pub struct LayoutBlock {
    /// Zero-based input slot.
    pub slot: usize,
    pub metrics: BlockMetrics,
    pub start_y: f32,
}

impl LayoutBlock {
    pub fn line_top(&self, index: usize) -> f32 {
        self.start_y + index as f32 * self.metrics.bubble_height
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct CompositeLayout {
    pub blocks: Vec<LayoutBlock>,
    pub combined_height: f32,
}

/// Start offsets for blocks stacked top to bottom with [`BLOCK_GAP`] between
/// them, the whole stack centered vertically. Returns the offsets and the
/// combined height.
pub fn stack_blocks(heights: &[f32], canvas_height: f32) -> (Vec<f32>, f32) {
    if heights.is_empty() {
        return (Vec::new(), 0.0);
    }
    let gaps = (heights.len() - 1) as f32 * BLOCK_GAP;
    let combined = heights.iter().sum::<f32>() + gaps;
    let mut cursor = (canvas_height - combined) / 2.0;
    let mut starts = Vec::with_capacity(heights.len());
    for height in heights {
        starts.push(cursor);
        cursor += height + BLOCK_GAP;
    }
    (starts, combined)
}

/// Lays out every non-blank slot as one centered stack in slot order.
///
/// Each style's `position` is not consulted here. Blank slots and slots that
/// fail to measure are left out before the stack height is computed. A
/// non-blank slot that yields no lines still takes part with zero height, so
/// it contributes one [`BLOCK_GAP`].
pub fn composite_layout<S: AsRef<str>>(
    texts: &[S],
    styles: &[TextStyle],
    canvas: &Canvas,
    zones: &SafeZones,
    font: &dyn FontMetricsProvider,
) -> CompositeLayout {
    let mut measured = Vec::new();
    for (slot, (text, style)) in texts.iter().zip(styles).enumerate() {
        let text = text.as_ref();
        if text.trim().is_empty() {
            continue;
        }
        match calculate_text_metrics(text, style, canvas, zones, font) {
            Ok(metrics) => {
                if metrics.is_empty() {
                    debug!(slot = slot_name(slot), "no display lines, keeping empty block");
                }
                measured.push((slot, metrics));
            }
            Err(err) => warn!(slot = slot_name(slot), "failed to measure text: {:#}", err),
        }
    }

    let heights: Vec<f32> = measured
        .iter()
        .map(|(_, metrics)| metrics.total_height)
        .collect();
    let (starts, combined_height) = stack_blocks(&heights, canvas.height_f());
    let blocks = measured
        .into_iter()
        .zip(starts)
        .map(|((slot, metrics), start_y)| LayoutBlock {
            slot,
            metrics,
            start_y,
        })
        .collect();
    CompositeLayout {
        blocks,
        combined_height,
    }
}

pub(crate) fn slot_name(slot: usize) -> &'static str {
    SLOT_NAMES.get(slot).copied().unwrap_or("text?")
}
