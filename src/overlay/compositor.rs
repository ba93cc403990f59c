use anyhow::{Context, Result, anyhow};
use image::RgbaImage;
use tracing::{debug, warn};

use super::engine::{
    BlockMetrics, CompositeLayout, composite_layout, slot_name, standalone_layout,
};
use super::font::FontMetricsProvider;
use super::render::{Raster, draw_bubble, draw_line};
use super::{SLOT_COUNT, TextStyle};
use crate::settings::Settings;

/// One rendered block, ready to be laid over every video frame.
pub struct Overlay {
    /// Zero-based input slot the block came from.
    pub slot: usize,
    pub image: RgbaImage,
}

pub struct OverlayCompositor<'a> {
    settings: &'a Settings,
    font: &'a dyn FontMetricsProvider,
}

impl<'a> OverlayCompositor<'a> {
    pub fn new(settings: &'a Settings, font: &'a dyn FontMetricsProvider) -> Self {
        Self { settings, font }
    }

    pub fn layout<S: AsRef<str>>(&self, texts: &[S; SLOT_COUNT]) -> CompositeLayout {
        composite_layout(
            texts,
            &self.settings.styles,
            &self.settings.canvas,
            &self.settings.safe_zones,
            self.font,
        )
    }

    /// Renders every non-blank slot with the composite layout.
    ///
    /// Output keeps slot order so later slots composite above earlier ones.
    /// A block that fails to render is logged and left out; the rest are
    /// unaffected.
    pub fn generate_text_overlays<S: AsRef<str>>(&self, texts: &[S; SLOT_COUNT]) -> Vec<Overlay> {
        let layout = self.layout(texts);
        let mut overlays = Vec::with_capacity(layout.blocks.len());
        for block in &layout.blocks {
            let style = &self.settings.styles[block.slot];
            let tops = (0..block.metrics.line_count()).map(|idx| block.line_top(idx));
            match self.render_lines(&block.metrics, tops, style) {
                Ok(raster) => {
                    debug!(
                        slot = slot_name(block.slot),
                        lines = block.metrics.line_count(),
                        start_y = block.start_y,
                        "overlay rendered"
                    );
                    overlays.push(Overlay {
                        slot: block.slot,
                        image: raster.into_image(),
                    });
                }
                Err(err) => warn!(
                    slot = slot_name(block.slot),
                    "skipping overlay: {:#}", err
                ),
            }
        }
        overlays
    }

    /// Renders one slot alone, positioned by its own style `position`.
    pub fn render_standalone(&self, text: &str, slot: usize) -> Result<Option<Overlay>> {
        let style = self
            .settings
            .style(slot)
            .ok_or_else(|| anyhow!("no style for slot {}", slot))?;
        if text.trim().is_empty() {
            return Ok(None);
        }
        let Some(layout) = standalone_layout(
            text,
            style,
            &self.settings.canvas,
            &self.settings.safe_zones,
            self.font,
        )?
        else {
            return Ok(None);
        };
        let tops = (0..layout.metrics.line_count()).map(|idx| layout.line_top(idx));
        let raster = self
            .render_lines(&layout.metrics, tops, style)
            .with_context(|| format!("failed to render {}", slot_name(slot)))?;
        Ok(Some(Overlay {
            slot,
            image: raster.into_image(),
        }))
    }

    fn render_lines(
        &self,
        metrics: &BlockMetrics,
        tops: impl Iterator<Item = f32>,
        style: &TextStyle,
    ) -> Result<Raster> {
        let mut raster = Raster::new(&self.settings.canvas)?;
        for (line, top) in metrics.lines.iter().zip(tops) {
            let width = self
                .font
                .measure_width(line, style.font_size)
                .with_context(|| format!("failed to measure line '{}'", line))?;
            draw_bubble(&mut raster, width, top, metrics.bubble_height, style);
            let center_y = top + metrics.bubble_height / 2.0;
            draw_line(&mut raster, line, width, center_y, style, self.font)
                .with_context(|| format!("failed to draw line '{}'", line))?;
        }
        Ok(raster)
    }
}
