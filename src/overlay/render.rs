use anyhow::{Result, anyhow};
use image::RgbaImage;
use tiny_skia::{FillRule, Paint, PathBuilder, Pixmap, Transform};
use tracing::debug;

use super::font::FontMetricsProvider;
use super::{Canvas, TextStyle};
use crate::color::Rgba;

/// A transparent canvas-sized RGBA surface owned by one overlay.
pub struct Raster {
    pixmap: Pixmap,
}

impl Raster {
    pub fn new(canvas: &Canvas) -> Result<Self> {
        let pixmap = Pixmap::new(canvas.width, canvas.height).ok_or_else(|| {
            anyhow!(
                "cannot allocate a {}x{} raster",
                canvas.width,
                canvas.height
            )
        })?;
        Ok(Self { pixmap })
    }

    pub fn width(&self) -> u32 {
        self.pixmap.width()
    }

    pub fn height(&self) -> u32 {
        self.pixmap.height()
    }

    /// Straight (non-premultiplied) color at a pixel.
    pub fn pixel(&self, x: u32, y: u32) -> Option<Rgba> {
        let color = self.pixmap.pixel(x, y)?.demultiply();
        Some(Rgba {
            r: color.red(),
            g: color.green(),
            b: color.blue(),
            a: color.alpha(),
        })
    }

    pub fn is_blank(&self) -> bool {
        self.pixmap.pixels().iter().all(|pixel| pixel.alpha() == 0)
    }

    pub fn into_image(self) -> RgbaImage {
        let (width, height) = (self.pixmap.width(), self.pixmap.height());
        let mut bytes = Vec::with_capacity(self.pixmap.data().len());
        for pixel in self.pixmap.pixels() {
            let color = pixel.demultiply();
            bytes.extend_from_slice(&[color.red(), color.green(), color.blue(), color.alpha()]);
        }
        RgbaImage::from_raw(width, height, bytes)
            .unwrap_or_else(|| RgbaImage::new(width, height))
    }

    fn fill(&mut self, path: &tiny_skia::Path, color: Rgba, transform: Transform) {
        let mut paint = Paint::default();
        paint.set_color(color.to_skia());
        paint.anti_alias = true;
        self.pixmap
            .fill_path(path, &paint, FillRule::Winding, transform, None);
    }
}

/// Fills the rounded background behind one line, centered horizontally.
///
/// Returns whether anything was filled: styles without a bubble color and
/// bubbles that round down to nothing leave the raster untouched.
pub fn draw_bubble(
    raster: &mut Raster,
    line_width: f32,
    top: f32,
    bubble_height: f32,
    style: &TextStyle,
) -> bool {
    let Some(color) = style.bubble_color else {
        return false;
    };
    let width = line_width + 2.0 * style.horizontal_padding;
    let x = (raster.width() as f32 - width) / 2.0;
    let Some(path) = rounded_rect_path(
        x.round(),
        top.round(),
        width.round(),
        bubble_height.round(),
        style.bubble_radius,
    ) else {
        debug!(width, bubble_height, "bubble too small to draw");
        return false;
    };
    raster.fill(
        &path,
        color.with_opacity(style.bubble_opacity),
        Transform::identity(),
    );
    true
}

/// Draws one line centered on `(canvas center, center_y)`, outlined first when
/// the style carries a stroke.
pub fn draw_line(
    raster: &mut Raster,
    line: &str,
    line_width: f32,
    center_y: f32,
    style: &TextStyle,
    font: &dyn FontMetricsProvider,
) -> Result<()> {
    let metrics = font.vertical_metrics(style.font_size);
    let x = (raster.width() as f32 / 2.0 - line_width / 2.0).round();
    let baseline = (center_y + metrics.middle_to_baseline()).round();
    let Some(path) = font.text_path(line, style.font_size, x, baseline)? else {
        return Ok(());
    };

    if let Some((color, width)) = style.stroke() {
        let color = color.with_alpha(u8::MAX);
        for (dx, dy) in stroke_offsets(width) {
            raster.fill(
                &path,
                color,
                Transform::from_translate(dx as f32, dy as f32),
            );
        }
    }
    raster.fill(&path, style.text_color.with_alpha(u8::MAX), Transform::identity());
    Ok(())
}

/// Integer offsets inside a disk of radius `width`, origin included.
pub fn stroke_offsets(width: u32) -> Vec<(i32, i32)> {
    let radius = width as i32;
    let limit = radius * radius;
    let mut offsets = Vec::new();
    for dx in -radius..=radius {
        for dy in -radius..=radius {
            if dx * dx + dy * dy <= limit {
                offsets.push((dx, dy));
            }
        }
    }
    offsets
}

fn rounded_rect_path(x: f32, y: f32, w: f32, h: f32, r: f32) -> Option<tiny_skia::Path> {
    if w <= 0.0 || h <= 0.0 {
        return None;
    }
    let r = r.max(0.0).min(w / 2.0).min(h / 2.0);
    let mut pb = PathBuilder::new();
    pb.move_to(x + r, y);
    pb.line_to(x + w - r, y);
    pb.quad_to(x + w, y, x + w, y + r);
    pb.line_to(x + w, y + h - r);
    pb.quad_to(x + w, y + h, x + w - r, y + h);
    pb.line_to(x + r, y + h);
    pb.quad_to(x, y + h, x, y + h - r);
    pb.line_to(x, y + r);
    pb.quad_to(x, y, x + r, y);
    pb.close();
    pb.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::Settings;
    use crate::test_util::FixedAdvanceFont;
    use std::collections::HashSet;

    fn canvas() -> Canvas {
        Canvas {
            width: 720,
            height: 1280,
        }
    }

    #[test]
    fn stroke_disk_is_complete_and_symmetric() {
        let offsets = stroke_offsets(9);
        let set: HashSet<(i32, i32)> = offsets.iter().copied().collect();
        assert_eq!(set.len(), offsets.len());
        assert!(set.contains(&(0, 0)));
        for dx in -9..=9 {
            for dy in -9..=9 {
                assert_eq!(set.contains(&(dx, dy)), dx * dx + dy * dy <= 81);
            }
        }
        for &(dx, dy) in &offsets {
            assert!(set.contains(&(-dx, dy)));
            assert!(set.contains(&(dx, -dy)));
        }
        assert!(!set.contains(&(9, 1)));
        assert!(set.contains(&(9, 0)));
        assert_eq!(stroke_offsets(0), vec![(0, 0)]);
    }

    #[test]
    fn zero_canvas_is_rejected() {
        assert!(Raster::new(&Canvas { width: 0, height: 1280 }).is_err());
        assert!(Raster::new(&Canvas { width: 720, height: 0 }).is_err());
    }

    #[test]
    fn bubble_fills_centered_rect_with_opacity() {
        let settings = Settings::default();
        let style = TextStyle {
            bubble_opacity: 0.5,
            ..settings.styles[2].clone()
        };
        let mut raster = Raster::new(&canvas()).expect("raster");
        assert!(draw_bubble(&mut raster, 200.0, 100.0, 66.0, &style));

        // 200 + 2 * 26 = 252 wide, so x spans 234..486.
        let inside = raster.pixel(360, 133).expect("pixel");
        assert!((inside.a as i32 - 128).abs() <= 1);
        assert!((inside.r as i32 - 219).abs() <= 2);
        assert!((inside.g as i32 - 54).abs() <= 2);
        assert!((inside.b as i32 - 67).abs() <= 2);
        assert_eq!(raster.pixel(230, 133).expect("pixel").a, 0);
        assert_eq!(raster.pixel(490, 133).expect("pixel").a, 0);
        assert_eq!(raster.pixel(360, 95).expect("pixel").a, 0);
        assert_eq!(raster.pixel(360, 170).expect("pixel").a, 0);
    }

    #[test]
    fn bubble_is_skipped_without_color() {
        let settings = Settings::default();
        let mut raster = Raster::new(&canvas()).expect("raster");
        assert!(!draw_bubble(&mut raster, 200.0, 100.0, 50.0, &settings.styles[1]));
        assert!(raster.is_blank());
    }

    #[test]
    fn bubble_may_overflow_canvas() {
        let settings = Settings::default();
        let mut raster = Raster::new(&canvas()).expect("raster");
        assert!(draw_bubble(&mut raster, 2000.0, -30.0, 71.5, &settings.styles[0]));
        assert_eq!(raster.pixel(0, 10).expect("pixel").a, 255);
        assert_eq!(raster.pixel(719, 10).expect("pixel").a, 255);
    }

    #[test]
    fn text_fill_is_opaque_and_drawn_over_stroke() {
        let settings = Settings::default();
        let font = FixedAdvanceFont::new(0.5);
        let style = &settings.styles[1];
        let mut raster = Raster::new(&canvas()).expect("raster");
        let width = font.measure_width("II", style.font_size).expect("width");
        draw_line(&mut raster, "II", width, 640.0, style, &font).expect("line");

        // Glyph boxes start at x = 360 - 21 = 339 and span 0.8 of the advance.
        let fill = raster.pixel(345, 640).expect("pixel");
        assert_eq!(fill, Rgba::opaque(255, 255, 255));
        // Gap between the two glyph boxes is covered by the black outline.
        let outline = raster.pixel(358, 640).expect("pixel");
        assert_eq!(outline, Rgba::opaque(0, 0, 0));
        // Well outside the 9px outline nothing is drawn.
        assert_eq!(raster.pixel(320, 640).expect("pixel").a, 0);
    }

    #[test]
    fn text_without_stroke_leaves_gaps_clear() {
        let settings = Settings::default();
        let font = FixedAdvanceFont::new(0.5);
        let style = &settings.styles[0];
        let mut raster = Raster::new(&canvas()).expect("raster");
        let width = font.measure_width("II", style.font_size).expect("width");
        draw_line(&mut raster, "II", width, 640.0, style, &font).expect("line");
        assert_eq!(
            raster.pixel(345, 640).expect("pixel"),
            Rgba::opaque(0x13, 0x13, 0x13)
        );
        assert_eq!(raster.pixel(358, 640).expect("pixel").a, 0);
    }

    #[test]
    fn into_image_keeps_straight_alpha() {
        let settings = Settings::default();
        let style = TextStyle {
            bubble_opacity: 0.5,
            ..settings.styles[2].clone()
        };
        let mut raster = Raster::new(&canvas()).expect("raster");
        assert!(draw_bubble(&mut raster, 200.0, 100.0, 66.0, &style));
        let image = raster.into_image();
        assert_eq!(image.dimensions(), (720, 1280));
        let pixel = image.get_pixel(360, 133);
        assert!((pixel.0[3] as i32 - 128).abs() <= 1);
        assert!((pixel.0[0] as i32 - 219).abs() <= 2);
    }

    #[test]
    fn bubble_rounding_to_zero_height_is_skipped() {
        let settings = Settings::default();
        let mut raster = Raster::new(&canvas()).expect("raster");
        assert!(!draw_bubble(&mut raster, 200.0, 100.0, 0.4, &settings.styles[0]));
        assert!(raster.is_blank());
    }

    #[test]
    fn translucent_text_and_stroke_colors_are_drawn_opaque() {
        let settings = Settings::default();
        let font = FixedAdvanceFont::new(0.5);
        let style = TextStyle {
            text_color: Rgba::opaque(255, 255, 255).with_alpha(0x40),
            stroke_color: Some(Rgba::opaque(0, 0, 0).with_alpha(0x40)),
            ..settings.styles[1].clone()
        };
        let mut raster = Raster::new(&canvas()).expect("raster");
        let width = font.measure_width("II", style.font_size).expect("width");
        draw_line(&mut raster, "II", width, 640.0, &style, &font).expect("line");
        assert_eq!(
            raster.pixel(345, 640).expect("pixel"),
            Rgba::opaque(255, 255, 255)
        );
        assert_eq!(
            raster.pixel(358, 640).expect("pixel"),
            Rgba::opaque(0, 0, 0)
        );
    }
}
