use anyhow::{Context, Result, anyhow};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::warn;

use crate::color::{Rgba, parse_hex_color};
use crate::overlay::{Canvas, Position, SLOT_COUNT, SLOT_NAMES, SafeZones, TextStyle};

const DEFAULT_SETTINGS_TOML: &str = include_str!("../settings.toml");

#[derive(Debug, Clone)]
pub struct Settings {
    pub canvas: Canvas,
    pub safe_zones: SafeZones,
    pub font_family: Option<String>,
    pub font_path: Option<PathBuf>,
    pub processing_timeout: Duration,
    pub styles: [TextStyle; SLOT_COUNT],
}

impl Default for Settings {
    /// The fallback skeleton with the embedded `settings.toml` merged on top.
    fn default() -> Self {
        let mut settings = Self::fallback();
        if let Err(err) = settings.merge_str(DEFAULT_SETTINGS_TOML) {
            warn!("embedded settings are invalid, using fallbacks: {:#}", err);
        }
        settings
    }
}

/// Style used for keys a settings file leaves out.
fn base_style(family: &str) -> TextStyle {
    TextStyle {
        font_size: 42.0,
        font_family: family.to_string(),
        font_weight: "normal".to_string(),
        text_color: Rgba::opaque(0xff, 0xff, 0xff),
        bubble_color: None,
        bubble_opacity: 1.0,
        bubble_padding: 0.0,
        horizontal_padding: 22.0,
        bubble_radius: 13.0,
        position: Position::Center,
        line_height: 0.75,
        stroke_color: None,
        stroke_width: None,
    }
}

#[derive(Debug, Default, Deserialize)]
struct SettingsFile {
    canvas: Option<CanvasSettings>,
    safe_zones: Option<SafeZoneSettings>,
    font: Option<FontSettings>,
    video: Option<VideoSettings>,
    text1: Option<StyleSettings>,
    text2: Option<StyleSettings>,
    text3: Option<StyleSettings>,
}

#[derive(Debug, Default, Deserialize)]
struct CanvasSettings {
    width: Option<u32>,
    height: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct SafeZoneSettings {
    top: Option<f32>,
    bottom: Option<f32>,
    left: Option<f32>,
    right: Option<f32>,
}

#[derive(Debug, Default, Deserialize)]
struct FontSettings {
    family: Option<String>,
    path: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct VideoSettings {
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct StyleSettings {
    font_size: Option<f32>,
    font_family: Option<String>,
    font_weight: Option<String>,
    text_color: Option<String>,
    bubble_color: Option<String>,
    bubble_opacity: Option<f32>,
    bubble_padding: Option<f32>,
    horizontal_padding: Option<f32>,
    bubble_radius: Option<f32>,
    position: Option<Position>,
    line_height: Option<f32>,
    stroke_color: Option<String>,
    stroke_width: Option<u32>,
}

pub fn load_settings(extra_path: Option<&Path>) -> Result<Settings> {
    let mut settings = Settings::default();
    ensure_home_settings_file()?;

    let mut ordered_paths = Vec::new();
    ordered_paths.push(PathBuf::from("settings.toml"));
    ordered_paths.push(PathBuf::from("settings.local.toml"));

    if let Some(home) = home_dir() {
        ordered_paths.push(home.join("settings.toml"));
        ordered_paths.push(home.join("settings.local.toml"));
    }

    if let Some(extra) = extra_path {
        if !extra.exists() {
            return Err(anyhow!("settings file not found: {}", extra.display()));
        }
        ordered_paths.push(extra.to_path_buf());
    }

    for path in ordered_paths {
        if path.exists() {
            let content = fs::read_to_string(&path)
                .with_context(|| format!("failed to read settings: {}", path.display()))?;
            settings
                .merge_str(&content)
                .with_context(|| format!("failed to parse settings: {}", path.display()))?;
        }
    }

    settings.validate()?;
    Ok(settings)
}

/// Settings from the embedded defaults only, without touching the filesystem.
pub fn embedded_settings() -> Result<Settings> {
    let mut settings = Settings::fallback();
    settings.merge_str(DEFAULT_SETTINGS_TOML)?;
    settings.validate()?;
    Ok(settings)
}

impl Settings {
    /// Values for keys that no settings file provides, embedded one included.
    fn fallback() -> Self {
        let family = "Proxima Nova Semibold".to_string();
        Self {
            canvas: Canvas {
                width: 720,
                height: 1280,
            },
            safe_zones: SafeZones {
                top: 0.12,
                bottom: 0.85,
                left: 0.1,
                right: 0.9,
            },
            font_family: Some(family.clone()),
            font_path: None,
            processing_timeout: Duration::from_secs(300),
            styles: std::array::from_fn(|_| base_style(&family)),
        }
    }

    pub fn style(&self, slot: usize) -> Option<&TextStyle> {
        self.styles.get(slot)
    }

    pub(crate) fn merge_str(&mut self, content: &str) -> Result<()> {
        let parsed: SettingsFile = toml::from_str(content)?;
        self.merge(parsed)
    }

    fn merge(&mut self, incoming: SettingsFile) -> Result<()> {
        if let Some(canvas) = incoming.canvas {
            if let Some(width) = canvas.width {
                self.canvas.width = width;
            }
            if let Some(height) = canvas.height {
                self.canvas.height = height;
            }
        }
        if let Some(zones) = incoming.safe_zones {
            if let Some(top) = zones.top {
                self.safe_zones.top = top;
            }
            if let Some(bottom) = zones.bottom {
                self.safe_zones.bottom = bottom;
            }
            if let Some(left) = zones.left {
                self.safe_zones.left = left;
            }
            if let Some(right) = zones.right {
                self.safe_zones.right = right;
            }
        }
        if let Some(font) = incoming.font {
            if let Some(family) = font.family {
                self.font_family = non_empty(family);
            }
            if let Some(path) = font.path {
                self.font_path = non_empty(path).map(PathBuf::from);
            }
        }
        if let Some(video) = incoming.video {
            if let Some(secs) = video.timeout_secs {
                if secs > 0 {
                    self.processing_timeout = Duration::from_secs(secs);
                }
            }
        }
        let slots = [incoming.text1, incoming.text2, incoming.text3];
        for (idx, style) in slots.into_iter().enumerate() {
            if let Some(style) = style {
                merge_style(&mut self.styles[idx], style)
                    .with_context(|| format!("invalid style [{}]", SLOT_NAMES[idx]))?;
            }
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.canvas.width == 0 || self.canvas.height == 0 {
            return Err(anyhow!(
                "canvas dimensions must be non-zero (got {}x{})",
                self.canvas.width,
                self.canvas.height
            ));
        }
        let zones = &self.safe_zones;
        let fractions = [zones.top, zones.bottom, zones.left, zones.right];
        if fractions
            .iter()
            .any(|value| !value.is_finite() || !(0.0..=1.0).contains(value))
        {
            return Err(anyhow!("safe zone fractions must lie within 0..1"));
        }
        if zones.left >= zones.right {
            return Err(anyhow!(
                "safe zone left ({}) must be less than right ({})",
                zones.left,
                zones.right
            ));
        }
        for (idx, style) in self.styles.iter().enumerate() {
            validate_style(style).with_context(|| format!("invalid style [{}]", SLOT_NAMES[idx]))?;
        }
        Ok(())
    }
}

fn merge_style(style: &mut TextStyle, incoming: StyleSettings) -> Result<()> {
    if let Some(size) = incoming.font_size {
        style.font_size = size;
    }
    if let Some(family) = incoming.font_family {
        if !family.trim().is_empty() {
            style.font_family = family;
        }
    }
    if let Some(weight) = incoming.font_weight {
        if !weight.trim().is_empty() {
            style.font_weight = weight;
        }
    }
    if let Some(color) = incoming.text_color {
        style.text_color = parse_hex_color(&color)?;
    }
    // An empty color string clears an inherited bubble or stroke.
    if let Some(color) = incoming.bubble_color {
        style.bubble_color = parse_optional_color(&color)?;
    }
    if let Some(color) = incoming.stroke_color {
        style.stroke_color = parse_optional_color(&color)?;
    }
    if let Some(width) = incoming.stroke_width {
        style.stroke_width = (width > 0).then_some(width);
    }
    if let Some(opacity) = incoming.bubble_opacity {
        style.bubble_opacity = opacity;
    }
    if let Some(padding) = incoming.bubble_padding {
        style.bubble_padding = padding;
    }
    if let Some(padding) = incoming.horizontal_padding {
        style.horizontal_padding = padding;
    }
    if let Some(radius) = incoming.bubble_radius {
        style.bubble_radius = radius;
    }
    if let Some(position) = incoming.position {
        style.position = position;
    }
    if let Some(line_height) = incoming.line_height {
        style.line_height = line_height;
    }
    Ok(())
}

fn validate_style(style: &TextStyle) -> Result<()> {
    if !style.font_size.is_finite() || style.font_size <= 0.0 {
        return Err(anyhow!("font_size must be positive"));
    }
    let non_negative = [
        ("line_height", style.line_height),
        ("bubble_padding", style.bubble_padding),
        ("horizontal_padding", style.horizontal_padding),
        ("bubble_radius", style.bubble_radius),
    ];
    for (name, value) in non_negative {
        if !value.is_finite() || value < 0.0 {
            return Err(anyhow!("{} must be a non-negative number", name));
        }
    }
    if !(0.0..=1.0).contains(&style.bubble_opacity) {
        return Err(anyhow!("bubble_opacity must lie within 0..1"));
    }
    Ok(())
}

fn parse_optional_color(value: &str) -> Result<Option<Rgba>> {
    if value.trim().is_empty() {
        return Ok(None);
    }
    parse_hex_color(value).map(Some)
}

fn non_empty(value: String) -> Option<String> {
    if value.trim().is_empty() {
        None
    } else {
        Some(value)
    }
}

fn ensure_home_settings_file() -> Result<()> {
    let Some(home) = home_dir() else {
        return Ok(());
    };
    fs::create_dir_all(&home)
        .with_context(|| format!("failed to create settings directory: {}", home.display()))?;
    let path = home.join("settings.toml");
    if !path.exists() {
        fs::write(&path, DEFAULT_SETTINGS_TOML)
            .with_context(|| format!("failed to write settings: {}", path.display()))?;
    }
    Ok(())
}

fn home_dir() -> Option<PathBuf> {
    std::env::var("HOME").ok().and_then(|home| {
        let home = home.trim();
        if home.is_empty() {
            None
        } else {
            Some(Path::new(home).join(".tiktok-captions"))
        }
    })
}
