use anyhow::{Context, Result, anyhow};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

pub mod color;
pub mod logging;
pub mod overlay;
pub mod settings;
mod test_util;
pub mod video;

pub use overlay::{Overlay, OverlayCompositor, SLOT_COUNT};
pub use settings::{Settings, load_settings};

#[derive(Debug, Clone, Default)]
pub struct Config {
    pub texts: [String; SLOT_COUNT],
    pub settings_path: Option<String>,
    pub out_dir: Option<String>,
    pub video: Option<String>,
    pub output: Option<String>,
    pub standalone: bool,
}

pub async fn run(config: Config) -> Result<String> {
    let settings_path = config.settings_path.as_deref().map(Path::new);
    let settings = settings::load_settings(settings_path)?;
    let font = overlay::resolve_font(
        settings.font_path.as_deref(),
        settings.font_family.as_deref(),
    );
    let compositor = OverlayCompositor::new(&settings, font.as_ref());

    let overlays = if config.standalone {
        render_each_standalone(&compositor, &config.texts)
    } else {
        compositor.generate_text_overlays(&config.texts)
    };
    info!(count = overlays.len(), "overlays generated");

    let mut report = Vec::new();
    report.push(format!(
        "overlays: {} ({})",
        overlays.len(),
        describe_slots(&overlays)
    ));

    if let Some(dir) = config.out_dir.as_deref() {
        let paths = video::save_overlays(&overlays, Path::new(dir))?;
        for path in paths {
            report.push(format!("wrote {}", path.display()));
        }
    }

    if let Some(input) = config.video.as_deref() {
        let input = Path::new(input);
        let output = config
            .output
            .as_deref()
            .map(PathBuf::from)
            .unwrap_or_else(|| default_output_path(input));
        let job = video::VideoJob {
            input,
            output: &output,
            canvas: settings.canvas,
            timeout: settings.processing_timeout,
        };
        video::composite_video(&job, &overlays)
            .await
            .with_context(|| format!("failed to process video: {}", input.display()))?;
        report.push(format!("video: {}", output.display()));
    } else if config.output.is_some() {
        return Err(anyhow!("--output requires --video"));
    }

    Ok(report.join("\n"))
}

/// Parses a JSON array holding exactly one string per slot.
pub fn parse_texts_json(value: &str) -> Result<[String; SLOT_COUNT]> {
    let texts: Vec<String> =
        serde_json::from_str(value).with_context(|| "texts must be a JSON array of strings")?;
    let count = texts.len();
    texts
        .try_into()
        .map_err(|_| anyhow!("expected exactly {} texts, got {}", SLOT_COUNT, count))
}

fn render_each_standalone(
    compositor: &OverlayCompositor<'_>,
    texts: &[String; SLOT_COUNT],
) -> Vec<Overlay> {
    let mut overlays = Vec::new();
    for (slot, text) in texts.iter().enumerate() {
        match compositor.render_standalone(text, slot) {
            Ok(Some(overlay)) => overlays.push(overlay),
            Ok(None) => {}
            Err(err) => warn!("skipping overlay: {:#}", err),
        }
    }
    overlays
}

fn describe_slots(overlays: &[Overlay]) -> String {
    if overlays.is_empty() {
        return "none".to_string();
    }
    overlays
        .iter()
        .map(|item| overlay::SLOT_NAMES[item.slot])
        .collect::<Vec<_>>()
        .join(", ")
}

fn default_output_path(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|stem| stem.to_string_lossy().to_string())
        .unwrap_or_else(|| "video".to_string());
    input.with_file_name(format!("{}_captioned.mp4", stem))
}
