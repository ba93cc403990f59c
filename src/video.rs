use anyhow::{Context, Result, anyhow};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::process::Command;
use tracing::info;

use crate::overlay::{Canvas, Overlay};

/// Writes each overlay as `overlay_<slot>.png` (slot counted from 1).
pub fn save_overlays(overlays: &[Overlay], dir: &Path) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(dir)
        .with_context(|| format!("failed to create output directory: {}", dir.display()))?;
    let mut paths = Vec::with_capacity(overlays.len());
    for overlay in overlays {
        let path = dir.join(format!("overlay_{}.png", overlay.slot + 1));
        overlay
            .image
            .save_with_format(&path, image::ImageFormat::Png)
            .with_context(|| format!("failed to write overlay: {}", path.display()))?;
        paths.push(path);
    }
    Ok(paths)
}

pub struct VideoJob<'a> {
    pub input: &'a Path,
    pub output: &'a Path,
    pub canvas: Canvas,
    pub timeout: Duration,
}

/// Burns the overlays into `job.input`, stacked in the order given.
pub async fn composite_video(job: &VideoJob<'_>, overlays: &[Overlay]) -> Result<()> {
    ensure_command("ffmpeg", "video compositing requires ffmpeg on PATH")?;
    if !job.input.exists() {
        return Err(anyhow!("input video not found: {}", job.input.display()));
    }

    let dir = tempfile::tempdir().with_context(|| "failed to create temp dir for overlays")?;
    let overlay_paths = save_overlays(overlays, dir.path())?;
    let args = ffmpeg_args(job, &overlay_paths);
    info!(
        input = %job.input.display(),
        output = %job.output.display(),
        overlays = overlay_paths.len(),
        "video: compositing with ffmpeg"
    );
    run_ffmpeg(&args, job.timeout).await
}

/// Scales to cover the canvas, center-crops, then lays each overlay input on
/// top of the previous result.
pub fn overlay_filter_graph(canvas: &Canvas, overlay_count: usize) -> String {
    let mut graph = format!(
        "[0:v]scale={w}:{h}:force_original_aspect_ratio=increase,crop={w}:{h},setsar=1[base]",
        w = canvas.width,
        h = canvas.height
    );
    let mut previous = "base".to_string();
    for idx in 1..=overlay_count {
        let label = format!("v{}", idx);
        graph.push_str(&format!(";[{}][{}:v]overlay=0:0[{}]", previous, idx, label));
        previous = label;
    }
    graph.push_str(&format!(";[{}]format=yuv420p[out]", previous));
    graph
}

fn ffmpeg_args(job: &VideoJob<'_>, overlay_paths: &[PathBuf]) -> Vec<String> {
    let mut args = vec![
        "-y".to_string(),
        "-i".to_string(),
        job.input.to_string_lossy().to_string(),
    ];
    for path in overlay_paths {
        args.push("-i".to_string());
        args.push(path.to_string_lossy().to_string());
    }
    args.extend([
        "-filter_complex".to_string(),
        overlay_filter_graph(&job.canvas, overlay_paths.len()),
        "-map".to_string(),
        "[out]".to_string(),
        "-map".to_string(),
        "0:a?".to_string(),
        "-c:v".to_string(),
        "libx264".to_string(),
        "-preset".to_string(),
        "medium".to_string(),
        "-c:a".to_string(),
        "copy".to_string(),
        "-movflags".to_string(),
        "+faststart".to_string(),
        job.output.to_string_lossy().to_string(),
    ]);
    args
}

async fn run_ffmpeg(args: &[String], timeout: Duration) -> Result<()> {
    let child = Command::new("ffmpeg")
        .args(args)
        .kill_on_drop(true)
        .output();
    let output = tokio::time::timeout(timeout, child)
        .await
        .map_err(|_| anyhow!("ffmpeg timed out after {}s", timeout.as_secs()))?
        .with_context(|| "failed to run ffmpeg")?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(anyhow!("ffmpeg failed: {}", stderr.trim()));
    }
    Ok(())
}

fn ensure_command(cmd: &str, message: &str) -> Result<()> {
    if command_exists(cmd) {
        Ok(())
    } else {
        Err(anyhow!("{}", message))
    }
}

fn command_exists(cmd: &str) -> bool {
    let Some(path_var) = env::var_os("PATH") else {
        return false;
    };
    #[cfg(windows)]
    let candidate = format!("{}.exe", cmd);
    #[cfg(not(windows))]
    let candidate = cmd.to_string();
    env::split_paths(&path_var).any(|dir| is_executable(&dir.join(&candidate)))
}

fn is_executable(path: &Path) -> bool {
    let Ok(metadata) = fs::metadata(path) else {
        return false;
    };
    if !metadata.is_file() {
        return false;
    }
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        metadata.permissions().mode() & 0o111 != 0
    }
    #[cfg(not(unix))]
    {
        true
    }
}
