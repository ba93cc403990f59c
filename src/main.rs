use anyhow::{Result, anyhow};
use clap::Parser;

#[derive(Parser, Debug)]
#[command(
    name = "tiktok-captions",
    version,
    about = "Render TikTok-style caption overlays and burn them into vertical videos"
)]
struct Cli {
    /// Top caption (bubble style)
    #[arg(long = "text1", default_value = "")]
    text1: String,

    /// Middle caption (outlined style)
    #[arg(long = "text2", default_value = "")]
    text2: String,

    /// Bottom caption (accent bubble style)
    #[arg(long = "text3", default_value = "")]
    text3: String,

    /// JSON array of exactly 3 strings; replaces --text1/--text2/--text3
    #[arg(short = 't', long = "texts", conflicts_with_all = ["text1", "text2", "text3"])]
    texts: Option<String>,

    /// Read extra settings from a local TOML file
    #[arg(short = 'r', long = "settings")]
    settings: Option<String>,

    /// Directory to write overlay PNGs into
    #[arg(short = 'o', long = "out-dir")]
    out_dir: Option<String>,

    /// Source video to burn the overlays into (requires ffmpeg)
    #[arg(short = 'v', long = "video")]
    video: Option<String>,

    /// Output video path (default: <input>_captioned.mp4)
    #[arg(long = "output")]
    output: Option<String>,

    /// Place each caption by its own style position instead of stacking them
    #[arg(long = "standalone")]
    standalone: bool,

    /// Enable verbose logging
    #[arg(long = "verbose")]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    tiktok_captions::logging::init(cli.verbose)?;

    let texts = match cli.texts.as_deref() {
        Some(json) => tiktok_captions::parse_texts_json(json)?,
        None => [cli.text1, cli.text2, cli.text3],
    };
    if cli.out_dir.is_none() && cli.video.is_none() {
        return Err(anyhow!("nothing to do: pass --out-dir and/or --video"));
    }

    let output = tiktok_captions::run(tiktok_captions::Config {
        texts,
        settings_path: cli.settings,
        out_dir: cli.out_dir,
        video: cli.video,
        output: cli.output,
        standalone: cli.standalone,
    })
    .await?;

    println!("{}", output);
    Ok(())
}
