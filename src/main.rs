use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use clap_complete::Shell;
use std::path::PathBuf;
use std::time::Instant;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tracing::{info, warn};

mod config;

use config::Config;
use wavestrip::audio::WavSource;
use wavestrip::renderer::{try_render_waveform, RenderPosition, RenderStyle};
use wavestrip::sampler::{extract_envelope_async, Envelope};
use wavestrip::WaveColor;

#[derive(Parser, Debug)]
#[command(name = "wavestrip")]
#[command(author, version, about = "Render the amplitude envelope of a WAV file to PNG")]
struct Args {
    /// Input WAV file
    #[arg(required_unless_present_any = ["init_config", "completions"])]
    input: Option<PathBuf>,

    /// Output PNG file
    #[arg(required_unless_present_any = ["init_config", "completions"])]
    output: Option<PathBuf>,

    /// Config file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Image width in logical units
    #[arg(long)]
    width: Option<f32>,

    /// Image height in logical units
    #[arg(long)]
    height: Option<f32>,

    /// Pixels per logical unit
    #[arg(long)]
    scale: Option<f32>,

    /// Style: filled, gradient or striped:<period>
    #[arg(long)]
    style: Option<RenderStyle>,

    /// Waveform position: top, middle, bottom
    #[arg(long)]
    position: Option<RenderPosition>,

    /// Waveform color (#RRGGBB or #RRGGBBAA)
    #[arg(long)]
    color: Option<WaveColor>,

    /// Background color (#RRGGBB or #RRGGBBAA)
    #[arg(long)]
    background: Option<WaveColor>,

    /// Border width, 0 for none
    #[arg(long)]
    border_width: Option<f32>,

    /// Border color
    #[arg(long)]
    border_color: Option<WaveColor>,

    /// Divide the image height by this to get the full-scale amplitude
    #[arg(long)]
    padding_factor: Option<f32>,

    /// Draw a vertical line through the middle
    #[arg(long)]
    central_line: bool,

    /// Number of envelope points (default: output width in pixels)
    #[arg(short, long)]
    resolution: Option<usize>,

    /// Noise floor in dB, e.g. -50
    #[arg(long, allow_negative_numbers = true)]
    noise_floor: Option<f32>,

    /// Start of the sampled window in seconds
    #[arg(long)]
    start: Option<f64>,

    /// Length of the sampled window in seconds
    #[arg(long)]
    duration: Option<f64>,

    /// Write a default config file and exit
    #[arg(long)]
    init_config: bool,

    /// Print shell completions and exit
    #[arg(long, value_enum)]
    completions: Option<Shell>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("wavestrip=info".parse()?),
        )
        .init();

    let args = Args::parse();

    if let Some(shell) = args.completions {
        clap_complete::generate(shell, &mut Args::command(), "wavestrip", &mut std::io::stdout());
        return Ok(());
    }

    if args.init_config {
        let path = Config::init_default_config()?;
        info!("Wrote default config to {}", path.display());
        return Ok(());
    }

    let mut config = match &args.config {
        Some(path) => Config::load(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => Config::load_from_default_path().unwrap_or_default(),
    };
    config.merge_args(&args);

    let (input, output) = match (&args.input, &args.output) {
        (Some(input), Some(output)) => (input.clone(), output.clone()),
        _ => anyhow::bail!("Both an input WAV and an output PNG path are required"),
    };

    let render_config = config.render_config();
    render_config.validate()?;
    let request = config
        .extraction_request(&render_config)
        .with_correlation_id(input.display().to_string());
    let resolution = request.resolution;

    info!("Sampling {} at {} points", input.display(), resolution);
    let sampling_started = Instant::now();
    let (tx, mut rx) = mpsc::unbounded_channel();
    let failure_tx = tx.clone();
    extract_envelope_async(
        WavSource::new(&input),
        request,
        move |envelope, _| {
            let _ = tx.send(Ok(envelope));
        },
        move |error, id| {
            let _ = failure_tx.send(Err((error, id)));
        },
        Handle::current(),
    );

    let envelope = match rx.recv().await {
        Some(Ok(envelope)) => envelope,
        Some(Err((error, id))) => {
            warn!(
                "Sampling {} failed: {}. Drawing a flat waveform instead.",
                id.unwrap_or_default(),
                error
            );
            Envelope::silence(resolution)
        }
        None => anyhow::bail!("Sampling task ended without a result"),
    };
    info!(
        "Sampled {} points in {:.3}s",
        envelope.len(),
        sampling_started.elapsed().as_secs_f64()
    );

    let drawing_started = Instant::now();
    let image = try_render_waveform(&envelope, &render_config)?;
    info!(
        "Drew {}x{} px in {:.3}s ({:.2} px per point)",
        image.width(),
        image.height(),
        drawing_started.elapsed().as_secs_f64(),
        image.width() as f64 / envelope.len().max(1) as f64
    );

    image
        .write_png(&output)
        .with_context(|| format!("Failed to write {}", output.display()))?;
    info!("Wrote {}", output.display());

    Ok(())
}
