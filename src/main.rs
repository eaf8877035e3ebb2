//! Depthstream CLI
//!
//! Command-line interface for inspecting devices and streaming frame sets
//! through the pipeline.

use std::path::PathBuf;
use std::process;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use depthstream::{
    device::{Context, DeviceDescription, SyntheticDevice},
    metrics::{MetricsRegistry, MetricsSnapshot},
    settings::FileSettings,
    Config, Error, FrameSet, Pipeline, StreamRequest,
};
use tracing::{info, warn};

#[derive(Debug, Parser)]
#[command(name = "depthstream", version, about = "Stream synchronized frame sets from a depth camera")]
struct Cli {
    /// Settings file (TOML).
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Play back a device description or recorded session.
    #[arg(long)]
    device_file: Option<PathBuf>,

    /// Select a device by serial number.
    #[arg(long)]
    serial: Option<String>,

    /// Stream to enable, as `kind[.index][:WxH][:format][@fps]`. Repeatable;
    /// all streams when omitted.
    #[arg(long = "stream", value_name = "REQUEST")]
    streams: Vec<StreamRequest>,

    /// Frame sets to receive before stopping.
    #[arg(long)]
    frames: Option<u32>,

    /// Keep streaming until interrupted.
    #[arg(long)]
    continuous: bool,

    /// Wait timeout per frame set in milliseconds.
    #[arg(long)]
    timeout_ms: Option<u64>,

    /// Record the session description to this file.
    #[arg(long)]
    record: Option<PathBuf>,

    /// List devices and their stream profiles, then exit.
    #[arg(long)]
    list: bool,

    /// Print Prometheus metrics after streaming.
    #[arg(long)]
    dump_metrics: bool,
}

fn main() {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    info!("Depthstream v{}", depthstream::VERSION);

    let settings = match &cli.settings {
        Some(path) => FileSettings::from_file(path)?,
        None => FileSettings::default(),
    };

    let context = Arc::new(Context::with_file_pacing(settings.device.pacing));
    let device = match &settings.device.description {
        Some(path) => SyntheticDevice::from_file(path, settings.device.pacing)?,
        None => SyntheticDevice::new(DeviceDescription::synthetic_d400(), settings.device.pacing)?,
    };
    context.add_device(Arc::new(device));

    if cli.list {
        list_devices(&context);
        return Ok(());
    }

    let mut config = Config::new();
    if cli.streams.is_empty() {
        config.enable_all_streams();
    }
    for request in &cli.streams {
        config.enable_stream_request(*request);
    }
    if let Some(serial) = cli.serial.as_ref().or(settings.device.serial.as_ref()) {
        config.enable_device(serial.clone());
    }
    if let Some(path) = &cli.device_file {
        config.enable_device_from_file(path);
    }
    if let Some(path) = &cli.record {
        config.enable_record_to_file(path);
    }

    let pipeline = Arc::new(Pipeline::with_settings(Arc::clone(&context), &settings.pipeline)?);
    let profile = pipeline.start_with(&config)?;
    for stream in profile.streams() {
        info!(stream = %stream, "Streaming");
    }

    #[cfg(feature = "metrics")]
    {
        if settings.output.metrics_port != 0 {
            spawn_metrics_server(Arc::clone(&pipeline), settings.output.metrics_port)?;
        }
    }

    let running = Arc::new(AtomicBool::new(true));
    {
        let running = Arc::clone(&running);
        ctrlc::set_handler(move || running.store(false, Ordering::SeqCst))?;
    }

    let timeout = cli
        .timeout_ms
        .map(Duration::from_millis)
        .unwrap_or_else(|| pipeline.default_timeout());
    let continuous = cli.continuous || settings.output.continuous;
    let target = cli.frames.unwrap_or(settings.output.frame_count);

    let mut received = 0u32;
    while running.load(Ordering::SeqCst) && (continuous || received < target) {
        match pipeline.wait_for_frames(timeout) {
            Ok(frames) => {
                received += 1;
                report(received, &frames);
            }
            Err(e) if e.is_recoverable() => warn!(error = %e, "No frames yet"),
            Err(Error::NotStarted) => break,
            Err(e) => {
                pipeline.stop();
                return Err(e.into());
            }
        }
    }

    pipeline.stop();
    let stats = pipeline.stats();
    info!(
        received,
        frames = stats.frames_received,
        dropped = stats.frames_dropped,
        stale = stats.stale_frames,
        timeouts = stats.wait_timeouts,
        "Done"
    );

    if cli.dump_metrics {
        let registry = MetricsRegistry::new()?;
        registry.update(&MetricsSnapshot::from_components(&stats, &pipeline.pool().stats()));
        print!("{}", registry.encode()?);
    }
    Ok(())
}

fn list_devices(context: &Context) {
    for device in context.devices() {
        let info = device.info();
        println!("{} (serial {})", info.name, info.serial);
        for sensor in device.sensors() {
            println!("  {}", sensor.name());
            for profile in sensor.stream_profiles() {
                println!("    {}", profile);
            }
        }
    }
}

fn report(sequence: u32, frames: &FrameSet) {
    let count = frames.count().unwrap_or(0);
    let number = frames.frame_number().unwrap_or(0);
    let center = frames.depth_frame().ok().flatten().and_then(|depth| {
        let x = depth.width().ok()? as i32 / 2;
        let y = depth.height().ok()? as i32 / 2;
        depth.distance(x, y).ok()
    });

    match center {
        Some(meters) => info!(sequence, number, count, center_m = meters, "Frame set"),
        None => info!(sequence, number, count, "Frame set"),
    }
}

#[cfg(feature = "metrics")]
fn spawn_metrics_server(pipeline: Arc<Pipeline>, port: u16) -> Result<(), Box<dyn std::error::Error>> {
    use depthstream::metrics::{MetricsServer, MetricsServerConfig};

    let server = MetricsServer::new(MetricsServerConfig::with_port(port), MetricsRegistry::new()?, pipeline);
    let runtime = tokio::runtime::Builder::new_multi_thread().enable_all().build()?;
    std::thread::spawn(move || {
        if let Err(e) = runtime.block_on(server.run()) {
            warn!(error = %e, "Metrics server stopped");
        }
    });
    Ok(())
}
