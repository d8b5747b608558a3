//! blink-input - Main Entry Point
//!
//! Runs the reference blink pipeline from a config file until the source
//! ends or Ctrl-C is pressed.

use anyhow::Context;
use blink_input::{
    app::{self, Collaborators},
    config::{self, AppConfig, SourceKind},
    AppError, PipelineError,
};
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser, Debug)]
#[command(author, version, about = "Blink-driven skip/enter input")]
struct Args {
    /// Config file (defaults to the platform config directory)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Replay a JSON-lines landmark trace instead of the configured source
    #[arg(long)]
    trace: Option<PathBuf>,

    /// Number of detector replicas
    #[arg(long)]
    replicas: Option<u16>,

    /// Source frame rate
    #[arg(long)]
    fps: Option<f64>,

    /// Print the effective configuration as TOML and exit
    #[arg(long)]
    print_config: bool,
}

fn load_config(args: &Args) -> anyhow::Result<AppConfig> {
    let mut config = match (&args.config, config::default_config_path()) {
        (Some(path), _) => AppConfig::load(path)
            .with_context(|| format!("failed to load config {:?}", path))?,
        (None, Some(path)) => AppConfig::load_or_default(path),
        (None, None) => AppConfig::default(),
    };

    if let Some(trace) = &args.trace {
        config.source.kind = SourceKind::Trace;
        config.source.path = Some(trace.clone());
    }
    if let Some(replicas) = args.replicas {
        config.pipeline.detector_replicas = replicas;
    }
    if let Some(fps) = args.fps {
        config.source.fps = fps;
    }
    config.validate()?;
    Ok(config)
}

fn init_logging(config: &AppConfig) -> anyhow::Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,blink_input=debug"));

    let (file_layer, guard) = match &config.logging.file {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("cannot open log file {:?}", path))?;
            let (writer, guard) = tracing_appender::non_blocking(file);
            let layer = tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(writer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .with(file_layer)
        .init();
    Ok(guard)
}

fn run(args: Args) -> anyhow::Result<ExitCode> {
    let config = load_config(&args)?;

    if args.print_config {
        print!("{}", config.to_toml()?);
        return Ok(ExitCode::SUCCESS);
    }

    let _guard = init_logging(&config)?;
    tracing::info!("Starting blink-input");

    let collaborators = Collaborators::from_config(&config)?;
    let (pipeline, fps) = app::build_pipeline(&config, collaborators).map_err(AppError::from)?;
    tracing::info!(
        "Source at {} fps, {} detector replica(s)",
        fps,
        config.pipeline.detector_replicas
    );

    // Installed before start so a blocking prepare can still be interrupted.
    let stop = pipeline.stop_handle();
    ctrlc::set_handler({
        let stop = stop.clone();
        move || {
            stop.stop();
        }
    })
    .context("failed to install Ctrl-C handler")?;

    let mut handle = match pipeline.start() {
        Ok(handle) => handle,
        Err(PipelineError::StartupInterrupted) => {
            tracing::info!("Interrupted during startup");
            return Ok(ExitCode::SUCCESS);
        }
        Err(e) => {
            tracing::error!("Pipeline failed to start: {}", e);
            return Ok(ExitCode::FAILURE);
        }
    };
    tracing::info!("Topology:\n{}", handle.topology());

    // A finite source drains the graph on its own; Ctrl-C cuts it short.
    while !handle.is_finished() && !stop.is_stopped() {
        let _ = handle.wait_timeout(Duration::from_millis(100));
    }
    if let Err(e) = handle.stop() {
        tracing::error!("Shutdown incomplete: {}", e);
        return Ok(ExitCode::FAILURE);
    }

    for (name, stats) in handle.stats() {
        tracing::debug!(
            "{}: consumed {} emitted {} filtered {} failures {}",
            name,
            stats.consumed,
            stats.emitted,
            stats.filtered,
            stats.failures
        );
    }
    tracing::info!("Shutting down...");
    Ok(ExitCode::SUCCESS)
}

fn main() -> anyhow::Result<ExitCode> {
    run(Args::parse())
}
