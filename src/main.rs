// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.

//! ExamWatch - headless proctoring monitor
//!
//! Runs the monitor against the simulated camera and scripted model described
//! in the `[simulation]` section of the configuration, and logs every event
//! the monitor raises.

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use examwatch::camera::{CameraError, CameraSession, SimulatedCamera};
use examwatch::config::{Config, SimulatedCameraFailure};
use examwatch::core::{EventBus, EventPayload, ProctoringMonitor};
use examwatch::detection::{DetectionEngine, ModelLoader, ScriptedModel};
use examwatch::VERSION;

/// How long shutdown waits for buffered events to be reported
const REPORTER_GRACE: Duration = Duration::from_secs(2);

/// ExamWatch - visual proctoring monitor
#[derive(Parser, Debug)]
#[command(name = "examwatch")]
#[command(version = VERSION)]
#[command(about = "Camera sampling and object detection for exam integrity events")]
struct Args {
    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Enable trace-level logging
    #[arg(long)]
    trace: bool,

    /// Override the tick interval in milliseconds
    #[arg(long)]
    tick_ms: Option<u64>,

    /// Print events as JSON lines on stdout
    #[arg(long)]
    json: bool,

    /// Stop after this many seconds instead of waiting for Ctrl+C
    #[arg(long)]
    duration_secs: Option<u64>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let config_path = args.config.clone().unwrap_or_else(Config::default_path);
    let mut config = Config::load_or_create(&config_path)?;
    if let Some(tick_ms) = args.tick_ms {
        config.monitor.tick_interval_ms = tick_ms;
    }

    // Initialize logging
    let level = if args.trace {
        "trace"
    } else if args.debug {
        "debug"
    } else {
        config.log_level.as_str()
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(true)
        .with_file(args.debug)
        .with_line_number(args.debug)
        .with_ansi(!args.json)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("ExamWatch v{} - visual proctoring monitor", VERSION);
    info!("Configuration loaded from {:?}", config_path);

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(run_headless(config, args.json, args.duration_secs))
}

/// Wire simulated devices into a monitor and run until shutdown
async fn run_headless(config: Config, json: bool, duration_secs: Option<u64>) -> Result<()> {
    let sim = &config.simulation;
    let model = ScriptedModel::new(sim.model.clone());
    if config.detector.model != model.name() {
        anyhow::bail!(
            "unknown detector model '{}' (available: {})",
            config.detector.model,
            model.name()
        );
    }

    let mut camera = SimulatedCamera::new()
        .with_tracks(sim.tracks)
        .with_open_delay(Duration::from_millis(sim.open_delay_ms))
        .with_auto_frames();
    match sim.camera_failure {
        Some(SimulatedCameraFailure::AccessDenied) => {
            camera = camera.failing(CameraError::AccessDenied("permission denied by user".to_string()))
        }
        Some(SimulatedCameraFailure::NoDevice) => camera = camera.failing(CameraError::NoDevice),
        None => {}
    }
    let camera = Arc::new(camera);

    let session = Arc::new(CameraSession::new(camera.clone(), config.camera.clone()));
    let engine = Arc::new(DetectionEngine::new(Arc::new(model)));
    let bus = Arc::new(EventBus::new(1024));

    let mut events = bus.subscribe_events();
    let reporter = tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => {
                    match &event.payload {
                        EventPayload::Violation(v) => warn!(
                            "VIOLATION '{}' confidence {:.2} (frame {})",
                            v.matched_label, v.confidence, v.frame_sequence
                        ),
                        EventPayload::CameraFault(f) => warn!("CAMERA FAULT: {}", f.reason),
                        EventPayload::DetectorFault(f) => warn!("DETECTOR FAULT: {}", f.error),
                    }
                    if json {
                        match serde_json::to_string(&event) {
                            Ok(line) => println!("{}", line),
                            Err(e) => warn!("Failed to encode event {}: {}", event.id, e),
                        }
                    }
                }
                Err(RecvError::Lagged(missed)) => warn!("Event reporter lagged, {} event(s) lost", missed),
                Err(RecvError::Closed) => break,
            }
        }
    });

    let monitor = ProctoringMonitor::new(config.monitor.clone(), session, engine, bus.clone())?;
    monitor.start()?;

    if let Some(secs) = sim.unplug_after_secs {
        let tracks = camera.tracks();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(secs)).await;
            if let Some(track) = tracks.first() {
                info!("Simulating camera unplug on {}", track.id());
                track.end();
            }
        });
    }

    info!("🚀 Monitor running");
    let deadline = async {
        match duration_secs {
            Some(secs) => tokio::time::sleep(Duration::from_secs(secs)).await,
            None => std::future::pending::<()>().await,
        }
    };

    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            result?;
            info!("Shutdown signal received, cleaning up...");
        }
        _ = deadline => info!("Run duration elapsed"),
    }

    monitor.stop();
    let stats = monitor.stats();
    info!(
        "Ticks: {} (busy {}, unready {}, no frame {}), inferences: {}, failures: {}, violations: {}",
        stats.ticks,
        stats.skipped_busy,
        stats.skipped_unready,
        stats.skipped_no_frame,
        stats.inferences,
        stats.inference_failures,
        stats.violations
    );

    drop(monitor);
    drop(bus);
    finish_reporter(reporter, REPORTER_GRACE).await;

    info!("ExamWatch shutdown complete");
    Ok(())
}

/// Wait for the reporter to drain. An inference that never returns keeps the
/// bus alive, so give up after `grace`.
async fn finish_reporter(reporter: JoinHandle<()>, grace: Duration) {
    let abort = reporter.abort_handle();
    if tokio::time::timeout(grace, reporter).await.is_err() {
        warn!("Event reporter still busy after {:?}, abandoning it", grace);
        abort.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_reporter_finishes_when_bus_closes() {
        let bus = EventBus::new(16);
        let mut events = bus.subscribe_events();
        let reporter = tokio::spawn(async move { while events.recv().await.is_ok() {} });

        drop(bus);
        finish_reporter(reporter, Duration::from_secs(60)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_stuck_reporter_is_abandoned() {
        let bus = Arc::new(EventBus::new(16));
        let mut events = bus.subscribe_events();
        let reporter = tokio::spawn(async move { while events.recv().await.is_ok() {} });

        // a hung inference would hold this clone forever
        let _held = Arc::clone(&bus);
        drop(bus);

        let started = tokio::time::Instant::now();
        finish_reporter(reporter, Duration::from_secs(2)).await;
        assert!(started.elapsed() >= Duration::from_secs(2));
    }
}
