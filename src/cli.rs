// SPDX-License-Identifier: GPL-3.0-only

//! CLI commands
//!
//! This module provides command-line functionality for:
//! - Running a demo recording session against the synthetic stream
//! - Showing the effective configuration and storage layout

use geoframe::capture::types::{choose_optimal_size, FixedRotation, Permissions};
use geoframe::capture::DisplayRotation;
use geoframe::location::{FixedLocation, LocationProvider, NoLocation};
use geoframe::{
    Config, LocationFix, PipelineDeps, RecorderPipeline, SyntheticConfig, SyntheticStream,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Record a session against the synthetic capture stream
#[allow(clippy::too_many_arguments)]
pub async fn record(
    config: Config,
    duration_secs: u64,
    width: u32,
    height: u32,
    latitude: Option<f64>,
    longitude: Option<f64>,
    output: Option<PathBuf>,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = config;
    if let Some(output) = output {
        config.pictures_root = Some(output);
    }

    let location: Arc<dyn LocationProvider> = match (latitude, longitude) {
        (Some(lat), Some(lon)) => Arc::new(FixedLocation(LocationFix::new(lat, lon))),
        _ => Arc::new(NoLocation),
    };

    let pipeline = RecorderPipeline::new(
        config,
        PipelineDeps {
            location,
            rotation: Arc::new(FixedRotation(DisplayRotation::Deg0)),
            permissions: Permissions::granted(),
        },
    )?;

    // Pick the smallest supported size covering the requested one, the way
    // a real backend selects its capture stream. Sizes are listed largest
    // first so the fallback lands on the smallest one.
    const SUPPORTED_SIZES: [(u32, u32); 5] = [
        (3840, 2160),
        (2560, 1440),
        (1920, 1080),
        (1280, 720),
        (640, 360),
    ];
    let (width, height) = choose_optimal_size(&SUPPORTED_SIZES, width, height);

    pipeline.open_camera(Box::new(SyntheticStream::new(SyntheticConfig {
        width,
        height,
        frame_interval: Duration::from_millis(33),
        frame_limit: None,
        sensor_orientation: 90,
    })))?;

    let session_dir = pipeline.start_recording().await?;
    println!("Recording to {}", session_dir.display());

    tokio::time::sleep(Duration::from_secs(duration_secs)).await;

    pipeline.stop_recording();
    let frames = pipeline.frame_counter();
    let fatal = pipeline.fatal_error_occurred();
    pipeline.shutdown().await;
    if fatal {
        eprintln!("warning: the capture device reported an unrecoverable error");
    }

    let saved = std::fs::read_dir(&session_dir)
        .map(|entries| entries.count())
        .unwrap_or(0);
    println!(
        "Done: {} frames delivered, {} stored in {}",
        frames,
        saved,
        session_dir.display()
    );
    Ok(())
}

/// Print the effective configuration
pub fn info(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    let root = geoframe::storage::pictures_root(config.pictures_root.as_deref());
    println!("Pictures root:     {}", root.display());
    println!("Sampling period:   every {} frames", config.sampling_period);
    println!(
        "JPEG quality:      {} (intermediate {})",
        config.stored_jpeg_quality, config.intermediate_jpeg_quality
    );
    println!(
        "Persistence pool:  {} workers, queue depth {}",
        config.save_workers, config.save_queue_depth
    );
    println!(
        "Location timeout:  {} ms",
        config.location_timeout_ms
    );
    Ok(())
}
