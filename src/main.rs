use anyhow::{bail, Result};
use chrono::Utc;
use clap::Parser;
use env_logger::Env;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tokio::time::{sleep, Duration};

use indoor_tracker_rs::engine::EngineSnapshot;
use indoor_tracker_rs::fingerprint::JsonFileStore;
use indoor_tracker_rs::live_status::{current_timestamp, LiveStatus};
use indoor_tracker_rs::session::load_session;
use indoor_tracker_rs::{spawn_engine, PositionEvent, PositioningConfig, PositioningEngine};

#[derive(Parser, Debug)]
#[command(name = "indoor_tracker")]
#[command(about = "Replay a recorded sensor session through the indoor positioning engine", long_about = None)]
struct Args {
    /// Fingerprint store (JSON written by `survey`)
    #[arg(long)]
    store: PathBuf,

    /// Recorded session, .json or .json.gz
    #[arg(long)]
    session: PathBuf,

    /// Positioning config (JSON); defaults are used when omitted
    #[arg(long)]
    config: Option<PathBuf>,

    /// Output directory
    #[arg(long, default_value = "indoor_tracker_sessions")]
    output_dir: PathBuf,

    /// Pace readings by their timestamps instead of replaying as fast as possible
    #[arg(long)]
    realtime: bool,
}

#[derive(Serialize)]
struct TrackOutput {
    session: String,
    events: Vec<PositionEvent>,
    final_state: EngineSnapshot,
    stats: Stats,
}

#[derive(Serialize)]
struct Stats {
    readings: usize,
    events: usize,
    inputs_dropped: u64,
    replay_seconds: f64,
}

const STATUS_INTERVAL_SECS: f64 = 2.0;

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    if !args.store.exists() {
        bail!("fingerprint store {} does not exist", args.store.display());
    }

    println!("[{}] Indoor Tracker starting", ts_now());
    println!("  Store: {}", args.store.display());
    println!("  Session: {}", args.session.display());
    println!("  Realtime: {}", args.realtime);
    println!("  Output Dir: {}", args.output_dir.display());

    std::fs::create_dir_all(&args.output_dir)?;

    let config = match &args.config {
        Some(path) => PositioningConfig::load(path)?,
        None => PositioningConfig::default(),
    };
    let store = JsonFileStore::open(&args.store)?;
    let engine = PositioningEngine::from_store(config.clone(), &store)?;
    println!(
        "[{}] Radio map: {} locations, floors {:?}",
        ts_now(),
        engine.radio_map().len(),
        engine.radio_map().floors()
    );

    let session = load_session(&args.session)?;
    let reading_count = session.readings.len();
    let session_secs = session.duration_secs();
    let start_ts = session.readings.first().map(|r| r.timestamp).unwrap_or(0.0);

    let (handle, mut events_rx, engine_task) = spawn_engine(engine, &config.runtime);
    let collector = tokio::spawn(async move {
        let mut events = Vec::new();
        while let Some(event) = events_rx.recv().await {
            events.push(event);
        }
        events
    });

    let status_path = args.output_dir.join("live_status.json");
    let mut status = LiveStatus::new();
    let mut next_status_ts = start_ts + STATUS_INTERVAL_SECS;
    let wall_start = Instant::now();

    for reading in session.readings {
        let ts = reading.timestamp;
        if args.realtime {
            let target = Duration::from_secs_f64((ts - start_ts).max(0.0));
            let elapsed = wall_start.elapsed();
            if target > elapsed {
                sleep(target - elapsed).await;
            }
        }

        for input in reading.into_inputs() {
            if args.realtime {
                // Live sensors drop when the engine lags
                handle.submit(input)?;
            } else {
                handle.send(input).await?;
            }
        }

        if ts >= next_status_ts {
            let snapshot = handle.snapshot().await?;
            write_status(&mut status, &snapshot, ts - start_ts, &wall_start, handle.dropped(), &status_path);
            while next_status_ts <= ts {
                next_status_ts += STATUS_INTERVAL_SECS;
            }
        }
    }

    let inputs_dropped = handle.dropped();
    drop(handle);
    let final_state = engine_task.await?;
    let events = collector.await?;
    let replay_seconds = wall_start.elapsed().as_secs_f64();

    write_status(&mut status, &final_state, session_secs, &wall_start, inputs_dropped, &status_path);

    let output = TrackOutput {
        session: args.session.display().to_string(),
        stats: Stats {
            readings: reading_count,
            events: events.len(),
            inputs_dropped,
            replay_seconds,
        },
        events,
        final_state: final_state.clone(),
    };
    let filename = args.output_dir.join(format!("track_{}.json", ts_now_clean()));
    let json = serde_json::to_string_pretty(&output)?;
    std::fs::write(&filename, json)?;
    println!("[{}] Saved {} events to {}", ts_now(), output.stats.events, filename.display());

    println!("\n=== Final Stats ===");
    println!("Readings replayed: {}", reading_count);
    println!("Wi-Fi scans: {}", final_state.scans_processed);
    println!(
        "Steps: {} accepted, {} rejected",
        final_state.steps_accepted, final_state.steps_rejected
    );
    println!("Floor changes: {}", final_state.floor_changes);
    println!(
        "Final position: ({:.6}, {:.6}) floor {} {}",
        final_state.position.lat,
        final_state.position.lng,
        final_state.floor,
        if final_state.is_indoors { "indoors" } else { "not indoors" }
    );
    if inputs_dropped > 0 {
        println!("Inputs dropped: {}", inputs_dropped);
    }

    Ok(())
}

fn write_status(
    status: &mut LiveStatus,
    snapshot: &EngineSnapshot,
    session_secs: f64,
    wall_start: &Instant,
    dropped: u64,
    path: &Path,
) {
    status.update_from(snapshot);
    status.timestamp = current_timestamp();
    status.session_time_secs = session_secs;
    status.uptime_seconds = wall_start.elapsed().as_secs();
    status.inputs_dropped = dropped;
    if let Err(e) = status.save(path) {
        log::warn!("Failed to write {}: {}", path.display(), e);
    }
}

fn ts_now() -> String {
    Utc::now().format("%H:%M:%S").to_string()
}

fn ts_now_clean() -> String {
    Utc::now().format("%Y%m%d_%H%M%S").to_string()
}
