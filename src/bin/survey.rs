use anyhow::{bail, Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use env_logger::Env;
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::PathBuf;

use indoor_tracker_rs::fingerprint::{record_scan, FingerprintStore, JsonFileStore, RadioMap};
use indoor_tracker_rs::types::{AccessPointReading, Location};

#[derive(Parser, Debug)]
#[command(name = "survey")]
#[command(about = "Collect Wi-Fi fingerprints and maintain the fingerprint store", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Fingerprint store (created on first `add`)
    #[arg(long, global = true, default_value = "fingerprints.json")]
    store: PathBuf,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Record scans taken at a known location
    Add {
        #[command(flatten)]
        location: LocationArgs,

        /// JSON file holding one scan or a list of scans
        #[arg(long)]
        scans: PathBuf,

        /// Number of scans to record from the file (1, 3 or 5)
        #[arg(long, default_value_t = 1)]
        repeat: usize,
    },

    /// Remove a location and every sample taken there
    DeleteLocation {
        #[command(flatten)]
        location: LocationArgs,
    },

    /// Remove every sample in the store
    DeleteAll {
        /// Confirm deletion
        #[arg(long)]
        yes: bool,
    },

    /// Summarise the store per floor
    Stats,
}

#[derive(clap::Args, Debug)]
struct LocationArgs {
    #[arg(long)]
    floor: i64,
    #[arg(long)]
    room: String,
    #[arg(long, default_value = "")]
    building: String,
    #[arg(long, allow_hyphen_values = true)]
    lat: f64,
    #[arg(long, allow_hyphen_values = true)]
    lng: f64,
}

impl LocationArgs {
    fn to_location(&self) -> Location {
        Location::new(self.floor, &self.room, &self.building, self.lat, self.lng)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ScanFile {
    Many(Vec<Vec<AccessPointReading>>),
    One(Vec<AccessPointReading>),
}

impl ScanFile {
    fn into_scans(self) -> Vec<Vec<AccessPointReading>> {
        match self {
            ScanFile::Many(scans) => scans,
            ScanFile::One(scan) => vec![scan],
        }
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Add { location, scans, repeat } => {
            if ![1, 3, 5].contains(&repeat) {
                bail!("--repeat must be 1, 3 or 5");
            }
            let text = fs::read_to_string(&scans)
                .with_context(|| format!("reading scans from {}", scans.display()))?;
            let file: ScanFile = serde_json::from_str(&text)?;
            let all = file.into_scans();
            if all.len() < repeat {
                bail!("{} holds {} scans, {} requested", scans.display(), all.len(), repeat);
            }

            let mut store = JsonFileStore::open(&cli.store)?;
            let location = location.to_location();
            let now = Utc::now().timestamp();
            let mut written = 0;
            for (i, scan) in all.iter().take(repeat).enumerate() {
                written += record_scan(&mut store, &location, scan, now + i as i64)?;
            }
            println!(
                "[{}] Recorded {} samples from {} scans at {} (floor {})",
                ts_now(),
                written,
                repeat,
                location.room,
                location.floor
            );
        }
        Commands::DeleteLocation { location } => {
            let mut store = JsonFileStore::open(&cli.store)?;
            let location = location.to_location();
            let removed = store.delete_location(&location)?;
            if removed == 0 {
                bail!("no samples stored at {} (floor {})", location.room, location.floor);
            }
            println!("[{}] Removed {} samples at {}", ts_now(), removed, location.room);
        }
        Commands::DeleteAll { yes } => {
            if !yes {
                bail!("refusing to delete every sample without --yes");
            }
            let mut store = JsonFileStore::open(&cli.store)?;
            store.delete_all()?;
            println!("[{}] Store {} cleared", ts_now(), cli.store.display());
        }
        Commands::Stats => {
            let store = JsonFileStore::open(&cli.store)?;
            let samples = store.all_samples()?;
            let map = RadioMap::build(&samples);

            let mut per_floor: BTreeMap<i64, (usize, usize, BTreeSet<&str>)> = BTreeMap::new();
            for entry in map.iter() {
                let row = per_floor.entry(entry.location.floor).or_default();
                row.0 += 1;
                for signal in &entry.signals {
                    row.2.insert(signal.bssid.as_str());
                }
            }
            for sample in samples.iter().filter(|s| s.is_well_formed()) {
                if let Some(loc) = &sample.location {
                    per_floor.entry(loc.floor).or_default().1 += 1;
                }
            }

            println!("=== {} ===", cli.store.display());
            println!("Samples: {} ({} skipped)", samples.len(), map.skipped_samples());
            println!("{:>6} {:>10} {:>8} {:>5}", "floor", "locations", "samples", "APs");
            for (floor, (locations, count, aps)) in &per_floor {
                println!("{:>6} {:>10} {:>8} {:>5}", floor, locations, count, aps.len());
            }
        }
    }

    Ok(())
}

fn ts_now() -> String {
    Utc::now().format("%H:%M:%S").to_string()
}
