// runtime.rs — Single-writer async wrapper around `PositioningEngine`
//
// Every producer (Wi-Fi, accelerometer, orientation, barometer, control)
// submits into one bounded queue. One task owns the engine and drains the
// queue in order, so a Wi-Fi update and a step update can never interleave
// on the displayed position. Producers drop samples rather than wait when
// the queue is full; each sample is superseded by the next anyway.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::config::RuntimeConfig;
use crate::engine::{EngineSnapshot, PositioningEngine};
use crate::error::{PositioningError, Result};
use crate::fingerprint::{EstimationStrategy, RadioMap};
use crate::fusion::PositionEvent;
use crate::types::{AccelData, BaroData, LiveScan, OrientationData};

/// One unit of work for the engine task.
#[derive(Debug)]
pub enum SensorInput {
    Scan(LiveScan),
    Accel(AccelData),
    GameRotation(OrientationData),
    Rotation(OrientationData),
    Pressure(BaroData),
    ReplaceRadioMap(RadioMap),
    SetStepThresholds { min_freq: f64, max_freq: f64, max_top: f64 },
    SetKnn { knn_number: usize, max_distance: f64, algorithm: EstimationStrategy },
    /// Reply with a snapshot taken between two queued inputs.
    Snapshot(oneshot::Sender<EngineSnapshot>),
}

impl SensorInput {
    fn kind(&self) -> &'static str {
        match self {
            Self::Scan(_) => "scan",
            Self::Accel(_) => "accel",
            Self::GameRotation(_) => "game_rotation",
            Self::Rotation(_) => "rotation",
            Self::Pressure(_) => "pressure",
            Self::ReplaceRadioMap(_) => "radio_map",
            Self::SetStepThresholds { .. } => "step_thresholds",
            Self::SetKnn { .. } => "knn",
            Self::Snapshot(_) => "snapshot",
        }
    }
}

impl PositioningEngine {
    /// Route one queued input to its `feed_*` method.
    pub fn apply(&mut self, input: SensorInput) -> Vec<PositionEvent> {
        let events = match input {
            SensorInput::Scan(scan) => self.feed_scan(&scan),
            SensorInput::Accel(a) => self.feed_accel(&a),
            SensorInput::GameRotation(o) => self.feed_game_rotation(&o),
            SensorInput::Rotation(o) => self.feed_rotation(&o),
            SensorInput::Pressure(b) => self.feed_pressure(&b),
            SensorInput::ReplaceRadioMap(map) => {
                self.set_radio_map(map);
                Vec::new()
            }
            SensorInput::SetStepThresholds { min_freq, max_freq, max_top } => {
                if let Err(e) = self.set_step_thresholds(min_freq, max_freq, max_top) {
                    log::warn!("Ignoring step thresholds: {}", e);
                }
                Vec::new()
            }
            SensorInput::SetKnn { knn_number, max_distance, algorithm } => {
                if let Err(e) = self.set_knn(knn_number, max_distance, algorithm) {
                    log::warn!("Ignoring KNN settings: {}", e);
                }
                Vec::new()
            }
            SensorInput::Snapshot(reply) => {
                let _ = reply.send(self.snapshot());
                Vec::new()
            }
        };
        self.count_emitted(events)
    }
}

/// Cloneable producer side of the engine queue.
#[derive(Clone)]
pub struct EngineHandle {
    tx: mpsc::Sender<SensorInput>,
    dropped: Arc<AtomicU64>,
}

impl EngineHandle {
    /// Queue without waiting. Returns `Ok(false)` when the input was dropped
    /// because the queue is full.
    pub fn submit(&self, input: SensorInput) -> Result<bool> {
        match self.tx.try_send(input) {
            Ok(()) => Ok(true),
            Err(TrySendError::Full(input)) => {
                let n = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                if n % 100 == 1 {
                    log::warn!("Engine queue full, dropped {} input ({} total)", input.kind(), n);
                }
                Ok(false)
            }
            Err(TrySendError::Closed(_)) => Err(PositioningError::EngineStopped),
        }
    }

    /// Queue, waiting for room. For control messages and replay that must not drop.
    pub async fn send(&self, input: SensorInput) -> Result<()> {
        self.tx
            .send(input)
            .await
            .map_err(|_| PositioningError::EngineStopped)
    }

    /// Snapshot of the engine after every input queued so far.
    pub async fn snapshot(&self) -> Result<EngineSnapshot> {
        let (reply, rx) = oneshot::channel();
        self.send(SensorInput::Snapshot(reply)).await?;
        rx.await.map_err(|_| PositioningError::EngineStopped)
    }

    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

/// Spawn the engine task on the current tokio runtime.
///
/// The task ends when every `EngineHandle` has been dropped and the queue is
/// drained; its join handle yields the final snapshot. Events that the
/// consumer is too slow to take are dropped.
pub fn spawn_engine(
    mut engine: PositioningEngine,
    config: &RuntimeConfig,
) -> (EngineHandle, mpsc::Receiver<PositionEvent>, JoinHandle<EngineSnapshot>) {
    let (tx, mut rx) = mpsc::channel::<SensorInput>(config.queue_capacity.max(1));
    let (event_tx, event_rx) = mpsc::channel::<PositionEvent>(config.event_capacity.max(1));

    let task = tokio::spawn(async move {
        let mut events_dropped = 0u64;
        while let Some(input) = rx.recv().await {
            for event in engine.apply(input) {
                match event_tx.try_send(event) {
                    Ok(()) => {}
                    Err(TrySendError::Full(_)) => events_dropped += 1,
                    // Nobody listening; keep tracking anyway
                    Err(TrySendError::Closed(_)) => {}
                }
            }
        }
        if events_dropped > 0 {
            log::warn!("{} position events dropped by a slow consumer", events_dropped);
        }
        log::info!("Engine task stopped");
        engine.snapshot()
    });

    let handle = EngineHandle {
        tx,
        dropped: Arc::new(AtomicU64::new(0)),
    };
    (handle, event_rx, task)
}
