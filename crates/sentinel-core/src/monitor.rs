//! Monitoring loop.
//!
//! `Stopped -> Running` on start, with no way back. While running, each cycle
//! awaits one detection call, classifies the frame, redraws the overlay and
//! then sleeps [`CYCLE_INTERVAL`] before the next cycle, so cycles never
//! overlap.

use crate::alarm::{AlarmGate, DisplaySurface, StatusLevel};
use crate::matcher::MatcherSlot;
use crate::presence::{PresenceClassifier, PresenceVerdict};
use crate::session::MonitoringSession;
use crate::types::{DetectOptions, Detection};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Delay between the end of one cycle and the start of the next (~20 Hz).
pub const CYCLE_INTERVAL: Duration = Duration::from_millis(50);

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    #[error("recognition engine is still loading")]
    NotReady,
    #[error("camera or recognition engine unavailable: {0}")]
    Unavailable(String),
    #[error("detection failed: {0}")]
    Failed(String),
    #[error("engine thread exited")]
    ChannelClosed,
}

/// Face detection + embedding engine for the current camera frame.
pub trait DetectionEngine: Send + Sync {
    fn detect(
        &self,
        options: DetectOptions,
    ) -> impl Future<Output = Result<Vec<Detection>, EngineError>> + Send;
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum StartError {
    #[error("no face enrolled; enroll before starting monitoring")]
    NoEnrollment,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    Started { audio_unlocked: bool },
    AlreadyRunning,
}

pub struct Monitor<E> {
    engine: Arc<E>,
    options: DetectOptions,
    interval: Duration,
    session: Arc<MonitoringSession>,
    classifier: PresenceClassifier,
    matcher: Arc<MatcherSlot>,
    gate: Arc<AlarmGate>,
    surface: Arc<dyn DisplaySurface>,
}

impl<E: DetectionEngine + 'static> Monitor<E> {
    pub fn new(
        engine: Arc<E>,
        options: DetectOptions,
        session: Arc<MonitoringSession>,
        matcher: Arc<MatcherSlot>,
        gate: Arc<AlarmGate>,
        surface: Arc<dyn DisplaySurface>,
    ) -> Self {
        Self {
            engine,
            options,
            interval: CYCLE_INTERVAL,
            classifier: PresenceClassifier::new(session.clone()),
            session,
            matcher,
            gate,
            surface,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Arm the alarm and spawn the loop.
    ///
    /// Refused while nothing is enrolled. Starting twice is harmless: the
    /// second call neither spawns another loop nor re-registers input.
    pub fn start(self: &Arc<Self>) -> Result<StartOutcome, StartError> {
        if !self.matcher.is_ready() {
            tracing::info!("monitoring start refused: no enrollment");
            self.surface.set_status(
                StatusLevel::Warning,
                "Enroll your face before starting monitoring",
            );
            return Err(StartError::NoEnrollment);
        }

        if !self.session.activate() {
            tracing::debug!("monitoring already running");
            return Ok(StartOutcome::AlreadyRunning);
        }

        // Unlock happens inside the start action itself, before anything is awaited.
        let audio_unlocked = self.gate.unlock_audio().is_ok();
        self.gate.arm();
        if audio_unlocked {
            self.surface.set_status(StatusLevel::Ok, "Monitoring active");
        }

        let monitor = Arc::clone(self);
        tokio::spawn(async move { monitor.run().await });

        tracing::info!(
            interval_ms = self.interval.as_millis() as u64,
            audio_unlocked,
            "monitoring started"
        );
        Ok(StartOutcome::Started { audio_unlocked })
    }

    /// Repeat cycles forever. There is no stop transition.
    async fn run(&self) {
        loop {
            self.run_cycle().await;
            tokio::time::sleep(self.interval).await;
        }
    }

    /// One detect → classify → draw step.
    ///
    /// An engine failure counts as a frame with no faces, so a dead camera
    /// drifts towards the absent verdict rather than masking intrusions.
    pub async fn run_cycle(&self) -> PresenceVerdict {
        let detections = match self.engine.detect(self.options).await {
            Ok(detections) => detections,
            Err(e) => {
                tracing::warn!(error = %e, "detection cycle failed; treating frame as empty");
                Vec::new()
            }
        };

        let matcher = self.matcher.get();
        let verdict = self.classifier.classify(&detections, matcher.as_deref());
        self.surface.draw_overlay(&verdict.annotations);

        tracing::trace!(
            faces = verdict.faces,
            owner_absent = verdict.owner_absent,
            "cycle complete"
        );
        verdict
    }
}
