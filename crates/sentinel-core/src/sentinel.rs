//! Operator-facing actions: enroll, start monitoring, feed input and
//! visibility events, report status.

use crate::alarm::{
    AlarmGate, AlertAudio, DisplaySurface, InputEvent, StatusLevel, ALERT_OVERLAY_DURATION,
};
use crate::kv::KeyValueStore;
use crate::matcher::MatcherSlot;
use crate::monitor::{
    DetectionEngine, EngineError, Monitor, StartError, StartOutcome, CYCLE_INTERVAL,
};
use crate::session::{MonitoringSession, SessionSnapshot};
use crate::store::{EnrollmentRepository, MaskState, StoreError};
use crate::types::DetectOptions;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EnrollError {
    #[error("exactly one face must be visible to enroll, found {0}")]
    FaceCount(usize),
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Tunables for a [`Sentinel`]. Defaults are the production values.
#[derive(Debug, Clone, Copy)]
pub struct SentinelOptions {
    pub detect: DetectOptions,
    pub cycle_interval: Duration,
    pub overlay_duration: Duration,
}

impl Default for SentinelOptions {
    fn default() -> Self {
        Self {
            detect: DetectOptions::default(),
            cycle_interval: CYCLE_INTERVAL,
            overlay_duration: ALERT_OVERLAY_DURATION,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EnrollOutcome {
    pub mask: MaskState,
    /// Samples now enrolled for `mask`.
    pub samples: usize,
    /// Samples enrolled across both mask states.
    pub total: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SentinelStatus {
    pub session: SessionSnapshot,
    pub no_mask_samples: usize,
    pub with_mask_samples: usize,
    pub matcher_ready: bool,
    pub alerts_fired: u64,
}

pub struct Sentinel<E> {
    engine: Arc<E>,
    detect: DetectOptions,
    repo: EnrollmentRepository,
    matcher: Arc<MatcherSlot>,
    session: Arc<MonitoringSession>,
    gate: Arc<AlarmGate>,
    monitor: Arc<Monitor<E>>,
    surface: Arc<dyn DisplaySurface>,
}

impl<E: DetectionEngine + 'static> Sentinel<E> {
    /// Load the enrollment store from `backend` and wire every component to
    /// one shared session.
    pub fn new(
        engine: E,
        backend: Box<dyn KeyValueStore>,
        audio: Arc<dyn AlertAudio>,
        surface: Arc<dyn DisplaySurface>,
        options: SentinelOptions,
    ) -> Self {
        let engine = Arc::new(engine);
        let matcher = Arc::new(MatcherSlot::new());
        // Rebuilds run under the repository lock, in commit order.
        let repo = EnrollmentRepository::open(backend).with_observer({
            let matcher = matcher.clone();
            move |store| matcher.rebuild(store)
        });
        // `current` only fails on a poisoned lock, impossible before first use.
        if let Ok(store) = repo.current() {
            matcher.rebuild(&store);
        }

        let session = Arc::new(MonitoringSession::new());
        let gate = Arc::new(
            AlarmGate::new(session.clone(), audio, surface.clone())
                .with_overlay_duration(options.overlay_duration),
        );
        let monitor = Arc::new(
            Monitor::new(
                engine.clone(),
                options.detect,
                session.clone(),
                matcher.clone(),
                gate.clone(),
                surface.clone(),
            )
            .with_interval(options.cycle_interval),
        );

        let status = if matcher.is_ready() {
            "Ready: start monitoring when you leave"
        } else {
            "No face enrolled yet"
        };
        surface.set_status(StatusLevel::Info, status);

        Self {
            engine,
            detect: options.detect,
            repo,
            matcher,
            session,
            gate,
            monitor,
            surface,
        }
    }

    /// Enroll the single face currently in view under `mask`.
    ///
    /// Zero or several faces are refused with no state change.
    pub async fn enroll(&self, mask: MaskState) -> Result<EnrollOutcome, EnrollError> {
        let detections = match self.engine.detect(self.detect).await {
            Ok(detections) => detections,
            Err(e) => {
                tracing::warn!(error = %e, %mask, "enrollment capture failed");
                self.surface
                    .set_status(StatusLevel::Error, &format!("Camera unavailable: {e}"));
                return Err(e.into());
            }
        };

        let detection = match <[_; 1]>::try_from(detections) {
            Ok([detection]) => detection,
            Err(detections) => {
                let found = detections.len();
                tracing::info!(found, %mask, "enrollment refused");
                self.surface.set_status(
                    StatusLevel::Warning,
                    &format!("Exactly one face must be visible to enroll (found {found})"),
                );
                return Err(EnrollError::FaceCount(found));
            }
        };

        let store = match self.repo.append(mask, detection.embedding) {
            Ok(store) => store,
            Err(e) => {
                tracing::error!(error = %e, %mask, "enrollment could not be saved");
                self.surface
                    .set_status(StatusLevel::Error, &format!("Enrollment not saved: {e}"));
                return Err(e.into());
            }
        };

        let outcome = EnrollOutcome {
            mask,
            samples: store.samples(mask).len(),
            total: store.len(),
        };
        self.surface.set_status(
            StatusLevel::Ok,
            &format!("Enrolled ({mask}): {} sample(s)", outcome.samples),
        );
        Ok(outcome)
    }

    pub fn start_monitoring(&self) -> Result<StartOutcome, StartError> {
        self.monitor.start()
    }

    /// Input from the host. Returns whether the alert fired.
    pub fn on_input_event(&self, event: InputEvent) -> bool {
        self.gate.on_input_event(event)
    }

    pub fn on_visibility_change(&self, visible: bool) {
        self.gate.on_visibility_change(visible);
    }

    /// Forget every enrolled sample. A running loop keeps running and, with
    /// no matcher, judges every face as not the owner.
    pub fn clear_enrollments(&self) -> Result<(), StoreError> {
        self.repo.clear()?;
        self.surface.set_status(StatusLevel::Info, "Enrollments cleared");
        Ok(())
    }

    pub fn status(&self) -> SentinelStatus {
        let (no_mask_samples, with_mask_samples) = self
            .repo
            .current()
            .map(|s| (s.no_mask.len(), s.with_mask.len()))
            .unwrap_or_default();
        SentinelStatus {
            session: self.session.snapshot(),
            no_mask_samples,
            with_mask_samples,
            matcher_ready: self.matcher.is_ready(),
            alerts_fired: self.gate.alerts_fired(),
        }
    }

    pub fn session(&self) -> &Arc<MonitoringSession> {
        &self.session
    }
}
