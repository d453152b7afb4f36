use crate::board::StatusBoard;
use crate::engine::EngineHandle;
use sentinel_core::{InputEvent, MaskState, Sentinel, StartOutcome};
use std::sync::Arc;
use zbus::interface;

pub const BUS_NAME: &str = "org.sentinel.Presence1";
pub const OBJECT_PATH: &str = "/org/sentinel/Presence1";

/// D-Bus interface for the Sentinel presence-alarm daemon.
///
/// Bus name: org.sentinel.Presence1 (session bus)
/// Object path: /org/sentinel/Presence1
pub struct SentinelService {
    sentinel: Arc<Sentinel<EngineHandle>>,
    board: Arc<StatusBoard>,
}

impl SentinelService {
    pub fn new(sentinel: Arc<Sentinel<EngineHandle>>, board: Arc<StatusBoard>) -> Self {
        Self { sentinel, board }
    }
}

#[interface(name = "org.sentinel.Presence1")]
impl SentinelService {
    /// Enroll the single face in view. `mask` is "no_mask" or "with_mask".
    /// Returns the number of samples now enrolled for that mask state.
    async fn enroll(&self, mask: &str) -> zbus::fdo::Result<u32> {
        let mask: MaskState = mask.parse().map_err(zbus::fdo::Error::InvalidArgs)?;
        tracing::info!(%mask, "enroll requested");

        let outcome = self
            .sentinel
            .enroll(mask)
            .await
            .map_err(|e| zbus::fdo::Error::Failed(e.to_string()))?;
        Ok(outcome.samples as u32)
    }

    /// Arm monitoring. Refused until at least one face is enrolled.
    async fn start_monitoring(&self) -> zbus::fdo::Result<String> {
        tracing::info!("start monitoring requested");
        match self.sentinel.start_monitoring() {
            Ok(StartOutcome::Started { audio_unlocked: true }) => Ok("started".into()),
            Ok(StartOutcome::Started { audio_unlocked: false }) => {
                Ok("started (alert sound unavailable)".into())
            }
            Ok(StartOutcome::AlreadyRunning) => Ok("already running".into()),
            Err(e) => Err(zbus::fdo::Error::Failed(e.to_string())),
        }
    }

    /// Deliver one user input event ("key", "pointer", "click").
    /// Returns whether it raised the alert.
    async fn input_event(&self, kind: &str) -> zbus::fdo::Result<bool> {
        let event: InputEvent = kind.parse().map_err(zbus::fdo::Error::InvalidArgs)?;
        Ok(self.sentinel.on_input_event(event))
    }

    /// Visibility of the monitoring surface changed.
    async fn visibility_changed(&self, visible: bool) {
        self.sentinel.on_visibility_change(visible);
    }

    /// Remove every enrolled sample.
    async fn clear_enrollments(&self) -> zbus::fdo::Result<()> {
        tracing::info!("clear enrollments requested");
        self.sentinel
            .clear_enrollments()
            .map_err(|e| zbus::fdo::Error::Failed(e.to_string()))
    }

    /// Return daemon status as JSON.
    async fn status(&self) -> zbus::fdo::Result<String> {
        Ok(serde_json::json!({
            "version": env!("CARGO_PKG_VERSION"),
            "sentinel": self.sentinel.status(),
            "display": self.board.snapshot(),
        })
        .to_string())
    }
}
