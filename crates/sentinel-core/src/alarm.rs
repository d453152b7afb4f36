//! Alarm gate: decides whether an input event raises the intruder alert.
//!
//! An alert fires only while the owner is judged absent *and* the monitoring
//! surface is visible. Firing switches the status to the alarm message, shows
//! the alert overlay for [`ALERT_OVERLAY_DURATION`] and restarts the alert
//! sound from the beginning. Every qualifying event fires again; there is no
//! cooldown.

use crate::presence::Annotation;
use crate::session::MonitoringSession;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// How long the alert overlay stays up. Not cancelled if the owner returns.
pub const ALERT_OVERLAY_DURATION: Duration = Duration::from_secs(5);

pub const ALARM_STATUS: &str = "INTRUDER ALERT: input detected while the owner is away";

#[derive(Error, Debug)]
pub enum AudioError {
    #[error("alert sound not available: {0}")]
    Unavailable(String),
    #[error("playback blocked: {0}")]
    Blocked(String),
    #[error("playback failed: {0}")]
    Failed(String),
}

/// Alert sound playback.
pub trait AlertAudio: Send + Sync {
    /// One muted play/pause cycle, performed while handling the user's start
    /// action so later unprompted plays are permitted.
    fn prime(&self) -> Result<(), AudioError>;
    /// Rewind to the beginning and play.
    fn restart(&self) -> Result<(), AudioError>;
}

/// Severity of a status message, used by surfaces to style it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusLevel {
    Info,
    Ok,
    Warning,
    Alarm,
    Error,
}

/// The user-facing display: status text, alert overlay, detection overlay.
pub trait DisplaySurface: Send + Sync {
    fn set_status(&self, level: StatusLevel, text: &str);
    fn show_alert(&self);
    fn hide_alert(&self);
    fn draw_overlay(&self, annotations: &[Annotation]);
}

/// Raw user input delivered by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputEvent {
    Key,
    PointerMove,
    Click,
}

impl std::str::FromStr for InputEvent {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "key" | "keydown" => Ok(InputEvent::Key),
            "pointer" | "pointer_move" | "mousemove" => Ok(InputEvent::PointerMove),
            "click" => Ok(InputEvent::Click),
            other => Err(format!("unknown input event: {other}")),
        }
    }
}

pub struct AlarmGate {
    session: Arc<MonitoringSession>,
    audio: Arc<dyn AlertAudio>,
    surface: Arc<dyn DisplaySurface>,
    overlay_duration: Duration,
    armed: AtomicBool,
    alerts_fired: AtomicU64,
}

impl AlarmGate {
    pub fn new(
        session: Arc<MonitoringSession>,
        audio: Arc<dyn AlertAudio>,
        surface: Arc<dyn DisplaySurface>,
    ) -> Self {
        Self {
            session,
            audio,
            surface,
            overlay_duration: ALERT_OVERLAY_DURATION,
            armed: AtomicBool::new(false),
            alerts_fired: AtomicU64::new(0),
        }
    }

    /// Override the overlay window (tests use a few milliseconds).
    pub fn with_overlay_duration(mut self, duration: Duration) -> Self {
        self.overlay_duration = duration;
        self
    }

    /// Register the input handler. Only the first call registers; later calls
    /// return `false` so one physical event never fires twice.
    pub fn arm(&self) -> bool {
        let first = !self.armed.swap(true, Ordering::SeqCst);
        if first {
            tracing::info!("input handler registered");
        }
        first
    }

    pub fn is_armed(&self) -> bool {
        self.armed.load(Ordering::SeqCst)
    }

    pub fn alerts_fired(&self) -> u64 {
        self.alerts_fired.load(Ordering::SeqCst)
    }

    /// Run the muted unlock cycle. A failure is shown on the status line and
    /// returned as a value; it never stops monitoring from starting.
    pub fn unlock_audio(&self) -> Result<(), AudioError> {
        match self.audio.prime() {
            Ok(()) => {
                tracing::debug!("alert audio unlocked");
                Ok(())
            }
            Err(e) => {
                tracing::warn!(error = %e, "alert audio unlock failed; alerts will be silent");
                self.surface.set_status(
                    StatusLevel::Warning,
                    &format!("Monitoring without sound: {e}"),
                );
                Err(e)
            }
        }
    }

    /// Visibility-change notification from the host.
    pub fn on_visibility_change(&self, visible: bool) {
        self.session.set_tab_visible(visible);
        tracing::debug!(visible, "surface visibility changed");
    }

    /// Handle one input event. Returns whether the alert fired.
    ///
    /// Must be called from within a Tokio runtime: the overlay is hidden by a
    /// spawned timer.
    pub fn on_input_event(&self, event: InputEvent) -> bool {
        if !self.is_armed() {
            return false;
        }
        if !(self.session.owner_absent() && self.session.tab_visible()) {
            return false;
        }

        let count = self.alerts_fired.fetch_add(1, Ordering::SeqCst) + 1;
        tracing::warn!(?event, alerts = count, "unauthorized input while owner absent");

        self.surface.set_status(StatusLevel::Alarm, ALARM_STATUS);
        self.surface.show_alert();

        let surface = self.surface.clone();
        let duration = self.overlay_duration;
        tokio::spawn(async move {
            tokio::time::sleep(duration).await;
            surface.hide_alert();
        });

        if let Err(e) = self.audio.restart() {
            tracing::warn!(error = %e, "alert sound failed to play");
        }
        true
    }
}
