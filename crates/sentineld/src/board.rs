//! In-memory display surface published over D-Bus.
//!
//! A desktop front-end polls `Status()` and renders what is recorded here:
//! the status line, whether the alert overlay is up, and the boxes from the
//! latest detection cycle.

use sentinel_core::{Annotation, DisplaySurface, StatusLevel};
use serde::Serialize;
use std::sync::Mutex;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BoardState {
    pub status_level: StatusLevel,
    pub status_text: String,
    pub alert_visible: bool,
    pub overlay: Vec<Annotation>,
}

pub struct StatusBoard {
    state: Mutex<BoardState>,
}

impl Default for StatusBoard {
    fn default() -> Self {
        Self::new()
    }
}

impl StatusBoard {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(BoardState {
                status_level: StatusLevel::Info,
                status_text: String::new(),
                alert_visible: false,
                overlay: Vec::new(),
            }),
        }
    }

    pub fn snapshot(&self) -> BoardState {
        self.lock().clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BoardState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl DisplaySurface for StatusBoard {
    fn set_status(&self, level: StatusLevel, text: &str) {
        match level {
            StatusLevel::Alarm | StatusLevel::Error => tracing::warn!(?level, text, "status"),
            _ => tracing::info!(?level, text, "status"),
        }
        let mut state = self.lock();
        state.status_level = level;
        state.status_text = text.to_string();
    }

    fn show_alert(&self) {
        self.lock().alert_visible = true;
    }

    fn hide_alert(&self) {
        self.lock().alert_visible = false;
    }

    fn draw_overlay(&self, annotations: &[Annotation]) {
        self.lock().overlay = annotations.to_vec();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sentinel_core::BoundingBox;

    #[test]
    fn test_status_and_alert_visibility() {
        let board = StatusBoard::new();
        board.set_status(StatusLevel::Alarm, "intruder");
        board.show_alert();
        let state = board.snapshot();
        assert_eq!(state.status_level, StatusLevel::Alarm);
        assert_eq!(state.status_text, "intruder");
        assert!(state.alert_visible);

        board.hide_alert();
        assert!(!board.snapshot().alert_visible);
    }

    #[test]
    fn test_overlay_replaced_each_draw() {
        let board = StatusBoard::new();
        let annotation = Annotation {
            bbox: BoundingBox {
                x: 0.0,
                y: 0.0,
                width: 10.0,
                height: 10.0,
                confidence: 0.8,
            },
            label: "owner_no_mask".into(),
            distance: Some(0.31),
            owner: true,
        };
        board.draw_overlay(&[annotation.clone(), annotation]);
        assert_eq!(board.snapshot().overlay.len(), 2);
        board.draw_overlay(&[]);
        assert!(board.snapshot().overlay.is_empty());
    }

    #[test]
    fn test_snapshot_serializes() {
        let board = StatusBoard::new();
        board.set_status(StatusLevel::Ok, "Monitoring active");
        let json = serde_json::to_value(board.snapshot()).unwrap();
        assert_eq!(json["status_level"], "ok");
        assert_eq!(json["alert_visible"], false);
    }
}
