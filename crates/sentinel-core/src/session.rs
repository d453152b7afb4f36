//! Shared monitoring session state.
//!
//! One instance is shared (`Arc`) between the monitoring loop, which writes
//! the verdict, and the input handler, which only reads it. Every field is an
//! atomic so the input path never waits on an in-flight detection cycle.

use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

#[derive(Debug)]
pub struct MonitoringSession {
    active: AtomicBool,
    consecutive_no_face_frames: AtomicU32,
    owner_absent: AtomicBool,
    tab_visible: AtomicBool,
}

/// Point-in-time copy of the session, for status reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SessionSnapshot {
    pub active: bool,
    pub consecutive_no_face_frames: u32,
    pub owner_absent: bool,
    pub tab_visible: bool,
}

impl Default for MonitoringSession {
    fn default() -> Self {
        Self::new()
    }
}

impl MonitoringSession {
    /// Inactive session: no verdict yet, surface visible.
    pub fn new() -> Self {
        Self {
            active: AtomicBool::new(false),
            consecutive_no_face_frames: AtomicU32::new(0),
            owner_absent: AtomicBool::new(false),
            tab_visible: AtomicBool::new(true),
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// Flip `active` on. Returns `false` if it already was.
    pub fn activate(&self) -> bool {
        !self.active.swap(true, Ordering::SeqCst)
    }

    pub fn owner_absent(&self) -> bool {
        self.owner_absent.load(Ordering::SeqCst)
    }

    pub fn set_owner_absent(&self, absent: bool) {
        self.owner_absent.store(absent, Ordering::SeqCst);
    }

    pub fn tab_visible(&self) -> bool {
        self.tab_visible.load(Ordering::SeqCst)
    }

    pub fn set_tab_visible(&self, visible: bool) {
        self.tab_visible.store(visible, Ordering::SeqCst);
    }

    pub fn consecutive_no_face_frames(&self) -> u32 {
        self.consecutive_no_face_frames.load(Ordering::SeqCst)
    }

    /// Count one more empty frame; returns the new streak length.
    pub fn record_no_face(&self) -> u32 {
        self.consecutive_no_face_frames
            .fetch_add(1, Ordering::SeqCst)
            .saturating_add(1)
    }

    pub fn reset_no_face(&self) {
        self.consecutive_no_face_frames.store(0, Ordering::SeqCst);
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            active: self.is_active(),
            consecutive_no_face_frames: self.consecutive_no_face_frames(),
            owner_absent: self.owner_absent(),
            tab_visible: self.tab_visible(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_state() {
        let s = MonitoringSession::new();
        assert_eq!(
            s.snapshot(),
            SessionSnapshot {
                active: false,
                consecutive_no_face_frames: 0,
                owner_absent: false,
                tab_visible: true,
            }
        );
    }

    #[test]
    fn test_activate_only_once() {
        let s = MonitoringSession::new();
        assert!(s.activate());
        assert!(!s.activate());
        assert!(s.is_active());
    }

    #[test]
    fn test_no_face_streak() {
        let s = MonitoringSession::new();
        assert_eq!(s.record_no_face(), 1);
        assert_eq!(s.record_no_face(), 2);
        s.reset_no_face();
        assert_eq!(s.consecutive_no_face_frames(), 0);
    }
}
