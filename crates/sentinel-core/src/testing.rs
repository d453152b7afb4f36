//! Scripted collaborators shared by the unit tests.

use crate::alarm::{AlertAudio, AudioError, DisplaySurface, StatusLevel};
use crate::monitor::{DetectionEngine, EngineError};
use crate::presence::Annotation;
use crate::types::{BoundingBox, DetectOptions, Detection, Embedding, EMBEDDING_DIM};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

/// Embedding at distance `offset` from the zero embedding.
pub fn embedding_at(offset: f32) -> Embedding {
    let mut values = vec![0.0; EMBEDDING_DIM];
    values[0] = offset;
    Embedding::new(values)
}

pub fn face_at(offset: f32) -> Detection {
    Detection {
        embedding: embedding_at(offset),
        bbox: BoundingBox {
            x: 40.0,
            y: 30.0,
            width: 160.0,
            height: 180.0,
            confidence: 0.95,
        },
    }
}

#[derive(Default)]
pub struct RecordingAudio {
    primes: AtomicUsize,
    restarts: AtomicUsize,
    fail_prime: AtomicBool,
    fail_restart: AtomicBool,
}

impl RecordingAudio {
    pub fn fail_prime(&self) {
        self.fail_prime.store(true, Ordering::SeqCst);
    }

    pub fn fail_restart(&self) {
        self.fail_restart.store(true, Ordering::SeqCst);
    }

    pub fn primes(&self) -> usize {
        self.primes.load(Ordering::SeqCst)
    }

    pub fn restarts(&self) -> usize {
        self.restarts.load(Ordering::SeqCst)
    }
}

impl AlertAudio for RecordingAudio {
    fn prime(&self) -> Result<(), AudioError> {
        self.primes.fetch_add(1, Ordering::SeqCst);
        if self.fail_prime.load(Ordering::SeqCst) {
            return Err(AudioError::Blocked("autoplay not permitted".into()));
        }
        Ok(())
    }

    fn restart(&self) -> Result<(), AudioError> {
        self.restarts.fetch_add(1, Ordering::SeqCst);
        if self.fail_restart.load(Ordering::SeqCst) {
            return Err(AudioError::Failed("device busy".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SurfaceCall {
    Status(StatusLevel, String),
    ShowAlert,
    HideAlert,
    Overlay(usize),
}

#[derive(Default)]
pub struct RecordingSurface {
    calls: Mutex<Vec<SurfaceCall>>,
}

impl RecordingSurface {
    pub fn calls(&self) -> Vec<SurfaceCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, call: &SurfaceCall) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| *c == call).count()
    }

    pub fn last_status(&self) -> Option<(StatusLevel, String)> {
        self.calls.lock().unwrap().iter().rev().find_map(|c| match c {
            SurfaceCall::Status(level, text) => Some((*level, text.clone())),
            _ => None,
        })
    }

    fn push(&self, call: SurfaceCall) {
        self.calls.lock().unwrap().push(call);
    }
}

impl DisplaySurface for RecordingSurface {
    fn set_status(&self, level: StatusLevel, text: &str) {
        self.push(SurfaceCall::Status(level, text.to_string()));
    }

    fn show_alert(&self) {
        self.push(SurfaceCall::ShowAlert);
    }

    fn hide_alert(&self) {
        self.push(SurfaceCall::HideAlert);
    }

    fn draw_overlay(&self, annotations: &[Annotation]) {
        self.push(SurfaceCall::Overlay(annotations.len()));
    }
}

/// Engine that replays queued frames, then reports empty frames forever.
#[derive(Default)]
pub struct ScriptedEngine {
    frames: Mutex<VecDeque<Result<Vec<Detection>, EngineError>>>,
    calls: AtomicUsize,
}

impl ScriptedEngine {
    pub fn push(&self, frame: Result<Vec<Detection>, EngineError>) {
        self.frames.lock().unwrap().push_back(frame);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl DetectionEngine for ScriptedEngine {
    async fn detect(&self, _options: DetectOptions) -> Result<Vec<Detection>, EngineError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.frames
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(Vec::new()))
    }
}
