//! sentinel-core: Presence verification and intrusion alarm.
//!
//! Keeps the owner's face enrollments, matches detected faces against them,
//! derives an owner-absent verdict every detection cycle, and raises the
//! alert when input arrives while the owner is away.

pub mod alarm;
pub mod kv;
pub mod matcher;
pub mod monitor;
pub mod presence;
pub mod sentinel;
pub mod session;
pub mod store;
pub mod types;

#[cfg(test)]
mod testing;

pub use alarm::{AlarmGate, AlertAudio, AudioError, DisplaySurface, InputEvent, StatusLevel};
pub use kv::{KeyValueStore, KvError, MemoryStore, SqliteStore};
pub use matcher::{BestMatch, EuclideanMatcher, FaceMatcher, MATCH_THRESHOLD};
pub use monitor::{DetectionEngine, EngineError, StartError, StartOutcome};
pub use presence::{Annotation, PresenceVerdict};
pub use sentinel::{EnrollError, EnrollOutcome, Sentinel, SentinelOptions, SentinelStatus};
pub use session::{MonitoringSession, SessionSnapshot};
pub use store::{EnrollmentStore, MaskState};
pub use types::{BoundingBox, DetectOptions, Detection, Embedding, EMBEDDING_DIM};
