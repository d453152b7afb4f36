//! Owner enrollment store.
//!
//! Holds the owner's embeddings split by mask state and persists the whole
//! structure as one JSON value under [`ENROLLMENT_KEY`]. Loading never fails:
//! anything missing or malformed becomes the empty store.

use crate::kv::{KeyValueStore, KvError};
use crate::types::{Embedding, EMBEDDING_DIM};
use serde::{Deserialize, Serialize};
use std::sync::Mutex;
use thiserror::Error;

/// Fixed key the enrollment record lives under.
pub const ENROLLMENT_KEY: &str = "owner_enrollments";

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("embedding has {actual} dimensions, expected {EMBEDDING_DIM}")]
    Dimension { actual: usize },
    #[error("failed to serialize enrollment record: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("persistence backend: {0}")]
    Backend(#[from] KvError),
    #[error("enrollment store lock poisoned")]
    Poisoned,
}

/// Enrollment variant: bare face or face with a covering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaskState {
    NoMask,
    WithMask,
}

impl MaskState {
    pub const ALL: [MaskState; 2] = [MaskState::NoMask, MaskState::WithMask];

    /// Stable matcher class label for this mask state.
    pub fn label(self) -> &'static str {
        match self {
            MaskState::NoMask => "owner_no_mask",
            MaskState::WithMask => "owner_mask",
        }
    }

    /// Inverse of [`label`](Self::label).
    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|m| m.label() == label)
    }
}

impl std::fmt::Display for MaskState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MaskState::NoMask => f.write_str("no mask"),
            MaskState::WithMask => f.write_str("with mask"),
        }
    }
}

impl std::str::FromStr for MaskState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "no_mask" | "nomask" | "none" => Ok(MaskState::NoMask),
            "with_mask" | "mask" => Ok(MaskState::WithMask),
            other => Err(format!("unknown mask state: {other}")),
        }
    }
}

/// All enrolled owner embeddings, keyed by mask state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EnrollmentStore {
    #[serde(default)]
    pub no_mask: Vec<Embedding>,
    #[serde(default)]
    pub with_mask: Vec<Embedding>,
}

impl EnrollmentStore {
    pub fn samples(&self, mask: MaskState) -> &[Embedding] {
        match mask {
            MaskState::NoMask => &self.no_mask,
            MaskState::WithMask => &self.with_mask,
        }
    }

    fn samples_mut(&mut self, mask: MaskState) -> &mut Vec<Embedding> {
        match mask {
            MaskState::NoMask => &mut self.no_mask,
            MaskState::WithMask => &mut self.with_mask,
        }
    }

    pub fn len(&self) -> usize {
        self.no_mask.len() + self.with_mask.len()
    }

    pub fn is_empty(&self) -> bool {
        self.no_mask.is_empty() && self.with_mask.is_empty()
    }

    /// Parse a persisted record. `None` for anything that is not a well-formed
    /// record of 128-dimensional embeddings.
    fn parse(raw: &str) -> Option<Self> {
        let store: EnrollmentStore = serde_json::from_str(raw).ok()?;
        let well_formed = store
            .no_mask
            .iter()
            .chain(store.with_mask.iter())
            .all(|e| e.dim() == EMBEDDING_DIM);
        well_formed.then_some(store)
    }
}

/// Called with the new store after every committed change.
pub type CommitObserver = Box<dyn Fn(&EnrollmentStore) + Send + Sync>;

/// Persistent enrollment store bound to a key-value backend.
///
/// Keeps the last successfully written store in memory so readers never touch
/// the backend. Every change is written, published to memory and handed to the
/// observer under one lock, so concurrent writers are observed in commit order.
pub struct EnrollmentRepository {
    backend: Box<dyn KeyValueStore>,
    current: Mutex<EnrollmentStore>,
    observer: Option<CommitObserver>,
}

impl EnrollmentRepository {
    /// Bind to `backend` and load whatever is persisted there.
    pub fn open(backend: Box<dyn KeyValueStore>) -> Self {
        let current = load_from(backend.as_ref());
        tracing::info!(
            no_mask = current.no_mask.len(),
            with_mask = current.with_mask.len(),
            "enrollment store loaded"
        );
        Self {
            backend,
            current: Mutex::new(current),
            observer: None,
        }
    }

    /// Register the observer notified after each append, save and clear.
    pub fn with_observer(
        mut self,
        observer: impl Fn(&EnrollmentStore) + Send + Sync + 'static,
    ) -> Self {
        self.observer = Some(Box::new(observer));
        self
    }

    /// Re-read the persisted record. Missing or malformed data yields the empty store.
    pub fn load(&self) -> EnrollmentStore {
        load_from(self.backend.as_ref())
    }

    /// Snapshot of the in-memory store.
    pub fn current(&self) -> Result<EnrollmentStore, StoreError> {
        let current = self.current.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(current.clone())
    }

    /// Append one embedding to the `mask` sub-sequence and persist before returning.
    ///
    /// No deduplication: enrolling the same face again adds another sample.
    pub fn append(&self, mask: MaskState, embedding: Embedding) -> Result<EnrollmentStore, StoreError> {
        if embedding.dim() != EMBEDDING_DIM {
            return Err(StoreError::Dimension {
                actual: embedding.dim(),
            });
        }

        let mut current = self.current.lock().map_err(|_| StoreError::Poisoned)?;
        let mut next = current.clone();
        next.samples_mut(mask).push(embedding);
        self.commit(&mut current, next.clone())?;

        tracing::info!(
            %mask,
            samples = next.samples(mask).len(),
            "enrollment appended"
        );
        Ok(next)
    }

    /// Replace the whole store and write it as one value.
    pub fn save(&self, store: &EnrollmentStore) -> Result<(), StoreError> {
        let mut current = self.current.lock().map_err(|_| StoreError::Poisoned)?;
        self.commit(&mut current, store.clone())
    }

    /// Drop every enrollment, persisted and in memory.
    pub fn clear(&self) -> Result<EnrollmentStore, StoreError> {
        let mut current = self.current.lock().map_err(|_| StoreError::Poisoned)?;
        let empty = EnrollmentStore::default();
        self.commit(&mut current, empty.clone())?;
        tracing::info!("enrollment store cleared");
        Ok(empty)
    }

    /// Persist `next`, then publish it. Memory and observer are untouched when
    /// the write fails. Caller holds the `current` lock.
    fn commit(
        &self,
        current: &mut EnrollmentStore,
        next: EnrollmentStore,
    ) -> Result<(), StoreError> {
        let raw = serde_json::to_string(&next)?;
        self.backend.set(ENROLLMENT_KEY, &raw)?;
        *current = next;
        if let Some(observer) = &self.observer {
            observer(&*current);
        }
        Ok(())
    }
}

fn load_from(backend: &dyn KeyValueStore) -> EnrollmentStore {
    let raw = match backend.get(ENROLLMENT_KEY) {
        Ok(Some(raw)) => raw,
        Ok(None) => return EnrollmentStore::default(),
        Err(e) => {
            tracing::warn!(error = %e, "enrollment record unreadable; starting empty");
            return EnrollmentStore::default();
        }
    };

    EnrollmentStore::parse(&raw).unwrap_or_else(|| {
        tracing::warn!(bytes = raw.len(), "enrollment record malformed; starting empty");
        EnrollmentStore::default()
    })
}
