//! Nearest-label owner matcher.
//!
//! Compiles the enrollment store into one labeled class per non-empty mask
//! state and answers "which enrolled sample is closest to this face".

use crate::store::{EnrollmentStore, MaskState};
use crate::types::Embedding;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

/// Global distance tolerance shared by both mask states.
pub const MATCH_THRESHOLD: f32 = 0.58;

/// Label reported when no enrolled sample is within the threshold.
pub const UNKNOWN_LABEL: &str = "unknown";

/// Result of matching one probe against all enrolled classes.
#[derive(Debug, Clone, PartialEq)]
pub struct BestMatch {
    pub label: String,
    pub distance: f32,
}

impl BestMatch {
    pub fn is_unknown(&self) -> bool {
        self.label == UNKNOWN_LABEL
    }
}

/// Strategy for mapping a probe embedding to the nearest enrolled label.
pub trait FaceMatcher: Send + Sync {
    fn find_best_match(&self, probe: &Embedding) -> BestMatch;
}

/// One class of the derived, read-only class set.
#[derive(Debug, Clone, PartialEq)]
pub struct LabeledClass {
    pub label: &'static str,
    pub embeddings: Vec<Embedding>,
}

/// Read-only view over the enrollment store: one class per non-empty mask state.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LabeledClassSet {
    pub classes: Vec<LabeledClass>,
}

impl LabeledClassSet {
    pub fn from_store(store: &EnrollmentStore) -> Self {
        let classes = MaskState::ALL
            .into_iter()
            .filter(|mask| !store.samples(*mask).is_empty())
            .map(|mask| LabeledClass {
                label: mask.label(),
                embeddings: store.samples(mask).to_vec(),
            })
            .collect();
        Self { classes }
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    pub fn labels(&self) -> Vec<&'static str> {
        self.classes.iter().map(|c| c.label).collect()
    }
}

/// Euclidean nearest-sample matcher with a fixed distance threshold.
#[derive(Debug, Clone)]
pub struct EuclideanMatcher {
    classes: LabeledClassSet,
    threshold: f32,
}

impl EuclideanMatcher {
    /// Compile `store` into a matcher. `None` when nothing is enrolled.
    pub fn build(store: &EnrollmentStore) -> Option<Self> {
        let classes = LabeledClassSet::from_store(store);
        if classes.is_empty() {
            return None;
        }
        tracing::debug!(
            classes = ?classes.labels(),
            samples = store.len(),
            threshold = MATCH_THRESHOLD,
            "matcher built"
        );
        Some(Self {
            classes,
            threshold: MATCH_THRESHOLD,
        })
    }

    pub fn classes(&self) -> &LabeledClassSet {
        &self.classes
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }
}

impl FaceMatcher for EuclideanMatcher {
    fn find_best_match(&self, probe: &Embedding) -> BestMatch {
        let mut best_distance = f32::INFINITY;
        let mut best_label: Option<&'static str> = None;

        for class in &self.classes.classes {
            for sample in &class.embeddings {
                let distance = probe.euclidean_distance(sample);
                if distance < best_distance {
                    best_distance = distance;
                    best_label = Some(class.label);
                }
            }
        }

        match best_label {
            Some(label) if best_distance <= self.threshold => BestMatch {
                label: label.to_string(),
                distance: best_distance,
            },
            _ => BestMatch {
                label: UNKNOWN_LABEL.to_string(),
                distance: best_distance,
            },
        }
    }
}

/// Holder for the current matcher, replaced wholesale on every rebuild.
#[derive(Default)]
pub struct MatcherSlot {
    current: RwLock<Option<Arc<dyn FaceMatcher>>>,
    generation: AtomicU64,
}

impl MatcherSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild from `store`, replacing any previous matcher.
    pub fn rebuild(&self, store: &EnrollmentStore) {
        let next = EuclideanMatcher::build(store).map(|m| Arc::new(m) as Arc<dyn FaceMatcher>);
        self.replace(next);
    }

    pub fn replace(&self, matcher: Option<Arc<dyn FaceMatcher>>) {
        let mut current = self.current.write().unwrap_or_else(|e| e.into_inner());
        *current = matcher;
        self.generation.fetch_add(1, Ordering::SeqCst);
    }

    pub fn get(&self) -> Option<Arc<dyn FaceMatcher>> {
        self.current
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn is_ready(&self) -> bool {
        self.get().is_some()
    }

    /// Number of times the matcher has been replaced.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::EMBEDDING_DIM;

    /// Embedding that is all zeros except `offset` in the first component,
    /// so its distance to the zero embedding is exactly `offset`.
    fn at(offset: f32) -> Embedding {
        let mut values = vec![0.0; EMBEDDING_DIM];
        values[0] = offset;
        Embedding::new(values)
    }

    #[test]
    fn test_build_empty_store_is_none() {
        assert!(EuclideanMatcher::build(&EnrollmentStore::default()).is_none());
    }

    #[test]
    fn test_build_one_class_per_non_empty_mask_state() {
        let store = EnrollmentStore {
            no_mask: vec![at(0.0)],
            with_mask: vec![],
        };
        let matcher = EuclideanMatcher::build(&store).unwrap();
        assert_eq!(matcher.classes().labels(), vec!["owner_no_mask"]);

        let both = EnrollmentStore {
            no_mask: vec![at(0.0), at(0.1)],
            with_mask: vec![at(2.0)],
        };
        let matcher = EuclideanMatcher::build(&both).unwrap();
        assert_eq!(matcher.classes().labels(), vec!["owner_no_mask", "owner_mask"]);
        assert_eq!(matcher.classes().classes[0].embeddings.len(), 2);
        assert_eq!(matcher.threshold(), MATCH_THRESHOLD);
    }

    #[test]
    fn test_best_match_scans_every_class() {
        // Closest sample lives in the second class.
        let store = EnrollmentStore {
            no_mask: vec![at(5.0), at(3.0)],
            with_mask: vec![at(0.2)],
        };
        let matcher = EuclideanMatcher::build(&store).unwrap();
        let result = matcher.find_best_match(&at(0.0));
        assert_eq!(result.label, "owner_mask");
        assert!((result.distance - 0.2).abs() < 1e-6);
    }

    #[test]
    fn test_best_match_beyond_threshold_is_unknown() {
        let store = EnrollmentStore {
            no_mask: vec![at(0.9)],
            with_mask: vec![],
        };
        let matcher = EuclideanMatcher::build(&store).unwrap();
        let result = matcher.find_best_match(&at(0.0));
        assert!(result.is_unknown());
        assert!((result.distance - 0.9).abs() < 1e-6);
    }

    #[test]
    fn test_slot_rebuild_replaces_matcher() {
        let slot = MatcherSlot::new();
        assert!(!slot.is_ready());

        slot.rebuild(&EnrollmentStore {
            no_mask: vec![at(0.0)],
            with_mask: vec![],
        });
        assert!(slot.is_ready());
        assert_eq!(slot.generation(), 1);

        slot.rebuild(&EnrollmentStore::default());
        assert!(!slot.is_ready());
        assert_eq!(slot.generation(), 2);
    }

    #[test]
    fn test_best_match_within_threshold() {
        let store = EnrollmentStore {
            no_mask: vec![at(0.3)],
            with_mask: vec![],
        };
        let matcher = EuclideanMatcher::build(&store).unwrap();
        let result = matcher.find_best_match(&at(0.0));
        assert_eq!(result.label, "owner_no_mask");
        assert!(!result.is_unknown());
    }
}
