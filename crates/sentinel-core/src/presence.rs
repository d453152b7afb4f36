//! Per-cycle owner presence classification.
//!
//! Turns the detections of one frame plus the current matcher into the
//! owner-absence verdict stored on the session. Any frame with faces decides
//! the verdict on its own; empty frames only advance a streak counter, and a
//! streak of [`NO_FACE_FRAME_LIMIT`] forces the owner absent.

use crate::matcher::{FaceMatcher, MATCH_THRESHOLD, UNKNOWN_LABEL};
use crate::session::MonitoringSession;
use crate::store::MaskState;
use crate::types::{BoundingBox, Detection};
use serde::Serialize;
use std::sync::Arc;

/// Consecutive empty frames after which the owner is forced absent
/// (about half a second at the monitoring cadence).
pub const NO_FACE_FRAME_LIMIT: u32 = 10;

/// One face as it should be drawn on the overlay.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Annotation {
    pub bbox: BoundingBox,
    pub label: String,
    /// `None` when no matcher was available for this frame.
    pub distance: Option<f32>,
    pub owner: bool,
}

/// Outcome of one classification cycle.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PresenceVerdict {
    pub faces: usize,
    pub owner_present: bool,
    /// A face matched some class that is neither an owner class nor `unknown`.
    pub intruder_detected: bool,
    pub owner_absent: bool,
    pub annotations: Vec<Annotation>,
}

pub struct PresenceClassifier {
    session: Arc<MonitoringSession>,
}

impl PresenceClassifier {
    pub fn new(session: Arc<MonitoringSession>) -> Self {
        Self { session }
    }

    /// Classify one frame and publish the verdict on the session.
    pub fn classify(
        &self,
        detections: &[Detection],
        matcher: Option<&dyn FaceMatcher>,
    ) -> PresenceVerdict {
        let mut owner_present = false;
        let mut intruder_detected = false;
        let mut annotations = Vec::with_capacity(detections.len());

        if detections.is_empty() {
            self.session.record_no_face();
        } else {
            // A present face, matched or not, always breaks the empty streak.
            self.session.reset_no_face();

            for detection in detections {
                let Some(matcher) = matcher else {
                    annotations.push(Annotation {
                        bbox: detection.bbox,
                        label: UNKNOWN_LABEL.to_string(),
                        distance: None,
                        owner: false,
                    });
                    continue;
                };

                let best = matcher.find_best_match(&detection.embedding);
                let is_owner_label = MaskState::from_label(&best.label).is_some();
                let owner = is_owner_label && best.distance < MATCH_THRESHOLD;

                if owner {
                    owner_present = true;
                }
                if !best.is_unknown() && !is_owner_label {
                    intruder_detected = true;
                }

                annotations.push(Annotation {
                    bbox: detection.bbox,
                    label: best.label,
                    distance: Some(best.distance),
                    owner,
                });
            }
        }

        let streak = self.session.consecutive_no_face_frames();
        let was_absent = self.session.owner_absent();
        let owner_absent = if streak >= NO_FACE_FRAME_LIMIT {
            true
        } else if detections.is_empty() {
            // Short gaps in detection keep the previous verdict.
            was_absent
        } else {
            !owner_present
        };
        self.session.set_owner_absent(owner_absent);

        if was_absent != owner_absent {
            tracing::info!(owner_absent, faces = detections.len(), streak, "presence verdict changed");
        }
        if intruder_detected {
            tracing::warn!(faces = detections.len(), "non-owner class matched");
        }

        PresenceVerdict {
            faces: detections.len(),
            owner_present,
            intruder_detected,
            owner_absent,
            annotations,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matcher::BestMatch;
    use crate::types::{Embedding, EMBEDDING_DIM};

    /// Matcher that answers every probe with the same scripted result.
    struct Fixed(&'static str, f32);

    impl FaceMatcher for Fixed {
        fn find_best_match(&self, _probe: &Embedding) -> BestMatch {
            BestMatch {
                label: self.0.to_string(),
                distance: self.1,
            }
        }
    }

    fn face() -> Detection {
        Detection {
            embedding: Embedding::new(vec![0.0; EMBEDDING_DIM]),
            bbox: BoundingBox {
                x: 10.0,
                y: 20.0,
                width: 100.0,
                height: 120.0,
                confidence: 0.9,
            },
        }
    }

    fn classifier() -> (Arc<MonitoringSession>, PresenceClassifier) {
        let session = Arc::new(MonitoringSession::new());
        (session.clone(), PresenceClassifier::new(session))
    }

    #[test]
    fn test_owner_match_clears_absence() {
        let (session, classifier) = classifier();
        session.set_owner_absent(true);
        let verdict = classifier.classify(&[face()], Some(&Fixed("owner_no_mask", 0.3)));
        assert!(verdict.owner_present);
        assert!(!verdict.owner_absent);
        assert!(!session.owner_absent());
        assert!(verdict.annotations[0].owner);
    }

    #[test]
    fn test_owner_label_at_threshold_is_not_presence() {
        let (session, classifier) = classifier();
        let verdict = classifier.classify(&[face()], Some(&Fixed("owner_mask", MATCH_THRESHOLD)));
        assert!(!verdict.owner_present);
        assert!(session.owner_absent());
    }

    #[test]
    fn test_unmatched_face_is_absent_but_not_no_face() {
        let (session, classifier) = classifier();
        for _ in 0..(NO_FACE_FRAME_LIMIT * 2) {
            let verdict = classifier.classify(&[face()], Some(&Fixed(UNKNOWN_LABEL, 0.9)));
            assert!(!verdict.owner_present);
            assert!(verdict.owner_absent);
            assert!(!verdict.intruder_detected);
        }
        assert_eq!(session.consecutive_no_face_frames(), 0);
    }

    #[test]
    fn test_no_face_streak_forces_absence() {
        let (session, classifier) = classifier();
        classifier.classify(&[face()], Some(&Fixed("owner_no_mask", 0.2)));
        assert!(!session.owner_absent());

        for _ in 0..NO_FACE_FRAME_LIMIT {
            classifier.classify(&[], Some(&Fixed("owner_no_mask", 0.2)));
        }
        assert_eq!(session.consecutive_no_face_frames(), NO_FACE_FRAME_LIMIT);
        assert!(session.owner_absent());
    }

    #[test]
    fn test_owner_face_resets_streak() {
        let (session, classifier) = classifier();
        for _ in 0..(NO_FACE_FRAME_LIMIT + 3) {
            classifier.classify(&[], None);
        }
        assert!(session.owner_absent());

        let verdict = classifier.classify(&[face()], Some(&Fixed("owner_mask", 0.1)));
        assert!(!verdict.owner_absent);
        assert_eq!(session.consecutive_no_face_frames(), 0);
    }

    #[test]
    fn test_any_owner_face_among_several_counts() {
        struct ByFirstComponent;
        impl FaceMatcher for ByFirstComponent {
            fn find_best_match(&self, probe: &Embedding) -> BestMatch {
                if probe.values[0] > 0.5 {
                    BestMatch { label: "owner_no_mask".into(), distance: 0.2 }
                } else {
                    BestMatch { label: UNKNOWN_LABEL.into(), distance: 1.1 }
                }
            }
        }

        let (_, classifier) = classifier();
        let stranger = face();
        let mut owner = face();
        owner.embedding.values[0] = 1.0;

        let verdict = classifier.classify(&[stranger, owner], Some(&ByFirstComponent));
        assert_eq!(verdict.faces, 2);
        assert!(verdict.owner_present);
        assert!(!verdict.owner_absent);
    }

    #[test]
    fn test_non_owner_class_flags_intruder() {
        let (_, classifier) = classifier();
        let verdict = classifier.classify(&[face()], Some(&Fixed("someone_else", 0.1)));
        assert!(verdict.intruder_detected);
        assert!(verdict.owner_absent);
    }

    #[test]
    fn test_faces_without_matcher_are_absent() {
        let (session, classifier) = classifier();
        let verdict = classifier.classify(&[face()], None);
        assert!(verdict.owner_absent);
        assert_eq!(verdict.annotations[0].distance, None);
        assert_eq!(session.consecutive_no_face_frames(), 0);
    }

    #[test]
    fn test_short_no_face_streak_keeps_previous_verdict() {
        let (session, classifier) = classifier();
        classifier.classify(&[face()], Some(&Fixed("owner_no_mask", 0.2)));

        for _ in 0..(NO_FACE_FRAME_LIMIT - 1) {
            let verdict = classifier.classify(&[], None);
            assert!(!verdict.owner_absent);
        }
        assert!(!session.owner_absent());

        let verdict = classifier.classify(&[], None);
        assert!(verdict.owner_absent);
    }

    #[test]
    fn test_short_no_face_streak_keeps_absent_verdict() {
        let (session, classifier) = classifier();
        classifier.classify(&[face()], Some(&Fixed(UNKNOWN_LABEL, 0.9)));
        assert!(session.owner_absent());

        classifier.classify(&[], None);
        assert!(session.owner_absent());
        assert_eq!(session.consecutive_no_face_frames(), 1);
    }
}
