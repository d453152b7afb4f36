use serde::{Deserialize, Serialize};

/// Length of every embedding produced by the recognition engine.
pub const EMBEDDING_DIM: usize = 128;

/// Bounding box for a detected face, in source-frame pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    #[serde(default)]
    pub confidence: f32,
}

/// Face embedding vector (128-dimensional).
///
/// Serialises transparently as a plain number array so the persisted record
/// stays `[[f32; 128], ...]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Embedding {
    pub values: Vec<f32>,
}

impl Embedding {
    pub fn new(values: Vec<f32>) -> Self {
        Self { values }
    }

    pub fn dim(&self) -> usize {
        self.values.len()
    }

    /// Compute Euclidean distance between two embeddings.
    pub fn euclidean_distance(&self, other: &Embedding) -> f32 {
        self.values
            .iter()
            .zip(other.values.iter())
            .map(|(a, b)| (a - b).powi(2))
            .sum::<f32>()
            .sqrt()
    }
}

impl From<Vec<f32>> for Embedding {
    fn from(values: Vec<f32>) -> Self {
        Self { values }
    }
}

/// One face found in a frame by the detection engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub embedding: Embedding,
    #[serde(rename = "box")]
    pub bbox: BoundingBox,
}

/// Engine tuning forwarded verbatim with every detect call.
///
/// The values only matter to the engine; the core never interprets them.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DetectOptions {
    pub input_size: u32,
    pub score_threshold: f32,
}

impl Default for DetectOptions {
    fn default() -> Self {
        Self {
            input_size: 416,
            score_threshold: 0.5,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_euclidean_distance_identical() {
        let a = Embedding::new(vec![0.3, -0.2, 0.9]);
        assert_eq!(a.euclidean_distance(&a), 0.0);
    }

    #[test]
    fn test_euclidean_distance_unit_axes() {
        let a = Embedding::new(vec![1.0, 0.0]);
        let b = Embedding::new(vec![0.0, 1.0]);
        assert!((a.euclidean_distance(&b) - 2f32.sqrt()).abs() < 1e-6);
    }

    #[test]
    fn test_embedding_serializes_as_plain_array() {
        let e = Embedding::new(vec![0.5, 1.0]);
        assert_eq!(serde_json::to_string(&e).unwrap(), "[0.5,1.0]");
    }

    #[test]
    fn test_detection_box_field_name() {
        let json = r#"{"embedding":[0.1],"box":{"x":1,"y":2,"width":3,"height":4}}"#;
        let d: Detection = serde_json::from_str(json).unwrap();
        assert_eq!(d.bbox.width, 3.0);
        assert_eq!(d.bbox.confidence, 0.0);
    }
}
