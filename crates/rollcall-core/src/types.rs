use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DistanceError {
    #[error("embedding dimension mismatch: {left} vs {right}")]
    DimensionMismatch { left: usize, right: usize },
}

/// Face embedding vector (dimensionality fixed by the upstream detector,
/// typically 128). Immutable once captured.
///
/// Serializes transparently as a bare float array.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Embedding {
    pub values: Vec<f32>,
}

impl Embedding {
    pub fn new(values: Vec<f32>) -> Self {
        Self { values }
    }

    /// Number of dimensions.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Compute Euclidean distance to another embedding. Lower = more similar.
    ///
    /// Both embeddings must share the same dimensionality; a mismatch is
    /// fatal only to this single comparison.
    pub fn distance(&self, other: &Embedding) -> Result<f32, DistanceError> {
        if self.values.len() != other.values.len() {
            return Err(DistanceError::DimensionMismatch {
                left: self.values.len(),
                right: other.values.len(),
            });
        }

        let sum: f32 = self
            .values
            .iter()
            .zip(other.values.iter())
            .map(|(a, b)| (a - b).powi(2))
            .sum();
        Ok(sum.sqrt())
    }
}

/// Map a distance to a display percentage: `round((1 - d) * 100)`, clamped
/// to [0, 100].
///
/// Display and logging only; threshold decisions always compare the raw
/// distance.
pub fn similarity_percent(distance: f32) -> u8 {
    (((1.0 - distance) * 100.0).round()).clamp(0.0, 100.0) as u8
}

/// An enrolled person: unique name plus the embedding samples collected
/// during one enrollment session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Identity {
    /// Canonical name; unique case-insensitively across the store.
    pub name: String,
    /// Non-empty set of samples from one enrollment session.
    pub embeddings: Vec<Embedding>,
    pub enrolled_at: DateTime<Utc>,
    /// Derived: distinct days this identity was marked present.
    pub total_present_days: u32,
    /// Derived: rolling attendance percentage in [0, 100].
    pub attendance_percentage: u8,
}

/// One attendance mark. At most one exists per `(name, date)` pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttendanceEvent {
    pub id: Uuid,
    /// References an [`Identity`] by name (weak string key, not ownership).
    pub name: String,
    /// UTC calendar date of `timestamp`, the daily-dedup key.
    pub date: NaiveDate,
    pub timestamp: DateTime<Utc>,
    pub confidence_percent: u8,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_distance_to_self_is_zero() {
        let a = Embedding::new(vec![0.3, -1.2, 0.0, 4.5]);
        assert_eq!(a.distance(&a).unwrap(), 0.0);
    }

    #[test]
    fn test_distance_is_symmetric() {
        let a = Embedding::new(vec![1.0, 2.0, 3.0]);
        let b = Embedding::new(vec![-0.5, 0.25, 7.0]);
        assert_eq!(a.distance(&b).unwrap(), b.distance(&a).unwrap());
    }

    #[test]
    fn test_distance_known_value() {
        // 3-4-5 triangle
        let a = Embedding::new(vec![0.0, 0.0]);
        let b = Embedding::new(vec![3.0, 4.0]);
        assert!((a.distance(&b).unwrap() - 5.0).abs() < 1e-6);
    }

    #[test]
    fn test_distance_dimension_mismatch() {
        let a = Embedding::new(vec![1.0, 2.0]);
        let b = Embedding::new(vec![1.0, 2.0, 3.0]);
        assert_eq!(
            a.distance(&b),
            Err(DistanceError::DimensionMismatch { left: 2, right: 3 })
        );
    }

    #[test]
    fn test_similarity_percent_rounds() {
        assert_eq!(similarity_percent(0.45), 55);
        assert_eq!(similarity_percent(0.504), 50);
    }

    #[test]
    fn test_similarity_percent_clamps() {
        // Distances above 1.0 would go negative without the clamp.
        assert_eq!(similarity_percent(1.7), 0);
        assert_eq!(similarity_percent(-0.2), 100);
    }

    #[test]
    fn test_embedding_serializes_as_bare_array() {
        let a = Embedding::new(vec![1.0, 0.5]);
        assert_eq!(serde_json::to_string(&a).unwrap(), "[1.0,0.5]");
        let back: Embedding = serde_json::from_str("[1.0,0.5]").unwrap();
        assert_eq!(back, a);
    }
}
