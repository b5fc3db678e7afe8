//! Registration-time duplicate-person guard.

use crate::types::{similarity_percent, DistanceError, Embedding, Identity};

/// Maximum distance at which two embeddings count as the same person for
/// registration dedup. Tighter than [`crate::matcher::MATCH_THRESHOLD`].
pub const UNIQUENESS_THRESHOLD: f32 = 0.45;

/// Outcome of the registration-uniqueness check.
#[derive(Debug, Clone, PartialEq)]
pub enum UniquenessOutcome {
    Unique,
    /// The candidate is within threshold of an enrolled sample. Registration
    /// must be rejected: one person must not hold two identities.
    AlreadyRegistered {
        name: String,
        similarity_percent: u8,
    },
}

/// Linear scan over every embedding of every enrolled identity. The first
/// sample within `threshold` wins, in store enumeration order, not the
/// globally nearest one.
///
/// O(identities × samples); enrollment is a rare, human-paced operation.
pub fn check_uniqueness(
    candidate: &Embedding,
    identities: &[Identity],
    threshold: f32,
) -> Result<UniquenessOutcome, DistanceError> {
    for identity in identities {
        for stored in &identity.embeddings {
            let distance = candidate.distance(stored)?;
            if distance < threshold {
                tracing::info!(
                    name = %identity.name,
                    distance,
                    "candidate embedding matches an enrolled identity"
                );
                return Ok(UniquenessOutcome::AlreadyRegistered {
                    name: identity.name.clone(),
                    similarity_percent: similarity_percent(distance),
                });
            }
        }
    }
    Ok(UniquenessOutcome::Unique)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn identity(name: &str, embeddings: Vec<Vec<f32>>) -> Identity {
        Identity {
            name: name.into(),
            embeddings: embeddings.into_iter().map(Embedding::new).collect(),
            enrolled_at: Utc::now(),
            total_present_days: 0,
            attendance_percentage: 0,
        }
    }

    #[test]
    fn test_within_threshold_is_already_registered() {
        // 0.3 from alice's second sample: under 0.45 no matter how many
        // other identities are enrolled.
        let identities = vec![
            identity("carol", vec![vec![0.0, 0.0, 1.0, 0.0]]),
            identity("alice", vec![vec![0.0, 1.0, 0.0, 0.0], vec![1.0, 0.0, 0.0, 0.0]]),
            identity("bob", vec![vec![0.0, 0.0, 0.0, 1.0]]),
        ];
        let candidate = Embedding::new(vec![1.0, 0.3, 0.0, 0.0]);

        assert_eq!(
            check_uniqueness(&candidate, &identities, UNIQUENESS_THRESHOLD).unwrap(),
            UniquenessOutcome::AlreadyRegistered {
                name: "alice".into(),
                similarity_percent: 70,
            }
        );
    }

    #[test]
    fn test_first_hit_wins_over_nearest() {
        // alice breaches the threshold at 0.4; bob is closer at 0.1. The
        // scan stops at alice, the first hit in store order, not the minimum.
        let identities = vec![
            identity("alice", vec![vec![1.0, 0.4, 0.0, 0.0]]),
            identity("bob", vec![vec![1.0, 0.1, 0.0, 0.0]]),
        ];
        let candidate = Embedding::new(vec![1.0, 0.0, 0.0, 0.0]);

        match check_uniqueness(&candidate, &identities, UNIQUENESS_THRESHOLD).unwrap() {
            UniquenessOutcome::AlreadyRegistered { name, .. } => assert_eq!(name, "alice"),
            other => panic!("expected a hit, got {other:?}"),
        }
    }

    #[test]
    fn test_outside_threshold_is_unique() {
        let identities = vec![identity("alice", vec![vec![1.0, 0.0, 0.0, 0.0]])];
        // 0.47 away: unique for registration, though the matcher would still
        // accept it at the looser 0.5 acceptance threshold.
        let candidate = Embedding::new(vec![1.0, 0.47, 0.0, 0.0]);

        assert_eq!(
            check_uniqueness(&candidate, &identities, UNIQUENESS_THRESHOLD).unwrap(),
            UniquenessOutcome::Unique
        );
    }

    #[test]
    fn test_empty_store_is_unique() {
        let candidate = Embedding::new(vec![1.0, 0.0]);
        assert_eq!(
            check_uniqueness(&candidate, &[], UNIQUENESS_THRESHOLD).unwrap(),
            UniquenessOutcome::Unique
        );
    }

    #[test]
    fn test_dimension_mismatch_propagates() {
        let identities = vec![identity("alice", vec![vec![1.0, 0.0]])];
        let candidate = Embedding::new(vec![1.0, 0.0, 0.0]);
        assert!(check_uniqueness(&candidate, &identities, UNIQUENESS_THRESHOLD).is_err());
    }
}
