//! Enrollment session — accumulates embedding samples across polling ticks.
//!
//! The session is explicit state owned by the caller: the host drives it at
//! its own cadence (one detection frame per tick) and drops it to cancel.
//! Nothing is persisted until the session finalizes.

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::types::{Embedding, Identity};

/// Accepted samples required before a session can finalize.
pub const SAMPLES_REQUIRED: usize = 5;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EnrollError {
    #[error("enrollment name must not be empty")]
    EmptyName,
    #[error("enrollment incomplete: {captured}/{required} samples")]
    Incomplete { captured: usize, required: usize },
}

/// Outcome of offering one detection frame to the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureOutcome {
    /// Frame held no embedding; try again next tick.
    NoFace,
    /// Frame held more than one embedding; try again next tick.
    MultipleFaces,
    /// Sample accepted; more are needed.
    Sampled { captured: usize, required: usize },
    /// Required sample count reached; finalize the session.
    Complete,
}

/// One in-flight enrollment. Dropping the session discards all accumulated
/// samples, so no partial identity ever exists.
#[derive(Debug)]
pub struct EnrollmentSession {
    name: String,
    samples: Vec<Embedding>,
    required: usize,
}

impl EnrollmentSession {
    /// Start a session for `name` (trimmed; must be non-empty).
    pub fn new(name: &str) -> Result<Self, EnrollError> {
        Self::with_required(name, SAMPLES_REQUIRED)
    }

    pub fn with_required(name: &str, required: usize) -> Result<Self, EnrollError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(EnrollError::EmptyName);
        }
        Ok(Self {
            name: name.to_string(),
            samples: Vec::with_capacity(required),
            required,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn captured(&self) -> usize {
        self.samples.len()
    }

    pub fn required(&self) -> usize {
        self.required
    }

    /// True until the first sample is accepted.
    pub fn is_unsampled(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn is_complete(&self) -> bool {
        self.samples.len() >= self.required
    }

    /// Offer one detection frame. Only a frame holding exactly one embedding
    /// counts toward the required samples; zero or many are retry outcomes,
    /// not errors.
    pub fn offer_frame(&mut self, frame: &[Embedding]) -> CaptureOutcome {
        if self.is_complete() {
            return CaptureOutcome::Complete;
        }
        match frame {
            [] => CaptureOutcome::NoFace,
            [single] => {
                self.samples.push(single.clone());
                tracing::debug!(
                    name = %self.name,
                    captured = self.samples.len(),
                    required = self.required,
                    "sample accepted"
                );
                if self.is_complete() {
                    CaptureOutcome::Complete
                } else {
                    CaptureOutcome::Sampled {
                        captured: self.samples.len(),
                        required: self.required,
                    }
                }
            }
            _ => CaptureOutcome::MultipleFaces,
        }
    }

    /// Finalize into an [`Identity`] carrying the collected samples.
    pub fn finalize(self, enrolled_at: DateTime<Utc>) -> Result<Identity, EnrollError> {
        if !self.is_complete() {
            return Err(EnrollError::Incomplete {
                captured: self.samples.len(),
                required: self.required,
            });
        }
        Ok(Identity {
            name: self.name,
            embeddings: self.samples,
            enrolled_at,
            total_present_days: 0,
            attendance_percentage: 0,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn emb(seed: f32) -> Embedding {
        Embedding::new(vec![seed, 0.0, 0.0])
    }

    #[test]
    fn test_empty_name_rejected() {
        assert_eq!(
            EnrollmentSession::new("   ").unwrap_err(),
            EnrollError::EmptyName
        );
    }

    #[test]
    fn test_name_is_trimmed() {
        let session = EnrollmentSession::new("  Alice ").unwrap();
        assert_eq!(session.name(), "Alice");
    }

    #[test]
    fn test_only_single_face_frames_count() {
        let mut session = EnrollmentSession::new("Alice").unwrap();

        assert_eq!(session.offer_frame(&[]), CaptureOutcome::NoFace);
        assert_eq!(
            session.offer_frame(&[emb(0.1), emb(0.2)]),
            CaptureOutcome::MultipleFaces
        );
        assert_eq!(session.captured(), 0);

        assert_eq!(
            session.offer_frame(&[emb(0.1)]),
            CaptureOutcome::Sampled {
                captured: 1,
                required: SAMPLES_REQUIRED
            }
        );
        assert_eq!(session.captured(), 1);
    }

    #[test]
    fn test_completes_on_fifth_sample() {
        let mut session = EnrollmentSession::new("Alice").unwrap();
        for i in 0..4 {
            assert!(matches!(
                session.offer_frame(&[emb(i as f32)]),
                CaptureOutcome::Sampled { .. }
            ));
        }
        assert_eq!(session.offer_frame(&[emb(4.0)]), CaptureOutcome::Complete);

        let identity = session.finalize(Utc::now()).unwrap();
        assert_eq!(identity.name, "Alice");
        assert_eq!(identity.embeddings.len(), SAMPLES_REQUIRED);
        assert_eq!(identity.total_present_days, 0);
        assert_eq!(identity.attendance_percentage, 0);
    }

    #[test]
    fn test_finalize_before_complete_fails() {
        let mut session = EnrollmentSession::new("Alice").unwrap();
        session.offer_frame(&[emb(0.1)]);
        assert_eq!(
            session.finalize(Utc::now()),
            Err(EnrollError::Incomplete {
                captured: 1,
                required: SAMPLES_REQUIRED
            })
        );
    }

    #[test]
    fn test_complete_session_ignores_further_frames() {
        let mut session = EnrollmentSession::with_required("Alice", 1).unwrap();
        assert_eq!(session.offer_frame(&[emb(0.1)]), CaptureOutcome::Complete);
        assert_eq!(session.offer_frame(&[emb(0.2)]), CaptureOutcome::Complete);
        assert_eq!(session.captured(), 1);
    }
}
