//! Nearest-neighbor identity matching over an enrolled snapshot.

use thiserror::Error;

use crate::types::{similarity_percent, DistanceError, Embedding, Identity};

/// Maximum distance at which a live probe is accepted as identifying a known
/// identity. Looser than [`crate::uniqueness::UNIQUENESS_THRESHOLD`]:
/// recognition tolerates more variation than registration dedup does.
pub const MATCH_THRESHOLD: f32 = 0.5;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum MatchError {
    #[error("no identities enrolled: recognition requires at least one")]
    NoIdentitiesEnrolled,
    #[error(transparent)]
    Distance(#[from] DistanceError),
}

/// Best candidate for a probe: the identity owning the globally minimal
/// embedding distance.
#[derive(Debug, Clone, PartialEq)]
pub struct BestMatch {
    pub name: String,
    pub distance: f32,
}

/// Caller-facing identification decision.
#[derive(Debug, Clone, PartialEq)]
pub enum Identification {
    Identified {
        name: String,
        distance: f32,
        confidence_percent: u8,
    },
    /// Best distance was at or above the acceptance threshold. Carries only
    /// the similarity percentage; the nearest name is never surfaced as an
    /// identification above threshold.
    Unknown { similarity_percent: u8 },
}

/// Immutable matcher built from a store snapshot.
///
/// Holds a copy of `(name, embeddings)` pairs, no live store reference;
/// rebuild after any store mutation (add, clear). Safe to share read-only
/// across concurrent matching calls once built.
#[derive(Debug, Default)]
pub struct FaceMatcher {
    gallery: Vec<(String, Vec<Embedding>)>,
}

impl FaceMatcher {
    pub fn build(identities: &[Identity]) -> Self {
        let gallery: Vec<_> = identities
            .iter()
            .map(|i| (i.name.clone(), i.embeddings.clone()))
            .collect();
        tracing::debug!(identities = gallery.len(), "matcher built");
        Self { gallery }
    }

    pub fn is_empty(&self) -> bool {
        self.gallery.is_empty()
    }

    /// Find the identity whose nearest embedding has the globally smallest
    /// distance to `probe`. Ties keep the earlier identity in snapshot
    /// order, matching linear-scan semantics.
    pub fn find_best_match(&self, probe: &Embedding) -> Result<BestMatch, MatchError> {
        if self.gallery.is_empty() {
            return Err(MatchError::NoIdentitiesEnrolled);
        }

        let mut best: Option<(usize, f32)> = None;
        for (idx, (_, embeddings)) in self.gallery.iter().enumerate() {
            for stored in embeddings {
                let distance = probe.distance(stored)?;
                let better = match best {
                    None => true,
                    Some((_, best_distance)) => distance < best_distance,
                };
                if better {
                    best = Some((idx, distance));
                }
            }
        }

        // Enrolled identities always hold at least one sample.
        let (idx, distance) = best.ok_or(MatchError::NoIdentitiesEnrolled)?;
        Ok(BestMatch {
            name: self.gallery[idx].0.clone(),
            distance,
        })
    }

    /// Threshold the best match into a caller-facing decision.
    pub fn identify(
        &self,
        probe: &Embedding,
        threshold: f32,
    ) -> Result<Identification, MatchError> {
        let best = self.find_best_match(probe)?;
        if best.distance < threshold {
            Ok(Identification::Identified {
                confidence_percent: similarity_percent(best.distance),
                distance: best.distance,
                name: best.name,
            })
        } else {
            tracing::debug!(
                nearest = %best.name,
                distance = best.distance,
                "probe above acceptance threshold"
            );
            Ok(Identification::Unknown {
                similarity_percent: similarity_percent(best.distance),
            })
        }
    }
}
