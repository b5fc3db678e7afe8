//! rollcall-core — identity matching and attendance arithmetic.
//!
//! Pure domain logic: embedding distance, the registration-uniqueness
//! guard, the enrollment session, the nearest-neighbor matcher, and the
//! attendance-percentage calculator. Frame acquisition, embedding
//! production, storage, and scheduling all live with the embedding host.

pub mod enroll;
pub mod matcher;
pub mod stats;
pub mod types;
pub mod uniqueness;

pub use enroll::{CaptureOutcome, EnrollError, EnrollmentSession, SAMPLES_REQUIRED};
pub use matcher::{BestMatch, FaceMatcher, Identification, MatchError, MATCH_THRESHOLD};
pub use stats::{compute_percentage, AttendanceFigures};
pub use types::{similarity_percent, AttendanceEvent, DistanceError, Embedding, Identity};
pub use uniqueness::{check_uniqueness, UniquenessOutcome, UNIQUENESS_THRESHOLD};
