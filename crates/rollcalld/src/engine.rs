use chrono::{NaiveDate, Utc};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

use rollcall_core::{
    check_uniqueness, compute_percentage, AttendanceEvent, CaptureOutcome, DistanceError,
    Embedding, EnrollError, EnrollmentSession, FaceMatcher, Identification, Identity, MatchError,
    UniquenessOutcome,
};
use rollcall_store::{
    AttendanceLedger, IdentityStore, KeyValueStore, MarkOutcome, SqliteKv, StoreError,
};

use crate::config::Config;

/// Events included per identity in a report, newest first.
const REPORT_RECENT_EVENTS: usize = 10;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    #[error(transparent)]
    Match(#[from] MatchError),
    #[error(transparent)]
    Enroll(#[from] EnrollError),
    #[error(transparent)]
    Distance(#[from] DistanceError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("an enrollment session is already active (for '{0}')")]
    EnrollmentInProgress(String),
    #[error("no enrollment session is active")]
    NoActiveEnrollment,
    #[error("engine thread exited")]
    ChannelClosed,
}

/// One enrollment polling tick, as seen by the caller.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum EnrollProgress {
    /// Uniqueness guard fired: this face is already enrolled. The session
    /// has been discarded.
    Rejected {
        existing: String,
        similarity_percent: u8,
    },
    NoFace,
    MultipleFaces,
    Sampled { captured: usize, required: usize },
    /// Identity persisted and the matcher rebuilt.
    Enrolled { name: String, samples: usize },
}

/// Outcome for one embedding of a recognition frame.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RecognitionOutcome {
    /// Identified; a new attendance event was written and the identity's
    /// derived stats refreshed.
    Marked { name: String, confidence_percent: u8 },
    /// Identified, but attendance was already marked today.
    AlreadyMarked { name: String, confidence_percent: u8 },
    /// Best distance at or above the acceptance threshold.
    Unknown { similarity_percent: u8 },
}

#[derive(Debug, Clone, Serialize)]
pub struct IdentityReport {
    pub name: String,
    pub total_present_days: u32,
    pub attendance_percentage: u8,
    pub total_records: usize,
    /// Most recent events, newest first.
    pub recent: Vec<AttendanceEvent>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AttendanceReport {
    pub generated_at: chrono::DateTime<Utc>,
    pub registered_count: usize,
    pub total_records: usize,
    /// Events whose calendar date is today.
    pub today_count: usize,
    pub average_attendance_percentage: u8,
    pub identities: Vec<IdentityReport>,
}

#[derive(Debug, Clone, Serialize)]
pub struct EngineStatus {
    pub registered_count: usize,
    pub total_records: usize,
    pub enrollment_active: bool,
}

/// Messages sent from D-Bus handlers to the engine thread.
enum EngineRequest {
    BeginEnrollment {
        name: String,
        reply: oneshot::Sender<Result<(), EngineError>>,
    },
    SubmitEnrollmentFrame {
        frame: Vec<Embedding>,
        reply: oneshot::Sender<Result<EnrollProgress, EngineError>>,
    },
    CancelEnrollment {
        reply: oneshot::Sender<bool>,
    },
    Recognize {
        frame: Vec<Embedding>,
        reply: oneshot::Sender<Result<Vec<RecognitionOutcome>, EngineError>>,
    },
    ListIdentities {
        reply: oneshot::Sender<Result<Vec<Identity>, EngineError>>,
    },
    RecordsFor {
        name: String,
        reply: oneshot::Sender<Result<Vec<AttendanceEvent>, EngineError>>,
    },
    Report {
        reply: oneshot::Sender<Result<AttendanceReport, EngineError>>,
    },
    Status {
        reply: oneshot::Sender<Result<EngineStatus, EngineError>>,
    },
    ClearAll {
        reply: oneshot::Sender<Result<(), EngineError>>,
    },
}

/// Clone-safe handle to the engine thread.
#[derive(Clone)]
pub struct EngineHandle {
    tx: mpsc::Sender<EngineRequest>,
}

impl EngineHandle {
    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<Result<T, EngineError>>) -> EngineRequest,
    ) -> Result<T, EngineError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(make(reply_tx))
            .await
            .map_err(|_| EngineError::ChannelClosed)?;
        reply_rx.await.map_err(|_| EngineError::ChannelClosed)?
    }

    pub async fn begin_enrollment(&self, name: String) -> Result<(), EngineError> {
        self.request(|reply| EngineRequest::BeginEnrollment { name, reply })
            .await
    }

    pub async fn submit_enrollment_frame(
        &self,
        frame: Vec<Embedding>,
    ) -> Result<EnrollProgress, EngineError> {
        self.request(|reply| EngineRequest::SubmitEnrollmentFrame { frame, reply })
            .await
    }

    /// Discard the active session, reporting whether one existed.
    pub async fn cancel_enrollment(&self) -> Result<bool, EngineError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(EngineRequest::CancelEnrollment { reply: reply_tx })
            .await
            .map_err(|_| EngineError::ChannelClosed)?;
        reply_rx.await.map_err(|_| EngineError::ChannelClosed)
    }

    pub async fn recognize(
        &self,
        frame: Vec<Embedding>,
    ) -> Result<Vec<RecognitionOutcome>, EngineError> {
        self.request(|reply| EngineRequest::Recognize { frame, reply })
            .await
    }

    pub async fn list_identities(&self) -> Result<Vec<Identity>, EngineError> {
        self.request(|reply| EngineRequest::ListIdentities { reply })
            .await
    }

    pub async fn records_for(&self, name: String) -> Result<Vec<AttendanceEvent>, EngineError> {
        self.request(|reply| EngineRequest::RecordsFor { name, reply })
            .await
    }

    pub async fn report(&self) -> Result<AttendanceReport, EngineError> {
        self.request(|reply| EngineRequest::Report { reply }).await
    }

    pub async fn status(&self) -> Result<EngineStatus, EngineError> {
        self.request(|reply| EngineRequest::Status { reply }).await
    }

    pub async fn clear_all(&self) -> Result<(), EngineError> {
        self.request(|reply| EngineRequest::ClearAll { reply })
            .await
    }
}

/// Spawn the engine on a dedicated OS thread.
///
/// Loads the identity store and ledger, builds the initial matcher
/// snapshot, then enters a request loop. Fails fast at startup if the
/// database is unavailable. All mutation serializes through this thread,
/// which is what preserves the daily-dedup and uniqueness invariants under
/// concurrent callers.
pub fn spawn_engine(config: &Config) -> Result<EngineHandle, EngineError> {
    if let Some(parent) = config.db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let store = IdentityStore::new(SqliteKv::open(&config.db_path)?);
    let ledger = AttendanceLedger::new(SqliteKv::open(&config.db_path)?);
    let mut engine = Engine::new(
        store,
        ledger,
        config.match_threshold,
        config.uniqueness_threshold,
        config.samples_per_enrollment,
    )?;

    tracing::info!(
        db = %config.db_path.display(),
        identities = engine.registered_count,
        match_threshold = config.match_threshold,
        uniqueness_threshold = config.uniqueness_threshold,
        "engine state loaded"
    );

    let (tx, mut rx) = mpsc::channel::<EngineRequest>(4);

    std::thread::Builder::new()
        .name("rollcall-engine".into())
        .spawn(move || {
            tracing::info!("engine thread started");
            while let Some(req) = rx.blocking_recv() {
                engine.handle(req);
            }
            tracing::info!("engine thread exiting");
        })
        .expect("failed to spawn engine thread");

    Ok(EngineHandle { tx })
}

/// All mutable attendance state, owned by the engine thread.
struct Engine<S> {
    store: IdentityStore<S>,
    ledger: AttendanceLedger<S>,
    matcher: FaceMatcher,
    session: Option<EnrollmentSession>,
    match_threshold: f32,
    uniqueness_threshold: f32,
    samples_per_enrollment: usize,
    registered_count: usize,
}

impl<S: KeyValueStore> Engine<S> {
    fn new(
        store: IdentityStore<S>,
        ledger: AttendanceLedger<S>,
        match_threshold: f32,
        uniqueness_threshold: f32,
        samples_per_enrollment: usize,
    ) -> Result<Self, EngineError> {
        let identities = store.list()?;
        let registered_count = identities.len();
        Ok(Self {
            matcher: FaceMatcher::build(&identities),
            store,
            ledger,
            session: None,
            match_threshold,
            uniqueness_threshold,
            samples_per_enrollment,
            registered_count,
        })
    }

    fn handle(&mut self, req: EngineRequest) {
        match req {
            EngineRequest::BeginEnrollment { name, reply } => {
                let _ = reply.send(self.begin_enrollment(&name));
            }
            EngineRequest::SubmitEnrollmentFrame { frame, reply } => {
                let _ = reply.send(self.submit_enrollment_frame(&frame));
            }
            EngineRequest::CancelEnrollment { reply } => {
                let _ = reply.send(self.cancel_enrollment());
            }
            EngineRequest::Recognize { frame, reply } => {
                let _ = reply.send(self.recognize(&frame));
            }
            EngineRequest::ListIdentities { reply } => {
                let _ = reply.send(self.store.list().map_err(EngineError::from));
            }
            EngineRequest::RecordsFor { name, reply } => {
                let _ = reply.send(self.records_for(&name));
            }
            EngineRequest::Report { reply } => {
                let _ = reply.send(self.report());
            }
            EngineRequest::Status { reply } => {
                let _ = reply.send(self.status());
            }
            EngineRequest::ClearAll { reply } => {
                let _ = reply.send(self.clear_all());
            }
        }
    }

    fn rebuild_matcher(&mut self) -> Result<(), EngineError> {
        let identities = self.store.list()?;
        self.registered_count = identities.len();
        self.matcher = FaceMatcher::build(&identities);
        Ok(())
    }

    fn begin_enrollment(&mut self, name: &str) -> Result<(), EngineError> {
        if let Some(session) = &self.session {
            return Err(EngineError::EnrollmentInProgress(
                session.name().to_string(),
            ));
        }

        let session = EnrollmentSession::with_required(name, self.samples_per_enrollment)?;

        // Reject a taken name before any sampling happens.
        let lowered = session.name().to_lowercase();
        if self
            .store
            .list()?
            .iter()
            .any(|i| i.name.to_lowercase() == lowered)
        {
            return Err(StoreError::DuplicateName(session.name().to_string()).into());
        }

        tracing::info!(
            name = %session.name(),
            required = session.required(),
            "enrollment started"
        );
        self.session = Some(session);
        Ok(())
    }

    fn submit_enrollment_frame(
        &mut self,
        frame: &[Embedding],
    ) -> Result<EnrollProgress, EngineError> {
        if self.session.is_none() {
            return Err(EngineError::NoActiveEnrollment);
        }

        // The uniqueness guard gates the session before its first sample is
        // retained: one person must not end up enrolled under two names.
        if self.session.as_ref().is_some_and(|s| s.is_unsampled()) {
            if let [candidate] = frame {
                let identities = self.store.list()?;
                if let UniquenessOutcome::AlreadyRegistered {
                    name,
                    similarity_percent,
                } = check_uniqueness(candidate, &identities, self.uniqueness_threshold)?
                {
                    tracing::warn!(
                        existing = %name,
                        similarity_percent,
                        "enrollment rejected: face already registered"
                    );
                    self.session = None;
                    return Ok(EnrollProgress::Rejected {
                        existing: name,
                        similarity_percent,
                    });
                }
            }
        }

        let outcome = self
            .session
            .as_mut()
            .ok_or(EngineError::NoActiveEnrollment)?
            .offer_frame(frame);

        match outcome {
            CaptureOutcome::NoFace => Ok(EnrollProgress::NoFace),
            CaptureOutcome::MultipleFaces => Ok(EnrollProgress::MultipleFaces),
            CaptureOutcome::Sampled { captured, required } => {
                Ok(EnrollProgress::Sampled { captured, required })
            }
            CaptureOutcome::Complete => {
                let session = self.session.take().expect("session presence checked");
                let samples = session.captured();
                let identity = session.finalize(Utc::now())?;
                let name = identity.name.clone();
                self.store.add(identity)?;
                self.rebuild_matcher()?;
                tracing::info!(name = %name, samples, "enrollment finalized");
                Ok(EnrollProgress::Enrolled { name, samples })
            }
        }
    }

    fn cancel_enrollment(&mut self) -> bool {
        match self.session.take() {
            Some(session) => {
                tracing::info!(
                    name = %session.name(),
                    captured = session.captured(),
                    "enrollment cancelled; samples discarded"
                );
                true
            }
            None => false,
        }
    }

    fn recognize(&mut self, frame: &[Embedding]) -> Result<Vec<RecognitionOutcome>, EngineError> {
        if self.matcher.is_empty() {
            return Err(MatchError::NoIdentitiesEnrolled.into());
        }

        let mut outcomes = Vec::with_capacity(frame.len());
        for probe in frame {
            match self.matcher.identify(probe, self.match_threshold)? {
                Identification::Identified {
                    name,
                    confidence_percent,
                    ..
                } => {
                    let now = Utc::now();
                    match self.ledger.mark_attendance(&name, confidence_percent, now)? {
                        MarkOutcome::Marked(_) => {
                            self.refresh_stats(&name, now.date_naive())?;
                            outcomes.push(RecognitionOutcome::Marked {
                                name,
                                confidence_percent,
                            });
                        }
                        MarkOutcome::AlreadyMarked => {
                            outcomes.push(RecognitionOutcome::AlreadyMarked {
                                name,
                                confidence_percent,
                            });
                        }
                    }
                }
                Identification::Unknown { similarity_percent } => {
                    outcomes.push(RecognitionOutcome::Unknown { similarity_percent });
                }
            }
        }
        Ok(outcomes)
    }

    /// Recompute the derived attendance fields for `name` and write them
    /// back. Runs once per successful mark, never on reads.
    fn refresh_stats(&mut self, name: &str, as_of: NaiveDate) -> Result<(), EngineError> {
        let events = self.ledger.records_for(name)?;
        let figures = compute_percentage(name, &events, as_of);
        self.store.update(name, |identity| {
            identity.total_present_days = figures.total_present_days;
            identity.attendance_percentage = figures.percentage;
        })?;
        Ok(())
    }

    fn records_for(&self, name: &str) -> Result<Vec<AttendanceEvent>, EngineError> {
        let mut records = self.ledger.records_for(name)?;
        // Newest first for display.
        records.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(records)
    }

    fn report(&self) -> Result<AttendanceReport, EngineError> {
        let identities = self.store.list()?;
        let all = self.ledger.all_records()?;
        let today = Utc::now().date_naive();

        let mut reports = Vec::with_capacity(identities.len());
        for identity in &identities {
            let mut records: Vec<AttendanceEvent> = all
                .iter()
                .filter(|e| e.name == identity.name)
                .cloned()
                .collect();
            records.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
            let total_records = records.len();
            records.truncate(REPORT_RECENT_EVENTS);

            reports.push(IdentityReport {
                name: identity.name.clone(),
                total_present_days: identity.total_present_days,
                attendance_percentage: identity.attendance_percentage,
                total_records,
                recent: records,
            });
        }

        let average_attendance_percentage = if identities.is_empty() {
            0
        } else {
            let sum: u32 = identities
                .iter()
                .map(|i| i.attendance_percentage as u32)
                .sum();
            (sum as f64 / identities.len() as f64).round() as u8
        };

        Ok(AttendanceReport {
            generated_at: Utc::now(),
            registered_count: identities.len(),
            total_records: all.len(),
            today_count: all.iter().filter(|e| e.date == today).count(),
            average_attendance_percentage,
            identities: reports,
        })
    }

    fn status(&self) -> Result<EngineStatus, EngineError> {
        Ok(EngineStatus {
            registered_count: self.store.list()?.len(),
            total_records: self.ledger.all_records()?.len(),
            enrollment_active: self.session.is_some(),
        })
    }

    fn clear_all(&mut self) -> Result<(), EngineError> {
        self.store.clear()?;
        self.ledger.clear()?;
        self.session = None;
        self.rebuild_matcher()?;
        tracing::info!("all identities and attendance records cleared");
        Ok(())
    }
}
