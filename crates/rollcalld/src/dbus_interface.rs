use zbus::interface;

use rollcall_core::Embedding;

use crate::engine::{EngineError, EngineHandle};

/// D-Bus interface for the Rollcall attendance daemon.
///
/// Bus name: org.rollcall.Attendance1
/// Object path: /org/rollcall/Attendance1
///
/// Detection frames arrive as JSON arrays of embeddings (the external
/// detector's output); structured results travel back as JSON strings.
pub struct AttendanceService {
    engine: EngineHandle,
}

impl AttendanceService {
    pub fn new(engine: EngineHandle) -> Self {
        Self { engine }
    }
}

fn to_fdo(err: EngineError) -> zbus::fdo::Error {
    zbus::fdo::Error::Failed(err.to_string())
}

fn parse_frame(frame_json: &str) -> zbus::fdo::Result<Vec<Embedding>> {
    serde_json::from_str(frame_json)
        .map_err(|e| zbus::fdo::Error::InvalidArgs(format!("bad frame payload: {e}")))
}

fn to_json<T: serde::Serialize>(value: &T) -> zbus::fdo::Result<String> {
    serde_json::to_string(value).map_err(|e| zbus::fdo::Error::Failed(e.to_string()))
}

#[interface(name = "org.rollcall.Attendance1")]
impl AttendanceService {
    /// Start an enrollment session for the given name.
    async fn begin_enrollment(&self, name: &str) -> zbus::fdo::Result<()> {
        tracing::info!(name, "begin_enrollment requested");
        self.engine
            .begin_enrollment(name.to_string())
            .await
            .map_err(to_fdo)
    }

    /// Feed one detection frame to the active enrollment session.
    /// Returns the progress step as JSON.
    async fn submit_enrollment_frame(&self, frame_json: &str) -> zbus::fdo::Result<String> {
        let frame = parse_frame(frame_json)?;
        let progress = self
            .engine
            .submit_enrollment_frame(frame)
            .await
            .map_err(to_fdo)?;
        to_json(&progress)
    }

    /// Discard the active enrollment session. Returns whether one existed.
    async fn cancel_enrollment(&self) -> zbus::fdo::Result<bool> {
        tracing::info!("cancel_enrollment requested");
        self.engine.cancel_enrollment().await.map_err(to_fdo)
    }

    /// Identify every embedding in a detection frame and mark attendance
    /// for accepted matches. Returns per-face outcomes as JSON.
    async fn recognize(&self, frame_json: &str) -> zbus::fdo::Result<String> {
        let frame = parse_frame(frame_json)?;
        let outcomes = self.engine.recognize(frame).await.map_err(to_fdo)?;
        to_json(&outcomes)
    }

    /// List enrolled identities as JSON.
    async fn list_identities(&self) -> zbus::fdo::Result<String> {
        let identities = self.engine.list_identities().await.map_err(to_fdo)?;
        to_json(&identities)
    }

    /// Attendance records for one identity, newest first, as JSON.
    async fn records_for(&self, name: &str) -> zbus::fdo::Result<String> {
        let records = self
            .engine
            .records_for(name.to_string())
            .await
            .map_err(to_fdo)?;
        to_json(&records)
    }

    /// Per-identity and overall attendance summary as JSON.
    async fn report(&self) -> zbus::fdo::Result<String> {
        let report = self.engine.report().await.map_err(to_fdo)?;
        to_json(&report)
    }

    /// Daemon status information as JSON.
    async fn status(&self) -> zbus::fdo::Result<String> {
        let status = self.engine.status().await.map_err(to_fdo)?;
        Ok(serde_json::json!({
            "version": env!("CARGO_PKG_VERSION"),
            "registered_count": status.registered_count,
            "total_records": status.total_records,
            "enrollment_active": status.enrollment_active,
        })
        .to_string())
    }

    /// Wipe every identity and attendance record.
    async fn clear_all(&self) -> zbus::fdo::Result<bool> {
        tracing::warn!("clear_all requested");
        self.engine.clear_all().await.map_err(to_fdo)?;
        Ok(true)
    }
}
