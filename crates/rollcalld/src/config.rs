use std::path::PathBuf;

use rollcall_core::{MATCH_THRESHOLD, SAMPLES_REQUIRED, UNIQUENESS_THRESHOLD};

/// Daemon configuration, loaded from environment variables.
pub struct Config {
    /// Path to the SQLite database file.
    pub db_path: PathBuf,
    /// Distance below which a live probe identifies an enrolled identity.
    pub match_threshold: f32,
    /// Distance below which a registration candidate counts as an already
    /// enrolled person.
    pub uniqueness_threshold: f32,
    /// Accepted samples required to finalize an enrollment.
    pub samples_per_enrollment: usize,
}

impl Config {
    /// Load configuration from `ROLLCALL_*` environment variables with defaults.
    pub fn from_env() -> Self {
        let data_dir = std::env::var("XDG_DATA_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| {
                let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
                PathBuf::from(home).join(".local/share")
            })
            .join("rollcall");

        let db_path = std::env::var("ROLLCALL_DB_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| data_dir.join("attendance.db"));

        Self {
            db_path,
            match_threshold: env_f32("ROLLCALL_MATCH_THRESHOLD", MATCH_THRESHOLD),
            uniqueness_threshold: env_f32("ROLLCALL_UNIQUENESS_THRESHOLD", UNIQUENESS_THRESHOLD),
            samples_per_enrollment: env_usize("ROLLCALL_SAMPLES_PER_ENROLLMENT", SAMPLES_REQUIRED),
        }
    }
}

fn env_f32(key: &str, default: f32) -> f32 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_usize(key: &str, default: usize) -> usize {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
