use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};

/// Cadence at which enrollment frames are fed to the daemon.
const ENROLL_TICK: Duration = Duration::from_millis(1000);
/// Cadence at which recognition frames are fed to the daemon.
const RECOGNIZE_TICK: Duration = Duration::from_millis(500);

#[derive(Parser)]
#[command(name = "rollcall", about = "Rollcall attendance CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Enroll a new identity from a file of detection frames
    Enroll {
        /// Name to enroll
        name: String,
        /// JSON file: an array of frames, each an array of embeddings
        #[arg(short, long)]
        frames: PathBuf,
    },
    /// Recognize faces and mark attendance from a file of detection frames
    Recognize {
        /// JSON file: an array of frames, each an array of embeddings
        #[arg(short, long)]
        frames: PathBuf,
    },
    /// List enrolled identities
    List,
    /// Show attendance records for one identity, newest first
    Records {
        /// Identity name
        name: String,
    },
    /// Show the per-identity and overall attendance summary
    Report,
    /// Show daemon status
    Status,
    /// Delete every identity and attendance record
    Clear {
        /// Confirm the wipe
        #[arg(long)]
        yes: bool,
    },
}

#[zbus::proxy(
    interface = "org.rollcall.Attendance1",
    default_service = "org.rollcall.Attendance1",
    default_path = "/org/rollcall/Attendance1"
)]
trait Attendance {
    async fn begin_enrollment(&self, name: &str) -> zbus::Result<()>;
    async fn submit_enrollment_frame(&self, frame_json: &str) -> zbus::Result<String>;
    async fn cancel_enrollment(&self) -> zbus::Result<bool>;
    async fn recognize(&self, frame_json: &str) -> zbus::Result<String>;
    async fn list_identities(&self) -> zbus::Result<String>;
    async fn records_for(&self, name: &str) -> zbus::Result<String>;
    async fn report(&self) -> zbus::Result<String>;
    async fn status(&self) -> zbus::Result<String>;
    async fn clear_all(&self) -> zbus::Result<bool>;
}

/// Detection frames as produced by the external detector: each frame holds
/// the embeddings found in one capture.
type Frames = Vec<Vec<Vec<f32>>>;

fn load_frames(path: &Path) -> Result<Frames> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading frames file {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parsing frames file {}", path.display()))
}

/// Re-indent a JSON payload for terminal display.
fn pretty(json: &str) -> Result<String> {
    let value: serde_json::Value = serde_json::from_str(json)?;
    Ok(serde_json::to_string_pretty(&value)?)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    let conn = zbus::Connection::session()
        .await
        .context("connecting to the session bus (is rollcalld running?)")?;
    let proxy = AttendanceProxy::new(&conn).await?;

    match cli.command {
        Commands::Enroll { name, frames } => enroll(&proxy, &name, &frames).await?,
        Commands::Recognize { frames } => recognize(&proxy, &frames).await?,
        Commands::List => println!("{}", pretty(&proxy.list_identities().await?)?),
        Commands::Records { name } => println!("{}", pretty(&proxy.records_for(&name).await?)?),
        Commands::Report => println!("{}", pretty(&proxy.report().await?)?),
        Commands::Status => println!("{}", pretty(&proxy.status().await?)?),
        Commands::Clear { yes } => {
            if !yes {
                bail!("refusing to wipe attendance data without --yes");
            }
            proxy.clear_all().await?;
            println!("All identities and attendance records cleared.");
        }
    }

    Ok(())
}

/// Drive an enrollment session: one frame per tick until the daemon reports
/// completion or rejection. The daemon owns the matching logic; this loop
/// owns the cadence and the cancellation path.
async fn enroll(proxy: &AttendanceProxy<'_>, name: &str, frames_path: &Path) -> Result<()> {
    let frames = load_frames(frames_path)?;
    proxy.begin_enrollment(name).await?;
    println!("Enrollment started for {name}.");

    for frame in &frames {
        let progress_json = proxy
            .submit_enrollment_frame(&serde_json::to_string(frame)?)
            .await?;
        let progress: serde_json::Value = serde_json::from_str(&progress_json)?;

        match progress["step"].as_str() {
            Some("rejected") => bail!(
                "enrollment rejected: face already registered as '{}' ({}% match)",
                progress["existing"].as_str().unwrap_or("?"),
                progress["similarity_percent"]
            ),
            Some("no_face") => println!("No face in frame, retrying..."),
            Some("multiple_faces") => println!("Multiple faces in frame, retrying..."),
            Some("sampled") => println!(
                "Captured {}/{} samples",
                progress["captured"], progress["required"]
            ),
            Some("enrolled") => {
                println!("Enrolled {name} with {} samples.", progress["samples"]);
                return Ok(());
            }
            _ => bail!("unexpected enrollment step: {progress_json}"),
        }

        tokio::time::sleep(ENROLL_TICK).await;
    }

    // Frames ran out before the session finalized; leave no partial state.
    proxy.cancel_enrollment().await?;
    bail!("frames exhausted before enrollment completed; session cancelled")
}

async fn recognize(proxy: &AttendanceProxy<'_>, frames_path: &Path) -> Result<()> {
    let frames = load_frames(frames_path)?;

    for (i, frame) in frames.iter().enumerate() {
        let outcomes_json = proxy.recognize(&serde_json::to_string(frame)?).await?;
        let outcomes: serde_json::Value = serde_json::from_str(&outcomes_json)?;

        for outcome in outcomes.as_array().into_iter().flatten() {
            match outcome["outcome"].as_str() {
                Some("marked") => println!(
                    "Attendance marked for {} ({}% confidence)",
                    outcome["name"].as_str().unwrap_or("?"),
                    outcome["confidence_percent"]
                ),
                Some("already_marked") => println!(
                    "{}: already marked today",
                    outcome["name"].as_str().unwrap_or("?")
                ),
                Some("unknown") => println!(
                    "Unknown face ({}% similarity, below acceptance)",
                    outcome["similarity_percent"]
                ),
                _ => println!("Unexpected outcome: {outcome}"),
            }
        }

        if i + 1 < frames.len() {
            tokio::time::sleep(RECOGNIZE_TICK).await;
        }
    }

    Ok(())
}
