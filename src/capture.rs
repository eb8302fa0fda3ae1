use std::process::Stdio;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, ChildStderr, Command};
use tracing::{debug, info};

use crate::types::{CaptureRequest, PodKey};

#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("failed to spawn {binary}: {source}")]
    Spawn {
        binary: String,
        #[source]
        source: std::io::Error,
    },
    #[error("capture process for {0} has no stderr pipe")]
    MissingStderr(PodKey),
    #[error("failed to kill capture process: {0}")]
    Kill(#[source] std::io::Error),
}

/// A running capture process.
pub trait CaptureProcess: Send {
    fn id(&self) -> Option<u32>;

    /// Signals the process to terminate without waiting for it.
    fn kill(&mut self) -> Result<(), CaptureError>;
}

/// Launches capture processes.
pub trait CaptureSpawner: Send + Sync {
    fn spawn(&self, request: &CaptureRequest) -> Result<Box<dyn CaptureProcess>, CaptureError>;
}

/// Command line for one capture: `-C` MB per file, `-W` files kept,
/// `-w` output base path, `-i` interface, `-n` no name resolution.
pub fn capture_args(request: &CaptureRequest) -> Vec<String> {
    vec![
        "-C".to_string(),
        request.file_size_mb.to_string(),
        "-W".to_string(),
        request.max_files.clone(),
        "-w".to_string(),
        request.output.to_string_lossy().into_owned(),
        "-i".to_string(),
        request.interface.clone(),
        "-n".to_string(),
    ]
}

/// Spawns the real tcpdump binary.
#[derive(Debug, Default, Clone)]
pub struct TcpdumpSpawner;

impl CaptureSpawner for TcpdumpSpawner {
    fn spawn(&self, request: &CaptureRequest) -> Result<Box<dyn CaptureProcess>, CaptureError> {
        let mut child = Command::new(&request.binary)
            .args(capture_args(request))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| CaptureError::Spawn {
                binary: request.binary.display().to_string(),
                source,
            })?;

        let Some(stderr) = child.stderr.take() else {
            if let Err(e) = child.start_kill() {
                debug!("Failed to kill capture for {} without stderr: {}", request.key, e);
            }
            return Err(CaptureError::MissingStderr(request.key.clone()));
        };
        tokio::spawn(drain_stderr(request.key.clone(), stderr));

        Ok(Box::new(TcpdumpProcess { child }))
    }
}

/// Keeps the stderr pipe empty so the capture never blocks on a full buffer.
/// Detached: it ends by itself once the process closes the pipe.
async fn drain_stderr(key: PodKey, stderr: ChildStderr) {
    let mut lines = BufReader::new(stderr).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => info!("tcpdump stderr for {}: {}", key, line),
            Ok(None) => break,
            Err(e) => {
                debug!("Stopped reading tcpdump stderr for {}: {}", key, e);
                break;
            }
        }
    }
}

struct TcpdumpProcess {
    child: Child,
}

impl CaptureProcess for TcpdumpProcess {
    fn id(&self) -> Option<u32> {
        self.child.id()
    }

    fn kill(&mut self) -> Result<(), CaptureError> {
        // tokio reaps the child in the background once it is dropped.
        self.child.start_kill().map_err(CaptureError::Kill)
    }
}
