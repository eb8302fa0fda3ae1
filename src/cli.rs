use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

use crate::runner::RestartPolicy;
use crate::types::CaptureSettings;

#[derive(Parser, Debug)]
#[command(name = "pcap-controller")]
#[command(about = "Toggle per-pod packet captures on this node from a pod annotation")]
pub struct Cli {
    /// Name of the node this controller runs on
    #[arg(long, env = "NODE_NAME")]
    pub node_name: String,

    /// Annotation key whose value is the maximum number of rotated capture files
    #[arg(long, env = "CAPTURE_ANNOTATION", default_value = "tcpdump.antrea.io")]
    pub annotation: String,

    /// Directory where capture files are written
    #[arg(long, env = "CAPTURE_DIR", default_value = "/tmp")]
    pub capture_dir: PathBuf,

    /// Packet capture binary
    #[arg(long, env = "TCPDUMP_BIN", default_value = "tcpdump")]
    pub tcpdump_bin: PathBuf,

    /// Size of each capture file in MB
    #[arg(long, env = "CAPTURE_FILE_SIZE", default_value_t = 1)]
    pub file_size: u32,

    /// Interface to capture on
    #[arg(long, env = "CAPTURE_INTERFACE", default_value = "any")]
    pub interface: String,

    /// Seconds to wait before re-establishing a closed pod watch
    #[arg(long, env = "RECONNECT_DELAY_SECS", default_value_t = 5)]
    pub reconnect_delay: u64,

    /// Give up after this many reconnects (unbounded by default)
    #[arg(long, env = "MAX_RESTARTS")]
    pub max_restarts: Option<u32>,

    /// Stop captures for pods missing from the listing after a reconnect
    #[arg(long, env = "PRUNE_ON_RESYNC")]
    pub prune_on_resync: bool,

    /// Verbose output
    #[arg(short, long)]
    pub verbose: bool,
}

impl Cli {
    pub fn capture_settings(&self) -> CaptureSettings {
        CaptureSettings {
            annotation_key: self.annotation.clone(),
            capture_dir: self.capture_dir.clone(),
            binary: self.tcpdump_bin.clone(),
            file_size_mb: self.file_size,
            interface: self.interface.clone(),
        }
    }

    pub fn restart_policy(&self) -> RestartPolicy {
        RestartPolicy {
            delay: Duration::from_secs(self.reconnect_delay),
            max_restarts: self.max_restarts,
        }
    }
}
