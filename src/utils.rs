use std::path::{Path, PathBuf};

/// Base file name prefix shared by every rotated file of a pod's capture.
pub fn artifact_prefix(pod_name: &str) -> String {
    format!("capture-{}.pcap", pod_name)
}

/// Path handed to the capture binary; rotation appends a numeric suffix.
pub fn artifact_path(dir: &Path, pod_name: &str) -> PathBuf {
    dir.join(artifact_prefix(pod_name))
}

/// Glob pattern listing the rotated files written from `output`.
pub fn artifact_glob(output: &Path) -> String {
    format!("{}*", glob::Pattern::escape(&output.to_string_lossy()))
}

/// True only when the file's base name starts with the exact base name of
/// `output`, so `capture-foo2.pcap` never counts as a file of `capture-foo.pcap`.
pub fn is_artifact_of(path: &Path, output: &Path) -> bool {
    let Some(prefix) = output.file_name().and_then(|n| n.to_str()) else {
        return false;
    };
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.starts_with(prefix))
}

/// Human readable run time of a capture.
pub fn format_uptime(started_at: chrono::DateTime<chrono::Utc>) -> String {
    let total_secs = chrono::Utc::now()
        .signed_duration_since(started_at)
        .num_seconds()
        .max(0);
    if total_secs < 60 {
        format!("{}s", total_secs)
    } else if total_secs < 3600 {
        format!("{}m", total_secs / 60)
    } else if total_secs < 86400 {
        format!("{}h", total_secs / 3600)
    } else {
        format!("{}d", total_secs / 86400)
    }
}
