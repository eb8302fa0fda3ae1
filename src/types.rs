use k8s_openapi::api::core::v1::Pod;
use std::fmt;
use std::path::PathBuf;

use crate::capture::CaptureProcess;

/// Identity of a pod for capture bookkeeping.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PodKey {
    pub namespace: String,
    pub name: String,
}

impl PodKey {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    /// Returns None for objects without a name; those are never captured.
    pub fn from_pod(pod: &Pod) -> Option<Self> {
        let name = pod.metadata.name.clone()?;
        let namespace = pod
            .metadata
            .namespace
            .clone()
            .unwrap_or_else(|| "default".to_string());
        Some(Self::new(namespace, name))
    }
}

impl fmt::Display for PodKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// The fields of a pod the capture lifecycle looks at.
#[derive(Debug, Clone)]
pub struct PodState {
    pub key: PodKey,
    pub running: bool,
    pub pod_ip: Option<String>,
    pub capture_param: Option<String>,
}

impl PodState {
    pub fn from_pod(pod: &Pod, annotation_key: &str) -> Option<Self> {
        let key = PodKey::from_pod(pod)?;
        let status = pod.status.as_ref();
        let running = status.and_then(|s| s.phase.as_deref()) == Some("Running");
        let pod_ip = status
            .and_then(|s| s.pod_ip.clone())
            .filter(|ip| !ip.is_empty());
        let capture_param = pod
            .metadata
            .annotations
            .as_ref()
            .and_then(|a| a.get(annotation_key))
            .cloned();
        Some(Self {
            key,
            running,
            pod_ip,
            capture_param,
        })
    }
}

/// Fixed parameters for every capture this node runs.
#[derive(Debug, Clone)]
pub struct CaptureSettings {
    pub annotation_key: String,
    pub capture_dir: PathBuf,
    pub binary: PathBuf,
    pub file_size_mb: u32,
    pub interface: String,
}

/// What a spawner needs to launch one capture.
#[derive(Debug, Clone)]
pub struct CaptureRequest {
    pub key: PodKey,
    pub binary: PathBuf,
    pub output: PathBuf,
    pub file_size_mb: u32,
    pub max_files: String,
    pub interface: String,
}

/// A running capture, owned by the registry until it is stopped.
pub struct CaptureHandle {
    pub key: PodKey,
    pub process: Box<dyn CaptureProcess>,
    pub output: PathBuf,
    pub max_files: String,
    pub started_at: chrono::DateTime<chrono::Utc>,
}

impl fmt::Debug for CaptureHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CaptureHandle")
            .field("key", &self.key)
            .field("pid", &self.process.id())
            .field("output", &self.output)
            .field("max_files", &self.max_files)
            .field("started_at", &self.started_at)
            .finish()
    }
}
