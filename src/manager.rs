use k8s_openapi::api::core::v1::Pod;
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::capture::CaptureSpawner;
use crate::registry::CaptureRegistry;
use crate::types::{CaptureHandle, CaptureRequest, CaptureSettings, PodKey, PodState};
use crate::utils::{artifact_glob, artifact_path, format_uptime, is_artifact_of};

/// Maps the capture annotation of local pods onto running capture processes.
///
/// This is the only component that touches the registry, spawns or kills
/// capture processes, or deletes capture files.
pub struct CaptureManager {
    settings: CaptureSettings,
    spawner: Arc<dyn CaptureSpawner>,
    registry: CaptureRegistry,
}

impl CaptureManager {
    pub fn new(settings: CaptureSettings, spawner: Arc<dyn CaptureSpawner>) -> Self {
        Self {
            settings,
            spawner,
            registry: CaptureRegistry::new(),
        }
    }

    pub fn registry(&self) -> &CaptureRegistry {
        &self.registry
    }

    /// Handles an added or modified pod.
    ///
    /// Only Running pods are considered. An annotation change on a pod that
    /// is already capturing does not restart the capture: the first value
    /// wins until the capture is stopped.
    pub async fn reconcile(&self, pod: &Pod) {
        let Some(state) = PodState::from_pod(pod, &self.settings.annotation_key) else {
            debug!("Ignoring pod without a name");
            return;
        };
        if !state.running {
            return;
        }

        let capturing = self.registry.contains(&state.key).await;
        match (capturing, state.capture_param.as_deref()) {
            (false, Some(param)) => self.start(&state, param).await,
            (true, None) => self.stop(&state.key).await,
            _ => {}
        }
    }

    /// Starts a capture for the pod. Pods without an IP are skipped and
    /// picked up again by a later update once the network is attached.
    pub async fn start(&self, state: &PodState, max_files: &str) {
        let key = &state.key;
        if state.pod_ip.is_none() {
            warn!("Pod {} has no IP yet, skipping capture", key);
            return;
        }

        let request = CaptureRequest {
            key: key.clone(),
            binary: self.settings.binary.clone(),
            output: artifact_path(&self.settings.capture_dir, &key.name),
            file_size_mb: self.settings.file_size_mb,
            max_files: max_files.to_string(),
            interface: self.settings.interface.clone(),
        };

        let process = match self.spawner.spawn(&request) {
            Ok(process) => process,
            Err(e) => {
                error!("Failed to start capture for pod {}: {}", key, e);
                return;
            }
        };
        let pid = process.id();

        let handle = CaptureHandle {
            key: key.clone(),
            process,
            output: request.output,
            max_files: request.max_files,
            started_at: chrono::Utc::now(),
        };

        if let Err(mut duplicate) = self.registry.insert(handle).await {
            warn!(
                "Capture for pod {} registered concurrently, discarding duplicate",
                key
            );
            if let Err(e) = duplicate.process.kill() {
                error!("Failed to kill duplicate capture for pod {}: {}", key, e);
            }
            return;
        }

        info!(
            "Started packet capture for pod {} (pid: {:?}, max files: {})",
            key, pid, max_files
        );
    }

    /// Stops the pod's capture and removes its files. A pod without a
    /// capture is a no-op.
    pub async fn stop(&self, key: &PodKey) {
        let Some(mut handle) = self.registry.remove(key).await else {
            return;
        };

        // A failed kill must not leave files behind, so cleanup always runs.
        if let Err(e) = handle.process.kill() {
            error!("Failed to kill capture for pod {}: {}", key, e);
        }
        self.remove_artifacts(&handle).await;

        info!(
            "Stopped packet capture for pod {} (ran {})",
            key,
            format_uptime(handle.started_at)
        );
    }

    /// Stops every capture whose pod is not in `present`.
    pub async fn prune(&self, present: &HashSet<PodKey>) {
        for key in self.registry.keys().await {
            if !present.contains(&key) {
                info!("Pod {} no longer listed, stopping its capture", key);
                self.stop(&key).await;
            }
        }
    }

    pub async fn stop_all(&self) {
        for key in self.registry.keys().await {
            self.stop(&key).await;
        }
    }

    async fn remove_artifacts(&self, handle: &CaptureHandle) {
        for file in artifact_files(handle) {
            match tokio::fs::remove_file(&file).await {
                Ok(()) => info!("Removed capture file: {}", file.display()),
                Err(e) => error!("Failed to remove capture file {}: {}", file.display(), e),
            }
        }
    }
}

/// Files on disk written by the handle's capture, matched against the
/// output path recorded when it started.
fn artifact_files(handle: &CaptureHandle) -> Vec<PathBuf> {
    let key = &handle.key;
    let paths = match glob::glob(&artifact_glob(&handle.output)) {
        Ok(paths) => paths,
        Err(e) => {
            error!("Failed to find capture files for pod {}: {}", key, e);
            return Vec::new();
        }
    };

    paths
        .filter_map(|entry| match entry {
            Ok(path) => Some(path),
            Err(e) => {
                error!("Failed to read capture file entry for pod {}: {}", key, e);
                None
            }
        })
        .filter(|path| is_artifact_of(path, &handle.output))
        .collect()
}
