use std::collections::HashMap;
use tokio::sync::Mutex;

use crate::types::{CaptureHandle, PodKey};

/// Active captures by pod. A key is present exactly while its capture runs.
///
/// The lock is held only for the map operation itself; callers never
/// spawn, kill or touch the filesystem while holding it.
#[derive(Debug, Default)]
pub struct CaptureRegistry {
    captures: Mutex<HashMap<PodKey, CaptureHandle>>,
}

impl CaptureRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts the handle unless the pod already has one, in which case the
    /// new handle is given back untouched.
    pub async fn insert(&self, handle: CaptureHandle) -> Result<(), CaptureHandle> {
        let mut guard = self.captures.lock().await;
        if guard.contains_key(&handle.key) {
            return Err(handle);
        }
        guard.insert(handle.key.clone(), handle);
        Ok(())
    }

    pub async fn remove(&self, key: &PodKey) -> Option<CaptureHandle> {
        self.captures.lock().await.remove(key)
    }

    pub async fn contains(&self, key: &PodKey) -> bool {
        self.captures.lock().await.contains_key(key)
    }

    pub async fn keys(&self) -> Vec<PodKey> {
        self.captures.lock().await.keys().cloned().collect()
    }

    pub async fn len(&self) -> usize {
        self.captures.lock().await.len()
    }
}
