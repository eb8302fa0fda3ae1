use futures::stream::{Stream, StreamExt};
use k8s_openapi::api::core::v1::Pod;
use kube::runtime::watcher::{self, Config as WatcherConfig, Event, watcher};
use kube::{Api, Client};
use std::collections::HashSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::manager::CaptureManager;
use crate::types::PodKey;

/// Field selector restricting a watch to pods scheduled on `node_name`.
pub fn node_field_selector(node_name: &str) -> String {
    format!("spec.nodeName={}", node_name)
}

/// Opens a watch on all pods of the local node. Every (re)start begins
/// with a fresh listing of the node's pods.
pub fn node_pod_events(
    client: Client,
    node_name: &str,
) -> impl Stream<Item = Result<Event<Pod>, watcher::Error>> + Send + use<> {
    let pods_api: Api<Pod> = Api::all(client);
    let cfg = WatcherConfig::default().fields(&node_field_selector(node_name));
    watcher(pods_api, cfg)
}

/// Feeds pod events into the capture manager until the stream ends or
/// `shutdown` is cancelled.
///
/// Shutdown is only observed between events, so a reconcile or stop that
/// has begun always runs to completion. A pod that fails to deserialize is
/// skipped. Any other watch error ends this watch; reconnecting is the
/// caller's job.
pub async fn watch_pods<S>(
    stream: S,
    manager: &CaptureManager,
    prune_on_resync: bool,
    shutdown: &CancellationToken,
) where
    S: Stream<Item = Result<Event<Pod>, watcher::Error>>,
{
    let mut stream = std::pin::pin!(stream);
    let mut listed: HashSet<PodKey> = HashSet::new();

    loop {
        let next = tokio::select! {
            biased;
            _ = shutdown.cancelled() => {
                debug!("Pod watch cancelled");
                return;
            }
            next = stream.next() => next,
        };
        let Some(event) = next else {
            break;
        };

        let event = match event {
            Ok(event) => event,
            Err(watcher::Error::WatchFailed(kube::Error::SerdeError(e))) => {
                debug!("Ignoring undecodable pod event: {}", e);
                continue;
            }
            Err(e) => {
                warn!("Pod watch failed: {}", e);
                return;
            }
        };

        match event {
            Event::Init => {
                info!("Listing pods on this node");
                listed.clear();
            }
            Event::InitApply(pod) => {
                if let Some(key) = PodKey::from_pod(&pod) {
                    listed.insert(key);
                }
                manager.reconcile(&pod).await;
            }
            Event::InitDone => {
                info!("Pod listing complete, {} pods on this node", listed.len());
                if prune_on_resync {
                    manager.prune(&listed).await;
                }
                listed.clear();
            }
            Event::Apply(pod) => manager.reconcile(&pod).await,
            Event::Delete(pod) => match PodKey::from_pod(&pod) {
                Some(key) => manager.stop(&key).await,
                None => debug!("Ignoring deleted pod without a name"),
            },
        }
    }

    debug!("Pod watch stream closed");
}
