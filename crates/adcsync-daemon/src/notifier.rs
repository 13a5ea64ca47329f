//! Networking notifier publishing snapshots to the REST surface

use adcsync_deployer::NetworkingNotifier;
use adcsync_types::NetworkingSnapshot;
use tokio::sync::watch;
use tracing::info;

/// Keeps the latest snapshot in a watch channel
pub struct WatchNotifier {
    tx: watch::Sender<NetworkingSnapshot>,
}

impl Default for WatchNotifier {
    fn default() -> Self {
        Self::new()
    }
}

impl WatchNotifier {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(NetworkingSnapshot::default());
        Self { tx }
    }

    pub fn subscribe(&self) -> watch::Receiver<NetworkingSnapshot> {
        self.tx.subscribe()
    }
}

impl NetworkingNotifier for WatchNotifier {
    fn publish(&self, snapshot: &NetworkingSnapshot) {
        info!(
            members = snapshot.members.len(),
            request_id = ?snapshot.request_id,
            "Publishing networking snapshot"
        );
        self.tx.send_replace(snapshot.clone());
    }
}
