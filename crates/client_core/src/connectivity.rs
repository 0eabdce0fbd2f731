use std::sync::Arc;

use tokio::sync::watch;
use tracing::{info, warn};

/// Process-wide "backend reachable" flag observed by status banners.
#[derive(Clone)]
pub struct ConnectivityIndicator {
    tx: Arc<watch::Sender<bool>>,
}

impl Default for ConnectivityIndicator {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectivityIndicator {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(true);
        Self { tx: Arc::new(tx) }
    }

    pub fn is_connected(&self) -> bool {
        *self.tx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }

    pub fn set_connected(&self, connected: bool) {
        let changed = self.tx.send_if_modified(|current| {
            if *current == connected {
                return false;
            }
            *current = connected;
            true
        });
        if changed {
            if connected {
                info!("recognition backend reachable again");
            } else {
                warn!("recognition backend unreachable");
            }
        }
    }
}
