//! Best-effort local name announcement.
//!
//! If an mDNS publisher is installed, the device's overlay address is
//! announced under a friendly hostname for as long as the session lives. The
//! publisher is optional: a machine without it simply runs without the
//! naming feature.

use crate::util;
use std::net::Ipv6Addr;
use tokio::process::{Child, Command};
use tracing::{trace, warn};

/// Handle on the announcer child process. Dropping without
/// [`NameAnnouncer::terminate`] leaves the child to the runtime's reaping.
pub struct NameAnnouncer {
    child: Child,
    hostname: String,
}

impl NameAnnouncer {
    /// Spawns the announcer for `(hostname, address)`. Returns `None` when
    /// the publisher is unavailable; the session proceeds without it.
    pub fn spawn(hostname: &str, address: Ipv6Addr) -> Option<Self> {
        let bin: String = util::get_env("ANNOUNCE_BIN", "avahi-publish".to_string());
        match Command::new(&bin)
            .args(["-a", hostname, &address.to_string()])
            .kill_on_drop(true)
            .spawn()
        {
            Ok(child) => {
                trace!("Announcing {hostname} -> {address} via {bin}");
                Some(Self {
                    child,
                    hostname: hostname.to_string(),
                })
            }
            Err(e) => {
                warn!("Name announcement unavailable ({bin}: {e}); continuing without it");
                None
            }
        }
    }

    /// Stops the announcer. Best-effort; a failure only logs.
    pub async fn terminate(mut self) {
        trace!("Stopping announcer for {}", self.hostname);
        if let Err(e) = self.child.kill().await {
            warn!("Failed to stop announcer for {}: {e}", self.hostname);
        }
    }
}
