//! The session state machine.
//!
//! A session moves through `INIT → PUBLISHED → UP → (POLLING ⇄ RECONCILING)`
//! and ends in `TEARDOWN`. [`Agent::start`] performs the fallible startup
//! half (identity, key material, endpoint discovery, publishing the local
//! record); a single spawned housekeeping task then brings the tunnel up and
//! keeps reconciling it against the directory until the session is
//! cancelled. There is never more than one reconciliation cycle in flight.

mod error;
mod housekeeping;
mod inner;
mod opts;

use crate::addr::{derive_address, format_address, team_subnet, user_subnet};
use crate::crypto::KeyPair;
use crate::peers::{PeerRecord, config_key};
pub use error::*;
pub use inner::*;
pub use opts::*;
use std::sync::Arc;
use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};
use tracing::{info, trace};

pub struct Agent {
    pub(crate) inner: Arc<AgentInner>,
}

impl Drop for Agent {
    fn drop(&mut self) {
        trace!("Drop agent. Cancel token.");
        self.inner.cancellation_token.cancel();
    }
}

impl Agent {
    /// Starts a session: resolves the local identity, generates session key
    /// material, discovers the external endpoint, derives the overlay
    /// address and publishes the local record. Any failure here aborts the
    /// session before anything was brought up. On success a housekeeping
    /// task owns the rest of the session.
    pub async fn start(opts: AgentOpts) -> Result<Self, Error> {
        let local = opts.identity.local_identity().await?;
        info!("I am {}@{} (device {})", local.user, opts.team, local.device);

        let members = opts.identity.team_members(&opts.team).await?;
        info!(
            "Team '{}' has {} member(s): {}",
            opts.team,
            members.len(),
            members
                .iter()
                .map(|m| m.name.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        );

        let key_pair = KeyPair::generate();
        let endpoint = opts.discovery.discover().await?;
        info!(
            "External endpoint: {}:{} (NAT type: {})",
            endpoint.external_ip, endpoint.external_port, endpoint.nat_type
        );

        let address = derive_address(&opts.team, &local.user, &local.device);
        info!("Overlay address: {address}");
        info!(
            "Team subnet: {}, user subnet: {}",
            format_address(&team_subnet(&opts.team).addr().octets()[..6]),
            format_address(&user_subnet(&opts.team, &local.user).addr().octets()[..11]),
        );

        // publish the local record; from here on the session is visible to
        // the rest of the team
        let record = PeerRecord {
            device_id: local.device_id.clone(),
            public_key: key_pair.pk.to_base64(),
            internal_ip: address.to_string(),
            external_ip: endpoint.external_ip.clone(),
            external_port: endpoint.external_port.to_string(),
        };
        opts.directory
            .put(&config_key(&local.device_id), &serde_json::to_string(&record)?)
            .await?;
        trace!("Published local record under {}", config_key(&local.device_id));

        let cancellation_token = CancellationToken::new();
        let inner = Arc::new(AgentInner::new(
            opts,
            local,
            key_pair,
            endpoint,
            address,
            cancellation_token,
        ));

        tokio::spawn(AgentInner::housekeeping_runner(
            inner.clone(),
            inner.cancellation_token.child_token(),
        ));

        Ok(Self { inner })
    }

    /// Resolves once the session has been cancelled, either by [`shutdown`]
    /// or by a fatal mid-session error.
    ///
    /// [`shutdown`]: Agent::shutdown
    pub fn cancelled(&self) -> WaitForCancellationFuture<'_> {
        self.inner.cancellation_token.cancelled()
    }

    /// Cancels the session and runs the teardown sequence to completion.
    /// Every step is attempted even if an earlier one fails; calling this a
    /// second time is a no-op.
    pub async fn shutdown(&self) {
        info!("Shutdown agent.");
        self.inner.cancellation_token.cancel();
        self.inner.teardown().await;
        info!("Agent shut down.");
    }
}
