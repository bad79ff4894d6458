use crate::agent::{AgentOpts, Error};
use crate::crypto::KeyPair;
use crate::directory::Directory;
use crate::endpoint::ExternalEndpoint;
use crate::identity::LocalIdentity;
use crate::names::NameAnnouncer;
use crate::peers::{NetworkState, config_key};
use crate::tunnel::Tunnel;
use std::fs;
use std::net::Ipv6Addr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{trace, warn};

/// Mutable half of the session, guarded by one lock: the state the tunnel
/// was last configured with, plus the handles teardown has to release.
#[derive(Default)]
pub(crate) struct SessionState {
    /// Peer set the running tunnel configuration was generated from. `None`
    /// until the tunnel came up.
    pub(crate) applied: Option<NetworkState>,
    pub(crate) tunnel_up: bool,
    pub(crate) announcer: Option<NameAnnouncer>,
    pub(crate) torn_down: bool,
}

/// The session aggregate. Owns the key material, the identity, the derived
/// address and the collaborator handles; shared between the public [`Agent`]
/// handle and the housekeeping task.
///
/// [`Agent`]: crate::agent::Agent
pub struct AgentInner {
    pub(crate) team: String,
    pub(crate) local: LocalIdentity,
    pub(crate) key_pair: KeyPair,
    pub(crate) endpoint: ExternalEndpoint,
    pub(crate) address: Ipv6Addr,
    pub(crate) directory: Arc<dyn Directory>,
    pub(crate) tunnel: Arc<dyn Tunnel>,
    pub(crate) config_path: PathBuf,
    pub(crate) poll_interval: Duration,
    pub(crate) announce_names: bool,
    pub(crate) cancellation_token: tokio_util::sync::CancellationToken,
    pub(crate) session: Mutex<SessionState>,
}

impl AgentInner {
    pub(crate) fn new(
        opts: AgentOpts,
        local: LocalIdentity,
        key_pair: KeyPair,
        endpoint: ExternalEndpoint,
        address: Ipv6Addr,
        cancellation_token: tokio_util::sync::CancellationToken,
    ) -> Self {
        Self {
            team: opts.team,
            local,
            key_pair,
            endpoint,
            address,
            directory: opts.directory,
            tunnel: opts.tunnel,
            config_path: opts.config_path,
            poll_interval: opts.poll_interval,
            announce_names: opts.announce_names,
            cancellation_token,
            session: Mutex::new(SessionState::default()),
        }
    }

    /// Local hostname announced for this device.
    pub(crate) fn hostname(&self) -> String {
        format!(
            "{}.{}.local",
            self.local.device.to_lowercase().replace(' ', "-"),
            self.team
        )
    }

    /// Writes the configuration artifact, creating it with owner-only
    /// permissions. The artifact holds the session's private key.
    pub(crate) fn write_config(&self, contents: &str) -> Result<(), Error> {
        if !self.config_path.exists() {
            fs::write(&self.config_path, "")?;

            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                let mut perms = fs::metadata(&self.config_path)?.permissions();
                perms.set_mode(0o600);
                fs::set_permissions(&self.config_path, perms)?;
            }
        }

        fs::write(&self.config_path, contents)?;
        trace!("Wrote tunnel config to {}", self.config_path.display());
        Ok(())
    }

    /// Releases everything the session acquired: tunnel interface,
    /// configuration artifact, the published directory record, and the
    /// announcer process. Each step is attempted even if an earlier one
    /// failed; stale directory or interface state is worse than a logged
    /// warning. Idempotent.
    pub(crate) async fn teardown(&self) {
        let mut session = self.session.lock().await;
        if session.torn_down {
            trace!("Teardown already ran.");
            return;
        }
        session.torn_down = true;

        if session.tunnel_up {
            if let Err(e) = self.tunnel.down(&self.config_path).await {
                warn!("Failed to bring tunnel down: {e}");
            }
            session.tunnel_up = false;
        }

        if let Err(e) = fs::remove_file(&self.config_path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(
                    "Failed to remove config artifact {}: {e}",
                    self.config_path.display()
                );
            }
        }

        if let Err(e) = self
            .directory
            .delete(&config_key(&self.local.device_id))
            .await
        {
            warn!("Failed to delete own directory record: {e}");
        }

        if let Some(announcer) = session.announcer.take() {
            announcer.terminate().await;
        }
    }
}
