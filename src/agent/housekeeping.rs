use crate::agent::Error;
use crate::agent::inner::AgentInner;
use crate::names::NameAnnouncer;
use crate::peers::fetch_network_state;
use crate::tunnel::generate_config;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument, trace};

impl AgentInner {
    /// Owns the session from PUBLISHED onwards: brings the tunnel up once,
    /// then polls the directory on a fixed interval and reconciles. A tunnel
    /// failure cancels the whole session; there is no retry.
    pub(crate) async fn housekeeping_runner(inner: Arc<AgentInner>, shutdown: CancellationToken) {
        if shutdown.is_cancelled() {
            return;
        }

        if let Err(e) = inner.bring_up().await {
            error!("Failed to bring tunnel up: {e}");
            inner.cancellation_token.cancel();
            return;
        }

        let mut interval = tokio::time::interval(inner.poll_interval);
        interval.tick().await; // first tick completes immediately

        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                _ = interval.tick() => {
                    if let Err(e) = inner.reconcile().await {
                        error!("Error in reconciliation: {e}");
                        inner.cancellation_token.cancel();
                        break;
                    }
                }
            }
        }
    }

    /// PUBLISHED → UP: fetch the initial peer set, apply the first tunnel
    /// configuration and start the optional name announcement. Holds the
    /// session lock throughout so a concurrent teardown is serialized
    /// against it.
    #[instrument(skip_all)]
    async fn bring_up(&self) -> Result<(), Error> {
        let mut session = self.session.lock().await;
        if session.torn_down {
            return Ok(());
        }

        let state = fetch_network_state(self.directory.as_ref(), &self.local.device_id).await?;
        info!("Initial peer set has {} record(s)", state.len());

        let config = generate_config(
            &self.key_pair.sk,
            self.address,
            self.endpoint.external_port,
            &state,
        );
        self.write_config(&config)?;
        self.tunnel.up(&self.config_path).await?;
        session.tunnel_up = true;
        session.applied = Some(state);

        if self.announce_names {
            session.announcer = NameAnnouncer::spawn(&self.hostname(), self.address);
        }

        Ok(())
    }

    /// POLLING → RECONCILING: re-fetch the peer set and compare it with the
    /// applied one. Identical sets are a no-op cycle; any addition, removal
    /// or changed record replaces the running configuration wholesale
    /// (down, rewrite, up).
    #[instrument(skip_all)]
    async fn reconcile(&self) -> Result<(), Error> {
        let mut session = self.session.lock().await;
        if session.torn_down {
            return Ok(());
        }

        let current = fetch_network_state(self.directory.as_ref(), &self.local.device_id).await?;
        let Some(applied) = session.applied.as_ref() else {
            return Ok(());
        };

        let added = current
            .keys()
            .filter(|key| !applied.contains_key(*key))
            .count();
        let removed = applied
            .keys()
            .filter(|key| !current.contains_key(*key))
            .count();
        let changed = current
            .iter()
            .filter(|(key, record)| applied.get(*key).is_some_and(|old| old != *record))
            .count();

        if added == 0 && removed == 0 && changed == 0 {
            trace!("No change in peer set.");
            return Ok(());
        }

        info!(
            "Peer set drifted ({added} added, {removed} removed, {changed} changed); replacing tunnel configuration"
        );

        let config = generate_config(
            &self.key_pair.sk,
            self.address,
            self.endpoint.external_port,
            &current,
        );
        self.tunnel.down(&self.config_path).await?;
        self.write_config(&config)?;
        self.tunnel.up(&self.config_path).await?;
        session.applied = Some(current);

        Ok(())
    }
}
