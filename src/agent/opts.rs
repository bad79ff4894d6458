use crate::directory::Directory;
use crate::endpoint::EndpointDiscovery;
use crate::identity::IdentityProvider;
use crate::tunnel::Tunnel;
use crate::util;
use derive_builder::Builder;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Default interval between two directory polls in milliseconds. The poll is
/// the sole suspension point of the steady-state loop; peers published by
/// other participants become visible within one or two intervals.
pub const POLL_INTERVAL_MS_DEFAULT: u64 = 10_000;

/// Default location of the generated tunnel configuration. The file name
/// doubles as the tunnel interface name.
pub fn config_path_default() -> PathBuf {
    std::env::temp_dir().join("teamnet0.conf")
}

fn poll_interval_default() -> Duration {
    Duration::from_millis(util::get_env("POLL_INTERVAL_MS", POLL_INTERVAL_MS_DEFAULT))
}

/// Options for starting an [`Agent`].
///
/// The four collaborator handles are required; everything else has defaults
/// that can be overridden through [`AgentOptsBuilder`].
///
/// [`Agent`]: crate::agent::Agent
#[derive(Clone, Builder)]
pub struct AgentOpts {
    /// Name of the team whose overlay this session joins.
    pub team: String,
    pub identity: Arc<dyn IdentityProvider>,
    pub directory: Arc<dyn Directory>,
    pub tunnel: Arc<dyn Tunnel>,
    pub discovery: Arc<dyn EndpointDiscovery>,
    #[builder(default = "config_path_default()")]
    pub config_path: PathBuf,
    #[builder(default = "poll_interval_default()")]
    pub poll_interval: Duration,
    /// Whether to announce the overlay address under a local hostname.
    #[builder(default = "true")]
    pub announce_names: bool,
}
