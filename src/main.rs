use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use teamnet::agent::{Agent, AgentOptsBuilder};
use teamnet::directory::KeybaseKvStore;
use teamnet::endpoint::StunDiscovery;
use teamnet::identity::KeybaseIdentity;
use teamnet::tunnel::WgQuick;
use tokio::signal;
use tracing::{info, trace};

#[derive(Parser, Debug)]
#[command(name = "teamnet")]
#[command(about = "Private overlay network for a closed team, coordinated through a shared directory")]
struct Cli {
    /// Name of the team whose overlay to join
    team: String,

    /// Location of the generated tunnel configuration
    #[arg(long)]
    config_path: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync + 'static>> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let mut opts = AgentOptsBuilder::default();
    opts.team(cli.team.clone())
        .identity(Arc::new(KeybaseIdentity::new()))
        .directory(Arc::new(KeybaseKvStore::new(&cli.team)))
        .tunnel(Arc::new(WgQuick::new()))
        .discovery(Arc::new(StunDiscovery::new()));
    if let Some(config_path) = cli.config_path {
        opts.config_path(config_path);
    }

    let agent = Agent::start(opts.build()?).await?;

    tokio::select! {
        biased;
        _ = async {
            #[cfg(unix)]
            {
                let mut sigterm = signal::unix::signal(signal::unix::SignalKind::terminate())?;
                let mut sigint = signal::unix::signal(signal::unix::SignalKind::interrupt())?;
                tokio::select! {
                    _ = sigterm.recv() => {
                        info!("Shutdown initiated via SIGTERM.");
                    }
                    _ = sigint.recv() => {
                        info!("Shutdown initiated via SIGINT.");
                    }
                }
            }
            #[cfg(not(unix))]
            {
                signal::ctrl_c().await?;
                info!("Shutdown initiated via Ctrl+C.");
            }
            Ok::<_, std::io::Error>(())
        } => {
            agent.shutdown().await;
        }
        _ = agent.cancelled() => {
            trace!("Agent cancelled.");
            agent.shutdown().await;
        }
    }

    Ok(())
}
