//! External endpoint discovery boundary.
//!
//! Peers behind NAT need to publish the address and port at which they are
//! reachable from outside. Discovery is consulted exactly once per session;
//! a mid-session change of the external address is a known gap of the
//! current contract and is not re-checked.

use crate::util;
use thiserror::Error;
use tokio::process::Command;
use tracing::trace;

#[derive(Debug, Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("discovery tool error: {0}")]
    ToolError(String),

    #[error("unparsable discovery output: missing {0}")]
    MissingField(&'static str),
}

/// How the local host is reachable from the public internet.
#[derive(Debug, Clone)]
pub struct ExternalEndpoint {
    pub nat_type: String,
    pub external_ip: String,
    pub external_port: u16,
}

#[async_trait::async_trait]
pub trait EndpointDiscovery: Send + Sync {
    async fn discover(&self) -> Result<ExternalEndpoint, Error>;
}

/// Discovery backend running a STUN client binary and parsing its
/// line-oriented `key: value` report.
pub struct StunDiscovery {
    bin: String,
}

impl StunDiscovery {
    pub fn new() -> Self {
        Self {
            bin: util::get_env("STUN_BIN", "stunclient".to_string()),
        }
    }

    fn parse(stdout: &str) -> Result<ExternalEndpoint, Error> {
        let mut nat_type = None;
        let mut external_ip = None;
        let mut external_port = None;

        for line in stdout.lines() {
            let Some((key, value)) = line.split_once(':') else {
                continue;
            };
            let value = value.trim();
            match key.trim() {
                "NAT type" => nat_type = Some(value.to_string()),
                "External IP" => external_ip = Some(value.to_string()),
                "External port" => external_port = value.parse::<u16>().ok(),
                _ => {}
            }
        }

        Ok(ExternalEndpoint {
            nat_type: nat_type.ok_or(Error::MissingField("NAT type"))?,
            external_ip: external_ip.ok_or(Error::MissingField("External IP"))?,
            external_port: external_port.ok_or(Error::MissingField("External port"))?,
        })
    }
}

impl Default for StunDiscovery {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl EndpointDiscovery for StunDiscovery {
    async fn discover(&self) -> Result<ExternalEndpoint, Error> {
        trace!("Discovering external endpoint via {}", self.bin);
        let output = Command::new(&self.bin).output().await?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::ToolError(format!(
                "{} exited with {}: {}",
                self.bin, output.status, stderr
            )));
        }
        Self::parse(&String::from_utf8_lossy(&output.stdout))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_stun_report() {
        let report = "Binding test: success\nNAT type: Full Cone\nExternal IP: 203.0.113.7\nExternal port: 41414\n";
        let endpoint = StunDiscovery::parse(report).unwrap();
        assert_eq!(endpoint.nat_type, "Full Cone");
        assert_eq!(endpoint.external_ip, "203.0.113.7");
        assert_eq!(endpoint.external_port, 41414);
    }

    #[test]
    fn missing_field_is_an_error() {
        let report = "NAT type: Full Cone\nExternal IP: 203.0.113.7\n";
        assert!(matches!(
            StunDiscovery::parse(report),
            Err(Error::MissingField("External port"))
        ));
    }
}
