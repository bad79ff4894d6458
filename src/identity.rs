//! The identity collaborator boundary.
//!
//! Directory access and team-membership truth belong to an external identity
//! system; the agent only consumes its answers. The local identity is fetched
//! once at startup and is immutable for the process lifetime, and in
//! particular the `device_id` it yields is the stable directory namespacing
//! key for this device.

use crate::util;
use serde::Deserialize;
use thiserror::Error;
use tokio::process::Command;
use tracing::trace;

#[derive(Debug, Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("identity service error: {0}")]
    ServiceError(String),
}

/// The local machine's identity as reported by the identity system.
#[derive(Debug, Clone, Deserialize)]
pub struct LocalIdentity {
    pub user: String,
    pub user_id: String,
    pub device: String,
    pub device_id: String,
}

/// One current member of a team.
#[derive(Debug, Clone, Deserialize)]
pub struct TeamMember {
    pub name: String,
    pub id: String,
}

#[async_trait::async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn local_identity(&self) -> Result<LocalIdentity, Error>;
    async fn team_members(&self, team: &str) -> Result<Vec<TeamMember>, Error>;
}

/// Identity backend speaking to the Keybase CLI.
pub struct KeybaseIdentity {
    bin: String,
}

#[derive(Debug, Deserialize)]
struct StatusResponse {
    #[serde(rename = "Username")]
    username: String,
    #[serde(rename = "UserID")]
    user_id: String,
    #[serde(rename = "Device")]
    device: StatusDevice,
}

#[derive(Debug, Deserialize)]
struct StatusDevice {
    name: String,
    #[serde(rename = "deviceID")]
    device_id: String,
}

#[derive(Debug, Deserialize)]
struct MembersResponse {
    result: MembersResult,
}

#[derive(Debug, Deserialize)]
struct MembersResult {
    members: MembersByRole,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct MembersByRole {
    owners: Vec<MemberEntry>,
    admins: Vec<MemberEntry>,
    writers: Vec<MemberEntry>,
    readers: Vec<MemberEntry>,
}

#[derive(Debug, Deserialize)]
struct MemberEntry {
    username: String,
    uv: MemberVersion,
}

#[derive(Debug, Deserialize)]
struct MemberVersion {
    uid: String,
}

impl KeybaseIdentity {
    pub fn new() -> Self {
        Self {
            bin: util::get_env("KEYBASE_BIN", "keybase".to_string()),
        }
    }

    async fn output(&self, args: &[&str]) -> Result<Vec<u8>, Error> {
        trace!("{} {}", self.bin, args.join(" "));
        let output = Command::new(&self.bin).args(args).output().await?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::ServiceError(format!(
                "{} exited with {}: {}",
                self.bin, output.status, stderr
            )));
        }
        Ok(output.stdout)
    }
}

impl Default for KeybaseIdentity {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl IdentityProvider for KeybaseIdentity {
    async fn local_identity(&self) -> Result<LocalIdentity, Error> {
        let stdout = self.output(&["status", "-j"]).await?;
        let status: StatusResponse = serde_json::from_slice(&stdout)?;
        Ok(LocalIdentity {
            user: status.username,
            user_id: status.user_id,
            device: status.device.name,
            device_id: status.device.device_id,
        })
    }

    async fn team_members(&self, team: &str) -> Result<Vec<TeamMember>, Error> {
        let message = serde_json::json!({
            "method": "list-team-memberships",
            "params": { "options": { "team": team } }
        });
        let stdout = self
            .output(&["team", "api", "-m", &message.to_string()])
            .await?;
        let response: MembersResponse = serde_json::from_slice(&stdout)?;
        let members = response.result.members;
        Ok([
            members.owners,
            members.admins,
            members.writers,
            members.readers,
        ]
        .into_iter()
        .flatten()
        .map(|m| TeamMember {
            name: m.username,
            id: m.uv.uid,
        })
        .collect())
    }
}
