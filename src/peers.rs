//! Peer records and directory state synchronization.
//!
//! Every participant publishes one record under `<device_id>-config`. The
//! records of all other participants form the [`NetworkState`] that the
//! reconciliation loop converges the tunnel configuration against.
//!
//! Directory content is untrusted input: every field is checked against a
//! fixed per-field character whitelist, and a record failing to parse or to
//! validate is dropped as if it were absent. A bad peer entry is never an
//! error.

use crate::directory::{self, Directory};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::trace;

/// Suffix of every directory key carrying a peer record.
pub const CONFIG_KEY_SUFFIX: &str = "-config";

/// Directory key for a device's record.
pub fn config_key(device_id: &str) -> String {
    format!("{device_id}{CONFIG_KEY_SUFFIX}")
}

/// Connection metadata one participant publishes for its device.
///
/// All fields are strings as stored in the directory; validation happens in
/// [`PeerRecord::is_valid`] before a record is accepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerRecord {
    pub device_id: String,
    pub public_key: String,
    pub internal_ip: String,
    pub external_ip: String,
    pub external_port: String,
}

const DEVICE_ID_CHARS: &str = "abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789-_";
const PUBLIC_KEY_CHARS: &str =
    "abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789+/=";
const INTERNAL_IP_CHARS: &str = "abcdefABCDEF0123456789:";
const EXTERNAL_IP_CHARS: &str = "abcdefABCDEF0123456789.:";
const EXTERNAL_PORT_CHARS: &str = "0123456789";

fn field_clean(value: &str, allowed: &str) -> bool {
    !value.is_empty() && value.chars().all(|c| allowed.contains(c))
}

impl PeerRecord {
    /// Checks every field against its whitelist. A record is either accepted
    /// whole or rejected whole; fields are never partially cleaned.
    pub fn is_valid(&self) -> bool {
        field_clean(&self.device_id, DEVICE_ID_CHARS)
            && field_clean(&self.public_key, PUBLIC_KEY_CHARS)
            && field_clean(&self.internal_ip, INTERNAL_IP_CHARS)
            && field_clean(&self.external_ip, EXTERNAL_IP_CHARS)
            && field_clean(&self.external_port, EXTERNAL_PORT_CHARS)
    }
}

/// Directory key → peer record, excluding the local device and every entry
/// that failed parsing or validation.
pub type NetworkState = HashMap<String, PeerRecord>;

/// Fetches the current peer set from the directory.
///
/// Transport errors propagate; malformed peer data never does. Keys not
/// following the record naming convention are ignored, as is the local
/// device's own record.
pub async fn fetch_network_state(
    directory: &dyn Directory,
    local_device_id: &str,
) -> Result<NetworkState, directory::Error> {
    let own_key = config_key(local_device_id);
    let mut state = NetworkState::new();

    for key in directory.list_keys().await? {
        if !key.ends_with(CONFIG_KEY_SUFFIX) || key == own_key {
            continue;
        }
        let Some(value) = directory.get(&key).await? else {
            // key listing may lag deletes
            continue;
        };
        match serde_json::from_str::<PeerRecord>(&value) {
            Ok(record) if record.is_valid() => {
                state.insert(key, record);
            }
            Ok(_) => {
                trace!("Dropping peer record '{key}' with out-of-whitelist field");
            }
            Err(e) => {
                trace!("Dropping unparsable peer record '{key}': {e}");
            }
        }
    }

    Ok(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::MemoryDirectory;

    fn record(device_id: &str) -> PeerRecord {
        PeerRecord {
            device_id: device_id.to_string(),
            public_key: "mDf7Gnqsby2vXhICJsf6sHKBv6unA2wXDDC109mYvGE=".to_string(),
            internal_ip: "fd3a:61f5:a9cd:8a30:9c2f:3e1b:44d0:1122".to_string(),
            external_ip: "203.0.113.7".to_string(),
            external_port: "51820".to_string(),
        }
    }

    #[test]
    fn valid_record_passes() {
        assert!(record("alice-laptop").is_valid());
    }

    #[test]
    fn out_of_whitelist_field_rejects_whole_record() {
        let mut bad = record("alice-laptop");
        bad.external_ip = "203.0.113.7; rm -rf /".to_string();
        assert!(!bad.is_valid());

        let mut bad = record("alice laptop");
        assert!(!bad.is_valid());
        bad.device_id = "alice-laptop".to_string();
        bad.external_port = "51820\n".to_string();
        assert!(!bad.is_valid());
    }

    #[test]
    fn empty_field_rejects_record() {
        let mut bad = record("alice-laptop");
        bad.public_key = String::new();
        assert!(!bad.is_valid());
    }

    #[tokio::test]
    async fn fetch_excludes_self_and_malformed_entries() {
        let dir = MemoryDirectory::new();
        let good = record("bob-desktop");
        dir.put(
            &config_key("bob-desktop"),
            &serde_json::to_string(&good).unwrap(),
        )
        .await
        .unwrap();
        dir.put(
            &config_key("alice-laptop"),
            &serde_json::to_string(&record("alice-laptop")).unwrap(),
        )
        .await
        .unwrap();
        dir.put(&config_key("mallory-box"), "{not json").await.unwrap();
        let mut tainted = record("eve-box");
        tainted.public_key = "`reboot`".to_string();
        dir.put(
            &config_key("eve-box"),
            &serde_json::to_string(&tainted).unwrap(),
        )
        .await
        .unwrap();
        dir.put("unrelated-key", "whatever").await.unwrap();

        let state = fetch_network_state(&dir, "alice-laptop").await.unwrap();
        assert_eq!(state.len(), 1);
        assert_eq!(state.get(&config_key("bob-desktop")), Some(&good));
    }

    #[tokio::test]
    async fn fetch_tolerates_listing_lagging_deletes() {
        struct LaggingDirectory(MemoryDirectory);

        #[async_trait::async_trait]
        impl Directory for LaggingDirectory {
            async fn put(&self, key: &str, value: &str) -> Result<(), directory::Error> {
                self.0.put(key, value).await
            }
            async fn get(&self, _key: &str) -> Result<Option<String>, directory::Error> {
                // value already gone although the key still lists
                Ok(None)
            }
            async fn list_keys(&self) -> Result<Vec<String>, directory::Error> {
                self.0.list_keys().await
            }
            async fn delete(&self, key: &str) -> Result<(), directory::Error> {
                self.0.delete(key).await
            }
        }

        let dir = LaggingDirectory(MemoryDirectory::new());
        dir.put(&config_key("bob-desktop"), "ignored").await.unwrap();
        let state = fetch_network_state(&dir, "alice-laptop").await.unwrap();
        assert!(state.is_empty());
    }
}
