use crate::directory::{Directory, Error, NAMESPACE};
use crate::util;
use serde::Deserialize;
use serde_json::json;
use tokio::process::Command;
use tracing::trace;

/// Directory backend speaking the Keybase `kvstore api` JSON protocol via
/// the locally installed CLI. Entries are scoped to the team and the
/// [`NAMESPACE`] namespace.
pub struct KeybaseKvStore {
    bin: String,
    team: String,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    result: Option<ApiResult>,
    error: Option<ApiErrorBody>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiResult {
    entry_value: Option<String>,
    entry_keys: Option<Vec<EntryKey>>,
    revision: Option<u64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EntryKey {
    entry_key: String,
}

impl KeybaseKvStore {
    pub fn new(team: &str) -> Self {
        Self {
            bin: util::get_env("KEYBASE_BIN", "keybase".to_string()),
            team: team.to_string(),
        }
    }

    async fn call(&self, message: serde_json::Value) -> Result<ApiResult, Error> {
        trace!("kvstore api call: {message}");
        let output = Command::new(&self.bin)
            .args(["kvstore", "api", "-m", &message.to_string()])
            .output()
            .await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::ApiError(format!(
                "{} exited with {}: {}",
                self.bin, output.status, stderr
            )));
        }

        let response: ApiResponse = serde_json::from_slice(&output.stdout)?;
        if let Some(error) = response.error {
            return Err(Error::ApiError(error.message));
        }
        response
            .result
            .ok_or_else(|| Error::ApiError("response carries neither result nor error".to_string()))
    }

    fn options(&self) -> serde_json::Value {
        json!({ "team": self.team, "namespace": NAMESPACE })
    }
}

#[async_trait::async_trait]
impl Directory for KeybaseKvStore {
    async fn put(&self, key: &str, value: &str) -> Result<(), Error> {
        let mut options = self.options();
        options["entryKey"] = json!(key);
        options["entryValue"] = json!(value);
        self.call(json!({ "method": "put", "params": { "options": options } }))
            .await?;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, Error> {
        let mut options = self.options();
        options["entryKey"] = json!(key);
        let result = self
            .call(json!({ "method": "get", "params": { "options": options } }))
            .await?;
        // a never-written or deleted entry comes back with revision 0 or an
        // empty value
        match result.entry_value {
            Some(value) if !value.is_empty() && result.revision.unwrap_or(0) > 0 => {
                Ok(Some(value))
            }
            _ => Ok(None),
        }
    }

    async fn list_keys(&self) -> Result<Vec<String>, Error> {
        let result = self
            .call(json!({ "method": "list", "params": { "options": self.options() } }))
            .await?;
        Ok(result
            .entry_keys
            .unwrap_or_default()
            .into_iter()
            .map(|e| e.entry_key)
            .collect())
    }

    async fn delete(&self, key: &str) -> Result<(), Error> {
        let mut options = self.options();
        options["entryKey"] = json!(key);
        match self
            .call(json!({ "method": "del", "params": { "options": options } }))
            .await
        {
            Ok(_) => Ok(()),
            // deleting an absent entry must stay idempotent
            Err(Error::ApiError(message)) if message.contains("not found") => Ok(()),
            Err(e) => Err(e),
        }
    }
}
