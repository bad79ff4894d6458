use crate::directory::{Directory, Error};
use std::collections::HashMap;
use tokio::sync::Mutex;

/// In-memory directory backend. Used by the test suite and for local
/// experiments without a real store.
#[derive(Default)]
pub struct MemoryDirectory {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl Directory for MemoryDirectory {
    async fn put(&self, key: &str, value: &str) -> Result<(), Error> {
        self.entries
            .lock()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, Error> {
        Ok(self.entries.lock().await.get(key).cloned())
    }

    async fn list_keys(&self) -> Result<Vec<String>, Error> {
        Ok(self.entries.lock().await.keys().cloned().collect())
    }

    async fn delete(&self, key: &str) -> Result<(), Error> {
        self.entries.lock().await.remove(key);
        Ok(())
    }
}
