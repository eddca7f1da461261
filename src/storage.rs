use serde::{Serialize, de::DeserializeOwned};
use worker::kv::KvStore;

use crate::error::ApiError;

/// A stored object's key with its decoded metadata, if any was attached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredKey<M> {
    pub key: String,
    pub metadata: Option<M>,
}

pub struct ReportStore {
    kv: KvStore,
}

impl ReportStore {
    pub fn new(kv: KvStore) -> Self {
        Self { kv }
    }

    pub async fn put_bytes<M>(&self, key: &str, bytes: &[u8], metadata: &M) -> Result<(), ApiError>
    where
        M: Serialize,
    {
        self.kv
            .put_bytes(key, bytes)?
            .metadata(metadata)?
            .execute()
            .await?;
        Ok(())
    }

    pub async fn get_bytes(&self, key: &str) -> Result<Option<Vec<u8>>, ApiError> {
        Ok(self.kv.get(key).bytes().await?)
    }

    pub async fn exists(&self, key: &str) -> Result<bool, ApiError> {
        Ok(self.get_bytes(key).await?.is_some())
    }

    /// Every key under `prefix`, following list cursors to the end.
    pub async fn list<M>(&self, prefix: &str) -> Result<Vec<StoredKey<M>>, ApiError>
    where
        M: DeserializeOwned,
    {
        let mut items = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let mut request = self.kv.list().prefix(prefix.to_string());
            if let Some(cursor) = cursor.take() {
                request = request.cursor(cursor);
            }
            let page = request.execute().await?;

            for key in page.keys {
                let metadata = key
                    .metadata
                    .map(serde_json::from_value::<M>)
                    .transpose()
                    .unwrap_or_else(|error| {
                        worker::console_warn!("ignoring unreadable metadata on {}: {error}", key.name);
                        None
                    });
                items.push(StoredKey {
                    key: key.name,
                    metadata,
                });
            }

            if page.list_complete {
                break;
            }
            match page.cursor {
                Some(next) if !next.is_empty() => cursor = Some(next),
                _ => break,
            }
        }

        items.sort_by(|left, right| left.key.cmp(&right.key));
        Ok(items)
    }

    pub async fn delete(&self, key: &str) -> Result<(), ApiError> {
        self.kv.delete(key).await?;
        Ok(())
    }
}
