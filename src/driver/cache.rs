use std::collections::HashMap;
use std::path::PathBuf;

use async_trait::async_trait;
use lz4_flex::{compress_prepend_size, decompress_size_prepended};
use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::debug;

use super::session::ActionSession;
use super::snapshot::PortfolioSnapshot;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Cache IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Cache entry is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("LZ4 decompression failed: {0}")]
    Decompress(#[from] lz4_flex::block::DecompressError),
}

/// Storage for portfolio snapshots and in-flight action sessions.
#[async_trait]
pub trait PortfolioCache: Send + Sync {
    async fn get_snapshot(&self, key: &str) -> Result<Option<PortfolioSnapshot>, CacheError>;
    async fn set_snapshot(&self, key: &str, snapshot: &PortfolioSnapshot) -> Result<(), CacheError>;
    async fn get_session(&self, key: &str) -> Result<Option<ActionSession>, CacheError>;
    async fn set_session(&self, key: &str, session: &ActionSession) -> Result<(), CacheError>;
}

// ── In-memory ────────────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct MemoryCache {
    snapshots: RwLock<HashMap<String, PortfolioSnapshot>>,
    sessions: RwLock<HashMap<String, ActionSession>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PortfolioCache for MemoryCache {
    async fn get_snapshot(&self, key: &str) -> Result<Option<PortfolioSnapshot>, CacheError> {
        Ok(self.snapshots.read().await.get(key).cloned())
    }

    async fn set_snapshot(&self, key: &str, snapshot: &PortfolioSnapshot) -> Result<(), CacheError> {
        self.snapshots.write().await.insert(key.to_string(), snapshot.clone());
        Ok(())
    }

    async fn get_session(&self, key: &str) -> Result<Option<ActionSession>, CacheError> {
        Ok(self.sessions.read().await.get(key).cloned())
    }

    async fn set_session(&self, key: &str, session: &ActionSession) -> Result<(), CacheError> {
        self.sessions.write().await.insert(key.to_string(), session.clone());
        Ok(())
    }
}

// ── On disk ──────────────────────────────────────────────────────────

/// One LZ4-compressed JSON file per entry under `dir`.
#[derive(Debug, Clone)]
pub struct FileCache {
    dir: PathBuf,
}

impl FileCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        FileCache { dir: dir.into() }
    }

    fn path(&self, kind: &str, key: &str) -> PathBuf {
        let key: String = key
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        self.dir.join(format!("{kind}-{key}.json.lz4"))
    }

    async fn read<T: DeserializeOwned>(&self, kind: &str, key: &str) -> Result<Option<T>, CacheError> {
        let path = self.path(kind, key);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let json = decompress_size_prepended(&bytes)?;
        Ok(Some(serde_json::from_slice(&json)?))
    }

    async fn write<T: Serialize + Sync>(&self, kind: &str, key: &str, value: &T) -> Result<(), CacheError> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let json = serde_json::to_vec(value)?;
        let compressed = compress_prepend_size(&json);
        let path = self.path(kind, key);
        debug!(path = %path.display(), raw = json.len(), stored = compressed.len(), "cache write");
        tokio::fs::write(&path, compressed).await?;
        Ok(())
    }
}

#[async_trait]
impl PortfolioCache for FileCache {
    async fn get_snapshot(&self, key: &str) -> Result<Option<PortfolioSnapshot>, CacheError> {
        self.read("snapshot", key).await
    }

    async fn set_snapshot(&self, key: &str, snapshot: &PortfolioSnapshot) -> Result<(), CacheError> {
        self.write("snapshot", key, snapshot).await
    }

    async fn get_session(&self, key: &str) -> Result<Option<ActionSession>, CacheError> {
        self.read("session", key).await
    }

    async fn set_session(&self, key: &str, session: &ActionSession) -> Result<(), CacheError> {
        self.write("session", key, session).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::ActionName;

    #[tokio::test]
    async fn test_file_cache_round_trip_and_miss() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FileCache::new(dir.path());
        assert!(cache.get_session("0xabc:zapIn").await.unwrap().is_none());

        let session = ActionSession::new(ActionName::ZapIn, "0xabc", vec!["base".into()]);
        cache.set_session("0xabc:zapIn", &session).await.unwrap();
        assert_eq!(cache.get_session("0xabc:zapIn").await.unwrap(), Some(session));
    }

    #[tokio::test]
    async fn test_file_cache_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FileCache::new(dir.path());
        std::fs::write(cache.path("session", "k"), b"not lz4").unwrap();
        assert!(cache.get_session("k").await.is_err());
    }
}
