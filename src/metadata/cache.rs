//! MetadataCache (C15): one JSON file per query, keyed by a short SHA256
//! digest of the query's salient fields, expiring after a configurable TTL.

use crate::error::Result;
use crate::model::{LookupQuery, UnifiedMetadataResult};
use sha2::{Digest, Sha256};
use std::path::PathBuf;
use tracing::debug;

#[derive(serde::Serialize, serde::Deserialize)]
struct CacheEntry {
    cached_at: chrono::DateTime<chrono::Utc>,
    result: serde_json::Value,
}

pub struct MetadataCache {
    cache_dir: PathBuf,
    ttl: chrono::Duration,
}

impl MetadataCache {
    pub fn new(cache_dir: impl Into<PathBuf>, ttl_hours: i64) -> Self {
        Self { cache_dir: cache_dir.into(), ttl: chrono::Duration::hours(ttl_hours.max(1)) }
    }

    pub fn cache_key(query: &LookupQuery) -> String {
        let joined = query.cache_key_parts().join("|").to_lowercase();
        let digest = Sha256::digest(joined.as_bytes());
        digest.iter().take(8).fold(String::with_capacity(16), |mut acc, byte| {
            acc.push_str(&format!("{byte:02x}"));
            acc
        })
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.cache_dir.join(format!("{key}.json"))
    }

    pub fn get(&self, query: &LookupQuery) -> Option<UnifiedMetadataResult> {
        let path = self.path_for(&Self::cache_key(query));
        let contents = std::fs::read_to_string(&path).ok()?;
        let entry: CacheEntry = match serde_json::from_str(&contents) {
            Ok(entry) => entry,
            Err(_) => {
                let _ = std::fs::remove_file(&path);
                return None;
            }
        };
        if chrono::Utc::now() - entry.cached_at > self.ttl {
            let _ = std::fs::remove_file(&path);
            debug!(path = %path.display(), "metadata cache entry expired");
            return None;
        }
        serde_json::from_value(entry.result).ok()
    }

    pub fn set(&self, query: &LookupQuery, result: &UnifiedMetadataResult) -> Result<()> {
        std::fs::create_dir_all(&self.cache_dir)?;
        let entry = CacheEntry { cached_at: chrono::Utc::now(), result: result.to_json(false) };
        let serialized = serde_json::to_vec_pretty(&entry)?;
        std::fs::write(self.path_for(&Self::cache_key(query)), serialized)?;
        Ok(())
    }

    pub fn delete(&self, query: &LookupQuery) -> Result<()> {
        let path = self.path_for(&Self::cache_key(query));
        if path.exists() {
            std::fs::remove_file(path)?;
        }
        Ok(())
    }

    /// Deletes every cached entry, returning the count removed.
    pub fn clear(&self) -> Result<usize> {
        let Ok(entries) = std::fs::read_dir(&self.cache_dir) else {
            return Ok(0);
        };
        let mut removed = 0;
        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                std::fs::remove_file(&path)?;
                removed += 1;
            }
        }
        Ok(removed)
    }

    /// Deletes expired or unparseable entries, returning the count removed.
    pub fn cleanup_expired(&self) -> Result<usize> {
        let Ok(entries) = std::fs::read_dir(&self.cache_dir) else {
            return Ok(0);
        };
        let mut removed = 0;
        for entry in entries.flatten() {
            let path = entry.path();
            if !path.extension().is_some_and(|ext| ext == "json") {
                continue;
            }
            let expired_or_corrupt = match std::fs::read_to_string(&path) {
                Ok(contents) => match serde_json::from_str::<CacheEntry>(&contents) {
                    Ok(entry) => chrono::Utc::now() - entry.cached_at > self.ttl,
                    Err(_) => true,
                },
                Err(_) => true,
            };
            if expired_or_corrupt {
                std::fs::remove_file(&path)?;
                removed += 1;
            }
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::MediaType;

    fn query() -> LookupQuery {
        LookupQuery {
            media_type: MediaType::Book,
            title: Some("1984".to_string()),
            author: None,
            isbn: None,
            series_name: None,
            season: None,
            episode: None,
            year: None,
            youtube_video_id: None,
            imdb_id: None,
            tmdb_id: None,
            source_filename: None,
        }
    }

    fn result() -> UnifiedMetadataResult {
        UnifiedMetadataResult { title: "1984".to_string(), ..Default::default() }
    }

    #[test]
    fn set_then_get_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let cache = MetadataCache::new(dir.path(), 168);
        cache.set(&query(), &result()).unwrap();
        let fetched = cache.get(&query()).unwrap();
        assert_eq!(fetched.title, "1984");
    }

    #[test]
    fn expired_entry_returns_none_and_is_deleted() {
        let dir = tempfile::tempdir().unwrap();
        let cache = MetadataCache::new(dir.path(), 1);
        let path = cache.path_for(&MetadataCache::cache_key(&query()));
        std::fs::create_dir_all(dir.path()).unwrap();
        let stale = CacheEntry {
            cached_at: chrono::Utc::now() - chrono::Duration::hours(5),
            result: result().to_json(false),
        };
        std::fs::write(&path, serde_json::to_vec(&stale).unwrap()).unwrap();
        assert!(cache.get(&query()).is_none());
        assert!(!path.exists());
    }

    #[test]
    fn cache_key_is_stable_for_same_query() {
        assert_eq!(MetadataCache::cache_key(&query()), MetadataCache::cache_key(&query()));
    }

    #[test]
    fn clear_removes_all_entries() {
        let dir = tempfile::tempdir().unwrap();
        let cache = MetadataCache::new(dir.path(), 168);
        cache.set(&query(), &result()).unwrap();
        assert_eq!(cache.clear().unwrap(), 1);
        assert!(cache.get(&query()).is_none());
    }
}
