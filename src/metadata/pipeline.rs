//! MetadataLookupPipeline (C15): orchestrates cache lookup, the per-media
//! provider fallback chain, cross-source merge, and cache write-back.

use crate::metadata::cache::MetadataCache;
use crate::metadata::merge::merge_results;
use crate::metadata::registry::MetadataSourceRegistry;
use crate::model::{ConfidenceLevel, LookupOptions, LookupQuery, UnifiedMetadataResult};
use tracing::{debug, warn};

pub struct MetadataLookupPipeline {
    registry: MetadataSourceRegistry,
    cache: Option<MetadataCache>,
}

impl MetadataLookupPipeline {
    pub fn new(registry: MetadataSourceRegistry, cache: Option<MetadataCache>) -> Self {
        Self { registry, cache }
    }

    /// Looks up metadata for `query`, consulting the cache first (unless
    /// `options.skip_cache`/`force_refresh`), then walking the provider
    /// fallback chain up to `options.max_sources`, merging whatever results
    /// were collected. Returns `None` if every source in the chain failed or
    /// produced nothing usable.
    pub async fn lookup(&self, query: &LookupQuery, options: &LookupOptions) -> Option<UnifiedMetadataResult> {
        let use_cache = self.cache.is_some() && !options.skip_cache && !options.force_refresh;
        if use_cache {
            if let Some(cached) = self.cache.as_ref().and_then(|c| c.get(query)) {
                debug!(title = ?query.title, "metadata cache hit");
                return Some(cached);
            }
        }

        let sources = self.registry.available_sources(query.media_type);
        let mut results = Vec::new();

        for (source, client) in sources.into_iter().take(options.max_sources.max(1)) {
            let result = client.lookup(query, options).await;
            let Some(result) = result else {
                continue;
            };
            if result.error.is_some() {
                continue;
            }
            let complete = result.has_required_fields();
            results.push(result);
            if complete {
                debug!(%source, "metadata lookup satisfied by single source");
                break;
            }
        }

        if results.is_empty() {
            warn!(title = ?query.title, "no metadata source produced a usable result");
            return None;
        }

        let merged = merge_results(results);
        if !self.cache.as_ref().map(|_| options.skip_cache).unwrap_or(true) {
            if let Some(cache) = &self.cache {
                if let Err(err) = cache.set(query, &merged) {
                    warn!(error = %err, "failed to persist metadata cache entry");
                }
            }
        }
        Some(merged)
    }

    /// Same as `lookup`, but guarantees a result: when every source misses,
    /// returns an empty `Low`-confidence record carrying `error` instead of
    /// `None`, so callers needing a placeholder never branch on `Option`.
    pub async fn lookup_with_fallback(&self, query: &LookupQuery, options: &LookupOptions) -> UnifiedMetadataResult {
        if let Some(result) = self.lookup(query, options).await {
            return result;
        }
        UnifiedMetadataResult {
            title: query.title.clone().or_else(|| query.series_name.clone()).unwrap_or_else(|| "Unknown".to_string()),
            media_type: Some(query.media_type),
            confidence: ConfidenceLevel::Low,
            error: Some("no metadata source returned a result".to_string()),
            queried_at: Some(chrono::Utc::now()),
            ..Default::default()
        }
    }

    pub fn invalidate_cache(&self, query: &LookupQuery) {
        if let Some(cache) = &self.cache {
            let _ = cache.delete(query);
        }
    }

    pub fn clear_cache(&self) -> usize {
        self.cache.as_ref().and_then(|c| c.clear().ok()).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::registry::ApiKeys;
    use crate::model::MediaType;

    fn query() -> LookupQuery {
        LookupQuery {
            media_type: MediaType::YoutubeVideo,
            title: None,
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

    #[tokio::test]
    async fn lookup_with_fallback_returns_placeholder_when_the_client_declines_without_an_id() {
        let registry = MetadataSourceRegistry::new(ApiKeys::default());
        let pipeline = MetadataLookupPipeline::new(registry, None);
        let result = pipeline.lookup_with_fallback(&query(), &LookupOptions::default()).await;
        assert_eq!(result.confidence, ConfidenceLevel::Low);
        assert!(result.error.is_some());
    }
}
