//! MetadataPipeline (C15): looks up unified book/movie/TV/video metadata
//! from a chain of public and keyed providers, merging and caching results.

pub mod cache;
pub mod clients;
pub mod merge;
pub mod pipeline;
pub mod registry;

pub use cache::MetadataCache;
pub use clients::MetadataClient;
pub use pipeline::MetadataLookupPipeline;
pub use registry::{ApiKeys, MetadataSourceRegistry};

use crate::config::RuntimeConfig;

/// Builds a pipeline wired from `config`: API keys and cache settings come
/// straight from `RuntimeConfig`, the same way every other stage in this
/// crate is constructed from it.
pub fn pipeline_from_config(config: &RuntimeConfig) -> MetadataLookupPipeline {
    let api_keys = ApiKeys {
        tmdb: config.tmdb_api_key.clone(),
        omdb: config.omdb_api_key.clone(),
        google_books: config.google_books_api_key.clone(),
    };
    let registry = MetadataSourceRegistry::new(api_keys);
    let cache = config
        .metadata_cache_enabled
        .then(|| MetadataCache::new(config.metadata_cache_dir.clone(), config.metadata_cache_ttl_hours));
    MetadataLookupPipeline::new(registry, cache)
}
