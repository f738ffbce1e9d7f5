//! MetadataSourceRegistry (C15): holds the per-media-type provider fallback
//! chains and lazily instantiates clients, skipping sources whose API key is
//! not configured.

use crate::metadata::clients::{
    GoogleBooksClient, MetadataClient, OmdbClient, OpenLibraryClient, TmdbClient, TvMazeClient,
    WikipediaClient, YtDlpClient,
};
use crate::model::MediaType;
use crate::model::MetadataSource;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

/// API keys for the sources that require one. A source with no key present
/// here is simply excluded from the available chain, the same way the
/// registry treats an unreachable or misconfigured client.
#[derive(Debug, Clone, Default)]
pub struct ApiKeys {
    pub tmdb: Option<String>,
    pub omdb: Option<String>,
    pub google_books: Option<String>,
}

pub fn default_chains() -> HashMap<MediaType, Vec<MetadataSource>> {
    use MetadataSource::*;
    HashMap::from([
        (MediaType::Book, vec![OpenLibrary, GoogleBooks, Wikipedia]),
        (MediaType::Movie, vec![Tmdb, Omdb, Wikipedia]),
        (MediaType::TvSeries, vec![Tmdb, Omdb, TvMaze, Wikipedia]),
        (MediaType::TvEpisode, vec![Tmdb, Omdb, TvMaze]),
        (MediaType::YoutubeVideo, vec![YtDlp]),
    ])
}

pub struct MetadataSourceRegistry {
    chains: Mutex<HashMap<MediaType, Vec<MetadataSource>>>,
    clients: Mutex<HashMap<MetadataSource, Option<Arc<dyn MetadataClient>>>>,
    api_keys: ApiKeys,
}

impl MetadataSourceRegistry {
    pub fn new(api_keys: ApiKeys) -> Self {
        Self {
            chains: Mutex::new(default_chains()),
            clients: Mutex::new(HashMap::new()),
            api_keys,
        }
    }

    pub fn set_chain(&self, media_type: MediaType, chain: Vec<MetadataSource>) {
        self.chains.lock().insert(media_type, chain);
    }

    pub fn set_api_key(&mut self, source: MetadataSource, key: String) {
        match source {
            MetadataSource::Tmdb => self.api_keys.tmdb = Some(key),
            MetadataSource::Omdb => self.api_keys.omdb = Some(key),
            MetadataSource::GoogleBooks => self.api_keys.google_books = Some(key),
            _ => return,
        }
        self.clients.lock().remove(&source);
    }

    fn get_chain(&self, media_type: MediaType) -> Vec<MetadataSource> {
        self.chains.lock().get(&media_type).cloned().unwrap_or_default()
    }

    /// Lazily builds and caches the client for `source`. A client requiring
    /// an API key that isn't configured is cached as `None` so repeated
    /// lookups don't retry construction every call.
    fn get_client(&self, source: MetadataSource) -> Option<Arc<dyn MetadataClient>> {
        if let Some(cached) = self.clients.lock().get(&source) {
            return cached.clone();
        }
        let built: Option<Arc<dyn MetadataClient>> = match source {
            MetadataSource::OpenLibrary => Some(Arc::new(OpenLibraryClient::new())),
            MetadataSource::Wikipedia => Some(Arc::new(WikipediaClient::new())),
            MetadataSource::TvMaze => Some(Arc::new(TvMazeClient::new())),
            MetadataSource::YtDlp => Some(Arc::new(YtDlpClient::new())),
            MetadataSource::GoogleBooks => {
                self.api_keys.google_books.clone().map(|key| Arc::new(GoogleBooksClient::new(key)) as Arc<dyn MetadataClient>)
            }
            MetadataSource::Tmdb => {
                self.api_keys.tmdb.clone().map(|key| Arc::new(TmdbClient::new(key)) as Arc<dyn MetadataClient>)
            }
            MetadataSource::Omdb => {
                self.api_keys.omdb.clone().map(|key| Arc::new(OmdbClient::new(key)) as Arc<dyn MetadataClient>)
            }
        };
        self.clients.lock().insert(source, built.clone());
        built
    }

    /// The chain for `media_type`, intersected with sources whose client is
    /// available (constructible and declares support for this media type).
    pub fn available_sources(&self, media_type: MediaType) -> Vec<(MetadataSource, Arc<dyn MetadataClient>)> {
        self.get_chain(media_type)
            .into_iter()
            .filter_map(|source| {
                let client = self.get_client(source)?;
                client.supports(media_type).then_some((source, client))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keyed_sources_are_excluded_without_an_api_key() {
        let registry = MetadataSourceRegistry::new(ApiKeys::default());
        let sources: Vec<MetadataSource> = registry
            .available_sources(MediaType::Movie)
            .into_iter()
            .map(|(s, _)| s)
            .collect();
        assert_eq!(sources, vec![MetadataSource::Wikipedia]);
    }

    #[test]
    fn tmdb_becomes_available_once_keyed() {
        let registry = MetadataSourceRegistry::new(ApiKeys { tmdb: Some("key".to_string()), ..Default::default() });
        let sources: Vec<MetadataSource> = registry
            .available_sources(MediaType::Movie)
            .into_iter()
            .map(|(s, _)| s)
            .collect();
        assert_eq!(sources, vec![MetadataSource::Tmdb, MetadataSource::Wikipedia]);
    }

    #[test]
    fn book_chain_defaults_to_openlibrary_then_wikipedia_without_key() {
        let registry = MetadataSourceRegistry::new(ApiKeys::default());
        let sources: Vec<MetadataSource> = registry
            .available_sources(MediaType::Book)
            .into_iter()
            .map(|(s, _)| s)
            .collect();
        assert_eq!(sources, vec![MetadataSource::OpenLibrary, MetadataSource::Wikipedia]);
    }

    #[test]
    fn custom_chain_overrides_default() {
        let registry = MetadataSourceRegistry::new(ApiKeys::default());
        registry.set_chain(MediaType::Book, vec![MetadataSource::Wikipedia]);
        let sources: Vec<MetadataSource> = registry
            .available_sources(MediaType::Book)
            .into_iter()
            .map(|(s, _)| s)
            .collect();
        assert_eq!(sources, vec![MetadataSource::Wikipedia]);
    }
}
