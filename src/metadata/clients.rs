//! Per-source metadata clients. Each wraps one public (or keyed) API behind
//! the shared `MetadataClient` trait so the registry can treat them
//! uniformly; confidence levels follow the source's own match precision
//! (exact id lookup is HIGH, fuzzy title search is MEDIUM, Wikipedia/yt-dlp
//! fallbacks are LOW or source-specific).

use crate::model::{
    ConfidenceLevel, LookupOptions, LookupQuery, MediaType, MetadataSource, SeriesInfo, SourceIds,
    UnifiedMetadataResult,
};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

#[async_trait]
pub trait MetadataClient: Send + Sync {
    fn source(&self) -> MetadataSource;
    fn supported_types(&self) -> &'static [MediaType];
    fn supports(&self, media_type: MediaType) -> bool {
        self.supported_types().contains(&media_type)
    }
    async fn lookup(&self, query: &LookupQuery, options: &LookupOptions) -> Option<UnifiedMetadataResult>;
}

fn leading_year(text: &str) -> Option<u32> {
    static YEAR: Lazy<Regex> = Lazy::new(|| Regex::new(r"(18|19|20|21)\d{2}").unwrap());
    YEAR.find(text).and_then(|m| m.as_str().parse().ok())
}

fn strip_html(text: &str) -> String {
    static TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]+>").unwrap());
    TAG.replace_all(text, "").trim().to_string()
}

fn truncate(text: &str, max_chars: usize) -> String {
    let trimmed = text.trim();
    if trimmed.chars().count() <= max_chars {
        return trimmed.to_string();
    }
    let mut result: String = trimmed.chars().take(max_chars.saturating_sub(1)).collect();
    if let Some(idx) = result.rfind(' ') {
        result.truncate(idx);
    }
    result.push('\u{2026}');
    result
}

fn dedup_push(genres: &mut Vec<String>, candidate: &str) {
    let normalized = candidate.trim();
    if normalized.is_empty() {
        return;
    }
    if !genres.iter().any(|g| g.eq_ignore_ascii_case(normalized)) {
        genres.push(normalized.to_string());
    }
}

fn timeout_for(options: &LookupOptions) -> Duration {
    Duration::from_secs_f64(options.timeout_seconds.max(1.0))
}

/// OpenLibrary (C15.1): ISBN lookup preferred, falls back to title/author
/// search. No API key required.
pub struct OpenLibraryClient {
    client: Client,
}

impl OpenLibraryClient {
    pub fn new() -> Self {
        Self { client: Client::new() }
    }
}

impl Default for OpenLibraryClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MetadataClient for OpenLibraryClient {
    fn source(&self) -> MetadataSource {
        MetadataSource::OpenLibrary
    }

    fn supported_types(&self) -> &'static [MediaType] {
        &[MediaType::Book]
    }

    async fn lookup(&self, query: &LookupQuery, options: &LookupOptions) -> Option<UnifiedMetadataResult> {
        if query.media_type != MediaType::Book {
            return None;
        }
        if let Some(isbn) = &query.isbn {
            if let Some(result) = self.lookup_by_isbn(isbn, query, options).await {
                return Some(result);
            }
        }
        if let Some(title) = &query.title {
            return self.lookup_by_title(title, query, options).await;
        }
        None
    }
}

impl OpenLibraryClient {
    async fn lookup_by_isbn(
        &self,
        isbn: &str,
        query: &LookupQuery,
        options: &LookupOptions,
    ) -> Option<UnifiedMetadataResult> {
        let response = self
            .client
            .get("https://openlibrary.org/api/books")
            .query(&[("bibkeys", format!("ISBN:{isbn}")), ("format", "json".to_string()), ("jscmd", "data".to_string())])
            .timeout(timeout_for(options))
            .send()
            .await
            .ok()?;
        let payload: serde_json::Value = response.json().await.ok()?;
        let data = payload.get(format!("ISBN:{isbn}"))?;

        let title = data.get("title").and_then(|v| v.as_str()).unwrap_or_default();
        let title = if title.is_empty() { query.title.clone().unwrap_or_else(|| "Unknown".to_string()) } else { title.to_string() };

        let author = data
            .get("authors")
            .and_then(|v| v.as_array())
            .map(|authors| {
                authors
                    .iter()
                    .filter_map(|a| a.get("name").and_then(|n| n.as_str()))
                    .collect::<Vec<_>>()
                    .join(", ")
            })
            .filter(|s| !s.is_empty())
            .or_else(|| query.author.clone());

        let year = data
            .get("publish_date")
            .and_then(|v| v.as_str())
            .and_then(leading_year);

        let summary = data
            .get("description")
            .and_then(|v| v.as_str().map(str::to_string).or_else(|| v.get("value").and_then(|v| v.as_str()).map(str::to_string)))
            .map(|s| truncate(&s, 600));

        let cover_url = data.get("cover").and_then(|c| {
            c.get("large").or_else(|| c.get("medium")).or_else(|| c.get("small")).and_then(|v| v.as_str()).map(str::to_string)
        });

        let genres = data
            .get("subjects")
            .and_then(|v| v.as_array())
            .map(|subjects| {
                subjects
                    .iter()
                    .filter_map(|s| s.get("name").and_then(|n| n.as_str()).or_else(|| s.as_str()))
                    .take(10)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        Some(UnifiedMetadataResult {
            title,
            media_type: Some(MediaType::Book),
            year,
            genres,
            summary,
            cover_url,
            author,
            source_ids: SourceIds { isbn: Some(isbn.to_string()), ..Default::default() },
            confidence: ConfidenceLevel::High,
            primary_source: Some(MetadataSource::OpenLibrary),
            contributing_sources: vec![MetadataSource::OpenLibrary],
            queried_at: Some(chrono::Utc::now()),
            ..Default::default()
        })
    }

    async fn lookup_by_title(
        &self,
        title: &str,
        query: &LookupQuery,
        options: &LookupOptions,
    ) -> Option<UnifiedMetadataResult> {
        let mut params = vec![("title".to_string(), title.to_string())];
        if let Some(author) = &query.author {
            params.push(("author".to_string(), author.clone()));
        }
        let response = self
            .client
            .get("https://openlibrary.org/search.json")
            .query(&params)
            .timeout(timeout_for(options))
            .send()
            .await
            .ok()?;
        let payload: serde_json::Value = response.json().await.ok()?;
        let doc = payload.get("docs").and_then(|v| v.as_array()).and_then(|docs| docs.first())?;

        let doc_title = doc.get("title").and_then(|v| v.as_str()).unwrap_or(title).to_string();
        let author = doc
            .get("author_name")
            .and_then(|v| v.as_array())
            .map(|names| names.iter().filter_map(|n| n.as_str()).collect::<Vec<_>>().join(", "))
            .filter(|s| !s.is_empty())
            .or_else(|| query.author.clone());
        let year = doc
            .get("first_publish_year")
            .and_then(|v| v.as_u64())
            .map(|y| y as u32);

        let cover_url = doc.get("cover_i").and_then(|v| v.as_u64()).map(|id| {
            format!("https://covers.openlibrary.org/b/id/{id}-L.jpg")
        });

        let genres = doc
            .get("subject")
            .and_then(|v| v.as_array())
            .map(|subjects| subjects.iter().filter_map(|s| s.as_str()).take(10).map(str::to_string).collect())
            .unwrap_or_default();

        debug!(title = %doc_title, "openlibrary search match");

        Some(UnifiedMetadataResult {
            title: doc_title,
            media_type: Some(MediaType::Book),
            year,
            genres,
            cover_url,
            author,
            confidence: ConfidenceLevel::Medium,
            primary_source: Some(MetadataSource::OpenLibrary),
            contributing_sources: vec![MetadataSource::OpenLibrary],
            queried_at: Some(chrono::Utc::now()),
            ..Default::default()
        })
    }
}

/// Google Books (C15.2): requires an API key. ISBN lookup preferred.
pub struct GoogleBooksClient {
    client: Client,
    api_key: String,
}

impl GoogleBooksClient {
    pub fn new(api_key: String) -> Self {
        Self { client: Client::new(), api_key }
    }
}

#[async_trait]
impl MetadataClient for GoogleBooksClient {
    fn source(&self) -> MetadataSource {
        MetadataSource::GoogleBooks
    }

    fn supported_types(&self) -> &'static [MediaType] {
        &[MediaType::Book]
    }

    async fn lookup(&self, query: &LookupQuery, options: &LookupOptions) -> Option<UnifiedMetadataResult> {
        if query.media_type != MediaType::Book {
            return None;
        }
        let (q, is_isbn) = if let Some(isbn) = &query.isbn {
            (format!("isbn:{isbn}"), true)
        } else if let Some(title) = &query.title {
            let mut q = format!("intitle:\"{title}\"");
            if let Some(author) = &query.author {
                q.push_str(&format!("+inauthor:\"{author}\""));
            }
            (q, false)
        } else {
            return None;
        };

        let response = self
            .client
            .get("https://www.googleapis.com/books/v1/volumes")
            .query(&[("q", q.as_str()), ("key", self.api_key.as_str())])
            .timeout(timeout_for(options))
            .send()
            .await
            .ok()?;
        let payload: serde_json::Value = response.json().await.ok()?;
        let item = payload.get("items").and_then(|v| v.as_array()).and_then(|items| items.first())?;
        let info = item.get("volumeInfo")?;

        let title = info.get("title").and_then(|v| v.as_str()).unwrap_or("Unknown").to_string();
        let author = info
            .get("authors")
            .and_then(|v| v.as_array())
            .map(|authors| authors.iter().filter_map(|a| a.as_str()).collect::<Vec<_>>().join(", "))
            .filter(|s| !s.is_empty());
        let year = info.get("publishedDate").and_then(|v| v.as_str()).and_then(leading_year);
        let summary = info.get("description").and_then(|v| v.as_str()).map(|s| truncate(&strip_html(s), 600));
        let cover_url = info.get("imageLinks").and_then(|links| {
            ["extraLarge", "large", "medium", "small", "thumbnail"]
                .iter()
                .find_map(|key| links.get(key).and_then(|v| v.as_str()))
                .map(|u| u.replace("http://", "https://"))
        });
        let genres = info
            .get("categories")
            .and_then(|v| v.as_array())
            .map(|cats| {
                let mut genres = Vec::new();
                for cat in cats.iter().filter_map(|c| c.as_str()) {
                    for part in cat.split('/') {
                        dedup_push(&mut genres, part);
                    }
                }
                genres.truncate(10);
                genres
            })
            .unwrap_or_default();
        let google_books_id = item.get("id").and_then(|v| v.as_str()).map(str::to_string);

        Some(UnifiedMetadataResult {
            title,
            media_type: Some(MediaType::Book),
            year,
            genres,
            summary,
            cover_url,
            author,
            source_ids: SourceIds { isbn: query.isbn.clone(), ..Default::default() }.merge_with(&SourceIds {
                isbn: google_books_id,
                ..Default::default()
            }),
            confidence: if is_isbn { ConfidenceLevel::High } else { ConfidenceLevel::Medium },
            primary_source: Some(MetadataSource::GoogleBooks),
            contributing_sources: vec![MetadataSource::GoogleBooks],
            queried_at: Some(chrono::Utc::now()),
            ..Default::default()
        })
    }
}

/// TMDB (C15.3): movies, TV series and episodes; requires an API key.
pub struct TmdbClient {
    client: Client,
    api_key: String,
}

impl TmdbClient {
    pub fn new(api_key: String) -> Self {
        Self { client: Client::new(), api_key }
    }

    async fn get(&self, endpoint: &str, params: &[(&str, String)], options: &LookupOptions) -> Option<serde_json::Value> {
        let mut query: Vec<(&str, String)> = vec![("api_key", self.api_key.clone())];
        query.extend(params.iter().cloned());
        self.client
            .get(format!("https://api.themoviedb.org/3{endpoint}"))
            .query(&query)
            .timeout(timeout_for(options))
            .send()
            .await
            .ok()?
            .json()
            .await
            .ok()
    }
}

#[async_trait]
impl MetadataClient for TmdbClient {
    fn source(&self) -> MetadataSource {
        MetadataSource::Tmdb
    }

    fn supported_types(&self) -> &'static [MediaType] {
        &[MediaType::Movie, MediaType::TvSeries, MediaType::TvEpisode]
    }

    async fn lookup(&self, query: &LookupQuery, options: &LookupOptions) -> Option<UnifiedMetadataResult> {
        match query.media_type {
            MediaType::Movie => self.lookup_movie(query, options).await,
            MediaType::TvSeries => self.lookup_tv_series(query, options).await,
            MediaType::TvEpisode => self.lookup_tv_episode(query, options).await,
            _ => None,
        }
    }
}

impl TmdbClient {
    async fn lookup_movie(&self, query: &LookupQuery, options: &LookupOptions) -> Option<UnifiedMetadataResult> {
        let title = query.title.clone()?;
        let tmdb_id = if let Some(id) = &query.tmdb_id {
            id.clone()
        } else {
            let mut params = vec![("query", title.clone())];
            if let Some(year) = query.year {
                params.push(("year", year.to_string()));
            }
            let payload = self.get("/search/movie", &params, options).await?;
            payload.get("results")?.as_array()?.first()?.get("id")?.as_u64()?.to_string()
        };

        let data = self.get(&format!("/movie/{tmdb_id}"), &[("append_to_response", "external_ids".to_string())], options).await?;
        let title = data.get("title").and_then(|v| v.as_str()).unwrap_or("Unknown").to_string();
        let year = data.get("release_date").and_then(|v| v.as_str()).and_then(leading_year);
        let genres = data
            .get("genres")
            .and_then(|v| v.as_array())
            .map(|gs| gs.iter().filter_map(|g| g.get("name").and_then(|n| n.as_str())).take(10).map(str::to_string).collect())
            .unwrap_or_default();
        let summary = data.get("overview").and_then(|v| v.as_str()).map(str::to_string);
        let cover_url = data.get("poster_path").and_then(|v| v.as_str()).map(|p| format!("https://image.tmdb.org/t/p/original{p}"));
        let imdb_id = data.get("external_ids").and_then(|e| e.get("imdb_id")).and_then(|v| v.as_str()).map(str::to_string);

        Some(UnifiedMetadataResult {
            title,
            media_type: Some(MediaType::Movie),
            year,
            genres,
            summary,
            cover_url,
            language: data.get("original_language").and_then(|v| v.as_str()).map(str::to_string),
            runtime_minutes: data.get("runtime").and_then(|v| v.as_u64()).map(|r| r as u32),
            rating: data.get("vote_average").and_then(|v| v.as_f64()),
            votes: data.get("vote_count").and_then(|v| v.as_u64()),
            source_ids: SourceIds { tmdb: Some(tmdb_id), imdb: imdb_id },
            confidence: if query.tmdb_id.is_some() { ConfidenceLevel::High } else { ConfidenceLevel::Medium },
            primary_source: Some(MetadataSource::Tmdb),
            contributing_sources: vec![MetadataSource::Tmdb],
            queried_at: Some(chrono::Utc::now()),
            ..Default::default()
        })
    }

    async fn lookup_tv_series(&self, query: &LookupQuery, options: &LookupOptions) -> Option<UnifiedMetadataResult> {
        let series_name = query.series_name.clone().or_else(|| query.title.clone())?;
        let tv_id = if let Some(id) = &query.tmdb_id {
            id.clone()
        } else {
            let payload = self.get("/search/tv", &[("query", series_name.clone())], options).await?;
            payload.get("results")?.as_array()?.first()?.get("id")?.as_u64()?.to_string()
        };

        let data = self.get(&format!("/tv/{tv_id}"), &[("append_to_response", "external_ids".to_string())], options).await?;
        self.parse_tv_series(&data, query, &tv_id)
    }

    fn parse_tv_series(&self, data: &serde_json::Value, query: &LookupQuery, tv_id: &str) -> Option<UnifiedMetadataResult> {
        let title = data.get("name").and_then(|v| v.as_str()).unwrap_or("Unknown").to_string();
        let year = data.get("first_air_date").and_then(|v| v.as_str()).and_then(leading_year);
        let genres = data
            .get("genres")
            .and_then(|v| v.as_array())
            .map(|gs| gs.iter().filter_map(|g| g.get("name").and_then(|n| n.as_str())).take(10).map(str::to_string).collect())
            .unwrap_or_default();
        let imdb_id = data.get("external_ids").and_then(|e| e.get("imdb_id")).and_then(|v| v.as_str()).map(str::to_string);

        Some(UnifiedMetadataResult {
            title,
            media_type: Some(MediaType::TvSeries),
            year,
            genres,
            summary: data.get("overview").and_then(|v| v.as_str()).map(str::to_string),
            cover_url: data.get("poster_path").and_then(|v| v.as_str()).map(|p| format!("https://image.tmdb.org/t/p/original{p}")),
            language: data.get("original_language").and_then(|v| v.as_str()).map(str::to_string),
            rating: data.get("vote_average").and_then(|v| v.as_f64()),
            votes: data.get("vote_count").and_then(|v| v.as_u64()),
            source_ids: SourceIds { tmdb: Some(tv_id.to_string()), imdb: imdb_id },
            confidence: if query.tmdb_id.is_some() { ConfidenceLevel::High } else { ConfidenceLevel::Medium },
            primary_source: Some(MetadataSource::Tmdb),
            contributing_sources: vec![MetadataSource::Tmdb],
            queried_at: Some(chrono::Utc::now()),
            ..Default::default()
        })
    }

    async fn lookup_tv_episode(&self, query: &LookupQuery, options: &LookupOptions) -> Option<UnifiedMetadataResult> {
        let series_name = query.series_name.clone().or_else(|| query.title.clone())?;
        let (season, episode) = (query.season?, query.episode?);

        let tv_id = if let Some(id) = &query.tmdb_id {
            id.clone()
        } else {
            let payload = self.get("/search/tv", &[("query", series_name.clone())], options).await?;
            payload.get("results")?.as_array()?.first()?.get("id")?.as_u64()?.to_string()
        };

        let episode_data = self.get(&format!("/tv/{tv_id}/season/{season}/episode/{episode}"), &[], options).await?;
        let tv_data = self.get(&format!("/tv/{tv_id}"), &[("append_to_response", "external_ids".to_string())], options)
            .await
            .unwrap_or(serde_json::Value::Null);

        let show_name = tv_data.get("name").and_then(|v| v.as_str()).unwrap_or(&series_name).to_string();
        let episode_name = episode_data.get("name").and_then(|v| v.as_str()).map(str::to_string);
        let title = match &episode_name {
            Some(name) => format!("{show_name} S{season:02}E{episode:02} - {name}"),
            None => format!("{show_name} S{season:02}E{episode:02}"),
        };
        let year = episode_data
            .get("air_date")
            .and_then(|v| v.as_str())
            .and_then(leading_year)
            .or_else(|| tv_data.get("first_air_date").and_then(|v| v.as_str()).and_then(leading_year));
        let genres = tv_data
            .get("genres")
            .and_then(|v| v.as_array())
            .map(|gs| gs.iter().filter_map(|g| g.get("name").and_then(|n| n.as_str())).take(10).map(str::to_string).collect())
            .unwrap_or_default();
        let summary = episode_data
            .get("overview")
            .and_then(|v| v.as_str())
            .or_else(|| tv_data.get("overview").and_then(|v| v.as_str()))
            .map(str::to_string);
        let cover_url = episode_data
            .get("still_path")
            .and_then(|v| v.as_str())
            .or_else(|| tv_data.get("poster_path").and_then(|v| v.as_str()))
            .map(|p| format!("https://image.tmdb.org/t/p/original{p}"));
        let imdb_id = tv_data.get("external_ids").and_then(|e| e.get("imdb_id")).and_then(|v| v.as_str()).map(str::to_string);
        let episode_id = episode_data.get("id").and_then(|v| v.as_u64());

        Some(UnifiedMetadataResult {
            title,
            media_type: Some(MediaType::TvEpisode),
            year,
            genres,
            summary,
            cover_url,
            author: Some(show_name.clone()),
            series: Some(SeriesInfo { name: show_name, position: Some(season as f64 + episode as f64 / 1000.0) }),
            rating: episode_data.get("vote_average").and_then(|v| v.as_f64()),
            votes: episode_data.get("vote_count").and_then(|v| v.as_u64()),
            source_ids: SourceIds { tmdb: episode_id.map(|id| id.to_string()), imdb: imdb_id },
            confidence: if query.tmdb_id.is_some() { ConfidenceLevel::High } else { ConfidenceLevel::Medium },
            primary_source: Some(MetadataSource::Tmdb),
            contributing_sources: vec![MetadataSource::Tmdb],
            queried_at: Some(chrono::Utc::now()),
            ..Default::default()
        })
    }
}

/// OMDb (C15.4): movies, TV series and episodes keyed by IMDb id or title.
pub struct OmdbClient {
    client: Client,
    api_key: String,
}

impl OmdbClient {
    pub fn new(api_key: String) -> Self {
        Self { client: Client::new(), api_key }
    }

    fn is_na(value: &str) -> bool {
        value.trim().eq_ignore_ascii_case("n/a")
    }

    fn text(value: Option<&serde_json::Value>) -> Option<String> {
        value
            .and_then(|v| v.as_str())
            .map(str::trim)
            .filter(|s| !s.is_empty() && !Self::is_na(s))
            .map(str::to_string)
    }

    fn number<T: std::str::FromStr>(value: Option<&serde_json::Value>) -> Option<T> {
        Self::text(value).and_then(|s| s.replace(',', "").parse().ok())
    }
}

#[async_trait]
impl MetadataClient for OmdbClient {
    fn source(&self) -> MetadataSource {
        MetadataSource::Omdb
    }

    fn supported_types(&self) -> &'static [MediaType] {
        &[MediaType::Movie, MediaType::TvSeries, MediaType::TvEpisode]
    }

    async fn lookup(&self, query: &LookupQuery, options: &LookupOptions) -> Option<UnifiedMetadataResult> {
        let media_type_param = match query.media_type {
            MediaType::Movie => "movie",
            MediaType::TvSeries => "series",
            MediaType::TvEpisode => "episode",
            _ => return None,
        };

        let mut params: Vec<(&str, String)> = vec![("apikey", self.api_key.clone()), ("plot", "full".to_string())];
        if let Some(imdb) = &query.imdb_id {
            params.push(("i", imdb.clone()));
        } else {
            let title = query.title.clone().or_else(|| query.series_name.clone())?;
            params.push(("t", title));
            if let Some(year) = query.year {
                params.push(("y", year.to_string()));
            }
        }
        if query.media_type == MediaType::TvEpisode {
            params.push(("Season", query.season?.to_string()));
            params.push(("Episode", query.episode?.to_string()));
        } else {
            params.push(("type", media_type_param.to_string()));
        }

        let payload: serde_json::Value = self
            .client
            .get("https://www.omdbapi.com")
            .query(&params)
            .timeout(timeout_for(options))
            .send()
            .await
            .ok()?
            .json()
            .await
            .ok()?;

        if payload.get("Response").and_then(|v| v.as_str()) == Some("False") {
            return None;
        }

        let title = Self::text(payload.get("Title")).unwrap_or_else(|| "Unknown".to_string());
        let year = Self::text(payload.get("Year")).as_deref().and_then(leading_year);
        let genres = Self::text(payload.get("Genre"))
            .map(|g| g.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).take(10).collect())
            .unwrap_or_default();
        let imdb_id = Self::text(payload.get("imdbID"));

        Some(UnifiedMetadataResult {
            title,
            media_type: Some(query.media_type),
            year,
            genres,
            summary: Self::text(payload.get("Plot")),
            cover_url: Self::text(payload.get("Poster")),
            language: Self::text(payload.get("Language")).map(|l| l.split(',').next().unwrap_or("").trim().to_string()),
            runtime_minutes: Self::text(payload.get("Runtime"))
                .and_then(|s| s.split_whitespace().next().and_then(|n| n.parse().ok())),
            rating: Self::number(payload.get("imdbRating")),
            votes: Self::number(payload.get("imdbVotes")),
            author: Self::text(payload.get("Director")),
            source_ids: SourceIds { imdb: imdb_id, ..Default::default() },
            confidence: if query.imdb_id.is_some() { ConfidenceLevel::High } else { ConfidenceLevel::Medium },
            primary_source: Some(MetadataSource::Omdb),
            contributing_sources: vec![MetadataSource::Omdb],
            queried_at: Some(chrono::Utc::now()),
            ..Default::default()
        })
    }
}

/// TVMaze (C15.5): TV series and episode lookup, no API key required.
pub struct TvMazeClient {
    client: Client,
}

impl TvMazeClient {
    pub fn new() -> Self {
        Self { client: Client::new() }
    }
}

impl Default for TvMazeClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MetadataClient for TvMazeClient {
    fn source(&self) -> MetadataSource {
        MetadataSource::TvMaze
    }

    fn supported_types(&self) -> &'static [MediaType] {
        &[MediaType::TvSeries, MediaType::TvEpisode]
    }

    async fn lookup(&self, query: &LookupQuery, options: &LookupOptions) -> Option<UnifiedMetadataResult> {
        let series_name = query.series_name.clone().or_else(|| query.title.clone())?;
        let results: serde_json::Value = self
            .client
            .get("https://api.tvmaze.com/search/shows")
            .query(&[("q", series_name.as_str())])
            .timeout(timeout_for(options))
            .send()
            .await
            .ok()?
            .json()
            .await
            .ok()?;
        let show = results.as_array()?.first()?.get("show")?;

        if query.media_type == MediaType::TvSeries {
            return self.parse_show(show);
        }
        if query.media_type != MediaType::TvEpisode {
            return None;
        }

        let (season, episode) = (query.season?, query.episode?);
        let show_id = show.get("id")?.as_u64()?;
        let episode_data: Option<serde_json::Value> = self
            .client
            .get(format!("https://api.tvmaze.com/shows/{show_id}/episodebynumber"))
            .query(&[("season", season.to_string()), ("number", episode.to_string())])
            .timeout(timeout_for(options))
            .send()
            .await
            .ok()?
            .json()
            .await
            .ok();

        match episode_data {
            Some(episode_data) => self.parse_episode(show, &episode_data, season, episode),
            None => self.parse_show(show),
        }
    }
}

impl TvMazeClient {
    fn parse_show(&self, show: &serde_json::Value) -> Option<UnifiedMetadataResult> {
        let name = show.get("name").and_then(|v| v.as_str()).unwrap_or("Unknown").to_string();
        let year = show.get("premiered").and_then(|v| v.as_str()).and_then(leading_year);
        let genres = show
            .get("genres")
            .and_then(|v| v.as_array())
            .map(|gs| gs.iter().filter_map(|g| g.as_str()).take(10).map(str::to_string).collect())
            .unwrap_or_default();
        let summary = show.get("summary").and_then(|v| v.as_str()).map(strip_html);
        let cover_url = show
            .get("image")
            .and_then(|i| i.get("original").or_else(|| i.get("medium")))
            .and_then(|v| v.as_str())
            .map(str::to_string);
        let show_id = show.get("id").and_then(|v| v.as_u64());
        let imdb_id = show
            .get("externals")
            .and_then(|e| e.get("imdb"))
            .and_then(|v| v.as_str())
            .filter(|s| s.starts_with("tt"))
            .map(str::to_string);

        Some(UnifiedMetadataResult {
            title: name,
            media_type: Some(MediaType::TvSeries),
            year,
            genres,
            summary,
            cover_url,
            language: show.get("language").and_then(|v| v.as_str()).map(str::to_string),
            source_ids: SourceIds { tmdb: show_id.map(|id| id.to_string()), imdb: imdb_id },
            confidence: ConfidenceLevel::Medium,
            primary_source: Some(MetadataSource::TvMaze),
            contributing_sources: vec![MetadataSource::TvMaze],
            queried_at: Some(chrono::Utc::now()),
            ..Default::default()
        })
    }

    fn parse_episode(
        &self,
        show: &serde_json::Value,
        episode: &serde_json::Value,
        season: u32,
        episode_number: u32,
    ) -> Option<UnifiedMetadataResult> {
        let show_name = show.get("name").and_then(|v| v.as_str()).unwrap_or("Unknown").to_string();
        let episode_name = episode.get("name").and_then(|v| v.as_str()).map(str::to_string);
        let title = match &episode_name {
            Some(name) => format!("{show_name} S{season:02}E{episode_number:02} - {name}"),
            None => format!("{show_name} S{season:02}E{episode_number:02}"),
        };
        let year = episode
            .get("airdate")
            .and_then(|v| v.as_str())
            .and_then(leading_year)
            .or_else(|| show.get("premiered").and_then(|v| v.as_str()).and_then(leading_year));
        let genres = show
            .get("genres")
            .and_then(|v| v.as_array())
            .map(|gs| gs.iter().filter_map(|g| g.as_str()).take(10).map(str::to_string).collect())
            .unwrap_or_default();
        let summary = episode
            .get("summary")
            .and_then(|v| v.as_str())
            .map(strip_html)
            .or_else(|| show.get("summary").and_then(|v| v.as_str()).map(strip_html));
        let cover_url = episode
            .get("image")
            .and_then(|i| i.get("original").or_else(|| i.get("medium")))
            .and_then(|v| v.as_str())
            .or_else(|| show.get("image").and_then(|i| i.get("original")).and_then(|v| v.as_str()))
            .map(str::to_string);

        Some(UnifiedMetadataResult {
            title,
            media_type: Some(MediaType::TvEpisode),
            year,
            genres,
            summary,
            cover_url,
            author: Some(show_name.clone()),
            series: Some(SeriesInfo { name: show_name, position: Some(season as f64 + episode_number as f64 / 1000.0) }),
            runtime_minutes: episode.get("runtime").and_then(|v| v.as_u64()).map(|r| r as u32),
            confidence: ConfidenceLevel::Medium,
            primary_source: Some(MetadataSource::TvMaze),
            contributing_sources: vec![MetadataSource::TvMaze],
            queried_at: Some(chrono::Utc::now()),
            ..Default::default()
        })
    }
}

/// Wikipedia (C15.6): universal low-confidence fallback for books, movies and
/// TV series. No API key required.
pub struct WikipediaClient {
    client: Client,
}

impl WikipediaClient {
    pub fn new() -> Self {
        Self { client: Client::new() }
    }

    async fn page_summary(&self, title: &str, options: &LookupOptions) -> Option<serde_json::Value> {
        let encoded = title.replace(' ', "_");
        let response = self
            .client
            .get(format!("https://en.wikipedia.org/api/rest_v1/page/summary/{encoded}"))
            .header("User-Agent", "langforge/1.0 (metadata lookup)")
            .timeout(timeout_for(options))
            .send()
            .await
            .ok()?;
        if !response.status().is_success() {
            return None;
        }
        let data: serde_json::Value = response.json().await.ok()?;
        if data.get("type").and_then(|v| v.as_str()) == Some("disambiguation") {
            return None;
        }
        Some(data)
    }
}

impl Default for WikipediaClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MetadataClient for WikipediaClient {
    fn source(&self) -> MetadataSource {
        MetadataSource::Wikipedia
    }

    fn supported_types(&self) -> &'static [MediaType] {
        &[MediaType::Book, MediaType::Movie, MediaType::TvSeries]
    }

    async fn lookup(&self, query: &LookupQuery, options: &LookupOptions) -> Option<UnifiedMetadataResult> {
        let (base_title, suffixes): (String, &[&str]) = match query.media_type {
            MediaType::Book => (query.title.clone()?, &["(novel)", "(book)"]),
            MediaType::Movie => (query.title.clone()?, &["(film)", "(movie)"]),
            MediaType::TvSeries => (query.series_name.clone().or_else(|| query.title.clone())?, &["(TV series)", "(television series)"]),
            _ => return None,
        };

        let mut candidates = vec![];
        if let Some(year) = query.year {
            candidates.push(format!("{base_title} ({year} film)"));
        }
        for suffix in suffixes {
            candidates.push(format!("{base_title} {suffix}"));
        }
        candidates.push(base_title.clone());

        for candidate in candidates {
            if let Some(data) = self.page_summary(&candidate, options).await {
                return self.parse_summary(&data, query);
            }
        }
        None
    }
}

impl WikipediaClient {
    fn parse_summary(&self, data: &serde_json::Value, query: &LookupQuery) -> Option<UnifiedMetadataResult> {
        static TRAILING_PAREN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s*\([^)]+\)\s*$").unwrap());

        let raw_title = data.get("title").and_then(|v| v.as_str()).unwrap_or("Unknown");
        let title = TRAILING_PAREN.replace(raw_title, "").trim().to_string();
        let title = if title.is_empty() { raw_title.to_string() } else { title };

        let summary = data.get("extract").and_then(|v| v.as_str()).map(|s| truncate(&strip_html(s), 600));
        let cover_url = data.get("thumbnail").and_then(|t| t.get("source")).and_then(|v| v.as_str()).map(str::to_string);

        let description = data.get("description").and_then(|v| v.as_str()).unwrap_or("").to_lowercase();
        static DESCRIPTION_YEAR: Lazy<Regex> =
            Lazy::new(|| Regex::new(r"(\d{4})\s+(?:film|novel|book|series|show)").unwrap());
        let year = DESCRIPTION_YEAR
            .captures(&description)
            .and_then(|c| c.get(1))
            .and_then(|m| m.as_str().parse().ok());

        Some(UnifiedMetadataResult {
            title,
            media_type: Some(query.media_type),
            year,
            summary,
            cover_url,
            confidence: ConfidenceLevel::Low,
            primary_source: Some(MetadataSource::Wikipedia),
            contributing_sources: vec![MetadataSource::Wikipedia],
            queried_at: Some(chrono::Utc::now()),
            ..Default::default()
        })
    }
}

/// yt-dlp (C15.7): shells out to the `yt-dlp` binary for YouTube metadata,
/// the same tool the original service wraps as a library.
pub struct YtDlpClient {
    binary: String,
}

impl YtDlpClient {
    pub fn new() -> Self {
        Self { binary: "yt-dlp".to_string() }
    }
}

impl Default for YtDlpClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MetadataClient for YtDlpClient {
    fn source(&self) -> MetadataSource {
        MetadataSource::YtDlp
    }

    fn supported_types(&self) -> &'static [MediaType] {
        &[MediaType::YoutubeVideo]
    }

    async fn lookup(&self, query: &LookupQuery, _options: &LookupOptions) -> Option<UnifiedMetadataResult> {
        if query.media_type != MediaType::YoutubeVideo {
            return None;
        }
        let video_id = query.youtube_video_id.clone()?;
        let url = format!("https://www.youtube.com/watch?v={video_id}");

        let output = tokio::process::Command::new(&self.binary)
            .args(["--dump-json", "--skip-download", "--quiet", "--no-warnings", &url])
            .output()
            .await
            .ok()?;
        if !output.status.success() {
            debug!(video_id = %video_id, "yt-dlp extraction failed");
            return None;
        }
        let info: serde_json::Value = serde_json::from_slice(&output.stdout).ok()?;

        let title = info.get("title").and_then(|v| v.as_str()).unwrap_or("Unknown").to_string();
        let summary = info.get("description").and_then(|v| v.as_str()).map(|s| truncate(s, 520));
        let upload_date = info.get("upload_date").and_then(|v| v.as_str()).map(str::to_string);
        let year = upload_date.as_deref().and_then(|d| d.get(0..4)).and_then(|y| y.parse().ok());
        let cover_url = info.get("thumbnail").and_then(|v| v.as_str()).map(str::to_string);
        let channel = info
            .get("channel")
            .and_then(|v| v.as_str())
            .or_else(|| info.get("uploader").and_then(|v| v.as_str()))
            .map(str::to_string);
        let genres = info
            .get("categories")
            .and_then(|v| v.as_array())
            .map(|cats| cats.iter().filter_map(|c| c.as_str()).take(10).map(str::to_string).collect())
            .unwrap_or_default();

        Some(UnifiedMetadataResult {
            title,
            media_type: Some(MediaType::YoutubeVideo),
            year,
            genres,
            summary,
            cover_url,
            author: channel.clone(),
            channel_name: channel,
            view_count: info.get("view_count").and_then(|v| v.as_u64()),
            upload_date,
            runtime_minutes: info.get("duration").and_then(|v| v.as_u64()).map(|d| (d / 60) as u32),
            source_ids: SourceIds::default(),
            confidence: ConfidenceLevel::High,
            primary_source: Some(MetadataSource::YtDlp),
            contributing_sources: vec![MetadataSource::YtDlp],
            queried_at: Some(chrono::Utc::now()),
            ..Default::default()
        })
    }
}
