//! Cross-source merge rules (C15): combine multiple provider results into one
//! unified record, the primary source's identity fields winning and gaps
//! filled from secondaries.

use crate::model::{ConfidenceLevel, MetadataSource, UnifiedMetadataResult};

fn normalize_genre_name(raw: &str) -> String {
    let lower = raw.trim().to_lowercase();
    match lower.as_str() {
        "sci-fi" | "sci fi" | "scifi" => "Science Fiction".to_string(),
        "rom-com" | "rom com" | "romcom" => "Romantic Comedy".to_string(),
        "documentary" | "docuseries" | "doc" => "Documentary".to_string(),
        _ => raw
            .trim()
            .split_whitespace()
            .map(|word| {
                let mut chars = word.chars();
                match chars.next() {
                    Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                    None => String::new(),
                }
            })
            .collect::<Vec<_>>()
            .join(" "),
    }
}

/// Appends `candidate` to `genres` unless a case-insensitive duplicate
/// already exists, after canonicalizing its name.
fn genre_exists(genres: &[String], candidate: &str) -> bool {
    genres.iter().any(|g| g.eq_ignore_ascii_case(candidate))
}

pub fn deduplicate_genres(result: &mut UnifiedMetadataResult) {
    let mut deduped: Vec<String> = Vec::new();
    for raw in &result.genres {
        let normalized = normalize_genre_name(raw);
        if !genre_exists(&deduped, &normalized) {
            deduped.push(normalized);
        }
    }
    result.genres = deduped;
}

/// Merges `confidences` to the most conservative (lowest) level present.
fn merge_confidence(confidences: &[ConfidenceLevel]) -> ConfidenceLevel {
    confidences.iter().copied().min().unwrap_or(ConfidenceLevel::Low)
}

/// Picks a cover url, preferring the highest-confidence source that has one.
fn select_best_cover(results: &[UnifiedMetadataResult]) -> Option<String> {
    let mut ranked: Vec<&UnifiedMetadataResult> = results.iter().filter(|r| r.cover_url.is_some()).collect();
    ranked.sort_by(|a, b| b.confidence.cmp(&a.confidence));
    ranked.first().and_then(|r| r.cover_url.clone())
}

/// Merges a chain of per-source lookup results into one unified record. The
/// first entry is treated as primary: its title, media type and author are
/// kept; every other scalar field is filled from the first secondary source
/// that has it. `results` must be non-empty.
pub fn merge_results(results: Vec<UnifiedMetadataResult>) -> UnifiedMetadataResult {
    let mut iter = results.into_iter();
    let mut merged = iter.next().expect("merge_results requires at least one result");
    let secondaries: Vec<UnifiedMetadataResult> = iter.collect();

    for secondary in &secondaries {
        if merged.year.is_none() {
            merged.year = secondary.year;
        }
        if merged.summary.is_none() {
            merged.summary = secondary.summary.clone();
        } else if let (Some(current), Some(candidate)) = (&merged.summary, &secondary.summary) {
            if candidate.len() as f64 > current.len() as f64 * 1.2 {
                merged.summary = Some(candidate.clone());
            }
        }
        if merged.cover_url.is_none() {
            merged.cover_url = secondary.cover_url.clone();
        }
        if merged.cover_file.is_none() {
            merged.cover_file = secondary.cover_file.clone();
        }
        if merged.author.is_none() {
            merged.author = secondary.author.clone();
        }
        if merged.language.is_none() {
            merged.language = secondary.language.clone();
        }
        if merged.runtime_minutes.is_none() {
            merged.runtime_minutes = secondary.runtime_minutes;
        }
        if merged.series.is_none() {
            merged.series = secondary.series.clone();
        }
        merged.genres.extend(secondary.genres.iter().cloned());
        merged.source_ids = merged.source_ids.merge_with(&secondary.source_ids);

        let merged_votes = merged.votes.unwrap_or(0);
        let secondary_votes = secondary.votes.unwrap_or(0);
        if secondary.rating.is_some() && secondary_votes > merged_votes.saturating_mul(2) {
            merged.rating = secondary.rating;
            merged.votes = secondary.votes;
        } else if merged.rating.is_none() {
            merged.rating = secondary.rating;
            merged.votes = secondary.votes;
        }
    }

    let cover_candidates: Vec<UnifiedMetadataResult> =
        std::iter::once(merged.clone()).chain(secondaries.iter().cloned()).collect();
    if merged.cover_url.is_none() {
        merged.cover_url = select_best_cover(&cover_candidates);
    }

    let mut contributing_sources: Vec<MetadataSource> = merged.primary_source.into_iter().collect();
    for secondary in &secondaries {
        if let Some(source) = secondary.primary_source {
            if !contributing_sources.contains(&source) {
                contributing_sources.push(source);
            }
        }
    }
    merged.contributing_sources = contributing_sources;

    let mut confidences = vec![merged.confidence];
    confidences.extend(secondaries.iter().map(|s| s.confidence));
    merged.confidence = merge_confidence(&confidences);

    deduplicate_genres(&mut merged);
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::MediaType;

    fn result(source: MetadataSource, confidence: ConfidenceLevel) -> UnifiedMetadataResult {
        UnifiedMetadataResult {
            title: "1984".to_string(),
            media_type: Some(MediaType::Book),
            primary_source: Some(source),
            contributing_sources: vec![source],
            confidence,
            ..Default::default()
        }
    }

    #[test]
    fn fills_missing_year_from_secondary() {
        let mut primary = result(MetadataSource::OpenLibrary, ConfidenceLevel::High);
        let mut secondary = result(MetadataSource::Wikipedia, ConfidenceLevel::Low);
        secondary.year = Some(1949);
        primary.year = None;
        let merged = merge_results(vec![primary, secondary]);
        assert_eq!(merged.year, Some(1949));
    }

    #[test]
    fn confidence_is_most_conservative_of_contributors() {
        let primary = result(MetadataSource::OpenLibrary, ConfidenceLevel::High);
        let secondary = result(MetadataSource::Wikipedia, ConfidenceLevel::Low);
        let merged = merge_results(vec![primary, secondary]);
        assert_eq!(merged.confidence, ConfidenceLevel::Low);
    }

    #[test]
    fn longer_secondary_summary_replaces_short_primary_summary() {
        let mut primary = result(MetadataSource::OpenLibrary, ConfidenceLevel::High);
        primary.summary = Some("Short.".to_string());
        let mut secondary = result(MetadataSource::Wikipedia, ConfidenceLevel::Low);
        secondary.summary = Some("A".repeat(200));
        let merged = merge_results(vec![primary, secondary]);
        assert_eq!(merged.summary.unwrap().len(), 200);
    }

    #[test]
    fn genre_dedup_is_case_insensitive_and_canonicalizes_known_aliases() {
        let mut result = UnifiedMetadataResult {
            genres: vec!["sci-fi".to_string(), "Science Fiction".to_string(), "Drama".to_string()],
            ..Default::default()
        };
        deduplicate_genres(&mut result);
        assert_eq!(result.genres, vec!["Science Fiction".to_string(), "Drama".to_string()]);
    }

    #[test]
    fn contributing_sources_tracks_every_source_in_the_chain() {
        let primary = result(MetadataSource::OpenLibrary, ConfidenceLevel::High);
        let secondary = result(MetadataSource::Wikipedia, ConfidenceLevel::Low);
        let merged = merge_results(vec![primary, secondary]);
        assert_eq!(
            merged.contributing_sources,
            vec![MetadataSource::OpenLibrary, MetadataSource::Wikipedia]
        );
    }
}
