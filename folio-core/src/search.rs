//! Inverted index from normalized tokens to page occurrences.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::pagination::Page;

pub const CONTEXT_RADIUS: usize = 5;
pub const MIN_TOKEN_CHARS: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Occurrence {
    pub page_number: usize,
    pub token_index: usize,
    pub context: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchHit {
    pub page_number: usize,
    pub context: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchIndex {
    postings: BTreeMap<String, Vec<Occurrence>>,
}

/// Lower-cased token with non-alphanumeric characters removed, or `None` when
/// fewer than [`MIN_TOKEN_CHARS`] characters remain.
pub fn normalize_token(token: &str) -> Option<String> {
    let normalized: String = token
        .chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect();
    (normalized.chars().count() >= MIN_TOKEN_CHARS).then_some(normalized)
}

impl SearchIndex {
    #[instrument(skip_all, fields(pages = pages.len()))]
    pub fn build(pages: &[Page]) -> Self {
        let mut postings: BTreeMap<String, Vec<Occurrence>> = BTreeMap::new();
        for page in pages {
            let tokens: Vec<&str> = page.raw_content.split_whitespace().collect();
            for (token_index, token) in tokens.iter().enumerate() {
                let Some(normalized) = normalize_token(token) else {
                    continue;
                };
                let from = token_index.saturating_sub(CONTEXT_RADIUS);
                let to = (token_index + CONTEXT_RADIUS + 1).min(tokens.len());
                postings.entry(normalized).or_default().push(Occurrence {
                    page_number: page.page_number,
                    token_index,
                    context: tokens[from..to].join(" "),
                });
            }
        }
        Self { postings }
    }

    pub fn occurrences(&self, token: &str) -> &[Occurrence] {
        normalize_token(token)
            .and_then(|normalized| self.postings.get(&normalized))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn token_count(&self) -> usize {
        self.postings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.postings.is_empty()
    }

    /// Union of the postings of every query token, one hit per page, in page
    /// order. The context is that of the first matching occurrence on the page.
    pub fn search(&self, query: &str) -> Vec<SearchHit> {
        let tokens: BTreeSet<String> = query.split_whitespace().filter_map(normalize_token).collect();
        let mut hits: BTreeMap<usize, &Occurrence> = BTreeMap::new();
        for token in &tokens {
            for occurrence in self.postings.get(token).into_iter().flatten() {
                hits.entry(occurrence.page_number)
                    .and_modify(|best| {
                        if occurrence.token_index < best.token_index {
                            *best = occurrence;
                        }
                    })
                    .or_insert(occurrence);
            }
        }
        hits.into_values()
            .map(|occurrence| SearchHit {
                page_number: occurrence.page_number,
                context: occurrence.context.clone(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(number: usize, raw: &str) -> Page {
        Page {
            id: format!("page-{}", number),
            formatted_content: String::new(),
            raw_content: raw.to_string(),
            page_number: number,
            chapter_index: 0,
            word_count: raw.split_whitespace().count(),
            estimated_reading_time_minutes: 1,
            oversized: false,
        }
    }

    #[test]
    fn normalizes_and_drops_short_tokens() {
        assert_eq!(normalize_token("Hello,"), Some("hello".to_string()));
        assert_eq!(normalize_token("**Canción**"), Some("canción".to_string()));
        assert_eq!(normalize_token("an"), None);
        assert_eq!(normalize_token("a.b"), None);
        assert_eq!(normalize_token("---"), None);
    }

    #[test]
    fn records_context_window_of_five_tokens() {
        let pages = [page(1, "one two three four five six seven eight nine ten eleven twelve")];
        let index = SearchIndex::build(&pages);
        let hits = index.occurrences("seven");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].token_index, 6);
        assert_eq!(hits[0].context, "two three four five six seven eight nine ten eleven twelve");
        assert_eq!(index.occurrences("one")[0].context, "one two three four five six");
    }

    #[test]
    fn search_unions_tokens_and_dedupes_pages() {
        let pages = [
            page(1, "The river ran past the mill."),
            page(2, "Nothing here."),
            page(3, "A mill by the RIVER, and another river."),
        ];
        let index = SearchIndex::build(&pages);
        let hits = index.search("river mill");
        assert_eq!(hits.iter().map(|h| h.page_number).collect::<Vec<_>>(), vec![1, 3]);
        assert_eq!(index.occurrences("river").len(), 3);
        assert!(index.search("of it").is_empty());
        assert!(index.search("").is_empty());
    }

    #[test]
    fn every_long_token_is_indexed() {
        let pages = [page(1, "Alpha, beta! gamma? de el z"), page(2, "ALPHA omega")];
        let index = SearchIndex::build(&pages);
        for page in &pages {
            for token in page.raw_content.split_whitespace() {
                if let Some(normalized) = normalize_token(token) {
                    assert!(
                        index
                            .occurrences(&normalized)
                            .iter()
                            .any(|o| o.page_number == page.page_number),
                        "{} missing",
                        normalized
                    );
                }
            }
        }
        assert_eq!(index.token_count(), 4);
    }
}
