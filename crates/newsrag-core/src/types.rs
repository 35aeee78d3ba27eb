use std::collections::BTreeMap;
use std::ops::Range;

use serde::{Deserialize, Serialize};

// =============================================================================
// Stride
// =============================================================================

/// Number of expansion queries generated per article (N).
///
/// Expansion queries for article `a` occupy rows `a * N .. a * N + N` of the
/// expansion index, so `row / N` always recovers the owning article.
pub const EXPANSION_STRIDE: usize = 3;

/// Owning article of an expansion-index row.
pub fn article_for_row(row: usize) -> usize {
    row / EXPANSION_STRIDE
}

/// Expansion-index rows owned by an article.
pub fn rows_for_article(article_id: usize) -> Range<usize> {
    let start = article_id * EXPANSION_STRIDE;
    start..start + EXPANSION_STRIDE
}

// =============================================================================
// Corpus
// =============================================================================

/// One raw corpus item before indexing.
///
/// `attributes` carries source metadata (title, url, publishedAt, ...) that is
/// copied onto the indexed [`Article`] unchanged.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawDocument {
    pub text: String,
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
}

impl RawDocument {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            attributes: BTreeMap::new(),
        }
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// Trimmed text, or `None` if nothing is left to index.
    pub fn normalized_text(&self) -> Option<&str> {
        let trimmed = self.text.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed)
        }
    }
}

/// An indexed article.
///
/// `id` is the article's position in the persisted metadata sequence and is
/// its identity; articles are never reordered after indexing.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Article {
    pub id: usize,
    pub text: String,
    #[serde(flatten)]
    pub attributes: BTreeMap<String, String>,
}

impl Article {
    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }
}

/// A synthesized paraphrase query standing in for an article.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpansionQuery {
    pub article_id: usize,
    pub text: String,
}

/// Enriched metadata entry pairing an article with its expansion queries.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpansionRecord {
    pub article: Article,
    pub queries: Vec<String>,
}

impl ExpansionRecord {
    /// The record's queries tagged with their owning article.
    pub fn expansion_queries(&self) -> Vec<ExpansionQuery> {
        self.queries
            .iter()
            .map(|text| ExpansionQuery {
                article_id: self.article.id,
                text: text.clone(),
            })
            .collect()
    }
}

// =============================================================================
// Retrieval
// =============================================================================

/// One expansion-index hit mapped back to its owning article.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RetrievalHit {
    pub article_id: usize,
    pub distance: f32,
}

/// A deduplicated retrieval result.
///
/// `distance` is the article's own best (smallest) expansion-query distance.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RankedArticle {
    pub article_id: usize,
    pub distance: f32,
    pub text: String,
}

// =============================================================================
// Conversation
// =============================================================================

/// One question/answer exchange in a chat session.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub query: String,
    pub answer: String,
}

impl ChatTurn {
    pub fn new(query: impl Into<String>, answer: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            answer: answer.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stride_mapping() {
        for article in 0..50 {
            for row in rows_for_article(article) {
                assert_eq!(article_for_row(row), article);
            }
        }
        assert_eq!(rows_for_article(2), 6..9);
        assert_eq!(article_for_row(8), 2);
        assert_eq!(article_for_row(9), 3);
    }

    #[test]
    fn test_normalized_text() {
        assert_eq!(RawDocument::new("  hello  ").normalized_text(), Some("hello"));
        assert_eq!(RawDocument::new(" \n\t ").normalized_text(), None);
        assert_eq!(RawDocument::new("").normalized_text(), None);
    }

    #[test]
    fn test_article_json_flattens_attributes() {
        let mut attributes = BTreeMap::new();
        attributes.insert("title".to_string(), "Stocks rise".to_string());
        attributes.insert("publishedAt".to_string(), "2025-12-11T02:15:30Z".to_string());
        let article = Article {
            id: 4,
            text: "Stocks rise today".to_string(),
            attributes,
        };

        let json = serde_json::to_value(&article).unwrap();
        assert_eq!(json["id"], 4);
        assert_eq!(json["title"], "Stocks rise");
        assert_eq!(json["publishedAt"], "2025-12-11T02:15:30Z");

        let back: Article = serde_json::from_value(json).unwrap();
        assert_eq!(back, article);
        assert_eq!(back.attribute("title"), Some("Stocks rise"));
    }

    #[test]
    fn test_expansion_record_queries_carry_owner() {
        let record = ExpansionRecord {
            article: Article {
                id: 7,
                text: "t".to_string(),
                attributes: BTreeMap::new(),
            },
            queries: vec!["a".into(), "b".into(), "c".into()],
        };
        let queries = record.expansion_queries();
        assert_eq!(queries.len(), 3);
        assert!(queries.iter().all(|q| q.article_id == 7));
        assert_eq!(queries[1].text, "b");
    }

    #[test]
    fn test_raw_document_attributes_default_when_missing() {
        let doc: RawDocument = serde_json::from_str(r#"{"text": "only text"}"#).unwrap();
        assert!(doc.attributes.is_empty());
        let doc = RawDocument::new("x").with_attribute("url", "https://example.com");
        assert_eq!(doc.attributes["url"], "https://example.com");
    }
}
