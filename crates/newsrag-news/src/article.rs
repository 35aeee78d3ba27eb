//! NewsAPI article records and their conversion into corpus documents.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use newsrag_core::types::RawDocument;

/// Publisher block of a NewsAPI article.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewsSource {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

/// One article as returned by `/v2/everything`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewsArticle {
    #[serde(default)]
    pub source: Option<NewsSource>,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub published_at: Option<String>,
}

impl NewsArticle {
    pub fn source_name(&self) -> Option<&str> {
        self.source.as_ref().and_then(|s| s.name.as_deref())
    }

    /// Indexable text: title, description, and content joined by spaces.
    pub fn text(&self) -> String {
        [&self.title, &self.description, &self.content]
            .iter()
            .map(|part| part.as_deref().unwrap_or(""))
            .collect::<Vec<_>>()
            .join(" ")
            .trim()
            .to_string()
    }

    /// Convert into a corpus document. Absent fields are omitted from the
    /// attributes rather than stored as empty strings.
    pub fn into_raw_document(self) -> RawDocument {
        let mut document = RawDocument::new(self.text());
        let source = self.source_name().map(str::to_string);
        let fields = [
            ("title", self.title),
            ("description", self.description),
            ("content", self.content),
            ("source", source),
            ("url", self.url),
            ("publishedAt", self.published_at),
        ];
        for (key, value) in fields {
            if let Some(value) = value {
                document = document.with_attribute(key, value);
            }
        }
        document
    }
}

/// Deduplicate by URL. An article keeps the position where its URL first
/// appeared but takes the content of its last occurrence. Articles without
/// a URL are dropped.
pub fn dedup_by_url(articles: Vec<NewsArticle>) -> Vec<NewsArticle> {
    let mut positions: HashMap<String, usize> = HashMap::new();
    let mut deduped: Vec<NewsArticle> = Vec::new();
    for article in articles {
        let Some(url) = article.url.clone().filter(|u| !u.is_empty()) else {
            continue;
        };
        match positions.get(&url) {
            Some(&position) => deduped[position] = article,
            None => {
                positions.insert(url, deduped.len());
                deduped.push(article);
            }
        }
    }
    deduped
}
