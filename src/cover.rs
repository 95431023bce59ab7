//! Cover image resolution.
//!
//! A cover is looked up by title and author, then by title alone, and
//! otherwise replaced by a placeholder whose seed depends only on the
//! title and author.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument, warn};

use crate::constants::COVER_LOOKUP_TIMEOUT;

/// 32-bit `h * 31 + unit` hash over the UTF-16 units of `title + author`,
/// made non-negative.
pub fn placeholder_seed(title: &str, author: &str) -> u32 {
    let hash = title
        .encode_utf16()
        .chain(author.encode_utf16())
        .fold(0i32, |hash, unit| {
            (hash << 5).wrapping_sub(hash).wrapping_add(i32::from(unit))
        });
    hash.unsigned_abs()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CoverSource {
    TitleAndAuthor,
    TitleOnly,
    Placeholder,
}

/// The single image reference chosen for a book.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CoverImage {
    pub url: String,
    pub source: CoverSource,
}

impl CoverImage {
    pub fn is_placeholder(&self) -> bool {
        self.source == CoverSource::Placeholder
    }
}

/// External metadata search. `None` means "no usable result", whatever the
/// reason.
#[async_trait]
pub trait CoverLookup: Send + Sync {
    async fn search_by_title_author(&self, title: &str, author: &str) -> Option<String>;

    async fn search_by_title(&self, title: &str) -> Option<String>;
}

#[derive(Deserialize, Debug)]
struct SearchDoc {
    cover_i: Option<i64>,
}

#[derive(Deserialize, Debug)]
struct SearchResponse {
    #[serde(default)]
    docs: Vec<SearchDoc>,
}

/// Open Library search client.
#[derive(Clone, Debug)]
pub struct OpenLibraryClient {
    http: Client,
    search_url: String,
    covers_url: String,
}

impl OpenLibraryClient {
    pub fn new(base_url: &str, covers_url: &str) -> reqwest::Result<Self> {
        Self::with_timeout(base_url, covers_url, COVER_LOOKUP_TIMEOUT)
    }

    /// A search that takes longer than `timeout` counts as no result.
    pub fn with_timeout(base_url: &str, covers_url: &str, timeout: Duration) -> reqwest::Result<Self> {
        let http = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            http,
            search_url: format!("{}/search.json", base_url.trim_end_matches('/')),
            covers_url: covers_url.trim_end_matches('/').to_string(),
        })
    }

    async fn search(&self, query: &[(&str, &str)]) -> Option<String> {
        let response = match self.http.get(&self.search_url).query(query).send().await {
            Ok(response) => response,
            Err(e) => {
                warn!(error = %e, "Cover search request failed");
                return None;
            }
        };

        if !response.status().is_success() {
            warn!(status = %response.status(), "Cover search returned an error status");
            return None;
        }

        let results = match response.json::<SearchResponse>().await {
            Ok(results) => results,
            Err(e) => {
                warn!(error = %e, "Failed to parse cover search response");
                return None;
            }
        };

        results
            .docs
            .iter()
            .find_map(|doc| doc.cover_i.filter(|id| *id != 0))
            .map(|id| format!("{}/b/id/{}-L.jpg", self.covers_url, id))
    }
}

#[async_trait]
impl CoverLookup for OpenLibraryClient {
    async fn search_by_title_author(&self, title: &str, author: &str) -> Option<String> {
        self.search(&[("title", title), ("author", author)]).await
    }

    async fn search_by_title(&self, title: &str) -> Option<String> {
        self.search(&[("title", title)]).await
    }
}

#[derive(Clone)]
pub struct CoverResolver {
    lookup: Arc<dyn CoverLookup>,
    placeholder_url: String,
}

impl CoverResolver {
    pub fn new(lookup: Arc<dyn CoverLookup>, placeholder_url: &str) -> Self {
        Self {
            lookup,
            placeholder_url: placeholder_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn placeholder(&self, title: &str, author: &str) -> String {
        format!(
            "{}/seed/{}/400/600",
            self.placeholder_url,
            placeholder_seed(title, author)
        )
    }

    /// Always yields exactly one image reference.
    #[instrument(skip(self))]
    pub async fn resolve(&self, title: &str, author: &str) -> CoverImage {
        if let Some(url) = self.lookup.search_by_title_author(title, author).await {
            debug!(%url, "Cover found by title and author");
            return CoverImage {
                url,
                source: CoverSource::TitleAndAuthor,
            };
        }

        if let Some(url) = self.lookup.search_by_title(title).await {
            debug!(%url, "Cover found by title");
            return CoverImage {
                url,
                source: CoverSource::TitleOnly,
            };
        }

        debug!("No cover found, using placeholder");
        CoverImage {
            url: self.placeholder(title, author),
            source: CoverSource::Placeholder,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct ScriptedLookup {
        by_title_author: Option<String>,
        by_title: Option<String>,
        calls: Mutex<Vec<&'static str>>,
    }

    impl ScriptedLookup {
        fn new(by_title_author: Option<&str>, by_title: Option<&str>) -> Self {
            Self {
                by_title_author: by_title_author.map(str::to_string),
                by_title: by_title.map(str::to_string),
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl CoverLookup for ScriptedLookup {
        async fn search_by_title_author(&self, _title: &str, _author: &str) -> Option<String> {
            self.calls.lock().unwrap().push("title_author");
            self.by_title_author.clone()
        }

        async fn search_by_title(&self, _title: &str) -> Option<String> {
            self.calls.lock().unwrap().push("title");
            self.by_title.clone()
        }
    }

    #[test]
    fn test_placeholder_seed_is_deterministic() {
        assert_eq!(
            placeholder_seed("Dune", "Frank Herbert"),
            placeholder_seed("Dune", "Frank Herbert")
        );
        assert_eq!(placeholder_seed("Dune", "Frank Herbert"), 855243676);
        assert_eq!(placeholder_seed("", ""), 0);
        assert_eq!(placeholder_seed("a", ""), 97);
    }

    #[test]
    fn test_placeholder_seed_depends_on_concatenation() {
        assert_eq!(placeholder_seed("ab", "c"), placeholder_seed("a", "bc"));
        assert_ne!(placeholder_seed("ab", "c"), placeholder_seed("ac", "b"));
    }

    #[tokio::test]
    async fn test_resolve_prefers_title_and_author() {
        let lookup = Arc::new(ScriptedLookup::new(Some("http://a"), Some("http://b")));
        let resolver = CoverResolver::new(lookup.clone(), "http://ph");

        let cover = resolver.resolve("Dune", "Frank Herbert").await;
        assert_eq!(cover.url, "http://a");
        assert_eq!(cover.source, CoverSource::TitleAndAuthor);
        assert_eq!(*lookup.calls.lock().unwrap(), vec!["title_author"]);
    }

    #[tokio::test]
    async fn test_resolve_falls_back_to_title_only() {
        let lookup = Arc::new(ScriptedLookup::new(None, Some("http://b")));
        let resolver = CoverResolver::new(lookup.clone(), "http://ph");

        let cover = resolver.resolve("Dune", "F. Herbert").await;
        assert_eq!(cover.source, CoverSource::TitleOnly);
        assert_eq!(*lookup.calls.lock().unwrap(), vec!["title_author", "title"]);
    }

    #[tokio::test]
    async fn test_resolve_uses_placeholder_when_both_searches_fail() {
        let resolver = CoverResolver::new(Arc::new(ScriptedLookup::new(None, None)), "http://ph/");

        let cover = resolver.resolve("Dune", "Frank Herbert").await;
        assert!(cover.is_placeholder());
        assert_eq!(cover.url, "http://ph/seed/855243676/400/600");
        assert_eq!(cover.url, resolver.placeholder("Dune", "Frank Herbert"));
    }

    #[tokio::test]
    async fn test_resolve_tolerates_empty_input() {
        let resolver = CoverResolver::new(Arc::new(ScriptedLookup::new(None, None)), "http://ph");
        let cover = resolver.resolve("", "").await;
        assert!(!cover.url.is_empty());
        assert_eq!(cover.url, "http://ph/seed/0/400/600");
    }
}
