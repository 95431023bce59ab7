//! Projects a finished recommendation set into display cards.

use futures::future::join_all;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

use crate::backend::RecommendationItem;
use crate::cover::{CoverImage, CoverResolver};
use crate::dialogue::{DialogueSnapshot, DialogueState};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BookCard {
    pub title: String,
    pub author: String,
    pub genre: String,
    pub synopsis: String,
    pub cover: CoverImage,
    /// Substitute for `cover` if the image fails to load in the browser.
    pub fallback_url: String,
}

impl BookCard {
    pub async fn resolve(item: &RecommendationItem, resolver: &CoverResolver) -> Self {
        let cover = resolver.resolve(&item.title, &item.author).await;
        Self {
            title: item.title.clone(),
            author: item.author.clone(),
            genre: item.genre.clone(),
            synopsis: item.synopsis.clone(),
            cover,
            fallback_url: resolver.placeholder(&item.title, &item.author),
        }
    }
}

/// One card per item, in order. Covers are resolved concurrently and one
/// card's lookup never affects another.
pub async fn render_cards(items: &[RecommendationItem], resolver: &CoverResolver) -> Vec<BookCard> {
    join_all(items.iter().map(|item| BookCard::resolve(item, resolver))).await
}

/// Cards for the completed dialogue, resolved once per dialogue run.
#[derive(Clone, Default)]
pub struct CardCache {
    rendered: Arc<Mutex<Option<(u64, Vec<BookCard>)>>>,
}

impl CardCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Empty until the dialogue completes. The lock is held while covers
    /// resolve so concurrent readers share one lookup.
    pub async fn cards(&self, snapshot: &DialogueSnapshot, resolver: &CoverResolver) -> Vec<BookCard> {
        if snapshot.state != DialogueState::Complete {
            return Vec::new();
        }

        let mut rendered = self.rendered.lock().await;
        if let Some((generation, cards)) = rendered.as_ref() {
            if *generation == snapshot.generation {
                return cards.clone();
            }
        }

        debug!(generation = snapshot.generation, "Resolving covers for finished dialogue");
        let cards = render_cards(&snapshot.recommendations, resolver).await;
        *rendered = Some((snapshot.generation, cards.clone()));
        cards
    }
}
