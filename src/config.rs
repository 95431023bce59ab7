use anyhow::{bail, Context, Result};
use clap::Args;
use std::path::PathBuf;
use std::sync::Arc;

use crate::chat::ChatHandle;
use crate::constants;
use crate::cover::{CoverResolver, OpenLibraryClient};
use crate::dialogue::DialogueHandle;
use crate::gemini::GeminiClient;

/// Backend and lookup settings shared by every subcommand.
#[derive(Args, Debug, Clone)]
pub struct AppConfig {
    #[arg(long, global = true, env = "GEMINI_API_KEY", hide_env_values = true, help = "Gemini API key (falls back to API_KEY).")]
    pub api_key: Option<String>,

    #[arg(long, global = true, default_value_t = constants::GEMINI_BASE_URL.clone(), help = "Gemini API base URL.")]
    pub gemini_url: String,

    #[arg(long, global = true, default_value_t = constants::RECOMMENDATION_MODEL.clone(), help = "Model used for questions and recommendations.")]
    pub model: String,

    #[arg(long, global = true, default_value_t = constants::CHAT_MODEL.clone(), help = "Model used for free-form chat.")]
    pub chat_model: String,

    #[arg(long, global = true, default_value_t = constants::OPEN_LIBRARY_URL.clone(), help = "Open Library base URL for cover search.")]
    pub open_library_url: String,

    #[arg(long, global = true, default_value_t = constants::COVERS_URL.clone(), help = "Cover image host.")]
    pub covers_url: String,

    #[arg(long, global = true, default_value_t = constants::PLACEHOLDER_URL.clone(), help = "Placeholder image host.")]
    pub placeholder_url: String,

    #[arg(long, global = true, default_value = "templates", help = "Directory holding the web UI templates.")]
    pub templates: PathBuf,
}

impl AppConfig {
    /// The configured key, or `API_KEY` from the environment.
    pub fn resolve_api_key(&self) -> Result<String> {
        match pick_api_key(self.api_key.clone(), std::env::var("API_KEY").ok()) {
            Some(key) => Ok(key),
            None => bail!("No API key configured; set GEMINI_API_KEY (or API_KEY) or pass --api-key"),
        }
    }

    pub fn gemini_client(&self) -> Result<GeminiClient> {
        Ok(GeminiClient::new(&self.gemini_url, self.resolve_api_key()?)
            .with_recommendation_model(&self.model)
            .with_chat_model(&self.chat_model))
    }

    pub fn cover_resolver(&self) -> Result<CoverResolver> {
        let lookup = OpenLibraryClient::new(&self.open_library_url, &self.covers_url)
            .context("Failed to build the Open Library client")?;
        Ok(CoverResolver::new(Arc::new(lookup), &self.placeholder_url))
    }

    pub fn dialogue(&self) -> Result<DialogueHandle> {
        Ok(DialogueHandle::new(Arc::new(self.gemini_client()?)))
    }

    pub fn chat(&self) -> Result<ChatHandle> {
        Ok(ChatHandle::new(Arc::new(self.gemini_client()?)))
    }
}

// Blank values count as unset.
fn pick_api_key(flag: Option<String>, fallback: Option<String>) -> Option<String> {
    let non_blank = |key: &String| !key.trim().is_empty();
    flag.filter(non_blank).or_else(|| fallback.filter(non_blank))
}
