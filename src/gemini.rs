use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error, instrument};

use crate::backend::{ChatBackend, ChatSession, RecommendationBackend, RecommendationItem};
use crate::constants;
use crate::conversation::{format_transcript, Turn};
use crate::error::{BackendError, BackendResult};

const API_VERSION: &str = "v1beta";

const CHAT_SYSTEM_INSTRUCTION: &str =
    "You are a helpful and friendly AI assistant. Answer the user's questions clearly and concisely.";

// Structures matching Gemini's models/{model}:generateContent endpoint
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub(crate) struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    thought: Option<bool>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub(crate) struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

impl Content {
    fn text(role: Option<&str>, text: impl Into<String>) -> Self {
        Self {
            role: role.map(str::to_string),
            parts: vec![Part {
                text: Some(text.into()),
                thought: None,
            }],
        }
    }

    fn user(text: impl Into<String>) -> Self {
        Self::text(Some("user"), text)
    }

    fn model(text: impl Into<String>) -> Self {
        Self::text(Some("model"), text)
    }
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    response_mime_type: String,
    response_schema: serde_json::Value,
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    system_instruction: Content,
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
}

#[derive(Deserialize, Debug)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Deserialize, Debug)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

impl GenerateContentResponse {
    /// Joins the text parts of the first candidate, skipping thoughts.
    fn into_text(self) -> BackendResult<String> {
        let text = self
            .candidates
            .into_iter()
            .next()
            .and_then(|candidate| candidate.content)
            .map(|content| {
                content
                    .parts
                    .into_iter()
                    .filter(|part| part.thought != Some(true))
                    .filter_map(|part| part.text)
                    .collect::<String>()
            })
            .unwrap_or_default();

        let text = text.trim();
        if text.is_empty() {
            return Err(BackendError::EmptyResponse);
        }
        Ok(text.to_string())
    }
}

/// Client for the Gemini REST API. Cheap to clone; clones share the
/// underlying connection pool.
#[derive(Clone, Debug)]
pub struct GeminiClient {
    http: Client,
    base_url: String,
    api_key: String,
    recommendation_model: String,
    chat_model: String,
}

impl GeminiClient {
    pub fn new(base_url: &str, api_key: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            base_url: format!("{}/{}", base_url.trim_end_matches('/'), API_VERSION),
            api_key: api_key.into(),
            recommendation_model: constants::RECOMMENDATION_MODEL.clone(),
            chat_model: constants::CHAT_MODEL.clone(),
        }
    }

    pub fn with_recommendation_model(mut self, model: impl Into<String>) -> Self {
        self.recommendation_model = model.into();
        self
    }

    pub fn with_chat_model(mut self, model: impl Into<String>) -> Self {
        self.chat_model = model.into();
        self
    }

    #[instrument(skip(self, system_instruction, contents, generation_config), fields(turns = contents.len()))]
    async fn generate(
        &self,
        model: &str,
        system_instruction: String,
        contents: Vec<Content>,
        generation_config: Option<GenerationConfig>,
    ) -> BackendResult<String> {
        let url = format!("{}/models/{}:generateContent", self.base_url, model);
        let request_payload = GenerateContentRequest {
            system_instruction: Content::text(None, system_instruction),
            contents,
            generation_config,
        };

        let response = self
            .http
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&request_payload)
            .send()
            .await
            .map_err(|source| BackendError::Transport {
                url: url.clone(),
                source,
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|source| BackendError::Transport {
                url: url.clone(),
                source,
            })?;

        if !status.is_success() {
            error!(%status, error_body = %body, "Gemini API request failed");
            return Err(BackendError::Status { status, body });
        }

        let parsed: GenerateContentResponse = serde_json::from_str(&body)?;
        let text = parsed.into_text()?;
        debug!(response = %text, "Received Gemini response");
        Ok(text)
    }
}

pub(crate) fn opening_instruction() -> String {
    "You are a friendly AI book recommender. Your goal is to help a user find a book they'll love. \
     Your very first question to the user must be about what genres they typically enjoy reading. \
     Keep the question simple and direct, for example: \"What's your favorite book genre?\" or \
     \"What kind of genres do you usually read?\". Ask only one question."
        .to_string()
}

pub(crate) fn follow_up_instruction(transcript: &[Turn]) -> String {
    format!(
        r#"You are a friendly and insightful book recommender AI. Your goal is to ask a series of unique, non-repetitive follow-up questions to deeply understand a user's taste in books.

Conversation so far:
{}

Your task:
1. Work out which topics the conversation has already covered (genre, pace, tone, setting, character preferences).
2. Ask the next single, engaging question about a new aspect of their preferences.
3. Do not repeat questions or ask about topics the user's answers already settle.

Topic areas to choose from (pick one not yet covered):
- Pace: a fast-paced thriller or a slower, character-focused story?
- Tone/Mood: light and funny, or dark and mysterious?
- Setting: the real world, a fantastical realm, or a historical period?
- Protagonist: a reluctant hero, a clever detective, a flawed anti-hero?
- Likes/Dislikes: anything to avoid, like a love triangle or a cliffhanger ending?
- Recent reads: a recent book and what they liked or disliked about it.

Keep the question conversational and focused on finding the right book. Ask only one question."#,
        format_transcript(transcript)
    )
}

pub(crate) fn recommendations_instruction(transcript: &[Turn]) -> String {
    format!(
        "You are an expert book recommender. Based on this conversation:\n{}\n\n\
         Recommend {} distinct books. For each book, provide a title, author, genre, and a short, compelling synopsis.",
        format_transcript(transcript),
        constants::RECOMMENDATION_COUNT
    )
}

pub(crate) fn recommendation_schema() -> serde_json::Value {
    json!({
        "type": "ARRAY",
        "minItems": constants::RECOMMENDATION_COUNT,
        "maxItems": constants::RECOMMENDATION_COUNT,
        "items": {
            "type": "OBJECT",
            "properties": {
                "title": { "type": "STRING", "description": "The title of the book." },
                "author": { "type": "STRING", "description": "The author of the book." },
                "genre": { "type": "STRING", "description": "The primary genre of the book." },
                "synopsis": {
                    "type": "STRING",
                    "description": "A short, compelling synopsis of the book (around 50-70 words)."
                }
            },
            "required": ["title", "author", "genre", "synopsis"]
        }
    })
}

/// Parses the structured reply and enforces the fixed set size.
pub(crate) fn parse_recommendations(text: &str) -> BackendResult<Vec<RecommendationItem>> {
    let items: Vec<RecommendationItem> = serde_json::from_str(text.trim())?;
    if items.len() != constants::RECOMMENDATION_COUNT {
        return Err(BackendError::Malformed(format!(
            "expected {} recommendations, got {}",
            constants::RECOMMENDATION_COUNT,
            items.len()
        )));
    }
    Ok(items)
}

#[async_trait]
impl RecommendationBackend for GeminiClient {
    #[instrument(skip(self))]
    async fn opening_question(&self) -> BackendResult<String> {
        self.generate(
            &self.recommendation_model,
            opening_instruction(),
            vec![Content::user("Ask me your first question.")],
            None,
        )
        .await
    }

    #[instrument(skip(self, transcript), fields(turns = transcript.len()))]
    async fn follow_up_question(&self, transcript: &[Turn]) -> BackendResult<String> {
        self.generate(
            &self.recommendation_model,
            follow_up_instruction(transcript),
            vec![Content::user(
                "Based on our conversation, what's the best follow-up question to ask?",
            )],
            None,
        )
        .await
    }

    #[instrument(skip(self, transcript), fields(turns = transcript.len()))]
    async fn recommendations(&self, transcript: &[Turn]) -> BackendResult<Vec<RecommendationItem>> {
        let text = self
            .generate(
                &self.recommendation_model,
                recommendations_instruction(transcript),
                vec![Content::user("Please provide the recommendations now.")],
                Some(GenerationConfig {
                    response_mime_type: "application/json".to_string(),
                    response_schema: recommendation_schema(),
                }),
            )
            .await?;
        parse_recommendations(&text)
    }
}

/// Chat session over the stateless REST API: accepted exchanges are kept
/// here and replayed on every send.
pub struct GeminiChatSession {
    client: GeminiClient,
    history: Mutex<Vec<Content>>,
}

impl GeminiChatSession {
    pub fn new(client: GeminiClient) -> Self {
        Self {
            client,
            history: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl ChatSession for GeminiChatSession {
    #[instrument(skip(self, text))]
    async fn send(&self, text: &str) -> BackendResult<String> {
        let mut history = self.history.lock().await;
        let mut contents = history.clone();
        contents.push(Content::user(text));

        let reply = self
            .client
            .generate(
                &self.client.chat_model,
                CHAT_SYSTEM_INSTRUCTION.to_string(),
                contents,
                None,
            )
            .await?;

        // Only a completed exchange becomes part of the session.
        history.push(Content::user(text));
        history.push(Content::model(reply.clone()));
        Ok(reply)
    }
}

impl ChatBackend for GeminiClient {
    fn create_session(&self) -> Arc<dyn ChatSession> {
        Arc::new(GeminiChatSession::new(self.clone()))
    }
}
