//! Rule-based shopping assistant.
//!
//! A message is first classified by keyword. Questions about store data
//! (user, product and order counts, listings, revenue) are answered from
//! [`AnalyticsStore`] with canned templates; everything else is answered from
//! the [`KnowledgeBase`], optionally phrased by an Ollama model. The service
//! holds no per-conversation state.

mod data;
mod intent;
mod knowledge;
mod ollama;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, instrument, warn};

pub use data::{QueryResult, format_result, run as run_query};
pub use intent::{AnalyticsQuery, Intent, Timeframe, classify};
pub use knowledge::{KnowledgeBase, KnowledgeDoc};
pub use ollama::{OllamaClient, build_prompt};

use crate::config::ChatbotSettings;
use crate::db::AnalyticsStore;

/// Source tag on answers computed from live data.
pub const LIVE_DATA_SOURCE: &str = "live_database";

const LIVE_DATA_TYPE: &str = "database_result";

const GENERIC_ANSWER: &str = "Thank you for your question! I can help with Shonifity products, \
orders, shipping, returns and more. Could you tell me a little more about what you need?";

/// Errors from chatbot setup and model calls.
#[derive(Debug, Error)]
pub enum ChatbotError {
    #[error("knowledge file {path}: {reason}")]
    KnowledgeFile { path: String, reason: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Ollama returned {status}: {message}")]
    Ollama { status: u16, message: String },
}

/// Ollama endpoint and model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OllamaSettings {
    pub url: String,
    pub model: String,
}

/// Everything the chatbot needs, fixed at startup.
#[derive(Debug, Clone, Default)]
pub struct ChatbotConfig {
    pub knowledge: KnowledgeBase,
    /// Rule-based answers only when `None`.
    pub ollama: Option<OllamaSettings>,
}

impl ChatbotConfig {
    /// Build from environment settings, reading the knowledge file if one is set.
    ///
    /// # Errors
    ///
    /// Returns an error if the knowledge file cannot be loaded.
    pub fn from_settings(settings: &ChatbotSettings) -> Result<Self, ChatbotError> {
        let knowledge = match &settings.knowledge_file {
            Some(path) => KnowledgeBase::from_file(path)?,
            None => KnowledgeBase::default(),
        };
        let ollama = settings.ollama_url.as_ref().map(|url| OllamaSettings {
            url: url.clone(),
            model: settings.ollama_model.clone(),
        });
        Ok(Self { knowledge, ollama })
    }
}

/// Answer to one chat message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatReply {
    pub response: String,
    pub sources: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query_used: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// Chatbot service.
#[derive(Clone)]
pub struct Chatbot {
    inner: Arc<ChatbotInner>,
}

struct ChatbotInner {
    knowledge: KnowledgeBase,
    analytics: Arc<dyn AnalyticsStore>,
    ollama: Option<OllamaClient>,
}

impl Chatbot {
    /// Create the chatbot.
    ///
    /// # Errors
    ///
    /// Returns an error if the Ollama HTTP client cannot be built.
    pub fn new(
        config: ChatbotConfig,
        analytics: Arc<dyn AnalyticsStore>,
    ) -> Result<Self, ChatbotError> {
        let ollama = config
            .ollama
            .map(|o| OllamaClient::new(&o.url, &o.model))
            .transpose()?;
        Ok(Self {
            inner: Arc::new(ChatbotInner {
                knowledge: config.knowledge,
                analytics,
                ollama,
            }),
        })
    }

    /// Whether answers may come from an Ollama model.
    #[must_use]
    pub fn uses_ollama(&self) -> bool {
        self.inner.ollama.is_some()
    }

    /// Answer a message.
    ///
    /// Never fails: a failed data query falls through to the knowledge base and
    /// a failed model call to the rule-based answer.
    #[instrument(skip(self, message), fields(message_len = message.len()))]
    pub async fn reply(&self, message: &str) -> ChatReply {
        let now = Utc::now();

        if let Intent::Data(query) = classify(message) {
            match data::run(self.inner.analytics.as_ref(), query, now).await {
                Ok(result) => {
                    debug!(subject = query.subject(), "Answered from live data");
                    return live_data_reply(query, &result, now);
                }
                Err(e) => warn!(
                    error = %e,
                    subject = query.subject(),
                    "Live data query failed, answering from knowledge base"
                ),
            }
        }

        let docs = self.inner.knowledge.find_relevant(message);
        let response = self.generate(message, &docs).await;
        ChatReply {
            response,
            sources: docs.iter().map(|d| d.topic.clone()).collect(),
            data_type: None,
            query_used: None,
            timestamp: now,
        }
    }

    /// Suggested questions for a partially typed query.
    #[must_use]
    pub fn suggestions(&self, query: &str) -> Vec<String> {
        self.inner.knowledge.suggestions(query)
    }

    async fn generate(&self, message: &str, docs: &[&KnowledgeDoc]) -> String {
        if let Some(ollama) = &self.inner.ollama {
            let context: Vec<&str> = docs.iter().map(|d| d.content.as_str()).collect();
            match ollama.generate(&build_prompt(message, &context)).await {
                Ok(text) if !text.trim().is_empty() => return text,
                Ok(_) => warn!("Ollama returned an empty answer"),
                Err(e) => warn!(error = %e, "Ollama request failed, using rule-based answer"),
            }
        }
        fallback_answer(docs)
    }
}

/// Rule-based answer from the best matching document.
#[must_use]
pub fn fallback_answer(docs: &[&KnowledgeDoc]) -> String {
    docs.first().map_or_else(
        || GENERIC_ANSWER.to_string(),
        |doc| {
            format!(
                "Based on your question about {}, here's what I can help you with: {}",
                doc.topic, doc.content
            )
        },
    )
}

fn live_data_reply(query: AnalyticsQuery, result: &QueryResult, now: DateTime<Utc>) -> ChatReply {
    let query_used = format!("Intent: {}", query.subject());
    ChatReply {
        response: format!(
            "📊 **Live Data Result:**\n\n{}\n\n*Query executed: {query_used}*",
            format_result(result)
        ),
        sources: vec![LIVE_DATA_SOURCE.to_string()],
        data_type: Some(LIVE_DATA_TYPE.to_string()),
        query_used: Some(query_used),
        timestamp: now,
    }
}
