//! Minimal Ollama client for grounded answer generation.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::instrument;

use super::ChatbotError;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Ollama `/api/generate` client.
#[derive(Clone)]
pub struct OllamaClient {
    inner: Arc<OllamaClientInner>,
}

struct OllamaClientInner {
    client: reqwest::Client,
    base_url: String,
    model: String,
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
}

impl OllamaClient {
    /// Create a client for the given base URL and model.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(base_url: &str, model: &str) -> Result<Self, ChatbotError> {
        let client = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            inner: Arc::new(OllamaClientInner {
                client,
                base_url: base_url.trim_end_matches('/').to_string(),
                model: model.to_string(),
            }),
        })
    }

    #[must_use]
    pub fn model(&self) -> &str {
        &self.inner.model
    }

    /// Generate a completion for a prompt.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure, a non-success status or an
    /// unexpected body.
    #[instrument(skip(self, prompt), fields(model = %self.inner.model))]
    pub async fn generate(&self, prompt: &str) -> Result<String, ChatbotError> {
        let response = self
            .inner
            .client
            .post(format!("{}/api/generate", self.inner.base_url))
            .json(&GenerateRequest {
                model: &self.inner.model,
                prompt,
                stream: false,
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ChatbotError::Ollama {
                status: status.as_u16(),
                message: body,
            });
        }

        let body: GenerateResponse = response.json().await?;
        Ok(body.response)
    }
}

/// Prompt asking the model to answer only from the given context.
#[must_use]
pub fn build_prompt(question: &str, context: &[&str]) -> String {
    format!(
        "You are Shonifity's shopping assistant. Answer the customer's question using only \
         the store information below.\n\n\
         STORE INFORMATION:\n{}\n\n\
         CUSTOMER QUESTION: {question}\n\n\
         Guidelines:\n\
         - Stay within the store information; if it does not cover the question, offer to \
         connect the customer with our support team.\n\
         - Quote concrete details such as prices and delivery times.\n\
         - Keep the answer friendly and short, and end with a follow-up question when useful.\n\n\
         Answer:",
        context.join("\n\n")
    )
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_embeds_context_and_question() {
        let prompt = build_prompt("Do you ship abroad?", &["Shipping A.", "Returns B."]);
        assert!(prompt.contains("Shipping A.\n\nReturns B."));
        assert!(prompt.contains("CUSTOMER QUESTION: Do you ship abroad?"));
    }

    #[tokio::test]
    async fn test_unreachable_server_is_an_error() {
        let client = OllamaClient::new("http://127.0.0.1:9/", "gemma:2b").unwrap();
        assert_eq!(client.model(), "gemma:2b");
        let err = client.generate("hi").await;
        assert!(matches!(err, Err(ChatbotError::Http(_))));
    }
}
