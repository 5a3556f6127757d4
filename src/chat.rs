//! "Sagarika" travel chat, proxied to a generative-language API.

use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::config::ChatConfig;
use crate::error::ChatError;

pub const EMPTY_REPLY: &str = "I'm sorry, I couldn't find an answer. Please try rephrasing.";
pub const SERVICE_ERROR_REPLY: &str = "Sorry, there was an issue with the AI service.";

const PERSONA: &str = r#"You are "Sagarika", a friendly and helpful AI travel companion for the "Islands of Bharath" website. Your expertise is the islands of India. Your personality is warm and welcoming.

Follow these rules:
1.  **Greeting:** For greetings like "hi" or "hello", respond warmly and start with "Namaste!". Example: "Namaste! I'm Sagarika. How can I help you plan a trip to our beautiful islands today?"
2.  **Welcome Message:** At the start of the chat, greet the user with "Namaste!" and introduce yourself as Sagarika.
3.  **List Islands:** If asked for a list of islands, provide all known islands for that state/region as a numbered list. Do NOT include any greeting or "Namaste!" in the list answer. Example: "The islands of Kerala are:
1. Willingdon Island
2. Vypin Island ..."
4.  **No Islands:** If a state has no islands, respond with: "There are no islands in that particular state."
5.  **Stay on Topic:** If the question is NOT about Indian islands, politely decline. Example: "My expertise is focused on the islands of India. How can I help you with that?"
6.  **Be Concise:** For all other questions, provide a helpful and concise answer, limited to 3 sentences, and do NOT use "Namaste!" unless it is a greeting."#;

/// Wrap a visitor's message in the persona instructions.
pub fn persona_prompt(user_prompt: &str) -> String {
    format!("{}\n\nUser: {}\nSagarika:", PERSONA, user_prompt)
}

#[derive(Debug, Serialize, Deserialize)]
struct GenerateRequest {
    contents: Vec<Content>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

pub struct ChatClient {
    client: Client,
    endpoint: String,
    api_key: Option<String>,
}

impl ChatClient {
    pub fn new(config: &ChatConfig, api_key: Option<String>) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            api_key,
        })
    }

    /// Raw completion text for `user_prompt`, trimmed. May be empty.
    pub async fn generate(&self, user_prompt: &str) -> Result<String, ChatError> {
        let api_key = self.api_key.as_deref().ok_or(ChatError::MissingApiKey)?;

        let request = GenerateRequest {
            contents: vec![Content {
                parts: vec![Part {
                    text: persona_prompt(user_prompt),
                }],
            }],
        };

        let response = self
            .client
            .post(&self.endpoint)
            .query(&[("key", api_key)])
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ChatError::Status(status));
        }

        let body: GenerateResponse = response.json().await?;
        debug!("Chat API returned {} candidates", body.candidates.len());

        let text = body
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .and_then(|c| c.parts.into_iter().next())
            .map(|p| p.text.trim().to_string())
            .unwrap_or_default();

        Ok(text)
    }

    /// What the visitor sees: the completion, or a polite fallback.
    pub async fn reply(&self, user_prompt: &str) -> String {
        match self.generate(user_prompt).await {
            Ok(text) if text.is_empty() => EMPTY_REPLY.to_string(),
            Ok(text) => text,
            Err(e) => {
                error!("Chat API error: {}", e);
                SERVICE_ERROR_REPLY.to_string()
            }
        }
    }
}
