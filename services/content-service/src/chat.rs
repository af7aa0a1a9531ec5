use axum::http::StatusCode;
use serde_json::{json, Value};

use crate::models::{ChatMessage, ChatRole};
use crate::service::ServiceError;

const CHAT_COMPLETIONS_PATH: &str = "/compatible-mode/v1/chat/completions";

#[derive(Clone)]
pub struct ChatConfig {
    pub endpoint: String,
    pub api_key: String,
    pub model: String,
}

/// Bearer-authenticated client for the OpenAI-compatible chat endpoint.
#[derive(Clone)]
pub struct ChatClient {
    http: reqwest::Client,
    config: ChatConfig,
}

impl ChatClient {
    pub fn new(http: reqwest::Client, config: ChatConfig) -> Self {
        Self { http, config }
    }

    pub async fn complete(
        &self,
        system: &str,
        messages: &[ChatMessage],
    ) -> Result<String, ServiceError> {
        if self.config.api_key.is_empty() {
            return Err(ServiceError::new(
                StatusCode::SERVICE_UNAVAILABLE,
                "chat_unconfigured",
                "chat API key not configured".to_string(),
            ));
        }
        let mut api_messages = vec![json!({"role": "system", "content": system})];
        for message in messages {
            api_messages.push(json!({
                "role": message.role,
                "content": message.content.trim(),
            }));
        }
        let payload = json!({
            "model": self.config.model,
            "messages": api_messages,
            "temperature": 0.7,
            "top_p": 0.8,
        });

        let url = format!("{}{}", self.config.endpoint, CHAT_COMPLETIONS_PATH);
        let response = self
            .http
            .post(url)
            .bearer_auth(&self.config.api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|err| chat_error(format!("chat request failed: {err}")))?;
        let status = response.status();
        if status != StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            let detail: String = body.chars().take(300).collect();
            return Err(chat_error(format!(
                "chat API error: {} - {detail}",
                status.as_u16()
            )));
        }
        let data: Value = response
            .json()
            .await
            .map_err(|err| chat_error(format!("chat decode failed: {err}")))?;
        let content = data
            .pointer("/choices/0/message/content")
            .and_then(Value::as_str)
            .unwrap_or("")
            .trim()
            .to_string();
        Ok(content)
    }
}

/// Roleplay system prompt assembled from the role's name, persona, and an
/// optional greeting sample.
pub fn build_system_prompt(role: &ChatRole) -> String {
    let name = role.name.as_deref().unwrap_or("the character");
    let persona = role.persona.as_deref().unwrap_or("").trim();
    let greeting = role.greeting.as_deref().unwrap_or("").trim();

    let mut parts = vec![
        format!("Stay strictly in character as \"{name}\", defined by this persona:"),
        persona.to_string(),
    ];
    if !greeting.is_empty() {
        let sample: String = greeting.chars().take(200).collect();
        parts.push(format!("Opening line example: {sample}"));
    }
    parts.push(
        "Reply rules: speak only as casual first-person dialogue; no narration, stage \
         directions, or bracketed/asterisked action text; keep every reply short, one to \
         three sentences."
            .to_string(),
    );
    parts
        .into_iter()
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn chat_error(message: String) -> ServiceError {
    ServiceError::new(StatusCode::BAD_GATEWAY, "chat_error", message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    #[test]
    fn system_prompt_includes_persona_and_greeting() {
        let role = ChatRole {
            name: Some("Antoine".to_string()),
            persona: Some("A quiet pianist from Lyon.".to_string()),
            greeting: Some("Evening. You found my corner of the bar.".to_string()),
        };
        let prompt = build_system_prompt(&role);
        assert!(prompt.contains("\"Antoine\""));
        assert!(prompt.contains("quiet pianist"));
        assert!(prompt.contains("Opening line example"));
    }

    #[test]
    fn system_prompt_skips_empty_greeting() {
        let role = ChatRole {
            name: Some("Edward".to_string()),
            persona: Some("Retired sea captain.".to_string()),
            greeting: None,
        };
        let prompt = build_system_prompt(&role);
        assert!(!prompt.contains("Opening line example"));
    }

    #[tokio::test]
    async fn complete_extracts_choice_content() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST)
                    .path(CHAT_COMPLETIONS_PATH)
                    .header("authorization", "Bearer key");
                then.status(200).json_body(serde_json::json!({
                    "choices": [{"message": {"content": "  hello there  "}}]
                }));
            })
            .await;

        let client = ChatClient::new(
            reqwest::Client::new(),
            ChatConfig {
                endpoint: server.base_url(),
                api_key: "key".to_string(),
                model: "test-model".to_string(),
            },
        );
        let content = client
            .complete(
                "system",
                &[ChatMessage {
                    role: "user".to_string(),
                    content: "hi".to_string(),
                }],
            )
            .await
            .unwrap();
        assert_eq!(content, "hello there");
    }

    #[tokio::test]
    async fn complete_maps_upstream_error_to_bad_gateway() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path(CHAT_COMPLETIONS_PATH);
                then.status(429).body("rate limited");
            })
            .await;

        let client = ChatClient::new(
            reqwest::Client::new(),
            ChatConfig {
                endpoint: server.base_url(),
                api_key: "key".to_string(),
                model: "test-model".to_string(),
            },
        );
        let err = client.complete("system", &[]).await.unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_GATEWAY);
        assert!(err.body.message.contains("429"));
    }

    #[tokio::test]
    async fn missing_key_is_service_unavailable() {
        let client = ChatClient::new(
            reqwest::Client::new(),
            ChatConfig {
                endpoint: "http://localhost:1".to_string(),
                api_key: String::new(),
                model: "test-model".to_string(),
            },
        );
        let err = client.complete("system", &[]).await.unwrap_err();
        assert_eq!(err.status, StatusCode::SERVICE_UNAVAILABLE);
    }
}
