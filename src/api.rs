use anyhow::{anyhow, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::app::MessageContent;

#[derive(Serialize)]
struct ChatRequest<'a> {
    session_id: &'a str,
    message: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    response: MessageContent,
}

/// Client for the AnalyseDiss chat service
#[derive(Clone)]
pub struct ChatClient {
    client: Client,
    base_url: String,
}

impl ChatClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Send one user message for the given session. A single request,
    /// no retries and no timeout: a failure is terminal for this submit.
    pub async fn send(&self, session_id: &str, message: &str) -> Result<MessageContent> {
        let url = format!("{}/chat", self.base_url);

        let request = ChatRequest {
            session_id,
            message,
        };

        let response = self.client.post(&url).json(&request).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!("chat request failed with status {}: {}", status, body));
        }

        let chat_response: ChatResponse = response.json().await?;
        Ok(chat_response.response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::ContentFragment;

    #[test]
    fn request_body_has_session_and_message() {
        let request = ChatRequest {
            session_id: "k3j9x2ab",
            message: "What is the total sales amount for each product category?",
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "session_id": "k3j9x2ab",
                "message": "What is the total sales amount for each product category?",
            })
        );
    }

    #[test]
    fn response_parses_plain_string_payload() {
        let payload = r#"{"response": "Furniture: $500; Electronics: $700"}"#;
        let parsed: ChatResponse = serde_json::from_str(payload).unwrap();
        assert_eq!(
            parsed.response,
            MessageContent::Text("Furniture: $500; Electronics: $700".to_string())
        );
    }

    #[test]
    fn response_parses_fragment_list_payload() {
        let payload = r#"{"response": [
            {"type": "text", "text": "Furniture: $500;"},
            {"type": "text", "text": "Electronics: $700"}
        ]}"#;
        let parsed: ChatResponse = serde_json::from_str(payload).unwrap();
        assert_eq!(
            parsed.response,
            MessageContent::Fragments(vec![
                ContentFragment {
                    kind: "text".to_string(),
                    text: "Furniture: $500;".to_string(),
                },
                ContentFragment {
                    kind: "text".to_string(),
                    text: "Electronics: $700".to_string(),
                },
            ])
        );
    }

    #[test]
    fn base_url_drops_trailing_slash() {
        let client = ChatClient::new("http://localhost:8000/");
        assert_eq!(client.base_url(), "http://localhost:8000");
    }
}
