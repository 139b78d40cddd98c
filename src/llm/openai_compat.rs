use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};

use super::provider::LlmProvider;
use super::types::ChatRequest;
use crate::core::config::LlmSettings;
use crate::core::errors::ApiError;

/// Chat provider for any OpenAI-compatible `/chat/completions` endpoint.
///
/// The default base URL is Gemini's OpenAI-compatible surface.
#[derive(Clone)]
pub struct OpenAiCompatProvider {
    base_url: String,
    model: String,
    api_key: Option<String>,
    client: Client,
}

impl OpenAiCompatProvider {
    pub fn new(settings: &LlmSettings) -> Result<Self, ApiError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(30))
            .timeout(Duration::from_secs(120))
            .build()
            .map_err(ApiError::internal)?;
        Ok(Self {
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            model: settings.model.clone(),
            api_key: settings.api_key.clone(),
            client,
        })
    }

    fn request(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.api_key.as_deref() {
            Some(key) => builder.bearer_auth(key),
            None => builder,
        }
    }

    fn chat_body(&self, request: ChatRequest) -> Value {
        let mut body = json!({
            "model": self.model,
            "messages": request.messages,
            "stream": false,
        });

        if let Some(obj) = body.as_object_mut() {
            if let Some(t) = request.temperature {
                obj.insert("temperature".to_string(), json!(t));
            }
            if let Some(t) = request.max_tokens {
                obj.insert("max_tokens".to_string(), json!(t));
            }
        }
        body
    }
}

#[async_trait]
impl LlmProvider for OpenAiCompatProvider {
    fn name(&self) -> &str {
        "openai_compat"
    }

    async fn health_check(&self) -> Result<bool, ApiError> {
        let url = format!("{}/models", self.base_url);
        match self.request(self.client.get(&url)).send().await {
            Ok(resp) => Ok(resp.status().is_success()),
            Err(_) => Ok(false),
        }
    }

    async fn chat(&self, request: ChatRequest) -> Result<String, ApiError> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = self.chat_body(request);

        let res = self
            .request(self.client.post(&url))
            .json(&body)
            .send()
            .await
            .map_err(ApiError::upstream)?;

        if !res.status().is_success() {
            let status = res.status();
            let text = res.text().await.unwrap_or_default();
            return Err(ApiError::Upstream(format!(
                "LLM chat error ({}): {}",
                status,
                text.trim()
            )));
        }

        let payload: Value = res.json().await.map_err(ApiError::upstream)?;
        Ok(extract_content(&payload))
    }
}

fn extract_content(payload: &Value) -> String {
    payload["choices"][0]["message"]["content"]
        .as_str()
        .unwrap_or_default()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ChatMessage;

    fn provider() -> OpenAiCompatProvider {
        let settings = LlmSettings {
            base_url: "http://localhost:9999/v1/".to_string(),
            model: "test-model".to_string(),
            api_key: None,
            temperature: None,
        };
        OpenAiCompatProvider::new(&settings).expect("provider builds")
    }

    #[test]
    fn body_includes_optional_sampling_fields() {
        let request = ChatRequest::new(vec![ChatMessage::user("hola")]).with_temperature(Some(0.2));
        let body = provider().chat_body(request);
        assert_eq!(body["model"], "test-model");
        assert_eq!(body["messages"][0]["role"], "user");
        assert_eq!(body["temperature"], 0.2);
        assert!(body.get("max_tokens").is_none());
    }

    #[test]
    fn trailing_slash_is_trimmed() {
        assert_eq!(provider().base_url, "http://localhost:9999/v1");
    }

    #[test]
    fn content_defaults_to_empty() {
        let payload = json!({"choices": [{"message": {"content": "hi"}}]});
        assert_eq!(extract_content(&payload), "hi");
        assert_eq!(extract_content(&json!({})), "");
    }

    #[tokio::test]
    #[ignore]
    async fn live_gemini_chat() {
        let settings = LlmSettings {
            api_key: std::env::var("GEMINI_API_KEY").ok(),
            ..LlmSettings::default()
        };
        let provider = OpenAiCompatProvider::new(&settings).expect("provider builds");
        let reply = provider
            .chat(ChatRequest::new(vec![ChatMessage::user("Say hello")]))
            .await;
        match reply {
            Ok(text) => println!("Gemini replied: {}", text),
            Err(e) => println!("Gemini chat failed: {}", e),
        }
    }
}
