use std::time::Duration;

use async_trait::async_trait;

use crate::errors::{GuiActError, GuiActResult};
use crate::llm::provider::VisionModel;
use crate::llm::types::{ChatMessage, ProviderConfig};

pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

const CHAT_COMPLETIONS_PATH: &str = "/chat/completions";
/// Longest slice of a failed response body carried into the error.
const ERROR_BODY_CHARS: usize = 500;

pub struct OpenAiCompatibleProvider {
    id: String,
    endpoint: String,
    api_key: String,
    cfg: ProviderConfig,
    client: reqwest::Client,
}

impl OpenAiCompatibleProvider {
    pub fn new(api_key: String, model: Option<String>, base_url: Option<String>) -> GuiActResult<Self> {
        if api_key.trim().is_empty() {
            return Err(GuiActError::Config(
                "GUI_VISION_API_KEY is required. Run `gui-act setup` or set the env variable.".into(),
            ));
        }
        let cfg = ProviderConfig {
            api_base: base_url
                .filter(|b| !b.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            model: model
                .filter(|m| !m.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            temperature: 0.0,
        };
        let client = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            id: "openai-compatible".into(),
            endpoint: chat_endpoint(&cfg.api_base),
            api_key,
            cfg,
            client,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn model(&self) -> &str {
        &self.cfg.model
    }
}

#[async_trait]
impl VisionModel for OpenAiCompatibleProvider {
    fn name(&self) -> &str {
        &self.id
    }

    async fn complete(&self, messages: Vec<ChatMessage>) -> GuiActResult<String> {
        let body = serde_json::json!({
            "model": self.cfg.model,
            "messages": &messages,
            "temperature": self.cfg.temperature,
        });

        tracing::debug!(
            provider = %self.id,
            model = %self.cfg.model,
            endpoint = %self.endpoint,
            "sending vision request"
        );
        tracing::debug!(
            body = %sanitized_for_log(&body),
            "request body (sanitized, base64 omitted)"
        );

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if status.as_u16() >= 400 {
            let err_body = response.text().await.unwrap_or_default();
            return Err(GuiActError::LlmProvider(format!(
                "Model request failed ({}): {}",
                status.as_u16(),
                truncate_chars(&err_body, ERROR_BODY_CHARS)
            )));
        }

        let json: serde_json::Value = response.json().await?;
        let content = extract_content(&json)?;
        tracing::info!(content_len = content.len(), "vision response received");
        Ok(content)
    }
}

/// Appends `/chat/completions` unless the base already ends with it.
pub fn chat_endpoint(base_url: &str) -> String {
    let base = base_url.trim_end_matches('/');
    if base.ends_with(CHAT_COMPLETIONS_PATH) {
        base.to_string()
    } else {
        format!("{base}{CHAT_COMPLETIONS_PATH}")
    }
}

/// Pulls the first choice's message text out of a chat-completion response.
/// Content given as a parts array is flattened by joining its text parts.
pub fn extract_content(json: &serde_json::Value) -> GuiActResult<String> {
    let choices = json["choices"].as_array().filter(|c| !c.is_empty()).ok_or_else(|| {
        GuiActError::LlmProvider(format!(
            "Model response missing choices: {}",
            truncate_chars(&json.to_string(), ERROR_BODY_CHARS)
        ))
    })?;

    let content = match &choices[0]["message"]["content"] {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Array(parts) => parts
            .iter()
            .filter_map(|p| p["text"].as_str())
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join("\n"),
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    };

    if content.is_empty() {
        return Err(GuiActError::LlmProvider(format!(
            "Model response missing message content: {}",
            truncate_chars(&json.to_string(), ERROR_BODY_CHARS)
        )));
    }
    Ok(content)
}

/// Clone of the request body with image payloads replaced, so the real
/// request still carries them.
fn sanitized_for_log(body: &serde_json::Value) -> String {
    let mut log_body = body.clone();
    if let Some(msgs) = log_body.get_mut("messages").and_then(|m| m.as_array_mut()) {
        for msg in msgs {
            // content can be string or array of parts; we only touch the array case.
            let Some(parts) = msg.get_mut("content").and_then(|c| c.as_array_mut()) else {
                continue;
            };
            for part in parts {
                if part.get("type").and_then(|t| t.as_str()) == Some("image_url") {
                    if let Some(url) = part.get_mut("image_url").and_then(|u| u.get_mut("url")) {
                        *url = serde_json::Value::String("<omitted_base64_image>".to_string());
                    }
                }
            }
        }
    }
    serde_json::to_string(&log_body).unwrap_or_default()
}

fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((end, _)) => &text[..end],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::prompt::build_conversation;
    use serde_json::json;

    #[test]
    fn endpoint_suffix_is_added_once() {
        assert_eq!(chat_endpoint("https://api.openai.com/v1"), "https://api.openai.com/v1/chat/completions");
        assert_eq!(chat_endpoint("https://host/v1/"), "https://host/v1/chat/completions");
        assert_eq!(
            chat_endpoint("https://host/v1/chat/completions/"),
            "https://host/v1/chat/completions"
        );
    }

    #[test]
    fn extracts_plain_and_part_content() {
        let plain = json!({"choices": [{"message": {"content": "<action>wait()</action>"}}]});
        assert_eq!(extract_content(&plain).unwrap(), "<action>wait()</action>");

        let parts = json!({"choices": [{"message": {"content": [
            {"type": "text", "text": "first"},
            {"type": "image_url", "image_url": {"url": "x"}},
            {"type": "text", "text": "second"}
        ]}}]});
        assert_eq!(extract_content(&parts).unwrap(), "first\nsecond");
    }

    #[test]
    fn missing_choices_or_content_is_an_error() {
        let err = extract_content(&json!({"choices": []})).unwrap_err();
        assert!(err.to_string().contains("missing choices"));

        let err = extract_content(&json!({"choices": [{"message": {"content": null}}]})).unwrap_err();
        assert!(err.to_string().contains("missing message content"));
    }

    #[test]
    fn log_body_omits_images() {
        let messages = build_conversation("go", "SECRETBASE64", "jpeg");
        let body = json!({"model": "m", "messages": messages});
        let logged = sanitized_for_log(&body);
        assert!(!logged.contains("SECRETBASE64"));
        assert!(logged.contains("<omitted_base64_image>"));
    }

    #[test]
    fn empty_api_key_is_a_config_error() {
        let err = OpenAiCompatibleProvider::new("  ".into(), None, None).err().unwrap();
        assert!(matches!(err, GuiActError::Config(_)));
    }

    #[test]
    fn defaults_fill_missing_model_and_base() {
        let provider = OpenAiCompatibleProvider::new("sk-test".into(), None, Some(String::new())).unwrap();
        assert_eq!(provider.model(), DEFAULT_MODEL);
        assert_eq!(provider.endpoint(), "https://api.openai.com/v1/chat/completions");
    }

    #[test]
    fn truncation_is_char_safe() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("hi", 500), "hi");
    }
}
