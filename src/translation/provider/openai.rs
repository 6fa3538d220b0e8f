use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};

use super::{ProviderRequest, TranslationProvider};
use crate::translation::config::TranslationConfig;
use crate::translation::error::{TranslationError, TranslationResult};

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<Message<'a>>,
    temperature: f32,
    response_format: ResponseFormat,
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// 取出第一条候选的文本内容
pub fn parse_chat_content(body: &str) -> TranslationResult<String> {
    let response: ChatResponse = serde_json::from_str(body)
        .map_err(|e| TranslationError::ProviderResponse(format!("响应不是有效的对话结果: {}", e)))?;

    response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .filter(|content| !content.trim().is_empty())
        .ok_or_else(|| TranslationError::ProviderResponse("响应中没有内容".to_string()))
}

/// OpenAI 兼容的 chat completions 服务
pub struct OpenAiCompatibleProvider {
    client: Client,
    endpoint: String,
    api_key: String,
}

impl OpenAiCompatibleProvider {
    pub fn new(api_url: &str, api_key: &str) -> TranslationResult<Self> {
        let client = Client::builder()
            .user_agent(concat!("page-translate/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| TranslationError::Config(format!("无法创建HTTP客户端: {}", e)))?;

        Ok(Self {
            client,
            endpoint: format!("{}/chat/completions", api_url.trim_end_matches('/')),
            api_key: api_key.to_string(),
        })
    }

    pub fn from_config(config: &TranslationConfig) -> TranslationResult<Self> {
        if config.api_key.is_empty() {
            tracing::warn!("未配置 API 密钥，翻译请求很可能被拒绝");
        }
        Self::new(&config.api_url, &config.api_key)
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl TranslationProvider for OpenAiCompatibleProvider {
    fn complete(&self, request: &ProviderRequest) -> TranslationResult<String> {
        let body = ChatRequest {
            model: &request.model,
            messages: vec![
                Message {
                    role: "system",
                    content: &request.instruction,
                },
                Message {
                    role: "user",
                    content: &request.payload,
                },
            ],
            temperature: 0.0,
            response_format: ResponseFormat {
                kind: "json_object",
            },
        };

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .timeout(request.timeout)
            .json(&body)
            .send()?;

        let status = response.status();
        let text = response.text()?;

        if !status.is_success() {
            let snippet: String = text.chars().take(200).collect();
            return Err(TranslationError::ProviderResponse(format!(
                "HTTP {}: {}",
                status, snippet
            )));
        }

        parse_chat_content(&text)
    }

    fn name(&self) -> &str {
        "openai-compatible"
    }
}
