//! 抽出サービス（ホスト型の言語モデル）への HTTP クライアント
//!
//! Anthropic 形式と OpenAI 互換形式の両方に対応する。URL で判別する。

use reqwest::Client;
use serde::{Deserialize, Serialize};
use shared::{AppError, Config};
use tracing::{debug, error};

/// API 形式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiFormat {
    Anthropic,
    OpenAI,
}

pub struct LlmClient {
    client: Client,
    api_key: String,
    api_url: String,
    model: String,
    max_tokens: u32,
    api_format: ApiFormat,
}

impl LlmClient {
    pub fn new(api_key: String, api_url: String, model: String, max_tokens: u32) -> Self {
        let api_format = Self::detect_api_format(&api_url);
        Self {
            client: Client::new(),
            api_key,
            api_url,
            model,
            max_tokens,
            api_format,
        }
    }

    /// 設定から作成（APIキー未設定なら設定エラー）
    pub fn from_config(config: &Config) -> Result<Self, AppError> {
        let api_key = config.require_llm_api_key()?.to_string();
        Ok(Self::new(
            api_key,
            config.llm_api_url.clone(),
            config.llm_model.clone(),
            config.llm_max_tokens,
        ))
    }

    fn detect_api_format(url: &str) -> ApiFormat {
        if url.contains("anthropic.com") {
            ApiFormat::Anthropic
        } else {
            ApiFormat::OpenAI
        }
    }

    pub fn api_format(&self) -> ApiFormat {
        self.api_format
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// 1回の問い合わせを送り、応答テキストを返す
    ///
    /// 応答に本文がない場合は空配列 `[]` として扱う。
    pub async fn complete(&self, system: &str, user: &str) -> Result<String, AppError> {
        debug!(model = %self.model, format = ?self.api_format, "抽出サービスに問い合わせ中");
        match self.api_format {
            ApiFormat::Anthropic => self.complete_anthropic(system, user).await,
            ApiFormat::OpenAI => self.complete_openai(system, user).await,
        }
    }

    async fn complete_anthropic(&self, system: &str, user: &str) -> Result<String, AppError> {
        let request = AnthropicRequest {
            model: self.model.clone(),
            max_tokens: self.max_tokens,
            system: system.into(),
            messages: vec![Message {
                role: "user".into(),
                content: user.into(),
            }],
        };

        let response = self
            .client
            .post(&self.api_url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .header("content-type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| AppError::Network(e.to_string()))?;

        let completion: AnthropicResponse = Self::read_json(response).await?;

        Ok(completion
            .content
            .into_iter()
            .next()
            .map(|c| c.text)
            .unwrap_or_else(|| "[]".to_string()))
    }

    async fn complete_openai(&self, system: &str, user: &str) -> Result<String, AppError> {
        let request = OpenAIRequest {
            model: self.model.clone(),
            max_tokens: self.max_tokens,
            messages: vec![
                Message {
                    role: "system".into(),
                    content: system.into(),
                },
                Message {
                    role: "user".into(),
                    content: user.into(),
                },
            ],
        };

        let response = self
            .client
            .post(&self.api_url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("content-type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| AppError::Network(e.to_string()))?;

        let completion: OpenAIResponse = Self::read_json(response).await?;

        Ok(completion
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_else(|| "[]".to_string()))
    }

    async fn read_json<T: for<'de> Deserialize<'de>>(
        response: reqwest::Response,
    ) -> Result<T, AppError> {
        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            error!(status = %status, "抽出サービスがエラーを返しました: {}", error_text);
            return Err(AppError::ExternalService(format!(
                "API error ({status}): {error_text}"
            )));
        }

        response
            .json()
            .await
            .map_err(|e| AppError::MalformedResponse(e.to_string()))
    }
}

// Anthropic API format
#[derive(Serialize)]
struct AnthropicRequest {
    model: String,
    max_tokens: u32,
    system: String,
    messages: Vec<Message>,
}

#[derive(Deserialize)]
struct AnthropicResponse {
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
struct ContentBlock {
    text: String,
}

// OpenAI-compatible API format
#[derive(Serialize)]
struct OpenAIRequest {
    model: String,
    max_tokens: u32,
    messages: Vec<Message>,
}

#[derive(Deserialize)]
struct OpenAIResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Serialize)]
struct Message {
    role: String,
    content: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation() {
        let client = LlmClient::new(
            "test-key".into(),
            "https://api.example.com/v1/chat/completions".into(),
            "test-model".into(),
            2000,
        );
        assert_eq!(client.api_key, "test-key");
        assert_eq!(client.model(), "test-model");
        assert_eq!(client.api_format(), ApiFormat::OpenAI);
    }

    #[test]
    fn test_detects_anthropic_format() {
        let client = LlmClient::new(
            "k".into(),
            "https://api.anthropic.com/v1/messages".into(),
            "m".into(),
            100,
        );
        assert_eq!(client.api_format(), ApiFormat::Anthropic);
    }

    #[test]
    fn test_openai_response_without_content() {
        let parsed: OpenAIResponse =
            serde_json::from_str(r#"{"choices":[{"message":{"content":null}}]}"#).unwrap();
        assert!(parsed.choices[0].message.content.is_none());
    }
}
