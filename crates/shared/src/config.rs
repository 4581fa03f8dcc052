use crate::errors::AppError;
use std::env;

const DEFAULT_LLM_API_URL: &str = "https://api.openai.com/v1/chat/completions";
const DEFAULT_LLM_MODEL: &str = "gpt-4o-mini";
const DEFAULT_LLM_MAX_TOKENS: u32 = 2000;

#[derive(Debug, Clone)]
pub struct Config {
    pub dynamodb_table: String,
    pub environment: String,
    pub aws_region: String,
    /// DynamoDB Local などのエンドポイント上書き
    pub dynamodb_endpoint: Option<String>,
    pub llm_api_key: Option<String>,
    pub llm_api_url: String,
    pub llm_model: String,
    pub llm_max_tokens: u32,
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        Ok(Config {
            dynamodb_table: env::var("DYNAMODB_TABLE")
                .unwrap_or_else(|_| "task-board-dev".to_string()),
            environment: env::var("ENVIRONMENT").unwrap_or_else(|_| "dev".to_string()),
            aws_region: env::var("AWS_REGION").unwrap_or_else(|_| "ap-northeast-1".to_string()),
            dynamodb_endpoint: non_empty_var("DYNAMODB_ENDPOINT"),
            llm_api_key: non_empty_var("LLM_API_KEY"),
            llm_api_url: env::var("LLM_API_URL")
                .unwrap_or_else(|_| DEFAULT_LLM_API_URL.to_string()),
            llm_model: env::var("LLM_MODEL").unwrap_or_else(|_| DEFAULT_LLM_MODEL.to_string()),
            llm_max_tokens: parse_max_tokens(env::var("LLM_MAX_TOKENS").ok().as_deref())?,
        })
    }

    /// 抽出サービスのAPIキー（未設定ならエラー）
    pub fn require_llm_api_key(&self) -> Result<&str, AppError> {
        self.llm_api_key
            .as_deref()
            .ok_or_else(|| AppError::Configuration("LLM_API_KEY is not configured".to_string()))
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|value| !value.trim().is_empty())
}

fn parse_max_tokens(value: Option<&str>) -> Result<u32, AppError> {
    match value {
        None => Ok(DEFAULT_LLM_MAX_TOKENS),
        Some(raw) => raw.trim().parse().map_err(|_| {
            AppError::Configuration(format!("LLM_MAX_TOKENS must be a positive integer: {raw}"))
        }),
    }
}
