use crate::assignee::resolve;
use crate::errors::{DomainError, DomainResult};
use crate::identifiers::UserId;
use crate::profile::MemberProfile;
use serde::{Deserialize, Serialize};

/// confidence が返されなかった場合の既定値
pub const DEFAULT_CONFIDENCE: f64 = 0.5;

/// 抽出サービスが返したタスク
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedTask {
    pub title: String,
    pub assignee_name: Option<String>,
    pub confidence: f64,
}

/// 抽出サービス応答の1要素（検証前）
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawExtractedTask {
    title: String,
    #[serde(default)]
    assignee_name: Option<String>,
    #[serde(default)]
    confidence: Option<f64>,
}

/// 応答を囲む Markdown のコードフェンスを取り除く
pub fn strip_code_fence(response: &str) -> &str {
    let mut cleaned = response.trim();
    if let Some(rest) = cleaned.strip_prefix("```json") {
        cleaned = rest;
    } else if let Some(rest) = cleaned.strip_prefix("```") {
        cleaned = rest;
    }
    if let Some(rest) = cleaned.strip_suffix("```") {
        cleaned = rest;
    }
    cleaned.trim()
}

/// 抽出サービスの応答をタスク一覧に変換する
///
/// 応答全体が `{title, assigneeName, confidence}` の配列として読めない場合は
/// 一件も受け付けずにエラーを返す。
pub fn parse_extraction_response(response: &str) -> DomainResult<Vec<ExtractedTask>> {
    let cleaned = strip_code_fence(response);
    let raw: Vec<RawExtractedTask> = serde_json::from_str(cleaned)
        .map_err(|e| DomainError::MalformedExtraction(e.to_string()))?;

    raw.into_iter()
        .enumerate()
        .map(|(index, task)| {
            let title = task.title.trim();
            if title.is_empty() {
                return Err(DomainError::MalformedExtraction(format!(
                    "task {index} has an empty title"
                )));
            }

            let confidence = task.confidence.unwrap_or(DEFAULT_CONFIDENCE);
            if !(0.0..=1.0).contains(&confidence) {
                return Err(DomainError::MalformedExtraction(format!(
                    "task {index} has confidence {confidence} outside [0, 1]"
                )));
            }

            let assignee_name = task
                .assignee_name
                .map(|name| name.trim().to_string())
                .filter(|name| !name.is_empty());

            Ok(ExtractedTask {
                title: title.to_string(),
                assignee_name,
                confidence,
            })
        })
        .collect()
}

/// 名前解決済みの提案タスク（ユーザーの確認待ち）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProposedTask {
    pub title: String,
    pub assignee_name_raw: Option<String>,
    pub assignee: Option<UserId>,
    pub confidence: f64,
}

impl ProposedTask {
    pub fn from_extracted(task: ExtractedTask, roster: &[MemberProfile]) -> Self {
        let assignee = task
            .assignee_name
            .as_deref()
            .and_then(|name| resolve(name, roster))
            .map(|member| member.user_id.clone());

        Self {
            title: task.title,
            assignee_name_raw: task.assignee_name,
            assignee,
            confidence: task.confidence,
        }
    }
}

/// 抽出結果それぞれの担当者名を名簿で解決する
pub fn propose(tasks: Vec<ExtractedTask>, roster: &[MemberProfile]) -> Vec<ProposedTask> {
    tasks
        .into_iter()
        .map(|task| ProposedTask::from_extracted(task, roster))
        .collect()
}
