use crate::llm::LlmClient;
use async_trait::async_trait;
use domain::{parse_extraction_response, DomainError, ExtractedTask, MemberProfile};
use shared::AppError;
use tracing::{info, warn};

/// 議事録からタスクを抽出する外部サービス
///
/// 応答は信頼せず、形の合わない応答は一件も受け付けずにエラーにする。
#[async_trait]
pub trait TaskExtractor: Send + Sync {
    async fn extract(
        &self,
        transcript: &str,
        roster: &[MemberProfile],
    ) -> Result<Vec<ExtractedTask>, AppError>;
}

/// 名簿を `- 名前 (メール)` の行で並べたシステムプロンプト
pub fn build_system_prompt(roster: &[MemberProfile]) -> String {
    let member_list = if roster.is_empty() {
        "No team members provided".to_string()
    } else {
        roster
            .iter()
            .map(|m| format!("- {} ({})", m.display_name, m.email))
            .collect::<Vec<_>>()
            .join("\n")
    };

    format!(
        r#"You are an expert at extracting action items and tasks from meeting transcripts.

Your job is to:
1. Identify all action items, tasks, and to-dos mentioned in the transcript
2. Determine who each task is assigned to (if mentioned)
3. Return structured JSON output

Rules:
- Extract only concrete, actionable tasks
- If a task mentions a person's name, include it in assigneeName (use the exact name as mentioned)
- If no assignee is clear, leave assigneeName as null
- Be concise - task titles should be 5-15 words
- Ignore general discussion that doesn't result in action items
- Write task titles in the same language as the transcript

Team members available for assignment:
{member_list}

You MUST respond with ONLY a valid JSON array, no other text. Example:
[
  {{"title": "Set up the database schema", "assigneeName": "Alex", "confidence": 0.9}},
  {{"title": "Review the authentication PR", "assigneeName": null, "confidence": 0.7}}
]"#
    )
}

pub fn build_user_prompt(transcript: &str) -> String {
    format!(
        "Extract action items from this meeting transcript:\n\n---\n{transcript}\n---\n\nReturn ONLY a valid JSON array."
    )
}

/// 言語モデルを使った抽出
pub struct LlmTaskExtractor {
    client: LlmClient,
}

impl LlmTaskExtractor {
    pub fn new(client: LlmClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl TaskExtractor for LlmTaskExtractor {
    async fn extract(
        &self,
        transcript: &str,
        roster: &[MemberProfile],
    ) -> Result<Vec<ExtractedTask>, AppError> {
        if transcript.trim().is_empty() {
            return Err(DomainError::EmptyTranscript.into());
        }

        let response = self
            .client
            .complete(&build_system_prompt(roster), &build_user_prompt(transcript))
            .await?;

        let tasks = parse_extraction_response(&response).map_err(|e| {
            warn!(error = %e, "抽出サービスの応答を解析できません: {}", response);
            e
        })?;

        info!("議事録からタスクを抽出: {} 件", tasks.len());
        Ok(tasks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::UserId;

    #[test]
    fn test_system_prompt_lists_roster() {
        let roster = vec![
            MemberProfile::new(
                UserId::from_string("u1".to_string()).unwrap(),
                "Kim Cheolsu",
                "cs@x.com",
            )
            .unwrap(),
            MemberProfile::new(
                UserId::from_string("u2".to_string()).unwrap(),
                "Cheolsu Park",
                "park@x.com",
            )
            .unwrap(),
        ];

        let prompt = build_system_prompt(&roster);
        assert!(prompt.contains("- Kim Cheolsu (cs@x.com)\n- Cheolsu Park (park@x.com)"));
        assert!(prompt.contains(r#""assigneeName": null"#));

        assert!(build_system_prompt(&[]).contains("No team members provided"));
    }

    #[test]
    fn test_user_prompt_wraps_transcript() {
        let prompt = build_user_prompt("Alex will update the roadmap.");
        assert!(prompt.contains("---\nAlex will update the roadmap.\n---"));
    }

    #[tokio::test]
    async fn test_empty_transcript_is_rejected_before_io() {
        // 到達不能なURL。問い合わせが発生すれば Network エラーになる
        let client = LlmClient::new("k".into(), "http://127.0.0.1:9/".into(), "m".into(), 10);
        let extractor = LlmTaskExtractor::new(client);

        let result = extractor.extract("   \n", &[]).await;
        assert_eq!(result, Err(AppError::Domain(DomainError::EmptyTranscript)));
    }
}
