//! 議事録からのタスク取り込み
//!
//! 入力 → 確認の二段階。確認画面では題名の編集、担当者の付け替え、
//! タスクの削除ができ、確定すると既定の列にまとめて追加される。

use crate::session::BoardSession;
use domain::{propose, DomainError, ProposedTask, TodoId, UserId};
use infrastructure::{BoardStore, TaskExtractor};
use shared::AppError;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Default)]
pub enum ImportStep {
    #[default]
    Input,
    Review(Vec<ProposedTask>),
}

#[derive(Debug, Clone, Default)]
pub struct TranscriptImport {
    transcript: String,
    step: ImportStep,
}

impl TranscriptImport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn transcript(&self) -> &str {
        &self.transcript
    }

    pub fn set_transcript(&mut self, transcript: impl Into<String>) {
        self.transcript = transcript.into();
    }

    pub fn step(&self) -> &ImportStep {
        &self.step
    }

    /// 確認中のタスク
    pub fn proposals(&self) -> &[ProposedTask] {
        match &self.step {
            ImportStep::Review(tasks) => tasks,
            ImportStep::Input => &[],
        }
    }

    /// 抽出して確認画面へ進む
    ///
    /// 空の議事録は問い合わせ前に弾く。失敗した場合や一件も見つからなかった場合は
    /// 入力画面のまま。
    pub async fn extract<S: BoardStore + 'static>(
        &mut self,
        extractor: &dyn TaskExtractor,
        session: &BoardSession<S>,
    ) -> Result<&[ProposedTask], AppError> {
        if self.transcript.trim().is_empty() {
            return Err(DomainError::EmptyTranscript.into());
        }

        let roster = session.roster();
        let tasks = extractor.extract(&self.transcript, roster).await.map_err(|e| {
            warn!(error = %e, "タスクの抽出に失敗しました");
            e
        })?;
        if tasks.is_empty() {
            return Err(DomainError::NoTasksExtracted.into());
        }

        info!("抽出結果を確認画面へ: {} 件", tasks.len());
        self.step = ImportStep::Review(propose(tasks, roster));
        Ok(self.proposals())
    }

    fn proposal_mut(&mut self, index: usize) -> Result<&mut ProposedTask, AppError> {
        match &mut self.step {
            ImportStep::Review(tasks) => tasks
                .get_mut(index)
                .ok_or_else(|| AppError::NotFound(format!("proposed task {index}"))),
            ImportStep::Input => Err(AppError::Validation(
                "No extracted tasks to review".to_string(),
            )),
        }
    }

    pub fn edit_title(&mut self, index: usize, title: &str) -> Result<(), AppError> {
        self.proposal_mut(index)?.title = title.to_string();
        Ok(())
    }

    /// 担当者を付け替える（`None` で担当者なし）
    pub fn reassign(&mut self, index: usize, assignee: Option<UserId>) -> Result<(), AppError> {
        self.proposal_mut(index)?.assignee = assignee;
        Ok(())
    }

    pub fn remove(&mut self, index: usize) -> Result<ProposedTask, AppError> {
        match &mut self.step {
            ImportStep::Review(tasks) if index < tasks.len() => Ok(tasks.remove(index)),
            ImportStep::Review(_) => Err(AppError::NotFound(format!("proposed task {index}"))),
            ImportStep::Input => Err(AppError::Validation(
                "No extracted tasks to review".to_string(),
            )),
        }
    }

    /// 入力画面に戻る（議事録は残す）
    pub fn back(&mut self) {
        self.step = ImportStep::Input;
    }

    /// 確認済みのタスクをボードに追加し、入力画面に戻る
    pub async fn commit<S: BoardStore + 'static>(
        &mut self,
        session: &mut BoardSession<S>,
    ) -> Result<Vec<TodoId>, AppError> {
        let ids = session.import_tasks(self.proposals()).await?;
        self.transcript.clear();
        self.step = ImportStep::Input;
        Ok(ids)
    }
}
