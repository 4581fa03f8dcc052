use crate::errors::{DomainError, DomainResult};
use crate::identifiers::{ColumnId, Scope, TeamId, TodoId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// ToDo（カンバン上のカード）
///
/// `team` は作成時に決まり以後変更されない。`status` が存在しない列を
/// 指している場合は未割り当てと同じに扱う。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Todo {
    pub id: TodoId,
    pub title: String,
    pub completed: bool,
    pub status: Option<ColumnId>,
    pub owner: UserId,
    pub team: Option<TeamId>,
    pub assignee: Option<UserId>,
    pub created_at: DateTime<Utc>,
}

/// ToDo作成時の入力
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewTodo {
    pub title: String,
    pub status: Option<ColumnId>,
    pub assignee: Option<UserId>,
}

impl NewTodo {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            status: None,
            assignee: None,
        }
    }

    pub fn in_column(mut self, status: ColumnId) -> Self {
        self.status = Some(status);
        self
    }

    pub fn assigned_to(mut self, assignee: Option<UserId>) -> Self {
        self.assignee = assignee;
        self
    }
}

/// ToDoの部分更新
///
/// `team` と `created_at` は含まない。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TodoPatch {
    pub title: Option<String>,
    pub completed: Option<bool>,
    pub status: Option<Option<ColumnId>>,
    pub assignee: Option<Option<UserId>>,
}

impl TodoPatch {
    pub fn title(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            ..Self::default()
        }
    }

    pub fn completed(completed: bool) -> Self {
        Self {
            completed: Some(completed),
            ..Self::default()
        }
    }

    pub fn status(status: Option<ColumnId>) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    pub fn assignee(assignee: Option<UserId>) -> Self {
        Self {
            assignee: Some(assignee),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.completed.is_none()
            && self.status.is_none()
            && self.assignee.is_none()
    }
}

fn normalize_title(title: &str) -> DomainResult<String> {
    let trimmed = title.trim();
    if trimmed.is_empty() {
        return Err(DomainError::Validation(
            "Todo title cannot be empty".to_string(),
        ));
    }
    Ok(trimmed.to_string())
}

impl Todo {
    /// 新しいToDoを作成
    pub fn new(scope: &Scope, owner: UserId, draft: NewTodo) -> DomainResult<Self> {
        Ok(Self {
            id: TodoId::new(),
            title: normalize_title(&draft.title)?,
            completed: false,
            status: draft.status,
            owner,
            team: scope.team().cloned(),
            assignee: draft.assignee,
            created_at: Utc::now(),
        })
    }

    pub fn scope(&self) -> Scope {
        match &self.team {
            Some(team_id) => Scope::Team(team_id.clone()),
            None => Scope::Personal(self.owner.clone()),
        }
    }

    /// 指定スコープのボードに表示されるかチェック
    pub fn belongs_to(&self, scope: &Scope) -> bool {
        match scope {
            Scope::Personal(user_id) => self.team.is_none() && &self.owner == user_id,
            Scope::Team(team_id) => self.team.as_ref() == Some(team_id),
        }
    }

    /// 部分更新を適用
    pub fn apply(&mut self, patch: TodoPatch) -> DomainResult<()> {
        if let Some(title) = patch.title {
            self.title = normalize_title(&title)?;
        }
        if let Some(completed) = patch.completed {
            self.completed = completed;
        }
        if let Some(status) = patch.status {
            self.status = status;
        }
        if let Some(assignee) = patch.assignee {
            self.assignee = assignee;
        }
        Ok(())
    }
}
