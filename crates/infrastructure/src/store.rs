use async_trait::async_trait;
use domain::{
    Column, ColumnId, ColumnPatch, DomainError, InviteCode, MemberProfile, NewTodo, Scope, Team,
    TeamId, Todo, TodoId, TodoPatch, UserId,
};
use shared::AppError;
use std::future::Future;

/// 招待コード生成の最大試行回数
pub const MAX_INVITE_ATTEMPTS: usize = 5;

/// ボード・チーム・プロフィールの永続化ポート
///
/// チームのメンバー／管理者に関する不変条件と権限チェックはこの境界で行う。
/// どの実装も失敗時に再試行しない。
#[async_trait]
pub trait BoardStore: Send + Sync {
    /// スコープの列一覧（order昇順）。列が一つもなければ既定の三列を作成して返す
    async fn list_columns(&self, scope: &Scope) -> Result<Vec<Column>, AppError>;

    /// スコープのカード一覧（作成順）
    async fn list_todos(&self, scope: &Scope) -> Result<Vec<Todo>, AppError>;

    async fn create_column(
        &self,
        scope: &Scope,
        name: &str,
        order: i64,
    ) -> Result<ColumnId, AppError>;

    async fn update_column(&self, id: &ColumnId, patch: ColumnPatch) -> Result<(), AppError>;

    /// 列を削除する。カードは削除しない
    async fn delete_column(&self, id: &ColumnId) -> Result<(), AppError>;

    async fn create_todo(
        &self,
        scope: &Scope,
        owner: &UserId,
        draft: NewTodo,
    ) -> Result<TodoId, AppError>;

    /// 複数のカードを入力順に作成する。全件 `default_status` の列に入る
    async fn create_todo_batch(
        &self,
        scope: &Scope,
        owner: &UserId,
        drafts: Vec<NewTodo>,
        default_status: &ColumnId,
    ) -> Result<Vec<TodoId>, AppError>;

    async fn update_todo(&self, id: &TodoId, patch: TodoPatch) -> Result<(), AppError>;

    async fn delete_todo(&self, id: &TodoId) -> Result<(), AppError>;

    async fn get_team(&self, id: &TeamId) -> Result<Option<Team>, AppError>;

    async fn create_team(&self, name: &str, creator: &UserId) -> Result<Team, AppError>;

    async fn join_team(&self, code: &InviteCode, user: &UserId) -> Result<Team, AppError>;

    async fn remove_member(
        &self,
        team: &TeamId,
        requester: &UserId,
        target: &UserId,
    ) -> Result<Team, AppError>;

    async fn rename_team(
        &self,
        team: &TeamId,
        requester: &UserId,
        name: &str,
    ) -> Result<Team, AppError>;

    /// チームを削除する。カードと列は残る
    async fn delete_team(&self, team: &TeamId, requester: &UserId) -> Result<(), AppError>;

    async fn list_user_teams(&self, user: &UserId) -> Result<Vec<Team>, AppError>;

    async fn upsert_profile(&self, profile: &MemberProfile) -> Result<(), AppError>;

    async fn get_profile(&self, user: &UserId) -> Result<Option<MemberProfile>, AppError>;

    /// 指定ユーザーのプロフィールを取得（見つからないユーザーは含まない）
    async fn list_profiles(&self, users: &[UserId]) -> Result<Vec<MemberProfile>, AppError>;
}

/// 他のチームと重複しない招待コードを割り当てる
///
/// `MAX_INVITE_ATTEMPTS` 回すべて重複した場合はエラー。
pub async fn allocate_invite_code<G, F, Fut>(
    mut generate: G,
    mut is_taken: F,
) -> Result<InviteCode, AppError>
where
    G: FnMut() -> InviteCode,
    F: FnMut(InviteCode) -> Fut,
    Fut: Future<Output = Result<bool, AppError>>,
{
    for _ in 0..MAX_INVITE_ATTEMPTS {
        let code = generate();
        if !is_taken(code.clone()).await? {
            return Ok(code);
        }
        tracing::debug!("招待コードが重複したため再生成: {}", code);
    }
    Err(DomainError::InviteCodeExhausted.into())
}

/// ランダムな招待コード
pub fn random_invite_code() -> InviteCode {
    InviteCode::generate(&mut rand::thread_rng())
}

/// 一括作成するカードを組み立てる
///
/// 作成時刻を1マイクロ秒ずつずらし、読み込み時の並びを入力順に固定する。
pub fn build_todo_batch(
    scope: &Scope,
    owner: &UserId,
    drafts: Vec<NewTodo>,
    default_status: &ColumnId,
) -> Result<Vec<Todo>, AppError> {
    let base = chrono::Utc::now();
    drafts
        .into_iter()
        .enumerate()
        .map(|(index, draft)| {
            let mut todo = Todo::new(
                scope,
                owner.clone(),
                NewTodo {
                    status: Some(default_status.clone()),
                    ..draft
                },
            )?;
            todo.created_at = base + chrono::Duration::microseconds(index as i64);
            Ok(todo)
        })
        .collect()
}

/// 作成順（created_at、同時刻はID順）に並べ替え
pub fn sort_todos(todos: &mut [Todo]) {
    todos.sort_by(|a, b| {
        a.created_at
            .cmp(&b.created_at)
            .then_with(|| a.id.cmp(&b.id))
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn code(value: &str) -> InviteCode {
        InviteCode::from_string(value).unwrap()
    }

    #[tokio::test]
    async fn test_allocate_invite_code_retries_on_collision() {
        let mut candidates = vec![code("AAAAAA"), code("BBBBBB"), code("CCCCCC")].into_iter();
        let allocated = allocate_invite_code(
            || candidates.next().unwrap(),
            |candidate| async move { Ok::<_, AppError>(candidate.as_str() != "CCCCCC") },
        )
        .await
        .unwrap();
        assert_eq!(allocated.as_str(), "CCCCCC");
    }

    #[tokio::test]
    async fn test_allocate_invite_code_gives_up_after_max_attempts() {
        let mut attempts = 0;
        let result = allocate_invite_code(
            || {
                attempts += 1;
                code("AAAAAA")
            },
            |_| async { Ok::<_, AppError>(true) },
        )
        .await;
        assert_eq!(
            result,
            Err(AppError::Domain(DomainError::InviteCodeExhausted))
        );
        assert_eq!(attempts, MAX_INVITE_ATTEMPTS);
    }

    #[tokio::test]
    async fn test_allocate_invite_code_propagates_lookup_errors() {
        let result = allocate_invite_code(random_invite_code, |_| async {
            Err::<bool, _>(AppError::DynamoDb("timeout".to_string()))
        })
        .await;
        assert!(result.unwrap_err().is_transient());
    }
}
