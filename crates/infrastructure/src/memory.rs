use crate::store::{
    allocate_invite_code, build_todo_batch, random_invite_code, sort_todos, BoardStore,
};
use async_trait::async_trait;
use domain::{
    sort_columns, Column, ColumnId, ColumnPatch, DomainError, InviteCode, MemberProfile, NewTodo,
    Scope, Team, TeamId, Todo, TodoId, TodoPatch, UserId,
};
use shared::AppError;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::sync::Mutex;
use tracing::{debug, info};

#[derive(Debug, Default)]
struct MemoryState {
    columns: Vec<Column>,
    todos: Vec<Todo>,
    teams: Vec<Team>,
    profiles: HashMap<UserId, MemberProfile>,
}

/// プロセス内メモリの永続化実装
///
/// ローカル実行とテスト用。読み込み・書き込みの失敗を注入でき、書き込み回数を数える。
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
    writes: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 以後の書き込みを一時的なI/O失敗にする
    pub fn inject_write_failures(&self, enabled: bool) {
        self.fail_writes.store(enabled, Ordering::SeqCst);
    }

    /// 以後の読み込みを一時的なI/O失敗にする
    pub fn inject_read_failures(&self, enabled: bool) {
        self.fail_reads.store(enabled, Ordering::SeqCst);
    }

    /// 受け付けた書き込み呼び出しの回数（失敗分を含む）
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    fn begin_read(&self, operation: &str) -> Result<(), AppError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(AppError::ServiceUnavailable(format!(
                "injected read failure: {operation}"
            )));
        }
        Ok(())
    }

    fn begin_write(&self, operation: &str) -> Result<(), AppError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(AppError::ServiceUnavailable(format!(
                "injected failure: {operation}"
            )));
        }
        Ok(())
    }
}

fn team_mut<'a>(state: &'a mut MemoryState, id: &TeamId) -> Result<&'a mut Team, AppError> {
    state
        .teams
        .iter_mut()
        .find(|t| &t.id == id)
        .ok_or_else(|| DomainError::TeamNotFound(id.to_string()).into())
}

#[async_trait]
impl BoardStore for MemoryStore {
    async fn list_columns(&self, scope: &Scope) -> Result<Vec<Column>, AppError> {
        self.begin_read("list_columns")?;
        let mut state = self.state.lock().await;
        let mut columns: Vec<Column> = state
            .columns
            .iter()
            .filter(|c| c.belongs_to(scope))
            .cloned()
            .collect();

        if columns.is_empty() {
            info!("既定の列を作成: scope={}", scope);
            columns = Column::defaults(scope);
            state.columns.extend(columns.iter().cloned());
        }

        sort_columns(&mut columns);
        Ok(columns)
    }

    async fn list_todos(&self, scope: &Scope) -> Result<Vec<Todo>, AppError> {
        self.begin_read("list_todos")?;
        let state = self.state.lock().await;
        let mut todos: Vec<Todo> = state
            .todos
            .iter()
            .filter(|t| t.belongs_to(scope))
            .cloned()
            .collect();
        sort_todos(&mut todos);
        Ok(todos)
    }

    async fn create_column(
        &self,
        scope: &Scope,
        name: &str,
        order: i64,
    ) -> Result<ColumnId, AppError> {
        self.begin_write("create_column")?;
        let column = Column::new(scope, name, order)?;
        let id = column.id.clone();
        self.state.lock().await.columns.push(column);
        debug!("列を作成: id={}", id);
        Ok(id)
    }

    async fn update_column(&self, id: &ColumnId, patch: ColumnPatch) -> Result<(), AppError> {
        self.begin_write("update_column")?;
        let mut state = self.state.lock().await;
        let column = state
            .columns
            .iter_mut()
            .find(|c| &c.id == id)
            .ok_or_else(|| DomainError::ColumnNotFound(id.to_string()))?;
        column.apply(patch)?;
        Ok(())
    }

    async fn delete_column(&self, id: &ColumnId) -> Result<(), AppError> {
        self.begin_write("delete_column")?;
        self.state.lock().await.columns.retain(|c| &c.id != id);
        Ok(())
    }

    async fn create_todo(
        &self,
        scope: &Scope,
        owner: &UserId,
        draft: NewTodo,
    ) -> Result<TodoId, AppError> {
        self.begin_write("create_todo")?;
        let todo = Todo::new(scope, owner.clone(), draft)?;
        let id = todo.id.clone();
        self.state.lock().await.todos.push(todo);
        Ok(id)
    }

    async fn create_todo_batch(
        &self,
        scope: &Scope,
        owner: &UserId,
        drafts: Vec<NewTodo>,
        default_status: &ColumnId,
    ) -> Result<Vec<TodoId>, AppError> {
        self.begin_write("create_todo_batch")?;
        let todos = build_todo_batch(scope, owner, drafts, default_status)?;

        let ids = todos.iter().map(|t| t.id.clone()).collect();
        self.state.lock().await.todos.extend(todos);
        Ok(ids)
    }

    async fn update_todo(&self, id: &TodoId, patch: TodoPatch) -> Result<(), AppError> {
        self.begin_write("update_todo")?;
        let mut state = self.state.lock().await;
        let todo = state
            .todos
            .iter_mut()
            .find(|t| &t.id == id)
            .ok_or_else(|| DomainError::TodoNotFound(id.to_string()))?;
        todo.apply(patch)?;
        Ok(())
    }

    async fn delete_todo(&self, id: &TodoId) -> Result<(), AppError> {
        self.begin_write("delete_todo")?;
        self.state.lock().await.todos.retain(|t| &t.id != id);
        Ok(())
    }

    async fn get_team(&self, id: &TeamId) -> Result<Option<Team>, AppError> {
        self.begin_read("get_team")?;
        let state = self.state.lock().await;
        Ok(state.teams.iter().find(|t| &t.id == id).cloned())
    }

    async fn create_team(&self, name: &str, creator: &UserId) -> Result<Team, AppError> {
        self.begin_write("create_team")?;
        let mut state = self.state.lock().await;
        let taken: Vec<InviteCode> = state.teams.iter().map(|t| t.invite_code.clone()).collect();
        let code = allocate_invite_code(random_invite_code, |candidate| {
            let collides = taken.contains(&candidate);
            async move { Ok::<_, AppError>(collides) }
        })
        .await?;

        let team = Team::new(name, creator.clone(), code)?;
        info!("チームを作成: id={}, invite_code={}", team.id, team.invite_code);
        state.teams.push(team.clone());
        Ok(team)
    }

    async fn join_team(&self, code: &InviteCode, user: &UserId) -> Result<Team, AppError> {
        self.begin_write("join_team")?;
        let mut state = self.state.lock().await;
        let team = state
            .teams
            .iter_mut()
            .find(|t| &t.invite_code == code)
            .ok_or_else(|| DomainError::InvalidInviteCode("Invalid invite code".to_string()))?;
        team.join(user.clone())?;
        Ok(team.clone())
    }

    async fn remove_member(
        &self,
        team: &TeamId,
        requester: &UserId,
        target: &UserId,
    ) -> Result<Team, AppError> {
        self.begin_write("remove_member")?;
        let mut state = self.state.lock().await;
        let team = team_mut(&mut state, team)?;
        team.remove_member(requester, target)?;
        Ok(team.clone())
    }

    async fn rename_team(
        &self,
        team: &TeamId,
        requester: &UserId,
        name: &str,
    ) -> Result<Team, AppError> {
        self.begin_write("rename_team")?;
        let mut state = self.state.lock().await;
        let team = team_mut(&mut state, team)?;
        team.rename(requester, name)?;
        Ok(team.clone())
    }

    async fn delete_team(&self, team: &TeamId, requester: &UserId) -> Result<(), AppError> {
        self.begin_write("delete_team")?;
        let mut state = self.state.lock().await;
        team_mut(&mut state, team)?.authorize_delete(requester)?;
        state.teams.retain(|t| &t.id != team);
        Ok(())
    }

    async fn list_user_teams(&self, user: &UserId) -> Result<Vec<Team>, AppError> {
        self.begin_read("list_user_teams")?;
        let state = self.state.lock().await;
        Ok(state
            .teams
            .iter()
            .filter(|t| t.is_member(user))
            .cloned()
            .collect())
    }

    async fn upsert_profile(&self, profile: &MemberProfile) -> Result<(), AppError> {
        self.begin_write("upsert_profile")?;
        self.state
            .lock()
            .await
            .profiles
            .insert(profile.user_id.clone(), profile.clone());
        Ok(())
    }

    async fn get_profile(&self, user: &UserId) -> Result<Option<MemberProfile>, AppError> {
        self.begin_read("get_profile")?;
        Ok(self.state.lock().await.profiles.get(user).cloned())
    }

    async fn list_profiles(&self, users: &[UserId]) -> Result<Vec<MemberProfile>, AppError> {
        self.begin_read("list_profiles")?;
        let state = self.state.lock().await;
        Ok(users
            .iter()
            .filter_map(|user| state.profiles.get(user).cloned())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uid(id: &str) -> UserId {
        UserId::from_string(id.to_string()).unwrap()
    }

    #[tokio::test]
    async fn test_list_columns_seeds_defaults_once() {
        let store = MemoryStore::new();
        let scope = Scope::Personal(uid("u1"));

        let first = store.list_columns(&scope).await.unwrap();
        let names: Vec<&str> = first.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["To Do", "In Progress", "Done"]);
        assert_eq!(
            first.iter().map(|c| c.order).collect::<Vec<_>>(),
            vec![0, 1, 2]
        );

        let second = store.list_columns(&scope).await.unwrap();
        assert_eq!(first, second);

        // 別スコープは別の既定列
        let other = store.list_columns(&Scope::Personal(uid("u2"))).await.unwrap();
        assert!(other.iter().all(|c| !first.contains(c)));
    }

    #[tokio::test]
    async fn test_personal_and_team_scopes_are_separate() {
        let store = MemoryStore::new();
        let personal = Scope::Personal(uid("u1"));
        let team = Scope::Team(TeamId::new());

        store
            .create_todo(&personal, &uid("u1"), NewTodo::new("mine"))
            .await
            .unwrap();
        store
            .create_todo(&team, &uid("u1"), NewTodo::new("shared"))
            .await
            .unwrap();

        let mine = store.list_todos(&personal).await.unwrap();
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].title, "mine");

        let shared = store.list_todos(&team).await.unwrap();
        assert_eq!(shared.len(), 1);
        assert_eq!(shared[0].team.as_ref(), team.team());
    }

    #[tokio::test]
    async fn test_batch_keeps_input_order_and_status() {
        let store = MemoryStore::new();
        let scope = Scope::Personal(uid("u1"));
        let columns = store.list_columns(&scope).await.unwrap();
        let target = columns[1].id.clone();

        let ids = store
            .create_todo_batch(
                &scope,
                &uid("u1"),
                vec![NewTodo::new("A"), NewTodo::new("B")],
                &target,
            )
            .await
            .unwrap();
        assert_eq!(ids.len(), 2);

        let todos = store.list_todos(&scope).await.unwrap();
        assert_eq!(
            todos.iter().map(|t| t.title.as_str()).collect::<Vec<_>>(),
            vec!["A", "B"]
        );
        assert!(todos
            .iter()
            .all(|t| t.status.as_ref() == Some(&target) && !t.completed));
    }

    #[tokio::test]
    async fn test_delete_column_leaves_cards() {
        let store = MemoryStore::new();
        let scope = Scope::Personal(uid("u1"));
        let columns = store.list_columns(&scope).await.unwrap();
        let doomed = columns[0].id.clone();
        store
            .create_todo(&scope, &uid("u1"), NewTodo::new("orphan").in_column(doomed.clone()))
            .await
            .unwrap();

        store.delete_column(&doomed).await.unwrap();

        let todos = store.list_todos(&scope).await.unwrap();
        assert_eq!(todos[0].status.as_ref(), Some(&doomed));
        assert_eq!(store.list_columns(&scope).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_injected_failures() {
        let store = MemoryStore::new();
        let scope = Scope::Personal(uid("u1"));
        store.inject_write_failures(true);

        let err = store
            .create_todo(&scope, &uid("u1"), NewTodo::new("x"))
            .await
            .unwrap_err();
        assert!(err.is_transient());
        assert_eq!(store.write_count(), 1);

        store.inject_write_failures(false);
        assert!(store
            .create_todo(&scope, &uid("u1"), NewTodo::new("x"))
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_injected_read_failures() {
        let store = MemoryStore::new();
        let scope = Scope::Personal(uid("u1"));
        store.inject_read_failures(true);

        assert!(store.list_columns(&scope).await.unwrap_err().is_transient());
        assert!(store.list_todos(&scope).await.unwrap_err().is_transient());
        assert_eq!(store.write_count(), 0);

        // 書き込みは影響を受けない
        store
            .create_todo(&scope, &uid("u1"), NewTodo::new("x"))
            .await
            .unwrap();

        store.inject_read_failures(false);
        assert_eq!(store.list_todos(&scope).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_team_lifecycle() {
        let store = MemoryStore::new();
        let team = store.create_team("Platform", &uid("owner")).await.unwrap();
        assert_eq!(team.invite_code.as_str().len(), 6);

        let joined = store.join_team(&team.invite_code, &uid("m1")).await.unwrap();
        assert!(joined.is_member(&uid("m1")));

        let duplicate = store.join_team(&team.invite_code, &uid("m1")).await;
        assert!(matches!(
            duplicate,
            Err(AppError::Domain(DomainError::MemberAlreadyExists(_)))
        ));

        let unknown = store
            .join_team(&InviteCode::from_string("ZZZZZZ").unwrap(), &uid("m2"))
            .await;
        assert!(matches!(
            unknown,
            Err(AppError::Domain(DomainError::InvalidInviteCode(_)))
        ));

        assert_eq!(store.list_user_teams(&uid("m1")).await.unwrap().len(), 1);

        let denied = store.rename_team(&team.id, &uid("m1"), "Mine").await;
        assert!(matches!(
            denied,
            Err(AppError::Domain(DomainError::Unauthorized(_)))
        ));

        store.delete_team(&team.id, &uid("owner")).await.unwrap();
        assert!(store.get_team(&team.id).await.unwrap().is_none());
        assert!(store.list_user_teams(&uid("m1")).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_profiles() {
        let store = MemoryStore::new();
        let profile =
            MemberProfile::from_identity(uid("u1"), None, Some("kim@x.com"), None).unwrap();
        store.upsert_profile(&profile).await.unwrap();

        assert_eq!(
            store.get_profile(&uid("u1")).await.unwrap().unwrap().display_name,
            "kim"
        );
        let listed = store.list_profiles(&[uid("u1"), uid("ghost")]).await.unwrap();
        assert_eq!(listed.len(), 1);
    }
}
