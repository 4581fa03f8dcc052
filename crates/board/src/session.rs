use crate::confirm::Confirm;
use crate::reconciler::{DragState, PersistPlan, Reconciler};
use domain::{
    active_mention, suggestions, Board, ColumnId, ColumnPatch, DomainError, MemberProfile,
    MentionDraft, NewTodo, OrderChange, ProposedTask, Roster, Scope, Team, Todo, TodoId,
    TodoPatch, UserId,
};
use infrastructure::BoardStore;
use shared::telemetry::trace_store_operation;
use shared::AppError;
use std::sync::Arc;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

/// 非同期の永続化が終わったあとにボードへ反映する内容
#[derive(Debug)]
pub enum Completion {
    /// カード一覧の再取得結果
    Todos(Vec<Todo>),
    /// ボード全体の再取得結果
    Board(Board),
    /// 再取得もできなかったときのカードの巻き戻し
    RevertCard {
        todo: TodoId,
        origin: Option<ColumnId>,
    },
}

/// 1つのボード（個人またはチーム）の操作セッション
///
/// ボードへの変更はすべてこの構造体を通る単一の制御フローで行う。
/// 永続化は tokio のタスクとして投げっぱなしにし、結果はチャネル経由で
/// [`BoardSession::apply_completions`] が反映する。
pub struct BoardSession<S: BoardStore + 'static> {
    store: Arc<S>,
    scope: Scope,
    actor: UserId,
    reconciler: Reconciler,
    roster: Roster,
    team: Option<Team>,
    completions_tx: UnboundedSender<Completion>,
    completions_rx: UnboundedReceiver<Completion>,
}

impl<S: BoardStore + 'static> BoardSession<S> {
    /// ボードと名簿を読み込んでセッションを開始
    pub async fn load(store: Arc<S>, scope: Scope, actor: UserId) -> Result<Self, AppError> {
        info!("ボードを読み込み中: scope={}, actor={}", scope, actor);

        let team = match scope.team() {
            Some(team_id) => Some(
                store
                    .get_team(team_id)
                    .await?
                    .ok_or_else(|| DomainError::TeamNotFound(team_id.to_string()))?,
            ),
            None => None,
        };
        let members = match &team {
            Some(team) => team.members.clone(),
            None => vec![actor.clone()],
        };
        let roster = Roster::new(store.list_profiles(&members).await?);
        let board = fetch_board(store.as_ref(), &scope).await?;

        let (completions_tx, completions_rx) = unbounded_channel();
        Ok(Self {
            store,
            scope,
            actor,
            reconciler: Reconciler::new(board),
            roster,
            team,
            completions_tx,
            completions_rx,
        })
    }

    pub fn board(&self) -> &Board {
        self.reconciler.board()
    }

    pub fn drag_state(&self) -> &DragState {
        self.reconciler.state()
    }

    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    pub fn actor(&self) -> &UserId {
        &self.actor
    }

    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    pub fn team(&self) -> Option<&Team> {
        self.team.as_ref()
    }

    /// 管理者向けの操作を表示するか（実際の権限チェックは永続化側）
    pub fn actor_is_admin(&self) -> bool {
        self.team
            .as_ref()
            .map(|team| team.is_admin(&self.actor))
            .unwrap_or(false)
    }

    pub fn begin_drag(&mut self, id: &str) -> bool {
        self.reconciler.begin_drag(id)
    }

    pub fn hover(&mut self, over: Option<&str>) {
        self.reconciler.hover(over);
    }

    pub fn cancel_drag(&mut self) {
        self.reconciler.cancel();
    }

    /// ドロップして永続化を開始する
    ///
    /// 状態はすぐに `Idle` に戻り、次のドラッグを始められる。永続化のタスクを
    /// 待ちたい呼び出し側のためにハンドルを返す（書き込みがなければ `None`）。
    pub fn release(&mut self, over: Option<&str>) -> Option<JoinHandle<()>> {
        match self.reconciler.end_drag(over) {
            PersistPlan::Nothing => None,
            PersistPlan::ColumnOrder(changes) => Some(self.spawn_column_order(changes)),
            PersistPlan::CardStatus {
                todo,
                status,
                origin,
            } => Some(self.spawn_card_move(todo, status, origin)),
        }
    }

    /// 届いている永続化結果をすべて反映し、反映した件数を返す
    pub fn apply_completions(&mut self) -> usize {
        let mut applied = 0;
        while let Ok(completion) = self.completions_rx.try_recv() {
            match completion {
                Completion::Todos(todos) => self.reconciler.replace_todos(todos),
                Completion::Board(board) => self.reconciler.replace_board(board),
                Completion::RevertCard { todo, origin } => {
                    self.reconciler.revert_card(&todo, origin)
                }
            }
            applied += 1;
        }
        applied
    }

    /// 列の順位を書き込む。失敗はログのみで、ローカルの並びは戻さない
    fn spawn_column_order(&self, changes: Vec<OrderChange>) -> JoinHandle<()> {
        let store = Arc::clone(&self.store);
        let scope = self.scope.to_string();
        tokio::spawn(async move {
            for change in changes {
                let result = trace_store_operation(&scope, "update_column_order", || {
                    store.update_column(&change.column_id, ColumnPatch::order(change.order))
                })
                .await;
                if let Err(e) = result {
                    warn!(
                        column_id = %change.column_id,
                        error = %e,
                        "列の順位を保存できませんでした"
                    );
                }
            }
        })
    }

    /// カードの移動を書き込む
    ///
    /// 成功したらカード一覧だけを再取得する。失敗したらボード全体を再取得して
    /// 楽観的な状態を捨てる。
    fn spawn_card_move(
        &self,
        todo: TodoId,
        status: ColumnId,
        origin: Option<ColumnId>,
    ) -> JoinHandle<()> {
        let store = Arc::clone(&self.store);
        let scope = self.scope.clone();
        let tx = self.completions_tx.clone();

        tokio::spawn(async move {
            let label = scope.to_string();
            let moved = trace_store_operation(&label, "move_todo", || {
                store.update_todo(&todo, TodoPatch::status(Some(status.clone())))
            })
            .await;

            let completion = match moved {
                Ok(()) => match store.list_todos(&scope).await {
                    Ok(todos) => Completion::Todos(todos),
                    Err(e) => {
                        warn!(error = %e, "移動後のカード再取得に失敗しました");
                        return;
                    }
                },
                Err(e) => {
                    error!(todo_id = %todo, error = %e, "カードの移動を保存できませんでした");
                    match fetch_board(store.as_ref(), &scope).await {
                        Ok(board) => Completion::Board(board),
                        Err(e) => {
                            error!(error = %e, "ボードの再取得にも失敗しました");
                            Completion::RevertCard { todo, origin }
                        }
                    }
                }
            };
            // セッションが先に破棄されていれば結果は捨てる
            let _ = tx.send(completion);
        })
    }

    /// ボード全体を再取得
    pub async fn reload(&mut self) -> Result<(), AppError> {
        let board = fetch_board(self.store.as_ref(), &self.scope).await?;
        self.reconciler.replace_board(board);
        Ok(())
    }

    /// カード一覧だけを再取得
    pub async fn reload_todos(&mut self) -> Result<(), AppError> {
        let todos = self.store.list_todos(&self.scope).await?;
        self.reconciler.replace_todos(todos);
        Ok(())
    }

    /// 列を末尾に追加
    pub async fn add_column(&mut self, name: &str) -> Result<ColumnId, AppError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(DomainError::Validation("Column name cannot be empty".to_string()).into());
        }
        let order = self.board().columns().len() as i64;
        let id = self.store.create_column(&self.scope, name, order).await?;
        info!("列を追加: id={}, name={}", id, name);
        self.reload().await?;
        Ok(id)
    }

    pub async fn rename_column(&mut self, id: &ColumnId, name: &str) -> Result<(), AppError> {
        if name.trim().is_empty() {
            return Err(DomainError::Validation("Column name cannot be empty".to_string()).into());
        }
        self.store.update_column(id, ColumnPatch::name(name)).await?;
        self.reload().await
    }

    /// 列を削除（確認で拒否されたら何もしない）
    ///
    /// 列に入っていたカードは残り、未割り当てとして扱われる。
    pub async fn delete_column(
        &mut self,
        id: &ColumnId,
        confirm: &dyn Confirm,
    ) -> Result<bool, AppError> {
        let name = self
            .board()
            .column(id.as_str())
            .map(|c| c.name.clone())
            .unwrap_or_default();
        if !confirm.confirm(&format!("Delete column \"{name}\"?")) {
            return Ok(false);
        }
        self.store.delete_column(id).await?;
        info!("列を削除: id={}", id);
        self.reload().await?;
        Ok(true)
    }

    pub async fn add_card(&mut self, draft: NewTodo) -> Result<TodoId, AppError> {
        if draft.title.trim().is_empty() {
            return Err(DomainError::Validation("Todo title cannot be empty".to_string()).into());
        }
        let id = self
            .store
            .create_todo(&self.scope, &self.actor, draft)
            .await?;
        self.reload_todos().await?;
        Ok(id)
    }

    /// メンション入力から作成（選ばれたメンバーが担当者になる）
    pub async fn add_card_from_mention(
        &mut self,
        draft: &MentionDraft,
        status: Option<ColumnId>,
    ) -> Result<TodoId, AppError> {
        let new_todo = draft.submit(status)?;
        self.add_card(new_todo).await
    }

    pub async fn edit_card(&mut self, id: &TodoId, patch: TodoPatch) -> Result<(), AppError> {
        if patch.is_empty() {
            return Ok(());
        }
        self.store.update_todo(id, patch).await?;
        self.reload_todos().await
    }

    pub async fn delete_card(&mut self, id: &TodoId) -> Result<(), AppError> {
        self.store.delete_todo(id).await?;
        self.reload_todos().await
    }

    /// カーソル位置のメンション入力に対する候補
    pub fn mention_suggestions(&self, text: &str, cursor: usize) -> Vec<&MemberProfile> {
        active_mention(text, cursor)
            .map(|fragment| suggestions(&fragment, &self.roster))
            .unwrap_or_default()
    }

    /// 新しいカードを受け取る既定の列
    ///
    /// 名前が "to do"（大文字小文字を区別しない）の列、なければ先頭の列。
    pub fn default_column(&self) -> Option<&ColumnId> {
        let columns = self.board().columns();
        columns
            .iter()
            .find(|c| c.name.trim().to_lowercase() == "to do")
            .or_else(|| columns.first())
            .map(|c| &c.id)
    }

    /// 確認済みの抽出タスクを既定の列に一括作成
    pub async fn import_tasks(&mut self, tasks: &[ProposedTask]) -> Result<Vec<TodoId>, AppError> {
        let status = self.default_column().cloned().ok_or(DomainError::NoColumns)?;

        let drafts = tasks
            .iter()
            .map(|task| {
                let title = task.title.trim();
                if title.is_empty() {
                    return Err(DomainError::Validation(
                        "Todo title cannot be empty".to_string(),
                    ));
                }
                Ok(NewTodo::new(title).assigned_to(task.assignee.clone()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let ids = self
            .store
            .create_todo_batch(&self.scope, &self.actor, drafts, &status)
            .await?;
        info!("抽出タスクを追加: {} 件, column={}", ids.len(), status);
        self.reload_todos().await?;
        Ok(ids)
    }
}

async fn fetch_board<S: BoardStore + ?Sized>(store: &S, scope: &Scope) -> Result<Board, AppError> {
    let columns = store.list_columns(scope).await?;
    let todos = store.list_todos(scope).await?;
    Ok(Board::new(columns, todos))
}
