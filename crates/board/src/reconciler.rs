//! カンバンのドラッグ＆ドロップ状態機械
//!
//! ジェスチャーは `begin_drag` → `hover`* → `end_drag` の順に届く。`hover` は
//! ローカルのボードだけを書き換えるプレビューで、I/O は行わない。`end_drag` は
//! 必ず `Idle` に戻り、永続化すべき内容を [`PersistPlan`] として返す。
//! 永続化そのものは呼び出し側（セッション）が非同期に行う。

use domain::{Board, ColumnId, OrderChange, Todo, TodoId};
use tracing::{debug, info};

/// ドラッグ状態
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum DragState {
    #[default]
    Idle,
    /// 列をドラッグ中。取消用に開始時の並びを持つ
    DraggingColumn {
        column: ColumnId,
        origin_sequence: Vec<ColumnId>,
    },
    /// カードをドラッグ中。`origin` はドラッグ開始時の `status`
    DraggingCard {
        todo: TodoId,
        origin: Option<ColumnId>,
    },
}

/// ドロップ後に永続化する内容
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PersistPlan {
    /// 書き込みなし
    Nothing,
    /// 順位が変わった列
    ColumnOrder(Vec<OrderChange>),
    /// カードの移動。失敗時に戻す列として `origin` を持つ
    CardStatus {
        todo: TodoId,
        status: ColumnId,
        origin: Option<ColumnId>,
    },
}

#[derive(Debug, Clone, Default)]
pub struct Reconciler {
    board: Board,
    state: DragState,
}

impl Reconciler {
    pub fn new(board: Board) -> Self {
        Self {
            board,
            state: DragState::Idle,
        }
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn state(&self) -> &DragState {
        &self.state
    }

    pub fn is_idle(&self) -> bool {
        self.state == DragState::Idle
    }

    /// ドラッグ中のカード
    pub fn dragged_todo(&self) -> Option<&TodoId> {
        match &self.state {
            DragState::DraggingCard { todo, .. } => Some(todo),
            _ => None,
        }
    }

    /// ドラッグ開始
    ///
    /// `id` を列、カードの順に照合する。どちらでもなければ何もしない。
    /// 前のドラッグが終わっていなければ取り消してから始める。
    pub fn begin_drag(&mut self, id: &str) -> bool {
        if !self.is_idle() {
            self.cancel();
        }

        if let Some(column) = self.board.column(id) {
            debug!("列のドラッグ開始: {}", column.id);
            self.state = DragState::DraggingColumn {
                column: column.id.clone(),
                origin_sequence: self.board.column_sequence(),
            };
            return true;
        }

        if let Some(todo) = self.board.todo(id) {
            debug!("カードのドラッグ開始: {}", todo.id);
            self.state = DragState::DraggingCard {
                todo: todo.id.clone(),
                origin: todo.status.clone(),
            };
            return true;
        }

        false
    }

    /// ホバー中のプレビュー（何度呼ばれても同じ結果になる）
    pub fn hover(&mut self, over: Option<&str>) {
        match self.state.clone() {
            DragState::Idle => {}
            DragState::DraggingColumn { column, .. } => self.preview_column_move(&column, over),
            DragState::DraggingCard { todo, .. } => {
                if let Some(target) = over.and_then(|id| self.resolve_target(id)) {
                    self.set_status(&todo, Some(target));
                }
            }
        }
    }

    /// ドロップ
    ///
    /// 状態は必ず `Idle` に戻る。
    pub fn end_drag(&mut self, over: Option<&str>) -> PersistPlan {
        match std::mem::take(&mut self.state) {
            DragState::Idle => PersistPlan::Nothing,
            DragState::DraggingColumn { column, .. } => {
                self.preview_column_move(&column, over);
                let changes = self.board.renumber_columns();
                if changes.is_empty() {
                    return PersistPlan::Nothing;
                }
                info!("列の並びを変更: {} 列の順位が変化", changes.len());
                PersistPlan::ColumnOrder(changes)
            }
            DragState::DraggingCard { todo, origin } => {
                let target = over.and_then(|id| self.resolve_target(id));
                match target {
                    Some(status) if Some(&status) != origin.as_ref() => {
                        self.set_status(&todo, Some(status.clone()));
                        info!("カードを移動: {} -> {}", todo, status);
                        PersistPlan::CardStatus {
                            todo,
                            status,
                            origin,
                        }
                    }
                    // 移動先なし、または元の列へのドロップ
                    _ => {
                        self.set_status(&todo, origin);
                        PersistPlan::Nothing
                    }
                }
            }
        }
    }

    /// ドラッグを取り消してプレビューを開始前に戻す
    pub fn cancel(&mut self) {
        match std::mem::take(&mut self.state) {
            DragState::Idle => {}
            DragState::DraggingColumn {
                origin_sequence, ..
            } => self.board.restore_column_sequence(&origin_sequence),
            DragState::DraggingCard { todo, origin } => self.set_status(&todo, origin),
        }
    }

    /// カード一覧を差し替える
    ///
    /// ドラッグ中のカードはプレビュー中の `status` を保つ。
    pub fn replace_todos(&mut self, mut todos: Vec<Todo>) {
        if let Some(dragged) = self.dragged_todo() {
            let preview = self.board.todo(dragged.as_str()).map(|t| t.status.clone());
            if let (Some(status), Some(fresh)) =
                (preview, todos.iter_mut().find(|t| &t.id == dragged))
            {
                fresh.status = status;
            }
        }
        self.board.replace_todos(todos);
    }

    /// ボード全体を差し替える
    ///
    /// 列のドラッグ中はプレビュー中の並びを保つ。
    pub fn replace_board(&mut self, board: Board) {
        let preview_sequence = match &self.state {
            DragState::DraggingColumn { .. } => Some(self.board.column_sequence()),
            _ => None,
        };

        let (columns, todos) = (board.columns().to_vec(), board.todos().to_vec());
        self.board.replace_columns(columns);
        if let Some(sequence) = preview_sequence {
            self.board.restore_column_sequence(&sequence);
        }
        self.replace_todos(todos);

        // ドラッグ中の要素が消えていたらドラッグを終える
        let still_present = match &self.state {
            DragState::Idle => true,
            DragState::DraggingColumn { column, .. } => self.board.has_column(column),
            DragState::DraggingCard { todo, .. } => self.board.todo(todo.as_str()).is_some(),
        };
        if !still_present {
            self.state = DragState::Idle;
        }
    }

    /// カードの `status` を直接戻す（永続化失敗時）
    pub fn revert_card(&mut self, todo: &TodoId, origin: Option<ColumnId>) {
        if self.dragged_todo() == Some(todo) {
            return;
        }
        self.set_status(todo, origin);
    }

    /// ホバー先をカードの移動先の列に解決する
    ///
    /// 列IDならその列、カードIDならそのカードが実在する列に入っていればその列。
    fn resolve_target(&self, over: &str) -> Option<ColumnId> {
        if let Some(column) = self.board.column(over) {
            return Some(column.id.clone());
        }
        self.board
            .todo(over)
            .and_then(|t| self.board.effective_status(t))
            .cloned()
    }

    fn preview_column_move(&mut self, column: &ColumnId, over: Option<&str>) {
        let Some(over) = over else {
            return;
        };
        let (Some(from), Some(to)) = (
            self.board.column_index(column.as_str()),
            self.board.column_index(over),
        ) else {
            return;
        };
        if from != to {
            self.board.move_column(from, to);
        }
    }

    fn set_status(&mut self, todo: &TodoId, status: Option<ColumnId>) {
        if let Some(card) = self.board.todo_mut(todo) {
            if card.status != status {
                card.status = status;
            }
        }
    }
}
