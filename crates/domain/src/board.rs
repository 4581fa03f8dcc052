use crate::column::{sort_columns, Column};
use crate::identifiers::{ColumnId, TodoId};
use crate::todo::Todo;
use serde::{Deserialize, Serialize};

/// 1スコープ分のボード（列とカードの組）
///
/// 永続化はされず、読み込み結果から導出されるビュー。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Board {
    columns: Vec<Column>,
    todos: Vec<Todo>,
}

/// 列ごとのカード一覧
#[derive(Debug)]
pub struct Lane<'a> {
    pub column: &'a Column,
    pub todos: Vec<&'a Todo>,
}

/// 列の並べ替えで変化した順位
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderChange {
    pub column_id: ColumnId,
    pub order: i64,
}

/// 配列上の要素を `from` から `to` の位置へ移動する
///
/// 間にある要素は一つずつずれる。範囲外の指定は無視する。
pub fn array_move<T>(items: &mut Vec<T>, from: usize, to: usize) {
    if from >= items.len() || to >= items.len() || from == to {
        return;
    }
    let item = items.remove(from);
    items.insert(to, item);
}

impl Board {
    pub fn new(mut columns: Vec<Column>, todos: Vec<Todo>) -> Self {
        sort_columns(&mut columns);
        Self { columns, todos }
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn todos(&self) -> &[Todo] {
        &self.todos
    }

    pub fn column(&self, id: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.id.as_str() == id)
    }

    pub fn column_index(&self, id: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.id.as_str() == id)
    }

    pub fn has_column(&self, id: &ColumnId) -> bool {
        self.columns.iter().any(|c| &c.id == id)
    }

    pub fn todo(&self, id: &str) -> Option<&Todo> {
        self.todos.iter().find(|t| t.id.as_str() == id)
    }

    pub fn todo_mut(&mut self, id: &TodoId) -> Option<&mut Todo> {
        self.todos.iter_mut().find(|t| &t.id == id)
    }

    /// 列に実在する `status` だけを返す。存在しない列への参照は未割り当て扱い。
    pub fn effective_status<'a>(&self, todo: &'a Todo) -> Option<&'a ColumnId> {
        todo.status.as_ref().filter(|status| self.has_column(status))
    }

    pub fn todos_in(&self, column_id: &ColumnId) -> Vec<&Todo> {
        self.todos
            .iter()
            .filter(|t| t.status.as_ref() == Some(column_id))
            .collect()
    }

    /// どの列にも属さないカード（`status` なし、または削除済みの列を参照）
    pub fn unassigned(&self) -> Vec<&Todo> {
        self.todos
            .iter()
            .filter(|t| self.effective_status(t).is_none())
            .collect()
    }

    pub fn lanes(&self) -> Vec<Lane<'_>> {
        self.columns
            .iter()
            .map(|column| Lane {
                column,
                todos: self.todos_in(&column.id),
            })
            .collect()
    }

    /// 列を配列移動で並べ替える
    pub fn move_column(&mut self, from: usize, to: usize) {
        array_move(&mut self.columns, from, to);
    }

    /// 現在の並び順に合わせて順位を振り直し、変化した列だけを返す
    pub fn renumber_columns(&mut self) -> Vec<OrderChange> {
        let mut changes = Vec::new();
        for (index, column) in self.columns.iter_mut().enumerate() {
            let order = index as i64;
            if column.order != order {
                column.order = order;
                changes.push(OrderChange {
                    column_id: column.id.clone(),
                    order,
                });
            }
        }
        changes
    }

    /// 列の並びをID列で指定して復元する（存在しないIDは無視）
    pub fn restore_column_sequence(&mut self, sequence: &[ColumnId]) {
        let mut restored = Vec::with_capacity(self.columns.len());
        for id in sequence {
            if let Some(index) = self.columns.iter().position(|c| &c.id == id) {
                restored.push(self.columns.remove(index));
            }
        }
        restored.append(&mut self.columns);
        self.columns = restored;
    }

    pub fn column_sequence(&self) -> Vec<ColumnId> {
        self.columns.iter().map(|c| c.id.clone()).collect()
    }

    pub fn replace_columns(&mut self, mut columns: Vec<Column>) {
        sort_columns(&mut columns);
        self.columns = columns;
    }

    pub fn replace_todos(&mut self, todos: Vec<Todo>) {
        self.todos = todos;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identifiers::{Scope, UserId};
    use crate::todo::NewTodo;

    fn scope() -> Scope {
        Scope::Personal(UserId::from_string("u1".to_string()).unwrap())
    }

    fn owner() -> UserId {
        UserId::from_string("u1".to_string()).unwrap()
    }

    #[test]
    fn test_array_move() {
        let mut items = vec!["a", "b", "c", "d"];
        array_move(&mut items, 0, 2);
        assert_eq!(items, vec!["b", "c", "a", "d"]);

        array_move(&mut items, 3, 0);
        assert_eq!(items, vec!["d", "b", "c", "a"]);

        array_move(&mut items, 1, 9);
        assert_eq!(items, vec!["d", "b", "c", "a"]);
    }

    #[test]
    fn test_board_partitions_todos_by_status() {
        let columns = Column::defaults(&scope());
        let todo_col = columns[0].id.clone();
        let done_col = columns[2].id.clone();

        let a = Todo::new(&scope(), owner(), NewTodo::new("A").in_column(todo_col.clone())).unwrap();
        let b = Todo::new(&scope(), owner(), NewTodo::new("B").in_column(done_col.clone())).unwrap();
        let c = Todo::new(&scope(), owner(), NewTodo::new("C")).unwrap();
        let d = Todo::new(&scope(), owner(), NewTodo::new("D").in_column(ColumnId::new())).unwrap();

        let board = Board::new(columns, vec![a.clone(), b.clone(), c.clone(), d.clone()]);

        let lanes = board.lanes();
        assert_eq!(lanes.len(), 3);
        assert_eq!(lanes[0].todos.len(), 1);
        assert_eq!(lanes[0].todos[0].id, a.id);
        assert!(lanes[1].todos.is_empty());
        assert_eq!(lanes[2].todos[0].id, b.id);

        // status なしと削除済み列への参照はどちらも未割り当て
        let unassigned: Vec<&TodoId> = board.unassigned().iter().map(|t| &t.id).collect();
        assert_eq!(unassigned, vec![&c.id, &d.id]);
        assert_eq!(board.effective_status(&d), None);
    }

    #[test]
    fn test_renumber_reports_only_changed_columns() {
        let mut board = Board::new(Column::defaults(&scope()), vec![]);
        assert!(board.renumber_columns().is_empty());

        board.move_column(2, 0);
        let changes = board.renumber_columns();
        assert_eq!(changes.len(), 3);
        let orders: Vec<i64> = board.columns().iter().map(|c| c.order).collect();
        assert_eq!(orders, vec![0, 1, 2]);
        assert_eq!(board.columns()[0].name, "Done");
    }

    #[test]
    fn test_restore_column_sequence() {
        let mut board = Board::new(Column::defaults(&scope()), vec![]);
        let original = board.column_sequence();

        board.move_column(0, 2);
        assert_ne!(board.column_sequence(), original);

        board.restore_column_sequence(&original);
        assert_eq!(board.column_sequence(), original);
    }
}
