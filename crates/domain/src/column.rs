use crate::errors::{DomainError, DomainResult};
use crate::identifiers::{ColumnId, Scope, TeamId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 空のボードに最初の読み込み時に作成される列
pub const DEFAULT_COLUMNS: [&str; 3] = ["To Do", "In Progress", "Done"];

/// カンバンの列
///
/// `order` はボード内での左からの表示位置。保存状態では一意だが、
/// ドラッグ中の一時的な重複は許容する。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    pub id: ColumnId,
    pub name: String,
    pub order: i64,
    pub team: Option<TeamId>,
    pub owner: Option<UserId>,
    pub created_at: DateTime<Utc>,
}

/// 列の部分更新
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ColumnPatch {
    pub name: Option<String>,
    pub order: Option<i64>,
}

impl ColumnPatch {
    pub fn name(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            order: None,
        }
    }

    pub fn order(order: i64) -> Self {
        Self {
            name: None,
            order: Some(order),
        }
    }
}

fn normalize_name(name: &str) -> DomainResult<String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(DomainError::Validation(
            "Column name cannot be empty".to_string(),
        ));
    }
    Ok(trimmed.to_string())
}

impl Column {
    /// 新しい列を作成
    pub fn new(scope: &Scope, name: &str, order: i64) -> DomainResult<Self> {
        let (team, owner) = match scope {
            Scope::Personal(user_id) => (None, Some(user_id.clone())),
            Scope::Team(team_id) => (Some(team_id.clone()), None),
        };

        Ok(Self {
            id: ColumnId::new(),
            name: normalize_name(name)?,
            order,
            team,
            owner,
            created_at: Utc::now(),
        })
    }

    /// 既定の三列（To Do / In Progress / Done）を作成
    pub fn defaults(scope: &Scope) -> Vec<Self> {
        DEFAULT_COLUMNS
            .iter()
            .enumerate()
            .filter_map(|(rank, name)| Self::new(scope, name, rank as i64).ok())
            .collect()
    }

    pub fn belongs_to(&self, scope: &Scope) -> bool {
        match scope {
            Scope::Personal(user_id) => self.team.is_none() && self.owner.as_ref() == Some(user_id),
            Scope::Team(team_id) => self.team.as_ref() == Some(team_id),
        }
    }

    pub fn apply(&mut self, patch: ColumnPatch) -> DomainResult<()> {
        if let Some(name) = patch.name {
            self.name = normalize_name(&name)?;
        }
        if let Some(order) = patch.order {
            self.order = order;
        }
        Ok(())
    }
}

/// 表示順（order昇順、同順位はID順）に並べ替え
pub fn sort_columns(columns: &mut [Column]) {
    columns.sort_by(|a, b| a.order.cmp(&b.order).then_with(|| a.id.cmp(&b.id)));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_columns() {
        let scope = Scope::Personal(UserId::from_string("u1".to_string()).unwrap());
        let columns = Column::defaults(&scope);

        let names: Vec<&str> = columns.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["To Do", "In Progress", "Done"]);
        let orders: Vec<i64> = columns.iter().map(|c| c.order).collect();
        assert_eq!(orders, vec![0, 1, 2]);
        assert!(columns.iter().all(|c| c.belongs_to(&scope)));
    }

    #[test]
    fn test_team_column_has_no_owner() {
        let team = TeamId::from_string("t1".to_string()).unwrap();
        let scope = Scope::Team(team.clone());
        let column = Column::new(&scope, " Backlog ", 3).unwrap();

        assert_eq!(column.name, "Backlog");
        assert_eq!(column.team, Some(team));
        assert_eq!(column.owner, None);
        assert!(Column::new(&scope, "", 0).is_err());
    }

    #[test]
    fn test_sort_columns_breaks_ties_by_id() {
        let scope = Scope::Personal(UserId::from_string("u1".to_string()).unwrap());
        let first = Column::new(&scope, "A", 1).unwrap();
        let second = Column::new(&scope, "B", 1).unwrap();
        let zero = Column::new(&scope, "C", 0).unwrap();

        let mut columns = vec![second.clone(), first.clone(), zero.clone()];
        sort_columns(&mut columns);
        let ids: Vec<&ColumnId> = columns.iter().map(|c| &c.id).collect();
        assert_eq!(ids, vec![&zero.id, &first.id, &second.id]);
    }
}
