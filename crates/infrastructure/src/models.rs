use aws_sdk_dynamodb::types::AttributeValue;
use chrono::{DateTime, Utc};
use domain::{
    Column, ColumnId, DomainError, InviteCode, MemberProfile, Scope, Team, TeamId, Todo, TodoId,
    UserId,
};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use shared::AppError;
use std::collections::HashMap;

/// スコープ一覧取得に使う GSI 名
pub const GSI1_NAME: &str = "GSI1";

/// DynamoDB アイテムのエンティティタイプ
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityType {
    Todo,
    Column,
    Team,
    Profile,
}

impl EntityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::Todo => "Todo",
            EntityType::Column => "Column",
            EntityType::Team => "Team",
            EntityType::Profile => "Profile",
        }
    }
}

/// スコープのパーティション（GSI1PK）
pub fn scope_key(scope: &Scope) -> String {
    match scope {
        Scope::Personal(user_id) => format!("USER#{}", user_id),
        Scope::Team(team_id) => format!("TEAM#{}", team_id),
    }
}

/// DynamoDB Single Table Design のキー構造
#[derive(Debug, Clone, PartialEq)]
pub struct ItemKeys {
    pub pk: String,
    pub sk: String,
    pub gsi1_pk: Option<String>,
    pub gsi1_sk: Option<String>,
}

impl ItemKeys {
    pub fn todo_key(id: &TodoId) -> Self {
        let key = format!("TODO#{}", id);
        Self {
            pk: key.clone(),
            sk: key,
            gsi1_pk: None,
            gsi1_sk: None,
        }
    }

    /// カード用のキー（スコープ一覧用の GSI 付き）
    pub fn for_todo(todo: &Todo) -> Self {
        Self {
            gsi1_pk: Some(scope_key(&todo.scope())),
            gsi1_sk: Some(format!("TODO#{}", todo.id)),
            ..Self::todo_key(&todo.id)
        }
    }

    pub fn column_key(id: &ColumnId) -> Self {
        let key = format!("COLUMN#{}", id);
        Self {
            pk: key.clone(),
            sk: key,
            gsi1_pk: None,
            gsi1_sk: None,
        }
    }

    pub fn for_column(column: &Column) -> Self {
        let scope = match (&column.team, &column.owner) {
            (Some(team_id), _) => Some(scope_key(&Scope::Team(team_id.clone()))),
            (None, Some(owner)) => Some(scope_key(&Scope::Personal(owner.clone()))),
            (None, None) => None,
        };
        Self {
            gsi1_pk: scope,
            gsi1_sk: Some(format!("COLUMN#{}", column.id)),
            ..Self::column_key(&column.id)
        }
    }

    pub fn team_key(id: &TeamId) -> Self {
        let key = format!("TEAM#{}", id);
        Self {
            pk: key.clone(),
            sk: key,
            gsi1_pk: None,
            gsi1_sk: None,
        }
    }

    /// チーム用のキー（招待コード検索用の GSI 付き）
    pub fn for_team(team: &Team) -> Self {
        Self {
            gsi1_pk: Some(invite_key(&team.invite_code)),
            gsi1_sk: Some(format!("TEAM#{}", team.id)),
            ..Self::team_key(&team.id)
        }
    }

    pub fn profile_key(user_id: &UserId) -> Self {
        Self {
            pk: format!("USER#{}", user_id),
            sk: "PROFILE".to_string(),
            gsi1_pk: None,
            gsi1_sk: None,
        }
    }

    /// 主キーだけのマップ（get/delete 用）
    pub fn primary_key(&self) -> HashMap<String, AttributeValue> {
        HashMap::from([
            ("PK".to_string(), AttributeValue::S(self.pk.clone())),
            ("SK".to_string(), AttributeValue::S(self.sk.clone())),
        ])
    }
}

pub fn invite_key(code: &InviteCode) -> String {
    format!("INVITE#{}", code)
}

/// カードレコード（DynamoDB用）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TodoRecord {
    pub id: String,
    pub title: String,
    pub completed: bool,
    pub status: Option<String>,
    pub owner: String,
    pub team: Option<String>,
    pub assignee: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<&Todo> for TodoRecord {
    fn from(todo: &Todo) -> Self {
        Self {
            id: todo.id.to_string(),
            title: todo.title.clone(),
            completed: todo.completed,
            status: todo.status.as_ref().map(ToString::to_string),
            owner: todo.owner.to_string(),
            team: todo.team.as_ref().map(ToString::to_string),
            assignee: todo.assignee.as_ref().map(ToString::to_string),
            created_at: todo.created_at,
        }
    }
}

impl TryFrom<TodoRecord> for Todo {
    type Error = DomainError;

    fn try_from(record: TodoRecord) -> Result<Self, Self::Error> {
        Ok(Todo {
            id: TodoId::from_string(record.id)?,
            title: record.title,
            completed: record.completed,
            status: record.status.map(ColumnId::from_string).transpose()?,
            owner: UserId::from_string(record.owner)?,
            team: record.team.map(TeamId::from_string).transpose()?,
            assignee: record.assignee.map(UserId::from_string).transpose()?,
            created_at: record.created_at,
        })
    }
}

/// 列レコード（DynamoDB用）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnRecord {
    pub id: String,
    pub name: String,
    pub order: i64,
    pub team: Option<String>,
    pub owner: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<&Column> for ColumnRecord {
    fn from(column: &Column) -> Self {
        Self {
            id: column.id.to_string(),
            name: column.name.clone(),
            order: column.order,
            team: column.team.as_ref().map(ToString::to_string),
            owner: column.owner.as_ref().map(ToString::to_string),
            created_at: column.created_at,
        }
    }
}

impl TryFrom<ColumnRecord> for Column {
    type Error = DomainError;

    fn try_from(record: ColumnRecord) -> Result<Self, Self::Error> {
        Ok(Column {
            id: ColumnId::from_string(record.id)?,
            name: record.name,
            order: record.order,
            team: record.team.map(TeamId::from_string).transpose()?,
            owner: record.owner.map(UserId::from_string).transpose()?,
            created_at: record.created_at,
        })
    }
}

/// チームレコード（DynamoDB用）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeamRecord {
    pub id: String,
    pub name: String,
    pub created_by: String,
    pub members: Vec<String>,
    pub admins: Vec<String>,
    pub invite_code: String,
    pub created_at: DateTime<Utc>,
}

impl From<&Team> for TeamRecord {
    fn from(team: &Team) -> Self {
        Self {
            id: team.id.to_string(),
            name: team.name.clone(),
            created_by: team.created_by.to_string(),
            members: team.members.iter().map(ToString::to_string).collect(),
            admins: team.admins.iter().map(ToString::to_string).collect(),
            invite_code: team.invite_code.to_string(),
            created_at: team.created_at,
        }
    }
}

impl TryFrom<TeamRecord> for Team {
    type Error = DomainError;

    fn try_from(record: TeamRecord) -> Result<Self, Self::Error> {
        Ok(Team {
            id: TeamId::from_string(record.id)?,
            name: record.name,
            created_by: UserId::from_string(record.created_by)?,
            members: record
                .members
                .into_iter()
                .map(UserId::from_string)
                .collect::<Result<_, _>>()?,
            admins: record
                .admins
                .into_iter()
                .map(UserId::from_string)
                .collect::<Result<_, _>>()?,
            invite_code: InviteCode::from_string(&record.invite_code)?,
            created_at: record.created_at,
        })
    }
}

/// プロフィールレコード（DynamoDB用）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileRecord {
    pub user_id: String,
    pub display_name: String,
    pub email: String,
    pub avatar: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl From<&MemberProfile> for ProfileRecord {
    fn from(profile: &MemberProfile) -> Self {
        Self {
            user_id: profile.user_id.to_string(),
            display_name: profile.display_name.clone(),
            email: profile.email.clone(),
            avatar: profile.avatar.clone(),
            updated_at: profile.updated_at,
        }
    }
}

impl TryFrom<ProfileRecord> for MemberProfile {
    type Error = DomainError;

    fn try_from(record: ProfileRecord) -> Result<Self, Self::Error> {
        Ok(MemberProfile {
            user_id: UserId::from_string(record.user_id)?,
            display_name: record.display_name,
            email: record.email,
            avatar: record.avatar,
            updated_at: record.updated_at,
        })
    }
}

/// レコードを DynamoDB AttributeValue マップに変換
pub fn to_item<R: Serialize>(
    keys: &ItemKeys,
    entity_type: EntityType,
    record: &R,
) -> Result<HashMap<String, AttributeValue>, AppError> {
    let data =
        serde_json::to_string(record).map_err(|e| AppError::Serialization(e.to_string()))?;

    let mut map = keys.primary_key();
    map.insert(
        "EntityType".to_string(),
        AttributeValue::S(entity_type.as_str().to_string()),
    );
    if let Some(gsi1_pk) = &keys.gsi1_pk {
        map.insert("GSI1PK".to_string(), AttributeValue::S(gsi1_pk.clone()));
    }
    if let Some(gsi1_sk) = &keys.gsi1_sk {
        map.insert("GSI1SK".to_string(), AttributeValue::S(gsi1_sk.clone()));
    }
    map.insert("Data".to_string(), AttributeValue::S(data));
    map.insert(
        "UpdatedAt".to_string(),
        AttributeValue::S(Utc::now().to_rfc3339()),
    );
    Ok(map)
}

/// チームアイテム（メンバー検索用の文字列セットを追加）
pub fn team_item(team: &Team) -> Result<HashMap<String, AttributeValue>, AppError> {
    let mut item = to_item(
        &ItemKeys::for_team(team),
        EntityType::Team,
        &TeamRecord::from(team),
    )?;
    item.insert(
        "Members".to_string(),
        AttributeValue::Ss(team.members.iter().map(ToString::to_string).collect()),
    );
    Ok(item)
}

/// DynamoDB AttributeValue マップからレコードを復元
pub fn from_item<R: DeserializeOwned>(
    item: &HashMap<String, AttributeValue>,
) -> Result<R, AppError> {
    let data = item
        .get("Data")
        .and_then(|v| v.as_s().ok())
        .ok_or_else(|| AppError::Deserialization("Missing Data".to_string()))?;

    serde_json::from_str(data).map_err(|e| AppError::Deserialization(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::NewTodo;

    fn uid(id: &str) -> UserId {
        UserId::from_string(id.to_string()).unwrap()
    }

    #[test]
    fn test_todo_keys_follow_scope() {
        let team_id = TeamId::new();
        let personal =
            Todo::new(&Scope::Personal(uid("u1")), uid("u1"), NewTodo::new("a")).unwrap();
        let shared =
            Todo::new(&Scope::Team(team_id.clone()), uid("u1"), NewTodo::new("b")).unwrap();

        let keys = ItemKeys::for_todo(&personal);
        assert_eq!(keys.pk, format!("TODO#{}", personal.id));
        assert_eq!(keys.gsi1_pk.as_deref(), Some("USER#u1"));

        let keys = ItemKeys::for_todo(&shared);
        assert_eq!(keys.gsi1_pk, Some(format!("TEAM#{}", team_id)));
        assert_eq!(keys.gsi1_sk, Some(format!("TODO#{}", shared.id)));
    }

    #[test]
    fn test_todo_item_conversion() {
        let todo = Todo::new(
            &Scope::Personal(uid("u1")),
            uid("u1"),
            NewTodo::new("Write docs").assigned_to(Some(uid("u2"))),
        )
        .unwrap();

        let item = to_item(
            &ItemKeys::for_todo(&todo),
            EntityType::Todo,
            &TodoRecord::from(&todo),
        )
        .unwrap();
        assert_eq!(
            item.get("EntityType").and_then(|v| v.as_s().ok()).map(String::as_str),
            Some("Todo")
        );

        let record: TodoRecord = from_item(&item).unwrap();
        assert_eq!(Todo::try_from(record).unwrap(), todo);
    }

    #[test]
    fn test_team_item_carries_member_set() {
        let team = Team::new(
            "Platform",
            uid("owner"),
            InviteCode::from_string("ABC123").unwrap(),
        )
        .unwrap();

        let item = team_item(&team).unwrap();
        assert_eq!(
            item.get("GSI1PK").and_then(|v| v.as_s().ok()).map(String::as_str),
            Some("INVITE#ABC123")
        );
        assert_eq!(
            item.get("Members").and_then(|v| v.as_ss().ok()).cloned(),
            Some(vec!["owner".to_string()])
        );

        let record: TeamRecord = from_item(&item).unwrap();
        assert_eq!(Team::try_from(record).unwrap(), team);
    }

    #[test]
    fn test_from_item_without_data() {
        let item = ItemKeys::profile_key(&uid("u1")).primary_key();
        let result: Result<ProfileRecord, _> = from_item(&item);
        assert!(matches!(result, Err(AppError::Deserialization(_))));
    }
}
