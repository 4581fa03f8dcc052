use crate::dynamodb::DynamoDbClient;
use crate::models::{
    from_item, invite_key, scope_key, team_item, to_item, ColumnRecord, EntityType, ItemKeys,
    ProfileRecord, TeamRecord, TodoRecord, GSI1_NAME,
};
use crate::store::{
    allocate_invite_code, build_todo_batch, random_invite_code, sort_todos, BoardStore,
};
use async_trait::async_trait;
use aws_sdk_dynamodb::types::AttributeValue;
use domain::{
    sort_columns, Column, ColumnId, ColumnPatch, DomainError, InviteCode, MemberProfile, NewTodo,
    Scope, Team, TeamId, Todo, TodoId, TodoPatch, UserId,
};
use futures::future::try_join_all;
use shared::AppError;
use std::collections::HashMap;
use tracing::{debug, error, info};

type Item = HashMap<String, AttributeValue>;

/// DynamoDB（Single Table Design）による永続化実装
///
/// 更新は読み取り→適用→条件付き書き込みで行う。バージョンによる競合検出は
/// 行わないので、同じカードへの更新が重なった場合は後に完了した方が残る。
#[derive(Clone)]
pub struct DynamoDbStore {
    db: DynamoDbClient,
}

impl DynamoDbStore {
    pub fn new(db: DynamoDbClient) -> Self {
        Self { db }
    }

    async fn get(&self, keys: &ItemKeys) -> Result<Option<Item>, AppError> {
        let result = self
            .db
            .client()
            .get_item()
            .table_name(self.db.table_name())
            .set_key(Some(keys.primary_key()))
            .send()
            .await
            .map_err(|e| self.db.convert_error(e))?;
        Ok(result.item)
    }

    async fn put(&self, item: Item) -> Result<(), AppError> {
        self.db
            .client()
            .put_item()
            .table_name(self.db.table_name())
            .set_item(Some(item))
            .send()
            .await
            .map_err(|e| self.db.convert_error(e))?;
        Ok(())
    }

    /// 既存アイテムの置き換え（その間に削除されていれば NotFound）
    async fn replace(&self, item: Item, what: &str) -> Result<(), AppError> {
        self.db
            .client()
            .put_item()
            .table_name(self.db.table_name())
            .set_item(Some(item))
            .condition_expression("attribute_exists(PK)")
            .send()
            .await
            .map_err(|e| {
                let missing = e
                    .as_service_error()
                    .map(|se| se.is_conditional_check_failed_exception())
                    .unwrap_or(false);
                if missing {
                    AppError::NotFound(what.to_string())
                } else {
                    self.db.convert_error(e)
                }
            })?;
        Ok(())
    }

    async fn delete(&self, keys: &ItemKeys) -> Result<(), AppError> {
        self.db
            .client()
            .delete_item()
            .table_name(self.db.table_name())
            .set_key(Some(keys.primary_key()))
            .send()
            .await
            .map_err(|e| self.db.convert_error(e))?;
        Ok(())
    }

    /// GSI1 のパーティションを前方一致で全件取得（ページング込み）
    async fn query_gsi1(&self, partition: &str, prefix: &str) -> Result<Vec<Item>, AppError> {
        let mut items = Vec::new();
        let mut start_key: Option<Item> = None;

        loop {
            let result = self
                .db
                .client()
                .query()
                .table_name(self.db.table_name())
                .index_name(GSI1_NAME)
                .key_condition_expression("GSI1PK = :pk AND begins_with(GSI1SK, :sk)")
                .expression_attribute_values(":pk", AttributeValue::S(partition.to_string()))
                .expression_attribute_values(":sk", AttributeValue::S(prefix.to_string()))
                .set_exclusive_start_key(start_key.take())
                .send()
                .await
                .map_err(|e| self.db.convert_error(e))?;

            items.extend(result.items.unwrap_or_default());
            match result.last_evaluated_key {
                Some(key) if !key.is_empty() => start_key = Some(key),
                _ => break,
            }
        }

        Ok(items)
    }

    async fn load_todo(&self, id: &TodoId) -> Result<Todo, AppError> {
        let item = self
            .get(&ItemKeys::todo_key(id))
            .await?
            .ok_or_else(|| DomainError::TodoNotFound(id.to_string()))?;
        Ok(Todo::try_from(from_item::<TodoRecord>(&item)?)?)
    }

    async fn save_todo(&self, todo: &Todo) -> Result<(), AppError> {
        self.put(to_item(
            &ItemKeys::for_todo(todo),
            EntityType::Todo,
            &TodoRecord::from(todo),
        )?)
        .await
    }

    async fn save_column(&self, column: &Column) -> Result<(), AppError> {
        self.put(to_item(
            &ItemKeys::for_column(column),
            EntityType::Column,
            &ColumnRecord::from(column),
        )?)
        .await
    }

    async fn load_team(&self, id: &TeamId) -> Result<Team, AppError> {
        self.get_team(id)
            .await?
            .ok_or_else(|| DomainError::TeamNotFound(id.to_string()).into())
    }

    async fn find_team_by_invite(&self, code: &InviteCode) -> Result<Option<Team>, AppError> {
        let items = self.query_gsi1(&invite_key(code), "TEAM#").await?;
        items
            .first()
            .map(|item| -> Result<Team, AppError> {
                Ok(Team::try_from(from_item::<TeamRecord>(item)?)?)
            })
            .transpose()
    }

    async fn save_team(&self, team: &Team) -> Result<(), AppError> {
        self.replace(team_item(team)?, &format!("team {}", team.id))
            .await
    }
}

/// 読めないレコードはログに残して読み飛ばす
fn decode_all<R, T>(items: &[Item], kind: &str) -> Vec<T>
where
    R: serde::de::DeserializeOwned,
    T: TryFrom<R, Error = DomainError>,
{
    items
        .iter()
        .filter_map(|item| {
            let decoded = from_item::<R>(item)
                .and_then(|record| T::try_from(record).map_err(AppError::from));
            match decoded {
                Ok(value) => Some(value),
                Err(e) => {
                    error!("{}のデシリアライゼーションエラー: {}", kind, e);
                    None
                }
            }
        })
        .collect()
}

#[async_trait]
impl BoardStore for DynamoDbStore {
    async fn list_columns(&self, scope: &Scope) -> Result<Vec<Column>, AppError> {
        info!("列一覧を取得中: scope={}", scope);
        let items = self.query_gsi1(&scope_key(scope), "COLUMN#").await?;
        let mut columns: Vec<Column> = decode_all::<ColumnRecord, _>(&items, "列");

        if columns.is_empty() {
            info!("既定の列を作成: scope={}", scope);
            columns = Column::defaults(scope);
            for column in &columns {
                self.save_column(column).await?;
            }
        }

        sort_columns(&mut columns);
        debug!("列一覧取得完了: {} 件", columns.len());
        Ok(columns)
    }

    async fn list_todos(&self, scope: &Scope) -> Result<Vec<Todo>, AppError> {
        info!("カード一覧を取得中: scope={}", scope);
        let items = self.query_gsi1(&scope_key(scope), "TODO#").await?;
        let mut todos: Vec<Todo> = decode_all::<TodoRecord, _>(&items, "カード");
        sort_todos(&mut todos);
        debug!("カード一覧取得完了: {} 件", todos.len());
        Ok(todos)
    }

    async fn create_column(
        &self,
        scope: &Scope,
        name: &str,
        order: i64,
    ) -> Result<ColumnId, AppError> {
        let column = Column::new(scope, name, order)?;
        info!("列を作成中: id={}, scope={}", column.id, scope);
        self.save_column(&column).await?;
        Ok(column.id)
    }

    async fn update_column(&self, id: &ColumnId, patch: ColumnPatch) -> Result<(), AppError> {
        debug!("列を更新中: id={}", id);
        let item = self
            .get(&ItemKeys::column_key(id))
            .await?
            .ok_or_else(|| DomainError::ColumnNotFound(id.to_string()))?;
        let mut column = Column::try_from(from_item::<ColumnRecord>(&item)?)?;
        column.apply(patch)?;

        self.replace(
            to_item(
                &ItemKeys::for_column(&column),
                EntityType::Column,
                &ColumnRecord::from(&column),
            )?,
            &format!("column {}", id),
        )
        .await
    }

    async fn delete_column(&self, id: &ColumnId) -> Result<(), AppError> {
        info!("列を削除中: id={}", id);
        self.delete(&ItemKeys::column_key(id)).await
    }

    async fn create_todo(
        &self,
        scope: &Scope,
        owner: &UserId,
        draft: NewTodo,
    ) -> Result<TodoId, AppError> {
        let todo = Todo::new(scope, owner.clone(), draft)?;
        info!("カードを作成中: id={}, scope={}", todo.id, scope);
        self.save_todo(&todo).await?;
        Ok(todo.id)
    }

    async fn create_todo_batch(
        &self,
        scope: &Scope,
        owner: &UserId,
        drafts: Vec<NewTodo>,
        default_status: &ColumnId,
    ) -> Result<Vec<TodoId>, AppError> {
        let todos = build_todo_batch(scope, owner, drafts, default_status)?;

        info!("カードを一括作成中: {} 件, scope={}", todos.len(), scope);
        // 作成順を保つため1件ずつ書き込む
        for todo in &todos {
            self.save_todo(todo).await?;
        }
        Ok(todos.into_iter().map(|t| t.id).collect())
    }

    async fn update_todo(&self, id: &TodoId, patch: TodoPatch) -> Result<(), AppError> {
        debug!("カードを更新中: id={}", id);
        let mut todo = self.load_todo(id).await?;
        todo.apply(patch)?;

        self.replace(
            to_item(
                &ItemKeys::for_todo(&todo),
                EntityType::Todo,
                &TodoRecord::from(&todo),
            )?,
            &format!("todo {}", id),
        )
        .await
    }

    async fn delete_todo(&self, id: &TodoId) -> Result<(), AppError> {
        info!("カードを削除中: id={}", id);
        self.delete(&ItemKeys::todo_key(id)).await
    }

    async fn get_team(&self, id: &TeamId) -> Result<Option<Team>, AppError> {
        self.get(&ItemKeys::team_key(id))
            .await?
            .map(|item| -> Result<Team, AppError> {
                Ok(Team::try_from(from_item::<TeamRecord>(&item)?)?)
            })
            .transpose()
    }

    async fn create_team(&self, name: &str, creator: &UserId) -> Result<Team, AppError> {
        let code = allocate_invite_code(random_invite_code, |candidate| async move {
            Ok::<_, AppError>(self.find_team_by_invite(&candidate).await?.is_some())
        })
        .await?;

        let team = Team::new(name, creator.clone(), code)?;
        info!("チームを作成中: id={}, creator={}", team.id, creator);
        self.put(team_item(&team)?).await?;
        Ok(team)
    }

    async fn join_team(&self, code: &InviteCode, user: &UserId) -> Result<Team, AppError> {
        info!("チームに参加中: user={}", user);
        let mut team = self
            .find_team_by_invite(code)
            .await?
            .ok_or_else(|| DomainError::InvalidInviteCode("Invalid invite code".to_string()))?;
        team.join(user.clone())?;
        self.save_team(&team).await?;
        Ok(team)
    }

    async fn remove_member(
        &self,
        team: &TeamId,
        requester: &UserId,
        target: &UserId,
    ) -> Result<Team, AppError> {
        info!(
            "メンバーを削除中: team={}, requester={}, target={}",
            team, requester, target
        );
        let mut team = self.load_team(team).await?;
        team.remove_member(requester, target)?;
        self.save_team(&team).await?;
        Ok(team)
    }

    async fn rename_team(
        &self,
        team: &TeamId,
        requester: &UserId,
        name: &str,
    ) -> Result<Team, AppError> {
        info!("チーム名を変更中: team={}", team);
        let mut team = self.load_team(team).await?;
        team.rename(requester, name)?;
        self.save_team(&team).await?;
        Ok(team)
    }

    async fn delete_team(&self, team: &TeamId, requester: &UserId) -> Result<(), AppError> {
        info!("チームを削除中: team={}", team);
        self.load_team(team).await?.authorize_delete(requester)?;
        self.delete(&ItemKeys::team_key(team)).await
    }

    async fn list_user_teams(&self, user: &UserId) -> Result<Vec<Team>, AppError> {
        info!("所属チームを取得中: user={}", user);
        let mut items = Vec::new();
        let mut start_key: Option<Item> = None;

        loop {
            let result = self
                .db
                .client()
                .scan()
                .table_name(self.db.table_name())
                .filter_expression("EntityType = :entity_type AND contains(Members, :user)")
                .expression_attribute_values(
                    ":entity_type",
                    AttributeValue::S(EntityType::Team.as_str().to_string()),
                )
                .expression_attribute_values(":user", AttributeValue::S(user.to_string()))
                .set_exclusive_start_key(start_key.take())
                .send()
                .await
                .map_err(|e| self.db.convert_error(e))?;

            items.extend(result.items.unwrap_or_default());
            match result.last_evaluated_key {
                Some(key) if !key.is_empty() => start_key = Some(key),
                _ => break,
            }
        }

        let teams = decode_all::<TeamRecord, _>(&items, "チーム");
        debug!("所属チーム取得完了: {} 件", teams.len());
        Ok(teams)
    }

    async fn upsert_profile(&self, profile: &MemberProfile) -> Result<(), AppError> {
        debug!("プロフィールを保存中: user={}", profile.user_id);
        self.put(to_item(
            &ItemKeys::profile_key(&profile.user_id),
            EntityType::Profile,
            &ProfileRecord::from(profile),
        )?)
        .await
    }

    async fn get_profile(&self, user: &UserId) -> Result<Option<MemberProfile>, AppError> {
        self.get(&ItemKeys::profile_key(user))
            .await?
            .map(|item| -> Result<MemberProfile, AppError> {
                Ok(MemberProfile::try_from(from_item::<ProfileRecord>(&item)?)?)
            })
            .transpose()
    }

    async fn list_profiles(&self, users: &[UserId]) -> Result<Vec<MemberProfile>, AppError> {
        let profiles = try_join_all(users.iter().map(|user| self.get_profile(user))).await?;
        Ok(profiles.into_iter().flatten().collect())
    }
}
