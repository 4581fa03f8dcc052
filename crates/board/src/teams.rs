use crate::confirm::Confirm;
use domain::{DomainError, InviteCode, MemberProfile, Team, TeamId, UserId};
use infrastructure::BoardStore;
use shared::AppError;
use std::sync::Arc;
use tracing::info;

/// ログイン中のユーザーによるチーム操作
///
/// 入力の検証は I/O の前に行う。権限の判定は永続化側に任せる。
pub struct TeamActions<S: BoardStore> {
    store: Arc<S>,
    actor: UserId,
}

impl<S: BoardStore> TeamActions<S> {
    pub fn new(store: Arc<S>, actor: UserId) -> Self {
        Self { store, actor }
    }

    /// 認証基盤のアカウント情報から自分のプロフィールを保存
    pub async fn sync_profile(
        &self,
        display_name: Option<&str>,
        email: Option<&str>,
        avatar: Option<String>,
    ) -> Result<MemberProfile, AppError> {
        let profile =
            MemberProfile::from_identity(self.actor.clone(), display_name, email, avatar)?;
        self.store.upsert_profile(&profile).await?;
        Ok(profile)
    }

    pub async fn my_teams(&self) -> Result<Vec<Team>, AppError> {
        self.store.list_user_teams(&self.actor).await
    }

    pub async fn create_team(&self, name: &str) -> Result<Team, AppError> {
        let name = non_empty_team_name(name)?;
        let team = self.store.create_team(name, &self.actor).await?;
        info!("チームを作成しました: id={}", team.id);
        Ok(team)
    }

    pub async fn join_team(&self, code: &str) -> Result<Team, AppError> {
        let code = InviteCode::from_string(code)?;
        let team = self.store.join_team(&code, &self.actor).await?;
        info!("チームに参加しました: id={}", team.id);
        Ok(team)
    }

    pub async fn rename_team(&self, team: &TeamId, name: &str) -> Result<Team, AppError> {
        let name = non_empty_team_name(name)?;
        self.store.rename_team(team, &self.actor, name).await
    }

    /// メンバーを外す（確認で拒否されたら何もしない）
    pub async fn remove_member(
        &self,
        team: &TeamId,
        target: &UserId,
        confirm: &dyn Confirm,
    ) -> Result<Option<Team>, AppError> {
        let prompt = if target == &self.actor {
            "Leave this team?".to_string()
        } else {
            format!("Remove {target} from this team?")
        };
        if !confirm.confirm(&prompt) {
            return Ok(None);
        }
        self.store
            .remove_member(team, &self.actor, target)
            .await
            .map(Some)
    }

    pub async fn leave_team(
        &self,
        team: &TeamId,
        confirm: &dyn Confirm,
    ) -> Result<Option<Team>, AppError> {
        let actor = self.actor.clone();
        self.remove_member(team, &actor, confirm).await
    }

    /// チームを削除（確認で拒否されたら何もしない）。カードと列は残る
    pub async fn delete_team(&self, team: &TeamId, confirm: &dyn Confirm) -> Result<bool, AppError> {
        if !confirm.confirm("Delete this team? Cards and columns are kept.") {
            return Ok(false);
        }
        self.store.delete_team(team, &self.actor).await?;
        info!("チームを削除しました: id={}", team);
        Ok(true)
    }
}

fn non_empty_team_name(name: &str) -> Result<&str, AppError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(DomainError::InvalidTeamName("Team name cannot be empty".to_string()).into());
    }
    Ok(name)
}
