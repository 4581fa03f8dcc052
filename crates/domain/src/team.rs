use crate::errors::{DomainError, DomainResult};
use crate::identifiers::{TeamId, UserId};
use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};

const INVITE_CODE_LENGTH: usize = 6;
const INVITE_CODE_ALPHABET: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// 招待コード
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InviteCode(String);

impl InviteCode {
    /// 新しい招待コードをランダムに生成
    pub fn generate<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let code = (0..INVITE_CODE_LENGTH)
            .map(|_| INVITE_CODE_ALPHABET[rng.gen_range(0..INVITE_CODE_ALPHABET.len())] as char)
            .collect();
        Self(code)
    }

    /// 入力された文字列から招待コードを作成
    pub fn from_string(code: &str) -> DomainResult<Self> {
        let code = code.trim();
        if code.is_empty() {
            return Err(DomainError::InvalidInviteCode(
                "Invite code cannot be empty".to_string(),
            ));
        }
        Ok(Self(code.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for InviteCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

fn normalize_team_name(name: &str) -> DomainResult<String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(DomainError::InvalidTeamName(
            "Team name cannot be empty".to_string(),
        ));
    }
    Ok(trimmed.to_string())
}

/// チーム
///
/// `admins ⊆ members` と「作成者は常にメンバー」を全ての操作の後で保つ。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Team {
    pub id: TeamId,
    pub name: String,
    pub created_by: UserId,
    pub members: Vec<UserId>,
    pub admins: Vec<UserId>,
    pub invite_code: InviteCode,
    pub created_at: DateTime<Utc>,
}

impl Team {
    /// 新しいチームを作成（作成者はメンバー兼管理者）
    pub fn new(name: &str, creator: UserId, invite_code: InviteCode) -> DomainResult<Self> {
        Ok(Self {
            id: TeamId::new(),
            name: normalize_team_name(name)?,
            created_by: creator.clone(),
            members: vec![creator.clone()],
            admins: vec![creator],
            invite_code,
            created_at: Utc::now(),
        })
    }

    pub fn is_member(&self, user_id: &UserId) -> bool {
        self.members.contains(user_id)
    }

    pub fn is_admin(&self, user_id: &UserId) -> bool {
        self.admins.contains(user_id)
    }

    /// 招待コードで参加
    pub fn join(&mut self, user_id: UserId) -> DomainResult<()> {
        if self.is_member(&user_id) {
            return Err(DomainError::MemberAlreadyExists(user_id.to_string()));
        }
        self.members.push(user_id);
        Ok(())
    }

    /// メンバーを削除
    ///
    /// 管理者は誰でも、一般メンバーは自分自身だけを削除できる。
    /// 削除されたメンバーは管理者からも外れる。
    pub fn remove_member(&mut self, requester: &UserId, target: &UserId) -> DomainResult<()> {
        if !self.is_member(target) {
            return Err(DomainError::MemberNotFound(target.to_string()));
        }
        if !self.is_admin(requester) && requester != target {
            return Err(DomainError::Unauthorized(
                "You don't have permission to remove this member".to_string(),
            ));
        }
        if target == &self.created_by {
            return Err(DomainError::CannotRemoveCreator);
        }

        self.members.retain(|m| m != target);
        self.admins.retain(|a| a != target);
        Ok(())
    }

    /// チーム名を変更（管理者のみ）
    pub fn rename(&mut self, requester: &UserId, new_name: &str) -> DomainResult<()> {
        if !self.is_admin(requester) {
            return Err(DomainError::Unauthorized(
                "Only admins can rename the team".to_string(),
            ));
        }
        self.name = normalize_team_name(new_name)?;
        Ok(())
    }

    /// チーム削除の権限チェック（管理者のみ）
    pub fn authorize_delete(&self, requester: &UserId) -> DomainResult<()> {
        if !self.is_admin(requester) {
            return Err(DomainError::Unauthorized(
                "Only admins can delete the team".to_string(),
            ));
        }
        Ok(())
    }

    /// 不変条件を満たしているかチェック
    pub fn invariants_hold(&self) -> bool {
        self.is_member(&self.created_by) && self.admins.iter().all(|a| self.is_member(a))
    }
}
