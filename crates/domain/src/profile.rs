use crate::errors::{DomainError, DomainResult};
use crate::identifiers::UserId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::ops::Deref;

/// メンバーのプロフィール
///
/// 表示と名前照合にのみ使い、カードや列のデータを直接変更することはない。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemberProfile {
    pub user_id: UserId,
    pub display_name: String,
    pub email: String,
    pub avatar: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl MemberProfile {
    pub fn new(user_id: UserId, display_name: &str, email: &str) -> DomainResult<Self> {
        if !email.is_empty() && !email.contains('@') {
            return Err(DomainError::InvalidEmail(email.to_string()));
        }

        Ok(Self {
            user_id,
            display_name: display_name.trim().to_string(),
            email: email.to_string(),
            avatar: None,
            updated_at: Utc::now(),
        })
    }

    /// 認証基盤のアカウント情報からプロフィールを作成
    ///
    /// 表示名がない場合はメールアドレスの `@` より前、それもなければ "Anonymous"。
    pub fn from_identity(
        user_id: UserId,
        display_name: Option<&str>,
        email: Option<&str>,
        avatar: Option<String>,
    ) -> DomainResult<Self> {
        let email = email.unwrap_or_default();
        let display_name = display_name
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .or_else(|| {
                email
                    .split('@')
                    .next()
                    .filter(|local| !local.is_empty())
                    .map(str::to_string)
            })
            .unwrap_or_else(|| "Anonymous".to_string());

        let mut profile = Self::new(user_id, &display_name, email)?;
        profile.avatar = avatar;
        Ok(profile)
    }

    /// メールアドレスの `@` より前の部分
    pub fn email_local_part(&self) -> &str {
        self.email.split('@').next().unwrap_or_default()
    }

    /// 表示名の最初の空白区切りトークン
    pub fn first_token(&self) -> &str {
        self.display_name.split_whitespace().next().unwrap_or_default()
    }
}

/// チームメンバーの名簿
///
/// ボード読み込み時に一度取得し、セッション中は読み取り専用。
/// 照合の同順位はユーザーIDの昇順で先に来るメンバーが勝つよう、
/// 構築時にユーザーID順へ並べ替える。
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Roster(Vec<MemberProfile>);

impl Roster {
    pub fn new(mut profiles: Vec<MemberProfile>) -> Self {
        profiles.sort_by(|a, b| a.user_id.cmp(&b.user_id));
        profiles.dedup_by(|a, b| a.user_id == b.user_id);
        Self(profiles)
    }

    pub fn find(&self, user_id: &UserId) -> Option<&MemberProfile> {
        self.0.iter().find(|m| &m.user_id == user_id)
    }

    pub fn contains(&self, user_id: &UserId) -> bool {
        self.find(user_id).is_some()
    }

    pub fn display_name(&self, user_id: &UserId) -> Option<&str> {
        self.find(user_id).map(|m| m.display_name.as_str())
    }
}

impl Deref for Roster {
    type Target = [MemberProfile];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}
