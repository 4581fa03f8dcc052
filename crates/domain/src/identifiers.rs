use crate::errors::{DomainError, DomainResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Mutex, OnceLock};
use ulid::{Generator, Ulid};

/// プロセス内で単調増加するULIDを払い出す
///
/// 同一ミリ秒内に連続生成したIDでも生成順に並ぶため、
/// IDの辞書順がそのまま作成順になる。
fn next_ulid() -> Ulid {
    static GENERATOR: OnceLock<Mutex<Generator>> = OnceLock::new();
    let generator = GENERATOR.get_or_init(|| Mutex::new(Generator::new()));
    let mut guard = generator.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    guard.generate().unwrap_or_else(|_| Ulid::new())
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TodoId(String);

impl TodoId {
    pub fn new() -> Self {
        Self(next_ulid().to_string())
    }

    pub fn from_string(s: String) -> DomainResult<Self> {
        if s.is_empty() {
            return Err(DomainError::InvalidId("Todo ID cannot be empty".to_string()));
        }
        Ok(Self(s))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn timestamp_ms(&self) -> Option<u64> {
        Ulid::from_string(&self.0)
            .ok()
            .map(|ulid| ulid.timestamp_ms())
    }
}

impl fmt::Display for TodoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Default for TodoId {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ColumnId(String);

impl ColumnId {
    pub fn new() -> Self {
        Self(next_ulid().to_string())
    }

    pub fn from_string(s: String) -> DomainResult<Self> {
        if s.is_empty() {
            return Err(DomainError::InvalidId(
                "Column ID cannot be empty".to_string(),
            ));
        }
        Ok(Self(s))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ColumnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Default for ColumnId {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TeamId(String);

impl TeamId {
    pub fn new() -> Self {
        Self(next_ulid().to_string())
    }

    pub fn from_string(s: String) -> DomainResult<Self> {
        if s.is_empty() {
            return Err(DomainError::InvalidId("Team ID cannot be empty".to_string()));
        }
        Ok(Self(s))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TeamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Default for TeamId {
    fn default() -> Self {
        Self::new()
    }
}

/// ユーザーID
///
/// 認証基盤が払い出す値をそのまま保持するため、ULID形式は要求しない。
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    pub fn new() -> Self {
        Self(next_ulid().to_string())
    }

    pub fn from_string(s: String) -> DomainResult<Self> {
        if s.is_empty() {
            return Err(DomainError::InvalidId("User ID cannot be empty".to_string()));
        }
        Ok(Self(s))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Default for UserId {
    fn default() -> Self {
        Self::new()
    }
}

/// ボードのスコープ（個人またはチーム）
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum Scope {
    Personal(UserId),
    Team(TeamId),
}

impl Scope {
    pub fn team(&self) -> Option<&TeamId> {
        match self {
            Scope::Personal(_) => None,
            Scope::Team(team_id) => Some(team_id),
        }
    }

    pub fn is_team(&self) -> bool {
        matches!(self, Scope::Team(_))
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scope::Personal(user_id) => write!(f, "personal:{user_id}"),
            Scope::Team(team_id) => write!(f, "team:{team_id}"),
        }
    }
}
