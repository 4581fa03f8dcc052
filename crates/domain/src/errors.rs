use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DomainError {
    #[error("Invalid identifier: {0}")]
    InvalidId(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid email: {0}")]
    InvalidEmail(String),

    #[error("Invalid team name: {0}")]
    InvalidTeamName(String),

    #[error("Invalid invite code: {0}")]
    InvalidInviteCode(String),

    #[error("Failed to generate unique invite code")]
    InviteCodeExhausted,

    // ボード関連のエラー
    #[error("Todo not found: {0}")]
    TodoNotFound(String),

    #[error("Column not found: {0}")]
    ColumnNotFound(String),

    #[error("No column available to receive new cards")]
    NoColumns,

    // チーム関連のエラー
    #[error("Team not found: {0}")]
    TeamNotFound(String),

    #[error("Duplicate member: {0} is already a member of this team")]
    MemberAlreadyExists(String),

    #[error("Member not found: {0}")]
    MemberNotFound(String),

    #[error("The team creator cannot be removed")]
    CannotRemoveCreator,

    #[error("Unauthorized operation: {0}")]
    Unauthorized(String),

    // 抽出サービス関連のエラー
    #[error("Empty transcript")]
    EmptyTranscript,

    #[error("Malformed extraction response: {0}")]
    MalformedExtraction(String),

    #[error("No tasks found in transcript")]
    NoTasksExtracted,
}

pub type DomainResult<T> = Result<T, DomainError>;
