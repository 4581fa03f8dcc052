use domain::DomainError;
use thiserror::Error;

/// アプリケーション全体で使用される包括的なエラー型
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AppError {
    // ドメインエラー
    #[error("Domain error: {0}")]
    Domain(#[from] DomainError),

    // インフラストラクチャエラー
    #[error("DynamoDB error: {0}")]
    DynamoDb(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),

    // 認可エラー
    #[error("Authorization failed: {0}")]
    Authorization(String),

    // ビジネスロジックエラー
    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    // システムエラー
    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Internal error: {0}")]
    Internal(String),

    // 外部サービスエラー
    #[error("External service error: {0}")]
    ExternalService(String),

    #[error("Malformed response from external service: {0}")]
    MalformedResponse(String),

    #[error("Network error: {0}")]
    Network(String),
}

/// エラーの分類
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// クライアントエラー（4xx相当）
    Client,
    /// サーバーエラー（5xx相当）
    Server,
    /// 一時的なエラー
    Transient,
    /// 永続的なエラー
    Permanent,
}

/// エラーの重要度
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    Info,
    Warning,
    Error,
    Critical,
}

/// 画面側での扱いを決めるエラー種別
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// 永続化呼び出しの一時的な失敗。ログに残し、画面は既知の正しい状態へ戻す
    TransientIo,
    /// 抽出サービスの応答が読めない。抽出フローを中断する
    MalformedResponse,
    /// 入力の検証エラー。I/Oの前に弾く
    Validation,
    /// 権限エラー。永続化境界で判定される
    Permission,
    /// 既に存在する（重複メンバーなど）
    Conflict,
    NotFound,
    Internal,
}

/// エラーメタデータ
#[derive(Debug, Clone)]
pub struct ErrorMetadata {
    /// エラーコード
    pub code: &'static str,
    pub category: ErrorCategory,
    pub severity: ErrorSeverity,
    pub kind: ErrorKind,
}

impl ErrorMetadata {
    fn new(
        code: &'static str,
        category: ErrorCategory,
        severity: ErrorSeverity,
        kind: ErrorKind,
    ) -> Self {
        Self {
            code,
            category,
            severity,
            kind,
        }
    }
}

fn domain_metadata(error: &DomainError) -> ErrorMetadata {
    use ErrorCategory::Client;
    use ErrorSeverity::{Info, Warning};

    match error {
        DomainError::InvalidId(_)
        | DomainError::Validation(_)
        | DomainError::InvalidEmail(_)
        | DomainError::InvalidTeamName(_)
        | DomainError::InvalidInviteCode(_)
        | DomainError::EmptyTranscript
        | DomainError::NoColumns
        | DomainError::NoTasksExtracted => {
            ErrorMetadata::new("VALIDATION_ERROR", Client, Info, ErrorKind::Validation)
        }
        DomainError::TodoNotFound(_)
        | DomainError::ColumnNotFound(_)
        | DomainError::TeamNotFound(_)
        | DomainError::MemberNotFound(_) => {
            ErrorMetadata::new("NOT_FOUND", Client, Info, ErrorKind::NotFound)
        }
        DomainError::MemberAlreadyExists(_) => {
            ErrorMetadata::new("DUPLICATE_MEMBER", Client, Info, ErrorKind::Conflict)
        }
        DomainError::Unauthorized(_) | DomainError::CannotRemoveCreator => {
            ErrorMetadata::new("PERMISSION_DENIED", Client, Warning, ErrorKind::Permission)
        }
        DomainError::MalformedExtraction(_) => ErrorMetadata::new(
            "MALFORMED_RESPONSE",
            ErrorCategory::Permanent,
            ErrorSeverity::Error,
            ErrorKind::MalformedResponse,
        ),
        DomainError::InviteCodeExhausted => ErrorMetadata::new(
            "INVITE_CODE_EXHAUSTED",
            ErrorCategory::Server,
            ErrorSeverity::Error,
            ErrorKind::Internal,
        ),
    }
}

impl AppError {
    /// エラーメタデータを取得
    pub fn metadata(&self) -> ErrorMetadata {
        use ErrorCategory::*;
        use ErrorSeverity::*;

        match self {
            AppError::Domain(error) => domain_metadata(error),
            AppError::DynamoDb(_) => {
                ErrorMetadata::new("DYNAMODB_ERROR", Transient, Error, ErrorKind::TransientIo)
            }
            AppError::ServiceUnavailable(_) => ErrorMetadata::new(
                "SERVICE_UNAVAILABLE",
                Transient,
                Error,
                ErrorKind::TransientIo,
            ),
            AppError::Network(_) => {
                ErrorMetadata::new("NETWORK_ERROR", Transient, Error, ErrorKind::TransientIo)
            }
            AppError::ExternalService(_) => ErrorMetadata::new(
                "EXTERNAL_SERVICE_ERROR",
                Transient,
                Error,
                ErrorKind::TransientIo,
            ),
            AppError::Serialization(_) | AppError::Deserialization(_) => {
                ErrorMetadata::new("SERIALIZATION_ERROR", Server, Error, ErrorKind::Internal)
            }
            AppError::Authorization(_) => {
                ErrorMetadata::new("PERMISSION_DENIED", Client, Warning, ErrorKind::Permission)
            }
            AppError::NotFound(_) => {
                ErrorMetadata::new("NOT_FOUND", Client, Info, ErrorKind::NotFound)
            }
            AppError::Validation(_) => {
                ErrorMetadata::new("VALIDATION_ERROR", Client, Info, ErrorKind::Validation)
            }
            AppError::MalformedResponse(_) => ErrorMetadata::new(
                "MALFORMED_RESPONSE",
                Permanent,
                Error,
                ErrorKind::MalformedResponse,
            ),
            AppError::Configuration(_) => {
                ErrorMetadata::new("CONFIGURATION_ERROR", Server, Critical, ErrorKind::Internal)
            }
            AppError::Internal(_) => {
                ErrorMetadata::new("INTERNAL_ERROR", Server, Critical, ErrorKind::Internal)
            }
        }
    }

    pub fn kind(&self) -> ErrorKind {
        self.metadata().kind
    }

    /// 一時的なI/O失敗かどうか
    pub fn is_transient(&self) -> bool {
        self.kind() == ErrorKind::TransientIo
    }

    /// HTTPステータスコードを取得
    pub fn http_status_code(&self) -> u16 {
        match self.kind() {
            ErrorKind::Validation => 400,
            ErrorKind::Permission => 403,
            ErrorKind::NotFound => 404,
            ErrorKind::Conflict => 409,
            ErrorKind::TransientIo => match self {
                AppError::ExternalService(_) => 502,
                _ => 503,
            },
            ErrorKind::MalformedResponse | ErrorKind::Internal => 500,
        }
    }

    /// ユーザー向けメッセージを取得
    pub fn user_message(&self) -> String {
        match self {
            AppError::Domain(error) => match error {
                DomainError::EmptyTranscript => "Paste a meeting transcript first".to_string(),
                DomainError::NoTasksExtracted => {
                    "No action items were found in the transcript".to_string()
                }
                DomainError::NoColumns => "Create a column before adding tasks".to_string(),
                DomainError::MalformedExtraction(_) => "Failed to parse AI response".to_string(),
                other => other.to_string(),
            },
            AppError::MalformedResponse(_) => "Failed to parse AI response".to_string(),
            AppError::Authorization(message) | AppError::Validation(message) => message.clone(),
            AppError::NotFound(_) => "The requested item was not found".to_string(),
            AppError::ExternalService(_) | AppError::Network(_) => {
                "Failed to reach the AI service".to_string()
            }
            AppError::DynamoDb(_) | AppError::ServiceUnavailable(_) => {
                "The service is temporarily unavailable".to_string()
            }
            _ => "An unexpected error occurred".to_string(),
        }
    }
}
