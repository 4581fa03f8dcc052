use crate::errors::{AppError, ErrorKind};
use lambda_runtime::Context;
use tracing::{error, info, warn};

/// Lambda 呼び出し1回分の識別情報
#[derive(Debug)]
pub struct Invocation {
    pub handler: &'static str,
    pub function_name: String,
    pub request_id: String,
    pub trace_id: Option<String>,
}

impl Invocation {
    pub fn new(handler: &'static str, context: &Context) -> Self {
        Self {
            handler,
            function_name: context.env_config.function_name.clone(),
            request_id: context.request_id.clone(),
            trace_id: context.xray_trace_id.clone(),
        }
    }

    /// 呼び出し全体を包むスパン
    pub fn span(&self) -> tracing::Span {
        tracing::info_span!(
            "invocation",
            handler = self.handler,
            function_name = %self.function_name,
            request_id = %self.request_id,
            trace_id = %self.trace_id.as_deref().unwrap_or("none")
        )
    }
}

/// ハンドラー本体を呼び出しスパンの中で実行する
///
/// `$handler_fn` は `(event, context)` を受け取る非同期クロージャ。
#[macro_export]
macro_rules! trace_lambda_handler {
    ($handler_name:expr, $event:expr, $context:expr, $handler_fn:expr) => {{
        let invocation = $crate::telemetry::Invocation::new($handler_name, &$context);
        let span = invocation.span();
        span.in_scope(|| ::tracing::debug!("呼び出し開始"));

        let result =
            ::tracing::Instrument::instrument($handler_fn($event, $context), span.clone()).await;
        if let Err(e) = &result {
            span.in_scope(|| ::tracing::error!(error = %e, "ハンドラーがエラーを返しました"));
        }
        result
    }};
}

/// 永続化操作をトレース
///
/// 失敗はログに残して呼び出し元へそのまま返す。再試行はしない。
pub async fn trace_store_operation<T, F, Fut>(
    scope: &str,
    operation_name: &str,
    operation: F,
) -> Result<T, AppError>
where
    F: FnOnce() -> Fut,
    Fut: std::future::Future<Output = Result<T, AppError>>,
{
    let start_time = std::time::Instant::now();
    let result = operation().await;
    let duration = start_time.elapsed();

    match &result {
        Ok(_) => {
            info!(
                scope = scope,
                operation = operation_name,
                duration_ms = duration.as_millis(),
                "永続化操作完了"
            );
        }
        Err(e) => {
            let metadata = e.metadata();
            error!(
                scope = scope,
                operation = operation_name,
                duration_ms = duration.as_millis(),
                error_code = metadata.code,
                error = %e,
                "永続化操作失敗"
            );
        }
    }

    result
}

/// API リクエストの結果を記録する
///
/// 失敗の原因が分かっていればエラーコードと種別も残す。
/// 5xx は error、4xx は warn、それ以外は info。
pub fn record_request_outcome(route: &str, status_code: u16, cause: Option<&AppError>) {
    let metadata = cause.map(AppError::metadata);
    let error_code = metadata.as_ref().map(|m| m.code).unwrap_or("none");
    let error_kind = metadata
        .as_ref()
        .map(|m| kind_label(m.kind))
        .unwrap_or("none");

    match outcome_level(status_code) {
        OutcomeLevel::Failed => error!(
            route,
            status_code,
            error_code,
            error_kind,
            error = %cause.map(ToString::to_string).unwrap_or_default(),
            "リクエスト失敗"
        ),
        OutcomeLevel::Rejected => warn!(
            route,
            status_code,
            error_code,
            error_kind,
            "リクエストを拒否"
        ),
        OutcomeLevel::Completed => info!(route, status_code, "リクエスト完了"),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OutcomeLevel {
    Completed,
    Rejected,
    Failed,
}

fn outcome_level(status_code: u16) -> OutcomeLevel {
    match status_code {
        500..=u16::MAX => OutcomeLevel::Failed,
        400..=499 => OutcomeLevel::Rejected,
        _ => OutcomeLevel::Completed,
    }
}

fn kind_label(kind: ErrorKind) -> &'static str {
    match kind {
        ErrorKind::TransientIo => "transient_io",
        ErrorKind::MalformedResponse => "malformed_response",
        ErrorKind::Validation => "validation",
        ErrorKind::Permission => "permission",
        ErrorKind::Conflict => "conflict",
        ErrorKind::NotFound => "not_found",
        ErrorKind::Internal => "internal",
    }
}
