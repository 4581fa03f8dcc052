use domain::{resolve, ExtractedTask, MemberProfile, UserId};
use infrastructure::{LlmClient, LlmTaskExtractor, TaskExtractor};
use lambda_runtime::{run, service_fn, Error, LambdaEvent};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use shared::{
    telemetry::record_request_outcome, trace_lambda_handler, tracing::init_tracing, AppError,
    ErrorKind,
};
use std::collections::HashMap;
use tracing::{info, warn};

const PARSE_TRANSCRIPT_PATH: &str = "/parse-transcript";

/// API Gateway プロキシリクエスト構造体
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiGatewayProxyRequest {
    http_method: String,
    path: String,
    body: Option<String>,
}

/// API Gateway プロキシレスポンス構造体
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ApiGatewayProxyResponse {
    status_code: u16,
    headers: HashMap<String, String>,
    body: String,
}

/// 名簿の1人分
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TeamMember {
    uid: String,
    #[serde(default)]
    display_name: String,
    #[serde(default)]
    email: String,
}

/// 議事録解析リクエスト
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ParseTranscriptRequest {
    #[serde(default)]
    transcript: String,
    #[serde(default)]
    team_members: Vec<TeamMember>,
}

/// 解析結果のタスク
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ParsedTask {
    title: String,
    assigned_to: Option<String>,
    assignee_name: Option<String>,
    confidence: f64,
}

/// 議事録解析ハンドラーのメイン関数
async fn function_handler(
    event: LambdaEvent<ApiGatewayProxyRequest>,
) -> Result<ApiGatewayProxyResponse, Error> {
    let (payload, context) = event.into_parts();

    trace_lambda_handler!(
        "transcript-handler",
        payload,
        context,
        |payload: ApiGatewayProxyRequest, _context| async move {
            info!(
                "TranscriptHandler開始: method={}, path={}",
                payload.http_method, payload.path
            );

            let response = handle_request(&payload, extractor_from_env).await;
            Ok::<_, Error>(response)
        }
    )
}

/// 環境変数の設定から抽出サービスを作成
fn extractor_from_env() -> Result<Box<dyn TaskExtractor>, AppError> {
    let config = shared::Config::from_env()?;
    let client = LlmClient::from_config(&config)?;
    info!("抽出サービス: model={}", client.model());
    Ok(Box::new(LlmTaskExtractor::new(client)))
}

/// 失敗したリクエストの応答内容と原因
#[derive(Debug)]
struct RequestFailure {
    status_code: u16,
    message: String,
    cause: Option<AppError>,
}

impl RequestFailure {
    fn new(status_code: u16, message: impl Into<String>) -> Self {
        Self {
            status_code,
            message: message.into(),
            cause: None,
        }
    }

    fn caused_by(mut self, cause: AppError) -> Self {
        self.cause = Some(cause);
        self
    }
}

/// リクエストを処理して応答を作成し、結果をログに残す
async fn handle_request<F>(
    request: &ApiGatewayProxyRequest,
    make_extractor: F,
) -> ApiGatewayProxyResponse
where
    F: FnOnce() -> Result<Box<dyn TaskExtractor>, AppError>,
{
    let route = format!("{} {}", request.http_method, request.path);
    match process_request(request, make_extractor).await {
        Ok(body) => {
            record_request_outcome(&route, 200, None);
            create_success_response(200, body)
        }
        Err(failure) => {
            record_request_outcome(&route, failure.status_code, failure.cause.as_ref());
            create_error_response(failure.status_code, &failure.message)
        }
    }
}

/// 議事録からタスクを抽出する
///
/// 抽出サービスは入力の検証が済んでから作成する。
async fn process_request<F>(
    request: &ApiGatewayProxyRequest,
    make_extractor: F,
) -> Result<Value, RequestFailure>
where
    F: FnOnce() -> Result<Box<dyn TaskExtractor>, AppError>,
{
    match (request.http_method.as_str(), request.path.as_str()) {
        ("POST", PARSE_TRANSCRIPT_PATH) => {}
        (_, PARSE_TRANSCRIPT_PATH) => return Err(RequestFailure::new(405, "Method not allowed")),
        _ => return Err(RequestFailure::new(404, "Not found")),
    }

    let parsed = parse_body(request)
        .map_err(|e| RequestFailure::new(400, "Invalid request body").caused_by(e))?;

    if parsed.transcript.trim().is_empty() {
        return Err(RequestFailure::new(400, "Transcript is required")
            .caused_by(AppError::from(domain::DomainError::EmptyTranscript)));
    }

    let extractor = make_extractor().map_err(|e| {
        let message = match &e {
            AppError::Configuration(_) => "LLM API key not configured".to_string(),
            other => other.user_message(),
        };
        RequestFailure::new(500, message).caused_by(e)
    })?;

    let roster = build_roster(&parsed.team_members);
    let tasks = extractor
        .extract(&parsed.transcript, &roster)
        .await
        .map_err(|e| {
            let status = match e.kind() {
                ErrorKind::MalformedResponse => 500,
                _ => e.http_status_code(),
            };
            RequestFailure::new(status, e.user_message()).caused_by(e)
        })?;

    info!("タスクを抽出しました: {} 件", tasks.len());
    let tasks: Vec<ParsedTask> = tasks
        .into_iter()
        .map(|task| to_parsed_task(task, &roster))
        .collect();
    Ok(json!({ "success": true, "tasks": tasks }))
}

fn parse_body(request: &ApiGatewayProxyRequest) -> Result<ParseTranscriptRequest, AppError> {
    let body = request
        .body
        .as_deref()
        .ok_or_else(|| AppError::Validation("リクエストボディが必要です".to_string()))?;
    serde_json::from_str(body)
        .map_err(|e| AppError::Deserialization(format!("JSONパースエラー: {e}")))
}

/// リクエストの名簿をプロフィールに変換する
///
/// 並びはリクエストのまま保つ（同点時は先に書かれたメンバーが選ばれる）。
/// 読めないエントリはログに残して読み飛ばす。
fn build_roster(members: &[TeamMember]) -> Vec<MemberProfile> {
    members
        .iter()
        .filter_map(|member| {
            let profile = UserId::from_string(member.uid.clone())
                .and_then(|uid| MemberProfile::new(uid, &member.display_name, &member.email));
            match profile {
                Ok(profile) => Some(profile),
                Err(e) => {
                    warn!("名簿のエントリを読み飛ばします: uid={}, error={}", member.uid, e);
                    None
                }
            }
        })
        .collect()
}

fn to_parsed_task(task: ExtractedTask, roster: &[MemberProfile]) -> ParsedTask {
    let assigned_to = task
        .assignee_name
        .as_deref()
        .and_then(|name| resolve(name, roster))
        .map(|member| member.user_id.to_string());

    ParsedTask {
        title: task.title,
        assigned_to,
        assignee_name: task.assignee_name,
        confidence: task.confidence,
    }
}

/// エラーレスポンスを作成
fn create_error_response(status_code: u16, message: &str) -> ApiGatewayProxyResponse {
    create_success_response(
        status_code,
        json!({
            "success": false,
            "error": message
        }),
    )
}

fn create_success_response(status_code: u16, body: Value) -> ApiGatewayProxyResponse {
    let mut headers = HashMap::new();
    headers.insert("Content-Type".to_string(), "application/json".to_string());
    headers.insert("Access-Control-Allow-Origin".to_string(), "*".to_string());
    headers.insert(
        "Access-Control-Allow-Headers".to_string(),
        "Content-Type,Authorization".to_string(),
    );

    ApiGatewayProxyResponse {
        status_code,
        headers,
        body: body.to_string(),
    }
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    if let Err(e) = init_tracing() {
        eprintln!("トレーシング初期化エラー: {e}");
    }

    run(service_fn(function_handler)).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use domain::parse_extraction_response;

    struct CannedExtractor(&'static str);

    #[async_trait]
    impl TaskExtractor for CannedExtractor {
        async fn extract(
            &self,
            _transcript: &str,
            _roster: &[MemberProfile],
        ) -> Result<Vec<ExtractedTask>, AppError> {
            Ok(parse_extraction_response(self.0)?)
        }
    }

    fn canned(response: &'static str) -> impl FnOnce() -> Result<Box<dyn TaskExtractor>, AppError> {
        move || Ok(Box::new(CannedExtractor(response)) as Box<dyn TaskExtractor>)
    }

    fn unreachable_extractor() -> Result<Box<dyn TaskExtractor>, AppError> {
        panic!("extractor must not be created")
    }

    fn request(method: &str, path: &str, body: Option<Value>) -> ApiGatewayProxyRequest {
        ApiGatewayProxyRequest {
            http_method: method.to_string(),
            path: path.to_string(),
            body: body.map(|b| b.to_string()),
        }
    }

    fn body_of(response: &ApiGatewayProxyResponse) -> Value {
        serde_json::from_str(&response.body).unwrap()
    }

    fn transcript_body(transcript: &str) -> Value {
        json!({
            "transcript": transcript,
            "teamMembers": [
                {"uid": "u1", "displayName": "Kim Cheolsu", "email": "cs@x.com"},
                {"uid": "u2", "displayName": "Cheolsu Park", "email": "park@x.com"}
            ]
        })
    }

    #[tokio::test]
    async fn test_successful_parse_resolves_assignees() {
        let req = request(
            "POST",
            "/parse-transcript",
            Some(transcript_body("Cheolsu sets up CI. cs drafts the memo.")),
        );
        let response = handle_request(
            &req,
            canned(
                r#"```json
                [
                    {"title": "Set up CI", "assigneeName": "Cheolsu", "confidence": 0.9},
                    {"title": "Draft the memo", "assigneeName": "cs"},
                    {"title": "Book a room", "assigneeName": null, "confidence": 0.3}
                ]
                ```"#,
            ),
        )
        .await;

        assert_eq!(response.status_code, 200);
        let body = body_of(&response);
        assert_eq!(body["success"], true);

        let tasks = body["tasks"].as_array().unwrap();
        assert_eq!(tasks.len(), 3);
        assert_eq!(tasks[0]["assignedTo"], "u2");
        assert_eq!(tasks[0]["assigneeName"], "Cheolsu");
        assert_eq!(tasks[1]["assignedTo"], "u1");
        assert_eq!(tasks[1]["confidence"], 0.5);
        assert_eq!(tasks[2]["assignedTo"], Value::Null);
        assert_eq!(tasks[2]["assigneeName"], Value::Null);
    }

    #[tokio::test]
    async fn test_empty_transcript_is_rejected() {
        let req = request("POST", "/parse-transcript", Some(transcript_body("   ")));
        let response = handle_request(&req, unreachable_extractor).await;

        assert_eq!(response.status_code, 400);
        let body = body_of(&response);
        assert_eq!(body["success"], false);
        assert_eq!(body["error"], "Transcript is required");

        let missing = request("POST", "/parse-transcript", Some(json!({"teamMembers": []})));
        assert_eq!(handle_request(&missing, unreachable_extractor).await.status_code, 400);
    }

    #[tokio::test]
    async fn test_missing_api_key_is_a_server_error() {
        let req = request("POST", "/parse-transcript", Some(transcript_body("Ship it.")));
        let response = handle_request(&req, || {
            Err(AppError::Configuration("LLM_API_KEY is not configured".to_string()))
        })
        .await;

        assert_eq!(response.status_code, 500);
        assert_eq!(body_of(&response)["error"], "LLM API key not configured");
    }

    #[tokio::test]
    async fn test_unparseable_model_output() {
        let req = request("POST", "/parse-transcript", Some(transcript_body("Ship it.")));
        let response = handle_request(&req, canned("I could not find any tasks.")).await;

        assert_eq!(response.status_code, 500);
        let body = body_of(&response);
        assert_eq!(body["success"], false);
        assert_eq!(body["error"], "Failed to parse AI response");
    }

    #[tokio::test]
    async fn test_routing() {
        let get = request("GET", "/parse-transcript", None);
        assert_eq!(handle_request(&get, unreachable_extractor).await.status_code, 405);

        let other = request("POST", "/somewhere-else", None);
        assert_eq!(handle_request(&other, unreachable_extractor).await.status_code, 404);

        let garbage = ApiGatewayProxyRequest {
            http_method: "POST".to_string(),
            path: "/parse-transcript".to_string(),
            body: Some("{not json".to_string()),
        };
        assert_eq!(handle_request(&garbage, unreachable_extractor).await.status_code, 400);
    }

    #[tokio::test]
    async fn test_failures_carry_their_cause() {
        let req = request("POST", "/parse-transcript", Some(transcript_body("Ship it.")));
        let failure = process_request(&req, canned("no json here")).await.unwrap_err();
        assert_eq!(failure.status_code, 500);
        assert_eq!(
            failure.cause.as_ref().map(AppError::kind),
            Some(ErrorKind::MalformedResponse)
        );

        let req = request("POST", "/parse-transcript", Some(transcript_body("Ship it.")));
        let failure = process_request(&req, || {
            Err(AppError::Configuration("LLM_API_KEY is not configured".to_string()))
        })
        .await
        .unwrap_err();
        assert_eq!(failure.message, "LLM API key not configured");
        assert!(matches!(failure.cause, Some(AppError::Configuration(_))));

        let get = request("GET", "/parse-transcript", None);
        let failure = process_request(&get, unreachable_extractor).await.unwrap_err();
        assert_eq!(failure.status_code, 405);
        assert!(failure.cause.is_none());
    }

    #[test]
    fn test_build_roster_skips_bad_entries_and_keeps_order() {
        let members = vec![
            TeamMember {
                uid: "u2".to_string(),
                display_name: "Alex Lee".to_string(),
                email: "alex.l@x.com".to_string(),
            },
            TeamMember {
                uid: "".to_string(),
                display_name: "Ghost".to_string(),
                email: "".to_string(),
            },
            TeamMember {
                uid: "u1".to_string(),
                display_name: "Alex Kim".to_string(),
                email: "alex.k@x.com".to_string(),
            },
        ];
        let roster = build_roster(&members);
        let ids: Vec<&str> = roster.iter().map(|m| m.user_id.as_str()).collect();
        assert_eq!(ids, vec!["u2", "u1"]);

        let task = ExtractedTask {
            title: "Ship".to_string(),
            assignee_name: Some("alex".to_string()),
            confidence: 0.8,
        };
        assert_eq!(to_parsed_task(task, &roster).assigned_to.as_deref(), Some("u2"));
    }
}
