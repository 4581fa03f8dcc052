use aws_config::BehaviorVersion;
use aws_sdk_dynamodb::config::{Credentials, SharedCredentialsProvider};
use aws_sdk_dynamodb::error::{DisplayErrorContext, SdkError};
use aws_sdk_dynamodb::Client;
use shared::{AppError, Config};
use tracing::info;

#[derive(Clone)]
pub struct DynamoDbClient {
    client: Client,
    table_name: String,
}

impl DynamoDbClient {
    /// 設定からクライアントを作成
    ///
    /// `dynamodb_endpoint` が指定されている場合は DynamoDB Local 向けに
    /// エンドポイントを上書きし、固定のテスト用認証情報を使う。
    pub async fn new(config: &Config) -> Result<Self, AppError> {
        let mut loader = aws_config::defaults(BehaviorVersion::latest())
            .region(aws_config::Region::new(config.aws_region.clone()));

        if let Some(endpoint) = &config.dynamodb_endpoint {
            info!("DynamoDBエンドポイントを上書き: {}", endpoint);
            loader = loader
                .endpoint_url(endpoint)
                .credentials_provider(SharedCredentialsProvider::new(Credentials::new(
                    "test", "test", None, None, "test",
                )));
        }

        let aws_config = loader.load().await;
        let client = Client::new(&aws_config);

        Ok(Self {
            client,
            table_name: config.dynamodb_table.clone(),
        })
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    /// SDK のエラーをアプリケーションエラーに変換
    ///
    /// 接続できない・タイムアウトは `ServiceUnavailable`、それ以外は `DynamoDb`。
    pub fn convert_error<E, R>(&self, error: SdkError<E, R>) -> AppError
    where
        E: std::error::Error + Send + Sync + 'static,
        R: std::fmt::Debug,
    {
        let message = DisplayErrorContext(&error).to_string();
        match error {
            SdkError::TimeoutError(_) | SdkError::DispatchFailure(_) => {
                AppError::ServiceUnavailable(message)
            }
            _ => AppError::DynamoDb(message),
        }
    }
}
