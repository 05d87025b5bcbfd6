//! Snowflake over its session REST protocol: password login, one request per
//! statement with positional bindings, and session deletion on close.

use crate::config::{SnowflakeConfig, SnowflakeCredentials};
use crate::core::{Namespace, Result, Statement, Warehouse, WarehouseConnection};
use crate::utils::error::IngestError;
use async_trait::async_trait;
use reqwest::header::{ACCEPT, AUTHORIZATION};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

const LOGIN_PATH: &str = "/session/v1/login-request";
const QUERY_PATH: &str = "/queries/v1/query-request";
const SESSION_PATH: &str = "/session";

/// Snowflake accepted the statement but has not finished running it.
const IN_PROGRESS_CODES: [&str; 2] = ["333333", "333334"];
const RESULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

const CLIENT_APP_ID: &str = "warehouse-ingest";
const SNOWFLAKE_ACCEPT: &str = "application/snowflake";

pub struct SnowflakeWarehouse {
    config: SnowflakeConfig,
    client: Client,
}

impl SnowflakeWarehouse {
    pub fn new(config: SnowflakeConfig) -> Self {
        Self {
            config,
            client: Client::new(),
        }
    }
}

#[derive(Serialize)]
struct LoginRequest<'a> {
    data: LoginRequestData<'a>,
}

#[derive(Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
struct LoginRequestData<'a> {
    client_app_id: &'a str,
    client_app_version: &'a str,
    account_name: &'a str,
    login_name: &'a str,
    password: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct QueryRequest<'a> {
    sql_text: &'a str,
    async_exec: bool,
    sequence_id: u64,
    is_internal: bool,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    bindings: BTreeMap<String, Binding<'a>>,
}

#[derive(Serialize)]
struct Binding<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    value: &'a str,
}

#[derive(Deserialize)]
struct SnowflakeResponse<T> {
    data: Option<T>,
    message: Option<String>,
    code: Option<String>,
    #[serde(default)]
    success: bool,
}

impl<T> SnowflakeResponse<T> {
    fn failure_message(&self) -> String {
        let message = self
            .message
            .clone()
            .unwrap_or_else(|| "no message from Snowflake".to_string());
        match &self.code {
            Some(code) => format!("{} (code {})", message, code),
            None => message,
        }
    }
}

#[derive(Deserialize)]
struct QueryData {
    #[serde(rename = "getResultUrl")]
    get_result_url: Option<String>,
}

#[derive(Deserialize)]
struct LoginData {
    token: Option<String>,
}

fn connection_error(message: impl Into<String>) -> IngestError {
    IngestError::ConnectionError {
        message: message.into(),
    }
}

#[async_trait]
impl Warehouse for SnowflakeWarehouse {
    type Connection = SnowflakeConnection;

    async fn connect(&self) -> Result<SnowflakeConnection> {
        // 缺少憑證時視為連線失敗，訊息保留變數名稱
        let creds: SnowflakeCredentials = self.config.credentials().map_err(|e| match e {
            IngestError::MissingConfigError { field } => {
                connection_error(format!("{} is not set", field))
            }
            other => other,
        })?;
        tracing::debug!("Logging in to Snowflake: {:?}", creds);

        let account_name = creds.account_name();
        let request_id = uuid::Uuid::new_v4().to_string();
        let mut params = vec![
            ("requestId", request_id.as_str()),
            ("warehouse", creds.warehouse.as_str()),
            ("databaseName", creds.namespace.database.as_str()),
            ("schemaName", creds.namespace.schema.as_str()),
        ];
        if let Some(role) = &creds.role {
            params.push(("roleName", role.as_str()));
        }

        let body = LoginRequest {
            data: LoginRequestData {
                client_app_id: CLIENT_APP_ID,
                client_app_version: env!("CARGO_PKG_VERSION"),
                account_name: &account_name,
                login_name: &creds.user,
                password: &creds.password,
            },
        };

        let response = self
            .client
            .post(format!("{}{}", creds.base_url, LOGIN_PATH))
            .query(&params)
            .header(ACCEPT, "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| connection_error(format!("login request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(connection_error(format!(
                "login request returned status {}",
                status
            )));
        }

        let login: SnowflakeResponse<LoginData> = response
            .json()
            .await
            .map_err(|e| connection_error(format!("unreadable login response: {}", e)))?;

        if !login.success {
            return Err(connection_error(login.failure_message()));
        }

        let token = login
            .data
            .and_then(|d| d.token)
            .ok_or_else(|| connection_error("login response carried no session token"))?;

        Ok(SnowflakeConnection {
            client: self.client.clone(),
            base_url: creds.base_url,
            token,
            namespace: creds.namespace,
            sequence_id: 0,
        })
    }
}

pub struct SnowflakeConnection {
    client: Client,
    base_url: String,
    token: String,
    namespace: Namespace,
    sequence_id: u64,
}

impl SnowflakeConnection {
    fn authorization(&self) -> String {
        format!("Snowflake Token=\"{}\"", self.token)
    }

    async fn read_query_response(
        response: reqwest::Response,
    ) -> Result<SnowflakeResponse<QueryData>> {
        let status = response.status();
        if !status.is_success() {
            return Err(IngestError::StatementError {
                code: Some(status.as_u16().to_string()),
                message: format!("query request returned status {}", status),
            });
        }

        response
            .json()
            .await
            .map_err(|e| IngestError::StatementError {
                code: None,
                message: format!("unreadable query response: {}", e),
            })
    }

    /// Polls the result URL until Snowflake reports the statement as finished.
    async fn await_completion(&self, mut result: SnowflakeResponse<QueryData>) -> Result<()> {
        loop {
            if !result.success {
                return Err(IngestError::StatementError {
                    code: result.code,
                    message: result
                        .message
                        .unwrap_or_else(|| "statement failed".to_string()),
                });
            }

            let in_progress = result
                .code
                .as_deref()
                .is_some_and(|code| IN_PROGRESS_CODES.contains(&code));
            if !in_progress {
                return Ok(());
            }

            let code = result.code.clone();
            let result_url = result
                .data
                .and_then(|d| d.get_result_url)
                .ok_or_else(|| IngestError::StatementError {
                    code,
                    message: "statement still running but no result URL was returned"
                        .to_string(),
                })?;

            tracing::debug!("Statement still running, polling {}", result_url);
            tokio::time::sleep(RESULT_POLL_INTERVAL).await;

            let response = self
                .client
                .get(format!("{}{}", self.base_url, result_url))
                .header(ACCEPT, SNOWFLAKE_ACCEPT)
                .header(AUTHORIZATION, self.authorization())
                .send()
                .await
                .map_err(|e| IngestError::StatementError {
                    code: None,
                    message: format!("result request failed: {}", e),
                })?;

            result = Self::read_query_response(response).await?;
        }
    }
}

#[async_trait]
impl WarehouseConnection for SnowflakeConnection {
    fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    async fn execute(&mut self, statement: &Statement) -> Result<()> {
        self.sequence_id += 1;

        let bindings = statement
            .bindings
            .iter()
            .enumerate()
            .map(|(index, value)| {
                (
                    (index + 1).to_string(),
                    Binding {
                        kind: "TEXT",
                        value: value.as_str(),
                    },
                )
            })
            .collect();

        let body = QueryRequest {
            sql_text: &statement.sql,
            async_exec: false,
            sequence_id: self.sequence_id,
            is_internal: false,
            bindings,
        };

        let request_id = uuid::Uuid::new_v4().to_string();
        let response = self
            .client
            .post(format!("{}{}", self.base_url, QUERY_PATH))
            .query(&[("requestId", request_id.as_str())])
            .header(ACCEPT, SNOWFLAKE_ACCEPT)
            .header(AUTHORIZATION, self.authorization())
            .json(&body)
            .send()
            .await
            .map_err(|e| IngestError::StatementError {
                code: None,
                message: format!("query request failed: {}", e),
            })?;

        let result = Self::read_query_response(response).await?;
        self.await_completion(result).await
    }

    async fn close(self) -> Result<()> {
        let response = self
            .client
            .post(format!("{}{}", self.base_url, SESSION_PATH))
            .query(&[("delete", "true")])
            .header(ACCEPT, SNOWFLAKE_ACCEPT)
            .header(AUTHORIZATION, self.authorization())
            .send()
            .await
            .map_err(|e| connection_error(format!("session delete failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(connection_error(format!(
                "session delete returned status {}",
                response.status()
            )));
        }

        Ok(())
    }
}
