//! Snowflake SQL API client
//!
//! Statements are submitted to `POST /api/v2/statements`. A `202 Accepted`
//! response means the statement is still running; its handle is polled via
//! `GET /api/v2/statements/{handle}` until it completes.

use super::auth::KeyPairAuth;
use super::statements::redact;
use crate::config::SnowflakeConfig;
use crate::credentials::PrivateKeyDer;
use crate::error::{Error, Result};
use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::{debug, info};

/// Interval between status checks of a running statement
const POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Executes SQL statements against a warehouse
#[async_trait]
pub trait SqlExecutor: Send + Sync {
    /// Run one statement to completion
    async fn execute(&self, sql: &str) -> Result<StatementOutcome>;

    /// Release the session
    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

/// Result of a completed statement
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatementOutcome {
    /// Server-side statement handle
    pub handle: Option<String>,
    /// Status message returned by the warehouse
    pub message: Option<String>,
    /// Result rows, every cell rendered as a string
    pub rows: Vec<Vec<Option<String>>>,
}

/// Connection settings for the SQL API
#[derive(Debug, Clone)]
pub struct ConnectionParams {
    /// Account identifier
    pub account: String,
    /// Login name
    pub user: String,
    /// Role for every statement
    pub role: String,
    /// Virtual warehouse
    pub warehouse: String,
    /// Default database
    pub database: String,
    /// Default schema
    pub schema: String,
    /// API base URL, no trailing slash
    pub base_url: String,
    /// Server-side statement timeout
    pub statement_timeout: Duration,
    /// Delay between polls of a running statement
    pub poll_interval: Duration,
}

impl ConnectionParams {
    /// Build from the `SNOWFLAKE` config section
    pub fn from_config(config: &SnowflakeConfig) -> Self {
        Self {
            account: config.account.clone(),
            user: config.user.clone(),
            role: config.role.clone(),
            warehouse: config.warehouse.clone(),
            database: config.raw_database.clone(),
            schema: config.raw_schema.clone(),
            base_url: config.api_base_url(),
            statement_timeout: config.statement_timeout(),
            poll_interval: POLL_INTERVAL,
        }
    }
}

/// Body returned by the statements endpoint
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StatementResponse {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    statement_handle: Option<String>,
    #[serde(default)]
    data: Option<Vec<Vec<Option<String>>>>,
}

/// Authenticated SQL API session
#[derive(Debug)]
pub struct SnowflakeConnection {
    http: Client,
    params: ConnectionParams,
    auth: KeyPairAuth,
}

impl SnowflakeConnection {
    /// Open a connection using key-pair authentication
    ///
    /// Fails with a connection error when the key cannot be used for signing.
    pub fn connect(params: ConnectionParams, private_key: &PrivateKeyDer) -> Result<Self> {
        let auth = KeyPairAuth::new(&params.account, &params.user, private_key)
            .map_err(|e| Error::connection(format!("Snowflake authentication setup failed: {e}")))?;

        let http = Client::builder()
            .user_agent(format!("flakeload/{}", env!("CARGO_PKG_VERSION")))
            .build()?;

        info!(account = %params.account, user = %params.user, "Snowflake connection established");
        Ok(Self { http, params, auth })
    }

    /// Connection settings
    pub fn params(&self) -> &ConnectionParams {
        &self.params
    }

    fn statements_url(&self) -> String {
        format!("{}/api/v2/statements", self.params.base_url)
    }

    async fn send(&self, request: reqwest::RequestBuilder, sql: &str) -> Result<Response> {
        let token = self.auth.token().await?;
        let response = request
            .bearer_auth(token)
            .header("X-Snowflake-Authorization-Token-Type", "KEYPAIR_JWT")
            .header("Accept", "application/json")
            .send()
            .await
            .inspect_err(|e| debug!("Request for statement '{}' failed: {e}", first_line(sql)))?;
        Ok(response)
    }

    /// Classify a statements endpoint response
    async fn read_response(&self, response: Response, sql: &str) -> Result<Progress> {
        let status = response.status();
        let body = response.text().await?;
        let parsed: StatementResponse = serde_json::from_str(&body).unwrap_or_default();

        match status {
            StatusCode::OK => Ok(Progress::Done(parsed)),
            StatusCode::ACCEPTED => parsed
                .statement_handle
                .map(Progress::Running)
                .ok_or_else(|| Error::sql(redact(sql), "statement accepted without a handle")),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(Error::connection(format!(
                "Snowflake rejected credentials (HTTP {}): {}",
                status.as_u16(),
                parsed.message.as_deref().unwrap_or(&body)
            ))),
            _ => {
                let message = match (parsed.code, parsed.message) {
                    (Some(code), Some(message)) => format!("{code}: {message}"),
                    (None, Some(message)) => message,
                    _ => format!("HTTP {}: {body}", status.as_u16()),
                };
                Err(Error::sql(redact(sql), message))
            }
        }
    }
}

/// State of a submitted statement
enum Progress {
    /// Finished, with the final response body
    Done(StatementResponse),
    /// Still running under this handle
    Running(String),
}

#[async_trait]
impl SqlExecutor for SnowflakeConnection {
    async fn execute(&self, sql: &str) -> Result<StatementOutcome> {
        debug!(statement = %redact(sql), "Executing statement");

        let body = json!({
            "statement": sql,
            "timeout": self.params.statement_timeout.as_secs(),
            "database": self.params.database,
            "schema": self.params.schema,
            "warehouse": self.params.warehouse,
            "role": self.params.role,
        });

        let response = self
            .send(self.http.post(self.statements_url()).json(&body), sql)
            .await?;
        let mut progress = self.read_response(response, sql).await?;

        loop {
            match progress {
                Progress::Done(response) => {
                    return Ok(StatementOutcome {
                        handle: response.statement_handle,
                        message: response.message,
                        rows: response.data.unwrap_or_default(),
                    })
                }
                Progress::Running(handle) => {
                    debug!(handle = %handle, "Statement still running");
                    tokio::time::sleep(self.params.poll_interval).await;
                    let url = format!("{}/{handle}", self.statements_url());
                    let response = self.send(self.http.get(url), sql).await?;
                    progress = self.read_response(response, sql).await?;
                }
            }
        }
    }

    async fn close(&self) -> Result<()> {
        info!(account = %self.params.account, "Snowflake connection closed");
        Ok(())
    }
}

fn first_line(sql: &str) -> &str {
    sql.trim().lines().next().unwrap_or_default()
}
