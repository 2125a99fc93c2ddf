use anyhow::{Context, Result};
use async_trait::async_trait;
use postgres_native_tls::MakeTlsConnector;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use tokio_postgres::config::SslMode;
use tokio_postgres::{Client, Config, NoTls, SimpleQueryMessage};

use super::{SqlDriver, TextRows};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(15);

/// PostgreSQL over `tokio-postgres`, one connection per call.
pub struct PostgresDriver;

#[async_trait]
impl SqlDriver for PostgresDriver {
    async fn query(&self, uri: &str, sql: &str) -> Result<TextRows> {
        let client = connect(uri).await?;
        let messages = client
            .simple_query(sql)
            .await
            .map_err(|e| PgFailure::from_pg_error(&e, sql))?;
        Ok(collect_rows(messages))
    }

    async fn execute(&self, uri: &str, sql: &str) -> Result<u64> {
        let client = connect(uri).await?;
        let affected = client
            .execute(sql, &[])
            .await
            .map_err(|e| PgFailure::from_pg_error(&e, sql))?;
        Ok(affected)
    }
}

fn collect_rows(messages: Vec<SimpleQueryMessage>) -> TextRows {
    let mut result = TextRows::default();
    for message in messages {
        if let SimpleQueryMessage::Row(row) = message {
            if result.columns.is_empty() {
                result.columns = row.columns().iter().map(|c| c.name().to_string()).collect();
            }
            let cells = (0..row.len())
                .map(|i| row.get(i).map(str::to_string))
                .collect();
            result.rows.push(cells);
        }
    }
    result
}

/// Opens a client for `uri`. The connection task lives until the client is
/// dropped.
async fn connect(uri: &str) -> Result<Client> {
    let mut config = Config::from_str(uri).context("Invalid PostgreSQL connection URI")?;
    config.connect_timeout(CONNECT_TIMEOUT);

    let client = match config.get_ssl_mode() {
        SslMode::Disable => {
            let (client, connection) = tokio::time::timeout(CONNECT_TIMEOUT, config.connect(NoTls))
                .await
                .map_err(|_| anyhow::anyhow!("Connection timed out after 15s"))?
                .context("Failed to connect to PostgreSQL")?;
            tokio::spawn(async move {
                if let Err(e) = connection.await {
                    tracing::warn!(error = %e, "postgres connection error");
                }
            });
            client
        }
        _ => {
            let tls = build_tls_connector()?;
            let (client, connection) = tokio::time::timeout(CONNECT_TIMEOUT, config.connect(tls))
                .await
                .map_err(|_| anyhow::anyhow!("Connection timed out after 15s"))?
                .context("Failed to connect to PostgreSQL")?;
            tokio::spawn(async move {
                if let Err(e) = connection.await {
                    tracing::warn!(error = %e, "postgres connection error");
                }
            });
            client
        }
    };

    tracing::debug!("postgres connected");
    Ok(client)
}

/// `prefer` and `require` encrypt without verifying the server certificate,
/// matching libpq.
fn build_tls_connector() -> Result<MakeTlsConnector> {
    let mut builder = native_tls::TlsConnector::builder();
    builder.danger_accept_invalid_certs(true);
    builder.danger_accept_invalid_hostnames(true);
    let connector = builder.build().context("Failed to build TLS connector")?;
    Ok(MakeTlsConnector::new(connector))
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ErrorCategory {
    Syntax,
    Semantic,
    Execution,
    Transaction,
    Connection,
    Unknown,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorCategory::Syntax => write!(f, "Syntax Error"),
            ErrorCategory::Semantic => write!(f, "Semantic Error"),
            ErrorCategory::Execution => write!(f, "Execution Error"),
            ErrorCategory::Transaction => write!(f, "Transaction Error"),
            ErrorCategory::Connection => write!(f, "Connection Error"),
            ErrorCategory::Unknown => write!(f, "Error"),
        }
    }
}

/// A server-side failure with the position resolved against the query text.
#[derive(Debug, Clone)]
pub struct PgFailure {
    pub category: ErrorCategory,
    pub code: String,
    pub message: String,
    pub detail: Option<String>,
    pub hint: Option<String>,
    pub line: Option<usize>,
    pub col: Option<usize>,
}

impl PgFailure {
    pub fn from_pg_error(err: &tokio_postgres::Error, query: &str) -> Self {
        let Some(db_err) = err.as_db_error() else {
            return PgFailure {
                category: ErrorCategory::Connection,
                code: String::new(),
                message: err.to_string(),
                detail: None,
                hint: None,
                line: None,
                col: None,
            };
        };

        let code = db_err.code().code().to_string();
        let position = db_err.position().and_then(|p| match p {
            tokio_postgres::error::ErrorPosition::Original(pos) => Some(*pos),
            tokio_postgres::error::ErrorPosition::Internal { .. } => None,
        });
        let (line, col) = match position {
            Some(pos) => byte_offset_to_line_col(query, pos as usize),
            None => (None, None),
        };

        PgFailure {
            category: categorize_sqlstate(&code),
            code,
            message: db_err.message().to_string(),
            detail: db_err.detail().map(|s| s.to_string()),
            hint: db_err.hint().map(|s| s.to_string()),
            line,
            col,
        }
    }
}

impl fmt::Display for PgFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.category, self.message)?;
        if let (Some(line), Some(col)) = (self.line, self.col) {
            write!(f, " at line {}, column {}", line, col)?;
        }
        if !self.code.is_empty() {
            write!(f, " (SQLSTATE {})", self.code)?;
        }
        if let Some(detail) = &self.detail {
            write!(f, "; detail: {}", detail)?;
        }
        if let Some(hint) = &self.hint {
            write!(f, "; hint: {}", hint)?;
        }
        Ok(())
    }
}

impl std::error::Error for PgFailure {}

/// Convert a 1-based byte offset in a query string to (line, column), both 1-based.
fn byte_offset_to_line_col(query: &str, byte_pos: usize) -> (Option<usize>, Option<usize>) {
    if byte_pos == 0 || query.is_empty() {
        return (Some(1), Some(1));
    }
    let target = (byte_pos - 1).min(query.len());
    let mut line = 1usize;
    let mut col = 1usize;
    for (i, ch) in query.char_indices() {
        if i >= target {
            break;
        }
        if ch == '\n' {
            line += 1;
            col = 1;
        } else {
            col += 1;
        }
    }
    (Some(line), Some(col))
}

fn categorize_sqlstate(code: &str) -> ErrorCategory {
    if code.len() < 2 {
        return ErrorCategory::Unknown;
    }
    match &code[..2] {
        "42" if code == "42601" || code == "42000" => ErrorCategory::Syntax,
        "42" => ErrorCategory::Semantic,
        "22" | "23" | "53" | "54" | "55" | "57" => ErrorCategory::Execution,
        "25" | "40" => ErrorCategory::Transaction,
        "08" => ErrorCategory::Connection,
        _ => ErrorCategory::Unknown,
    }
}
