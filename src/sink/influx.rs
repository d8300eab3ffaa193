// src/sink/influx.rs
//! InfluxDB 1.x HTTP API: `/query` for administration, `/write` with line
//! protocol at second precision for points.

use async_trait::async_trait;
use std::fmt;
use std::time::Duration;

use super::{FieldValue, Point, TimeSeriesStore, WriteError};

#[derive(Debug, Clone)]
pub struct InfluxConfig {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub username: String,
    pub password: String,
    pub timeout: Duration,
}

impl InfluxConfig {
    /// `http://host:port` unless the host already names a scheme.
    pub fn base_url(&self) -> String {
        let host = self.host.trim_end_matches('/');
        if host.starts_with("http://") || host.starts_with("https://") {
            format!("{host}:{}", self.port)
        } else {
            format!("http://{host}:{}", self.port)
        }
    }
}

/// Long-lived handle, opened once and reused for every write.
#[derive(Clone)]
pub struct InfluxHttpStore {
    client: reqwest::Client,
    base: String,
    database: String,
    username: String,
    password: String,
}

impl InfluxHttpStore {
    pub fn connect(cfg: &InfluxConfig) -> Result<Self, WriteError> {
        if cfg.host.trim().is_empty() {
            return Err(WriteError::Address("empty host".into()));
        }
        let client = reqwest::Client::builder().timeout(cfg.timeout).build()?;
        Ok(Self {
            client,
            base: cfg.base_url(),
            database: cfg.database.clone(),
            username: cfg.username.clone(),
            password: cfg.password.clone(),
        })
    }

    pub fn database(&self) -> &str {
        &self.database
    }

    fn authed(&self, rb: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        if self.username.is_empty() {
            rb
        } else {
            rb.basic_auth(&self.username, Some(&self.password))
        }
    }

    async fn check_status(resp: reqwest::Response) -> Result<String, WriteError> {
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        if status.is_success() {
            Ok(body)
        } else {
            Err(WriteError::Status {
                status: status.as_u16(),
                body: body.trim().to_string(),
            })
        }
    }
}

#[async_trait]
impl TimeSeriesStore for InfluxHttpStore {
    async fn ensure_database(&self, name: &str) -> Result<(), WriteError> {
        let q = format!("CREATE DATABASE {}", quote_identifier(name));
        let rb = self
            .client
            .post(format!("{}/query", self.base))
            .form(&[("q", q.as_str())]);
        let body = Self::check_status(self.authed(rb).send().await?).await?;

        // Statement errors come back as 200 with an `error` member.
        if let Ok(v) = serde_json::from_str::<serde_json::Value>(&body) {
            if let Some(err) = v.get("error").and_then(|e| e.as_str()) {
                return Err(WriteError::Query(err.to_string()));
            }
            let results = v.get("results").and_then(|r| r.as_array());
            for r in results.into_iter().flatten() {
                if let Some(err) = r.get("error").and_then(|e| e.as_str()) {
                    return Err(WriteError::Query(err.to_string()));
                }
            }
        }
        Ok(())
    }

    async fn write_batch(&self, points: &[Point]) -> Result<(), WriteError> {
        if points.is_empty() {
            return Ok(());
        }
        let body = points
            .iter()
            .map(|p| p.to_string())
            .collect::<Vec<_>>()
            .join("\n");
        let rb = self
            .client
            .post(format!("{}/write", self.base))
            .query(&[("db", self.database.as_str()), ("precision", "s")])
            .body(body);
        Self::check_status(self.authed(rb).send().await?).await?;
        Ok(())
    }
}

fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('\\', "\\\\").replace('"', "\\\""))
}

fn escape_measurement(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            ',' | ' ' => {
                out.push('\\');
                out.push(c);
            }
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            _ => out.push(c),
        }
    }
    out
}

/// Tag keys and values. Line protocol has no newline in tags, so newlines
/// are written as a literal backslash sequence.
fn escape_tag(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            ',' | '=' | ' ' => {
                out.push('\\');
                out.push(c);
            }
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            _ => out.push(c),
        }
    }
    out
}

fn escape_field_string(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Renders the point as one line of line protocol, second precision.
impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&escape_measurement(&self.measurement))?;
        for (k, v) in self.stored_tags() {
            write!(f, ",{}={}", escape_tag(k), escape_tag(v))?;
        }
        let mut sep = ' ';
        for (k, v) in &self.fields {
            match v {
                FieldValue::Integer(i) => write!(f, "{sep}{}={i}i", escape_tag(k))?,
                FieldValue::Text(s) => {
                    write!(f, "{sep}{}=\"{}\"", escape_tag(k), escape_field_string(s))?
                }
            }
            sep = ',';
        }
        write!(f, " {}", self.time.timestamp())
    }
}
