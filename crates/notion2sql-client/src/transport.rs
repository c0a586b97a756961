//! HTTP seam between the models and the Notion API.

use std::fmt;
use std::thread;
use std::time::Duration;

use notion2sql_core::{Error, Result};
use reqwest::blocking::{Client, Response};
use reqwest::header::{HeaderValue, CONTENT_TYPE, RETRY_AFTER};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::ClientConfig;

/// First retry delay
pub const BASE_BACKOFF: Duration = Duration::from_millis(500);
/// Upper bound for a single retry delay
pub const MAX_BACKOFF: Duration = Duration::from_secs(8);
/// Longest server-requested `Retry-After` honoured
pub const MAX_RETRY_AFTER: Duration = Duration::from_secs(60);

/// HTTP methods used by the Notion API
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Patch,
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Method::Get => write!(f, "GET"),
            Method::Post => write!(f, "POST"),
            Method::Patch => write!(f, "PATCH"),
        }
    }
}

/// Sends one API request and returns the decoded JSON response.
///
/// `path` is relative to the API root and starts with `/`, e.g.
/// `/databases/{id}/query`. Implementations map non-success responses to
/// [`Error::Api`].
pub trait Transport: Send + Sync {
    fn request(&self, method: Method, path: &str, body: Option<&Value>) -> Result<Value>;
}

/// Error body returned by Notion
#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    code: String,
    #[serde(default)]
    message: String,
}

/// [`Transport`] backed by `reqwest::blocking`
pub struct HttpTransport {
    client: Client,
    config: ClientConfig,
}

impl HttpTransport {
    pub fn new(config: ClientConfig) -> Result<Self> {
        config.validate()?;
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| Error::Transport(e.to_string()))?;
        Ok(Self { client, config })
    }

    fn send(&self, method: Method, url: &str, body: Option<&Value>) -> Result<Response> {
        let method = match method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Patch => reqwest::Method::PATCH,
        };
        let mut request = self
            .client
            .request(method, url)
            .bearer_auth(&self.config.api_key)
            .header("Notion-Version", &self.config.notion_version);
        if let Some(body) = body {
            request = request
                .header(CONTENT_TYPE, HeaderValue::from_static("application/json"))
                .json(body);
        }
        request.send().map_err(|e| Error::Transport(e.to_string()))
    }
}

impl HttpTransport {
    /// One round trip. Non-success statuses become [`Error::RateLimited`]
    /// (429) or [`Error::Api`].
    fn attempt(&self, method: Method, url: &str, body: Option<&Value>) -> Result<Value> {
        let response = self.send(method, url, body)?;

        let status = response.status().as_u16();
        let retry_after = response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_retry_after);
        let text = response
            .text()
            .map_err(|e| Error::Transport(e.to_string()))?;

        if (200..300).contains(&status) {
            if text.trim().is_empty() {
                return Ok(Value::Null);
            }
            return Ok(serde_json::from_str(&text)?);
        }
        if status == 429 {
            return Err(Error::RateLimited { retry_after });
        }
        Err(api_error(status, &text))
    }
}

impl Transport for HttpTransport {
    fn request(&self, method: Method, path: &str, body: Option<&Value>) -> Result<Value> {
        let url = format!("{}{}", self.config.base_url, path);
        with_retries(self.config.max_retries, thread::sleep, |attempt| {
            debug!(%method, path, attempt, "notion request");
            self.attempt(method, &url, body)
        })
    }
}

/// Run `attempt` until it succeeds, fails with an error that is not
/// [retryable](Error::is_retryable), or `max_retries` retries are spent.
///
/// `attempt` receives the 0-based attempt number. Between attempts the
/// loop waits [`backoff_delay`] through `sleep`.
pub fn with_retries<T>(
    max_retries: u32,
    sleep: impl Fn(Duration),
    mut attempt: impl FnMut(u32) -> Result<T>,
) -> Result<T> {
    let mut n = 0;
    loop {
        match attempt(n) {
            Err(e) if e.is_retryable() && n < max_retries => {
                let retry_after = match &e {
                    Error::RateLimited { retry_after } => *retry_after,
                    _ => None,
                };
                let delay = backoff_delay(n, retry_after);
                warn!(attempt = n, error = %e, ?delay, "notion asked us to back off, retrying");
                sleep(delay);
                n += 1;
            }
            result => return result,
        }
    }
}

/// Delay before retry number `attempt` (0-based): the server's
/// `Retry-After` when given, else 500 ms doubling up to 8 s.
pub fn backoff_delay(attempt: u32, retry_after: Option<Duration>) -> Duration {
    if let Some(delay) = retry_after {
        return delay;
    }
    let factor = 2u32.saturating_pow(attempt);
    BASE_BACKOFF.saturating_mul(factor).min(MAX_BACKOFF)
}

fn parse_retry_after(value: &str) -> Option<Duration> {
    value
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|secs| !secs.is_nan())
        .and_then(|secs| Duration::try_from_secs_f64(secs.min(MAX_RETRY_AFTER.as_secs_f64())).ok())
}

/// Map a failed response body to [`Error::Api`].
pub fn api_error(status: u16, body: &str) -> Error {
    match serde_json::from_str::<ErrorBody>(body) {
        Ok(parsed) => Error::Api {
            status,
            code: parsed.code,
            message: parsed.message,
        },
        Err(_) => Error::Api {
            status,
            code: "unknown".to_string(),
            message: body.chars().take(200).collect(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    #[test]
    fn test_backoff_schedule() {
        let delays: Vec<Duration> = (0..6).map(|attempt| backoff_delay(attempt, None)).collect();
        assert_eq!(
            delays,
            vec![
                Duration::from_millis(500),
                Duration::from_secs(1),
                Duration::from_secs(2),
                Duration::from_secs(4),
                Duration::from_secs(8),
                Duration::from_secs(8),
            ]
        );
        assert_eq!(backoff_delay(40, None), MAX_BACKOFF);
    }

    #[test]
    fn test_retry_after_wins() {
        assert_eq!(
            backoff_delay(3, Some(Duration::from_secs(1))),
            Duration::from_secs(1)
        );
        assert_eq!(parse_retry_after(" 2 "), Some(Duration::from_secs(2)));
        assert_eq!(parse_retry_after("0.5"), Some(Duration::from_millis(500)));
        assert_eq!(parse_retry_after("Wed, 21 Oct 2015 07:28:00 GMT"), None);
    }

    #[test]
    fn test_retry_after_out_of_range() {
        assert_eq!(parse_retry_after("1e300"), Some(MAX_RETRY_AFTER));
        assert_eq!(parse_retry_after("3600"), Some(MAX_RETRY_AFTER));
        assert_eq!(parse_retry_after("-1"), None);
        assert_eq!(parse_retry_after("NaN"), None);
        assert_eq!(parse_retry_after("inf"), Some(MAX_RETRY_AFTER));
    }

    fn unavailable() -> Error {
        Error::Api {
            status: 503,
            code: "service_unavailable".to_string(),
            message: String::new(),
        }
    }

    #[test]
    fn test_retries_server_errors_until_success() {
        let delays = RefCell::new(Vec::new());
        let mut calls = 0;
        let result = with_retries(
            3,
            |delay| delays.borrow_mut().push(delay),
            |attempt| {
                calls += 1;
                match attempt {
                    0 => Err(unavailable()),
                    1 => Err(Error::RateLimited {
                        retry_after: Some(Duration::from_secs(2)),
                    }),
                    _ => Ok("done"),
                }
            },
        );

        assert_eq!(result.unwrap(), "done");
        assert_eq!(calls, 3);
        assert_eq!(
            delays.into_inner(),
            vec![Duration::from_millis(500), Duration::from_secs(2)]
        );
    }

    #[test]
    fn test_gives_up_after_max_retries() {
        let mut calls = 0;
        let result: Result<()> = with_retries(
            2,
            |_| {},
            |_| {
                calls += 1;
                Err(Error::RateLimited { retry_after: None })
            },
        );

        assert!(matches!(result, Err(Error::RateLimited { .. })));
        assert_eq!(calls, 3);
    }

    #[test]
    fn test_transport_and_client_errors_are_not_retried() {
        // a timed out create may already have reached Notion
        let mut calls = 0;
        let result: Result<()> = with_retries(
            3,
            |_| panic!("should not sleep"),
            |_| {
                calls += 1;
                Err(Error::Transport("operation timed out".to_string()))
            },
        );
        assert!(matches!(result, Err(Error::Transport(_))));
        assert_eq!(calls, 1);

        let mut calls = 0;
        let result: Result<()> = with_retries(
            3,
            |_| panic!("should not sleep"),
            |_| {
                calls += 1;
                Err(api_error(400, r#"{"code":"validation_error","message":"bad"}"#))
            },
        );
        assert!(matches!(result, Err(Error::Api { status: 400, .. })));
        assert_eq!(calls, 1);
    }

    #[test]
    fn test_api_error_parsing() {
        let err = api_error(
            404,
            r#"{"object":"error","status":404,"code":"object_not_found","message":"Could not find page"}"#,
        );
        assert!(matches!(
            err,
            Error::Api { status: 404, ref code, .. } if code == "object_not_found"
        ));

        let err = api_error(502, "<html>bad gateway</html>");
        assert!(matches!(err, Error::Api { status: 502, ref code, .. } if code == "unknown"));
    }

    #[test]
    fn test_rejects_invalid_config() {
        assert!(HttpTransport::new(ClientConfig::new("")).is_err());
    }
}
