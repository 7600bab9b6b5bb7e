//! HTTP retry helper for the isochrone endpoint.
//!
//! Retries transient failures (connect errors, timeouts, HTTP 429,
//! HTTP 5xx) with exponential backoff. Client errors other than 429 are
//! permanent and returned immediately.

use std::time::Duration;

use crate::GeometryError;

/// Maximum number of retry attempts after the first request.
///
/// With exponential backoff (1s, 2s, 4s) the total wait before giving up
/// is 7 seconds.
const MAX_RETRIES: u32 = 3;

/// Maximum length of the response body preview included in error logs.
const BODY_PREVIEW_LEN: usize = 500;

/// Sends a request and parses the response body as JSON.
///
/// The `build_request` closure is called on each attempt to construct a
/// fresh [`reqwest::RequestBuilder`], since builders are consumed by
/// `.send()`.
///
/// # Errors
///
/// Returns [`GeometryError`] if the request still fails after all
/// retries, the server answers with a non-retryable status, or the body is
/// not valid JSON.
#[allow(clippy::future_not_send)]
pub async fn send_json<F>(build_request: F) -> Result<serde_json::Value, GeometryError>
where
    F: Fn() -> reqwest::RequestBuilder,
{
    let response = send_inner(&build_request).await?;
    let url = response.url().to_string();
    let status = response.status();
    let text = response.text().await?;

    serde_json::from_str(&text).map_err(|e| {
        let preview = text.chars().take(BODY_PREVIEW_LEN).collect::<String>();
        log::error!(
            "JSON parse failed.\n  \
             url: {url}\n  \
             status: {status}\n  \
             received: {} bytes\n  \
             parse error: {e}\n  \
             body preview: {preview}",
            text.len(),
        );
        GeometryError::Json(e)
    })
}

#[allow(clippy::future_not_send)]
async fn send_inner<F>(build_request: &F) -> Result<reqwest::Response, GeometryError>
where
    F: Fn() -> reqwest::RequestBuilder,
{
    let mut last_error: Option<GeometryError> = None;

    for attempt in 0..=MAX_RETRIES {
        if attempt > 0 {
            let delay = Duration::from_secs(1u64 << (attempt - 1)); // 1s, 2s, 4s
            log::warn!("  retry {attempt}/{MAX_RETRIES} in {delay:?}...");
            tokio::time::sleep(delay).await;
        }

        match build_request().send().await {
            Err(e) => {
                if is_transient(&e) && attempt < MAX_RETRIES {
                    log::warn!("  transient error: {e}");
                    last_error = Some(GeometryError::Http(e));
                    continue;
                }
                return Err(GeometryError::Http(e));
            }
            Ok(response) => {
                let status = response.status();

                if status == reqwest::StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
                    if attempt < MAX_RETRIES {
                        log::warn!("  HTTP {status}");
                        last_error = Some(GeometryError::Service {
                            message: format!("HTTP {status}"),
                        });
                        continue;
                    }
                    return Err(GeometryError::Service {
                        message: format!("HTTP {status} after {MAX_RETRIES} retries"),
                    });
                }

                if status.is_client_error() {
                    let body = response.text().await.unwrap_or_default();
                    return Err(GeometryError::Service {
                        message: format!(
                            "HTTP {status}: {}",
                            body.chars().take(BODY_PREVIEW_LEN).collect::<String>()
                        ),
                    });
                }

                return Ok(response);
            }
        }
    }

    Err(last_error.unwrap_or_else(|| GeometryError::Service {
        message: "request failed after all retries".to_string(),
    }))
}

/// Only connect failures and timeouts are retried at the transport level.
fn is_transient(e: &reqwest::Error) -> bool {
    e.is_timeout() || e.is_connect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_errors_are_permanent() {
        let e = reqwest::Client::new()
            .get("not a url")
            .build()
            .unwrap_err();
        assert!(e.is_builder());
        assert!(!is_transient(&e));
    }

    #[tokio::test]
    async fn refused_connections_are_transient() {
        let e = reqwest::Client::new()
            .get("http://127.0.0.1:1/v2/isochrones/foot-walking")
            .send()
            .await
            .unwrap_err();
        assert!(is_transient(&e));
    }
}
