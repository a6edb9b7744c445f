//! Shared plumbing for JSON calls to the external workers.

use std::time::Duration;

use reqwest::{Client, RequestBuilder, Response};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use trawl_core::AppError;

pub(crate) fn build_client(timeout: Duration) -> Result<Client, AppError> {
    Client::builder()
        .user_agent(concat!("Trawl/", env!("CARGO_PKG_VERSION")))
        .timeout(timeout)
        .build()
        .map_err(|e| AppError::HttpError(e.to_string()))
}

/// Sends the request, mapping transport failures to error kinds.
pub(crate) async fn send(request: RequestBuilder, timeout_secs: u64) -> Result<Response, AppError> {
    request.send().await.map_err(|e| {
        if e.is_timeout() {
            AppError::Timeout(timeout_secs)
        } else if e.is_connect() {
            AppError::NetworkError(format!("Connection failed: {e}"))
        } else {
            AppError::HttpError(e.to_string())
        }
    })
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ErrorBody {
    Nested { error: ErrorDetail },
    Flat { error: String },
    Message { message: String },
}

#[derive(Deserialize)]
struct ErrorDetail {
    message: String,
}

/// Best-effort message from a non-2xx body.
pub(crate) async fn error_message(response: Response) -> (u16, String) {
    let status_code = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();

    let message = match serde_json::from_str::<ErrorBody>(&body) {
        Ok(ErrorBody::Nested { error }) => error.message,
        Ok(ErrorBody::Flat { error }) => error,
        Ok(ErrorBody::Message { message }) => message,
        Err(_) if body.trim().is_empty() => format!("HTTP {status_code}"),
        Err(_) => format!("HTTP {status_code}: {}", body.trim()),
    };
    (status_code, message)
}

pub(crate) async fn parse_json<T: DeserializeOwned>(
    response: Response,
    what: &str,
) -> Result<T, AppError> {
    response
        .json()
        .await
        .map_err(|e| AppError::HttpError(format!("Failed to parse {what} response: {e}")))
}
