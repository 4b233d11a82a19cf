use futures_util::StreamExt;
use reqwest::StatusCode;

use crate::{RelayError, Result};

pub(crate) const MAX_ERROR_BODY_BYTES: usize = 64 * 1024;
const MAX_RESPONSE_BODY_BYTES: usize = 8 * 1024 * 1024;

#[derive(Debug)]
pub(crate) struct CapturedResponse {
    pub status: StatusCode,
    pub body: String,
}

/// Sends one request and buffers its body. Error bodies are truncated rather than rejected
/// so they can still be logged; oversized success bodies are a transport failure.
pub(crate) async fn send_captured(
    provider: &str,
    req: reqwest::RequestBuilder,
) -> Result<CapturedResponse> {
    let response = req
        .send()
        .await
        .map_err(|err| unreachable_provider(provider, err))?;

    let status = response.status();
    let limit = if status.is_success() {
        MAX_RESPONSE_BODY_BYTES
    } else {
        MAX_ERROR_BODY_BYTES
    };
    let (bytes, truncated, stream_error) = response_bytes_truncated(response, limit).await;

    if status.is_success() {
        if let Some(err) = stream_error {
            return Err(unreachable_provider(provider, err));
        }
        if truncated {
            return Err(RelayError::Transport {
                provider: provider.to_string(),
                status: Some(status),
                body: String::new(),
                message: format!("{provider} response exceeded {MAX_RESPONSE_BODY_BYTES} bytes"),
            });
        }
    }

    let mut body = String::from_utf8_lossy(&bytes).into_owned();
    if truncated {
        if !body.is_empty() {
            body.push('\n');
        }
        body.push_str("...(truncated)");
    }
    Ok(CapturedResponse { status, body })
}

fn unreachable_provider(provider: &str, err: reqwest::Error) -> RelayError {
    let reason = if err.is_timeout() {
        "timed out"
    } else if err.is_connect() {
        "connection failed"
    } else {
        "request failed"
    };
    tracing::debug!(provider, reason, error = %err, "provider request did not complete");
    RelayError::Transport {
        provider: provider.to_string(),
        status: None,
        body: String::new(),
        message: format!("could not reach {provider} ({reason})"),
    }
}

async fn response_bytes_truncated(
    response: reqwest::Response,
    max_bytes: usize,
) -> (Vec<u8>, bool, Option<reqwest::Error>) {
    let max_bytes = max_bytes.max(1);
    let mut out = Vec::<u8>::new();

    let mut stream = response.bytes_stream();
    while let Some(next) = stream.next().await {
        let chunk = match next {
            Ok(chunk) => chunk,
            Err(err) => return (out, false, Some(err)),
        };
        let remaining = max_bytes.saturating_sub(out.len());
        if chunk.len() > remaining {
            out.extend_from_slice(&chunk[..remaining]);
            return (out, true, None);
        }
        out.extend_from_slice(&chunk);
    }
    (out, false, None)
}
