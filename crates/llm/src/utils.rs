use crate::ApiError;
use anyhow::Result;
use reqwest::{Response, StatusCode};
use tracing::warn;

/// Check the response status and classify failures.
/// Returns Ok(Response) if successful, otherwise an `ApiError` carrying the response body.
pub async fn check_response_error(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let response_text = response.text().await.map_err(ApiError::from_reqwest)?;
    warn!("Request failed with status {status}: {response_text}");

    let error = match status {
        StatusCode::TOO_MANY_REQUESTS => ApiError::RateLimit(response_text),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            ApiError::Authentication(response_text)
        }
        StatusCode::BAD_REQUEST | StatusCode::NOT_FOUND => ApiError::InvalidRequest(response_text),
        status if status.is_server_error() => ApiError::ServiceError(response_text),
        _ => ApiError::Unknown(format!("Status {status}: {response_text}")),
    };

    Err(error.into())
}
