//! Validation utilities for inbound transcode requests

use url::Url;

use crate::error::{AppError, Result};
use crate::models::ProcessVideoRequest;

/// Validate that a callback URL is absolute with a scheme and a host
pub fn validate_callback_url(raw: &str) -> Result<Url> {
    let parsed = Url::parse(raw)
        .map_err(|_| AppError::BadRequest("Invalid callbackUrl format".to_string()))?;

    if parsed.scheme().is_empty() || parsed.host_str().map_or(true, str::is_empty) {
        return Err(AppError::BadRequest(
            "Invalid callbackUrl format".to_string(),
        ));
    }

    Ok(parsed)
}

/// Validate every required field of a transcode request
///
/// # Returns
/// Ok(()) if the request can be turned into jobs, Err(BadRequest) otherwise
pub fn validate_process_request(req: &ProcessVideoRequest) -> Result<()> {
    let missing = req.input.bucket.trim().is_empty()
        || req.input.key.trim().is_empty()
        || req.output.bucket.trim().is_empty()
        || req.output.base_path.trim().is_empty()
        || req.profiles.is_empty()
        || req.callback_url.trim().is_empty();

    if missing {
        return Err(AppError::BadRequest(
            "Missing required fields (including callbackUrl)".to_string(),
        ));
    }

    validate_callback_url(&req.callback_url)?;
    Ok(())
}
