use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};

use crate::api::handlers::AppState;
use crate::error::AppError;

/// Platform scheduler header. The edge proxy strips it from external
/// traffic, so its presence means the platform's cron runner made the call.
pub const CRON_TRIGGER_HEADER: &str = "x-cron-trigger";

/// A cron invocation must present either the platform-trusted header or the
/// shared-secret bearer token. Rejection happens here, before any lock
/// acquisition or chain RPC work.
pub async fn cron_auth(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let headers = request.headers();
    let has_platform_header = headers.contains_key(CRON_TRIGGER_HEADER);
    let bearer = headers
        .get(http::header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "));

    if authorize_cron(has_platform_header, bearer, state.config.cron_secret.as_deref()) {
        Ok(next.run(request).await)
    } else {
        Err(AppError::Unauthorized)
    }
}

fn authorize_cron(has_platform_header: bool, bearer: Option<&str>, secret: Option<&str>) -> bool {
    if has_platform_header {
        return true;
    }
    match (bearer, secret) {
        (Some(token), Some(secret)) => token == secret,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_platform_header_is_trusted() {
        assert!(authorize_cron(true, None, None));
        assert!(authorize_cron(true, Some("wrong"), Some("secret")));
    }

    #[test]
    fn test_bearer_must_match_secret() {
        assert!(authorize_cron(false, Some("secret"), Some("secret")));
        assert!(!authorize_cron(false, Some("wrong"), Some("secret")));
        assert!(!authorize_cron(false, None, Some("secret")));
    }

    #[test]
    fn test_no_secret_configured_rejects_tokens() {
        assert!(!authorize_cron(false, Some("anything"), None));
        assert!(!authorize_cron(false, None, None));
    }
}
