//! API key authentication.

use crate::server::AppContext;
use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    middleware::Next,
    response::Response,
};

/// Header carrying the shared API key.
pub const API_KEY_HEADER: &str = "x-api-key";

fn check_key(expected: Option<&str>, provided: Option<&str>) -> Result<(), (StatusCode, &'static str)> {
    let Some(expected) = expected else {
        return Ok(());
    };

    match provided {
        Some(key) if key == expected => Ok(()),
        Some(_) => Err((StatusCode::UNAUTHORIZED, "Invalid API key")),
        None => Err((StatusCode::UNAUTHORIZED, "Missing API key")),
    }
}

/// Middleware rejecting requests without the configured `X-API-Key`
pub async fn api_key_middleware(
    State(ctx): State<AppContext>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, (StatusCode, &'static str)> {
    let provided = request
        .headers()
        .get(API_KEY_HEADER)
        .and_then(|v| v.to_str().ok());

    if let Err(rejection) = check_key(ctx.config.server.api_key(), provided) {
        tracing::warn!(
            "Rejected {} {}: {}",
            request.method(),
            request.uri().path(),
            rejection.1
        );
        return Err(rejection);
    }

    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_key() {
        assert!(check_key(None, None).is_ok());
        assert!(check_key(None, Some("anything")).is_ok());
        assert!(check_key(Some("secret"), Some("secret")).is_ok());

        let (status, msg) = check_key(Some("secret"), Some("wrong")).unwrap_err();
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(msg, "Invalid API key");

        let (_, msg) = check_key(Some("secret"), None).unwrap_err();
        assert_eq!(msg, "Missing API key");
    }
}
