// Bearer token check for the protected routes

use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::Response,
};

use super::{AppState, ApiError};

pub(super) async fn require_bearer(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let presented = req
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim);
    match presented {
        Some(token) if !token.is_empty() && token == state.config.server.token => {
            Ok(next.run(req).await)
        }
        _ => Err(ApiError::Unauthorized),
    }
}
