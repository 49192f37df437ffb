//! Caller identity from the authentication proxy
//!
//! Authentication happens upstream; it forwards the caller as
//! `X-Actor-Id` / `X-Actor-Role`. This middleware turns those headers into
//! an [`Actor`] request extension and rejects requests without them.

use axum::{
    body::Body,
    http::{Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};

use super::ApiResponse;
use crate::domain::{Actor, ActorRole};

pub const ACTOR_ID_HEADER: &str = "x-actor-id";
pub const ACTOR_ROLE_HEADER: &str = "x-actor-role";

fn unauthorized(message: &str) -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(ApiResponse::<()>::error(message)),
    )
        .into_response()
}

fn header(request: &Request<Body>, name: &str) -> Option<String> {
    request
        .headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(String::from)
}

pub async fn actor_middleware(mut request: Request<Body>, next: Next) -> Response {
    let Some(id) = header(&request, ACTOR_ID_HEADER) else {
        return unauthorized("missing X-Actor-Id header");
    };
    // Absent role means an ordinary customer
    let role = match header(&request, ACTOR_ROLE_HEADER) {
        Some(raw) => match ActorRole::from_str(&raw) {
            // Only internal callers act as the system
            Some(ActorRole::System) | None => {
                return unauthorized("unknown X-Actor-Role");
            }
            Some(role) => role,
        },
        None => ActorRole::Customer,
    };

    request.extensions_mut().insert(Actor::new(id, role));
    next.run(request).await
}
