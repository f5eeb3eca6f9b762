// Identity middleware for chat routes
// Verifies the bearer token, if any, and injects the caller's Identity into request extensions

use axum::{
    body::Body,
    extract::{FromRequestParts, State},
    http::{header, request::Parts, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::{
    app::AppState,
    services::{Identity, SignedInUser},
    utils::ChatError,
};

/// No Authorization header means a guest; a header that fails verification is rejected
pub async fn identity_middleware(
    State(app_state): State<AppState>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let auth_header = request
        .headers()
        .get(header::AUTHORIZATION)
        .map(|h| h.to_str().unwrap_or_default().trim().to_string());

    let identity = match auth_header.as_deref() {
        None | Some("") => Identity::Guest,
        Some(header) => {
            let Some(token) = header.strip_prefix("Bearer ") else {
                return ChatError::Unauthorized("Missing bearer token".to_string())
                    .into_response();
            };

            match app_state.identity.verify(token.trim()) {
                Ok(identity) => identity,
                Err(e) => {
                    tracing::warn!("Identity token rejected: {}", e);
                    return ChatError::Unauthorized(e.to_string()).into_response();
                },
            }
        },
    };

    request.extensions_mut().insert(identity);
    next.run(request).await
}

/// Extractor for the Identity placed by `identity_middleware`
impl<S> FromRequestParts<S> for Identity
where
    S: Send + Sync,
{
    type Rejection = ChatError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Identity>()
            .cloned()
            .ok_or_else(|| ChatError::Internal("identity middleware not installed".to_string()))
    }
}

/// A signed-in, non-anonymous caller; everyone else is turned away
#[derive(Debug, Clone)]
pub struct RequireUser(pub SignedInUser);

impl<S> FromRequestParts<S> for RequireUser
where
    S: Send + Sync,
{
    type Rejection = ChatError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match Identity::from_request_parts(parts, state).await? {
            Identity::SignedIn(user) => Ok(RequireUser(user)),
            _ => Err(ChatError::Unauthorized("Sign in required".to_string())),
        }
    }
}
