use axum::{
    body::Body,
    extract::State,
    http::{
        header::{self, HeaderValue},
        Method, Request, Response, StatusCode,
    },
    middleware::Next,
};
use tracing::debug;

use crate::app::AppState;
use crate::app_config::AppConfig;

/// Which browser origins may call the API with credentials
#[derive(Debug, Clone, PartialEq)]
pub struct CorsPolicy {
    pub allowed_origins: Vec<String>,
    pub is_production: bool,
}

impl CorsPolicy {
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            allowed_origins: config.cors_allowed_origins.clone(),
            is_production: config.is_production(),
        }
    }
}

impl Default for CorsPolicy {
    fn default() -> Self {
        Self {
            allowed_origins: vec!["*".to_string()],
            is_production: false,
        }
    }
}

/// Origin to echo back, if the request's origin is allowed.
/// A `*` entry reflects any origin outside production.
pub fn allowed_origin(
    origin: Option<&str>,
    allowed_origins: &[String],
    is_production: bool,
) -> Option<String> {
    let origin = origin?;
    let has_wildcard = allowed_origins.iter().any(|o| o == "*");

    if has_wildcard && !is_production {
        debug!("CORS: Reflecting origin outside production: {}", origin);
        return Some(origin.to_string());
    }

    if allowed_origins.iter().any(|o| o == origin) {
        debug!("CORS: Origin allowed from whitelist: {}", origin);
        Some(origin.to_string())
    } else {
        debug!("CORS: Origin not in whitelist: {}", origin);
        None
    }
}

/// Dynamic CORS middleware supporting credentials
pub async fn dynamic_cors_middleware(
    State(state): State<AppState>,
    req: Request<Body>,
    next: Next,
) -> Result<Response<Body>, StatusCode> {
    let policy = &state.cors;
    let origin = req
        .headers()
        .get(header::ORIGIN)
        .and_then(|v| v.to_str().ok());

    let allowed = allowed_origin(origin, &policy.allowed_origins, policy.is_production)
        .and_then(|o| HeaderValue::from_str(&o).ok());

    // Preflight
    if req.method() == Method::OPTIONS {
        let mut response = Response::new(Body::empty());

        if let Some(allowed) = allowed {
            let headers = response.headers_mut();
            headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, allowed);
            headers.insert(
                header::ACCESS_CONTROL_ALLOW_CREDENTIALS,
                HeaderValue::from_static("true"),
            );
            headers.insert(
                header::ACCESS_CONTROL_ALLOW_METHODS,
                HeaderValue::from_static("GET, POST, DELETE, OPTIONS"),
            );
            headers.insert(
                header::ACCESS_CONTROL_ALLOW_HEADERS,
                HeaderValue::from_static("content-type, authorization, accept, origin"),
            );
            headers.insert(header::ACCESS_CONTROL_MAX_AGE, HeaderValue::from_static("3600"));
        }

        *response.status_mut() = StatusCode::OK;
        return Ok(response);
    }

    let mut response = next.run(req).await;

    if let Some(allowed) = allowed {
        response
            .headers_mut()
            .insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, allowed);
        response.headers_mut().insert(
            header::ACCESS_CONTROL_ALLOW_CREDENTIALS,
            HeaderValue::from_static("true"),
        );
    }

    Ok(response)
}
