use std::borrow::Cow;
use std::sync::LazyLock;

use axum::Json;
use axum::extract::Request;
use axum::http::uri::Uri;
use axum::http::{HeaderValue, Method, StatusCode, header};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use regex::Regex;
use tracing::warn;
use url::form_urlencoded;

use crate::error::ErrorResponse;

/// Hard cap on request bodies.
pub const MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

const ALLOWED_CONTENT_TYPES: [&str; 2] = ["application/json", "text/plain"];

static SUSPICIOUS_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        // SQL injection signatures.
        r"(?i)(\bUNION\b.*\bSELECT\b)",
        r"(?i)(\bOR\b.*=.*\bOR\b)",
        r"(?i)(\bAND\b.*=.*\bAND\b)",
        r"(?i)(\bINSERT\b.*\bINTO\b)",
        r"(?i)(\bDELETE\b.*\bFROM\b)",
        r"(?i)(\bUPDATE\b.*\bSET\b)",
        r"(?i)(\bDROP\b.*\bTABLE\b)",
        r"(?i)(\bALTER\b.*\bTABLE\b)",
        r"--",
        r"/\*.*\*/",
        // Cross-site scripting signatures.
        r"<script.*?>",
        r"javascript:",
        r"onload=",
        r"onclick=",
        r"onerror=",
        r"<iframe.*?>",
        r"<object.*?>",
        r"<embed.*?>",
        // Path traversal signatures.
        r"\.\./",
        r"\.\.\\",
        r"%2e%2e%2f",
        r"%2e%2e%5c",
    ]
    .iter()
    .map(|pattern| Regex::new(pattern).expect("static pattern compiles"))
    .collect()
});

fn is_suspicious(input: &str) -> bool {
    SUSPICIOUS_PATTERNS
        .iter()
        .any(|pattern| pattern.is_match(input))
}

/// Strips NUL and control characters, keeping `\n`, `\r` and `\t`.
fn sanitize(input: &str) -> Cow<'_, str> {
    if input
        .chars()
        .all(|c| c >= ' ' || c == '\n' || c == '\r' || c == '\t')
    {
        return Cow::Borrowed(input);
    }

    Cow::Owned(
        input
            .chars()
            .filter(|&c| c >= ' ' || c == '\n' || c == '\r' || c == '\t')
            .collect(),
    )
}

fn invalid_request() -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse::new("Invalid request")),
    )
        .into_response()
}

/// Rejects requests whose path, query values or headers carry injection,
/// XSS or traversal signatures. The authorization header is exempt.
pub async fn block_suspicious_patterns(request: Request, next: Next) -> Response {
    let path = request.uri().path();
    if is_suspicious(path) {
        warn!(path, "blocked suspicious request path");
        return invalid_request();
    }

    if let Some(query) = request.uri().query() {
        for (key, value) in form_urlencoded::parse(query.as_bytes()) {
            if is_suspicious(&value) {
                warn!(key = %key, "blocked suspicious query parameter");
                return invalid_request();
            }
        }
    }

    for (name, value) in request.headers() {
        if name == &header::AUTHORIZATION {
            continue;
        }
        if let Ok(text) = value.to_str() {
            if is_suspicious(text) {
                warn!(header = %name, "blocked suspicious header");
                return invalid_request();
            }
        }
    }

    next.run(request).await
}

/// Rewrites query values and headers with control characters removed.
pub async fn sanitize_input(mut request: Request, next: Next) -> Response {
    if let Some(query) = request.uri().query().map(str::to_owned) {
        let mut dirty = false;
        let mut serializer = form_urlencoded::Serializer::new(String::new());
        for (key, value) in form_urlencoded::parse(query.as_bytes()) {
            let cleaned = sanitize(&value);
            if cleaned != value {
                dirty = true;
            }
            serializer.append_pair(&key, &cleaned);
        }

        if dirty {
            let sanitized_query = serializer.finish();
            let path = request.uri().path().to_owned();
            let rewritten = format!("{path}?{sanitized_query}");
            if let Ok(uri) = rewritten.parse::<Uri>() {
                *request.uri_mut() = uri;
            }
        }
    }

    let replacements: Vec<(header::HeaderName, HeaderValue)> = request
        .headers()
        .iter()
        .filter(|(name, _)| **name != header::AUTHORIZATION)
        .filter_map(|(name, value)| {
            let text = value.to_str().ok()?;
            match sanitize(text) {
                Cow::Borrowed(_) => None,
                Cow::Owned(cleaned) => {
                    let cleaned = HeaderValue::from_str(&cleaned).ok()?;
                    Some((name.clone(), cleaned))
                }
            }
        })
        .collect();

    for (name, value) in replacements {
        request.headers_mut().insert(name, value);
    }

    next.run(request).await
}

/// Enforces the declared body-size limit and the accepted content types for
/// body-carrying methods.
pub async fn enforce_size_and_type(request: Request, next: Next) -> Response {
    if let Some(length) = request
        .headers()
        .get(header::CONTENT_LENGTH)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.parse::<usize>().ok())
    {
        if length > MAX_BODY_BYTES {
            return (
                StatusCode::PAYLOAD_TOO_LARGE,
                Json(ErrorResponse::new("Request body too large")),
            )
                .into_response();
        }
    }

    if request.method() != Method::GET && request.method() != Method::DELETE {
        let content_type = request
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok());

        let Some(content_type) = content_type else {
            return (
                StatusCode::BAD_REQUEST,
                Json(ErrorResponse::new("Content-Type header is required")),
            )
                .into_response();
        };

        let media_type = content_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim();
        if !ALLOWED_CONTENT_TYPES.contains(&media_type) {
            return (
                StatusCode::UNSUPPORTED_MEDIA_TYPE,
                Json(ErrorResponse::new("Unsupported Content-Type")),
            )
                .into_response();
        }
    }

    next.run(request).await
}
