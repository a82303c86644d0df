//! Bearer shared-secret check for the scheduled/manual trigger endpoints (§6).

use axum::http::HeaderMap;

pub fn bearer_matches(headers: &HeaderMap, expected: &str) -> bool {
    let Some(value) = headers.get(axum::http::header::AUTHORIZATION) else {
        return false;
    };
    let Ok(value) = value.to_str() else {
        return false;
    };
    value.strip_prefix("Bearer ").map(|token| token == expected).unwrap_or(false)
}
